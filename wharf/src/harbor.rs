//! Cross-node message forwarding. A real harbor is a TCP mesh between
//! nodes (`skynet_harbor.c` + the `cmaster`/`cslave` Lua services); that
//! network layer is out of scope here (see `SPEC_FULL.md`), but the wire
//! envelope and the local seam that would hand a message to it are kept:
//! any handle whose node byte doesn't match ours is encoded with
//! [`Envelope::encode`] and handed to a [`HarborSink`] instead of being
//! looked up in the local registry.

use std::convert::TryFrom;

use byteorder::{BigEndian, ByteOrder};

use crate::handle::Handle;
use crate::message::{Message, PType};

/// Fixed header: source (4), dest (4), session (4), ptype (1), length (4).
pub const HEADER_LEN: usize = 17;

pub struct Envelope {
    pub source: Handle,
    pub dest: Handle,
    pub session: i32,
    pub ptype: PType,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn from_message(dest: Handle, msg: &Message) -> Envelope {
        Envelope {
            source: msg.source,
            dest,
            session: msg.session,
            ptype: msg.ptype,
            payload: msg.data.clone().unwrap_or_default(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        BigEndian::write_u32(&mut buf[0..4], self.source);
        BigEndian::write_u32(&mut buf[4..8], self.dest);
        BigEndian::write_i32(&mut buf[8..12], self.session);
        buf[12] = self.ptype as u8;
        BigEndian::write_u32(&mut buf[13..17], self.payload.len() as u32);
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Envelope> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        let source = BigEndian::read_u32(&buf[0..4]);
        let dest = BigEndian::read_u32(&buf[4..8]);
        let session = BigEndian::read_i32(&buf[8..12]);
        let ptype = PType::try_from(buf[12]).ok()?;
        let len = BigEndian::read_u32(&buf[13..17]) as usize;
        let payload = buf.get(HEADER_LEN..HEADER_LEN + len)?.to_vec();
        Some(Envelope {
            source,
            dest,
            session,
            ptype,
            payload,
        })
    }
}

/// The seam a real cross-node transport plugs into. Any handle whose node
/// byte doesn't match ours routes here instead of the in-process
/// dispatcher; the default sink just logs and drops, so a single-node
/// deployment never needs one wired up.
pub trait HarborSink: Send + Sync {
    fn forward(&self, envelope: Envelope);
}

pub struct LoggingSink;

impl HarborSink for LoggingSink {
    fn forward(&self, envelope: Envelope) {
        log::warn!(
            "no harbor configured: dropping message to remote handle :{:08x}",
            envelope.dest
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_wire_format() {
        let msg = Message {
            source: 0x0100_0001,
            session: 42,
            ptype: PType::Text,
            data: Some(b"hello".to_vec()),
        };
        let env = Envelope::from_message(0x0200_0007, &msg);
        let encoded = env.encode();
        let decoded = Envelope::decode(&encoded).unwrap();
        assert_eq!(decoded.source, msg.source);
        assert_eq!(decoded.dest, 0x0200_0007);
        assert_eq!(decoded.session, 42);
        assert_eq!(decoded.ptype, PType::Text);
        assert_eq!(decoded.payload, b"hello");
    }

    #[test]
    fn decode_rejects_truncated_buffers() {
        assert!(Envelope::decode(&[0u8; 4]).is_none());
    }
}
