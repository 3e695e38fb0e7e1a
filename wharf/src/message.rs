//! Wire-visible message type tags and the in-process message envelope.
//!
//! The wire format packs type and length into one `sz_and_type` word
//! because the C source stores messages in a flat struct that also has to
//! cross the harbor wire. Internally there's no need to pack them: `data`
//! already carries its own length. [`PType`] is kept numerically identical
//! to the wire tags so cross-node envelopes (`crate::harbor`) can still
//! write the original byte.

use std::convert::TryFrom;

use crate::handle::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PType {
    Text = 0,
    Response = 1,
    Multicast = 2,
    Client = 3,
    System = 4,
    Harbor = 5,
    Socket = 6,
    Error = 7,
    Reserved8 = 8,
    Reserved9 = 9,
    Reserved10 = 10,
    Reserved11 = 11,
}

impl TryFrom<u8> for PType {
    type Error = ();

    fn try_from(v: u8) -> Result<PType, ()> {
        use PType::*;
        Ok(match v {
            0 => Text,
            1 => Response,
            2 => Multicast,
            3 => Client,
            4 => System,
            5 => Harbor,
            6 => Socket,
            7 => Error,
            8 => Reserved8,
            9 => Reserved9,
            10 => Reserved10,
            11 => Reserved11,
            _ => return Err(()),
        })
    }
}

/// Flags accepted by `send`/`send_by_name`. Never persisted on the message
/// itself: `DONT_COPY` only changes who allocates, `ALLOC_SESSION` only
/// changes what `send` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendFlags(u32);

impl SendFlags {
    pub const NONE: SendFlags = SendFlags(0);
    pub const DONT_COPY: SendFlags = SendFlags(0x10000);
    pub const ALLOC_SESSION: SendFlags = SendFlags(0x20000);

    pub fn contains(self, other: SendFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SendFlags {
    type Output = SendFlags;
    fn bitor(self, rhs: SendFlags) -> SendFlags {
        SendFlags(self.0 | rhs.0)
    }
}

/// Maximum payload size: the original packs the type tag into the top 8
/// bits of a `usize`-width word, leaving `bits(usize) - 8` for the length.
pub const MAX_PAYLOAD: usize = (1usize << (usize::BITS - 8)) - 1;

#[derive(Debug, Clone)]
pub struct Message {
    pub source: Handle,
    pub session: i32,
    pub ptype: PType,
    pub data: Option<Vec<u8>>,
}

impl Message {
    pub fn size(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.len())
    }
}

/// A synthetic error reply sent back to `source` when a message can't be
/// delivered (unknown handle, retiring mailbox drain, ...).
pub fn error_reply(source: Handle, session: i32) -> Message {
    Message {
        source: 0,
        session,
        ptype: PType::Error,
        data: None,
    }
}

/// The response a fired timer pushes back to whoever filed it.
pub fn timeout_response(session: i32) -> Message {
    Message {
        source: 0,
        session,
        ptype: PType::Response,
        data: None,
    }
}
