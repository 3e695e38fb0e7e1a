//! The handle a running service uses to talk back to the runtime: send,
//! query, set its own callback, read the clock, issue commands. Grounded
//! on the `skynet_context` functions exposed to service C code
//! (`skynet_send`, `skynet_send_name`, `skynet_callback`, `skynet_now`,
//! `skynet_command`) in `skynet_server.c`/`skynet_timer.c`.

use std::sync::Arc;

use crate::command::{self, Command};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::message::{Message, PType, SendFlags, MAX_PAYLOAD};
use crate::runtime::RuntimeInner;

pub type Callback = Box<dyn FnMut(&ServiceApi, Message) -> bool + Send>;

#[derive(Clone)]
pub struct ServiceApi {
    pub(crate) runtime: Arc<RuntimeInner>,
    pub(crate) handle: Handle,
}

impl ServiceApi {
    pub(crate) fn new(runtime: Arc<RuntimeInner>, handle: Handle) -> ServiceApi {
        ServiceApi { runtime, handle }
    }

    pub fn current_handle(&self) -> Handle {
        self.handle
    }

    /// Monotonic milliseconds since boot, the unit timeouts are expressed
    /// in (after the x100 conversion from centiseconds).
    pub fn now(&self) -> u64 {
        self.runtime.timer.now_ms()
    }

    /// Wall-clock seconds since the epoch, latched once per timer tick.
    pub fn wall_time(&self) -> u64 {
        self.runtime.timer.wall_seconds()
    }

    /// Draws the next session id from this service's own context, matching
    /// `struct skynet_context`'s per-context `session_id` counter rather
    /// than a process-wide stream.
    pub fn new_session(&self) -> i32 {
        match self.runtime.registry.grab(self.handle) {
            Ok(ctx) => ctx.new_session(),
            Err(_) => 1,
        }
    }

    pub fn send(
        &self,
        dest: Handle,
        ptype: PType,
        session: i32,
        data: Option<Vec<u8>>,
        flags: SendFlags,
    ) -> Result<i32> {
        if dest == 0 && data.is_some() {
            return Err(Error::SendToZero);
        }
        if let Some(d) = &data {
            if d.len() > MAX_PAYLOAD {
                return Err(Error::MessageTooLarge {
                    size: d.len(),
                    max: MAX_PAYLOAD,
                });
            }
        }
        let session = if flags.contains(SendFlags::ALLOC_SESSION) {
            self.new_session()
        } else {
            session
        };
        let msg = Message {
            source: self.handle,
            session,
            ptype,
            data,
        };
        self.runtime.dispatch_message(dest, msg)?;
        Ok(session)
    }

    pub fn send_by_name(
        &self,
        name: &str,
        ptype: PType,
        session: i32,
        data: Option<Vec<u8>>,
        flags: SendFlags,
    ) -> Result<i32> {
        let dest = self.query_name(name)?;
        self.send(dest, ptype, session, data, flags)
    }

    pub fn query_name(&self, name: &str) -> Result<Handle> {
        self.runtime.registry.find_name(name)
    }

    pub fn bind_name(&self, name: &str) -> Result<Handle> {
        self.runtime.registry.bind_name(name, self.handle)?;
        Ok(self.handle)
    }

    /// Installs the callback this service's mailbox is dispatched
    /// through. Usually called once from `Module::init`.
    pub fn set_callback(&self, cb: Callback) {
        if let Ok(ctx) = self.runtime.registry.grab(self.handle) {
            ctx.set_callback(cb);
        }
    }

    pub fn get_env(&self, key: &str) -> Option<String> {
        self.runtime.env.get(key)
    }

    pub fn set_env(&self, key: &str, value: &str) -> Option<String> {
        self.runtime.env.set(key, value)
    }

    /// Registers a timeout: after `centiseconds` hundredths of a second, a
    /// `PType::Response` message with this session carrying no payload is
    /// delivered back to the caller.
    pub fn timeout(&self, centiseconds: u32, session: i32) {
        self.runtime.timer.add(self.handle, centiseconds, session);
    }

    /// The text command surface: `MONITOR`, `STAT`, `KILL`, and so on,
    /// dispatched through [`crate::command`].
    pub fn command(&self, cmd: &str) -> Result<Option<String>> {
        let parsed = Command::parse(cmd)?;
        command::execute(&self.runtime, self.handle, parsed)
    }
}
