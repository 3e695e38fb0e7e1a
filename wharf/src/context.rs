//! A live service: its handle, its module-provided behaviour, its mailbox,
//! and the callback the module installed. Grounded on `struct
//! skynet_context` in `skynet_server.c`. Reference counting there is a
//! hand-rolled atomic with an explicit "start at 2, drop the extra one
//! after `init` succeeds" dance so the context survives a concurrent
//! `retire` while `init` is still running; here `Arc<ServiceContext>`
//! gives the same guarantee for free; see `DESIGN.md`.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::api::{Callback, ServiceApi};
use crate::handle::Handle;
use crate::mailbox::Mailbox;
use crate::message::{error_reply, Message};
use crate::module::{Instance, Module};

pub struct ServiceContext {
    pub handle: Handle,
    pub mailbox: Arc<Mailbox>,
    pub api: ServiceApi,
    module: &'static dyn Module,
    instance: Mutex<Instance>,
    callback: Mutex<Option<Callback>>,
    /// Per-service session-id counter, matching `struct skynet_context`'s
    /// own `session_id` field rather than a process-wide stream.
    session_alloc: AtomicI32,
    /// Cumulative time spent inside this service's callback, in
    /// microseconds. Backs `STAT cpu`.
    cpu_cost_micros: AtomicU64,
    /// Messages dispatched through this context so far. Backs `STAT message`.
    message_count: AtomicU64,
    /// Set by the monitor thread when a sweep catches this context stuck
    /// mid-dispatch; read and cleared by `STAT endless`, matching
    /// `skynet_context_endless`/`cmd_stat`'s one-shot read.
    endless: AtomicBool,
    created_at: Instant,
}

impl ServiceContext {
    pub(crate) fn new(
        handle: Handle,
        mailbox: Arc<Mailbox>,
        api: ServiceApi,
        module: &'static dyn Module,
        instance: Instance,
    ) -> ServiceContext {
        ServiceContext {
            handle,
            mailbox,
            api,
            module,
            instance: Mutex::new(instance),
            callback: Mutex::new(None),
            session_alloc: AtomicI32::new(0),
            cpu_cost_micros: AtomicU64::new(0),
            message_count: AtomicU64::new(0),
            endless: AtomicBool::new(false),
            created_at: Instant::now(),
        }
    }

    /// Allocates the next session id for this service, wrapping past
    /// `i32::MAX` back to 1 (session 0 is reserved for "no reply
    /// expected").
    pub(crate) fn new_session(&self) -> i32 {
        let mut s = self.session_alloc.fetch_add(1, Ordering::Relaxed) + 1;
        if s <= 0 {
            self.session_alloc.store(1, Ordering::Relaxed);
            s = 1;
        }
        s
    }

    pub(crate) fn init(&self, args: &str) -> crate::error::Result<()> {
        let mut inst = self.instance.lock();
        self.module.init(&mut inst, &self.api, args)
    }

    pub fn set_callback(&self, cb: Callback) {
        *self.callback.lock() = Some(cb);
    }

    /// Runs one message through the installed callback. Returning `false`
    /// from the callback means "keep running" (the `skynet` convention is
    /// inverted from what the name suggests); the service only tears
    /// itself down by calling the `EXIT` command explicitly.
    pub(crate) fn dispatch_one(&self, msg: Message) {
        let started = Instant::now();
        {
            let mut cb = self.callback.lock();
            if let Some(cb) = cb.as_mut() {
                cb(&self.api, msg);
            }
            // No callback installed yet (still inside `init`, or never set):
            // the message is simply dropped, matching `skynet_context_message_dispatch`
            // on a context with `cb == NULL`.
        }
        self.cpu_cost_micros
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.message_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn signal(&self, signal: i32) {
        let mut inst = self.instance.lock();
        self.module.signal(&mut inst, &self.api, signal);
    }

    pub(crate) fn mark_endless(&self) {
        self.endless.store(true, Ordering::Relaxed);
    }

    /// Reads and clears the endless flag in one shot, matching
    /// `cmd_stat`'s `"endless"` arm resetting `context->endless` once read.
    pub(crate) fn take_endless(&self) -> bool {
        self.endless.swap(false, Ordering::Relaxed)
    }

    pub(crate) fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::Relaxed)
    }

    pub(crate) fn cpu_cost_seconds(&self) -> f64 {
        self.cpu_cost_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    pub(crate) fn uptime_seconds(&self) -> f64 {
        self.created_at.elapsed().as_secs_f64()
    }
}

impl Drop for ServiceContext {
    fn drop(&mut self) {
        self.mailbox.mark_releasing();
        self.mailbox.release(|msg| {
            // Nobody delivers these replies anywhere useful once the
            // context itself is gone; `error_reply` exists so a future
            // cross-node bounce (`crate::harbor`) has something to forward.
            let _ = error_reply(msg.source, msg.session);
        });
        let mut inst = self.instance.lock();
        self.module.release(&mut inst, &self.api);
    }
}
