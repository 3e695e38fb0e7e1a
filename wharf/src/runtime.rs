//! Boots and owns every shared piece of the runtime: the registry, the
//! ready-queue, the timing wheel, the worker pool. Grounded on
//! `skynet_start.c`'s `skynet_start`: load config, register built-in
//! modules, launch the bootstrap service, spawn the thread pool, block
//! until told to stop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use wharf_wake::WakePool;

use crate::api::ServiceApi;
use crate::config::Config;
use crate::context::ServiceContext;
use crate::env::Env;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::harbor::{Envelope, HarborSink, LoggingSink};
use crate::mailbox::Mailbox;
use crate::message::{error_reply, timeout_response, Message, PType, SendFlags};
use crate::module::{Module, ModuleRegistry};
use crate::monitor::Monitor;
use crate::ready_queue::ReadyQueue;
use crate::registry::Registry;
use crate::worker::WorkerPool;

pub struct RuntimeInner {
    pub registry: Registry,
    pub ready: ReadyQueue,
    pub timer: crate::timer::TimingWheel,
    pub env: Env,
    pub config: Config,
    pub modules: ModuleRegistry,
    pub monitor: Monitor,
    pub node: u8,
    pub(crate) wake: Arc<WakePool>,
    pub(crate) busy: AtomicUsize,
    logging: Mutex<std::collections::HashSet<Handle>>,
    harbor_sink: Box<dyn HarborSink>,
    aborted: AtomicBool,
    boot_instant: SystemTime,
}

impl RuntimeInner {
    fn new(config: Config, worker_count: usize) -> RuntimeInner {
        RuntimeInner {
            registry: Registry::new(config.harbor),
            ready: ReadyQueue::new(),
            timer: crate::timer::TimingWheel::new(),
            env: Env::new(),
            node: config.harbor,
            config,
            modules: ModuleRegistry::new(),
            monitor: Monitor::new(worker_count),
            wake: Arc::new(WakePool::new(worker_count)),
            busy: AtomicUsize::new(0),
            logging: Mutex::new(std::collections::HashSet::new()),
            harbor_sink: Box::new(LoggingSink),
            aborted: AtomicBool::new(false),
            boot_instant: SystemTime::now(),
        }
    }

    /// Delivers `msg` to `dest`. Remote handles go to the harbor sink
    /// instead of the local registry (the node byte in the handle tells
    /// them apart).
    pub(crate) fn dispatch_message(&self, dest: Handle, msg: Message) -> Result<()> {
        if crate::handle::is_local(dest, self.node) {
            let ctx = self.registry.grab(dest)?;
            if self.logging.lock().contains(&dest) {
                log::info!(
                    "[:{:08x}] <- [:{:08x}] session {} type {:?} ({} bytes)",
                    dest,
                    msg.source,
                    msg.session,
                    msg.ptype,
                    msg.size()
                );
            }
            ctx.mailbox.push(msg);
            self.ready.push_if_absent(&ctx.mailbox);
            self.wake.wake(self.busy.load(Ordering::Relaxed));
            Ok(())
        } else {
            self.harbor_sink.forward(Envelope::from_message(dest, &msg));
            Ok(())
        }
    }

    pub(crate) fn deliver_timeout(&self, handle: Handle, session: i32) {
        let _ = self.dispatch_message(handle, timeout_response(session));
    }

    pub(crate) fn retire_service(&self, handle: Handle) -> Result<()> {
        let ctx = self.registry.retire(handle)?;
        for watcher in self.monitor.take_watchers(handle) {
            let _ = self.dispatch_message(watcher, error_reply(handle, 0));
        }
        drop(ctx); // runs Module::release via ServiceContext::drop once refs hit zero
        Ok(())
    }

    pub(crate) fn enable_logging(&self, handle: Handle) {
        self.logging.lock().insert(handle);
    }

    pub(crate) fn disable_logging(&self, handle: Handle) {
        self.logging.lock().remove(&handle);
    }

    pub(crate) fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub(crate) fn start_time_seconds(&self) -> u64 {
        self.boot_instant
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Allocates a handle, instantiates `module`, runs its `init` hook,
    /// and makes it dispatchable. Grounded on `skynet_context_new`.
    pub fn launch(self: &Arc<Self>, module_name: &str, args: &str) -> Result<Handle> {
        let module = self.modules.lookup(module_name)?;
        let ctx = self.registry.register(|handle| {
            let mailbox = Arc::new(Mailbox::new(handle));
            let api = ServiceApi::new(self.clone(), handle);
            let instance = module.create();
            Arc::new(ServiceContext::new(handle, mailbox, api, module, instance))
        });
        if let Err(e) = ctx.init(args) {
            let _ = self.registry.retire(ctx.handle);
            return Err(Error::InitFailed(format!("{module_name}: {e}")));
        }
        Ok(ctx.handle)
    }
}

/// The public entry point: owns the shared state plus the live thread
/// pool, and stops the pool on drop so a `Runtime` going out of scope
/// never leaks worker threads.
pub struct Runtime {
    inner: Arc<RuntimeInner>,
    workers: Option<WorkerPool>,
}

impl Runtime {
    /// Boots with `config`, registering `modules` (name, module) pairs
    /// ahead of launching the bootstrap service named in
    /// `config.bootstrap`.
    pub fn boot(config: Config, modules: &[(&str, &'static dyn Module)]) -> Result<(Runtime, Handle)> {
        let worker_count = config.thread.max(1);
        let inner = Arc::new(RuntimeInner::new(config, worker_count));
        for (name, module) in modules {
            inner.modules.register(name, *module);
        }
        let workers = WorkerPool::spawn(inner.clone(), worker_count);

        let (module_name, args) = inner
            .config
            .bootstrap
            .split_once(' ')
            .unwrap_or((inner.config.bootstrap.as_str(), ""));
        let handle = inner.launch(module_name, args)?;
        inner.registry.bind_name(&inner.config.start, handle)?;

        Ok((
            Runtime {
                inner,
                workers: Some(workers),
            },
            handle,
        ))
    }

    pub fn inner(&self) -> &Arc<RuntimeInner> {
        &self.inner
    }

    pub fn api_for(&self, handle: Handle) -> ServiceApi {
        ServiceApi::new(self.inner.clone(), handle)
    }

    pub fn launch(&self, module_name: &str, args: &str) -> Result<Handle> {
        self.inner.launch(module_name, args)
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.is_aborted()
    }

    pub fn shutdown(mut self) {
        if let Some(w) = self.workers.take() {
            w.shutdown(&self.inner);
        }
        for ctx in self.inner.registry.retire_all() {
            drop(ctx);
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Some(w) = self.workers.take() {
            w.shutdown(&self.inner);
        }
    }
}

#[cfg(test)]
struct NoopModule;

#[cfg(test)]
impl Module for NoopModule {
    fn create(&self) -> crate::module::Instance {
        Box::new(())
    }
    fn init(&self, _inst: &mut crate::module::Instance, _api: &ServiceApi, _args: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
static NOOP_MODULE: NoopModule = NoopModule;

#[cfg(test)]
impl Runtime {
    /// A minimal runtime for unit tests elsewhere in the crate: one
    /// worker thread, bootstrap module that does nothing, no-op harbor.
    pub fn new_for_test() -> Runtime {
        let config = Config {
            thread: 1,
            bootstrap: "noop".to_string(),
            start: "test-bootstrap".to_string(),
            ..Config::default()
        };
        let (rt, _handle) = Runtime::boot(config, &[("noop", &NOOP_MODULE)]).expect("boot");
        rt
    }

    pub fn launch_noop(&self) -> Handle {
        self.launch("noop", "").expect("launch noop")
    }
}
