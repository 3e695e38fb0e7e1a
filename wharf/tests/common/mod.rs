use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wharf::config::Config;
use wharf::error::Result;
use wharf::module::{Instance, Module};
use wharf::runtime::Runtime;
use wharf::{Message, PType, SendFlags, ServiceApi};

pub struct EchoModule;

impl Module for EchoModule {
    fn create(&self) -> Instance {
        Box::new(())
    }
    fn init(&self, _inst: &mut Instance, api: &ServiceApi, _args: &str) -> Result<()> {
        api.set_callback(Box::new(|api, msg: Message| {
            let _ = api.send(msg.source, PType::Text, msg.session, msg.data, SendFlags::NONE);
            false
        }));
        Ok(())
    }
}
pub static ECHO: EchoModule = EchoModule;

/// Collects every message it receives, for assertions made from the test
/// thread after a short sleep.
pub struct CollectorModule {
    pub inbox: Arc<Mutex<Vec<Message>>>,
}

impl Module for CollectorModule {
    fn create(&self) -> Instance {
        Box::new(())
    }
    fn init(&self, _inst: &mut Instance, api: &ServiceApi, _args: &str) -> Result<()> {
        let inbox = self.inbox.clone();
        api.set_callback(Box::new(move |_api, msg: Message| {
            inbox.lock().unwrap().push(msg);
            false
        }));
        Ok(())
    }
}

/// A service whose callback never returns, simulating the endless-loop
/// case the monitor thread is meant to catch. Deliberately spins instead
/// of sleeping, matching a CPU-bound stuck service rather than a blocked
/// one.
pub struct SpinModule {
    pub hits: Arc<AtomicUsize>,
}

impl Module for SpinModule {
    fn create(&self) -> Instance {
        Box::new(())
    }
    fn init(&self, _inst: &mut Instance, api: &ServiceApi, _args: &str) -> Result<()> {
        let hits = self.hits.clone();
        api.set_callback(Box::new(move |_api, _msg: Message| {
            hits.fetch_add(1, Ordering::Relaxed);
            std::thread::sleep(std::time::Duration::from_secs(10));
            false
        }));
        Ok(())
    }
}

pub fn boot_with_echo(thread: usize) -> (Runtime, wharf::Handle) {
    let config = Config {
        thread,
        bootstrap: "echo".to_string(),
        start: "test-echo".to_string(),
        ..Config::default()
    };
    Runtime::boot(config, &[("echo", &ECHO)]).expect("boot")
}
