mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use wharf::config::Config;
use wharf::error::Result;
use wharf::module::{Instance, Module};
use wharf::runtime::Runtime;
use wharf::{Message, PType, ServiceApi};

struct TimeoutClient {
    fired: Arc<AtomicUsize>,
}

impl Module for TimeoutClient {
    fn create(&self) -> Instance {
        Box::new(())
    }
    fn init(&self, _inst: &mut Instance, api: &ServiceApi, _args: &str) -> Result<()> {
        let fired = self.fired.clone();
        let session = api.new_session();
        api.set_callback(Box::new(move |_api, msg: Message| {
            if msg.ptype == PType::Response && msg.session == session {
                fired.fetch_add(1, Ordering::Relaxed);
            }
            false
        }));
        // 5 centiseconds == 50ms == 5 ticks at 10ms/tick.
        api.timeout(5, session);
        Ok(())
    }
}

#[test]
fn timeout_fires_roughly_on_schedule() {
    let config = Config {
        thread: 2,
        bootstrap: "client".to_string(),
        start: "timeout-client".to_string(),
        ..Config::default()
    };
    let fired = Arc::new(AtomicUsize::new(0));
    let client: &'static TimeoutClient = Box::leak(Box::new(TimeoutClient {
        fired: fired.clone(),
    }));
    let (runtime, _handle) = Runtime::boot(config, &[("client", client)]).expect("boot");

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(fired.load(Ordering::Relaxed), 0, "fired before its deadline");

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(fired.load(Ordering::Relaxed), 1);
}
