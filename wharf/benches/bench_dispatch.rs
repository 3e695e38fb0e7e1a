//! Round-trip latency of `send` -> dispatch -> `send` back, sampled
//! across a burst of concurrent requests against one echo service.
//! Same "fire N sends, sleep, measure elapsed" shape as the pool-level
//! benchmark this crate grew out of, here against the actor runtime
//! instead of a bare thread pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use wharf::config::Config;
use wharf::error::Result;
use wharf::module::{Instance, Module};
use wharf::runtime::Runtime;
use wharf::{Message, PType, SendFlags, ServiceApi};

const BURSTS: usize = 50;
const PER_BURST: usize = 20;

struct EchoModule;

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
static ECHO: EchoModule = EchoModule;

struct CollectorModule {
    replies: Arc<AtomicUsize>,
}

impl Module for CollectorModule {
    fn create(&self) -> Instance {
        Box::new(())
    }
    fn init(&self, _inst: &mut Instance, api: &ServiceApi, _args: &str) -> Result<()> {
        let replies = self.replies.clone();
        api.set_callback(Box::new(move |_api, _msg: Message| {
            replies.fetch_add(1, Ordering::Relaxed);
            false
        }));
        Ok(())
    }
}

fn main() {
    let config = Config {
        thread: 4,
        bootstrap: "echo".to_string(),
        start: "bench-echo".to_string(),
        ..Config::default()
    };
    let total_nanos = Arc::new(AtomicUsize::new(0));
    let replies = Arc::new(AtomicUsize::new(0));
    let collector_mut: &'static mut CollectorModule = Box::leak(Box::new(CollectorModule {
        replies: replies.clone(),
    }));
    let collector: &'static CollectorModule = &*collector_mut;
    let (runtime, echo_handle) =
        Runtime::boot(config, &[("echo", &ECHO), ("collector", collector)]).expect("boot");
    let collector_handle = runtime.launch("collector", "").expect("launch collector");

    let api = runtime.api_for(collector_handle);
    let started = Instant::now();
    for _ in 0..BURSTS {
        let burst_start = Instant::now();
        for _ in 0..PER_BURST {
            api.send(echo_handle, PType::Text, 0, None, SendFlags::NONE)
                .expect("send");
        }
        std::thread::sleep(Duration::from_millis(2));
        total_nanos.fetch_add(burst_start.elapsed().as_nanos() as usize, Ordering::Relaxed);
    }
    std::thread::sleep(Duration::from_millis(20));

    let elapsed = started.elapsed();
    let got = replies.load(Ordering::Relaxed);
    println!(
        "{}/{} replies in {:?} ({:?}/msg)",
        got,
        BURSTS * PER_BURST,
        elapsed,
        elapsed / (BURSTS * PER_BURST).max(1) as u32
    );
    runtime.shutdown();
}
