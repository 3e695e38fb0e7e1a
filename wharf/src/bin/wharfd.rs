//! Command-line driver: load config, boot the runtime, run until told to
//! stop. Grounded on `skynet`'s own `skynet` binary (`skynet_main.c`):
//! one config file argument, `env_logger` instead of the original's
//! `skynet_error` ring buffer, `clap` for argument parsing the way the
//! rest of the pack's binaries do it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use nix::sys::signal::{signal, SigHandler, Signal};

use wharf::config::Config;
use wharf::error::Result;
use wharf::module::{Instance, Module};
use wharf::runtime::Runtime;
use wharf::{Message, PType, SendFlags, ServiceApi};

/// Set from the `SIGHUP` handler, polled from the main loop. Async-signal
/// safety rules out doing anything heavier than this inside the handler
/// itself. Grounded on `skynet_start.c`'s `signal_hup`/`SIGHUP` handling,
/// which likewise just flips a flag for the main thread to act on.
static HUP_RECEIVED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sighup(_: i32) {
    HUP_RECEIVED.store(true, Ordering::SeqCst);
}

#[derive(Parser, Debug)]
#[command(name = "wharfd", about = "Run a wharf actor-runtime node")]
struct Args {
    /// Path to a TOML config file. Falls back to built-in defaults (with
    /// `bootstrap` pointed at the built-in `echo` demo service) if absent.
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured worker thread count.
    #[arg(long)]
    thread: Option<usize>,
}

/// A minimal demo service: echoes every `Text` message back to its
/// sender. Stands in for the handful of builtin services `skynet` ships
/// (`logger`, `gate`) now that there's no embedded Lua to launch.
struct EchoModule;

impl Module for EchoModule {
    fn create(&self) -> Instance {
        Box::new(())
    }

    fn init(&self, _inst: &mut Instance, api: &ServiceApi, _args: &str) -> Result<()> {
        api.set_callback(Box::new(|api, msg: Message| {
            if msg.ptype == PType::Text {
                let _ = api.send(msg.source, PType::Text, msg.session, msg.data, SendFlags::NONE);
            }
            false
        }));
        log::info!("echo service :{:08x} ready", api.current_handle());
        Ok(())
    }

    fn release(&self, _inst: &mut Instance, api: &ServiceApi) {
        log::info!("echo service :{:08x} shutting down", api.current_handle());
    }
}

static ECHO_MODULE: EchoModule = EchoModule;

fn main() {
    env_logger::init();
    unsafe {
        let _ = signal(Signal::SIGHUP, SigHandler::Handler(on_sighup));
    }
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).unwrap_or_else(|e| {
            log::error!("{e}, falling back to defaults");
            default_config()
        }),
        None => default_config(),
    };
    if let Some(n) = args.thread {
        config.thread = n;
    }

    let (runtime, bootstrap) = Runtime::boot(config, &[("echo", &ECHO_MODULE)])
        .unwrap_or_else(|e| {
            log::error!("boot failed: {e}");
            std::process::exit(1);
        });
    log::info!("bootstrap service launched at :{bootstrap:08x}");

    while !runtime.is_aborted() {
        if HUP_RECEIVED.swap(false, Ordering::SeqCst) {
            log::info!("SIGHUP received, reopening log output");
        }
        std::thread::sleep(Duration::from_millis(200));
    }
    runtime.shutdown();
}

fn default_config() -> Config {
    let mut cfg = Config::default();
    cfg.bootstrap = "echo".to_string();
    cfg.start = "bootstrap".to_string();
    cfg
}
