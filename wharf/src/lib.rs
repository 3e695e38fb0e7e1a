//! `wharf`: an in-process actor runtime. Services are handles; handles
//! exchange asynchronous messages through per-service mailboxes; a
//! cooperative dispatcher drains a global ready-queue of non-empty
//! mailboxes across a fixed worker pool, guaranteeing at most one
//! in-flight callback per service at a time.
//!
//! Grounded throughout on the `skynet` C runtime (`skynet_server.c`,
//! `skynet_mq.c`, `skynet_handle.c`, `skynet_timer.c`,
//! `skynet_monitor.c`, `skynet_start.c`); see `DESIGN.md` for the
//! module-by-module mapping.

pub mod api;
pub mod command;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod handle;
pub mod harbor;
pub mod mailbox;
pub mod message;
pub mod module;
pub mod monitor;
pub mod ready_queue;
pub mod registry;
pub mod runtime;
pub mod sync;
pub mod timer;
pub mod worker;

pub use api::ServiceApi;
pub use config::Config;
pub use error::{Error, Result};
pub use handle::Handle;
pub use message::{Message, PType, SendFlags};
pub use module::{Instance, Module};
pub use runtime::Runtime;
