use thiserror::Error;

use crate::handle::Handle;

/// Error kinds a running service or the runtime itself can hit.
///
/// Allocation failure isn't represented here: Rust aborts the process on
/// OOM already, which is already "fatal, no recovery".
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("unknown handle :{0:08x}")]
    UnknownHandle(Handle),

    #[error("name already bound: {0}")]
    DuplicateName(String),

    #[error("no service bound to name: {0}")]
    UnknownName(String),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("module load failure: {0}")]
    ModuleLoadFailure(String),

    #[error("sending to handle 0 with a non-null payload is not allowed")]
    SendToZero,

    #[error("no such module registered: {0}")]
    NoSuchModule(String),

    #[error("init hook returned failure for module {0}")]
    InitFailed(String),

    #[error("address {0} has no recognised prefix ( : or . )")]
    BadAddress(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
