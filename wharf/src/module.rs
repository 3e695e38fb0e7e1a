//! The module ABI: how a service's actual behaviour gets attached to a
//! freshly allocated handle.
//!
//! `skynet_module.c` `dlopen`s a `.so` and pulls `xxx_create`/`xxx_init`/
//! `xxx_release`/`xxx_signal` symbols out of it by name. A `dlopen`-based
//! loader has no Rust equivalent worth faking (there's no stable plugin
//! ABI to target), so a [`Module`] here is just a value registered ahead
//! of time under a name, the same shape the C loader exposes to the rest
//! of the runtime after the symbol lookup is done.

use std::any::Any;
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::api::ServiceApi;
use crate::error::{Error, Result};

/// Per-instance service state, handed back to every hook after `create`.
pub type Instance = Box<dyn Any + Send>;

pub trait Module: Send + Sync {
    fn create(&self) -> Instance;

    /// Runs once, right after the handle is registered. `args` is the
    /// string passed to `LAUNCH`. Returning `Err` aborts the launch and
    /// the handle is torn down without ever being dispatched to.
    fn init(&self, inst: &mut Instance, api: &ServiceApi, args: &str) -> Result<()>;

    /// Runs once, when the last reference to the service is dropped.
    fn release(&self, _inst: &mut Instance, _api: &ServiceApi) {}

    /// Out-of-band signal delivery, reachable through the `SIGNAL` command.
    fn signal(&self, _inst: &mut Instance, _api: &ServiceApi, _signal: i32) {}
}

#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<String, &'static dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> ModuleRegistry {
        ModuleRegistry::default()
    }

    pub fn register(&self, name: &str, module: &'static dyn Module) {
        self.modules.write().insert(name.to_string(), module);
    }

    pub fn lookup(&self, name: &str) -> Result<&'static dyn Module> {
        self.modules
            .read()
            .get(name)
            .copied()
            .ok_or_else(|| Error::NoSuchModule(name.to_string()))
    }
}
