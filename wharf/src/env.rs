//! Process-wide string key/value configuration, mutex-guarded.
//!
//! The rest of the runtime reads well-known keys out of this table
//! (`thread`, `harbor`, `bootstrap`, ...); [`crate::config::Config`] is
//! the typed, validated view built on top of it at boot. The raw table
//! stays around afterwards because the `GETENV`/`SETENV` commands let a
//! running service read and write it at any time.

use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct Env {
    table: Mutex<HashMap<String, String>>,
}

impl Env {
    pub fn new() -> Env {
        Env::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.table.lock().get(key).cloned()
    }

    /// Sets `key` to `value`, returning the previous value if any.
    pub fn set(&self, key: &str, value: &str) -> Option<String> {
        self.table.lock().insert(key.to_string(), value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let env = Env::new();
        assert_eq!(env.get("thread"), None);
        env.set("thread", "8");
        assert_eq!(env.get("thread").as_deref(), Some("8"));
    }

    #[test]
    fn set_returns_previous_value() {
        let env = Env::new();
        env.set("k", "1");
        assert_eq!(env.set("k", "2").as_deref(), Some("1"));
    }
}
