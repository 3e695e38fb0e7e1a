//! The text command surface a service issues through `ServiceApi::command`.
//! Grounded on the `cmd_funcs` table in `skynet_server.c`'s
//! `skynet_command`: a flat switch over upper-case verbs, each taking and
//! returning a string (here `Option<&str>` in, `Option<String>` out).

use std::sync::Arc;

use crate::api::ServiceApi;
use crate::context::ServiceContext;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::runtime::RuntimeInner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Timeout(u32),
    Reg,
    RegName(String),
    Query(String),
    Name(String, Handle),
    Exit,
    Kill(Handle),
    GetEnv(String),
    SetEnv(String, String),
    StartTime,
    Abort,
    Monitor(Handle),
    /// `STAT <mqlen|endless|cpu|time|message>`, mirroring `cmd_stat`'s
    /// sub-selector over a single result slot.
    Stat(String),
    LogOn,
    LogOff,
    Signal(Handle, i32),
    Launch(String, String),
}

impl Command {
    pub fn parse(line: &str) -> Result<Command> {
        let line = line.trim();
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match verb.to_ascii_uppercase().as_str() {
            "TIMEOUT" => Ok(Command::Timeout(parse_u32(rest)?)),
            "REG" if rest.is_empty() => Ok(Command::Reg),
            "REG" => Ok(Command::RegName(rest.to_string())),
            "QUERY" => Ok(Command::Query(rest.to_string())),
            "NAME" => {
                let (name, handle) = rest
                    .split_once(' ')
                    .ok_or_else(|| Error::UnknownCommand(line.to_string()))?;
                Ok(Command::Name(name.to_string(), parse_handle(handle.trim())?))
            }
            "EXIT" => Ok(Command::Exit),
            "KILL" => Ok(Command::Kill(parse_handle(rest)?)),
            "GETENV" => Ok(Command::GetEnv(rest.to_string())),
            "SETENV" => {
                let (k, v) = rest
                    .split_once(' ')
                    .ok_or_else(|| Error::UnknownCommand(line.to_string()))?;
                Ok(Command::SetEnv(k.to_string(), v.trim().to_string()))
            }
            "STARTTIME" => Ok(Command::StartTime),
            "ABORT" => Ok(Command::Abort),
            "MONITOR" => Ok(Command::Monitor(parse_handle(rest)?)),
            "STAT" => Ok(Command::Stat(rest.to_string())),
            "LOGON" => Ok(Command::LogOn),
            "LOGOFF" => Ok(Command::LogOff),
            "SIGNAL" => {
                let (h, sig) = rest
                    .split_once(' ')
                    .ok_or_else(|| Error::UnknownCommand(line.to_string()))?;
                Ok(Command::Signal(parse_handle(h)?, parse_u32(sig.trim())? as i32))
            }
            "LAUNCH" => {
                let (module, args) = rest.split_once(' ').unwrap_or((rest, ""));
                if module.is_empty() {
                    return Err(Error::UnknownCommand(line.to_string()));
                }
                Ok(Command::Launch(module.to_string(), args.trim().to_string()))
            }
            _ => Err(Error::UnknownCommand(line.to_string())),
        }
    }
}

fn parse_u32(s: &str) -> Result<u32> {
    s.parse().map_err(|_| Error::UnknownCommand(s.to_string()))
}

fn parse_handle(s: &str) -> Result<Handle> {
    let s = s.strip_prefix(':').unwrap_or(s);
    u32::from_str_radix(s, 16).map_err(|_| Error::UnknownCommand(s.to_string()))
}

pub fn execute(runtime: &Arc<RuntimeInner>, from: Handle, cmd: Command) -> Result<Option<String>> {
    let ctx: Option<Arc<ServiceContext>> = runtime.registry.grab(from).ok();
    match cmd {
        Command::Timeout(cs) => {
            let api = ServiceApi::new(runtime.clone(), from);
            let session = api.new_session();
            runtime.timer.add(from, cs, session);
            Ok(Some(session.to_string()))
        }
        Command::Reg => Ok(Some(format!(":{from:08x}"))),
        Command::RegName(name) => {
            runtime.registry.bind_name(&name, from)?;
            Ok(Some(format!(":{from:08x}")))
        }
        Command::Query(name) => Ok(Some(format!(":{:08x}", runtime.registry.find_name(&name)?))),
        Command::Name(name, handle) => {
            runtime.registry.bind_name(&name, handle)?;
            Ok(None)
        }
        Command::Exit => {
            runtime.retire_service(from)?;
            Ok(None)
        }
        Command::Kill(handle) => {
            runtime.retire_service(handle)?;
            Ok(None)
        }
        Command::GetEnv(key) => Ok(runtime.env.get(&key)),
        Command::SetEnv(key, value) => {
            runtime.env.set(&key, &value);
            Ok(None)
        }
        Command::StartTime => Ok(Some(runtime.start_time_seconds().to_string())),
        Command::Abort => {
            runtime.abort();
            Ok(None)
        }
        Command::Monitor(handle) => {
            runtime.monitor.watch(from, handle);
            Ok(None)
        }
        Command::Stat(sub) => {
            let text = match &ctx {
                None => String::new(),
                Some(c) => match sub.as_str() {
                    "mqlen" => c.mailbox.len().to_string(),
                    "endless" => if c.take_endless() { "1" } else { "0" }.to_string(),
                    "cpu" => format!("{:.6}", c.cpu_cost_seconds()),
                    "time" => {
                        if runtime.config.profile {
                            format!("{:.6}", c.uptime_seconds())
                        } else {
                            "0".to_string()
                        }
                    }
                    "message" => c.message_count().to_string(),
                    _ => String::new(),
                },
            };
            Ok(Some(text))
        }
        Command::LogOn => {
            if let Some(c) = &ctx {
                runtime.enable_logging(c.handle);
            }
            Ok(None)
        }
        Command::LogOff => {
            if let Some(c) = &ctx {
                runtime.disable_logging(c.handle);
            }
            Ok(None)
        }
        Command::Signal(handle, sig) => {
            runtime.registry.grab(handle)?.signal(sig);
            Ok(None)
        }
        Command::Launch(module, args) => {
            let handle = runtime.launch(&module, &args)?;
            Ok(Some(format!(":{handle:08x}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timeout() {
        assert_eq!(Command::parse("TIMEOUT 100").unwrap(), Command::Timeout(100));
    }

    #[test]
    fn parses_reg_without_name() {
        assert_eq!(Command::parse("REG").unwrap(), Command::Reg);
    }

    #[test]
    fn parses_query() {
        assert_eq!(
            Command::parse("QUERY launcher").unwrap(),
            Command::Query("launcher".to_string())
        );
    }

    #[test]
    fn rejects_unknown_verb() {
        assert!(matches!(
            Command::parse("FROBNICATE"),
            Err(Error::UnknownCommand(_))
        ));
    }

    #[test]
    fn parses_handle_with_colon_prefix() {
        assert_eq!(parse_handle(":0000002a").unwrap(), 0x2a);
        assert_eq!(parse_handle("2a").unwrap(), 0x2a);
    }

    #[test]
    fn parses_launch_with_and_without_args() {
        assert_eq!(
            Command::parse("LAUNCH snlua bootstrap").unwrap(),
            Command::Launch("snlua".to_string(), "bootstrap".to_string())
        );
        assert_eq!(
            Command::parse("LAUNCH snlua").unwrap(),
            Command::Launch("snlua".to_string(), String::new())
        );
    }

    #[test]
    fn rejects_launch_with_no_module() {
        assert!(matches!(
            Command::parse("LAUNCH"),
            Err(Error::UnknownCommand(_))
        ));
    }

    #[test]
    fn parses_stat_subkey() {
        assert_eq!(
            Command::parse("STAT mqlen").unwrap(),
            Command::Stat("mqlen".to_string())
        );
    }
}
