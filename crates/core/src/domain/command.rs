// Probe command construction
// The platform branch lives here and nowhere else.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::target::Target;

/// Host operating system family, as far as ping flags are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostFamily {
    Windows,
    Unix,
}

impl HostFamily {
    /// Family of the host this binary was built for.
    pub fn current() -> Self {
        if cfg!(windows) {
            HostFamily::Windows
        } else {
            HostFamily::Unix
        }
    }

    /// Flag selecting the number of echo requests.
    pub fn count_flag(self) -> &'static str {
        match self {
            HostFamily::Windows => "-n",
            HostFamily::Unix => "-c",
        }
    }
}

/// Program + argv of one probe invocation. Executed directly, never via a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ProbeCommand {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `ping -n|-c <count> <address>` for the given host family
    pub fn ping(host: HostFamily, target: &Target) -> Self {
        Self::new(
            "ping",
            [
                host.count_flag().to_string(),
                target.repeat_count().to_string(),
                target.address().to_string(),
            ],
        )
    }
}

impl fmt::Display for ProbeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Maps a target to the command that probes it.
///
/// Production uses [`PingCommandFactory`]; tests substitute stub commands.
pub trait CommandFactory: Send + Sync {
    fn build(&self, target: &Target) -> ProbeCommand;
}

/// Platform ping mapping
#[derive(Debug, Clone, Copy)]
pub struct PingCommandFactory {
    host: HostFamily,
}

impl PingCommandFactory {
    pub fn new(host: HostFamily) -> Self {
        Self { host }
    }

    pub fn host(&self) -> HostFamily {
        self.host
    }
}

impl Default for PingCommandFactory {
    fn default() -> Self {
        Self::new(HostFamily::current())
    }
}

impl CommandFactory for PingCommandFactory {
    fn build(&self, target: &Target) -> ProbeCommand {
        ProbeCommand::ping(self.host, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::target::RepeatCount;

    fn target(address: &str, count: u32) -> Target {
        Target::new(address, RepeatCount::new(count).unwrap()).unwrap()
    }

    #[test]
    fn test_windows_command_line() {
        let factory = PingCommandFactory::new(HostFamily::Windows);
        let command = factory.build(&target("10.0.0.1", 5));

        assert_eq!(command.to_string(), "ping -n 5 10.0.0.1");
        assert_eq!(command.program, "ping");
        assert_eq!(command.args, vec!["-n", "5", "10.0.0.1"]);
    }

    #[test]
    fn test_unix_command_line() {
        let factory = PingCommandFactory::new(HostFamily::Unix);
        let command = factory.build(&target("10.0.0.1", 5));

        assert_eq!(command.to_string(), "ping -c 5 10.0.0.1");
    }

    #[test]
    fn test_current_host_matches_build_target() {
        let expected = if cfg!(windows) {
            HostFamily::Windows
        } else {
            HostFamily::Unix
        };
        assert_eq!(HostFamily::current(), expected);
        assert_eq!(PingCommandFactory::default().host(), expected);
    }
}
