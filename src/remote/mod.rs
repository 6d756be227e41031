//! Remote command execution over the system `ssh` client.
//!
//! Freshly created hosts have no prior host key, so the shell deliberately
//! relaxes host-key verification and points the known-hosts file at
//! `/dev/null`; BatchMode keeps the client from ever prompting.

use std::ffi::OsString;
use std::net::IpAddr;

use ortho_config::OrthoConfig;
use serde::Deserialize;

mod payload;
mod types;

pub use payload::{STACK_DIR, deployment_script};
pub use types::{
    CommandOutput, CommandRunner, ProcessCommandRunner, RemoteCommandOutput, RemoteError,
};

/// SSH settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "MAGICBOX_SSH")]
pub struct RemoteConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Whether to force batch mode to avoid password prompts.
    #[ortho_config(default = true)]
    pub batch_mode: bool,
    /// Whether to enforce host key checking; defaults to disabling for
    /// freshly created hosts.
    #[ortho_config(default = false)]
    pub strict_host_key_checking: bool,
    /// Known hosts file override; defaults to `/dev/null` for fresh hosts.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub known_hosts_file: String,
    /// Path to the SSH private key for the bootstrap identity. Supports
    /// tilde expansion (`~/.ssh/id_ed25519`). Optional; when not provided,
    /// SSH falls back to default key locations.
    pub identity_file: Option<String>,
    /// Per-attempt connection timeout in seconds.
    #[ortho_config(default = 5)]
    pub connect_timeout_secs: u64,
}

impl RemoteConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidConfig`] when the merge fails; the merge
    /// error text is carried in the field description.
    pub fn load_without_cli_args() -> Result<Self, RemoteError> {
        Self::load_from_iter([std::ffi::OsString::from("provision")]).map_err(|err| {
            RemoteError::InvalidConfig {
                field: err.to_string(),
            }
        })
    }

    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidConfig`] when any required field is
    /// empty.
    pub fn validate(&self) -> Result<(), RemoteError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.known_hosts_file, "known_hosts_file")?;
        Self::require_optional_value(self.identity_file.as_deref(), "identity_file")?;
        Ok(())
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), RemoteError> {
        match value {
            None => Ok(()),
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(RemoteError::InvalidConfig {
                field: field.to_owned(),
            }),
        }
    }

    fn require_value(value: &str, field: &str) -> Result<(), RemoteError> {
        Self::require_optional_value(Some(value), field)
    }
}

/// Executes single commands on a remote host through the system `ssh`
/// client.
#[derive(Clone, Debug)]
pub struct RemoteShell<R: CommandRunner> {
    config: RemoteConfig,
    runner: R,
}

impl RemoteShell<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidConfig`] when validation fails.
    pub fn with_process_runner(config: RemoteConfig) -> Result<Self, RemoteError> {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> RemoteShell<R> {
    /// Creates a new shell using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidConfig`] when configuration validation
    /// fails.
    pub fn new(config: RemoteConfig, runner: R) -> Result<Self, RemoteError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Executes `command` on `host` as `user` and returns the remote exit
    /// status and captured output.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Spawn`] when the SSH client cannot be started.
    /// A non-zero remote exit is reported through the output, not as an
    /// error; callers decide what it means.
    ///
    /// # Security
    ///
    /// `command` is passed verbatim to the SSH client; callers must escape
    /// any untrusted values before invoking this method.
    pub fn run(
        &self,
        user: &str,
        host: IpAddr,
        command: &str,
    ) -> Result<RemoteCommandOutput, RemoteError> {
        let args = self.build_ssh_args(user, host, command);
        let output = self.runner.run(&self.config.ssh_bin, &args)?;

        Ok(RemoteCommandOutput {
            exit_code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn build_ssh_args(&self, user: &str, host: IpAddr, command: &str) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-o"),
            OsString::from(format!(
                "ConnectTimeout={}",
                self.config.connect_timeout_secs
            )),
        ];

        if self.config.batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }

        if !self.config.strict_host_key_checking {
            args.push(OsString::from("-o"));
            args.push(OsString::from("StrictHostKeyChecking=no"));
        }

        if !self.config.known_hosts_file.trim().is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!(
                "UserKnownHostsFile={}",
                self.config.known_hosts_file
            )));
        }

        if let Some(ref identity_file) = self.config.identity_file {
            args.push(OsString::from("-i"));
            args.push(OsString::from(expand_tilde(identity_file)));
        }

        args.push(OsString::from(format!("{user}@{host}")));
        args.push(OsString::from(command));
        args
    }
}

/// Expands a leading `~/` prefix to the user's home directory.
///
/// If the `HOME` environment variable is not set, the input is returned
/// unchanged.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::net::IpAddr;
    use std::str::FromStr;
    use std::sync::Mutex;

    use super::types::{CommandOutput, CommandRunner, RemoteError};
    use super::{RemoteConfig, RemoteShell, expand_tilde};

    fn config() -> RemoteConfig {
        RemoteConfig {
            ssh_bin: String::from("ssh"),
            batch_mode: true,
            strict_host_key_checking: false,
            known_hosts_file: String::from("/dev/null"),
            identity_file: None,
            connect_timeout_secs: 5,
        }
    }

    struct RecordingRunner {
        invocations: Mutex<Vec<(String, Vec<OsString>)>>,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, RemoteError> {
            self.invocations
                .lock()
                .expect("runner mutex")
                .push((program.to_owned(), args.to_vec()));
            Ok(CommandOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    #[test]
    fn builds_hardened_ssh_invocation() {
        let runner = RecordingRunner {
            invocations: Mutex::new(Vec::new()),
        };
        let shell = RemoteShell::new(config(), runner).expect("config should validate");
        let host = IpAddr::from_str("203.0.113.5").expect("fixture ip");

        let output = shell
            .run("root", host, "test -f /var/lib/cloud/instance/boot-finished")
            .expect("run should succeed");
        assert!(output.is_success());

        let invocations = shell.runner.invocations.lock().expect("runner mutex");
        let (program, args) = invocations.first().expect("one invocation");
        assert_eq!(program, "ssh");
        let rendered: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert!(rendered.contains(&String::from("ConnectTimeout=5")));
        assert!(rendered.contains(&String::from("BatchMode=yes")));
        assert!(rendered.contains(&String::from("StrictHostKeyChecking=no")));
        assert!(rendered.contains(&String::from("UserKnownHostsFile=/dev/null")));
        assert_eq!(
            rendered.last(),
            Some(&String::from(
                "test -f /var/lib/cloud/instance/boot-finished"
            ))
        );
        assert!(rendered.contains(&String::from("root@203.0.113.5")));
    }

    #[test]
    fn rejects_blank_identity_file() {
        let mut cfg = config();
        cfg.identity_file = Some(String::from("  "));
        let err = cfg.validate().expect_err("blank identity should fail");
        assert!(matches!(err, RemoteError::InvalidConfig { ref field } if field == "identity_file"));
    }

    #[test]
    fn expands_home_prefix() {
        let home = std::env::var("HOME").expect("HOME should be set in tests");
        assert_eq!(
            expand_tilde("~/.ssh/id_ed25519"),
            format!("{home}/.ssh/id_ed25519")
        );
        assert_eq!(expand_tilde("/absolute/path"), "/absolute/path");
    }
}
