//! Remote lifecycle control for the container hosting the generation backend.
//!
//! Each call opens one SSH session by spawning the system `ssh` client and
//! runs `docker <action> <container>` on the remote host.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info, warn};

use roils_core::{defaults, Error, LifecycleConfig, LifecycleController, Result};

/// Docker action run against the backend container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
}

impl ContainerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            _ => Err(Error::InvalidInput(format!("unknown container action: {}", s))),
        }
    }
}

/// Restarts the backend container over SSH.
#[derive(Debug, Clone)]
pub struct SshLifecycleController {
    host: String,
    username: String,
    password: Option<String>,
    identity_file: Option<PathBuf>,
    container: String,
    settle: Duration,
    command_timeout: Duration,
    ssh_program: String,
}

impl SshLifecycleController {
    pub fn from_config(config: &LifecycleConfig) -> Result<Self> {
        if !is_safe_name(&config.container) {
            return Err(Error::Config(format!(
                "container name contains unsupported characters: {}",
                config.container
            )));
        }
        if !is_safe_name(&config.username) {
            return Err(Error::Config(format!(
                "invalid lifecycle username: {:?}",
                config.username
            )));
        }
        if config.host.is_empty() || config.host.starts_with('-') {
            return Err(Error::Config(format!(
                "invalid lifecycle host: {:?}",
                config.host
            )));
        }
        Ok(Self {
            host: config.host.clone(),
            username: config.username.clone(),
            password: config.password.clone().filter(|p| !p.is_empty()),
            identity_file: config.identity_file.clone(),
            container: config.container.clone(),
            settle: Duration::from_secs(config.settle_secs),
            command_timeout: Duration::from_secs(defaults::SSH_COMMAND_TIMEOUT_SECS),
            ssh_program: "ssh".to_string(),
        })
    }

    /// Replace the `ssh` executable (a wrapper script, or a stand-in for tests).
    pub fn with_ssh_program(mut self, program: impl Into<String>) -> Self {
        self.ssh_program = program.into();
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Program and arguments for one action. The password never appears here;
    /// `sshpass -e` reads it from `SSHPASS`.
    pub fn argv(&self, action: ContainerAction) -> (String, Vec<String>) {
        let mut args = vec![
            "-o".to_string(),
            format!("ConnectTimeout={}", defaults::SSH_CONNECT_TIMEOUT_SECS),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        if self.password.is_none() {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }
        if let Some(ref identity) = self.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(format!("{}@{}", self.username, self.host));
        args.push("docker".to_string());
        args.push(action.as_str().to_string());
        args.push(self.container.clone());

        if self.password.is_some() {
            let mut wrapped = vec!["-e".to_string(), self.ssh_program.clone()];
            wrapped.extend(args);
            ("sshpass".to_string(), wrapped)
        } else {
            (self.ssh_program.clone(), args)
        }
    }

    fn command(&self, action: ContainerAction) -> Command {
        let (program, args) = self.argv(action);
        let mut command = Command::new(program);
        command.kill_on_drop(true);
        command.args(args);
        if let Some(ref password) = self.password {
            command.env("SSHPASS", password);
        }
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command
    }

    /// Run one docker action on the remote host and wait for it to finish.
    pub async fn run(&self, action: ContainerAction) -> Result<()> {
        let start = Instant::now();
        let child = self.command(action).spawn().map_err(|e| {
            Error::Lifecycle(format!("failed to spawn {}: {}", self.ssh_program, e))
        })?;

        let output = tokio::time::timeout(self.command_timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::Lifecycle(format!(
                    "docker {} {} on {} timed out after {}s",
                    action,
                    self.container,
                    self.host,
                    self.command_timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::Lifecycle(format!("ssh process failed: {}", e)))?;

        if !output.status.success() {
            let status = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Lifecycle(format!(
                "docker {} {} on {} exited with status {}: {}",
                action,
                self.container,
                self.host,
                status,
                stderr.trim()
            )));
        }

        info!(
            subsystem = "lifecycle",
            component = "ssh",
            op = action.as_str(),
            host = %self.host,
            container = %self.container,
            duration_ms = start.elapsed().as_millis() as u64,
            "Container action completed"
        );
        Ok(())
    }
}

#[async_trait]
impl LifecycleController for SshLifecycleController {
    async fn restart(&self) -> Result<()> {
        if let Err(e) = self.run(ContainerAction::Restart).await {
            error!(
                subsystem = "lifecycle",
                component = "ssh",
                op = "restart",
                host = %self.host,
                container = %self.container,
                error = %e,
                "Backend restart failed"
            );
            return Err(e);
        }
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}

/// Used when no lifecycle target is configured; timeouts are only logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifecycleController;

#[async_trait]
impl LifecycleController for NoopLifecycleController {
    async fn restart(&self) -> Result<()> {
        warn!(
            subsystem = "lifecycle",
            component = "noop",
            "No lifecycle target configured; skipping backend restart"
        );
        Ok(())
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
