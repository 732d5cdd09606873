//! Running commands on cluster hosts
//!
//! Every remote action goes through the [`Remote`] trait. [`SshRemote`] drives
//! the system `ssh`/`scp` binaries; a target without a host runs locally.

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::{Command, Output, Stdio};

use crate::config::AppConfig;
use crate::hosts::SshConfig;

/// How commands are wrapped before they run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    pub engine: String,
    pub sudo: bool,
    pub sudo_alias: String,
    /// Seconds; 0 disables the `timeout` wrapper
    pub timeout: u64,
    pub connect_timeout: u64,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ExecOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            engine: config.engine.clone(),
            sudo: config.sudo,
            sudo_alias: config.sudo_alias.clone(),
            timeout: config.command_timeout,
            connect_timeout: config.connect_timeout,
        }
    }
}

impl ExecOptions {
    /// Apply the sudo and timeout wrappers
    pub fn wrap(&self, command: &str) -> String {
        let mut wrapped = command.to_string();
        if self.timeout > 0 {
            wrapped = format!("timeout {} {}", self.timeout, wrapped);
        }
        if self.sudo && !self.sudo_alias.is_empty() {
            wrapped = format!("{} {}", self.sudo_alias, wrapped);
        }
        wrapped
    }
}

/// Remote execution primitive
pub trait Remote: Send + Sync {
    /// Run a shell command, returning trimmed stdout
    fn execute(&self, host: Option<&SshConfig>, command: &str, options: &ExecOptions)
    -> Result<String>;

    fn upload(&self, host: Option<&SshConfig>, local: &Path, remote: &str, options: &ExecOptions)
    -> Result<()>;

    fn download(
        &self,
        host: Option<&SshConfig>,
        remote: &str,
        local: &Path,
        options: &ExecOptions,
    ) -> Result<()>;
}

/// Quote a string for a POSIX shell
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@%+".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SshRemote;

impl SshRemote {
    fn ssh_args(ssh: &SshConfig, options: &ExecOptions) -> Vec<String> {
        vec![
            "-p".to_string(),
            ssh.port.to_string(),
            "-i".to_string(),
            ssh.private_key.display().to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", options.connect_timeout),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ]
    }

    fn scp_args(ssh: &SshConfig, options: &ExecOptions) -> Vec<String> {
        // scp takes the port as -P
        let mut args = Self::ssh_args(ssh, options);
        args[0] = "-P".to_string();
        args
    }

    fn destination(ssh: &SshConfig) -> String {
        format!("{}@{}", ssh.user, ssh.hostname)
    }
}

fn check(output: Output, what: &str) -> Result<String> {
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detail = if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    };
    match output.status.code() {
        Some(124) => bail!("{what}: timed out"),
        Some(code) => bail!("{what}: exit code {code}: {detail}"),
        None => bail!("{what}: terminated by signal: {detail}"),
    }
}

impl Remote for SshRemote {
    fn execute(
        &self,
        host: Option<&SshConfig>,
        command: &str,
        options: &ExecOptions,
    ) -> Result<String> {
        let wrapped = options.wrap(command);
        let output = match host {
            None => {
                log::debug!("local: {wrapped}");
                Command::new("bash")
                    .args(["-c", &wrapped])
                    .stdin(Stdio::null())
                    .output()
                    .context("Failed to execute bash")?
            }
            Some(ssh) => {
                let remote_cmd = match &ssh.become_user {
                    Some(user) => format!("sudo -iu {} bash -c {}", user, shell_quote(&wrapped)),
                    None => wrapped,
                };
                log::debug!("{}: {remote_cmd}", ssh.hostname);
                Command::new("ssh")
                    .args(Self::ssh_args(ssh, options))
                    .arg(Self::destination(ssh))
                    .arg(&remote_cmd)
                    .stdin(Stdio::null())
                    .output()
                    .context("Failed to execute ssh")?
            }
        };
        check(output, command)
    }

    fn upload(
        &self,
        host: Option<&SshConfig>,
        local: &Path,
        remote: &str,
        options: &ExecOptions,
    ) -> Result<()> {
        match host {
            None => {
                std::fs::copy(local, remote)
                    .with_context(|| format!("Failed to copy {} to {remote}", local.display()))?;
            }
            Some(ssh) => {
                log::debug!("upload {} -> {}:{remote}", local.display(), ssh.hostname);
                let output = Command::new("scp")
                    .args(Self::scp_args(ssh, options))
                    .arg(local)
                    .arg(format!("{}:{remote}", Self::destination(ssh)))
                    .output()
                    .context("Failed to execute scp")?;
                check(output, "scp upload")?;
            }
        }
        Ok(())
    }

    fn download(
        &self,
        host: Option<&SshConfig>,
        remote: &str,
        local: &Path,
        options: &ExecOptions,
    ) -> Result<()> {
        match host {
            None => {
                std::fs::copy(remote, local)
                    .with_context(|| format!("Failed to copy {remote} to {}", local.display()))?;
            }
            Some(ssh) => {
                log::debug!("download {}:{remote} -> {}", ssh.hostname, local.display());
                let output = Command::new("scp")
                    .args(Self::scp_args(ssh, options))
                    .arg(format!("{}:{remote}", Self::destination(ssh)))
                    .arg(local)
                    .output()
                    .context("Failed to execute scp")?;
                check(output, "scp download")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Test double
// ============================================================================
