use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{ExecOutput, RemoteHost, Transport, shell_quote};
use crate::error::{ConfigError, UploadError};
use crate::secrets::SshSecrets;

/// Runs the system `ssh`/`scp` clients, one process per operation.
#[derive(Debug, Clone)]
pub struct OpenSshTransport {
    pub ssh_client_app_path: PathBuf,
    pub scp_app_path: PathBuf,
}

impl OpenSshTransport {
    /// Client paths from `IMGPILOT_SSH`/`IMGPILOT_SCP` (default `ssh`/`scp`),
    /// both of which must resolve on `PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let pick = |var: &str, default: &str| -> Result<PathBuf, ConfigError> {
            let raw = std::env::var(var).ok().filter(|v| !v.trim().is_empty());
            let name = raw.unwrap_or_else(|| default.to_string());
            which::which(&name).map_err(|_| ConfigError::ClientNotFound(name.clone()))
        };
        Ok(Self {
            ssh_client_app_path: pick("IMGPILOT_SSH", "ssh")?,
            scp_app_path: pick("IMGPILOT_SCP", "scp")?,
        })
    }
}

impl Transport for OpenSshTransport {
    fn name(&self) -> &'static str {
        "openssh"
    }

    fn open(&self, secrets: &SshSecrets, key: &Path) -> Result<Box<dyn RemoteHost>, UploadError> {
        Ok(Box::new(OpenSshHost {
            ssh: self.ssh_client_app_path.clone(),
            scp: self.scp_app_path.clone(),
            target: secrets.target(),
            port: secrets.port,
            key: key.to_path_buf(),
        }))
    }
}

pub struct OpenSshHost {
    ssh: PathBuf,
    scp: PathBuf,
    target: String,
    port: u16,
    key: PathBuf,
}

impl OpenSshHost {
    fn common_opts(&self) -> Vec<String> {
        vec![
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            "BatchMode=yes".into(),
            "-i".into(),
            self.key.to_string_lossy().to_string(),
        ]
    }

    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec!["-T".to_string(), "-n".to_string()];
        args.extend(self.common_opts());
        args.push(format!("-p{}", self.port));
        args.push(self.target.clone());
        args.push(command.to_string());
        args
    }

    pub fn scp_args(&self, local: &Path, remote: &str) -> Vec<String> {
        let mut args = self.common_opts();
        args.push("-P".into());
        args.push(self.port.to_string());
        args.push(local.to_string_lossy().to_string());
        args.push(format!("{}:{}", self.target, remote));
        args
    }
}

impl RemoteHost for OpenSshHost {
    fn make_dir(&mut self, dir: &str) -> Result<(), UploadError> {
        let out = self.exec(&format!("mkdir -p {}", shell_quote(dir)))?;
        if out.success() {
            Ok(())
        } else {
            Err(UploadError::RemoteMkdirFailed(dir.to_string(), out.stderr.trim().to_string()))
        }
    }

    fn copy_file(&mut self, local: &Path, remote: &str) -> Result<(), UploadError> {
        let target = format!("{}:{}", self.target, remote);
        let output = Command::new(&self.scp)
            .args(self.scp_args(local, remote))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| UploadError::CopyFailed(target.clone(), e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(UploadError::CopyFailed(
                target,
                format!("exit {}: {}", output.status.code().unwrap_or(-1), stderr.trim()),
            ))
        }
    }

    fn exec(&mut self, command: &str) -> Result<ExecOutput, UploadError> {
        tracing::debug!("[ssh] {} {}", self.target, command);
        let output = Command::new(&self.ssh)
            .args(self.ssh_args(command))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| UploadError::ExecFailed(command.to_string(), e.to_string()))?;
        Ok(ExecOutput::from_bytes(output.status.code().unwrap_or(-1), &output.stdout, &output.stderr))
    }
}
