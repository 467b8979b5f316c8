use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use super::{ExecOutput, RemoteHost, Transport};
use crate::error::UploadError;
use crate::secrets::SshSecrets;

/// In-process libssh2 transport: one session per archive, SFTP for copies.
#[derive(Debug, Clone)]
pub struct Ssh2Transport {
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

impl Default for Ssh2Transport {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(10), io_timeout: Duration::from_secs(30) }
    }
}

impl Ssh2Transport {
    /// Resolve `addr` and connect with the configured timeouts.
    fn create_tcp_connection(&self, addr: &str) -> Result<TcpStream, UploadError> {
        let fail = |msg: String| UploadError::ExecFailed(format!("connect {}", addr), msg);
        let mut addrs = addr.to_socket_addrs().map_err(|e| fail(e.to_string()))?;
        let sock = addrs.next().ok_or_else(|| fail("no address".to_string()))?;
        let tcp =
            TcpStream::connect_timeout(&sock, self.connect_timeout).map_err(|e| fail(e.to_string()))?;
        let _ = tcp.set_read_timeout(Some(self.io_timeout));
        let _ = tcp.set_write_timeout(Some(self.io_timeout));
        Ok(tcp)
    }

    pub fn connect_session(
        &self,
        secrets: &SshSecrets,
        key: &Path,
    ) -> Result<ssh2::Session, UploadError> {
        let addr = format!("{}:{}", secrets.host, secrets.port);
        let fail = |msg: String| UploadError::ExecFailed(format!("connect {}", addr), msg);
        let tcp = self.create_tcp_connection(&addr)?;
        let mut sess = ssh2::Session::new().map_err(|e| fail(e.to_string()))?;
        sess.set_tcp_stream(tcp);
        sess.handshake().map_err(|e| fail(format!("handshake: {}", e)))?;
        sess.userauth_pubkey_file(&secrets.username, None, key, None)
            .map_err(|e| fail(format!("auth: {}", e)))?;
        if !sess.authenticated() {
            return Err(fail("authentication rejected".to_string()));
        }
        Ok(sess)
    }
}

impl Transport for Ssh2Transport {
    fn name(&self) -> &'static str {
        "ssh2"
    }

    fn open(&self, secrets: &SshSecrets, key: &Path) -> Result<Box<dyn RemoteHost>, UploadError> {
        let sess = self.connect_session(secrets, key)?;
        tracing::debug!("[ssh2] session established to {}", secrets.target());
        Ok(Box::new(Ssh2Host { sess }))
    }
}

pub struct Ssh2Host {
    sess: ssh2::Session,
}

impl RemoteHost for Ssh2Host {
    fn make_dir(&mut self, dir: &str) -> Result<(), UploadError> {
        let out = self.exec(&format!("mkdir -p {}", super::shell_quote(dir)))?;
        if out.success() {
            Ok(())
        } else {
            Err(UploadError::RemoteMkdirFailed(dir.to_string(), out.stderr.trim().to_string()))
        }
    }

    fn copy_file(&mut self, local: &Path, remote: &str) -> Result<(), UploadError> {
        let fail = |e: &dyn std::fmt::Display| UploadError::CopyFailed(remote.to_string(), e.to_string());
        let sftp = self.sess.sftp().map_err(|e| fail(&e))?;
        let mut src = std::fs::File::open(local).map_err(|e| fail(&e))?;
        let mut dst = sftp.create(Path::new(remote)).map_err(|e| fail(&e))?;
        std::io::copy(&mut src, &mut dst).map_err(|e| fail(&e))?;
        Ok(())
    }

    fn exec(&mut self, command: &str) -> Result<ExecOutput, UploadError> {
        let fail = |e: ssh2::Error| UploadError::ExecFailed(command.to_string(), e.to_string());
        let mut channel = self.sess.channel_session().map_err(fail)?;
        channel.exec(command).map_err(fail)?;
        let read_fail = |e: std::io::Error| UploadError::ExecFailed(command.to_string(), e.to_string());
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        channel.read_to_end(&mut stdout).map_err(read_fail)?;
        channel.stderr().read_to_end(&mut stderr).map_err(read_fail)?;
        channel.wait_close().map_err(fail)?;
        let status = channel.exit_status().unwrap_or(-1);
        Ok(ExecOutput::from_bytes(status, &stdout, &stderr))
    }
}
