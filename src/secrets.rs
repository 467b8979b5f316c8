use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::{EnvSource, expand_home};
use crate::error::{ConfigError, UploadError};

/// Where the private key comes from.
#[derive(Debug, Clone)]
pub enum KeySource {
    Path(PathBuf),
    /// raw key text from `{prefix}_SSH_PRIVATE_KEY`
    Inline(String),
}

/// Connection material for one VPS, resolved from `{prefix}_*` variables.
#[derive(Debug, Clone)]
pub struct SshSecrets {
    pub host: String,
    pub username: String,
    pub port: u16,
    pub key: KeySource,
}

impl SshSecrets {
    pub fn resolve(prefix: &str, env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let key = match env.non_empty(&format!("{}_SSH_PRIVATE_KEY_PATH", prefix)) {
            Some(raw) => {
                let p = expand_home(raw.trim());
                if !p.exists() {
                    return Err(ConfigError::SshKeyNotFound(p));
                }
                KeySource::Path(p)
            }
            None => {
                tracing::debug!("{}_SSH_PRIVATE_KEY_PATH unset, trying inline key", prefix);
                let content = env
                    .non_empty(&format!("{}_SSH_PRIVATE_KEY", prefix))
                    .ok_or_else(|| ConfigError::MissingSshKey(prefix.to_string()))?;
                KeySource::Inline(content)
            }
        };

        let field = |name: &'static str| {
            env.non_empty(&format!("{}_{}", prefix, name))
                .map(|v| v.trim().to_string())
                .ok_or_else(|| ConfigError::MissingVpsSecret(prefix.to_string(), name))
        };
        let host = field("VPS_HOST")?;
        let username = field("VPS_USERNAME")?;
        let raw_port = field("VPS_PORT")?;
        let port = raw_port
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(prefix.to_string(), raw_port.clone()))?;

        Ok(Self { host, username, port, key })
    }

    /// Produce a key file usable by ssh clients. Inline keys are written to a
    /// fresh owner-only temp file which is removed when the handle drops.
    pub fn materialize_key(&self) -> Result<KeyFile, UploadError> {
        match &self.key {
            KeySource::Path(p) => Ok(KeyFile::Existing(p.clone())),
            KeySource::Inline(content) => {
                let mut tmp = tempfile::Builder::new()
                    .prefix("ssh_key_")
                    .tempfile()
                    .map_err(|e| UploadError::KeyMaterializeFailed(e.to_string()))?;
                let mut body = content.replace('\r', "");
                if !body.ends_with('\n') {
                    body.push('\n');
                }
                tmp.write_all(body.as_bytes())
                    .and_then(|_| tmp.flush())
                    .map_err(|e| UploadError::KeyMaterializeFailed(e.to_string()))?;
                Ok(KeyFile::Temporary(tmp))
            }
        }
    }

    pub fn target(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

/// A private key on disk for the duration of one archive's processing.
pub enum KeyFile {
    Existing(PathBuf),
    Temporary(tempfile::NamedTempFile),
}

impl KeyFile {
    pub fn path(&self) -> &Path {
        match self {
            KeyFile::Existing(p) => p.as_path(),
            KeyFile::Temporary(t) => t.path(),
        }
    }
}
