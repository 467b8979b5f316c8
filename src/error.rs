/// Fatal configuration errors. Any of these aborts the current command (or,
/// inside `run`, the current site) before side effects are attempted.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// `SITE_CONFIG_JSON` unset or empty
    MissingSiteConfig,
    /// site config present but not a valid JSON object of the expected shape
    InvalidSiteConfig(String),
    /// `--site` slug not found in the sites file
    SiteNotFound(String),
    SitesFileUnreadable(std::path::PathBuf, String),
    MissingDirectory(std::path::PathBuf),
    /// neither `{prefix}_SSH_PRIVATE_KEY_PATH` nor `{prefix}_SSH_PRIVATE_KEY`
    MissingSshKey(String),
    SshKeyNotFound(std::path::PathBuf),
    /// one of `{prefix}_VPS_HOST`, `_VPS_USERNAME`, `_VPS_PORT`
    MissingVpsSecret(String, &'static str),
    InvalidPort(String, String),
    MissingNotifierCredentials,
    ClientNotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ConfigError::*;
        match self {
            MissingSiteConfig => write!(f, "Site configuration not found (SITE_CONFIG_JSON)"),
            InvalidSiteConfig(msg) => write!(f, "Invalid site configuration: {}", msg),
            SiteNotFound(slug) => write!(f, "Site '{}' not found in sites file", slug),
            SitesFileUnreadable(p, msg) => {
                write!(f, "Cannot read sites file {}: {}", display_path(p), msg)
            }
            MissingDirectory(p) => write!(f, "Directory not found: {}", display_path(p)),
            MissingSshKey(prefix) => write!(
                f,
                "Missing {0}_SSH_PRIVATE_KEY_PATH or {0}_SSH_PRIVATE_KEY",
                prefix
            ),
            SshKeyNotFound(p) => write!(f, "SSH key file not found: {}", display_path(p)),
            MissingVpsSecret(prefix, field) => {
                write!(f, "Missing VPS secret {}_{}", prefix, field)
            }
            InvalidPort(prefix, raw) => write!(f, "Invalid {}_VPS_PORT: {}", prefix, raw),
            MissingNotifierCredentials => {
                write!(f, "TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID is not set")
            }
            ClientNotFound(bin) => write!(f, "'{}' not found on PATH", bin),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failures scoped to a single archive. The uploader logs these and moves on
/// to the next file.
#[derive(Debug, Clone)]
pub enum UploadError {
    RemoteMkdirFailed(String, String),
    CopyFailed(String, String),
    ExecFailed(String, String),
    /// remote script ran but exited non-zero
    RemoteScriptFailed(String, i32),
    ArchiveUnreadable(String, String),
    KeyMaterializeFailed(String),
    LedgerWriteFailed(String, String),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use UploadError::*;
        match self {
            RemoteMkdirFailed(dir, msg) => write!(f, "mkdir {} failed: {}", dir, msg),
            CopyFailed(target, msg) => write!(f, "copy to {} failed: {}", target, msg),
            ExecFailed(cmd, msg) => write!(f, "remote command '{}' failed: {}", cmd, msg),
            RemoteScriptFailed(script, code) => {
                write!(f, "remote script {} exited with code {}", script, code)
            }
            ArchiveUnreadable(name, msg) => write!(f, "cannot read archive {}: {}", name, msg),
            KeyMaterializeFailed(msg) => write!(f, "cannot write temporary SSH key: {}", msg),
            LedgerWriteFailed(p, msg) => write!(f, "cannot append ledger {}: {}", p, msg),
        }
    }
}

impl std::error::Error for UploadError {}

impl UploadError {
    /// Whether the failure stays inside one archive's processing. A failed
    /// ledger append aborts the batch.
    pub fn is_per_item(&self) -> bool {
        use UploadError::*;
        match self {
            RemoteMkdirFailed(..)
            | CopyFailed(..)
            | ExecFailed(..)
            | RemoteScriptFailed(..)
            | ArchiveUnreadable(..)
            | KeyMaterializeFailed(_) => true,
            LedgerWriteFailed(..) => false,
        }
    }
}

pub(crate) fn display_path(p: &std::path::Path) -> String {
    let s = p.to_string_lossy().to_string();
    if s.contains('\\') { s.replace('\\', "/") } else { s }
}
