use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CUMULATIVE_LOG: &str = "upload.log";
pub const REPORT_SUFFIX: &str = "_report.txt";
pub const LEDGER_PREFIX: &str = "uploaded_files_";
pub const DEFAULT_SITES_FILE: &str = "config.json";
pub const DEFAULT_IMAGE_PATH: &str = "../ktbproject/ktbimage";
pub const ARCHIVE_SUBDIR: &str = "OutputImage";
pub const DEFAULT_WEB_USER: &str = "nginx";
pub const DEFAULT_WP_CLI: &str = "/usr/local/bin/wp";

pub fn ledger_file_name(slug: &str) -> String {
    format!("{}{}.log", LEDGER_PREFIX, slug)
}

pub fn report_file_name(slug: &str) -> String {
    format!("{}{}", slug, REPORT_SUFFIX)
}

/// Source of environment variables. The process environment in production,
/// a map in tests.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;

    /// Like `var`, but blank values count as unset.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.trim().is_empty())
    }
}

pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// One target WordPress install and the archive-name prefix it owns.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub slug: String,
    pub prefix: String,
    pub vps_secret_prefix: String,
    pub wp_path: String,
    pub wp_author: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub web_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub wp_cli: Option<String>,
}

impl SiteConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let site: SiteConfig = serde_json::from_str(raw)
            .map_err(|e| ConfigError::InvalidSiteConfig(e.to_string()))?;
        site.validate()?;
        Ok(site)
    }

    pub fn from_env(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let raw = env.non_empty("SITE_CONFIG_JSON").ok_or(ConfigError::MissingSiteConfig)?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("slug", &self.slug),
            ("prefix", &self.prefix),
            ("vps_secret_prefix", &self.vps_secret_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidSiteConfig(format!("'{}' is empty", name)));
            }
        }
        Ok(())
    }

    pub fn web_user(&self) -> &str {
        self.web_user.as_deref().unwrap_or(DEFAULT_WEB_USER)
    }

    pub fn wp_cli(&self) -> &str {
        self.wp_cli.as_deref().unwrap_or(DEFAULT_WP_CLI)
    }
}

/// The multi-site file consumed by `run` and `prepare`.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct SitesFile {
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
    #[serde(default)]
    pub default_user_author: Option<String>,
}

impl SitesFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file: SitesFile = read_json(path)?;
        for site in &file.sites {
            site.validate()?;
        }
        Ok(file)
    }

    pub fn find(&self, slug: &str) -> Result<&SiteConfig, ConfigError> {
        self.sites
            .iter()
            .find(|s| s.slug == slug)
            .ok_or_else(|| ConfigError::SiteNotFound(slug.to_string()))
    }

    pub fn author(&self) -> &str {
        self.default_user_author.as_deref().unwrap_or("unknown")
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::SitesFileUnreadable(path.to_path_buf(), e.to_string()))?;
    serde_json::from_str(&raw)
        .map_err(|e| ConfigError::SitesFileUnreadable(path.to_path_buf(), e.to_string()))
}

/// `{KTB_IMAGE_PATH}/OutputImage`, the directory holding candidate archives.
pub fn archive_dir(env: &dyn EnvSource) -> PathBuf {
    image_root(env).join(ARCHIVE_SUBDIR)
}

pub fn image_root(env: &dyn EnvSource) -> PathBuf {
    env.non_empty("KTB_IMAGE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_PATH))
}

/// Expand a leading `~` against the home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix('~')
        && let Some(home) = dirs::home_dir()
    {
        let tail = rest.trim_start_matches(['/', '\\']);
        return if tail.is_empty() { home } else { home.join(tail) };
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = r#"{"slug":"ktbtee","prefix":"KTB","vps_secret_prefix":"KTBTEE","wp_path":"/var/www/ktb","wp_author":"bot"}"#;

    fn env_of(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn site_from_env() {
        let env = env_of(&[("SITE_CONFIG_JSON", SITE)]);
        let site = SiteConfig::from_env(&env).unwrap();
        assert_eq!(site.slug, "ktbtee");
        assert_eq!(site.web_user(), "nginx");
        assert_eq!(site.wp_cli(), "/usr/local/bin/wp");
    }

    #[test]
    fn site_missing_or_blank_is_fatal() {
        let env = env_of(&[]);
        assert!(matches!(SiteConfig::from_env(&env), Err(ConfigError::MissingSiteConfig)));
        let env = env_of(&[("SITE_CONFIG_JSON", "  ")]);
        assert!(matches!(SiteConfig::from_env(&env), Err(ConfigError::MissingSiteConfig)));
    }

    #[test]
    fn site_with_empty_prefix_rejected() {
        let raw = SITE.replace("\"KTB\"", "\"\"");
        assert!(matches!(SiteConfig::from_json(&raw), Err(ConfigError::InvalidSiteConfig(_))));
        assert!(matches!(SiteConfig::from_json("null"), Err(ConfigError::InvalidSiteConfig(_))));
    }

    #[test]
    fn archive_dir_defaults() {
        let env = env_of(&[]);
        assert_eq!(archive_dir(&env), PathBuf::from("../ktbproject/ktbimage/OutputImage"));
        let env = env_of(&[("KTB_IMAGE_PATH", "/data/img")]);
        assert_eq!(archive_dir(&env), PathBuf::from("/data/img/OutputImage"));
    }

    #[test]
    fn file_names() {
        assert_eq!(ledger_file_name("ktbtee"), "uploaded_files_ktbtee.log");
        assert_eq!(report_file_name("ktbtee"), "ktbtee_report.txt");
    }

    #[test]
    fn sites_file_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, format!(r#"{{"sites":[{}],"default_user_author":"khue"}}"#, SITE))
            .unwrap();
        let file = SitesFile::load(&path).unwrap();
        assert_eq!(file.author(), "khue");
        assert!(file.find("ktbtee").is_ok());
        assert!(matches!(file.find("nope"), Err(ConfigError::SiteNotFound(_))));
    }
}
