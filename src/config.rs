//! Settings resolved from an optional JSON file, then `APPTRACK_*`
//! environment variables, then command-line overrides. Later layers win.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::connectors::google::DEFAULT_REQUEST_TIMEOUT;
use crate::connectors::Credentials;
use crate::error::SyncError;
use crate::mail::fetch::{FetchOptions, DEFAULT_FETCH_CONCURRENCY};
use crate::mail::labels::APPS_SENT;
use crate::sheets::DEFAULT_SHEET_NAME;
use crate::sync::{QueryMode, SyncOptions};

pub const ENV_CLIENT_ID: &str = "APPTRACK_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "APPTRACK_CLIENT_SECRET";
pub const ENV_REFRESH_TOKEN: &str = "APPTRACK_REFRESH_TOKEN";
pub const ENV_ACCESS_TOKEN: &str = "APPTRACK_ACCESS_TOKEN";
pub const ENV_SHEET_NAME: &str = "APPTRACK_SHEET_NAME";
pub const ENV_TOKEN_URL: &str = "APPTRACK_TOKEN_URL";

/// Contents of `config.json`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FileConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub sheet_name: Option<String>,
    pub token_url: Option<String>,
    pub mode: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_results: Option<u32>,
    pub record_label: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub sheet_name: Option<String>,
    pub mode: Option<QueryMode>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_results: Option<u32>,
    pub record_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub token_url: Option<String>,
    pub sheet_name: String,
    pub mode: QueryMode,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub max_results: u32,
    pub record_label: String,
}

/// `$CONFIG_DIR/apptrack/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("apptrack").join("config.json"))
}

impl AppConfig {
    /// Reads the file at `path`, or the default location when `path` is
    /// `None`. An explicit path must exist; the default one may not.
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, SyncError> {
        let file = match path {
            Some(path) => read_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => FileConfig::default(),
            },
        };
        Self::from_sources(file, |key| std::env::var(key).ok(), overrides)
    }

    pub fn from_sources(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
        overrides: ConfigOverrides,
    ) -> Result<Self, SyncError> {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        let file_mode = file.mode.as_deref().map(str::parse::<QueryMode>).transpose()?;

        let client_id = env(ENV_CLIENT_ID)
            .or(file.client_id)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                SyncError::Configuration(format!("missing OAuth client id ({ENV_CLIENT_ID} or config file)"))
            })?;

        let mode = overrides.mode.or(file_mode).unwrap_or_default();
        let concurrency = overrides
            .concurrency
            .or(file.concurrency)
            .unwrap_or(DEFAULT_FETCH_CONCURRENCY);
        if concurrency == 0 {
            return Err(SyncError::Configuration("concurrency must be at least 1".to_string()));
        }

        let config = Self {
            client_id,
            client_secret: env(ENV_CLIENT_SECRET).or(file.client_secret),
            refresh_token: env(ENV_REFRESH_TOKEN).or(file.refresh_token),
            access_token: env(ENV_ACCESS_TOKEN).or(file.access_token),
            token_url: env(ENV_TOKEN_URL).or(file.token_url),
            sheet_name: overrides
                .sheet_name
                .or_else(|| env(ENV_SHEET_NAME))
                .or(file.sheet_name)
                .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
            mode,
            concurrency,
            request_timeout: overrides
                .timeout_secs
                .or(file.timeout_secs)
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs),
            max_results: overrides
                .max_results
                .or(file.max_results)
                .unwrap_or_else(|| mode.default_max_results()),
            record_label: overrides
                .record_label
                .or(file.record_label)
                .unwrap_or_else(|| APPS_SENT.to_string()),
        };
        debug!(sheet = %config.sheet_name, mode = ?config.mode, "configuration resolved");
        Ok(config)
    }

    /// A ready access token is preferred over the refresh-token grant.
    pub fn credentials(&self) -> Result<Credentials, SyncError> {
        if let Some(token) = &self.access_token {
            return Ok(Credentials::AccessToken(token.clone()));
        }
        match (&self.client_secret, &self.refresh_token) {
            (Some(client_secret), Some(refresh_token)) => Ok(Credentials::RefreshToken {
                client_id: self.client_id.clone(),
                client_secret: client_secret.clone(),
                refresh_token: refresh_token.clone(),
            }),
            _ => Err(SyncError::Configuration(format!(
                "no Google credentials: set {ENV_ACCESS_TOKEN}, or {ENV_CLIENT_SECRET} and {ENV_REFRESH_TOKEN}"
            ))),
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            sheet_name: self.sheet_name.clone(),
            mode: self.mode,
            fetch: FetchOptions {
                max_results: self.max_results,
                concurrency: self.concurrency,
            },
            record_label: self.record_label.clone(),
        }
    }
}

fn read_file(path: &Path) -> Result<FileConfig, SyncError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        SyncError::Configuration(format!("read config file {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        SyncError::Configuration(format!("parse config file {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use uuid::Uuid;

    use super::{
        AppConfig, ConfigOverrides, FileConfig, ENV_ACCESS_TOKEN, ENV_CLIENT_ID,
        ENV_CLIENT_SECRET, ENV_REFRESH_TOKEN, ENV_SHEET_NAME,
    };
    use crate::connectors::Credentials;
    use crate::error::SyncError;
    use crate::sync::QueryMode;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_client_id_is_a_configuration_error() {
        let result = AppConfig::from_sources(FileConfig::default(), env(&[]), ConfigOverrides::default());
        assert!(matches!(result, Err(SyncError::Configuration(_))));

        let blank = AppConfig::from_sources(
            FileConfig::default(),
            env(&[(ENV_CLIENT_ID, "   ")]),
            ConfigOverrides::default(),
        );
        assert!(matches!(blank, Err(SyncError::Configuration(_))));
    }

    #[test]
    fn defaults_apply_when_only_client_id_is_set() {
        let config = AppConfig::from_sources(
            FileConfig::default(),
            env(&[(ENV_CLIENT_ID, "client-1")]),
            ConfigOverrides::default(),
        )
        .expect("resolve config");

        assert_eq!(config.sheet_name, "job-apps-organizer");
        assert_eq!(config.mode, QueryMode::PerLabel);
        assert_eq!(config.concurrency, 16);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_results, 1000);
        assert_eq!(config.record_label, "apps-sent");
    }

    #[test]
    fn later_layers_win() {
        let file = FileConfig {
            client_id: Some("from-file".to_string()),
            sheet_name: Some("file-sheet".to_string()),
            mode: Some("combined".to_string()),
            concurrency: Some(4),
            ..FileConfig::default()
        };
        let config = AppConfig::from_sources(
            file,
            env(&[(ENV_CLIENT_ID, "from-env"), (ENV_SHEET_NAME, "env-sheet")]),
            ConfigOverrides {
                sheet_name: Some("flag-sheet".to_string()),
                ..ConfigOverrides::default()
            },
        )
        .expect("resolve config");

        assert_eq!(config.client_id, "from-env");
        assert_eq!(config.sheet_name, "flag-sheet");
        assert_eq!(config.mode, QueryMode::Combined);
        assert_eq!(config.max_results, 5000);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn bad_mode_or_zero_concurrency_is_rejected() {
        let bad_mode = FileConfig {
            client_id: Some("c".to_string()),
            mode: Some("sometimes".to_string()),
            ..FileConfig::default()
        };
        assert!(AppConfig::from_sources(bad_mode, env(&[]), ConfigOverrides::default()).is_err());

        let zero = ConfigOverrides {
            concurrency: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(AppConfig::from_sources(FileConfig::default(), env(&[(ENV_CLIENT_ID, "c")]), zero).is_err());
    }

    #[test]
    fn credentials_prefer_access_token_then_refresh_grant() {
        let with_token = AppConfig::from_sources(
            FileConfig::default(),
            env(&[(ENV_CLIENT_ID, "c"), (ENV_ACCESS_TOKEN, "ya29.token"), (ENV_REFRESH_TOKEN, "r")]),
            ConfigOverrides::default(),
        )
        .expect("resolve config");
        assert_eq!(
            with_token.credentials().expect("credentials"),
            Credentials::AccessToken("ya29.token".to_string())
        );

        let with_refresh = AppConfig::from_sources(
            FileConfig::default(),
            env(&[(ENV_CLIENT_ID, "c"), (ENV_CLIENT_SECRET, "s"), (ENV_REFRESH_TOKEN, "r")]),
            ConfigOverrides::default(),
        )
        .expect("resolve config");
        assert_eq!(
            with_refresh.credentials().expect("credentials"),
            Credentials::RefreshToken {
                client_id: "c".to_string(),
                client_secret: "s".to_string(),
                refresh_token: "r".to_string(),
            }
        );

        let without = AppConfig::from_sources(
            FileConfig::default(),
            env(&[(ENV_CLIENT_ID, "c")]),
            ConfigOverrides::default(),
        )
        .expect("resolve config");
        assert!(matches!(without.credentials(), Err(SyncError::Configuration(_))));
    }

    #[test]
    fn load_reads_an_explicit_file() {
        let dir = std::env::temp_dir().join(format!("apptrack-config-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            r#"{"client_id": "file-client", "sheet_name": "Applications", "timeout_secs": 5}"#,
        )
        .expect("write config");

        let file = super::read_file(&path).expect("read config");
        assert_eq!(file.client_id.as_deref(), Some("file-client"));
        assert_eq!(file.timeout_secs, Some(5));

        let missing = super::read_file(&dir.join("absent.json"));
        assert!(matches!(missing, Err(SyncError::Configuration(_))));

        std::fs::remove_dir_all(&dir).expect("remove temp dir");
    }
}
