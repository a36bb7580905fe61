use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use super::service_url::derive_service_url;

pub const DB_FILE_NAME: &str = "batchjob.db";

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default)]
    pub jupyterhub_api_url: Option<String>,
    #[serde(default)]
    pub batch_service_url: Option<String>,
    #[serde(default = "default_batch_service_port")]
    pub batch_service_port: u16,
    #[serde(default = "default_batch_service_prefix")]
    pub batch_service_prefix: String,
    #[serde(default)]
    pub jupyterlab_batch_dryrun: Option<String>,
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
    #[serde(default = "default_server_root_dir")]
    pub server_root_dir: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_batch_service_port() -> u16 {
    12345
}

fn default_batch_service_prefix() -> String {
    "/services/batch".to_string()
}

fn default_auth_token_env() -> String {
    "JUPYTERHUB_API_TOKEN".to_string()
}

fn default_server_root_dir() -> String {
    ".".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_http_port() -> u16 {
    8888
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jupyterhub_api_url: None,
            batch_service_url: None,
            batch_service_port: default_batch_service_port(),
            batch_service_prefix: default_batch_service_prefix(),
            jupyterlab_batch_dryrun: None,
            auth_token_env: default_auth_token_env(),
            server_root_dir: default_server_root_dir(),
            data_dir: default_data_dir(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout_secs(),
            api_key: None,
        }
    }
}

impl AppConfig {
    /// Base URL of the batch service, if one can be determined.
    ///
    /// An explicit `batch_service_url` wins; otherwise the scheme and host of
    /// the hub URL are combined with the service port and prefix.
    pub fn service_base_url(&self) -> Result<Option<Url>, url::ParseError> {
        if let Some(explicit) = non_empty(self.batch_service_url.as_deref()) {
            return Url::parse(explicit).map(Some);
        }

        match non_empty(self.jupyterhub_api_url.as_deref()) {
            Some(hub) => derive_service_url(hub, self.batch_service_port, &self.batch_service_prefix)
                .map(Some),
            None => Ok(None),
        }
    }

    pub fn dry_run_forced(&self) -> bool {
        non_empty(self.jupyterlab_batch_dryrun.as_deref()).is_some()
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE_NAME)
    }

    pub fn server_root(&self) -> PathBuf {
        PathBuf::from(&self.server_root_dir)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_hub_url_means_no_service() {
        let config = AppConfig::default();
        assert_eq!(config.service_base_url().expect("parse"), None);
        assert!(!config.dry_run_forced());
    }

    #[test]
    fn service_url_is_derived_from_hub_host() {
        let config = AppConfig {
            jupyterhub_api_url: Some("http://hub.internal:8081/hub/api".into()),
            ..Default::default()
        };

        let url = config.service_base_url().expect("parse").expect("present");
        assert_eq!(url.as_str(), "http://hub.internal:12345/services/batch");
    }

    #[test]
    fn explicit_service_url_takes_precedence() {
        let config = AppConfig {
            jupyterhub_api_url: Some("http://hub.internal:8081/hub/api".into()),
            batch_service_url: Some("http://127.0.0.1:9000/batch".into()),
            ..Default::default()
        };

        let url = config.service_base_url().expect("parse").expect("present");
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/batch");
    }

    #[test]
    fn any_non_empty_flag_forces_dry_run() {
        let config = AppConfig {
            jupyterlab_batch_dryrun: Some("yes".into()),
            ..Default::default()
        };
        assert!(config.dry_run_forced());

        let blank = AppConfig {
            jupyterlab_batch_dryrun: Some("  ".into()),
            ..Default::default()
        };
        assert!(!blank.dry_run_forced());
    }

    #[test]
    fn db_lives_in_data_dir() {
        let config = AppConfig {
            data_dir: "/var/lib/batch".into(),
            ..Default::default()
        };
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/batch/batchjob.db"));
    }
}
