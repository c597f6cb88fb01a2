use crate::error::ConfigError;
use crate::models::{AdminEmail, CollectionPath};
use config::{Config as Cfg, File};
use secrecy::Secret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Settings shared by every binary that embeds the site client.
#[derive(Debug, Deserialize, Clone)]
pub struct CoreConfig {
    pub site: SiteSettings,
    pub backend: BackendSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteSettings {
    /// Address whose credentialed session unlocks the admin panel.
    pub admin_email: String,
    /// Namespace of the public post collection.
    #[serde(default = "default_app_id")]
    pub app_id: String,
    /// Sign in anonymously at startup when no session is restorable.
    #[serde(default = "default_true")]
    pub auto_anonymous: bool,
    /// Custom token tried once at startup before falling back to anonymous sign-in.
    #[serde(default)]
    pub initial_token: Option<Secret<String>>,
    /// Third-party endpoint the contact form posts to.
    #[serde(default)]
    pub contact_relay_url: Option<String>,
}

fn default_app_id() -> String {
    "default-app-id".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendSettings {
    Memory(MemoryBackendSettings),
    Firebase(FirebaseSettings),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MemoryBackendSettings {
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedAccount {
    pub email: String,
    pub password: Secret<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FirebaseSettings {
    pub api_key: Secret<String>,
    pub project_id: String,
    #[serde(default = "default_identity_url")]
    pub identity_url: String,
    #[serde(default = "default_firestore_url")]
    pub firestore_url: String,
    /// Secure Token endpoint that exchanges refresh tokens for new id tokens.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// How often the collection listener re-reads the collection.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_identity_url() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_firestore_url() -> String {
    "https://firestore.googleapis.com".to_string()
}

fn default_token_url() -> String {
    "https://securetoken.googleapis.com".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CoreConfig {
    pub fn admin_email(&self) -> Result<AdminEmail, ConfigError> {
        AdminEmail::parse(&self.site.admin_email).ok_or_else(|| {
            ConfigError::Invalid("site.admin_email must be a non-empty email address".to_string())
        })
    }

    pub fn collection_path(&self) -> CollectionPath {
        CollectionPath::public_posts(&self.site.app_id)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.admin_email()?;

        if self.site.app_id.trim().is_empty() || self.site.app_id.contains('/') {
            return Err(ConfigError::Invalid(
                "site.app_id must be a single non-empty path segment".to_string(),
            ));
        }

        if let BackendSettings::Firebase(firebase) = &self.backend {
            if firebase.project_id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "backend.project_id is required for the firebase backend".to_string(),
                ));
            }
            if firebase.poll_interval_ms == 0 {
                return Err(ConfigError::Invalid(
                    "backend.poll_interval_ms must be greater than zero".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Loads `base.yaml` (required) and `local.yaml` (optional) from
/// `directory`, then applies `APP__SECTION__KEY` environment overrides.
pub fn load_from<T: DeserializeOwned>(directory: &Path) -> Result<T, ConfigError> {
    dotenvy::dotenv().ok();

    let settings = Cfg::builder()
        .add_source(File::from(directory.join("base.yaml")).required(true))
        .add_source(File::from(directory.join("local.yaml")).required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(yaml: &str) -> CoreConfig {
        Cfg::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn memory_backend_with_defaults() {
        let config = parse(
            r#"
site:
  admin_email: admin@x.com
backend:
  kind: memory
"#,
        );

        assert!(config.validate().is_ok());
        assert!(config.site.auto_anonymous);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(
            config.collection_path().as_str(),
            "artifacts/default-app-id/public/data/posts"
        );
        assert!(matches!(config.backend, BackendSettings::Memory(_)));
    }

    #[test]
    fn firebase_backend_fills_endpoint_defaults() {
        let config = parse(
            r#"
site:
  admin_email: admin@x.com
  app_id: noor
backend:
  kind: firebase
  api_key: key
  project_id: noor-project
"#,
        );

        let BackendSettings::Firebase(firebase) = &config.backend else {
            panic!("expected firebase backend");
        };
        assert_eq!(firebase.identity_url, "https://identitytoolkit.googleapis.com");
        assert_eq!(firebase.token_url, "https://securetoken.googleapis.com");
        assert_eq!(firebase.poll_interval_ms, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn blank_admin_email_is_rejected() {
        let config = parse(
            r#"
site:
  admin_email: "  "
backend:
  kind: memory
"#,
        );

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn nested_app_id_is_rejected() {
        let config = parse(
            r#"
site:
  admin_email: admin@x.com
  app_id: a/b
backend:
  kind: memory
"#,
        );

        assert!(config.validate().is_err());
    }
}
