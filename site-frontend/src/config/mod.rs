use serde::Deserialize;
use site_core::config::{BackendSettings, CoreConfig, SiteSettings, TelemetrySettings, load_from};
use site_core::error::ConfigError;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub site: SiteSettings,
    pub backend: BackendSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Idle time after which a visitor's cookie session and site client are dropped.
    #[serde(default = "default_session_idle_minutes")]
    pub session_idle_minutes: u64,
    /// Mark the session cookie `Secure`; enable behind HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
}

fn default_session_idle_minutes() -> u64 {
    60
}

impl ServerSettings {
    pub fn session_idle(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_idle_minutes.saturating_mul(60))
    }
}

impl Settings {
    pub fn core(&self) -> CoreConfig {
        CoreConfig {
            site: self.site.clone(),
            backend: self.backend.clone(),
            telemetry: self.telemetry.clone(),
        }
    }
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let base_path = std::env::current_dir()?;

    // Run either from the workspace root or from the crate directory.
    let configuration_directory = if base_path.ends_with("site-frontend") {
        base_path.join("config")
    } else {
        base_path.join("site-frontend").join("config")
    };

    load_from(&configuration_directory)
}
