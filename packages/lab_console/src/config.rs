use anyhow::{Context, Result};
use investigation_sync::reconnect::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use investigation_sync::{Backoff, StreamEndpoint};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

// =============================================================================
// Tunable config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Equivalent ways to set a value:
//
//   config.toml:     [reconnect]
//                    max_attempts = 5
//
//   env var:         LAB_RECONNECT__MAX_ATTEMPTS=5   (double underscore = nesting)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub reconnect: ReconnectFileConfig,
}

/// Where investigation streams are served (lives under `[server]`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// `{id}` is replaced by the investigation id.
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_path: default_stream_path(),
            user_agent: default_user_agent(),
        }
    }
}

impl ServerFileConfig {
    pub fn endpoint(&self) -> StreamEndpoint {
        StreamEndpoint::new(self.base_url.clone(), self.stream_path.clone())
    }
}

/// Retry schedule after a dropped stream (lives under `[reconnect]`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectFileConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for ReconnectFileConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl ReconnectFileConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_stream_path() -> String {
    "/api/investigations/{id}/stream".to_string()
}
fn default_user_agent() -> String {
    format!("lab-console/{}", env!("CARGO_PKG_VERSION"))
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY.as_millis() as u64
}

/// Build a figment that layers: defaults → config.toml → LAB_* env vars.
///
///   `LAB_SERVER__BASE_URL=https://lab.example.org`  →  `server.base_url`
///   `LAB_RECONNECT__BASE_DELAY_MS=250`  →  `reconnect.base_delay_ms`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("LAB_").split("__"))
}

pub fn extract_config(data_dir: &Path) -> Result<FileConfig> {
    load_config(data_dir)
        .extract()
        .context("Invalid configuration")
}

// =============================================================================
// Directory layout (not tunable via figment; derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct LabConfig {
    pub data_dir: PathBuf,
    pub transcripts_dir: PathBuf,
}

impl LabConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".lab-console"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let transcripts_dir = data_dir.join("transcripts");
        std::fs::create_dir_all(&transcripts_dir).with_context(|| {
            format!("Failed to create transcripts directory: {:?}", transcripts_dir)
        })?;

        debug!("Data directory: {}", data_dir.display());

        Ok(Self {
            data_dir,
            transcripts_dir,
        })
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    /// File a recorded transcript of `target` is written to.
    pub fn transcript_path(&self, target: &str) -> PathBuf {
        let name: String = target
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.transcripts_dir.join(format!("{name}.sse"))
    }
}
