use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Default config file path, overridable via `GESTE_CONFIG`.
const DEFAULT_CONFIG_PATH: &str = "geste.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Daemon configuration: optional TOML file plus `GESTE_*` env overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub model: ModelConfig,
    pub telemetry: TelemetryConfig,
    /// Resolved at load time; never read from the file directly.
    #[serde(skip)]
    device_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// V4L2 device path.
    pub device: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the hand landmarker ONNX model.
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/hand_landmarker.onnx"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Telemetry server base URL.
    pub server_url: String,
    /// Seconds between pushes of the current luminance.
    pub push_interval_secs: u64,
    /// Device model declared at registration.
    pub device_model: String,
    /// Preferred display name declared at registration.
    pub device_name: String,
    /// Stable device identifier; generated when unset.
    pub device_id: Option<String>,
    /// Optional broker declaration forwarded in the device profile.
    pub mqtt: Option<MqttConfig>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            server_url: "https://class.iottalk.tw".to_string(),
            push_interval_secs: 1,
            device_model: "Dummy_Device".to_string(),
            device_name: "GestureController".to_string(),
            device_id: None,
            mqtt: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub broker: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_mqtt_port() -> u16 {
    8883
}

impl Config {
    /// Load from the TOML file (when present), apply env overrides, and
    /// resolve the device identifier.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("GESTE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
            tracing::info!(path = %path.display(), "loaded configuration");
            config
        } else {
            tracing::info!(path = %path.display(), "no config file; using defaults");
            Self::default()
        };

        if let Ok(device) = std::env::var("GESTE_CAMERA_DEVICE") {
            config.camera.device = device;
        }
        if let Ok(model_path) = std::env::var("GESTE_MODEL_PATH") {
            config.model.path = PathBuf::from(model_path);
        }
        if let Ok(url) = std::env::var("GESTE_SERVER_URL") {
            config.telemetry.server_url = url;
        }
        if let Ok(secs) = std::env::var("GESTE_PUSH_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                config.telemetry.push_interval_secs = secs;
            }
        }
        if let Ok(name) = std::env::var("GESTE_DEVICE_NAME") {
            config.telemetry.device_name = name;
        }
        if let Ok(id) = std::env::var("GESTE_DEVICE_ID") {
            config.telemetry.device_id = Some(id);
        }

        config.device_id = config
            .telemetry
            .device_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(config)
    }

    /// Stable identifier used in telemetry URLs.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn model_path(&self) -> String {
        self.model.path.to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.camera.device, "/dev/video0");
        assert_eq!(config.telemetry.push_interval_secs, 1);
        assert_eq!(config.telemetry.device_model, "Dummy_Device");
        assert!(config.telemetry.mqtt.is_none());
    }

    #[test]
    fn test_parse_full_file() {
        let text = r#"
            [camera]
            device = "/dev/video4"

            [model]
            path = "/opt/geste/hand_landmarker.onnx"

            [telemetry]
            server_url = "https://telemetry.example"
            push_interval_secs = 5
            device_name = "DeskLamp"

            [telemetry.mqtt]
            broker = "broker.example"
            username = "geste"
            password = "secret"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.camera.device, "/dev/video4");
        assert_eq!(config.telemetry.server_url, "https://telemetry.example");
        assert_eq!(config.telemetry.push_interval_secs, 5);
        assert_eq!(config.telemetry.device_name, "DeskLamp");

        let mqtt = config.telemetry.mqtt.unwrap();
        assert_eq!(mqtt.broker, "broker.example");
        assert_eq!(mqtt.port, 8883); // default when unset
        assert_eq!(mqtt.username.as_deref(), Some("geste"));
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let config: Config = toml::from_str("[telemetry]\ndevice_name = \"Porch\"\n").unwrap();
        assert_eq!(config.telemetry.device_name, "Porch");
        assert_eq!(config.telemetry.device_model, "Dummy_Device");
        assert_eq!(config.camera.device, "/dev/video0");
    }
}
