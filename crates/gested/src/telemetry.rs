//! Periodic luminance reporting to the telemetry service.
//!
//! The reporter runs fully independently of the frame pipeline:
//! registration retries until it succeeds (or shutdown), a failed push is
//! logged and retried on the next interval, and the only surface shared
//! with the engine is the scalar state register — a blocked push can never
//! stall frame processing. Every tick sends the *latest* committed
//! luminance, whether or not it changed since the previous push.

use crate::config::TelemetryConfig;
use crate::state::SharedState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Delay between registration attempts.
const REGISTRATION_RETRY_DELAY: Duration = Duration::from_secs(5);
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected {operation}: {status}")]
    Rejected {
        operation: &'static str,
        status: reqwest::StatusCode,
    },
}

/// Device profile sent at registration.
#[derive(Debug, Serialize)]
struct RegistrationRequest<'a> {
    model: &'a str,
    name: &'a str,
    features: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    mqtt: Option<MqttDeclaration<'a>>,
}

/// Optional broker declaration forwarded in the device profile.
#[derive(Debug, Serialize)]
struct MqttDeclaration<'a> {
    broker: &'a str,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RegistrationReply {
    /// Server-assigned display name for the device.
    #[serde(default)]
    name: Option<String>,
}

/// One pushed luminance sample.
#[derive(Debug, Serialize)]
struct PushSample {
    value: u8,
    timestamp: DateTime<Utc>,
}

pub struct Reporter {
    client: reqwest::Client,
    config: TelemetryConfig,
    device_id: String,
    state: Arc<SharedState>,
}

impl Reporter {
    pub fn new(
        config: TelemetryConfig,
        device_id: String,
        state: Arc<SharedState>,
    ) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            config,
            device_id,
            state,
        })
    }

    fn device_url(&self) -> String {
        format!(
            "{}/devices/{}",
            self.config.server_url.trim_end_matches('/'),
            self.device_id
        )
    }

    fn push_url(&self) -> String {
        format!("{}/features/luminance", self.device_url())
    }

    /// Run until shutdown: register (retrying), push every interval,
    /// deregister on the way out.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if !self.register_until_ready(&mut shutdown).await {
            // Shutdown arrived before registration ever succeeded.
            return;
        }

        let period = Duration::from_secs(self.config.push_interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        // A slow push delays the next tick rather than bursting to catch up.
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sample = PushSample {
                        value: self.state.luminance(),
                        timestamp: Utc::now(),
                    };
                    match self.push(&sample).await {
                        Ok(()) => tracing::debug!(value = sample.value, "pushed luminance"),
                        Err(e) => {
                            tracing::warn!(error = %e, "push failed; retrying next interval");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.deregister().await;
    }

    /// Retry registration until it succeeds. Returns false if shutdown was
    /// requested first.
    async fn register_until_ready(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            match self.register().await {
                Ok(reply) => {
                    let label = reply
                        .name
                        .unwrap_or_else(|| self.config.device_name.clone());
                    tracing::info!(
                        server = %self.config.server_url,
                        device = %label,
                        "registered with telemetry server"
                    );
                    self.state.set_device_label(&label);
                    self.state.set_connected(true);
                    return true;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        retry_in_secs = REGISTRATION_RETRY_DELAY.as_secs(),
                        "registration failed"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(REGISTRATION_RETRY_DELAY) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return false;
                    }
                }
            }
        }
    }

    async fn register(&self) -> Result<RegistrationReply, TelemetryError> {
        let features = ["luminance"];
        let body = RegistrationRequest {
            model: &self.config.device_model,
            name: &self.config.device_name,
            features: &features,
            mqtt: self.config.mqtt.as_ref().map(|m| MqttDeclaration {
                broker: &m.broker,
                port: m.port,
                username: m.username.as_deref(),
            }),
        };

        let resp = self.client.put(self.device_url()).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TelemetryError::Rejected {
                operation: "registration",
                status,
            });
        }
        Ok(resp.json().await?)
    }

    async fn push(&self, sample: &PushSample) -> Result<(), TelemetryError> {
        let resp = self.client.post(self.push_url()).json(sample).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TelemetryError::Rejected {
                operation: "push",
                status,
            });
        }
        Ok(())
    }

    /// Best-effort deregistration at shutdown; failures are logged and
    /// ignored.
    async fn deregister(&self) {
        self.state.set_connected(false);
        match self.client.delete(self.device_url()).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!("deregistered from telemetry server");
            }
            Ok(resp) => tracing::warn!(status = %resp.status(), "deregistration rejected"),
            Err(e) => tracing::warn!(error = %e, "deregistration failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reporter_with(server_url: &str) -> Reporter {
        let config = TelemetryConfig {
            server_url: server_url.to_string(),
            ..TelemetryConfig::default()
        };
        Reporter::new(config, "dev-1234".to_string(), Arc::new(SharedState::new())).unwrap()
    }

    #[test]
    fn test_device_url_shape() {
        let reporter = reporter_with("https://telemetry.example");
        assert_eq!(
            reporter.device_url(),
            "https://telemetry.example/devices/dev-1234"
        );
        assert_eq!(
            reporter.push_url(),
            "https://telemetry.example/devices/dev-1234/features/luminance"
        );
    }

    #[test]
    fn test_device_url_trims_trailing_slash() {
        let reporter = reporter_with("https://telemetry.example/");
        assert_eq!(
            reporter.device_url(),
            "https://telemetry.example/devices/dev-1234"
        );
    }

    #[test]
    fn test_registration_request_omits_absent_mqtt() {
        let body = RegistrationRequest {
            model: "Dummy_Device",
            name: "GestureController",
            features: &["luminance"],
            mqtt: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "Dummy_Device");
        assert_eq!(json["features"][0], "luminance");
        assert!(json.get("mqtt").is_none());
    }

    #[test]
    fn test_registration_request_declares_mqtt() {
        let body = RegistrationRequest {
            model: "Dummy_Device",
            name: "GestureController",
            features: &["luminance"],
            mqtt: Some(MqttDeclaration {
                broker: "broker.example",
                port: 8883,
                username: Some("geste"),
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["mqtt"]["broker"], "broker.example");
        assert_eq!(json["mqtt"]["port"], 8883);
        assert_eq!(json["mqtt"]["username"], "geste");
    }

    #[test]
    fn test_push_sample_shape() {
        let sample = PushSample {
            value: 204,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["value"], 204);
        assert!(json["timestamp"].as_str().unwrap().starts_with("2026-01-15T12:00:00"));
    }

    #[test]
    fn test_registration_reply_tolerates_empty_body() {
        let reply: RegistrationReply = serde_json::from_str("{}").unwrap();
        assert!(reply.name.is_none());

        let reply: RegistrationReply =
            serde_json::from_str(r#"{"name": "DeskLamp-3"}"#).unwrap();
        assert_eq!(reply.name.as_deref(), Some("DeskLamp-3"));
    }
}
