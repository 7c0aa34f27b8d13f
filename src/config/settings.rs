//! Runtime settings using Figment.
//!
//! Settings are merged from, in increasing precedence:
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. environment variables prefixed with `NIDAQ_RELAY_` (nested keys split on `__`)
//! 4. command-line overrides
//!
//! `rawdata_topic`, `log_level`, `header_mapping` and `driver` have no default;
//! extraction fails when any of them is missing from every layer.
//!
//! # Example
//! ```no_run
//! use nidaq_relay::config::{DriverBackend, RelaySettings, SettingsOverrides};
//!
//! # fn main() -> nidaq_relay::Result<()> {
//! let settings = RelaySettings::load(None, SettingsOverrides {
//!     rawdata_topic: Some("daq/raw".into()),
//!     log_level: Some("info".into()),
//!     header_mapping: Some("{cDAQ1Mod1/ai0: Temp}".into()),
//!     driver: Some(DriverBackend::Nidaqmx),
//!     ..Default::default()
//! })?;
//! println!("Publishing to {}", settings.rawdata_topic);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{DaqError, Result};
use crate::logging::{parse_log_level, LogFormat};

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "NIDAQ_RELAY_";

/// Top-level runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Topic every batch is published to
    pub rawdata_topic: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Loose-syntax rule string relabelling physical channels
    pub header_mapping: String,
    /// INI file describing channels and timing
    #[serde(default = "default_device_config")]
    pub device_config: PathBuf,
    /// Section prefix selecting channel sections
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
    /// Section prefix selecting task (timing) sections
    #[serde(default = "default_task_prefix")]
    pub task_prefix: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
    /// Acquisition driver backend
    pub driver: DriverBackend,
    /// Publisher adapter settings
    #[serde(default)]
    pub publisher: PublisherSettings,
}

/// Which driver compiles and runs the acquisition task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DriverBackend {
    /// In-process simulated device publishing synthetic data
    Simulated,
    /// NI-DAQmx runtime (requires the `hardware` feature)
    Nidaqmx,
}

/// Which adapter receives outbound messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PublisherBackend {
    /// MQTT broker
    #[default]
    Mqtt,
    /// JSON lines on standard output
    Stdout,
}

/// Publisher adapter configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublisherSettings {
    /// Selected adapter
    #[serde(default)]
    pub backend: PublisherBackend,
    /// MQTT connection parameters
    #[serde(default)]
    pub mqtt: MqttSettings,
}

/// MQTT connection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttSettings {
    /// Broker host name
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    /// Broker port
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// MQTT client identifier
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Outbound request queue capacity; a full queue drops messages
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Quality of service (0, 1 or 2)
    #[serde(default)]
    pub qos: u8,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
            queue_capacity: default_queue_capacity(),
            qos: 0,
        }
    }
}

/// Values supplied on the command line. `None` leaves lower layers untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsOverrides {
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rawdata_topic: Option<String>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_mapping: Option<String>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_config: Option<PathBuf>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverBackend>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<PublisherOverrides>,
}

/// Command-line overrides for the publisher table.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublisherOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<PublisherBackend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttOverrides>,
}

/// Command-line overrides for the MQTT table.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Serialize)]
pub struct MqttOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

// Default value functions
fn default_device_config() -> PathBuf {
    PathBuf::from("NiDAQ.ini")
}

fn default_channel_prefix() -> String {
    "DAQmxChannel".to_string()
}

fn default_task_prefix() -> String {
    "DAQmxTask".to_string()
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "nidaq-relay".to_string()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    64
}

impl RelaySettings {
    /// Build the layered figment without extracting it.
    pub fn figment(config_file: Option<&Path>, overrides: &SettingsOverrides) -> Figment {
        let mut figment = Figment::new();
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
    }

    /// Load, extract and validate settings.
    pub fn load(config_file: Option<&Path>, overrides: SettingsOverrides) -> Result<Self> {
        let settings: Self = Self::figment(config_file, &overrides).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings after loading
    pub fn validate(&self) -> Result<()> {
        if self.rawdata_topic.trim().is_empty() {
            return Err(DaqError::Settings("rawdata_topic must not be empty".into()));
        }
        parse_log_level(&self.log_level).map_err(DaqError::Settings)?;
        if self.channel_prefix.is_empty() || self.task_prefix.is_empty() {
            return Err(DaqError::Settings(
                "channel_prefix and task_prefix must not be empty".into(),
            ));
        }
        if self.publisher.mqtt.qos > 2 {
            return Err(DaqError::Settings(format!(
                "Invalid MQTT qos {}. Must be 0, 1 or 2",
                self.publisher.mqtt.qos
            )));
        }
        Ok(())
    }
}
