//! CLI entry point for nidaq-relay.
//!
//! Compiles the device configuration into a running acquisition task and
//! publishes every batch until interrupted.
//!
//! # Usage
//!
//! ```bash
//! nidaq-relay --rawdata_topic daq/raw --log_level INFO \
//!     --header_mapping '{cDAQ1Mod1/ai0: Temp}' --driver nidaqmx \
//!     --device-config NiDAQ.ini
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use nidaq_relay::app::run_relay;
use nidaq_relay::config::settings::{MqttOverrides, PublisherOverrides};
use nidaq_relay::config::{DriverBackend, PublisherBackend, RelaySettings, SettingsOverrides};
use nidaq_relay::driver::simulated::SimulatedDriver;
use nidaq_relay::logging::{self, LogFormat, TracingConfig};
use nidaq_relay::publisher::{MqttPublisher, Publisher, StdoutPublisher};
use nidaq_relay::LoopStats;

#[derive(Parser, Debug)]
#[command(name = "nidaq-relay")]
#[command(about = "Stream analog DAQ batches to a publish topic", long_about = None)]
struct Cli {
    /// Topic to publish batches to
    #[arg(long = "rawdata_topic", alias = "rawdata-topic")]
    rawdata_topic: Option<String>,

    /// Logging level (trace, debug, info, warn/warning, error/critical)
    #[arg(long = "log_level", alias = "log-level")]
    log_level: Option<String>,

    /// Rules mapping physical channel names to header names
    #[arg(long = "header_mapping", alias = "header-mapping")]
    header_mapping: Option<String>,

    /// INI file describing channels and timing
    #[arg(long)]
    device_config: Option<PathBuf>,

    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Acquisition driver (required unless set in the settings file or environment)
    #[arg(long, value_enum)]
    driver: Option<DriverBackend>,

    /// Publisher adapter
    #[arg(long, value_enum)]
    publisher: Option<PublisherBackend>,

    /// MQTT broker host
    #[arg(long)]
    mqtt_host: Option<String>,

    /// MQTT broker port
    #[arg(long)]
    mqtt_port: Option<u16>,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        let mqtt = (self.mqtt_host.is_some() || self.mqtt_port.is_some()).then(|| MqttOverrides {
            host: self.mqtt_host.clone(),
            port: self.mqtt_port,
        });
        let publisher = (self.publisher.is_some() || mqtt.is_some()).then(|| PublisherOverrides {
            backend: self.publisher,
            mqtt,
        });

        SettingsOverrides {
            rawdata_topic: self.rawdata_topic.clone(),
            log_level: self.log_level.clone(),
            header_mapping: self.header_mapping.clone(),
            device_config: self.device_config.clone(),
            log_format: self.log_format,
            driver: self.driver,
            publisher,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = RelaySettings::load(cli.config.as_deref(), cli.overrides())
        .context("Failed to load settings")?;

    let tracing_config = TracingConfig::from_settings(&settings).map_err(anyhow::Error::msg)?;
    logging::init(tracing_config).map_err(anyhow::Error::msg)?;

    info!(
        topic = %settings.rawdata_topic,
        driver = ?settings.driver,
        publisher = ?settings.publisher.backend,
        "nidaq-relay starting"
    );

    let publisher: Arc<dyn Publisher> = match settings.publisher.backend {
        PublisherBackend::Mqtt => Arc::new(
            MqttPublisher::connect(&settings.publisher.mqtt)
                .context("Failed to create MQTT publisher")?,
        ),
        PublisherBackend::Stdout => Arc::new(StdoutPublisher::new()),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested, finishing current batch");
        let _ = shutdown_tx.send(true);
    });

    let stats = match settings.driver {
        DriverBackend::Simulated => {
            run_relay(&SimulatedDriver::default(), &settings, publisher, shutdown_rx).await
        }
        DriverBackend::Nidaqmx => run_hardware(&settings, publisher, shutdown_rx).await,
    }
    .context("Relay stopped with an error")?;

    info!(?stats, "nidaq-relay stopped");
    Ok(())
}

#[cfg(feature = "hardware")]
async fn run_hardware(
    settings: &RelaySettings,
    publisher: Arc<dyn Publisher>,
    shutdown: watch::Receiver<bool>,
) -> nidaq_relay::Result<LoopStats> {
    use nidaq_relay::driver::nidaqmx::NiDaqmxDriver;
    run_relay(&NiDaqmxDriver::new(), settings, publisher, shutdown).await
}

#[cfg(not(feature = "hardware"))]
async fn run_hardware(
    _settings: &RelaySettings,
    _publisher: Arc<dyn Publisher>,
    _shutdown: watch::Receiver<bool>,
) -> nidaq_relay::Result<LoopStats> {
    Err(nidaq_relay::driver::DriverError::Unavailable {
        driver: "nidaqmx",
        feature: "hardware",
    }
    .into())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
