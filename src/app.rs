//! Startup orchestration.
//!
//! Wires the pieces together in startup order: header mapping, device
//! configuration, task compilation, relabelling and finally the acquisition
//! loop. Every error before the loop starts is fatal to the caller.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::acquisition::{AcquisitionLoop, LoopStats};
use crate::compiler::compile_from_file;
use crate::config::{DriverBackend, RelaySettings};
use crate::driver::DaqDriver;
use crate::error::Result;
use crate::mapping::HeaderMapping;
use crate::publisher::Publisher;

/// Parse the mapping, compile the device configuration and build the loop.
pub fn prepare<D: DaqDriver>(
    driver: &D,
    settings: &RelaySettings,
    publisher: Arc<dyn Publisher>,
) -> Result<AcquisitionLoop<D::Task>> {
    let mapping = HeaderMapping::parse(&settings.header_mapping)?;
    info!(entries = mapping.len(), "Header mapping parsed");

    let compiled = compile_from_file(
        driver,
        &settings.device_config,
        &settings.channel_prefix,
        &settings.task_prefix,
    )?;

    let header = mapping.relabel(compiled.channel_names());
    info!(header = ?header, "Mapped channel names");

    Ok(AcquisitionLoop::new(
        compiled,
        header,
        settings.rawdata_topic.clone(),
        publisher,
    ))
}

/// Prepare and run the relay until `shutdown` reads `true`.
pub async fn run_relay<D: DaqDriver>(
    driver: &D,
    settings: &RelaySettings,
    publisher: Arc<dyn Publisher>,
    shutdown: watch::Receiver<bool>,
) -> Result<LoopStats> {
    info!(
        topic = %settings.rawdata_topic,
        driver = driver.name(),
        publisher = ?settings.publisher.backend,
        device_config = %settings.device_config.display(),
        "Starting relay"
    );
    if settings.driver == DriverBackend::Simulated {
        warn!(
            topic = %settings.rawdata_topic,
            "Simulated driver selected, publishing synthetic data"
        );
    }
    prepare(driver, settings, publisher)?.run(shutdown).await
}
