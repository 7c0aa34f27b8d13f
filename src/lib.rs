//! # nidaq-relay
//!
//! Continuously samples analog channels from a data acquisition device and
//! publishes every batch as a timestamped JSON message.
//!
//! The device is described by an INI configuration file: one section per
//! channel (type, measurement kind, bounds, sensor parameters) and a task
//! section holding the sample clock. The relay compiles it into a running
//! acquisition task once at startup, then loops forever reading fixed-size
//! batches.
//!
//! ## Crate Structure
//!
//! - **`config`**: INI section extraction and layered runtime settings.
//! - **`compiler`**: turns channel and task sections into a started task.
//! - **`mapping`**: parses the relaxed header-mapping syntax and relabels channels.
//! - **`acquisition`**: the read, reshape and publish loop.
//! - **`driver`**: driver capability traits, a simulated device and the
//!   NI-DAQmx backend (`hardware` feature).
//! - **`publisher`**: MQTT, stdout and in-process channel adapters.
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`error`**: the `DaqError` taxonomy.
//! - **`app`**: startup orchestration used by the binary.

pub mod acquisition;
pub mod app;
pub mod compiler;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod publisher;

pub use acquisition::{reshape, AcquisitionLoop, LoopStats, OutboundMessage, SampleBatch};
pub use compiler::{compile_task, ChannelSpec, CompiledTask, TaskTiming};
pub use error::{DaqError, Result};
pub use mapping::HeaderMapping;
