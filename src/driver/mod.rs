//! Acquisition driver capabilities.
//!
//! The relay never talks to hardware directly. It needs exactly four driver
//! primitives, expressed here as two small traits:
//!
//! - [`DaqDriver::create_task`] - open a new task (one shared sample clock)
//! - [`AcquisitionTask`] channel creation - voltage, current, accelerometer
//! - [`AcquisitionTask::configure_timing`] - sample clock rate, mode, batch size
//! - [`AcquisitionTask::read`] - block until N samples per channel are available
//!
//! # Implementations
//!
//! - [`simulated::SimulatedDriver`] - deterministic in-process device, always built
//! - `nidaqmx::NiDaqmxDriver` - NI-DAQmx runtime, behind the `hardware` feature
//!
//! Reads return [`ChannelData`] in whichever shape the driver produced; the
//! acquisition loop reshapes it into per-sample rows.

pub mod error;
#[cfg(feature = "hardware")]
pub mod nidaqmx;
pub mod simulated;

pub use error::DriverError;

/// Result type alias for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Acceleration units for accelerometer channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelUnits {
    /// Standard gravity
    #[default]
    G,
}

/// Sensitivity units for accelerometer channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelSensitivityUnits {
    /// Millivolts per G
    #[default]
    MillivoltsPerG,
}

/// Sensor parameters of an accelerometer channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelParams {
    /// Output unit of the channel
    pub units: AccelUnits,
    /// Sensor sensitivity
    pub sensitivity: f64,
    /// Unit of `sensitivity`
    pub sensitivity_units: AccelSensitivityUnits,
    /// IEPE current excitation in amperes
    pub current_excit_val: f64,
}

impl AccelParams {
    /// Parameters in G with a sensitivity given in mV/G.
    pub fn new(sensitivity: f64, current_excit_val: f64) -> Self {
        Self {
            units: AccelUnits::G,
            sensitivity,
            sensitivity_units: AccelSensitivityUnits::MillivoltsPerG,
            current_excit_val,
        }
    }
}

/// Sample clock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionMode {
    /// Device samples indefinitely; reads drain the buffer
    #[default]
    Continuous,
    /// Device stops after the configured number of samples
    Finite,
}

/// Sample clock configuration shared by every channel of a task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleClock {
    /// Samples per second per channel
    pub rate: f64,
    /// Continuous or finite acquisition
    pub mode: AcquisitionMode,
    /// Samples per channel per read (buffer sizing hint in continuous mode)
    pub samples_per_channel: u32,
}

/// Samples returned by one read.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    /// Single-channel task: one value per sample
    Flat(Vec<f64>),
    /// Multi-channel task: one vector per channel, in channel order
    PerChannel(Vec<Vec<f64>>),
}

impl ChannelData {
    /// Number of channels represented.
    pub fn n_channels(&self) -> usize {
        match self {
            Self::Flat(_) => 1,
            Self::PerChannel(channels) => channels.len(),
        }
    }
}

/// Factory for acquisition tasks.
pub trait DaqDriver {
    /// Task type produced by this driver
    type Task: AcquisitionTask;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Create an empty task.
    fn create_task(&self, name: &str) -> DriverResult<Self::Task>;
}

/// A driver-managed session: channels sharing one sample clock.
///
/// Channel creation order is the order of values in every subsequent read.
/// The task is owned by exactly one reader; `Send` lets that reader move it
/// onto a blocking worker thread.
pub trait AcquisitionTask: Send + 'static {
    /// Add an analog voltage input channel.
    fn add_ai_voltage_chan(&mut self, physical_channel: &str, min: f64, max: f64)
        -> DriverResult<()>;

    /// Add an analog current input channel.
    fn add_ai_current_chan(&mut self, physical_channel: &str, min: f64, max: f64)
        -> DriverResult<()>;

    /// Add an accelerometer channel.
    fn add_ai_accel_chan(
        &mut self,
        physical_channel: &str,
        min: f64,
        max: f64,
        params: AccelParams,
    ) -> DriverResult<()>;

    /// Configure the sample clock. Called once, after every channel is added.
    fn configure_timing(&mut self, clock: SampleClock) -> DriverResult<()>;

    /// Start acquisition.
    fn start(&mut self) -> DriverResult<()>;

    /// Block until `samples_per_channel` samples per channel are read.
    fn read(&mut self, samples_per_channel: usize) -> DriverResult<ChannelData>;

    /// Number of channels added so far.
    fn channel_count(&self) -> usize;
}
