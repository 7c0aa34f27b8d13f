//! Task compiler: device configuration sections to a running acquisition task.
//!
//! Channel sections are translated into driver channel-creation calls in file
//! order. Only analog input channels measuring voltage, current or
//! acceleration are supported; any other combination is skipped with a
//! warning. The sample clock comes from the first task section.

use std::fmt;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::{extract_sections, ConfigSection};
use crate::driver::{AccelParams, AcquisitionMode, AcquisitionTask, DaqDriver, SampleClock};
use crate::error::{DaqError, Result};

/// Channel type key.
pub const KEY_CHAN_TYPE: &str = "ChanType";
/// Measurement type key.
pub const KEY_MEAS_TYPE: &str = "AI.MeasType";
/// Physical channel identifier key.
pub const KEY_PHYSICAL: &str = "PhysicalChanName";
/// Lower bound key.
pub const KEY_MIN: &str = "AI.Min";
/// Upper bound key.
pub const KEY_MAX: &str = "AI.Max";
/// Accelerometer sensitivity key (mV/G).
pub const KEY_ACCEL_SENSITIVITY: &str = "AI.Accel.Sensitivity";
/// Accelerometer current excitation key (A).
pub const KEY_EXCIT_VAL: &str = "AI.Excit.Val";
/// Sample rate key of a task section.
pub const KEY_SAMPLE_RATE: &str = "SampClk.Rate";
/// Samples-per-channel key of a task section.
pub const KEY_SAMPLES_PER_CHAN: &str = "SampQuant.SampPerChan";

/// Declared channel type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKind {
    /// Analog input
    AnalogInput,
    /// Anything else, kept verbatim for diagnostics
    Other(String),
}

impl ChannelKind {
    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Analog Input" | "AnalogInput" => Self::AnalogInput,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnalogInput => write!(f, "Analog Input"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Declared measurement type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasurementType {
    /// Voltage input
    Voltage,
    /// Current input
    Current,
    /// IEPE accelerometer input
    Accelerometer,
    /// Anything else, kept verbatim for diagnostics
    Other(String),
}

impl MeasurementType {
    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Voltage" => Self::Voltage,
            "Current" => Self::Current,
            "Accelerometer" => Self::Accelerometer,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voltage => write!(f, "Voltage"),
            Self::Current => write!(f, "Current"),
            Self::Accelerometer => write!(f, "Accelerometer"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Driver call a channel section resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSetup {
    /// Voltage channel with bounds
    Voltage,
    /// Current channel with bounds
    Current,
    /// Accelerometer channel with bounds and sensor parameters
    Accelerometer(AccelParams),
    /// Combination not supported; no channel is added
    Unsupported,
}

/// One channel's declared configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec {
    /// Section the channel was read from
    pub section: String,
    /// Declared channel type
    pub kind: ChannelKind,
    /// Declared measurement type
    pub measurement: MeasurementType,
    /// Physical channel identifier
    pub physical: String,
    /// Minimum expected value
    pub min: f64,
    /// Maximum expected value
    pub max: f64,
    /// Resolved driver call
    pub setup: ChannelSetup,
}

impl ChannelSpec {
    /// Read a channel section.
    ///
    /// Every section must carry the type, measurement type, physical name and
    /// numeric bounds. Sensor parameters are only required for accelerometers.
    pub fn from_section(section: &ConfigSection) -> Result<Self> {
        let kind = ChannelKind::parse(section.require(KEY_CHAN_TYPE)?);
        let measurement = MeasurementType::parse(section.require(KEY_MEAS_TYPE)?);
        let physical = section.require(KEY_PHYSICAL)?.trim().to_string();
        let min = section.require_f64(KEY_MIN)?;
        let max = section.require_f64(KEY_MAX)?;

        let setup = match (&kind, &measurement) {
            (ChannelKind::AnalogInput, MeasurementType::Voltage) => ChannelSetup::Voltage,
            (ChannelKind::AnalogInput, MeasurementType::Current) => ChannelSetup::Current,
            (ChannelKind::AnalogInput, MeasurementType::Accelerometer) => {
                ChannelSetup::Accelerometer(AccelParams::new(
                    section.numeric_f64(KEY_ACCEL_SENSITIVITY)?,
                    section.numeric_f64(KEY_EXCIT_VAL)?,
                ))
            }
            _ => ChannelSetup::Unsupported,
        };

        Ok(Self {
            section: section.name().to_string(),
            kind,
            measurement,
            physical,
            min,
            max,
            setup,
        })
    }

    /// Whether this channel produces a driver channel.
    pub fn is_supported(&self) -> bool {
        self.setup != ChannelSetup::Unsupported
    }

    fn add_to<T: AcquisitionTask>(&self, task: &mut T) -> Result<()> {
        match self.setup {
            ChannelSetup::Voltage => task.add_ai_voltage_chan(&self.physical, self.min, self.max)?,
            ChannelSetup::Current => task.add_ai_current_chan(&self.physical, self.min, self.max)?,
            ChannelSetup::Accelerometer(params) => {
                task.add_ai_accel_chan(&self.physical, self.min, self.max, params)?
            }
            ChannelSetup::Unsupported => {}
        }
        Ok(())
    }
}

/// Sample clock settings shared by all channels of a task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskTiming {
    /// Samples per second per channel
    pub sample_rate: f64,
    /// Samples per channel per read
    pub samples_per_channel: u32,
}

impl TaskTiming {
    /// Read timing from a task section.
    pub fn from_section(section: &ConfigSection) -> Result<Self> {
        let sample_rate = section.require_f64(KEY_SAMPLE_RATE)?;
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(DaqError::InvalidValue {
                section: section.name().to_string(),
                key: KEY_SAMPLE_RATE.to_string(),
                reason: format!("sample rate must be positive, got {}", sample_rate),
            });
        }

        let samples_per_channel = section.require_u32(KEY_SAMPLES_PER_CHAN)?;
        if samples_per_channel == 0 {
            return Err(DaqError::InvalidValue {
                section: section.name().to_string(),
                key: KEY_SAMPLES_PER_CHAN.to_string(),
                reason: "samples per channel must be positive".to_string(),
            });
        }

        Ok(Self {
            sample_rate,
            samples_per_channel,
        })
    }

    /// Continuous-mode sample clock for these settings.
    pub fn sample_clock(&self) -> SampleClock {
        SampleClock {
            rate: self.sample_rate,
            mode: AcquisitionMode::Continuous,
            samples_per_channel: self.samples_per_channel,
        }
    }
}

/// A started task bound to its timing and ordered channel names.
#[derive(Debug)]
pub struct CompiledTask<T> {
    task: T,
    timing: TaskTiming,
    channel_names: Vec<String>,
}

impl<T: AcquisitionTask> CompiledTask<T> {
    /// Bind an already configured task. Used by [`compile_task`] and by
    /// callers that build tasks by hand.
    pub fn new(task: T, timing: TaskTiming, channel_names: Vec<String>) -> Self {
        Self {
            task,
            timing,
            channel_names,
        }
    }

    /// Sample clock settings.
    pub fn timing(&self) -> TaskTiming {
        self.timing
    }

    /// Physical channel names in acquisition order.
    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    /// The underlying driver task.
    pub fn task(&self) -> &T {
        &self.task
    }

    /// Split into task, timing and channel names.
    pub fn into_parts(self) -> (T, TaskTiming, Vec<String>) {
        (self.task, self.timing, self.channel_names)
    }
}

/// Compile channel and task sections into a started task.
///
/// All sections are read before the driver is touched, so malformed
/// configuration fails without reserving hardware. Driver errors propagate
/// unchanged as [`DaqError::Hardware`].
pub fn compile_task<D: DaqDriver>(
    driver: &D,
    channels: &[ConfigSection],
    tasks: &[ConfigSection],
) -> Result<CompiledTask<D::Task>> {
    let specs = channels
        .iter()
        .map(ChannelSpec::from_section)
        .collect::<Result<Vec<_>>>()?;

    let task_section = tasks.first().ok_or_else(|| DaqError::MissingSection {
        prefix: "task".to_string(),
    })?;
    if tasks.len() > 1 {
        debug!(
            used = task_section.name(),
            ignored = tasks.len() - 1,
            "Multiple task sections; only the first is used"
        );
    }
    let timing = TaskTiming::from_section(task_section)?;

    let mut task = driver.create_task(task_section.name())?;
    let mut channel_names = Vec::with_capacity(specs.len());
    for spec in &specs {
        if !spec.is_supported() {
            warn!(
                section = %spec.section,
                channel = %spec.physical,
                kind = %spec.kind,
                measurement = %spec.measurement,
                "Skipping unsupported channel section"
            );
            continue;
        }
        spec.add_to(&mut task)?;
        channel_names.push(spec.physical.clone());
    }

    task.configure_timing(timing.sample_clock())?;
    task.start()?;

    info!(
        driver = driver.name(),
        sample_rate = timing.sample_rate,
        samples_per_channel = timing.samples_per_channel,
        channels = ?channel_names,
        "Acquisition task started"
    );
    Ok(CompiledTask::new(task, timing, channel_names))
}

/// Extract sections from `path` and compile them.
pub fn compile_from_file<D: DaqDriver>(
    driver: &D,
    path: impl AsRef<Path>,
    channel_prefix: &str,
    task_prefix: &str,
) -> Result<CompiledTask<D::Task>> {
    let path = path.as_ref();
    let channels = extract_sections(path, channel_prefix)?;
    let tasks = extract_sections(path, task_prefix)?;
    if tasks.is_empty() {
        return Err(DaqError::MissingSection {
            prefix: task_prefix.to_string(),
        });
    }
    compile_task(driver, &channels, &tasks)
}
