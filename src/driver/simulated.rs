//! Simulated acquisition device.
//!
//! Produces a per-channel sine wave inside each channel's bounds with a small
//! amount of seeded noise. Enforces the same parameter checks a real driver
//! does, so configuration mistakes surface without hardware attached.
//!
//! # Example
//!
//! ```
//! use nidaq_relay::driver::simulated::{SimulatedConfig, SimulatedDriver};
//! use nidaq_relay::driver::{AcquisitionMode, AcquisitionTask, DaqDriver, SampleClock};
//!
//! let driver = SimulatedDriver::new(SimulatedConfig::unpaced(7));
//! let mut task = driver.create_task("demo").unwrap();
//! task.add_ai_voltage_chan("Dev1/ai0", -10.0, 10.0).unwrap();
//! task.configure_timing(SampleClock {
//!     rate: 1000.0,
//!     mode: AcquisitionMode::Continuous,
//!     samples_per_channel: 10,
//! })
//! .unwrap();
//! task.start().unwrap();
//! assert_eq!(task.read(10).unwrap().n_channels(), 1);
//! ```

use std::f64::consts::TAU;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use super::{
    AccelParams, AcquisitionTask, ChannelData, DaqDriver, DriverError, DriverResult, SampleClock,
};

/// Behaviour of the simulated device.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedConfig {
    /// RNG seed; `None` seeds from the OS
    pub seed: Option<u64>,
    /// Sine frequency of the first channel in Hz (later channels are offset)
    pub signal_frequency_hz: f64,
    /// Noise amplitude as a fraction of each channel's span
    pub noise_fraction: f64,
    /// Sleep for one batch period per read
    pub pace_reads: bool,
    /// Fail every read after this many successful ones
    pub fail_after_reads: Option<u64>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            seed: None,
            signal_frequency_hz: 5.0,
            noise_fraction: 0.01,
            pace_reads: true,
            fail_after_reads: None,
        }
    }
}

impl SimulatedConfig {
    /// Deterministic configuration without pacing, for tests.
    pub fn unpaced(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            pace_reads: false,
            ..Default::default()
        }
    }

    /// Inject a read failure after `n` successful reads.
    pub fn with_fail_after(mut self, n: u64) -> Self {
        self.fail_after_reads = Some(n);
        self
    }
}

/// Driver handing out [`SimulatedTask`]s.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDriver {
    config: SimulatedConfig,
}

impl SimulatedDriver {
    /// Create a driver with the given behaviour.
    pub fn new(config: SimulatedConfig) -> Self {
        Self { config }
    }
}

impl DaqDriver for SimulatedDriver {
    type Task = SimulatedTask;

    fn name(&self) -> &'static str {
        "simulated"
    }

    fn create_task(&self, name: &str) -> DriverResult<SimulatedTask> {
        debug!(task = name, "Creating simulated task");
        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(SimulatedTask {
            name: name.to_string(),
            config: self.config.clone(),
            channels: Vec::new(),
            clock: None,
            running: false,
            reads: 0,
            sample_index: 0,
            rng,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SimKind {
    Voltage,
    Current,
    Accel,
}

#[derive(Debug, Clone)]
struct SimChannel {
    physical: String,
    kind: SimKind,
    min: f64,
    max: f64,
}

/// Task state of the simulated device.
#[derive(Debug)]
pub struct SimulatedTask {
    name: String,
    config: SimulatedConfig,
    channels: Vec<SimChannel>,
    clock: Option<SampleClock>,
    running: bool,
    reads: u64,
    sample_index: u64,
    rng: StdRng,
}

impl SimulatedTask {
    /// Task name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether [`AcquisitionTask::start`] succeeded.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Configured sample clock, if any.
    pub fn clock(&self) -> Option<SampleClock> {
        self.clock
    }

    /// Physical channel names in creation order.
    pub fn physical_channels(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.physical.as_str()).collect()
    }

    fn add_channel(
        &mut self,
        physical: &str,
        kind: SimKind,
        min: f64,
        max: f64,
    ) -> DriverResult<()> {
        if self.running {
            return Err(DriverError::invalid("cannot add channels to a running task"));
        }
        if physical.trim().is_empty() {
            return Err(DriverError::invalid("physical channel name is empty"));
        }
        if !min.is_finite() || !max.is_finite() {
            return Err(DriverError::invalid(format!(
                "bounds of '{}' must be finite (got {}..{})",
                physical, min, max
            )));
        }
        if min >= max {
            return Err(DriverError::invalid(format!(
                "minimum {} must be below maximum {} for '{}'",
                min, max, physical
            )));
        }
        if self.channels.iter().any(|c| c.physical == physical) {
            return Err(DriverError::ChannelInUse {
                channel: physical.to_string(),
            });
        }

        debug!(task = %self.name, channel = physical, ?kind, min, max, "Added channel");
        self.channels.push(SimChannel {
            physical: physical.to_string(),
            kind,
            min,
            max,
        });
        Ok(())
    }

    fn sample(&mut self, channel: usize, index: u64, rate: f64) -> f64 {
        let ch = &self.channels[channel];
        let mid = (ch.max + ch.min) / 2.0;
        let amplitude = (ch.max - ch.min) / 2.0 * 0.8;
        let frequency = self.config.signal_frequency_hz * (channel as f64 + 1.0);
        let t = index as f64 / rate;
        let phase = match ch.kind {
            SimKind::Voltage => 0.0,
            SimKind::Current => TAU / 4.0,
            SimKind::Accel => TAU / 2.0,
        };
        let (min, max, span) = (ch.min, ch.max, ch.max - ch.min);
        let noise = if self.config.noise_fraction > 0.0 {
            self.rng.gen_range(-1.0..=1.0) * self.config.noise_fraction * span
        } else {
            0.0
        };
        (mid + amplitude * (TAU * frequency * t + phase).sin() + noise).clamp(min, max)
    }
}

impl AcquisitionTask for SimulatedTask {
    fn add_ai_voltage_chan(
        &mut self,
        physical_channel: &str,
        min: f64,
        max: f64,
    ) -> DriverResult<()> {
        self.add_channel(physical_channel, SimKind::Voltage, min, max)
    }

    fn add_ai_current_chan(
        &mut self,
        physical_channel: &str,
        min: f64,
        max: f64,
    ) -> DriverResult<()> {
        self.add_channel(physical_channel, SimKind::Current, min, max)
    }

    fn add_ai_accel_chan(
        &mut self,
        physical_channel: &str,
        min: f64,
        max: f64,
        params: AccelParams,
    ) -> DriverResult<()> {
        if !(params.sensitivity.is_finite() && params.sensitivity > 0.0) {
            return Err(DriverError::invalid(format!(
                "sensitivity of '{}' must be positive (got {})",
                physical_channel, params.sensitivity
            )));
        }
        if !(params.current_excit_val.is_finite() && params.current_excit_val >= 0.0) {
            return Err(DriverError::invalid(format!(
                "excitation of '{}' must not be negative (got {})",
                physical_channel, params.current_excit_val
            )));
        }
        self.add_channel(physical_channel, SimKind::Accel, min, max)
    }

    fn configure_timing(&mut self, clock: SampleClock) -> DriverResult<()> {
        if self.running {
            return Err(DriverError::invalid("cannot change timing of a running task"));
        }
        if !(clock.rate.is_finite() && clock.rate > 0.0) {
            return Err(DriverError::invalid(format!(
                "sample rate must be positive (got {})",
                clock.rate
            )));
        }
        if clock.samples_per_channel == 0 {
            return Err(DriverError::invalid("samples per channel must be positive"));
        }
        debug!(
            task = %self.name,
            rate = clock.rate,
            samples_per_channel = clock.samples_per_channel,
            mode = ?clock.mode,
            "Configured sample clock"
        );
        self.clock = Some(clock);
        Ok(())
    }

    fn start(&mut self) -> DriverResult<()> {
        if self.clock.is_none() {
            return Err(DriverError::TimingNotConfigured);
        }
        if self.channels.is_empty() {
            return Err(DriverError::invalid("task has no channels"));
        }
        self.running = true;
        debug!(task = %self.name, channels = self.channels.len(), "Started simulated task");
        Ok(())
    }

    fn read(&mut self, samples_per_channel: usize) -> DriverResult<ChannelData> {
        if !self.running {
            return Err(DriverError::NotRunning);
        }
        let rate = self.clock.map(|c| c.rate).ok_or(DriverError::TimingNotConfigured)?;

        if let Some(limit) = self.config.fail_after_reads {
            if self.reads >= limit {
                return Err(DriverError::ReadFailed {
                    message: format!("injected failure after {} reads", limit),
                });
            }
        }

        if self.config.pace_reads {
            std::thread::sleep(Duration::from_secs_f64(samples_per_channel as f64 / rate));
        }

        let start = self.sample_index;
        let mut columns = Vec::with_capacity(self.channels.len());
        for ch in 0..self.channels.len() {
            let mut column = Vec::with_capacity(samples_per_channel);
            for i in 0..samples_per_channel as u64 {
                column.push(self.sample(ch, start + i, rate));
            }
            columns.push(column);
        }

        self.sample_index += samples_per_channel as u64;
        self.reads += 1;
        trace!(task = %self.name, read = self.reads, samples_per_channel, "Simulated read");

        if columns.len() == 1 {
            Ok(ChannelData::Flat(columns.remove(0)))
        } else {
            Ok(ChannelData::PerChannel(columns))
        }
    }

    fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
