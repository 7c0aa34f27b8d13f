//! NI-DAQmx backend.
//!
//! Safe wrapper around the raw bindings in `nidaqmx-sys`. A [`NiDaqmxTask`]
//! owns its task handle; dropping it stops and clears the task so the
//! physical channels are released.

#![allow(unsafe_code)]

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use nidaqmx_sys as sys;
use tracing::{debug, warn};

use super::{
    AccelParams, AccelSensitivityUnits, AccelUnits, AcquisitionMode, AcquisitionTask,
    ChannelData, DaqDriver, DriverError, DriverResult, SampleClock,
};

/// Read timeout in seconds.
pub const READ_TIMEOUT_SECS: f64 = 10.0;

/// NI status for "the specified resource is reserved".
const ERR_RESOURCE_RESERVED: i32 = -50103;

const ERROR_BUFFER_LEN: usize = 2048;

/// Driver backed by the installed NI-DAQmx runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct NiDaqmxDriver;

impl NiDaqmxDriver {
    /// Create the driver. No hardware is touched until a task is created.
    pub fn new() -> Self {
        Self
    }
}

impl DaqDriver for NiDaqmxDriver {
    type Task = NiDaqmxTask;

    fn name(&self) -> &'static str {
        "nidaqmx"
    }

    fn create_task(&self, name: &str) -> DriverResult<NiDaqmxTask> {
        let c_name = c_string(name)?;
        let mut handle: sys::TaskHandle = ptr::null_mut();
        // SAFETY: c_name is a valid null-terminated string and handle is a valid out pointer
        check(unsafe { sys::DAQmxCreateTask(c_name.as_ptr(), &mut handle) }, None)?;
        debug!(task = name, "Created NI-DAQmx task");
        Ok(NiDaqmxTask {
            handle,
            name: name.to_string(),
            channels: Vec::new(),
            running: false,
        })
    }
}

/// Task handle owned by exactly one reader.
#[derive(Debug)]
pub struct NiDaqmxTask {
    handle: sys::TaskHandle,
    name: String,
    channels: Vec<String>,
    running: bool,
}

// SAFETY: NI-DAQmx task handles may be used from any thread. The task is only
// ever accessed through `&mut self`, so no two threads touch it at once.
unsafe impl Send for NiDaqmxTask {}

impl NiDaqmxTask {
    fn register(&mut self, physical_channel: &str) {
        debug!(task = %self.name, channel = physical_channel, "Added channel");
        self.channels.push(physical_channel.to_string());
    }
}

impl AcquisitionTask for NiDaqmxTask {
    fn add_ai_voltage_chan(
        &mut self,
        physical_channel: &str,
        min: f64,
        max: f64,
    ) -> DriverResult<()> {
        let physical = c_string(physical_channel)?;
        let empty = c_string("")?;
        // SAFETY: handle is a live task; all strings outlive the call
        let status = unsafe {
            sys::DAQmxCreateAIVoltageChan(
                self.handle,
                physical.as_ptr(),
                empty.as_ptr(),
                sys::DAQmx_Val_Cfg_Default,
                min,
                max,
                sys::DAQmx_Val_Volts,
                ptr::null(),
            )
        };
        check(status, Some(physical_channel))?;
        self.register(physical_channel);
        Ok(())
    }

    fn add_ai_current_chan(
        &mut self,
        physical_channel: &str,
        min: f64,
        max: f64,
    ) -> DriverResult<()> {
        let physical = c_string(physical_channel)?;
        let empty = c_string("")?;
        // SAFETY: handle is a live task; all strings outlive the call
        let status = unsafe {
            sys::DAQmxCreateAICurrentChan(
                self.handle,
                physical.as_ptr(),
                empty.as_ptr(),
                sys::DAQmx_Val_Cfg_Default,
                min,
                max,
                sys::DAQmx_Val_Amps,
                sys::DAQmx_Val_Default,
                249.0,
                ptr::null(),
            )
        };
        check(status, Some(physical_channel))?;
        self.register(physical_channel);
        Ok(())
    }

    fn add_ai_accel_chan(
        &mut self,
        physical_channel: &str,
        min: f64,
        max: f64,
        params: AccelParams,
    ) -> DriverResult<()> {
        let units = match params.units {
            AccelUnits::G => sys::DAQmx_Val_AccelUnit_g,
        };
        let sensitivity_units = match params.sensitivity_units {
            AccelSensitivityUnits::MillivoltsPerG => sys::DAQmx_Val_mVoltsPerG,
        };
        let physical = c_string(physical_channel)?;
        let empty = c_string("")?;
        // SAFETY: handle is a live task; all strings outlive the call
        let status = unsafe {
            sys::DAQmxCreateAIAccelChan(
                self.handle,
                physical.as_ptr(),
                empty.as_ptr(),
                sys::DAQmx_Val_Cfg_Default,
                min,
                max,
                units,
                params.sensitivity,
                sensitivity_units,
                sys::DAQmx_Val_Internal,
                params.current_excit_val,
                ptr::null(),
            )
        };
        check(status, Some(physical_channel))?;
        self.register(physical_channel);
        Ok(())
    }

    fn configure_timing(&mut self, clock: SampleClock) -> DriverResult<()> {
        let mode = match clock.mode {
            AcquisitionMode::Continuous => sys::DAQmx_Val_ContSamps,
            AcquisitionMode::Finite => sys::DAQmx_Val_FiniteSamps,
        };
        let source = c_string("")?;
        // SAFETY: handle is a live task; source outlives the call
        let status = unsafe {
            sys::DAQmxCfgSampClkTiming(
                self.handle,
                source.as_ptr(),
                clock.rate,
                sys::DAQmx_Val_Rising,
                mode,
                u64::from(clock.samples_per_channel),
            )
        };
        check(status, None)?;
        debug!(
            task = %self.name,
            rate = clock.rate,
            samples_per_channel = clock.samples_per_channel,
            "Configured sample clock"
        );
        Ok(())
    }

    fn start(&mut self) -> DriverResult<()> {
        // SAFETY: handle is a live task
        check(unsafe { sys::DAQmxStartTask(self.handle) }, None)?;
        self.running = true;
        debug!(task = %self.name, "Started NI-DAQmx task");
        Ok(())
    }

    fn read(&mut self, samples_per_channel: usize) -> DriverResult<ChannelData> {
        if !self.running {
            return Err(DriverError::NotRunning);
        }
        let n_channels = self.channels.len();
        let total = samples_per_channel * n_channels;
        let requested = i32::try_from(samples_per_channel)
            .map_err(|_| DriverError::invalid("samples per channel exceeds i32"))?;
        let array_len = u32::try_from(total)
            .map_err(|_| DriverError::invalid("read buffer exceeds u32 samples"))?;

        let mut buffer = vec![0.0_f64; total];
        let mut read_per_channel: i32 = 0;
        // SAFETY: buffer holds array_len values; read_per_channel is a valid out pointer
        let status = unsafe {
            sys::DAQmxReadAnalogF64(
                self.handle,
                requested,
                READ_TIMEOUT_SECS,
                sys::DAQmx_Val_GroupByChannel,
                buffer.as_mut_ptr(),
                array_len,
                &mut read_per_channel,
                ptr::null_mut(),
            )
        };
        check(status, None)?;

        let got = usize::try_from(read_per_channel).unwrap_or(0);
        if got != samples_per_channel {
            return Err(DriverError::ReadFailed {
                message: format!(
                    "expected {} samples per channel, got {}",
                    samples_per_channel, got
                ),
            });
        }

        if n_channels == 1 {
            return Ok(ChannelData::Flat(buffer));
        }
        Ok(ChannelData::PerChannel(
            buffer.chunks(samples_per_channel.max(1)).map(<[f64]>::to_vec).collect(),
        ))
    }

    fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Drop for NiDaqmxTask {
    fn drop(&mut self) {
        debug!(task = %self.name, "Clearing NI-DAQmx task");
        // SAFETY: handle is valid and owned by this task; it is not used after clear
        unsafe {
            if self.running && sys::DAQmxStopTask(self.handle) < 0 {
                warn!(task = %self.name, "Error stopping NI-DAQmx task");
            }
            if sys::DAQmxClearTask(self.handle) < 0 {
                warn!(task = %self.name, "Error clearing NI-DAQmx task");
            }
        }
    }
}

fn c_string(value: &str) -> DriverResult<CString> {
    CString::new(value)
        .map_err(|_| DriverError::invalid(format!("'{}' contains a NUL byte", value)))
}

/// Map an NI status code to a result. Positive codes are warnings.
fn check(status: i32, channel: Option<&str>) -> DriverResult<()> {
    if status == 0 {
        return Ok(());
    }
    let message = extended_error_info();
    if status > 0 {
        warn!(code = status, %message, "NI-DAQmx warning");
        return Ok(());
    }
    match channel {
        Some(channel) if status == ERR_RESOURCE_RESERVED => Err(DriverError::ChannelInUse {
            channel: channel.to_string(),
        }),
        _ => Err(DriverError::Device { code: status, message }),
    }
}

fn extended_error_info() -> String {
    let mut buffer = vec![0 as c_char; ERROR_BUFFER_LEN];
    // SAFETY: buffer is writable for ERROR_BUFFER_LEN bytes and NI null-terminates it
    unsafe {
        if sys::DAQmxGetExtendedErrorInfo(buffer.as_mut_ptr(), ERROR_BUFFER_LEN as u32) < 0 {
            return "unknown NI-DAQmx error".to_string();
        }
        CStr::from_ptr(buffer.as_ptr()).to_string_lossy().into_owned()
    }
}
