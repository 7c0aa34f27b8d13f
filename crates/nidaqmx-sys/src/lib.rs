//! Low-level FFI declarations for the NI-DAQmx ANSI C library.
//!
//! Only the part of the API needed for continuous analog input acquisition is
//! declared here: task creation, voltage/current/accelerometer channel
//! creation, sample clock configuration, start/stop/clear and reading scaled
//! `float64` samples.
//!
//! # Safety
//!
//! All functions in this crate are `unsafe` as they are direct FFI bindings.
//! For a safe wrapper, use the `driver::nidaqmx` module of `nidaq-relay`.
//!
//! # Features
//!
//! - `link`: link against the installed NI-DAQmx runtime. Without this
//!   feature the declarations are available for type checking only.
//!
//! # Example (unsafe)
//!
//! ```rust,ignore
//! use nidaqmx_sys::*;
//! use std::ffi::CString;
//! use std::ptr;
//!
//! unsafe {
//!     let mut task: TaskHandle = ptr::null_mut();
//!     let name = CString::new("").unwrap();
//!     if DAQmxCreateTask(name.as_ptr(), &mut task) >= 0 {
//!         DAQmxClearTask(task);
//!     }
//! }
//! ```

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::all)]

use std::os::raw::{c_char, c_void};

/// Opaque task handle.
pub type TaskHandle = *mut c_void;
/// NI `int32`.
pub type int32 = i32;
/// NI `uInt32`.
pub type uInt32 = u32;
/// NI `uInt64`.
pub type uInt64 = u64;
/// NI `float64`.
pub type float64 = f64;
/// NI `bool32`.
pub type bool32 = u32;

// Terminal configuration
pub const DAQmx_Val_Cfg_Default: int32 = -1;

// Units
pub const DAQmx_Val_Volts: int32 = 10348;
pub const DAQmx_Val_Amps: int32 = 10342;
pub const DAQmx_Val_AccelUnit_g: int32 = 10186;
pub const DAQmx_Val_FromCustomScale: int32 = 10065;

// Accelerometer sensitivity units
pub const DAQmx_Val_mVoltsPerG: int32 = 12509;
pub const DAQmx_Val_VoltsPerG: int32 = 12510;

// Shunt resistor location / generic default
pub const DAQmx_Val_Default: int32 = -1;

// Excitation source
pub const DAQmx_Val_Internal: int32 = 10200;
pub const DAQmx_Val_External: int32 = 10167;

// Active edge
pub const DAQmx_Val_Rising: int32 = 10280;
pub const DAQmx_Val_Falling: int32 = 10171;

// Sample mode
pub const DAQmx_Val_FiniteSamps: int32 = 10178;
pub const DAQmx_Val_ContSamps: int32 = 10123;

// Fill mode
pub const DAQmx_Val_GroupByChannel: bool32 = 0;
pub const DAQmx_Val_GroupByScanNumber: bool32 = 1;

// Timeouts
pub const DAQmx_Val_WaitInfinitely: float64 = -1.0;

#[cfg_attr(all(feature = "link", not(windows)), link(name = "nidaqmx"))]
#[cfg_attr(all(feature = "link", windows), link(name = "NIDAQmx"))]
extern "C" {
    pub fn DAQmxCreateTask(taskName: *const c_char, taskHandle: *mut TaskHandle) -> int32;

    pub fn DAQmxStartTask(taskHandle: TaskHandle) -> int32;

    pub fn DAQmxStopTask(taskHandle: TaskHandle) -> int32;

    pub fn DAQmxClearTask(taskHandle: TaskHandle) -> int32;

    pub fn DAQmxCreateAIVoltageChan(
        taskHandle: TaskHandle,
        physicalChannel: *const c_char,
        nameToAssignToChannel: *const c_char,
        terminalConfig: int32,
        minVal: float64,
        maxVal: float64,
        units: int32,
        customScaleName: *const c_char,
    ) -> int32;

    pub fn DAQmxCreateAICurrentChan(
        taskHandle: TaskHandle,
        physicalChannel: *const c_char,
        nameToAssignToChannel: *const c_char,
        terminalConfig: int32,
        minVal: float64,
        maxVal: float64,
        units: int32,
        shuntResistorLoc: int32,
        extShuntResistorVal: float64,
        customScaleName: *const c_char,
    ) -> int32;

    pub fn DAQmxCreateAIAccelChan(
        taskHandle: TaskHandle,
        physicalChannel: *const c_char,
        nameToAssignToChannel: *const c_char,
        terminalConfig: int32,
        minVal: float64,
        maxVal: float64,
        units: int32,
        sensitivity: float64,
        sensitivityUnits: int32,
        currentExcitSource: int32,
        currentExcitVal: float64,
        customScaleName: *const c_char,
    ) -> int32;

    pub fn DAQmxCfgSampClkTiming(
        taskHandle: TaskHandle,
        source: *const c_char,
        rate: float64,
        activeEdge: int32,
        sampleMode: int32,
        sampsPerChan: uInt64,
    ) -> int32;

    pub fn DAQmxReadAnalogF64(
        taskHandle: TaskHandle,
        numSampsPerChan: int32,
        timeout: float64,
        fillMode: bool32,
        readArray: *mut float64,
        arraySizeInSamps: uInt32,
        sampsPerChanRead: *mut int32,
        reserved: *mut bool32,
    ) -> int32;

    pub fn DAQmxGetExtendedErrorInfo(errorString: *mut c_char, bufferSize: uInt32) -> int32;
}
