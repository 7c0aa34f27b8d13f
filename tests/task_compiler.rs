//! Device configuration compilation against the simulated driver.

use std::io::Write;
use std::path::PathBuf;

use nidaq_relay::compiler::{compile_from_file, compile_task};
use nidaq_relay::config::{extract_sections, SECTION_NAME_KEY};
use nidaq_relay::driver::simulated::{SimulatedConfig, SimulatedDriver};
use nidaq_relay::driver::AcquisitionTask;
use nidaq_relay::{DaqError, TaskTiming};
use tempfile::NamedTempFile;
use tracing_test::traced_test;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/NiDAQ.ini")
}

fn driver() -> SimulatedDriver {
    SimulatedDriver::new(SimulatedConfig::unpaced(42))
}

fn ini(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const ONE_VOLTAGE: &str = "\
[DAQmxChannel_0]
ChanType = Analog Input
AI.MeasType = Voltage
PhysicalChanName = cDAQ1Mod1/ai0
AI.Min = -10
AI.Max = 10

[DAQmxTask]
SampClk.Rate = 1000
SampQuant.SampPerChan = 10
";

#[test]
fn extracts_sections_by_prefix_in_file_order() {
    let channels = extract_sections(fixture(), "DAQmxChannel").unwrap();
    let names: Vec<_> = channels.iter().map(|s| s.name()).collect();
    assert_eq!(
        names,
        [
            "DAQmxChannel_cDAQ1Mod1_ai0",
            "DAQmxChannel_cDAQ1Mod2_ai0",
            "DAQmxChannel_cDAQ1Mod3_ai0",
            "DAQmxChannel_cDAQ1Mod4_ai0",
            "DAQmxChannel_cDAQ1Mod5_port0",
        ]
    );
    assert_eq!(channels[0].get(SECTION_NAME_KEY), Some("DAQmxChannel_cDAQ1Mod1_ai0"));
    assert_eq!(channels[0].get("Descr"), Some(r"C:\Data\inlet"));

    assert!(extract_sections(fixture(), "DAQmxScale").unwrap().is_empty());
}

#[test]
#[traced_test]
fn compiles_supported_channels_in_section_order() {
    let compiled = compile_from_file(&driver(), fixture(), "DAQmxChannel", "DAQmxTask").unwrap();

    assert_eq!(
        compiled.channel_names(),
        ["cDAQ1Mod1/ai0", "cDAQ1Mod2/ai0", "cDAQ1Mod3/ai0"]
    );
    assert_eq!(compiled.task().channel_count(), 3);
    assert_eq!(
        compiled.task().physical_channels(),
        ["cDAQ1Mod1/ai0", "cDAQ1Mod2/ai0", "cDAQ1Mod3/ai0"]
    );
    assert!(logs_contain("Skipping unsupported channel section"));
    assert!(logs_contain("cDAQ1Mod4/ai0"));
    assert!(logs_contain("cDAQ1Mod5/port0"));
}

#[test]
fn uses_first_task_section_only() {
    let compiled = compile_from_file(&driver(), fixture(), "DAQmxChannel", "DAQmxTask").unwrap();
    assert_eq!(
        compiled.timing(),
        TaskTiming {
            sample_rate: 1000.0,
            samples_per_channel: 10,
        }
    );
    let clock = compiled.task().clock().unwrap();
    assert_eq!(clock.rate, 1000.0);
    assert_eq!(clock.samples_per_channel, 10);
}

#[test]
fn accelerometer_without_sensor_parameters_fails_conversion() {
    let file = ini("\
[DAQmxChannel_acc]
ChanType = Analog Input
AI.MeasType = Accelerometer
PhysicalChanName = cDAQ1Mod3/ai0
AI.Min = -50
AI.Max = 50
AI.Excit.Val = 0.004

[DAQmxTask]
SampClk.Rate = 1000
SampQuant.SampPerChan = 10
");
    let err = compile_from_file(&driver(), file.path(), "DAQmxChannel", "DAQmxTask").unwrap_err();
    assert!(err.is_value_conversion(), "got {:?}", err);
}

#[test]
fn malformed_bound_fails_conversion() {
    let file = ini(&ONE_VOLTAGE.replace("AI.Max = 10", "AI.Max = ten"));
    let err = compile_from_file(&driver(), file.path(), "DAQmxChannel", "DAQmxTask").unwrap_err();
    match err {
        DaqError::ValueConversion { key, value, .. } => {
            assert_eq!(key, "AI.Max");
            assert_eq!(value, "ten");
        }
        other => panic!("expected conversion error, got {:?}", other),
    }
}

#[test]
fn missing_physical_name_is_missing_key() {
    let file = ini(&ONE_VOLTAGE.replace("PhysicalChanName = cDAQ1Mod1/ai0\n", ""));
    let err = compile_from_file(&driver(), file.path(), "DAQmxChannel", "DAQmxTask").unwrap_err();
    assert!(matches!(err, DaqError::MissingKey { ref key, .. } if key == "PhysicalChanName"));
}

#[test]
fn missing_task_section_is_fatal() {
    let file = ini(ONE_VOLTAGE.split("[DAQmxTask]").next().unwrap());
    let err = compile_from_file(&driver(), file.path(), "DAQmxChannel", "DAQmxTask").unwrap_err();
    assert!(matches!(err, DaqError::MissingSection { .. }));
}

#[test]
fn missing_file_is_config_error() {
    let err = compile_from_file(&driver(), "/does/not/exist.ini", "DAQmxChannel", "DAQmxTask")
        .unwrap_err();
    assert!(matches!(err, DaqError::Config { .. }));
}

#[test]
fn busy_channel_is_hardware_error() {
    let file = ini(&format!(
        "{}\n[DAQmxChannel_1]\nChanType = Analog Input\nAI.MeasType = Current\n\
         PhysicalChanName = cDAQ1Mod1/ai0\nAI.Min = 0\nAI.Max = 0.02\n",
        ONE_VOLTAGE
    ));
    let channels = extract_sections(file.path(), "DAQmxChannel").unwrap();
    let tasks = extract_sections(file.path(), "DAQmxTask").unwrap();
    let err = compile_task(&driver(), &channels, &tasks).unwrap_err();
    assert!(err.is_hardware());
}
