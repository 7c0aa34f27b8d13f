//! End-to-end acquisition: configuration file to published messages.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use nidaq_relay::app::{prepare, run_relay};
use nidaq_relay::compiler::compile_from_file;
use nidaq_relay::config::{DriverBackend, RelaySettings, SettingsOverrides};
use nidaq_relay::driver::simulated::{SimulatedConfig, SimulatedDriver};
use nidaq_relay::publisher::{ChannelPublisher, PublishError, Publisher};
use nidaq_relay::{AcquisitionLoop, DaqError, HeaderMapping, OutboundMessage};
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::watch;
use tracing_test::traced_test;

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

const THREE_CHANNELS: &str = "\
[DAQmxChannel_v]
ChanType = Analog Input
AI.MeasType = Voltage
PhysicalChanName = cDAQ1Mod1/ai0
AI.Min = -10
AI.Max = 10

[DAQmxChannel_c]
ChanType = Analog Input
AI.MeasType = Current
PhysicalChanName = cDAQ1Mod2/ai0
AI.Min = 0.004
AI.Max = 0.02

[DAQmxChannel_a]
ChanType = Analog Input
AI.MeasType = Accelerometer
PhysicalChanName = cDAQ1Mod3/ai0
AI.Min = -50
AI.Max = 50
AI.Accel.Sensitivity = 100
AI.Excit.Val = 0.004

[DAQmxTask]
SampClk.Rate = 2000
SampQuant.SampPerChan = 8
";

fn ini(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn settings(device_config: &NamedTempFile, mapping: &str) -> RelaySettings {
    RelaySettings::load(
        None,
        SettingsOverrides {
            rawdata_topic: Some("daq/raw".into()),
            log_level: Some("INFO".into()),
            header_mapping: Some(mapping.into()),
            device_config: Some(device_config.path().to_path_buf()),
            driver: Some(DriverBackend::Simulated),
            ..Default::default()
        },
    )
    .unwrap()
}

fn driver() -> SimulatedDriver {
    SimulatedDriver::new(SimulatedConfig::unpaced(5))
}

/// Rejects every message.
struct RejectingPublisher;

impl Publisher for RejectingPublisher {
    fn publish(&self, topic: &str, _message: &Value) -> Result<(), PublishError> {
        Err(PublishError::QueueFull {
            topic: topic.to_string(),
        })
    }
}

#[tokio::test]
async fn single_voltage_channel_publishes_ten_one_tuples() {
    let file = ini(ONE_VOLTAGE);
    let (publisher, mut rx) = ChannelPublisher::new(8);
    let mut relay =
        prepare(&driver(), &settings(&file, "{ai0: Temp}"), Arc::new(publisher)).unwrap();
    assert_eq!(relay.header(), ["Temp"]);

    relay.step().await.unwrap();

    let published = rx.recv().await.unwrap();
    assert_eq!(published.topic, "daq/raw");
    let message: OutboundMessage = serde_json::from_value(published.message.clone()).unwrap();
    assert_eq!(message.sample_rate, 1000.0);
    assert_eq!(message.data_len, 10);
    assert_eq!(message.data_header, "Temp");
    assert_eq!(message.data.len(), 10);
    assert!(message.data.iter().all(|row| row.len() == 1));
    assert!(message
        .data
        .iter()
        .all(|row| (-10.0..=10.0).contains(&row[0])));

    // Nested arrays of fixed-size arrays on the wire
    let rows = published.message["data"].as_array().unwrap();
    assert!(rows.iter().all(|r| r.as_array().map(Vec::len) == Some(1)));
    assert!(published.message["timestamp"].is_f64());
}

#[tokio::test]
#[traced_test]
async fn unmapped_channel_keeps_physical_name() {
    let file = ini(ONE_VOLTAGE);
    let (publisher, mut rx) = ChannelPublisher::new(8);
    let mut relay =
        prepare(&driver(), &settings(&file, "{ai7: Other}"), Arc::new(publisher)).unwrap();
    assert_eq!(relay.header(), ["cDAQ1Mod1/ai0"]);

    relay.step().await.unwrap();
    let published = rx.recv().await.unwrap();
    assert_eq!(published.message["data_header"], "cDAQ1Mod1/ai0");
    assert!(logs_contain("Channel not in header mapping"));
}

#[tokio::test]
async fn three_channels_keep_section_order_in_rows() {
    let file = ini(THREE_CHANNELS);
    let (publisher, mut rx) = ChannelPublisher::new(8);
    let mapping = "[{cDAQ1Mod1/ai0: Volts, cDAQ1Mod2/ai0: Amps}, {cDAQ1Mod3/ai0: Accel}]";
    let mut relay = prepare(&driver(), &settings(&file, mapping), Arc::new(publisher)).unwrap();

    let message = relay.step().await.unwrap();
    assert_eq!(message.data_header, "Volts,Amps,Accel");
    assert_eq!(message.sample_rate, 2000.0);
    assert_eq!(message.data_len, 8);
    for row in &message.data {
        assert_eq!(row.len(), 3);
        assert!((-10.0..=10.0).contains(&row[0]));
        assert!((0.004..=0.02).contains(&row[1]));
        assert!((-50.0..=50.0).contains(&row[2]));
    }
    assert_eq!(rx.recv().await.unwrap().message["data_len"], 8);
}

#[tokio::test]
#[traced_test]
async fn publish_failures_do_not_stop_the_loop() {
    let file = ini(ONE_VOLTAGE);
    let compiled = compile_from_file(&driver(), file.path(), "DAQmxChannel", "DAQmxTask").unwrap();
    let mut relay = AcquisitionLoop::new(
        compiled,
        vec!["Temp".into()],
        "daq/raw",
        Arc::new(RejectingPublisher),
    );

    for _ in 0..3 {
        relay.step().await.unwrap();
    }
    let stats = relay.stats();
    assert_eq!(stats.batches, 3);
    assert_eq!(stats.samples_per_channel_total, 30);
    assert_eq!(stats.published, 0);
    assert_eq!(stats.publish_failures, 3);
    assert!(logs_contain("Publish failed"));
}

#[tokio::test]
#[traced_test]
async fn read_failure_ends_the_loop() {
    let file = ini(ONE_VOLTAGE);
    let driver = SimulatedDriver::new(SimulatedConfig::unpaced(5).with_fail_after(2));
    let (publisher, mut rx) = ChannelPublisher::new(8);
    let (_tx, shutdown) = watch::channel(false);

    let err = run_relay(&driver, &settings(&file, "{ai0: Temp}"), Arc::new(publisher), shutdown)
        .await
        .unwrap_err();
    assert!(err.is_hardware(), "got {:?}", err);
    assert!(logs_contain("Acquisition read failed"));

    // The two good batches were published before the failure
    assert!(rx.recv().await.is_some());
    assert!(rx.recv().await.is_some());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn shutdown_signal_stops_after_current_batch() {
    let file = ini(ONE_VOLTAGE);
    let driver = SimulatedDriver::new(SimulatedConfig {
        pace_reads: true,
        ..SimulatedConfig::unpaced(5)
    });
    let (publisher, mut rx) = ChannelPublisher::new(1024);
    let (tx, shutdown) = watch::channel(false);
    let settings = settings(&file, "{ai0: Temp}");

    let stopper = tokio::spawn(async move {
        // Wait for at least one batch before asking the loop to stop
        let first = rx.recv().await;
        tx.send(true).unwrap();
        (first, rx)
    });

    let stats = tokio::time::timeout(
        Duration::from_secs(10),
        run_relay(&driver, &settings, Arc::new(publisher), shutdown),
    )
    .await
    .expect("loop did not stop")
    .unwrap();

    let (first, _rx) = stopper.await.unwrap();
    assert!(first.is_some());
    assert!(stats.batches >= 1);
    assert_eq!(stats.batches, stats.published);
}

#[tokio::test]
async fn already_cancelled_loop_reads_nothing() {
    let file = ini(ONE_VOLTAGE);
    let (publisher, _rx) = ChannelPublisher::new(1);
    let (_tx, shutdown) = watch::channel(true);
    let stats = run_relay(&driver(), &settings(&file, "{}"), Arc::new(publisher), shutdown)
        .await
        .unwrap();
    assert_eq!(stats.batches, 0);
}

#[tokio::test]
#[traced_test]
async fn simulated_driver_warns_about_synthetic_data() {
    let file = ini(ONE_VOLTAGE);
    let (publisher, _rx) = ChannelPublisher::new(1);
    let (_tx, shutdown) = watch::channel(true);
    run_relay(&driver(), &settings(&file, "{}"), Arc::new(publisher), shutdown)
        .await
        .unwrap();
    assert!(logs_contain("Simulated driver selected, publishing synthetic data"));
}

#[tokio::test]
#[traced_test]
async fn shared_short_name_keeps_physical_names() {
    let file = ini(THREE_CHANNELS);
    let (publisher, _rx) = ChannelPublisher::new(8);
    let mut relay =
        prepare(&driver(), &settings(&file, "{ai0: Temp}"), Arc::new(publisher)).unwrap();

    assert_eq!(
        relay.header(),
        ["cDAQ1Mod1/ai0", "cDAQ1Mod2/ai0", "cDAQ1Mod3/ai0"]
    );
    let message = relay.step().await.unwrap();
    assert_eq!(message.data_header, "cDAQ1Mod1/ai0,cDAQ1Mod2/ai0,cDAQ1Mod3/ai0");
    assert!(logs_contain("Short name is shared by several channels"));
}

#[tokio::test]
async fn invalid_mapping_fails_before_touching_hardware() {
    let file = ini(ONE_VOLTAGE);
    let (publisher, _rx) = ChannelPublisher::new(1);
    let err = prepare(&driver(), &settings(&file, "{ai0 Temp}"), Arc::new(publisher))
        .err()
        .unwrap();
    assert!(matches!(err, DaqError::MappingSyntax { .. }));
}

#[test]
fn quoted_and_loose_mappings_agree() {
    let loose = HeaderMapping::parse("[{cDAQ1Mod1/ai0: Temp}, {cDAQ1Mod1/ai1: Flow}]").unwrap();
    let strict =
        HeaderMapping::parse(r#"{"cDAQ1Mod1/ai0": "Temp", "cDAQ1Mod1/ai1": "Flow"}"#).unwrap();
    assert_eq!(loose, strict);
}
