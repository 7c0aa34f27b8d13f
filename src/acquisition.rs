//! Continuous acquisition loop.
//!
//! Each iteration reads one batch from the compiled task, reshapes it into
//! per-sample rows, stamps it and hands it to the publisher. Reads block, so
//! they run on tokio's blocking pool; the task moves to the worker thread and
//! back on every read, keeping a single owner at all times.
//!
//! Publish failures are logged and counted. A failed read ends the loop with
//! the driver error.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::compiler::{CompiledTask, TaskTiming};
use crate::driver::{AcquisitionTask, ChannelData};
use crate::error::{DaqError, Result};
use crate::publisher::Publisher;

/// One batch as rows: `batch[i][j]` is sample `i` of channel `j`.
pub type SampleBatch = Vec<Vec<f64>>;

/// Reshape driver output into per-sample rows.
///
/// A flat single-channel read becomes one-element rows. Per-channel data is
/// transposed; rows stop at the shortest channel.
pub fn reshape(data: ChannelData) -> SampleBatch {
    match data {
        ChannelData::Flat(values) => values.into_iter().map(|v| vec![v]).collect(),
        ChannelData::PerChannel(columns) => {
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            (0..rows)
                .map(|i| columns.iter().map(|column| column[i]).collect())
                .collect()
        }
    }
}

/// Message published once per batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Emission time, seconds since the Unix epoch
    pub timestamp: f64,
    /// Samples per second per channel
    pub sample_rate: f64,
    /// Number of rows in `data`
    pub data_len: usize,
    /// Comma-joined channel display names
    pub data_header: String,
    /// Sample rows
    pub data: SampleBatch,
}

impl OutboundMessage {
    /// Stamp a batch with the current time.
    pub fn new(sample_rate: f64, data_header: impl Into<String>, data: SampleBatch) -> Self {
        let now = Utc::now();
        Self {
            timestamp: now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) * 1e-9,
            sample_rate,
            data_len: data.len(),
            data_header: data_header.into(),
            data,
        }
    }
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    /// Batches read from the driver
    pub batches: u64,
    /// Samples per channel read in total
    pub samples_per_channel_total: u64,
    /// Messages accepted by the publisher
    pub published: u64,
    /// Messages the publisher rejected
    pub publish_failures: u64,
}

/// Reads, reshapes and publishes batches until told to stop.
pub struct AcquisitionLoop<T> {
    task: Option<T>,
    timing: TaskTiming,
    header: Vec<String>,
    data_header: String,
    topic: String,
    publisher: Arc<dyn Publisher>,
    stats: LoopStats,
}

impl<T: AcquisitionTask> AcquisitionLoop<T> {
    /// Build a loop over a compiled task.
    ///
    /// `header` holds the display name of each channel, in acquisition order.
    pub fn new(
        compiled: CompiledTask<T>,
        header: Vec<String>,
        topic: impl Into<String>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let (task, timing, channels) = compiled.into_parts();
        if header.len() != channels.len() {
            warn!(
                header = header.len(),
                channels = channels.len(),
                "Header length differs from channel count"
            );
        }
        Self {
            task: Some(task),
            timing,
            data_header: header.join(","),
            header,
            topic: topic.into(),
            publisher,
            stats: LoopStats::default(),
        }
    }

    /// Display names in acquisition order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Counters so far.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Run one iteration and return the message that was handed off.
    pub async fn step(&mut self) -> Result<OutboundMessage> {
        let mut task = self
            .task
            .take()
            .ok_or_else(|| DaqError::Worker("acquisition task was lost by a failed read".into()))?;
        let samples_per_channel = self.timing.samples_per_channel as usize;

        let (task, read) = tokio::task::spawn_blocking(move || {
            let read = task.read(samples_per_channel);
            (task, read)
        })
        .await?;
        self.task = Some(task);

        let batch = reshape(read?);
        self.stats.batches += 1;
        self.stats.samples_per_channel_total += batch.len() as u64;

        let message = OutboundMessage::new(self.timing.sample_rate, &self.data_header, batch);
        let published = serde_json::to_value(&message)
            .map_err(Into::into)
            .and_then(|value| self.publisher.publish(&self.topic, &value));
        match published {
            Ok(()) => self.stats.published += 1,
            Err(e) => {
                self.stats.publish_failures += 1;
                warn!(topic = %self.topic, error = %e, "Publish failed, continuing");
            }
        }

        debug!(batch = self.stats.batches, data_len = message.data_len, "Batch handed off");
        Ok(message)
    }

    /// Run until `shutdown` reads `true`. The flag is checked once per
    /// iteration, before each read.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) -> Result<LoopStats> {
        info!(
            topic = %self.topic,
            sample_rate = self.timing.sample_rate,
            samples_per_channel = self.timing.samples_per_channel,
            header = %self.data_header,
            "Acquisition loop running"
        );

        while !*shutdown.borrow() {
            if let Err(e) = self.step().await {
                error!(error = %e, stats = ?self.stats, "Acquisition read failed, stopping");
                return Err(e);
            }
        }

        info!(
            batches = self.stats.batches,
            samples_per_channel = self.stats.samples_per_channel_total,
            published = self.stats.published,
            publish_failures = self.stats.publish_failures,
            "Acquisition loop stopped"
        );
        Ok(self.stats)
    }
}
