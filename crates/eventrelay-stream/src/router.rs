//! `StreamRouter`: owns the numeric and string outbound streams and keeps
//! each one shaped like the records flowing through it.
//!
//! Per group, independently:
//! ```text
//!   Absent ──(group non-empty)──────────────► Active(fp)
//!   Active(fp1) ──(fingerprint fp2 ≠ fp1)───► destroy, create ► Active(fp2)
//!   Active ──(group empty)──────────────────► destroy ► Absent
//! ```
//! A rebuild always happens before the record that caused it is pushed.

use crate::config::OutletConfig;
use eventrelay_core::{
    error::SinkError,
    record::Record,
    schema::{classify, FieldGroup, GroupKind, SchemaFingerprint},
    sink::{ChannelDesc, Sample, StreamHandle, StreamInfo, StreamSink},
};
use tracing::{debug, error, info, warn};

/// Fixed stream attributes, applied to every stream the router creates.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamTemplate {
    pub name: String,
    pub content_type: String,
    pub sample_rate: f64,
    /// Suffixed with `-numeric` / `-string` per group
    pub source_id: String,
    pub numeric_unit: String,
    pub string_unit: String,
}

impl StreamTemplate {
    pub fn from_config(config: &OutletConfig) -> Self {
        Self {
            name: config.stream_name.clone(),
            content_type: config.content_type.clone(),
            sample_rate: config.sample_rate,
            source_id: config.resolved_source_id(),
            numeric_unit: config.numeric_unit.clone(),
            string_unit: config.string_unit.clone(),
        }
    }

    /// Describe a stream for `kind` with one channel per label.
    pub fn stream_info(&self, kind: GroupKind, labels: &[String]) -> StreamInfo {
        let unit = match kind {
            GroupKind::Numeric => &self.numeric_unit,
            GroupKind::Text => &self.string_unit,
        };
        StreamInfo {
            name: self.name.clone(),
            content_type: self.content_type.clone(),
            channel_count: labels.len(),
            sample_rate: self.sample_rate,
            value_type: kind.format(),
            source_id: format!("{}-{kind}", self.source_id),
            channels: labels
                .iter()
                .map(|label| ChannelDesc {
                    label: label.clone(),
                    unit: unit.clone(),
                    content_type: self.content_type.clone(),
                })
                .collect(),
        }
    }
}

impl Default for StreamTemplate {
    fn default() -> Self {
        Self::from_config(&OutletConfig::default())
    }
}

/// A live outbound stream and the group shape it was built for.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveStream {
    handle: StreamHandle,
    fingerprint: SchemaFingerprint,
}

impl ActiveStream {
    pub fn handle(&self) -> StreamHandle {
        self.handle
    }

    pub fn fingerprint(&self) -> &SchemaFingerprint {
        &self.fingerprint
    }

    /// Channel labels, in channel order.
    pub fn labels(&self) -> &[String] {
        self.fingerprint.names()
    }

    pub fn channel_count(&self) -> usize {
        self.fingerprint.channel_count()
    }
}

/// Counters kept by the router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub streams_created: u64,
    pub streams_destroyed: u64,
    pub samples_pushed: u64,
    pub heartbeats: u64,
    pub push_errors: u64,
    pub push_retries: u64,
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Groups whose sample was accepted
    pub pushed: usize,
    /// Streams (re)created while routing
    pub rebuilt: usize,
    /// Groups whose sample was finally dropped
    pub failed: usize,
}

/// Routes records onto at most one numeric and one string stream.
pub struct StreamRouter<S: StreamSink> {
    sink: S,
    template: StreamTemplate,
    numeric: Option<ActiveStream>,
    text: Option<ActiveStream>,
    last_total: usize,
    stats: RouterStats,
}

impl<S: StreamSink> StreamRouter<S> {
    pub fn new(sink: S, template: StreamTemplate) -> Self {
        Self {
            sink,
            template,
            numeric: None,
            text: None,
            last_total: 0,
            stats: RouterStats::default(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn template(&self) -> &StreamTemplate {
        &self.template
    }

    /// Sink clock.
    pub fn now(&self) -> f64 {
        self.sink.now()
    }

    pub fn active(&self, kind: GroupKind) -> Option<&ActiveStream> {
        match kind {
            GroupKind::Numeric => self.numeric.as_ref(),
            GroupKind::Text => self.text.as_ref(),
        }
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Route one record: rebuild streams whose shape changed, then push the
    /// record's values on every active stream with `timestamp`.
    ///
    /// Never fails; push problems are logged and counted.
    pub fn route(&mut self, record: &Record, timestamp: f64) -> RouteOutcome {
        let classified = classify(record);

        let total = classified.total_channels();
        if total != self.last_total {
            debug!(
                "Channel total changed {} -> {total}, checking both groups",
                self.last_total
            );
            self.last_total = total;
        }

        let mut outcome = RouteOutcome::default();
        for kind in GroupKind::ALL {
            self.route_group(classified.group(kind), timestamp, &mut outcome);
        }
        outcome
    }

    fn route_group(&mut self, group: &FieldGroup<'_>, timestamp: f64, outcome: &mut RouteOutcome) {
        let kind = group.kind();

        if group.is_empty() {
            if let Some(active) = self.slot_mut(kind).take() {
                self.destroy(kind, active);
            }
            return;
        }

        let stale = match self.active(kind) {
            Some(active) => !group.matches(&active.fingerprint),
            None => true,
        };
        if stale {
            if self.rebuild(group).is_err() {
                outcome.failed += 1;
                return;
            }
            outcome.rebuilt += 1;
        }

        let sample = group.sample();
        let err = match self.push_active(kind, &sample, timestamp) {
            Ok(()) => {
                outcome.pushed += 1;
                return;
            }
            Err(e) => e,
        };
        self.stats.push_errors += 1;

        match kind {
            GroupKind::Numeric => {
                warn!("Numeric push failed ({err}), rebuilding stream and retrying once");
                self.stats.push_retries += 1;
                if self.rebuild(group).is_err() {
                    outcome.failed += 1;
                    return;
                }
                outcome.rebuilt += 1;
                match self.push_active(kind, &sample, timestamp) {
                    Ok(()) => outcome.pushed += 1,
                    Err(e) => {
                        self.stats.push_errors += 1;
                        error!("Numeric push failed after rebuild, dropping sample: {e}");
                        outcome.failed += 1;
                    }
                }
            }
            GroupKind::Text => {
                error!("String push failed, dropping sample: {err}");
                outcome.failed += 1;
            }
        }
    }

    /// Replace the stream for `group.kind()` with one shaped for `group`.
    fn rebuild(&mut self, group: &FieldGroup<'_>) -> Result<(), SinkError> {
        let kind = group.kind();
        if let Some(old) = self.slot_mut(kind).take() {
            self.destroy(kind, old);
        }

        let fingerprint = group.fingerprint();
        let info = self.template.stream_info(kind, fingerprint.names());
        match self.sink.create_stream(&info) {
            Ok(handle) => {
                self.stats.streams_created += 1;
                info!(
                    "{kind} stream {handle} set up, channelCount: {} {:?}",
                    fingerprint.channel_count(),
                    fingerprint.names()
                );
                *self.slot_mut(kind) = Some(ActiveStream {
                    handle,
                    fingerprint,
                });
                Ok(())
            }
            Err(e) => {
                error!("Failed to create {kind} stream for {fingerprint}: {e}");
                Err(e)
            }
        }
    }

    fn destroy(&mut self, kind: GroupKind, active: ActiveStream) {
        match self.sink.destroy_stream(active.handle) {
            Ok(()) => {
                self.stats.streams_destroyed += 1;
                info!("{kind} stream {} destroyed", active.handle);
            }
            Err(e) => warn!("Error destroying {kind} stream {}: {e}", active.handle),
        }
    }

    /// Push onto the active stream of `kind`, after checking the sample
    /// still matches that stream's channel count.
    fn push_active(&mut self, kind: GroupKind, sample: &Sample, timestamp: f64) -> Result<(), SinkError> {
        let (handle, channels) = match self.active(kind) {
            Some(active) => (active.handle, active.channel_count()),
            None => return Err(SinkError::Rejected(format!("no active {kind} stream"))),
        };
        if sample.len() != channels {
            return Err(SinkError::ChannelMismatch {
                expected: channels,
                got: sample.len(),
            });
        }
        self.sink.push(handle, sample, timestamp, true)?;
        self.stats.samples_pushed += 1;
        Ok(())
    }

    fn slot_mut(&mut self, kind: GroupKind) -> &mut Option<ActiveStream> {
        match kind {
            GroupKind::Numeric => &mut self.numeric,
            GroupKind::Text => &mut self.text,
        }
    }

    /// `(kind, handle, channel count)` for every active stream.
    pub(crate) fn active_shapes(&self) -> Vec<(GroupKind, StreamHandle, usize)> {
        GroupKind::ALL
            .into_iter()
            .filter_map(|kind| {
                self.active(kind)
                    .map(|a| (kind, a.handle, a.channel_count()))
            })
            .collect()
    }

    pub(crate) fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub(crate) fn stats_mut(&mut self) -> &mut RouterStats {
        &mut self.stats
    }

    /// Destroy both streams, if active. Safe to call more than once.
    pub fn release_all(&mut self) {
        for kind in GroupKind::ALL {
            if let Some(active) = self.slot_mut(kind).take() {
                self.destroy(kind, active);
            }
        }
    }
}

impl<S: StreamSink> Drop for StreamRouter<S> {
    fn drop(&mut self) {
        self.release_all();
    }
}
