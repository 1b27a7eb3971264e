//! Per-entity aggregation of extracted records.
//!
//! A `ParseState` belongs to exactly one parse pass. File-sharing entities
//! keep a running aggregate; web entities keep their full measurement list
//! so per-class means can be taken at the end.

use std::collections::{BTreeMap, HashMap};

use super::error::FieldError;
use super::types::*;

/// Nanoseconds per second
const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Goodput in kbps for `bytes` moved over `elapsed_nanos`.
///
/// `None` when no time elapsed.
pub fn goodput_kbps(bytes: u64, elapsed_nanos: SimNanos) -> Option<f64> {
    if elapsed_nanos <= 0 {
        return None;
    }
    Some(bytes as f64 * 8.0 / 1000.0 / (elapsed_nanos as f64 / NANOS_PER_SEC))
}

fn checked_bytes(total: u64, bytes: u64, what: &'static str) -> Result<u64, FieldError> {
    total
        .checked_add(bytes)
        .ok_or_else(|| FieldError::out_of_range(what, total, bytes))
}

/// Aggregation state for one log file
#[derive(Debug, Default)]
pub struct ParseState {
    file_sharers: HashMap<String, EntityAggregate>,
    web_browsers: HashMap<String, Vec<WebMeasurement>>,
    /// Per-request goodput of file-sharing measurements, kbps
    request_goodput: BTreeMap<PriorityClass, Vec<f64>>,
    relay_capacities: Vec<RelayCapacity>,
    heartbeats: Vec<HeartbeatSample>,
    traffic: TrafficTotals,
    records: usize,
}

impl ParseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty every collection so the state can serve another pass
    pub fn reset(&mut self) {
        self.file_sharers.clear();
        self.web_browsers.clear();
        self.request_goodput.clear();
        self.relay_capacities.clear();
        self.heartbeats.clear();
        self.traffic = TrafficTotals::default();
        self.records = 0;
    }

    /// Fold one record into the state.
    ///
    /// A record whose totals or timing would overflow is rejected and leaves
    /// the state untouched.
    pub fn observe(&mut self, fields: RecordFields) -> Result<(), FieldError> {
        match fields {
            RecordFields::FileSharer(fs) => self.observe_file_sharer(fs)?,
            RecordFields::WebBrowser(web) => self.observe_web_browser(web)?,
            RecordFields::Heartbeat(hb) => self.heartbeats.push(hb),
            RecordFields::ConnectionSummary(summary) => {
                self.traffic.web_connections = Some(summary.web_connections);
                self.traffic.file_sharer_connections = Some(summary.file_sharer_connections);
            }
        }
        self.records += 1;
        Ok(())
    }

    fn observe_file_sharer(&mut self, fs: FileSharerFields) -> Result<(), FieldError> {
        let total = checked_bytes(self.traffic.file_sharer_bytes, fs.bytes, "file-sharing byte total")?;

        let (start_nanos, cumulative_bytes) = match self.file_sharers.get(&fs.entity_id) {
            Some(entity) => (entity.start_nanos, entity.cumulative_bytes),
            // back-computed from the first request's own rtt token
            None => (
                fs.timestamp_nanos
                    .checked_sub(fs.rtt_millis)
                    .ok_or_else(|| FieldError::out_of_range("start time", fs.timestamp_nanos, fs.rtt_millis))?,
                0,
            ),
        };
        fs.timestamp_nanos
            .checked_sub(start_nanos)
            .ok_or_else(|| FieldError::out_of_range("elapsed time", fs.timestamp_nanos, start_nanos))?;
        let cumulative_bytes = checked_bytes(cumulative_bytes, fs.bytes, "entity byte total")?;

        self.traffic.file_sharer_bytes = total;
        let relay_capacities = &mut self.relay_capacities;
        let entity = self
            .file_sharers
            .entry(fs.entity_id.clone())
            .or_insert_with(|| {
                if let Some(capacity) = fs.relay_capacity {
                    relay_capacities.push(capacity);
                }
                EntityAggregate {
                    role: fs.role,
                    declared_bandwidth_kbps: fs.declared_bandwidth_kbps,
                    start_nanos,
                    end_nanos: fs.timestamp_nanos,
                    cumulative_bytes: 0,
                }
            });
        entity.end_nanos = fs.timestamp_nanos;
        entity.cumulative_bytes = cumulative_bytes;

        if fs.rtt_millis > 0 {
            let secs = fs.rtt_millis as f64 / 1000.0;
            let kbps = fs.bytes as f64 * 8.0 / 1000.0 / secs;
            self.request_goodput.entry(fs.priority).or_default().push(kbps);
        }
        Ok(())
    }

    fn observe_web_browser(&mut self, web: WebBrowserFields) -> Result<(), FieldError> {
        if let Some(bytes) = web.bytes {
            self.traffic.web_bytes = checked_bytes(self.traffic.web_bytes, bytes, "web byte total")?;
        }

        let measurement = WebMeasurement {
            rtt_millis: web.rtt_millis,
            priority: web.priority,
        };
        match self.web_browsers.get_mut(&web.entity_id) {
            Some(list) => list.push(measurement),
            None => {
                if let Some(capacity) = web.relay_capacity {
                    self.relay_capacities.push(capacity);
                }
                self.web_browsers.insert(web.entity_id, vec![measurement]);
            }
        }
        Ok(())
    }

    /// Number of records folded in since construction or the last reset
    pub fn records(&self) -> usize {
        self.records
    }

    pub fn file_sharer_count(&self) -> usize {
        self.file_sharers.len()
    }

    pub fn web_browser_count(&self) -> usize {
        self.web_browsers.len()
    }

    pub fn heartbeats(&self) -> &[HeartbeatSample] {
        &self.heartbeats
    }

    pub fn relay_capacities(&self) -> &[RelayCapacity] {
        &self.relay_capacities
    }

    /// Goodput and utilization per file-sharing entity.
    ///
    /// Entities without positive declared bandwidth or elapsed time are left out.
    pub fn finalize(&self) -> HashMap<String, EntitySummary> {
        self.file_sharers
            .iter()
            .filter(|(_, agg)| agg.declared_bandwidth_kbps > 0.0)
            .filter_map(|(id, agg)| {
                let elapsed = agg.end_nanos.checked_sub(agg.start_nanos)?;
                let goodput = goodput_kbps(agg.cumulative_bytes, elapsed)?;
                Some((
                    id.clone(),
                    EntitySummary {
                        entity_id: id.clone(),
                        role: agg.role,
                        declared_bandwidth_kbps: agg.declared_bandwidth_kbps,
                        start_nanos: agg.start_nanos,
                        end_nanos: agg.end_nanos,
                        cumulative_bytes: agg.cumulative_bytes,
                        goodput_kbps: goodput,
                        utilization_percent: goodput / agg.declared_bandwidth_kbps * 100.0,
                    },
                ))
            })
            .collect()
    }

    /// Mean web RTT per entity for one class, in milliseconds.
    ///
    /// Entities with no measurement of the class are left out.
    pub fn web_rtt_means(&self, class: PriorityClass) -> HashMap<String, f64> {
        self.web_browsers
            .iter()
            .filter_map(|(id, list)| {
                let (total, count) = list
                    .iter()
                    .filter(|m| m.priority == class)
                    .fold((0.0, 0usize), |(total, count), m| (total + m.rtt_millis, count + 1));
                (count > 0).then(|| (id.clone(), total / count as f64))
            })
            .collect()
    }

    /// Every web RTT of one class, in milliseconds, in no particular order
    pub fn web_request_rtts(&self, class: PriorityClass) -> Vec<f64> {
        self.web_browsers
            .values()
            .flatten()
            .filter(|m| m.priority == class)
            .map(|m| m.rtt_millis)
            .collect()
    }

    /// Every per-request file-sharing goodput of one class, in kbps
    pub fn request_goodput(&self, class: PriorityClass) -> &[f64] {
        self.request_goodput.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Traffic totals with entity counts filled in
    pub fn traffic(&self) -> TrafficTotals {
        TrafficTotals {
            web_entities: self.web_browsers.len(),
            file_sharer_entities: self.file_sharers.len(),
            ..self.traffic.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs(id: &str, ts: SimNanos, bytes: u64, rtt: i64, bw: f64, role: EntityRole) -> RecordFields {
        RecordFields::FileSharer(FileSharerFields {
            entity_id: id.to_string(),
            role,
            priority: PriorityClass::Normal,
            timestamp_nanos: ts,
            declared_bandwidth_kbps: bw,
            bytes,
            rtt_millis: rtt,
            relay_capacity: None,
        })
    }

    fn feed(state: &mut ParseState, fields: RecordFields) {
        state.observe(fields).unwrap();
    }

    fn web(id: &str, rtt: f64, priority: PriorityClass) -> RecordFields {
        RecordFields::WebBrowser(WebBrowserFields {
            entity_id: id.to_string(),
            priority,
            timestamp_nanos: 0,
            rtt_millis: rtt,
            bytes: Some(10),
            relay_capacity: None,
        })
    }

    #[test]
    fn test_goodput_and_utilization() {
        let mut state = ParseState::new();
        // start = 1_000_000_500 - 500; end - start = 1s
        feed(&mut state, fs("X", 1_000_000_500, 1000, 500, 100.0, EntityRole::FileSharerClient));
        feed(&mut state, fs("X", 2_000_000_000, 2000, 700, 999.0, EntityRole::FileSharerRelay));

        let summaries = state.finalize();
        let x = &summaries["X"];
        assert_eq!(x.role, EntityRole::FileSharerClient);
        assert_eq!(x.declared_bandwidth_kbps, 100.0);
        assert_eq!(x.start_nanos, 1_000_000_000);
        assert_eq!(x.end_nanos, 2_000_000_000);
        assert_eq!(x.cumulative_bytes, 3000);
        assert!((x.goodput_kbps - 24.0).abs() < 1e-9);
        assert!((x.utilization_percent - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_bandwidth_and_zero_elapsed_excluded() {
        let mut state = ParseState::new();
        feed(&mut state, fs("zero-bw", 10, 100, 5, 0.0, EntityRole::FileSharerClient));
        feed(&mut state, fs("zero-bw", 20, 100, 5, 0.0, EntityRole::FileSharerClient));
        feed(&mut state, fs("instant", 10, 100, 0, 50.0, EntityRole::FileSharerRelay));
        feed(&mut state, fs("ok", 10, 100, 10, 50.0, EntityRole::FileSharerRelay));

        let summaries = state.finalize();
        assert_eq!(summaries.len(), 1);
        assert!(summaries.contains_key("ok"));
        assert!(summaries.values().all(|s| s.utilization_percent.is_finite()));
    }

    #[test]
    fn test_request_goodput_skips_zero_rtt() {
        let mut state = ParseState::new();
        feed(&mut state, fs("a", 10, 1000, 1000, 50.0, EntityRole::FileSharerClient));
        feed(&mut state, fs("a", 20, 1000, 0, 50.0, EntityRole::FileSharerClient));
        assert_eq!(state.request_goodput(PriorityClass::Normal), &[8.0]);
        assert!(state.request_goodput(PriorityClass::HighThroughput).is_empty());
    }

    #[test]
    fn test_web_rtt_means_per_class() {
        let mut state = ParseState::new();
        feed(&mut state, web("a", 1000.0, PriorityClass::Normal));
        feed(&mut state, web("a", 3000.0, PriorityClass::Normal));
        feed(&mut state, web("a", 500.0, PriorityClass::LowLatency));
        feed(&mut state, web("b", 4000.0, PriorityClass::Normal));

        let normal = state.web_rtt_means(PriorityClass::Normal);
        assert_eq!(normal.len(), 2);
        assert_eq!(normal["a"], 2000.0);
        assert_eq!(normal["b"], 4000.0);

        let ll = state.web_rtt_means(PriorityClass::LowLatency);
        assert_eq!(ll.len(), 1);
        assert_eq!(ll["a"], 500.0);

        assert!(state.web_rtt_means(PriorityClass::HighThroughput).is_empty());

        let mut all = state.web_request_rtts(PriorityClass::Normal);
        all.sort_by(f64::total_cmp);
        assert_eq!(all, vec![1000.0, 3000.0, 4000.0]);
    }

    #[test]
    fn test_relay_capacity_recorded_once_per_entity() {
        let capacity = RelayCapacity {
            down_kbps: 10.0,
            up_kbps: 20.0,
            contributed_kbps: 5.0,
        };
        let mut state = ParseState::new();
        for ts in [10, 20] {
            feed(&mut state, RecordFields::FileSharer(FileSharerFields {
                entity_id: "r".to_string(),
                role: EntityRole::FileSharerRelay,
                priority: PriorityClass::Normal,
                timestamp_nanos: ts,
                declared_bandwidth_kbps: 10.0,
                bytes: 1,
                rtt_millis: 1,
                relay_capacity: Some(capacity),
            }));
        }
        assert_eq!(state.relay_capacities(), &[capacity]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = ParseState::new();
        feed(&mut state, fs("X", 10, 100, 5, 50.0, EntityRole::FileSharerClient));
        feed(&mut state, web("w", 100.0, PriorityClass::Normal));
        feed(&mut state, RecordFields::ConnectionSummary(ConnectionSummaryFields {
            web_connections: 3.0,
            file_sharer_connections: 1.0,
        }));

        state.reset();
        assert_eq!(state.records(), 0);
        assert!(state.finalize().is_empty());
        assert!(state.web_rtt_means(PriorityClass::Normal).is_empty());
        assert!(state.heartbeats().is_empty());
        assert_eq!(state.traffic(), TrafficTotals::default());

        feed(&mut state, fs("Y", 20, 100, 5, 50.0, EntityRole::FileSharerClient));
        let summaries = state.finalize();
        assert!(!summaries.contains_key("X"));
        assert!(summaries.contains_key("Y"));
    }

    #[test]
    fn test_traffic_totals() {
        let mut state = ParseState::new();
        feed(&mut state, fs("X", 10, 100, 5, 50.0, EntityRole::FileSharerClient));
        feed(&mut state, web("w", 100.0, PriorityClass::Normal));
        feed(&mut state, web("w", 100.0, PriorityClass::Normal));

        let traffic = state.traffic();
        assert_eq!(traffic.file_sharer_bytes, 100);
        assert_eq!(traffic.web_bytes, 20);
        assert_eq!(traffic.file_sharer_entities, 1);
        assert_eq!(traffic.web_entities, 1);
        assert_eq!(traffic.web_connections, None);
    }

    #[test]
    fn test_byte_total_overflow_rejected() {
        let mut state = ParseState::new();
        feed(&mut state, fs("X", 10, u64::MAX, 5, 50.0, EntityRole::FileSharerClient));

        let err = state
            .observe(fs("X", 20, 1, 5, 50.0, EntityRole::FileSharerClient))
            .unwrap_err();
        assert!(matches!(err, FieldError::OutOfRange { .. }));
        assert!(!err.is_skippable());
        // the rejected record left no trace
        assert_eq!(state.records(), 1);
        assert_eq!(state.traffic().file_sharer_bytes, u64::MAX);
        assert_eq!(state.finalize()["X"].end_nanos, 10);
    }

    #[test]
    fn test_start_time_overflow_rejected() {
        let mut state = ParseState::new();
        let err = state
            .observe(fs("X", 9_223_372_036_854_775_000, 100, -9000, 50.0, EntityRole::FileSharerClient))
            .unwrap_err();
        assert!(matches!(err, FieldError::OutOfRange { what: "start time", .. }));
        assert_eq!(state.file_sharer_count(), 0);
        assert_eq!(state.traffic().file_sharer_bytes, 0);
    }

    #[test]
    fn test_elapsed_time_overflow_rejected() {
        let mut state = ParseState::new();
        feed(&mut state, fs("X", i64::MIN + 10, 100, 5, 50.0, EntityRole::FileSharerClient));
        let err = state
            .observe(fs("X", i64::MAX, 100, 5, 50.0, EntityRole::FileSharerClient))
            .unwrap_err();
        assert!(matches!(err, FieldError::OutOfRange { what: "elapsed time", .. }));
    }
}
