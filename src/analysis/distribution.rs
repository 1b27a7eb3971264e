//! Empirical distributions and heartbeat time series.

use std::collections::{BTreeMap, HashMap};

use super::aggregator::ParseState;
use super::types::*;

/// Sorted values forming the x-axis of an empirical CDF
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributionSeries {
    values: Vec<f64>,
}

impl DistributionSeries {
    /// Sort `values` ascending; non-finite values are dropped
    pub fn new(mut values: Vec<f64>) -> Self {
        values.retain(|v| v.is_finite());
        values.sort_by(f64::total_cmp);
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// An empty distribution means no entity qualified; plots omit it
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fractions `1/n, 2/n, ..., 1`
    pub fn y_axis(&self) -> Vec<f64> {
        cdf_y_axis(self.values.len())
    }

    pub fn points(&self) -> Vec<(f64, f64)> {
        self.values.iter().copied().zip(self.y_axis()).collect()
    }
}

/// Cumulative fractions for `n` sorted values
pub fn cdf_y_axis(n: usize) -> Vec<f64> {
    (1..=n).map(|i| i as f64 / n as f64).collect()
}

/// Sort `values` and pair element `i` (1-indexed) with `i / n`
pub fn build_cdf(values: &[f64]) -> Vec<(f64, f64)> {
    DistributionSeries::new(values.to_vec()).points()
}

/// One of the nine heartbeat counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatMetric {
    Memory,
    MessagesTotal,
    MessagesHighThroughput,
    MessagesLowLatency,
    MessagesNormal,
    DatagramsTotal,
    DatagramsHighThroughput,
    DatagramsLowLatency,
    DatagramsNormal,
}

impl HeartbeatMetric {
    pub const ALL: [HeartbeatMetric; 9] = [
        HeartbeatMetric::Memory,
        HeartbeatMetric::MessagesTotal,
        HeartbeatMetric::MessagesHighThroughput,
        HeartbeatMetric::MessagesLowLatency,
        HeartbeatMetric::MessagesNormal,
        HeartbeatMetric::DatagramsTotal,
        HeartbeatMetric::DatagramsHighThroughput,
        HeartbeatMetric::DatagramsLowLatency,
        HeartbeatMetric::DatagramsNormal,
    ];

    pub fn value(self, sample: &HeartbeatSample) -> i64 {
        match self {
            HeartbeatMetric::Memory => sample.memory_mb,
            HeartbeatMetric::MessagesTotal => sample.msg_total,
            HeartbeatMetric::MessagesHighThroughput => sample.msg_high_throughput,
            HeartbeatMetric::MessagesLowLatency => sample.msg_low_latency,
            HeartbeatMetric::MessagesNormal => sample.msg_normal,
            HeartbeatMetric::DatagramsTotal => sample.dat_total,
            HeartbeatMetric::DatagramsHighThroughput => sample.dat_high_throughput,
            HeartbeatMetric::DatagramsLowLatency => sample.dat_low_latency,
            HeartbeatMetric::DatagramsNormal => sample.dat_normal,
        }
    }

    pub fn series_key(self) -> SeriesKey {
        match self {
            HeartbeatMetric::Memory => SeriesKey::Memory,
            HeartbeatMetric::MessagesTotal => SeriesKey::MessagesTotal,
            HeartbeatMetric::MessagesHighThroughput => SeriesKey::MessagesHighThroughput,
            HeartbeatMetric::MessagesLowLatency => SeriesKey::MessagesLowLatency,
            HeartbeatMetric::MessagesNormal => SeriesKey::MessagesNormal,
            HeartbeatMetric::DatagramsTotal => SeriesKey::DatagramsTotal,
            HeartbeatMetric::DatagramsHighThroughput => SeriesKey::DatagramsHighThroughput,
            HeartbeatMetric::DatagramsLowLatency => SeriesKey::DatagramsLowLatency,
            HeartbeatMetric::DatagramsNormal => SeriesKey::DatagramsNormal,
        }
    }
}

/// Equal-length x/y sequences
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Heartbeat time (minutes) against one counter, in append order
pub fn build_time_series(heartbeats: &[HeartbeatSample], metric: HeartbeatMetric) -> TimeSeries {
    TimeSeries {
        x: heartbeats.iter().map(|h| h.time_minutes as f64).collect(),
        y: heartbeats.iter().map(|h| metric.value(h) as f64).collect(),
    }
}

/// Which per-entity value to distribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityMetric {
    Goodput,
    Utilization,
}

/// Client and relay distributions built from one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleSplit {
    pub clients: DistributionSeries,
    pub relays: DistributionSeries,
}

/// Partition file-sharing summaries by role
pub fn split_by_role(summaries: &HashMap<String, EntitySummary>, metric: EntityMetric) -> RoleSplit {
    let pick = |role: EntityRole| {
        let values = summaries
            .values()
            .filter(|s| s.role == role)
            .map(|s| match metric {
                EntityMetric::Goodput => s.goodput_kbps,
                EntityMetric::Utilization => s.utilization_percent,
            })
            .collect();
        DistributionSeries::new(values)
    };
    RoleSplit {
        clients: pick(EntityRole::FileSharerClient),
        relays: pick(EntityRole::FileSharerRelay),
    }
}

/// Per-entity mean web RTT of one class, in seconds
pub fn web_rtt_distribution(state: &ParseState, class: PriorityClass) -> DistributionSeries {
    DistributionSeries::new(
        state
            .web_rtt_means(class)
            .into_values()
            .map(|ms| ms / 1000.0)
            .collect(),
    )
}

/// Every web RTT of one class, in seconds
pub fn web_request_rtt_distribution(state: &ParseState, class: PriorityClass) -> DistributionSeries {
    DistributionSeries::new(
        state
            .web_request_rtts(class)
            .into_iter()
            .map(|ms| ms / 1000.0)
            .collect(),
    )
}

/// Relay capacities ordered by contributed bandwidth
pub fn relay_capacity_series(capacities: &[RelayCapacity]) -> [Vec<f64>; 3] {
    let mut sorted = capacities.to_vec();
    sorted.sort_by(|a, b| a.contributed_kbps.total_cmp(&b.contributed_kbps));
    [
        sorted.iter().map(|c| c.down_kbps).collect(),
        sorted.iter().map(|c| c.up_kbps).collect(),
        sorted.iter().map(|c| c.contributed_kbps).collect(),
    ]
}

impl FileMetrics {
    /// Assemble every named series from a finished parse pass
    pub fn from_state(source: &str, state: &ParseState) -> Self {
        let mut series: BTreeMap<SeriesKey, Vec<f64>> = BTreeMap::new();

        for (class, mean_key, request_key, goodput_key) in [
            (
                PriorityClass::Normal,
                SeriesKey::WebRttNormal,
                SeriesKey::WebRequestRttNormal,
                SeriesKey::RequestGoodputNormal,
            ),
            (
                PriorityClass::LowLatency,
                SeriesKey::WebRttLowLatency,
                SeriesKey::WebRequestRttLowLatency,
                SeriesKey::RequestGoodputLowLatency,
            ),
            (
                PriorityClass::HighThroughput,
                SeriesKey::WebRttHighThroughput,
                SeriesKey::WebRequestRttHighThroughput,
                SeriesKey::RequestGoodputHighThroughput,
            ),
        ] {
            series.insert(mean_key, web_rtt_distribution(state, class).into_values());
            series.insert(request_key, web_request_rtt_distribution(state, class).into_values());
            series.insert(
                goodput_key,
                DistributionSeries::new(state.request_goodput(class).to_vec()).into_values(),
            );
        }

        let summaries = state.finalize();
        let goodput = split_by_role(&summaries, EntityMetric::Goodput);
        let utilization = split_by_role(&summaries, EntityMetric::Utilization);
        series.insert(SeriesKey::RelayGoodput, goodput.relays.into_values());
        series.insert(SeriesKey::ClientGoodput, goodput.clients.into_values());
        series.insert(SeriesKey::RelayUtilization, utilization.relays.into_values());
        series.insert(SeriesKey::ClientUtilization, utilization.clients.into_values());

        let heartbeats = state.heartbeats();
        series.insert(
            SeriesKey::HeartbeatTime,
            heartbeats.iter().map(|h| h.time_minutes as f64).collect(),
        );
        for metric in HeartbeatMetric::ALL {
            series.insert(metric.series_key(), build_time_series(heartbeats, metric).y);
        }

        let [down, up, contributed] = relay_capacity_series(state.relay_capacities());
        series.insert(SeriesKey::RelayBandwidthDown, down);
        series.insert(SeriesKey::RelayBandwidthUp, up);
        series.insert(SeriesKey::RelayBandwidthContributed, contributed);

        Self {
            source: source.to_string(),
            series,
            traffic: state.traffic(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_cdf() {
        let cdf = build_cdf(&[3.0, 1.0, 2.0, 4.0]);
        assert_eq!(cdf, vec![(1.0, 0.25), (2.0, 0.5), (3.0, 0.75), (4.0, 1.0)]);
        assert!(build_cdf(&[]).is_empty());
    }

    #[test]
    fn test_cdf_properties() {
        let values: Vec<f64> = (0..37).map(|i| ((i * 7919) % 101) as f64 / 3.0).collect();
        let cdf = build_cdf(&values);
        assert_eq!(cdf.len(), values.len());
        assert!(cdf.windows(2).all(|w| w[0].0 <= w[1].0));
        assert!(cdf.windows(2).all(|w| w[0].1 < w[1].1));
        assert_eq!(cdf.last().map(|p| p.1), Some(1.0));
        assert_eq!(cdf[0].1, 1.0 / 37.0);
    }

    #[test]
    fn test_distribution_drops_non_finite() {
        let dist = DistributionSeries::new(vec![2.0, f64::NAN, 1.0, f64::INFINITY]);
        assert_eq!(dist.values(), &[1.0, 2.0]);
    }

    #[test]
    fn test_time_series_keeps_order() {
        let sample = |t: i64, mem: i64| HeartbeatSample {
            time_minutes: t,
            memory_mb: mem,
            msg_total: t * 10,
            msg_high_throughput: 0,
            msg_low_latency: 0,
            msg_normal: 0,
            dat_total: 0,
            dat_high_throughput: 0,
            dat_low_latency: 0,
            dat_normal: 0,
        };
        let heartbeats = vec![sample(2, 300), sample(1, 100), sample(3, 200)];
        let memory = build_time_series(&heartbeats, HeartbeatMetric::Memory);
        assert_eq!(memory.x, vec![2.0, 1.0, 3.0]);
        assert_eq!(memory.y, vec![300.0, 100.0, 200.0]);
        let messages = build_time_series(&heartbeats, HeartbeatMetric::MessagesTotal);
        assert_eq!(messages.y, vec![20.0, 10.0, 30.0]);
    }

    #[test]
    fn test_split_by_role() {
        let summary = |id: &str, role: EntityRole, goodput: f64| EntitySummary {
            entity_id: id.to_string(),
            role,
            declared_bandwidth_kbps: 100.0,
            start_nanos: 0,
            end_nanos: 1,
            cumulative_bytes: 1,
            goodput_kbps: goodput,
            utilization_percent: goodput,
        };
        let summaries: HashMap<String, EntitySummary> = [
            summary("a", EntityRole::FileSharerClient, 30.0),
            summary("b", EntityRole::FileSharerRelay, 10.0),
            summary("c", EntityRole::FileSharerClient, 20.0),
        ]
        .into_iter()
        .map(|s| (s.entity_id.clone(), s))
        .collect();

        let split = split_by_role(&summaries, EntityMetric::Goodput);
        assert_eq!(split.clients.values(), &[20.0, 30.0]);
        assert_eq!(split.relays.values(), &[10.0]);
    }

    #[test]
    fn test_relay_capacity_series_sorted_by_contribution() {
        let capacities = [
            RelayCapacity { down_kbps: 1.0, up_kbps: 2.0, contributed_kbps: 9.0 },
            RelayCapacity { down_kbps: 3.0, up_kbps: 4.0, contributed_kbps: 1.0 },
        ];
        let [down, up, contributed] = relay_capacity_series(&capacities);
        assert_eq!(down, vec![3.0, 1.0]);
        assert_eq!(up, vec![4.0, 2.0]);
        assert_eq!(contributed, vec![1.0, 9.0]);
    }

    #[test]
    fn test_file_metrics_from_empty_state() {
        let metrics = FileMetrics::from_state("empty.log", &ParseState::new());
        assert_eq!(metrics.series.len(), SeriesKey::ALL.len());
        assert!(metrics.ordered().all(|(_, values)| values.is_empty()));
    }
}
