//! Core data types for simulator log analysis.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Simulation timestamp in nanoseconds since simulation start
pub type SimNanos = i64;

/// Historical layout of simulator measurement lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LogVariant {
    /// Lines tagged with "rtt measurement:", ids terminated by '[' and
    /// bandwidth written as ".../<bw>k"
    #[default]
    RttMeasurement,
    /// One line per finished request, ids terminated by '(' and role tags
    /// (FSCLIENT, FSRELAY, ...) on the line
    PerRequest,
}

impl LogVariant {
    /// Character that ends the entity id inside the entity token
    pub fn id_terminator(self) -> char {
        match self {
            LogVariant::RttMeasurement => '[',
            LogVariant::PerRequest => '(',
        }
    }
}

impl std::fmt::Display for LogVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogVariant::RttMeasurement => write!(f, "rtt-measurement"),
            LogVariant::PerRequest => write!(f, "per-request"),
        }
    }
}

/// Classification of a raw log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Comment,
    Other,
    Heartbeat,
    FileSharerMeasurement,
    WebBrowserMeasurement,
    /// End-of-run "generateSummary ... connections" line
    ConnectionSummary,
}

/// Role of a simulated participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityRole {
    FileSharerClient,
    FileSharerRelay,
}

impl std::fmt::Display for EntityRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRole::FileSharerClient => write!(f, "FSC"),
            EntityRole::FileSharerRelay => write!(f, "FSR"),
        }
    }
}

/// Traffic class attached to a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityClass {
    LowLatency,
    HighThroughput,
    Normal,
}

impl PriorityClass {
    pub const ALL: [PriorityClass; 3] = [
        PriorityClass::LowLatency,
        PriorityClass::HighThroughput,
        PriorityClass::Normal,
    ];

    /// Map the simulator's data tag to a class
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "LowLatencyData" => Some(PriorityClass::LowLatency),
            "HighThroughputData" => Some(PriorityClass::HighThroughput),
            "NormalData" => Some(PriorityClass::Normal),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            PriorityClass::LowLatency => "LowLatencyData",
            PriorityClass::HighThroughput => "HighThroughputData",
            PriorityClass::Normal => "NormalData",
        }
    }
}

impl std::fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityClass::LowLatency => write!(f, "LL"),
            PriorityClass::HighThroughput => write!(f, "HT"),
            PriorityClass::Normal => write!(f, "N"),
        }
    }
}

/// One classified log line, borrowed from the line buffer
#[derive(Debug, Clone)]
pub struct LogRecord<'a> {
    pub line_number: usize,
    pub timestamp_nanos: SimNanos,
    pub kind: RecordKind,
    pub tokens: Vec<&'a str>,
}

/// Relay capacity advertised in an entity token, in kbps
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelayCapacity {
    pub down_kbps: f64,
    pub up_kbps: f64,
    pub contributed_kbps: f64,
}

/// Fields of a file-sharing measurement line
#[derive(Debug, Clone, PartialEq)]
pub struct FileSharerFields {
    pub entity_id: String,
    pub role: EntityRole,
    pub priority: PriorityClass,
    pub timestamp_nanos: SimNanos,
    /// Declared capacity, already doubled
    pub declared_bandwidth_kbps: f64,
    pub bytes: u64,
    pub rtt_millis: i64,
    pub relay_capacity: Option<RelayCapacity>,
}

/// Fields of a web-browsing measurement line
#[derive(Debug, Clone, PartialEq)]
pub struct WebBrowserFields {
    pub entity_id: String,
    pub priority: PriorityClass,
    pub timestamp_nanos: SimNanos,
    pub rtt_millis: f64,
    /// Request plus embedded-object bytes, when the line carries them
    pub bytes: Option<u64>,
    pub relay_capacity: Option<RelayCapacity>,
}

/// Periodic simulator self-report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatFields {
    pub time_minutes: i64,
    pub memory_mb: i64,
    pub msg_total: i64,
    pub msg_high_throughput: i64,
    pub msg_low_latency: i64,
    pub msg_normal: i64,
    pub dat_total: i64,
    pub dat_high_throughput: i64,
    pub dat_low_latency: i64,
    pub dat_normal: i64,
}

/// Heartbeats are collected verbatim
pub type HeartbeatSample = HeartbeatFields;

/// Connection counts from the end-of-run summary line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSummaryFields {
    pub web_connections: f64,
    pub file_sharer_connections: f64,
}

/// Typed payload of a relevant record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordFields {
    FileSharer(FileSharerFields),
    WebBrowser(WebBrowserFields),
    Heartbeat(HeartbeatFields),
    ConnectionSummary(ConnectionSummaryFields),
}

/// A single web RTT observation kept for per-class means
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMeasurement {
    pub rtt_millis: f64,
    pub priority: PriorityClass,
}

/// Running state for one file-sharing entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityAggregate {
    pub role: EntityRole,
    pub declared_bandwidth_kbps: f64,
    /// Completion of the first request minus its own rtt token
    pub start_nanos: SimNanos,
    pub end_nanos: SimNanos,
    pub cumulative_bytes: u64,
}

/// Derived metrics for one file-sharing entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity_id: String,
    pub role: EntityRole,
    pub declared_bandwidth_kbps: f64,
    pub start_nanos: SimNanos,
    pub end_nanos: SimNanos,
    pub cumulative_bytes: u64,
    pub goodput_kbps: f64,
    pub utilization_percent: f64,
}

/// Byte and connection totals for one log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficTotals {
    pub web_bytes: u64,
    pub file_sharer_bytes: u64,
    pub web_entities: usize,
    pub file_sharer_entities: usize,
    pub web_connections: Option<f64>,
    pub file_sharer_connections: Option<f64>,
}

impl TrafficTotals {
    /// Share of all bytes moved by file sharing, if any bytes were seen
    pub fn file_sharer_byte_share(&self) -> Option<f64> {
        let total = self.web_bytes + self.file_sharer_bytes;
        if total == 0 {
            None
        } else {
            Some(self.file_sharer_bytes as f64 / total as f64)
        }
    }

    /// Share of all connections opened by file sharing, if the summary line was seen
    pub fn file_sharer_connection_share(&self) -> Option<f64> {
        let web = self.web_connections?;
        let fs = self.file_sharer_connections?;
        let total = web + fs;
        if total > 0.0 {
            Some(fs / total)
        } else {
            None
        }
    }
}

/// Named series emitted by one parse pass, in file row order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeriesKey {
    WebRttNormal,
    WebRttLowLatency,
    WebRttHighThroughput,
    WebRequestRttNormal,
    WebRequestRttLowLatency,
    WebRequestRttHighThroughput,
    RelayGoodput,
    RelayUtilization,
    ClientGoodput,
    ClientUtilization,
    HeartbeatTime,
    Memory,
    MessagesTotal,
    MessagesHighThroughput,
    MessagesLowLatency,
    MessagesNormal,
    DatagramsTotal,
    DatagramsHighThroughput,
    DatagramsLowLatency,
    DatagramsNormal,
    RelayBandwidthDown,
    RelayBandwidthUp,
    RelayBandwidthContributed,
    RequestGoodputHighThroughput,
    RequestGoodputLowLatency,
    RequestGoodputNormal,
}

impl SeriesKey {
    pub const ALL: [SeriesKey; 26] = [
        SeriesKey::WebRttNormal,
        SeriesKey::WebRttLowLatency,
        SeriesKey::WebRttHighThroughput,
        SeriesKey::WebRequestRttNormal,
        SeriesKey::WebRequestRttLowLatency,
        SeriesKey::WebRequestRttHighThroughput,
        SeriesKey::RelayGoodput,
        SeriesKey::RelayUtilization,
        SeriesKey::ClientGoodput,
        SeriesKey::ClientUtilization,
        SeriesKey::HeartbeatTime,
        SeriesKey::Memory,
        SeriesKey::MessagesTotal,
        SeriesKey::MessagesHighThroughput,
        SeriesKey::MessagesLowLatency,
        SeriesKey::MessagesNormal,
        SeriesKey::DatagramsTotal,
        SeriesKey::DatagramsHighThroughput,
        SeriesKey::DatagramsLowLatency,
        SeriesKey::DatagramsNormal,
        SeriesKey::RelayBandwidthDown,
        SeriesKey::RelayBandwidthUp,
        SeriesKey::RelayBandwidthContributed,
        SeriesKey::RequestGoodputHighThroughput,
        SeriesKey::RequestGoodputLowLatency,
        SeriesKey::RequestGoodputNormal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SeriesKey::WebRttNormal => "web_rtt_normal",
            SeriesKey::WebRttLowLatency => "web_rtt_low_latency",
            SeriesKey::WebRttHighThroughput => "web_rtt_high_throughput",
            SeriesKey::WebRequestRttNormal => "web_request_rtt_normal",
            SeriesKey::WebRequestRttLowLatency => "web_request_rtt_low_latency",
            SeriesKey::WebRequestRttHighThroughput => "web_request_rtt_high_throughput",
            SeriesKey::RelayGoodput => "relay_goodput",
            SeriesKey::RelayUtilization => "relay_utilization",
            SeriesKey::ClientGoodput => "client_goodput",
            SeriesKey::ClientUtilization => "client_utilization",
            SeriesKey::HeartbeatTime => "heartbeat_time",
            SeriesKey::Memory => "memory",
            SeriesKey::MessagesTotal => "messages_total",
            SeriesKey::MessagesHighThroughput => "messages_high_throughput",
            SeriesKey::MessagesLowLatency => "messages_low_latency",
            SeriesKey::MessagesNormal => "messages_normal",
            SeriesKey::DatagramsTotal => "datagrams_total",
            SeriesKey::DatagramsHighThroughput => "datagrams_high_throughput",
            SeriesKey::DatagramsLowLatency => "datagrams_low_latency",
            SeriesKey::DatagramsNormal => "datagrams_normal",
            SeriesKey::RelayBandwidthDown => "relay_bandwidth_down",
            SeriesKey::RelayBandwidthUp => "relay_bandwidth_up",
            SeriesKey::RelayBandwidthContributed => "relay_bandwidth_contributed",
            SeriesKey::RequestGoodputHighThroughput => "request_goodput_high_throughput",
            SeriesKey::RequestGoodputLowLatency => "request_goodput_low_latency",
            SeriesKey::RequestGoodputNormal => "request_goodput_normal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        SeriesKey::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Axis unit, for reports
    pub fn unit(self) -> &'static str {
        match self {
            SeriesKey::WebRttNormal
            | SeriesKey::WebRttLowLatency
            | SeriesKey::WebRttHighThroughput
            | SeriesKey::WebRequestRttNormal
            | SeriesKey::WebRequestRttLowLatency
            | SeriesKey::WebRequestRttHighThroughput => "s",
            SeriesKey::RelayUtilization | SeriesKey::ClientUtilization => "%",
            SeriesKey::HeartbeatTime => "min",
            SeriesKey::Memory => "MB",
            SeriesKey::MessagesTotal
            | SeriesKey::MessagesHighThroughput
            | SeriesKey::MessagesLowLatency
            | SeriesKey::MessagesNormal
            | SeriesKey::DatagramsTotal
            | SeriesKey::DatagramsHighThroughput
            | SeriesKey::DatagramsLowLatency
            | SeriesKey::DatagramsNormal => "count",
            _ => "kbps",
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Every series produced from one log file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMetrics {
    /// Path of the log the series were parsed from
    pub source: String,
    pub series: BTreeMap<SeriesKey, Vec<f64>>,
    pub traffic: TrafficTotals,
}

impl FileMetrics {
    pub fn get(&self, key: SeriesKey) -> &[f64] {
        self.series.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Series in file row order
    pub fn ordered(&self) -> impl Iterator<Item = (SeriesKey, &[f64])> + '_ {
        SeriesKey::ALL.iter().map(move |k| (*k, self.get(*k)))
    }
}
