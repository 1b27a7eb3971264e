//! Positional field extraction for classified records.
//!
//! Token positions (0-based, single-space split):
//!
//! | kind        | fields                                                         |
//! |-------------|----------------------------------------------------------------|
//! | all         | 7 timestamp (ns), 9 entity token, 10 priority tag              |
//! | file sharer | 13 + 17 bytes, 21 rtt (ms)                                     |
//! | web browser | 13 rtt (ms), 24 + 29 bytes (optional)                          |
//! | heartbeat   | 10 `<min>/..`, 12 `<mb>M`, 13/15/17/19 msgs, 21/23/25/27 dgrams |
//! | summary     | 9 web connections, 13 file-sharer connections                  |

use std::str::FromStr;

use super::error::FieldError;
use super::types::*;

const ENTITY_TOKEN: usize = 9;
const PRIORITY_TOKEN: usize = 10;

const FS_BYTES_A: usize = 13;
const FS_BYTES_B: usize = 17;
const FS_RTT: usize = 21;

const WEB_RTT: usize = 13;
const WEB_BYTES_A: usize = 24;
const WEB_BYTES_B: usize = 29;

const HB_TIME: usize = 10;
const HB_MEMORY: usize = 12;
const HB_MESSAGES: [usize; 4] = [13, 15, 17, 19];
const HB_DATAGRAMS: [usize; 4] = [21, 23, 25, 27];

const SUMMARY_WEB: usize = 9;
const SUMMARY_FS: usize = 13;

fn token<'a>(tokens: &[&'a str], index: usize) -> Result<&'a str, FieldError> {
    tokens.get(index).copied().ok_or(FieldError::MissingToken {
        index,
        len: tokens.len(),
    })
}

fn number<T: FromStr>(tokens: &[&str], index: usize, expected: &'static str) -> Result<T, FieldError> {
    let raw = token(tokens, index)?;
    raw.parse::<T>().map_err(|_| FieldError::InvalidNumber {
        index,
        token: raw.to_string(),
        expected,
    })
}

/// Parse the part of `raw` before the first occurrence of `suffix`
fn number_before<T: FromStr>(
    tokens: &[&str],
    index: usize,
    suffix: char,
    expected: &'static str,
) -> Result<T, FieldError> {
    let raw = token(tokens, index)?;
    raw.find(suffix)
        .and_then(|end| raw[..end].parse::<T>().ok())
        .ok_or_else(|| FieldError::InvalidNumber {
            index,
            token: raw.to_string(),
            expected,
        })
}

/// Numeric prefix of a bandwidth component such as "512k]"
fn kbps_prefix(component: &str, entity_token: &str) -> Result<f64, FieldError> {
    component
        .find('k')
        .and_then(|end| component[..end].parse::<f64>().ok())
        .ok_or_else(|| FieldError::MissingBandwidth {
            token: entity_token.to_string(),
        })
}

/// Entity id: text after the last '@' up to the variant's terminator
pub fn entity_id(entity_token: &str, variant: LogVariant) -> Result<String, FieldError> {
    let missing = || FieldError::MissingEntityId {
        token: entity_token.to_string(),
    };
    let start = entity_token.rfind('@').ok_or_else(missing)? + 1;
    let end = entity_token[start..]
        .find(variant.id_terminator())
        .map(|offset| start + offset)
        .ok_or_else(missing)?;
    if end == start {
        return Err(missing());
    }
    Ok(entity_token[start..end].to_string())
}

/// Declared bandwidth of an entity in kbps, doubled for symmetric capacity.
///
/// `rtt-measurement` tokens read `...[<a>k/<b>k]` and use `<b>`.
/// `per-request` tokens read `...[<down>k[<up>k[<con>k[<extra>k...` and use
/// component 2, plus component 4 when more than four components exist.
pub fn declared_bandwidth(entity_token: &str, variant: LogVariant) -> Result<f64, FieldError> {
    let missing = || FieldError::MissingBandwidth {
        token: entity_token.to_string(),
    };
    let base = match variant {
        LogVariant::RttMeasurement => {
            let start = entity_token.rfind('/').ok_or_else(missing)? + 1;
            let end = entity_token.rfind('k').ok_or_else(missing)?;
            if end <= start {
                return Err(missing());
            }
            entity_token[start..end].parse::<f64>().map_err(|_| missing())?
        }
        LogVariant::PerRequest => {
            let parts: Vec<&str> = entity_token.split('[').collect();
            let first = parts.get(2).ok_or_else(missing)?;
            let mut sum = kbps_prefix(first, entity_token)?;
            if parts.len() > 4 {
                sum += kbps_prefix(parts[4], entity_token)?;
            }
            sum
        }
    };
    Ok(2.0 * base)
}

/// Advertised (down + contributed, up + contributed, contributed) capacity
pub fn relay_capacity(entity_token: &str) -> Result<RelayCapacity, FieldError> {
    let parts: Vec<&str> = entity_token.split('[').collect();
    if parts.len() < 4 {
        return Err(FieldError::MissingBandwidth {
            token: entity_token.to_string(),
        });
    }
    let down = kbps_prefix(parts[1], entity_token)?;
    let up = kbps_prefix(parts[2], entity_token)?;
    let contributed = kbps_prefix(parts[3], entity_token)?;
    Ok(RelayCapacity {
        down_kbps: down + contributed,
        up_kbps: up + contributed,
        contributed_kbps: contributed,
    })
}

/// Classes a per-request file sharer may carry
const PER_REQUEST_FILE_SHARER_CLASSES: [PriorityClass; 2] =
    [PriorityClass::HighThroughput, PriorityClass::Normal];
/// Classes a per-request web browser may carry
const PER_REQUEST_WEB_CLASSES: [PriorityClass; 2] = [PriorityClass::LowLatency, PriorityClass::Normal];

/// Priority tag at token 10; `allowed` narrows the accepted classes
fn priority(tokens: &[&str], allowed: Option<&[PriorityClass]>) -> Result<PriorityClass, FieldError> {
    let tag = token(tokens, PRIORITY_TOKEN)?;
    PriorityClass::from_tag(tag)
        .filter(|class| allowed.map_or(true, |allowed| allowed.contains(class)))
        .ok_or_else(|| FieldError::UnknownPriorityClass(tag.to_string()))
}

/// Sum of the two byte counters at `a` and `b`
fn byte_sum(tokens: &[&str], a: usize, b: usize) -> Result<u64, FieldError> {
    let first = number::<u64>(tokens, a, "byte count")?;
    let second = number::<u64>(tokens, b, "byte count")?;
    first
        .checked_add(second)
        .ok_or_else(|| FieldError::out_of_range("byte count", first, second))
}

fn file_sharer_role(
    entity_token: &str,
    line_tokens: &[&str],
    variant: LogVariant,
) -> Result<EntityRole, FieldError> {
    let role = match variant {
        LogVariant::RttMeasurement => {
            let app = &entity_token[..entity_token.rfind('@').unwrap_or(0)];
            if app.contains("FileSharer@Client") {
                Some(EntityRole::FileSharerClient)
            } else if app.contains("FileSharer@Relay") {
                Some(EntityRole::FileSharerRelay)
            } else {
                None
            }
        }
        LogVariant::PerRequest => {
            let has = |tag: &str| line_tokens.iter().any(|t| t.contains(tag));
            if has("FSCLIENT") {
                Some(EntityRole::FileSharerClient)
            } else if has("FSRELAY") || has("FSEXITRELAY") {
                Some(EntityRole::FileSharerRelay)
            } else {
                None
            }
        }
    };
    role.ok_or_else(|| FieldError::UnknownRole(entity_token.to_string()))
}

fn extract_file_sharer(record: &LogRecord<'_>, variant: LogVariant) -> Result<FileSharerFields, FieldError> {
    let tokens = &record.tokens;
    let entity_token = token(tokens, ENTITY_TOKEN)?;
    let entity_id = entity_id(entity_token, variant)?;
    let role = file_sharer_role(entity_token, tokens, variant)?;
    let priority = match variant {
        LogVariant::RttMeasurement => priority(tokens, None)?,
        LogVariant::PerRequest => priority(tokens, Some(&PER_REQUEST_FILE_SHARER_CLASSES))?,
    };
    let declared_bandwidth_kbps = declared_bandwidth(entity_token, variant)?;
    let bytes = byte_sum(tokens, FS_BYTES_A, FS_BYTES_B)?;
    let rtt_millis = number::<i64>(tokens, FS_RTT, "rtt in milliseconds")?;

    let relay_capacity = match (variant, role) {
        (LogVariant::PerRequest, EntityRole::FileSharerRelay) => Some(relay_capacity(entity_token)?),
        _ => None,
    };

    Ok(FileSharerFields {
        entity_id,
        role,
        priority,
        timestamp_nanos: record.timestamp_nanos,
        declared_bandwidth_kbps,
        bytes,
        rtt_millis,
        relay_capacity,
    })
}

fn extract_web_browser(record: &LogRecord<'_>, variant: LogVariant) -> Result<WebBrowserFields, FieldError> {
    let tokens = &record.tokens;
    let entity_token = token(tokens, ENTITY_TOKEN)?;
    let entity_id = entity_id(entity_token, variant)?;
    let priority = match variant {
        LogVariant::RttMeasurement => priority(tokens, None)?,
        LogVariant::PerRequest => priority(tokens, Some(&PER_REQUEST_WEB_CLASSES))?,
    };
    let rtt_millis = number::<f64>(tokens, WEB_RTT, "rtt in milliseconds")?;

    let bytes = if tokens.len() > WEB_BYTES_B {
        Some(byte_sum(tokens, WEB_BYTES_A, WEB_BYTES_B)?)
    } else {
        None
    };

    let relays = tokens
        .iter()
        .any(|t| t.contains("WEBRELAY") || t.contains("WEBEXITRELAY"));
    let relay_capacity = if variant == LogVariant::PerRequest && relays {
        Some(relay_capacity(entity_token)?)
    } else {
        None
    };

    Ok(WebBrowserFields {
        entity_id,
        priority,
        timestamp_nanos: record.timestamp_nanos,
        rtt_millis,
        bytes,
        relay_capacity,
    })
}

/// Extract the nine heartbeat counters
pub fn extract_heartbeat(tokens: &[&str]) -> Result<HeartbeatFields, FieldError> {
    let [msg_total, msg_high_throughput, msg_low_latency, msg_normal] = [
        number::<i64>(tokens, HB_MESSAGES[0], "message count")?,
        number::<i64>(tokens, HB_MESSAGES[1], "message count")?,
        number::<i64>(tokens, HB_MESSAGES[2], "message count")?,
        number::<i64>(tokens, HB_MESSAGES[3], "message count")?,
    ];
    let [dat_total, dat_high_throughput, dat_low_latency, dat_normal] = [
        number::<i64>(tokens, HB_DATAGRAMS[0], "datagram count")?,
        number::<i64>(tokens, HB_DATAGRAMS[1], "datagram count")?,
        number::<i64>(tokens, HB_DATAGRAMS[2], "datagram count")?,
        number::<i64>(tokens, HB_DATAGRAMS[3], "datagram count")?,
    ];

    Ok(HeartbeatFields {
        time_minutes: number_before(tokens, HB_TIME, '/', "heartbeat time")?,
        memory_mb: number_before(tokens, HB_MEMORY, 'M', "memory in MB")?,
        msg_total,
        msg_high_throughput,
        msg_low_latency,
        msg_normal,
        dat_total,
        dat_high_throughput,
        dat_low_latency,
        dat_normal,
    })
}

fn extract_connection_summary(tokens: &[&str]) -> Result<ConnectionSummaryFields, FieldError> {
    Ok(ConnectionSummaryFields {
        web_connections: number(tokens, SUMMARY_WEB, "connection count")?,
        file_sharer_connections: number(tokens, SUMMARY_FS, "connection count")?,
    })
}

/// Extract typed fields from a relevant record.
///
/// Returns `Ok(None)` for comments and irrelevant lines.
pub fn extract(record: &LogRecord<'_>, variant: LogVariant) -> Result<Option<RecordFields>, FieldError> {
    let fields = match record.kind {
        RecordKind::Comment | RecordKind::Other => return Ok(None),
        RecordKind::Heartbeat => RecordFields::Heartbeat(extract_heartbeat(&record.tokens)?),
        RecordKind::FileSharerMeasurement => RecordFields::FileSharer(extract_file_sharer(record, variant)?),
        RecordKind::WebBrowserMeasurement => RecordFields::WebBrowser(extract_web_browser(record, variant)?),
        RecordKind::ConnectionSummary => {
            RecordFields::ConnectionSummary(extract_connection_summary(&record.tokens)?)
        }
    };
    Ok(Some(fields))
}
