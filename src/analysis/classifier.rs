//! Line classification by embedded markers.
//!
//! Classification is pure substring containment in a fixed priority order,
//! so a line carrying several markers resolves to the first match.

use super::error::ParseError;
use super::types::{LogRecord, LogVariant, RecordKind, SimNanos};

/// Token index of the nanosecond timestamp
pub const TIMESTAMP_TOKEN: usize = 7;

const RTT_MARKER: &str = "rtt measurement:";

/// Classify a raw line without tokenizing it
pub fn classify(line: &str, variant: LogVariant) -> RecordKind {
    if line.starts_with('#') {
        return RecordKind::Comment;
    }
    if !line.contains('@') {
        return RecordKind::Other;
    }

    let measurement = match variant {
        LogVariant::RttMeasurement => line.contains(RTT_MARKER),
        LogVariant::PerRequest => true,
    };

    if line.contains("Heartbeat") {
        RecordKind::Heartbeat
    } else if line.contains("FileSharer@") && measurement {
        RecordKind::FileSharerMeasurement
    } else if line.contains("WebBrowser@") && measurement {
        RecordKind::WebBrowserMeasurement
    } else if line.contains("generateSummary") && line.contains("connections") {
        RecordKind::ConnectionSummary
    } else {
        RecordKind::Other
    }
}

/// Split a line into single-space separated tokens.
///
/// Runs of spaces yield empty tokens so positions stay fixed.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\r', '\n']).split(' ').collect()
}

/// Read the timestamp token of an '@' line
pub fn parse_timestamp(tokens: &[&str], line_number: usize) -> Result<SimNanos, ParseError> {
    let token = tokens.get(TIMESTAMP_TOKEN).ok_or_else(|| ParseError::MalformedLine {
        line: line_number,
        reason: format!("no timestamp token ({} tokens)", tokens.len()),
    })?;
    token.parse::<SimNanos>().map_err(|_| ParseError::MalformedLine {
        line: line_number,
        reason: format!("timestamp token {:?} is not an integer", token),
    })
}

/// Classify and tokenize a line.
///
/// Comments and lines without '@' yield `None`. Every other line must carry
/// an integer timestamp, even when it is later ignored.
pub fn read_record(
    line: &str,
    line_number: usize,
    variant: LogVariant,
) -> Result<Option<LogRecord<'_>>, ParseError> {
    let kind = classify(line, variant);
    if matches!(kind, RecordKind::Comment) || !line.contains('@') {
        return Ok(None);
    }

    let tokens = tokenize(line);
    let timestamp_nanos = parse_timestamp(&tokens, line_number)?;

    Ok(Some(LogRecord {
        line_number,
        timestamp_nanos,
        kind,
        tokens,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "2010-10-12 03:33:57,120 INFO [sim] Driver - t= 600000000000 ns";

    #[test]
    fn test_classify_comment_and_other() {
        assert_eq!(classify("# header @ line", LogVariant::RttMeasurement), RecordKind::Comment);
        assert_eq!(classify("no marker here", LogVariant::RttMeasurement), RecordKind::Other);
        let line = format!("{} Relay@4 started", PREFIX);
        assert_eq!(classify(&line, LogVariant::RttMeasurement), RecordKind::Other);
    }

    #[test]
    fn test_classify_rtt_measurement_requires_marker() {
        let with = format!("{} FileSharer@Client@3[10k/20k] NormalData rtt measurement: 1", PREFIX);
        let without = format!("{} FileSharer@Client@3[10k/20k] NormalData done", PREFIX);
        assert_eq!(classify(&with, LogVariant::RttMeasurement), RecordKind::FileSharerMeasurement);
        assert_eq!(classify(&without, LogVariant::RttMeasurement), RecordKind::Other);
        assert_eq!(classify(&without, LogVariant::PerRequest), RecordKind::FileSharerMeasurement);

        let web = format!("{} WebBrowser@8[10k/20k] NormalData rtt measurement: 1", PREFIX);
        assert_eq!(classify(&web, LogVariant::RttMeasurement), RecordKind::WebBrowserMeasurement);
    }

    #[test]
    fn test_classify_priority_order() {
        let line = format!("{} Heartbeat@sim FileSharer@x WebBrowser@y rtt measurement:", PREFIX);
        assert_eq!(classify(&line, LogVariant::RttMeasurement), RecordKind::Heartbeat);

        let line = format!("{} FileSharer@x WebBrowser@y rtt measurement:", PREFIX);
        assert_eq!(classify(&line, LogVariant::RttMeasurement), RecordKind::FileSharerMeasurement);
    }

    #[test]
    fn test_classify_connection_summary() {
        let line = format!("{} Driver@generateSummary 12 web connections 3 fs connections", PREFIX);
        assert_eq!(classify(&line, LogVariant::RttMeasurement), RecordKind::ConnectionSummary);
    }

    #[test]
    fn test_read_record_timestamp() {
        let line = format!("{} Relay@4 started", PREFIX);
        let record = read_record(&line, 3, LogVariant::RttMeasurement).unwrap().unwrap();
        assert_eq!(record.timestamp_nanos, 600_000_000_000);
        assert_eq!(record.kind, RecordKind::Other);
        assert_eq!(record.tokens[9], "Relay@4");

        assert!(read_record("# comment", 1, LogVariant::RttMeasurement).unwrap().is_none());
        assert!(read_record("plain text", 2, LogVariant::RttMeasurement).unwrap().is_none());
    }

    #[test]
    fn test_read_record_malformed_timestamp() {
        let line = "2010-10-12 03:33:57,120 INFO [sim] Driver - t= soon ns Relay@4";
        match read_record(line, 42, LogVariant::RttMeasurement) {
            Err(ParseError::MalformedLine { line, .. }) => assert_eq!(line, 42),
            other => panic!("expected MalformedLine, got {:?}", other),
        }

        match read_record("short @ line", 7, LogVariant::RttMeasurement) {
            Err(ParseError::MalformedLine { line, .. }) => assert_eq!(line, 7),
            other => panic!("expected MalformedLine, got {:?}", other),
        }
    }

    #[test]
    fn test_tokenize_keeps_empty_tokens() {
        assert_eq!(tokenize("a  b\r\n"), vec!["a", "", "b"]);
    }
}
