use crate::record::{Record, Value};

/// Marker that identifies a result line in benchmark output.
pub const DEFAULT_MARKER: &str = "RESULT ";

/// Return the payload of a marker line, or `None` for any other line.
pub fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.strip_prefix(marker)
}

/// Extract `key=value` pairs from a marker line's payload.
///
/// The payload is split on single spaces. A token counts as a pair only when
/// it contains exactly one `=`; everything else is dropped without complaint.
/// Keys and values are trimmed. When `allow` is given, only keys listed in it
/// are kept. Values are never converted here.
pub fn parse_line(payload: &str, allow: Option<&[String]>) -> Record {
    let mut record = Record::new();

    for token in payload.split(' ') {
        let mut parts = token.splitn(3, '=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };

        let key = key.trim();
        if let Some(allow) = allow {
            if !allow.iter().any(|name| name == key) {
                continue;
            }
        }

        record.insert(key, Value::Scalar(value.trim().to_string()));
    }

    record
}
