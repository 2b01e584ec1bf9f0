//! Envelope payload probing — container id extraction without full
//! protobuf decoding.
//!
//! Lifecycle event payloads (`ContainerCreate`, `ContainerDelete`) both
//! carry the container id as their first string field, so the id can be
//! pulled out of the raw bytes without declaring every event type.

/// Extract the container id from a lifecycle event payload.
///
/// The payload starts with a length-delimited field-1 string preceded
/// by the wire bytes `\n` and the length byte. The id itself is plain
/// ascii alphanumerics; anything after it is other fields. Returns
/// `None` when no id-shaped token is present.
pub(super) fn container_id(payload: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(payload);
    let stripped = text.strip_prefix('\n').unwrap_or(&text);

    // Collapse framing bytes to separators and take the first token.
    let cleaned: String = stripped
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    cleaned
        .split('-')
        .find(|token| !token.is_empty())
        .map(|token| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_leading_id() {
        // field 1, length 5, "abc12", then a second field
        let payload = b"\n\x05abc12\x12\x03img";
        assert_eq!(container_id(payload), Some("abc12".to_string()));
    }

    #[test]
    fn test_extracts_full_hex_id() {
        let id = "9f86d081884c7d659a2feaa0c55ad015";
        let mut payload = vec![b'\n', id.len() as u8];
        payload.extend_from_slice(id.as_bytes());
        assert_eq!(container_id(&payload), Some(id.to_string()));
    }

    #[test]
    fn test_empty_payload_yields_none() {
        assert_eq!(container_id(b""), None);
        assert_eq!(container_id(b"\n\x00"), None);
    }
}
