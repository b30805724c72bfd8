//! Length-prefixed frame encoding and decoding.
//!
//! ```text
//! FRAME   = LEN CONTENT
//! LEN     = 5 ASCII digits, zero-padded byte length of CONTENT
//! CONTENT = SERVICE [STATUS] DATA
//! SERVICE = exactly 5 characters (space-padded or truncated)
//! STATUS  = "OK" | "NK"   (responses only)
//! ```
//!
//! There is no flag telling a request from a response. [`decode`] treats
//! any content whose data begins with `OK` or `NK` as carrying a status, so a
//! request payload that happens to start with those letters loses them.

use crate::config::ProtocolConfig;
use crate::{Result, SoaError};
use std::fmt;

/// A service name normalised to the fixed-width wire field.
///
/// Names longer than the field are truncated, shorter ones are padded with
/// spaces. Two names that differ only after the fifth character compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(name: &str) -> Self {
        let truncated: String = name.chars().take(ProtocolConfig::SERVICE_WIDTH).collect();
        Self(format!("{:<width$}", truncated, width = ProtocolConfig::SERVICE_WIDTH))
    }

    /// The padded five-character field, as it appears on the wire.
    pub fn as_field(&self) -> &str {
        &self.0
    }

    /// The name without trailing padding.
    pub fn trimmed(&self) -> &str {
        self.0.trim_end_matches(' ')
    }

    /// Whether this field selects a registry control message.
    pub fn is_control(&self) -> bool {
        let name = self.trimmed();
        name == ProtocolConfig::REGISTER_SELECTOR || name == ProtocolConfig::UNREGISTER_SELECTOR
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trimmed())
    }
}

impl From<&str> for ServiceName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Response status marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Nk,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Nk => "NK",
        }
    }

    pub fn from_success(success: bool) -> Self {
        if success {
            Status::Ok
        } else {
            Status::Nk
        }
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub service: ServiceName,
    pub status: Option<Status>,
    pub data: String,
}

/// Encode a frame. `status` is only set for responses.
pub fn encode(service: &str, data: &str, status: Option<Status>) -> Result<String> {
    let service = ServiceName::new(service);
    let status = status.map(|s| s.as_str()).unwrap_or("");

    let mut content = String::with_capacity(service.as_field().len() + status.len() + data.len());
    content.push_str(service.as_field());
    content.push_str(status);
    content.push_str(data);

    if content.len() > ProtocolConfig::MAX_CONTENT_LEN {
        return Err(SoaError::FrameTooLarge {
            len: content.len(),
            max: ProtocolConfig::MAX_CONTENT_LEN,
        });
    }

    Ok(format!(
        "{:0width$}{}",
        content.len(),
        content,
        width = ProtocolConfig::LEN_DIGITS
    ))
}

/// Decode a frame, validating the length prefix against the content.
pub fn decode(frame: &str) -> Result<Frame> {
    let prefix = frame
        .get(..ProtocolConfig::LEN_DIGITS)
        .ok_or_else(|| SoaError::malformed(format!("frame too short: {:?}", frame)))?;

    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SoaError::malformed(format!("invalid length prefix {:?}", prefix)));
    }
    let expected: usize = prefix
        .parse()
        .map_err(|e| SoaError::malformed(format!("invalid length prefix {:?}: {}", prefix, e)))?;

    let content = &frame[ProtocolConfig::LEN_DIGITS..];
    if content.len() != expected {
        return Err(SoaError::malformed(format!(
            "expected {} bytes of content, got {}",
            expected,
            content.len()
        )));
    }

    let split = match content.char_indices().nth(ProtocolConfig::SERVICE_WIDTH) {
        Some((idx, _)) => idx,
        None if content.chars().count() == ProtocolConfig::SERVICE_WIDTH => content.len(),
        None => {
            return Err(SoaError::malformed(format!(
                "content {:?} is shorter than the service field",
                content
            )))
        }
    };
    let (service, rest) = content.split_at(split);

    let (status, data) = if let Some(data) = rest.strip_prefix(Status::Ok.as_str()) {
        (Some(Status::Ok), data)
    } else if let Some(data) = rest.strip_prefix(Status::Nk.as_str()) {
        (Some(Status::Nk), data)
    } else {
        (None, rest)
    };

    Ok(Frame {
        service: ServiceName(service.to_string()),
        status,
        data: data.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_pads_short_service() {
        assert_eq!(encode("ab", "hello", None).unwrap(), "00010ab   hello");
    }

    #[test]
    fn test_encode_truncates_long_service() {
        let frame = encode("notifications", "list", None).unwrap();
        assert_eq!(frame, "00009notiflist");
    }

    #[test]
    fn test_encode_with_status() {
        assert_eq!(
            encode("FORUM", "abc", Some(Status::Ok)).unwrap(),
            "00010FORUMOKabc"
        );
    }

    #[test]
    fn test_encode_counts_bytes() {
        // "é" is two bytes in UTF-8
        let frame = encode("user", "é", None).unwrap();
        assert_eq!(&frame[..5], "00007");
    }

    #[test]
    fn test_encode_rejects_oversized_content() {
        let data = "x".repeat(ProtocolConfig::MAX_CONTENT_LEN);
        let result = encode("big", &data, None);
        assert!(matches!(result, Err(SoaError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_encode_largest_content() {
        let data = "x".repeat(ProtocolConfig::MAX_CONTENT_LEN - ProtocolConfig::SERVICE_WIDTH);
        let frame = encode("big", &data, None).unwrap();
        assert_eq!(&frame[..5], "99999");
    }

    #[test]
    fn test_decode_request() {
        let frame = decode("00010ab   hello").unwrap();
        assert_eq!(frame.service.as_field(), "ab   ");
        assert_eq!(frame.service.trimmed(), "ab");
        assert_eq!(frame.status, None);
        assert_eq!(frame.data, "hello");
    }

    #[test]
    fn test_decode_response() {
        let frame = decode("00010FORUMNKabc").unwrap();
        assert_eq!(frame.status, Some(Status::Nk));
        assert_eq!(frame.data, "abc");
    }

    #[test]
    fn test_decode_empty_data() {
        let frame = decode("00005echo ").unwrap();
        assert_eq!(frame.service.as_field(), "echo ");
        assert_eq!(frame.data, "");
    }

    #[test]
    fn test_decode_wrong_length_is_malformed() {
        assert!(matches!(
            decode("00011ab   hello"),
            Err(SoaError::MalformedFrame { .. })
        ));
        assert!(matches!(
            decode("00009ab   hello"),
            Err(SoaError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_decode_non_numeric_length_is_malformed() {
        assert!(matches!(
            decode("0001xab   hello"),
            Err(SoaError::MalformedFrame { .. })
        ));
        assert!(matches!(decode("12"), Err(SoaError::MalformedFrame { .. })));
    }

    #[test]
    fn test_decode_content_shorter_than_service_field() {
        assert!(matches!(decode("00003abc"), Err(SoaError::MalformedFrame { .. })));
    }

    #[test]
    fn test_roundtrip_pads_name() {
        for (name, data) in [("a", ""), ("calc", "add 1 2"), ("msg", "x y z"), ("forum", "é ü")] {
            let frame = decode(&encode(name, data, None).unwrap()).unwrap();
            assert_eq!(frame.service.as_field(), format!("{:<5}", name));
            assert_eq!(frame.status, None);
            assert_eq!(frame.data, data);
        }
    }

    #[test]
    fn test_request_payload_starting_with_status_letters_is_misread() {
        // Boundary case kept for wire compatibility: a request whose data
        // begins with "OK"/"NK" decodes as if it carried a status.
        let frame = decode(&encode("calc", "OKAY 1", None).unwrap()).unwrap();
        assert_eq!(frame.status, Some(Status::Ok));
        assert_eq!(frame.data, "AY 1");
    }

    #[test]
    fn test_service_names_collide_after_fifth_char() {
        assert_eq!(ServiceName::new("forums"), ServiceName::new("forum_v2"));
        assert_ne!(ServiceName::new("forum"), ServiceName::new("foru"));
    }

    #[test]
    fn test_control_selectors() {
        assert!(ServiceName::new("rgstr").is_control());
        assert!(ServiceName::new("unrgs").is_control());
        assert!(!ServiceName::new("srvr").is_control());
    }
}
