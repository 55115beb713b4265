//! Composite identifier codec
//!
//! Persisted identifiers are path segments joined by `/`, e.g. `tenantID/name`
//! or `tenantID/arn/key`. Decoding is a bounded split: any extra delimiters end
//! up in the final segment, so only the leading segments must be free of `/`.

use crate::error::{ProviderError, ProviderResult};

/// Segment delimiter
pub const DELIMITER: char = '/';

/// Join identity segments into a persisted identifier
pub fn encode<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split a persisted identifier into exactly `expected` non-empty segments
pub fn decode(id: &str, expected: usize) -> ProviderResult<Vec<String>> {
    let invalid = || ProviderError::InvalidIdentifier {
        id: id.to_string(),
        expected,
    };

    if expected == 0 {
        return Err(invalid());
    }

    let parts: Vec<String> = id.splitn(expected, DELIMITER).map(str::to_string).collect();
    if parts.len() != expected || parts.iter().any(|p| p.is_empty()) {
        return Err(invalid());
    }

    Ok(parts)
}

/// Check that segments can be encoded without the bounded split misreading them
pub fn validate_segments<S: AsRef<str>>(segments: &[S]) -> Result<(), String> {
    let count = segments.len();
    for (i, segment) in segments.iter().enumerate() {
        let segment = segment.as_ref();
        if segment.is_empty() {
            return Err(format!("segment {} is empty", i + 1));
        }
        if i + 1 < count && segment.contains(DELIMITER) {
            return Err(format!(
                "segment {} ('{}') contains '{}'",
                i + 1,
                segment,
                DELIMITER
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_joins_segments() {
        assert_eq!(encode(&["t1", "cache"]), "t1/cache");
        assert_eq!(encode(&["only"]), "only");
    }

    #[test]
    fn test_decode_two_segments() {
        assert_eq!(decode("t1/cache", 2).unwrap(), vec!["t1", "cache"]);
    }

    #[test]
    fn test_decode_keeps_extra_delimiters_in_last_segment() {
        assert_eq!(
            decode("t1/arn:aws:s3:::bucket/team/owner", 3).unwrap(),
            vec!["t1", "arn:aws:s3:::bucket", "team/owner"]
        );
    }

    #[test]
    fn test_decode_wrong_count_is_invalid_identifier() {
        let err = decode("t1", 2).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::InvalidIdentifier { expected: 2, .. }
        ));
    }

    #[test]
    fn test_decode_rejects_empty_segments() {
        assert!(decode("t1//key", 3).is_err());
        assert!(decode("", 1).is_err());
        assert!(decode("t1/", 2).is_err());
    }

    #[test]
    fn test_decode_zero_segments_is_invalid() {
        assert!(decode("anything", 0).is_err());
    }

    #[test]
    fn test_validate_segments_flags_delimiter_in_leading_segment() {
        assert!(validate_segments(&["t1", "arn/with/slash", "key"]).is_err());
        assert!(validate_segments(&["t1", "arn", "key/with/slash"]).is_ok());
        assert!(validate_segments(&["t1", ""]).is_err());
    }
}
