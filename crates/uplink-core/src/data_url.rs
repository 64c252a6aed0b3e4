//! Base64 data-URL encoding for inline previews.

use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;

/// Encode bytes as a `data:<mime>;base64,<payload>` URL.
pub fn encode(mime: &str, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        general_purpose::STANDARD.encode(data)
    )
}

/// Decode a base64 data URL back into `(mime, bytes)`. Returns `None` for
/// anything that is not a well-formed base64 data URL.
pub fn decode(url: &str) -> Option<(String, Bytes)> {
    let rest = url.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    let data = general_purpose::STANDARD.decode(payload).ok()?;
    Some((mime.to_string(), Bytes::from(data)))
}

/// Whether a URL is an inline data URL (as opposed to a remote or object URL).
pub fn is_data_url(url: &str) -> bool {
    url.starts_with("data:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let url = encode("image/png", b"hello");
        assert!(url.starts_with("data:image/png;base64,"));
        let (mime, data) = decode(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(&data[..], b"hello");
    }

    #[test]
    fn test_decode_rejects_non_data_urls() {
        assert!(decode("https://example.com/a.png").is_none());
        assert!(decode("data:image/png;base64,!!!").is_none());
        assert!(decode("data:image/png,plain").is_none());
    }

    #[test]
    fn test_is_data_url() {
        assert!(is_data_url("data:image/png;base64,aGk="));
        assert!(!is_data_url("mem://abc"));
    }
}
