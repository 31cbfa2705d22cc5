//! Compressed payload handling.
//!
//! The server may ship large payloads gzip-compressed, either as a hex or
//! base64 string inside a JSON frame, or as a raw binary frame (gzip or
//! zlib).

// ============================================================================
// Imports
// ============================================================================

use std::io::Read;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::{GzDecoder, ZlibDecoder};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// gzip member header magic.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Upper bound on inflated size.
const MAX_INFLATED_BYTES: u64 = 64 * 1024 * 1024;

// ============================================================================
// Public API
// ============================================================================

/// Decodes a hex or base64 string and inflates the gzip data inside it.
///
/// Hex is tried first when the text consists only of hex digits, since
/// every hex string is also valid base64 alphabet.
///
/// # Errors
///
/// [`Error::Decode`] if the text is neither encoding or the data does not
/// inflate to UTF-8.
pub fn decode_compressed_text(encoded: &str) -> Result<String> {
    let encoded = encoded.trim();
    let bytes = decode_text_encoding(encoded)?;
    inflate_to_string(&bytes)
}

/// Inflates a gzip or zlib buffer to a UTF-8 string.
///
/// # Errors
///
/// [`Error::Decode`] on corrupt data, oversize output or invalid UTF-8.
pub fn inflate_to_string(bytes: &[u8]) -> Result<String> {
    inflate_with_limit(bytes, MAX_INFLATED_BYTES)
}

// ============================================================================
// Helpers
// ============================================================================

fn inflate_with_limit(bytes: &[u8], limit: u64) -> Result<String> {
    let mut out = Vec::new();
    let read = if bytes.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(bytes).take(limit + 1).read_to_end(&mut out)
    } else {
        ZlibDecoder::new(bytes).take(limit + 1).read_to_end(&mut out)
    };

    read.map_err(|e| Error::decode(format!("inflate failed: {e}")))?;
    if out.len() as u64 > limit {
        return Err(Error::decode(format!("inflated payload exceeds limit of {limit} bytes")));
    }

    String::from_utf8(out)
        .map_err(|e| Error::decode(format!("inflated payload is not UTF-8: {e}")))
}

fn decode_text_encoding(encoded: &str) -> Result<Vec<u8>> {
    let looks_hex = !encoded.is_empty()
        && encoded.len() % 2 == 0
        && encoded.bytes().all(|b| b.is_ascii_hexdigit());

    if looks_hex && let Ok(bytes) = hex::decode(encoded) {
        return Ok(bytes);
    }

    STANDARD
        .decode(encoded)
        .map_err(|e| Error::decode(format!("payload is neither hex nor base64: {e}")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use flate2::Compression;
    use flate2::write::{GzEncoder, ZlibEncoder};

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_hex_gzip() {
        let encoded = hex::encode(gzip(r#"{"cpu":42}"#));
        assert_eq!(decode_compressed_text(&encoded).unwrap(), r#"{"cpu":42}"#);
    }

    #[test]
    fn test_base64_gzip() {
        let encoded = STANDARD.encode(gzip(r#"[1,2,3]"#));
        assert_eq!(decode_compressed_text(&encoded).unwrap(), "[1,2,3]");
    }

    #[test]
    fn test_zlib_binary() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(b"{\"ok\":true}").unwrap();
        let bytes = encoder.finish().unwrap();
        assert_eq!(inflate_to_string(&bytes).unwrap(), "{\"ok\":true}");
    }

    #[test]
    fn test_oversize_output_is_rejected() {
        let bytes = gzip(&" ".repeat(1025));

        let err = inflate_with_limit(&bytes, 1024).unwrap_err();
        assert!(err.is_decode_error());
        assert!(err.to_string().contains("exceeds limit"));

        assert_eq!(inflate_with_limit(&bytes, 1025).unwrap().len(), 1025);
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&[0xff, 0xfe, 0xfd]).unwrap();
        let bytes = encoder.finish().unwrap();
        assert!(inflate_to_string(&bytes).unwrap_err().is_decode_error());
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = decode_compressed_text("not compressed at all!").unwrap_err();
        assert!(err.is_decode_error());

        let err = inflate_to_string(b"\x1f\x8bnope").unwrap_err();
        assert!(err.is_decode_error());
    }
}
