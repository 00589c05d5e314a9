//! MIME decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes Base64 data, ignoring embedded line breaks and whitespace.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Operates on bytes so that 8-bit content which was never encoded
/// passes through untouched.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break
        match data.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => {
                i += 3;
                continue;
            }
            Some([b'\n', ..]) => {
                i += 2;
                continue;
            }
            _ => {}
        }

        // Hex encoded byte
        let hex = data
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|_| Error::InvalidEncoding("Non-ASCII escape sequence".to_string()))?;
        let decoded = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(decoded);
        i += 3;
    }

    Ok(result)
}

/// Decodes RFC 2047 encoded words in a header value.
///
/// Encoded words (`=?charset?B|Q?text?=`) may be mixed with plain text;
/// whitespace between two adjacent encoded words is dropped. UTF-8 and
/// US-ASCII words are decoded as UTF-8, ISO-8859-1 words byte for byte.
/// Text without encoded words is returned unchanged.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed, uses an unknown
/// encoding or charset, or does not decode to valid text.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, word) = rest.split_at(start);
        let Some((charset, encoding, payload, tail)) = split_encoded_word(word) else {
            break;
        };
        if !(after_word && before.trim().is_empty()) {
            out.push_str(before);
        }
        out.push_str(&decode_word(charset, encoding, payload)?);
        rest = tail;
        after_word = true;
    }

    out.push_str(rest);
    Ok(out)
}

/// Splits `=?charset?enc?payload?=...` into its fields and the remainder.
fn split_encoded_word(s: &str) -> Option<(&str, &str, &str, &str)> {
    let body = s.strip_prefix("=?")?;
    let (charset, body) = body.split_once('?')?;
    let (encoding, body) = body.split_once('?')?;
    let (payload, tail) = body.split_once("?=")?;
    Some((charset, encoding, payload, tail))
}

fn decode_word(charset: &str, encoding: &str, payload: &str) -> Result<String> {
    let bytes = match encoding {
        "B" | "b" => decode_base64(payload.as_bytes())?,
        "Q" | "q" => decode_quoted_printable(payload.replace('_', " ").as_bytes())?,
        other => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoded-word encoding: {other}"
            )));
        }
    };

    decode_charset(charset, bytes)
}

/// Interpret `bytes` in `charset`.
///
/// UTF-8 and US-ASCII are decoded as UTF-8, ISO-8859-1 byte for byte. An
/// RFC 2231 language suffix (`utf-8*en`) is ignored.
pub(crate) fn decode_charset(charset: &str, bytes: Vec<u8>) -> Result<String> {
    let charset = charset.split('*').next().unwrap_or_default();
    if charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("us-ascii") {
        Ok(String::from_utf8(bytes)?)
    } else if charset.eq_ignore_ascii_case("iso-8859-1") || charset.eq_ignore_ascii_case("latin1")
    {
        Ok(bytes.into_iter().map(char::from).collect())
    } else {
        Err(Error::InvalidEncoding(format!("Unsupported charset: {charset}")))
    }
}
