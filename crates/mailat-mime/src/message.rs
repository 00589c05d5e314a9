//! MIME message structure and parsing.

use crate::content_type::ContentType;
use crate::disposition::ContentDisposition;
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;

/// Nested multiparts deeper than this are kept as opaque leaves.
const MAX_NESTING: usize = 8;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }

    fn from_headers(headers: &Headers) -> Self {
        headers
            .get("content-transfer-encoding")
            .map_or(Self::SevenBit, Self::parse)
    }

    fn decode(self, body: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(body),
            Self::QuotedPrintable => decode_quoted_printable(body),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(body.to_vec()),
        }
    }
}

/// A leaf MIME part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body exactly as it appeared between the boundaries.
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Splits raw part bytes into headers and body.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let (head, body) = split_head_body(raw);
        Self::new(
            Headers::parse(&String::from_utf8_lossy(head)),
            body.to_vec(),
        )
    }

    /// Gets the content type, defaulting to text/plain when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the content disposition, if present and parsable.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .and_then(|d| ContentDisposition::parse(d).ok())
    }

    /// Gets the Content-ID without its angle brackets.
    #[must_use]
    pub fn content_id(&self) -> Option<&str> {
        self.headers
            .get("content-id")
            .map(|id| id.trim_matches(|c| c == '<' || c == '>'))
            .filter(|id| !id.is_empty())
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        TransferEncoding::from_headers(&self.headers)
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        self.transfer_encoding().decode(&self.body)
    }

    /// Gets the decoded body as text, replacing invalid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error if transfer decoding fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        Ok(String::from_utf8_lossy(&decoded).into_owned())
    }
}

/// MIME message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Raw body following the header block.
    pub body: Vec<u8>,
    /// Leaf parts of a multipart message, in document order (empty otherwise).
    pub parts: Vec<Part>,
}

impl Message {
    /// Parses a raw RFC 5322 message.
    ///
    /// Multipart bodies are split on their boundary and nested multiparts
    /// are walked, so `parts` only ever holds leaves.
    ///
    /// # Errors
    ///
    /// Returns an error if the top-level content type is multipart but has
    /// no boundary, or its body contains no boundary delimiter.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, body) = split_head_body(raw);
        let headers = Headers::parse(&String::from_utf8_lossy(head));
        let mut message = Self {
            headers,
            body: body.to_vec(),
            parts: Vec::new(),
        };

        if let Ok(ct) = message.content_type() {
            if ct.is_multipart() {
                let boundary = ct.boundary().ok_or(Error::MissingBoundary)?;
                for section in split_multipart(body, boundary)? {
                    collect_leaves(Part::parse(section), 1, &mut message.parts);
                }
            }
        }

        Ok(message)
    }

    /// Gets the content type, defaulting to text/plain when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Checks if this is a multipart message.
    ///
    /// # Errors
    ///
    /// Returns an error if content type cannot be determined.
    pub fn is_multipart(&self) -> Result<bool> {
        Ok(self.content_type()?.is_multipart())
    }

    /// Gets the decoded single-part body as text, replacing invalid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error if transfer decoding fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = TransferEncoding::from_headers(&self.headers).decode(&self.body)?;
        Ok(String::from_utf8_lossy(&decoded).into_owned())
    }
}

/// Pushes `part`, or the leaves of it when it is itself a multipart.
fn collect_leaves(part: Part, depth: usize, leaves: &mut Vec<Part>) {
    let nested = match part.content_type() {
        Ok(ct) if ct.is_multipart() && depth < MAX_NESTING => ct
            .boundary()
            .and_then(|b| split_multipart(&part.body, b).ok())
            .map(|sections| sections.into_iter().map(Part::parse).collect::<Vec<_>>()),
        _ => None,
    };

    match nested {
        Some(children) => {
            for child in children {
                collect_leaves(child, depth + 1, leaves);
            }
        }
        None => leaves.push(part),
    }
}

/// Splits raw bytes at the first empty line.
///
/// Input that starts with an empty line has no headers; input without an
/// empty line is all headers.
fn split_head_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(rest) = raw.strip_prefix(b"\r\n") {
        return (&[], rest);
    }
    if let Some(rest) = raw.strip_prefix(b"\n") {
        return (&[], rest);
    }

    let crlf = find(raw, b"\r\n\r\n").map(|i| (i + 2, i + 4));
    let lf = find(raw, b"\n\n").map(|i| (i + 1, i + 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((head_end, body_start)) => (&raw[..head_end], &raw[body_start..]),
        None => (raw, &[]),
    }
}

/// Splits a multipart body into its raw sections.
///
/// The line break before each delimiter belongs to the delimiter. Content
/// before the first delimiter (the preamble) and after the closing
/// delimiter (the epilogue) is discarded. A missing closing delimiter is
/// tolerated.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut sections = Vec::new();
    let mut section_start: Option<usize> = None;
    let mut seen_delimiter = false;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i + 1);
        let line = trim_line_end(&body[pos..line_end]);

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest.starts_with(b"--");
            if closing || rest.iter().all(u8::is_ascii_whitespace) {
                seen_delimiter = true;
                if let Some(start) = section_start.take() {
                    sections.push(strip_trailing_newline(&body[start..pos]));
                }
                if closing {
                    return Ok(sections);
                }
                section_start = Some(line_end);
            }
        }

        pos = line_end;
    }

    if !seen_delimiter {
        return Err(Error::InvalidMultipart(format!(
            "no delimiter for boundary {boundary}"
        )));
    }

    if let Some(start) = section_start {
        sections.push(&body[start..]);
    }

    Ok(sections)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn strip_trailing_newline(section: &[u8]) -> &[u8] {
    if let Some(s) = section.strip_suffix(b"\r\n") {
        return s;
    }
    section.strip_suffix(b"\n").unwrap_or(section)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
