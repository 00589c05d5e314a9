//! Content-Disposition handling (RFC 2183).

use crate::encoding::decode_rfc2047;
use crate::error::{Error, Result};
use crate::params::Parameters;

/// Disposition type of a body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispositionKind {
    /// Displayed inline with the message.
    Inline,
    /// Presented as a separate attachment.
    Attachment,
    /// Any other token, lowercased.
    Other(String),
}

/// Parsed Content-Disposition header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type.
    pub kind: DispositionKind,
    /// Parameters (e.g., filename, size).
    pub parameters: Parameters,
}

impl ContentDisposition {
    /// Parses a Content-Disposition header value.
    ///
    /// # Errors
    ///
    /// Returns an error if the disposition type is empty.
    pub fn parse(s: &str) -> Result<Self> {
        let (kind, parameters) = Parameters::split(s);
        if kind.is_empty() {
            return Err(Error::InvalidDisposition(s.to_string()));
        }
        let kind = kind.to_lowercase();

        let kind = match kind.as_str() {
            "inline" => DispositionKind::Inline,
            "attachment" => DispositionKind::Attachment,
            _ => DispositionKind::Other(kind),
        };

        Ok(Self { kind, parameters })
    }

    /// Checks for the `attachment` disposition.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == DispositionKind::Attachment
    }

    /// Checks for the `inline` disposition.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.kind == DispositionKind::Inline
    }

    /// Returns the filename parameter, decoding RFC 2047 encoded words.
    /// RFC 2231 values are already decoded by [`Parameters`].
    ///
    /// A value that fails to decode is returned as written.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.parameters
            .get("filename")
            .filter(|name| !name.is_empty())
            .map(|name| decode_rfc2047(name).unwrap_or_else(|_| name.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attachment_with_filename() {
        let d = ContentDisposition::parse("attachment; filename=\"invoice.pdf\"").unwrap();
        assert!(d.is_attachment());
        assert!(!d.is_inline());
        assert_eq!(d.filename(), Some("invoice.pdf".to_string()));
    }

    #[test]
    fn test_parse_inline_case_insensitive() {
        let d = ContentDisposition::parse("INLINE").unwrap();
        assert!(d.is_inline());
        assert_eq!(d.filename(), None);
    }

    #[test]
    fn test_parse_other_kind() {
        let d = ContentDisposition::parse("form-data; name=field").unwrap();
        assert_eq!(d.kind, DispositionKind::Other("form-data".to_string()));
    }

    #[test]
    fn test_encoded_filename() {
        let d = ContentDisposition::parse("attachment; filename=\"=?utf-8?B?SMOpbGxvLnR4dA==?=\"")
            .unwrap();
        assert_eq!(d.filename(), Some("Héllo.txt".to_string()));
    }

    #[test]
    fn test_quoted_filename_with_semicolon() {
        let d = ContentDisposition::parse("attachment; filename=\"Q1; final.pdf\"; size=100")
            .unwrap();
        assert_eq!(d.filename(), Some("Q1; final.pdf".to_string()));
        assert_eq!(d.parameters.get("size"), Some("100"));
    }

    #[test]
    fn test_rfc2231_filename() {
        let d = ContentDisposition::parse("attachment; filename*=UTF-8''Rechnung%20M%C3%A4rz.pdf")
            .unwrap();
        assert_eq!(d.filename(), Some("Rechnung März.pdf".to_string()));

        let d = ContentDisposition::parse(
            "attachment; filename*0*=utf-8''Jahres; filename*1*=bericht%202025; filename*2=.pdf",
        )
        .unwrap();
        assert_eq!(d.filename(), Some("Jahresbericht 2025.pdf".to_string()));
    }

    #[test]
    fn test_empty_disposition_is_error() {
        assert!(ContentDisposition::parse("  ").is_err());
    }
}
