//! `Content-Type` values (RFC 2045 section 5).

use crate::error::{Error, Result};
use crate::params::Parameters;

/// A media type with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Top-level type, lowercased (`text`, `multipart`, ...).
    pub main_type: String,
    /// Subtype, lowercased (`plain`, `mixed`, ...).
    pub sub_type: String,
    /// Parameters such as `charset` or `boundary`.
    pub parameters: Parameters,
}

impl ContentType {
    /// The implicit type of a part that declares none.
    #[must_use]
    pub fn text_plain() -> Self {
        Self {
            main_type: "text".to_string(),
            sub_type: "plain".to_string(),
            parameters: [("charset".to_string(), "us-ascii".to_string())]
                .into_iter()
                .collect(),
        }
    }

    /// `type/subtype` without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Whether this is `main_type/sub_type`, ignoring case.
    #[must_use]
    pub fn is(&self, main_type: &str, sub_type: &str) -> bool {
        self.main_type.eq_ignore_ascii_case(main_type)
            && self.sub_type.eq_ignore_ascii_case(sub_type)
    }

    /// Whether the top-level type is `multipart`.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type == "multipart"
    }

    /// `charset` parameter.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset")
    }

    /// `boundary` parameter of a multipart type.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary")
    }

    /// `name` parameter, which older clients use instead of a disposition
    /// filename.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameters.get("name")
    }

    /// Parse a header value such as `text/plain; charset="utf-8"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContentType`] unless the value starts with
    /// exactly one non-empty type and one non-empty subtype.
    pub fn parse(s: &str) -> Result<Self> {
        let (essence, parameters) = Parameters::split(s);
        let invalid = || Error::InvalidContentType(essence.to_string());

        let (main_type, sub_type) = essence.split_once('/').ok_or_else(invalid)?;
        let (main_type, sub_type) = (main_type.trim(), sub_type.trim());
        if main_type.is_empty() || sub_type.is_empty() || sub_type.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            main_type: main_type.to_ascii_lowercase(),
            sub_type: sub_type.to_ascii_lowercase(),
            parameters,
        })
    }
}
