//! Hand-authored Sieve scripts.

use super::validate::{SieveValidationError, validate};

/// A named Sieve script with its validation state.
///
/// Validation runs whenever the text changes. An invalid script can never be
/// active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SieveScript {
    name: String,
    text: String,
    active: bool,
    last_error: Option<SieveValidationError>,
}

impl SieveScript {
    /// Create a script, validating its text.
    ///
    /// `active` is honored only if the text is valid.
    #[must_use]
    pub fn new(name: impl Into<String>, text: impl Into<String>, active: bool) -> Self {
        let text = text.into();
        let last_error = validate(&text).err();
        Self {
            name: name.into(),
            active: active && last_error.is_none(),
            text,
            last_error,
        }
    }

    /// Script name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Script source.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the script is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the last validation passed.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.last_error.is_none()
    }

    /// The last validation failure, if any.
    #[must_use]
    pub const fn last_error(&self) -> Option<&SieveValidationError> {
        self.last_error.as_ref()
    }

    /// Rename the script.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Replace the text and revalidate. An invalid text deactivates the script.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.last_error = validate(&self.text).err();
        if self.last_error.is_some() {
            self.active = false;
        }
    }

    /// Activate or deactivate the script.
    ///
    /// # Errors
    ///
    /// Returns the stored validation error when activating an invalid script.
    pub fn set_active(&mut self, active: bool) -> Result<(), SieveValidationError> {
        if active && let Some(err) = &self.last_error {
            return Err(err.clone());
        }
        self.active = active;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_script_never_active() {
        let script = SieveScript::new("broken", "if true {", true);
        assert!(!script.is_valid());
        assert!(!script.is_active());
        assert_eq!(
            script.last_error(),
            Some(&SieveValidationError::UnmatchedOpeningBrace)
        );
    }

    #[test]
    fn test_set_active_rejects_invalid() {
        let mut script = SieveScript::new("broken", "frobnicate", false);
        assert!(script.set_active(true).is_err());
        assert!(!script.is_active());
        assert!(script.set_active(false).is_ok());
    }

    #[test]
    fn test_set_text_revalidates() {
        let mut script = SieveScript::new("s", "keep;", true);
        assert!(script.is_active());

        script.set_text("}");
        assert!(!script.is_valid());
        assert!(!script.is_active());

        script.set_text("stop;");
        assert!(script.is_valid());
        assert!(!script.is_active());
        script.set_active(true).unwrap();
        assert!(script.is_active());
    }
}
