//! Lightweight structural checks for Sieve scripts.
//!
//! This is not a parser. It checks the first `require` list against known
//! capabilities, counts braces over the raw text (string literals and
//! comments included), and checks that each line starts like a command,
//! a block delimiter, or a test continuation.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Capabilities a `require` list may name.
pub const CAPABILITIES: &[&str] = &[
    "fileinto",
    "reject",
    "vacation",
    "envelope",
    "body",
    "regex",
    "copy",
    "imap4flags",
    "variables",
    "include",
    "relational",
    "comparator-i;ascii-numeric",
];

/// Line prefixes accepted as commands.
pub const COMMANDS: &[&str] = &[
    "if",
    "elsif",
    "else",
    "require",
    "stop",
    "keep",
    "discard",
    "redirect",
    "reject",
    "fileinto",
    "vacation",
    "set",
    "addheader",
    "deleteheader",
];

#[allow(clippy::expect_used)]
static REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"require\s+\[([^\]]+)\]").expect("static pattern"));

/// Reason a script was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SieveValidationError {
    /// The `require` list names a capability outside [`CAPABILITIES`].
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// A `}` appeared with no open block.
    #[error("unmatched closing brace")]
    UnmatchedClosingBrace,

    /// A block was left open at end of script.
    #[error("unmatched opening brace")]
    UnmatchedOpeningBrace,

    /// A line does not look like any known construct.
    #[error("unknown command on line: {0}")]
    UnknownCommand(String),
}

/// Check a script, returning the first problem found.
///
/// # Errors
///
/// Returns the [`SieveValidationError`] describing the first failed check:
/// capabilities, then brace balance, then line shapes.
pub fn validate(script: &str) -> Result<(), SieveValidationError> {
    check_capabilities(script)?;
    check_braces(script)?;
    check_lines(script)
}

fn check_capabilities(script: &str) -> Result<(), SieveValidationError> {
    if !script.contains("require") {
        return Ok(());
    }
    let Some(list) = REQUIRE.captures(script).and_then(|c| c.get(1)) else {
        return Ok(());
    };

    for capability in list.as_str().split(',') {
        let capability = capability.trim().trim_matches('"');
        if !CAPABILITIES.contains(&capability) {
            return Err(SieveValidationError::UnknownCapability(
                capability.to_string(),
            ));
        }
    }
    Ok(())
}

fn check_braces(script: &str) -> Result<(), SieveValidationError> {
    let mut depth: i64 = 0;
    for c in script.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return Err(SieveValidationError::UnmatchedClosingBrace);
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err(SieveValidationError::UnmatchedOpeningBrace)
    }
}

fn check_lines(script: &str) -> Result<(), SieveValidationError> {
    for line in script.split('\n') {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if COMMANDS.iter().any(|cmd| line.starts_with(cmd))
            || line.starts_with('}')
            || line.starts_with('{')
        {
            continue;
        }
        // Test continuations carry a string, tag or list.
        if line.contains('"') || line.contains(':') || line.contains('[') {
            continue;
        }
        return Err(SieveValidationError::UnknownCommand(line.to_string()));
    }
    Ok(())
}
