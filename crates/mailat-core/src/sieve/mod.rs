//! Sieve script generation and validation.

mod generate;
mod script;
mod validate;

pub use generate::{HEADER, action_command, condition_test, escape, generate};
pub use script::SieveScript;
pub use validate::{CAPABILITIES, COMMANDS, SieveValidationError, validate};
