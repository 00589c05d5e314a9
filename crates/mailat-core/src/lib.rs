//! # mailat-core
//!
//! Inbound mail processing for the mailat platform.
//!
//! This crate provides:
//! - Notification intake with identity resolution and deduplication
//! - MIME decoding of stored raw messages into bodies and attachments
//! - Per-organization filter rules and their evaluator
//! - Sieve script generation from filter rules, and script validation
//! - Local storage (`SQLite`) and an object store abstraction

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod db;
mod error;
pub mod filter;
pub mod identity;
pub mod ingest;
pub mod mail;
pub mod objects;
pub mod sieve;

pub use db::Database;
pub use error::{Error, Result};
pub use filter::{Evaluator, FilterRepository, FilterRule};
pub use identity::IdentityRepository;
pub use ingest::{ChannelQueue, Decoder, Intake, IntakeOutcome, Processor, run_worker};
pub use mail::{EmailId, EmailRecord, MailRepository};
pub use objects::{FsObjectStore, MemoryObjectStore, ObjectStore};
pub use sieve::{SieveScript, SieveValidationError};
