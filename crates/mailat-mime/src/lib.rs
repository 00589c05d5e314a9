//! # mailat-mime
//!
//! Lenient MIME parsing for inbound email.
//!
//! ## Features
//!
//! - **Message parsing**: Split a raw message into headers and leaf parts,
//!   walking nested multiparts
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 encoded words
//! - **Content types**: Media type and parameter parsing, including RFC 2231
//!   extended values
//! - **Dispositions**: `inline` / `attachment` with filename resolution
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailat_mime::Message;
//!
//! let raw = b"From: sender@example.com\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw)?;
//! assert_eq!(message.body_text()?, "Hello, World!");
//! ```
//!
//! Parsing is deliberately forgiving: real inbound mail is frequently
//! malformed, and callers decide how to degrade when a step fails.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod disposition;
mod error;
mod header;
mod message;
mod params;

pub mod encoding;

pub use content_type::ContentType;
pub use disposition::{ContentDisposition, DispositionKind};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding};
pub use params::Parameters;
