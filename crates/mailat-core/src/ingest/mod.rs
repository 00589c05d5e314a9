//! Inbound pipeline: notification intake, then background decoding and
//! filtering.
//!
//! [`Intake`] persists the base record synchronously and queues an
//! [`InboundTask::Decode`] and an [`InboundTask::Evaluate`]. The two tasks run
//! independently and write disjoint fields of the record: the decoder owns
//! the body fields, the evaluator owns folder and flags.

mod decoder;
mod intake;
mod notification;
mod tasks;

pub use decoder::{Decoder, Extracted, ExtractedAttachment, extract};
pub use intake::{Intake, IntakeOutcome};
pub use notification::{
    CommonHeaders, Envelope, HeaderField, MailInfo, Notification, Receipt, ReceiptAction, Verdict,
    parse_address, parse_payload,
};
pub use tasks::{ChannelQueue, InboundTask, Processor, TaskQueue, run_worker};
