//! Destination channels (e.g. Telegram).
//!
//! [`MediaSink`] is the seam the forwarder drives; Telegram is the production implementation.

mod sink;
mod telegram;

pub use sink::{GroupMedia, GroupMediaKind, MediaSink, SendOutcome, SkipReason};
pub use telegram::{truncate_message, TelegramChannel, TelegramSettings, MAX_MESSAGE_LENGTH};
