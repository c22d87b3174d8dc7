//! Instagram to Telegram relay: webhook payload decoding, the forwarding pipeline
//! (classify, fetch, upload), and the HTTP gateway used by the CLI.

pub mod channels;
pub mod classify;
pub mod config;
pub mod error;
pub mod fetch;
pub mod forward;
pub mod gateway;
pub mod init;
pub mod payload;
pub mod tasks;
