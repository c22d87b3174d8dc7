//! Destination seam: the four outbound capabilities the forwarder drives.

use crate::error::UploadError;
use async_trait::async_trait;

/// Why an outbound call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No bot token or chat id configured.
    Unconfigured,
    /// Media group call with no items.
    EmptyGroup,
    /// Item had no media entry usable for its kind.
    NoUsableMedia,
}

/// Result of a successful outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Skipped(SkipReason),
}

/// Per-entry type inside a media group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMediaKind {
    Photo,
    Video,
}

impl GroupMediaKind {
    /// Wire name for the `media` JSON array.
    pub fn as_str(self) -> &'static str {
        match self {
            GroupMediaKind::Photo => "photo",
            GroupMediaKind::Video => "video",
        }
    }
}

/// One entry of a media group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMedia {
    pub kind: GroupMediaKind,
    pub url: String,
}

/// Chat destination that can receive photos, videos, grouped media and text.
///
/// Implementations fetch the referenced urls themselves and must release every local copy
/// they create, whatever the outcome.
#[async_trait]
pub trait MediaSink: Send + Sync {
    async fn send_photo(&self, url: &str, caption: Option<&str>)
        -> Result<SendOutcome, UploadError>;

    async fn send_video(&self, url: &str, caption: Option<&str>)
        -> Result<SendOutcome, UploadError>;

    /// Caption goes on the first entry only.
    async fn send_media_group(
        &self,
        items: &[GroupMedia],
        caption: Option<&str>,
    ) -> Result<SendOutcome, UploadError>;

    async fn send_text(&self, text: &str) -> Result<SendOutcome, UploadError>;
}
