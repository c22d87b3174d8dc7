//! Forwarding orchestrator: turn an inbound payload into channel uploads, one item at a time.
//!
//! Items are sent strictly in order so the chat mirrors the source ordering. Each item is its
//! own failure boundary: an upload error is logged and recorded, and the next item proceeds.

use crate::channels::{
    truncate_message, GroupMedia, GroupMediaKind, MediaSink, SendOutcome, SkipReason,
    TelegramChannel,
};
use crate::classify::{classify, MediaKind};
use crate::config::{self, Config};
use crate::error::UploadError;
use crate::payload::{InboundItem, InboundPayload};
use serde_json::Value;
use std::sync::Arc;

/// What happened to one inbound item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Sent,
    Skipped(SkipReason),
    Failed(String),
}

/// Per-item outcomes of one `forward` call, in payload order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl ForwardReport {
    pub fn sent(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Sent))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// `"From Instagram @<sender>"` and the item caption joined by a blank line; None when both absent.
pub fn build_caption(sender: Option<&str>, caption: Option<&str>) -> Option<String> {
    let sender_line = sender.map(|s| format!("From Instagram @{}", s));
    let parts: Vec<String> = sender_line
        .into_iter()
        .chain(caption.map(str::to_string))
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Drives a [`MediaSink`] from inbound payloads. Cheap to clone.
#[derive(Clone)]
pub struct Forwarder {
    sink: Arc<dyn MediaSink>,
}

impl Forwarder {
    pub fn new(sink: Arc<dyn MediaSink>) -> Self {
        Self { sink }
    }

    /// Forwarder backed by the Telegram channel described in `config` (env overrides applied).
    /// A missing token or chat id is only warned about: uploads then report `Skipped`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = config::resolve_telegram_settings(config);
        if settings.bot_token.is_none() {
            log::warn!("TELEGRAM_BOT_TOKEN is not set; forwarding is disabled until it is configured");
        }
        if settings.chat_id.is_none() {
            log::warn!("TELEGRAM_CHAT_ID is not set; forwarding is disabled until it is configured");
        }
        let channel = TelegramChannel::new(settings)?;
        Ok(Self::new(Arc::new(channel)))
    }

    /// Forward every item in order. Never fails as a whole; see the report for partial delivery.
    pub async fn forward(&self, payload: &InboundPayload) -> ForwardReport {
        let mut report = ForwardReport::default();
        for (index, item) in payload.items.iter().enumerate() {
            let outcome = match self.forward_item(payload.sender.as_deref(), item).await {
                Ok(SendOutcome::Sent) => ItemOutcome::Sent,
                Ok(SendOutcome::Skipped(reason)) => {
                    log::debug!("item {}: skipped ({:?})", index, reason);
                    ItemOutcome::Skipped(reason)
                }
                Err(e) => {
                    log::warn!("item {}: forwarding failed: {}", index, e);
                    ItemOutcome::Failed(e.to_string())
                }
            };
            report.outcomes.push(outcome);
        }
        report
    }

    async fn forward_item(
        &self,
        sender: Option<&str>,
        item: &InboundItem,
    ) -> Result<SendOutcome, UploadError> {
        let kind = classify(item.kind.as_deref());
        let caption = build_caption(sender, item.caption.as_deref());
        let caption = caption.as_deref();
        let no_media = Ok(SendOutcome::Skipped(SkipReason::NoUsableMedia));

        match kind {
            MediaKind::Carousel => {
                let group: Vec<GroupMedia> = item
                    .usable_media()
                    .map(|(m, url)| GroupMedia {
                        kind: if m.is_video() {
                            GroupMediaKind::Video
                        } else {
                            GroupMediaKind::Photo
                        },
                        url: url.to_string(),
                    })
                    .collect();
                match group.as_slice() {
                    [] => no_media,
                    [single] => match single.kind {
                        GroupMediaKind::Video => self.sink.send_video(&single.url, caption).await,
                        GroupMediaKind::Photo => self.sink.send_photo(&single.url, caption).await,
                    },
                    _ => self.sink.send_media_group(&group, caption).await,
                }
            }
            MediaKind::Video => {
                match item.usable_media().find(|(m, _)| m.matches_or_untyped("video")) {
                    Some((_, url)) => self.sink.send_video(url, caption).await,
                    None => no_media,
                }
            }
            MediaKind::Image => {
                match item.usable_media().find(|(m, _)| m.matches_or_untyped("image")) {
                    Some((_, url)) => self.sink.send_photo(url, caption).await,
                    None => no_media,
                }
            }
        }
    }

    /// Debug relay: send the raw payload as (possibly truncated) text.
    pub async fn relay_raw(&self, payload: &Value) -> Result<SendOutcome, UploadError> {
        self.sink.send_text(&raw_payload_text(payload)).await
    }
}

/// Strings are sent verbatim, anything else as pretty JSON; capped at the message limit.
pub fn raw_payload_text(payload: &Value) -> String {
    let text = match payload {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    truncate_message(&text)
}
