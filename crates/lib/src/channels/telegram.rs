//! Telegram channel: upload photos, videos and media groups, and send text via the Bot API.
//!
//! Media is fetched to a temp file first, then streamed from disk into a multipart upload.
//! Without a bot token and chat id every call is a no-op that reports `Skipped(Unconfigured)`.

use crate::channels::sink::{GroupMedia, MediaSink, SendOutcome, SkipReason};
use crate::error::UploadError;
use crate::fetch::{Fetcher, TempArtifact};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::io::ReaderStream;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Longest text sendMessage accepts.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

const TRUNCATION_MARKER: &str = "\n\n... (truncated)";

/// Bot API envelope; only the fields needed to detect rejection.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Resolved Telegram settings (see `config::resolve_telegram_settings`).
#[derive(Debug, Clone, Default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    /// Bot API base url (default https://api.telegram.org).
    pub api_base: Option<String>,
    /// Overall timeout per HTTP request. None keeps reqwest's default (no timeout).
    pub request_timeout: Option<Duration>,
    /// Where fetched media is staged (default: platform temp dir).
    pub temp_dir: Option<PathBuf>,
}

struct Target {
    token: String,
    chat_id: String,
}

/// Telegram destination for forwarded media.
pub struct TelegramChannel {
    target: Option<Target>,
    api_base: String,
    client: reqwest::Client,
    fetcher: Fetcher,
}

impl TelegramChannel {
    pub fn new(settings: TelegramSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("building telegram http client")?;
        let target = match (settings.bot_token, settings.chat_id) {
            (Some(token), Some(chat_id)) => Some(Target { token, chat_id }),
            _ => None,
        };
        let api_base = settings
            .api_base
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_else(|| TELEGRAM_API_BASE.to_string());
        Ok(Self {
            target,
            api_base,
            fetcher: Fetcher::new(client.clone(), settings.temp_dir),
            client,
        })
    }

    /// True when both bot token and chat id are set.
    pub fn is_configured(&self) -> bool {
        self.target.is_some()
    }

    fn method_url(&self, target: &Target, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, target.token, method)
    }

    /// Fetch, upload as `field` via `method`, release the file whatever happened.
    async fn send_single(
        &self,
        method: &'static str,
        field: &'static str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<SendOutcome, UploadError> {
        let Some(target) = &self.target else {
            return Ok(SendOutcome::Skipped(SkipReason::Unconfigured));
        };
        let artifact = self.fetcher.fetch(url).await?;
        let result = self
            .upload_single(target, method, field, &artifact, caption)
            .await;
        artifact.release().await;
        result?;
        log::info!("telegram {}: sent {}", method, url);
        Ok(SendOutcome::Sent)
    }

    async fn upload_single(
        &self,
        target: &Target,
        method: &'static str,
        field: &'static str,
        artifact: &TempArtifact,
        caption: Option<&str>,
    ) -> Result<(), UploadError> {
        let mut form = Form::new().text("chat_id", target.chat_id.clone());
        if let Some(c) = caption {
            form = form.text("caption", c.to_string());
        }
        form = form.part(field, file_part(artifact).await?);
        self.post_multipart(target, method, form).await
    }

    async fn upload_group(
        &self,
        target: &Target,
        items: &[GroupMedia],
        artifacts: &[TempArtifact],
        caption: Option<&str>,
    ) -> Result<(), UploadError> {
        const METHOD: &str = "sendMediaGroup";
        let media = serde_json::to_string(&media_group_json(items, caption))
            .map_err(|source| UploadError::Encode {
                method: METHOD,
                source,
            })?;
        let mut form = Form::new();
        for (i, artifact) in artifacts.iter().enumerate() {
            form = form.part(format!("file{}", i), file_part(artifact).await?);
        }
        form = form
            .text("chat_id", target.chat_id.clone())
            .text("media", media);
        self.post_multipart(target, METHOD, form).await
    }

    async fn post_multipart(
        &self,
        target: &Target,
        method: &'static str,
        form: Form,
    ) -> Result<(), UploadError> {
        let res = self
            .client
            .post(self.method_url(target, method))
            .multipart(form)
            .send()
            .await
            .map_err(|source| UploadError::Request { method, source })?;
        check_response(method, res).await
    }
}

#[async_trait]
impl MediaSink for TelegramChannel {
    async fn send_photo(
        &self,
        url: &str,
        caption: Option<&str>,
    ) -> Result<SendOutcome, UploadError> {
        self.send_single("sendPhoto", "photo", url, caption).await
    }

    async fn send_video(
        &self,
        url: &str,
        caption: Option<&str>,
    ) -> Result<SendOutcome, UploadError> {
        self.send_single("sendVideo", "video", url, caption).await
    }

    async fn send_media_group(
        &self,
        items: &[GroupMedia],
        caption: Option<&str>,
    ) -> Result<SendOutcome, UploadError> {
        let Some(target) = &self.target else {
            return Ok(SendOutcome::Skipped(SkipReason::Unconfigured));
        };
        if items.is_empty() {
            return Ok(SendOutcome::Skipped(SkipReason::EmptyGroup));
        }
        // Sequential; a failed fetch drops the files fetched so far and aborts the group.
        let mut artifacts = Vec::with_capacity(items.len());
        for item in items {
            artifacts.push(self.fetcher.fetch(&item.url).await?);
        }
        let result = self.upload_group(target, items, &artifacts, caption).await;
        futures_util::future::join_all(artifacts.into_iter().map(TempArtifact::release)).await;
        result?;
        log::info!("telegram sendMediaGroup: sent {} item(s)", items.len());
        Ok(SendOutcome::Sent)
    }

    async fn send_text(&self, text: &str) -> Result<SendOutcome, UploadError> {
        const METHOD: &str = "sendMessage";
        let Some(target) = &self.target else {
            return Ok(SendOutcome::Skipped(SkipReason::Unconfigured));
        };
        let body = json!({ "chat_id": target.chat_id, "text": text });
        let res = self
            .client
            .post(self.method_url(target, METHOD))
            .json(&body)
            .send()
            .await
            .map_err(|source| UploadError::Request {
                method: METHOD,
                source,
            })?;
        check_response(METHOD, res).await?;
        Ok(SendOutcome::Sent)
    }
}

/// The `media` array for sendMediaGroup; files are attached as `file0`, `file1`, ...
fn media_group_json(items: &[GroupMedia], caption: Option<&str>) -> Value {
    let entries: Vec<Value> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let mut entry = json!({
                "type": item.kind.as_str(),
                "media": format!("attach://file{}", i),
            });
            if let (0, Some(c)) = (i, caption) {
                entry["caption"] = Value::String(c.to_string());
            }
            entry
        })
        .collect();
    Value::Array(entries)
}

/// Multipart part streaming the artifact from disk.
async fn file_part(artifact: &TempArtifact) -> Result<Part, UploadError> {
    let read_err = |source| UploadError::Read {
        path: artifact.path().to_path_buf(),
        source,
    };
    let file = tokio::fs::File::open(artifact.path())
        .await
        .map_err(read_err)?;
    let len = file.metadata().await.map_err(read_err)?.len();
    let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
    Ok(Part::stream_with_length(body, len).file_name(artifact.file_name()))
}

/// Non-2xx or `"ok": false` is a rejection; a 2xx body that is not JSON is accepted.
async fn check_response(method: &'static str, res: reqwest::Response) -> Result<(), UploadError> {
    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|source| UploadError::Request { method, source })?;
    let parsed: Option<ApiResponse> = serde_json::from_str(&body).ok();
    let rejected = !status.is_success() || parsed.as_ref().is_some_and(|r| !r.ok);
    if rejected {
        let description = parsed.and_then(|r| r.description).unwrap_or(body);
        return Err(UploadError::Rejected {
            method,
            status: status.as_u16(),
            description,
        });
    }
    Ok(())
}

/// Cap `text` at [`MAX_MESSAGE_LENGTH`] characters, ending with "(truncated)" when cut.
pub fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_LENGTH {
        return text.to_string();
    }
    let keep = MAX_MESSAGE_LENGTH - 20;
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::sink::GroupMediaKind;
    use std::path::Path;
    use wiremock::matchers::{any, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "TOKEN";

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("relay-telegram-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).expect("read dir").next().is_none()
    }

    fn channel(server: &MockServer, dir: &Path, configured: bool) -> TelegramChannel {
        TelegramChannel::new(TelegramSettings {
            bot_token: configured.then(|| TOKEN.to_string()),
            chat_id: configured.then(|| "42".to_string()),
            api_base: Some(server.uri()),
            request_timeout: Some(Duration::from_secs(10)),
            temp_dir: Some(dir.to_path_buf()),
        })
        .expect("build channel")
    }

    async fn mount_media(server: &MockServer, route: &str, bytes: &[u8]) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.to_vec()))
            .mount(server)
            .await;
    }

    async fn bot_requests(server: &MockServer, api_method: &str) -> Vec<String> {
        let suffix = format!("/bot{}/{}", TOKEN, api_method);
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == suffix)
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }

    #[test]
    fn media_group_caption_only_on_first_entry() {
        let items = vec![
            GroupMedia { kind: GroupMediaKind::Photo, url: "https://x/a.jpg".into() },
            GroupMedia { kind: GroupMediaKind::Video, url: "https://x/b.mp4".into() },
        ];
        let media = media_group_json(&items, Some("cap"));
        assert_eq!(
            media,
            json!([
                { "type": "photo", "media": "attach://file0", "caption": "cap" },
                { "type": "video", "media": "attach://file1" }
            ])
        );
        let uncaptioned = media_group_json(&items, None);
        assert!(uncaptioned[0].get("caption").is_none());
    }

    #[test]
    fn short_text_is_untouched() {
        let text = "a".repeat(MAX_MESSAGE_LENGTH);
        assert_eq!(truncate_message(&text), text);
    }

    #[test]
    fn long_text_is_truncated_with_marker() {
        let text = "é".repeat(MAX_MESSAGE_LENGTH + 1);
        let out = truncate_message(&text);
        assert!(out.ends_with("(truncated)"));
        assert!(out.chars().count() <= MAX_MESSAGE_LENGTH);
        assert!(out.starts_with(&"é".repeat(100)));
    }

    #[tokio::test]
    async fn unconfigured_channel_skips_without_any_request() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let dir = scratch_dir();
        let ch = channel(&server, &dir, false);
        assert!(!ch.is_configured());

        let skipped = Ok::<_, ()>(SendOutcome::Skipped(SkipReason::Unconfigured));
        let url = format!("{}/a.jpg", server.uri());
        let group = vec![GroupMedia { kind: GroupMediaKind::Photo, url: url.clone() }];
        assert_eq!(ch.send_photo(&url, Some("c")).await.map_err(|_| ()), skipped);
        assert_eq!(ch.send_video(&url, None).await.map_err(|_| ()), skipped);
        assert_eq!(ch.send_media_group(&group, None).await.map_err(|_| ()), skipped);
        assert_eq!(ch.send_text("hi").await.map_err(|_| ()), skipped);
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn send_photo_uploads_and_removes_temp_file() {
        let server = MockServer::start().await;
        mount_media(&server, "/media/a.jpg", b"PHOTO-BYTES").await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{}/sendPhoto", TOKEN)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;
        let dir = scratch_dir();
        let ch = channel(&server, &dir, true);

        let outcome = ch
            .send_photo(&format!("{}/media/a.jpg", server.uri()), Some("hello there"))
            .await
            .expect("send photo");
        assert_eq!(outcome, SendOutcome::Sent);

        let bodies = bot_requests(&server, "sendPhoto").await;
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("name=\"photo\""));
        assert!(bodies[0].contains("PHOTO-BYTES"));
        assert!(bodies[0].contains("hello there"));
        assert!(bodies[0].contains("name=\"chat_id\""));
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn rejected_video_is_upload_error_and_still_cleans_up() {
        let server = MockServer::start().await;
        mount_media(&server, "/media/b.mp4", b"VIDEO").await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{}/sendVideo", TOKEN)))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                json!({ "ok": false, "description": "Bad Request: wrong file" }),
            ))
            .mount(&server)
            .await;
        let dir = scratch_dir();
        let ch = channel(&server, &dir, true);

        let err = ch
            .send_video(&format!("{}/media/b.mp4", server.uri()), None)
            .await
            .expect_err("rejected");
        match err {
            UploadError::Rejected { method, status, description } => {
                assert_eq!(method, "sendVideo");
                assert_eq!(status, 400);
                assert_eq!(description, "Bad Request: wrong file");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn ok_false_with_200_is_rejected() {
        let server = MockServer::start().await;
        mount_media(&server, "/a.jpg", b"x").await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "ok": false, "description": "chat not found" }),
            ))
            .mount(&server)
            .await;
        let dir = scratch_dir();
        let ch = channel(&server, &dir, true);

        let err = ch
            .send_photo(&format!("{}/a.jpg", server.uri()), None)
            .await
            .expect_err("ok false");
        assert!(matches!(err, UploadError::Rejected { status: 200, .. }));
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn media_group_uploads_all_files_in_one_request() {
        let server = MockServer::start().await;
        mount_media(&server, "/m/1.jpg", b"ONE").await;
        mount_media(&server, "/m/2.mp4", b"TWO").await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{}/sendMediaGroup", TOKEN)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;
        let dir = scratch_dir();
        let ch = channel(&server, &dir, true);

        let items = vec![
            GroupMedia { kind: GroupMediaKind::Photo, url: format!("{}/m/1.jpg", server.uri()) },
            GroupMedia { kind: GroupMediaKind::Video, url: format!("{}/m/2.mp4", server.uri()) },
        ];
        let outcome = ch
            .send_media_group(&items, Some("group caption"))
            .await
            .expect("send group");
        assert_eq!(outcome, SendOutcome::Sent);

        let bodies = bot_requests(&server, "sendMediaGroup").await;
        assert_eq!(bodies.len(), 1);
        let body = &bodies[0];
        assert!(body.contains("name=\"file0\""));
        assert!(body.contains("name=\"file1\""));
        assert!(body.contains("attach://file0"));
        assert!(body.contains("attach://file1"));
        assert!(body.contains("ONE") && body.contains("TWO"));
        assert_eq!(body.matches("group caption").count(), 1);
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn failed_fetch_aborts_group_before_upload() {
        let server = MockServer::start().await;
        mount_media(&server, "/m/1.jpg", b"ONE").await;
        Mock::given(method("GET"))
            .and(path("/m/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{}/sendMediaGroup", TOKEN)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(0)
            .mount(&server)
            .await;
        let dir = scratch_dir();
        let ch = channel(&server, &dir, true);

        let items = vec![
            GroupMedia { kind: GroupMediaKind::Photo, url: format!("{}/m/1.jpg", server.uri()) },
            GroupMedia { kind: GroupMediaKind::Photo, url: format!("{}/m/missing.jpg", server.uri()) },
        ];
        let err = ch.send_media_group(&items, None).await.expect_err("fetch fails");
        assert!(matches!(err, UploadError::Fetch(_)));
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn empty_group_is_skipped() {
        let server = MockServer::start().await;
        let dir = scratch_dir();
        let ch = channel(&server, &dir, true);
        let outcome = ch.send_media_group(&[], Some("c")).await.expect("no-op");
        assert_eq!(outcome, SendOutcome::Skipped(SkipReason::EmptyGroup));
    }

    #[tokio::test]
    async fn send_text_posts_json_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{}/sendMessage", TOKEN)))
            .and(body_partial_json(json!({ "chat_id": "42", "text": "ping" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;
        let dir = scratch_dir();
        let ch = channel(&server, &dir, true);
        assert_eq!(ch.send_text("ping").await.expect("send"), SendOutcome::Sent);
    }

    /// Answers one request with 200 and a Content-Length the body never reaches.
    async fn serve_short_body() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 4096];
            let _ = sock.read(&mut buf).await;
            let _ = sock
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"ok\":")
                .await;
            let _ = sock.shutdown().await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn unreadable_success_body_is_request_error() {
        let base = serve_short_body().await;
        let dir = scratch_dir();
        let ch = TelegramChannel::new(TelegramSettings {
            bot_token: Some(TOKEN.to_string()),
            chat_id: Some("42".to_string()),
            api_base: Some(base),
            request_timeout: Some(Duration::from_secs(10)),
            temp_dir: Some(dir),
        })
        .expect("build channel");
        let err = ch.send_text("ping").await.expect_err("cut body must fail");
        assert!(matches!(
            err,
            UploadError::Request {
                method: "sendMessage",
                ..
            }
        ));
    }
}
