//! YouTube live chat connector
//!
//! Reads chat through the same innertube endpoint the YouTube web player
//! uses: the live page is scraped once for the API key, client version and
//! initial continuation token, then `get_live_chat` is polled with the
//! continuation returned by each response.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{ChatConnector, ChatEvent, MessageDedup, Segment, StreamError, StreamEvent};
use crate::{Error, Result};

const YOUTUBE_BASE: &str = "https://www.youtube.com";

/// Events buffered between the polling task and the consumer
const EVENT_CHANNEL_SIZE: usize = 256;

static CANONICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<link rel="canonical" href="https://www\.youtube\.com/watch\?v=([^"]+?)">"#)
        .expect("valid regex")
});
static REPLAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]isReplay['"]:\s*true"#).expect("valid regex"));
static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]INNERTUBE_API_KEY['"]:\s*['"](.+?)['"]"#).expect("valid regex")
});
static CLIENT_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]clientVersion['"]:\s*['"]([\d.]+?)['"]"#).expect("valid regex")
});
static CONTINUATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]continuation['"]:\s*['"](.+?)['"]"#).expect("valid regex")
});

/// Which live stream to follow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveTarget {
    /// A specific live video id
    Video(String),
    /// Whatever the channel is currently streaming
    Channel(String),
}

impl LiveTarget {
    fn page_url(&self) -> String {
        match self {
            Self::Video(id) => format!("{YOUTUBE_BASE}/watch?v={id}"),
            Self::Channel(id) => format!("{YOUTUBE_BASE}/channel/{id}/live"),
        }
    }
}

/// Session parameters scraped from the live page
#[derive(Debug, Clone, PartialEq, Eq)]
struct LiveSession {
    live_id: String,
    api_key: String,
    client_version: String,
    continuation: String,
}

/// YouTube live chat connector
pub struct YouTubeLiveChat {
    target: LiveTarget,
    client: reqwest::Client,
    poll_interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl YouTubeLiveChat {
    /// Create a connector for the given stream
    #[must_use]
    pub fn new(target: LiveTarget, poll_interval: Duration) -> Self {
        Self {
            target,
            client: reqwest::Client::new(),
            poll_interval,
            task: None,
        }
    }

    /// Fetch the live page and extract session parameters
    async fn open_session(&self) -> Result<LiveSession> {
        let url = self.target.page_url();
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Chat(format!(
                "live page {url} returned {}",
                response.status()
            )));
        }

        let html = response.text().await?;
        parse_live_page(&html)
    }
}

impl Drop for YouTubeLiveChat {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl ChatConnector for YouTubeLiveChat {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<StreamEvent>> {
        let session = self.open_session().await?;
        tracing::info!(live_id = %session.live_id, "connected to live chat");

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let client = self.client.clone();
        let interval = self.poll_interval;

        if let Some(previous) = self.task.take() {
            previous.abort();
        }
        self.task = Some(tokio::spawn(async move {
            polling_loop(client, session, tx, interval).await;
        }));

        Ok(rx)
    }
}

/// Run the polling loop (background task)
async fn polling_loop(
    client: reqwest::Client,
    session: LiveSession,
    tx: mpsc::Sender<StreamEvent>,
    interval: Duration,
) {
    let url = format!(
        "{YOUTUBE_BASE}/youtubei/v1/live_chat/get_live_chat?key={}",
        session.api_key
    );
    let mut continuation = session.continuation;
    let mut dedup = MessageDedup::default();

    loop {
        match fetch_chat(&client, &url, &session.client_version, &continuation).await {
            Ok(page) => {
                if let Some(next) = page.continuation {
                    continuation = next;
                }

                for event in page.events {
                    if dedup.is_duplicate(&event) {
                        continue;
                    }
                    if tx.send(StreamEvent::Chat(event)).await.is_err() {
                        tracing::debug!("chat receiver dropped, stopping poll");
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "live chat poll failed");
                let event = StreamEvent::Error(StreamError::new(e.detail()));
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        }

        tokio::time::sleep(interval).await;
    }
}

/// One page of chat results
#[derive(Debug, Default)]
struct ChatPage {
    events: Vec<ChatEvent>,
    continuation: Option<String>,
}

async fn fetch_chat(
    client: &reqwest::Client,
    url: &str,
    client_version: &str,
    continuation: &str,
) -> Result<ChatPage> {
    let body = serde_json::json!({
        "context": {
            "client": {
                "clientVersion": client_version,
                "clientName": "WEB",
            },
        },
        "continuation": continuation,
    });

    let response = client.post(url).json(&body).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(Error::Chat(format!("get_live_chat error {status}: {text}")));
    }

    let data: GetLiveChatResponse = response.json().await?;
    Ok(parse_chat_response(data))
}

/// Extract session parameters from live page HTML
fn parse_live_page(html: &str) -> Result<LiveSession> {
    let live_id = capture(html, &CANONICAL_RE, "live id")?;

    if REPLAY_RE.is_match(html) {
        return Err(Error::Chat(format!("{live_id} is a finished live stream")));
    }

    Ok(LiveSession {
        api_key: capture(html, &API_KEY_RE, "API key")?,
        client_version: capture(html, &CLIENT_VERSION_RE, "client version")?,
        continuation: capture(html, &CONTINUATION_RE, "continuation")?,
        live_id,
    })
}

fn capture(html: &str, re: &Regex, what: &str) -> Result<String> {
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::Chat(format!("{what} not found on live page")))
}

fn parse_chat_response(data: GetLiveChatResponse) -> ChatPage {
    let Some(contents) = data.continuation_contents else {
        return ChatPage::default();
    };
    let chat = contents.live_chat_continuation;

    let continuation = chat.continuations.into_iter().find_map(|c| {
        c.invalidation_continuation_data
            .or(c.timed_continuation_data)
            .map(|d| d.continuation)
    });

    let events = chat
        .actions
        .into_iter()
        .filter_map(|a| a.add_chat_item_action)
        .filter_map(|a| {
            a.item
                .live_chat_text_message_renderer
                .or(a.item.live_chat_paid_message_renderer)
        })
        .filter_map(renderer_to_event)
        .collect();

    ChatPage {
        events,
        continuation,
    }
}

fn renderer_to_event(renderer: MessageRenderer) -> Option<ChatEvent> {
    let usec: i64 = renderer.timestamp_usec.parse().ok()?;
    let received_at = DateTime::<Utc>::from_timestamp_micros(usec)?;

    let segments: Vec<Segment> = renderer
        .message
        .map(|m| m.runs)
        .unwrap_or_default()
        .into_iter()
        .filter_map(run_to_segment)
        .collect();

    Some(ChatEvent {
        id: renderer.id,
        author: renderer.author_name.map(|a| a.simple_text).unwrap_or_default(),
        received_at,
        segments,
    })
}

fn run_to_segment(run: Run) -> Option<Segment> {
    if let Some(text) = run.text {
        return Some(Segment::Text { text });
    }

    let emoji = run.emoji?;
    let alt = emoji
        .image
        .and_then(|i| i.accessibility)
        .map(|a| a.accessibility_data.label);
    let text = if emoji.is_custom_emoji {
        emoji.shortcuts.into_iter().next().unwrap_or_default()
    } else {
        emoji.emoji_id
    };

    Some(Segment::Emoji { text, alt })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetLiveChatResponse {
    continuation_contents: Option<ContinuationContents>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContinuationContents {
    live_chat_continuation: LiveChatContinuation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveChatContinuation {
    #[serde(default)]
    actions: Vec<Action>,
    #[serde(default)]
    continuations: Vec<Continuation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Continuation {
    invalidation_continuation_data: Option<ContinuationData>,
    timed_continuation_data: Option<ContinuationData>,
}

#[derive(Debug, Deserialize)]
struct ContinuationData {
    continuation: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Action {
    add_chat_item_action: Option<AddChatItemAction>,
}

#[derive(Debug, Deserialize)]
struct AddChatItemAction {
    item: ChatItem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatItem {
    live_chat_text_message_renderer: Option<MessageRenderer>,
    live_chat_paid_message_renderer: Option<MessageRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRenderer {
    id: String,
    timestamp_usec: String,
    author_name: Option<SimpleText>,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimpleText {
    simple_text: String,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    runs: Vec<Run>,
}

#[derive(Debug, Deserialize)]
struct Run {
    text: Option<String>,
    emoji: Option<Emoji>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Emoji {
    #[serde(default)]
    emoji_id: String,
    #[serde(default)]
    shortcuts: Vec<String>,
    #[serde(default)]
    is_custom_emoji: bool,
    image: Option<EmojiImage>,
}

#[derive(Debug, Deserialize)]
struct EmojiImage {
    accessibility: Option<Accessibility>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Accessibility {
    accessibility_data: AccessibilityData,
}

#[derive(Debug, Deserialize)]
struct AccessibilityData {
    label: String,
}
