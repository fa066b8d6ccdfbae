//! Telegram Bot API transport
//!
//! Long-polls `getUpdates`, forwards text messages to the dispatch loop and
//! delivers replies with `sendMessage`.

mod types;

pub use types::*;

use crate::runtime::{InboundEvent, OutboundReply, ReplySink};
use crate::state_machine::Keyboard;
use async_trait::async_trait;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Extra time the HTTP client allows beyond the long-poll window
const REQUEST_SLACK: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("Telegram API error: {description}")]
    Api {
        description: String,
        retry_after: Option<Duration>,
    },
}

impl TransportError {
    pub fn api(description: impl Into<String>) -> Self {
        Self::Api {
            description: description.into(),
            retry_after: None,
        }
    }

    /// Server-requested delay before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Api { retry_after, .. } => *retry_after,
            Self::Http(_) => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        // Request URLs embed the bot token
        Self::Http(e.without_url())
    }
}

/// Client for one bot token
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, poll_timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(poll_timeout + REQUEST_SLACK)
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
            poll_timeout,
        })
    }

    async fn call<P, R>(&self, method: &str, payload: &P) -> Result<R, TransportError>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response: ApiResponse<R> = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(payload)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(TransportError::Api {
                description: response
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
                retry_after: response
                    .parameters
                    .and_then(|p| p.retry_after)
                    .map(Duration::from_secs),
            });
        }
        response
            .result
            .ok_or_else(|| TransportError::api(format!("{method} returned no result")))
    }

    /// One long-poll round; `offset` acknowledges everything before it
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TransportError> {
        let request = GetUpdates {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };
        self.call("getUpdates", &request).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let request = SendMessage {
            chat_id,
            text,
            reply_markup: keyboard.map(ReplyMarkup::from),
        };
        let _: IgnoredAny = self.call("sendMessage", &request).await?;
        Ok(())
    }

    /// Poll until cancelled or the dispatch loop goes away.
    ///
    /// Errors back off exponentially (or by the server's `retry_after`) and
    /// never end the loop.
    pub async fn poll(&self, tx: mpsc::Sender<InboundEvent>, cancel: CancellationToken) {
        tracing::info!(timeout_secs = self.poll_timeout.as_secs(), "Telegram poller started");
        let mut offset = None;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let result = tokio::select! {
                () = cancel.cancelled() => break,
                result = self.get_updates(offset) => result,
            };

            match result {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        let Some(event) = update.into_inbound() else {
                            continue;
                        };
                        if tx.send(event).await.is_err() {
                            tracing::info!("Dispatch loop closed, stopping poller");
                            return;
                        }
                    }
                }
                Err(e) => {
                    let delay = e.retry_after().unwrap_or(backoff);
                    tracing::warn!(error = %e, retry_in = ?delay, "getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
        tracing::info!("Telegram poller stopped");
    }
}

#[async_trait]
impl ReplySink for TelegramClient {
    async fn deliver(&self, reply: &OutboundReply) -> Result<(), TransportError> {
        self.send_message(reply.conversation_id.0, &reply.text, reply.keyboard.as_ref())
            .await
    }
}
