use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use vmdash_common::types::{Alert, AlertChange, AlertDigest};

use crate::error::{FeedError, Result};
use crate::filter::ViewFilter;
use crate::source::{ChangeStream, FeedSource};

/// Response envelope of the alert API.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    err_code: i32,
    #[serde(default)]
    err_msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
}

/// Feed backed by a remote vmdash server: snapshots over HTTP, changes over
/// the `/v1/alerts/feed` WebSocket.
pub struct RemoteFeed {
    client: reqwest::Client,
    base_url: Url,
    access_token: String,
}

impl RemoteFeed {
    pub fn new(base_url: &str, access_token: impl Into<String>) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| FeedError::Transport(format!("invalid base url: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url,
            access_token: access_token.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| FeedError::Transport(format!("invalid url {path}: {e}")))
    }

    pub(crate) fn feed_url(&self) -> Result<Url> {
        let mut url = self.endpoint("/v1/alerts/feed")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| FeedError::Transport(format!("cannot use {scheme} for {url}")))?;
        url.query_pairs_mut()
            .append_pair("access_token", &self.access_token);
        Ok(url)
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T> {
        let resp = self
            .client
            .get(self.endpoint(path)?)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;
        let envelope: Envelope<T> = resp.json().await?;
        if envelope.err_code != 0 {
            return Err(FeedError::Api {
                code: envelope.err_code,
                message: envelope.err_msg,
            });
        }
        envelope.data.ok_or_else(|| FeedError::Api {
            code: 0,
            message: format!("{path} returned no data"),
        })
    }
}

#[async_trait]
impl FeedSource for RemoteFeed {
    async fn subscribe(&self) -> Result<ChangeStream> {
        let url = self.feed_url()?;
        let (ws, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| FeedError::Transport(format!("WebSocket connect failed: {e}")))?;
        tracing::info!(
            status = response.status().as_u16(),
            host = url.host_str().unwrap_or_default(),
            "Alert feed connected"
        );

        let changes = stream::unfold(Some(ws), |ws| async move {
            let mut ws = ws?;
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let change = serde_json::from_str::<AlertChange>(text.as_str())
                            .map_err(FeedError::from);
                        return Some((change, Some(ws)));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::warn!(?frame, "Alert feed closed by server");
                        return None;
                    }
                    // Pings are answered by tungstenite on the next read.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        return Some((
                            Err(FeedError::Transport(format!("WebSocket read error: {e}"))),
                            None,
                        ))
                    }
                    None => return None,
                }
            }
        });
        Ok(Box::pin(changes))
    }

    async fn fetch_page(&self, filter: &ViewFilter) -> Result<Vec<Alert>> {
        let page: Page<Alert> = self.get_data("/v1/alerts", &filter.to_query_pairs()).await?;
        Ok(page.items)
    }

    async fn fetch_digests(&self) -> Result<Vec<AlertDigest>> {
        self.get_data("/v1/alerts/digests", &[]).await
    }
}
