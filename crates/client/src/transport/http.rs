//! REST + server-sent-events implementation of the collaborator traits.

use std::sync::Arc;

use chrono::NaiveDate;
use countertop_core::{
    CatalogItemId, ChangeEvent, Collection, Order, OrderId, OrderStatus, Shift,
    SpecificationGroup,
};
use futures::StreamExt;
use futures::stream::abortable;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::sse::SseDecoder;
use super::{CatalogSource, ChangeFeed, OrderTransport, ShiftStore, Subscription};
use crate::config::ClientConfig;
use crate::error::{FeedError, TransportError};
use crate::submission::{OrderReceipt, OrderRequest};

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Client for the Countertop REST API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<HttpClientInner>,
}

struct HttpClientInner {
    client: reqwest::Client,
    base_url: Url,
    token: SecretString,
    request_timeout: std::time::Duration,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct StatusUpdate {
    collection: Collection,
    status: OrderStatus,
}

impl HttpClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        // No overall timeout on the client: feed responses stream indefinitely.
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpClientInner {
                client,
                base_url: config.api_url.clone(),
                token: config.api_token.clone(),
                request_timeout: config.request_timeout,
            }),
        })
    }

    /// Build an endpoint URL from path segments. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.inner
            .client
            .request(method, url)
            .bearer_auth(self.inner.token.expose_secret())
            .timeout(self.inner.request_timeout)
    }

    /// Send a request and return the response body of a successful call.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, TransportError> {
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(TransportError::RateLimited(retry_after));
        }

        let url = response.url().clone();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(url.path().to_string()));
        }

        if !status.is_success() {
            error!(
                status = %status,
                url = %url,
                body = %response_text.chars().take(500).collect::<String>(),
                "Countertop API returned non-success status"
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: response_text.chars().take(200).collect(),
            });
        }

        Ok(response_text)
    }

    /// Send a request and parse its JSON response.
    async fn execute<R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<R, TransportError> {
        let response_text = self.send(request).await?;

        serde_json::from_str(&response_text).map_err(|e| {
            error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse Countertop API response"
            );
            TransportError::Parse(e)
        })
    }
}

impl CatalogSource for HttpClient {
    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn specification_groups(
        &self,
        item_id: &CatalogItemId,
    ) -> Result<Vec<SpecificationGroup>, TransportError> {
        let url = self.endpoint(&["catalog", "items", item_id.as_str(), "specifications"])?;
        let groups: Vec<SpecificationGroup> =
            self.execute(self.request(reqwest::Method::GET, url)).await?;
        debug!(count = groups.len(), "Fetched specification groups");
        Ok(groups)
    }
}

impl OrderTransport for HttpClient {
    #[instrument(skip(self, request), fields(lines = request.lines.len()))]
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderReceipt, TransportError> {
        let url = self.endpoint(&["orders"])?;
        let builder = self
            .request(reqwest::Method::POST, url)
            .header(IDEMPOTENCY_KEY_HEADER, request.idempotency_key.to_string())
            .json(request);
        self.execute(builder).await
    }

    #[instrument(skip(self))]
    async fn fetch_orders(&self) -> Result<Vec<Order>, TransportError> {
        let url = self.endpoint(&["orders"])?;
        let orders: Vec<Order> = self.execute(self.request(reqwest::Method::GET, url)).await?;
        debug!(count = orders.len(), "Fetched orders");
        Ok(orders)
    }

    #[instrument(skip(self), fields(collection = %collection, order_id = %order_id, status = %status))]
    async fn update_status(
        &self,
        collection: Collection,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), TransportError> {
        let url = self.endpoint(&["orders", &order_id.to_string()])?;
        let builder = self
            .request(reqwest::Method::PATCH, url)
            .json(&StatusUpdate { collection, status });
        self.send(builder).await?;
        Ok(())
    }
}

impl ShiftStore for HttpClient {
    #[instrument(skip(self, shifts), fields(count = shifts.len()))]
    async fn save(&self, shifts: &[Shift]) -> Result<Vec<Shift>, TransportError> {
        let url = self.endpoint(&["shifts"])?;
        self.execute(self.request(reqwest::Method::PUT, url).json(shifts))
            .await
    }

    #[instrument(skip(self), fields(from = %from, to = %to))]
    async fn fetch(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Shift>, TransportError> {
        let mut url = self.endpoint(&["shifts"])?;
        url.query_pairs_mut()
            .append_pair("from", &from.to_string())
            .append_pair("to", &to.to_string());
        self.execute(self.request(reqwest::Method::GET, url)).await
    }
}

impl ChangeFeed for HttpClient {
    #[instrument(skip(self), fields(collection = %collection))]
    async fn subscribe(&self, collection: Collection) -> Result<Subscription, FeedError> {
        let subscribe_error = |source| FeedError::Subscribe { collection, source };

        let url = self
            .endpoint(&["feed", collection.as_str()])
            .map_err(subscribe_error)?;
        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(self.inner.token.expose_secret())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| subscribe_error(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body.chars().take(500).collect::<String>(), "Change feed refused subscription");
            return Err(subscribe_error(TransportError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            }));
        }

        let batches = async_stream::stream! {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(FeedError::Stream { collection, reason: e.to_string() });
                        return;
                    }
                };

                for payload in decoder.push(&chunk) {
                    let payload = match payload {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(collection = %collection, error = %e, "Change feed frame is not valid UTF-8");
                            yield Err(FeedError::Stream { collection, reason: format!("Invalid UTF-8: {e}") });
                            return;
                        }
                    };
                    match serde_json::from_str::<Vec<ChangeEvent>>(&payload) {
                        Ok(events) => yield Ok(events),
                        Err(e) => {
                            warn!(
                                collection = %collection,
                                error = %e,
                                payload = %payload.chars().take(500).collect::<String>(),
                                "Malformed change feed frame"
                            );
                            yield Err(FeedError::Stream { collection, reason: e.to_string() });
                            return;
                        }
                    }
                }
            }
        };

        let (batches, handle) = abortable(batches);
        info!("Subscribed to change feed");
        Ok(Subscription::new(collection, batches, move || handle.abort()))
    }
}
