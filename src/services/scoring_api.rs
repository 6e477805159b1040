use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    dao::models::{PersonId, StoredScore},
    dto::{
        batch::{BatchRequest, BatchResponse},
        heats::HeatsPayload,
        score::{ScoreResponse, ScoreUpdate, UpdateKind},
    },
};

const BATCH_ENDPOINT: &str = "batch";
const HEATS_ENDPOINT: &str = "heats.json";

/// Result alias for scoring server calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failures talking to the scoring server.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build scoring HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request never produced a response (DNS, refused, timeout).
    #[error("failed to send request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("unexpected response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// The response body was not the expected JSON.
    #[error("failed to decode response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    /// Whether the server answered but with a malformed payload.
    pub fn is_protocol(&self) -> bool {
        matches!(self, ApiError::DecodeResponse { .. })
    }
}

/// The scoring server's three score endpoints plus the heat list.
pub trait ScoringApi: Send + Sync {
    fn post_score(
        &self,
        judge: PersonId,
        update: ScoreUpdate,
    ) -> BoxFuture<'static, ApiResult<ScoreResponse>>;
    fn post_batch(
        &self,
        judge: PersonId,
        scores: Vec<StoredScore>,
    ) -> BoxFuture<'static, ApiResult<BatchResponse>>;
    fn fetch_heats(&self, judge: PersonId) -> BoxFuture<'static, ApiResult<HeatsPayload>>;
}

/// [`ScoringApi`] over HTTP/JSON.
#[derive(Clone)]
pub struct HttpScoringApi {
    client: Client,
    base_url: Arc<str>,
}

impl HttpScoringApi {
    /// Build a client rooted at `base_url`; `timeout` bounds every request.
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::<str>::from(base_url.trim_end_matches('/')),
        })
    }

    fn path(judge: PersonId, endpoint: &str) -> String {
        format!("scores/{judge}/{endpoint}")
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        self.client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send<T>(&self, builder: reqwest::RequestBuilder, path: String) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let response = builder
            .send()
            .await
            .map_err(|source| ApiError::RequestSend {
                path: path.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::RequestStatus { path, status });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| ApiError::DecodeResponse { path, source })
    }

    async fn post_json<B, T>(&self, path: String, body: &B) -> ApiResult<T>
    where
        B: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::POST, &path).json(body);
        self.send(builder, path).await
    }
}

impl ScoringApi for HttpScoringApi {
    fn post_score(
        &self,
        judge: PersonId,
        update: ScoreUpdate,
    ) -> BoxFuture<'static, ApiResult<ScoreResponse>> {
        let api = self.clone();
        Box::pin(async move {
            let kind = update.kind();
            let path = Self::path(judge, kind.endpoint());
            match kind {
                UpdateKind::Plain => api.post_json(path, &update.plain_body()).await,
                UpdateKind::Feedback => api.post_json(path, &update.feedback_body()).await,
            }
        })
    }

    fn post_batch(
        &self,
        judge: PersonId,
        scores: Vec<StoredScore>,
    ) -> BoxFuture<'static, ApiResult<BatchResponse>> {
        let api = self.clone();
        Box::pin(async move {
            let path = Self::path(judge, BATCH_ENDPOINT);
            api.post_json(path, &BatchRequest { scores: &scores }).await
        })
    }

    fn fetch_heats(&self, judge: PersonId) -> BoxFuture<'static, ApiResult<HeatsPayload>> {
        let api = self.clone();
        Box::pin(async move {
            let path = Self::path(judge, HEATS_ENDPOINT);
            let builder = api.request(Method::GET, &path);
            api.send(builder, path).await
        })
    }
}
