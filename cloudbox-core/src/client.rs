use std::collections::BTreeMap;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::policy::ContextSync;

const DEFAULT_BASE_URL: &str = "https://api.cloudbox.dev";

#[derive(Debug, Error)]
pub enum CloudboxError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("invalid json: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct CloudboxClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl CloudboxClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CloudboxError> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: impl Into<String>) -> Result<Self, CloudboxError> {
        Self::with_http_client(Client::new(), base_url, api_key)
    }

    /// Builds a client on top of a preconfigured `reqwest::Client`, e.g. one
    /// carrying a request timeout.
    pub fn with_http_client(
        http: Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, CloudboxError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<ApiResponse<SessionData>, CloudboxError> {
        let url = self.endpoint("/v1/sessions")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(request)
            .send()
            .await?;
        Self::handle_envelope(response).await
    }

    pub async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<ApiResponse<SessionData>, CloudboxError> {
        let url = self.session_endpoint(session_id, &[])?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_envelope(response).await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<ActionResponse, CloudboxError> {
        let url = self.session_endpoint(session_id, &[])?;
        let response = self
            .http
            .delete(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_envelope(response).await
    }

    /// Asks the backend to pause the session. Returns as soon as the request
    /// is accepted; the session keeps transitioning through `PAUSING`.
    pub async fn pause_session_async(
        &self,
        session_id: &str,
    ) -> Result<ActionResponse, CloudboxError> {
        let url = self.session_endpoint(session_id, &["pause"])?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_envelope(response).await
    }

    pub async fn resume_session_async(
        &self,
        session_id: &str,
    ) -> Result<ActionResponse, CloudboxError> {
        let url = self.session_endpoint(session_id, &["resume"])?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_envelope(response).await
    }

    pub async fn sync_context(
        &self,
        session_id: &str,
        context_id: Option<&str>,
        path: Option<&str>,
        mode: Option<SyncMode>,
    ) -> Result<ActionResponse, CloudboxError> {
        let mut url = self.session_endpoint(session_id, &["context", "sync"])?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(context_id) = context_id {
                query.append_pair("contextId", context_id);
            }
            if let Some(path) = path {
                query.append_pair("path", path);
            }
            if let Some(mode) = mode {
                query.append_pair("mode", mode.as_str());
            }
        }
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_envelope(response).await
    }

    pub async fn get_context_info(
        &self,
        session_id: &str,
        context_id: Option<&str>,
        path: Option<&str>,
        task_type: Option<&str>,
    ) -> Result<ApiResponse<ContextInfoData>, CloudboxError> {
        let mut url = self.session_endpoint(session_id, &["context", "info"])?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(context_id) = context_id {
                query.append_pair("contextId", context_id);
            }
            if let Some(path) = path {
                query.append_pair("path", path);
            }
            if let Some(task_type) = task_type {
                query.append_pair("taskType", task_type);
            }
        }
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_envelope(response).await
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn endpoint(&self, path: &str) -> Result<Url, CloudboxError> {
        Ok(self.base_url.join(path)?)
    }

    fn session_endpoint(&self, session_id: &str, suffix: &[&str]) -> Result<Url, CloudboxError> {
        let mut url = self.endpoint("/v1/sessions")?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .push(session_id)
            .extend(suffix);
        Ok(url)
    }

    // The service reports business failures (unknown session, quota) inside a
    // regular envelope, sometimes on a non-2xx status. A non-2xx body only
    // counts as an envelope when it carries a code or message; anything else
    // is surfaced raw.
    async fn handle_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<ApiResponse<T>, CloudboxError> {
        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<ApiResponse<T>>(&body) {
            Ok(mut envelope) if status.is_success() || envelope.explains_failure() => {
                if envelope.http_status_code.is_none() {
                    envelope.http_status_code = Some(status.as_u16());
                }
                Ok(envelope)
            }
            Err(err) if status.is_success() => Err(CloudboxError::Decode(err)),
            _ => Err(CloudboxError::Api { status, body }),
        }
    }
}

/// Common response envelope of every Cloudbox endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub http_status_code: Option<u16>,
    pub data: Option<T>,
}

/// Envelope of endpoints whose payload carries nothing the client reads.
pub type ActionResponse = ApiResponse<serde_json::Value>;

impl<T> ApiResponse<T> {
    /// `"{code}: {message}"` when the backend sent a code, otherwise the bare
    /// message.
    pub fn error_message(&self) -> String {
        let message = self.message.as_deref().unwrap_or("unknown error");
        match self.code.as_deref() {
            Some(code) if !code.is_empty() => format!("{code}: {message}"),
            _ => message.to_string(),
        }
    }

    fn explains_failure(&self) -> bool {
        self.code.as_deref().is_some_and(|code| !code.is_empty())
            || self.message.as_deref().is_some_and(|message| !message.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInfoData {
    /// Double-encoded JSON; see [`crate::decode_context_status`].
    #[serde(default)]
    pub context_status: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Upload,
    Download,
}

impl SyncMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Upload => "upload",
            SyncMode::Download => "download",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub persistence_data_list: Vec<PersistenceData>,
}

/// Wire form of a [`ContextSync`]; the policy travels as a JSON string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceData {
    pub context_id: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

impl TryFrom<&ContextSync> for PersistenceData {
    type Error = CloudboxError;

    fn try_from(sync: &ContextSync) -> Result<Self, Self::Error> {
        let policy = sync.policy().map(serde_json::to_string).transpose()?;
        Ok(Self {
            context_id: sync.context_id().to_string(),
            path: sync.path().to_string(),
            policy,
        })
    }
}
