use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cloudbox_core::{
    ActionResponse, CloudboxClient, CloudboxError, ContextSync, CreateSessionRequest,
    PersistenceData,
};

use crate::config::ClientConfig;
use crate::context::ContextManager;
use crate::error::RequestError;
use crate::poll::{Clock, PollError, PollSettings, Step, TokioClock, poll_until};

pub const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_STATE_INTERVAL: Duration = Duration::from_secs(2);

pub const STATUS_RUNNING: &str = "RUNNING";
pub const STATUS_PAUSED: &str = "PAUSED";

/// Terminal outcome of a pause or resume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStateResult {
    pub success: bool,
    /// On success, the request id of the status fetch that saw the target
    /// state.
    pub request_id: String,
    pub status: Option<String>,
    pub error_message: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub http_status_code: Option<u16>,
}

pub type PauseResult = SessionStateResult;
pub type ResumeResult = SessionStateResult;

impl SessionStateResult {
    fn failure(request_id: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: request_id.into(),
            error_message: Some(error_message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Pause,
    Resume,
}

impl Transition {
    fn target(self) -> &'static str {
        match self {
            Transition::Pause => STATUS_PAUSED,
            Transition::Resume => STATUS_RUNNING,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Transition::Pause => "pause",
            Transition::Resume => "resume",
        }
    }

    async fn submit(
        self,
        client: &CloudboxClient,
        session_id: &str,
    ) -> Result<ActionResponse, CloudboxError> {
        match self {
            Transition::Pause => client.pause_session_async(session_id).await,
            Transition::Resume => client.resume_session_async(session_id).await,
        }
    }
}

#[derive(Debug)]
struct ObservedStatus {
    request_id: String,
    status: String,
}

/// Handle on one remote session. Holds no copy of the remote state; every
/// query goes to the backend.
#[derive(Clone)]
pub struct Session {
    session_id: String,
    client: CloudboxClient,
    clock: Arc<dyn Clock>,
    context: ContextManager,
}

impl Session {
    pub fn new(client: CloudboxClient, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let context = ContextManager::new(client.clone(), session_id.clone());
        Self {
            session_id,
            client,
            clock: Arc::new(TokioClock),
            context,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.context = self.context.with_clock(clock.clone());
        self.clock = clock;
        self
    }

    pub fn with_sync_settings(mut self, settings: PollSettings) -> Self {
        self.context = self.context.with_settings(settings);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    /// Current remote status string, e.g. `RUNNING`.
    pub async fn status(&self) -> Result<String, RequestError> {
        Ok(self.fetch_status().await?.status)
    }

    /// Requests a pause and waits for the session to report `PAUSED`.
    pub async fn pause_async(
        &self,
        timeout: Option<Duration>,
        interval: Option<Duration>,
    ) -> PauseResult {
        self.transition(Transition::Pause, timeout, interval).await
    }

    /// Requests a resume and waits for the session to report `RUNNING`.
    pub async fn resume_async(
        &self,
        timeout: Option<Duration>,
        interval: Option<Duration>,
    ) -> ResumeResult {
        self.transition(Transition::Resume, timeout, interval).await
    }

    /// Deletes the session, optionally flushing context content first. A
    /// failed flush is logged and does not prevent the delete.
    pub async fn delete(&self, sync_context: bool) -> Result<ActionResponse, RequestError> {
        if sync_context {
            let synced = self.context.sync(None, None, None).await;
            if !synced.success {
                tracing::warn!(
                    session_id = %self.session_id,
                    error = synced.error_message.as_deref().unwrap_or_default(),
                    "context sync before delete failed"
                );
            }
        }
        let response = self.client.delete_session(&self.session_id).await?;
        let response = RequestError::check(response)?;
        tracing::info!(session_id = %self.session_id, "session deleted");
        Ok(response)
    }

    async fn transition(
        &self,
        transition: Transition,
        timeout: Option<Duration>,
        interval: Option<Duration>,
    ) -> SessionStateResult {
        let verb = transition.verb();
        let submitted = match transition.submit(&self.client, &self.session_id).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    %err,
                    "session {verb} request failed"
                );
                return SessionStateResult::failure(String::new(), err.to_string());
            }
        };
        if !submitted.success {
            let error_message = submitted.error_message();
            return SessionStateResult {
                success: false,
                request_id: submitted.request_id,
                status: None,
                error_message: Some(error_message),
                code: submitted.code,
                message: submitted.message,
                http_status_code: submitted.http_status_code,
            };
        }
        tracing::debug!(
            session_id = %self.session_id,
            request_id = %submitted.request_id,
            "session {verb} submitted"
        );

        let settings = PollSettings::new(
            timeout.unwrap_or(DEFAULT_STATE_TIMEOUT),
            interval.unwrap_or(DEFAULT_STATE_INTERVAL),
        );
        let target = transition.target();
        let outcome = poll_until(
            self.clock.as_ref(),
            settings,
            || self.fetch_status(),
            |observed: ObservedStatus| {
                if observed.status == target {
                    Step::Done(observed)
                } else {
                    tracing::debug!(
                        status = %observed.status,
                        expected = target,
                        "session not settled"
                    );
                    Step::Continue
                }
            },
        )
        .await;

        match outcome {
            Ok(observed) => {
                tracing::info!(
                    session_id = %self.session_id,
                    status = %observed.status,
                    "session {verb} completed"
                );
                SessionStateResult {
                    success: true,
                    request_id: observed.request_id,
                    status: Some(observed.status),
                    ..SessionStateResult::default()
                }
            }
            Err(PollError::Fetch(err)) => {
                let request_id = match &err {
                    RequestError::Rejected { request_id, .. } => request_id.clone(),
                    RequestError::Transport(_) => String::new(),
                };
                SessionStateResult::failure(request_id, err.to_string())
            }
            Err(PollError::TimedOut { attempts, .. }) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    attempts,
                    "session {verb} timed out"
                );
                SessionStateResult::failure(
                    submitted.request_id,
                    format!(
                        "Session {verb} timed out after {:.1} seconds",
                        settings.timeout.as_secs_f64()
                    ),
                )
            }
        }
    }

    async fn fetch_status(&self) -> Result<ObservedStatus, RequestError> {
        let response = self.client.get_session(&self.session_id).await?;
        let response = RequestError::check(response)?;
        Ok(ObservedStatus {
            request_id: response.request_id,
            status: response.data.map(|data| data.status).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateSessionParams {
    pub image_id: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub context_syncs: Vec<ContextSync>,
}

/// Entry point that creates sessions or attaches to existing ones.
#[derive(Clone)]
pub struct Cloudbox {
    client: CloudboxClient,
    sync_settings: PollSettings,
}

impl Cloudbox {
    pub fn new(config: &ClientConfig) -> Result<Self, CloudboxError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let client = CloudboxClient::with_http_client(http, &config.endpoint, &config.api_key)?;
        Ok(Self {
            client,
            sync_settings: config.sync,
        })
    }

    pub fn from_client(client: CloudboxClient, sync_settings: PollSettings) -> Self {
        Self {
            client,
            sync_settings,
        }
    }

    pub fn session(&self, session_id: impl Into<String>) -> Session {
        Session::new(self.client.clone(), session_id).with_sync_settings(self.sync_settings)
    }

    pub async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<Session, RequestError> {
        let persistence_data_list = params
            .context_syncs
            .iter()
            .map(PersistenceData::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let request = CreateSessionRequest {
            image_id: params.image_id,
            labels: params.labels,
            persistence_data_list,
        };
        let response = RequestError::check(self.client.create_session(&request).await?)?;
        let session_id = response.data.map(|data| data.session_id).unwrap_or_default();
        if session_id.is_empty() {
            return Err(RequestError::Rejected {
                request_id: response.request_id,
                message: "session id missing from create response".to_string(),
            });
        }
        tracing::info!(%session_id, request_id = %response.request_id, "session created");
        Ok(self.session(session_id))
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
