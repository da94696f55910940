use std::sync::Arc;
use std::time::Duration;

use cloudbox_core::{CloudboxClient, ContextStatusItem, SyncMode, decode_context_status};

use crate::error::RequestError;
use crate::poll::{Clock, PollError, PollSettings, Step, TokioClock, poll_until};

pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(150);
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(1500);

const SYNC_ERROR_PREFIX: &str = "Failed to sync context: ";
const TASK_UPLOAD: &str = "upload";
const TASK_DOWNLOAD: &str = "download";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSyncResult {
    pub success: bool,
    pub request_id: String,
    pub error_message: Option<String>,
}

impl ContextSyncResult {
    fn failure(request_id: impl Into<String>, error_message: String) -> Self {
        Self {
            success: false,
            request_id: request_id.into(),
            error_message: Some(error_message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextInfoResult {
    pub request_id: String,
    pub context_status_data: Vec<ContextStatusItem>,
}

/// Which status rows a sync call is waiting on.
#[derive(Debug, Clone, Default)]
struct SyncTarget {
    context_id: Option<String>,
    path: Option<String>,
    mode: Option<SyncMode>,
}

impl SyncTarget {
    fn tracks(&self, item: &ContextStatusItem) -> bool {
        let task_matches = match self.mode {
            Some(mode) => item.task_type == mode.as_str(),
            None => item.task_type == TASK_UPLOAD || item.task_type == TASK_DOWNLOAD,
        };
        task_matches
            && self
                .context_id
                .as_deref()
                .is_none_or(|id| item.context_id == id)
            && self.path.as_deref().is_none_or(|path| item.path == path)
    }

    /// Done once no tracked row is still moving; no tracked rows at all also
    /// counts as done.
    fn evaluate(&self, items: &[ContextStatusItem]) -> Step<Vec<String>> {
        let mut failed = Vec::new();
        for item in items.iter().filter(|item| self.tracks(item)) {
            if !item.is_terminal() {
                return Step::Continue;
            }
            if item.is_failed() {
                tracing::warn!(
                    context_id = %item.context_id,
                    path = %item.path,
                    task_type = %item.task_type,
                    error = %item.error_message,
                    "context sync task failed"
                );
                failed.push(item.path.clone());
            }
        }
        Step::Done(failed)
    }
}

/// Sync and status operations for the contexts mounted in one session.
#[derive(Clone)]
pub struct ContextManager {
    client: CloudboxClient,
    session_id: String,
    clock: Arc<dyn Clock>,
    settings: PollSettings,
}

impl ContextManager {
    pub fn new(client: CloudboxClient, session_id: impl Into<String>) -> Self {
        Self {
            client,
            session_id: session_id.into(),
            clock: Arc::new(TokioClock),
            settings: PollSettings::new(DEFAULT_SYNC_TIMEOUT, DEFAULT_SYNC_INTERVAL),
        }
    }

    pub fn with_settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Latest per-path sync progress. An unreadable status payload yields an
    /// empty list rather than an error.
    pub async fn info(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        task_type: Option<&str>,
    ) -> Result<ContextInfoResult, RequestError> {
        let response = self
            .client
            .get_context_info(&self.session_id, context_id, path, task_type)
            .await?;
        let response = RequestError::check(response)?;
        let raw = response.data.and_then(|data| data.context_status);
        Ok(ContextInfoResult {
            request_id: response.request_id,
            context_status_data: decode_context_status(raw.as_deref()).into_items(),
        })
    }

    /// Submits a sync and waits until every tracked path reaches `Success` or
    /// `Failed`, a status fetch fails, or the configured timeout elapses.
    pub async fn sync(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        mode: Option<SyncMode>,
    ) -> ContextSyncResult {
        let (submitted, target) = match self.submit(context_id, path, mode).await {
            Ok(submitted) => submitted,
            Err(result) => return result,
        };
        self.settle(submitted.request_id, &target).await
    }

    /// Submits a sync and returns right away; polling continues on a spawned
    /// task and `on_done` receives `true` once every tracked path succeeded.
    ///
    /// `on_done` is not called when the submit itself fails; the returned
    /// result carries that failure.
    pub async fn sync_with_callback<F>(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        mode: Option<SyncMode>,
        on_done: F,
    ) -> ContextSyncResult
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let (submitted, target) = match self.submit(context_id, path, mode).await {
            Ok(submitted) => submitted,
            Err(result) => return result,
        };

        let manager = self.clone();
        let request_id = submitted.request_id.clone();
        tokio::spawn(async move {
            let result = manager.settle(request_id, &target).await;
            on_done(result.success);
        });

        submitted
    }

    async fn submit(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        mode: Option<SyncMode>,
    ) -> Result<(ContextSyncResult, SyncTarget), ContextSyncResult> {
        let response = self
            .client
            .sync_context(&self.session_id, context_id, path, mode)
            .await
            .map_err(RequestError::from)
            .and_then(RequestError::check);
        match response {
            Ok(response) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    request_id = %response.request_id,
                    "context sync submitted"
                );
                let submitted = ContextSyncResult {
                    success: true,
                    request_id: response.request_id,
                    error_message: None,
                };
                let target = SyncTarget {
                    context_id: context_id.map(str::to_string),
                    path: path.map(str::to_string),
                    mode,
                };
                Ok((submitted, target))
            }
            Err(err) => {
                let request_id = match &err {
                    RequestError::Rejected { request_id, .. } => request_id.clone(),
                    RequestError::Transport(_) => String::new(),
                };
                Err(ContextSyncResult::failure(
                    request_id,
                    format!("{SYNC_ERROR_PREFIX}{err}"),
                ))
            }
        }
    }

    /// Polls until `target` settles and labels the outcome with the submit
    /// request id.
    async fn settle(&self, request_id: String, target: &SyncTarget) -> ContextSyncResult {
        let outcome = self.wait_for(target).await;
        let result = self.finish(request_id, outcome);
        match &result.error_message {
            Some(error) => tracing::warn!(
                session_id = %self.session_id,
                request_id = %result.request_id,
                %error,
                "context sync failed"
            ),
            None => tracing::info!(
                session_id = %self.session_id,
                request_id = %result.request_id,
                "context sync finished"
            ),
        }
        result
    }

    async fn wait_for(&self, target: &SyncTarget) -> Result<Vec<String>, PollError<RequestError>> {
        poll_until(
            self.clock.as_ref(),
            self.settings,
            || {
                self.info(
                    target.context_id.as_deref(),
                    target.path.as_deref(),
                    None,
                )
            },
            |info: ContextInfoResult| target.evaluate(&info.context_status_data),
        )
        .await
    }

    fn finish(
        &self,
        request_id: String,
        outcome: Result<Vec<String>, PollError<RequestError>>,
    ) -> ContextSyncResult {
        match outcome {
            Ok(failed) if failed.is_empty() => ContextSyncResult {
                success: true,
                request_id,
                error_message: None,
            },
            Ok(failed) => ContextSyncResult::failure(
                request_id,
                format!("{SYNC_ERROR_PREFIX}tasks failed for {}", failed.join(", ")),
            ),
            Err(PollError::Fetch(err)) => {
                ContextSyncResult::failure(request_id, format!("{SYNC_ERROR_PREFIX}{err}"))
            }
            Err(PollError::TimedOut { .. }) => ContextSyncResult::failure(
                request_id,
                format!(
                    "Context sync timed out after {:.1} seconds",
                    self.settings.timeout.as_secs_f64()
                ),
            ),
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
