pub mod config;
pub mod context;
pub mod error;
pub mod poll;
pub mod session;

pub use config::ClientConfig;
pub use context::{ContextInfoResult, ContextManager, ContextSyncResult};
pub use error::RequestError;
pub use poll::{Clock, PollError, PollSettings, Step, TokioClock, poll_until};
pub use session::{
    Cloudbox, CreateSessionParams, PauseResult, ResumeResult, Session, SessionStateResult,
};

pub use cloudbox_core::{
    ContextStatusItem, ContextSync, Lifecycle, PolicyError, SyncMode, SyncPolicy,
    new_sync_policy,
};
