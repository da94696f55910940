mod client;
mod policy;
mod status;

pub use client::{
    ActionResponse, ApiResponse, CloudboxClient, CloudboxError, ContextInfoData,
    CreateSessionRequest, PersistenceData, SessionData, SyncMode,
};
pub use policy::{
    BwList, ContextSync, DeletePolicy, DownloadPolicy, DownloadStrategy, ExtractPolicy, Lifecycle,
    PolicyError, RecyclePolicy, SyncPolicy, UploadPolicy, UploadStrategy, WhiteList,
    new_sync_policy,
};
pub use status::{ContextStatusItem, StatusPayload, decode_context_status};
