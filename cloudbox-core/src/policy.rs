//! Declarative description of how a context's files are synced into and out
//! of a session.
//!
//! Everything here is plain data that serializes to the camelCase JSON the
//! service expects. The only behavior is validation: recycle paths must be
//! literal directories.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const WILDCARD_CHARS: [char; 4] = ['*', '?', '[', ']'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error(
        "Wildcard patterns are not supported in recycle policy paths. Got: {path}. \
         Please use exact directory paths instead."
    )]
    WildcardRecyclePath { path: String },
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum UploadStrategy {
    #[default]
    UploadBeforeResourceRelease,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum DownloadStrategy {
    #[default]
    DownloadAsync,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Lifecycle {
    #[serde(rename = "Lifecycle_1Day")]
    OneDay,
    #[serde(rename = "Lifecycle_3Days")]
    ThreeDays,
    #[serde(rename = "Lifecycle_5Days")]
    FiveDays,
    #[serde(rename = "Lifecycle_10Days")]
    TenDays,
    #[serde(rename = "Lifecycle_15Days")]
    FifteenDays,
    #[serde(rename = "Lifecycle_30Days")]
    ThirtyDays,
    #[serde(rename = "Lifecycle_90Days")]
    NinetyDays,
    #[serde(rename = "Lifecycle_180Days")]
    HalfYear,
    #[serde(rename = "Lifecycle_360Days")]
    Year,
    #[default]
    #[serde(rename = "Lifecycle_Forever")]
    Forever,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadPolicy {
    pub auto_upload: bool,
    pub upload_strategy: UploadStrategy,
    /// Seconds between periodic uploads.
    pub period: u32,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            auto_upload: true,
            upload_strategy: UploadStrategy::default(),
            period: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadPolicy {
    pub auto_download: bool,
    pub download_strategy: DownloadStrategy,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            auto_download: true,
            download_strategy: DownloadStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeletePolicy {
    pub sync_local_file: bool,
}

impl Default for DeletePolicy {
    fn default() -> Self {
        Self {
            sync_local_file: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractPolicy {
    pub extract: bool,
    pub delete_src_file: bool,
    pub extract_to_current_folder: bool,
}

impl Default for ExtractPolicy {
    fn default() -> Self {
        Self {
            extract: true,
            delete_src_file: true,
            extract_to_current_folder: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RecyclePolicy {
    pub lifecycle: Lifecycle,
    /// Directories the lifecycle applies to; `""` is the context root.
    pub paths: Vec<String>,
}

impl RecyclePolicy {
    pub fn new(lifecycle: Lifecycle, paths: Vec<String>) -> Result<Self, PolicyError> {
        let policy = Self { lifecycle, paths };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        match self
            .paths
            .iter()
            .find(|path| path.contains(WILDCARD_CHARS))
        {
            Some(path) => Err(PolicyError::WildcardRecyclePath { path: path.clone() }),
            None => Ok(()),
        }
    }
}

impl Default for RecyclePolicy {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::Forever,
            paths: vec![String::new()],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct WhiteList {
    pub path: String,
    pub exclude_paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct BwList {
    pub white_lists: Vec<WhiteList>,
}

impl Default for BwList {
    fn default() -> Self {
        Self {
            white_lists: vec![WhiteList::default()],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncPolicy {
    pub upload_policy: UploadPolicy,
    pub download_policy: DownloadPolicy,
    pub delete_policy: DeletePolicy,
    pub extract_policy: ExtractPolicy,
    pub recycle_policy: RecyclePolicy,
    pub bw_list: BwList,
}

/// The zero-configuration policy most callers want.
pub fn new_sync_policy() -> SyncPolicy {
    SyncPolicy::default()
}

/// Binds a context to a mount path inside the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSync {
    context_id: String,
    path: String,
    policy: Option<SyncPolicy>,
}

impl ContextSync {
    pub fn new(
        context_id: impl Into<String>,
        path: impl Into<String>,
        policy: Option<SyncPolicy>,
    ) -> Result<Self, PolicyError> {
        if let Some(policy) = &policy {
            policy.recycle_policy.validate()?;
        }
        Ok(Self {
            context_id: context_id.into(),
            path: path.into(),
            policy,
        })
    }

    pub fn with_policy(self, policy: SyncPolicy) -> Result<Self, PolicyError> {
        Self::new(self.context_id, self.path, Some(policy))
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn policy(&self) -> Option<&SyncPolicy> {
        self.policy.as_ref()
    }
}
