use cloudbox_core::{ApiResponse, CloudboxError};
use thiserror::Error;

/// A single backend round trip that did not produce a usable answer.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Transport(#[from] CloudboxError),
    /// The envelope came back with `success: false`.
    #[error("{message}")]
    Rejected {
        request_id: String,
        message: String,
    },
}

impl RequestError {
    pub(crate) fn check<T>(response: ApiResponse<T>) -> Result<ApiResponse<T>, Self> {
        if response.success {
            Ok(response)
        } else {
            Err(RequestError::Rejected {
                message: response.error_message(),
                request_id: response.request_id,
            })
        }
    }
}
