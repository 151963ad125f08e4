use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DeviceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DeviceError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            DeviceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}
