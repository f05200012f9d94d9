use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::Serialize;

pub trait ResponseError: std::error::Error + Send + Sync {
    fn status_code(&self) -> StatusCode;
}

/// Body of every `{"message": ...}` response.
#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        MessageBody {
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct Error {
    reason: Box<dyn ResponseError>,
}

impl<T: ResponseError + 'static> From<T> for Error {
    fn from(e: T) -> Self {
        Error {
            reason: Box::new(e),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.reason.status_code();
        let message = self.reason.to_string();

        tracing::warn!(status_code = %status_code, reason = %message, "request rejected");

        (status_code, Json(MessageBody::new(message))).into_response()
    }
}
