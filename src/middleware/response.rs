use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::database::listing::{Page, Pagination};

/// Success envelope: `{message?, pagination?, <key>: data}`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub status_code: Option<StatusCode>,
    pub message: Option<String>,
    pub key: Option<&'static str>,
    pub data: T,
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(key: &'static str, data: T) -> Self {
        Self {
            status_code: None,
            message: None,
            key: Some(key),
            data,
            pagination: None,
        }
    }

    /// Create a 201 Created response
    pub fn created(key: &'static str, data: T) -> Self {
        Self::success(key, data).with_status(StatusCode::CREATED)
    }

    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn page(key: &'static str, page: Page<T>) -> Self {
        Self {
            pagination: Some(page.pagination),
            ..Self::success(key, page.items)
        }
    }
}

impl ApiResponse<()> {
    /// Body with only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            message: Some(message.into()),
            key: None,
            data: (),
            pagination: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let mut body = Map::new();
        if let Some(message) = self.message {
            body.insert("message".to_string(), Value::String(message));
        }
        if let Some(pagination) = self.pagination {
            body.insert("pagination".to_string(), json!(pagination));
        }
        if let Some(key) = self.key {
            match serde_json::to_value(&self.data) {
                Ok(value) => {
                    body.insert(key.to_string(), value);
                }
                Err(e) => {
                    tracing::error!("Failed to serialize response data: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "message": "Error interno del servidor." })),
                    )
                        .into_response();
                }
            }
        }

        (status, Json(Value::Object(body))).into_response()
    }
}

// Convenience type alias
pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
