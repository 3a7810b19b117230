use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::store::StoreError;

/// Typed failure returned by every handler.
///
/// The envelope is always `{success: false, message, error?}`. Store-level
/// errors travel inside `anyhow` and are mapped to the nearest typed variant
/// in the `From<anyhow::Error>` conversion below.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        detail: Option<String>,
    },
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    TooManyRequests(String),
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            detail: None,
        }
    }

    /// A body that could not be decoded into the target document type.
    pub fn invalid_fields(detail: impl Into<String>) -> Self {
        Self::Validation {
            message: "Validation Error".into(),
            detail: Some(detail.into()),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ApiError>() {
            Ok(api) => return api,
            Err(err) => err,
        };
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::Duplicate { field }) => Self::conflict(format!("{field} already exists")),
            Some(StoreError::InvalidId(id)) => Self::validation(format!("Invalid id: {id}")),
            None => Self::Internal(err),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorBody<'a> {
    success: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Detail of a 500 response, carried as a response extension.
///
/// Production responses never show it. Outside production,
/// [`expose_internal_detail`] copies it into the body.
#[derive(Debug, Clone)]
pub struct InternalDetail {
    pub message: String,
    pub chain: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), "internal error");
                let mut response = (
                    status,
                    Json(ErrorBody {
                        success: false,
                        message: "Internal Server Error",
                        error: None,
                    }),
                )
                    .into_response();
                response.extensions_mut().insert(InternalDetail {
                    message: e.to_string(),
                    chain: format!("{e:?}"),
                });
                response
            }
            Self::Validation { message, detail } => (
                status,
                Json(ErrorBody {
                    success: false,
                    message: &message,
                    error: detail.as_deref(),
                }),
            )
                .into_response(),
            other => {
                let message = other.to_string();
                (
                    status,
                    Json(ErrorBody {
                        success: false,
                        message: &message,
                        error: None,
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Middleware that reveals internal error detail in non-production builds.
pub async fn expose_internal_detail(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(detail) = response.extensions().get::<InternalDetail>().cloned() else {
        return response;
    };
    (
        response.status(),
        Json(ErrorBody {
            success: false,
            message: &detail.message,
            error: Some(&detail.chain),
        }),
    )
        .into_response()
}

/// Fallback for unknown routes.
pub async fn route_not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::not_found(format!("Route {} not found", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn store_errors_map_to_typed_variants() {
        let dup: ApiError = anyhow::Error::new(StoreError::Duplicate {
            field: "slug".into(),
        })
        .into();
        assert_eq!(dup.status(), StatusCode::CONFLICT);
        assert_eq!(dup.to_string(), "slug already exists");

        let bad: ApiError = anyhow::Error::new(StoreError::InvalidId("zz".into())).into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        assert_eq!(bad.to_string(), "Invalid id: zz");
    }

    #[test]
    fn context_wrapped_store_errors_still_map() {
        let err = anyhow::Error::new(StoreError::Duplicate {
            field: "email".into(),
        })
        .context("insert user");
        let api: ApiError = err.into();
        assert_eq!(api.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn api_errors_survive_a_trip_through_anyhow() {
        let wrapped = anyhow::Error::new(ApiError::validation("Rating must be between 1 and 5"));
        let api: ApiError = wrapped.into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.to_string(), "Rating must be between 1 and 5");
    }

    #[test]
    fn unknown_errors_are_internal() {
        let api: ApiError = anyhow!("disk on fire").into();
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_response_hides_detail_in_body() {
        let response = ApiError::Internal(anyhow!("secret path /var/x")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response.extensions().get::<InternalDetail>().unwrap();
        assert_eq!(detail.message, "secret path /var/x");
    }
}
