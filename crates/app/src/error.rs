//! Unified error handling for the app.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::store_sessions::StoreSessionError;
use crate::services::sync::SyncError;
use crate::shopify::ShopifyError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid credentials, or an unknown shop.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Signed request failed verification.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The request conflicts with a product's current role.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Shopify API operation failed.
    #[error("Shopify error: {0}")]
    Upstream(#[from] ShopifyError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidState(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Upstream(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Upstream(_) => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Validation(e) => Self::Validation(e.to_string()),
            SyncError::ChildCannotBeMaster(_)
            | SyncError::NotMaster(_)
            | SyncError::MasterCannotBeChild(_)
            | SyncError::AlreadyLinked { .. } => Self::InvalidState(err.to_string()),
            SyncError::NoLinkage(_) => Self::NotFound(err.to_string()),
            SyncError::CorruptMetafield { .. } => Self::Internal(err.to_string()),
            SyncError::Upstream(e) => Self::Upstream(e),
        }
    }
}

impl From<StoreSessionError> for AppError {
    fn from(err: StoreSessionError) -> Self {
        match err {
            StoreSessionError::NotInstalled(_) => Self::Unauthorized(err.to_string()),
            StoreSessionError::Directory(e) => Self::Database(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

/// Tag the Sentry scope with the shop a request acts for and, when the
/// request carried a session token, the staff user behind it.
pub fn set_sentry_context(shop: &str, user_id: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_tag("shop", shop);
        if let Some(id) = user_id {
            scope.set_user(Some(sentry::User {
                id: Some(id.to_string()),
                ..Default::default()
            }));
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stock_sync_core::{LinkageError, ProductId, ShopDomain};

    use super::*;

    fn id(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 1".to_string());
        assert_eq!(err.to_string(), "Not found: product 1");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::Validation("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::InvalidState("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Unauthorized("x".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("x".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::NotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Upstream(ShopifyError::RateLimited(2))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Internal("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_sync_error_mapping() {
        assert!(matches!(
            AppError::from(SyncError::Validation(LinkageError::EmptyChildren)),
            AppError::Validation(_)
        ));
        assert!(matches!(
            AppError::from(SyncError::ChildCannotBeMaster(id("1"))),
            AppError::InvalidState(_)
        ));
        assert!(matches!(
            AppError::from(SyncError::AlreadyLinked {
                child: id("2"),
                master: id("1"),
            }),
            AppError::InvalidState(_)
        ));
        assert!(matches!(
            AppError::from(SyncError::NoLinkage(id("1"))),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(SyncError::Upstream(ShopifyError::RateLimited(2))),
            AppError::Upstream(ShopifyError::RateLimited(_))
        ));
    }

    #[test]
    fn test_store_session_error_mapping() {
        let shop = ShopDomain::parse("a.myshopify.com").unwrap();
        assert!(matches!(
            AppError::from(StoreSessionError::NotInstalled(shop)),
            AppError::Unauthorized(_)
        ));
    }

    #[tokio::test]
    async fn test_upstream_details_are_hidden() {
        let response = AppError::Upstream(ShopifyError::Unauthorized(
            "token shpat_live rejected".to_string(),
        ))
        .into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "External service error");
    }
}
