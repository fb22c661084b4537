// ============================================================================
// Error Taxonomy - one variant per failure class, one status mapping
// ============================================================================
//
// Downstream failures keep their original gRPC status: the service tag on
// the variant exists for logs and metrics only, the caller sees the exact
// code and message the downstream service produced.
//
// ============================================================================

use thiserror::Error;
use tonic::Status;

use crate::auth::AuthError;
use crate::repository::StoreError;

#[derive(Error, Debug)]
pub enum ShopError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("caller is not allowed to {0}")]
    PermissionDenied(&'static str),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{service} call failed: {status}")]
    Downstream { service: &'static str, status: Status },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ShopError {
    /// Tags a downstream gRPC failure with the service it came from.
    pub fn downstream(service: &'static str, status: Status) -> Self {
        ShopError::Downstream { service, status }
    }

    /// Converts the error to an appropriate gRPC status.
    pub fn to_status(&self) -> Status {
        match self {
            ShopError::Auth(err) => {
                tracing::warn!(error = %err, "rejected request without caller context");
                Status::unauthenticated(err.to_string())
            }
            ShopError::PermissionDenied(action) => {
                tracing::warn!(action, "rejected caller lacking the required role");
                Status::permission_denied(self.to_string())
            }
            ShopError::InvalidArgument(msg) => Status::invalid_argument(msg.clone()),
            ShopError::Downstream { service, status } => {
                tracing::warn!(
                    service,
                    code = ?status.code(),
                    "relaying downstream failure unchanged"
                );
                status.clone()
            }
            ShopError::Store(StoreError::ShopNotFound(id)) => {
                tracing::warn!(shop_id = id, "shop row not found");
                Status::not_found(self.to_string())
            }
            ShopError::Store(err) => {
                tracing::error!(error = %err, "shop store failure");
                Status::internal(err.to_string())
            }
        }
    }

    /// Label used for the per-method outcome metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            ShopError::Auth(_) => "unauthenticated",
            ShopError::PermissionDenied(_) => "permission_denied",
            ShopError::InvalidArgument(_) => "invalid_argument",
            ShopError::Downstream { .. } => "downstream_error",
            ShopError::Store(_) => "store_error",
        }
    }
}

impl From<ShopError> for Status {
    fn from(err: ShopError) -> Self {
        err.to_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_missing_context_maps_to_unauthenticated() {
        let status = ShopError::from(AuthError::MissingContext).to_status();
        assert_eq!(status.code(), Code::Unauthenticated);
    }

    #[test]
    fn test_permission_denied_mapping() {
        let status = ShopError::PermissionDenied("publish products").to_status();
        assert_eq!(status.code(), Code::PermissionDenied);
        assert!(status.message().contains("publish products"));
    }

    #[test]
    fn test_invalid_argument_mapping() {
        let status = ShopError::InvalidArgument("shop name must not be empty".into())
            .to_status();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "shop name must not be empty");
    }

    #[test]
    fn test_downstream_status_relayed_verbatim() {
        let original = Status::unavailable("product catalog is down");
        let status = ShopError::downstream("product-service", original).to_status();
        assert_eq!(status.code(), Code::Unavailable);
        assert_eq!(status.message(), "product catalog is down");
    }

    #[test]
    fn test_store_not_found_mapping() {
        let status = ShopError::from(StoreError::ShopNotFound(7)).to_status();
        assert_eq!(status.code(), Code::NotFound);
    }

    #[test]
    fn test_outcome_labels_are_stable() {
        assert_eq!(
            ShopError::from(AuthError::MissingContext).outcome_label(),
            "unauthenticated"
        );
        assert_eq!(
            ShopError::downstream("user-service", Status::internal("boom"))
                .outcome_label(),
            "downstream_error"
        );
    }
}
