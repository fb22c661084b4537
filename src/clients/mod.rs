// ============================================================================
// Downstream Clients - identity, account and catalog collaborators
// ============================================================================
//
// Each collaborator is a trait so the orchestrator can be tested against
// recording doubles. The gRPC implementations share lazy channels created at
// startup and attach the caller's security context to every call. Methods
// return `tonic::Status` directly: a downstream failure is relayed to the
// caller with its code and message unchanged.
//
// ============================================================================

mod account;
mod catalog;
mod identity;

pub use account::GrpcAccountClient;
pub use catalog::GrpcCatalogClient;
pub use identity::GrpcIdentityClient;

use async_trait::async_trait;
use tonic::Status;

use crate::auth::{SecurityContext, UserClaims};
use crate::pb;

/// Service tags used in logs, metrics and downstream error attribution.
pub const AUTH_SERVICE: &str = "auth-service";
pub const USER_SERVICE: &str = "user-service";
pub const PRODUCT_SERVICE: &str = "product-service";

#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Resolves the caller's claims (subject id and role).
    async fn user_claims(&self, ctx: &SecurityContext) -> Result<UserClaims, Status>;
}

#[async_trait]
pub trait AccountClient: Send + Sync {
    /// Resolves the calling account's id.
    async fn current_account(&self, ctx: &SecurityContext) -> Result<i64, Status>;

    /// Flips the calling account's role to supplier.
    async fn register_supplier(&self, ctx: &SecurityContext) -> Result<(), Status>;
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn create_product(
        &self,
        ctx: &SecurityContext,
        request: pb::CreateProductRequest,
    ) -> Result<pb::CreateProductResponse, Status>;

    async fn update_product(
        &self,
        ctx: &SecurityContext,
        request: pb::UpdateProductRequest,
    ) -> Result<pb::GeneralResponse, Status>;

    async fn delete_product(
        &self,
        ctx: &SecurityContext,
        request: pb::DeleteProductRequest,
    ) -> Result<pb::DeleteProductResponse, Status>;
}
