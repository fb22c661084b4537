use async_trait::async_trait;
use tonic::transport::Channel;
use tonic::Status;

use crate::auth::SecurityContext;
use crate::pb;
use crate::pb::ProductServiceClient;

use super::CatalogClient;

/// Product operations backed by the product service. Responses pass through
/// to the caller untouched.
#[derive(Debug, Clone)]
pub struct GrpcCatalogClient {
    inner: ProductServiceClient<Channel>,
}

impl GrpcCatalogClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: ProductServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl CatalogClient for GrpcCatalogClient {
    async fn create_product(
        &self,
        ctx: &SecurityContext,
        request: pb::CreateProductRequest,
    ) -> Result<pb::CreateProductResponse, Status> {
        let mut client = self.inner.clone();
        Ok(client.create_product(ctx.outgoing(request)).await?.into_inner())
    }

    async fn update_product(
        &self,
        ctx: &SecurityContext,
        request: pb::UpdateProductRequest,
    ) -> Result<pb::GeneralResponse, Status> {
        let mut client = self.inner.clone();
        Ok(client.update_product(ctx.outgoing(request)).await?.into_inner())
    }

    async fn delete_product(
        &self,
        ctx: &SecurityContext,
        request: pb::DeleteProductRequest,
    ) -> Result<pb::DeleteProductResponse, Status> {
        let mut client = self.inner.clone();
        Ok(client.delete_product(ctx.outgoing(request)).await?.into_inner())
    }
}
