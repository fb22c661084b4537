use async_trait::async_trait;
use tonic::transport::Channel;
use tonic::Status;

use crate::auth::SecurityContext;
use crate::pb::UserServiceClient;

use super::AccountClient;

/// Account operations backed by the user service.
#[derive(Debug, Clone)]
pub struct GrpcAccountClient {
    inner: UserServiceClient<Channel>,
}

impl GrpcAccountClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: UserServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl AccountClient for GrpcAccountClient {
    async fn current_account(&self, ctx: &SecurityContext) -> Result<i64, Status> {
        let mut client = self.inner.clone();
        let me = client.get_me(ctx.outgoing(())).await?.into_inner();
        Ok(me.id)
    }

    async fn register_supplier(&self, ctx: &SecurityContext) -> Result<(), Status> {
        let mut client = self.inner.clone();
        client.supplier_register(ctx.outgoing(())).await?;
        Ok(())
    }
}
