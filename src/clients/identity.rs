use async_trait::async_trait;
use tonic::transport::Channel;
use tonic::Status;

use crate::auth::{SecurityContext, UserClaims};
use crate::pb::AuthServiceClient;

use super::IdentityClient;

/// Identity resolution backed by the auth service.
#[derive(Debug, Clone)]
pub struct GrpcIdentityClient {
    inner: AuthServiceClient<Channel>,
}

impl GrpcIdentityClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: AuthServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl IdentityClient for GrpcIdentityClient {
    async fn user_claims(&self, ctx: &SecurityContext) -> Result<UserClaims, Status> {
        let mut client = self.inner.clone();
        let reply = client.get_user_claims(ctx.outgoing(())).await?.into_inner();

        UserClaims::from_wire(reply).map_err(|err| {
            tracing::error!(error = %err, "auth service returned malformed claims");
            Status::internal(format!("malformed claims from auth service: {err}"))
        })
    }
}
