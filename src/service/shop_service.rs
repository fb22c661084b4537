use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::auth::{SecurityContext, UserRole};
use crate::clients::{
    AccountClient, CatalogClient, IdentityClient, AUTH_SERVICE, PRODUCT_SERVICE, USER_SERVICE,
};
use crate::error::ShopError;
use crate::metrics::Metrics;
use crate::pb;
use crate::repository::{
    CreateShopParams, FollowShopParams, ShopStore, StoreError, UpdateShopNameParams,
};

/// Name served when a shop lookup fails for any reason. A storefront page
/// must render something, so lookup failures degrade to this default
/// instead of erroring.
pub const FALLBACK_SHOP_NAME: &str = "ecommerce official";

// ============================================================================
// Shop Orchestrator
// ============================================================================
//
// Implements the ShopService wire trait on top of three downstream
// collaborators and the shop store. Holds no per-request state: every
// pipeline runs from the inbound request alone.
//
// ============================================================================

pub struct ShopOrchestrator<I, A, C, S> {
    identity: Arc<I>,
    accounts: Arc<A>,
    catalog: Arc<C>,
    store: Arc<S>,
    metrics: Arc<Metrics>,
}

impl<I, A, C, S> ShopOrchestrator<I, A, C, S>
where
    I: IdentityClient,
    A: AccountClient,
    C: CatalogClient,
    S: ShopStore,
{
    pub fn new(
        identity: Arc<I>,
        accounts: Arc<A>,
        catalog: Arc<C>,
        store: Arc<S>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            identity,
            accounts,
            catalog,
            store,
            metrics,
        }
    }

    /// Runs a downstream call, tagging the outcome for metrics and error
    /// attribution. The failure keeps the downstream status untouched.
    async fn downstream<T>(
        &self,
        service: &'static str,
        call: impl Future<Output = Result<T, Status>>,
    ) -> Result<T, ShopError> {
        match call.await {
            Ok(value) => {
                self.metrics.record_downstream(service, "ok");
                Ok(value)
            }
            Err(status) => {
                self.metrics.record_downstream(service, "error");
                Err(ShopError::downstream(service, status))
            }
        }
    }

    /// Records the RPC outcome and converts the pipeline result to the wire.
    fn finish<T>(
        &self,
        method: &'static str,
        started: Instant,
        result: Result<T, ShopError>,
    ) -> Result<Response<T>, Status> {
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.outcome_label(),
        };
        self.metrics
            .record_rpc(method, outcome, started.elapsed().as_secs_f64());
        result.map(Response::new).map_err(Status::from)
    }

    async fn handle_register_shop(
        &self,
        request: Request<pb::RegisterShopRequest>,
    ) -> Result<pb::GeneralResponse, ShopError> {
        let ctx = SecurityContext::from_request(&request)?;
        let req = request.into_inner();
        let request_id = Uuid::new_v4();

        tracing::info!(request_id = %request_id, shop_name = %req.name, "registering shop");

        // Flip the account to supplier first, then resolve its id.
        // TODO: two phase commit; a create_shop failure below leaves the
        // account flipped to supplier with no shop row
        self.downstream(USER_SERVICE, self.accounts.register_supplier(&ctx))
            .await?;
        let owner_id = self
            .downstream(USER_SERVICE, self.accounts.current_account(&ctx))
            .await?;

        let avatar = if req.avatar.is_empty() {
            None
        } else {
            Some(req.avatar)
        };
        self.store
            .create_shop(CreateShopParams {
                owner_id,
                name: req.name,
                avatar,
            })
            .await?;

        tracing::info!(request_id = %request_id, owner_id, "shop registered");
        Ok(pb::GeneralResponse {
            message: "shop registered, you can start selling now".to_string(),
            status_code: 0,
        })
    }

    async fn handle_get_shop(
        &self,
        request: Request<pb::GetShopRequest>,
    ) -> Result<pb::GetShopResponse, ShopError> {
        let req = request.into_inner();

        match self.store.shop_by_id(req.shop_id).await {
            Ok(shop) => Ok(pb::GetShopResponse { name: shop.name }),
            Err(err) => {
                // Storefront rule: a failed lookup serves the default name,
                // never an error. Operators still see which failure it was.
                let reason = match err {
                    StoreError::ShopNotFound(_) => "not_found",
                    StoreError::Database(_) => "store_error",
                };
                self.metrics.record_shop_fallback(reason);
                tracing::warn!(
                    shop_id = req.shop_id,
                    reason,
                    error = %err,
                    "serving fallback shop name"
                );
                Ok(pb::GetShopResponse {
                    name: FALLBACK_SHOP_NAME.to_string(),
                })
            }
        }
    }

    async fn handle_add_product(
        &self,
        request: Request<pb::CreateProductRequest>,
    ) -> Result<pb::CreateProductResponse, ShopError> {
        let ctx = SecurityContext::from_request(&request)?;
        let mut req = request.into_inner();
        let request_id = Uuid::new_v4();

        let claims = self
            .downstream(AUTH_SERVICE, self.identity.user_claims(&ctx))
            .await?;
        match claims.role {
            UserRole::Customer => {
                return Err(ShopError::PermissionDenied("publish products"));
            }
            UserRole::Supplier | UserRole::Admin => {}
        }

        // The supplier id binds to the authenticated caller, whatever the
        // request carried.
        req.supplier_id = claims.account_id;

        tracing::info!(
            request_id = %request_id,
            supplier_id = claims.account_id,
            product_name = %req.name,
            "forwarding product creation to the catalog"
        );
        self.downstream(PRODUCT_SERVICE, self.catalog.create_product(&ctx, req))
            .await
    }

    async fn handle_delete_product(
        &self,
        request: Request<pb::DeleteProductRequest>,
    ) -> Result<pb::DeleteProductResponse, ShopError> {
        let ctx = SecurityContext::from_request(&request)?;
        let mut req = request.into_inner();
        let request_id = Uuid::new_v4();

        let supplier_id = self
            .downstream(USER_SERVICE, self.accounts.current_account(&ctx))
            .await?;
        req.supplier_id = supplier_id;

        tracing::debug!(
            request_id = %request_id,
            product_id = req.product_id,
            supplier_id,
            "forwarding product deletion to the catalog"
        );
        // The catalog's reply body is discarded; this service owns the
        // confirmation text.
        self.downstream(PRODUCT_SERVICE, self.catalog.delete_product(&ctx, req))
            .await?;
        Ok(pb::DeleteProductResponse {
            message: "product deleted successfully".to_string(),
        })
    }

    async fn handle_update_product(
        &self,
        request: Request<pb::UpdateProductRequest>,
    ) -> Result<pb::GeneralResponse, ShopError> {
        let ctx = SecurityContext::from_request(&request)?;
        let mut req = request.into_inner();
        let request_id = Uuid::new_v4();

        let supplier_id = self
            .downstream(USER_SERVICE, self.accounts.current_account(&ctx))
            .await?;
        req.supplier_id = supplier_id;

        tracing::debug!(
            request_id = %request_id,
            product_id = req.product_id,
            supplier_id,
            "forwarding product update to the catalog"
        );
        self.downstream(PRODUCT_SERVICE, self.catalog.update_product(&ctx, req))
            .await?;
        Ok(pb::GeneralResponse {
            message: "product updated successfully".to_string(),
            status_code: 0,
        })
    }

    async fn handle_follow_shop(
        &self,
        request: Request<pb::FollowShopRequest>,
    ) -> Result<pb::GeneralResponse, ShopError> {
        let ctx = SecurityContext::from_request(&request)?;
        let req = request.into_inner();
        let request_id = Uuid::new_v4();

        let follower_id = self
            .downstream(USER_SERVICE, self.accounts.current_account(&ctx))
            .await?;
        self.store
            .follow_shop(FollowShopParams {
                shop_id: req.shop_id,
                follower_id,
            })
            .await?;

        tracing::info!(
            request_id = %request_id,
            shop_id = req.shop_id,
            follower_id,
            "shop followed"
        );
        Ok(pb::GeneralResponse {
            message: "shop followed".to_string(),
            status_code: 0,
        })
    }

    async fn handle_update_shop_name(
        &self,
        request: Request<pb::UpdateShopNameRequest>,
    ) -> Result<pb::GetShopResponse, ShopError> {
        // Validation runs before authentication, preserving the platform's
        // historical response order.
        if request.get_ref().name.is_empty() {
            return Err(ShopError::InvalidArgument(
                "shop name must not be empty".to_string(),
            ));
        }
        let ctx = SecurityContext::from_request(&request)?;
        let req = request.into_inner();
        let request_id = Uuid::new_v4();

        let owner_id = self
            .downstream(USER_SERVICE, self.accounts.current_account(&ctx))
            .await?;
        self.store
            .update_shop_name(UpdateShopNameParams {
                owner_id,
                name: req.name,
            })
            .await?;

        tracing::debug!(request_id = %request_id, owner_id, "shop name updated");
        Ok(pb::GetShopResponse {
            name: "shop name updated".to_string(),
        })
    }
}

#[tonic::async_trait]
impl<I, A, C, S> pb::ShopService for ShopOrchestrator<I, A, C, S>
where
    I: IdentityClient + 'static,
    A: AccountClient + 'static,
    C: CatalogClient + 'static,
    S: ShopStore + 'static,
{
    async fn ping(&self, _request: Request<()>) -> Result<Response<pb::Pong>, Status> {
        let started = Instant::now();
        self.finish(
            "Ping",
            started,
            Ok(pb::Pong {
                message: "pong".to_string(),
            }),
        )
    }

    async fn register_shop(
        &self,
        request: Request<pb::RegisterShopRequest>,
    ) -> Result<Response<pb::GeneralResponse>, Status> {
        let started = Instant::now();
        let result = self.handle_register_shop(request).await;
        self.finish("RegisterShop", started, result)
    }

    async fn get_shop(
        &self,
        request: Request<pb::GetShopRequest>,
    ) -> Result<Response<pb::GetShopResponse>, Status> {
        let started = Instant::now();
        let result = self.handle_get_shop(request).await;
        self.finish("GetShop", started, result)
    }

    async fn add_product(
        &self,
        request: Request<pb::CreateProductRequest>,
    ) -> Result<Response<pb::CreateProductResponse>, Status> {
        let started = Instant::now();
        let result = self.handle_add_product(request).await;
        self.finish("AddProduct", started, result)
    }

    async fn delete_product(
        &self,
        request: Request<pb::DeleteProductRequest>,
    ) -> Result<Response<pb::DeleteProductResponse>, Status> {
        let started = Instant::now();
        let result = self.handle_delete_product(request).await;
        self.finish("DeleteProduct", started, result)
    }

    async fn update_product(
        &self,
        request: Request<pb::UpdateProductRequest>,
    ) -> Result<Response<pb::GeneralResponse>, Status> {
        let started = Instant::now();
        let result = self.handle_update_product(request).await;
        self.finish("UpdateProduct", started, result)
    }

    async fn follow_shop(
        &self,
        request: Request<pb::FollowShopRequest>,
    ) -> Result<Response<pb::GeneralResponse>, Status> {
        let started = Instant::now();
        let result = self.handle_follow_shop(request).await;
        self.finish("FollowShop", started, result)
    }

    async fn update_shop_name(
        &self,
        request: Request<pb::UpdateShopNameRequest>,
    ) -> Result<Response<pb::GetShopResponse>, Status> {
        let started = Instant::now();
        let result = self.handle_update_shop_name(request).await;
        self.finish("UpdateShopName", started, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserClaims;
    use crate::pb::ShopService as _;
    use crate::repository::Shop;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tonic::Code;

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    fn call_log() -> CallLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    // ------------------------------------------------------------------
    // Recording doubles
    // ------------------------------------------------------------------

    struct StubIdentity {
        result: Result<UserClaims, Status>,
        calls: AtomicUsize,
    }

    impl StubIdentity {
        fn claims(role: UserRole, account_id: i64) -> Self {
            Self {
                result: Ok(UserClaims { account_id, role }),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(status: Status) -> Self {
            Self {
                result: Err(status),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IdentityClient for StubIdentity {
        async fn user_claims(&self, _ctx: &SecurityContext) -> Result<UserClaims, Status> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct StubAccounts {
        account_id: i64,
        fail_me: Option<Status>,
        fail_register: Option<Status>,
        me_calls: AtomicUsize,
        register_calls: AtomicUsize,
        log: CallLog,
    }

    impl StubAccounts {
        fn new(account_id: i64, log: CallLog) -> Self {
            Self {
                account_id,
                fail_me: None,
                fail_register: None,
                me_calls: AtomicUsize::new(0),
                register_calls: AtomicUsize::new(0),
                log,
            }
        }
    }

    #[async_trait]
    impl AccountClient for StubAccounts {
        async fn current_account(&self, _ctx: &SecurityContext) -> Result<i64, Status> {
            self.me_calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push("accounts.current_account");
            match &self.fail_me {
                Some(status) => Err(status.clone()),
                None => Ok(self.account_id),
            }
        }

        async fn register_supplier(&self, _ctx: &SecurityContext) -> Result<(), Status> {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push("accounts.register_supplier");
            match &self.fail_register {
                Some(status) => Err(status.clone()),
                None => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingCatalog {
        created: Mutex<Vec<pb::CreateProductRequest>>,
        updated: Mutex<Vec<pb::UpdateProductRequest>>,
        deleted: Mutex<Vec<pb::DeleteProductRequest>>,
    }

    #[async_trait]
    impl CatalogClient for RecordingCatalog {
        async fn create_product(
            &self,
            _ctx: &SecurityContext,
            request: pb::CreateProductRequest,
        ) -> Result<pb::CreateProductResponse, Status> {
            self.created.lock().unwrap().push(request);
            Ok(pb::CreateProductResponse {
                product_id: 4242,
                message: "created by catalog".to_string(),
            })
        }

        async fn update_product(
            &self,
            _ctx: &SecurityContext,
            request: pb::UpdateProductRequest,
        ) -> Result<pb::GeneralResponse, Status> {
            self.updated.lock().unwrap().push(request);
            Ok(pb::GeneralResponse {
                message: "updated by catalog".to_string(),
                status_code: 0,
            })
        }

        async fn delete_product(
            &self,
            _ctx: &SecurityContext,
            request: pb::DeleteProductRequest,
        ) -> Result<pb::DeleteProductResponse, Status> {
            self.deleted.lock().unwrap().push(request);
            Ok(pb::DeleteProductResponse {
                message: "deleted by catalog".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct InMemoryStore {
        shops: Mutex<Vec<Shop>>,
        created: Mutex<Vec<CreateShopParams>>,
        renames: Mutex<Vec<UpdateShopNameParams>>,
        follows: Mutex<Vec<FollowShopParams>>,
        fail_create: bool,
        fail_lookup: bool,
        log: CallLog,
    }

    impl InMemoryStore {
        fn with_log(log: CallLog) -> Self {
            Self {
                log,
                ..Default::default()
            }
        }

        fn with_shop(shop: Shop) -> Self {
            let store = Self::default();
            store.shops.lock().unwrap().push(shop);
            store
        }
    }

    #[async_trait]
    impl ShopStore for InMemoryStore {
        async fn create_shop(&self, params: CreateShopParams) -> Result<(), StoreError> {
            self.log.lock().unwrap().push("store.create_shop");
            if self.fail_create {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.created.lock().unwrap().push(params);
            Ok(())
        }

        async fn shop_by_id(&self, shop_id: i64) -> Result<Shop, StoreError> {
            self.log.lock().unwrap().push("store.shop_by_id");
            if self.fail_lookup {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.shops
                .lock()
                .unwrap()
                .iter()
                .find(|shop| shop.id == shop_id)
                .cloned()
                .ok_or(StoreError::ShopNotFound(shop_id))
        }

        async fn update_shop_name(&self, params: UpdateShopNameParams) -> Result<(), StoreError> {
            self.log.lock().unwrap().push("store.update_shop_name");
            self.renames.lock().unwrap().push(params);
            Ok(())
        }

        async fn follow_shop(&self, params: FollowShopParams) -> Result<(), StoreError> {
            self.log.lock().unwrap().push("store.follow_shop");
            self.follows.lock().unwrap().push(params);
            Ok(())
        }
    }

    struct Harness {
        orchestrator: ShopOrchestrator<StubIdentity, StubAccounts, RecordingCatalog, InMemoryStore>,
        identity: Arc<StubIdentity>,
        accounts: Arc<StubAccounts>,
        catalog: Arc<RecordingCatalog>,
        store: Arc<InMemoryStore>,
        metrics: Arc<Metrics>,
    }

    fn harness(
        identity: StubIdentity,
        accounts: StubAccounts,
        catalog: RecordingCatalog,
        store: InMemoryStore,
    ) -> Harness {
        let identity = Arc::new(identity);
        let accounts = Arc::new(accounts);
        let catalog = Arc::new(catalog);
        let store = Arc::new(store);
        let metrics = Arc::new(Metrics::new().unwrap());
        let orchestrator = ShopOrchestrator::new(
            identity.clone(),
            accounts.clone(),
            catalog.clone(),
            store.clone(),
            metrics.clone(),
        );
        Harness {
            orchestrator,
            identity,
            accounts,
            catalog,
            store,
            metrics,
        }
    }

    fn default_harness() -> Harness {
        harness(
            StubIdentity::claims(UserRole::Supplier, 31),
            StubAccounts::new(31, call_log()),
            RecordingCatalog::default(),
            InMemoryStore::default(),
        )
    }

    fn authed<T>(message: T) -> Request<T> {
        let mut request = Request::new(message);
        request
            .metadata_mut()
            .insert("authorization", "Bearer shop-test-token".parse().unwrap());
        request
    }

    fn sample_product() -> pb::CreateProductRequest {
        pb::CreateProductRequest {
            supplier_id: 999,
            name: "mechanical keyboard".to_string(),
            price: 129.9,
            thumbnail: "https://cdn.example.com/kb.png".to_string(),
            inventory: 25,
            brand: "keychron".to_string(),
        }
    }

    fn sample_shop(id: i64) -> Shop {
        Shop {
            id,
            owner_id: 31,
            name: "Artisan Coffee".to_string(),
            avatar: None,
            created_at: Utc::now(),
        }
    }

    // ------------------------------------------------------------------
    // Ping and GetShop run without caller context
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_ping_works_without_metadata() {
        let h = default_harness();
        let reply = h.orchestrator.ping(Request::new(())).await.unwrap();
        assert_eq!(reply.into_inner().message, "pong");
    }

    #[tokio::test]
    async fn test_get_shop_returns_stored_name_and_is_repeatable() {
        let h = harness(
            StubIdentity::claims(UserRole::Supplier, 31),
            StubAccounts::new(31, call_log()),
            RecordingCatalog::default(),
            InMemoryStore::with_shop(sample_shop(3)),
        );

        for _ in 0..2 {
            let reply = h
                .orchestrator
                .get_shop(Request::new(pb::GetShopRequest { shop_id: 3 }))
                .await
                .unwrap();
            assert_eq!(reply.into_inner().name, "Artisan Coffee");
        }
    }

    #[tokio::test]
    async fn test_get_shop_serves_fallback_when_shop_is_missing() {
        let h = default_harness();
        let reply = h
            .orchestrator
            .get_shop(Request::new(pb::GetShopRequest { shop_id: 404 }))
            .await
            .unwrap();
        assert_eq!(reply.into_inner().name, FALLBACK_SHOP_NAME);
        assert_eq!(
            h.metrics
                .shop_fallbacks
                .with_label_values(&["not_found"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_get_shop_serves_fallback_on_store_error() {
        let h = harness(
            StubIdentity::claims(UserRole::Supplier, 31),
            StubAccounts::new(31, call_log()),
            RecordingCatalog::default(),
            InMemoryStore {
                fail_lookup: true,
                ..Default::default()
            },
        );

        let reply = h
            .orchestrator
            .get_shop(Request::new(pb::GetShopRequest { shop_id: 3 }))
            .await
            .unwrap();
        assert_eq!(reply.into_inner().name, FALLBACK_SHOP_NAME);
        assert_eq!(
            h.metrics
                .shop_fallbacks
                .with_label_values(&["store_error"])
                .get(),
            1
        );
        assert_eq!(
            h.metrics
                .shop_fallbacks
                .with_label_values(&["not_found"])
                .get(),
            0
        );
    }

    // ------------------------------------------------------------------
    // Caller context is required before any downstream work
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_missing_metadata_is_rejected_before_any_downstream_call() {
        let h = default_harness();

        let err = h
            .orchestrator
            .register_shop(Request::new(pb::RegisterShopRequest {
                name: "My Shop".to_string(),
                avatar: String::new(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);

        let err = h
            .orchestrator
            .add_product(Request::new(sample_product()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);

        let err = h
            .orchestrator
            .delete_product(Request::new(pb::DeleteProductRequest {
                product_id: 5,
                supplier_id: 0,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);

        let err = h
            .orchestrator
            .update_product(Request::new(pb::UpdateProductRequest {
                product_id: 5,
                name: "renamed".to_string(),
                price: 10.0,
                thumbnail: String::new(),
                inventory: 1,
                brand: String::new(),
                supplier_id: 0,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);

        let err = h
            .orchestrator
            .follow_shop(Request::new(pb::FollowShopRequest { shop_id: 3 }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);

        let err = h
            .orchestrator
            .update_shop_name(Request::new(pb::UpdateShopNameRequest {
                name: "Fresh Name".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);

        // Nothing downstream was touched.
        assert_eq!(h.identity.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.accounts.me_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.accounts.register_calls.load(Ordering::SeqCst), 0);
        assert!(h.catalog.created.lock().unwrap().is_empty());
        assert!(h.catalog.updated.lock().unwrap().is_empty());
        assert!(h.catalog.deleted.lock().unwrap().is_empty());
        assert!(h.store.created.lock().unwrap().is_empty());
        assert!(h.store.renames.lock().unwrap().is_empty());
        assert!(h.store.follows.lock().unwrap().is_empty());
    }

    // ------------------------------------------------------------------
    // AddProduct role gate and supplier binding
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_add_product_rejects_customer_and_never_calls_catalog() {
        let h = harness(
            StubIdentity::claims(UserRole::Customer, 12),
            StubAccounts::new(12, call_log()),
            RecordingCatalog::default(),
            InMemoryStore::default(),
        );

        let err = h
            .orchestrator
            .add_product(authed(sample_product()))
            .await
            .unwrap_err();

        assert_eq!(err.code(), Code::PermissionDenied);
        assert_eq!(h.identity.calls.load(Ordering::SeqCst), 1);
        assert!(h.catalog.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_product_overwrites_forged_supplier_id() {
        let h = default_harness();

        let reply = h
            .orchestrator
            .add_product(authed(sample_product()))
            .await
            .unwrap()
            .into_inner();

        // Response passes through from the catalog unchanged.
        assert_eq!(reply.product_id, 4242);
        assert_eq!(reply.message, "created by catalog");

        let forwarded = h.catalog.created.lock().unwrap();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].supplier_id, 31);
        assert_eq!(forwarded[0].name, "mechanical keyboard");
        assert_eq!(forwarded[0].inventory, 25);
    }

    #[tokio::test]
    async fn test_add_product_allows_admin_role() {
        let h = harness(
            StubIdentity::claims(UserRole::Admin, 8),
            StubAccounts::new(8, call_log()),
            RecordingCatalog::default(),
            InMemoryStore::default(),
        );

        h.orchestrator
            .add_product(authed(sample_product()))
            .await
            .unwrap();
        assert_eq!(h.catalog.created.lock().unwrap()[0].supplier_id, 8);
    }

    #[tokio::test]
    async fn test_add_product_relays_identity_failure() {
        let h = harness(
            StubIdentity::failing(Status::internal("malformed claims from auth service")),
            StubAccounts::new(31, call_log()),
            RecordingCatalog::default(),
            InMemoryStore::default(),
        );

        let err = h
            .orchestrator
            .add_product(authed(sample_product()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(h.catalog.created.lock().unwrap().is_empty());
    }

    // ------------------------------------------------------------------
    // Catalog forwarding binds the resolved account id
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_delete_product_overwrites_supplier_with_account_id() {
        let h = harness(
            StubIdentity::claims(UserRole::Supplier, 58),
            StubAccounts::new(58, call_log()),
            RecordingCatalog::default(),
            InMemoryStore::default(),
        );

        let reply = h
            .orchestrator
            .delete_product(authed(pb::DeleteProductRequest {
                product_id: 5,
                supplier_id: 999,
            }))
            .await
            .unwrap()
            .into_inner();

        // Confirmation text is owned by this service, not relayed from
        // the catalog.
        assert_eq!(reply.message, "product deleted successfully");
        let forwarded = h.catalog.deleted.lock().unwrap();
        assert_eq!(forwarded[0].product_id, 5);
        assert_eq!(forwarded[0].supplier_id, 58);
    }

    #[tokio::test]
    async fn test_update_product_overwrites_supplier_with_account_id() {
        let h = harness(
            StubIdentity::claims(UserRole::Supplier, 58),
            StubAccounts::new(58, call_log()),
            RecordingCatalog::default(),
            InMemoryStore::default(),
        );

        let reply = h
            .orchestrator
            .update_product(authed(pb::UpdateProductRequest {
                product_id: 5,
                name: "renamed".to_string(),
                price: 99.0,
                thumbnail: String::new(),
                inventory: 3,
                brand: "keychron".to_string(),
                supplier_id: 999,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(reply.message, "product updated successfully");
        let forwarded = h.catalog.updated.lock().unwrap();
        assert_eq!(forwarded[0].supplier_id, 58);
        assert_eq!(forwarded[0].name, "renamed");
    }

    #[tokio::test]
    async fn test_downstream_failure_relays_code_and_message() {
        let log = call_log();
        let mut accounts = StubAccounts::new(58, log.clone());
        accounts.fail_me = Some(Status::unavailable("user-service down"));
        let h = harness(
            StubIdentity::claims(UserRole::Supplier, 58),
            accounts,
            RecordingCatalog::default(),
            InMemoryStore::default(),
        );

        let err = h
            .orchestrator
            .delete_product(authed(pb::DeleteProductRequest {
                product_id: 5,
                supplier_id: 0,
            }))
            .await
            .unwrap_err();

        assert_eq!(err.code(), Code::Unavailable);
        assert_eq!(err.message(), "user-service down");
        assert!(h.catalog.deleted.lock().unwrap().is_empty());
    }

    // ------------------------------------------------------------------
    // RegisterShop pipeline
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_register_shop_end_to_end() {
        let log = call_log();
        let h = harness(
            StubIdentity::claims(UserRole::Customer, 42),
            StubAccounts::new(42, log.clone()),
            RecordingCatalog::default(),
            InMemoryStore::with_log(log.clone()),
        );

        let reply = h
            .orchestrator
            .register_shop(authed(pb::RegisterShopRequest {
                name: "My Shop".to_string(),
                avatar: String::new(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(reply.status_code, 0);
        assert!(!reply.message.is_empty());
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "accounts.register_supplier",
                "accounts.current_account",
                "store.create_shop",
            ]
        );
        assert_eq!(
            h.store.created.lock().unwrap()[0],
            CreateShopParams {
                owner_id: 42,
                name: "My Shop".to_string(),
                avatar: None,
            }
        );
    }

    #[tokio::test]
    async fn test_register_shop_keeps_avatar_when_supplied() {
        let h = default_harness();

        h.orchestrator
            .register_shop(authed(pb::RegisterShopRequest {
                name: "My Shop".to_string(),
                avatar: "https://cdn.example.com/shop.png".to_string(),
            }))
            .await
            .unwrap();

        assert_eq!(
            h.store.created.lock().unwrap()[0].avatar.as_deref(),
            Some("https://cdn.example.com/shop.png")
        );
    }

    #[tokio::test]
    async fn test_register_shop_surfaces_store_failure_after_role_flip() {
        let h = harness(
            StubIdentity::claims(UserRole::Customer, 42),
            StubAccounts::new(42, call_log()),
            RecordingCatalog::default(),
            InMemoryStore {
                fail_create: true,
                ..Default::default()
            },
        );

        let err = h
            .orchestrator
            .register_shop(authed(pb::RegisterShopRequest {
                name: "My Shop".to_string(),
                avatar: String::new(),
            }))
            .await
            .unwrap_err();

        // The role flip already happened and is not rolled back.
        assert_eq!(err.code(), Code::Internal);
        assert_eq!(h.accounts.register_calls.load(Ordering::SeqCst), 1);
        assert!(h.store.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_shop_relays_role_flip_failure() {
        let log = call_log();
        let mut accounts = StubAccounts::new(42, log.clone());
        accounts.fail_register = Some(Status::already_exists("account is already a supplier"));
        let h = harness(
            StubIdentity::claims(UserRole::Customer, 42),
            accounts,
            RecordingCatalog::default(),
            InMemoryStore::default(),
        );

        let err = h
            .orchestrator
            .register_shop(authed(pb::RegisterShopRequest {
                name: "My Shop".to_string(),
                avatar: String::new(),
            }))
            .await
            .unwrap_err();

        assert_eq!(err.code(), Code::AlreadyExists);
        assert_eq!(err.message(), "account is already a supplier");
        assert_eq!(h.accounts.me_calls.load(Ordering::SeqCst), 0);
        assert!(h.store.created.lock().unwrap().is_empty());
    }

    // ------------------------------------------------------------------
    // FollowShop and UpdateShopName pipelines
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_follow_shop_records_edge_for_caller() {
        let h = harness(
            StubIdentity::claims(UserRole::Customer, 77),
            StubAccounts::new(77, call_log()),
            RecordingCatalog::default(),
            InMemoryStore::default(),
        );

        let reply = h
            .orchestrator
            .follow_shop(authed(pb::FollowShopRequest { shop_id: 3 }))
            .await
            .unwrap()
            .into_inner();

        assert!(!reply.message.is_empty());
        assert_eq!(
            h.store.follows.lock().unwrap()[0],
            FollowShopParams {
                shop_id: 3,
                follower_id: 77,
            }
        );
    }

    #[tokio::test]
    async fn test_update_shop_name_validates_before_authentication() {
        let h = default_harness();

        // No metadata at all: the empty name still wins.
        let err = h
            .orchestrator
            .update_shop_name(Request::new(pb::UpdateShopNameRequest {
                name: String::new(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let err = h
            .orchestrator
            .update_shop_name(authed(pb::UpdateShopNameRequest {
                name: String::new(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        assert_eq!(h.accounts.me_calls.load(Ordering::SeqCst), 0);
        assert!(h.store.renames.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_shop_name_resolves_account_then_updates_in_order() {
        let log = call_log();
        let h = harness(
            StubIdentity::claims(UserRole::Supplier, 64),
            StubAccounts::new(64, log.clone()),
            RecordingCatalog::default(),
            InMemoryStore::with_log(log.clone()),
        );

        let reply = h
            .orchestrator
            .update_shop_name(authed(pb::UpdateShopNameRequest {
                name: "Fresh Name".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(reply.name, "shop name updated");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["accounts.current_account", "store.update_shop_name"]
        );
        assert_eq!(
            h.store.renames.lock().unwrap()[0],
            UpdateShopNameParams {
                owner_id: 64,
                name: "Fresh Name".to_string(),
            }
        );
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_rpc_outcomes_are_recorded() {
        let h = default_harness();

        h.orchestrator.ping(Request::new(())).await.unwrap();
        h.orchestrator
            .add_product(Request::new(sample_product()))
            .await
            .unwrap_err();

        assert_eq!(
            h.metrics.rpc_handled.with_label_values(&["Ping", "ok"]).get(),
            1
        );
        assert_eq!(
            h.metrics
                .rpc_handled
                .with_label_values(&["AddProduct", "unauthenticated"])
                .get(),
            1
        );
    }
}
