// ============================================================================
// Protocol Buffers - ecommerce wire types
// ============================================================================
//
// Vendored output of tonic-prost-build for proto/ecommerce.proto, committed
// so the build does not depend on a protoc binary. Server-side code exists
// only for ShopService (the service this binary exposes); AuthService,
// UserService and ProductService are consumed through their clients.
//
// Regenerate after editing the proto and re-commit the result.
//
// ============================================================================

mod ecommerce;

pub use ecommerce::*;

pub use ecommerce::auth_service_client::AuthServiceClient;
pub use ecommerce::product_service_client::ProductServiceClient;
pub use ecommerce::shop_service_server::{ShopService, ShopServiceServer};
pub use ecommerce::user_service_client::UserServiceClient;
