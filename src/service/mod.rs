// ============================================================================
// Shop Service - request orchestration
// ============================================================================
//
// One linear pipeline per RPC: capture the caller context, resolve identity
// downstream, apply the operation, return the confirmation. No retries and
// no compensation; the first failing step aborts the pipeline.
//
// ============================================================================

mod shop_service;

pub use shop_service::ShopOrchestrator;
