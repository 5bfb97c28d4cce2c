use housia_core::SubmissionGateway;
use housia_core::traits::{Broker, ListingStore, StatusStore};

/// Shared application state, available to all route handlers via `State<Arc<AppState<..>>>`.
pub struct AppState<B, L, S>
where
    B: Broker,
    L: ListingStore,
    S: StatusStore,
{
    pub gateway: SubmissionGateway<B, L, S>,
}
