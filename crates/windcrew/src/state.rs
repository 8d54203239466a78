use windcrew_core::store::PostgresStore;

/// Shared server state: one pooled store handle for every route.
#[derive(Clone)]
pub struct AppState {
    pub store: PostgresStore,
}

impl AppState {
    pub fn new(store: PostgresStore) -> Self {
        Self { store }
    }
}
