use std::sync::Arc;

use analysis_core::{CompanyDirectory, MarketDataStore, ResultStore, StatementStore};

/// The four collaborators every engine reads from or writes to.
#[derive(Clone)]
pub struct Stores {
    pub statements: Arc<dyn StatementStore>,
    pub market: Arc<dyn MarketDataStore>,
    pub companies: Arc<dyn CompanyDirectory>,
    pub results: Arc<dyn ResultStore>,
}

impl Stores {
    /// All four roles served by one backend.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: StatementStore + MarketDataStore + CompanyDirectory + ResultStore + 'static,
    {
        Self {
            statements: store.clone(),
            market: store.clone(),
            companies: store.clone(),
            results: store,
        }
    }
}
