use std::sync::Arc;

use mentor_gateway::registry::Registry;
use mentor_store::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub registry: Registry,
}
