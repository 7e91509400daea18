use crate::interface_adapters::clients::auth::AuthClient;
use crate::use_cases::WorldRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    // Active worlds and their channels.
    pub world_registry: Arc<WorldRegistry>,
    // World used when a client connects without `world_id`.
    pub default_world_id: Arc<str>,
    // Verifies session tokens during the join handshake.
    pub auth_client: Arc<AuthClient>,
}
