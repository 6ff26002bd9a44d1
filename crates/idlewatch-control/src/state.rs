use std::sync::Arc;

use crate::registry::InstanceRegistry;
use crate::remote::RemoteControl;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<InstanceRegistry>,
    pub remote: Arc<dyn RemoteControl>,
    pub allowed_origins: Arc<Vec<String>>,
    pub auto_shutdown: bool,
}
