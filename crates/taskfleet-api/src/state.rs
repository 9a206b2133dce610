use std::sync::Arc;

use taskfleet_core::{AppConfig, CredentialStore, ErrorCatalog, HostTarget};
use taskfleet_winrm::{PsExecutor, WinRmExecutor};

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<AppConfig>,
    pub credentials: Arc<CredentialStore>,
    pub catalog: Arc<ErrorCatalog>,
    pub db: Arc<taskfleet_db::Database>,
    pub analyzer: Arc<taskfleet_ai::GeminiAnalyzer>,
    pub notifier: Arc<taskfleet_ai::ChatNotifier>,
}

impl ApiState {
    /// Build a credential-bound executor for one host. `None` when no
    /// credential is configured or the HTTP client cannot be built.
    pub fn executor_for(&self, host: &HostTarget) -> Option<Arc<dyn PsExecutor>> {
        let credential = self.credentials.lookup(&host.name)?.clone();
        match WinRmExecutor::new(&host.name, &host.address, credential) {
            Ok(executor) => Some(Arc::new(executor)),
            Err(e) => {
                tracing::error!(host = %host.name, "Cannot build WinRM executor: {}", e);
                None
            }
        }
    }
}
