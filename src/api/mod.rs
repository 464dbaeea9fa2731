pub mod client;
pub mod models;

#[cfg(test)]
pub mod testing;

pub use client::HttpApi;
pub use models::*;

use async_trait::async_trait;

/// Backend surface the wizard talks to. The HTTP implementation lives in
/// [`client::HttpApi`]; tests drive the orchestrator through a scripted fake.
#[async_trait]
pub trait ProvisioningApi: Send + Sync {
    async fn status(&self, token: &str) -> ApiCall<InstallerStatus>;
    async fn bootstrap_status(&self, token: &str) -> ApiCall<BootstrapStatus>;
    async fn save_env(&self, token: &str, req: &EnvDocumentsRequest) -> ApiCall<EnvSaveResult>;
    async fn db_check(&self, token: &str, req: &DbCheckRequest) -> ApiCall<DbCheckResult>;
    async fn hosts_check(&self, token: &str, req: &HostsCheckRequest)
        -> ApiCall<HostsCheckResponse>;
    async fn system_setup(&self, token: &str, req: &SystemSetupRequest)
        -> ApiCall<SystemSetupResult>;
    async fn one_click(&self, token: &str, req: &OneClickRequest) -> ApiCall<InstallResult>;
    async fn register_status(&self, code: &str) -> ApiCall<RegisterStatus>;
}
