use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::models::*;
use super::ProvisioningApi;

/// Scripted [`ProvisioningApi`] for orchestrator tests. Responses are queued
/// per operation and consumed in order; an exhausted queue yields a transport
/// failure so a test never hangs on an unplanned call.
#[derive(Default)]
pub struct ScriptedApi {
    pub status: Mutex<VecDeque<ApiCall<InstallerStatus>>>,
    pub bootstrap: Mutex<VecDeque<ApiCall<BootstrapStatus>>>,
    pub save_env: Mutex<VecDeque<ApiCall<EnvSaveResult>>>,
    pub db_check: Mutex<VecDeque<ApiCall<DbCheckResult>>>,
    pub hosts_check: Mutex<VecDeque<ApiCall<HostsCheckResponse>>>,
    pub system_setup: Mutex<VecDeque<ApiCall<SystemSetupResult>>>,
    pub one_click: Mutex<VecDeque<ApiCall<InstallResult>>>,
    pub register: Mutex<VecDeque<ApiCall<RegisterStatus>>>,
    /// Operation names in call order, for asserting what ran.
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_save_env(&self, call: ApiCall<EnvSaveResult>) {
        self.save_env.lock().unwrap().push_back(call);
    }

    pub fn push_hosts_check(&self, call: ApiCall<HostsCheckResponse>) {
        self.hosts_check.lock().unwrap().push_back(call);
    }

    pub fn push_one_click(&self, call: ApiCall<InstallResult>) {
        self.one_click.lock().unwrap().push_back(call);
    }

    pub fn push_register(&self, call: ApiCall<RegisterStatus>) {
        self.register.lock().unwrap().push_back(call);
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn take<T>(&self, name: &str, queue: &Mutex<VecDeque<ApiCall<T>>>) -> ApiCall<T> {
        self.calls.lock().unwrap().push(name.to_string());
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ApiCall::transport(format!("no scripted response for {}", name)))
    }
}

#[async_trait]
impl ProvisioningApi for ScriptedApi {
    async fn status(&self, _token: &str) -> ApiCall<InstallerStatus> {
        self.take("status", &self.status)
    }

    async fn bootstrap_status(&self, _token: &str) -> ApiCall<BootstrapStatus> {
        self.take("bootstrap_status", &self.bootstrap)
    }

    async fn save_env(&self, _token: &str, _req: &EnvDocumentsRequest) -> ApiCall<EnvSaveResult> {
        self.take("save_env", &self.save_env)
    }

    async fn db_check(&self, _token: &str, _req: &DbCheckRequest) -> ApiCall<DbCheckResult> {
        self.take("db_check", &self.db_check)
    }

    async fn hosts_check(
        &self,
        _token: &str,
        _req: &HostsCheckRequest,
    ) -> ApiCall<HostsCheckResponse> {
        self.take("hosts_check", &self.hosts_check)
    }

    async fn system_setup(
        &self,
        _token: &str,
        _req: &SystemSetupRequest,
    ) -> ApiCall<SystemSetupResult> {
        self.take("system_setup", &self.system_setup)
    }

    async fn one_click(&self, _token: &str, _req: &OneClickRequest) -> ApiCall<InstallResult> {
        self.take("one_click", &self.one_click)
    }

    async fn register_status(&self, _code: &str) -> ApiCall<RegisterStatus> {
        self.take("register_status", &self.register)
    }
}
