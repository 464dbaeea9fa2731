pub mod envgen;
pub mod state;
pub mod validators;

use std::sync::Arc;

use log::{info, warn};

use crate::api::models::*;
use crate::api::ProvisioningApi;
use crate::persist::StateStore;
use crate::utils::logging::{mask_env_document, mask_redis_url};
use crate::utils::validation::parse_redis_target;

use state::{Step, WizardState};

/// Command the operator must run when the backend cannot write its env
/// directory or run privileged setup.
pub const BOOTSTRAP_COMMAND: &str = "sudo /opt/bdm-knowledge/scripts/enable_web_installer.sh";

/// How a configuration save ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The backend process cannot write the env directory; the operator has
    /// to run the bootstrap script first.
    PermissionDenied,
    Failed,
}

/// Point-in-time view of the wizard handed to the UI. The UI renders from
/// this copy and never holds the orchestrator lock across a frame.
#[derive(Debug, Clone)]
pub struct WizardSnapshot {
    pub state: WizardState,
    pub message: Option<String>,
    pub needs_bootstrap: bool,
    pub disable_installer_failed: bool,
    pub status: Option<InstallerStatus>,
    pub status_seq: u64,
    pub bootstrap_status: Option<BootstrapStatus>,
}

/// Drives the provisioning wizard: owns the persisted state record, applies
/// every mutation through a named action, and persists after each one.
pub struct Wizard {
    api: Arc<dyn ProvisioningApi>,
    store: StateStore,
    state: WizardState,
    message: Option<String>,
    needs_bootstrap: bool,
    disable_installer_failed: bool,
    status: Option<InstallerStatus>,
    status_seq: u64,
    bootstrap_status: Option<BootstrapStatus>,
}

impl Wizard {
    pub fn new(api: Arc<dyn ProvisioningApi>, store: StateStore) -> Self {
        let state = store.load().unwrap_or_else(WizardState::new);
        Wizard {
            api,
            store,
            state,
            message: None,
            needs_bootstrap: false,
            disable_installer_failed: false,
            status: None,
            status_seq: 0,
            bootstrap_status: None,
        }
    }

    pub fn step(&self) -> Step {
        self.state.step()
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            state: self.state.clone(),
            message: self.message.clone(),
            needs_bootstrap: self.needs_bootstrap,
            disable_installer_failed: self.disable_installer_failed,
            status: self.status.clone(),
            status_seq: self.status_seq,
            bootstrap_status: self.bootstrap_status.clone(),
        }
    }

    // ---- named mutations ---------------------------------------------------

    pub fn set_language(&mut self, lang: state::Language) {
        self.state.lang = lang;
        self.persist();
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.state.token = token.into();
        self.persist();
    }

    pub fn edit_config(&mut self, patch: impl FnOnce(&mut state::DraftConfig)) {
        self.state.update_config(patch);
        self.persist();
    }

    pub fn set_admin_username(&mut self, username: impl Into<String>) {
        self.state.admin.username = username.into();
        self.persist();
    }

    pub fn set_admin_password(&mut self, password: impl Into<String>) {
        self.state.admin.password = password.into();
        self.persist();
    }

    pub fn set_seed_upsert(&mut self, on: bool) {
        self.state.seed_upsert = on;
        self.persist();
    }

    pub fn set_system_toggle(&mut self, toggle: SystemToggle, on: bool) {
        let s = &mut self.state;
        match toggle {
            SystemToggle::InstallNode => s.install_node = on,
            SystemToggle::InstallRedis => s.install_redis = on,
            SystemToggle::UseNodesource => s.use_nodesource = on,
            SystemToggle::BuildFrontend => s.build_frontend = on,
            SystemToggle::SetupSystemd => s.setup_systemd = on,
            SystemToggle::StartServices => s.start_services = on,
        }
        self.persist();
    }

    // ---- navigation --------------------------------------------------------

    /// Moves forward one step. The current page must validate, and the pages
    /// with remote side effects run them first; any failure leaves the index
    /// where it is.
    pub async fn advance(&mut self) -> bool {
        let step = self.step();
        if !validators::step_valid(&self.state, step) {
            return false;
        }

        match step {
            Step::Configuration if !self.state.config_saved => {
                if self.save_config().await != SaveOutcome::Saved {
                    return false;
                }
            }
            Step::Connectivity if !validators::host_checks_ok(&self.state) => {
                if !self.run_host_checks().await {
                    return false;
                }
            }
            Step::Install if !self.state.install_completed => {
                if !self.run_install().await {
                    return false;
                }
            }
            _ => {}
        }

        self.state.current_step = (self.state.current_step + 1).min(Step::COUNT - 1);
        self.message = None;
        info!(
            "[PHASE: wizard] [STEP: advance] now at step {}",
            self.state.current_step
        );
        self.persist();
        true
    }

    pub fn retreat(&mut self) -> bool {
        if self.state.current_step == 0 {
            return false;
        }
        self.state.current_step -= 1;
        self.message = None;
        self.persist();
        true
    }

    // ---- remote actions ----------------------------------------------------

    /// Fetches installer availability. Returns the sequence number of this
    /// status so a delayed clear can tell whether it is still the latest.
    pub async fn check_status(&mut self) -> u64 {
        self.message = None;
        let call = self.api.status(&self.state.token).await;
        match (call.is_ok(), call.data) {
            (true, Some(status)) => {
                self.status = Some(status);
                self.status_seq += 1;
            }
            _ => {
                self.message = Some(
                    call.error
                        .and_then(|e| e.detail)
                        .unwrap_or_else(|| "Failed to fetch installer status".to_string()),
                );
            }
        }
        self.status_seq
    }

    /// Drops the transient status line, but only if no newer fetch replaced
    /// it while the clear was pending.
    pub fn clear_status_if_current(&mut self, seq: u64) {
        if self.status_seq == seq {
            self.status = None;
        }
    }

    pub async fn check_bootstrap(&mut self) {
        self.message = None;
        let call = self.api.bootstrap_status(&self.state.token).await;
        match (call.is_ok(), call.data) {
            (true, Some(status)) => self.bootstrap_status = Some(status),
            _ => {
                self.message = Some(
                    call.error
                        .and_then(|e| e.detail)
                        .unwrap_or_else(|| "Failed to fetch bootstrap status".to_string()),
                );
            }
        }
    }

    /// Sends both rendered env documents to the backend. A permission-style
    /// failure raises the bootstrap hint instead of a plain error.
    pub async fn save_config(&mut self) -> SaveOutcome {
        self.message = None;
        let req = EnvDocumentsRequest {
            backend_env: envgen::backend_env(&self.state),
            frontend_env: envgen::frontend_env(&self.state),
        };
        log::debug!(
            "[PHASE: wizard] [STEP: save_config] backend env:\n{}",
            mask_env_document(&req.backend_env)
        );
        let call = self.api.save_env(&self.state.token, &req).await;

        let outcome = if call.is_ok() {
            info!("[PHASE: wizard] [STEP: save_config] configuration saved");
            self.state.config_saved = true;
            self.needs_bootstrap = false;
            self.message = Some("Configuration saved.".to_string());
            SaveOutcome::Saved
        } else {
            let detail = call
                .error
                .and_then(|e| e.detail)
                .unwrap_or_else(|| "Failed to save configuration".to_string());
            let permission =
                detail.contains("Permission denied") || detail.contains("Errno 13");
            warn!(
                "[PHASE: wizard] [STEP: save_config] failed (permission={}): {}",
                permission, detail
            );
            self.needs_bootstrap = permission;
            self.message = Some(detail);
            if permission {
                SaveOutcome::PermissionDenied
            } else {
                SaveOutcome::Failed
            }
        };
        self.persist();
        outcome
    }

    pub async fn run_db_check(&mut self) {
        self.message = None;
        let req = DbCheckRequest {
            backend_env: envgen::backend_env(&self.state),
        };
        let call = self.api.db_check(&self.state.token, &req).await;
        match (call.is_ok(), call.data) {
            (true, Some(result)) => {
                if !result.db_ok {
                    self.message = Some(
                        result
                            .error
                            .clone()
                            .unwrap_or_else(|| "Database login failed".to_string()),
                    );
                }
                self.state.db_check_result = Some(result);
            }
            _ => {
                self.message = Some(
                    call.error
                        .and_then(|e| e.detail)
                        .unwrap_or_else(|| "Database check failed".to_string()),
                );
            }
        }
        self.persist();
    }

    /// Probes database and Redis reachability from the server. Returns true
    /// only when every probe came back green.
    pub async fn run_host_checks(&mut self) -> bool {
        self.message = None;

        let (redis_host, redis_port) = match parse_redis_target(&self.state.config.redis_url) {
            Ok(target) => target,
            Err(e) => {
                warn!(
                    "[PHASE: wizard] [STEP: host_checks] bad redis url {}: {}",
                    mask_redis_url(&self.state.config.redis_url),
                    e
                );
                self.message = Some(e.to_string());
                return false;
            }
        };

        let req = HostsCheckRequest {
            items: vec![
                HostCheckItem {
                    name: "database".to_string(),
                    host: self.state.config.db_host.clone(),
                    port: self.state.config.db_port,
                },
                HostCheckItem {
                    name: "redis".to_string(),
                    host: redis_host,
                    port: redis_port,
                },
            ],
        };

        let call = self.api.hosts_check(&self.state.token, &req).await;
        let ok = match (call.is_ok(), call.data) {
            (true, Some(response)) => {
                self.state.host_checks = response.results;
                let all_green = validators::host_checks_ok(&self.state);
                if !all_green {
                    self.message = Some("Some hosts are unreachable.".to_string());
                }
                all_green
            }
            _ => {
                self.message = Some(
                    call.error
                        .and_then(|e| e.detail)
                        .unwrap_or_else(|| "Host check failed".to_string()),
                );
                false
            }
        };
        self.persist();
        ok
    }

    pub async fn run_system_setup(&mut self) {
        self.message = None;
        let s = &self.state;
        let req = SystemSetupRequest {
            install_node: s.install_node,
            install_redis: s.install_redis,
            use_nodesource: s.use_nodesource,
            build_frontend: s.build_frontend,
            setup_systemd: s.setup_systemd,
            start_services: s.start_services,
        };
        let call = self.api.system_setup(&self.state.token, &req).await;
        match (call.is_ok(), call.data) {
            (true, Some(result)) => {
                let sudo_required = result
                    .output
                    .as_deref()
                    .is_some_and(|out| out.contains("sudo: a password is required"));
                if sudo_required {
                    self.needs_bootstrap = true;
                }
                if result.status != "ok" {
                    self.message = Some("System setup reported errors.".to_string());
                }
                self.state.system_setup_result = Some(result);
            }
            _ => {
                self.message = Some(
                    call.error
                        .and_then(|e| e.detail)
                        .unwrap_or_else(|| "System setup failed".to_string()),
                );
            }
        }
        self.persist();
    }

    /// Runs the one-click install. The previous run's report is replaced
    /// whole; a run whose only casualty is the installer self-disable step
    /// still counts as completed, with a warning flag for the UI.
    pub async fn run_install(&mut self) -> bool {
        self.message = None;
        self.disable_installer_failed = false;

        let req = OneClickRequest {
            admin: self.state.admin.clone(),
            seed: true,
            seed_upsert: self.state.seed_upsert,
            finish: true,
            disable_installer: true,
            backend_env: envgen::backend_env(&self.state),
        };
        let call = self.api.one_click(&self.state.token, &req).await;

        let ok = match (call.is_ok(), call.data) {
            (true, Some(result)) => {
                self.disable_installer_failed = result
                    .steps
                    .iter()
                    .any(|s| s.step == "disable_installer" && s.status != "ok");
                let install_ok = result.status == "ok";
                self.state.install_result = Some(result);
                if install_ok {
                    info!("[PHASE: wizard] [STEP: install] one-click install finished");
                    self.state.install_completed = true;
                } else {
                    warn!("[PHASE: wizard] [STEP: install] one-click install failed");
                    self.message = Some("Installation failed. See step details.".to_string());
                }
                install_ok
            }
            _ => {
                self.message = Some(
                    call.error
                        .and_then(|e| e.detail)
                        .unwrap_or_else(|| "Installation failed".to_string()),
                );
                false
            }
        };
        self.persist();
        ok
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.state) {
            warn!("[PHASE: wizard] [STEP: persist] could not save state: {}", e);
        }
    }
}

/// Optional server-preparation actions on the connectivity page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemToggle {
    InstallNode,
    InstallRedis,
    UseNodesource,
    BuildFrontend,
    SetupSystemd,
    StartServices,
}
