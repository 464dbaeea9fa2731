use serde::{Deserialize, Serialize};

/// Error payload returned by the backend on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub detail: Option<String>,
}

/// Outcome of a single backend call. `status` is the HTTP status code,
/// or 0 when the request never produced a response (connect failure,
/// timeout, connection dropped mid-body).
#[derive(Debug, Clone)]
pub struct ApiCall<T> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
    pub status: u16,
}

impl<T> ApiCall<T> {
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status == 0
    }

    pub fn detail(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.detail.as_deref())
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        ApiCall {
            data: None,
            error: Some(ApiError {
                detail: Some(detail.into()),
            }),
            status: 0,
        }
    }

    pub fn ok(status: u16, data: T) -> Self {
        ApiCall {
            data: Some(data),
            error: None,
            status,
        }
    }

    pub fn backend_error(status: u16, detail: impl Into<String>) -> Self {
        ApiCall {
            data: None,
            error: Some(ApiError {
                detail: Some(detail.into()),
            }),
            status,
        }
    }
}

/// GET /install/status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallerStatus {
    pub enabled: bool,
    pub db_ok: bool,
    pub installed: bool,
}

/// GET /install/bootstrap-status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapStatus {
    pub env_dir_exists: bool,
    pub env_dir_writable: bool,
    pub sudoers_present: bool,
    pub system_install_exists: bool,
}

/// POST /install/env body: both rendered env documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvDocumentsRequest {
    pub backend_env: String,
    pub frontend_env: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvSaveResult {
    pub status: String,
}

/// POST /install/db-check body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbCheckRequest {
    pub backend_env: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbCheckResult {
    pub db_ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCheckItem {
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// POST /install/hosts-check body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostsCheckRequest {
    pub items: Vec<HostCheckItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCheckResult {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostsCheckResponse {
    #[serde(default)]
    pub results: Vec<HostCheckResult>,
}

/// POST /install/system-setup body: which provisioning actions to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSetupRequest {
    pub install_node: bool,
    pub install_redis: bool,
    pub use_nodesource: bool,
    pub build_frontend: bool,
    pub setup_systemd: bool,
    pub start_services: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSetupResult {
    pub status: String,
    #[serde(default)]
    pub output: Option<String>,
}

/// First administrator account created by the one-click install.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminCandidate {
    pub username: String,
    pub password: String,
    pub role: String,
}

impl Default for AdminCandidate {
    fn default() -> Self {
        AdminCandidate {
            username: "@admin".to_string(),
            password: String::new(),
            role: "admin".to_string(),
        }
    }
}

/// POST /install/one-click body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneClickRequest {
    pub admin: AdminCandidate,
    pub seed: bool,
    pub seed_upsert: bool,
    pub finish: bool,
    pub disable_installer: bool,
    pub backend_env: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallStepResult {
    pub step: String,
    pub status: String,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallResult {
    pub status: String,
    #[serde(default)]
    pub steps: Vec<InstallStepResult>,
}

/// POST /auth/register/status body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterStatusRequest {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterStatus {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_call_status_classification() {
        let ok: ApiCall<InstallerStatus> = ApiCall::ok(
            200,
            InstallerStatus {
                enabled: true,
                db_ok: true,
                installed: false,
            },
        );
        assert!(ok.is_ok());
        assert!(!ok.is_transport_failure());

        let denied: ApiCall<InstallerStatus> = ApiCall::backend_error(403, "Invalid token");
        assert!(!denied.is_ok());
        assert_eq!(denied.detail(), Some("Invalid token"));

        let dead: ApiCall<InstallerStatus> = ApiCall::transport("connection refused");
        assert!(dead.is_transport_failure());
        assert!(!dead.is_ok());
    }

    #[test]
    fn install_result_tolerates_missing_steps() {
        let parsed: InstallResult = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert_eq!(parsed.status, "ok");
        assert!(parsed.steps.is_empty());
    }

    #[test]
    fn api_error_tolerates_empty_object() {
        let parsed: ApiError = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.detail, None);
    }
}
