use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use uuid::Uuid;

use crate::settings::Settings;

use super::models::*;
use super::ProvisioningApi;

/// Header carrying the one-time installer token.
pub const TOKEN_HEADER: &str = "X-Installer-Token";

/// Delay before the single transport-level retry of an idempotent GET.
const TRANSPORT_RETRY_MS: u64 = 500;

/// HTTP implementation of [`ProvisioningApi`] against the backend API.
pub struct HttpApi {
    http: reqwest::Client,
    base: String,
}

impl HttpApi {
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::with_base(
            &settings.api_base_url,
            &settings.api_base,
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    pub fn with_base(base_url: &str, api_base: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpApi {
            http,
            base: format!("{}{}", base_url.trim_end_matches('/'), api_base),
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> ApiCall<T> {
        self.request(Method::GET, path, token, None).await
    }

    pub async fn post_json<B, T>(&self, path: &str, token: Option<&str>, body: &B) -> ApiCall<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = match serde_json::to_value(body) {
            Ok(v) => v,
            Err(e) => return ApiCall::transport(format!("Failed to encode request body: {}", e)),
        };
        self.request(Method::POST, path, token, Some(body)).await
    }

    /// Issues one request. GETs are retried once after a fixed delay when the
    /// request never reaches the backend; non-idempotent methods are not.
    /// A 401 outside `/auth/` and `/install/` triggers one silent session
    /// refresh followed by a single re-issue of the original request.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> ApiCall<T> {
        let request_id = Uuid::new_v4();
        debug!(
            "[PHASE: api] [STEP: request] {} {} (id={})",
            method, path, request_id
        );

        let retries = if method == Method::GET { 1 } else { 0 };
        let strategy = FixedInterval::from_millis(TRANSPORT_RETRY_MS).take(retries);
        let sent = Retry::spawn(strategy, || {
            self.send(method.clone(), path, token, body.as_ref())
        })
        .await;

        let mut response = match sent {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    "[PHASE: api] [STEP: transport] {} {} failed: {} (id={})",
                    method, path, e, request_id
                );
                return ApiCall::transport(describe_transport_error(&e));
            }
        };

        if response.status() == StatusCode::UNAUTHORIZED && refresh_applies(path) {
            info!(
                "[PHASE: api] [STEP: refresh] 401 on {}, refreshing session (id={})",
                path, request_id
            );
            if self.refresh_session().await {
                // Keep the original 401 if the re-issue never completes.
                if let Ok(second) = self.send(method.clone(), path, token, body.as_ref()).await {
                    response = second;
                }
            }
        }

        self.interpret(response, path, request_id).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let url = format!("{}{}", self.base, path);
        let mut req = self.http.request(method, &url);
        if let Some(token) = token {
            if !token.is_empty() {
                req = req.header(TOKEN_HEADER, token);
            }
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send().await
    }

    async fn refresh_session(&self) -> bool {
        let url = format!("{}/auth/refresh", self.base);
        match self.http.post(&url).send().await {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                warn!("[PHASE: api] [STEP: refresh] refresh failed: {}", e);
                false
            }
        }
    }

    async fn interpret<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        path: &str,
        request_id: Uuid,
    ) -> ApiCall<T> {
        let status = response.status().as_u16();
        let success = response.status().is_success();

        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                warn!(
                    "[PHASE: api] [STEP: body] {} body read failed: {} (id={})",
                    path, e, request_id
                );
                return ApiCall::transport(describe_transport_error(&e));
            }
        };

        if text.trim().is_empty() {
            return ApiCall {
                data: None,
                error: None,
                status,
            };
        }

        if success {
            match serde_json::from_str::<T>(&text) {
                Ok(data) => ApiCall {
                    data: Some(data),
                    error: None,
                    status,
                },
                Err(e) => {
                    warn!(
                        "[PHASE: api] [STEP: body] {} returned {} with unparseable body: {} (id={})",
                        path, status, e, request_id
                    );
                    ApiCall {
                        data: None,
                        error: None,
                        status,
                    }
                }
            }
        } else {
            let error = serde_json::from_str::<ApiError>(&text)
                .ok()
                .filter(|e| e.detail.is_some())
                .unwrap_or(ApiError { detail: Some(text) });
            warn!(
                "[PHASE: api] [STEP: response] {} returned {}: {} (id={})",
                path,
                status,
                error.detail.as_deref().unwrap_or("(no detail)"),
                request_id
            );
            ApiCall {
                data: None,
                error: Some(error),
                status,
            }
        }
    }
}

fn refresh_applies(path: &str) -> bool {
    !path.starts_with("/auth/") && !path.starts_with("/install/")
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timed out".to_string()
    } else {
        format!("Network error: {}", e)
    }
}

#[async_trait]
impl ProvisioningApi for HttpApi {
    async fn status(&self, token: &str) -> ApiCall<InstallerStatus> {
        self.get("/install/status", Some(token)).await
    }

    async fn bootstrap_status(&self, token: &str) -> ApiCall<BootstrapStatus> {
        self.get("/install/bootstrap-status", Some(token)).await
    }

    async fn save_env(&self, token: &str, req: &EnvDocumentsRequest) -> ApiCall<EnvSaveResult> {
        self.post_json("/install/env", Some(token), req).await
    }

    async fn db_check(&self, token: &str, req: &DbCheckRequest) -> ApiCall<DbCheckResult> {
        self.post_json("/install/db-check", Some(token), req).await
    }

    async fn hosts_check(
        &self,
        token: &str,
        req: &HostsCheckRequest,
    ) -> ApiCall<HostsCheckResponse> {
        self.post_json("/install/hosts-check", Some(token), req).await
    }

    async fn system_setup(
        &self,
        token: &str,
        req: &SystemSetupRequest,
    ) -> ApiCall<SystemSetupResult> {
        self.post_json("/install/system-setup", Some(token), req).await
    }

    async fn one_click(&self, token: &str, req: &OneClickRequest) -> ApiCall<InstallResult> {
        self.post_json("/install/one-click", Some(token), req).await
    }

    async fn register_status(&self, code: &str) -> ApiCall<RegisterStatus> {
        let req = RegisterStatusRequest {
            code: code.to_string(),
        };
        self.post_json("/auth/register/status", None, &req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_skips_auth_and_install_paths() {
        assert!(!refresh_applies("/auth/refresh"));
        assert!(!refresh_applies("/auth/register/status"));
        assert!(!refresh_applies("/install/one-click"));
        assert!(refresh_applies("/users/me"));
    }
}
