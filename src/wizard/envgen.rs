//! Renders the backend and frontend `.env` documents sent to the backend and
//! offered for download. Line order matters: the server-side bootstrap scripts
//! parse these files positionally in places, so keep the layout stable.

use super::state::WizardState;

pub fn backend_env(state: &WizardState) -> String {
    let c = &state.config;
    let db_password = non_blank(&c.db_password, "CHANGE_ME");
    let jwt_secret = non_blank(&c.jwt_secret, "CHANGE_ME");
    let bot_token = non_blank(&c.telegram_bot_token, "CHANGE_ME");
    let token = non_blank(&state.token, "CHANGE_ME_INSTALL_TOKEN");

    [
        "APP_ENV=production".to_string(),
        format!("BASE_URL={}", c.base_url),
        String::new(),
        format!("DB_HOST={}", c.db_host),
        format!("DB_PORT={}", c.db_port),
        format!("DB_NAME={}", c.db_name),
        format!("DB_USER={}", c.db_user),
        format!("DB_PASSWORD={}", db_password),
        String::new(),
        format!("REDIS_URL={}", c.redis_url),
        String::new(),
        format!("JWT_SECRET={}", jwt_secret),
        "JWT_ACCESS_TTL_MIN=15".to_string(),
        "JWT_REFRESH_TTL_DAYS=30".to_string(),
        String::new(),
        format!("TELEGRAM_BOT_TOKEN={}", bot_token),
        String::new(),
        "TG_CONFIRM_CODE_TTL_MIN=10".to_string(),
        "TG_CONFIRM_MAX_ATTEMPTS=5".to_string(),
        String::new(),
        format!("BACKEND_BASE_URL={}", c.backend_base_url),
        String::new(),
        "INSTALLER_ENABLED=1".to_string(),
        format!("INSTALLER_TOKEN={}", token),
    ]
    .join("\n")
}

pub fn frontend_env(state: &WizardState) -> String {
    let c = &state.config;
    [
        format!("NEXT_PUBLIC_API_BASE={}", c.api_base),
        format!("API_INTERNAL_URL={}", c.api_internal),
        format!("API_PROXY_URL={}", c.api_internal),
    ]
    .join("\n")
}

fn non_blank<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
