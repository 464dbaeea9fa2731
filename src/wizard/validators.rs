use std::sync::OnceLock;

use regex::Regex;

use super::state::{Step, WizardState};

/// Same username shape the backend enforces for the first admin account.
pub fn admin_username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@[A-Za-z0-9_]{3,32}$").unwrap())
}

pub fn token_valid(state: &WizardState) -> bool {
    !state.token.trim().is_empty()
}

/// Every draft field is non-blank and the port is usable. The signing secret
/// and the bot token gate the page too; a blank one would put a placeholder
/// into the production env file.
pub fn config_valid(state: &WizardState) -> bool {
    let c = &state.config;
    let required = [
        &c.base_url,
        &c.db_host,
        &c.db_name,
        &c.db_user,
        &c.db_password,
        &c.redis_url,
        &c.jwt_secret,
        &c.telegram_bot_token,
        &c.backend_base_url,
        &c.api_base,
        &c.api_internal,
    ];
    required.iter().all(|f| !f.trim().is_empty()) && c.db_port >= 1
}

pub fn host_checks_ok(state: &WizardState) -> bool {
    !state.host_checks.is_empty() && state.host_checks.iter().all(|r| r.ok)
}

pub fn admin_valid(state: &WizardState) -> bool {
    let a = &state.admin;
    admin_username_re().is_match(&a.username)
        && a.password.len() >= 8
        && a.password.len() <= 128
}

/// Whether the current page's preconditions for moving forward hold. Remote
/// side effects of the move itself (saving config, host checks, installing)
/// run afterwards and can still veto the transition.
pub fn step_valid(state: &WizardState, step: Step) -> bool {
    match step {
        Step::Language | Step::Bootstrap => true,
        Step::Access => token_valid(state),
        Step::Configuration => config_valid(state),
        Step::Connectivity => config_valid(state) && token_valid(state),
        Step::Install => admin_valid(state) && state.config_saved && host_checks_ok(state),
        Step::AdminReview => state.install_completed,
        Step::Finish => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::HostCheckResult;

    fn valid_state() -> WizardState {
        let mut state = WizardState::new();
        state.token = "tok-123".to_string();
        state.config.db_password = "secret".to_string();
        state.config.jwt_secret = "signing-secret".to_string();
        state.config.telegram_bot_token = "12345:bot-token".to_string();
        state
    }

    #[test]
    fn access_requires_non_blank_token() {
        let mut state = valid_state();
        assert!(step_valid(&state, Step::Access));
        state.token = "   ".to_string();
        assert!(!step_valid(&state, Step::Access));
    }

    #[test]
    fn configuration_requires_core_fields() {
        let mut state = valid_state();
        assert!(step_valid(&state, Step::Configuration));

        state.config.db_host.clear();
        assert!(!step_valid(&state, Step::Configuration));

        let mut state = valid_state();
        state.config.db_port = 0;
        assert!(!step_valid(&state, Step::Configuration));

        let mut state = valid_state();
        state.config.jwt_secret.clear();
        assert!(!step_valid(&state, Step::Configuration));

        let mut state = valid_state();
        state.config.telegram_bot_token = "   ".to_string();
        assert!(!step_valid(&state, Step::Configuration));
    }

    #[test]
    fn install_requires_admin_saved_config_and_green_hosts() {
        let mut state = valid_state();
        state.admin.password = "longenough".to_string();
        state.config_saved = true;
        state.host_checks = vec![
            HostCheckResult {
                name: "database".to_string(),
                host: "192.168.20.6".to_string(),
                port: 3306,
                ok: true,
                error: None,
            },
            HostCheckResult {
                name: "redis".to_string(),
                host: "127.0.0.1".to_string(),
                port: 6379,
                ok: true,
                error: None,
            },
        ];
        assert!(step_valid(&state, Step::Install));

        state.host_checks[1].ok = false;
        assert!(!step_valid(&state, Step::Install));

        state.host_checks.clear();
        assert!(!step_valid(&state, Step::Install));
    }

    #[test]
    fn admin_username_follows_backend_pattern() {
        let mut state = valid_state();
        state.admin.password = "longenough".to_string();

        for bad in ["admin", "@ab", "@has space", "@кириллица"] {
            state.admin.username = bad.to_string();
            assert!(!admin_valid(&state), "{bad:?} should be rejected");
        }

        state.admin.username = "@root_01".to_string();
        assert!(admin_valid(&state));

        state.admin.password = "short".to_string();
        assert!(!admin_valid(&state));
    }

    #[test]
    fn review_page_waits_for_completed_install() {
        let mut state = valid_state();
        assert!(!step_valid(&state, Step::AdminReview));
        state.install_completed = true;
        assert!(step_valid(&state, Step::AdminReview));
    }

    #[test]
    fn final_page_has_no_forward_transition() {
        let mut state = valid_state();
        state.install_completed = true;
        assert!(!step_valid(&state, Step::Finish));
    }
}
