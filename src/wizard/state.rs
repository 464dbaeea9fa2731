use serde::{Deserialize, Deserializer, Serialize};

use crate::api::models::{
    AdminCandidate, DbCheckResult, HostCheckResult, InstallResult, SystemSetupResult,
};

/// Version stamp of the persisted wizard record.
pub const STATE_VERSION: u32 = 1;

/// Ordered wizard pages. Movement is strictly one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Language,
    Bootstrap,
    Access,
    Configuration,
    Connectivity,
    Install,
    AdminReview,
    Finish,
}

impl Step {
    pub const COUNT: usize = 8;

    pub fn from_index(index: usize) -> Step {
        match index {
            0 => Step::Language,
            1 => Step::Bootstrap,
            2 => Step::Access,
            3 => Step::Configuration,
            4 => Step::Connectivity,
            5 => Step::Install,
            6 => Step::AdminReview,
            _ => Step::Finish,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Step::Language => 0,
            Step::Bootstrap => 1,
            Step::Access => 2,
            Step::Configuration => 3,
            Step::Connectivity => 4,
            Step::Install => 5,
            Step::AdminReview => 6,
            Step::Finish => 7,
        }
    }

    pub fn is_last(self) -> bool {
        self.index() == Self::COUNT - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "ru")]
    Ru,
    #[serde(rename = "en")]
    En,
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

impl Language {
    /// Picks the initial language from the user's locale.
    pub fn from_locale() -> Language {
        match std::env::var("LANG") {
            Ok(lang) if lang.to_lowercase().starts_with("ru") => Language::Ru,
            _ => Language::En,
        }
    }
}

/// Draft platform configuration edited on the configuration page. Field names
/// match the persisted record of the original web installer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftConfig {
    pub base_url: String,
    pub db_host: String,
    #[serde(deserialize_with = "lenient_port")]
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub telegram_bot_token: String,
    pub backend_base_url: String,
    pub api_base: String,
    pub api_internal: String,
}

impl Default for DraftConfig {
    fn default() -> Self {
        DraftConfig {
            base_url: "https://bd-bdm.myrkey.ru".to_string(),
            db_host: "192.168.20.6".to_string(),
            db_port: 3306,
            db_name: "bdm_kb".to_string(),
            db_user: "bdm_app".to_string(),
            db_password: String::new(),
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            jwt_secret: String::new(),
            telegram_bot_token: String::new(),
            backend_base_url: "http://127.0.0.1:8000".to_string(),
            api_base: "/api".to_string(),
            api_internal: "http://127.0.0.1:8000".to_string(),
        }
    }
}

/// Tolerates ports persisted as numbers, numeric strings, or junk. Out-of-range
/// and unparseable values fall back to the MySQL default.
fn lenient_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_port(&value))
}

fn coerce_port(value: &serde_json::Value) -> u16 {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(3306),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(3306),
        _ => 3306,
    }
}

/// Full persisted wizard record. Serialized shape is the version-1 record the
/// original web installer kept in browser storage, so a record written by
/// either client restores in the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardState {
    pub version: u32,
    pub lang: Language,
    pub current_step: usize,
    pub token: String,
    pub config: DraftConfig,
    pub admin: AdminCandidate,
    pub seed_upsert: bool,
    pub config_saved: bool,
    pub host_checks: Vec<HostCheckResult>,
    pub db_check_result: Option<DbCheckResult>,
    pub system_setup_result: Option<SystemSetupResult>,
    pub install_result: Option<InstallResult>,
    pub install_completed: bool,
    pub install_node: bool,
    pub install_redis: bool,
    pub use_nodesource: bool,
    pub build_frontend: bool,
    pub setup_systemd: bool,
    pub start_services: bool,
}

impl Default for WizardState {
    fn default() -> Self {
        WizardState {
            version: STATE_VERSION,
            lang: Language::default(),
            current_step: 0,
            token: String::new(),
            config: DraftConfig::default(),
            admin: AdminCandidate::default(),
            seed_upsert: true,
            config_saved: false,
            host_checks: Vec::new(),
            db_check_result: None,
            system_setup_result: None,
            install_result: None,
            install_completed: false,
            install_node: true,
            install_redis: true,
            use_nodesource: true,
            build_frontend: true,
            setup_systemd: true,
            start_services: true,
        }
    }
}

impl WizardState {
    /// Fresh record for a first run.
    pub fn new() -> Self {
        WizardState {
            lang: Language::from_locale(),
            ..Default::default()
        }
    }

    pub fn step(&self) -> Step {
        Step::from_index(self.current_step)
    }

    /// Applies a configuration edit. Any edit invalidates everything derived
    /// from the previous draft: the saved flag, host check results and the
    /// database login check, in the same mutation.
    pub fn update_config(&mut self, patch: impl FnOnce(&mut DraftConfig)) {
        patch(&mut self.config);
        self.config_saved = false;
        self.host_checks.clear();
        self.db_check_result = None;
    }
}
