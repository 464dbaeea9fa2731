//! Headless terminal UI for the provisioning wizard.
//!
//! Layout:
//! - Centered "installer window" frame titled "BDM Knowledge Setup"
//! - Left banner panel with ASCII logo
//! - Main content panel with one wizard page at a time
//! - Bottom button row: [ Back ] [ Next ] [ Quit ]
//!
//! All backend calls run on worker threads; the UI renders from snapshots
//! delivered over a channel and never holds the wizard lock across a frame.
//!
//! Note: Logging is file-only in TUI mode (stdout logging is disabled) to
//! avoid corrupting the terminal UI.

use std::fs;
use std::io::{self, Stdout};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use log::info;
use ratatui::backend::{CrosstermBackend, TestBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;

use crate::wizard::state::{DraftConfig, Language, Step, WizardState};
use crate::wizard::validators;
use crate::wizard::{SystemToggle, Wizard, WizardSnapshot, BOOTSTRAP_COMMAND};

const ASCII_LOGO: &str = r#"██████╗ ██████╗ ███╗   ███╗
██╔══██╗██╔══██╗████╗ ████║
██████╔╝██║  ██║██╔████╔██║
██╔══██╗██║  ██║██║╚██╔╝██║
██████╔╝██████╔╝██║ ╚═╝ ██║
╚═════╝ ╚═════╝ ╚═╝     ╚═╝

Knowledge Base
Web Installer"#;

/// How long a fetched installer status stays on screen.
const STATUS_TTL: Duration = Duration::from_secs(5);

/// UI strings for one language. The wording follows the original web
/// installer so operators see familiar text.
struct Copy {
    step_titles: [&'static str; 8],
    step_subtitles: [&'static str; 8],
    back: &'static str,
    next: &'static str,
    quit: &'static str,
    working: &'static str,
    confirm_quit: &'static str,
    yes: &'static str,
    no: &'static str,
    language_hint: &'static str,
    bootstrap_note: &'static str,
    bootstrap_check: &'static str,
    bootstrap_status_title: &'static str,
    bootstrap_env_dir: &'static str,
    bootstrap_sudoers: &'static str,
    bootstrap_script: &'static str,
    ok_word: &'static str,
    missing_word: &'static str,
    token_label: &'static str,
    check_status: &'static str,
    status_enabled: &'static str,
    status_disabled: &'static str,
    status_installed_yes: &'static str,
    status_installed_no: &'static str,
    installer_disabled_hint: &'static str,
    save_config: &'static str,
    db_check: &'static str,
    write_env_files: &'static str,
    permission_hint: &'static str,
    run_host_checks: &'static str,
    host_ok: &'static str,
    host_fail: &'static str,
    system_setup_title: &'static str,
    toggle_labels: [&'static str; 6],
    run_system_setup: &'static str,
    admin_username: &'static str,
    admin_password: &'static str,
    seed_upsert: &'static str,
    run_install: &'static str,
    install_note: &'static str,
    admin_review_empty: &'static str,
    finish_note: &'static str,
    finish_disable_failed: &'static str,
    finish_restart_hint: &'static str,
}

const COPY_EN: Copy = Copy {
    step_titles: [
        "Language",
        "Bootstrap",
        "Installer access",
        "Configuration",
        "Connectivity and system setup",
        "Application install",
        "Admin credentials",
        "Finish",
    ],
    step_subtitles: [
        "Choose the installer interface language to begin.",
        "One-time server setup so the installer can complete system tasks.",
        "Enter the installer token and verify access before you begin.",
        "Fill in database, Redis, and secrets. The installer will write env files to /etc/bdm.",
        "Check database/Redis connectivity and run optional server setup.",
        "Creates tables, admin, seed data, and disables the installer.",
        "Review the admin creation status after the install step.",
        "Installation is complete.",
    ],
    back: "Back",
    next: "Next step",
    quit: "Quit",
    working: "Working...",
    confirm_quit: "Quit the installer? Progress is saved and resumes next time.",
    yes: "Yes",
    no: "No",
    language_hint: "Use Left/Right to change the language.",
    bootstrap_note: "Run the command below on the server before using system setup.",
    bootstrap_check: "Check bootstrap",
    bootstrap_status_title: "Bootstrap status",
    bootstrap_env_dir: "/etc/bdm is writable",
    bootstrap_sudoers: "sudoers rule installed",
    bootstrap_script: "system_install.sh exists",
    ok_word: "ok",
    missing_word: "missing",
    token_label: "Installer token",
    check_status: "Check status",
    status_enabled: "enabled",
    status_disabled: "disabled",
    status_installed_yes: "yes",
    status_installed_no: "no",
    installer_disabled_hint:
        "Installer is disabled. Set INSTALLER_ENABLED=1 in backend env and restart the API service.",
    save_config: "Save config on server",
    db_check: "Check DB login",
    write_env_files: "Write env files to disk",
    permission_hint:
        "Permission denied. Run the bootstrap command below to allow writing /etc/bdm, then save again.",
    run_host_checks: "Check DB/Redis hosts",
    host_ok: "ok",
    host_fail: "fail",
    system_setup_title: "System setup (optional)",
    toggle_labels: [
        "Install Node.js",
        "Install Redis",
        "Use NodeSource repository",
        "Build frontend",
        "Install systemd units",
        "Start services after setup",
    ],
    run_system_setup: "Run system setup",
    admin_username: "Admin username",
    admin_password: "Password",
    seed_upsert: "Upsert seed data",
    run_install: "Run install",
    install_note:
        "Uses the database credentials from the configuration step. Redis must be reachable from this server.",
    admin_review_empty: "Run the application install first.",
    finish_note:
        "Installer has been disabled in /etc/bdm/bdm.env. Restart the API service to apply it.",
    finish_disable_failed:
        "Installer could not be disabled automatically. Set INSTALLER_ENABLED=0 in /etc/bdm/bdm.env and restart the API service.",
    finish_restart_hint: "If the installer still appears, restart the API service.",
};

const COPY_RU: Copy = Copy {
    step_titles: [
        "Выбор языка",
        "Bootstrap",
        "Доступ к установщику",
        "Конфигурация",
        "Подключение и системная подготовка",
        "Установка приложения",
        "Учётка администратора",
        "Готово",
    ],
    step_subtitles: [
        "Выберите язык интерфейса установщика, затем продолжайте.",
        "Единовременная подготовка сервера для системных шагов.",
        "Введите токен и проверьте доступ перед началом.",
        "Заполните БД, Redis и секреты. Установщик запишет env в /etc/bdm.",
        "Проверьте доступность БД/Redis и при необходимости подготовьте сервер.",
        "Создаёт таблицы, администратора, сид и отключает установщик.",
        "Проверьте статус создания администратора после установки.",
        "Установка завершена.",
    ],
    back: "Назад",
    next: "Дальше",
    quit: "Выход",
    working: "Выполняется...",
    confirm_quit: "Выйти из установщика? Прогресс сохранён и восстановится.",
    yes: "Да",
    no: "Нет",
    language_hint: "Стрелки влево/вправо меняют язык.",
    bootstrap_note: "Выполните команду ниже на сервере перед системной установкой.",
    bootstrap_check: "Проверить bootstrap",
    bootstrap_status_title: "Статус bootstrap",
    bootstrap_env_dir: "/etc/bdm доступна для записи",
    bootstrap_sudoers: "sudoers правило установлено",
    bootstrap_script: "system_install.sh существует",
    ok_word: "ok",
    missing_word: "нет",
    token_label: "Токен установщика",
    check_status: "Проверить статус",
    status_enabled: "включён",
    status_disabled: "выключен",
    status_installed_yes: "да",
    status_installed_no: "нет",
    installer_disabled_hint:
        "Установщик выключен. Включите INSTALLER_ENABLED=1 в env и перезапустите API сервис.",
    save_config: "Сохранить на сервере",
    db_check: "Проверить логин БД",
    write_env_files: "Записать env-файлы на диск",
    permission_hint: "Нет прав на запись. Выполните bootstrap-команду ниже и сохраните ещё раз.",
    run_host_checks: "Проверить БД/Redis",
    host_ok: "ок",
    host_fail: "ошибка",
    system_setup_title: "Системная установка (опционально)",
    toggle_labels: [
        "Установить Node.js",
        "Установить Redis",
        "Использовать репозиторий NodeSource",
        "Собрать фронтенд",
        "Установить systemd юниты",
        "Запустить сервисы после установки",
    ],
    run_system_setup: "Запустить системную установку",
    admin_username: "Логин администратора",
    admin_password: "Пароль",
    seed_upsert: "Обновлять сид-данные",
    run_install: "Запустить установку",
    install_note:
        "Использует логин/пароль БД из шага конфигурации. Redis должен быть доступен с этого сервера.",
    admin_review_empty: "Сначала запустите установку приложения.",
    finish_note: "Установщик отключен в /etc/bdm/bdm.env. Перезапустите API, чтобы применить.",
    finish_disable_failed:
        "Установщик не удалось отключить автоматически. Установите INSTALLER_ENABLED=0 в /etc/bdm/bdm.env и перезапустите API.",
    finish_restart_hint: "Если мастер всё ещё виден, перезапустите API.",
};

fn copy(lang: Language) -> &'static Copy {
    match lang {
        Language::En => &COPY_EN,
        Language::Ru => &COPY_RU,
    }
}

struct TextInput {
    value: String,
    /// Cursor position in chars, not bytes; the value may be Cyrillic.
    cursor: usize,
    masked: bool,
}

impl TextInput {
    fn new(value: impl Into<String>, masked: bool) -> Self {
        let v = value.into();
        Self {
            cursor: v.chars().count(),
            value: v,
            masked,
        }
    }

    fn display(&self) -> String {
        if self.masked {
            "*".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }

    fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.value.chars().count();
    }

    fn char_count(&self) -> usize {
        self.value.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(c) => {
                let at = self.byte_index(self.cursor);
                self.value.insert(at, c);
                self.cursor += 1;
                true
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_index(self.cursor);
                    self.value.remove(at);
                }
                true
            }
            KeyCode::Delete => {
                if self.cursor < self.char_count() {
                    let at = self.byte_index(self.cursor);
                    self.value.remove(at);
                }
                true
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                true
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.char_count());
                true
            }
            KeyCode::Home => {
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                self.cursor = self.char_count();
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonFocus {
    Back,
    Next,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusTarget {
    Slot(usize),
    Button(ButtonFocus),
}

/// Backend work the UI can kick off on a worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Advance,
    CheckStatus,
    CheckBootstrap,
    DbCheck,
    HostChecks,
    SystemSetup,
    Install,
}

enum UiMsg {
    ActionFinished(Box<WizardSnapshot>),
    WorkerFailed(String),
}

struct Inputs {
    token: TextInput,
    config: [TextInput; 12],
    admin_username: TextInput,
    admin_password: TextInput,
}

impl Inputs {
    fn from_state(state: &WizardState) -> Self {
        let c = &state.config;
        Inputs {
            token: TextInput::new(state.token.clone(), true),
            config: [
                TextInput::new(c.base_url.clone(), false),
                TextInput::new(c.db_host.clone(), false),
                TextInput::new(c.db_port.to_string(), false),
                TextInput::new(c.db_name.clone(), false),
                TextInput::new(c.db_user.clone(), false),
                TextInput::new(c.db_password.clone(), true),
                TextInput::new(c.redis_url.clone(), false),
                TextInput::new(c.jwt_secret.clone(), true),
                TextInput::new(c.telegram_bot_token.clone(), true),
                TextInput::new(c.backend_base_url.clone(), false),
                TextInput::new(c.api_base.clone(), false),
                TextInput::new(c.api_internal.clone(), false),
            ],
            admin_username: TextInput::new(state.admin.username.clone(), false),
            admin_password: TextInput::new(state.admin.password.clone(), true),
        }
    }

    fn apply_to_config(&self, draft: &mut DraftConfig) {
        draft.base_url = self.config[0].value.clone();
        draft.db_host = self.config[1].value.clone();
        draft.db_port = self.config[2].value.trim().parse().unwrap_or(0);
        draft.db_name = self.config[3].value.clone();
        draft.db_user = self.config[4].value.clone();
        draft.db_password = self.config[5].value.clone();
        draft.redis_url = self.config[6].value.clone();
        draft.jwt_secret = self.config[7].value.clone();
        draft.telegram_bot_token = self.config[8].value.clone();
        draft.backend_base_url = self.config[9].value.clone();
        draft.api_base = self.config[10].value.clone();
        draft.api_internal = self.config[11].value.clone();
    }
}

const CONFIG_LABELS: [&str; 12] = [
    "BASE_URL *",
    "DB_HOST *",
    "DB_PORT *",
    "DB_NAME *",
    "DB_USER *",
    "DB_PASSWORD *",
    "REDIS_URL *",
    "JWT_SECRET *",
    "TELEGRAM_BOT_TOKEN *",
    "BACKEND_BASE_URL *",
    "NEXT_PUBLIC_API_BASE *",
    "API_INTERNAL_URL *",
];

struct Ui {
    wizard: Arc<Mutex<Wizard>>,
    snap: WizardSnapshot,
    inputs: Inputs,
    focus: FocusTarget,
    busy: bool,
    quit: bool,
    confirm_quit: bool,
    /// Local notice (file writes and such), distinct from the wizard message.
    notice: Option<String>,
}

fn lock(wizard: &Arc<Mutex<Wizard>>) -> MutexGuard<'_, Wizard> {
    match wizard.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Ui {
    fn new(wizard: Arc<Mutex<Wizard>>) -> Self {
        let snap = lock(&wizard).snapshot();
        let inputs = Inputs::from_state(&snap.state);
        Ui {
            wizard,
            snap,
            inputs,
            focus: FocusTarget::Button(ButtonFocus::Next),
            busy: false,
            quit: false,
            confirm_quit: false,
            notice: None,
        }
    }

    fn step(&self) -> Step {
        self.snap.state.step()
    }

    fn slot_count(&self) -> usize {
        match self.step() {
            Step::Language => 1,
            Step::Bootstrap => 1,
            Step::Access => 2,
            Step::Configuration => 15,
            Step::Connectivity => 8,
            Step::Install => 4,
            Step::AdminReview | Step::Finish => 0,
        }
    }

    fn focused_input_mut(&mut self) -> Option<&mut TextInput> {
        let FocusTarget::Slot(slot) = self.focus else {
            return None;
        };
        match self.step() {
            Step::Access if slot == 0 => Some(&mut self.inputs.token),
            Step::Configuration if slot < 12 => Some(&mut self.inputs.config[slot]),
            Step::Install if slot == 0 => Some(&mut self.inputs.admin_username),
            Step::Install if slot == 1 => Some(&mut self.inputs.admin_password),
            _ => None,
        }
    }

    fn cycle_focus(&mut self, forward: bool) {
        let slots = self.slot_count();
        let order_len = slots + 3;
        let current = match self.focus {
            FocusTarget::Slot(i) => i,
            FocusTarget::Button(ButtonFocus::Back) => slots,
            FocusTarget::Button(ButtonFocus::Next) => slots + 1,
            FocusTarget::Button(ButtonFocus::Quit) => slots + 2,
        };
        let next = if forward {
            (current + 1) % order_len
        } else {
            (current + order_len - 1) % order_len
        };
        self.focus = if next < slots {
            FocusTarget::Slot(next)
        } else {
            FocusTarget::Button(match next - slots {
                0 => ButtonFocus::Back,
                1 => ButtonFocus::Next,
                _ => ButtonFocus::Quit,
            })
        };
    }

    /// Pushes page edits into the wizard through its named actions. A config
    /// commit only happens when the draft actually changed, so untouched
    /// derived results survive.
    fn commit_inputs(&mut self) {
        let step = self.step();
        let mut w = lock(&self.wizard);
        match step {
            Step::Access => {
                if self.inputs.token.value != w.state().token {
                    w.set_token(self.inputs.token.value.clone());
                }
            }
            Step::Configuration => {
                let mut draft = w.state().config.clone();
                self.inputs.apply_to_config(&mut draft);
                if draft != w.state().config {
                    w.edit_config(move |c| *c = draft);
                }
            }
            Step::Install => {
                if self.inputs.admin_username.value != w.state().admin.username {
                    w.set_admin_username(self.inputs.admin_username.value.clone());
                }
                if self.inputs.admin_password.value != w.state().admin.password {
                    w.set_admin_password(self.inputs.admin_password.value.clone());
                }
            }
            _ => {}
        }
        self.snap = w.snapshot();
    }

    fn apply_snapshot(&mut self, snapshot: WizardSnapshot) {
        let step_changed = snapshot.state.current_step != self.snap.state.current_step;
        self.snap = snapshot;
        if step_changed {
            self.inputs = Inputs::from_state(&self.snap.state);
            self.focus = FocusTarget::Button(ButtonFocus::Next);
        }
    }
}

/// Interactive entry point. Blocks until the operator quits.
pub fn run(wizard: Wizard) -> Result<()> {
    info!("[PHASE: tui] [STEP: start] Starting TUI wizard");

    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, wizard);
    restore_terminal(&mut terminal)?;

    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, wizard: Wizard) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut ui = Ui::new(Arc::new(Mutex::new(wizard)));
    let (tx, rx) = mpsc::channel::<UiMsg>();

    while !ui.quit {
        drain_messages(&mut ui, &rx);
        terminal.draw(|f| draw(f.size(), f, &ui))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => handle_key(&mut ui, key.code, &tx),
                Event::Resize(_, _) => {}
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }

    Ok(())
}

fn drain_messages(ui: &mut Ui, rx: &mpsc::Receiver<UiMsg>) {
    while let Ok(msg) = rx.try_recv() {
        match msg {
            UiMsg::ActionFinished(snapshot) => {
                ui.busy = false;
                ui.apply_snapshot(*snapshot);
            }
            UiMsg::WorkerFailed(message) => {
                ui.busy = false;
                ui.notice = Some(message);
            }
        }
    }
}

fn handle_key(ui: &mut Ui, code: KeyCode, tx: &mpsc::Sender<UiMsg>) {
    if ui.confirm_quit {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => ui.quit = true,
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => ui.confirm_quit = false,
            _ => {}
        }
        return;
    }

    match code {
        KeyCode::Esc => {
            ui.confirm_quit = true;
            return;
        }
        KeyCode::Tab | KeyCode::Down => {
            ui.cycle_focus(true);
            return;
        }
        KeyCode::BackTab | KeyCode::Up => {
            ui.cycle_focus(false);
            return;
        }
        _ => {}
    }

    // Language selection before generic input handling: the page has no text
    // inputs, so Left/Right are free to switch the language.
    if ui.step() == Step::Language && matches!(code, KeyCode::Left | KeyCode::Right) {
        if !ui.busy {
            let lang = match ui.snap.state.lang {
                Language::Ru => Language::En,
                Language::En => Language::Ru,
            };
            let mut w = lock(&ui.wizard);
            w.set_language(lang);
            let snapshot = w.snapshot();
            drop(w);
            ui.apply_snapshot(snapshot);
        }
        return;
    }

    if let Some(input) = ui.focused_input_mut() {
        if !matches!(code, KeyCode::Enter) && input.handle_key(code) {
            return;
        }
    }

    match code {
        KeyCode::Enter | KeyCode::Char(' ') => activate(ui, tx),
        _ => {}
    }
}

/// Enter/Space on the focused slot or button.
fn activate(ui: &mut Ui, tx: &mpsc::Sender<UiMsg>) {
    match ui.focus {
        FocusTarget::Button(ButtonFocus::Quit) => {
            ui.confirm_quit = true;
        }
        FocusTarget::Button(ButtonFocus::Back) => {
            if ui.busy || ui.step() == Step::Language {
                return;
            }
            ui.commit_inputs();
            let mut w = lock(&ui.wizard);
            w.retreat();
            let snapshot = w.snapshot();
            drop(w);
            ui.apply_snapshot(snapshot);
        }
        FocusTarget::Button(ButtonFocus::Next) => {
            if validators::step_valid(&ui.snap.state, ui.step()) {
                spawn_action(ui, tx, Action::Advance);
            }
        }
        FocusTarget::Slot(slot) => activate_slot(ui, slot, tx),
    }
}

fn activate_slot(ui: &mut Ui, slot: usize, tx: &mpsc::Sender<UiMsg>) {
    match (ui.step(), slot) {
        (Step::Bootstrap, 0) => spawn_action(ui, tx, Action::CheckBootstrap),
        (Step::Access, 0) => ui.cycle_focus(true),
        (Step::Access, 1) => spawn_action(ui, tx, Action::CheckStatus),
        (Step::Configuration, s) if s < 12 => ui.cycle_focus(true),
        (Step::Configuration, 12) => {
            if !ui.busy {
                ui.commit_inputs();
                spawn_save_config(ui, tx);
            }
        }
        (Step::Configuration, 13) => spawn_action(ui, tx, Action::DbCheck),
        (Step::Configuration, 14) => write_env_files(ui),
        (Step::Connectivity, 0) => spawn_action(ui, tx, Action::HostChecks),
        (Step::Connectivity, s) if (1..=6).contains(&s) => flip_toggle(ui, s - 1),
        (Step::Connectivity, 7) => spawn_action(ui, tx, Action::SystemSetup),
        (Step::Install, 0) | (Step::Install, 1) => ui.cycle_focus(true),
        (Step::Install, 2) => {
            if !ui.busy {
                let mut w = lock(&ui.wizard);
                let next = !w.state().seed_upsert;
                w.set_seed_upsert(next);
                let snapshot = w.snapshot();
                drop(w);
                ui.apply_snapshot(snapshot);
            }
        }
        (Step::Install, 3) => spawn_action(ui, tx, Action::Install),
        _ => {}
    }
}

fn flip_toggle(ui: &mut Ui, index: usize) {
    if ui.busy {
        return;
    }
    let toggle = [
        SystemToggle::InstallNode,
        SystemToggle::InstallRedis,
        SystemToggle::UseNodesource,
        SystemToggle::BuildFrontend,
        SystemToggle::SetupSystemd,
        SystemToggle::StartServices,
    ][index];
    let mut w = lock(&ui.wizard);
    let s = w.state();
    let current = match toggle {
        SystemToggle::InstallNode => s.install_node,
        SystemToggle::InstallRedis => s.install_redis,
        SystemToggle::UseNodesource => s.use_nodesource,
        SystemToggle::BuildFrontend => s.build_frontend,
        SystemToggle::SetupSystemd => s.setup_systemd,
        SystemToggle::StartServices => s.start_services,
    };
    w.set_system_toggle(toggle, !current);
    let snapshot = w.snapshot();
    drop(w);
    ui.apply_snapshot(snapshot);
}

fn spawn_action(ui: &mut Ui, tx: &mpsc::Sender<UiMsg>, action: Action) {
    if ui.busy {
        return;
    }
    ui.commit_inputs();
    ui.notice = None;
    ui.busy = true;

    let wizard = ui.wizard.clone();
    let tx = tx.clone();
    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build();
        match rt {
            Ok(rt) => {
                let mut w = lock(&wizard);
                let status_seq = match action {
                    Action::Advance => {
                        rt.block_on(w.advance());
                        None
                    }
                    Action::CheckStatus => Some(rt.block_on(w.check_status())),
                    Action::CheckBootstrap => {
                        rt.block_on(w.check_bootstrap());
                        None
                    }
                    Action::DbCheck => {
                        rt.block_on(w.run_db_check());
                        None
                    }
                    Action::HostChecks => {
                        rt.block_on(w.run_host_checks());
                        None
                    }
                    Action::SystemSetup => {
                        rt.block_on(w.run_system_setup());
                        None
                    }
                    Action::Install => {
                        rt.block_on(w.run_install());
                        None
                    }
                };
                let snapshot = w.snapshot();
                drop(w);

                if let Some(seq) = status_seq {
                    // The transient status line clears itself unless a newer
                    // fetch superseded it in the meantime.
                    let wizard = wizard.clone();
                    let tx = tx.clone();
                    thread::spawn(move || {
                        thread::sleep(STATUS_TTL);
                        let mut w = lock(&wizard);
                        w.clear_status_if_current(seq);
                        let snapshot = w.snapshot();
                        drop(w);
                        let _ = tx.send(UiMsg::ActionFinished(Box::new(snapshot)));
                    });
                }

                let _ = tx.send(UiMsg::ActionFinished(Box::new(snapshot)));
            }
            Err(e) => {
                let _ = tx.send(UiMsg::WorkerFailed(format!("Internal error: {}", e)));
            }
        }
    });
}

/// Save is not routed through [`Action`] because the UI does not advance on
/// success; it only needs the refreshed snapshot.
fn spawn_save_config(ui: &mut Ui, tx: &mpsc::Sender<UiMsg>) {
    ui.busy = true;
    let wizard = ui.wizard.clone();
    let tx = tx.clone();
    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build();
        match rt {
            Ok(rt) => {
                let mut w = lock(&wizard);
                rt.block_on(w.save_config());
                let snapshot = w.snapshot();
                drop(w);
                let _ = tx.send(UiMsg::ActionFinished(Box::new(snapshot)));
            }
            Err(e) => {
                let _ = tx.send(UiMsg::WorkerFailed(format!("Internal error: {}", e)));
            }
        }
    });
}

/// Local counterpart of the web installer's env download buttons.
fn write_env_files(ui: &mut Ui) {
    if ui.busy {
        return;
    }
    ui.commit_inputs();
    let backend = crate::wizard::envgen::backend_env(&ui.snap.state);
    let frontend = crate::wizard::envgen::frontend_env(&ui.snap.state);
    let result = fs::write("bdm.env", backend).and_then(|_| fs::write("frontend.env", frontend));
    ui.notice = Some(match result {
        Ok(()) => "Wrote bdm.env and frontend.env to the current directory.".to_string(),
        Err(e) => format!("Could not write env files: {}", e),
    });
}

// ---- drawing ----------------------------------------------------------------

fn draw(area: Rect, f: &mut ratatui::Frame<'_>, ui: &Ui) {
    let window_area = centered_window(area, 100, 30);
    let t = copy(ui.snap.state.lang);

    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title("BDM Knowledge Setup");
    f.render_widget(outer_block, window_area);

    let inner = window_area.inner(&ratatui::layout::Margin {
        vertical: 1,
        horizontal: 1,
    });
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(inner);

    let body = rows[0];
    let buttons = rows[1];

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(0)].as_ref())
        .split(body);

    let banner_block = Block::default().borders(Borders::ALL);
    let logo = Paragraph::new(ASCII_LOGO)
        .block(banner_block)
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false });
    f.render_widget(logo, cols[0]);

    let step = ui.step();
    let title = format!(
        "{} {}/8: {}",
        if ui.snap.state.lang == Language::Ru {
            "Шаг"
        } else {
            "Step"
        },
        step.index() + 1,
        t.step_titles[step.index()]
    );
    let content_block = Block::default().borders(Borders::ALL).title(title);
    let content_inner = content_block.inner(cols[1]);
    f.render_widget(content_block, cols[1]);

    let mut lines = vec![Line::from(t.step_subtitles[step.index()]), Line::from("")];
    lines.extend(page_lines(ui, t));

    if let Some(notice) = &ui.notice {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }
    if let Some(message) = &ui.snap.message {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    if ui.busy {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            t.working,
            Style::default().add_modifier(Modifier::ITALIC),
        )));
    }

    let content = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    f.render_widget(content, content_inner);

    draw_buttons(f, buttons, ui, t);

    if ui.confirm_quit {
        draw_confirm_quit(f, window_area, t);
    }
}

fn page_lines(ui: &Ui, t: &Copy) -> Vec<Line<'static>> {
    let state = &ui.snap.state;
    match ui.step() {
        Step::Language => {
            let ru = if state.lang == Language::Ru {
                "[Русский]"
            } else {
                " Русский "
            };
            let en = if state.lang == Language::En {
                "[English]"
            } else {
                " English "
            };
            vec![
                slot_line(ui, 0, format!("{}    {}", ru, en)),
                Line::from(""),
                Line::from(t.language_hint),
            ]
        }
        Step::Bootstrap => {
            let mut lines = vec![
                Line::from(t.bootstrap_note),
                Line::from(""),
                Line::from(format!("  {}", BOOTSTRAP_COMMAND)),
                Line::from(""),
                slot_line(ui, 0, format!("[ {} ]", t.bootstrap_check)),
            ];
            if let Some(b) = &ui.snap.bootstrap_status {
                let mark = |ok: bool| if ok { t.ok_word } else { t.missing_word };
                lines.push(Line::from(""));
                lines.push(Line::from(t.bootstrap_status_title));
                lines.push(Line::from(format!(
                    "  {:<34} {}",
                    t.bootstrap_env_dir,
                    mark(b.env_dir_exists && b.env_dir_writable)
                )));
                lines.push(Line::from(format!(
                    "  {:<34} {}",
                    t.bootstrap_sudoers,
                    mark(b.sudoers_present)
                )));
                lines.push(Line::from(format!(
                    "  {:<34} {}",
                    t.bootstrap_script,
                    mark(b.system_install_exists)
                )));
            }
            lines
        }
        Step::Access => {
            let mut lines = vec![
                field_line(ui, 0, t.token_label, &ui.inputs.token),
                Line::from(""),
                slot_line(ui, 1, format!("[ {} ]", t.check_status)),
            ];
            if let Some(status) = &ui.snap.status {
                lines.push(Line::from(""));
                lines.push(Line::from(format!(
                    "  {} · {}",
                    if status.enabled {
                        t.status_enabled
                    } else {
                        t.status_disabled
                    },
                    if status.installed {
                        t.status_installed_yes
                    } else {
                        t.status_installed_no
                    }
                )));
                if !status.enabled {
                    lines.push(Line::from(t.installer_disabled_hint));
                }
            }
            lines
        }
        Step::Configuration => {
            let mut lines = Vec::new();
            for (i, label) in CONFIG_LABELS.iter().enumerate() {
                lines.push(field_line(ui, i, label, &ui.inputs.config[i]));
            }
            lines.push(Line::from(""));
            lines.push(slot_line(ui, 12, format!("[ {} ]", t.save_config)));
            lines.push(slot_line(ui, 13, format!("[ {} ]", t.db_check)));
            lines.push(slot_line(ui, 14, format!("[ {} ]", t.write_env_files)));
            if let Some(db) = &state.db_check_result {
                lines.push(Line::from(""));
                lines.push(Line::from(format!(
                    "  DB: {}",
                    if db.db_ok {
                        t.ok_word.to_string()
                    } else {
                        db.error.clone().unwrap_or_else(|| t.host_fail.to_string())
                    }
                )));
            }
            if ui.snap.needs_bootstrap {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    t.permission_hint,
                    Style::default().fg(Color::Yellow),
                )));
                lines.push(Line::from(format!("  {}", BOOTSTRAP_COMMAND)));
            }
            lines
        }
        Step::Connectivity => {
            let mut lines = vec![slot_line(ui, 0, format!("[ {} ]", t.run_host_checks))];
            for check in &state.host_checks {
                let mark = if check.ok { t.host_ok } else { t.host_fail };
                let detail = check.error.clone().unwrap_or_default();
                lines.push(Line::from(format!(
                    "  {:<10} {}:{}  {} {}",
                    check.name, check.host, check.port, mark, detail
                )));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(t.system_setup_title));
            let toggles = [
                state.install_node,
                state.install_redis,
                state.use_nodesource,
                state.build_frontend,
                state.setup_systemd,
                state.start_services,
            ];
            for (i, label) in t.toggle_labels.iter().enumerate() {
                let mark = if toggles[i] { "[x]" } else { "[ ]" };
                lines.push(slot_line(ui, i + 1, format!("{} {}", mark, label)));
            }
            lines.push(slot_line(ui, 7, format!("[ {} ]", t.run_system_setup)));
            if let Some(result) = &state.system_setup_result {
                lines.push(Line::from(format!("  status: {}", result.status)));
                if let Some(output) = &result.output {
                    for l in output.lines().rev().take(4).collect::<Vec<_>>().iter().rev() {
                        lines.push(Line::from(format!("  {}", l)));
                    }
                }
            }
            lines
        }
        Step::Install => {
            let seed = if state.seed_upsert { "[x]" } else { "[ ]" };
            let mut lines = vec![
                field_line(ui, 0, t.admin_username, &ui.inputs.admin_username),
                field_line(ui, 1, t.admin_password, &ui.inputs.admin_password),
                slot_line(ui, 2, format!("{} {}", seed, t.seed_upsert)),
                Line::from(""),
                slot_line(ui, 3, format!("[ {} ]", t.run_install)),
                Line::from(""),
                Line::from(t.install_note),
            ];
            if let Some(result) = &state.install_result {
                lines.push(Line::from(""));
                for s in &result.steps {
                    let detail = s.detail.clone().unwrap_or_default();
                    lines.push(Line::from(format!(
                        "  {:<20} {:<8} {}",
                        s.step, s.status, detail
                    )));
                }
            }
            lines
        }
        Step::AdminReview => match &state.install_result {
            Some(result) => {
                let admin_step = result.steps.iter().find(|s| s.step == "admin");
                match admin_step {
                    Some(s) => vec![
                        Line::from(format!("  {}", state.admin.username)),
                        Line::from(format!(
                            "  {}: {}",
                            s.status,
                            s.detail.clone().unwrap_or_default()
                        )),
                    ],
                    None => vec![Line::from(t.admin_review_empty)],
                }
            }
            None => vec![Line::from(t.admin_review_empty)],
        },
        Step::Finish => {
            let mut lines = vec![Line::from(t.finish_note)];
            if ui.snap.disable_installer_failed {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    t.finish_disable_failed,
                    Style::default().fg(Color::Yellow),
                )));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(t.finish_restart_hint));
            lines
        }
    }
}

fn slot_line(ui: &Ui, slot: usize, body: String) -> Line<'static> {
    let focused = ui.focus == FocusTarget::Slot(slot);
    let prefix = if focused { ">" } else { " " };
    let mut style = Style::default();
    if focused {
        style = style.add_modifier(Modifier::BOLD);
    }
    Line::from(Span::styled(format!("{} {}", prefix, body), style))
}

fn field_line(ui: &Ui, slot: usize, label: &str, input: &TextInput) -> Line<'static> {
    slot_line(ui, slot, format!("{:<24} {}", label, input.display()))
}

fn draw_buttons(f: &mut ratatui::Frame<'_>, area: Rect, ui: &Ui, t: &Copy) {
    let step = ui.step();
    let back_enabled = step != Step::Language && !ui.busy;
    let next_enabled = validators::step_valid(&ui.snap.state, step) && !ui.busy;

    let back = button_text(
        t.back,
        ui.focus == FocusTarget::Button(ButtonFocus::Back),
        back_enabled,
    );
    let next = button_text(
        t.next,
        ui.focus == FocusTarget::Button(ButtonFocus::Next),
        next_enabled,
    );
    let quit = button_text(t.quit, ui.focus == FocusTarget::Button(ButtonFocus::Quit), true);

    let line = Line::from(vec![
        back,
        Span::raw(" "),
        next,
        Span::raw(" "),
        quit,
    ]);

    let p = Paragraph::new(Text::from(line)).alignment(Alignment::Right);
    f.render_widget(p, area);
}

fn button_text(label: &str, focused: bool, enabled: bool) -> Span<'static> {
    let mut style = Style::default();
    if !enabled {
        style = style.fg(Color::DarkGray);
    }
    if focused {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Span::styled(format!("[ {} ]", label), style)
}

fn draw_confirm_quit(f: &mut ratatui::Frame<'_>, window_area: Rect, t: &Copy) {
    let modal = centered_window(window_area, 60, 7);
    f.render_widget(ratatui::widgets::Clear, modal);
    let block = Block::default().borders(Borders::ALL).title(t.quit);
    let inner = block.inner(modal);
    f.render_widget(block, modal);
    let text = Text::from(vec![
        Line::from(t.confirm_quit),
        Line::from(""),
        Line::from(format!("[{}] / [{}]", t.yes, t.no)),
    ]);
    f.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        inner,
    );
}

fn centered_window(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width.saturating_sub(2)).max(40);
    let h = height.min(area.height.saturating_sub(2)).max(7);
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    Rect {
        x,
        y,
        width: w,
        height: h,
    }
}

// ---- smoke mode --------------------------------------------------------------

fn smoke_state(target: &str) -> WizardState {
    use crate::api::models::*;

    let mut state = WizardState::new();
    state.lang = Language::En;
    state.token = "smoke-token".to_string();
    state.config.db_password = "smoke-secret".to_string();

    match target {
        "bootstrap" => state.current_step = Step::Bootstrap.index(),
        "access" => state.current_step = Step::Access.index(),
        "config" => state.current_step = Step::Configuration.index(),
        "connectivity" => {
            state.current_step = Step::Connectivity.index();
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
                    ok: false,
                    error: Some("connection refused".to_string()),
                },
            ];
        }
        "install" => {
            state.current_step = Step::Install.index();
            state.admin.password = "longenough".to_string();
            state.config_saved = true;
        }
        "review" => {
            state.current_step = Step::AdminReview.index();
            state.install_completed = true;
            state.install_result = Some(InstallResult {
                status: "ok".to_string(),
                steps: vec![InstallStepResult {
                    step: "admin".to_string(),
                    status: "ok".to_string(),
                    detail: Some("created".to_string()),
                }],
            });
        }
        "finish" => {
            state.current_step = Step::Finish.index();
            state.install_completed = true;
        }
        _ => state.current_step = Step::Language.index(),
    }

    state
}

fn smoke_ui(target: &str) -> Result<Ui> {
    use crate::api::HttpApi;
    use crate::persist::{StateStore, STATE_FILE_NAME};

    let dir = std::env::temp_dir().join(format!("bdm-installer-smoke-{}", uuid::Uuid::new_v4()));
    let store = StateStore::new(dir.join(STATE_FILE_NAME));
    store.save(&smoke_state(target))?;

    // The client is never exercised while rendering a single frame.
    let api = Arc::new(HttpApi::with_base(
        "http://127.0.0.1:8000",
        "/api",
        Duration::from_secs(5),
    )?);
    let wizard = Wizard::new(api, store);
    Ok(Ui::new(Arc::new(Mutex::new(wizard))))
}

/// Non-interactive smoke mode: render a single frame and exit.
/// Target pages: language|bootstrap|access|config|connectivity|install|review|finish
pub fn smoke(target: &str) -> Result<()> {
    info!(
        "[PHASE: tui] [STEP: smoke] Rendering single-frame TUI smoke target={}",
        target
    );

    let ui = smoke_ui(target.trim().to_ascii_lowercase().as_str())?;

    // In-memory backend so this runs in CI/tooling without touching the
    // real terminal (no raw mode / alternate screen).
    let backend = TestBackend::new(100, 30);
    let mut terminal = Terminal::new(backend)?;
    terminal.draw(|f| draw(f.size(), f, &ui))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(target: &str) -> String {
        let ui = smoke_ui(target).unwrap();
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw(f.size(), f, &ui)).unwrap();

        let buffer = terminal.backend().buffer().clone();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer.get(x, y).symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn every_smoke_target_renders_its_page_title() {
        for (target, needle) in [
            ("language", "Language"),
            ("bootstrap", "Bootstrap"),
            ("access", "Installer access"),
            ("config", "Configuration"),
            ("connectivity", "Connectivity"),
            ("install", "Application install"),
            ("review", "Admin credentials"),
            ("finish", "Finish"),
        ] {
            let frame = render(target);
            assert!(
                frame.contains(needle),
                "target {target}: missing {needle:?} in frame:\n{frame}"
            );
        }
    }

    #[test]
    fn connectivity_page_shows_probe_results() {
        let frame = render("connectivity");
        assert!(frame.contains("database"));
        assert!(frame.contains("redis"));
        assert!(frame.contains("connection refused"));
    }

    #[test]
    fn masked_inputs_never_render_their_value() {
        let frame = render("config");
        assert!(!frame.contains("smoke-secret"));
        let frame = render("access");
        assert!(!frame.contains("smoke-token"));
    }

    #[test]
    fn text_input_editing_moves_the_cursor() {
        let mut input = TextInput::new("abc", false);
        input.handle_key(KeyCode::Char('d'));
        assert_eq!(input.value, "abcd");

        input.handle_key(KeyCode::Home);
        input.handle_key(KeyCode::Delete);
        assert_eq!(input.value, "bcd");

        input.handle_key(KeyCode::End);
        input.handle_key(KeyCode::Backspace);
        assert_eq!(input.value, "bc");
        assert_eq!(input.cursor, 2);
    }

    #[test]
    fn cyrillic_typing_and_editing_stay_on_char_boundaries() {
        let mut input = TextInput::new("", false);
        for c in "пароль".chars() {
            input.handle_key(KeyCode::Char(c));
        }
        assert_eq!(input.value, "пароль");
        assert_eq!(input.cursor, 6);

        input.handle_key(KeyCode::Left);
        input.handle_key(KeyCode::Left);
        input.handle_key(KeyCode::Char('и'));
        assert_eq!(input.value, "пароиль");

        input.handle_key(KeyCode::Backspace);
        assert_eq!(input.value, "пароль");

        input.handle_key(KeyCode::Home);
        input.handle_key(KeyCode::Delete);
        assert_eq!(input.value, "ароль");
    }

    #[test]
    fn masked_input_displays_stars() {
        let input = TextInput::new("секрет", true);
        assert_eq!(input.display(), "******");
    }

    #[test]
    fn focus_cycle_covers_all_slots_and_buttons() {
        let mut ui = smoke_ui("access").unwrap();
        ui.focus = FocusTarget::Slot(0);
        let mut seen = vec![ui.focus];
        for _ in 0..4 {
            ui.cycle_focus(true);
            seen.push(ui.focus);
        }
        assert_eq!(seen.last(), Some(&FocusTarget::Slot(0)));
        assert!(seen.contains(&FocusTarget::Button(ButtonFocus::Back)));
        assert!(seen.contains(&FocusTarget::Button(ButtonFocus::Next)));
        assert!(seen.contains(&FocusTarget::Button(ButtonFocus::Quit)));
    }

    #[test]
    fn committing_unchanged_config_keeps_saved_flag() {
        let mut ui = smoke_ui("install").unwrap();
        assert!(ui.snap.state.config_saved);
        ui.commit_inputs();
        assert!(ui.snap.state.config_saved);
    }
}
