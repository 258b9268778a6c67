//! Application state management for finsight.
//!
//! This module contains the core `App` struct that manages the UI state,
//! the authentication session, routing between screens, and the background
//! tasks (login, registration, dashboard refresh) that report back over a
//! channel.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use finsight_core::auth::{self, LoginError, RegisterError};
use finsight_core::models::Summary;
use finsight_core::{
    AccessGuard, ApiClient, AuthSession, AuthorizedClient, Config, Credential, Gate, Identity,
    Registration,
};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Maximum length for email input.
const MAX_EMAIL_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for the full name on the registration form.
const MAX_NAME_LENGTH: usize = 80;

/// One-shot notice shown on the login screen after registering
const REGISTERED_NOTICE: &str = "Registration succeeded. Please sign in.";

/// Notice shown when the server ends a session the user was using
const SESSION_ENDED_NOTICE: &str = "Your session has ended. Please sign in again.";

// ============================================================================
// UI State Types
// ============================================================================

/// Screens of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Dashboard,
}

impl Route {
    /// Protected routes are only rendered through the access guard.
    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Sign in",
            Route::Register => "Create account",
            Route::Dashboard => "Dashboard",
        }
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Email,
    Password,
    Button,
}

impl LoginFocus {
    pub fn next(&self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Email,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Button,
            LoginFocus::Password => LoginFocus::Email,
            LoginFocus::Button => LoginFocus::Password,
        }
    }
}

/// Registration form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterFocus {
    Name,
    Email,
    Password,
    Confirm,
    Button,
}

impl RegisterFocus {
    pub fn next(&self) -> Self {
        match self {
            RegisterFocus::Name => RegisterFocus::Email,
            RegisterFocus::Email => RegisterFocus::Password,
            RegisterFocus::Password => RegisterFocus::Confirm,
            RegisterFocus::Confirm => RegisterFocus::Button,
            RegisterFocus::Button => RegisterFocus::Name,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            RegisterFocus::Name => RegisterFocus::Button,
            RegisterFocus::Email => RegisterFocus::Name,
            RegisterFocus::Password => RegisterFocus::Email,
            RegisterFocus::Confirm => RegisterFocus::Password,
            RegisterFocus::Button => RegisterFocus::Confirm,
        }
    }
}

/// Registration form contents
#[derive(Debug, Clone)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm: String,
    pub focus: RegisterFocus,
    pub error: Option<String>,
    pub pending: bool,
}

impl Default for RegisterForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            password: String::new(),
            confirm: String::new(),
            focus: RegisterFocus::Name,
            error: None,
            pending: false,
        }
    }
}

impl RegisterForm {
    /// The text field under focus, if any
    pub fn focused_field(&mut self) -> Option<(&mut String, usize)> {
        match self.focus {
            RegisterFocus::Name => Some((&mut self.name, MAX_NAME_LENGTH)),
            RegisterFocus::Email => Some((&mut self.email, MAX_EMAIL_LENGTH)),
            RegisterFocus::Password => Some((&mut self.password, MAX_PASSWORD_LENGTH)),
            RegisterFocus::Confirm => Some((&mut self.confirm, MAX_PASSWORD_LENGTH)),
            RegisterFocus::Button => None,
        }
    }

    fn to_registration(&self) -> Registration {
        Registration {
            name: self.name.clone(),
            identifier: self.email.clone(),
            secret: self.password.clone(),
            confirmation: self.confirm.clone(),
        }
    }
}

/// What the dashboard shows for the signed-in user
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub greeting: String,
    pub email: String,
}

impl DashboardView {
    fn for_identity(identity: &Identity) -> Self {
        Self {
            greeting: format!("Welcome, {}", identity.display_name()),
            email: identity.email.clone(),
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned tasks through the MPSC channel.
enum TaskResult {
    Login(Result<Identity, LoginError>),
    Register {
        email: String,
        result: Result<(), RegisterError>,
    },
    Summary {
        generation: u64,
        result: Result<Summary, String>,
    },
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    // Core services
    pub config: Config,
    pub session: AuthSession,
    guard: AccessGuard,
    api: AuthorizedClient,

    // UI State
    pub state: AppState,
    pub route: Route,

    // Login form state
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,
    pub login_pending: bool,
    /// One-shot message for the login screen; dropped when leaving it
    pub notice: Option<String>,

    // Registration form state
    pub register: RegisterForm,

    // Dashboard data
    pub summary: Option<Summary>,
    pub summary_error: Option<String>,
    pub summary_loading: bool,
    /// Bumped whenever the signed-in user may change; older fetches are dropped
    summary_generation: u64,
    /// Set once the protected view has been shown in this session
    had_session: bool,

    // Background task channel
    task_rx: mpsc::Receiver<TaskResult>,
    task_tx: mpsc::Sender<TaskResult>,

    // Status message
    pub status_message: Option<String>,
}

impl App {
    /// Create a new application instance. The session starts unresolved;
    /// call `boot` to restore it.
    pub fn new(config: Config) -> Result<Self> {
        let store = auth::open_store(&config)?;
        let api = ApiClient::new(&config)?;
        Ok(Self::with_session(config, AuthSession::new(store, api)))
    }

    /// Build the app around an existing session.
    pub fn with_session(config: Config, session: AuthSession) -> Self {
        let guard = AccessGuard::new(&session);
        let api = session.authorized_client();
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let login_email = std::env::var("FINSIGHT_EMAIL").unwrap_or_default();

        Self {
            config,
            session,
            guard,
            api,

            state: AppState::Normal,
            route: Route::Dashboard,

            login_email,
            login_password: String::new(),
            login_focus: LoginFocus::Email,
            login_error: None,
            login_pending: false,
            notice: None,

            register: RegisterForm::default(),

            summary: None,
            summary_error: None,
            summary_loading: false,
            summary_generation: 0,
            had_session: false,

            task_rx: rx,
            task_tx: tx,

            status_message: None,
        }
    }

    // =========================================================================
    // Session & Routing
    // =========================================================================

    /// Run the boot-time restore and route accordingly.
    pub fn boot(&mut self) {
        let state = self.session.boot();
        debug!(state = state.label(), "App booted");
        self.sync_route();
        if self.route == Route::Dashboard && self.session.is_authenticated() {
            self.refresh_summary();
        }
    }

    /// Gate the protected view. Never called before rendering the dashboard
    /// is decided, so the dashboard is only shown through this.
    pub fn dashboard_gate(&self) -> Gate<DashboardView> {
        self.guard.check(DashboardView::for_identity)
    }

    /// Re-evaluate the access guard. Redirects protected routes to login.
    pub fn sync_route(&mut self) {
        if self.guard.has_changed() {
            self.guard.mark_seen();
        }
        if !self.route.is_protected() {
            return;
        }
        match self.dashboard_gate() {
            Gate::Pending => {}
            Gate::Render(_) => self.had_session = true,
            Gate::RedirectToLogin => {
                if self.had_session {
                    self.notice = Some(SESSION_ENDED_NOTICE.to_string());
                }
                self.had_session = false;
                self.reset_dashboard();
                self.navigate(Route::Login);
            }
        }
    }

    /// Switch screens. Leaving the login screen consumes its notice.
    pub fn navigate(&mut self, route: Route) {
        if route == self.route {
            return;
        }
        debug!(from = ?self.route, to = ?route, "Navigating");
        if self.route == Route::Login {
            self.notice = None;
        }
        match route {
            Route::Login => {
                self.login_error = None;
                self.login_focus = if self.login_email.is_empty() {
                    LoginFocus::Email
                } else {
                    LoginFocus::Password
                };
            }
            Route::Register => {
                self.register = RegisterForm::default();
            }
            Route::Dashboard => {}
        }
        self.route = route;
    }

    /// Attempt login with the credentials from the login form
    pub fn attempt_login(&mut self) {
        if self.login_pending {
            return;
        }
        if self.login_email.trim().is_empty() || self.login_password.is_empty() {
            self.login_error = Some(LoginError::MissingCredentials.to_string());
            return;
        }

        self.login_error = None;
        self.notice = None;
        self.login_pending = true;

        let credential = Credential::new(self.login_email.trim(), self.login_password.clone());
        let session = self.session.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = session.login(credential).await;
            Self::send_result(&tx, TaskResult::Login(result)).await;
        });
    }

    /// Attempt registration with the contents of the registration form
    pub fn attempt_register(&mut self) {
        if self.register.pending {
            return;
        }
        let registration = self.register.to_registration();
        if let Err(e) = registration.validate() {
            self.register.error = Some(e.to_string());
            return;
        }

        self.register.error = None;
        self.register.pending = true;

        let email = registration.identifier.trim().to_string();
        let session = self.session.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = session.register(registration).await;
            Self::send_result(&tx, TaskResult::Register { email, result }).await;
        });
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.had_session = false;
        self.reset_dashboard();
        self.status_message = Some("Signed out".to_string());
        self.sync_route();
    }

    // =========================================================================
    // Dashboard Data
    // =========================================================================

    /// Forget the dashboard data and orphan any fetch still in flight.
    fn reset_dashboard(&mut self) {
        self.summary_generation += 1;
        self.summary = None;
        self.summary_error = None;
        self.summary_loading = false;
    }

    /// Spawn a background fetch of the ledger summary
    pub fn refresh_summary(&mut self) {
        if self.summary_loading {
            return;
        }
        self.summary_loading = true;
        self.summary_error = None;

        let generation = self.summary_generation;
        let api = self.api.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_summary().await.map_err(|e| e.to_string());
            Self::send_result(&tx, TaskResult::Summary { generation, result }).await;
        });
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    /// Helper to send task results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<TaskResult>, result: TaskResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send task result - channel closed");
        }
    }

    /// Check for completed background tasks and process results
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.task_rx.try_recv() {
            self.process_task_result(result);
        }
        self.sync_route();
    }

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Login(result) => {
                self.login_pending = false;
                // The secret is not kept past the attempt
                self.login_password.clear();
                match result {
                    Ok(identity) => {
                        info!("Login completed");
                        self.status_message = Some(format!("Signed in as {}", identity.email));
                        self.reset_dashboard();
                        self.navigate(Route::Dashboard);
                        self.refresh_summary();
                    }
                    Err(e) => {
                        self.login_error = Some(e.to_string());
                    }
                }
            }
            TaskResult::Register { email, result } => {
                self.register.pending = false;
                match result {
                    Ok(()) => {
                        self.register = RegisterForm::default();
                        self.login_email = email;
                        self.navigate(Route::Login);
                        self.notice = Some(REGISTERED_NOTICE.to_string());
                    }
                    Err(e) => {
                        self.register.error = Some(e.to_string());
                    }
                }
            }
            TaskResult::Summary { generation, result } => {
                if generation != self.summary_generation {
                    debug!(generation, "Dropping summary from an earlier session");
                    return;
                }
                self.summary_loading = false;
                match result {
                    Ok(summary) => {
                        self.summary = Some(summary);
                        self.summary_error = None;
                    }
                    Err(e) => {
                        self.summary_error = Some(e);
                    }
                }
            }
        }
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if an email character should be accepted
pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

/// Check if a character fits a field with the given limit
pub fn can_add_field_char(current_len: usize, limit: usize, c: char) -> bool {
    current_len < limit && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::auth::{MemoryMedium, SessionStore};
    use finsight_core::SessionState;

    fn app_with(medium: MemoryMedium) -> App {
        let config = Config::default();
        let api = ApiClient::new(&config).unwrap();
        let session = AuthSession::new(SessionStore::new(medium), api);
        App::with_session(config, session)
    }

    fn signed_in_medium() -> MemoryMedium {
        MemoryMedium::new()
            .with_field("token", "t1")
            .with_field("identity", r#"{"email":"a@b.com","name":"Ana"}"#)
    }

    // -------------------------------------------------------------------------
    // Routing Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_dashboard_pending_before_boot() {
        let mut app = app_with(MemoryMedium::new());
        app.sync_route();
        assert_eq!(app.route, Route::Dashboard);
        assert!(app.dashboard_gate().is_pending());
    }

    #[tokio::test]
    async fn test_boot_without_session_redirects_to_login() {
        let mut app = app_with(MemoryMedium::new());
        app.boot();
        assert_eq!(app.route, Route::Login);
        assert_eq!(app.notice, None);
    }

    #[tokio::test]
    async fn test_boot_with_session_renders_dashboard() {
        let mut app = app_with(signed_in_medium());
        app.boot();
        assert_eq!(app.route, Route::Dashboard);
        match app.dashboard_gate() {
            Gate::Render(view) => {
                assert_eq!(view.greeting, "Welcome, Ana");
                assert_eq!(view.email, "a@b.com");
            }
            other => panic!("expected dashboard, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalidation_redirects_with_notice() {
        let mut app = app_with(signed_in_medium());
        app.boot();
        app.session.invalidate();
        app.check_background_tasks();
        assert_eq!(app.route, Route::Login);
        assert_eq!(app.notice.as_deref(), Some(SESSION_ENDED_NOTICE));
        assert_eq!(app.session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_logout_redirects_without_notice() {
        let mut app = app_with(signed_in_medium());
        app.boot();
        app.logout();
        assert_eq!(app.route, Route::Login);
        assert_eq!(app.notice, None);
    }

    #[test]
    fn test_notice_consumed_when_leaving_login() {
        let mut app = app_with(MemoryMedium::new());
        app.route = Route::Login;
        app.notice = Some(REGISTERED_NOTICE.to_string());
        app.navigate(Route::Register);
        assert_eq!(app.notice, None);
        app.navigate(Route::Login);
        assert_eq!(app.notice, None);
    }

    #[test]
    fn test_registration_result_routes_to_login_with_notice() {
        let mut app = app_with(MemoryMedium::new());
        app.route = Route::Register;
        app.register.pending = true;
        app.process_task_result(TaskResult::Register {
            email: "a@b.com".to_string(),
            result: Ok(()),
        });
        assert_eq!(app.route, Route::Login);
        assert_eq!(app.notice.as_deref(), Some(REGISTERED_NOTICE));
        assert_eq!(app.login_email, "a@b.com");
        assert_eq!(app.login_focus, LoginFocus::Password);
    }

    #[test]
    fn test_registration_success_clears_form_secrets() {
        let mut app = app_with(MemoryMedium::new());
        app.route = Route::Register;
        app.register.name = "Ana".to_string();
        app.register.password = "hunter22".to_string();
        app.register.confirm = "hunter22".to_string();
        app.register.pending = true;
        app.process_task_result(TaskResult::Register {
            email: "a@b.com".to_string(),
            result: Ok(()),
        });
        assert!(app.register.password.is_empty());
        assert!(app.register.confirm.is_empty());
        assert!(app.register.name.is_empty());
        assert!(!app.register.pending);
    }

    #[tokio::test]
    async fn test_summary_from_previous_session_is_dropped() {
        let mut app = app_with(signed_in_medium());
        app.boot();
        // The boot-time fetch belongs to the first user
        assert!(app.summary_loading);
        let stale_generation = app.summary_generation;

        app.logout();
        assert!(!app.summary_loading);

        // Next user signs in before the old fetch lands
        app.process_task_result(TaskResult::Login(Ok(Identity::new("b@c.com"))));
        assert_eq!(app.route, Route::Dashboard);
        assert!(app.summary_loading);

        app.process_task_result(TaskResult::Summary {
            generation: stale_generation,
            result: Ok(Summary {
                balance: 999.0,
                ..Summary::default()
            }),
        });
        assert_eq!(app.summary, None);
        assert!(app.summary_loading);

        let current = app.summary_generation;
        app.process_task_result(TaskResult::Summary {
            generation: current,
            result: Ok(Summary {
                balance: 5.0,
                ..Summary::default()
            }),
        });
        assert_eq!(app.summary.as_ref().map(|s| s.balance), Some(5.0));
        assert!(!app.summary_loading);
    }

    #[test]
    fn test_failed_login_clears_password_and_shows_reason() {
        let mut app = app_with(MemoryMedium::new());
        app.route = Route::Login;
        app.login_password = "wrong".to_string();
        app.login_pending = true;
        app.process_task_result(TaskResult::Login(Err(LoginError::Rejected {
            reason: "Incorrect email or password".to_string(),
        })));
        assert!(!app.login_pending);
        assert!(app.login_password.is_empty());
        assert_eq!(app.login_error.as_deref(), Some("Incorrect email or password"));
        assert_eq!(app.route, Route::Login);
    }

    #[test]
    fn test_empty_login_form_fails_locally() {
        let mut app = app_with(MemoryMedium::new());
        app.attempt_login();
        assert!(!app.login_pending);
        assert_eq!(app.login_error.as_deref(), Some("Email and password required"));
    }

    #[test]
    fn test_invalid_registration_fails_locally() {
        let mut app = app_with(MemoryMedium::new());
        app.register.name = "Ana".to_string();
        app.register.email = "ana".to_string();
        app.attempt_register();
        assert!(!app.register.pending);
        assert_eq!(app.register.error.as_deref(), Some("Email is not valid"));
    }

    #[test]
    fn test_focus_cycles() {
        assert_eq!(LoginFocus::Button.next(), LoginFocus::Email);
        assert_eq!(LoginFocus::Email.prev(), LoginFocus::Button);
        assert_eq!(RegisterFocus::Confirm.next(), RegisterFocus::Button);
        assert_eq!(RegisterFocus::Name.prev(), RegisterFocus::Button);
    }

    // -------------------------------------------------------------------------
    // Input Validation Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_can_add_email_char() {
        assert!(can_add_email_char(0, 'a'));
        assert!(can_add_email_char(49, '@'));
        assert!(!can_add_email_char(50, 'a'));
        assert!(!can_add_email_char(0, '\x00'));
        assert!(!can_add_email_char(0, '\n'));
        assert!(!can_add_email_char(0, '\t'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\r'));
    }

    #[test]
    fn test_can_add_field_char() {
        assert!(can_add_field_char(79, 80, 'é'));
        assert!(!can_add_field_char(80, 80, 'a'));
    }
}
