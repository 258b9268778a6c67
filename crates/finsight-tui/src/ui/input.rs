//! Keyboard input handling for the TUI.
//!
//! Translates key events into application state changes. Which handler runs
//! depends on the open overlay first and the current route second.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{
    can_add_email_char, can_add_field_char, can_add_password_char, App, AppState, LoginFocus,
    RegisterFocus, Route,
};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        app.state = AppState::Normal;
        return false;
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                app.state = AppState::Quitting;
                return true;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return false;
    }

    match app.route {
        Route::Login => handle_login_input(app, key),
        Route::Register => handle_register_input(app, key),
        Route::Dashboard => handle_dashboard_input(app, key),
    }
}

fn handle_dashboard_input(app: &mut App, key: KeyEvent) -> bool {
    // Nothing to act on until the guard lets the dashboard render
    if !app.session.is_authenticated() {
        return false;
    }
    match key.code {
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('r') => {
            app.status_message = None;
            app.refresh_summary();
        }
        KeyCode::Char('l') => app.logout(),
        _ => {}
    }
    false
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('r') && key.modifiers.contains(KeyModifiers::CONTROL) {
        if !app.login_pending {
            app.navigate(Route::Register);
        }
        return false;
    }

    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return true;
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = app.login_focus.next();
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = app.login_focus.prev();
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Email => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => app.attempt_login(),
        },
        // Fields are read-only while an attempt is in flight
        _ if app.login_pending => {}
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Email => {
                app.login_email.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Email => {
                if can_add_email_char(app.login_email.chars().count(), c) {
                    app.login_email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    false
}

fn handle_register_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => {
            if !app.register.pending {
                app.navigate(Route::Login);
            }
        }
        KeyCode::Down | KeyCode::Tab => {
            app.register.focus = app.register.focus.next();
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.register.focus = app.register.focus.prev();
        }
        KeyCode::Enter => match app.register.focus {
            RegisterFocus::Confirm | RegisterFocus::Button => app.attempt_register(),
            focus => app.register.focus = focus.next(),
        },
        _ if app.register.pending => {}
        KeyCode::Backspace => {
            if let Some((field, _)) = app.register.focused_field() {
                field.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some((field, limit)) = app.register.focused_field() {
                if can_add_field_char(field.chars().count(), limit, c) {
                    field.push(c);
                }
            }
        }
        _ => {}
    }
    false
}
