use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use finsight_core::models::{format_amount, Summary};
use finsight_core::Gate;

use crate::app::{App, AppState, DashboardView, LoginFocus, RegisterFocus, Route};

use super::styles;

/// Width of the login/register dialogs
const DIALOG_WIDTH: u16 = 52;

/// Visible width of a text field
const FIELD_WIDTH: usize = 24;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_status_bar(frame, app, chunks[2]);

    match app.route {
        Route::Login => render_login(frame, app),
        Route::Register => render_register(frame, app),
        Route::Dashboard => match app.dashboard_gate() {
            Gate::Pending => render_pending(frame, chunks[1]),
            // Redirect is applied on the next tick; draw nothing protected
            Gate::RedirectToLogin => {}
            Gate::Render(view) => render_dashboard(frame, app, &view, chunks[1]),
        },
    }

    // Render overlays
    if matches!(app.state, AppState::ShowingHelp) {
        render_help_overlay(frame, app);
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn logo_lines() -> Vec<Line<'static>> {
    vec![
        Line::from(Span::styled(
            "   ╔═╗╦╔╗╔╔═╗╦╔═╗╦ ╦╔╦╗",
            styles::title_style(),
        )),
        Line::from(Span::styled(
            "   ╠╣ ║║║║╚═╗║║ ╦╠═╣ ║ ",
            styles::title_style(),
        )),
        Line::from(Span::styled(
            "   ╚  ╩╝╚╝╚═╝╩╚═╝╩ ╩ ╩ ",
            styles::title_style(),
        )),
    ]
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!("  FinSight · {}", app.route.title());
    let right = match app.session.identity() {
        Some(identity) => format!("{}  [?] Help", identity.display_name()),
        None => "[?] Help".to_string(),
    };
    let padding = (area.width as usize)
        .saturating_sub(title.chars().count() + right.chars().count() + 4);

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match app.route {
        Route::Login => "[Enter] sign in | [Ctrl+R] register | [Esc] quit",
        Route::Register => "[Enter] submit | [Esc] back",
        Route::Dashboard => "[r]efresh | [l]ogout | [q]uit",
    };

    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None => String::new(),
    };
    let right_text = format!(" {} ", shortcuts);

    let width = area.width as usize;
    let padding_len = width
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(
        Paragraph::new(status_line).style(styles::status_bar_style()),
        area,
    );
}

/// A labelled input line; `masked` hides the contents.
fn field_line(label: &str, value: &str, focused: bool, masked: bool) -> Line<'static> {
    let shown: String = if masked {
        "*".repeat(value.chars().count())
    } else {
        value.to_string()
    };
    // Keep the tail visible once the value outgrows the field
    let skip = shown.chars().count().saturating_sub(FIELD_WIDTH);
    let visible: String = shown.chars().skip(skip).collect();
    let cursor = if focused { "▌" } else { "" };

    Line::from(vec![
        Span::styled(format!("  {:>10}: [", label), styles::muted_style()),
        Span::styled(
            format!("{:<width$}{}", visible, cursor, width = FIELD_WIDTH),
            styles::field_style(focused),
        ),
        Span::styled("]", styles::muted_style()),
    ])
}

fn button_line(label: &str, focused: bool, busy: bool) -> Line<'static> {
    let text = if busy {
        "   Working…   ".to_string()
    } else if focused {
        format!(" ▶ {:^8} ◀ ", label)
    } else {
        format!("   {:^8}   ", label)
    };
    Line::from(vec![
        Span::raw("                ["),
        Span::styled(text, styles::field_style(focused)),
        Span::raw("]"),
    ])
}

fn message_lines(lines: &mut Vec<Line<'static>>, notice: Option<&str>, error: Option<&str>) {
    if let Some(notice) = notice {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", notice),
            styles::success_style(),
        )));
    }
    if let Some(error) = error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }
}

fn render_dialog(frame: &mut Frame, lines: Vec<Line<'static>>) {
    let height = lines.len() as u16 + 2;
    let area = centered_rect_fixed(DIALOG_WIDTH, height, frame.area());

    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_login(frame: &mut Frame, app: &App) {
    let mut lines = logo_lines();
    lines.push(Line::from(""));
    lines.push(field_line(
        "Email",
        &app.login_email,
        app.login_focus == LoginFocus::Email,
        false,
    ));
    lines.push(field_line(
        "Password",
        &app.login_password,
        app.login_focus == LoginFocus::Password,
        true,
    ));
    lines.push(Line::from(""));
    lines.push(button_line(
        "Sign in",
        app.login_focus == LoginFocus::Button,
        app.login_pending,
    ));
    message_lines(&mut lines, app.notice.as_deref(), app.login_error.as_deref());

    render_dialog(frame, lines);
}

fn render_register(frame: &mut Frame, app: &App) {
    let form = &app.register;
    let mut lines = logo_lines();
    lines.push(Line::from(""));
    lines.push(field_line("Name", &form.name, form.focus == RegisterFocus::Name, false));
    lines.push(field_line("Email", &form.email, form.focus == RegisterFocus::Email, false));
    lines.push(field_line(
        "Password",
        &form.password,
        form.focus == RegisterFocus::Password,
        true,
    ));
    lines.push(field_line(
        "Confirm",
        &form.confirm,
        form.focus == RegisterFocus::Confirm,
        true,
    ));
    lines.push(Line::from(""));
    lines.push(button_line(
        "Register",
        form.focus == RegisterFocus::Button,
        form.pending,
    ));
    message_lines(&mut lines, None, form.error.as_deref());

    render_dialog(frame, lines);
}

fn render_pending(frame: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        "Loading…",
        styles::muted_style(),
    )));
    frame.render_widget(paragraph, centered_rect_fixed(10, 1, area));
}

fn summary_lines(summary: &Summary) -> Vec<Line<'static>> {
    let row = |label: &str, value: String, style: Style| {
        Line::from(vec![
            Span::styled(format!("  {:<14}", label), styles::muted_style()),
            Span::styled(value, style),
        ])
    };
    vec![
        row(
            "Income",
            format_amount(summary.total_income),
            styles::amount_style(true),
        ),
        row(
            "Expenses",
            format_amount(summary.total_expenses),
            styles::amount_style(false),
        ),
        row(
            "Balance",
            format_amount(summary.balance),
            styles::amount_style(!summary.is_negative()),
        ),
        row(
            "Transactions",
            summary.transaction_count.to_string(),
            styles::help_desc_style(),
        ),
    ]
}

fn render_dashboard(frame: &mut Frame, app: &App, view: &DashboardView, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(format!(" {}", view.greeting), styles::title_style())),
        Line::from(Span::styled(format!(" {}", view.email), styles::muted_style())),
        Line::from(""),
    ];

    match (&app.summary, &app.summary_error) {
        (_, Some(error)) => lines.push(Line::from(Span::styled(
            format!("  {}", error),
            styles::error_style(),
        ))),
        (Some(summary), None) => lines.extend(summary_lines(summary)),
        (None, None) => lines.push(Line::from(Span::styled(
            "  Loading summary…",
            styles::muted_style(),
        ))),
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false))
        .title(Span::styled(" Overview ", styles::highlight_style()));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(DIALOG_WIDTH, 20, frame.area());

    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");
    let key = |k: &str, desc: &str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", k), styles::help_key_style()),
            Span::styled(desc.to_string(), styles::help_desc_style()),
        ])
    };

    let mut help_text = logo_lines();
    help_text.push(Line::from(Span::styled(
        format!("         version {}", version),
        styles::muted_style(),
    )));
    help_text.push(Line::from(Span::styled(
        format!("  Server: {}", app.config.api_base()),
        styles::muted_style(),
    )));
    help_text.push(Line::from(""));
    help_text.push(Line::from(Span::styled(" Forms", styles::highlight_style())));
    help_text.push(key("Tab/↑/↓", "Move between fields"));
    help_text.push(key("Enter", "Submit"));
    help_text.push(key("Ctrl+R", "Create an account"));
    help_text.push(key("Esc", "Back / quit"));
    help_text.push(Line::from(""));
    help_text.push(Line::from(Span::styled(" Dashboard", styles::highlight_style())));
    help_text.push(key("r", "Refresh summary"));
    help_text.push(key("l", "Sign out"));
    help_text.push(key("q", "Quit"));
    help_text.push(Line::from(""));
    help_text.push(Line::from(Span::styled(
        "  Press any key to close",
        styles::muted_style(),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let mut lines = logo_lines();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "   Are you sure you want to quit?",
        styles::highlight_style(),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("   Press ", styles::muted_style()),
        Span::styled("[Y]", styles::help_key_style()),
        Span::styled(" to quit, ", styles::muted_style()),
        Span::styled("[N]", styles::help_key_style()),
        Span::styled(" to cancel", styles::muted_style()),
    ]));

    render_dialog(frame, lines);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_fixed() {
        let outer = Rect::new(0, 0, 100, 40);
        let rect = centered_rect_fixed(52, 10, outer);
        assert_eq!(rect, Rect::new(24, 15, 52, 10));
    }

    #[test]
    fn test_centered_rect_clamps_to_area() {
        let outer = Rect::new(0, 0, 30, 5);
        let rect = centered_rect_fixed(52, 10, outer);
        assert_eq!(rect.width, 30);
        assert_eq!(rect.height, 5);
    }

    #[test]
    fn test_masked_field_hides_secret() {
        let line = field_line("Password", "hunter22", false, true);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(!text.contains("hunter22"));
        assert!(text.contains("********"));
    }
}
