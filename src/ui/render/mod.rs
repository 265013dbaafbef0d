mod footer;
mod header;
mod toast;

use crate::ui::theme::Theme;
use crate::ui::App;
use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::Block,
    Frame,
};

use footer::render_footer;
use header::render_header;
use toast::render_toast;

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Clear with dark background
    frame.render_widget(Block::default().style(Style::default().bg(Theme::BG)), area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Panels
            Constraint::Length(3), // Command line + hints
        ])
        .split(area);

    render_header(frame, layout[0], app);
    render_panels(frame, layout[1], app);
    render_footer(frame, layout[2], app);

    if let Some(toast) = &app.toast {
        render_toast(frame, toast);
    }
}

/// Active panels side by side, equal widths
fn render_panels(frame: &mut Frame, area: Rect, app: &App) {
    let panels = app.dashboard.panels();
    if panels.is_empty() {
        return;
    }
    let constraints = vec![Constraint::Ratio(1, panels.len() as u32); panels.len()];
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    let now = Utc::now();
    for (panel, column) in panels.iter().zip(columns.iter()) {
        panel.view(frame, *column, now);
    }
}
