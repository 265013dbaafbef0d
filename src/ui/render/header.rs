use crate::app::panel::PanelStatus;
use crate::ui::theme::Theme;
use crate::ui::App;
use chrono::Local;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

pub(super) fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let dashboard = &app.dashboard;
    let sep = format!("  {}  ", Theme::DOT_SEPARATOR);
    let since = dashboard.since().with_timezone(&Local).format("%Y-%m-%d");
    let loading = dashboard
        .panels()
        .iter()
        .filter(|p| p.state().status() == PanelStatus::Loading)
        .count();

    let mut spans = vec![
        Span::styled(
            "   void",
            Style::default()
                .fg(Theme::WHITE)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(sep.clone(), Theme::text_dim()),
        Span::styled("since ", Theme::text_dim()),
        Span::styled(since.to_string(), Theme::text()),
        Span::styled(sep.clone(), Theme::text_dim()),
        Span::styled("filter ", Theme::text_dim()),
        Span::styled(dashboard.filter().to_string(), Theme::text()),
        Span::styled(sep.clone(), Theme::text_dim()),
        Span::styled(
            format!("{} panels", dashboard.panels().len()),
            Theme::text_muted(),
        ),
    ];
    if loading > 0 {
        spans.push(Span::styled(sep, Theme::text_dim()));
        spans.push(Span::styled(
            format!("{} loading", loading),
            Style::default().fg(Theme::YELLOW),
        ));
    }

    let lines = vec![Line::from(""), Line::from(spans)];
    let header = Paragraph::new(lines).style(Style::default().bg(Theme::BG));
    frame.render_widget(header, area);
}
