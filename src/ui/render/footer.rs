use crate::ui::theme::Theme;
use crate::ui::{App, InputMode};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

const HINTS: &[(&str, &str)] = &[
    ("Tab", "next"),
    ("S-Tab", "prev"),
    ("j/k", "scroll"),
    ("r", "retry"),
    (":", "command"),
    ("q", "quit"),
];

pub(super) fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let line = match app.input_mode {
        InputMode::Command => Line::from(vec![
            Span::styled(format!("  {} :", Theme::KEY_PROMPT), Theme::key()),
            Span::styled(app.command_line.clone(), Theme::text()),
            Span::styled("█", Theme::text_muted()),
        ]),
        InputMode::Normal => {
            let mut spans = vec![Span::raw("  ")];
            for (key, label) in HINTS {
                spans.push(Span::styled(*key, Theme::key()));
                spans.push(Span::styled(format!(" {}   ", label), Theme::text_dim()));
            }
            Line::from(spans)
        }
    };

    let footer = Paragraph::new(vec![Line::from(""), line]).style(Style::default().bg(Theme::BG));
    frame.render_widget(footer, area);
}
