//! Dashboard panels
//!
//! Each panel owns its load state and the last snapshot it accepted. The three
//! concrete panels share one list implementation and differ only in how a row
//! is drawn.

use crate::app::panel::{PanelState, PanelStatus};
use crate::commits::CommitRecord;
use crate::sources::{Issue, Message, SourceKind};
use crate::ui::theme::Theme;
use crate::util::pad_to_width;
use chrono::{DateTime, Utc};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

/// A completed fetch's data, tagged by the panel it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelPayload {
    Commits(Vec<CommitRecord>),
    Issues(Vec<Issue>),
    Messages(Vec<Message>),
}

impl PanelPayload {
    pub fn kind(&self) -> SourceKind {
        match self {
            PanelPayload::Commits(_) => SourceKind::Commits,
            PanelPayload::Issues(_) => SourceKind::Issues,
            PanelPayload::Messages(_) => SourceKind::Messages,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PanelPayload::Commits(rows) => rows.len(),
            PanelPayload::Issues(rows) => rows.len(),
            PanelPayload::Messages(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait Panel {
    fn kind(&self) -> SourceKind;
    fn state(&self) -> &PanelState;
    fn state_mut(&mut self) -> &mut PanelState;

    fn is_focused(&self) -> bool;
    fn focus(&mut self);
    fn blur(&mut self);

    /// Replace the snapshot. Returns false for a payload of another kind.
    fn update(&mut self, payload: PanelPayload) -> bool;

    fn row_count(&self) -> usize;
    fn scroll_by(&mut self, delta: isize);

    fn view(&self, frame: &mut Frame, area: Rect, now: DateTime<Utc>);
}

/// How one kind of record is drawn as a panel row
pub trait PanelRow: Sized {
    const KIND: SourceKind;

    fn from_payload(payload: PanelPayload) -> Option<Vec<Self>>;

    fn line(&self, width: usize, now: DateTime<Utc>) -> Line<'static>;
}

pub struct ListPanel<T> {
    state: PanelState,
    rows: Vec<T>,
    scroll: usize,
    focused: bool,
}

pub type CommitsPanel = ListPanel<CommitRecord>;
pub type IssuesPanel = ListPanel<Issue>;
pub type MessagesPanel = ListPanel<Message>;

impl<T> Default for ListPanel<T> {
    fn default() -> Self {
        Self {
            state: PanelState::new(),
            rows: Vec::new(),
            scroll: 0,
            focused: false,
        }
    }
}

impl<T: PanelRow> ListPanel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }
}

/// The panel that displays `kind`
pub fn panel_for(kind: SourceKind) -> Box<dyn Panel> {
    match kind {
        SourceKind::Commits => Box::new(CommitsPanel::new()),
        SourceKind::Issues => Box::new(IssuesPanel::new()),
        SourceKind::Messages => Box::new(MessagesPanel::new()),
    }
}

impl<T: PanelRow> Panel for ListPanel<T> {
    fn kind(&self) -> SourceKind {
        T::KIND
    }

    fn state(&self) -> &PanelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PanelState {
        &mut self.state
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn blur(&mut self) {
        self.focused = false;
    }

    fn update(&mut self, payload: PanelPayload) -> bool {
        match T::from_payload(payload) {
            Some(rows) => {
                self.rows = rows;
                self.scroll = 0;
                true
            }
            None => false,
        }
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn scroll_by(&mut self, delta: isize) {
        let max = self.rows.len().saturating_sub(1);
        self.scroll = self.scroll.saturating_add_signed(delta).min(max);
    }

    fn view(&self, frame: &mut Frame, area: Rect, now: DateTime<Utc>) {
        let title = match self.state.status() {
            PanelStatus::Loaded => format!(" {} ({}) ", T::KIND.label(), self.rows.len()),
            _ => format!(" {} ", T::KIND.label()),
        };
        let block = Block::default()
            .title(title)
            .title_style(Theme::title())
            .borders(Borders::ALL)
            .border_style(if self.focused {
                Theme::border_active()
            } else {
                Theme::border()
            })
            .style(Theme::panel_bg());
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        match self.state.status() {
            PanelStatus::Idle => {
                frame.render_widget(Paragraph::new("Waiting...").style(Theme::text_dim()), inner);
            }
            PanelStatus::Loading => {
                let progress = self.state.progress().clamp(0.0, 1.0);
                let gauge = Gauge::default()
                    .gauge_style(Theme::gauge())
                    .ratio(progress)
                    .label(format!("Loading {}%", (progress * 100.0) as u8));
                let bar = Rect {
                    height: 1,
                    ..inner
                };
                frame.render_widget(gauge, bar);
            }
            PanelStatus::Error => {
                let message = self.state.error().unwrap_or("fetch failed");
                let text = vec![
                    Line::from(Span::styled(
                        format!("{} {}", Theme::CROSS_MARK, message),
                        Theme::error(),
                    )),
                    Line::default(),
                    Line::from(vec![
                        Span::styled("press ", Theme::text_dim()),
                        Span::styled("r", Theme::key()),
                        Span::styled(" to retry", Theme::text_dim()),
                    ]),
                ];
                frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
            }
            PanelStatus::Loaded if self.rows.is_empty() => {
                frame.render_widget(
                    Paragraph::new("Nothing new in this window").style(Theme::text_muted()),
                    inner,
                );
            }
            PanelStatus::Loaded => {
                let width = inner.width as usize;
                let items: Vec<ListItem> = self
                    .rows
                    .iter()
                    .skip(self.scroll)
                    .take(inner.height as usize)
                    .map(|row| ListItem::new(row.line(width, now)))
                    .collect();
                frame.render_widget(List::new(items).style(Theme::text()), inner);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  ROWS
// ═══════════════════════════════════════════════════════════════════════════

impl PanelRow for CommitRecord {
    const KIND: SourceKind = SourceKind::Commits;

    fn from_payload(payload: PanelPayload) -> Option<Vec<Self>> {
        match payload {
            PanelPayload::Commits(rows) => Some(rows),
            _ => None,
        }
    }

    fn line(&self, width: usize, now: DateTime<Utc>) -> Line<'static> {
        let ago = format_time_ago(now, self.timestamp());
        let fixed = [
            (pad_to_width(self.short_hash(), 8), Theme::text_dim()),
            (pad_to_width(self.branch(), 14), Theme::text_muted()),
            (pad_to_width(self.author(), 16), Theme::bold()),
        ];
        row_line(fixed, self.summary(), &ago, width)
    }
}

impl PanelRow for Issue {
    const KIND: SourceKind = SourceKind::Issues;

    fn from_payload(payload: PanelPayload) -> Option<Vec<Self>> {
        match payload {
            PanelPayload::Issues(rows) => Some(rows),
            _ => None,
        }
    }

    fn line(&self, width: usize, now: DateTime<Utc>) -> Line<'static> {
        let ago = format_time_ago(now, self.updated);
        let assignee = self.assignee.as_deref().unwrap_or("unassigned");
        let fixed = [
            (pad_to_width(&self.key, 10), Theme::bold()),
            (pad_to_width(&self.status, 13), Theme::text_muted()),
            (pad_to_width(assignee, 16), Theme::text_dim()),
        ];
        row_line(fixed, &self.summary, &ago, width)
    }
}

impl PanelRow for Message {
    const KIND: SourceKind = SourceKind::Messages;

    fn from_payload(payload: PanelPayload) -> Option<Vec<Self>> {
        match payload {
            PanelPayload::Messages(rows) => Some(rows),
            _ => None,
        }
    }

    fn line(&self, width: usize, now: DateTime<Utc>) -> Line<'static> {
        let ago = format_time_ago(now, self.timestamp);
        let fixed = [
            (pad_to_width(&format!("#{}", self.channel), 14), Theme::text_muted()),
            (pad_to_width(&self.user, 16), Theme::bold()),
        ];
        let text = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        row_line(fixed, &text, &ago, width)
    }
}

/// Fixed-width leading columns, a flexible middle column, and a right-aligned
/// age. The middle column absorbs whatever width is left.
fn row_line<const N: usize>(
    fixed: [(String, Style); N],
    text: &str,
    ago: &str,
    width: usize,
) -> Line<'static> {
    let mut spans = Vec::with_capacity(N * 2 + 3);
    let mut used = 0;
    for (cell, style) in fixed {
        if used + cell.width() + 1 > width {
            break;
        }
        used += cell.width() + 1;
        spans.push(Span::styled(cell, style));
        spans.push(Span::raw(" "));
    }

    let tail = ago.width() + 1;
    let flexible = width.saturating_sub(used + tail);
    spans.push(Span::styled(pad_to_width(text, flexible), Theme::text()));
    if used + flexible + tail <= width {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(ago.to_string(), Theme::text_dim()));
    }
    Line::from(spans)
}

/// Compact relative age: `just now`, `5m`, `3h`, `2d`, `3w`, `4mo`, `1y`
pub fn format_time_ago(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    let minutes = secs / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if minutes == 0 {
        "just now".to_string()
    } else if hours == 0 {
        format!("{}m", minutes)
    } else if days == 0 {
        format!("{}h", hours)
    } else if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_format_time_ago() {
        let now = at(10_000_000);
        assert_eq!(format_time_ago(now, now), "just now");
        assert_eq!(format_time_ago(now, now - Duration::minutes(5)), "5m");
        assert_eq!(format_time_ago(now, now - Duration::hours(3)), "3h");
        assert_eq!(format_time_ago(now, now - Duration::days(2)), "2d");
        assert_eq!(format_time_ago(now, now - Duration::days(15)), "2w");
        assert_eq!(format_time_ago(now, now - Duration::days(400)), "1y");
        // Clock skew never yields a negative age
        assert_eq!(format_time_ago(now, now + Duration::hours(1)), "just now");
    }

    #[test]
    fn test_update_rejects_foreign_payload() {
        let mut panel = CommitsPanel::new();
        assert!(!panel.update(PanelPayload::Issues(Vec::new())));
        assert!(panel.update(PanelPayload::Commits(vec![CommitRecord::new(
            "abc1234def",
            "main",
            "Jane",
            "Fix",
            at(0)
        )])));
        assert_eq!(panel.row_count(), 1);
    }

    #[test]
    fn test_focus_and_blur() {
        let mut panel = panel_for(SourceKind::Messages);
        assert_eq!(panel.kind(), SourceKind::Messages);
        assert!(!panel.is_focused());
        panel.focus();
        assert!(panel.is_focused());
        panel.blur();
        assert!(!panel.is_focused());
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut panel = IssuesPanel::new();
        let issues = (0..3)
            .map(|i| Issue {
                key: format!("OPS-{}", i),
                summary: "s".into(),
                status: "Open".into(),
                assignee: None,
                updated: at(i),
            })
            .collect();
        panel.update(PanelPayload::Issues(issues));
        panel.scroll_by(10);
        assert_eq!(panel.scroll(), 2);
        panel.scroll_by(-5);
        assert_eq!(panel.scroll(), 0);
    }

    #[test]
    fn test_commit_row_fits_width() {
        let commit = CommitRecord::new(
            "abc1234def",
            "feature/very-long-branch-name",
            "Jane Doe",
            "Add login flow\n\nDetails",
            at(0),
        );
        let line = commit.line(80, at(3600));
        let text = line_text(&line);
        assert!(text.starts_with("abc1234 "));
        assert!(text.contains("Add login flow"));
        assert!(!text.contains("Details"));
        assert!(text.ends_with("1h"));
        assert!(text.width() <= 80);
    }

    #[test]
    fn test_narrow_row_never_overflows() {
        let message = Message {
            channel: "general".into(),
            user: "Jane".into(),
            text: "hello\nthere".into(),
            timestamp: at(0),
        };
        for width in [0, 5, 12, 20, 40] {
            let text = line_text(&message.line(width, at(60)));
            assert!(text.width() <= width, "width {} got {:?}", width, text);
        }
    }
}
