//! Terminal UI state and rendering entry point

pub mod panels;
mod render;
pub mod theme;

pub use render::render;

use crate::app::command::{CommandOutcome, CommandRegistry};
use crate::app::dashboard::{Dashboard, FetchRequest};
use crate::sources::SourceKind;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Typing on the `:` command line
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Error,
}

impl ToastKind {
    /// Duration in seconds before toast expires
    pub fn duration_secs(&self) -> u64 {
        match self {
            ToastKind::Info => 3,
            ToastKind::Success => 3,
            ToastKind::Error => 8, // Errors stay longer
        }
    }
}

/// Toast notification
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub created_at: Instant,
    pub kind: ToastKind,
}

impl Toast {
    pub fn new(message: &str, kind: ToastKind) -> Self {
        Self {
            message: message.to_string(),
            created_at: Instant::now(),
            kind,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed().as_secs() >= self.kind.duration_secs()
    }
}

/// Everything the event loop mutates and the renderer reads
pub struct App {
    pub dashboard: Dashboard,
    pub registry: CommandRegistry,
    pub input_mode: InputMode,
    pub command_line: String,
    pub toast: Option<Toast>,
    pub should_quit: bool,
}

impl App {
    pub fn new(dashboard: Dashboard, registry: CommandRegistry) -> Self {
        Self {
            dashboard,
            registry,
            input_mode: InputMode::Normal,
            command_line: String::new(),
            toast: None,
            should_quit: false,
        }
    }

    pub fn show_toast(&mut self, message: &str) {
        self.toast = Some(Toast::new(message, ToastKind::Info));
    }

    pub fn show_error(&mut self, message: &str) {
        self.toast = Some(Toast::new(message, ToastKind::Error));
    }

    pub fn clear_expired_toast(&mut self) {
        if self.toast.as_ref().is_some_and(Toast::is_expired) {
            self.toast = None;
        }
    }

    pub fn open_command_line(&mut self) {
        self.input_mode = InputMode::Command;
        self.command_line.clear();
    }

    pub fn close_command_line(&mut self) {
        self.input_mode = InputMode::Normal;
        self.command_line.clear();
    }

    /// Parse and run whatever is on the command line
    pub fn submit_command(&mut self) -> Vec<FetchRequest> {
        let line = std::mem::take(&mut self.command_line);
        self.input_mode = InputMode::Normal;
        let outcome = self.registry.parse(&line);
        self.apply_outcome(outcome)
    }

    pub fn apply_outcome(&mut self, outcome: CommandOutcome) -> Vec<FetchRequest> {
        match outcome {
            CommandOutcome::None => Vec::new(),
            CommandOutcome::Quit => {
                self.should_quit = true;
                Vec::new()
            }
            CommandOutcome::Error(message) => {
                self.show_error(&message);
                Vec::new()
            }
            CommandOutcome::SetAuthors(_)
            | CommandOutcome::SetBranches(_)
            | CommandOutcome::ClearFilter(_)
                if !self.dashboard.has_panel(SourceKind::Commits) =>
            {
                self.show_error("No Git source configured");
                Vec::new()
            }
            outcome @ (CommandOutcome::SetAuthors(_)
            | CommandOutcome::SetBranches(_)
            | CommandOutcome::ClearFilter(_)) => {
                let requests = self.dashboard.handle(outcome);
                let message = format!("Filter: {}", self.dashboard.filter());
                self.show_toast(&message);
                requests
            }
            outcome @ CommandOutcome::SetSince(_) => {
                let requests = self.dashboard.handle(outcome);
                let message = format!(
                    "Showing activity since {}",
                    self.dashboard
                        .since()
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d")
                );
                self.show_toast(&message);
                requests
            }
            outcome @ CommandOutcome::Navigate(_) => self.dashboard.handle(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn app(kinds: &[SourceKind]) -> App {
        let since = Utc.timestamp_opt(0, 0).unwrap();
        App::new(Dashboard::for_kinds(kinds, since), CommandRegistry::new())
    }

    #[test]
    fn test_submit_command_runs_filter() {
        let mut app = app(&SourceKind::ALL);
        app.open_command_line();
        app.command_line.push_str("git author jane");
        let requests = app.submit_command();

        assert_eq!(requests.len(), 1);
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.command_line.is_empty());
        let toast = app.toast.as_ref().unwrap();
        assert_eq!(toast.kind, ToastKind::Info);
        assert!(toast.message.contains("jane"));
    }

    #[test]
    fn test_bad_command_shows_error_toast() {
        let mut app = app(&SourceKind::ALL);
        app.command_line.push_str("void sd tomorrow-ish");
        assert!(app.submit_command().is_empty());
        assert_eq!(app.toast.as_ref().unwrap().kind, ToastKind::Error);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_git_command_without_git_panel() {
        let mut app = app(&[SourceKind::Messages]);
        let requests = app.apply_outcome(CommandOutcome::SetBranches(vec!["main".into()]));
        assert!(requests.is_empty());
        assert!(app.toast.unwrap().message.contains("No Git source"));
    }

    #[test]
    fn test_quit_command() {
        let mut app = app(&SourceKind::ALL);
        app.command_line.push_str(":quit");
        app.submit_command();
        assert!(app.should_quit);
    }

    #[test]
    fn test_toast_expiry() {
        let fresh = Toast::new("hi", ToastKind::Info);
        assert!(!fresh.is_expired());
    }
}
