use crate::app::dashboard::FetchRequest;
use crate::ui::App;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

pub(super) fn handle_command_line(app: &mut App, key: KeyEvent) -> Vec<FetchRequest> {
    match key.code {
        KeyCode::Esc => app.close_command_line(),
        KeyCode::Enter => return app.submit_command(),
        KeyCode::Backspace => {
            if app.command_line.pop().is_none() {
                app.close_command_line();
            }
        }
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => match c {
            'c' => {
                app.close_command_line();
                app.should_quit = true;
            }
            'u' => app.command_line.clear(),
            // Other chords are not text
            _ => {}
        },
        KeyCode::Char(c) => app.command_line.push(c),
        _ => {}
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::command::CommandRegistry;
    use crate::app::dashboard::Dashboard;
    use crate::sources::SourceKind;
    use crate::ui::InputMode;
    use chrono::{TimeZone, Utc};

    fn app() -> App {
        let since = Utc.timestamp_opt(0, 0).unwrap();
        let mut app = App::new(
            Dashboard::for_kinds(&SourceKind::ALL, since),
            CommandRegistry::new(),
        );
        app.open_command_line();
        app
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_command_line(app, KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    fn press(app: &mut App, code: KeyCode) -> Vec<FetchRequest> {
        handle_command_line(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_enter_submits_branch_filter() {
        let mut app = app();
        type_text(&mut app, "git branch main");
        let requests = press(&mut app, KeyCode::Enter);

        assert_eq!(requests.len(), 1);
        assert!(requests[0].query.filter.branches().contains("main"));
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_escape_discards_line() {
        let mut app = app();
        type_text(&mut app, "git author jane");
        assert!(press(&mut app, KeyCode::Esc).is_empty());
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.command_line.is_empty());
        assert!(app.dashboard.filter().is_empty());
    }

    #[test]
    fn test_ctrl_c_quits_instead_of_typing() {
        let mut app = app();
        type_text(&mut app, "git");
        let requests =
            handle_command_line(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(requests.is_empty());
        assert!(app.should_quit);
        assert!(app.command_line.is_empty());
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_ctrl_u_clears_and_other_chords_are_ignored() {
        let mut app = app();
        type_text(&mut app, "git author");
        handle_command_line(&mut app, KeyEvent::new(KeyCode::Char('w'), KeyModifiers::CONTROL));
        assert_eq!(app.command_line, "git author");
        handle_command_line(&mut app, KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert!(app.command_line.is_empty());
        assert!(!app.should_quit);
    }

    #[test]
    fn test_backspace_on_empty_line_closes() {
        let mut app = app();
        type_text(&mut app, "n");
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.input_mode, InputMode::Command);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.input_mode, InputMode::Normal);
    }
}
