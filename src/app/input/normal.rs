use crate::app::dashboard::FetchRequest;
use crate::ui::App;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Rows moved by PageUp/PageDown
const PAGE: isize = 10;

pub(super) fn handle_normal_mode(app: &mut App, key: KeyEvent) -> Vec<FetchRequest> {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true
        }
        KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => app.dashboard.focus_next(),
        KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => app.dashboard.focus_prev(),
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            app.dashboard.focus_select(index);
        }
        KeyCode::Down | KeyCode::Char('j') => scroll_focused(app, 1),
        KeyCode::Up | KeyCode::Char('k') => scroll_focused(app, -1),
        KeyCode::PageDown => scroll_focused(app, PAGE),
        KeyCode::PageUp => scroll_focused(app, -PAGE),
        KeyCode::Char('r') => return app.dashboard.retry_focused(),
        KeyCode::Char(':') | KeyCode::Char('/') => app.open_command_line(),
        _ => {}
    }
    Vec::new()
}

fn scroll_focused(app: &mut App, delta: isize) {
    if let Some(panel) = app.dashboard.focused_panel_mut() {
        panel.scroll_by(delta);
    }
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
        App::new(
            Dashboard::for_kinds(&SourceKind::ALL, since),
            CommandRegistry::new(),
        )
    }

    fn press(app: &mut App, code: KeyCode) -> Vec<FetchRequest> {
        handle_normal_mode(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_tab_cycles_focus() {
        let mut app = app();
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.dashboard.focused_index(), 1);
        press(&mut app, KeyCode::BackTab);
        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.dashboard.focused_index(), 2);
        press(&mut app, KeyCode::Char('1'));
        assert_eq!(app.dashboard.focused_index(), 0);
    }

    #[test]
    fn test_retry_reissues_focused_panel() {
        let mut app = app();
        press(&mut app, KeyCode::Tab);
        let requests = press(&mut app, KeyCode::Char('r'));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, SourceKind::Issues);
    }

    #[test]
    fn test_colon_opens_command_line_and_q_quits() {
        let mut app = app();
        press(&mut app, KeyCode::Char(':'));
        assert_eq!(app.input_mode, InputMode::Command);

        let mut app = self::app();
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
