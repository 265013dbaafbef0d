//! Key handling
//!
//! Handlers mutate [`App`] and hand any fetches the change requires to the
//! runtime context, which spawns them.

use crate::app::RuntimeContext;
use crate::ui::{App, InputMode};
use crossterm::event::KeyEvent;

mod command_line;
mod normal;

use command_line::handle_command_line;
use normal::handle_normal_mode;

/// Main key event handler - dispatches to mode-specific handlers
pub fn handle_key_event(app: &mut App, key: KeyEvent, ctx: &RuntimeContext) {
    let requests = match app.input_mode {
        InputMode::Command => handle_command_line(app, key),
        InputMode::Normal => handle_normal_mode(app, key),
    };
    ctx.dispatch(requests);
}
