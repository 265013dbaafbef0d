pub mod background;
pub mod bootstrap;
pub mod command;
pub mod dashboard;
pub mod focus;
pub mod input;
pub mod messages;
pub mod panel;
pub mod runtime;

pub use messages::BackgroundMessage;
pub use runtime::run_tui;

use crate::app::dashboard::FetchRequest;
use crate::sources::Sources;
use std::sync::mpsc;

pub struct RuntimeContext<'a> {
    pub sources: &'a Sources,
    pub tx: &'a mpsc::Sender<BackgroundMessage>,
}

impl RuntimeContext<'_> {
    /// Spawn every requested fetch
    pub fn dispatch(&self, requests: Vec<FetchRequest>) {
        for request in requests {
            background::spawn_fetch(self.tx.clone(), self.sources, request);
        }
    }
}
