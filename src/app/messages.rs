use crate::app::panel::FetchTicket;
use crate::sources::{FetchError, SourceKind};
use crate::ui::panels::PanelPayload;

/// A fetch that has finished, successfully or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCompletion {
    pub kind: SourceKind,
    pub ticket: FetchTicket,
    pub result: Result<PanelPayload, FetchError>,
}

/// Messages from background tasks to the main UI thread
#[derive(Debug)]
pub enum BackgroundMessage {
    FetchFinished(FetchCompletion),
}
