//! Background fetch tasks
//!
//! Channel sends use `let _ =`: the receiver only goes away while the app is
//! shutting down, when nobody is listening for the result anyway.

use crate::app::dashboard::{Applied, FetchRequest};
use crate::app::messages::{BackgroundMessage, FetchCompletion};
use crate::commits::SourceQuery;
use crate::sources::{
    CommitSource, FetchError, IssueSource, MessageSource, SourceKind, Sources,
};
use crate::ui::panels::PanelPayload;
use crate::ui::App;
use crate::util::truncate;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::mpsc;
use tracing::error;

pub fn drain_messages(app: &mut App, rx: &mpsc::Receiver<BackgroundMessage>) {
    while let Ok(msg) = rx.try_recv() {
        match msg {
            BackgroundMessage::FetchFinished(completion) => {
                let kind = completion.kind;
                if app.dashboard.apply(completion) != Applied::Failed {
                    continue;
                }
                let detail = app
                    .dashboard
                    .panel(kind)
                    .and_then(|p| p.state().error())
                    .map(|e| truncate(e, 60))
                    .unwrap_or_default();
                app.show_error(&format!("{} fetch failed: {}", kind, detail));
            }
        }
    }
}

/// Run one fetch in the background and report its completion on `tx`
pub fn spawn_fetch(tx: mpsc::Sender<BackgroundMessage>, sources: &Sources, request: FetchRequest) {
    let FetchRequest {
        kind,
        ticket,
        query,
    } = request;
    let sources = sources.clone();
    let result_tx = tx.clone();

    let on_panic = move |detail: String| {
        BackgroundMessage::FetchFinished(FetchCompletion {
            kind,
            ticket,
            result: Err(FetchError::Api(format!(
                "{} fetch crashed unexpectedly: {}",
                kind, detail
            ))),
        })
    };

    spawn_background(tx, kind.label(), on_panic, async move {
        let result = fetch(&sources, kind, &query).await;
        let _ = result_tx.send(BackgroundMessage::FetchFinished(FetchCompletion {
            kind,
            ticket,
            result,
        }));
    });
}

/// Fetch one panel's data from whichever source backs it
pub async fn fetch(
    sources: &Sources,
    kind: SourceKind,
    query: &SourceQuery,
) -> Result<PanelPayload, FetchError> {
    let missing = || FetchError::Config(format!("no {} source configured", kind));
    match kind {
        SourceKind::Commits => {
            let source = sources.commits.as_ref().ok_or_else(missing)?;
            source.collect(query).await.map(PanelPayload::Commits)
        }
        SourceKind::Issues => {
            let source = sources.issues.as_ref().ok_or_else(missing)?;
            source
                .issues_since(query.since)
                .await
                .map(PanelPayload::Issues)
        }
        SourceKind::Messages => {
            let source = sources.messages.as_ref().ok_or_else(missing)?;
            source
                .messages_since(query.since)
                .await
                .map(PanelPayload::Messages)
        }
    }
}

/// Spawn `fut` on the runtime. A panic inside it is caught, logged, and
/// turned into the message built by `on_panic`.
pub fn spawn_background<F, P>(
    tx: mpsc::Sender<BackgroundMessage>,
    task_name: &'static str,
    on_panic: P,
    fut: F,
) where
    F: Future<Output = ()> + Send + 'static,
    P: FnOnce(String) -> BackgroundMessage + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
            let detail = if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            };
            error!(task = task_name, detail = %detail, "background task panicked");
            let _ = tx.send(on_panic(detail));
        }
    });
}
