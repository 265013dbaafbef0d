//! Dashboard orchestration
//!
//! Owns the active panels, the shared start date and the commit filter. Every
//! state change returns the fetches it needs; the runtime spawns them. Nothing
//! here touches the network or the terminal.

use crate::app::command::{CommandOutcome, Direction};
use crate::app::focus::FocusNavigator;
use crate::app::messages::FetchCompletion;
use crate::app::panel::FetchTicket;
use crate::commits::{FilterField, FilterSpec, SourceQuery};
use crate::sources::SourceKind;
use crate::ui::panels::{panel_for, Panel};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Instant;
use tracing::{info, warn};

/// One fetch the runtime should start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub kind: SourceKind,
    pub ticket: FetchTicket,
    pub query: SourceQuery,
}

/// What happened to a completion handed to [`Dashboard::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Loaded(usize),
    Failed,
    /// A newer fetch was issued for the panel since this one started
    Stale,
    NoPanel,
}

pub struct Dashboard {
    panels: Vec<Box<dyn Panel>>,
    focus: FocusNavigator,
    since: DateTime<Utc>,
    filter: FilterSpec,
}

impl Dashboard {
    /// Panels are shown in the given order; the first one starts focused
    pub fn new(mut panels: Vec<Box<dyn Panel>>, since: DateTime<Utc>) -> Self {
        if let Some(first) = panels.first_mut() {
            first.focus();
        }
        Self {
            focus: FocusNavigator::new(panels.len()),
            panels,
            since,
            filter: FilterSpec::new(),
        }
    }

    pub fn for_kinds(kinds: &[SourceKind], since: DateTime<Utc>) -> Self {
        Self::new(kinds.iter().map(|kind| panel_for(*kind)).collect(), since)
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    pub fn panels(&self) -> &[Box<dyn Panel>] {
        &self.panels
    }

    pub fn focused_index(&self) -> usize {
        self.focus.index()
    }

    pub fn focused_panel(&self) -> Option<&dyn Panel> {
        self.panels.get(self.focus.index()).map(|p| p.as_ref())
    }

    pub fn focused_panel_mut(&mut self) -> Option<&mut Box<dyn Panel>> {
        self.panels.get_mut(self.focus.index())
    }

    pub fn panel(&self, kind: SourceKind) -> Option<&dyn Panel> {
        self.panels
            .iter()
            .find(|p| p.kind() == kind)
            .map(|p| p.as_ref())
    }

    pub fn has_panel(&self, kind: SourceKind) -> bool {
        self.panel(kind).is_some()
    }

    // ═══════════════════════════════════════════════════════════════════════
    //  FETCH ISSUANCE
    // ═══════════════════════════════════════════════════════════════════════

    /// Initial load of every panel
    pub fn start(&mut self) -> Vec<FetchRequest> {
        self.issue_all()
    }

    /// New window for every panel
    pub fn set_since(&mut self, since: DateTime<Utc>) -> Vec<FetchRequest> {
        self.since = since;
        self.issue_all()
    }

    /// Replace the author constraint; the branch constraint is kept
    pub fn set_authors(&mut self, names: Vec<String>) -> Vec<FetchRequest> {
        self.filter = std::mem::take(&mut self.filter).with_authors(names);
        self.issue(SourceKind::Commits).into_iter().collect()
    }

    /// Replace the branch constraint; the author constraint is kept
    pub fn set_branches(&mut self, names: Vec<String>) -> Vec<FetchRequest> {
        self.filter = std::mem::take(&mut self.filter).with_branches(names);
        self.issue(SourceKind::Commits).into_iter().collect()
    }

    pub fn clear_filter(&mut self, field: FilterField) -> Vec<FetchRequest> {
        self.filter.clear(field);
        self.issue(SourceKind::Commits).into_iter().collect()
    }

    /// Re-issue the focused panel's fetch with the current date and filter
    pub fn retry_focused(&mut self) -> Vec<FetchRequest> {
        match self.focused_panel() {
            Some(panel) => {
                let kind = panel.kind();
                self.issue(kind).into_iter().collect()
            }
            None => Vec::new(),
        }
    }

    fn issue_all(&mut self) -> Vec<FetchRequest> {
        let kinds: Vec<SourceKind> = self.panels.iter().map(|p| p.kind()).collect();
        kinds.into_iter().filter_map(|kind| self.issue(kind)).collect()
    }

    fn issue(&mut self, kind: SourceKind) -> Option<FetchRequest> {
        let query = match kind {
            SourceKind::Commits => SourceQuery::since(self.since).with_filter(self.filter.clone()),
            _ => SourceQuery::since(self.since),
        };
        let panel = self.panels.iter_mut().find(|p| p.kind() == kind)?;
        let ticket = panel.state_mut().start_fetch();
        info!(kind = %kind, ticket, since = %self.since, filter = %query.filter, "fetch issued");
        Some(FetchRequest {
            kind,
            ticket,
            query,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    //  COMPLETIONS & TICKS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn apply(&mut self, completion: FetchCompletion) -> Applied {
        let FetchCompletion {
            kind,
            ticket,
            result,
        } = completion;
        let Some(panel) = self.panels.iter_mut().find(|p| p.kind() == kind) else {
            warn!(kind = %kind, ticket, "completion for a panel that is not shown");
            return Applied::NoPanel;
        };

        match result {
            Ok(payload) => {
                if !panel.state_mut().succeed(ticket) {
                    warn!(kind = %kind, ticket, latest = panel.state().latest_ticket(), "discarding stale fetch result");
                    return Applied::Stale;
                }
                let rows = payload.len();
                if !panel.update(payload) {
                    warn!(kind = %kind, "payload does not match panel");
                }
                info!(kind = %kind, ticket, rows, "fetch completed");
                Applied::Loaded(rows)
            }
            Err(e) => {
                if !panel.state_mut().fail(ticket, e.to_string()) {
                    warn!(kind = %kind, ticket, error = %e, "discarding stale fetch failure");
                    return Applied::Stale;
                }
                warn!(kind = %kind, ticket, error = %e, "fetch failed");
                Applied::Failed
            }
        }
    }

    /// Advance simulated progress on every loading panel whose interval elapsed
    pub fn tick<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) {
        for panel in &mut self.panels {
            panel.state_mut().tick_if_due(now, rng);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    //  FOCUS & COMMANDS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn focus_next(&mut self) {
        let from = self.focus.index();
        self.focus.next();
        self.move_focus(from);
    }

    pub fn focus_prev(&mut self) {
        let from = self.focus.index();
        self.focus.prev();
        self.move_focus(from);
    }

    pub fn focus_select(&mut self, index: usize) -> bool {
        let from = self.focus.index();
        if !self.focus.select(index) {
            return false;
        }
        self.move_focus(from);
        true
    }

    fn move_focus(&mut self, from: usize) {
        let to = self.focus.index();
        if from == to {
            return;
        }
        if let Some(panel) = self.panels.get_mut(from) {
            panel.blur();
        }
        if let Some(panel) = self.panels.get_mut(to) {
            panel.focus();
        }
    }

    /// Apply a dashboard-level command. Quit, errors and no-ops are the
    /// caller's business and yield no fetches.
    pub fn handle(&mut self, outcome: CommandOutcome) -> Vec<FetchRequest> {
        match outcome {
            CommandOutcome::Navigate(Direction::Next) => {
                self.focus_next();
                Vec::new()
            }
            CommandOutcome::Navigate(Direction::Previous) => {
                self.focus_prev();
                Vec::new()
            }
            CommandOutcome::SetAuthors(names) => self.set_authors(names),
            CommandOutcome::SetBranches(names) => self.set_branches(names),
            CommandOutcome::ClearFilter(field) => self.clear_filter(field),
            CommandOutcome::SetSince(since) => self.set_since(since),
            CommandOutcome::Quit | CommandOutcome::Error(_) | CommandOutcome::None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::panel::PanelStatus;
    use crate::commits::CommitRecord;
    use crate::sources::{FetchError, Issue};
    use crate::ui::panels::PanelPayload;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn full_dashboard() -> Dashboard {
        Dashboard::for_kinds(&SourceKind::ALL, at(0))
    }

    fn commits(hashes: &[&str]) -> PanelPayload {
        PanelPayload::Commits(
            hashes
                .iter()
                .map(|h| CommitRecord::new(*h, "main", "Jane", "msg", at(10)))
                .collect(),
        )
    }

    fn ok(kind: SourceKind, ticket: FetchTicket, payload: PanelPayload) -> FetchCompletion {
        FetchCompletion {
            kind,
            ticket,
            result: Ok(payload),
        }
    }

    fn commit_hashes(dashboard: &Dashboard) -> usize {
        dashboard
            .panel(SourceKind::Commits)
            .map(|p| p.row_count())
            .unwrap_or(0)
    }

    #[test]
    fn test_start_issues_one_request_per_panel() {
        let mut dashboard = full_dashboard();
        let requests = dashboard.start();
        let kinds: Vec<_> = requests.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, SourceKind::ALL.to_vec());
        assert!(dashboard
            .panels()
            .iter()
            .all(|p| p.state().status() == PanelStatus::Loading));
    }

    #[test]
    fn test_filter_change_reissues_only_commits() {
        let mut dashboard = full_dashboard();
        for request in dashboard.start() {
            let payload = match request.kind {
                SourceKind::Commits => commits(&["a"]),
                SourceKind::Issues => PanelPayload::Issues(Vec::new()),
                SourceKind::Messages => PanelPayload::Messages(Vec::new()),
            };
            dashboard.apply(ok(request.kind, request.ticket, payload));
        }

        let requests = dashboard.set_authors(vec!["jane".into()]);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, SourceKind::Commits);
        assert!(requests[0].query.filter.authors().contains("jane"));

        let issues = dashboard.panel(SourceKind::Issues).unwrap();
        assert_eq!(issues.state().status(), PanelStatus::Loaded);
    }

    #[test]
    fn test_filters_combine_and_clear_independently() {
        let mut dashboard = full_dashboard();
        dashboard.set_authors(vec!["jane".into()]);
        let requests = dashboard.set_branches(vec!["main".into()]);
        let filter = &requests[0].query.filter;
        assert!(filter.authors().contains("jane"));
        assert!(filter.branches().contains("main"));

        let requests = dashboard.clear_filter(FilterField::Authors);
        assert!(requests[0].query.filter.authors().is_empty());
        assert!(requests[0].query.filter.branches().contains("main"));
        assert!(dashboard.filter().branches().contains("main"));
    }

    #[test]
    fn test_other_panels_get_no_commit_filter() {
        let mut dashboard = full_dashboard().with_filter(FilterSpec::new().with_authors(["jane"]));
        let requests = dashboard.set_since(at(500));
        assert_eq!(requests.len(), 3);
        for request in requests {
            assert_eq!(request.query.since, at(500));
            assert_eq!(
                request.query.filter.is_empty(),
                request.kind != SourceKind::Commits
            );
        }
    }

    #[test]
    fn test_filter_without_commit_panel_issues_nothing() {
        let mut dashboard = Dashboard::for_kinds(&[SourceKind::Issues], at(0));
        assert!(dashboard.set_authors(vec!["jane".into()]).is_empty());
        assert!(dashboard.set_branches(vec!["main".into()]).is_empty());
    }

    #[test]
    fn test_stale_result_arriving_last_is_discarded() {
        let mut dashboard = full_dashboard();
        let first = dashboard.set_authors(vec!["jane".into()]).remove(0);
        let second = dashboard.set_authors(vec!["bob".into()]).remove(0);

        assert_eq!(
            dashboard.apply(ok(SourceKind::Commits, second.ticket, commits(&["b1", "b2"]))),
            Applied::Loaded(2)
        );
        assert_eq!(
            dashboard.apply(ok(SourceKind::Commits, first.ticket, commits(&["j1"]))),
            Applied::Stale
        );
        assert_eq!(commit_hashes(&dashboard), 2);
    }

    #[test]
    fn test_stale_result_arriving_first_is_discarded() {
        let mut dashboard = full_dashboard();
        let first = dashboard.set_authors(vec!["jane".into()]).remove(0);
        let second = dashboard.set_authors(vec!["bob".into()]).remove(0);

        assert_eq!(
            dashboard.apply(ok(SourceKind::Commits, first.ticket, commits(&["j1"]))),
            Applied::Stale
        );
        let panel = dashboard.panel(SourceKind::Commits).unwrap();
        assert_eq!(panel.state().status(), PanelStatus::Loading);

        assert_eq!(
            dashboard.apply(ok(SourceKind::Commits, second.ticket, commits(&["b1", "b2"]))),
            Applied::Loaded(2)
        );
        assert_eq!(commit_hashes(&dashboard), 2);
    }

    #[test]
    fn test_failure_lands_in_one_panel_and_retry_recovers() {
        let mut dashboard = full_dashboard();
        let requests = dashboard.start();
        let commit_ticket = requests[0].ticket;

        let applied = dashboard.apply(FetchCompletion {
            kind: SourceKind::Commits,
            ticket: commit_ticket,
            result: Err(FetchError::Auth("bad token".into())),
        });
        assert_eq!(applied, Applied::Failed);

        let panel = dashboard.panel(SourceKind::Commits).unwrap();
        assert_eq!(panel.state().status(), PanelStatus::Error);
        assert!(panel.state().error().unwrap().contains("bad token"));
        let issues = dashboard.panel(SourceKind::Issues).unwrap();
        assert_eq!(issues.state().status(), PanelStatus::Loading);

        // Commits is focused first
        let retry = dashboard.retry_focused();
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].kind, SourceKind::Commits);
        assert!(retry[0].ticket > commit_ticket);
        dashboard.apply(ok(SourceKind::Commits, retry[0].ticket, commits(&["a"])));
        let panel = dashboard.panel(SourceKind::Commits).unwrap();
        assert_eq!(panel.state().status(), PanelStatus::Loaded);
    }

    #[test]
    fn test_completion_for_missing_panel() {
        let mut dashboard = Dashboard::for_kinds(&[SourceKind::Commits], at(0));
        let applied = dashboard.apply(ok(
            SourceKind::Issues,
            1,
            PanelPayload::Issues(vec![Issue {
                key: "OPS-1".into(),
                summary: "s".into(),
                status: "Open".into(),
                assignee: None,
                updated: at(1),
            }]),
        ));
        assert_eq!(applied, Applied::NoPanel);
    }

    #[test]
    fn test_focus_moves_between_panels() {
        let mut dashboard = full_dashboard();
        assert!(dashboard.panels()[0].is_focused());

        dashboard.handle(CommandOutcome::Navigate(Direction::Next));
        assert_eq!(dashboard.focused_index(), 1);
        assert!(!dashboard.panels()[0].is_focused());
        assert!(dashboard.panels()[1].is_focused());

        dashboard.handle(CommandOutcome::Navigate(Direction::Previous));
        dashboard.handle(CommandOutcome::Navigate(Direction::Previous));
        assert_eq!(dashboard.focused_index(), 2);
        assert_eq!(
            dashboard.panels().iter().filter(|p| p.is_focused()).count(),
            1
        );

        assert!(!dashboard.focus_select(7));
        assert!(dashboard.focus_select(0));
        assert_eq!(dashboard.focused_panel().unwrap().kind(), SourceKind::Commits);
    }

    #[test]
    fn test_handle_routes_commands() {
        let mut dashboard = full_dashboard();
        assert_eq!(
            dashboard
                .handle(CommandOutcome::SetBranches(vec!["main".into()]))
                .len(),
            1
        );
        assert_eq!(dashboard.handle(CommandOutcome::SetSince(at(99))).len(), 3);
        assert_eq!(dashboard.since(), at(99));
        assert!(dashboard.handle(CommandOutcome::Quit).is_empty());
        assert!(dashboard
            .handle(CommandOutcome::Error("nope".into()))
            .is_empty());
    }

    #[test]
    fn test_tick_only_moves_loading_panels() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(11);
        let mut dashboard = Dashboard::for_kinds(&[SourceKind::Commits, SourceKind::Issues], at(0));
        let requests = dashboard.start();
        dashboard.apply(ok(SourceKind::Issues, requests[1].ticket, PanelPayload::Issues(Vec::new())));

        let start = Instant::now();
        for step in 0..50u64 {
            dashboard.tick(start + std::time::Duration::from_secs(step), &mut rng);
        }
        let loading = dashboard.panel(SourceKind::Commits).unwrap().state();
        assert!(loading.progress() > 0.0 && loading.progress() < 1.0);
        let issues = dashboard.panel(SourceKind::Issues).unwrap().state();
        assert_eq!(issues.progress(), 1.0);
    }
}
