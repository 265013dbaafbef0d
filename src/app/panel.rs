//! Per-panel load state
//!
//! Collaborators give no byte-level progress, so while a fetch is in flight
//! the progress value creeps toward [`PROGRESS_CEILING`] on a jittered timer.
//! Only a completion for the most recently issued fetch may finish the panel.

use rand::Rng;
use std::time::{Duration, Instant};

/// Identifies one fetch issued for a panel. Tickets increase per panel.
pub type FetchTicket = u64;

/// Simulated progress never passes this without a real completion
pub const PROGRESS_CEILING: f64 = 0.95;

/// A tick closes at most this fraction of the remaining gap
const MAX_STEP: f64 = 0.10;

const TICK_MIN_MS: u64 = 200;
const TICK_MAX_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct PanelState {
    status: PanelStatus,
    progress: f64,
    error: Option<String>,
    latest_issued: FetchTicket,
    next_tick: Option<Instant>,
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> PanelStatus {
        self.status
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn latest_ticket(&self) -> FetchTicket {
        self.latest_issued
    }

    pub fn is_loading(&self) -> bool {
        self.status == PanelStatus::Loading
    }

    /// Valid from every state. Earlier in-flight fetches become stale.
    pub fn start_fetch(&mut self) -> FetchTicket {
        self.latest_issued += 1;
        self.status = PanelStatus::Loading;
        self.progress = 0.0;
        self.error = None;
        self.next_tick = None;
        self.latest_issued
    }

    /// Advance the simulated progress by one step. No-op unless loading.
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.status != PanelStatus::Loading || self.progress >= PROGRESS_CEILING {
            return;
        }
        let gap = PROGRESS_CEILING - self.progress;
        let step = rng.gen::<f64>() * MAX_STEP * gap;
        self.progress = (self.progress + step).min(PROGRESS_CEILING);
    }

    /// Tick if the jittered interval has elapsed; schedules the next one.
    /// The first call after a fetch starts only arms the timer.
    pub fn tick_if_due<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) {
        if self.status != PanelStatus::Loading {
            return;
        }
        match self.next_tick {
            Some(due) if now < due => return,
            Some(_) => self.tick(rng),
            None => {}
        }
        let jitter = rng.gen_range(TICK_MIN_MS..=TICK_MAX_MS);
        self.next_tick = Some(now + Duration::from_millis(jitter));
    }

    /// Returns false (and changes nothing) for a stale or unexpected ticket
    pub fn succeed(&mut self, ticket: FetchTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.status = PanelStatus::Loaded;
        self.progress = 1.0;
        self.error = None;
        self.next_tick = None;
        true
    }

    /// Returns false (and changes nothing) for a stale or unexpected ticket
    pub fn fail(&mut self, ticket: FetchTicket, message: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.status = PanelStatus::Error;
        self.progress = 1.0;
        self.error = Some(message.into());
        self.next_tick = None;
        true
    }

    fn is_current(&self, ticket: FetchTicket) -> bool {
        self.status == PanelStatus::Loading && ticket == self.latest_issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_new_panel_is_idle() {
        let state = PanelState::new();
        assert_eq!(state.status(), PanelStatus::Idle);
        assert_eq!(state.progress(), 0.0);
        assert!(state.error().is_none());
    }

    #[test]
    fn test_fetch_start_resets_progress_and_error() {
        let mut state = PanelState::new();
        let t1 = state.start_fetch();
        assert!(state.fail(t1, "boom"));
        assert_eq!(state.error(), Some("boom"));

        let t2 = state.start_fetch();
        assert!(t2 > t1);
        assert_eq!(state.status(), PanelStatus::Loading);
        assert_eq!(state.progress(), 0.0);
        assert!(state.error().is_none());
    }

    #[test]
    fn test_progress_is_monotonic_and_never_completes() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = PanelState::new();
        state.start_fetch();

        let mut last = state.progress();
        for _ in 0..10_000 {
            state.tick(&mut rng);
            assert!(state.progress() >= last);
            assert!(state.progress() <= PROGRESS_CEILING);
            assert!(state.progress() < 1.0);
            last = state.progress();
        }
        assert_eq!(state.status(), PanelStatus::Loading);
        assert!(state.progress() > 0.5);
    }

    #[test]
    fn test_tick_is_noop_outside_loading() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = PanelState::new();
        state.tick(&mut rng);
        assert_eq!(state.progress(), 0.0);

        let t = state.start_fetch();
        state.succeed(t);
        state.tick(&mut rng);
        assert_eq!(state.progress(), 1.0);
        assert_eq!(state.status(), PanelStatus::Loaded);
    }

    #[test]
    fn test_tick_if_due_respects_interval() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = PanelState::new();
        state.start_fetch();
        let start = Instant::now();

        // Arms the timer only
        state.tick_if_due(start, &mut rng);
        assert_eq!(state.progress(), 0.0);

        // Before the minimum jitter nothing happens
        state.tick_if_due(start + Duration::from_millis(TICK_MIN_MS - 1), &mut rng);
        assert_eq!(state.progress(), 0.0);

        // After the maximum jitter a step is taken
        let later = start + Duration::from_millis(TICK_MAX_MS + 1);
        state.tick_if_due(later, &mut rng);
        assert!(state.progress() > 0.0);
        assert!(state.progress() < PROGRESS_CEILING);
        let due = state.next_tick.unwrap();
        assert!(due >= later + Duration::from_millis(TICK_MIN_MS));
        assert!(due <= later + Duration::from_millis(TICK_MAX_MS));

        // Not due again until the new interval elapses
        let progress = state.progress();
        state.tick_if_due(later + Duration::from_millis(TICK_MIN_MS - 1), &mut rng);
        assert_eq!(state.progress(), progress);
    }

    #[test]
    fn test_only_latest_ticket_completes() {
        let mut state = PanelState::new();
        let a = state.start_fetch();
        let b = state.start_fetch();

        assert!(!state.succeed(a));
        assert_eq!(state.status(), PanelStatus::Loading);

        assert!(state.succeed(b));
        assert_eq!(state.status(), PanelStatus::Loaded);
        assert_eq!(state.progress(), 1.0);

        // A late stale failure cannot overwrite the settled result
        assert!(!state.fail(a, "late"));
        assert_eq!(state.status(), PanelStatus::Loaded);
    }

    #[test]
    fn test_completion_without_fetch_is_ignored() {
        let mut state = PanelState::new();
        assert!(!state.succeed(0));
        assert!(!state.succeed(1));
        assert_eq!(state.status(), PanelStatus::Idle);
    }
}
