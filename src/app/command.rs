//! Textual commands typed on the `:` line
//!
//! The registry is a plain table built by the caller and handed to the
//! runtime. Every command resolves to a [`CommandOutcome`]; the dashboard
//! decides what an outcome means.

use crate::commits::FilterField;
use crate::sources::FetchError;
use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    None,
    Navigate(Direction),
    SetAuthors(Vec<String>),
    SetBranches(Vec<String>),
    ClearFilter(FilterField),
    SetSince(DateTime<Utc>),
    Quit,
    Error(String),
}

type Handler = fn(&[&str]) -> CommandOutcome;

struct CommandSpec {
    path: &'static [&'static str],
    usage: &'static str,
    handler: Handler,
}

impl CommandSpec {
    fn matches(&self, tokens: &[&str]) -> bool {
        self.path.len() <= tokens.len()
            && self
                .path
                .iter()
                .zip(tokens)
                .all(|(word, token)| word.eq_ignore_ascii_case(token))
    }
}

pub struct CommandRegistry {
    commands: Vec<CommandSpec>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Registry with the built-in command set
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(&["git", "author"], "git author <names>", set_authors);
        registry.register(&["git", "branch"], "git branch <names>", set_branches);
        registry.register(&["git", "clear"], "git clear [author|branch]", clear_filter);
        registry.register(&["void", "sd"], "void sd <YYYY-MM-DD>", set_since);
        registry.register(&["next"], "next", |_| CommandOutcome::Navigate(Direction::Next));
        registry.register(&["prev"], "prev", |_| {
            CommandOutcome::Navigate(Direction::Previous)
        });
        registry.register(&["quit"], "quit", |_| CommandOutcome::Quit);
        registry.register(&["q"], "q", |_| CommandOutcome::Quit);
        registry
    }

    pub fn empty() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        path: &'static [&'static str],
        usage: &'static str,
        handler: Handler,
    ) {
        self.commands.push(CommandSpec {
            path,
            usage,
            handler,
        });
    }

    pub fn usages(&self) -> Vec<&'static str> {
        self.commands.iter().map(|c| c.usage).collect()
    }

    /// Longest matching command path wins; the rest of the line is its
    /// arguments. A leading `:` is accepted.
    pub fn parse(&self, input: &str) -> CommandOutcome {
        let line = input.trim().trim_start_matches(':').trim();
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return CommandOutcome::None;
        }

        let best = self
            .commands
            .iter()
            .filter(|c| c.matches(&tokens))
            .max_by_key(|c| c.path.len());

        match best {
            Some(command) => (command.handler)(&tokens[command.path.len()..]),
            None => CommandOutcome::Error(format!("Unknown command: {}", line)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  HANDLERS
// ═══════════════════════════════════════════════════════════════════════════

fn set_authors(args: &[&str]) -> CommandOutcome {
    match split_names(args) {
        names if names.is_empty() => CommandOutcome::Error("usage: git author <names>".into()),
        names => CommandOutcome::SetAuthors(names),
    }
}

fn set_branches(args: &[&str]) -> CommandOutcome {
    match split_names(args) {
        names if names.is_empty() => CommandOutcome::Error("usage: git branch <names>".into()),
        names => CommandOutcome::SetBranches(names),
    }
}

fn clear_filter(args: &[&str]) -> CommandOutcome {
    match args {
        [] => CommandOutcome::ClearFilter(FilterField::All),
        [field] => match field.to_ascii_lowercase().as_str() {
            "author" | "authors" => CommandOutcome::ClearFilter(FilterField::Authors),
            "branch" | "branches" => CommandOutcome::ClearFilter(FilterField::Branches),
            "all" => CommandOutcome::ClearFilter(FilterField::All),
            other => CommandOutcome::Error(format!("Cannot clear '{}': use author or branch", other)),
        },
        _ => CommandOutcome::Error("usage: git clear [author|branch]".into()),
    }
}

fn set_since(args: &[&str]) -> CommandOutcome {
    let [raw] = args else {
        return CommandOutcome::Error("usage: void sd <YYYY-MM-DD>".into());
    };
    match parse_since(raw, Local::now().date_naive()) {
        Ok(since) => CommandOutcome::SetSince(since),
        Err(e) => CommandOutcome::Error(e.to_string()),
    }
}

/// Comma-separated when a comma is present, so `Jane Doe, Bob` keeps the
/// space inside a name; whitespace-separated otherwise.
fn split_names(args: &[&str]) -> Vec<String> {
    let joined = args.join(" ");
    let parts: Vec<&str> = if joined.contains(',') {
        joined.split(',').collect()
    } else {
        joined.split_whitespace().collect()
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
//  DATES
// ═══════════════════════════════════════════════════════════════════════════

/// Parse a start date relative to `today`: `YYYY-MM-DD`, `today`,
/// `yesterday` or `<n>d`. The result is local midnight of that day.
pub fn parse_since(raw: &str, today: NaiveDate) -> Result<DateTime<Utc>, FetchError> {
    let raw = raw.trim();
    let invalid = || FetchError::Format(format!("invalid date '{}': expected YYYY-MM-DD", raw));

    let date = match raw.to_ascii_lowercase().as_str() {
        "today" => today,
        "yesterday" => today.checked_sub_days(Days::new(1)).ok_or_else(invalid)?,
        lower => match lower.strip_suffix('d').map(str::parse::<u64>) {
            Some(Ok(days)) => today.checked_sub_days(Days::new(days)).ok_or_else(invalid)?,
            _ => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())?,
        },
    };
    local_midnight(date)
}

/// Start of `days_back` days before `today`, used for the default lookback
pub fn days_ago(today: NaiveDate, days_back: u32) -> Result<DateTime<Utc>, FetchError> {
    let date = today
        .checked_sub_days(Days::new(u64::from(days_back)))
        .ok_or_else(|| FetchError::Format(format!("lookback of {} days is out of range", days_back)))?;
    local_midnight(date)
}

fn local_midnight(date: NaiveDate) -> Result<DateTime<Utc>, FetchError> {
    Local
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| FetchError::Format(format!("{} has no local midnight", date)))
}
