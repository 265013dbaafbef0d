//! Data sources feeding the dashboard panels
//!
//! Every source is consumed through a small trait returning a boxed future so
//! the runtime can hold them as `Arc<dyn ...>` and spawn fetches without
//! knowing which backend is configured.

pub mod jira;
pub mod slack;

pub use jira::{Issue, JiraClient};
pub use slack::{Message, SlackClient};

use crate::commits::{CommitRecord, CommitSet, SourceQuery};
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Connect/read timeout for every outbound HTTP call
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub const USER_AGENT: &str = concat!("void-tui/", env!("CARGO_PKG_VERSION"));

/// Which panel a source feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    Commits,
    Issues,
    Messages,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Commits, SourceKind::Issues, SourceKind::Messages];

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Commits => "Commits",
            SourceKind::Issues => "Jira",
            SourceKind::Messages => "Slack",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whole-fetch failures. Partial failures (one ref, one branch, one channel)
/// never surface here; collectors log them and carry on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cannot open repository {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("invalid input: {0}")]
    Format(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limited: {0}")]
    RateLimit(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("{0}")]
    Api(String),
}

impl FetchError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Network(format!(
                "request timed out after {}s",
                HTTP_TIMEOUT.as_secs()
            ))
        } else if err.is_decode() {
            FetchError::Api(format!("unexpected response: {}", err))
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

pub(crate) fn http_client() -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .connect_timeout(HTTP_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FetchError::Config(format!("failed to create HTTP client: {}", e)))
}

pub trait CommitSource: Send + Sync {
    /// Human-readable origin, used in logs
    fn name(&self) -> String;

    fn collect<'a>(
        &'a self,
        query: &'a SourceQuery,
    ) -> BoxFuture<'a, Result<Vec<CommitRecord>, FetchError>>;
}

pub trait IssueSource: Send + Sync {
    fn issues_since(&self, since: DateTime<Utc>) -> BoxFuture<'_, Result<Vec<Issue>, FetchError>>;
}

pub trait MessageSource: Send + Sync {
    fn messages_since(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Message>, FetchError>>;
}

/// Every configured Git source behind one [`CommitSource`].
///
/// Results are merged through a single [`CommitSet`], so a commit pushed to
/// GitHub and present in a local clone shows up once. One failing source does
/// not hide the others; the fetch only fails when all of them do.
pub struct CommitSources {
    sources: Vec<Arc<dyn CommitSource>>,
}

impl CommitSources {
    pub fn new(sources: Vec<Arc<dyn CommitSource>>) -> Self {
        Self { sources }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

impl CommitSource for CommitSources {
    fn name(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn collect<'a>(
        &'a self,
        query: &'a SourceQuery,
    ) -> BoxFuture<'a, Result<Vec<CommitRecord>, FetchError>> {
        async move {
            let results = join_all(self.sources.iter().map(|s| s.collect(query))).await;

            let mut set = CommitSet::new();
            let mut first_error = None;
            let mut succeeded = 0usize;
            for (source, result) in self.sources.iter().zip(results) {
                match result {
                    Ok(commits) => {
                        succeeded += 1;
                        set.extend(commits);
                    }
                    Err(e) => {
                        warn!(source = %source.name(), error = %e, "commit source failed");
                        first_error.get_or_insert(e);
                    }
                }
            }

            match first_error {
                Some(e) if succeeded == 0 => Err(e),
                _ => Ok(set.into_sorted()),
            }
        }
        .boxed()
    }
}

/// The collaborators configured for this session. A `None` source has no
/// panel.
#[derive(Clone, Default)]
pub struct Sources {
    pub commits: Option<Arc<dyn CommitSource>>,
    pub issues: Option<Arc<dyn IssueSource>>,
    pub messages: Option<Arc<dyn MessageSource>>,
}

impl Sources {
    /// Enabled kinds in display order
    pub fn enabled(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                SourceKind::Commits => self.commits.is_some(),
                SourceKind::Issues => self.issues.is_some(),
                SourceKind::Messages => self.messages.is_some(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FixedSource {
        name: &'static str,
        result: Result<Vec<CommitRecord>, FetchError>,
    }

    impl CommitSource for FixedSource {
        fn name(&self) -> String {
            self.name.to_string()
        }

        fn collect<'a>(
            &'a self,
            query: &'a SourceQuery,
        ) -> BoxFuture<'a, Result<Vec<CommitRecord>, FetchError>> {
            let result = self
                .result
                .clone()
                .map(|commits| commits.into_iter().filter(|c| query.accepts(c)).collect());
            async move { result }.boxed()
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn commit(hash: &str, secs: i64) -> CommitRecord {
        CommitRecord::new(hash, "main", "Jane", "msg", at(secs))
    }

    #[tokio::test]
    async fn test_sources_merge_and_dedup() {
        let local: Arc<dyn CommitSource> = Arc::new(FixedSource {
            name: "local",
            result: Ok(vec![commit("a", 10), commit("b", 20)]),
        });
        let remote: Arc<dyn CommitSource> = Arc::new(FixedSource {
            name: "remote",
            result: Ok(vec![commit("b", 20), commit("c", 30)]),
        });
        let sources = CommitSources::new(vec![local, remote]);

        let commits = sources.collect(&SourceQuery::since(at(0))).await.unwrap();
        let hashes: Vec<_> = commits.iter().map(|c| c.hash()).collect();
        assert_eq!(hashes, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_one_failing_source_is_tolerated() {
        let ok: Arc<dyn CommitSource> = Arc::new(FixedSource {
            name: "ok",
            result: Ok(vec![commit("a", 10)]),
        });
        let broken: Arc<dyn CommitSource> = Arc::new(FixedSource {
            name: "broken",
            result: Err(FetchError::Network("offline".into())),
        });
        let sources = CommitSources::new(vec![broken, ok]);

        let commits = sources.collect(&SourceQuery::since(at(0))).await.unwrap();
        assert_eq!(commits.len(), 1);
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_an_error() {
        let broken: Arc<dyn CommitSource> = Arc::new(FixedSource {
            name: "broken",
            result: Err(FetchError::Auth("bad token".into())),
        });
        let sources = CommitSources::new(vec![broken]);

        let result = sources.collect(&SourceQuery::since(at(0))).await;
        assert_eq!(result, Err(FetchError::Auth("bad token".into())));
    }

    #[test]
    fn test_enabled_kinds_follow_configuration() {
        let sources = Sources {
            commits: Some(Arc::new(CommitSources::new(Vec::new()))),
            ..Default::default()
        };
        assert_eq!(sources.enabled(), vec![SourceKind::Commits]);
        assert!(Sources::default().enabled().is_empty());
    }
}
