//! Commit model shared by every Git collector
//!
//! A commit's identity is its hash. The same commit reached through several
//! refs, branches or API pages collapses into one [`CommitRecord`] inside a
//! [`CommitSet`].

pub mod filter;
pub mod local;
pub mod remote;

pub use filter::{name_matches, FilterField, FilterSpec};
pub use local::LocalCollector;
pub use remote::{GitHubApi, GitHubClient, RemoteCollector};

use crate::util::first_line;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A normalized commit, produced by either collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    hash: String,
    branch: String,
    author: String,
    message: String,
    timestamp: DateTime<Utc>,
}

impl CommitRecord {
    pub fn new(
        hash: impl Into<String>,
        branch: impl Into<String>,
        author: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            hash: hash.into(),
            branch: branch.into(),
            author: author.into(),
            message: message.into(),
            timestamp,
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// First seven characters of the hash
    pub fn short_hash(&self) -> &str {
        let end = self
            .hash
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.hash.len());
        &self.hash[..end]
    }

    /// First line of the commit message
    pub fn summary(&self) -> &str {
        first_line(&self.message)
    }
}

/// Input to a collection operation. Same query, same upstream data, same result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    pub since: DateTime<Utc>,
    pub filter: FilterSpec,
}

impl SourceQuery {
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since,
            filter: FilterSpec::default(),
        }
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    /// Strictly after the cutoff; a commit made exactly at `since` is excluded.
    pub fn accepts_time(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp > self.since
    }

    /// Cutoff and filter predicate together
    pub fn accepts(&self, record: &CommitRecord) -> bool {
        self.accepts_time(record.timestamp()) && self.filter.matches(record)
    }
}

/// Hash-keyed accumulator. The first occurrence of a hash wins; later
/// duplicates from other refs or branches are dropped.
#[derive(Debug, Default)]
pub struct CommitSet {
    by_hash: HashMap<String, CommitRecord>,
}

impl CommitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the hash was already present
    pub fn insert(&mut self, record: CommitRecord) -> bool {
        if self.by_hash.contains_key(record.hash()) {
            return false;
        }
        self.by_hash.insert(record.hash.clone(), record);
        true
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Newest first, ties broken by hash so output is reproducible
    pub fn into_sorted(self) -> Vec<CommitRecord> {
        let mut commits: Vec<CommitRecord> = self.by_hash.into_values().collect();
        sort_newest_first(&mut commits);
        commits
    }
}

impl Extend<CommitRecord> for CommitSet {
    fn extend<I: IntoIterator<Item = CommitRecord>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl FromIterator<CommitRecord> for CommitSet {
    fn from_iter<I: IntoIterator<Item = CommitRecord>>(iter: I) -> Self {
        let mut set = CommitSet::new();
        set.extend(iter);
        set
    }
}

pub fn sort_newest_first(commits: &mut [CommitRecord]) {
    commits.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.hash.cmp(&b.hash))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn record(hash: &str, branch: &str, secs: i64) -> CommitRecord {
        CommitRecord::new(hash, branch, "Jane", "msg", at(secs))
    }

    #[test]
    fn test_commit_set_first_occurrence_wins() {
        let mut set = CommitSet::new();
        assert!(set.insert(record("abc123", "main", 10)));
        assert!(!set.insert(record("abc123", "feature", 10)));

        let commits = set.into_sorted();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].branch(), "main");
    }

    #[test]
    fn test_into_sorted_is_newest_first_with_hash_tiebreak() {
        let set: CommitSet = vec![
            record("bbb", "main", 10),
            record("ccc", "main", 30),
            record("aaa", "main", 10),
        ]
        .into_iter()
        .collect();

        let hashes: Vec<_> = set
            .into_sorted()
            .iter()
            .map(|c| c.hash().to_string())
            .collect();
        assert_eq!(hashes, vec!["ccc", "aaa", "bbb"]);
    }

    #[test]
    fn test_query_cutoff_is_strict() {
        let query = SourceQuery::since(at(100));
        assert!(!query.accepts_time(at(100)));
        assert!(query.accepts_time(at(101)));
        assert!(!query.accepts_time(at(99)));
    }

    #[test]
    fn test_short_hash_and_summary() {
        let c = CommitRecord::new(
            "0123456789abcdef",
            "main",
            "Jane",
            "Fix parser\n\nLonger body",
            at(0),
        );
        assert_eq!(c.short_hash(), "0123456");
        assert_eq!(c.summary(), "Fix parser");

        let short = CommitRecord::new("abc", "main", "Jane", "", at(0));
        assert_eq!(short.short_hash(), "abc");
        assert_eq!(short.summary(), "");
    }
}
