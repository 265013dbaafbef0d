//! Local repository collector
//!
//! Walks every reference in a repository (branches, remote-tracking branches,
//! tags) and collects commits authored after the cutoff. Symbolic references
//! such as `origin/HEAD` are skipped since they alias a ref that is walked
//! anyway.

use super::{CommitRecord, CommitSet, FilterSpec, SourceQuery};
use crate::sources::{CommitSource, FetchError};
use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use git2::{Oid, Reference, ReferenceType, Repository, Sort};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct LocalCollector {
    path: PathBuf,
}

impl LocalCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Collect commits newer than `query.since` that pass `query.filter`.
    ///
    /// Opening the repository or listing its references is fatal. A ref that
    /// cannot be peeled or walked is skipped and the rest are still collected.
    pub fn collect_blocking(&self, query: &SourceQuery) -> Result<Vec<CommitRecord>, FetchError> {
        let repo = Repository::open(&self.path).map_err(|e| FetchError::Open {
            path: self.path.display().to_string(),
            reason: e.message().to_string(),
        })?;
        let references = repo.references().map_err(|e| FetchError::Open {
            path: self.path.display().to_string(),
            reason: format!("failed to list references: {}", e.message()),
        })?;

        let mut set = CommitSet::new();
        let mut walked = Vec::new();
        for reference in references {
            let reference = match reference {
                Ok(r) => r,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable reference");
                    continue;
                }
            };
            if reference.kind() == Some(ReferenceType::Symbolic) {
                continue;
            }
            let branch = reference.shorthand().unwrap_or("(unnamed)").to_string();
            match walk_reference(&repo, &reference, &branch, query, &walked, &mut set) {
                Ok(Some(tip)) => walked.push(tip),
                Ok(None) => {}
                Err(e) => debug!(branch = %branch, error = %e, "skipping reference"),
            }
        }

        debug!(
            path = %self.path.display(),
            commits = set.len(),
            "local collection finished"
        );
        Ok(set.into_sorted())
    }

    pub fn collect_by_authors<I, S>(
        &self,
        since: DateTime<Utc>,
        authors: I,
    ) -> Result<Vec<CommitRecord>, FetchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let query = SourceQuery::since(since).with_filter(FilterSpec::new().with_authors(authors));
        self.collect_blocking(&query)
    }

    pub fn collect_by_branches<I, S>(
        &self,
        since: DateTime<Utc>,
        branches: I,
    ) -> Result<Vec<CommitRecord>, FetchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let query =
            SourceQuery::since(since).with_filter(FilterSpec::new().with_branches(branches));
        self.collect_blocking(&query)
    }
}

/// Walk one ref and return its tip when it was walked.
///
/// History already reachable from an earlier walked tip is hidden: those
/// commits were judged on time and author then, and neither depends on the
/// ref. Without this every tag rewalks the whole history.
fn walk_reference(
    repo: &Repository,
    reference: &Reference,
    branch: &str,
    query: &SourceQuery,
    walked: &[Oid],
    set: &mut CommitSet,
) -> Result<Option<Oid>, git2::Error> {
    // Branch filter is per-ref, so a non-matching ref needs no walk at all
    if !query.filter.matches_branch(branch) {
        return Ok(None);
    }

    let tip = reference.peel_to_commit()?.id();
    let mut revwalk = repo.revwalk()?;
    revwalk.set_sorting(Sort::TIME)?;
    revwalk.push(tip)?;
    for seen in walked {
        revwalk.hide(*seen)?;
    }

    for oid in revwalk {
        let oid = oid?;
        let hash = oid.to_string();
        if set.contains(&hash) {
            continue;
        }

        let commit = repo.find_commit(oid)?;
        let author = commit.author();
        let Some(timestamp) = Utc.timestamp_opt(author.when().seconds(), 0).single() else {
            continue;
        };
        if !query.accepts_time(timestamp) {
            continue;
        }

        let name = author.name().unwrap_or("unknown");
        if !query.filter.matches_parts(name, branch) {
            continue;
        }

        set.insert(CommitRecord::new(
            hash,
            branch,
            name,
            commit.message().unwrap_or(""),
            timestamp,
        ));
    }

    Ok(Some(tip))
}

impl CommitSource for LocalCollector {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn collect<'a>(
        &'a self,
        query: &'a SourceQuery,
    ) -> BoxFuture<'a, Result<Vec<CommitRecord>, FetchError>> {
        let collector = LocalCollector::new(self.path.clone());
        let query = query.clone();
        async move {
            tokio::task::spawn_blocking(move || collector.collect_blocking(&query))
                .await
                .map_err(|e| FetchError::Open {
                    path: self.path.display().to_string(),
                    reason: format!("collector task failed: {}", e),
                })?
        }
        .boxed()
    }
}
