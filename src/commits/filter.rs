//! Author/branch filtering
//!
//! Matching is case-insensitive and bidirectional: `"jane"` matches the author
//! `"Jane Doe"`, and so does `"Jane Doe (she/her)"`. Within one set the
//! targets are alternatives; across sets the constraints are conjunctive.

use super::CommitRecord;
use std::collections::BTreeSet;
use std::fmt;

/// Which part of the filter a command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Authors,
    Branches,
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    authors: BTreeSet<String>,
    branches: BTreeSet<String>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the author constraint. Blank names are ignored.
    pub fn with_authors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.authors = normalize(names);
        self
    }

    /// Replace the branch constraint. Blank names are ignored.
    pub fn with_branches<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.branches = normalize(names);
        self
    }

    pub fn clear(&mut self, field: FilterField) {
        match field {
            FilterField::Authors => self.authors.clear(),
            FilterField::Branches => self.branches.clear(),
            FilterField::All => {
                self.authors.clear();
                self.branches.clear();
            }
        }
    }

    /// Union of both filters' targets, field by field
    pub fn merge(mut self, other: &FilterSpec) -> Self {
        self.authors.extend(other.authors.iter().cloned());
        self.branches.extend(other.branches.iter().cloned());
        self
    }

    pub fn authors(&self) -> &BTreeSet<String> {
        &self.authors
    }

    pub fn branches(&self) -> &BTreeSet<String> {
        &self.branches
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty() && self.branches.is_empty()
    }

    pub fn matches(&self, commit: &CommitRecord) -> bool {
        self.matches_parts(commit.author(), commit.branch())
    }

    /// Predicate on raw fields, for collectors that test before building a record
    pub fn matches_parts(&self, author: &str, branch: &str) -> bool {
        any_matches(&self.branches, branch) && any_matches(&self.authors, author)
    }

    /// Branch half of the predicate; true when there is no branch constraint
    pub fn matches_branch(&self, branch: &str) -> bool {
        any_matches(&self.branches, branch)
    }

    /// Order-preserving; identity when the filter is empty
    pub fn apply(&self, commits: Vec<CommitRecord>) -> Vec<CommitRecord> {
        if self.is_empty() {
            return commits;
        }
        commits.into_iter().filter(|c| self.matches(c)).collect()
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut parts = Vec::new();
        if !self.authors.is_empty() {
            parts.push(format!(
                "author: {}",
                self.authors.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
        if !self.branches.is_empty() {
            parts.push(format!(
                "branch: {}",
                self.branches.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
        write!(f, "{}", parts.join(" & "))
    }
}

/// Case-insensitive, either side may contain the other
pub fn name_matches(candidate: &str, target: &str) -> bool {
    let candidate = candidate.trim().to_lowercase();
    let target = target.trim().to_lowercase();
    // An empty string is a substring of everything
    if candidate.is_empty() || target.is_empty() {
        return false;
    }
    candidate.contains(&target) || target.contains(&candidate)
}

fn any_matches(targets: &BTreeSet<String>, candidate: &str) -> bool {
    targets.is_empty() || targets.iter().any(|t| name_matches(candidate, t))
}

fn normalize<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}
