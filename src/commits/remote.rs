//! GitHub commit collector
//!
//! Lists every branch of a hosted repository, pages through each branch's
//! commits since the cutoff and folds them into one deduplicated,
//! newest-first sequence. The HTTP layer sits behind [`GitHubApi`] so the
//! aggregation can be exercised without the network.

use super::{CommitRecord, CommitSet, SourceQuery};
use crate::sources::{http_client, CommitSource, FetchError};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub const PER_PAGE: usize = 100;

/// Guard against an API that never returns a short page
const MAX_PAGES_PER_BRANCH: u32 = 100;

const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Maximum length for error body content in error messages
const MAX_ERROR_BODY_LEN: usize = 200;

/// Owner and repository name of a GitHub project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    /// Accepts `git@github.com:owner/repo(.git)`, `https://github.com/owner/repo(.git)`
    /// and scheme-less `github.com/owner/repo`.
    pub fn parse(url: &str) -> Result<Self, FetchError> {
        parse_remote_url(url.trim())
            .map(|(owner, repo)| RepoSlug { owner, repo })
            .ok_or_else(|| {
                FetchError::Format(format!("not a GitHub repository URL: '{}'", redact_url(url)))
            })
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Strip `user:token@` credentials so a URL is safe to log or display
pub fn redact_url(url: &str) -> String {
    if let Ok(mut parsed) = url::Url::parse(url) {
        if parsed.username().is_empty() && parsed.password().is_none() {
            return url.to_string();
        }
        if parsed.set_username("").is_ok() && parsed.set_password(None).is_ok() {
            return parsed.to_string();
        }
    }
    if url.starts_with("git@") {
        return url.to_string();
    }
    match url.rsplit_once('@') {
        Some((_, host_and_path)) => host_and_path.to_string(),
        None => url.to_string(),
    }
}

fn parse_remote_url(url: &str) -> Option<(String, String)> {
    let path = if let Some(rest) = url.strip_prefix("git@github.com:") {
        rest.to_string()
    } else if let Ok(parsed) = url::Url::parse(url) {
        if parsed.host_str() != Some("github.com") {
            return None;
        }
        parsed.path().to_string()
    } else {
        url.strip_prefix("github.com/")?.to_string()
    };

    let path = path.trim_matches('/').trim_end_matches(".git");
    let mut parts = path.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    Some((owner.to_string(), repo.to_string()))
}

/// One entry of `GET /repos/{owner}/{repo}/commits`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCommit {
    pub sha: String,
    pub commit: ApiCommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCommitDetail {
    pub author: Option<ApiSignature>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSignature {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl ApiCommit {
    pub fn new(sha: &str, author: &str, message: &str, date: DateTime<Utc>) -> Self {
        Self {
            sha: sha.to_string(),
            commit: ApiCommitDetail {
                author: Some(ApiSignature {
                    name: Some(author.to_string()),
                    date: Some(date),
                }),
                message: message.to_string(),
            },
        }
    }

    /// Commits without an author date cannot be placed on the timeline
    fn into_record(self, branch: &str) -> Option<CommitRecord> {
        let author = self.commit.author?;
        let timestamp = author.date?;
        Some(CommitRecord::new(
            self.sha,
            branch,
            author.name.unwrap_or_else(|| "unknown".to_string()),
            self.commit.message,
            timestamp,
        ))
    }
}

#[derive(Deserialize)]
struct ApiBranch {
    name: String,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    message: String,
}

/// The two GitHub endpoints the collector needs
pub trait GitHubApi: Send + Sync {
    fn branches<'a>(&'a self, repo: &'a RepoSlug) -> BoxFuture<'a, Result<Vec<String>, FetchError>>;

    /// One page (1-based) of commits on `branch` at or after `since`
    fn commits_page<'a>(
        &'a self,
        repo: &'a RepoSlug,
        branch: &'a str,
        since: DateTime<Utc>,
        page: u32,
    ) -> BoxFuture<'a, Result<Vec<ApiCommit>, FetchError>>;
}

/// One client shared by several collectors
impl<A: GitHubApi + ?Sized> GitHubApi for Arc<A> {
    fn branches<'a>(&'a self, repo: &'a RepoSlug) -> BoxFuture<'a, Result<Vec<String>, FetchError>> {
        (**self).branches(repo)
    }

    fn commits_page<'a>(
        &'a self,
        repo: &'a RepoSlug,
        branch: &'a str,
        since: DateTime<Utc>,
        page: u32,
    ) -> BoxFuture<'a, Result<Vec<ApiCommit>, FetchError>> {
        (**self).commits_page(repo, branch, since, page)
    }
}

pub struct RemoteCollector<A> {
    api: A,
    url: String,
    /// `owner/repo`, or the redacted URL when it does not parse
    label: String,
}

impl<A: GitHubApi> RemoteCollector<A> {
    pub fn new(api: A, url: impl Into<String>) -> Self {
        let url = url.into();
        let label = match RepoSlug::parse(&url) {
            Ok(slug) => slug.to_string(),
            Err(_) => redact_url(&url),
        };
        Self { api, url, label }
    }

    /// Collect commits on every branch, newest first.
    ///
    /// An unparseable URL fails before any request. Failing to list branches
    /// is fatal; failing on one branch only loses that branch.
    pub async fn collect(&self, query: &SourceQuery) -> Result<Vec<CommitRecord>, FetchError> {
        let slug = RepoSlug::parse(&self.url)?;
        let branches = self.api.branches(&slug).await?;
        debug!(repo = %self.label, branches = branches.len(), "listing commits");

        let mut set = CommitSet::new();
        for branch in branches.iter().filter(|b| query.filter.matches_branch(b)) {
            if let Err(e) = self.collect_branch(&slug, branch, query, &mut set).await {
                warn!(repo = %self.label, branch = %branch, error = %e, "skipping branch");
            }
        }

        Ok(set.into_sorted())
    }

    async fn collect_branch(
        &self,
        slug: &RepoSlug,
        branch: &str,
        query: &SourceQuery,
        set: &mut CommitSet,
    ) -> Result<(), FetchError> {
        for page in 1..=MAX_PAGES_PER_BRANCH {
            let commits = self
                .api
                .commits_page(slug, branch, query.since, page)
                .await?;
            let full_page = commits.len() >= PER_PAGE;

            for record in commits.into_iter().filter_map(|c| c.into_record(branch)) {
                // The API's `since` is inclusive, the cutoff is not
                if query.accepts(&record) {
                    set.insert(record);
                }
            }

            if !full_page {
                return Ok(());
            }
        }
        warn!(branch = %branch, "stopped paging after {} pages", MAX_PAGES_PER_BRANCH);
        Ok(())
    }
}

impl<A: GitHubApi> CommitSource for RemoteCollector<A> {
    fn name(&self) -> String {
        self.label.clone()
    }

    fn collect<'a>(
        &'a self,
        query: &'a SourceQuery,
    ) -> BoxFuture<'a, Result<Vec<CommitRecord>, FetchError>> {
        RemoteCollector::collect(self, query).boxed()
    }
}

/// REST client for api.github.com
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_API_BASE, token)
    }

    /// For GitHub Enterprise or a local mock
    pub fn with_base_url(base_url: &str, token: Option<String>) -> Result<Self, FetchError> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn branch_names(&self, repo: &RepoSlug) -> Result<Vec<String>, FetchError> {
        let request = self
            .get(&format!("/repos/{}/{}/branches", repo.owner, repo.repo))
            .query(&[("per_page", PER_PAGE.to_string())]);
        let branches: Vec<ApiBranch> = self.send(request).await?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, FetchError> {
        let resp = request.send().await.map_err(FetchError::from_reqwest)?;
        let status = resp.status();
        if status.is_success() {
            return resp.json().await.map_err(FetchError::from_reqwest);
        }
        let headers = resp.headers().clone();
        let body = resp.text().await.unwrap_or_default();
        Err(classify_error(status, &headers, &body))
    }
}

impl GitHubApi for GitHubClient {
    fn branches<'a>(&'a self, repo: &'a RepoSlug) -> BoxFuture<'a, Result<Vec<String>, FetchError>> {
        self.branch_names(repo).boxed()
    }

    fn commits_page<'a>(
        &'a self,
        repo: &'a RepoSlug,
        branch: &'a str,
        since: DateTime<Utc>,
        page: u32,
    ) -> BoxFuture<'a, Result<Vec<ApiCommit>, FetchError>> {
        async move {
            let request = self
                .get(&format!("/repos/{}/{}/commits", repo.owner, repo.repo))
                .query(&[
                    ("sha", branch.to_string()),
                    ("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ]);
            self.send(request).await
        }
        .boxed()
    }
}

fn classify_error(status: StatusCode, headers: &HeaderMap, body: &str) -> FetchError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| sanitize_error_body(body));
    let remaining = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok());

    match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimit(message),
        StatusCode::FORBIDDEN if remaining == Some("0") => {
            let reset = headers
                .get("x-ratelimit-reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
            match reset {
                Some(at) => FetchError::RateLimit(format!("resets at {}", at.format("%H:%M UTC"))),
                None => FetchError::RateLimit(message),
            }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Auth(message),
        _ => FetchError::Api(format!("GitHub API error ({}): {}", status, message)),
    }
}

/// Truncate long bodies and redact anything that looks like a credential
fn sanitize_error_body(body: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &["token", "secret", "password", "bearer", "ghp_", "gho_", "github_pat_"];

    let truncated: String = if body.chars().count() > MAX_ERROR_BODY_LEN {
        let head: String = body.chars().take(MAX_ERROR_BODY_LEN).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    };

    let lower = truncated.to_lowercase();
    if SECRET_PATTERNS.iter().any(|p| lower.contains(p)) {
        return "(error details redacted - may contain sensitive data)".to_string();
    }
    truncated
}
