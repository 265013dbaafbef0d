//! Jira issues updated since a date
//!
//! Basic auth with the account email and an API token. Jira Cloud serves
//! `/rest/api/3/search/jql` with token pagination; servers without it answer
//! 404 or 410 and are searched through the older `/rest/api/2/search`.

use super::{http_client, FetchError, IssueSource};
use chrono::{DateTime, Local, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

const PAGE_SIZE: usize = 50;
const MAX_PAGES: usize = 20;
const FIELDS: &str = "summary,status,assignee,updated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub assignee: Option<String>,
    pub updated: DateTime<Utc>,
}

/// One page of `/rest/api/3/search/jql`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JqlSearchResponse {
    #[serde(default)]
    issues: Vec<ApiIssue>,
    next_page_token: Option<String>,
    #[serde(default)]
    is_last: bool,
}

impl JqlSearchResponse {
    /// Token for the following page, `None` on the last one
    fn next_token(&self) -> Option<String> {
        if self.is_last || self.issues.is_empty() {
            return None;
        }
        self.next_page_token.clone().filter(|t| !t.is_empty())
    }
}

/// One page of the older `/rest/api/2/search`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    start_at: usize,
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<ApiIssue>,
}

#[derive(Deserialize)]
struct ApiIssue {
    key: String,
    fields: ApiFields,
}

#[derive(Deserialize)]
struct ApiFields {
    #[serde(default)]
    summary: String,
    status: Option<ApiNamed>,
    assignee: Option<ApiUser>,
    updated: Option<String>,
}

#[derive(Deserialize)]
struct ApiNamed {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUser {
    display_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrors {
    #[serde(default)]
    error_messages: Vec<String>,
}

pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
    jql: Option<String>,
}

impl JiraClient {
    pub fn new(
        base_url: &str,
        email: &str,
        api_token: &str,
        jql: Option<String>,
    ) -> Result<Self, FetchError> {
        if base_url.trim().is_empty() || email.trim().is_empty() || api_token.trim().is_empty() {
            return Err(FetchError::Config(
                "jira needs base_url, email and api_token".to_string(),
            ));
        }
        Ok(Self {
            http: http_client()?,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            email: email.trim().to_string(),
            api_token: api_token.trim().to_string(),
            jql: jql.filter(|j| !j.trim().is_empty()),
        })
    }

    /// `Ok(None)` when the endpoint does not exist on this server
    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>, FetchError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.email, Some(&self.api_token))
            .header("Accept", "application/json")
            .query(params)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }
        resp.json().await.map(Some).map_err(FetchError::from_reqwest)
    }

    async fn search_jql(
        &self,
        jql: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Vec<Issue>>, FetchError> {
        let mut issues = Vec::new();
        let mut token: Option<String> = None;
        for page_number in 0..MAX_PAGES {
            let mut params = vec![
                ("jql", jql.to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
                ("fields", FIELDS.to_string()),
            ];
            if let Some(token) = &token {
                params.push(("nextPageToken", token.clone()));
            }
            let page: JqlSearchResponse =
                match self.get_page("/rest/api/3/search/jql", &params).await? {
                    Some(page) => page,
                    None if page_number == 0 => return Ok(None),
                    None => {
                        return Err(FetchError::Api(
                            "Jira search endpoint disappeared while paging".to_string(),
                        ))
                    }
                };
            token = page.next_token();
            issues.extend(convert_page(page.issues, since));
            if token.is_none() {
                break;
            }
        }
        Ok(Some(issues))
    }

    async fn search_legacy(&self, jql: &str, since: DateTime<Utc>) -> Result<Vec<Issue>, FetchError> {
        let mut issues = Vec::new();
        let mut start_at = 0usize;
        for _ in 0..MAX_PAGES {
            let params = [
                ("jql", jql.to_string()),
                ("startAt", start_at.to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
                ("fields", FIELDS.to_string()),
            ];
            let page: SearchResponse = self
                .get_page("/rest/api/2/search", &params)
                .await?
                .ok_or_else(|| FetchError::Api("Jira search endpoint not found".to_string()))?;
            let fetched = page.issues.len();
            issues.extend(convert_page(page.issues, since));

            start_at = page.start_at + fetched;
            if fetched == 0 || start_at >= page.total {
                break;
            }
        }
        Ok(issues)
    }

    async fn search(&self, since: DateTime<Utc>) -> Result<Vec<Issue>, FetchError> {
        let jql = build_jql(since, self.jql.as_deref());
        debug!(jql = %jql, "searching jira");

        let mut issues = match self.search_jql(&jql, since).await? {
            Some(issues) => issues,
            None => {
                debug!("search/jql unavailable, using the v2 search endpoint");
                self.search_legacy(&jql, since).await?
            }
        };

        issues.sort_by(|a, b| b.updated.cmp(&a.updated).then_with(|| a.key.cmp(&b.key)));
        Ok(issues)
    }
}

impl IssueSource for JiraClient {
    fn issues_since(&self, since: DateTime<Utc>) -> BoxFuture<'_, Result<Vec<Issue>, FetchError>> {
        self.search(since).boxed()
    }
}

/// JQL dates are interpreted in the Jira user's timezone; local time is the
/// closest approximation available here.
fn build_jql(since: DateTime<Utc>, extra: Option<&str>) -> String {
    let cutoff = format!(
        "updated >= \"{}\"",
        since.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    );
    match extra {
        Some(extra) => format!("({}) AND {} ORDER BY updated DESC", extra.trim(), cutoff),
        None => format!("{} ORDER BY updated DESC", cutoff),
    }
}

fn convert_page(raw: Vec<ApiIssue>, since: DateTime<Utc>) -> Vec<Issue> {
    raw.into_iter()
        .filter_map(|issue| {
            let updated = match issue.fields.updated.as_deref().map(parse_jira_time) {
                Some(Some(t)) => t,
                _ => {
                    warn!(key = %issue.key, "issue without a readable update time");
                    return None;
                }
            };
            (updated > since).then(|| Issue {
                key: issue.key,
                summary: issue.fields.summary,
                status: issue
                    .fields
                    .status
                    .map(|s| s.name)
                    .unwrap_or_else(|| "Unknown".to_string()),
                assignee: issue.fields.assignee.map(|a| a.display_name),
                updated,
            })
        })
        .collect()
}

/// Jira emits `2024-03-01T10:00:00.000+0000`, which is not quite RFC 3339
fn parse_jira_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn classify_error(status: StatusCode, body: &str) -> FetchError {
    let detail = serde_json::from_str::<ApiErrors>(body)
        .ok()
        .and_then(|e| e.error_messages.into_iter().next())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimit(detail),
        StatusCode::BAD_REQUEST => FetchError::Format(format!("jira rejected the query: {}", detail)),
        _ => FetchError::Api(format!("Jira error ({}): {}", status, detail)),
    }
}
