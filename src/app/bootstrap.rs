//! Startup wiring: configuration in, sources and panels out

use crate::commits::remote::{redact_url, RepoSlug};
use crate::commits::{GitHubClient, LocalCollector, RemoteCollector};
use crate::config::{Config, GitConfig};
use crate::sources::{
    CommitSource, CommitSources, IssueSource, JiraClient, MessageSource, SlackClient, Sources,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Build every source the configuration enables. An incomplete section
/// disables that source with a warning rather than failing startup.
pub fn build_sources(config: &Config) -> Sources {
    Sources {
        commits: build_commit_sources(&config.git)
            .map(|sources| Arc::new(sources) as Arc<dyn CommitSource>),
        issues: build_jira(config),
        messages: build_slack(config),
    }
}

fn build_commit_sources(git: &GitConfig) -> Option<CommitSources> {
    let mut sources: Vec<Arc<dyn CommitSource>> = Vec::new();

    for path in &git.local {
        sources.push(Arc::new(LocalCollector::new(path.clone())));
    }

    if !git.github.is_empty() {
        match GitHubClient::new(git.github_token.clone()) {
            Ok(client) => {
                let client = Arc::new(client);
                for url in &git.github {
                    // Reject bad URLs here so the panel is not spoiled by one typo
                    if let Err(e) = RepoSlug::parse(url) {
                        warn!(url = %redact_url(url), error = %e, "skipping GitHub repository");
                        continue;
                    }
                    sources.push(Arc::new(RemoteCollector::new(client.clone(), url.as_str())));
                }
            }
            Err(e) => warn!(error = %e, "GitHub sources disabled"),
        }
    }

    if sources.is_empty() {
        return None;
    }
    info!(count = sources.len(), "commit sources configured");
    Some(CommitSources::new(sources))
}

fn build_jira(config: &Config) -> Option<Arc<dyn IssueSource>> {
    let settings = match config.validate_jira() {
        Ok(settings) => settings?,
        Err(e) => {
            warn!(error = %e, "Jira panel disabled");
            return None;
        }
    };
    match JiraClient::new(
        &settings.base_url,
        &settings.email,
        &settings.api_token,
        settings.jql,
    ) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "Jira panel disabled");
            None
        }
    }
}

fn build_slack(config: &Config) -> Option<Arc<dyn MessageSource>> {
    let settings = match config.validate_slack() {
        Ok(settings) => settings?,
        Err(e) => {
            warn!(error = %e, "Slack panel disabled");
            return None;
        }
    };
    match SlackClient::new(&settings.token, settings.channels) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "Slack panel disabled");
            None
        }
    }
}

/// Fall back to `dir` when no Git source is configured and it is a repository
pub fn default_local_repo(git: &mut GitConfig, dir: &Path) {
    if !git.local.is_empty() || !git.github.is_empty() {
        return;
    }
    let Ok(repo) = git2::Repository::discover(dir) else {
        return;
    };
    // `dir` may be a subdirectory; the collector opens the repository root
    let root = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
    info!(path = %root.display(), "using current repository");
    git.local.push(root);
}
