use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use std::path::PathBuf;
use void_tui::app::bootstrap::{build_sources, default_local_repo};
use void_tui::app::command::{days_ago, parse_since, CommandRegistry};
use void_tui::app::dashboard::Dashboard;
use void_tui::commits::{FilterSpec, SourceQuery};
use void_tui::config::Config;
use void_tui::sources::{CommitSource, Sources};
use void_tui::ui::panels::format_time_ago;
use void_tui::ui::App;
use void_tui::util::pad_to_width;
use void_tui::{app, logging};

#[derive(Parser, Debug)]
#[command(
    name = "void",
    about = "Commits, Jira issues and Slack messages since a date, in one terminal dashboard",
    version
)]
struct Args {
    /// Local repository to read commits from (repeatable)
    #[arg(long = "repo", value_name = "PATH")]
    repos: Vec<PathBuf>,

    /// GitHub repository URL to read commits from (repeatable)
    #[arg(long = "github", value_name = "URL")]
    github: Vec<String>,

    /// Start date: YYYY-MM-DD, today, yesterday or <n>d (default: config lookback)
    #[arg(short, long)]
    since: Option<String>,

    /// Only commits by this author (repeatable, substring match)
    #[arg(long = "author", value_name = "NAME")]
    authors: Vec<String>,

    /// Only commits on this branch (repeatable, substring match)
    #[arg(long = "branch", value_name = "NAME")]
    branches: Vec<String>,

    /// Log at info level instead of warn
    #[arg(short, long)]
    verbose: bool,

    /// Write a template config if none exists and print its path
    #[arg(long)]
    init_config: bool,

    /// Print matching commits and exit (no TUI)
    #[arg(short, long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = logging::init(args.verbose) {
        eprintln!("  Warning: logging disabled: {:#}", e);
    }

    if args.init_config {
        return init_config();
    }

    let mut config = Config::load();
    config.apply_env();
    config.git.local.extend(args.repos);
    config.git.github.extend(args.github);
    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    default_local_repo(&mut config.git, &cwd);

    let today = Local::now().date_naive();
    let since = match &args.since {
        Some(raw) => parse_since(raw, today)?,
        None => days_ago(today, config.lookback_days)?,
    };
    let filter = FilterSpec::new()
        .with_authors(&args.authors)
        .with_branches(&args.branches);
    let sources = build_sources(&config);

    if args.check {
        return run_check(&sources, SourceQuery::since(since).with_filter(filter)).await;
    }

    let kinds = sources.enabled();
    if kinds.is_empty() {
        bail!(
            "nothing to show: run inside a Git repository, pass --repo or --github, or edit {}",
            Config::config_location()
        );
    }

    let dashboard = Dashboard::for_kinds(&kinds, since).with_filter(filter);
    let app = App::new(dashboard, CommandRegistry::new());
    app::run_tui(app, sources).await
}

fn init_config() -> Result<()> {
    match Config::config_path() {
        Some(path) if path.exists() => {
            println!("Config already exists at {}", path.display());
        }
        _ => {
            let path = Config::template().save()?;
            println!("Wrote a template config to {}", path.display());
        }
    }
    Ok(())
}

/// One commit query, printed as a table
async fn run_check(sources: &Sources, query: SourceQuery) -> Result<()> {
    let Some(source) = &sources.commits else {
        bail!("no Git source configured; pass --repo or --github");
    };
    let commits = source.collect(&query).await?;
    let now = Utc::now();

    println!();
    println!(
        "  {} commit(s) since {}  (filter: {})",
        commits.len(),
        query.since.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        query.filter
    );
    println!();
    for commit in &commits {
        println!(
            "  {}  {}  {}  {}  {}",
            commit.short_hash(),
            pad_to_width(commit.branch(), 16),
            pad_to_width(commit.author(), 18),
            pad_to_width(commit.summary(), 60),
            format_time_ago(now, commit.timestamp())
        );
    }
    if commits.is_empty() {
        println!("  Nothing new in this window");
    }
    println!();
    Ok(())
}
