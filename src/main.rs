//! pagegit - per-site version history for a static-site editor
//!
//! This is the main entry point for the pagegit command-line interface.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;

use pagegit::config::EditorConfig;
use pagegit::status;
use pagegit::storage::{CommitId, RepoPath, SiteId, SiteRepository, StorageError};
use pagegit::sync::{DirectoryStore, EditorCache, MemoryStore, RemoteStore, SyncBridge};

#[derive(Debug, Parser)]
#[command(name = "pagegit", version, about = "Per-site version history for a static-site editor")]
struct Cli {
    /// Root directory holding one repository per site
    #[arg(long, env = "PAGEGIT_DATA_DIR", default_value = ".pagegit", global = true)]
    data_dir: PathBuf,

    /// Site identifier, shaped owner/site
    #[arg(long, env = "PAGEGIT_SITE", global = true)]
    site: Option<String>,

    /// Logged-in username used as commit author
    #[arg(long, env = "PAGEGIT_USER", global = true)]
    user: Option<String>,

    /// Directory standing in for the remote blob store
    #[arg(long, env = "PAGEGIT_REMOTE", global = true)]
    remote: Option<PathBuf>,

    /// Platform domain for synthesized author emails
    #[arg(long, env = "PAGEGIT_DOMAIN", default_value = "agorapages.com", global = true)]
    domain: String,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress logging
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the site repository (no-op if it exists)
    Init,
    /// List pending changes
    Status,
    /// Show last-commit and working-tree line diff of a file
    Diff { path: String },
    /// Show commit history, newest first
    Log {
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Stage all pending changes and commit them
    Commit {
        #[arg(short, long)]
        message: String,
    },
    /// Write a file into the working tree and stage it ("-" reads stdin)
    Write { path: String, source: PathBuf },
    /// Delete a file from the working tree and the stage
    Rm { path: String },
    /// Rename a file (recorded as delete + add)
    Mv { from: String, to: String },
    /// Print a file from the working tree or from a commit
    Cat {
        path: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Show what a commit changed under public/
    Show { commit: String },
    /// List the markdown pages of a commit as editor-cache JSON
    Pages { commit: String },
    /// Write an editor cache (JSON) into the working tree
    Materialize { cache: PathBuf },
    /// Bootstrap the site from the remote store, once
    Hydrate,
    /// Upload the working tree and history to the remote store
    Push {
        /// Delete remote public/ files that no longer exist locally
        #[arg(long)]
        prune: bool,
    },
    /// Render the commit-review preview
    Preview,
    /// Show repository summary
    Stats,
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // a clean tree is reported, but is not a failure
            if let Some(soft) = e
                .downcast_ref::<StorageError>()
                .filter(|e| matches!(e, StorageError::NothingToCommit))
            {
                println!("{}", soft);
                return ExitCode::SUCCESS;
            }
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_path(raw: &str) -> Result<RepoPath> {
    RepoPath::new(raw).with_context(|| format!("invalid path '{}'", raw))
}

fn parse_commit(raw: &str) -> Result<CommitId> {
    CommitId::from_hex(raw).with_context(|| format!("invalid commit id '{}'", raw))
}

async fn read_source(source: &Path) -> Result<Vec<u8>> {
    if source.as_os_str() == "-" {
        let mut data = Vec::new();
        tokio::io::stdin().read_to_end(&mut data).await?;
        Ok(data)
    } else {
        tokio::fs::read(source)
            .await
            .with_context(|| format!("reading {}", source.display()))
    }
}

/// Bridge over the configured remote directory.
///
/// Commands that never reach the remote get an empty in-memory store.
fn bridge(cli: &Cli, config: &EditorConfig, needs_remote: bool) -> Result<SyncBridge> {
    let store: Arc<dyn RemoteStore> = match &cli.remote {
        Some(dir) => Arc::new(DirectoryStore::new(dir.clone())),
        None if needs_remote => anyhow::bail!("no remote given (use --remote or PAGEGIT_REMOTE)"),
        None => Arc::new(MemoryStore::new()),
    };
    Ok(SyncBridge::new(store, config.clone()))
}

async fn run(cli: &Cli) -> Result<()> {
    let config = EditorConfig::new(cli.data_dir.clone()).platform_domain(cli.domain.clone());
    let site: SiteId = cli
        .site
        .as_deref()
        .context("no site given (use --site or PAGEGIT_SITE)")?
        .parse()
        .context("invalid site id")?;
    let author = config.signature(cli.user.as_deref());

    match &cli.command {
        Commands::Hydrate => {
            let bridge = bridge(cli, &config, true)?;
            let (_, outcome) = bridge.hydrate_from_remote(config.site_fs(site), &author).await?;
            println!("{:?}", outcome);
            return Ok(());
        }
        Commands::Init => {
            let repo = config.open_site(site).await?;
            println!("{}", repo.stats().await?);
            return Ok(());
        }
        _ => {}
    }

    let repo = SiteRepository::open(config.site_fs(site))?;

    match &cli.command {
        Commands::Hydrate | Commands::Init => {}
        Commands::Status => {
            let entries = status::status(&repo).await?;
            if entries.is_empty() {
                println!("nothing to commit, working tree clean");
            }
            for entry in entries {
                println!("{} {}", entry.status.symbol(), entry.path);
            }
        }
        Commands::Diff { path } => {
            let diff = status::diff(&repo, &parse_path(path)?).await?;
            for line in diff.lines() {
                println!("{}", line);
            }
        }
        Commands::Log { depth } => {
            let mut any = false;
            for commit in repo.log(depth.unwrap_or(config.log_depth))? {
                let commit = commit?;
                any = true;
                println!(
                    "{} {} {} {}",
                    commit.short_id(),
                    commit.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    commit.author_name,
                    commit.summary()
                );
            }
            if !any {
                println!("No commits yet.");
            }
        }
        Commands::Commit { message } => {
            let id = repo.commit(message, &author).await?;
            println!("{}", id.short());
        }
        Commands::Write { path, source } => {
            let data = read_source(source).await?;
            repo.write_file(&parse_path(path)?, &data).await?;
        }
        Commands::Rm { path } => repo.delete_file(&parse_path(path)?).await?,
        Commands::Mv { from, to } => {
            repo.rename_file(&parse_path(from)?, &parse_path(to)?).await?
        }
        Commands::Cat { path, at } => {
            let path = parse_path(path)?;
            let data = match at {
                Some(at) => repo.read_blob_at_commit(parse_commit(at)?, &path)?,
                None => repo.read_file(&path).await?,
            };
            print!("{}", String::from_utf8_lossy(&data));
        }
        Commands::Show { commit } => {
            let id = parse_commit(commit)?;
            let info = repo.get_commit(id)?;
            println!("commit {}", info.id);
            println!("Author: {} <{}>", info.author_name, info.author_email);
            println!("Date:   {}", info.timestamp.to_rfc3339());
            println!();
            println!("    {}", info.message.trim_end());
            for change in status::detailed_commit_changes(&repo, id, config.commit_diff_lines)? {
                println!();
                println!("{} {}", change.status, change.file);
                for line in &change.diff {
                    println!("{}", line);
                }
                if change.truncated {
                    println!("...");
                }
            }
        }
        Commands::Pages { commit } => {
            let pages = bridge(cli, &config, false)?.markdown_pages_at_commit(&repo, parse_commit(commit)?)?;
            println!("{}", serde_json::to_string_pretty(&pages)?);
        }
        Commands::Materialize { cache } => {
            let data = read_source(cache).await?;
            let cache: EditorCache = serde_json::from_slice(&data).context("parsing editor cache")?;
            bridge(cli, &config, false)?
                .materialize_cache(&repo, &cache)
                .await?;
        }
        Commands::Push { prune } => {
            let config = config.clone().prune_remote(*prune);
            let report = bridge(cli, &config, true)?.push_snapshot(&repo).await?;
            println!("{}", report);
        }
        Commands::Preview => {
            let preview = bridge(cli, &config, false)?.render_change_preview(&repo).await?;
            print!("{}", preview);
        }
        Commands::Stats => println!("{}", repo.stats().await?),
    }

    Ok(())
}
