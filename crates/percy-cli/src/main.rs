//! Percy CLI - visual regression builds from the command line
//!
//! ## Commands
//!
//! - `env`: Print the resolved CI environment as JSON
//! - `snapshot`: Upload a static asset directory plus one HTML page as a
//!   complete build (create, snapshot, finalize)

mod telemetry;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use percy_client::{
    BuildOptions, Config, DirectoryLoader, PercyClient, Runner, SnapshotOptions, StaticPage,
};
use percy_env::Environment;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "percy")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Percy visual regression client", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved CI environment as JSON
    Env,

    /// Upload a static directory and one page as a complete build
    Snapshot {
        /// Directory of static assets offered as build resources
        #[arg(long)]
        root_dir: PathBuf,

        /// URL prefix the assets are served under
        #[arg(long, default_value = "/")]
        base_url: String,

        /// HTML file to snapshot
        #[arg(long)]
        page: PathBuf,

        /// URL the page is served at (only the path is sent)
        #[arg(long, default_value = "http://localhost/")]
        page_url: String,

        /// Snapshot name
        #[arg(short, long)]
        name: Option<String>,

        /// Comma-separated widths (default: PERCY_DEFAULT_WIDTHS)
        #[arg(long, value_delimiter = ',')]
        widths: Vec<u32>,

        /// Render the snapshot with JavaScript enabled
        #[arg(long)]
        enable_javascript: bool,

        /// Repository slug (owner/repo), overriding detection
        #[arg(long, env = "PERCY_REPO_SLUG")]
        repo: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Env => cmd_env(),
        Commands::Snapshot {
            root_dir,
            base_url,
            page,
            page_url,
            name,
            widths,
            enable_javascript,
            repo,
        } => {
            let options = SnapshotOptions {
                name,
                enable_javascript: enable_javascript.then_some(true),
                widths: (!widths.is_empty()).then_some(widths),
            };
            cmd_snapshot(&root_dir, &base_url, &page, &page_url, repo, &options)
        }
    }
}

fn cmd_env() -> Result<()> {
    let snapshot = Environment::from_process()
        .snapshot()
        .context("Failed to resolve build environment")?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn cmd_snapshot(
    root_dir: &Path,
    base_url: &str,
    page: &Path,
    page_url: &str,
    repo: Option<String>,
    options: &SnapshotOptions,
) -> Result<()> {
    let html = read_page(page)?;

    let client = PercyClient::new(Config::from_env(), Environment::from_process())
        .context("Failed to create Percy client")?;
    let loader =
        DirectoryLoader::new(root_dir, base_url).with_page(StaticPage::new(page_url, html));
    let mut runner = Runner::new(client, Some(Box::new(loader)));

    if !runner.is_enabled() {
        info!("Percy is disabled; nothing uploaded");
        return Ok(());
    }

    let build_options = BuildOptions {
        repo,
        ..BuildOptions::default()
    };
    runner
        .initialize_build(&build_options)
        .context("Failed to create build")?;
    if let Some(build_id) = runner.build_id()? {
        println!("Build: {build_id}");
    }
    runner.snapshot(options).context("Failed to snapshot page")?;
    runner.finalize_build().context("Failed to finalize build")?;

    println!("✓ Build finalized");
    Ok(())
}

fn read_page(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).context(format!("Failed to read page: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snapshot_arguments() {
        let cli = Cli::try_parse_from([
            "percy",
            "snapshot",
            "--root-dir",
            "dist",
            "--page",
            "dist/index.html",
            "--widths",
            "375,1280",
            "--enable-javascript",
        ])
        .unwrap();

        match cli.command {
            Commands::Snapshot {
                root_dir,
                base_url,
                widths,
                enable_javascript,
                ..
            } => {
                assert_eq!(root_dir, PathBuf::from("dist"));
                assert_eq!(base_url, "/");
                assert_eq!(widths, vec![375, 1280]);
                assert!(enable_javascript);
            }
            Commands::Env => panic!("expected snapshot command"),
        }
    }

    #[test]
    fn parses_env_with_global_flags() {
        let cli = Cli::try_parse_from(["percy", "env", "--json", "-v"]).unwrap();
        assert!(cli.json);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Env));
    }

    #[test]
    fn read_page_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.html");
        std::fs::write(&page, "<html></html>").unwrap();
        assert_eq!(read_page(&page).unwrap(), "<html></html>");

        let err = read_page(&dir.path().join("missing.html")).unwrap_err();
        assert!(err.to_string().contains("missing.html"));
    }
}
