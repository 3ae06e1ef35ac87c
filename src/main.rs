use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vaultsite::config::{self, BuildOptions, CliOverrides};
use vaultsite::diagnostics::TracingSink;
use vaultsite::{output, pipeline, watch};

/// Flags that override `blog.toml` for every command.
#[derive(clap::Args, Clone, Default)]
struct OverrideArgs {
    /// Markdown vault directory
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Output directory
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Extra exclude glob (repeatable), added to the configured ones
    #[arg(long, global = true)]
    exclude: Vec<String>,

    /// Days a dated document keeps its NEW badge
    #[arg(long, global = true)]
    new_within_days: Option<u32>,

    /// Number of entries in the Recent folder
    #[arg(long, global = true)]
    recent_limit: Option<u32>,
}

impl OverrideArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            vault: self.vault.clone(),
            out: self.out.clone(),
            exclude: self.exclude.clone(),
            new_within_days: self.new_within_days,
            recent_limit: self.recent_limit,
        }
    }
}

#[derive(Parser)]
#[command(name = "vaultsite")]
#[command(about = "Incremental static site generator for markdown vaults")]
#[command(long_about = "\
Incremental static site generator for markdown vaults

Every note with `publish: true` in its frontmatter becomes a page. The site
is a file-explorer UI over the vault's folder structure, with wikilinks
resolved between notes.

Vault structure:

  vault/
  ├── .obsidian/               # Ignored
  ├── index.md                 # publish: true → home page (/index/)
  ├── posts/
  │   ├── hello.md             # publish: true → /posts/hello/
  │   └── draft.md             # publish: true, draft: true → skipped
  └── private.md               # no publish flag → skipped

Output:

  dist/
  ├── index.html, 404.html     # Shell pages
  ├── manifest.json            # Tree, routes and doc metadata for the UI
  ├── content/<hash>.html      # Rendered fragments
  ├── posts/hello/index.html   # One shell per route
  └── assets/app.<hash>.js|css

Unchanged notes are not re-rendered and unchanged files are not rewritten.
Run 'vaultsite gen-config' to generate a documented blog.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Build the site once (default)
    Build,
    /// Build, then rebuild whenever a markdown file changes
    Dev,
    /// Remove the output and cache directories
    Clean,
    /// Print a stock blog.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Build) {
        Command::Build => {
            let options = build_options(&cli)?;
            let mut sink = TracingSink::default();
            let report = pipeline::build_site(&options, &mut sink)?;
            output::print_build_output(&report, &options.out_dir);
        }
        Command::Dev => {
            let options = build_options(&cli)?;
            let mut sink = TracingSink::default();
            watch::run_dev(&options, &mut sink, |report| {
                output::print_build_output(report, &options.out_dir)
            })?;
        }
        Command::Clean => {
            let options = build_options(&cli)?;
            pipeline::clean(&options)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load `blog.toml` and apply the command-line overrides.
fn build_options(cli: &Cli) -> Result<BuildOptions, Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    let site_config = config::load_config(&cli.config)?;
    let options = config::resolve_build_options(&site_config, &cli.overrides.overrides(), &cwd)?;
    Ok(options)
}
