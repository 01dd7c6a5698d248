//! `bundle-loader` command line interface.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bundle_loader::bootstrap::Bootstrap;
use bundle_loader::config::LoaderConfig;
use bundle_loader::document::fs_fetch::FsFetch;
use bundle_loader::document::page::HtmlPage;
use bundle_loader::resolver::{Resolver, derive_base_path, parse_list, requested_bundles};

#[derive(Debug, Parser)]
#[command(name = "bundle-loader", version, about = "Resolve and inject named resource bundles")]
struct Cli {
  /// Loader configuration file. Defaults to `bundle-loader.json` in the working directory.
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// List the bundles in the catalog.
  Bundles,
  /// Print the manifest for a set of attributes.
  Resolve(ResolveArgs),
  /// Apply the loader to a static HTML page.
  Render(RenderArgs),
}

#[derive(Debug, Args)]
struct ResolveArgs {
  /// Comma separated bundle names.
  #[arg(long)]
  load: Option<String>,
  /// Comma separated extra resources, not base relative.
  #[arg(long)]
  extra: Option<String>,
  /// Location of the loader script, used to derive the base path.
  #[arg(long)]
  src: Option<String>,
  /// Print the manifest as JSON.
  #[arg(long)]
  json: bool,
}

#[derive(Debug, Args)]
struct RenderArgs {
  /// HTML page holding the loader's script tag.
  page: PathBuf,
  /// Directory template fragments are read from. Defaults to the page's directory.
  #[arg(long)]
  root: Option<PathBuf>,
  /// Write the rendered page here instead of stdout.
  #[arg(long, short)]
  output: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let config = match &cli.config {
    Some(path) => LoaderConfig::load(path)?,
    None => LoaderConfig::discover(Path::new(".")),
  };

  match cli.command {
    Command::Bundles => list_bundles(&config),
    Command::Resolve(args) => resolve(&config, &args),
    Command::Render(args) => render(&config, &args).await,
  }
}

fn list_bundles(config: &LoaderConfig) -> Result<()> {
  let catalog = config.catalog();
  for (name, paths) in catalog.iter() {
    let marker = if name == config.default_bundle { " (default)" } else { "" };
    println!("{name}{marker}");
    for path in paths {
      println!("  {path}");
    }
  }
  Ok(())
}

fn resolve(config: &LoaderConfig, args: &ResolveArgs) -> Result<()> {
  let resolver = Resolver::new(Arc::new(config.catalog()));
  let requested = requested_bundles(args.load.as_deref(), &config.default_bundle);
  let extras = parse_list(args.extra.as_deref());
  let base_path = derive_base_path(args.src.as_deref(), &config.marker);

  let manifest = resolver.manifest(&requested, &extras, &base_path);
  if args.json {
    println!(
      "{}",
      serde_json::to_string_pretty(&manifest).context("failed to serialise manifest")?
    );
  } else {
    for path in manifest.paths() {
      println!("{path}");
    }
  }
  Ok(())
}

async fn render(config: &LoaderConfig, args: &RenderArgs) -> Result<()> {
  let page = Arc::new(HtmlPage::read(&args.page, &config.marker)?);
  let root = match &args.root {
    Some(root) => root.clone(),
    None => args
      .page
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default(),
  };

  let report = Bootstrap::new(config)
    .run(page.clone(), Some(Arc::new(FsFetch::new(root))))
    .await
    .with_context(|| format!("failed to load bundles for {}", args.page.display()))?;
  report.pending.settle().await;

  let html = page.render();
  match &args.output {
    Some(output) => fs::write(output, html)
      .with_context(|| format!("failed to write {}", output.display())),
    None => {
      print!("{html}");
      Ok(())
    }
  }
}
