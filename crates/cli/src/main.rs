use ai_pipeline::{GeneratorConfig, ImageModel};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use exporters::{export_project, DirectoryExporter, DriveUploader, ExportSink};
use project::{JsonFileKv, ProjectId, ProjectStore, SqliteKv};
use session::ProjectSession;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod repl;

#[derive(Parser)]
#[command(name = "mangastrip")]
#[command(about = "Manga strip generator - build consistent comic strips one frame at a time")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project store; a `.json` path uses a JSON file, anything else SQLite
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Generator configuration file (JSON); defaults to the environment
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Image model (dall-e-2, dall-e-3)
    #[arg(long, global = true)]
    model: Option<ImageModel>,

    /// Simulated latency in demo mode
    #[arg(long, global = true)]
    demo_delay_ms: Option<u64>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored projects
    List,

    /// Delete a project
    Delete {
        /// Project id
        id: String,
    },

    /// Export a project's frames
    Export {
        /// Project id
        id: String,

        /// Output directory
        #[arg(required_unless_present = "drive_token")]
        output: Option<PathBuf>,

        /// Upload to Google Drive with this OAuth access token instead
        #[arg(long, env = "MANGASTRIP_DRIVE_TOKEN", hide_env_values = true)]
        drive_token: Option<String>,
    },

    /// Show the resolved generator configuration
    Config,

    /// Interactive editing shell
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = resolve_config(&cli)?;
    match cli.command {
        Commands::List => list_command(open_store(cli.store.as_deref())?),
        Commands::Delete { ref id } => delete_command(&cli, &config, id),
        Commands::Export {
            ref id,
            ref output,
            ref drive_token,
        } => export_command(&cli, id, output.as_deref(), drive_token.as_deref()).await,
        Commands::Config => config_command(&config),
        Commands::Shell => shell_command(&cli, &config).await,
    }
}

fn resolve_config(cli: &Cli) -> Result<GeneratorConfig> {
    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::from_env()?,
    };
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(delay) = cli.demo_delay_ms {
        config.demo_delay_ms = delay;
    }
    Ok(config)
}

fn open_store(path: Option<&Path>) -> Result<ProjectStore> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => project::default_db_path(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    info!("Using project store: {}", path.display());
    if is_json {
        Ok(ProjectStore::new(JsonFileKv::new(path)))
    } else {
        Ok(ProjectStore::new(SqliteKv::open_or_create(&path)?))
    }
}

fn open_session(cli: &Cli, config: &GeneratorConfig) -> Result<ProjectSession> {
    let store = open_store(cli.store.as_deref())?;
    let pipeline = config.build_pipeline()?;
    if pipeline.is_ai_enabled() {
        info!("AI generation enabled ({})", config.model);
    } else {
        info!("No API key configured; running in demo mode");
    }
    Ok(ProjectSession::open(store, pipeline).with_model(config.model))
}

fn list_command(store: ProjectStore) -> Result<()> {
    let projects = store.load();
    if projects.is_empty() {
        println!("No projects");
        return Ok(());
    }
    for project in projects {
        println!(
            "{}  {}  {} frame(s)  modified {}",
            project.id,
            project.name,
            project.frames.len(),
            project.last_modified.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn delete_command(cli: &Cli, config: &GeneratorConfig, id: &str) -> Result<()> {
    let mut session = open_session(cli, config)?;
    let removed = session.delete_project(&ProjectId::from(id))?;
    if let Some(notice) = session.notice() {
        anyhow::bail!("{notice}");
    }
    println!("Deleted \"{}\"", removed.name);
    Ok(())
}

async fn export_command(
    cli: &Cli,
    id: &str,
    output: Option<&Path>,
    drive_token: Option<&str>,
) -> Result<()> {
    let store = open_store(cli.store.as_deref())?;
    let project = store
        .load()
        .into_iter()
        .find(|p| p.id.as_str() == id)
        .with_context(|| format!("project not found: {id}"))?;

    let sink: Box<dyn ExportSink> = match (drive_token, output) {
        (Some(token), _) => Box::new(DriveUploader::new(token)),
        (None, Some(dir)) => Box::new(DirectoryExporter::new(dir)),
        (None, None) => anyhow::bail!("give an output directory or --drive-token"),
    };
    let report = export_project(sink.as_ref(), &project).await;
    println!(
        "Exported {}/{} frame(s) of \"{}\" via {}",
        report.uploaded.len(),
        project.frames.len(),
        project.name,
        sink.name()
    );
    if !report.is_complete() {
        anyhow::bail!("failed to export: {}", report.failed.join(", "));
    }
    Ok(())
}

fn config_command(config: &GeneratorConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    println!(
        "mode: {}",
        if config.is_ai_enabled() { "ai" } else { "demo" }
    );
    println!("default store: {}", project::default_db_path().display());
    Ok(())
}

async fn shell_command(cli: &Cli, config: &GeneratorConfig) -> Result<()> {
    let mut session = open_session(cli, config)?;
    repl::run(&mut session).await
}
