//! Command line entry point

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pv_app::{AppConfig, AppController};
use pv_core::{DatasetId, Row};
use pv_data::{DirectoryFetcher, FileManifest, FileStore, SessionManager, SharedFileLoader};
use pv_views::{CellDisplay, DatasetStats};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prospect", about = "Browse prospecting CSV files")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload CSV files into the session
    Load { files: Vec<PathBuf> },
    /// List datasets, or print one as a table
    Show { id: Option<String> },
    /// Write a dataset as CSV
    Export {
        id: Option<String>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Rename a tab; shared tab names are written to the preferences file
    Rename { id: String, name: String },
    /// Rewrite the file manifest of the data directory
    Index,
    /// Print session storage usage
    Storage,
    /// Drop every uploaded dataset and the saved session
    Clear,
}

type Controller = AppController<FileStore, DirectoryFetcher>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    if let Command::Index = cli.command {
        return index(&config);
    }

    let store = FileStore::open(&config.session_file, config.session.quota_limit);
    let session = SessionManager::new(store, config.session.clone());
    let loader = SharedFileLoader::new(DirectoryFetcher::new(&config.data_dir), config.discovery.clone());
    let mut controller = AppController::new(session, loader);

    // The local operator is trusted
    if !controller.is_authenticated() {
        controller.login();
    }
    let count = controller.restore().await;
    info!("{} datasets available", count);

    match cli.command {
        Command::Load { files } => load(&mut controller, &files)?,
        Command::Show { id } => show(&controller, &config, id)?,
        Command::Export { id, out } => export(&controller, id, out)?,
        Command::Rename { id, name } => rename(&mut controller, &config, id, &name)?,
        Command::Storage => {
            let storage = controller.storage_info();
            println!(
                "{} of {} bytes used ({:.1}%), {} bytes remaining{}",
                storage.current_size,
                storage.quota_limit,
                storage.usage_percent,
                storage.remaining,
                if storage.is_near_quota { ", near quota" } else { "" }
            );
        }
        Command::Clear => {
            controller.clear_all();
            println!("Session cleared");
        }
        Command::Index => {}
    }

    if let Some(warning) = controller.storage_warning() {
        eprintln!("warning: {}", warning);
    }
    if let Some(error) = controller.last_error() {
        eprintln!("error: {}", error);
    }
    Ok(())
}

fn index(config: &AppConfig) -> Result<()> {
    let manifest = FileManifest::scan_dir(&config.data_dir)
        .with_context(|| format!("Failed to scan {}", config.data_dir.display()))?;
    let path = config.data_dir.join(&config.discovery.manifest_file);
    manifest.save(&path)?;
    for entry in &manifest.files {
        println!("{}", entry.name);
    }
    Ok(())
}

fn load(controller: &mut Controller, files: &[PathBuf]) -> Result<()> {
    for path in files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let id = controller.upload(&name, &text)?;
        if let Some(dataset) = controller.dataset(&id) {
            println!("{}  {}: {}", id, dataset.display_name, DatasetStats::from_analysis(&dataset.analysis));
        }
    }
    Ok(())
}

fn rename(controller: &mut Controller, config: &AppConfig, id: String, name: &str) -> Result<()> {
    let id = DatasetId::from(id);
    if let Some(preferences) = controller.rename_tab(&id, name)? {
        let path = config.data_dir.join(&config.discovery.preferences_file);
        preferences.save(&path)?;
        println!("Saved tab preferences to {}", path.display());
    }
    Ok(())
}

fn resolve(controller: &Controller, id: Option<String>) -> Result<DatasetId> {
    match id {
        Some(id) => Ok(DatasetId::from(id)),
        None => controller
            .overlay()
            .active_file_id
            .clone()
            .context("No dataset is selected"),
    }
}

fn show(controller: &Controller, config: &AppConfig, id: Option<String>) -> Result<()> {
    if id.is_none() && controller.datasets().is_empty() {
        println!("No datasets loaded");
        return Ok(());
    }
    if id.is_none() {
        let active = controller.overlay().active_file_id.as_ref();
        for dataset in controller.datasets() {
            let marker = if Some(&dataset.id) == active { "*" } else { " " };
            let origin = if dataset.is_shared { "shared" } else { "upload" };
            println!(
                "{} {}  {} [{}]  {}",
                marker,
                dataset.id,
                dataset.display_name,
                origin,
                DatasetStats::from_analysis(&dataset.analysis)
            );
        }
        return Ok(());
    }

    let id = resolve(controller, id)?;
    let dataset = controller
        .dataset(&id)
        .with_context(|| format!("Unknown dataset: {}", id))?;
    let view = controller
        .table_view(&id, &config.table)
        .with_context(|| format!("Unknown dataset: {}", id))?;
    let columns = view.visible_columns();

    println!("{}", DatasetStats::from_analysis(&dataset.analysis));
    println!("{}", columns.join("\t"));
    for row in dataset.rows.iter().take(config.preview_rows) {
        println!("{}", format_row(&view, row, &columns));
    }
    if dataset.row_count() > config.preview_rows {
        println!("... {} more rows", dataset.row_count() - config.preview_rows);
    }
    Ok(())
}

fn format_row(view: &pv_views::TableView<'_>, row: &Row, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|column| match view.cell_display(row.get(*column).map(String::as_str), column) {
            CellDisplay::Empty => String::new(),
            CellDisplay::Json { preview, .. } => preview,
            CellDisplay::Markup(html) => html,
            CellDisplay::Text(text) => text,
        })
        .collect::<Vec<_>>()
        .join("\t")
}

fn export(controller: &Controller, id: Option<String>, out: Option<PathBuf>) -> Result<()> {
    let id = resolve(controller, id)?;
    let (file_name, csv) = controller.export(&id)?;
    let path = out.unwrap_or_else(|| PathBuf::from(file_name));
    std::fs::write(&path, csv).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Exported {}", path.display());
    Ok(())
}
