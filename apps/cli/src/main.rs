use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use datadesk_workspace::{
    AppConfig, ConfigStore, DatasetStore, Session, SessionObserver, TabularDataset,
    WorkspaceError, WorkspaceId, WorkspaceRegistry, CANONICAL_DATASET,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "datadesk-cli",
    about = "Manage DataDesk workspaces and datasets",
    author,
    version
)]
struct Cli {
    /// 存放工作區的根目錄；優先於設定檔。 / Directory holding the workspaces; overrides the config file.
    #[arg(long, global = true, value_name = "DIR", env = "DATADESK_ROOT")]
    root: Option<PathBuf>,

    /// 設定檔路徑；未指定時使用預設值。 / Configuration file; defaults apply when omitted.
    #[arg(long, global = true, value_name = "FILE", env = "DATADESK_CONFIG")]
    config: Option<PathBuf>,

    /// 提高記錄詳細程度（可重複）。 / Increase log verbosity (repeatable).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 建立、列出與管理工作區。 / Create, list and manage workspaces.
    #[command(subcommand)]
    Workspace(WorkspaceCommand),
    /// 管理工作區內的資料檔。 / Manage dataset files inside a workspace.
    #[command(subcommand)]
    Dataset(DatasetCommand),
    /// 檢視、匯出與提升資料集內容。 / Inspect, export and promote dataset contents.
    #[command(subcommand)]
    Data(DataCommand),
    /// 檢視或修改設定檔。 / Show or change the configuration file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// 以 JSON 顯示目前生效的設定。 / Print the effective configuration as JSON.
    Show,
    /// 修改單一設定值並寫回設定檔。 / Change one setting and write the file back.
    Set { key: ConfigKey, value: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ConfigKey {
    WorkspacesRoot,
    DefaultWorkspaceName,
    CreateDefaultWorkspace,
}

#[derive(Subcommand)]
enum WorkspaceCommand {
    /// 列出所有工作區。 / List every workspace.
    List,
    /// 以最小可用代號建立工作區。 / Create a workspace under the smallest free id.
    Create {
        /// 工作區名稱；空白時使用 "Workspace N"。 / Workspace name; blank yields "Workspace N".
        name: Option<String>,
    },
    /// 重新命名工作區。 / Rename a workspace.
    Rename { id: WorkspaceId, name: String },
    /// 永久刪除工作區。 / Permanently delete a workspace.
    Delete(ConfirmedId),
    /// 開啟工作區並更新開啟時間。 / Open a workspace and record the open time.
    Open { id: WorkspaceId },
    /// 重新計算並儲存工作區計數。 / Recount artifacts and store them in the metadata.
    Refresh { id: WorkspaceId },
}

#[derive(Args)]
struct ConfirmedId {
    id: WorkspaceId,
    /// 確認執行不可復原的刪除。 / Confirm the irreversible deletion.
    #[arg(long)]
    yes: bool,
}

#[derive(Subcommand)]
enum DatasetCommand {
    /// 列出工作區的資料檔。 / List the dataset files of a workspace.
    List { id: WorkspaceId },
    /// 將外部 CSV 複製進工作區。 / Copy an external CSV file into the workspace.
    Import {
        id: WorkspaceId,
        file: PathBuf,
        /// 覆寫同名資料檔。 / Replace a dataset with the same filename.
        #[arg(long)]
        overwrite: bool,
    },
    /// 重新命名資料檔。 / Rename a dataset file.
    Rename {
        id: WorkspaceId,
        old: String,
        new: String,
    },
    /// 刪除資料檔。 / Delete a dataset file.
    Delete {
        id: WorkspaceId,
        name: String,
        /// 確認刪除。 / Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum DataCommand {
    /// 顯示資料集前幾列。 / Print the first rows of a dataset.
    Show {
        id: WorkspaceId,
        #[command(flatten)]
        source: DatasetChoice,
        /// 顯示的最大列數。 / Maximum number of rows to print.
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
    /// 將資料集匯出至指定路徑。 / Export a dataset to a destination path.
    Export {
        id: WorkspaceId,
        dest: PathBuf,
        #[command(flatten)]
        source: DatasetChoice,
    },
    /// 將資料集儲存為工作區的主要資料。 / Save a dataset as the workspace's canonical data.
    Promote { id: WorkspaceId, name: String },
}

#[derive(Args)]
struct DatasetChoice {
    /// 資料檔名稱；預設為主要資料檔。 / Dataset filename; defaults to the canonical dataset.
    #[arg(long, value_name = "NAME")]
    dataset: Option<String>,
}

/// Forwards session notifications to the log.
struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_data_loaded(&mut self, dataset: &TabularDataset) {
        debug!(
            columns = dataset.column_count(),
            rows = dataset.row_count(),
            "dataset loaded"
        );
    }

    fn on_data_error(&mut self, error: &WorkspaceError) {
        warn!(kind = %error.kind(), "{error}");
    }

    fn on_dirty_changed(&mut self, dirty: bool) {
        debug!(dirty, "unsaved changes flag changed");
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        root,
        config: config_path,
        verbose,
        command,
    } = Cli::parse();
    init_tracing(verbose);

    match command {
        Commands::Config(command) => execute_config_command(command, config_path.as_deref()),
        Commands::Workspace(command) => {
            let (config, registry) = open_registry(root, config_path.as_deref())?;
            execute_workspace_command(command, &registry, &config)
        }
        Commands::Dataset(command) => {
            let (_, registry) = open_registry(root, config_path.as_deref())?;
            execute_dataset_command(command, &registry)
        }
        Commands::Data(command) => {
            let (_, registry) = open_registry(root, config_path.as_deref())?;
            execute_data_command(command, &registry)
        }
    }
}

fn open_registry(
    root: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<(AppConfig, WorkspaceRegistry)> {
    let config = load_config(config_path)?;
    let registry = WorkspaceRegistry::new(root.unwrap_or_else(|| config.workspaces_root.clone()));
    debug!(root = %registry.root().display(), "using workspaces root");
    Ok((config, registry))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("datadesk_workspace={level},datadesk_cli={level}"))
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let store = ConfigStore::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    Ok(store.into_config())
}

fn execute_config_command(command: ConfigCommand, path: Option<&Path>) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = load_config(path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigCommand::Set { key, value } => {
            let Some(path) = path else {
                bail!("no config file given; pass --config or set DATADESK_CONFIG");
            };
            let mut store = ConfigStore::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            match key {
                ConfigKey::WorkspacesRoot => {
                    store.update(|config| config.workspaces_root = PathBuf::from(&value))
                }
                ConfigKey::DefaultWorkspaceName => {
                    store.update(|config| config.default_workspace_name = value.clone())
                }
                ConfigKey::CreateDefaultWorkspace => {
                    let enabled: bool = value
                        .trim()
                        .parse()
                        .with_context(|| format!("'{value}' is not true or false"))?;
                    store.update(|config| config.create_default_workspace = enabled)
                }
            }
            .with_context(|| format!("update config {}", path.display()))?;
            println!("Updated {}", store.path().display());
            Ok(())
        }
    }
}

fn execute_workspace_command(
    command: WorkspaceCommand,
    registry: &WorkspaceRegistry,
    config: &AppConfig,
) -> Result<()> {
    match command {
        WorkspaceCommand::List => list_workspaces(registry, config),
        WorkspaceCommand::Create { name } => {
            let id = registry
                .create_workspace(name.as_deref().unwrap_or_default())
                .context("create workspace")?;
            let summary = registry.get_workspace(id).context("create workspace")?;
            println!("Created workspace {id} ({})", summary.name());
            Ok(())
        }
        WorkspaceCommand::Rename { id, name } => {
            registry
                .rename_workspace(id, &name)
                .with_context(|| format!("rename workspace {id}"))?;
            println!("Renamed workspace {id} to {}", name.trim());
            Ok(())
        }
        WorkspaceCommand::Delete(ConfirmedId { id, yes }) => {
            if !yes {
                bail!("refusing to delete workspace {id} without --yes");
            }
            registry
                .delete_workspace(id)
                .with_context(|| format!("delete workspace {id}"))?;
            println!("Deleted workspace {id}");
            Ok(())
        }
        WorkspaceCommand::Open { id } => {
            let summary = registry
                .open_workspace(id)
                .with_context(|| format!("open workspace {id}"))?;
            println!("Workspace {id}: {}", summary.name());
            println!("Path: {}", summary.root.display());
            let datasets = DatasetStore::open(&summary.root)
                .list_datasets()
                .with_context(|| format!("open workspace {id}"))?;
            if datasets.is_empty() {
                println!("No datasets");
            }
            for dataset in datasets {
                println!("  {}", dataset.name);
            }
            Ok(())
        }
        WorkspaceCommand::Refresh { id } => {
            let metadata = registry
                .refresh_metadata(id)
                .with_context(|| format!("refresh workspace {id}"))?;
            println!(
                "Workspace {id}: {} files, {} graphs, {} reports",
                metadata.file_count, metadata.graph_count, metadata.report_count
            );
            Ok(())
        }
    }
}

fn list_workspaces(registry: &WorkspaceRegistry, config: &AppConfig) -> Result<()> {
    if config.create_default_workspace {
        if let Some(id) = registry
            .ensure_default_workspace(&config.default_workspace_name)
            .context("create default workspace")?
        {
            debug!(id = %id, "default workspace created");
        }
    }
    let workspaces = registry.list_workspaces().context("list workspaces")?;
    if workspaces.is_empty() {
        println!("No workspaces found in {}", registry.root().display());
        return Ok(());
    }
    println!(
        "{:>4}  {:<24} {:>5} {:>6} {:>7}  {}",
        "ID", "NAME", "FILES", "GRAPHS", "REPORTS", "LAST MODIFIED"
    );
    for workspace in workspaces {
        let counters = workspace.counters();
        println!(
            "{:>4}  {:<24} {:>5} {:>6} {:>7}  {}",
            workspace.id,
            workspace.name(),
            counters.files,
            counters.graphs,
            counters.reports,
            workspace.metadata.last_modified
        );
    }
    Ok(())
}

fn execute_dataset_command(command: DatasetCommand, registry: &WorkspaceRegistry) -> Result<()> {
    match command {
        DatasetCommand::List { id } => {
            let store = dataset_store(registry, id)?;
            let datasets = store
                .list_datasets()
                .with_context(|| format!("list datasets of workspace {id}"))?;
            if datasets.is_empty() {
                println!("No datasets in workspace {id}");
            }
            for dataset in datasets {
                let marker = if dataset.is_canonical() { "*" } else { " " };
                println!(
                    "{marker} {:<32} {:>10}  {}",
                    dataset.name,
                    dataset.human_size(),
                    dataset.modified_at()
                );
            }
            Ok(())
        }
        DatasetCommand::Import {
            id,
            file,
            overwrite,
        } => {
            let store = dataset_store(registry, id)?;
            let imported = store
                .import_dataset(&file, overwrite)
                .with_context(|| format!("import {}", file.display()))?;
            println!("Imported {} ({})", imported.name, imported.human_size());
            Ok(())
        }
        DatasetCommand::Rename { id, old, new } => {
            let store = dataset_store(registry, id)?;
            let renamed = store
                .rename_dataset(&old, &new)
                .with_context(|| format!("rename dataset {old}"))?;
            println!("Renamed {old} to {renamed}");
            Ok(())
        }
        DatasetCommand::Delete { id, name, yes } => {
            if !yes {
                bail!("refusing to delete dataset {name} without --yes");
            }
            let store = dataset_store(registry, id)?;
            store
                .delete_dataset(&name)
                .with_context(|| format!("delete dataset {name}"))?;
            println!("Deleted {name}");
            Ok(())
        }
    }
}

fn execute_data_command(command: DataCommand, registry: &WorkspaceRegistry) -> Result<()> {
    match command {
        DataCommand::Show { id, source, rows } => {
            let session = load_session(registry, id, source.dataset.as_deref())?;
            if let Some(dataset) = session.dataset() {
                print_dataset(dataset, rows);
            }
            Ok(())
        }
        DataCommand::Export { id, dest, source } => {
            let mut session = load_session(registry, id, source.dataset.as_deref())?;
            session
                .export(&dest)
                .with_context(|| format!("export to {}", dest.display()))?;
            println!("Exported to {}", dest.display());
            Ok(())
        }
        DataCommand::Promote { id, name } => {
            let mut session = load_session(registry, id, Some(&name))?;
            let saved = session.save().with_context(|| format!("promote {name}"))?;
            println!("Saved {name} as {}", saved.display());
            Ok(())
        }
    }
}

fn dataset_store(registry: &WorkspaceRegistry, id: WorkspaceId) -> Result<DatasetStore> {
    let root = registry
        .workspace_root(id)
        .with_context(|| format!("open workspace {id}"))?;
    Ok(DatasetStore::open(root))
}

fn load_session(
    registry: &WorkspaceRegistry,
    id: WorkspaceId,
    dataset: Option<&str>,
) -> Result<Session> {
    let root = registry
        .workspace_root(id)
        .with_context(|| format!("open workspace {id}"))?;
    let mut session = Session::new();
    session.subscribe(LogObserver);
    session.set_workspace(&root);
    let name = dataset.unwrap_or(CANONICAL_DATASET);
    session
        .load_dataset(name)
        .with_context(|| format!("load dataset {name}"))?;
    Ok(session)
}

fn print_dataset(dataset: &TabularDataset, limit: usize) {
    println!("{}", dataset.columns().join("\t"));
    for row in dataset.rows().iter().take(limit) {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("{}", cells.join("\t"));
    }
    if dataset.row_count() > limit {
        println!("... {} more rows", dataset.row_count() - limit);
    }
}
