use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use dbgraph::{
    AppState, Config, DataSource, GraphStore, ImportSummary, LayoutConfig, LayoutDirection,
    NewRelation, NewView, PathResult, Relation, RelationUpdate, View, ViewUpdate,
};
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

type CliResult = std::result::Result<(), Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "dbgraph")]
#[command(author, version, about = "View/relation graph explorer for reporting databases")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Graph(GraphCommand),

    /// Generate shell completion script
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Commands that open the graph
#[derive(Subcommand, Debug)]
enum GraphCommand {
    /// Import INSERT statements for Report_View and Report_ViewRelation
    Import {
        /// SQL file, or "-" for stdin
        file: String,

        /// Keep the previous import snapshot instead of starting a new one
        #[arg(long)]
        append: bool,
    },

    /// List views
    Views {
        /// Only views whose name, alias or id contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Show every column
        #[arg(short, long)]
        all: bool,
    },

    /// List relations
    Relations,

    /// Add a view
    AddView {
        name: String,

        /// View id (default: one past the highest existing id)
        #[arg(long)]
        id: Option<i64>,

        #[arg(long)]
        name2: Option<String>,

        #[arg(long)]
        alias: Option<String>,

        #[arg(long)]
        min_app_version: Option<i64>,

        #[arg(long)]
        max_app_version: Option<i64>,
    },

    /// Update a view. Pass an empty string to clear name2 or alias.
    UpdateView {
        view_id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        name2: Option<String>,

        #[arg(long)]
        alias: Option<String>,

        #[arg(long)]
        min_app_version: Option<i64>,

        #[arg(long)]
        max_app_version: Option<i64>,
    },

    /// Delete a view and every relation touching it
    DeleteView { view_id: i64 },

    /// Add a relation between two views
    Link {
        from: i64,
        to: i64,

        /// SQL join clause
        #[arg(short, long)]
        relation: String,

        #[arg(long)]
        relation2: Option<String>,

        #[arg(short, long)]
        weight: Option<i64>,
    },

    /// Update a relation. Pass an empty string to clear relation2.
    UpdateLink {
        id: String,

        #[arg(short, long)]
        relation: Option<String>,

        #[arg(long)]
        relation2: Option<String>,

        #[arg(short, long)]
        weight: Option<i64>,
    },

    /// Delete a relation
    Unlink { id: String },

    /// Shortest join path between two views
    Path { from: i64, to: i64 },

    /// Compute node positions
    Layout {
        /// Override the configured direction (TB or LR)
        #[arg(short, long)]
        direction: Option<LayoutDirection>,
    },

    /// Export the graph
    Export {
        #[arg(short, long, value_enum, default_value = "sql")]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show views and relations added since the last initial import
    New,

    /// Delete the whole graph
    Clear,

    /// Delete everything added since the last initial import
    ClearNew,

    /// Show graph counts
    Stats,

    /// Show or change display settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print all settings, or one key
    Get { key: Option<String> },

    /// Set a key. VALUE is read as JSON, falling back to a plain string.
    Set { key: String, value: String },

    /// Restore the defaults
    Reset,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportFormat {
    Sql,
    Dot,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "dbgraph", &mut io::stdout());
        }
        Command::Graph(command) => {
            if let Err(e) = run(command).await {
                eprintln!("{} {}", "Error:".red(), e);
                std::process::exit(1);
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "dbgraph=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(command: GraphCommand) -> CliResult {
    let mut app = AppState::init(Config::load()).await?;
    if app.gateway().store().data_source() == DataSource::Local && app.config().backend_url().is_some() {
        eprintln!("{}", "Backend unreachable, using local data".yellow());
    }

    match command {
        GraphCommand::Import { file, append } => {
            let sql = read_input(&file)?;
            let summary = app.gateway_mut().import_sql(&sql, !append).await?;
            print_import_summary(&summary);
        }

        GraphCommand::Views { search, all } => {
            let store = app.gateway().store();
            let views = match search.as_deref() {
                Some(q) => store.filtered_views(q),
                None => store.views().iter().collect(),
            };
            if views.is_empty() {
                println!("No views.");
            }
            for view in views {
                print_view(view, all, store.is_new_view(view.view_id));
            }
        }

        GraphCommand::Relations => {
            let store = app.gateway().store();
            if store.relations().is_empty() {
                println!("No relations.");
            }
            for relation in store.relations() {
                print_relation(relation, store, store.is_new_relation(&relation.id));
            }
        }

        GraphCommand::AddView { name, id, name2, alias, min_app_version, max_app_version } => {
            let view_id = id.unwrap_or_else(|| app.gateway().store().next_view_id());
            let view = NewView {
                view_id,
                name,
                name2: non_empty(name2),
                alias: non_empty(alias),
                min_app_version,
                max_app_version,
            };
            app.gateway_mut().create_view(&view).await?;
            println!("{} view {}", "Created".green(), view_id);
        }

        GraphCommand::UpdateView { view_id, name, name2, alias, min_app_version, max_app_version } => {
            let update = ViewUpdate {
                name,
                name2: name2.map(|s| non_empty(Some(s))),
                alias: alias.map(|s| non_empty(Some(s))),
                min_app_version,
                max_app_version,
            };
            app.gateway_mut().update_view(view_id, &update).await?;
            println!("{} view {}", "Updated".green(), view_id);
        }

        GraphCommand::DeleteView { view_id } => {
            app.gateway_mut().delete_view(view_id).await?;
            println!("{} view {}", "Deleted".green(), view_id);
        }

        GraphCommand::Link { from, to, relation, relation2, weight } => {
            let data = NewRelation {
                id_view1: from,
                id_view2: to,
                relation,
                relation2: non_empty(relation2),
                edge_weight: weight,
            };
            app.gateway_mut().create_relation(&data).await?;
            println!("{} relation {} -> {}", "Created".green(), from, to);
        }

        GraphCommand::UpdateLink { id, relation, relation2, weight } => {
            let update = RelationUpdate {
                relation,
                relation2: relation2.map(|s| non_empty(Some(s))),
                edge_weight: weight,
            };
            app.gateway_mut().update_relation(&id, &update).await?;
            println!("{} relation {}", "Updated".green(), id);
        }

        GraphCommand::Unlink { id } => {
            app.gateway_mut().delete_relation(&id).await?;
            println!("{} relation {}", "Deleted".green(), id);
        }

        GraphCommand::Path { from, to } => print_path(&mut app, from, to)?,

        GraphCommand::Layout { direction } => {
            let mut config = LayoutConfig::from(app.settings());
            if let Some(direction) = direction {
                config.direction = direction;
            }
            for node in app.layout_with(&config) {
                println!("{:>8}  level {:<3} x {:>8.1}  y {:>8.1}", node.id, node.level, node.x, node.y);
            }
        }

        GraphCommand::Export { format, output } => {
            let text = match format {
                ExportFormat::Sql => app.export_sql(),
                ExportFormat::Dot => app.export_dot(),
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    println!("{} {}", "Exported".green(), path.display());
                }
                None => print!("{}", text),
            }
        }

        GraphCommand::New => {
            let store = app.gateway().store();
            let views = store.new_views();
            let relations = store.new_relations();
            if views.is_empty() && relations.is_empty() {
                println!("Nothing new since the last import.");
            }
            for view in views {
                print_view(view, false, true);
            }
            for relation in relations {
                print_relation(relation, store, true);
            }
        }

        GraphCommand::Clear => {
            app.gateway_mut().clear_all().await?;
            println!("{} graph", "Cleared".green());
        }

        GraphCommand::ClearNew => {
            let (views, relations) = app.gateway_mut().clear_new_items().await?;
            println!("{} {} view(s) and {} relation(s)", "Removed".green(), views, relations);
        }

        GraphCommand::Stats => {
            let stats = app.gateway().stats();
            println!("Views:     {}", stats.views_count);
            println!("Relations: {}", stats.relations_count);
            println!("Source:    {}", app.gateway().store().data_source());
        }

        GraphCommand::Settings { action } => match action.unwrap_or(SettingsAction::Get { key: None }) {
            SettingsAction::Get { key } => {
                let value = serde_json::to_value(app.settings())?;
                match key {
                    Some(key) => match value.get(&key) {
                        Some(v) => println!("{}", v),
                        None => return Err(format!("Unknown setting '{}'", key).into()),
                    },
                    None => println!("{}", serde_json::to_string_pretty(&value)?),
                }
            }
            SettingsAction::Set { key, value } => {
                let parsed = match serde_json::from_str::<serde_json::Value>(&value) {
                    Ok(parsed) => parsed,
                    Err(_) => serde_json::Value::String(value),
                };
                let mut patch = serde_json::Map::new();
                patch.insert(key.clone(), parsed);
                app.settings_mut().patch(Instant::now(), &serde_json::Value::Object(patch))?;
                println!("{} {}", "Set".green(), key);
            }
            SettingsAction::Reset => {
                app.settings_mut().update(Instant::now(), |s| s.reset());
                println!("{} settings", "Reset".green());
            }
        },
    }

    app.shutdown()?;
    Ok(())
}

fn read_input(file: &str) -> io::Result<String> {
    if file == "-" {
        let mut sql = String::new();
        io::stdin().read_to_string(&mut sql)?;
        Ok(sql)
    } else {
        std::fs::read_to_string(file)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn print_import_summary(summary: &ImportSummary) {
    println!(
        "{} {} view(s), {} relation(s)",
        "Imported".green(),
        summary.views_created,
        summary.relations_created
    );
    for error in &summary.errors {
        eprintln!("  {} {}", "!".yellow(), error);
    }
}

fn print_view(view: &View, all: bool, is_new: bool) {
    let marker = if is_new { " new".cyan().to_string() } else { String::new() };
    println!("{:>8}  {}{}", view.view_id, view.display_name.bold(), marker);
    if all {
        println!("          name:    {}", view.name);
        if let Some(name2) = &view.name2 {
            println!("          name2:   {}", name2);
        }
        if let Some(alias) = &view.alias {
            println!("          alias:   {}", alias);
        }
        println!("          version: {}..{}", view.min_app_version, view.max_app_version);
    }
}

fn print_relation(relation: &Relation, store: &GraphStore, is_new: bool) {
    let view_id = |id: &str| {
        store
            .view_by_id(id)
            .map(|v| v.view_id.to_string())
            .unwrap_or_else(|| id.to_string())
    };
    let marker = if is_new { " new".cyan().to_string() } else { String::new() };
    println!(
        "{}  {} -> {}  {}  w={}{}",
        relation.id.dimmed(),
        view_id(&relation.source),
        view_id(&relation.target),
        relation.join_type.to_string().yellow(),
        relation.edge_weight,
        marker
    );
}

fn print_path(app: &mut AppState, from: i64, to: i64) -> CliResult {
    let store = app.gateway_mut().store_mut();
    let start = store.view(from).map(|v| v.id.clone()).ok_or_else(|| format!("View {} not found", from))?;
    let end = store.view(to).map(|v| v.id.clone()).ok_or_else(|| format!("View {} not found", to))?;

    let names = |ids: &[String], store: &GraphStore| -> Vec<String> {
        ids.iter()
            .map(|id| {
                store
                    .view_by_id(id)
                    .map(|v| v.display_name.clone())
                    .unwrap_or_else(|| id.clone())
            })
            .collect()
    };

    match store.find_path(&start, &end).cloned() {
        Some(PathResult::Found { nodes, edges }) => {
            println!("{}", names(&nodes, store).join(" -> "));
            for id in &edges {
                if let Some(relation) = store.relation(id) {
                    println!("  {}  {}", relation.join_type.to_string().yellow(), relation.relation);
                }
            }
        }
        Some(PathResult::NotFound) => println!("{}", "No path found".yellow()),
        None => return Err("Start and end must be different views".into()),
    }
    Ok(())
}
