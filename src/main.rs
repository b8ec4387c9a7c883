use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use memoria::classify::{Classifier, Connectivity, ConnectivityMonitor};
use memoria::config::Config;
use memoria::ingest::{FallbackReason, Ingestion, SubmitOutcome};
use memoria::library::{
    transfer, Classification, ContentItem, ItemStore, Model, Platform, SettingsPatch,
    SummaryDetail, Theme, ToggleField, CATEGORIES,
};
use memoria::storage::{Database, DatabaseError};
use memoria::util::{open_target, strip_control_chars, truncate_to_width, MAX_SEARCH_QUERY_LENGTH};
use memoria::views::{self, ActiveView, Facet, ViewState};

const TITLE_WIDTH: usize = 56;
const LABEL_WIDTH: usize = 24;
const SHORT_ID_LEN: usize = 8;

/// Get the config directory path (~/.config/memoria/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("memoria"))
}

/// Create `dir` if needed and restrict it to the current user.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory '{}'", dir.display()))?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(dir, perms) {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "Failed to set directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Failed to read directory metadata");
            }
        }
    }
    Ok(())
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "memoria", about = "Personal content library with AI classification")]
struct Args {
    /// Config file (default: ~/.config/memoria/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save a link or a note, classifying it when possible
    Add {
        /// URL or free text
        input: String,
    },
    /// List items in a view
    List {
        #[arg(long, value_enum, default_value_t = ViewArg::Home)]
        view: ViewArg,
        /// Only items in this category
        #[arg(long, conflicts_with = "view")]
        category: Option<String>,
        /// Only items with this subcategory
        #[arg(long, requires = "category")]
        subcategory: Option<String>,
        /// Case-insensitive match on title or category; overrides the view
        #[arg(long)]
        search: Option<String>,
        /// Unwatched first, newest first within each group
        #[arg(long)]
        unwatched_first: bool,
    },
    /// Show categories and their subcategories
    Tree,
    /// Show item counts per view, category and platform
    Counts,
    /// Toggle the favorite flag
    Favorite { id: String },
    /// Toggle the archived flag
    Archive { id: String },
    /// Toggle the watched flag
    Watched { id: String },
    /// Delete an item
    Remove {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Write a dated JSON backup
    Export {
        /// Target directory (default: current directory)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Replace the library with the contents of a backup
    Import { file: PathBuf },
    /// Show settings, or change them
    Settings {
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
        #[arg(long)]
        auto_categorize: Option<bool>,
        #[arg(long, value_enum)]
        model: Option<ModelArg>,
        #[arg(long, value_enum)]
        detail: Option<DetailArg>,
    },
    /// Show classifier connectivity
    Status {
        /// Keep checking until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Open an item in the browser
    Open { id: String },
    /// Delete every item and wipe local storage
    Purge {
        /// Required: confirms the purge
        #[arg(long)]
        yes: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ViewArg {
    Home,
    Favorites,
    Archived,
    Unwatched,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ThemeArg {
    Light,
    Dark,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModelArg {
    Fast,
    Pro,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DetailArg {
    Concise,
    Detailed,
}

impl From<ThemeArg> for Theme {
    fn from(t: ThemeArg) -> Self {
        match t {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

impl From<ModelArg> for Model {
    fn from(m: ModelArg) -> Self {
        match m {
            ModelArg::Fast => Model::Fast,
            ModelArg::Pro => Model::Pro,
        }
    }
}

impl From<DetailArg> for SummaryDetail {
    fn from(d: DetailArg) -> Self {
        match d {
            DetailArg::Concise => SummaryDetail::Concise,
            DetailArg::Detailed => SummaryDetail::Detailed,
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from '{}'", config_path.display()))?;
    tracing::debug!(?config, "Effective configuration");

    let data_dir = config.data_dir.clone().unwrap_or(config_dir);
    ensure_private_dir(&data_dir)?;

    let db_path = data_dir.join("library.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of memoria appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let mut store = ItemStore::load(db).await.context("Failed to load library")?;
    let classifier = build_classifier(&config)?;

    match args.command {
        Command::Add { input } => cmd_add(&mut store, &classifier, &input).await,
        Command::List {
            view,
            category,
            subcategory,
            search,
            unwatched_first,
        } => {
            let view = match (category, subcategory) {
                (Some(category), Some(subcategory)) => ActiveView::Subcategory {
                    category,
                    subcategory,
                },
                (Some(category), None) => ActiveView::Category(category),
                _ => match view {
                    ViewArg::Home => ActiveView::Home,
                    ViewArg::Favorites => ActiveView::Favorites,
                    ViewArg::Archived => ActiveView::Archived,
                    ViewArg::Unwatched => ActiveView::Unwatched,
                },
            };
            let search = search.unwrap_or_default();
            if search.len() > MAX_SEARCH_QUERY_LENGTH {
                anyhow::bail!("Search query too long (max {MAX_SEARCH_QUERY_LENGTH} bytes)");
            }
            let state = ViewState::new(view)
                .with_search(search)
                .with_unwatched_first(unwatched_first);
            print_list(store.items(), &state);
            Ok(())
        }
        Command::Tree => {
            print_tree(store.items());
            Ok(())
        }
        Command::Counts => {
            print_counts(store.items());
            Ok(())
        }
        Command::Favorite { id } => cmd_toggle(&mut store, &id, ToggleField::Favorite).await,
        Command::Archive { id } => cmd_toggle(&mut store, &id, ToggleField::Archived).await,
        Command::Watched { id } => cmd_toggle(&mut store, &id, ToggleField::Watched).await,
        Command::Remove { id, yes } => cmd_remove(&mut store, &id, yes).await,
        Command::Export { dir } => {
            let dir = match dir {
                Some(d) => d,
                None => std::env::current_dir().context("Failed to read current directory")?,
            };
            let path = transfer::write_backup(&dir, store.items(), Utc::now().date_naive())?;
            println!("Exported {} items to {}", store.len(), path.display());
            Ok(())
        }
        Command::Import { file } => cmd_import(&mut store, &file).await,
        Command::Settings {
            theme,
            auto_categorize,
            model,
            detail,
        } => {
            let patch = SettingsPatch {
                theme: theme.map(Theme::from),
                auto_categorize,
                selected_model: model.map(Model::from),
                summary_detail: detail.map(SummaryDetail::from),
            };
            if !patch.is_empty() {
                store.update_settings(&patch).await?;
            }
            let s = store.settings();
            println!("theme            {}", s.theme);
            println!("auto-categorize  {}", s.auto_categorize);
            println!("model            {}", s.selected_model);
            println!("summary detail   {}", s.summary_detail);
            Ok(())
        }
        Command::Status { watch } => cmd_status(&config, classifier, &store, watch).await,
        Command::Open { id } => {
            let id = resolve_id(&store, &id)?;
            let item = store
                .get(&id)
                .ok_or_else(|| anyhow::anyhow!("No item with id '{id}'"))?;
            let url = open_target(&item.input)?;
            open::that(url.as_str())
                .with_context(|| format!("Failed to open browser for {url}"))?;
            println!("Opening {url}");
            Ok(())
        }
        Command::Purge { yes } => {
            if !yes {
                anyhow::bail!("Purge deletes every item. Re-run with --yes to confirm.");
            }
            let count = store.len();
            store.purge().await?;
            println!("Purged {count} items.");
            Ok(())
        }
    }
}

fn build_classifier(config: &Config) -> Result<Classifier> {
    let http_client = reqwest::Client::builder()
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")?;

    let mut classifier = Classifier::new(http_client, config.api_key())
        .with_timeout(config.request_timeout());
    if let Some(base) = &config.api_base_url {
        tracing::info!(base_url = %base, "Using custom classifier base URL");
        classifier = classifier.with_base_url(base.clone());
    }
    Ok(classifier)
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_add(store: &mut ItemStore, classifier: &Classifier, input: &str) -> Result<()> {
    let mut flow = Ingestion::new();
    match flow.submit(input, store, classifier).await? {
        SubmitOutcome::Saved { item_id } => {
            if let Some(item) = store.get(&item_id) {
                print_item_detail(item);
            }
        }
        SubmitOutcome::NeedsManualEntry { reason } => {
            match &reason {
                FallbackReason::AutoCategorizeOff => {
                    eprintln!("Auto-categorize is off; enter the details manually.")
                }
                FallbackReason::ClassifierUnavailable => {
                    eprintln!("No API key configured; enter the details manually.")
                }
                FallbackReason::ClassificationFailed(e) => {
                    eprintln!("Classification failed ({e}); enter the details manually.")
                }
            }
            let draft = flow
                .manual_draft()
                .ok_or_else(|| anyhow::anyhow!("Manual entry not pending"))?;
            match prompt_manual(draft)? {
                Some(entry) => {
                    let id = flow.confirm_manual(entry, store).await?;
                    if let Some(item) = store.get(&id) {
                        print_item_detail(item);
                    }
                }
                None => {
                    flow.cancel();
                    println!("Cancelled.");
                    return Ok(());
                }
            }
        }
    }
    if let Some(message) = flow.notification() {
        println!("{message}");
    }
    Ok(())
}

async fn cmd_toggle(store: &mut ItemStore, id: &str, field: ToggleField) -> Result<()> {
    let id = resolve_id(store, id)?;
    match store.toggle(&id, field).await? {
        Some(value) => println!("{field}: {}", if value { "on" } else { "off" }),
        None => println!("No item with id '{id}'"),
    }
    Ok(())
}

async fn cmd_remove(store: &mut ItemStore, id: &str, yes: bool) -> Result<()> {
    let id = resolve_id(store, id)?;
    let title = store
        .get(&id)
        .map(|i| display_title(i).into_owned())
        .unwrap_or_default();
    if !yes && !confirm(&format!("Remove \"{title}\"?"))? {
        println!("Kept.");
        return Ok(());
    }
    if store.remove(&id).await? {
        println!("Removed \"{title}\".");
    }
    Ok(())
}

async fn cmd_import(store: &mut ItemStore, file: &Path) -> Result<()> {
    let canonical = file
        .canonicalize()
        .with_context(|| format!("Failed to resolve import file: {}", file.display()))?;
    // Errors here leave the library untouched, including a backup where
    // every record was rejected
    let text = transfer::read_import_file(&canonical)?;
    let report = transfer::parse_import(&text)?;

    for rejected in &report.rejected {
        eprintln!("Skipped record {}: {}", rejected.index, rejected.reason);
    }
    let accepted = report.accepted.len();
    store.replace_all(report.accepted).await?;
    println!("Imported {accepted} items ({} skipped).", report.rejected.len());
    Ok(())
}

async fn cmd_status(
    config: &Config,
    classifier: Classifier,
    store: &ItemStore,
    watch: bool,
) -> Result<()> {
    println!("endpoint         {}", classifier.base_url());
    println!("items            {}", store.len());
    println!("model            {}", store.settings().selected_model);

    let monitor = ConnectivityMonitor::new(classifier);
    if !watch {
        println!("connectivity     {}", monitor.check().await);
        return Ok(());
    }

    let mut rx = monitor.subscribe();
    let _handle = monitor.spawn(config.connectivity_interval());
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *rx.borrow_and_update();
                println!("{}  connectivity {status}", Utc::now().format("%H:%M:%S"));
                if status == Connectivity::Unconfigured {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Accept a full id or a unique prefix of one.
fn resolve_id(store: &ItemStore, needle: &str) -> Result<String> {
    if store.get(needle).is_some() {
        return Ok(needle.to_string());
    }
    let mut matches = store.items().iter().filter(|i| i.id.starts_with(needle));
    match (matches.next(), matches.next()) {
        (Some(item), None) => Ok(item.id.clone()),
        (Some(_), Some(_)) => anyhow::bail!("Id prefix '{needle}' is ambiguous"),
        (None, _) => anyhow::bail!("No item with id '{needle}'"),
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// Read one line, falling back to `default` on an empty answer.
/// Returns `None` at end of input.
fn ask(label: &str, default: &str) -> Result<Option<String>> {
    if default.is_empty() {
        print!("{label}: ");
    } else {
        print!("{label} [{default}]: ");
    }
    std::io::stdout().flush()?;

    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim();
    Ok(Some(if line.is_empty() {
        default.to_string()
    } else {
        line.to_string()
    }))
}

/// Walk the user through the manual form. `None` means cancelled.
fn prompt_manual(draft: Classification) -> Result<Option<Classification>> {
    println!("Categories: {}", CATEGORIES.join(", "));
    let Some(title) = ask("Title", &draft.title)? else {
        return Ok(None);
    };
    let Some(platform) = ask("Platform", draft.platform.as_str())? else {
        return Ok(None);
    };
    let Some(category) = ask("Category", &draft.category)? else {
        return Ok(None);
    };
    let Some(subcategory) = ask("Subcategory", &draft.subcategory)? else {
        return Ok(None);
    };
    let Some(ai_insight) = ask("Summary", &draft.ai_insight)? else {
        return Ok(None);
    };
    let mut key_points = Vec::with_capacity(draft.key_points.len());
    for (n, default) in draft.key_points.iter().enumerate() {
        let Some(point) = ask(&format!("Key point {}", n + 1), default)? else {
            return Ok(None);
        };
        key_points.push(point);
    }

    Ok(Some(Classification {
        title,
        platform: Platform::parse_lenient(&platform),
        category,
        subcategory,
        ai_insight,
        key_points,
    }))
}

fn display_title(item: &ContentItem) -> std::borrow::Cow<'_, str> {
    if item.title.is_empty() {
        strip_control_chars(&item.input)
    } else {
        strip_control_chars(&item.title)
    }
}

fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

fn print_list(items: &[ContentItem], state: &ViewState) {
    let list = views::filtered_items(items, state);
    println!("{} ({})", views::view_title(state), list.len());
    for item in list {
        let flags = format!(
            "{}{}{}",
            if item.is_favorite { '*' } else { ' ' },
            if item.is_archived { 'A' } else { ' ' },
            if item.watched { 'W' } else { ' ' },
        );
        let label = format!(
            "{} / {}",
            views::bucket_label(item.category.as_deref()),
            views::bucket_label(item.subcategory.as_deref())
        );
        println!(
            "{:<8} {} {:<9} {:<24} {}",
            short_id(&item.id),
            flags,
            item.platform.as_str(),
            truncate_to_width(&strip_control_chars(&label), LABEL_WIDTH),
            truncate_to_width(&display_title(item), TITLE_WIDTH),
        );
    }
}

fn print_item_detail(item: &ContentItem) {
    println!("Saved {}", item.id);
    println!("  title     {}", display_title(item));
    println!("  platform  {}", item.platform);
    println!(
        "  category  {} / {}",
        strip_control_chars(views::bucket_label(item.category.as_deref())),
        strip_control_chars(views::bucket_label(item.subcategory.as_deref()))
    );
    if !item.ai_insight.is_empty() {
        println!("  insight   {}", strip_control_chars(&item.ai_insight));
    }
    for point in &item.key_points {
        println!("  - {}", strip_control_chars(point));
    }
}

fn print_tree(items: &[ContentItem]) {
    for branch in views::category_tree(items) {
        println!(
            "{} ({})",
            strip_control_chars(views::bucket_label(branch.category)),
            views::count(items, Facet::Category(branch.category))
        );
        for sub in &branch.subcategories {
            println!(
                "  {} ({})",
                strip_control_chars(views::bucket_label(*sub)),
                views::count(items, Facet::Subcategory(*sub))
            );
        }
    }
}

fn print_counts(items: &[ContentItem]) {
    println!("all        {}", items.iter().filter(|i| !i.is_archived).count());
    println!("favorites  {}", views::count(items, Facet::Favorites));
    println!("unwatched  {}", views::count(items, Facet::Unwatched));
    println!("archived   {}", views::count(items, Facet::Archived));
    for platform in Platform::ALL {
        let n = views::count(items, Facet::Platform(platform));
        if n > 0 {
            println!("{:<10} {n}", platform.as_str());
        }
    }
}
