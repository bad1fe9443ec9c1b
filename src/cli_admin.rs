use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_style;

use cli_style::*;

use family_films_catalog::catalog_export;
use family_films_catalog::catalog_store::queries::list_people;
use family_films_catalog::catalog_store::{CatalogStore, SqliteCatalogStore};
use family_films_catalog::config::{FileConfig, DEFAULT_READ_POOL_SIZE};
use family_films_catalog::curation::{self, locations as location_tools, MergeReport};
use family_films_catalog::genealogy::{self, GenealogyStats};
use family_films_catalog::import::{self, film_csv::ERRORS_SHOWN, text::playlist_id, SheetGrid};
use family_films_catalog::user::{SqliteUserStore, UserManager};

use rustyline::{
    completion::Completer,
    highlight::Highlighter,
    history::FileHistory,
    validate::Validator,
    CompletionType, Config, Editor, Helper,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Directory holding catalog.db and user.db. Defaults to the current directory.
    #[clap(value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// TOML config file, used for the import playlist id.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// A single command to run instead of starting the interactive shell.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Parser)]
#[command(styles=get_styles(),name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Manages login accounts.
    #[command(subcommand)]
    User(UserCommand),

    /// Moves every film and chapter association of <REMOVE> to <KEEP>, then
    /// deletes <REMOVE>.
    MergePerson {
        keep: i64,
        remove: i64,
        #[clap(long)]
        dry_run: bool,
        #[clap(long)]
        yes: bool,
    },

    /// Same as merge-person, for locations.
    MergeLocation {
        keep: i64,
        remove: i64,
        #[clap(long)]
        dry_run: bool,
        #[clap(long)]
        yes: bool,
    },

    /// Lists persons without a last name that match a named person by first
    /// name.
    FindDuplicates {
        #[clap(long)]
        auto_merge: bool,
        #[clap(long)]
        yes: bool,
    },

    /// Lists persons sharing the exact same name. The lowest id is kept.
    MergeIdenticalNames {
        #[clap(long)]
        apply: bool,
        #[clap(long)]
        yes: bool,
    },

    /// Location cleanup tools.
    #[command(subcommand)]
    Locations(LocationsCommand),

    /// People cleanup tools.
    #[command(subcommand)]
    People(PeopleCommand),

    /// Imports films or chapter sheets from CSV.
    #[command(subcommand)]
    Import(ImportCommand),

    /// Writes the whole catalog to a JSON document.
    Export { path: PathBuf },

    /// Loads a JSON document written by `export`.
    ImportJson {
        path: PathBuf,
        #[clap(long)]
        dry_run: bool,
        #[clap(long)]
        clear_existing: bool,
        #[clap(long)]
        yes: bool,
    },

    /// Genealogy export, sync and checks.
    #[command(subcommand)]
    Genealogy(GenealogyCommand),

    /// Shows the paths of the current databases.
    Where,

    /// Close this program.
    Exit,
}

#[derive(Subcommand)]
enum UserCommand {
    /// Creates a user with a password.
    Add {
        handle: String,
        password: String,
        #[clap(long)]
        staff: bool,
    },
    /// Sets or replaces the password of a user.
    SetPassword { handle: String, password: String },
    /// Grants or revokes staff rights.
    SetStaff {
        handle: String,
        #[arg(action = clap::ArgAction::Set)]
        is_staff: bool,
    },
    /// Shows all users.
    List,
}

#[derive(Subcommand)]
enum LocationsCommand {
    /// Applies a `current,new,replace` rules CSV.
    Cleanup {
        csv: PathBuf,
        #[clap(long)]
        dry_run: bool,
    },
    /// Lists (or removes) locations no film or chapter refers to.
    Orphans {
        #[clap(long)]
        remove: bool,
        #[clap(long)]
        yes: bool,
    },
    /// Usage statistics.
    Stats,
    /// Similar and compound location names.
    Duplicates,
}

#[derive(Subcommand)]
enum PeopleCommand {
    /// Lists (or removes) persons no film or chapter refers to.
    Orphans {
        #[clap(long)]
        remove: bool,
        #[clap(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ImportCommand {
    /// Film inventory CSV export.
    Films {
        csv: PathBuf,
        /// Playlist id or URL. Overrides the config file.
        #[clap(long)]
        playlist_id: Option<String>,
        #[clap(long)]
        dry_run: bool,
    },
    /// Per-film chapter sheets saved as CSV. The file name is the sheet name.
    Chapters {
        #[clap(required = true)]
        sheets: Vec<PathBuf>,
        #[clap(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum GenealogyCommand {
    /// Writes relationship records of every person to JSON.
    Export { path: PathBuf },
    /// Fills empty relationship fields from an export.
    Sync {
        path: PathBuf,
        #[clap(long)]
        dry_run: bool,
    },
    /// Reports relationship inconsistencies.
    Validate,
    /// Relationship coverage statistics.
    Stats,
    /// Writes a full genealogy report to JSON.
    Report { path: PathBuf },
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

struct AdminContext {
    db_dir: PathBuf,
    catalog: SqliteCatalogStore,
    user_manager: UserManager,
    import_playlist_id: Option<String>,
}

impl AdminContext {
    fn open(db_dir: PathBuf, file_config: Option<FileConfig>) -> Result<Self> {
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }
        let read_pool_size = file_config
            .as_ref()
            .and_then(|c| c.read_pool_size)
            .unwrap_or(DEFAULT_READ_POOL_SIZE);
        let catalog = SqliteCatalogStore::new(db_dir.join("catalog.db"), read_pool_size)?;
        let user_store = SqliteUserStore::new(db_dir.join("user.db"))?;
        let import_playlist_id = file_config.and_then(|c| c.import).and_then(|i| i.playlist_id);
        Ok(AdminContext {
            db_dir,
            catalog,
            user_manager: UserManager::new(Box::new(user_store)),
            import_playlist_id,
        })
    }
}

/// Asks for a literal `yes` unless `assume_yes`.
fn confirm(action: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    print_warning(action);
    print!("Type 'yes' to continue: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    let confirmed = answer.trim() == "yes";
    if !confirmed {
        print_warning("Cancelled.");
    }
    Ok(confirmed)
}

fn print_merge_report(report: &MergeReport) {
    if !report.complete {
        print_error(&format!("Merge incomplete, rolled back: {}", report.summary()));
    } else if report.dry_run {
        print_dry_run_notice();
        print_list_item(&report.summary(), 1);
    } else {
        print_success(&format!("Merged {}", report.summary()));
    }
}

fn print_batch(outcome: &curation::BatchOutcome) {
    print_key_value("Merged", &outcome.merged.len().to_string());
    print_key_value("Incomplete", &outcome.incomplete.len().to_string());
    print_key_value("Failed", &outcome.failed.len().to_string());
    for (keep, remove, err) in &outcome.failed {
        print_error(&format!("{} -> {}: {}", remove, keep, err));
    }
}

fn person_label(catalog: &SqliteCatalogStore, id: i64) -> Result<String> {
    match catalog.get_person(id)? {
        Some(person) => Ok(format!("{} ({})", person.full_name().trim(), id)),
        None => bail!("Person {} not found", id),
    }
}

fn location_label(catalog: &SqliteCatalogStore, id: i64) -> Result<String> {
    match catalog.read(|conn| family_films_catalog::catalog_store::queries::get_location(conn, id))? {
        Some(location) => Ok(format!("{} ({})", location.name, id)),
        None => bail!("Location {} not found", id),
    }
}

fn run_user_command(command: UserCommand, ctx: &mut AdminContext) -> Result<()> {
    match command {
        UserCommand::Add {
            handle,
            password,
            staff,
        } => {
            let user_id = ctx.user_manager.add_user(&handle, staff)?;
            ctx.user_manager.set_password(&handle, &password)?;
            print_success(&format!("Created user {} with id {}", handle, user_id));
        }
        UserCommand::SetPassword { handle, password } => {
            ctx.user_manager.set_password(&handle, &password)?;
            print_success(&format!("Password of {} updated", handle));
        }
        UserCommand::SetStaff { handle, is_staff } => {
            ctx.user_manager.set_staff(&handle, is_staff)?;
            print_success(&format!("{} staff: {}", handle, is_staff));
        }
        UserCommand::List => {
            let users = ctx.user_manager.get_all_users()?;
            if users.is_empty() {
                print_empty_list("No users.");
                return Ok(());
            }
            let mut table = TableBuilder::new(vec!["Id", "Handle", "Staff", "Created"]);
            for user in users {
                let created: chrono::DateTime<chrono::Utc> = user.created.into();
                table.add_row(vec![
                    user.id.to_string(),
                    user.handle,
                    user.is_staff.to_string(),
                    created.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
            table.print();
        }
    }
    Ok(())
}

fn run_locations_command(command: LocationsCommand, ctx: &AdminContext) -> Result<()> {
    let catalog = &ctx.catalog;
    match command {
        LocationsCommand::Cleanup { csv, dry_run } => {
            let rules = location_tools::load_cleanup_rules(&csv)?;
            print_key_value("Rules", &rules.len().to_string());
            let outcomes = location_tools::apply_cleanup_rules(catalog, &rules, dry_run);
            let mut table = TableBuilder::new(vec!["Row", "Location", "Films", "Chapters", "Added", "Removed"]);
            for outcome in outcomes.iter().filter(|o| o.found && o.error.is_none()) {
                table.add_row(vec![
                    outcome.row.to_string(),
                    outcome.current.clone(),
                    outcome.films.to_string(),
                    outcome.chapters.to_string(),
                    outcome.links_added.to_string(),
                    outcome.links_removed.to_string(),
                ]);
            }
            table.print();
            for missing in outcomes.iter().filter(|o| !o.found && o.error.is_none()) {
                print_warning(&format!("Row {}: '{}' not found", missing.row, missing.current));
            }
            let failed: Vec<_> = outcomes.iter().filter(|o| o.error.is_some()).collect();
            for outcome in &failed {
                print_error(&format!(
                    "Row {}: '{}' failed: {}",
                    outcome.row,
                    outcome.current,
                    outcome.error.as_deref().unwrap_or_default()
                ));
            }
            print_key_value("Failed", &failed.len().to_string());
            if dry_run {
                print_dry_run_notice();
            }
        }
        LocationsCommand::Orphans { remove, yes } => {
            let orphans = catalog.read(location_tools::orphan_locations)?;
            if orphans.is_empty() {
                print_empty_list("No orphan locations.");
                return Ok(());
            }
            for location in &orphans {
                print_list_item(&format!("{} ({})", location.name, location.id), 1);
            }
            if remove && confirm(&format!("Delete {} locations?", orphans.len()), yes)? {
                let removed = location_tools::remove_orphan_locations(catalog, false)?;
                print_success(&format!("Removed {} locations", removed.len()));
            }
        }
        LocationsCommand::Stats => {
            let stats = catalog.read(location_tools::location_stats)?;
            print_section_header("Locations");
            print_key_value("Total", &stats.total.to_string());
            print_key_value("With film rows", &stats.with_film_rows.to_string());
            print_key_value("With chapter rows", &stats.with_chapter_rows.to_string());
            print_key_value("With any rows", &stats.with_any_rows.to_string());
            print_key_value("Orphaned", &stats.orphaned.to_string());
            print_key_value("Compound names", &stats.compound.len().to_string());
            print_key_value("Similar pairs", &stats.similar.len().to_string());
            print_section_footer();
            let mut table = TableBuilder::new(vec!["Location", "Films"]);
            for entry in &stats.top {
                table.add_row(vec![entry.item.name.clone(), entry.film_count.to_string()]);
            }
            table.print();
        }
        LocationsCommand::Duplicates => {
            print_section_header("Similar names");
            let similar = catalog.read(curation::find_similar_locations)?;
            if similar.is_empty() {
                print_empty_list("None.");
            }
            for (a, b) in similar {
                print_list_item(&format!("{} ({})  ~  {} ({})", a.name, a.id, b.name, b.id), 1);
            }
            print_section_header("Compound names");
            let compound = catalog.read(curation::find_compound_locations)?;
            if compound.is_empty() {
                print_empty_list("None.");
            }
            for location in compound {
                print_list_item(&format!("{} ({})", location.name, location.id), 1);
            }
            print_section_footer();
        }
    }
    Ok(())
}

fn run_import_command(command: ImportCommand, ctx: &AdminContext) -> Result<()> {
    match command {
        ImportCommand::Films {
            csv,
            playlist_id: explicit,
            dry_run,
        } => {
            let text = std::fs::read_to_string(&csv).with_context(|| format!("Failed to read {:?}", csv))?;
            let playlist = playlist_id(
                explicit
                    .as_deref()
                    .or(ctx.import_playlist_id.as_deref())
                    .unwrap_or_default(),
            );
            let stats = import::import_films_csv(&ctx.catalog, &text, &playlist, dry_run)?;
            print_section_header("Film import");
            print_key_value("Films", &stats.films.to_string());
            print_key_value("Chapters", &stats.chapters.to_string());
            print_key_value("People", &stats.people.to_string());
            print_key_value("Locations", &stats.locations.to_string());
            print_key_value("Tags", &stats.tags.to_string());
            print_key_value("Errors", &stats.errors.len().to_string());
            for err in stats.errors.iter().take(ERRORS_SHOWN) {
                print_error(err);
            }
            print_section_footer();
            if dry_run {
                print_dry_run_notice();
            }
        }
        ImportCommand::Chapters { sheets, dry_run } => {
            let mut table = TableBuilder::new(vec!["Sheet", "Film", "Rows", "Matched", "Unmatched", "Failed"]);
            for path in sheets {
                let sheet_name = sheet_name(&path);
                let result = SheetGrid::load(&path)
                    .and_then(|grid| import::import_chapter_sheet(&ctx.catalog, &sheet_name, &grid, dry_run));
                match result {
                    Ok(summary) => table.add_row(vec![
                        summary.sheet,
                        summary.film_file_id,
                        summary.processed.to_string(),
                        summary.matched.to_string(),
                        summary.unmatched.to_string(),
                        summary.failed.to_string(),
                    ]),
                    Err(e) => print_error(&format!("Sheet {}: {:#}", sheet_name, e)),
                }
            }
            table.print();
            if dry_run {
                print_dry_run_notice();
            }
        }
    }
    Ok(())
}

fn sheet_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run_genealogy_command(command: GenealogyCommand, ctx: &AdminContext) -> Result<()> {
    let catalog = &ctx.catalog;
    match command {
        GenealogyCommand::Export { path } => {
            let count = genealogy::export_to_file(catalog, &path)?;
            print_success(&format!("Exported {} people to {}", count, path.display()));
        }
        GenealogyCommand::Sync { path, dry_run } => {
            let stats = genealogy::sync_from_file(catalog, &path, dry_run)?;
            print_section_header("Genealogy sync");
            print_key_value("Found", &stats.found.to_string());
            print_key_value("Updated", &stats.updated.to_string());
            print_key_value("Relationships added", &stats.relationships_added.to_string());
            print_key_value("Notes added", &stats.notes_added.to_string());
            print_key_value("Dates added", &stats.dates_added.to_string());
            print_key_value("Not found", &stats.not_found.to_string());
            print_section_footer();
            if dry_run {
                print_dry_run_notice();
            }
        }
        GenealogyCommand::Validate => {
            let problems = catalog.read(genealogy::check_integrity)?;
            if problems.is_empty() {
                print_success("No relationship issues found.");
                return Ok(());
            }
            for person in problems {
                print_warning(&format!("{} ({})", person.name, person.person_id));
                for issue in person.issues {
                    print_list_item(&issue.to_string(), 2);
                }
            }
        }
        GenealogyCommand::Stats => {
            let people = catalog.read(list_people)?;
            let stats = GenealogyStats::of(&people);
            print_section_header("Genealogy");
            for (label, value) in stats.lines() {
                print_key_value(label, &value);
            }
            print_section_footer();
        }
        GenealogyCommand::Report { path } => {
            let report = genealogy::write_report(catalog, &path)?;
            print_success(&format!(
                "Wrote report of {} people to {}",
                report.total_people,
                path.display()
            ));
        }
    }
    Ok(())
}

fn run_command(command: InnerCommand, ctx: &mut AdminContext) -> Result<CommandExecutionResult> {
    match command {
        InnerCommand::User(command) => run_user_command(command, ctx)?,
        InnerCommand::MergePerson {
            keep,
            remove,
            dry_run,
            yes,
        } => {
            let action = format!(
                "Merge {} into {}?",
                person_label(&ctx.catalog, remove)?,
                person_label(&ctx.catalog, keep)?
            );
            if dry_run || confirm(&action, yes)? {
                let report = curation::merge_persons(&ctx.catalog, keep, remove, dry_run)?;
                print_merge_report(&report);
            }
        }
        InnerCommand::MergeLocation {
            keep,
            remove,
            dry_run,
            yes,
        } => {
            let action = format!(
                "Merge {} into {}?",
                location_label(&ctx.catalog, remove)?,
                location_label(&ctx.catalog, keep)?
            );
            if dry_run || confirm(&action, yes)? {
                let report = curation::merge_locations(&ctx.catalog, keep, remove, dry_run)?;
                print_merge_report(&report);
            }
        }
        InnerCommand::FindDuplicates { auto_merge, yes } => {
            let candidates = ctx.catalog.read(curation::find_blank_last_name_duplicates)?;
            if candidates.is_empty() {
                print_empty_list("No duplicate candidates.");
                return Ok(CommandExecutionResult::Ok);
            }
            let mut table = TableBuilder::new(vec!["Keep", "Film/chapter rows", "Remove", "Film/chapter rows"]);
            for c in &candidates {
                table.add_row(vec![
                    format!("{} ({})", c.keep.name, c.keep.id),
                    format!("{}/{}", c.keep.film_rows, c.keep.chapter_rows),
                    format!("{} ({})", c.remove.name, c.remove.id),
                    format!("{}/{}", c.remove.film_rows, c.remove.chapter_rows),
                ]);
            }
            table.print();
            if auto_merge && confirm(&format!("Merge {} pairs?", candidates.len()), yes)? {
                let pairs: Vec<(i64, i64)> = candidates.iter().map(|c| (c.keep.id, c.remove.id)).collect();
                print_batch(&curation::merge_person_pairs(&ctx.catalog, &pairs, false));
            }
        }
        InnerCommand::MergeIdenticalNames { apply, yes } => {
            let groups = ctx.catalog.read(curation::find_identical_name_duplicates)?;
            if groups.is_empty() {
                print_empty_list("No identical names.");
                return Ok(CommandExecutionResult::Ok);
            }
            for group in &groups {
                print_list_item(&format!("keep {} ({})", group.keep.name, group.keep.id), 1);
                for dup in &group.duplicates {
                    print_list_item(
                        &format!("remove {} ({}), {}/{} rows", dup.name, dup.id, dup.film_rows, dup.chapter_rows),
                        2,
                    );
                }
            }
            let pairs: Vec<(i64, i64)> = groups
                .iter()
                .flat_map(|g| g.duplicates.iter().map(move |d| (g.keep.id, d.id)))
                .collect();
            if !apply {
                print_warning("Run with --apply to merge.");
            } else if confirm(&format!("Merge {} duplicates?", pairs.len()), yes)? {
                print_batch(&curation::merge_person_pairs(&ctx.catalog, &pairs, false));
            }
        }
        InnerCommand::Locations(command) => run_locations_command(command, ctx)?,
        InnerCommand::People(PeopleCommand::Orphans { remove, yes }) => {
            let orphans = ctx.catalog.read(location_tools::orphan_people)?;
            if orphans.is_empty() {
                print_empty_list("No orphan people.");
                return Ok(CommandExecutionResult::Ok);
            }
            for person in &orphans {
                print_list_item(&format!("{} ({})", person.full_name().trim(), person.id), 1);
            }
            if remove && confirm(&format!("Delete {} people?", orphans.len()), yes)? {
                let removed = location_tools::remove_orphan_people(&ctx.catalog, false)?;
                print_success(&format!("Removed {} people", removed.len()));
            }
        }
        InnerCommand::Import(command) => run_import_command(command, ctx)?,
        InnerCommand::Export { path } => {
            let total = catalog_export::export_to_file(&ctx.catalog, &path)?;
            print_success(&format!("Exported {} records to {}", total, path.display()));
        }
        InnerCommand::ImportJson {
            path,
            dry_run,
            clear_existing,
            yes,
        } => {
            if clear_existing
                && !dry_run
                && !confirm("This deletes every film, chapter, person, location and tag first.", yes)?
            {
                return Ok(CommandExecutionResult::Ok);
            }
            let report = catalog_export::import_from_file(&ctx.catalog, &path, clear_existing, dry_run)?;
            let mut table = TableBuilder::new(vec!["Table", "Imported", "Failed"]);
            for table_import in &report.tables {
                table.add_row(vec![
                    table_import.table.clone(),
                    table_import.imported.to_string(),
                    table_import.failed.to_string(),
                ]);
            }
            table.print();
            for key in &report.missing_keys {
                print_warning(&format!("Missing key: {}", key));
            }
            print_key_value("Imported", &report.total_imported().to_string());
            print_key_value("Failed", &report.total_failed().to_string());
            if dry_run {
                print_dry_run_notice();
            }
        }
        InnerCommand::Genealogy(command) => run_genealogy_command(command, ctx)?,
        InnerCommand::Where => {
            print_key_value("Catalog", &ctx.db_dir.join("catalog.db").display().to_string());
            print_key_value("Users", &ctx.db_dir.join("user.db").display().to_string());
        }
        InnerCommand::Exit => return Ok(CommandExecutionResult::Exit),
    }
    Ok(CommandExecutionResult::Ok)
}

fn execute_command(args: Vec<String>, ctx: &mut AdminContext) -> CommandExecutionResult {
    if args.is_empty() {
        return CommandExecutionResult::Ok;
    }

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));
    match cli {
        Ok(cli) => match run_command(cli.command, ctx) {
            Ok(result) => result,
            Err(err) => CommandExecutionResult::Error(format!("{:#}", err)),
        },
        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
            CommandExecutionResult::Ok
        }
    }
}

fn split_line(line: &str) -> Vec<String> {
    shlex::split(line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect())
}

#[derive(rustyline_derive::Hinter)]
struct CommandHelper {
    commands_names: Vec<String>,
}

impl CommandHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .chain(std::iter::once("help".to_string()))
            .collect();

        CommandHelper { commands_names }
    }
}

impl Completer for CommandHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .cloned()
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for CommandHelper {}
impl Validator for CommandHelper {}
impl Helper for CommandHelper {}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let db_dir = match cli_args.db_dir {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let file_config = cli_args.config.as_deref().map(FileConfig::load).transpose()?;
    let mut ctx = AdminContext::open(db_dir, file_config)?;

    if !cli_args.command.is_empty() {
        return match execute_command(cli_args.command, &mut ctx) {
            CommandExecutionResult::Error(err) => {
                print_error(&err);
                bail!("Command failed")
            }
            _ => Ok(()),
        };
    }

    print_welcome(&ctx.db_dir.display().to_string());

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<CommandHelper, FileHistory>::with_config(config)?;
    rl.set_helper(Some(CommandHelper::new()));

    loop {
        match rl.readline(&get_prompt()) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(split_line(&line), &mut ctx) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => break,
                    CommandExecutionResult::Error(err) => print_error(&err),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                print_error(&format!("{:?}", e));
                break;
            }
        }
    }
    print_goodbye();
    Ok(())
}
