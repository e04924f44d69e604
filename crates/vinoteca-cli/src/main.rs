use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use dotenvy::dotenv;
use futures::stream::{self, StreamExt};
use sqlx::postgres::PgPoolOptions;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use vinoteca::output::{csv_row, rating_stars, summary_line, truncate_text, CSV_HEADER};
use vinoteca::{cellar_filter, Command, Config, DetailArgs, EntryArgs, ExportFormat, SortArg};
use vinoteca_client::GeminiClient;
use vinoteca_core::normalize::normalize_document;
use vinoteca_core::{
    default_config_path, load_journal_config, parse_import_documents, plan_import, AppError,
    FilterOptions, ImportOutcome, ImportSummary, Journal, JournalConfig, PersonalEntry,
    RecommendationContext, ResearchFlow, ResearchService, ResearchedData, SaveRequest, TypeFilter,
    WineId, WinePatch, WineQuery, WineRecord,
};
use vinoteca_db::WineRepository;

/// Concurrent database writes during import.
const IMPORT_CONCURRENCY: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Parse command line arguments
    let config = Config::parse();

    // Setup logging (stderr to keep stdout clean for exports)
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if config.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    if let Err(e) = run(config).await {
        match e.downcast_ref::<AppError>() {
            Some(app_error) => eprintln!("\n❌ {}\n", app_error.user_message()),
            None => eprintln!("\n❌ {:#}\n", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    let journal_config = match config.config.clone().or_else(default_config_path) {
        Some(path) => load_journal_config(&path)?,
        None => JournalConfig::default(),
    };

    // Database connection
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(journal_config.database.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let repo = WineRepository::new(pool);
    repo.migrate().await?;

    // Execute command
    match config.command {
        Command::Research {
            name,
            image,
            save,
            entry,
        } => {
            let gemini = gemini_client(config.gemini_api_key.as_deref(), &journal_config)?;
            let service = ResearchService::new(gemini, journal_config.research.timeout());
            let mut journal = Journal::new(repo);
            research(&mut journal, &service, &name, image.as_deref(), save, &entry).await?;
        }
        Command::Add {
            name,
            details,
            entry,
        } => {
            let mut journal = Journal::new(repo);
            add_manual(&mut journal, &name, details, &entry).await?;
        }
        Command::List {
            search,
            types,
            cellar,
            not_in_cellar,
            sort,
        } => {
            let mut journal = Journal::new(repo);
            journal.load().await?;
            let filters = FilterOptions {
                wine_type: if types.is_empty() {
                    TypeFilter::All
                } else {
                    TypeFilter::from_selection(&types.into_iter().collect::<BTreeSet<_>>())
                },
                in_cellar: cellar_filter(cellar, not_in_cellar),
            };
            list(&journal, search.as_deref().unwrap_or(""), filters, sort);
        }
        Command::Show { id } => {
            let mut journal = Journal::new(repo);
            journal.load().await?;
            let id = WineId::new(id);
            let wine = journal
                .store()
                .get(&id)
                .ok_or_else(|| AppError::WineNotFound(id.to_string()))?;
            print_record(wine);
        }
        Command::Edit {
            id,
            name,
            details,
            rating,
            notes,
            in_cellar,
        } => {
            let patch = WinePatch {
                name,
                rating,
                notes,
                in_cellar,
                ..details.into_patch()
            };
            let mut journal = Journal::new(repo);
            journal.load().await?;
            edit(&mut journal, WineId::new(id), &patch).await?;
        }
        Command::Delete { id } => {
            let mut journal = Journal::new(repo);
            journal.load().await?;
            match journal.delete(&WineId::new(id.as_str())).await? {
                Some(wine) => println!("\n🗑  Deleted {} {} ({})\n", wine.name, wine.vintage_label(), wine.id),
                None => println!("\nNo wine with id {}. Nothing deleted.\n", id),
            }
        }
        Command::Ask { question } => {
            let gemini = gemini_client(config.gemini_api_key.as_deref(), &journal_config)?;
            let mut journal = Journal::new(repo);
            journal.load().await?;
            ask(&journal, &gemini, &question).await?;
        }
        Command::Export { format, limit } => {
            export(&repo, format, limit).await?;
        }
        Command::Import { path } => {
            import(&repo, &path).await?;
        }
        Command::Stats => {
            show_stats(&repo).await?;
        }
    }

    Ok(())
}

fn gemini_client(api_key: Option<&str>, config: &JournalConfig) -> anyhow::Result<GeminiClient> {
    let api_key = api_key
        .filter(|key| !key.trim().is_empty())
        .context("GEMINI_API_KEY is required for this command")?;
    Ok(GeminiClient::new(api_key, &config.research, &config.http)?)
}

/// Research a wine and, with `--save`, confirm the draft into the journal
async fn research(
    journal: &mut Journal<WineRepository>,
    service: &ResearchService<GeminiClient>,
    name: &str,
    image_path: Option<&Path>,
    save: bool,
    entry: &EntryArgs,
) -> anyhow::Result<()> {
    let image = match image_path {
        Some(path) => Some(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read image {}", path.display()))?,
        ),
        None => None,
    };

    let mut flow = ResearchFlow::new();
    flow.open()?;
    let ticket = flow.submit(name)?;

    info!("Researching '{}'...", name.trim());
    let outcome = service.lookup(name, image.as_deref()).await;
    if let Err(e) = &outcome {
        error!("Research failed: {}", e);
    }
    flow.complete(ticket, outcome);

    if let Some(message) = flow.error() {
        println!("\n🔍 {}", message);
        println!("   Try: vinoteca add \"{}\"\n", name.trim());
        bail!("research for '{}' failed", name.trim());
    }

    let Some(draft) = flow.draft_mut() else {
        bail!("research returned no draft to confirm");
    };
    print_draft(draft);

    if !save {
        flow.cancel();
        println!("Not saved. Re-run with --save to add it to your journal.\n");
        return Ok(());
    }

    let id = save_flow(journal, &mut flow, entry.personal(), &WinePatch::default()).await?;
    println!("✓ Saved as {}\n", id);
    Ok(())
}

/// Add a wine without research
async fn add_manual(
    journal: &mut Journal<WineRepository>,
    name: &str,
    details: DetailArgs,
    entry: &EntryArgs,
) -> anyhow::Result<()> {
    let mut flow = ResearchFlow::new();
    flow.open()?;
    flow.manual_entry(name)?;

    if let Some(draft) = flow.draft_mut() {
        let patch = details.into_patch();
        draft.vintage = patch.vintage.unwrap_or(draft.vintage);
        draft.varietal = patch.varietal.unwrap_or_default();
        draft.country = patch.country.unwrap_or_default();
        draft.wine_type = patch.wine_type.unwrap_or_default();
        draft.price = patch.price.unwrap_or_default();
    }

    let id = save_flow(journal, &mut flow, entry.personal(), &WinePatch::default()).await?;
    println!("\n✓ Added {} ({})\n", name.trim(), id);
    Ok(())
}

/// Apply a patch through the edit flow
async fn edit(
    journal: &mut Journal<WineRepository>,
    id: WineId,
    patch: &WinePatch,
) -> anyhow::Result<()> {
    if patch.is_empty() {
        bail!("nothing to change; pass at least one field flag");
    }

    let mut flow = ResearchFlow::new();
    flow.start_edit(id)?;
    let id = save_flow(journal, &mut flow, PersonalEntry::default(), patch).await?;

    if let Some(wine) = journal.store().get(&id) {
        println!("\n✓ Updated:");
        print_record(wine);
    }
    Ok(())
}

/// Persists whatever the flow's `save` asks for.
async fn save_flow(
    journal: &mut Journal<WineRepository>,
    flow: &mut ResearchFlow,
    personal: PersonalEntry,
    patch: &WinePatch,
) -> Result<WineId, AppError> {
    match flow.save()? {
        SaveRequest::Create(draft) => journal.add(draft, personal).await,
        SaveRequest::Update(id) => {
            journal.update(&id, patch).await?;
            Ok(id)
        }
    }
}

/// List wines matching the query
fn list(journal: &Journal<WineRepository>, search: &str, filters: FilterOptions, sort: SortArg) {
    let wines = WineQuery::new(search)
        .with_filters(filters)
        .with_sort(sort.into())
        .run(journal.records());

    if wines.is_empty() {
        if journal.store().is_empty() {
            println!("\n🍷 Your journal is empty.\n");
            println!("Try:");
            println!("  • vinoteca research \"<wine name>\" --save");
            println!("  • vinoteca add \"<wine name>\" --rating 4");
        } else {
            println!("\n🔍 No wines match. Try a different search or fewer filters.\n");
        }
        return;
    }

    println!(
        "\n🍷 {} of {} wines\n",
        wines.len(),
        journal.store().len()
    );
    for (i, wine) in wines.iter().enumerate() {
        println!("{}", summary_line(i + 1, wine));
        let origin = [wine.varietal.as_str(), wine.country.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if !origin.is_empty() {
            println!("   🍇 {}", origin);
        }
        if !wine.notes.is_empty() {
            println!("   📝 {}", truncate_text(&wine.notes, 100));
        }
        println!("   🆔 {}", wine.id);
        println!();
    }
}

fn print_draft(draft: &ResearchedData) {
    println!("\n🔍 {}", draft.name);
    println!(
        "   {} · {} · {} · {}",
        if draft.vintage > 0 { draft.vintage.to_string() } else { "N/V".to_string() },
        or_dash(&draft.varietal),
        or_dash(&draft.country),
        draft.wine_type
    );
    if draft.public_rating > 0.0 {
        println!(
            "   ⭐ {:.1}/5 from {} reviews ({})",
            draft.public_rating,
            draft.review_count,
            or_dash(&draft.rating_source)
        );
    }
    if draft.price > 0.0 {
        println!("   💲 ~${:.2}", draft.price);
    }
    if !draft.description.is_empty() {
        println!("   📝 {}", truncate_text(&draft.description, 240));
    }
    println!("   🖼  {}\n", draft.image_url);
}

fn print_record(wine: &WineRecord) {
    println!("\n🍷 {} {}\n", wine.name, wine.vintage_label());
    println!("  Id:            {}", wine.id);
    println!("  Type:          {}", wine.wine_type);
    println!("  Varietal:      {}", or_dash(&wine.varietal));
    println!("  Country:       {}", or_dash(&wine.country));
    println!("  My rating:     {}", rating_stars(wine.rating));
    println!("  In cellar:     {}", if wine.in_cellar { "yes" } else { "no" });
    if wine.public_rating > 0.0 {
        println!(
            "  Public rating: {:.1}/5 ({} reviews, {})",
            wine.public_rating,
            wine.review_count,
            or_dash(&wine.rating_source)
        );
    }
    if wine.price > 0.0 {
        println!("  Price:         ${:.2}", wine.price);
    }
    if !wine.notes.is_empty() {
        println!("  Notes:         {}", wine.notes);
    }
    if !wine.description.is_empty() {
        println!("  Description:   {}", wine.description);
    }
    println!("  Image:         {}", wine.image_url);
    println!("  Added:         {}", wine.date_added);
    println!("  Last updated:  {}", wine.last_updated);
    println!();
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

/// Ask for recommendations grounded on the cellar and liked wines
async fn ask(
    journal: &Journal<WineRepository>,
    gemini: &GeminiClient,
    question: &str,
) -> anyhow::Result<()> {
    let context = RecommendationContext::from_collection(journal.records());
    if context.is_empty() {
        info!("No cellar or highly rated wines yet; the answer will be generic");
    }

    let answer = gemini.recommend(question, &context).await?;
    println!("\n{}\n", answer.trim());
    Ok(())
}

/// Show journal statistics
async fn show_stats(repo: &WineRepository) -> anyhow::Result<()> {
    let stats = repo.get_stats().await?;

    println!("\n📊 Journal Statistics\n");
    println!("  Total wines:           {}", stats.total_wines);
    println!("  In cellar:             {}", stats.in_cellar);
    println!("  Rated:                 {}", stats.rated);
    println!("  Countries:             {}", stats.countries);
    if let Some(last_update) = stats.last_update {
        println!("  Last update:           {}", last_update);
    }
    println!();

    Ok(())
}

/// Export wines to various formats
async fn export(
    repo: &WineRepository,
    format: ExportFormat,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    info!("Exporting wines...");

    let now = Utc::now();
    let wines: Vec<WineRecord> = repo
        .list_all(limit)
        .await?
        .iter()
        .map(|doc| doc.to_record(now))
        .collect();

    if wines.is_empty() {
        eprintln!("No wines found to export.");
        return Ok(());
    }

    match format {
        ExportFormat::Jsonl => {
            for wine in &wines {
                println!("{}", serde_json::to_string(wine)?);
            }
        }
        ExportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&wines)?);
        }
        ExportFormat::Csv => {
            println!("{}", CSV_HEADER);
            for wine in &wines {
                println!("{}", csv_row(wine));
            }
        }
    }

    info!("Export complete: {} wines", wines.len());
    Ok(())
}

/// Import an export file, writing only documents whose content changed
async fn import(repo: &WineRepository, path: &Path) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let documents = parse_import_documents(&text)?;
    let stored = repo.get_hashes().await?;

    let total = documents.len();
    info!("Importing {} documents from {}", total, path.display());

    let now = Utc::now();
    let summary: ImportSummary = stream::iter(documents.into_iter().enumerate())
        .map(|(i, document)| {
            let planned = plan_import(normalize_document(None, &document, now), &stored);

            async move {
                if !planned.needs_write() {
                    return planned.outcome;
                }
                match repo.upsert_document(&planned.record, &planned.hash).await {
                    Ok(()) => {
                        info!(
                            "[{}/{}] ✓ {}: {} ({:?})",
                            i + 1,
                            total,
                            planned.record.name,
                            planned.id(),
                            planned.outcome
                        );
                        planned.outcome
                    }
                    Err(e) => {
                        error!("[{}/{}] Failed to save {}: {}", i + 1, total, planned.id(), e);
                        ImportOutcome::Failed
                    }
                }
            }
        })
        .buffer_unordered(IMPORT_CONCURRENCY)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect();

    info!("Import complete: {}", summary);
    if summary.has_failures() {
        bail!("{} of {} documents failed to import", summary.failed, summary.total());
    }

    Ok(())
}
