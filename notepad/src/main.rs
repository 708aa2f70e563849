use std::sync::Arc;

use notepad::actors::{collection, draft, Notepad};
use notepad::config::Config;
use notepad::labels::local_note_date_label;
use notepad::remote::HttpNoteStore;
use notepad::session::{LogOnlySession, SharedSessionObserver};
use shared_types::{Category, CategoryId};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "usage: notepad [list [CATEGORY]] | notepad new TITLE [CONTENT]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "notepad=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(api_url = %config.api_url, "notepad starting");

    let store = Arc::new(HttpNoteStore::new(&config)?);
    let session: SharedSessionObserver = Arc::new(LogOnlySession);
    let notepad = Notepad::spawn(store, session, config.autosave_delay).await?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        None | Some("list") => list(&notepad, args.get(1).map(String::as_str)).await,
        Some("new") => match args.get(1) {
            Some(title) => compose(&notepad, title, args.get(2).map(String::as_str)).await,
            None => Err(anyhow::anyhow!(USAGE)),
        },
        Some(_) => Err(anyhow::anyhow!(USAGE)),
    };

    notepad.stop();
    result
}

async fn list(notepad: &Notepad, category: Option<&str>) -> anyhow::Result<()> {
    if !collection::refresh(&notepad.collection).await? {
        anyhow::bail!("Could not load notes; check NOTES_API_URL and NOTES_SESSION_ID");
    }
    let snapshot = collection::collection_snapshot(&notepad.collection).await?;

    let filter = match category {
        Some(name) => Some(find_category(&snapshot.categories, name)?),
        None => None,
    };
    draft::set_filter_category(&notepad.draft, filter)?;

    let by_id = snapshot.category_by_id();
    let counts = snapshot.category_counts();
    for category in &snapshot.categories {
        let count = counts.get(&category.id).copied().unwrap_or(0);
        println!("{:<24} {count}", category.name);
    }
    println!();

    for note in snapshot.filtered_notes(filter) {
        let category = note
            .category
            .and_then(|id| by_id.get(&id))
            .map(|c| c.name.as_str())
            .unwrap_or("-");
        let date = note
            .last_touched_at()
            .map(local_note_date_label)
            .unwrap_or_default();
        println!("{:>10}  {:<18} {}", date, category, note.title);
    }
    Ok(())
}

/// Compose a note through the draft controller, exactly as an editor would
async fn compose(notepad: &Notepad, title: &str, content: Option<&str>) -> anyhow::Result<()> {
    if !collection::refresh(&notepad.collection).await? {
        anyhow::bail!("Could not load notes; check NOTES_API_URL and NOTES_SESSION_ID");
    }

    draft::open_new_note(&notepad.draft)?;
    draft::change_title(&notepad.draft, title)?;
    draft::change_content(&notepad.draft, content.unwrap_or_default())?;
    draft::close_note(&notepad.draft).await?;

    let snapshot = collection::collection_snapshot(&notepad.collection).await?;
    match snapshot.notes.iter().find(|n| n.title == title.trim()) {
        Some(note) => info!(note_id = note.id, "Note saved"),
        None => info!("Note saved; not yet visible in the refreshed list"),
    }
    Ok(())
}

fn find_category(categories: &[Category], name: &str) -> anyhow::Result<CategoryId> {
    categories
        .iter()
        .find(|c| c.name.trim().eq_ignore_ascii_case(name.trim()))
        .map(|c| c.id)
        .ok_or_else(|| anyhow::anyhow!("No category named '{name}'"))
}
