//! Bulk catalog import from Open Library search results
//!
//! Pages (`{"docs": [...]}`) come either from a file of concatenated
//! `search.json` payloads or straight from the Open Library search API,
//! paged by offset. Each usable doc becomes one book: first author, title
//! and author clipped to the store's limits, and a generated description.

use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use shelfdb::{BookStore, NewBook, MAX_AUTHOR_LEN, MAX_TITLE_LEN};
use tracing::{debug, info, warn};

/// Longest generated description, in characters
const DESCRIPTION_WIDTH: usize = 300;

/// Open Library search endpoint
pub const SEARCH_URL: &str = "https://openlibrary.org/search.json";

/// Subject query that yields a large result set
const SEARCH_QUERY: &str = "subject:fiction";

/// Docs requested per page; also the offset step
pub const PAGE_SIZE: usize = 100;

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Pause between page requests
pub const PAGE_PAUSE: Duration = Duration::from_millis(300);

/// One page of Open Library search results
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub docs: Vec<Doc>,
}

/// A search result document; only the fields the importer reads
#[derive(Debug, Clone, Deserialize)]
pub struct Doc {
    pub title: Option<String>,
    pub author_name: Option<Vec<String>>,
}

/// Counters reported at the end of an import
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// Pages read from the input
    pub pages: usize,
    /// Docs with a title and an author
    pub collected: usize,
    /// Books written to the store
    pub inserted: usize,
    /// Docs dropped for missing or blank fields
    pub skipped: usize,
    /// Inserts the store rejected
    pub failed: usize,
}

/// Import every page in `path`, stopping after `limit` collected books
pub fn import_file(store: &BookStore, path: &Path, limit: usize) -> Result<ImportSummary> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let pages = serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<SearchPage>();

    info!(file = %path.display(), existing = store.len(), limit, "import started");

    let mut summary = ImportSummary::default();
    for page in pages {
        if summary.collected >= limit {
            break;
        }
        let page = page.with_context(|| format!("Invalid search page in {}", path.display()))?;
        if page.docs.is_empty() {
            info!("empty page, stopping");
            break;
        }
        import_page(store, page, limit, &mut summary);
    }

    log_summary(store, &summary);
    Ok(summary)
}

/// Anything that can hand out search pages by offset
pub trait PageSource {
    /// Fetch the page starting at `offset`
    fn fetch(&self, offset: usize) -> impl Future<Output = Result<SearchPage>>;
}

/// HTTP client for the Open Library search API
pub struct OpenLibrary {
    client: reqwest::Client,
    url: String,
}

impl OpenLibrary {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl PageSource for OpenLibrary {
    async fn fetch(&self, offset: usize) -> Result<SearchPage> {
        let params = [
            ("q", SEARCH_QUERY.to_string()),
            ("limit", PAGE_SIZE.to_string()),
            ("offset", offset.to_string()),
        ];

        let page = self
            .client
            .get(&self.url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json::<SearchPage>()
            .await?;
        Ok(page)
    }
}

/// Page through `source` until `limit` books are collected, a page comes
/// back empty, or a fetch fails. Failed fetches end the run; nothing is
/// retried.
pub async fn import_remote<P: PageSource>(
    store: &BookStore,
    source: &P,
    limit: usize,
    pause: Duration,
) -> ImportSummary {
    info!(existing = store.len(), limit, "remote import started");

    let mut summary = ImportSummary::default();
    let mut offset = 0;
    while summary.collected < limit {
        let page = match source.fetch(offset).await {
            Ok(page) => page,
            Err(e) => {
                warn!(offset, error = %e, "page fetch failed, stopping");
                break;
            }
        };
        if page.docs.is_empty() {
            info!(offset, "no more results, stopping");
            break;
        }

        debug!(offset, docs = page.docs.len(), "page fetched");
        import_page(store, page, limit, &mut summary);
        offset += PAGE_SIZE;

        if summary.collected < limit && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    log_summary(store, &summary);
    summary
}

fn log_summary(store: &BookStore, summary: &ImportSummary) {
    info!(
        pages = summary.pages,
        collected = summary.collected,
        inserted = summary.inserted,
        skipped = summary.skipped,
        failed = summary.failed,
        total = store.len(),
        "import finished"
    );
}

/// Insert the usable docs of one page, respecting the overall `limit`
pub fn import_page(store: &BookStore, page: SearchPage, limit: usize, summary: &mut ImportSummary) {
    summary.pages += 1;

    for doc in page.docs {
        if summary.collected >= limit {
            break;
        }
        let Some(new_book) = doc_to_book(doc) else {
            summary.skipped += 1;
            continue;
        };
        summary.collected += 1;

        match store.insert(new_book) {
            Ok(_) => summary.inserted += 1,
            Err(e) => {
                warn!(error = %e, "insert failed");
                summary.failed += 1;
            }
        }
    }
}

fn doc_to_book(doc: Doc) -> Option<NewBook> {
    let title = clip(doc.title.as_deref().unwrap_or_default(), MAX_TITLE_LEN, "title");
    let author = doc
        .author_name
        .as_ref()
        .and_then(|names| names.first())
        .map(|name| clip(name, MAX_AUTHOR_LEN, "author"))
        .unwrap_or_default();

    if title.is_empty() || author.is_empty() {
        return None;
    }

    let description = describe(&title, &author);
    Some(NewBook::new(title, author, Some(description)))
}

/// Trim and cut `text` to at most `max` characters
fn clip(text: &str, max: usize, field: &str) -> String {
    let text = text.trim();
    let len = text.chars().count();
    if len > max {
        warn!(field, len, max, "field truncated");
        return text.chars().take(max).collect();
    }
    text.to_string()
}

/// Short generated description for an imported book
pub fn describe(title: &str, author: &str) -> String {
    let text = format!(
        "\"{}\" is a real book listed in the Open Library public catalog, written by {}. \
         This record was generated for testing library systems, focusing on lookups, \
         search and database performance.",
        title, author
    );
    shorten(&text, DESCRIPTION_WIDTH, "...")
}

/// Collapse whitespace and drop trailing words until `text` fits in `width`
/// characters, marking the cut with `placeholder`
fn shorten(text: &str, width: usize, placeholder: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let collapsed = words.join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(placeholder.chars().count());
    let mut out = String::new();
    let mut used = 0;
    for word in words {
        let extra = word.chars().count() + usize::from(!out.is_empty());
        if used + extra > budget {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        used += extra;
    }
    out.push_str(placeholder);
    out
}
