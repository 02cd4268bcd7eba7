use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::documents::{DocumentService, MemoryDocuments, NewBlock, Page, PageOptions};

/// Page store persisted as one JSON page per line in `pages.data`.
///
/// Every mutation rewrites the file atomically before returning.
#[derive(Debug)]
pub struct FileDocuments {
    pub data_dir: PathBuf,
    pub pages_path: PathBuf,
    pages: MemoryDocuments,
}

impl FileDocuments {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let pages_path = data_dir.join("pages.data");
        if !pages_path.exists() {
            fs::write(&pages_path, "")?;
        }

        let pages = load_jsonl(&pages_path).context("failed to load pages.data")?;
        info!(
            data_dir = %data_dir.display(),
            pages = pages.len(),
            "opened page store"
        );

        Ok(Self {
            data_dir,
            pages_path,
            pages: MemoryDocuments::from_pages(pages),
        })
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.pages()
    }

    #[tracing::instrument(skip(self))]
    fn save(&self) -> anyhow::Result<()> {
        let pages = self.pages.pages().collect::<Vec<_>>();
        save_jsonl_atomic(&self.pages_path, &pages).context("failed to save pages.data")
    }
}

impl DocumentService for FileDocuments {
    fn get_page(&self, name: &str) -> anyhow::Result<Option<Page>> {
        self.pages.get_page(name)
    }

    fn create_page(&mut self, name: &str, options: PageOptions) -> anyhow::Result<Page> {
        let page = self.pages.create_page(name, options)?;
        self.save()?;
        Ok(page)
    }

    fn insert_blocks(&mut self, page: &str, blocks: Vec<NewBlock>) -> anyhow::Result<Vec<Uuid>> {
        let ids = self.pages.insert_blocks(page, blocks)?;
        self.save()?;
        Ok(ids)
    }

    fn remove_block(&mut self, page: &str, block: Uuid) -> anyhow::Result<bool> {
        let removed = self.pages.remove_block(page, block)?;
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    fn rename_page(&mut self, from: &str, to: &str) -> anyhow::Result<()> {
        self.pages.rename_page(from, to)?;
        self.save()
    }

    fn apply_template(&mut self, page: &str, template: &str) -> anyhow::Result<bool> {
        let applied = self.pages.apply_template(page, template)?;
        if applied {
            self.save()?;
        }
        Ok(applied)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Page>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let page: Page = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(page);
    }

    debug!(count = out.len(), "loaded pages from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, pages))]
fn save_jsonl_atomic(path: &Path, pages: &[&Page]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = pages.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for page in pages {
        let serialized = serde_json::to_string(page)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
