//! Page and block storage seen through the host's document API.

use std::collections::{BTreeMap, HashMap};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Property marking a page as a template; its value is the template name.
pub const TEMPLATE_PROPERTY: &str = "template";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub uuid: Uuid,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

impl Block {
    fn from_new(block: NewBlock) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            content: block.content,
            children: block.children.into_iter().map(Block::from_new).collect(),
        }
    }

    fn to_new(&self) -> NewBlock {
        NewBlock {
            content: self.content.clone(),
            children: self.children.iter().map(Block::to_new).collect(),
        }
    }

    /// Content of this block and every descendant, depth first.
    pub fn flatten(&self) -> Vec<&str> {
        let mut out = vec![self.content.as_str()];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn is_template(&self) -> bool {
        self.properties.contains_key(TEMPLATE_PROPERTY)
    }

    pub fn find_block(&self, content: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.content == content)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOptions {
    pub properties: BTreeMap<String, String>,
}

/// Block content to insert; the store assigns identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlock {
    pub content: String,
    pub children: Vec<NewBlock>,
}

impl NewBlock {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(content: impl Into<String>, children: Vec<NewBlock>) -> Self {
        Self {
            content: content.into(),
            children,
        }
    }
}

/// The host's page/block API. Page names compare case-insensitively.
pub trait DocumentService {
    fn get_page(&self, name: &str) -> anyhow::Result<Option<Page>>;

    fn create_page(&mut self, name: &str, options: PageOptions) -> anyhow::Result<Page>;

    /// Appends top-level blocks to `page`.
    fn insert_blocks(&mut self, page: &str, blocks: Vec<NewBlock>) -> anyhow::Result<Vec<Uuid>>;

    fn insert_block(&mut self, page: &str, block: NewBlock) -> anyhow::Result<Uuid> {
        self.insert_blocks(page, vec![block])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no block inserted into {page}"))
    }

    /// Removes a top-level block; `false` when it was not there.
    fn remove_block(&mut self, page: &str, block: Uuid) -> anyhow::Result<bool>;

    fn rename_page(&mut self, from: &str, to: &str) -> anyhow::Result<()>;

    fn page_exists(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.get_page(name)?.is_some())
    }

    /// Copies the blocks of template `template` into `page`; `false` when no
    /// such template exists.
    fn apply_template(&mut self, page: &str, template: &str) -> anyhow::Result<bool>;
}

/// In-memory document store.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocuments {
    pages: BTreeMap<String, Page>,
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pages(pages: impl IntoIterator<Item = Page>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|page| (key(&page.name), page))
                .collect(),
        }
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    fn page_mut(&mut self, name: &str) -> anyhow::Result<&mut Page> {
        self.pages
            .get_mut(&key(name))
            .ok_or_else(|| anyhow!("page not found: {name}"))
    }

    fn template(&self, template: &str) -> Option<&Page> {
        self.pages.values().find(|page| {
            page.properties
                .get(TEMPLATE_PROPERTY)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(template.trim()))
        })
    }
}

impl DocumentService for MemoryDocuments {
    fn get_page(&self, name: &str) -> anyhow::Result<Option<Page>> {
        Ok(self.pages.get(&key(name)).cloned())
    }

    fn create_page(&mut self, name: &str, options: PageOptions) -> anyhow::Result<Page> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("page name is empty"));
        }
        if self.pages.contains_key(&key(name)) {
            return Err(anyhow!("page already exists: {name}"));
        }
        let page = Page {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            properties: options.properties,
            blocks: Vec::new(),
        };
        debug!(page = %name, "created page");
        self.pages.insert(key(name), page.clone());
        Ok(page)
    }

    fn insert_blocks(&mut self, page: &str, blocks: Vec<NewBlock>) -> anyhow::Result<Vec<Uuid>> {
        let target = self.page_mut(page)?;
        let mut ids = Vec::with_capacity(blocks.len());
        for block in blocks {
            let block = Block::from_new(block);
            ids.push(block.uuid);
            target.blocks.push(block);
        }
        Ok(ids)
    }

    fn remove_block(&mut self, page: &str, block: Uuid) -> anyhow::Result<bool> {
        let target = self.page_mut(page)?;
        let before = target.blocks.len();
        target.blocks.retain(|existing| existing.uuid != block);
        Ok(target.blocks.len() != before)
    }

    fn rename_page(&mut self, from: &str, to: &str) -> anyhow::Result<()> {
        let to = to.trim();
        if to.is_empty() {
            return Err(anyhow!("new page name is empty"));
        }
        if key(from) != key(to) && self.pages.contains_key(&key(to)) {
            return Err(anyhow!("page already exists: {to}"));
        }
        let mut page = self
            .pages
            .remove(&key(from))
            .ok_or_else(|| anyhow!("page not found: {from}"))?;
        page.name = to.to_string();
        self.pages.insert(key(to), page);
        debug!(from, to, "renamed page");
        Ok(())
    }

    fn apply_template(&mut self, page: &str, template: &str) -> anyhow::Result<bool> {
        let Some(blocks) = self
            .template(template)
            .map(|source| source.blocks.iter().map(Block::to_new).collect::<Vec<_>>())
        else {
            return Ok(false);
        };
        self.insert_blocks(page, blocks)?;
        Ok(true)
    }
}

/// Memoised `page_exists` answers.
#[derive(Debug, Clone, Default)]
pub struct PageExistenceCache {
    known: HashMap<String, bool>,
}

impl PageExistenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists<D>(&mut self, docs: &D, name: &str) -> anyhow::Result<bool>
    where
        D: DocumentService + ?Sized,
    {
        if let Some(known) = self.known.get(&key(name)) {
            return Ok(*known);
        }
        let exists = docs.page_exists(name)?;
        self.known.insert(key(name), exists);
        Ok(exists)
    }

    /// Records a page created or renamed into existence.
    pub fn mark(&mut self, name: &str) {
        self.known.insert(key(name), true);
    }

    pub fn forget(&mut self, name: &str) {
        self.known.remove(&key(name));
    }

    pub fn invalidate(&mut self) {
        if !self.known.is_empty() {
            debug!(entries = self.known.len(), "page existence cache cleared");
        }
        self.known.clear();
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn pages_are_case_insensitive() {
        let mut docs = MemoryDocuments::new();
        docs.create_page("2024-W10", PageOptions::default())
            .expect("create");
        assert!(docs.page_exists("2024-w10").expect("exists"));
        assert!(docs.create_page("2024-w10", PageOptions::default()).is_err());

        docs.rename_page("2024-w10", "2024/W10").expect("rename");
        let page = docs.get_page("2024/w10").expect("get").expect("page");
        assert_eq!(page.name, "2024/W10");
        assert!(!docs.page_exists("2024-W10").expect("exists"));
    }

    #[test]
    fn blocks_insert_and_remove() {
        let mut docs = MemoryDocuments::new();
        docs.create_page("Notes", PageOptions::default())
            .expect("create");
        let id = docs
            .insert_block(
                "Notes",
                NewBlock::with_children("parent", vec![NewBlock::new("child")]),
            )
            .expect("insert");
        let page = docs.get_page("Notes").expect("get").expect("page");
        assert_eq!(page.blocks[0].flatten(), vec!["parent", "child"]);
        assert!(docs.remove_block("Notes", id).expect("remove"));
        assert!(!docs.remove_block("Notes", id).expect("remove again"));
        assert!(docs.insert_blocks("Missing", vec![]).is_err());
    }

    #[test]
    fn templates_copy_blocks() {
        let mut docs = MemoryDocuments::new();
        let mut properties = BTreeMap::new();
        properties.insert(TEMPLATE_PROPERTY.to_string(), "Weekly".to_string());
        docs.create_page("Weekly template", PageOptions { properties })
            .expect("template page");
        docs.insert_block("Weekly template", NewBlock::new("## Goals"))
            .expect("insert");
        docs.create_page("2024-W10", PageOptions::default())
            .expect("create");

        assert!(docs.apply_template("2024-W10", "weekly").expect("apply"));
        assert!(!docs.apply_template("2024-W10", "Monthly").expect("apply"));
        let page = docs.get_page("2024-W10").expect("get").expect("page");
        assert!(page.find_block("## Goals").is_some());
        let template = docs
            .get_page("Weekly template")
            .expect("get")
            .expect("template");
        assert!(template.is_template());
        assert_ne!(page.blocks[0].uuid, template.blocks[0].uuid);
    }

    struct CountingDocs {
        inner: MemoryDocuments,
        lookups: Cell<usize>,
    }

    impl DocumentService for CountingDocs {
        fn get_page(&self, name: &str) -> anyhow::Result<Option<Page>> {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.get_page(name)
        }

        fn create_page(&mut self, name: &str, options: PageOptions) -> anyhow::Result<Page> {
            self.inner.create_page(name, options)
        }

        fn insert_blocks(
            &mut self,
            page: &str,
            blocks: Vec<NewBlock>,
        ) -> anyhow::Result<Vec<Uuid>> {
            self.inner.insert_blocks(page, blocks)
        }

        fn remove_block(&mut self, page: &str, block: Uuid) -> anyhow::Result<bool> {
            self.inner.remove_block(page, block)
        }

        fn rename_page(&mut self, from: &str, to: &str) -> anyhow::Result<()> {
            self.inner.rename_page(from, to)
        }

        fn apply_template(&mut self, page: &str, template: &str) -> anyhow::Result<bool> {
            self.inner.apply_template(page, template)
        }
    }

    #[test]
    fn existence_cache_memoises_until_invalidated() {
        let mut docs = CountingDocs {
            inner: MemoryDocuments::new(),
            lookups: Cell::new(0),
        };
        let mut cache = PageExistenceCache::new();
        assert!(!cache.exists(&docs, "2024-03").expect("exists"));
        assert!(!cache.exists(&docs, "2024-03").expect("exists"));
        assert_eq!(docs.lookups.get(), 1);

        docs.create_page("2024-03", PageOptions::default())
            .expect("create");
        cache.mark("2024-03");
        assert!(cache.exists(&docs, "2024-03").expect("exists"));
        assert_eq!(docs.lookups.get(), 1);

        cache.invalidate();
        assert!(cache.is_empty());
        assert!(cache.exists(&docs, "2024-03").expect("exists"));
        assert_eq!(docs.lookups.get(), 2);
    }
}
