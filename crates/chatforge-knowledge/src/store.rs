//! In-memory vector store.
//!
//! The default backend for tests and embedded use. Interior mutability via
//! `RwLock` so concurrent turns can read while an ingestion appends; the
//! write lock makes each batch append atomic.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use chatforge_core::error::{ChatForgeError, Result};
use chatforge_core::traits::VectorStore;
use chatforge_core::types::{KnowledgeChunk, KnowledgeItem, KnowledgeStatus};

#[derive(Default)]
struct Inner {
    items: HashMap<String, KnowledgeItem>,
    chunks: Vec<KnowledgeChunk>,
}

/// Process-local [`VectorStore`] backed by a `RwLock`.
#[derive(Default)]
pub struct MemoryVectorStore {
    inner: RwLock<Inner>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| ChatForgeError::Store(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| ChatForgeError::Store(format!("lock poisoned: {e}")))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn save_item(&self, item: &KnowledgeItem) -> Result<()> {
        self.write()?.items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn update_item_status(&self, item_id: &str, status: KnowledgeStatus) -> Result<()> {
        let mut inner = self.write()?;
        match inner.items.get_mut(item_id) {
            Some(item) => {
                item.status = status;
                Ok(())
            }
            None => Err(ChatForgeError::Store(format!("unknown item: {item_id}"))),
        }
    }

    async fn get_item(&self, item_id: &str) -> Result<Option<KnowledgeItem>> {
        Ok(self.read()?.items.get(item_id).cloned())
    }

    async fn get_items(&self, workspace_id: &str) -> Result<Vec<KnowledgeItem>> {
        let mut items: Vec<KnowledgeItem> = self
            .read()?
            .items
            .values()
            .filter(|i| i.workspace_id == workspace_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.date_added.cmp(&b.date_added));
        Ok(items)
    }

    async fn delete_item(&self, item_id: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.items.remove(item_id);
        inner.chunks.retain(|c| c.knowledge_item_id != item_id);
        Ok(())
    }

    async fn append_chunks(&self, chunks: &[KnowledgeChunk]) -> Result<()> {
        let mut inner = self.write()?;
        for chunk in chunks {
            let item = inner.items.get(&chunk.knowledge_item_id).ok_or_else(|| {
                ChatForgeError::Store(format!(
                    "chunk {} references unknown item {}",
                    chunk.id, chunk.knowledge_item_id
                ))
            })?;
            if item.workspace_id != chunk.workspace_id {
                return Err(ChatForgeError::Store(format!(
                    "tenant mismatch: chunk {} has workspace {} but item {} has {}",
                    chunk.id, chunk.workspace_id, item.id, item.workspace_id
                )));
            }
        }
        inner.chunks.extend_from_slice(chunks);
        Ok(())
    }

    async fn chunks_for(&self, workspace_id: &str) -> Result<Vec<KnowledgeChunk>> {
        Ok(self
            .read()?
            .chunks
            .iter()
            .filter(|c| c.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn delete_chunks_for_item(&self, item_id: &str) -> Result<()> {
        self.write()?.chunks.retain(|c| c.knowledge_item_id != item_id);
        Ok(())
    }
}
