//! Vector store seam: tenant-scoped persistence for knowledge items and
//! their embedded chunks.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{KnowledgeChunk, KnowledgeItem, KnowledgeStatus};

/// Tenant-scoped storage for knowledge items and chunks.
///
/// The core assumes only that appends are visible to subsequent reads within
/// the same process, that tenant filtering is exact, and that
/// [`append_chunks`](VectorStore::append_chunks) is atomic at the batch
/// level. Implementations must tolerate concurrent readers and appenders.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn save_item(&self, item: &KnowledgeItem) -> Result<()>;

    async fn update_item_status(&self, item_id: &str, status: KnowledgeStatus) -> Result<()>;

    async fn get_item(&self, item_id: &str) -> Result<Option<KnowledgeItem>>;

    async fn get_items(&self, workspace_id: &str) -> Result<Vec<KnowledgeItem>>;

    /// Delete an item and cascade-delete all of its chunks.
    async fn delete_item(&self, item_id: &str) -> Result<()>;

    /// Append a batch of chunks. The batch becomes visible as one unit.
    ///
    /// Every chunk's tenant must equal its parent item's tenant; a mismatch
    /// is a programmer error and the whole batch is rejected.
    async fn append_chunks(&self, chunks: &[KnowledgeChunk]) -> Result<()>;

    /// All chunks for one tenant, in insertion order.
    async fn chunks_for(&self, workspace_id: &str) -> Result<Vec<KnowledgeChunk>>;

    async fn delete_chunks_for_item(&self, item_id: &str) -> Result<()>;
}
