//! SQLite vector store backend.
//!
//! Embeddings are stored as little-endian f32 BLOBs. Batch appends run in a
//! transaction so a reader never observes a half-appended document.

use async_trait::async_trait;
use byteorder::{ByteOrder, LittleEndian};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use chatforge_core::error::{ChatForgeError, Result};
use chatforge_core::traits::VectorStore;
use chatforge_core::types::{
    KnowledgeChunk, KnowledgeItem, KnowledgeStatus, KnowledgeType,
};

pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store (tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS knowledge_items (
                id TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                content TEXT NOT NULL,
                date_added TEXT NOT NULL,
                status TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS knowledge_chunks (
                id TEXT PRIMARY KEY,
                knowledge_item_id TEXT NOT NULL,
                workspace_id TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                embedding_model TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_workspace
                ON knowledge_chunks(workspace_id);
            CREATE INDEX IF NOT EXISTS idx_chunks_item
                ON knowledge_chunks(knowledge_item_id);",
        )
        .map_err(store_err)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ChatForgeError::Store(format!("lock poisoned: {e}")))
    }

    /// Total chunk count across all workspaces.
    pub fn chunk_count(&self) -> usize {
        let Ok(conn) = self.lock() else { return 0 };
        conn.query_row("SELECT COUNT(*) FROM knowledge_chunks", [], |r| r.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }
}

fn store_err(e: rusqlite::Error) -> ChatForgeError {
    ChatForgeError::Store(e.to_string())
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut buf = vec![0u8; vector.len() * 4];
    LittleEndian::write_f32_into(vector, &mut buf);
    buf
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    let mut out = vec![0f32; blob.len() / 4];
    LittleEndian::read_f32_into(&blob[..out.len() * 4], &mut out);
    out
}

fn kind_to_str(kind: KnowledgeType) -> &'static str {
    match kind {
        KnowledgeType::Text => "text",
        KnowledgeType::File => "file",
        KnowledgeType::Website => "website",
        KnowledgeType::QnA => "qna",
    }
}

fn kind_from_str(s: &str) -> KnowledgeType {
    match s {
        "file" => KnowledgeType::File,
        "website" => KnowledgeType::Website,
        "qna" => KnowledgeType::QnA,
        _ => KnowledgeType::Text,
    }
}

fn status_to_str(status: KnowledgeStatus) -> &'static str {
    match status {
        KnowledgeStatus::Processing => "processing",
        KnowledgeStatus::Ready => "ready",
        KnowledgeStatus::Error => "error",
    }
}

fn status_from_str(s: &str) -> KnowledgeStatus {
    match s {
        "ready" => KnowledgeStatus::Ready,
        "error" => KnowledgeStatus::Error,
        _ => KnowledgeStatus::Processing,
    }
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeItem> {
    let kind: String = row.get(2)?;
    let date_added: String = row.get(5)?;
    let status: String = row.get(6)?;
    Ok(KnowledgeItem {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        kind: kind_from_str(&kind),
        name: row.get(3)?,
        content: row.get(4)?,
        date_added: date_added
            .parse()
            .unwrap_or_else(|_| chrono::Utc::now()),
        status: status_from_str(&status),
    })
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn save_item(&self, item: &KnowledgeItem) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO knowledge_items
             (id, workspace_id, kind, name, content, date_added, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                item.id,
                item.workspace_id,
                kind_to_str(item.kind),
                item.name,
                item.content,
                item.date_added.to_rfc3339(),
                status_to_str(item.status),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn update_item_status(&self, item_id: &str, status: KnowledgeStatus) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE knowledge_items SET status = ?1 WHERE id = ?2",
                rusqlite::params![status_to_str(status), item_id],
            )
            .map_err(store_err)?;
        if changed == 0 {
            return Err(ChatForgeError::Store(format!("unknown item: {item_id}")));
        }
        Ok(())
    }

    async fn get_item(&self, item_id: &str) -> Result<Option<KnowledgeItem>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, workspace_id, kind, name, content, date_added, status
                 FROM knowledge_items WHERE id = ?1",
            )
            .map_err(store_err)?;
        let mut rows = stmt
            .query_map(rusqlite::params![item_id], row_to_item)
            .map_err(store_err)?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(store_err)?)),
            None => Ok(None),
        }
    }

    async fn get_items(&self, workspace_id: &str) -> Result<Vec<KnowledgeItem>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, workspace_id, kind, name, content, date_added, status
                 FROM knowledge_items WHERE workspace_id = ?1 ORDER BY date_added",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(rusqlite::params![workspace_id], row_to_item)
            .map_err(store_err)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row.map_err(store_err)?);
        }
        Ok(items)
    }

    async fn delete_item(&self, item_id: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(store_err)?;
        tx.execute(
            "DELETE FROM knowledge_chunks WHERE knowledge_item_id = ?1",
            rusqlite::params![item_id],
        )
        .map_err(store_err)?;
        tx.execute(
            "DELETE FROM knowledge_items WHERE id = ?1",
            rusqlite::params![item_id],
        )
        .map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    async fn append_chunks(&self, chunks: &[KnowledgeChunk]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(store_err)?;
        for chunk in chunks {
            let item_workspace: Option<String> = tx
                .query_row(
                    "SELECT workspace_id FROM knowledge_items WHERE id = ?1",
                    rusqlite::params![chunk.knowledge_item_id],
                    |r| r.get(0),
                )
                .ok();
            match item_workspace {
                None => {
                    return Err(ChatForgeError::Store(format!(
                        "chunk {} references unknown item {}",
                        chunk.id, chunk.knowledge_item_id
                    )));
                }
                Some(ws) if ws != chunk.workspace_id => {
                    return Err(ChatForgeError::Store(format!(
                        "tenant mismatch: chunk {} has workspace {} but item {} has {}",
                        chunk.id, chunk.workspace_id, chunk.knowledge_item_id, ws
                    )));
                }
                Some(_) => {}
            }
            tx.execute(
                "INSERT INTO knowledge_chunks
                 (id, knowledge_item_id, workspace_id, text, embedding, embedding_model)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    chunk.id,
                    chunk.knowledge_item_id,
                    chunk.workspace_id,
                    chunk.text,
                    encode_embedding(&chunk.embedding),
                    chunk.embedding_model,
                ],
            )
            .map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    async fn chunks_for(&self, workspace_id: &str) -> Result<Vec<KnowledgeChunk>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, knowledge_item_id, workspace_id, text, embedding, embedding_model
                 FROM knowledge_chunks WHERE workspace_id = ?1 ORDER BY rowid",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(rusqlite::params![workspace_id], |row| {
                let blob: Vec<u8> = row.get(4)?;
                Ok(KnowledgeChunk {
                    id: row.get(0)?,
                    knowledge_item_id: row.get(1)?,
                    workspace_id: row.get(2)?,
                    text: row.get(3)?,
                    embedding: decode_embedding(&blob),
                    embedding_model: row.get(5)?,
                })
            })
            .map_err(store_err)?;
        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row.map_err(store_err)?);
        }
        Ok(chunks)
    }

    async fn delete_chunks_for_item(&self, item_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM knowledge_chunks WHERE knowledge_item_id = ?1",
            rusqlite::params![item_id],
        )
        .map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(item: &KnowledgeItem, text: &str, embedding: Vec<f32>) -> KnowledgeChunk {
        KnowledgeChunk {
            id: uuid::Uuid::new_v4().to_string(),
            knowledge_item_id: item.id.clone(),
            workspace_id: item.workspace_id.clone(),
            text: text.into(),
            embedding,
            embedding_model: "test".into(),
        }
    }

    #[test]
    fn test_embedding_blob_roundtrip() {
        let vector = vec![0.5f32, -1.25, 3.75, 0.0];
        assert_eq!(decode_embedding(&encode_embedding(&vector)), vector);
    }

    #[tokio::test]
    async fn test_item_roundtrip() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let item = KnowledgeItem::new("ws1", KnowledgeType::Website, "FAQ", "content here");
        store.save_item(&item).await.unwrap();

        let fetched = store.get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "FAQ");
        assert_eq!(fetched.kind, KnowledgeType::Website);
        assert_eq!(fetched.status, KnowledgeStatus::Processing);

        store.update_item_status(&item.id, KnowledgeStatus::Ready).await.unwrap();
        let fetched = store.get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, KnowledgeStatus::Ready);
    }

    #[tokio::test]
    async fn test_chunk_roundtrip_and_order() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let item = KnowledgeItem::new("ws1", KnowledgeType::Text, "doc", "text");
        store.save_item(&item).await.unwrap();

        store
            .append_chunks(&[
                chunk(&item, "first", vec![1.0, 0.0]),
                chunk(&item, "second", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let chunks = store.chunks_for("ws1").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "first");
        assert_eq!(chunks[1].text, "second");
        assert_eq!(chunks[0].embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_cascade_delete() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let item = KnowledgeItem::new("ws1", KnowledgeType::Text, "doc", "text");
        store.save_item(&item).await.unwrap();
        store.append_chunks(&[chunk(&item, "a", vec![1.0])]).await.unwrap();

        store.delete_item(&item.id).await.unwrap();
        assert!(store.get_item(&item.id).await.unwrap().is_none());
        assert_eq!(store.chunk_count(), 0);
    }

    #[tokio::test]
    async fn test_tenant_mismatch_rolls_back_batch() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let item = KnowledgeItem::new("ws1", KnowledgeType::Text, "doc", "text");
        store.save_item(&item).await.unwrap();

        let good = chunk(&item, "good", vec![1.0]);
        let mut bad = chunk(&item, "bad", vec![1.0]);
        bad.workspace_id = "ws2".into();

        assert!(store.append_chunks(&[good, bad]).await.is_err());
        // The whole batch rolled back, including the good chunk.
        assert_eq!(store.chunk_count(), 0);
    }
}
