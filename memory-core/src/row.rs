//! Maps `memory_items` rows to [`MemoryItem`], shared by the keyword index,
//! vector index, and direct id lookups.

use memory_storage::Row;
use uuid::Uuid;

use crate::error::Error;
use crate::types::{ItemKind, ItemStatus, MemoryItem, Source};

/// Column order matches `schema::CREATE_MEMORY_ITEMS_TABLE` exactly; every
/// `SELECT *` against `memory_items` in this crate relies on that.
pub fn item_from_row(row: &Row) -> Result<MemoryItem, Error> {
    let id: String = row
        .get(0)
        .map_err(|e| Error::Storage(format!("reading id: {e}")))?;
    let tenant: String = row
        .get(1)
        .map_err(|e| Error::Storage(format!("reading tenant: {e}")))?;
    let project: String = row
        .get(2)
        .map_err(|e| Error::Storage(format!("reading project: {e}")))?;
    let kind_str: String = row
        .get(3)
        .map_err(|e| Error::Storage(format!("reading kind: {e}")))?;
    let title: String = row
        .get(4)
        .map_err(|e| Error::Storage(format!("reading title: {e}")))?;
    let content: String = row
        .get(5)
        .map_err(|e| Error::Storage(format!("reading content: {e}")))?;
    let tags_json: String = row
        .get(6)
        .map_err(|e| Error::Storage(format!("reading tags: {e}")))?;
    let verified: i64 = row
        .get(7)
        .map_err(|e| Error::Storage(format!("reading verified: {e}")))?;
    let confidence: f64 = row
        .get(8)
        .map_err(|e| Error::Storage(format!("reading confidence: {e}")))?;
    let usefulness_score: f64 = row
        .get(9)
        .map_err(|e| Error::Storage(format!("reading usefulness_score: {e}")))?;
    let error_count: i64 = row
        .get(10)
        .map_err(|e| Error::Storage(format!("reading error_count: {e}")))?;
    let version: i64 = row
        .get(11)
        .map_err(|e| Error::Storage(format!("reading version: {e}")))?;
    let status_str: String = row
        .get(12)
        .map_err(|e| Error::Storage(format!("reading status: {e}")))?;
    let status_reason: Option<String> = row.get(13).ok();
    let content_hash: String = row
        .get(14)
        .map_err(|e| Error::Storage(format!("reading content_hash: {e}")))?;
    let embedding_blob: Option<Vec<u8>> = row.get(15).ok();
    let provenance_json: String = row
        .get(16)
        .map_err(|e| Error::Storage(format!("reading provenance: {e}")))?;
    let source_str: String = row
        .get(17)
        .map_err(|e| Error::Storage(format!("reading source: {e}")))?;
    let created_at: i64 = row
        .get(18)
        .map_err(|e| Error::Storage(format!("reading created_at: {e}")))?;
    let updated_at: i64 = row
        .get(19)
        .map_err(|e| Error::Storage(format!("reading updated_at: {e}")))?;
    let last_used_at: Option<i64> = row.get(20).ok();

    let id = Uuid::parse_str(&id).map_err(|e| Error::Storage(format!("invalid id uuid: {e}")))?;
    let kind = ItemKind::parse(&kind_str)
        .ok_or_else(|| Error::Storage(format!("unknown item kind: {kind_str}")))?;
    let status = ItemStatus::parse(&status_str)
        .ok_or_else(|| Error::Storage(format!("unknown item status: {status_str}")))?;
    let source = match source_str.as_str() {
        "agent" => Source::Agent,
        "human" => Source::Human,
        "system" => Source::System,
        other => return Err(Error::Storage(format!("unknown source: {other}"))),
    };
    let tags: Vec<String> = serde_json::from_str(&tags_json)?;
    let provenance = serde_json::from_str(&provenance_json)?;
    let embedding = embedding_blob.map(|bytes| {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    });

    Ok(MemoryItem {
        id,
        tenant,
        project,
        kind,
        title,
        content,
        tags,
        verified: verified != 0,
        confidence: confidence as f32,
        usefulness_score: usefulness_score as f32,
        error_count: u32::try_from(error_count).unwrap_or(0),
        version: u32::try_from(version).unwrap_or(1),
        status,
        status_reason,
        content_hash,
        embedding,
        provenance,
        source,
        created_at,
        updated_at,
        last_used_at,
    })
}

/// Serialize an embedding vector to the little-endian byte layout stored in
/// the `embedding` BLOB column.
#[must_use]
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_round_trips_through_blob_bytes() {
        let original = vec![0.5_f32, -1.25, 3.0];
        let blob = embedding_to_blob(&original);
        let decoded: Vec<f32> = blob
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(original, decoded);
    }
}
