//! Blob operations for file content.
//!
//! Page markdown, rendered HTML and manifests are all stored as plain git
//! blobs. Text is decoded as UTF-8 by the caller; invalid sequences are
//! replaced rather than rejected so a stray binary file never blocks a diff.

use git2::{ObjectType, Oid, Repository};

use crate::storage::error::{StorageError, StorageResult};
pub(crate) use crate::storage::types::BlobId;

/// write raw bytes to the object database
pub fn write_blob(repo: &Repository, data: &[u8]) -> StorageResult<BlobId> {
    let oid = repo.blob(data)?;
    Ok(BlobId::new(oid))
}

/// read raw bytes of a blob
pub fn read_blob(repo: &Repository, blob_id: BlobId) -> StorageResult<Vec<u8>> {
    let blob = repo
        .find_blob(blob_id.raw())
        .map_err(|_| StorageError::NotFound(format!("blob {}", blob_id)))?;
    Ok(blob.content().to_vec())
}

/// compute the blob id git would assign to `data`, without storing it
pub fn hash_bytes(data: &[u8]) -> StorageResult<BlobId> {
    let oid = Oid::hash_object(ObjectType::Blob, data)?;
    Ok(BlobId::new(oid))
}

/// decode blob content as text
pub fn decode_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}
