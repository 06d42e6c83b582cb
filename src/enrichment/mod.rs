// src/enrichment/mod.rs
// Enrichment handlers: resolve session/collection from the
// envelope, re-fetch the referenced entities by UUID, produce an
// enrichment, merge it back. Grounded on
// `backend/src/memory/features/message_pipeline/mod.rs`'s "fetch pending,
// analyze, write back" shape.

pub mod document_embedder;
pub mod embedder;
pub mod intent;
pub mod ner;
pub mod summary_embedder;
pub mod summary_ner;
pub mod token_counter;

use uuid::Uuid;

use crate::error::MemoriaError;
use crate::memory::types::{DocumentRef, TaskEnvelope, TaskPayload};

/// Pulls `(session_id, uuids)` out of a `MessageRefs` envelope.
pub(crate) fn message_refs(envelope: &TaskEnvelope) -> Result<(&str, &[Uuid]), MemoriaError> {
    let session_id = envelope
        .session_id()
        .ok_or_else(|| MemoriaError::bad_request("envelope missing session_id"))?;
    match &envelope.payload {
        TaskPayload::MessageRefs { uuids } => Ok((session_id, uuids.as_slice())),
        _ => Err(MemoriaError::bad_request("expected a MessageRefs payload")),
    }
}

/// Pulls `(session_id, summary_uuid)` out of a `SummaryRef` envelope.
pub(crate) fn summary_ref(envelope: &TaskEnvelope) -> Result<(&str, Uuid), MemoriaError> {
    let session_id = envelope
        .session_id()
        .ok_or_else(|| MemoriaError::bad_request("envelope missing session_id"))?;
    match &envelope.payload {
        TaskPayload::SummaryRef { uuid } => Ok((session_id, *uuid)),
        _ => Err(MemoriaError::bad_request("expected a SummaryRef payload")),
    }
}

/// Pulls `(collection_name, items)` out of a `Documents` envelope.
pub(crate) fn document_refs(envelope: &TaskEnvelope) -> Result<(&str, &[DocumentRef]), MemoriaError> {
    let collection_name = envelope
        .collection_name()
        .ok_or_else(|| MemoriaError::bad_request("envelope missing collection_name"))?;
    match &envelope.payload {
        TaskPayload::Documents { items } => Ok((collection_name, items.as_slice())),
        _ => Err(MemoriaError::bad_request("expected a Documents payload")),
    }
}
