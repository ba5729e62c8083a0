//! services/timeline_api/src/adapters/memory.rs
//!
//! An in-memory implementation of the store ports. Used when no database is
//! configured, and by the service tests.

use async_trait::async_trait;
use medical_timeline_core::{
    NoteId, NoteRecord, NoteStore, PatientId, PatientStore, PortError, PortResult, Reference,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    notes: RwLock<Vec<NoteRecord>>,
    owners: RwLock<HashMap<PatientId, Reference>>,
    note_reads: AtomicUsize,
    owner_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a note. Notes are returned in insertion order.
    pub fn upsert_note(&self, note: NoteRecord) {
        let mut notes = self.notes.write().unwrap_or_else(|e| e.into_inner());
        match notes.iter_mut().find(|n| n.id == note.id) {
            Some(existing) => *existing = note,
            None => notes.push(note),
        }
    }

    pub fn upsert_patient(&self, patient_id: PatientId, owner: Reference) {
        self.owners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(patient_id, owner);
    }

    /// Number of bulk note reads served so far.
    pub fn note_reads(&self) -> usize {
        self.note_reads.load(Ordering::SeqCst)
    }

    /// Number of owner lookups served so far.
    pub fn owner_reads(&self) -> usize {
        self.owner_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn read_notes(&self, ids: &[NoteId]) -> PortResult<Vec<NoteRecord>> {
        self.note_reads.fetch_add(1, Ordering::SeqCst);
        let notes = self.notes.read().unwrap_or_else(|e| e.into_inner());

        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !notes.iter().any(|n| n.id == **id))
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PortError::NotFound(format!(
                "Medical notes {} not found",
                missing.join(", ")
            )));
        }

        Ok(notes
            .iter()
            .filter(|n| ids.contains(&n.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PatientStore for MemoryStore {
    async fn read_owner(&self, patient_id: PatientId) -> PortResult<Reference> {
        self.owner_reads.fetch_add(1, Ordering::SeqCst);
        self.owners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&patient_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Patient {} not found", patient_id)))
    }
}
