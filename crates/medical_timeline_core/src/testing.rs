//! In-memory port implementations shared by the unit tests.

use crate::domain::{NoteId, NoteRecord, PatientId, Reference, WindowAction};
use crate::ports::{ActionDispatcher, NoteStore, PatientStore, PortError, PortResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn note(id: NoteId, date: &str, patient: Option<PatientId>) -> NoteRecord {
    let mut record = NoteRecord::new(id);
    record.name = Some(format!("Note {}", id));
    record.date = Some(date.to_string());
    record.patient = patient
        .map(|p| Reference::labeled(p, format!("Patient {}", p)))
        .unwrap_or_default();
    record
}

#[derive(Default)]
pub struct FakeNoteStore {
    records: Mutex<Vec<NoteRecord>>,
    failure: Option<PortError>,
    calls: AtomicUsize,
}

impl FakeNoteStore {
    pub fn new(records: Vec<NoteRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn failing(error: PortError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn set_records(&self, records: Vec<NoteRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NoteStore for FakeNoteStore {
    async fn read_notes(&self, ids: &[NoteId]) -> PortResult<Vec<NoteRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let records = self.records.lock().unwrap();
        if let Some(missing) = ids.iter().find(|id| !records.iter().any(|r| r.id == **id)) {
            return Err(PortError::NotFound(format!("Note {} not found", missing)));
        }
        Ok(records
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakePatientStore {
    owners: HashMap<PatientId, Reference>,
    calls: AtomicUsize,
}

impl FakePatientStore {
    pub fn with_owner(mut self, patient_id: PatientId, owner_id: i64, owner: &str) -> Self {
        self.owners
            .insert(patient_id, Reference::labeled(owner_id, owner));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PatientStore for FakePatientStore {
    async fn read_owner(&self, patient_id: PatientId) -> PortResult<Reference> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.owners
            .get(&patient_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Patient {} not found", patient_id)))
    }
}

#[derive(Default)]
pub struct RecordingDispatcher {
    actions: Mutex<Vec<WindowAction>>,
}

impl RecordingDispatcher {
    pub fn actions(&self) -> Vec<WindowAction> {
        self.actions.lock().unwrap().clone()
    }
}

impl ActionDispatcher for RecordingDispatcher {
    fn do_action(&self, action: WindowAction) {
        self.actions.lock().unwrap().push(action);
    }
}
