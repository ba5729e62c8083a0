//! crates/medical_timeline_core/src/loader.rs
//!
//! The record loader: resolves the rows of the bound field to full note records,
//! copies each patient's owner onto its notes and orders the result newest first.

use crate::domain::{NoteId, NoteRecord, Reference, RecordRef};
use crate::ports::{NoteStore, PatientStore, PortError, PortResult};
use futures::{stream, StreamExt};
use std::cmp::Reverse;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

//=========================================================================================
// Loader Options
//=========================================================================================

/// What to do when the owner lookup for a single note fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnrichmentFailurePolicy {
    /// Leave the owner unset and keep loading.
    #[default]
    Degrade,
    /// Abort the whole load with the store error.
    Propagate,
}

impl FromStr for EnrichmentFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "degrade" => Ok(Self::Degrade),
            "propagate" => Ok(Self::Propagate),
            other => Err(format!("'{}' is not one of: degrade, propagate", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    pub enrichment_failure: EnrichmentFailurePolicy,
    /// Maximum number of owner lookups in flight. `1` issues them one after another.
    pub enrichment_concurrency: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            enrichment_failure: EnrichmentFailurePolicy::default(),
            enrichment_concurrency: 1,
        }
    }
}

//=========================================================================================
// The Loader
//=========================================================================================

#[derive(Clone)]
pub struct RecordLoader {
    notes: Arc<dyn NoteStore>,
    patients: Arc<dyn PatientStore>,
    options: LoaderOptions,
}

impl RecordLoader {
    pub fn new(
        notes: Arc<dyn NoteStore>,
        patients: Arc<dyn PatientStore>,
        options: LoaderOptions,
    ) -> Self {
        Self {
            notes,
            patients,
            options,
        }
    }

    pub fn options(&self) -> LoaderOptions {
        self.options
    }

    /// Loads, enriches and sorts the notes behind `refs`.
    ///
    /// No store call is made when there is nothing to load. A failing bulk read is
    /// returned as is; owner lookup failures follow `EnrichmentFailurePolicy`.
    pub async fn load(&self, refs: Option<&[RecordRef]>) -> PortResult<Vec<NoteRecord>> {
        let ids = refs.map(collect_ids).unwrap_or_default();
        if ids.is_empty() {
            debug!("No saved rows to load, skipping store calls.");
            return Ok(Vec::new());
        }

        debug!(count = ids.len(), "Reading medical notes.");
        let mut records = self.notes.read_notes(&ids).await?;

        self.enrich_owners(&mut records).await?;
        sort_by_date_desc(&mut records);

        info!(count = records.len(), "Medical timeline loaded.");
        Ok(records)
    }

    /// One owner lookup per note with a patient, even when several notes share it.
    async fn enrich_owners(&self, records: &mut [NoteRecord]) -> PortResult<()> {
        let lookups: Vec<(usize, i64)> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| record.patient.id().map(|id| (index, id)))
            .collect();

        let patients = &self.patients;
        let mut owners = stream::iter(lookups)
            .map(|(index, patient_id)| async move {
                (index, patient_id, patients.read_owner(patient_id).await)
            })
            .buffered(self.options.enrichment_concurrency.max(1));

        while let Some((index, patient_id, result)) = owners.next().await {
            match result {
                Ok(owner) => records[index].owner = owner,
                Err(e) => self.on_enrichment_failure(&mut records[index], patient_id, e)?,
            }
        }
        Ok(())
    }

    fn on_enrichment_failure(
        &self,
        record: &mut NoteRecord,
        patient_id: i64,
        error: PortError,
    ) -> PortResult<()> {
        match self.options.enrichment_failure {
            EnrichmentFailurePolicy::Propagate => Err(error),
            EnrichmentFailurePolicy::Degrade => {
                warn!(
                    note_id = record.id,
                    patient_id,
                    "Owner lookup failed, showing note without owner: {}",
                    error
                );
                record.owner = Reference::Absent;
                Ok(())
            }
        }
    }
}

/// Ids of the saved rows, in row order.
pub fn collect_ids(refs: &[RecordRef]) -> Vec<NoteId> {
    refs.iter().filter_map(|r| r.res_id).collect()
}

/// Newest first. Notes without a readable date go last; ties keep store order.
pub fn sort_by_date_desc(records: &mut [NoteRecord]) {
    records.sort_by_key(|record| Reverse(record.parsed_date()));
}
