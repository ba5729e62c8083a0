//! crates/medical_timeline_core/src/presentation.rs
//!
//! Holds what one timeline widget shows: the loaded notes and which rows are
//! expanded. Loads replace the notes wholesale; clicks only touch the expanded set.

use crate::domain::{NoteId, NoteRecord};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::debug;

/// How completions of overlapping loads are committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadSequencing {
    /// A load that finishes after a newer one has been applied is dropped.
    #[default]
    DiscardStale,
    /// Whatever finishes last is shown, regardless of when it started.
    LastWriteWins,
}

impl FromStr for LoadSequencing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "discard_stale" => Ok(Self::DiscardStale),
            "last_write_wins" => Ok(Self::LastWriteWins),
            other => Err(format!(
                "'{}' is not one of: discard_stale, last_write_wins",
                other
            )),
        }
    }
}

/// Identifies one load in the order it was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

#[derive(Debug, Default)]
pub struct TimelineState {
    records: Vec<NoteRecord>,
    expanded: HashSet<NoteId>,
    issued: u64,
    applied: u64,
}

impl TimelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes in display order, newest first.
    pub fn records(&self) -> &[NoteRecord] {
        &self.records
    }

    pub fn record(&self, id: NoteId) -> Option<&NoteRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Flips a row between collapsed and expanded and returns the new state.
    ///
    /// Ids that are neither expanded nor on the timeline are ignored.
    pub fn toggle_expand(&mut self, id: NoteId) -> bool {
        if self.expanded.remove(&id) {
            return false;
        }
        if self.record(id).is_none() {
            debug!(note_id = id, "Ignoring toggle for a note not on the timeline.");
            return false;
        }
        self.expanded.insert(id);
        true
    }

    pub fn is_expanded(&self, id: NoteId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn expanded_ids(&self) -> impl Iterator<Item = NoteId> + '_ {
        self.expanded.iter().copied()
    }

    pub fn clear_expanded(&mut self) {
        self.expanded.clear();
    }

    /// Starts a new load and hands out its ticket.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.issued += 1;
        LoadTicket(self.issued)
    }

    /// Commits the result of a load. Returns `false` when the result was dropped as stale.
    ///
    /// Expanded ids survive, including ids the new records no longer contain.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        records: Vec<NoteRecord>,
        sequencing: LoadSequencing,
    ) -> bool {
        if sequencing == LoadSequencing::DiscardStale && ticket.0 < self.applied {
            debug!(
                ticket = ticket.0,
                applied = self.applied,
                "Dropping stale timeline load."
            );
            return false;
        }
        self.records = records;
        self.applied = self.applied.max(ticket.0);
        true
    }
}
