//! crates/medical_timeline_core/src/widget.rs
//!
//! The timeline widget controller. It ties the loader to the presentation state,
//! reacts to the bound field changing and turns row clicks into state changes or
//! navigation requests.
//!
//! Loads are split in three steps (`begin_load`, `PendingLoad::run`, `finish_load`)
//! so a host can run the store calls without holding the widget while they are in
//! flight. `mount` and `update_props` chain the steps for single-owner hosts.

use crate::domain::{NoteId, NoteRecord, RecordRef, WindowAction};
use crate::format::TimestampFormatter;
use crate::loader::RecordLoader;
use crate::ports::{ActionDispatcher, PortResult};
use crate::presentation::{LoadSequencing, LoadTicket, TimelineState};
use std::sync::Arc;
use tracing::{debug, info};

pub struct TimelineWidget {
    props: Option<Vec<RecordRef>>,
    /// The rows behind the records on display. `None` until a load has been applied.
    shown_props: Option<Option<Vec<RecordRef>>>,
    loader: RecordLoader,
    state: TimelineState,
    formatter: TimestampFormatter,
    dispatcher: Arc<dyn ActionDispatcher>,
    sequencing: LoadSequencing,
}

/// A load that has been started but not yet run.
pub struct PendingLoad {
    ticket: LoadTicket,
    loader: RecordLoader,
    refs: Option<Vec<RecordRef>>,
}

impl PendingLoad {
    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    pub async fn run(self) -> CompletedLoad {
        let result = self.loader.load(self.refs.as_deref()).await;
        CompletedLoad {
            ticket: self.ticket,
            refs: self.refs,
            result,
        }
    }
}

/// The outcome of a `PendingLoad`, ready to be committed.
pub struct CompletedLoad {
    ticket: LoadTicket,
    refs: Option<Vec<RecordRef>>,
    result: PortResult<Vec<NoteRecord>>,
}

impl TimelineWidget {
    pub fn new(
        loader: RecordLoader,
        dispatcher: Arc<dyn ActionDispatcher>,
        formatter: TimestampFormatter,
        sequencing: LoadSequencing,
        props: Option<Vec<RecordRef>>,
    ) -> Self {
        Self {
            props,
            shown_props: None,
            loader,
            state: TimelineState::new(),
            formatter,
            dispatcher,
            sequencing,
        }
    }

    pub fn props(&self) -> Option<&[RecordRef]> {
        self.props.as_deref()
    }

    pub fn state(&self) -> &TimelineState {
        &self.state
    }

    pub fn records(&self) -> &[NoteRecord] {
        self.state.records()
    }

    pub fn formatter(&self) -> &TimestampFormatter {
        &self.formatter
    }

    pub fn sequencing(&self) -> LoadSequencing {
        self.sequencing
    }

    //-------------------------------------------------------------------------------------
    // Loading
    //-------------------------------------------------------------------------------------

    /// Replaces the bound rows. Returns `false` if they are the rows already on display,
    /// so a change whose load failed is still reported as a change on the next call.
    pub fn set_props(&mut self, next: Option<Vec<RecordRef>>) -> bool {
        let changed = self.shown_props.as_ref() != Some(&next);
        self.props = next;
        changed
    }

    pub fn begin_load(&mut self) -> PendingLoad {
        PendingLoad {
            ticket: self.state.begin_load(),
            loader: self.loader.clone(),
            refs: self.props.clone(),
        }
    }

    /// Commits a finished load. `Ok(false)` means a newer load already won; on error the
    /// displayed records are left untouched.
    pub fn finish_load(&mut self, completed: CompletedLoad) -> PortResult<bool> {
        let CompletedLoad {
            ticket,
            refs,
            result,
        } = completed;
        let records = result?;
        let applied = self.state.complete_load(ticket, records, self.sequencing);
        if applied {
            self.shown_props = Some(refs);
        }
        Ok(applied)
    }

    /// Initial load when the widget is first shown.
    pub async fn mount(&mut self) -> PortResult<()> {
        info!("Mounting medical timeline.");
        self.reload().await.map(|_| ())
    }

    /// Reloads only if the bound rows actually changed.
    pub async fn update_props(&mut self, next: Option<Vec<RecordRef>>) -> PortResult<bool> {
        if !self.set_props(next) {
            debug!("Bound rows unchanged, keeping current timeline.");
            return Ok(false);
        }
        self.reload().await
    }

    async fn reload(&mut self) -> PortResult<bool> {
        let completed = self.begin_load().run().await;
        self.finish_load(completed)
    }

    //-------------------------------------------------------------------------------------
    // Row Interaction
    //-------------------------------------------------------------------------------------

    pub fn toggle_expand(&mut self, id: NoteId) -> bool {
        self.state.toggle_expand(id)
    }

    pub fn is_expanded(&self, id: NoteId) -> bool {
        self.state.is_expanded(id)
    }

    /// Requests the form view of a note. Nothing is awaited.
    pub fn open_record(&self, id: NoteId) {
        debug!(note_id = id, "Opening medical note.");
        self.dispatcher.do_action(WindowAction::open_note(id));
    }

    /// Click on a row header, carrying the row's `data-record-id`.
    pub fn on_header_click(&mut self, raw_id: &str) {
        if let Some(id) = parse_record_id(raw_id) {
            self.toggle_expand(id);
        }
    }

    /// Click on a row's open button, carrying the row's `data-record-id`.
    pub fn on_open_record(&self, raw_id: &str) {
        if let Some(id) = parse_record_id(raw_id) {
            self.open_record(id);
        }
    }
}

fn parse_record_id(raw: &str) -> Option<NoteId> {
    let parsed = raw.trim().parse::<NoteId>().ok();
    if parsed.is_none() {
        debug!(raw, "Ignoring row event without a numeric record id.");
    }
    parsed
}
