pub mod domain;
pub mod format;
pub mod loader;
pub mod ports;
pub mod presentation;
pub mod registry;
pub mod widget;

#[cfg(test)]
pub(crate) mod testing;

pub use domain::{NoteId, NoteRecord, NoteType, PatientId, RecordRef, Reference, WindowAction};
pub use format::{display_name, note_type_label, HourCycle, TimestampFormatter, ViewerZone};
pub use loader::{EnrichmentFailurePolicy, LoaderOptions, RecordLoader};
pub use ports::{ActionDispatcher, NoteStore, PatientStore, PortError, PortResult};
pub use presentation::{LoadSequencing, LoadTicket, TimelineState};
pub use registry::{FieldType, FieldWidgetDescriptor, FieldWidgetRegistry, RegistryError};
pub use widget::{CompletedLoad, PendingLoad, TimelineWidget};
