//! services/timeline_api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged with the rendering layer. Rows are sent
//! display-ready: every helper the template would call has already been applied.

use medical_timeline_core::{
    display_name, note_type_label, FieldWidgetDescriptor, NoteId, NoteRecord, RecordRef,
    TimelineWidget,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Requests FROM the Rendering Layer
//=========================================================================================

fn default_widget() -> String {
    medical_timeline_core::registry::MEDICAL_TIMELINE_KEY.to_string()
}

/// Rows of the bound one2many field. `null` entries are rows that are not saved yet;
/// a missing or `null` list means the field is empty.
pub type RecordIds = Option<Vec<Option<NoteId>>>;

pub fn to_record_refs(ids: RecordIds) -> Option<Vec<RecordRef>> {
    ids.map(|ids| ids.into_iter().map(|res_id| RecordRef { res_id }).collect())
}

/// Mounts a widget on a field.
#[derive(Deserialize, ToSchema)]
pub struct MountTimelineRequest {
    /// Registry key of the field widget.
    #[serde(default = "default_widget")]
    pub widget: String,
    #[serde(default)]
    pub record_ids: Option<Vec<Option<i64>>>,
}

/// The bound field changed on the host record.
#[derive(Deserialize, ToSchema)]
pub struct UpdateRecordsRequest {
    #[serde(default)]
    pub record_ids: Option<Vec<Option<i64>>>,
}

//=========================================================================================
// Responses TO the Rendering Layer
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
pub struct WidgetInfo {
    pub key: String,
    pub display_name: String,
    pub supported_types: Vec<String>,
}

impl WidgetInfo {
    pub fn new(key: &str, descriptor: &FieldWidgetDescriptor) -> Self {
        Self {
            key: key.to_string(),
            display_name: descriptor.display_name.clone(),
            supported_types: descriptor
                .supported_types
                .iter()
                .filter_map(|t| serde_json::to_value(t).ok())
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        }
    }
}

/// One row of the timeline.
#[derive(Serialize, Debug, ToSchema)]
pub struct TimelineRow {
    pub id: i64,
    pub name: String,
    /// Raw store timestamp (UTC, no zone).
    pub date: Option<String>,
    /// The timestamp in the viewer's zone and clock.
    pub date_display: String,
    pub note_type: String,
    pub note_type_label: String,
    pub patient: String,
    pub owner: String,
    pub booking: String,
    pub author: String,
    pub subjective: Option<String>,
    pub objective: Option<String>,
    pub assessment: Option<String>,
    pub plan: Option<String>,
    pub content: Option<String>,
    pub is_important: bool,
    pub is_private: bool,
    pub attachment_count: u32,
    pub expanded: bool,
}

/// The whole timeline as the template renders it.
#[derive(Serialize, Debug, ToSchema)]
pub struct TimelineView {
    pub widget_id: Uuid,
    pub rows: Vec<TimelineRow>,
}

impl TimelineView {
    pub fn render(widget_id: Uuid, widget: &TimelineWidget) -> Self {
        let rows = widget
            .records()
            .iter()
            .map(|record| render_row(widget, record))
            .collect();
        Self { widget_id, rows }
    }
}

fn render_row(widget: &TimelineWidget, record: &NoteRecord) -> TimelineRow {
    TimelineRow {
        id: record.id,
        name: record.name.clone().unwrap_or_default(),
        date: record.date.clone(),
        date_display: widget
            .formatter()
            .format(record.date.as_deref().unwrap_or_default()),
        note_type: record.note_type.tag().to_string(),
        note_type_label: note_type_label(record.note_type.tag()),
        patient: display_name(&record.patient).to_string(),
        owner: display_name(&record.owner).to_string(),
        booking: display_name(&record.booking).to_string(),
        author: display_name(&record.author).to_string(),
        subjective: record.subjective.clone(),
        objective: record.objective.clone(),
        assessment: record.assessment.clone(),
        plan: record.plan.clone(),
        content: record.content.clone(),
        is_important: record.important,
        is_private: record.private,
        attachment_count: record.attachment_count,
        expanded: widget.is_expanded(record.id),
    }
}
