//! crates/medical_timeline_core/src/domain.rs
//!
//! Defines the pure data structures shown on the medical timeline.
//! Records arrive from the note store in its JSON shape (Odoo `read` output), so the
//! serde impls here accept that shape: `false` for empty values, `[id, label]` pairs
//! for related records.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Entity kind of a medical note in the backing store.
pub const NOTE_MODEL: &str = "vet.medical.note";
/// Entity kind of a patient in the backing store.
pub const PATIENT_MODEL: &str = "vet.patient";

pub type NoteId = i64;
pub type PatientId = i64;

//=========================================================================================
// References to Related Records
//=========================================================================================

/// A pointer to a related record without embedding it.
///
/// Stores hand these out in a few shapes; all of them are normalised here so the
/// rest of the crate never inspects raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Reference {
    #[default]
    Absent,
    /// An `(id, display label)` pair.
    Labeled(i64, String),
    /// A bare label without an id.
    Bare(String),
}

impl Reference {
    pub fn labeled(id: i64, label: impl Into<String>) -> Self {
        Reference::Labeled(id, label.into())
    }

    /// Normalises a raw store value. Unrecognised shapes become `Absent`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => {
                match (
                    items.first().and_then(Value::as_i64),
                    items.get(1).and_then(Value::as_str),
                ) {
                    (Some(id), Some(label)) => Reference::Labeled(id, label.to_string()),
                    _ => Reference::Absent,
                }
            }
            Value::String(label) => Reference::Bare(label.clone()),
            _ => Reference::Absent,
        }
    }

    /// The id of the referenced record, when the reference carries one.
    pub fn id(&self) -> Option<i64> {
        match self {
            Reference::Labeled(id, _) => Some(*id),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Reference::Absent)
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Reference::from_value(&value))
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reference::Absent => serializer.serialize_bool(false),
            Reference::Labeled(id, label) => (id, label).serialize(serializer),
            Reference::Bare(label) => serializer.serialize_str(label),
        }
    }
}

//=========================================================================================
// Note Types
//=========================================================================================

/// The kind of a medical note. Tags the store knows nothing about are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum NoteType {
    Soap,
    Communication,
    #[default]
    Internal,
    Result,
    Image,
    Report,
    Other(String),
}

impl NoteType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "soap" => NoteType::Soap,
            "communication" => NoteType::Communication,
            "internal" => NoteType::Internal,
            "result" => NoteType::Result,
            "image" => NoteType::Image,
            "report" => NoteType::Report,
            other => NoteType::Other(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            NoteType::Soap => "soap",
            NoteType::Communication => "communication",
            NoteType::Internal => "internal",
            NoteType::Result => "result",
            NoteType::Image => "image",
            NoteType::Report => "report",
            NoteType::Other(raw) => raw,
        }
    }

    /// Human-readable label. Unknown tags come back unchanged.
    pub fn label(&self) -> &str {
        match self {
            NoteType::Soap => "SOAP Note",
            NoteType::Communication => "Communication",
            NoteType::Internal => "Internal Note",
            NoteType::Result => "Diagnostic Result",
            NoteType::Image => "Image/Photo",
            NoteType::Report => "Report",
            NoteType::Other(raw) => raw,
        }
    }
}

impl<'de> Deserialize<'de> for NoteType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(tag) => Ok(NoteType::from_tag(&tag)),
            _ => Ok(NoteType::Other(String::new())),
        }
    }
}

impl Serialize for NoteType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

//=========================================================================================
// Note Records
//=========================================================================================

/// A snapshot of one medical note, plus the owner of its patient once enriched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: NoteId,
    #[serde(default, deserialize_with = "store_text")]
    pub name: Option<String>,
    /// Raw store timestamp, no zone attached. Interpreted as UTC.
    #[serde(default, deserialize_with = "store_text")]
    pub date: Option<String>,
    #[serde(default, rename = "patient_id")]
    pub patient: Reference,
    #[serde(default, rename = "booking_id")]
    pub booking: Reference,
    #[serde(default, rename = "author_id")]
    pub author: Reference,
    #[serde(default)]
    pub note_type: NoteType,
    #[serde(default, deserialize_with = "store_text")]
    pub subjective: Option<String>,
    #[serde(default, deserialize_with = "store_text")]
    pub objective: Option<String>,
    #[serde(default, deserialize_with = "store_text")]
    pub assessment: Option<String>,
    #[serde(default, deserialize_with = "store_text")]
    pub plan: Option<String>,
    #[serde(default, deserialize_with = "store_text")]
    pub content: Option<String>,
    #[serde(default, rename = "is_important")]
    pub important: bool,
    #[serde(default, rename = "is_private")]
    pub private: bool,
    #[serde(default)]
    pub attachment_count: u32,
    /// Copied from the patient during enrichment; never part of the note itself.
    #[serde(default, rename = "owner_id")]
    pub owner: Reference,
}

impl NoteRecord {
    /// A record with only an id and defaults everywhere else.
    pub fn new(id: NoteId) -> Self {
        Self {
            id,
            name: None,
            date: None,
            patient: Reference::Absent,
            booking: Reference::Absent,
            author: Reference::Absent,
            note_type: NoteType::default(),
            subjective: None,
            objective: None,
            assessment: None,
            plan: None,
            content: None,
            important: false,
            private: false,
            attachment_count: 0,
            owner: Reference::Absent,
        }
    }

    /// The note date as a UTC instant, if present and parseable.
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        self.date.as_deref().and_then(parse_store_datetime)
    }
}

/// Empty text fields come back from the store as `false`.
fn store_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(Some(text)),
        _ => Ok(None),
    }
}

/// Parses a zone-less store timestamp as UTC.
///
/// Accepts `YYYY-MM-DD HH:MM[:SS[.fff]]` with a space or `T` separator, a bare date
/// (midnight), and full RFC 3339 strings that already carry an offset.
pub fn parse_store_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for format in FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

//=========================================================================================
// Host-side Handles and Actions
//=========================================================================================

/// One row of the one2many field the widget is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    /// `None` for rows that have not been saved yet.
    pub res_id: Option<NoteId>,
}

impl RecordRef {
    pub fn saved(id: NoteId) -> Self {
        Self { res_id: Some(id) }
    }

    pub fn unsaved() -> Self {
        Self { res_id: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTarget {
    Current,
}

/// A request to open a record in a window view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowAction {
    pub res_model: String,
    pub res_id: i64,
    pub view: ViewKind,
    pub target: ActionTarget,
}

impl WindowAction {
    /// The form view of a medical note, replacing the current view.
    pub fn open_note(id: NoteId) -> Self {
        Self {
            res_model: NOTE_MODEL.to_string(),
            res_id: id,
            view: ViewKind::Form,
            target: ActionTarget::Current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn deserializes_store_shape() {
        let raw = json!({
            "id": 7,
            "name": "SOAP Note - Rex - 2024-03-01 09:15",
            "date": "2024-03-01 09:15:00",
            "patient_id": [5, "Rex"],
            "booking_id": false,
            "author_id": [2, "Dr. Vega"],
            "note_type": "soap",
            "subjective": "Limping on left hind leg",
            "objective": false,
            "assessment": false,
            "plan": false,
            "content": false,
            "is_important": true,
            "is_private": false,
            "attachment_count": 2
        });

        let record: NoteRecord = serde_json::from_value(raw).unwrap();

        assert_eq!(record.id, 7);
        assert_eq!(record.patient, Reference::labeled(5, "Rex"));
        assert_eq!(record.booking, Reference::Absent);
        assert_eq!(record.note_type, NoteType::Soap);
        assert_eq!(record.subjective.as_deref(), Some("Limping on left hind leg"));
        assert_eq!(record.objective, None);
        assert!(record.important);
        assert_eq!(record.attachment_count, 2);
        assert_eq!(record.owner, Reference::Absent);
    }

    #[test]
    fn unknown_reference_shapes_become_absent() {
        assert_eq!(Reference::from_value(&json!(42)), Reference::Absent);
        assert_eq!(Reference::from_value(&json!([5])), Reference::Absent);
        assert_eq!(Reference::from_value(&json!({"id": 5})), Reference::Absent);
        assert_eq!(Reference::from_value(&json!(null)), Reference::Absent);
        assert_eq!(Reference::from_value(&json!("Rex")), Reference::Bare("Rex".into()));
    }

    #[test]
    fn reference_serializes_back_to_store_shape() {
        assert_eq!(serde_json::to_value(Reference::Absent).unwrap(), json!(false));
        assert_eq!(
            serde_json::to_value(Reference::labeled(5, "Rex")).unwrap(),
            json!([5, "Rex"])
        );
    }

    #[test]
    fn unknown_note_type_keeps_raw_tag() {
        let note_type = NoteType::from_tag("xray");
        assert_eq!(note_type, NoteType::Other("xray".into()));
        assert_eq!(note_type.tag(), "xray");
        assert_eq!(note_type.label(), "xray");
    }

    #[test]
    fn parses_store_timestamps_as_utc() {
        let dt = parse_store_datetime("2024-03-01 14:30:00").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 1));
        assert_eq!((dt.hour(), dt.minute()), (14, 30));

        assert!(parse_store_datetime("2024-03-01T14:30:00.250").is_some());
        assert!(parse_store_datetime("2024-03-01 14:30").is_some());
        assert_eq!(
            parse_store_datetime("2024-03-01").unwrap().hour(),
            0
        );
        assert_eq!(
            parse_store_datetime("2024-03-01T14:30:00+02:00").unwrap().hour(),
            12
        );
        assert!(parse_store_datetime("").is_none());
        assert!(parse_store_datetime("yesterday").is_none());
    }

    #[test]
    fn open_note_targets_form_view() {
        let action = WindowAction::open_note(9);
        assert_eq!(action.res_model, "vet.medical.note");
        assert_eq!(action.res_id, 9);
        assert_eq!(action.view, ViewKind::Form);
        assert_eq!(action.target, ActionTarget::Current);
    }
}
