//! crates/medical_timeline_core/src/format.rs
//!
//! Pure helpers the rendering layer calls for each timeline row.

use crate::domain::{parse_store_datetime, NoteType, Reference};
use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Whether the viewer reads times on a 12 or 24 hour clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HourCycle {
    #[default]
    H12,
    H23,
}

impl FromStr for HourCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h12" | "12" => Ok(Self::H12),
            "h23" | "h24" | "24" => Ok(Self::H23),
            other => Err(format!("'{}' is not one of: h12, h23", other)),
        }
    }
}

/// The zone timestamps are shown in. `Named` and `Local` follow daylight saving
/// per instant; `Fixed` applies the same offset all year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewerZone {
    Fixed(FixedOffset),
    Named(Tz),
    /// The machine's zone, resolved for each instant.
    #[default]
    Local,
}

impl ViewerZone {
    /// `None` if the offset is outside ±24h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::Fixed)
    }
}

impl FromStr for ViewerZone {
    type Err = String;

    /// Reads an IANA zone name such as `Europe/Berlin`, or `local`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        name.parse::<Tz>()
            .map(Self::Named)
            .map_err(|_| format!("'{}' is not a known time zone", name))
    }
}

/// Renders store timestamps in the viewer's zone, e.g. `Mar 1, 2024, 02:30 PM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampFormatter {
    zone: ViewerZone,
    hour_cycle: HourCycle,
}

impl TimestampFormatter {
    pub fn new(zone: ViewerZone, hour_cycle: HourCycle) -> Self {
        Self { zone, hour_cycle }
    }

    pub fn utc(hour_cycle: HourCycle) -> Self {
        Self::new(ViewerZone::Fixed(Utc.fix()), hour_cycle)
    }

    /// `None` if the offset is outside ±24h.
    pub fn from_offset_minutes(minutes: i32, hour_cycle: HourCycle) -> Option<Self> {
        Some(Self::new(ViewerZone::from_offset_minutes(minutes)?, hour_cycle))
    }

    pub fn zone(&self) -> ViewerZone {
        self.zone
    }

    pub fn hour_cycle(&self) -> HourCycle {
        self.hour_cycle
    }

    /// Empty input gives an empty string; input that is not a timestamp is echoed back.
    pub fn format(&self, raw: &str) -> String {
        if raw.trim().is_empty() {
            return String::new();
        }
        let Some(instant) = parse_store_datetime(raw) else {
            return raw.to_string();
        };
        self.render(instant)
    }

    fn render(&self, instant: DateTime<Utc>) -> String {
        let pattern = match self.hour_cycle {
            HourCycle::H12 => "%b %-d, %Y, %I:%M %p",
            HourCycle::H23 => "%b %-d, %Y, %H:%M",
        };
        match self.zone {
            ViewerZone::Fixed(offset) => instant.with_timezone(&offset).format(pattern).to_string(),
            ViewerZone::Named(tz) => instant.with_timezone(&tz).format(pattern).to_string(),
            ViewerZone::Local => instant.with_timezone(&Local).format(pattern).to_string(),
        }
    }
}

impl Default for TimestampFormatter {
    fn default() -> Self {
        Self::utc(HourCycle::default())
    }
}

/// Label for a note-type tag. Unknown tags are returned as given.
pub fn note_type_label(tag: &str) -> String {
    NoteType::from_tag(tag).label().to_string()
}

/// The label part of a reference, or `""` when there is none.
pub fn display_name(reference: &Reference) -> &str {
    match reference {
        Reference::Absent => "",
        Reference::Labeled(_, label) => label,
        Reference::Bare(label) => label,
    }
}
