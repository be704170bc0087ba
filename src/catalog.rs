use std::collections::HashSet;

use chrono::NaiveTime;
use serde::Serialize;

/// Day-of-week labels for the UI selector, index = wire value (0 = Sunday).
pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const DEFAULT_SLOT_COUNT: u32 = 8;
const DEFAULT_DAY_START_MINUTES: u32 = 7 * 60;
const DEFAULT_SLOT_MINUTES: u32 = 90;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDef {
    pub value: String,
    pub label: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug)]
pub struct SlotConfigError {
    pub index: usize,
    pub message: String,
}

/// Time-slot reference data served to the dashboard's selectors. The
/// schedule editor never consults it; slot ids stay free-form strings there.
#[derive(Debug, Clone)]
pub struct SlotCatalog {
    slots: Vec<SlotDef>,
}

impl SlotCatalog {
    pub fn new() -> Self {
        Self {
            slots: default_slots(),
        }
    }

    pub fn slots(&self) -> &[SlotDef] {
        &self.slots
    }

    #[allow(dead_code)]
    pub fn contains(&self, value: &str) -> bool {
        self.slots.iter().any(|s| s.value == value)
    }

    pub fn reset(&mut self) {
        self.slots = default_slots();
    }

    /// Validates and installs a replacement catalog. Values must be unique
    /// and non-empty, times must be HH:MM with start before end. A missing
    /// label is derived from the value and times. On error the previous
    /// catalog is left untouched.
    pub fn configure(&mut self, slots: Vec<SlotDef>) -> Result<(), SlotConfigError> {
        if slots.is_empty() {
            return Err(SlotConfigError {
                index: 0,
                message: "slot list must not be empty".to_string(),
            });
        }
        let mut cleaned: Vec<SlotDef> = Vec::with_capacity(slots.len());
        let mut seen: HashSet<String> = HashSet::new();
        for (index, slot) in slots.into_iter().enumerate() {
            let value = slot.value.trim().to_string();
            if value.is_empty() {
                return Err(SlotConfigError {
                    index,
                    message: "slot value must not be empty".to_string(),
                });
            }
            if !seen.insert(value.clone()) {
                return Err(SlotConfigError {
                    index,
                    message: format!("duplicate slot value '{}'", value),
                });
            }
            let start_time = slot.start_time.trim().to_string();
            let end_time = slot.end_time.trim().to_string();
            let start = parse_hhmm(&start_time).ok_or_else(|| SlotConfigError {
                index,
                message: format!("start time '{}' is not HH:MM", start_time),
            })?;
            let end = parse_hhmm(&end_time).ok_or_else(|| SlotConfigError {
                index,
                message: format!("end time '{}' is not HH:MM", end_time),
            })?;
            if start >= end {
                return Err(SlotConfigError {
                    index,
                    message: format!("slot '{}' must start before it ends", value),
                });
            }
            let label = slot.label.trim().to_string();
            let label = if label.is_empty() {
                slot_label(&value, &start_time, &end_time)
            } else {
                label
            };
            cleaned.push(SlotDef {
                value,
                label,
                start_time,
                end_time,
            });
        }
        self.slots = cleaned;
        Ok(())
    }
}

fn slot_label(value: &str, start_time: &str, end_time: &str) -> String {
    format!("Slot {} ({} - {})", value, start_time, end_time)
}

fn parse_hhmm(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M").ok()
}

fn format_minutes(total: u32) -> String {
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// The stock CETS teaching day: eight 90-minute slots from 07:00.
pub fn default_slots() -> Vec<SlotDef> {
    (0..DEFAULT_SLOT_COUNT)
        .map(|i| {
            let start = DEFAULT_DAY_START_MINUTES + i * DEFAULT_SLOT_MINUTES;
            let end = start + DEFAULT_SLOT_MINUTES;
            let value = (i + 1).to_string();
            let start_time = format_minutes(start);
            let end_time = format_minutes(end);
            SlotDef {
                label: slot_label(&value, &start_time, &end_time),
                value,
                start_time,
                end_time,
            }
        })
        .collect()
}
