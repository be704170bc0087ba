use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    /// Present once the CETS server has persisted the row; freshly added,
    /// unsaved rows have none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Slot catalog value; empty string means no slot picked yet.
    pub time_slot_id: String,
    /// 0 = Sunday .. 6 = Saturday. Range is enforced by the input layer,
    /// not here.
    pub day_of_week: i64,
}

impl ScheduleRow {
    pub fn new(time_slot_id: impl Into<String>, day_of_week: i64) -> Self {
        Self {
            id: None,
            time_slot_id: time_slot_id.into(),
            day_of_week,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    pub has_dup: bool,
    /// Every position that shares its (slot, day) pair with another row,
    /// ascending. A group of three contributes all three indices.
    pub dups: Vec<usize>,
}

/// Flags every row whose (slot, day) pair appears more than once in `rows`.
///
/// The grouping key is the structured pair itself, so slot ids that happen
/// to contain separator-looking text can never alias a different pair.
/// Blank slot ids group like any other value: two unfinished rows on the
/// same day still collide. Out-of-range days are grouped, not rejected.
pub fn check_duplicate(rows: &[ScheduleRow]) -> DuplicateReport {
    let mut by_key: HashMap<(&str, i64), Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        by_key
            .entry((row.time_slot_id.as_str(), row.day_of_week))
            .or_default()
            .push(i);
    }

    let mut dups: Vec<usize> = by_key
        .values()
        .filter(|group| group.len() >= 2)
        .flatten()
        .copied()
        .collect();
    dups.sort_unstable();

    DuplicateReport {
        has_dup: !dups.is_empty(),
        dups,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOutOfBounds {
    pub index: usize,
    pub row_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RowPatch {
    pub time_slot_id: Option<String>,
    pub day_of_week: Option<i64>,
}

impl RowPatch {
    pub fn is_empty(&self) -> bool {
        self.time_slot_id.is_none() && self.day_of_week.is_none()
    }
}

/// In-memory editing state for one class timetable.
///
/// Owns the working rows plus a pristine snapshot taken when the session
/// opened or was last replaced wholesale; `reset` restores the snapshot.
/// Conflict state is never cached: callers re-derive it after every
/// mutation via `check`, which reads only the current rows.
#[derive(Debug, Clone)]
pub struct ScheduleEditor {
    class_id: String,
    rows: Vec<ScheduleRow>,
    original: Vec<ScheduleRow>,
}

impl ScheduleEditor {
    pub fn open(class_id: impl Into<String>, rows: Vec<ScheduleRow>) -> Self {
        let original = rows.clone();
        Self {
            class_id: class_id.into(),
            rows,
            original,
        }
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn rows(&self) -> &[ScheduleRow] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.rows != self.original
    }

    pub fn add_row(&mut self) -> usize {
        self.rows.push(ScheduleRow::new("", 0));
        self.rows.len() - 1
    }

    pub fn update_row(&mut self, index: usize, patch: RowPatch) -> Result<(), RowOutOfBounds> {
        let row_count = self.rows.len();
        let Some(row) = self.rows.get_mut(index) else {
            return Err(RowOutOfBounds { index, row_count });
        };
        if let Some(slot) = patch.time_slot_id {
            row.time_slot_id = slot;
        }
        if let Some(day) = patch.day_of_week {
            row.day_of_week = day;
        }
        Ok(())
    }

    pub fn remove_row(&mut self, index: usize) -> Result<ScheduleRow, RowOutOfBounds> {
        if index >= self.rows.len() {
            return Err(RowOutOfBounds {
                index,
                row_count: self.rows.len(),
            });
        }
        Ok(self.rows.remove(index))
    }

    pub fn reset(&mut self) {
        self.rows = self.original.clone();
    }

    pub fn replace_all(&mut self, rows: Vec<ScheduleRow>) {
        self.original = rows.clone();
        self.rows = rows;
    }

    pub fn check(&self) -> DuplicateReport {
        check_duplicate(&self.rows)
    }
}
