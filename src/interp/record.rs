use chrono::NaiveDateTime;
use serde::Serialize;

use crate::column::Value;

/// One file or directory recognized in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub name: String,
    pub is_dir: bool,
    pub is_hidden: bool,
    pub is_link: bool,
    /// As listed; directories keep whatever size the server printed.
    pub size: u64,
    /// Combined date and time columns, `None` when the column set declares neither.
    pub modified: Option<NaiveDateTime>,
    pub extension: Option<String>,
    /// Final value of every declared column, by column index.
    pub values: Vec<Value>,
}

impl FileRecord {
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// `.` and `..` entries that servers list for the directory itself and its parent.
    pub fn is_dot_entry(&self) -> bool {
        self.is_dir && (self.name == "." || self.name == "..")
    }
}
