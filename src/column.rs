use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::param::OperandType;

/// What a declared column holds. Kinds marked unique below may appear at most once per column set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// file name, exactly one per column set
    Name,
    /// derived from the name, never written by rules
    Extension,
    Size,
    Date,
    Time,
    /// display-only type description, never written by rules
    #[serde(rename = "type")]
    FileType,
    Text,
    GeneralDate,
    GeneralTime,
    Number,
}

impl ColumnKind {
    /// Type of the value a rule reads or writes through a column of this kind,
    /// `None` for kinds rules cannot touch.
    pub fn operand_type(&self) -> Option<OperandType> {
        match self {
            ColumnKind::Name | ColumnKind::Text => Some(OperandType::String),
            ColumnKind::Size | ColumnKind::Number => Some(OperandType::Number),
            ColumnKind::Date | ColumnKind::GeneralDate => Some(OperandType::Date),
            ColumnKind::Time | ColumnKind::GeneralTime => Some(OperandType::Time),
            ColumnKind::Extension | ColumnKind::FileType => None,
        }
    }

    fn is_unique(&self) -> bool {
        !matches!(
            self,
            ColumnKind::Text | ColumnKind::GeneralDate | ColumnKind::GeneralTime | ColumnKind::Number
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Name => "name",
            ColumnKind::Extension => "extension",
            ColumnKind::Size => "size",
            ColumnKind::Date => "date",
            ColumnKind::Time => "time",
            ColumnKind::FileType => "type",
            ColumnKind::Text => "text",
            ColumnKind::GeneralDate => "general_date",
            ColumnKind::GeneralTime => "general_time",
            ColumnKind::Number => "number",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let kind = match s.to_ascii_lowercase().as_str() {
            "name" => ColumnKind::Name,
            "extension" | "ext" => ColumnKind::Extension,
            "size" => ColumnKind::Size,
            "date" => ColumnKind::Date,
            "time" => ColumnKind::Time,
            "type" => ColumnKind::FileType,
            "text" => ColumnKind::Text,
            "general_date" => ColumnKind::GeneralDate,
            "general_time" => ColumnKind::GeneralTime,
            "number" => ColumnKind::Number,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub id: String,
    pub kind: ColumnKind,
    /// Value stored when a listing line leaves the column empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty: Option<String>,
}

impl ColumnDef {
    pub fn new(id: impl Into<String>, kind: ColumnKind) -> Self {
        ColumnDef {
            id: id.into(),
            kind,
            empty: None,
        }
    }

    pub fn with_empty(mut self, empty: impl Into<String>) -> Self {
        self.empty = Some(empty.into());
        self
    }
}

/// Column content, both while a rule runs and in emitted records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    Empty,
    Text(String),
    Number(i64),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Empty => serializer.serialize_none(),
            Value::Number(n) => serializer.serialize_i64(*n),
            other => serializer.collect_str(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    #[error("column set needs exactly one column of kind 'name'")]
    MissingName,
    #[error("column kind '{0}' may appear only once")]
    DuplicateKind(ColumnKind),
    #[error("column id '{0}' is declared twice")]
    DuplicateId(String),
    #[error("'{0}' is not a valid column id")]
    InvalidId(String),
    #[error("empty value '{value}' is not valid for column '{id}'")]
    InvalidEmptyValue { id: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub id: String,
    pub kind: ColumnKind,
    pub empty: Value,
}

/// Validated, ordered set of columns a rule set is compiled against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    columns: Vec<Column>,
    name: usize,
}

const BUILTIN_IDS: [&str; 3] = ["is_dir", "is_hidden", "is_link"];

impl Columns {
    pub fn new(defs: &[ColumnDef]) -> Result<Self, ColumnError> {
        let mut columns = Vec::with_capacity(defs.len());
        let mut name = None;

        for (i, def) in defs.iter().enumerate() {
            if !is_identifier(&def.id) || BUILTIN_IDS.iter().any(|b| b.eq_ignore_ascii_case(&def.id)) {
                return Err(ColumnError::InvalidId(def.id.clone()));
            }
            if columns
                .iter()
                .any(|c: &Column| c.id.eq_ignore_ascii_case(&def.id))
            {
                return Err(ColumnError::DuplicateId(def.id.clone()));
            }
            if def.kind.is_unique() && columns.iter().any(|c: &Column| c.kind == def.kind) {
                return Err(ColumnError::DuplicateKind(def.kind));
            }

            if def.kind == ColumnKind::Name {
                name = Some(i);
            }

            let empty = match &def.empty {
                Some(text) => parse_empty_value(def.kind, text).ok_or_else(|| {
                    ColumnError::InvalidEmptyValue {
                        id: def.id.clone(),
                        value: text.clone(),
                    }
                })?,
                None => default_empty_value(def.kind),
            };

            columns.push(Column {
                id: def.id.clone(),
                kind: def.kind,
                empty,
            });
        }

        Ok(Columns {
            columns,
            name: name.ok_or(ColumnError::MissingName)?,
        })
    }

    /// Parse the compact `id:kind,id:kind` form used on the command line.
    pub fn from_list(list: &str) -> Result<Self, ColumnError> {
        let mut defs = Vec::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (id, kind) = match item.split_once(':') {
                Some((id, kind)) => (id.trim(), kind.trim()),
                None => (item, item),
            };
            let kind = ColumnKind::from_name(kind)
                .ok_or_else(|| ColumnError::InvalidId(item.to_owned()))?;
            defs.push(ColumnDef::new(id, kind));
        }
        Columns::new(&defs)
    }

    /// Case-insensitive lookup by id.
    pub fn find(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id.eq_ignore_ascii_case(id))
    }

    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn name_index(&self) -> usize {
        self.name
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn lowest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1602, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn default_empty_value(kind: ColumnKind) -> Value {
    match kind {
        ColumnKind::Size => Value::Number(0),
        ColumnKind::Date => Value::Date(lowest_date()),
        ColumnKind::Time => Value::Time(NaiveTime::MIN),
        ColumnKind::Text | ColumnKind::FileType => Value::Text(String::new()),
        _ => Value::Empty,
    }
}

fn parse_empty_value(kind: ColumnKind, text: &str) -> Option<Value> {
    match kind {
        ColumnKind::Name | ColumnKind::Extension => None,
        ColumnKind::Text | ColumnKind::FileType => Some(Value::Text(text.to_owned())),
        ColumnKind::Size => {
            let digits = text.strip_prefix('+').unwrap_or(text);
            parse_digits(digits).map(Value::Number)
        }
        ColumnKind::Number => {
            let (negative, digits) = match text.as_bytes().first() {
                Some(b'+') => (false, &text[1..]),
                Some(b'-') => (true, &text[1..]),
                _ => (false, text),
            };
            parse_digits(digits).map(|n| Value::Number(if negative { -n } else { n }))
        }
        ColumnKind::Date | ColumnKind::GeneralDate => {
            let mut parts = text.split('.');
            let day = parse_digits(parts.next()?)?;
            let month = parse_digits(parts.next()?)?;
            let year = parse_digits(parts.next()?)?;
            if parts.next().is_some() || year < 1602 {
                return None;
            }
            NaiveDate::from_ymd_opt(
                i32::try_from(year).ok()?,
                u32::try_from(month).ok()?,
                u32::try_from(day).ok()?,
            )
            .map(Value::Date)
        }
        ColumnKind::Time | ColumnKind::GeneralTime => {
            let mut parts = text.split(':');
            let hour = parse_digits(parts.next()?)?;
            let minute = parse_digits(parts.next()?)?;
            let second = match parts.next() {
                Some(s) => parse_digits(s)?,
                None => 0,
            };
            if parts.next().is_some() {
                return None;
            }
            NaiveTime::from_hms_opt(
                u32::try_from(hour).ok()?,
                u32::try_from(minute).ok()?,
                u32::try_from(second).ok()?,
            )
            .map(Value::Time)
        }
    }
}

fn parse_digits(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_follow_column_kind() {
        assert_eq!(parse_empty_value(ColumnKind::Size, "+12"), Some(Value::Number(12)));
        assert_eq!(parse_empty_value(ColumnKind::Size, "-1"), None);
        assert_eq!(parse_empty_value(ColumnKind::Number, "-7"), Some(Value::Number(-7)));
        assert_eq!(
            parse_empty_value(ColumnKind::Date, "1.1.1602"),
            Some(Value::Date(lowest_date()))
        );
        assert_eq!(parse_empty_value(ColumnKind::Date, "1.1.1601"), None);
        assert_eq!(parse_empty_value(ColumnKind::Date, "30.2.2000"), None);
        assert_eq!(
            parse_empty_value(ColumnKind::Time, "0:00:00"),
            Some(Value::Time(NaiveTime::MIN))
        );
        assert_eq!(parse_empty_value(ColumnKind::Time, "24:00"), None);
    }

    #[test]
    fn identifiers_are_ascii_words() {
        assert!(is_identifier("size_2"));
        assert!(is_identifier("_x"));
        assert!(!is_identifier("2x"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }
}
