use std::io::{self, Write};

use itertools::Itertools;

use crate::column::{ColumnKind, Columns, Value};
use crate::interp::FileRecord;

/// Line writer that treats a closed pipe as a normal end of output
/// (exit code 0, as for SIGPIPE on Unix).
pub struct SafeOutput<W: Write> {
    writer: W,
}

impl<W: Write> SafeOutput<W> {
    pub fn new(writer: W) -> Self {
        SafeOutput { writer }
    }

    pub fn writeln(&mut self, content: &str) -> io::Result<()> {
        let result = writeln!(self.writer, "{}", content).and_then(|()| self.writer.flush());
        match result {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => std::process::exit(0),
            other => other,
        }
    }
}

pub fn safe_stdout() -> SafeOutput<io::Stdout> {
    SafeOutput::new(io::stdout())
}

/// One listing line per record: type flags, size, modification time, name, then every
/// non-empty text or number column as `id=value`.
pub fn render_text(record: &FileRecord, columns: &Columns) -> String {
    let flags = format!(
        "{}{}{}",
        if record.is_dir { 'd' } else { '-' },
        if record.is_link { 'l' } else { '-' },
        if record.is_hidden { 'h' } else { '-' },
    );
    let modified = record
        .modified
        .map_or_else(|| "-".to_owned(), |m| m.format("%Y-%m-%d %H:%M:%S").to_string());
    let extra = columns
        .iter()
        .zip(&record.values)
        .filter(|(c, v)| {
            matches!(
                c.kind,
                ColumnKind::Text
                    | ColumnKind::Number
                    | ColumnKind::GeneralDate
                    | ColumnKind::GeneralTime
            ) && !matches!(v, Value::Empty)
                && !matches!(v, Value::Text(t) if t.is_empty())
        })
        .map(|(c, v)| format!("{}={}", c.id, v))
        .join(" ");

    let mut line = format!("{} {:>12} {} {}", flags, record.size, modified, record.name);
    if !extra.is_empty() {
        line.push_str("  ");
        line.push_str(&extra);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Cursor;

    #[test]
    fn lines_are_newline_terminated() {
        let mut buffer = Vec::new();
        {
            let mut out = SafeOutput::new(Cursor::new(&mut buffer));
            out.writeln("first").expect("write should succeed");
            out.writeln("").expect("empty write should succeed");
        }
        assert_eq!(String::from_utf8(buffer).unwrap(), "first\n\n");
    }

    #[test]
    fn text_rendering_lists_extra_columns() {
        let columns = Columns::from_list("name:name,size:size,date:date,user:text,group:text").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 12).unwrap();
        let record = FileRecord {
            name: "bin".to_owned(),
            is_dir: true,
            is_hidden: false,
            is_link: false,
            size: 0,
            modified: Some(date.and_hms_opt(0, 0, 0).unwrap()),
            extension: None,
            values: vec![
                Value::Text("bin".to_owned()),
                Value::Number(0),
                Value::Date(date),
                Value::Text("root".to_owned()),
                Value::Text(String::new()),
            ],
        };
        assert_eq!(
            render_text(&record, &columns),
            "d--            0 2024-01-12 00:00:00 bin  user=root"
        );
    }
}
