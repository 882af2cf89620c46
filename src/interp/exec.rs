use bitflags::bitflags;
use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::column::{lowest_date, ColumnKind, Columns, Value};
use crate::interp::month::{
    textual_any_language, textual_from_list, three_letter_any_language, three_letter_from_list,
    Languages,
};
use crate::interp::record::FileRecord;
use crate::interp::InterpretationContext;
use crate::rules::typecheck::operand_type;
use crate::rules::{BinaryOp, ColumnRef, Function, FunctionKind, OperandType, Param, Rule, StateVar};
use crate::util::{
    chars_eq_ignore_case, find_case_insensitive, floor_char_boundary, str_eq_ignore_case,
    try_concat, try_push, try_string, OutOfMemory,
};

const MAX_NAME_LEN: usize = 255;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct Filled: u8 {
        const DAY = 1;
        const MONTH = 1 << 1;
        const YEAR = 1 << 2;
        /// year was guessed from today and may be one too high
        const YEAR_CORRECTION = 1 << 3;
        const TIME = 1 << 4;
        const VALUE = 1 << 5;

        const DATE = Self::DAY.bits() | Self::MONTH.bits() | Self::YEAR.bits();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DateParts {
    day: u32,
    month: u32,
    year: i32,
}

#[derive(Debug)]
struct Cell {
    filled: Filled,
    text: String,
    /// `None` is the stored empty number (negative input to `positive_number`)
    number: Option<i64>,
    date: DateParts,
    time: NaiveTime,
}

impl Cell {
    fn new() -> Self {
        Cell {
            filled: Filled::empty(),
            text: String::new(),
            number: None,
            date: DateParts::default(),
            time: NaiveTime::MIN,
        }
    }
}

/// Column values collected while one rule runs.
#[derive(Debug)]
pub(crate) struct Row {
    cells: Vec<Cell>,
    is_dir: bool,
    is_hidden: bool,
    is_link: bool,
}

impl Row {
    fn new(columns: &Columns) -> Result<Self, OutOfMemory> {
        let mut cells = Vec::new();
        cells.try_reserve_exact(columns.len())?;
        cells.extend((0..columns.len()).map(|_| Cell::new()));
        Ok(Row {
            cells,
            is_dir: false,
            is_hidden: false,
            is_link: false,
        })
    }

    pub(crate) fn has_name(&self, columns: &Columns) -> bool {
        self.cells
            .get(columns.name_index())
            .is_some_and(|c| c.filled.contains(Filled::VALUE))
    }

    /// Fill columns the rule left empty and build the emitted record.
    pub(crate) fn into_record(
        mut self,
        columns: &Columns,
        ctx: &InterpretationContext,
    ) -> Result<FileRecord, OutOfMemory> {
        let name = match self.cells.get_mut(columns.name_index()) {
            Some(cell) => std::mem::take(&mut cell.text),
            None => String::new(),
        };
        let extension = match name.rfind('.') {
            Some(dot) if !self.is_dir => Some(try_string(&name[dot + 1..])?),
            _ => None,
        };

        let mut values = Vec::new();
        values.try_reserve_exact(columns.len())?;
        let mut size = 0;
        let mut has_modified = false;
        let mut modified_date = lowest_date();
        let mut modified_time = NaiveTime::MIN;

        for (column, cell) in columns.iter().zip(&self.cells) {
            let filled = cell.filled;
            let value = match column.kind {
                ColumnKind::Name => Value::Text(try_string(&name)?),
                ColumnKind::Extension => match &extension {
                    Some(ext) => Value::Text(try_string(ext)?),
                    None => Value::Empty,
                },
                ColumnKind::FileType => column.empty.clone(),
                ColumnKind::Text if filled.contains(Filled::VALUE) => {
                    Value::Text(try_string(&cell.text)?)
                }
                ColumnKind::Size => {
                    let n = if filled.contains(Filled::VALUE) {
                        cell.number.unwrap_or(0)
                    } else {
                        match column.empty {
                            Value::Number(n) => n,
                            _ => 0,
                        }
                    };
                    size = u64::try_from(n).unwrap_or(0);
                    Value::Number(n)
                }
                ColumnKind::Number if filled.contains(Filled::VALUE) => {
                    cell.number.map_or(Value::Empty, Value::Number)
                }
                ColumnKind::Date => {
                    let date = if filled.contains(Filled::DATE) {
                        resolve_date(cell, ctx.today).unwrap_or_else(lowest_date)
                    } else {
                        match column.empty {
                            Value::Date(d) => d,
                            _ => lowest_date(),
                        }
                    };
                    modified_date = date;
                    has_modified = true;
                    Value::Date(date)
                }
                ColumnKind::Time => {
                    let time = if filled.contains(Filled::TIME) {
                        cell.time
                    } else {
                        match column.empty {
                            Value::Time(t) => t,
                            _ => NaiveTime::MIN,
                        }
                    };
                    modified_time = time;
                    has_modified = true;
                    Value::Time(time)
                }
                ColumnKind::GeneralDate if filled.contains(Filled::DATE) => {
                    Value::Date(resolve_date(cell, ctx.today).unwrap_or_else(lowest_date))
                }
                ColumnKind::GeneralTime if filled.contains(Filled::TIME) => Value::Time(cell.time),
                _ => column.empty.clone(),
            };
            try_push(&mut values, value)?;
        }

        Ok(FileRecord {
            name,
            is_dir: self.is_dir,
            is_hidden: self.is_hidden,
            is_link: self.is_link,
            size,
            modified: has_modified.then(|| modified_date.and_time(modified_time)),
            extension,
            values,
        })
    }
}

/// A date guessed from a time-of-day listing lies in the past year when it would be in the future.
fn resolve_date(cell: &Cell, today: NaiveDate) -> Option<NaiveDate> {
    let DateParts { day, month, mut year } = cell.date;
    if cell.filled.contains(Filled::YEAR_CORRECTION)
        && (month > today.month() || (month == today.month() && day > today.day()))
    {
        year -= 1;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Byte range of a non-empty line, `end` includes the line end and may point one past the
/// text when the line is unterminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineSpan {
    start: usize,
    end: usize,
}

impl LineSpan {
    fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NonEmptyLines {
    first: Option<LineSpan>,
    last: Option<LineSpan>,
}

impl NonEmptyLines {
    pub(crate) fn scan(text: &str) -> Self {
        let bytes = text.as_bytes();
        let len = bytes.len();

        let mut first = None;
        let mut begin = 0;
        let mut non_empty = false;
        let mut i = 0;
        while i < len {
            match bytes[i] {
                b'\r' | b'\n' => {
                    if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                    if non_empty {
                        first = Some(LineSpan {
                            start: begin,
                            end: i + 1,
                        });
                        break;
                    }
                    begin = i + 1;
                }
                b if b > b' ' => non_empty = true,
                _ => {}
            }
            i += 1;
        }
        if first.is_none() && non_empty {
            first = Some(LineSpan {
                start: begin,
                end: len + 1,
            });
        }

        let mut last = None;
        let mut end = len;
        let mut has_line_end = false;
        non_empty = false;
        let mut i = len;
        while i > 0 {
            i -= 1;
            match bytes[i] {
                b'\r' | b'\n' => {
                    if non_empty {
                        last = Some(LineSpan { start: i + 1, end });
                        break;
                    }
                    end = i + 1;
                    has_line_end = true;
                    if bytes[i] == b'\n' && i > 0 && bytes[i - 1] == b'\r' {
                        i -= 1;
                    }
                }
                b if b > b' ' => non_empty = true,
                _ => {}
            }
        }
        if last.is_none() && non_empty {
            last = Some(LineSpan { start: 0, end });
        }
        if let Some(span) = last.as_mut() {
            if !has_line_end && span.end == len {
                span.end += 1;
            }
        }

        NonEmptyLines { first, last }
    }
}

pub(crate) enum RuleOutcome {
    Failed,
    /// the rest of an incomplete listing was reached and is skipped
    SkipRest,
    Matched { end: usize, row: Row },
}

/// State of one attempt to apply a rule at a cursor position.
pub(crate) struct RuleRun<'a> {
    text: &'a str,
    pos: usize,
    columns: &'a Columns,
    ctx: &'a InterpretationContext,
    lines: &'a NonEmptyLines,
    languages: &'a mut Languages,
    row: Row,
    skip_rest: bool,
}

fn is_line_end(c: char) -> bool {
    c == '\r' || c == '\n'
}

fn is_blank(c: char) -> bool {
    c <= ' ' && !is_line_end(c)
}

fn ends_with_ignore_case(s: &str, suffix: &str) -> bool {
    let mut s = s.chars().rev();
    suffix
        .chars()
        .rev()
        .all(|p| s.next().is_some_and(|c| chars_eq_ignore_case(c, p)))
}

fn compare_strings(op: BinaryOp, left: &str, right: &str) -> bool {
    match op {
        BinaryOp::Equal => left == right,
        BinaryOp::NotEqual => left != right,
        BinaryOp::StrEqual => str_eq_ignore_case(left, right),
        BinaryOp::StrNotEqual => !str_eq_ignore_case(left, right),
        BinaryOp::In => find_case_insensitive(right, left).is_some(),
        BinaryOp::NotIn => find_case_insensitive(right, left).is_none(),
        BinaryOp::EndWith => ends_with_ignore_case(left, right),
        BinaryOp::NotEndWith => !ends_with_ignore_case(left, right),
    }
}

fn compare<T: PartialEq>(op: BinaryOp, left: T, right: T) -> bool {
    match op {
        BinaryOp::Equal => left == right,
        BinaryOp::NotEqual => left != right,
        _ => false,
    }
}

impl<'a> RuleRun<'a> {
    pub(crate) fn new(
        text: &'a str,
        pos: usize,
        columns: &'a Columns,
        ctx: &'a InterpretationContext,
        lines: &'a NonEmptyLines,
        languages: &'a mut Languages,
    ) -> Result<Self, OutOfMemory> {
        Ok(RuleRun {
            text,
            pos,
            columns,
            ctx,
            lines,
            languages,
            row: Row::new(columns)?,
            skip_rest: false,
        })
    }

    pub(crate) fn run(mut self, rule: &Rule) -> Result<RuleOutcome, OutOfMemory> {
        let mut completed = true;
        for function in &rule.functions {
            if self.skip_rest {
                break;
            }
            if !self.call(function)? {
                completed = false;
                break;
            }
        }

        let name = self.columns.name_index();
        if self
            .row
            .cells
            .get(name)
            .is_some_and(|c| c.filled.contains(Filled::VALUE) && c.text.is_empty())
        {
            return Ok(RuleOutcome::Failed);
        }
        if self.skip_rest {
            return Ok(RuleOutcome::SkipRest);
        }
        if !completed || !self.at_line_end() {
            return Ok(RuleOutcome::Failed);
        }
        if self.byte() == Some(b'\r') {
            self.pos += 1;
        }
        if self.byte() == Some(b'\n') {
            self.pos += 1;
        }
        Ok(RuleOutcome::Matched {
            end: self.pos,
            row: self.row,
        })
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn byte(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn at_line_end(&self) -> bool {
        self.peek().map_or(true, is_line_end)
    }

    fn line_end(&self) -> usize {
        self.text[self.pos..]
            .find(is_line_end)
            .map_or(self.text.len(), |i| self.pos + i)
    }

    fn next_is_alphabetic(&self) -> bool {
        self.peek().is_some_and(char::is_alphabetic)
    }

    fn skip_while(&mut self, pred: impl Fn(char) -> bool) -> usize {
        let start = self.pos;
        while let Some(c) = self.peek().filter(|c| pred(*c)) {
            self.pos += c.len_utf8();
        }
        self.pos - start
    }

    /// Decimal digits under the cursor; `None` when there are none or they overflow.
    fn read_digits(&mut self) -> Option<i64> {
        let start = self.pos;
        let mut n: i64 = 0;
        while let Some(d) = self.byte().filter(u8::is_ascii_digit) {
            n = n.checked_mul(10)?.checked_add(i64::from(d - b'0'))?;
            self.pos += 1;
        }
        (self.pos > start).then_some(n)
    }

    fn read_sign(&mut self) -> bool {
        match self.byte() {
            Some(b'+') => {
                self.pos += 1;
                false
            }
            Some(b'-') => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn target(&mut self, column: Option<ColumnRef>) -> Option<(&mut Cell, ColumnKind)> {
        let index = column?.declared()?;
        let kind = self.columns.get(index)?.kind;
        self.row.cells.get_mut(index).map(|c| (c, kind))
    }

    fn set_text(&mut self, column: Option<ColumnRef>, mut text: String) -> bool {
        let Some((cell, kind)) = self.target(column) else {
            return false;
        };
        if kind == ColumnKind::Name && text.len() > MAX_NAME_LEN {
            text.truncate(floor_char_boundary(&text, MAX_NAME_LEN));
        }
        cell.text = text;
        cell.filled.insert(Filled::VALUE);
        true
    }

    fn set_slice(
        &mut self,
        column: Option<ColumnRef>,
        start: usize,
        end: usize,
    ) -> Result<bool, OutOfMemory> {
        let text = try_string(&self.text[start..end])?;
        Ok(self.set_text(column, text))
    }

    fn set_number(
        &mut self,
        column: Option<ColumnRef>,
        value: Option<i64>,
        positive_only: bool,
    ) -> bool {
        let Some((cell, kind)) = self.target(column) else {
            return false;
        };
        let negative = value.is_some_and(|n| n < 0);
        cell.number = match kind {
            ColumnKind::Size if negative && !positive_only => return false,
            ColumnKind::Size if negative || value.is_none() => Some(0),
            _ if negative && positive_only => None,
            _ => value,
        };
        cell.filled.insert(Filled::VALUE);
        true
    }

    fn set_date_part(&mut self, column: Option<ColumnRef>, part: Filled, value: i64) -> bool {
        let Some((cell, _)) = self.target(column) else {
            return false;
        };
        if part.contains(Filled::DAY) {
            cell.date.day = value as u32;
        } else if part.contains(Filled::MONTH) {
            cell.date.month = value as u32;
        } else {
            cell.date.year = value as i32;
        }
        cell.filled.insert(part);
        true
    }

    fn set_time(&mut self, column: Option<ColumnRef>, time: NaiveTime) -> bool {
        let Some((cell, _)) = self.target(column) else {
            return false;
        };
        cell.time = time;
        cell.filled.insert(Filled::TIME);
        true
    }

    fn declared_cell(&self, param: &Param) -> Option<&Cell> {
        param
            .as_column()
            .and_then(|c| c.declared())
            .and_then(|i| self.row.cells.get(i))
    }

    /// Text of a string operand; state variables look ahead from the cursor.
    fn str_operand<'s>(&'s self, param: &'s Param) -> &'s str {
        let rest = &self.text[self.pos..];
        match param {
            Param::Str(s) => s,
            Param::State(StateVar::NextChar) => {
                let len = rest.chars().next().map_or(0, char::len_utf8);
                &rest[..len]
            }
            Param::State(StateVar::NextWord) => {
                let len = rest.find(|c: char| c <= ' ').unwrap_or(rest.len());
                &rest[..len]
            }
            Param::State(StateVar::RestOfLine) => {
                let len = rest.find(is_line_end).unwrap_or(rest.len());
                &rest[..len]
            }
            Param::Column(_) => self.declared_cell(param).map_or("", |c| c.text.as_str()),
            _ => "",
        }
    }

    fn number_operand(&self, param: &Param) -> Option<i64> {
        match param {
            Param::Number(n) => Some(*n),
            _ => self.declared_cell(param).and_then(|c| c.number),
        }
    }

    fn eval_bool(&self, param: &Param) -> bool {
        match param {
            Param::Bool(b) => *b,
            Param::Column(ColumnRef::IsDir) => self.row.is_dir,
            Param::Column(ColumnRef::IsHidden) => self.row.is_hidden,
            Param::Column(ColumnRef::IsLink) => self.row.is_link,
            Param::State(StateVar::FirstNonemptyLine) => {
                self.lines.first.is_some_and(|l| l.contains(self.pos))
            }
            Param::State(StateVar::LastNonemptyLine) => {
                self.lines.last.is_some_and(|l| l.contains(self.pos))
            }
            Param::Expr { op, left, right } => match operand_type(left, self.columns) {
                Some(OperandType::Boolean) => {
                    compare(*op, self.eval_bool(left), self.eval_bool(right))
                }
                Some(OperandType::String) => {
                    compare_strings(*op, self.str_operand(left), self.str_operand(right))
                }
                Some(OperandType::Number) => {
                    compare(*op, self.number_operand(left), self.number_operand(right))
                }
                Some(OperandType::Date) => compare(
                    *op,
                    self.declared_cell(left).map(|c| c.date),
                    self.declared_cell(right).map(|c| c.date),
                ),
                Some(OperandType::Time) => compare(
                    *op,
                    self.declared_cell(left).map(|c| c.time),
                    self.declared_cell(right).map(|c| c.time),
                ),
                None => false,
            },
            _ => false,
        }
    }

    /// Apply one function. `Ok(false)` fails the rule.
    fn call(&mut self, function: &Function) -> Result<bool, OutOfMemory> {
        let params = function.params.as_slice();
        let column = |i: usize| params.get(i).and_then(Param::as_column);
        let number = |i: usize| params.get(i).and_then(Param::as_number).unwrap_or(0);
        let start = self.pos;

        let ok = match function.kind {
            FunctionKind::SkipWhiteSpaces => {
                self.skip_while(is_blank);
                true
            }
            FunctionKind::SkipToNumber => {
                self.skip_while(|c| !c.is_ascii_digit() && !is_line_end(c));
                true
            }
            FunctionKind::WhiteSpaces if params.is_empty() => self.skip_while(is_blank) > 0,
            FunctionKind::WhiteSpaces => self.advance_chars(number(0), is_blank),
            FunctionKind::WhiteSpacesAndLineEnds => {
                if self.skip_while(|c| c <= ' ') == 0 {
                    false
                } else if self.pos == self.text.len() {
                    self.skip_rest = self.ctx.incomplete;
                    self.ctx.incomplete
                } else {
                    true
                }
            }
            FunctionKind::RestOfLine | FunctionKind::Word => {
                if function.kind == FunctionKind::Word {
                    self.skip_while(|c| c > ' ');
                } else {
                    self.pos = self.line_end();
                }
                if self.pos == start {
                    false
                } else if params.is_empty() {
                    true
                } else {
                    self.set_slice(column(0), start, self.pos)?
                }
            }
            FunctionKind::Number | FunctionKind::PositiveNumber => {
                let negative = self.read_sign();
                match self.read_digits() {
                    Some(n) if !self.next_is_alphabetic() => self.set_number(
                        column(0),
                        Some(if negative { -n } else { n }),
                        function.kind == FunctionKind::PositiveNumber,
                    ),
                    _ => false,
                }
            }
            FunctionKind::NumberWithSeparators => {
                let separators = try_string(self.str_operand(&params[1]))?;
                match self.read_number_with_separators(&separators) {
                    Some(n) if self.pos != start && !self.next_is_alphabetic() => {
                        self.set_number(column(0), Some(n), false)
                    }
                    _ => false,
                }
            }
            FunctionKind::Month3 => {
                let text = self.text;
                let rest = &text[self.pos..];
                match prefix_chars(rest, 3) {
                    Some(len) => {
                        let name = &rest[..len];
                        let month = match params.get(1).and_then(Param::as_str) {
                            Some(list) => three_letter_from_list(name, list),
                            None => three_letter_any_language(name, self.languages),
                        };
                        self.pos += len;
                        match month {
                            Some(m) if !self.next_is_alphabetic() => {
                                self.set_date_part(column(0), Filled::MONTH, i64::from(m))
                            }
                            _ => false,
                        }
                    }
                    None => false,
                }
            }
            FunctionKind::MonthTxt => {
                let text = self.text;
                let rest = &text[self.pos..];
                let word = &rest[..rest.find(|c: char| c <= ' ').unwrap_or(rest.len())];
                let found = if word.is_empty() {
                    None
                } else {
                    match params.get(1).and_then(Param::as_str) {
                        Some(list) => textual_from_list(word, list),
                        None => textual_any_language(word, self.languages),
                    }
                };
                match found {
                    Some((month, len)) => {
                        self.pos += len;
                        !self.next_is_alphabetic()
                            && self.set_date_part(column(0), Filled::MONTH, i64::from(month))
                    }
                    None => false,
                }
            }
            FunctionKind::Month | FunctionKind::Day | FunctionKind::Year => {
                match self.read_digits() {
                    Some(n) if !self.next_is_alphabetic() => match function.kind {
                        FunctionKind::Month => {
                            (1..=12).contains(&n)
                                && self.set_date_part(column(0), Filled::MONTH, n)
                        }
                        FunctionKind::Day => {
                            (1..=31).contains(&n) && self.set_date_part(column(0), Filled::DAY, n)
                        }
                        _ => {
                            let year = normalize_year(n);
                            (1602..=9999).contains(&year)
                                && self.set_date_part(column(0), Filled::YEAR, year)
                        }
                    },
                    _ => false,
                }
            }
            FunctionKind::Time => match self.read_time() {
                Some(time) => self.set_time(column(0), time),
                None => false,
            },
            FunctionKind::YearOrTime => self.year_or_time(column(0), column(1)),
            FunctionKind::All => {
                let (target, n) = match params.len() {
                    1 => (None, number(0)),
                    _ => (column(0), number(1)),
                };
                if !self.advance_chars(n, |c| !is_line_end(c)) {
                    false
                } else if target.is_some() {
                    self.set_slice(target, start, self.pos)?
                } else {
                    true
                }
            }
            FunctionKind::AllTo | FunctionKind::AllUpTo => {
                let Some(needle) = params.last() else {
                    return Ok(false);
                };
                let needle = try_string(self.str_operand(needle))?;
                let line = &self.text[self.pos..self.line_end()];
                match find_case_insensitive(line, &needle) {
                    Some((found, found_end)) => {
                        self.pos = start + found_end;
                        if params.len() == 2 {
                            let end = if function.kind == FunctionKind::AllTo {
                                self.pos
                            } else {
                                start + found
                            };
                            self.set_slice(column(0), start, end)?
                        } else {
                            true
                        }
                    }
                    None => false,
                }
            }
            FunctionKind::UnixLink => self.unix_link(column(1), column(2))?,
            FunctionKind::UnixDevice => {
                if self.read_unix_device() {
                    self.set_slice(column(0), start, self.pos)?
                } else {
                    false
                }
            }
            FunctionKind::If => params.first().is_some_and(|p| self.eval_bool(p)),
            FunctionKind::Assign => self.assign(params)?,
            FunctionKind::CutWhiteSpacesEnd
            | FunctionKind::CutWhiteSpacesStart
            | FunctionKind::CutWhiteSpaces => {
                let current = params.first().map_or("", |p| self.str_operand(p));
                let trimmed = match function.kind {
                    FunctionKind::CutWhiteSpacesEnd => current.trim_end_matches(|c: char| c <= ' '),
                    FunctionKind::CutWhiteSpacesStart => {
                        current.trim_start_matches(|c: char| c <= ' ')
                    }
                    _ => current.trim_matches(|c: char| c <= ' '),
                };
                if trimmed.len() == current.len() {
                    true
                } else {
                    let trimmed = try_string(trimmed)?;
                    self.set_text(column(0), trimmed)
                }
            }
            FunctionKind::Back => {
                let n = number(0);
                n >= 0 && (0..n).all(|_| self.step_back())
            }
            FunctionKind::AddStringToColumn => {
                let suffix = params.get(1).map_or("", |p| self.str_operand(p));
                if suffix.is_empty() {
                    true
                } else {
                    let current = params.first().map_or("", |p| self.str_operand(p));
                    let joined = try_concat(current, suffix)?;
                    self.set_text(column(0), joined)
                }
            }
            FunctionKind::CutEndOfString => {
                let current = params.first().map_or("", |p| self.str_operand(p));
                let count = current.chars().count();
                match usize::try_from(number(1)) {
                    Ok(n) if n <= count => {
                        let cut = current
                            .char_indices()
                            .nth(count - n)
                            .map_or(current.len(), |(i, _)| i);
                        let kept = try_string(&current[..cut])?;
                        self.set_text(column(0), kept)
                    }
                    _ => false,
                }
            }
        };
        Ok(ok)
    }

    /// Move forward exactly `n` characters that satisfy `pred`.
    fn advance_chars(&mut self, n: i64, pred: impl Fn(char) -> bool) -> bool {
        if n < 0 {
            return false;
        }
        for _ in 0..n {
            match self.peek() {
                Some(c) if pred(c) => self.pos += c.len_utf8(),
                _ => return false,
            }
        }
        true
    }

    /// One character back, never across a line end or before the listing start.
    fn step_back(&mut self) -> bool {
        match self.text[..self.pos].chars().next_back() {
            Some(c) if !is_line_end(c) => {
                self.pos -= c.len_utf8();
                true
            }
            _ => false,
        }
    }

    fn read_number_with_separators(&mut self, separators: &str) -> Option<i64> {
        self.skip_while(|c| c != '+' && c != '-' && !c.is_ascii_digit() && separators.contains(c));
        let negative = self.read_sign();
        let mut n: i64 = 0;
        while let Some(c) = self.peek() {
            if let Some(d) = c.to_digit(10).filter(|_| c.is_ascii_digit()) {
                n = n.checked_mul(10)?.checked_add(i64::from(d))?;
            } else if !separators.contains(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        Some(if negative { -n } else { n })
    }

    /// `h:mm[:ss[.ms]]` with an optional `a`/`am`/`p`/`pm` suffix.
    fn read_time(&mut self) -> Option<NaiveTime> {
        let mut hour = self.read_digits().filter(|h| *h < 24)?;
        if self.byte() != Some(b':') {
            return None;
        }
        self.pos += 1;
        let minute = self.read_digits().filter(|m| *m < 60)?;
        let mut second = 0;
        let mut milli = 0;
        if self.byte() == Some(b':') {
            self.pos += 1;
            second = self.read_digits().filter(|s| *s < 60)?;
            if self.byte() == Some(b'.') {
                self.pos += 1;
                milli = self.read_digits().filter(|ms| *ms < 1000)?;
            }
        }
        match self.byte().map(|b| b.to_ascii_lowercase()) {
            Some(suffix @ (b'a' | b'p')) => {
                if suffix == b'p' && hour < 12 {
                    hour += 12;
                }
                self.pos += 1;
                if self.byte().map(|b| b.to_ascii_lowercase()) == Some(b'm') {
                    self.pos += 1;
                }
            }
            _ => {}
        }
        if self.peek().is_some_and(char::is_alphanumeric) {
            return None;
        }
        NaiveTime::from_hms_milli_opt(hour as u32, minute as u32, second as u32, milli as u32)
    }

    fn year_or_time(&mut self, date: Option<ColumnRef>, time: Option<ColumnRef>) -> bool {
        let Some(first) = self.read_digits() else {
            return false;
        };
        if first < 24 && self.byte() == Some(b':') {
            self.pos += 1;
            let Some(minute) = self.read_digits().filter(|m| *m < 60) else {
                return false;
            };
            if self.next_is_alphabetic() {
                return false;
            }
            let Some(t) = NaiveTime::from_hms_opt(first as u32, minute as u32, 0) else {
                return false;
            };
            let year = i64::from(self.ctx.today.year());
            if !self.set_date_part(date, Filled::YEAR | Filled::YEAR_CORRECTION, year) {
                return false;
            }
            self.set_time(time, t)
        } else if (1601..10000).contains(&first) {
            let year = if first == 1601 { 1602 } else { first };
            !self.next_is_alphabetic() && self.set_date_part(date, Filled::YEAR, year)
        } else {
            false
        }
    }

    /// `name`, or `name -> target`. A name or target whose last component has an
    /// extension is taken to be a file, anything else a directory.
    fn unix_link(
        &mut self,
        name: Option<ColumnRef>,
        link: Option<ColumnRef>,
    ) -> Result<bool, OutOfMemory> {
        let start = self.pos;
        if !self.peek().is_some_and(|c| c > ' ') {
            return Ok(false);
        }
        let line_end = self.line_end();
        let bytes = self.text.as_bytes();
        // only ASCII bytes are ever tested, so every recorded index is a char boundary

        let mut state = 0;
        let mut is_file = false;
        let mut is_target_file = false;
        let mut has_point = false;
        let mut after_slash = false;
        let mut name_end = line_end;
        let mut link_start = line_end;
        let mut i = start;
        while i < line_end {
            let c = bytes[i];
            match state {
                0 => state = 1,
                1 => {
                    if c == b'.' {
                        has_point = true;
                    } else if c == b'-' && bytes.get(i + 1) == Some(&b'>') {
                        name_end = if bytes[i - 1] == b' ' { i - 1 } else { i };
                        i += 1;
                        if bytes.get(i + 1) == Some(&b' ') {
                            i += 1;
                        }
                        link_start = i + 1;
                        state = 2;
                        has_point = false;
                    } else if c > b' ' && has_point {
                        is_file = true;
                    }
                }
                2 => state = 3,
                _ => {
                    if c == b'.' {
                        has_point = !after_slash;
                        after_slash = false;
                    } else if c == b'/' {
                        has_point = false;
                        is_target_file = false;
                        after_slash = true;
                    } else {
                        after_slash = false;
                        if c > b' ' && has_point {
                            is_target_file = true;
                        }
                    }
                }
            }
            i += 1;
        }
        if state != 1 && state != 3 {
            return Ok(false);
        }
        self.pos = line_end;
        self.row.is_dir = !(is_file || is_target_file);
        if !self.set_slice(name, start, name_end.min(line_end))? {
            return Ok(false);
        }
        if state == 3 {
            return self.set_slice(link, link_start.min(line_end), line_end);
        }
        Ok(true)
    }

    /// `major, minor` device numbers as shown by `ls -l` for device files.
    fn read_unix_device(&mut self) -> bool {
        if !self.byte().is_some_and(|b| b.is_ascii_digit()) {
            return false;
        }
        let mut state = 0;
        while let Some(c) = self.peek().filter(|c| !is_line_end(*c)) {
            state = match state {
                0 if c.is_ascii_digit() => 0,
                0 if c <= ' ' => 1,
                0 | 1 if c == ',' => 2,
                1 if c <= ' ' => 1,
                2 if c <= ' ' => 2,
                2 | 3 if c.is_ascii_digit() => 3,
                3 if !c.is_alphabetic() => 4,
                _ => 100,
            };
            if state > 3 {
                break;
            }
            self.pos += c.len_utf8();
        }
        state == 3 || state == 4
    }

    fn assign(&mut self, params: &[Param]) -> Result<bool, OutOfMemory> {
        let (Some(Param::Column(target)), Some(value)) = (params.first(), params.get(1)) else {
            return Ok(false);
        };
        let index = match target {
            ColumnRef::IsDir => {
                self.row.is_dir = self.eval_bool(value);
                return Ok(true);
            }
            ColumnRef::IsHidden => {
                self.row.is_hidden = self.eval_bool(value);
                return Ok(true);
            }
            ColumnRef::IsLink => {
                self.row.is_link = self.eval_bool(value);
                return Ok(true);
            }
            ColumnRef::Declared(i) => *i,
        };
        let Some(kind) = self.columns.get(index).map(|c| c.kind) else {
            return Ok(false);
        };
        let ok = match kind.operand_type() {
            Some(OperandType::String) => {
                let text = try_string(self.str_operand(value))?;
                self.set_text(Some(*target), text)
            }
            Some(OperandType::Number) => {
                let n = self.number_operand(value);
                match self.row.cells.get_mut(index) {
                    Some(cell) => {
                        cell.number = n;
                        cell.filled.insert(Filled::VALUE);
                        true
                    }
                    None => false,
                }
            }
            Some(OperandType::Date) => {
                let date = self.declared_cell(value).map(|c| c.date);
                match (date, self.row.cells.get_mut(index)) {
                    (Some(date), Some(cell)) => {
                        cell.date = date;
                        cell.filled.insert(Filled::DATE);
                        true
                    }
                    _ => false,
                }
            }
            Some(OperandType::Time) => match self.declared_cell(value).map(|c| c.time) {
                Some(t) => self.set_time(Some(*target), t),
                None => false,
            },
            Some(OperandType::Boolean) | None => false,
        };
        Ok(ok)
    }
}

/// Byte length of the first `n` characters, `None` when `s` is shorter.
fn prefix_chars(s: &str, n: usize) -> Option<usize> {
    match s.char_indices().nth(n) {
        Some((i, _)) => Some(i),
        None => (s.chars().count() == n).then_some(s.len()),
    }
}

/// Two-digit years pivot at 80; 1601 is a placeholder some servers send and reads as 1602.
fn normalize_year(n: i64) -> i64 {
    let year = match n {
        0..=79 => n + 2000,
        80..=999 => n + 1900,
        _ => n,
    };
    if year == 1601 {
        1602
    } else {
        year
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn years_pivot_at_eighty() {
        assert_eq!(normalize_year(5), 2005);
        assert_eq!(normalize_year(79), 2079);
        assert_eq!(normalize_year(80), 1980);
        assert_eq!(normalize_year(102), 2002);
        assert_eq!(normalize_year(1601), 1602);
        assert_eq!(normalize_year(2024), 2024);
    }

    #[test]
    fn non_empty_lines_skip_blank_edges() {
        let text = "\n  \ntotal 4\r\nfile\n\n";
        let lines = NonEmptyLines::scan(text);
        assert_eq!(lines.first, Some(LineSpan { start: 4, end: 13 }));
        assert_eq!(lines.last, Some(LineSpan { start: 13, end: 18 }));

        let unterminated = NonEmptyLines::scan("a\nb");
        assert_eq!(unterminated.last, Some(LineSpan { start: 2, end: 4 }));
        assert_eq!(unterminated.first, Some(LineSpan { start: 0, end: 2 }));
    }

    #[test]
    fn suffix_and_substring_ignore_case() {
        assert!(compare_strings(BinaryOp::EndWith, "README.TXT", ".txt"));
        assert!(!compare_strings(BinaryOp::EndWith, "txt", "a.txt"));
        assert!(compare_strings(BinaryOp::In, "DIR", "<dir>"));
        assert!(compare_strings(BinaryOp::In, "", "anything"));
        assert!(!compare_strings(BinaryOp::Equal, "a", "A"));
        assert!(compare_strings(BinaryOp::StrEqual, "a", "A"));
    }
}
