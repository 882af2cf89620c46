//! Applying a compiled rule set to listing text, one record at a time.

mod exec;
pub(crate) mod month;
pub mod record;

use chrono::{Local, NaiveDate};
use slog::{debug, o, trace, Logger};

use crate::error::ListingError;
use crate::rules::RuleSet;
use exec::{NonEmptyLines, RuleOutcome, RuleRun};
pub use month::Languages;
pub use record::FileRecord;

/// Facts about the listing that rules cannot learn from the text itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpretationContext {
    /// Reference date for listings that show a time of day instead of a year.
    pub today: NaiveDate,
    /// Month name languages the listing may use.
    pub languages: Languages,
    /// The listing was cut short, so its last line may be partial.
    pub incomplete: bool,
}

impl InterpretationContext {
    pub fn new(today: NaiveDate) -> Self {
        InterpretationContext {
            today,
            languages: Languages::default(),
            incomplete: false,
        }
    }

    pub fn today() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn with_languages(mut self, languages: Languages) -> Self {
        self.languages = languages;
        self
    }

    pub fn incomplete(mut self, incomplete: bool) -> Self {
        self.incomplete = incomplete;
        self
    }
}

/// Number of line ends in `s`; `\r\n` counts once.
fn count_line_ends(s: &str) -> usize {
    let bytes = s.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(i, b)| **b == b'\n' || (**b == b'\r' && bytes.get(i + 1) != Some(&b'\n')))
        .count()
}

/// Cursor over one listing. Each call to [`ListingInterpreter::next_record`] applies the
/// rules at the cursor until one emits a record, the listing ends, or no rule matches.
pub struct ListingInterpreter<'r, 't> {
    logger: Logger,
    rules: &'r RuleSet,
    text: &'t str,
    ctx: InterpretationContext,
    lines: NonEmptyLines,
    languages: Languages,
    pos: usize,
    /// 1-based line of `pos`
    line: usize,
    finished: bool,
}

impl<'r, 't> ListingInterpreter<'r, 't> {
    pub fn begin(
        logger: &Logger,
        rules: &'r RuleSet,
        text: &'t str,
        ctx: InterpretationContext,
    ) -> Self {
        let logger = logger.new(o!("listing_bytes" => text.len(), "rules" => rules.rules().len()));
        ListingInterpreter {
            logger,
            rules,
            text,
            ctx,
            lines: NonEmptyLines::scan(text),
            languages: ctx.languages,
            pos: 0,
            line: 1,
            finished: false,
        }
    }

    /// Month name languages still consistent with everything read so far.
    pub fn languages(&self) -> Languages {
        self.languages
    }

    /// Byte offset of the cursor.
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next record, `Ok(None)` once the listing is exhausted. After an error the
    /// interpreter is finished and keeps returning `Ok(None)`.
    pub fn next_record(&mut self) -> Result<Option<FileRecord>, ListingError> {
        let result = self.step();
        if result.is_err() {
            self.finished = true;
        }
        result
    }

    fn step(&mut self) -> Result<Option<FileRecord>, ListingError> {
        let rules = self.rules;
        let columns = rules.columns();
        loop {
            if self.finished || self.pos >= self.text.len() {
                self.finished = true;
                return Ok(None);
            }

            let restart = self.pos;
            let mut matched = None;
            for (index, rule) in rules.rules().iter().enumerate() {
                let run = RuleRun::new(
                    self.text,
                    restart,
                    columns,
                    &self.ctx,
                    &self.lines,
                    &mut self.languages,
                )?;
                match run.run(rule)? {
                    RuleOutcome::Failed => {}
                    RuleOutcome::SkipRest => {
                        debug!(self.logger, "skipping partial tail of incomplete listing";
                            "offset" => restart, "line" => self.line);
                        self.pos = self.text.len();
                        self.finished = true;
                        return Ok(None);
                    }
                    RuleOutcome::Matched { end, row } => {
                        matched = Some((index, end, row));
                        break;
                    }
                }
            }

            let Some((index, end, row)) = matched else {
                if self.ctx.incomplete && !self.text[restart..].contains(['\r', '\n']) {
                    debug!(self.logger, "partial last line of incomplete listing dropped";
                        "offset" => restart, "line" => self.line);
                    self.pos = self.text.len();
                    self.finished = true;
                    return Ok(None);
                }
                debug!(self.logger, "no rule matched"; "offset" => restart, "line" => self.line);
                return Err(ListingError::NoRuleMatched {
                    offset: restart,
                    line: self.line,
                });
            };

            self.line += count_line_ends(&self.text[restart..end]);
            self.pos = end;
            if !row.has_name(columns) {
                trace!(self.logger, "line skipped"; "rule" => index, "offset" => restart);
                continue;
            }
            let record = row.into_record(columns, &self.ctx).map_err(ListingError::from)?;
            trace!(self.logger, "record"; "rule" => index, "name" => %record.name);
            return Ok(Some(record));
        }
    }
}

impl Iterator for ListingInterpreter<'_, '_> {
    type Item = Result<FileRecord, ListingError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

