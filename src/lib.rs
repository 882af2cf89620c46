//! Rule-driven parsing of FTP directory listings.
//!
//! A [`RuleSet`] is compiled from rule source against a declared [`Columns`] set and then
//! applied to listing text by a [`ListingInterpreter`], producing one [`FileRecord`] per
//! recognized file. [`ServerTypeSet`] bundles rule sets with autodetect conditions and picks
//! the one that can read a given listing.

pub mod autodetect;
pub mod column;
pub mod error;
pub mod hybrid_regex;
pub mod interp;
pub mod output;
pub mod rules;
pub mod search;
pub mod server_type;
pub mod util;

use slog::{debug, Logger};

pub use autodetect::Condition;
pub use column::{ColumnDef, ColumnKind, Columns, Value};
pub use error::{CompileError, ErrorCode, ListingError, SourceError};
pub use interp::{FileRecord, InterpretationContext, Languages, ListingInterpreter};
pub use rules::RuleSet;
pub use server_type::{ServerType, ServerTypeSet};

/// Run `rules` over the whole listing. The `.` and `..` entries are dropped.
pub fn parse_listing(
    logger: &Logger,
    rules: &RuleSet,
    listing: &str,
    ctx: InterpretationContext,
) -> Result<Vec<FileRecord>, ListingError> {
    let mut records = Vec::new();
    let mut interpreter = ListingInterpreter::begin(logger, rules, listing, ctx);
    while let Some(record) = interpreter.next_record()? {
        if record.is_dot_entry() {
            continue;
        }
        records
            .try_reserve(1)
            .map_err(|_| ListingError::OutOfMemory)?;
        records.push(record);
    }
    debug!(logger, "listing parsed"; "records" => records.len());
    Ok(records)
}
