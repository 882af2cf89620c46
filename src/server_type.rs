//! Server types: named rule sets with an autodetect condition, loaded from TOML,
//! and the loop that picks the one able to read a listing.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use slog::{debug, info, o, Logger};
use thiserror::Error;

use crate::autodetect::{self, Condition};
use crate::column::{ColumnDef, ColumnError, Columns};
use crate::error::{CompileError, ListingError};
use crate::interp::{FileRecord, InterpretationContext};
use crate::parse_listing;
use crate::rules::RuleSet;

const STOCK_CATALOG: &str = include_str!("server_types.toml");

/// One server type as written in a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerType {
    pub name: String,
    /// Autodetect condition; empty matches every server.
    #[serde(default)]
    pub condition: String,
    pub columns: Vec<ColumnDef>,
    pub rules: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Catalog {
    #[serde(default, rename = "server_type")]
    server_types: Vec<ServerType>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum ServerTypeError {
    #[error("failed to read server types from {path}")]
    #[diagnostic(code(ftp_listing::server_types::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid server type catalog")]
    #[diagnostic(code(ftp_listing::server_types::toml))]
    Toml(#[from] toml::de::Error),

    #[error("server type '{name}' is declared twice")]
    #[diagnostic(code(ftp_listing::server_types::duplicate))]
    Duplicate { name: String },

    #[error("server type '{name}' has invalid columns")]
    #[diagnostic(code(ftp_listing::server_types::columns))]
    Columns {
        name: String,
        #[source]
        source: ColumnError,
    },

    #[error("server type '{name}' has an invalid autodetect condition")]
    Condition {
        name: String,
        #[source]
        #[diagnostic_source]
        source: CompileError,
    },

    #[error("server type '{name}' has invalid rules")]
    Rules {
        name: String,
        #[source]
        #[diagnostic_source]
        source: CompileError,
    },
}

/// A server type ready for use: condition and rules compiled once.
#[derive(Debug)]
pub struct CompiledServerType {
    pub name: String,
    pub condition: Condition,
    pub rules: RuleSet,
}

impl ServerType {
    pub fn compile(&self) -> Result<CompiledServerType, ServerTypeError> {
        let columns = Columns::new(&self.columns).map_err(|source| ServerTypeError::Columns {
            name: self.name.clone(),
            source,
        })?;
        let condition =
            autodetect::compile(&self.condition).map_err(|source| ServerTypeError::Condition {
                name: self.name.clone(),
                source,
            })?;
        let rules = RuleSet::compile(&self.rules, &columns).map_err(|source| {
            ServerTypeError::Rules {
                name: self.name.clone(),
                source,
            }
        })?;
        Ok(CompiledServerType {
            name: self.name.clone(),
            condition,
            rules,
        })
    }
}

/// A listing read by autodetection, with the server type that read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub server_type: String,
    pub records: Vec<FileRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DetectError {
    #[error("no server type can read this listing")]
    NoServerType,
    #[error("out of memory while reading the listing")]
    OutOfMemory,
}

/// Ordered catalog of compiled server types.
#[derive(Debug, Default)]
pub struct ServerTypeSet {
    types: Vec<CompiledServerType>,
}

impl ServerTypeSet {
    pub fn compile(types: &[ServerType]) -> Result<Self, ServerTypeError> {
        let mut compiled: Vec<CompiledServerType> = Vec::with_capacity(types.len());
        for t in types {
            if compiled.iter().any(|c| c.name.eq_ignore_ascii_case(&t.name)) {
                return Err(ServerTypeError::Duplicate {
                    name: t.name.clone(),
                });
            }
            compiled.push(t.compile()?);
        }
        Ok(ServerTypeSet { types: compiled })
    }

    /// Parse a catalog of `[[server_type]]` tables.
    pub fn from_toml(text: &str) -> Result<Self, ServerTypeError> {
        let catalog: Catalog = toml::from_str(text)?;
        Self::compile(&catalog.server_types)
    }

    pub fn load(path: &Path) -> Result<Self, ServerTypeError> {
        let text = std::fs::read_to_string(path).map_err(|source| ServerTypeError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// The catalog built into the crate.
    pub fn stock() -> Result<Self, ServerTypeError> {
        Self::from_toml(STOCK_CATALOG)
    }

    /// Definitions of the built-in catalog, for callers that want to extend it.
    pub fn stock_definitions() -> Result<Vec<ServerType>, ServerTypeError> {
        let catalog: Catalog = toml::from_str(STOCK_CATALOG)?;
        Ok(catalog.server_types)
    }

    pub fn get(&self, name: &str) -> Option<&CompiledServerType> {
        self.position(name).map(|i| &self.types[i])
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.types
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledServerType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Read `listing` with the first server type able to parse all of it.
    ///
    /// Tried in order: the type used last time for this server, then every type whose
    /// condition holds for `welcome` and `syst`, then all the rest. Each type is tried
    /// at most once.
    pub fn parse_with_autodetect(
        &self,
        logger: &Logger,
        last_used: Option<&str>,
        welcome: &str,
        syst: &str,
        listing: &str,
        ctx: InterpretationContext,
    ) -> Result<Detection, DetectError> {
        let logger = logger.new(o!("server_types" => self.types.len()));
        let mut tried = vec![false; self.types.len()];

        let last = last_used.and_then(|name| self.position(name));
        if let Some(i) = last {
            if let Some(d) = self.try_type(&logger, i, &mut tried, listing, ctx)? {
                return Ok(d);
            }
        }

        for i in 0..self.types.len() {
            if tried[i] || !self.types[i].condition.evaluate(welcome, syst) {
                continue;
            }
            if let Some(d) = self.try_type(&logger, i, &mut tried, listing, ctx)? {
                return Ok(d);
            }
        }

        for i in 0..self.types.len() {
            if tried[i] {
                continue;
            }
            if let Some(d) = self.try_type(&logger, i, &mut tried, listing, ctx)? {
                return Ok(d);
            }
        }

        info!(logger, "no server type matched the listing");
        Err(DetectError::NoServerType)
    }

    fn try_type(
        &self,
        logger: &Logger,
        index: usize,
        tried: &mut [bool],
        listing: &str,
        ctx: InterpretationContext,
    ) -> Result<Option<Detection>, DetectError> {
        tried[index] = true;
        let server_type = &self.types[index];
        let logger = logger.new(o!("server_type" => server_type.name.clone()));
        match parse_listing(&logger, &server_type.rules, listing, ctx) {
            Ok(records) => {
                info!(logger, "server type selected"; "records" => records.len());
                Ok(Some(Detection {
                    server_type: server_type.name.clone(),
                    records,
                }))
            }
            Err(ListingError::NoRuleMatched { offset, line }) => {
                debug!(logger, "server type rejected"; "offset" => offset, "line" => line);
                Ok(None)
            }
            Err(ListingError::OutOfMemory) => Err(DetectError::OutOfMemory),
        }
    }
}
