//! Search collaborators used by autodetect conditions. Both kinds search forward and ignore case.

use std::fmt::Debug;

use crate::hybrid_regex::HybridRegex;
use crate::util::{find_case_insensitive, try_string, OutOfMemory};

/// A compiled pattern. Searching takes the subject per call, so one searcher
/// serves any number of concurrent evaluations.
pub trait Searcher: Send + Sync + Debug {
    /// Byte offset of the first match at or after `start`.
    fn search_forward(&self, text: &str, start: usize) -> Option<usize>;

    fn pattern(&self) -> &str;
}

/// Why a search pattern could not be prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    OutOfMemory,
    /// the engine's description of an invalid pattern
    Invalid(String),
}

impl From<OutOfMemory> for SearchError {
    fn from(_: OutOfMemory) -> Self {
        SearchError::OutOfMemory
    }
}

/// Builds searchers for condition functions. Hosts with their own search engines
/// pass an implementation to [`crate::autodetect::compile_with`].
pub trait SearchProvider {
    fn substring(&self, pattern: &str) -> Result<Box<dyn Searcher>, SearchError>;
    fn regex(&self, pattern: &str) -> Result<Box<dyn Searcher>, SearchError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstringSearcher {
    pattern: String,
}

impl SubstringSearcher {
    pub fn new(pattern: &str) -> Result<Self, OutOfMemory> {
        Ok(SubstringSearcher {
            pattern: try_string(pattern)?,
        })
    }
}

impl Searcher for SubstringSearcher {
    fn search_forward(&self, text: &str, start: usize) -> Option<usize> {
        let tail = text.get(start..)?;
        find_case_insensitive(tail, &self.pattern).map(|(found, _)| start + found)
    }

    fn pattern(&self) -> &str {
        &self.pattern
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexSearcher {
    regex: HybridRegex,
    pattern: String,
}

impl Searcher for RegexSearcher {
    fn search_forward(&self, text: &str, start: usize) -> Option<usize> {
        if start > text.len() || !text.is_char_boundary(start) {
            return None;
        }
        self.regex.find_at(text, start)
    }

    fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Case-insensitive substring search and [`HybridRegex`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSearch;

impl SearchProvider for DefaultSearch {
    fn substring(&self, pattern: &str) -> Result<Box<dyn Searcher>, SearchError> {
        Ok(Box::new(SubstringSearcher::new(pattern)?))
    }

    fn regex(&self, pattern: &str) -> Result<Box<dyn Searcher>, SearchError> {
        let regex = HybridRegex::new(pattern).map_err(SearchError::Invalid)?;
        Ok(Box::new(RegexSearcher {
            regex,
            pattern: try_string(pattern)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_search_starts_at_offset() {
        let s = DefaultSearch.substring("unix").unwrap();
        assert_eq!(s.search_forward("UNIX unix", 0), Some(0));
        assert_eq!(s.search_forward("UNIX unix", 1), Some(5));
        assert_eq!(s.search_forward("UNIX", 10), None);
    }

    #[test]
    fn regex_errors_carry_engine_detail() {
        match DefaultSearch.regex("[a-") {
            Err(SearchError::Invalid(detail)) => assert!(!detail.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }
}
