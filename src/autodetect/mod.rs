//! Autodetect conditions: boolean expressions over the server's welcome banner and
//! its reply to `SYST`, used to pick the server type a listing most likely comes from.
//!
//! ```text
//! not syst_contains("Windows_NT") and (welcome_contains("ProFTPD") or reg_exp_in_syst("unix|linux"))
//! ```

mod frame;
mod parser;

use std::fmt;

use recursion::CollapsibleExt;

use crate::error::CompileError;
use crate::search::{DefaultSearch, SearchProvider, Searcher};

pub use frame::ConditionFrame;

/// Built-in condition functions. Each takes one string and searches one of the two inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    SystContains,
    WelcomeContains,
    RegExpInSyst,
    RegExpInWelcome,
}

impl CallKind {
    pub const ALL: [CallKind; 4] = [
        CallKind::SystContains,
        CallKind::WelcomeContains,
        CallKind::RegExpInSyst,
        CallKind::RegExpInWelcome,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CallKind::SystContains => "syst_contains",
            CallKind::WelcomeContains => "welcome_contains",
            CallKind::RegExpInSyst => "reg_exp_in_syst",
            CallKind::RegExpInWelcome => "reg_exp_in_welcome",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, CallKind::RegExpInSyst | CallKind::RegExpInWelcome)
    }

    fn reads_welcome(&self) -> bool {
        matches!(self, CallKind::WelcomeContains | CallKind::RegExpInWelcome)
    }
}

/// A condition function bound to its compiled pattern.
#[derive(Debug)]
pub struct Call {
    pub kind: CallKind,
    searcher: Box<dyn Searcher>,
}

impl Call {
    pub fn pattern(&self) -> &str {
        self.searcher.pattern()
    }

    fn matches(&self, welcome: &str, syst: &str) -> bool {
        let subject = if self.kind.reads_welcome() { welcome } else { syst };
        self.searcher.search_forward(subject, 0).is_some()
    }
}

/// Compiled condition. Immutable once built; evaluation only reads it.
#[derive(Debug)]
pub enum Condition {
    /// empty condition, or a function called with `""`
    AlwaysTrue,
    Or(Box<Condition>, Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    Call(Call),
}

/// Compile `source` with the built-in substring and regex search.
pub fn compile(source: &str) -> Result<Condition, CompileError> {
    compile_with(source, &DefaultSearch)
}

pub fn compile_with(
    source: &str,
    search: &dyn SearchProvider,
) -> Result<Condition, CompileError> {
    parser::ConditionBuilder::new(source, search).build()
}

impl Condition {
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        compile(source)
    }

    pub fn evaluate(&self, welcome: &str, syst: &str) -> bool {
        self.collapse_frames(|frame| match frame {
            ConditionFrame::AlwaysTrue => true,
            ConditionFrame::Or(a, b) => a || b,
            ConditionFrame::And(a, b) => a && b,
            ConditionFrame::Not(a) => !a,
            ConditionFrame::Call(call) => call.matches(welcome, syst),
        })
    }
}

const OR: u8 = 0;
const AND: u8 = 1;
const NOT: u8 = 2;
const ATOM: u8 = 3;

/// Parenthesize `operand` when it binds looser than `min`.
fn operand((text, precedence): (String, u8), min: u8) -> String {
    if precedence < min {
        format!("({})", text)
    } else {
        text
    }
}

fn quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Renders source text that compiles back to an equivalent condition.
/// Both binary operators group to the left, as the parser reads them.
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (text, _) = self.collapse_frames(|frame| match frame {
            // an empty pattern always matches
            ConditionFrame::AlwaysTrue => ("syst_contains(\"\")".to_owned(), ATOM),
            ConditionFrame::Or(a, b) => (
                format!("{} or {}", operand(a, OR), operand(b, AND)),
                OR,
            ),
            ConditionFrame::And(a, b) => (
                format!("{} and {}", operand(a, AND), operand(b, NOT)),
                AND,
            ),
            ConditionFrame::Not(a) => (format!("not {}", operand(a, ATOM)), NOT),
            ConditionFrame::Call(call) => (
                format!("{}({})", call.kind.name(), quoted(call.pattern())),
                ATOM,
            ),
        });
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parenthesizes_by_precedence() {
        let c = compile("(syst_contains(\"a\") or welcome_contains(\"b\")) and not (syst_contains(\"c\"))")
            .unwrap();
        assert_eq!(
            c.to_string(),
            "(syst_contains(\"a\") or welcome_contains(\"b\")) and not syst_contains(\"c\")"
        );
        let again = compile(&c.to_string()).unwrap();
        assert_eq!(again.to_string(), c.to_string());
    }

    #[test]
    fn display_keeps_left_grouping() {
        let c = compile("syst_contains(\"a\") or syst_contains(\"b\") or syst_contains(\"c\")").unwrap();
        assert!(matches!(c, Condition::Or(ref l, _) if matches!(**l, Condition::Or(..))));
        assert_eq!(
            c.to_string(),
            "syst_contains(\"a\") or syst_contains(\"b\") or syst_contains(\"c\")"
        );

        let c = compile("syst_contains(\"a\") and (syst_contains(\"b\") and syst_contains(\"c\"))")
            .unwrap();
        assert_eq!(
            c.to_string(),
            "syst_contains(\"a\") and (syst_contains(\"b\") and syst_contains(\"c\"))"
        );
    }

    #[test]
    fn quoted_patterns_are_escaped() {
        let c = compile(r#"welcome_contains("say \"hi\"\t")"#).unwrap();
        assert_eq!(c.to_string(), r#"welcome_contains("say \"hi\"\t")"#);
    }
}
