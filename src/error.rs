use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::util::OutOfMemory;

/// Stable identifiers for everything the rule and condition compilers can reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorCode {
    #[error("unexpected symbol")]
    UnexpectedSymbol,
    #[error("function expected after ','")]
    FunctionExpected,
    #[error("invalid function name")]
    InvalidFunctionName,
    #[error("unknown function")]
    UnknownFunction,
    #[error("missing function parameters")]
    MissingFunctionParams,
    #[error("rule is not terminated by ';'")]
    MissingRuleEnd,
    #[error("column cannot be used in rules")]
    GenericColumn,
    #[error("unknown column")]
    UnknownColumn,
    #[error("right operand expected")]
    RightOperandExpected,
    #[error("parameter expected")]
    ParameterExpected,
    #[error("invalid column identifier")]
    InvalidColumnId,
    #[error("column identifier is not terminated by '>'")]
    MissingColumnIdEnd,
    #[error("missing column identifier")]
    MissingColumnId,
    #[error("unknown escape sequence")]
    UnknownEscape,
    #[error("string is not terminated")]
    MissingStringEnd,
    #[error("invalid number")]
    InvalidNumber,
    #[error("invalid state variable or boolean value")]
    InvalidStateVarOrBool,
    #[error("unknown state variable")]
    UnknownStateVar,
    #[error("only one operator per parameter is supported")]
    UnsupportedExpression,
    #[error("unexpected symbol or unknown operator")]
    UnexpectedSymbolOrOperator,
    #[error("missing ')'")]
    MissingParenEnd,
    #[error("operands have incompatible types")]
    OperandTypeMismatch,
    #[error("column is read before any value was assigned to it")]
    BadColumnUse,
    #[error("month list must be twelve three-letter names separated by spaces")]
    BadMonth3List,
    #[error("month list must be twelve names separated by spaces")]
    BadMonthTxtList,
    #[error("invalid parameters for this function")]
    BadParameters,
    #[error("function expects a string parameter")]
    MissingStringParam,
    #[error("missing ')' closing the parenthesized expression")]
    MissingRightParen,
    #[error("invalid regular expression")]
    InvalidRegex,
    #[error("rule source contains no rules")]
    EmptyRuleSet,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnexpectedSymbol => "unexpected_symbol",
            ErrorCode::FunctionExpected => "function_expected",
            ErrorCode::InvalidFunctionName => "invalid_function_name",
            ErrorCode::UnknownFunction => "unknown_function",
            ErrorCode::MissingFunctionParams => "missing_function_params",
            ErrorCode::MissingRuleEnd => "missing_rule_end",
            ErrorCode::GenericColumn => "generic_column",
            ErrorCode::UnknownColumn => "unknown_column",
            ErrorCode::RightOperandExpected => "right_operand_expected",
            ErrorCode::ParameterExpected => "parameter_expected",
            ErrorCode::InvalidColumnId => "invalid_column_id",
            ErrorCode::MissingColumnIdEnd => "missing_column_id_end",
            ErrorCode::MissingColumnId => "missing_column_id",
            ErrorCode::UnknownEscape => "unknown_escape",
            ErrorCode::MissingStringEnd => "missing_string_end",
            ErrorCode::InvalidNumber => "invalid_number",
            ErrorCode::InvalidStateVarOrBool => "invalid_state_var_or_bool",
            ErrorCode::UnknownStateVar => "unknown_state_var",
            ErrorCode::UnsupportedExpression => "unsupported_expression",
            ErrorCode::UnexpectedSymbolOrOperator => "unexpected_symbol_or_operator",
            ErrorCode::MissingParenEnd => "missing_paren_end",
            ErrorCode::OperandTypeMismatch => "operand_type_mismatch",
            ErrorCode::BadColumnUse => "bad_column_use",
            ErrorCode::BadMonth3List => "bad_month3_list",
            ErrorCode::BadMonthTxtList => "bad_month_txt_list",
            ErrorCode::BadParameters => "bad_parameters",
            ErrorCode::MissingStringParam => "missing_string_param",
            ErrorCode::MissingRightParen => "missing_right_paren",
            ErrorCode::InvalidRegex => "invalid_regex",
            ErrorCode::EmptyRuleSet => "empty_rule_set",
        }
    }

    fn help(&self) -> Option<&'static str> {
        match self {
            ErrorCode::UnknownEscape => Some("valid escape sequences: \\\" \\\\ \\t \\r \\n"),
            ErrorCode::UnsupportedExpression => {
                Some("split the condition into several if() calls")
            }
            ErrorCode::UnknownStateVar => Some(
                "known names: true, false, first_nonempty_line, last_nonempty_line, next_char, next_word, rest_of_line",
            ),
            ErrorCode::BadColumnUse => Some("assign the column earlier in the same rule"),
            ErrorCode::EmptyRuleSet => Some("every rule starts with '*' and ends with ';'"),
            ErrorCode::BadMonth3List => {
                Some("example: \"jan feb mar apr may jun jul aug sep oct nov dec\"")
            }
            _ => None,
        }
    }
}

/// A rejected rule or condition source, positioned at the offending text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{code} at offset {offset}{}", detail_suffix(.detail))]
#[diagnostic(code(ftp_listing::syntax))]
pub struct SourceError {
    pub code: ErrorCode,
    /// Byte offset into the source text.
    pub offset: usize,
    pub len: usize,
    /// Engine-specific explanation, currently only filled for regular expressions.
    pub detail: Option<String>,
    #[source_code]
    src: String,
    #[label("{label}")]
    span: SourceSpan,
    label: String,
    #[help]
    help: Option<String>,
}

impl SourceError {
    pub(crate) fn new(code: ErrorCode, src: &str, offset: usize, len: usize) -> Self {
        SourceError {
            code,
            offset,
            len,
            detail: None,
            src: src.to_owned(),
            span: (offset, len).into(),
            label: code.as_str().to_owned(),
            help: code.help().map(str::to_owned),
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        self.label = detail.clone();
        self.detail = Some(detail);
        self
    }

    pub fn source_text(&self) -> &str {
        &self.src
    }

    pub fn span(&self) -> SourceSpan {
        self.span
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_ref().map(|d| format!(": {}", d)).unwrap_or_default()
}

/// Failure of either compiler.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum CompileError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(SourceError),

    #[error("out of memory while compiling")]
    #[diagnostic(code(ftp_listing::out_of_memory))]
    OutOfMemory,
}

impl CompileError {
    pub(crate) fn at(code: ErrorCode, src: &str, offset: usize, len: usize) -> Self {
        CompileError::Source(SourceError::new(code, src, offset, len))
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            CompileError::Source(e) => Some(e.code),
            CompileError::OutOfMemory => None,
        }
    }

    pub fn offset(&self) -> Option<usize> {
        match self {
            CompileError::Source(e) => Some(e.offset),
            CompileError::OutOfMemory => None,
        }
    }
}

impl From<OutOfMemory> for CompileError {
    fn from(_: OutOfMemory) -> Self {
        CompileError::OutOfMemory
    }
}

/// Why a listing could not be turned into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ListingError {
    /// No rule recognizes the text at `offset`; the caller may try another rule set.
    #[error("no rule matches line {line} of the listing (offset {offset})")]
    NoRuleMatched { offset: usize, line: usize },

    #[error("out of memory while interpreting the listing")]
    OutOfMemory,
}

impl From<OutOfMemory> for ListingError {
    fn from(_: OutOfMemory) -> Self {
        ListingError::OutOfMemory
    }
}
