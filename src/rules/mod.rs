//! The rule language: a rule set is a list of `* function(params), ...;` rules, compiled once
//! against a declared column set and then interpreted against any number of listings.

mod compiler;
pub mod function;
pub mod param;
pub(crate) mod typecheck;

pub use compiler::compile;
pub(crate) use compiler::parse_string_literal;
pub use function::{Function, FunctionKind, Rule, RuleSet};
pub use param::{BinaryOp, ColumnRef, OperandType, Param, ParamType, StateVar};

use crate::column::Columns;
use crate::error::CompileError;

impl RuleSet {
    pub fn compile(source: &str, columns: &Columns) -> Result<Self, CompileError> {
        compile(source, columns)
    }
}
