use std::fmt;

/// Column a parameter refers to: one of the three built-in flags or a declared column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRef {
    IsDir,
    IsHidden,
    IsLink,
    Declared(usize),
}

impl ColumnRef {
    pub(crate) fn builtin(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("is_dir") {
            Some(ColumnRef::IsDir)
        } else if name.eq_ignore_ascii_case("is_hidden") {
            Some(ColumnRef::IsHidden)
        } else if name.eq_ignore_ascii_case("is_link") {
            Some(ColumnRef::IsLink)
        } else {
            None
        }
    }

    pub fn declared(&self) -> Option<usize> {
        match self {
            ColumnRef::Declared(i) => Some(*i),
            _ => None,
        }
    }
}

/// Values the interpreter maintains and rules may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateVar {
    FirstNonemptyLine,
    LastNonemptyLine,
    NextChar,
    NextWord,
    RestOfLine,
}

impl StateVar {
    pub fn operand_type(&self) -> OperandType {
        match self {
            StateVar::FirstNonemptyLine | StateVar::LastNonemptyLine => OperandType::Boolean,
            StateVar::NextChar | StateVar::NextWord | StateVar::RestOfLine => OperandType::String,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            StateVar::FirstNonemptyLine => "first_nonempty_line",
            StateVar::LastNonemptyLine => "last_nonempty_line",
            StateVar::NextChar => "next_char",
            StateVar::NextWord => "next_word",
            StateVar::RestOfLine => "rest_of_line",
        }
    }
}

/// Keyword in parameter position: either a boolean literal or a state variable.
pub(crate) enum Keyword {
    Bool(bool),
    State(StateVar),
}

pub(crate) fn find_keyword(name: &str) -> Option<Keyword> {
    const NAMES: [(&str, Keyword); 7] = [
        ("false", Keyword::Bool(false)),
        ("true", Keyword::Bool(true)),
        ("first_nonempty_line", Keyword::State(StateVar::FirstNonemptyLine)),
        ("last_nonempty_line", Keyword::State(StateVar::LastNonemptyLine)),
        ("next_char", Keyword::State(StateVar::NextChar)),
        ("next_word", Keyword::State(StateVar::NextWord)),
        ("rest_of_line", Keyword::State(StateVar::RestOfLine)),
    ];
    NAMES
        .into_iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, k)| k)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `==`, same operand types, strings compared case-sensitively
    Equal,
    /// `!=`
    NotEqual,
    /// `eq`, case-insensitive string equality
    StrEqual,
    /// `not_eq`
    StrNotEqual,
    /// `in`, left is a substring of right
    In,
    /// `not_in`
    NotIn,
    /// `end_with`, left ends with right
    EndWith,
    /// `not_end_with`
    NotEndWith,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::StrEqual => "eq",
            BinaryOp::StrNotEqual => "not_eq",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not_in",
            BinaryOp::EndWith => "end_with",
            BinaryOp::NotEndWith => "not_end_with",
        }
    }

    /// Operators that only make sense on two strings.
    pub fn is_string_op(&self) -> bool {
        !matches!(self, BinaryOp::Equal | BinaryOp::NotEqual)
    }
}

/// Recognize an operator at the start of `s`, returning it with its length in bytes.
///
/// Keywords are matched as prefixes, in the order `==`, `!=`, `in`, `eq`, `not_eq`,
/// `not_in`, `end_with`, `not_end_with`.
pub(crate) fn parse_binary_operator(s: &str) -> Option<(BinaryOp, usize)> {
    const OPS: [(&str, BinaryOp); 8] = [
        ("==", BinaryOp::Equal),
        ("!=", BinaryOp::NotEqual),
        ("in", BinaryOp::In),
        ("eq", BinaryOp::StrEqual),
        ("not_eq", BinaryOp::StrNotEqual),
        ("not_in", BinaryOp::NotIn),
        ("end_with", BinaryOp::EndWith),
        ("not_end_with", BinaryOp::NotEndWith),
    ];
    OPS.into_iter().find_map(|(text, op)| {
        let head = s.get(..text.len())?;
        head.eq_ignore_ascii_case(text).then_some((op, text.len()))
    })
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function argument. Expressions own their operands, so parameters form a strict tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Column(ColumnRef),
    Bool(bool),
    Str(String),
    Number(i64),
    State(StateVar),
    Expr {
        op: BinaryOp,
        left: Box<Param>,
        right: Box<Param>,
    },
}

impl Param {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Param::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_column(&self) -> Option<ColumnRef> {
        match self {
            Param::Column(c) => Some(*c),
            _ => None,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Column(ColumnRef::IsDir) => f.write_str("<is_dir>"),
            Param::Column(ColumnRef::IsHidden) => f.write_str("<is_hidden>"),
            Param::Column(ColumnRef::IsLink) => f.write_str("<is_link>"),
            Param::Column(ColumnRef::Declared(i)) => write!(f, "<#{}>", i),
            Param::Bool(b) => write!(f, "{}", b),
            Param::Str(s) => write!(f, "{:?}", s),
            Param::Number(n) => write!(f, "{}", n),
            Param::State(v) => f.write_str(v.as_str()),
            Param::Expr { op, left, right } => write!(f, "{} {} {}", left, op, right),
        }
    }
}

/// Value type of an operand inside an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandType {
    Boolean,
    String,
    Number,
    Date,
    Time,
}

/// Type of a whole function argument, distinguishing writable columns from plain values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Boolean,
    String,
    Number,
    ColumnBoolean,
    ColumnString,
    ColumnNumber,
    ColumnDate,
    ColumnTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_are_matched_as_case_insensitive_prefixes() {
        assert_eq!(parse_binary_operator("== x"), Some((BinaryOp::Equal, 2)));
        assert_eq!(parse_binary_operator("IN\"x\""), Some((BinaryOp::In, 2)));
        assert_eq!(parse_binary_operator("Not_End_With "), Some((BinaryOp::NotEndWith, 12)));
        assert_eq!(parse_binary_operator("end_wit"), None);
        assert_eq!(parse_binary_operator(")"), None);
    }

    #[test]
    fn expressions_render_infix() {
        let p = Param::Expr {
            op: BinaryOp::StrEqual,
            left: Box::new(Param::State(StateVar::NextWord)),
            right: Box::new(Param::Str("total".into())),
        };
        assert_eq!(p.to_string(), "next_word eq \"total\"");
    }
}
