use std::fmt;

use itertools::Itertools;

use crate::column::Columns;
use crate::rules::param::Param;

macro_rules! functions {
    ($($variant:ident => $name:literal,)*) => {
        /// Every operation a rule can invoke.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum FunctionKind {
            $($variant,)*
        }

        impl FunctionKind {
            pub const ALL: &'static [FunctionKind] = &[$(FunctionKind::$variant,)*];

            pub fn name(&self) -> &'static str {
                match self {
                    $(FunctionKind::$variant => $name,)*
                }
            }
        }
    };
}

functions! {
    SkipWhiteSpaces => "skip_white_spaces",
    WhiteSpaces => "white_spaces",
    WhiteSpacesAndLineEnds => "white_spaces_and_line_ends",
    RestOfLine => "rest_of_line",
    Word => "word",
    Number => "number",
    PositiveNumber => "positive_number",
    NumberWithSeparators => "number_with_separators",
    Month3 => "month_3",
    MonthTxt => "month_txt",
    Month => "month",
    Day => "day",
    Year => "year",
    Time => "time",
    YearOrTime => "year_or_time",
    All => "all",
    AllTo => "all_to",
    AllUpTo => "all_up_to",
    UnixLink => "unix_link",
    UnixDevice => "unix_device",
    If => "if",
    Assign => "assign",
    CutWhiteSpacesEnd => "cut_white_spaces_end",
    CutWhiteSpacesStart => "cut_white_spaces_start",
    CutWhiteSpaces => "cut_white_spaces",
    Back => "back",
    AddStringToColumn => "add_string_to_column",
    CutEndOfString => "cut_end_of_string",
    SkipToNumber => "skip_to_number",
}

impl FunctionKind {
    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub kind: FunctionKind,
    pub params: Vec<Param>,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.params.iter().join(", "))
    }
}

/// Functions that together recognize one listing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub functions: Vec<Function>,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "* {};", self.functions.iter().join(", "))
    }
}

/// Compiled rules, tried top to bottom. Immutable and freely shared between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    pub(crate) rules: Vec<Rule>,
    pub(crate) columns: Columns,
}

impl RuleSet {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rules.iter().join("\n"))
    }
}
