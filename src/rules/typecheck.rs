//! Static checks run while a rule is compiled: function signatures, operator operand types,
//! and whether a column is read before the rule wrote it.

use bitflags::bitflags;

use crate::column::{ColumnKind, Columns};
use crate::error::ErrorCode;
use crate::rules::function::{Function, FunctionKind};
use crate::rules::param::{BinaryOp, ColumnRef, OperandType, Param, ParamType};

bitflags! {
    /// Which parts of a column the current rule has written so far.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct Assigned: u8 {
        const DAY = 1;
        const MONTH = 1 << 1;
        const YEAR = 1 << 2;
        const VALUE = 1 << 3;

        const FULL_DATE = Self::DAY.bits() | Self::MONTH.bits() | Self::YEAR.bits();
    }
}

/// Per-rule record of written columns, reset at every `*`.
#[derive(Debug)]
pub(crate) struct AssignedColumns {
    flags: Vec<Assigned>,
}

impl AssignedColumns {
    pub(crate) fn new(columns: &Columns) -> Self {
        AssignedColumns {
            flags: vec![Assigned::empty(); columns.len()],
        }
    }

    pub(crate) fn reset(&mut self) {
        self.flags.iter_mut().for_each(|f| *f = Assigned::empty());
    }

    fn mark(&mut self, column: ColumnRef, parts: Assigned) {
        if let Some(flags) = column.declared().and_then(|i| self.flags.get_mut(i)) {
            flags.insert(parts);
        }
    }

    /// Built-in flags are always readable; a date needs day, month and year.
    fn readable(&self, columns: &Columns, column: ColumnRef) -> bool {
        let Some(index) = column.declared() else {
            return true;
        };
        let flags = self.flags.get(index).copied().unwrap_or_default();
        match columns.get(index).map(|c| c.kind) {
            Some(ColumnKind::Date | ColumnKind::GeneralDate) => flags.contains(Assigned::FULL_DATE),
            _ => !flags.is_empty(),
        }
    }
}

/// Where a rejected function went wrong: the code and, when one parameter is to blame, its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TypeError {
    pub(crate) code: ErrorCode,
    pub(crate) param: Option<usize>,
}

impl TypeError {
    fn whole(code: ErrorCode) -> Self {
        TypeError { code, param: None }
    }

    fn at(code: ErrorCode, param: usize) -> Self {
        TypeError {
            code,
            param: Some(param),
        }
    }
}

fn column_operand(columns: &Columns, column: ColumnRef) -> Option<OperandType> {
    match column {
        ColumnRef::Declared(i) => columns.get(i).and_then(|c| c.kind.operand_type()),
        _ => Some(OperandType::Boolean),
    }
}

/// Type of a leaf operand; expressions cannot appear as operands.
pub(crate) fn operand_type(param: &Param, columns: &Columns) -> Option<OperandType> {
    match param {
        Param::Column(c) => column_operand(columns, *c),
        Param::Bool(_) => Some(OperandType::Boolean),
        Param::Str(_) => Some(OperandType::String),
        Param::Number(_) => Some(OperandType::Number),
        Param::State(v) => Some(v.operand_type()),
        Param::Expr { .. } => None,
    }
}

pub(crate) fn param_type(param: &Param, columns: &Columns) -> Option<ParamType> {
    match param {
        Param::Expr { .. } => Some(ParamType::Boolean),
        Param::Column(c) => Some(match column_operand(columns, *c)? {
            OperandType::Boolean => ParamType::ColumnBoolean,
            OperandType::String => ParamType::ColumnString,
            OperandType::Number => ParamType::ColumnNumber,
            OperandType::Date => ParamType::ColumnDate,
            OperandType::Time => ParamType::ColumnTime,
        }),
        other => Some(match operand_type(other, columns)? {
            OperandType::Boolean => ParamType::Boolean,
            OperandType::String => ParamType::String,
            OperandType::Number => ParamType::Number,
            OperandType::Date | OperandType::Time => return None,
        }),
    }
}

/// Check a freshly completed `left op right` expression.
pub(crate) fn check_expression(
    op: BinaryOp,
    left: &Param,
    right: &Param,
    columns: &Columns,
    assigned: &AssignedColumns,
) -> Result<(), ErrorCode> {
    let types_ok = match (operand_type(left, columns), operand_type(right, columns)) {
        (Some(l), Some(r)) if op.is_string_op() => {
            l == OperandType::String && r == OperandType::String
        }
        (Some(l), Some(r)) => l == r,
        _ => false,
    };
    if !types_ok {
        return Err(ErrorCode::OperandTypeMismatch);
    }
    for side in [left, right] {
        if let Param::Column(c) = side {
            if !assigned.readable(columns, *c) {
                return Err(ErrorCode::BadColumnUse);
            }
        }
    }
    Ok(())
}

fn is_month3_list(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 47 && (0..11).all(|i| bytes[i * 4 + 3] <= b' ')
}

fn is_month_txt_list(s: &str) -> bool {
    let names: Vec<&str> = s.split(' ').collect();
    names.len() == 12 && names.iter().all(|n| !n.is_empty())
}

/// Check a function's parameters against its signature and record the columns it writes.
pub(crate) fn check_function(
    function: &Function,
    columns: &Columns,
    assigned: &mut AssignedColumns,
) -> Result<(), TypeError> {
    use ParamType::*;

    let params = &function.params;
    let mut types = Vec::with_capacity(params.len());
    for p in params {
        match param_type(p, columns) {
            Some(t) => types.push(t),
            None => return Err(TypeError::whole(ErrorCode::BadParameters)),
        }
    }
    let column = |i: usize| params.get(i).and_then(Param::as_column);
    let bad = || Err(TypeError::whole(ErrorCode::BadParameters));

    match function.kind {
        FunctionKind::SkipWhiteSpaces
        | FunctionKind::SkipToNumber
        | FunctionKind::WhiteSpacesAndLineEnds => {
            if !types.is_empty() {
                return bad();
            }
        }
        FunctionKind::WhiteSpaces | FunctionKind::Back => match types.as_slice() {
            [] if function.kind == FunctionKind::WhiteSpaces => {}
            [Number] => {}
            _ => return bad(),
        },
        FunctionKind::RestOfLine | FunctionKind::Word => match types.as_slice() {
            [] => {}
            [ColumnString] => mark_value(assigned, column(0)),
            _ => return bad(),
        },
        FunctionKind::Number | FunctionKind::PositiveNumber => match types.as_slice() {
            [ColumnNumber] => mark_value(assigned, column(0)),
            _ => return bad(),
        },
        FunctionKind::NumberWithSeparators => match types.as_slice() {
            [ColumnNumber, String] => mark_value(assigned, column(0)),
            _ => return bad(),
        },
        FunctionKind::Month3 | FunctionKind::MonthTxt => {
            match types.as_slice() {
                [ColumnDate] => {}
                [ColumnDate, String] => {
                    let Some(list) = params[1].as_str() else {
                        return bad();
                    };
                    let (valid, code) = if function.kind == FunctionKind::Month3 {
                        (is_month3_list(list), ErrorCode::BadMonth3List)
                    } else {
                        (is_month_txt_list(list), ErrorCode::BadMonthTxtList)
                    };
                    if !valid {
                        return Err(TypeError::at(code, 1));
                    }
                }
                _ => return bad(),
            }
            mark(assigned, column(0), Assigned::MONTH);
        }
        FunctionKind::Month | FunctionKind::Day | FunctionKind::Year => match types.as_slice() {
            [ColumnDate] => {
                let part = match function.kind {
                    FunctionKind::Day => Assigned::DAY,
                    FunctionKind::Year => Assigned::YEAR,
                    _ => Assigned::MONTH,
                };
                mark(assigned, column(0), part);
            }
            _ => return bad(),
        },
        FunctionKind::Time => match types.as_slice() {
            [ColumnTime] => mark_value(assigned, column(0)),
            _ => return bad(),
        },
        // the time column stays unassigned: only a year may be present
        FunctionKind::YearOrTime => match types.as_slice() {
            [ColumnDate, ColumnTime] => mark(assigned, column(0), Assigned::YEAR),
            _ => return bad(),
        },
        FunctionKind::All => match types.as_slice() {
            [Number] => {}
            [ColumnString, Number] => mark_value(assigned, column(0)),
            _ => return bad(),
        },
        FunctionKind::AllTo => match types.as_slice() {
            [String] => {}
            [ColumnString, String] => mark_value(assigned, column(0)),
            _ => return bad(),
        },
        FunctionKind::AllUpTo => match types.as_slice() {
            [ColumnString, String] => mark_value(assigned, column(0)),
            _ => return bad(),
        },
        // the link target may legitimately stay empty
        FunctionKind::UnixLink => match types.as_slice() {
            [ColumnBoolean, ColumnString, ColumnString]
                if column(0) == Some(ColumnRef::IsDir)
                    && column(1) == Some(ColumnRef::Declared(columns.name_index())) =>
            {
                mark_value(assigned, column(1))
            }
            _ => return bad(),
        },
        FunctionKind::UnixDevice => match types.as_slice() {
            [ColumnString] => mark_value(assigned, column(0)),
            _ => return bad(),
        },
        FunctionKind::If => match types.as_slice() {
            [Boolean] => {}
            [ColumnBoolean] => require_readable(assigned, columns, column(0), 0)?,
            _ => return bad(),
        },
        FunctionKind::Assign => {
            let (target, value) = match types.as_slice() {
                [t, v] => (*t, *v),
                _ => return bad(),
            };
            let ok = match target {
                ColumnBoolean => matches!(value, ColumnBoolean | Boolean),
                ColumnString => matches!(value, ColumnString | String),
                ColumnNumber => matches!(value, ColumnNumber | Number),
                ColumnDate | ColumnTime => value == target,
                _ => false,
            };
            if !ok {
                return bad();
            }
            require_readable(assigned, columns, column(1), 1)?;
            let parts = match target {
                ColumnDate => Assigned::FULL_DATE,
                _ => Assigned::VALUE,
            };
            mark(assigned, column(0), parts);
        }
        FunctionKind::CutWhiteSpacesEnd
        | FunctionKind::CutWhiteSpacesStart
        | FunctionKind::CutWhiteSpaces => match types.as_slice() {
            [ColumnString] => require_readable(assigned, columns, column(0), 0)?,
            _ => return bad(),
        },
        FunctionKind::AddStringToColumn => match types.as_slice() {
            [ColumnString, ColumnString | String] => {
                require_readable(assigned, columns, column(0), 0)?;
                require_readable(assigned, columns, column(1), 1)?;
            }
            _ => return bad(),
        },
        FunctionKind::CutEndOfString => match types.as_slice() {
            [ColumnString, Number] => require_readable(assigned, columns, column(0), 0)?,
            _ => return bad(),
        },
    }
    Ok(())
}

fn mark(assigned: &mut AssignedColumns, column: Option<ColumnRef>, parts: Assigned) {
    if let Some(c) = column {
        assigned.mark(c, parts);
    }
}

fn mark_value(assigned: &mut AssignedColumns, column: Option<ColumnRef>) {
    mark(assigned, column, Assigned::VALUE)
}

fn require_readable(
    assigned: &AssignedColumns,
    columns: &Columns,
    column: Option<ColumnRef>,
    param: usize,
) -> Result<(), TypeError> {
    match column {
        Some(c) if !assigned.readable(columns, c) => {
            Err(TypeError::at(ErrorCode::BadColumnUse, param))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_lists() {
        assert!(is_month3_list("jan feb mar apr may jun jul aug sep oct nov dec"));
        assert!(!is_month3_list("jan feb mar apr may jun jul aug sep oct nov"));
        assert!(!is_month3_list("jan,feb,mar,apr,may,jun,jul,aug,sep,oct,nov,dec"));
        assert!(is_month_txt_list("I II III IV V VI VII VIII IX X XI XII"));
        assert!(!is_month_txt_list("I II III IV V VI VII VIII IX X XI XII "));
        assert!(!is_month_txt_list("I II  IV V VI VII VIII IX X XI XII"));
    }
}
