use crate::column::{ColumnKind, Columns};
use crate::error::{CompileError, ErrorCode};
use crate::rules::function::{Function, FunctionKind, Rule, RuleSet};
use crate::rules::param::{find_keyword, parse_binary_operator, ColumnRef, Keyword, Param};
use crate::rules::typecheck::{check_expression, check_function, AssignedColumns};
use crate::util::{try_push, OutOfMemory};

/// Compile a rule source against a declared column set.
///
/// ```text
/// # comment
/// * skip_white_spaces(), word(<name>), if(next_word eq "x");
/// ```
pub fn compile(source: &str, columns: &Columns) -> Result<RuleSet> {
    let mut compiler = Compiler {
        src: source,
        pos: 0,
        columns,
        assigned: AssignedColumns::new(columns),
    };
    let rules = compiler.rule_set()?;
    Ok(RuleSet {
        rules,
        columns: columns.clone(),
    })
}

struct Compiler<'a> {
    src: &'a str,
    pos: usize,
    columns: &'a Columns,
    assigned: AssignedColumns,
}

type Result<T> = std::result::Result<T, CompileError>;

impl<'a> Compiler<'a> {
    fn error(&self, code: ErrorCode, offset: usize, len: usize) -> CompileError {
        CompileError::at(code, self.src, offset, len)
    }

    /// Error pointing at the character under the cursor.
    fn error_here(&self, code: ErrorCode) -> CompileError {
        let len = self.src[self.pos..]
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(0);
        self.error(code, self.pos, len)
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Skip blanks, line ends and `#` comments. Returns false at end of source.
    fn skip_trivia(&mut self) -> bool {
        let bytes = self.src.as_bytes();
        while let Some(&b) = bytes.get(self.pos) {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'#' => {
                    while let Some(&c) = bytes.get(self.pos) {
                        if c == b'\r' || c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => return true,
            }
        }
        false
    }

    fn identifier(&mut self, missing: ErrorCode) -> Result<&'a str> {
        let bytes = self.src.as_bytes();
        let start = self.pos;
        match bytes.get(self.pos) {
            Some(b) if b.is_ascii_alphabetic() || *b == b'_' => self.pos += 1,
            _ => return Err(self.error_here(missing)),
        }
        while matches!(bytes.get(self.pos), Some(b) if b.is_ascii_alphanumeric() || *b == b'_') {
            self.pos += 1;
        }
        Ok(&self.src[start..self.pos])
    }

    fn rule_set(&mut self) -> Result<Vec<Rule>> {
        let mut rules = Vec::new();
        while self.skip_trivia() {
            if self.peek() != Some(b'*') {
                return Err(self.error_here(ErrorCode::UnexpectedSymbol));
            }
            self.pos += 1;
            self.assigned.reset();
            let rule = self.rule()?;
            try_push(&mut rules, rule)?;
        }
        if rules.is_empty() {
            return Err(self.error(ErrorCode::EmptyRuleSet, self.pos, 0));
        }
        Ok(rules)
    }

    fn rule(&mut self) -> Result<Rule> {
        let mut functions = Vec::new();
        let mut function_expected = false;
        loop {
            if !self.skip_trivia() {
                return Err(self.error(ErrorCode::MissingRuleEnd, self.pos, 0));
            }
            if self.peek() == Some(b';') {
                if function_expected {
                    return Err(self.error_here(ErrorCode::FunctionExpected));
                }
                self.pos += 1;
                return Ok(Rule { functions });
            }

            let name_start = self.pos;
            let name = self.identifier(ErrorCode::InvalidFunctionName)?;
            function_expected = false;
            let kind = FunctionKind::from_name(name)
                .ok_or_else(|| self.error(ErrorCode::UnknownFunction, name_start, name.len()))?;

            if !self.skip_trivia() || self.peek() != Some(b'(') {
                return Err(self.error(ErrorCode::MissingFunctionParams, name_start, name.len()));
            }
            self.pos += 1;
            let function = self.function(kind, name_start)?;
            try_push(&mut functions, function)?;

            if !self.skip_trivia() {
                return Err(self.error(ErrorCode::MissingRuleEnd, self.pos, 0));
            }
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    function_expected = true;
                }
                Some(b';') => {}
                _ => return Err(self.error_here(ErrorCode::UnexpectedSymbol)),
            }
        }
    }

    /// Parameters of one call; the cursor sits just past `(`.
    fn function(&mut self, kind: FunctionKind, name_start: usize) -> Result<Function> {
        let mut params = Vec::new();
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut param_expected = false;
        loop {
            if !self.skip_trivia() {
                return Err(self.error(ErrorCode::MissingParenEnd, self.pos, 0));
            }
            match self.peek() {
                Some(b',') => return Err(self.error_here(ErrorCode::ParameterExpected)),
                Some(b')') if param_expected => {
                    return Err(self.error_here(ErrorCode::ParameterExpected))
                }
                Some(b')') => {
                    self.pos += 1;
                    let function = Function { kind, params };
                    return match check_function(&function, self.columns, &mut self.assigned) {
                        Ok(()) => Ok(function),
                        Err(e) => {
                            let (start, end) = e
                                .param
                                .and_then(|i| spans.get(i).copied())
                                .unwrap_or((name_start, self.pos));
                            Err(self.error(e.code, start, end - start))
                        }
                    };
                }
                _ => {}
            }

            let start = self.pos;
            let mut param = self.operand()?;
            let mut end = self.pos;
            if !self.skip_trivia() {
                return Err(self.error(ErrorCode::MissingParenEnd, self.pos, 0));
            }
            if let Some((op, len)) = parse_binary_operator(self.rest()) {
                self.pos += len;
                if !self.skip_trivia() {
                    return Err(self.error(ErrorCode::MissingParenEnd, self.pos, 0));
                }
                if matches!(self.peek(), Some(b')' | b',')) {
                    return Err(self.error_here(ErrorCode::RightOperandExpected));
                }
                let right = self.operand()?;
                end = self.pos;
                check_expression(op, &param, &right, self.columns, &self.assigned)
                    .map_err(|code| self.error(code, start, end - start))?;
                param = Param::Expr {
                    op,
                    left: Box::new(param),
                    right: Box::new(right),
                };
                if !self.skip_trivia() {
                    return Err(self.error(ErrorCode::MissingParenEnd, self.pos, 0));
                }
                if let Some((_, len)) = parse_binary_operator(self.rest()) {
                    return Err(self.error(ErrorCode::UnsupportedExpression, self.pos, len));
                }
            }
            try_push(&mut spans, (start, end))?;
            try_push(&mut params, param)?;

            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    param_expected = true;
                }
                Some(b')') => param_expected = false,
                _ => return Err(self.error_here(ErrorCode::UnexpectedSymbolOrOperator)),
            }
        }
    }

    fn operand(&mut self) -> Result<Param> {
        match self.peek() {
            Some(b'<') => self.column().map(Param::Column),
            Some(b'"') => self.string().map(Param::Str),
            Some(b'0'..=b'9' | b'+' | b'-') => self.number().map(Param::Number),
            _ => {
                let start = self.pos;
                let name = self.identifier(ErrorCode::InvalidStateVarOrBool)?;
                match find_keyword(name) {
                    Some(Keyword::Bool(b)) => Ok(Param::Bool(b)),
                    Some(Keyword::State(v)) => Ok(Param::State(v)),
                    None => Err(self.error(ErrorCode::UnknownStateVar, start, name.len())),
                }
            }
        }
    }

    fn column(&mut self) -> Result<ColumnRef> {
        self.pos += 1;
        if !self.skip_trivia() {
            return Err(self.error(ErrorCode::MissingColumnId, self.pos, 0));
        }
        let start = self.pos;
        let id = self.identifier(ErrorCode::InvalidColumnId)?;
        let column = match ColumnRef::builtin(id) {
            Some(c) => c,
            None => {
                let index = self
                    .columns
                    .find(id)
                    .ok_or_else(|| self.error(ErrorCode::UnknownColumn, start, id.len()))?;
                let generic = self
                    .columns
                    .get(index)
                    .is_some_and(|c| matches!(c.kind, ColumnKind::Extension | ColumnKind::FileType));
                if generic {
                    return Err(self.error(ErrorCode::GenericColumn, start, id.len()));
                }
                ColumnRef::Declared(index)
            }
        };
        if !self.skip_trivia() || self.peek() != Some(b'>') {
            return Err(self.error(ErrorCode::MissingColumnIdEnd, self.pos, 0));
        }
        self.pos += 1;
        Ok(column)
    }

    fn string(&mut self) -> Result<String> {
        let quote = self.pos;
        let (value, end) = parse_string_literal(self.src, quote)?;
        self.pos = end;
        Ok(value)
    }

    fn number(&mut self) -> Result<i64> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        if matches!(bytes.get(self.pos), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while matches!(bytes.get(self.pos), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if digits_start == self.pos {
            return Err(self.error(ErrorCode::InvalidNumber, start, self.pos - start));
        }
        // sign and digits together, so i64::MIN fits
        self.src[start..self.pos]
            .parse()
            .map_err(|_| self.error(ErrorCode::InvalidNumber, start, self.pos - start))
    }
}

/// Decode a `"..."` literal starting at the opening quote `quote`.
/// Returns the decoded text and the offset just past the closing quote.
///
/// Shared with the condition compiler, which uses the same escapes.
pub(crate) fn parse_string_literal(
    src: &str,
    quote: usize,
) -> std::result::Result<(String, usize), CompileError> {
    let bytes = src.as_bytes();
    let mut pos = quote + 1;
    let mut out = String::new();
    let mut chunk_start = pos;
    loop {
        match bytes.get(pos) {
            None | Some(b'\r' | b'\n') => {
                return Err(CompileError::at(ErrorCode::MissingStringEnd, src, quote, pos - quote))
            }
            Some(b'"') => break,
            Some(b'\\') if pos + 1 < bytes.len() => {
                let decoded = match bytes[pos + 1] {
                    b'"' => '"',
                    b'\\' => '\\',
                    b't' => '\t',
                    b'r' => '\r',
                    b'n' => '\n',
                    _ => {
                        let len = src[pos + 1..].chars().next().map_or(1, char::len_utf8) + 1;
                        return Err(CompileError::at(ErrorCode::UnknownEscape, src, pos, len));
                    }
                };
                out.try_reserve(pos - chunk_start + decoded.len_utf8())
                    .map_err(OutOfMemory::from)?;
                out.push_str(&src[chunk_start..pos]);
                out.push(decoded);
                pos += 2;
                chunk_start = pos;
            }
            Some(_) => pos += 1,
        }
    }
    out.try_reserve(pos - chunk_start)
        .map_err(OutOfMemory::from)?;
    out.push_str(&src[chunk_start..pos]);
    Ok((out, pos + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_literals_decode_escapes() {
        let src = r#""a\"b\\c\td" tail"#;
        let (s, end) = parse_string_literal(src, 0).unwrap();
        assert_eq!(s, "a\"b\\c\td");
        assert_eq!(&src[end..], " tail");
    }

    #[test]
    fn raw_line_end_leaves_string_unterminated() {
        let err = parse_string_literal("x \"abc\ndef\"", 2).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::MissingStringEnd));
        assert_eq!(err.offset(), Some(2));
    }
}
