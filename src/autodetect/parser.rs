use pest::error::{Error, ErrorVariant, InputLocation};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc::*, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

use crate::autodetect::{Call, CallKind, Condition};
use crate::error::{CompileError, ErrorCode, SourceError};
use crate::rules::parse_string_literal;
use crate::search::{SearchError, SearchProvider};

#[derive(Parser)]
#[grammar = "autodetect/condition.pest"]
struct ConditionParser;

type Result<T> = std::result::Result<T, CompileError>;

/// Turns the parse tree into a [`Condition`], compiling each call's pattern with `search`.
pub(crate) struct ConditionBuilder<'s, 'p> {
    src: &'s str,
    search: &'p dyn SearchProvider,
}

impl<'s, 'p> ConditionBuilder<'s, 'p> {
    pub(crate) fn new(src: &'s str, search: &'p dyn SearchProvider) -> Self {
        ConditionBuilder { src, search }
    }

    pub(crate) fn build(&self) -> Result<Condition> {
        let mut pairs = ConditionParser::parse(Rule::condition, self.src)
            .map_err(|e| syntax_error(&e, self.src))?;
        let expr = pairs
            .next()
            .and_then(|condition| condition.into_inner().find(|p| p.as_rule() == Rule::expr));
        match expr {
            Some(expr) => self.expr(expr),
            None => Ok(Condition::AlwaysTrue),
        }
    }

    fn expr(&self, pair: Pair<'s, Rule>) -> Result<Condition> {
        let pratt = PrattParser::new()
            .op(Op::infix(Rule::or, Left))
            .op(Op::infix(Rule::and, Left))
            .op(Op::prefix(Rule::neg));

        pratt
            .map_primary(|primary| self.primary(primary))
            .map_infix(infix)
            .map_prefix(prefix)
            .parse(pair.into_inner())
    }

    fn primary(&self, pair: Pair<'s, Rule>) -> Result<Condition> {
        match pair.as_rule() {
            Rule::call => self.call(pair),
            Rule::group => match pair.clone().into_inner().find(|p| p.as_rule() == Rule::expr) {
                Some(inner) => self.expr(inner),
                None => Err(self.unexpected(&pair)),
            },
            _ => Err(self.unexpected(&pair)),
        }
    }

    fn call(&self, pair: Pair<'s, Rule>) -> Result<Condition> {
        let mut kind = None;
        let mut literal = None;
        for part in pair.clone().into_inner() {
            match part.as_rule() {
                Rule::name => kind = CallKind::from_name(part.as_str()),
                Rule::string => literal = Some(part.as_span().start()),
                _ => {}
            }
        }
        let (Some(kind), Some(quote)) = (kind, literal) else {
            return Err(self.unexpected(&pair));
        };

        let (pattern, after) = parse_string_literal(self.src, quote)?;
        if pattern.is_empty() {
            return Ok(Condition::AlwaysTrue);
        }
        let searcher = if kind.is_regex() {
            self.search.regex(&pattern)
        } else {
            self.search.substring(&pattern)
        };
        let searcher = searcher.map_err(|e| match e {
            SearchError::OutOfMemory => CompileError::OutOfMemory,
            SearchError::Invalid(detail) => CompileError::Source(
                SourceError::new(ErrorCode::InvalidRegex, self.src, quote, after - quote)
                    .with_detail(detail),
            ),
        })?;
        Ok(Condition::Call(Call { kind, searcher }))
    }

    fn unexpected(&self, pair: &Pair<'s, Rule>) -> CompileError {
        let span = pair.as_span();
        CompileError::at(
            ErrorCode::UnexpectedSymbol,
            self.src,
            span.start(),
            span.end() - span.start(),
        )
    }
}

fn infix(lhs: Result<Condition>, op: Pair<'_, Rule>, rhs: Result<Condition>) -> Result<Condition> {
    match op.as_rule() {
        Rule::or => Ok(Condition::Or(Box::new(lhs?), Box::new(rhs?))),
        _ => Ok(Condition::And(Box::new(lhs?), Box::new(rhs?))),
    }
}

fn prefix(_op: Pair<'_, Rule>, rhs: Result<Condition>) -> Result<Condition> {
    Ok(Condition::Not(Box::new(rhs?)))
}

/// Map a pest failure to the error code for the token that was expected at its position.
fn syntax_error(err: &Error<Rule>, src: &str) -> CompileError {
    let pos = match err.location {
        InputLocation::Pos(pos) => pos,
        InputLocation::Span((start, _)) => start,
    };
    let expected: &[Rule] = match &err.variant {
        ErrorVariant::ParsingError { positives, .. } => positives,
        ErrorVariant::CustomError { .. } => &[],
    };
    let rest = src.get(pos..).unwrap_or_default();
    let here = |code: ErrorCode| {
        let len = rest.chars().next().map_or(0, char::len_utf8);
        CompileError::at(code, src, pos, len)
    };

    if expected.contains(&Rule::string) {
        if !rest.starts_with('"') {
            return here(ErrorCode::MissingStringParam);
        }
        return match parse_string_literal(src, pos) {
            Err(e) => e,
            Ok(_) => here(ErrorCode::MissingStringEnd),
        };
    }
    if expected.contains(&Rule::call_open) {
        return here(ErrorCode::MissingFunctionParams);
    }
    if expected.contains(&Rule::call_close) {
        return here(ErrorCode::MissingParenEnd);
    }

    // pest folds the alternatives tried at the start of an operand into the enclosing
    // rule, so a misspelled name is recognized from the text itself
    if rest.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        let word_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let word = &rest[..word_len];
        let known = ["or", "and", "not"]
            .iter()
            .any(|k| k.eq_ignore_ascii_case(word))
            || CallKind::from_name(word).is_some();
        if !known {
            return CompileError::at(ErrorCode::UnknownFunction, src, pos, word_len);
        }
    }
    if expected.contains(&Rule::rparen) {
        return here(ErrorCode::MissingRightParen);
    }
    here(ErrorCode::UnexpectedSymbol)
}
