//! DSL parser for authorization models.
//!
//! Parses the schema 1.0 model language into [`AuthorizationModel`] structures.
//!
//! Example DSL:
//! ```text
//! type user
//!
//! type document
//!   relations
//!     define parent as self
//!     define owner as self
//!     define editor as self or owner
//!     define viewer as self or editor or viewer from parent
//!     define blocked as self
//!     define can_view as viewer but not blocked
//! ```
//!
//! Operators are left-associative and share one precedence level, so
//! `a or b but not c` reads as `(a or b) but not c`. Parentheses group.

use std::collections::BTreeMap;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace1, satisfy, space0, space1},
    combinator::{all_consuming, cut, map, not, opt, peek, recognize, value},
    error::{context, ContextError, ErrorKind, ParseError, VerboseError, VerboseErrorKind},
    multi::{many0, many1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::{AuthorizationModel, Rewrite, TypeDefinition};

/// Parser error type with context for better error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub message: String,
    /// Byte offset into the input.
    pub position: Option<usize>,
    /// 1-based line number.
    pub line: Option<usize>,
}

impl ParserError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
            line: None,
        }
    }

    pub fn with_position(message: impl Into<String>, input: &str, position: usize) -> Self {
        let line = input[..position].matches('\n').count() + 1;
        Self {
            message: message.into(),
            position: Some(position),
            line: Some(line),
        }
    }
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.position) {
            (Some(line), Some(pos)) => write!(f, "{} at line {} (offset {})", self.message, line, pos),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParserError {}

/// Result type for parser operations.
pub type ParserResult<T> = Result<T, ParserError>;

// ============ Helper Parsers ============

/// Parse a comment (# to end of line)
fn comment<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, (), E> {
    value((), pair(char('#'), take_while(|c| c != '\n' && c != '\r')))(input)
}

/// Parse whitespace including comments and newlines
fn ws<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, (), E> {
    value((), many0(alt((value((), multispace1), comment))))(input)
}

const RESERVED_KEYWORDS: &[&str] = &[
    "model",
    "schema",
    "type",
    "relations",
    "define",
    "as",
    "self",
    "or",
    "and",
    "but",
    "not",
    "from",
];

fn is_reserved(s: &str) -> bool {
    RESERVED_KEYWORDS.contains(&s)
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parse an identifier (not a reserved keyword)
fn identifier<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, &'a str, E> {
    let (rest, id) = recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_identifier_char),
    ))(input)?;

    if is_reserved(id) {
        return Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Tag)));
    }

    Ok((rest, id))
}

/// Match `word` only when it is not the prefix of a longer identifier.
fn keyword<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    word: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str, E> {
    terminated(tag(word), not(peek(satisfy(is_identifier_char))))
}

// ============ Rewrite Expressions ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Or,
    And,
    ButNot,
}

fn operator<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Operator, E> {
    alt((
        value(Operator::Or, keyword("or")),
        value(Operator::And, keyword("and")),
        value(
            Operator::ButNot,
            tuple((keyword("but"), space1, keyword("not"))),
        ),
    ))(input)
}

/// `relation from tupleset`
fn tuple_to_userset<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Rewrite, E> {
    map(
        tuple((identifier, space1, keyword("from"), space1, cut(identifier))),
        |(computed, _, _, _, tupleset)| Rewrite::tuple_to_userset(tupleset, computed),
    )(input)
}

fn parenthesized<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Rewrite, E> {
    delimited(
        pair(char('('), space0),
        cut(expression),
        cut(context("expected ')'", pair(space0, char(')')))),
    )(input)
}

fn term<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Rewrite, E> {
    context(
        "expected a rewrite term",
        alt((
            value(Rewrite::This, keyword("self")),
            parenthesized,
            tuple_to_userset,
            map(identifier, Rewrite::computed),
        )),
    )(input)
}

fn combine(lhs: Rewrite, op: Operator, rhs: Rewrite) -> Rewrite {
    match (op, lhs) {
        (Operator::Or, Rewrite::Union { mut children }) => {
            children.push(rhs);
            Rewrite::Union { children }
        }
        (Operator::Or, lhs) => Rewrite::union(vec![lhs, rhs]),
        (Operator::And, Rewrite::Intersection { mut children }) => {
            children.push(rhs);
            Rewrite::Intersection { children }
        }
        (Operator::And, lhs) => Rewrite::intersection(vec![lhs, rhs]),
        (Operator::ButNot, lhs) => Rewrite::difference(lhs, rhs),
    }
}

/// Left fold of terms joined by operators on a single line.
fn expression<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Rewrite, E> {
    let (mut rest, mut acc) = term(input)?;
    loop {
        let (after_op, op) = match preceded(space1, operator::<E>)(rest) {
            Ok(parsed) => parsed,
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        };
        let (after_term, rhs) = cut(preceded(space1, term))(after_op)?;
        acc = combine(acc, op, rhs);
        rest = after_term;
    }
    Ok((rest, acc))
}

// ============ Definitions ============

/// `define name as expression`
fn relation_definition<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, (&'a str, Rewrite), E> {
    let (input, _) = keyword("define")(input)?;
    let (input, _) = cut(space1)(input)?;
    let (input, name) = cut(context("expected a relation name", identifier))(input)?;
    let (input, _) = cut(tuple((space1, context("expected 'as'", keyword("as")), space1)))(input)?;
    let (input, rewrite) = cut(context("expected a rewrite expression", expression))(input)?;
    Ok((input, (name, rewrite)))
}

fn type_definition<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, TypeDefinition, E> {
    let (input, _) = context("expected a type definition", keyword("type"))(input)?;
    let (input, _) = cut(space1)(input)?;
    let (mut input, type_name) = cut(context("expected a type name", identifier))(input)?;

    let mut relations = BTreeMap::new();
    if let (rest, Some(_)) = opt(preceded(ws, keyword("relations")))(input)? {
        let (rest, definitions) = cut(context(
            "expected a relation definition",
            many1(preceded(ws, located(relation_definition))),
        ))(rest)?;
        for (at, (name, rewrite)) in definitions {
            if relations.insert(name.to_string(), rewrite).is_some() {
                return Err(nom::Err::Failure(E::add_context(
                    at,
                    "duplicate relation definition",
                    E::from_error_kind(at, ErrorKind::Verify),
                )));
            }
        }
        input = rest;
    }

    Ok((
        input,
        TypeDefinition {
            type_name: type_name.to_string(),
            relations,
        },
    ))
}

/// Pair a parser's output with the input it started at.
fn located<'a, O, E, F>(mut parser: F) -> impl FnMut(&'a str) -> IResult<&'a str, (&'a str, O), E>
where
    E: ParseError<&'a str>,
    F: FnMut(&'a str) -> IResult<&'a str, O, E>,
{
    move |input: &'a str| {
        let (rest, output) = parser(input)?;
        Ok((rest, (input, output)))
    }
}

/// Optional `model` / `schema 1.0` header.
fn header<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, &'a str, E> {
    preceded(
        tuple((keyword("model"), ws, keyword("schema"), space1)),
        cut(context(
            "expected a schema version",
            take_while1(|c: char| c.is_ascii_digit() || c == '.'),
        )),
    )(input)
}

fn model<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, AuthorizationModel, E> {
    let (input, _) = ws(input)?;
    let (input, version) = opt(terminated(header, ws))(input)?;
    let (input, type_definitions) = many1(terminated(type_definition, ws))(input)?;

    let mut model = AuthorizationModel::new(type_definitions);
    if let Some(version) = version {
        model.schema_version = version.to_string();
    }
    Ok((input, model))
}

/// Parses a model written in the DSL.
///
/// Produces a syntactically valid model only; semantic checks live in
/// [`crate::validation::ModelValidator`].
pub fn parse(input: &str) -> ParserResult<AuthorizationModel> {
    match all_consuming(model::<VerboseError<&str>>)(input) {
        Ok((_, model)) => Ok(model),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(to_parser_error(input, e)),
        Err(nom::Err::Incomplete(_)) => Err(ParserError::new("unexpected end of input")),
    }
}

fn to_parser_error(input: &str, error: VerboseError<&str>) -> ParserError {
    let message = error
        .errors
        .iter()
        .find_map(|(_, kind)| match kind {
            VerboseErrorKind::Context(ctx) => Some(ctx.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "invalid syntax".to_string());

    match error.errors.first() {
        Some((remaining, _)) => {
            ParserError::with_position(message, input, input.len() - remaining.len())
        }
        None => ParserError::new(message),
    }
}
