//! Parser for small task documents made of titled sections of `key: value, value` pairs:
//!
//! ```text
//! model      kind: SEIR  beta: 0.5
//! parameters beta: 0.1, 0.9  gamma: 0.05, 0.5, log
//! ```
//! Lines starting with `//`, `#`, `%` or `;` are comments. A template lists the sections
//! and keys a caller expects; missing ones come back as `None`.
use crate::error::SweepError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, alphanumeric1, multispace0, space0},
    combinator::{map, recognize},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, separated_pair, terminated},
};
use std::collections::HashMap;
use std::fmt::Display;

pub type SectionMap = HashMap<String, Option<Vec<Value>>>;
pub type DocumentMap = HashMap<String, SectionMap>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl Value {
    pub fn as_string(&self) -> Option<&String> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// numeric value; integers written without a decimal point count too
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Value::Integer(i) if *i >= 0 => Some(*i as usize),
            _ => None,
        }
    }

    pub fn to_string_value(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Float(f) => f.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Boolean(b) => b.to_string(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Float(val) => write!(f, "{}", val),
            Value::Integer(val) => write!(f, "{}", val),
            Value::Boolean(val) => write!(f, "{}", val),
        }
    }
}

fn identifier(input: &str) -> IResult<&str, String> {
    let parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));
    map(parser, String::from).parse(input)
}

/// section title; trailing whitespace is dropped
pub(crate) fn parse_title(input: &str) -> IResult<&str, String> {
    let (input, title) = identifier(input)?;
    Ok((input.trim(), title))
}

pub(crate) fn parse_key(input: &str) -> IResult<&str, String> {
    identifier(input)
}

/// one value up to a comma, whitespace or semicolon; tried as integer, float, bool, string
pub(crate) fn parse_value(input: &str) -> IResult<&str, Value> {
    let raw = take_while1(|c: char| !matches!(c, ',' | ' ' | '\t' | '\n' | '\r' | ';'));
    map(raw, |s: &str| {
        if let Ok(val) = s.parse::<i64>() {
            Value::Integer(val)
        } else if let Ok(val) = s.parse::<f64>() {
            Value::Float(val)
        } else if let Ok(val) = s.parse::<bool>() {
            Value::Boolean(val)
        } else {
            Value::String(s.to_string())
        }
    })
    .parse(input)
}

pub(crate) fn parse_value_list(input: &str) -> IResult<&str, Vec<Value>> {
    let (input, _) = space0(input)?;
    let comma = delimited(space0, tag(","), space0);
    separated_list0(comma, parse_value).parse(input)
}

pub(crate) fn parse_key_value_pair(input: &str) -> IResult<&str, (String, Vec<Value>)> {
    let colon = delimited(space0, tag(":"), space0);
    let (input, result) = separated_pair(parse_key, colon, parse_value_list).parse(input)?;
    Ok((input.trim_start(), result))
}

pub(crate) fn parse_section(input: &str) -> IResult<&str, (String, Vec<(String, Vec<Value>)>)> {
    let (input, _) = space0(input)?;
    let (input, title) = parse_title(input)?;
    let (input, _) = multispace0(input)?;
    let (input, pairs) = many1(terminated(parse_key_value_pair, space0)).parse(input)?;
    Ok((input, (title, pairs)))
}

/// drops comment lines and blank lines
pub fn filter_comments(input: &str) -> String {
    input
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("//")
                && !trimmed.starts_with('#')
                && !trimmed.starts_with('%')
                && !trimmed.starts_with(';')
                && !trimmed.is_empty()
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

/// a section title with its pairs in document order
pub type Section = (String, Vec<(String, Vec<Value>)>);

/// Sections in document order. A section that appears twice keeps both entries here;
/// [`into_document`] merges them.
pub fn parse_document(input: &str) -> IResult<&str, Vec<Section>> {
    many1(delimited(multispace0, parse_section, multispace0)).parse(input)
}

/// Comment filtering plus [`parse_document`]; anything left unparsed is an error.
pub fn parse_sections(input: &str) -> Result<Vec<Section>, SweepError> {
    let filtered = filter_comments(input);
    if filtered.trim().is_empty() {
        return Ok(Vec::new());
    }
    let (remaining, sections) = parse_document(&filtered)
        .map_err(|e| SweepError::Config(format!("cannot parse task document: {:?}", e)))?;
    if !remaining.trim().is_empty() {
        return Err(SweepError::Config(format!(
            "failed to parse entire document, remaining: '{}'",
            remaining.trim()
        )));
    }
    Ok(sections)
}

/// With a template, every expected section and key is present in the result, `None`
/// where the document is silent.
pub fn into_document(sections: &[Section], template: Option<&DocumentMap>) -> DocumentMap {
    let mut parsed = DocumentMap::new();
    for (title, pairs) in sections {
        let section = parsed.entry(title.clone()).or_default();
        for (key, values) in pairs {
            section.insert(key.clone(), Some(values.clone()));
        }
    }
    if let Some(template) = template {
        for (title, keys) in template {
            let section = parsed.entry(title.clone()).or_default();
            for key in keys.keys() {
                section.entry(key.clone()).or_insert(None);
            }
        }
    }
    parsed
}

pub fn parse_document_as(
    input: &str,
    template: Option<&DocumentMap>,
) -> Result<DocumentMap, SweepError> {
    Ok(into_document(&parse_sections(input)?, template))
}

/// Template with the given sections, each holding the given keys.
pub fn template_from(layout: &[(&str, &[&str])]) -> DocumentMap {
    layout.iter()
        .map(|(title, keys)| {
            let section = keys.iter().map(|k| (k.to_string(), None)).collect();
            (title.to_string(), section)
        })
        .collect()
}
