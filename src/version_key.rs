//! Numeral-aware sort keys for free-form version strings.
//!
//! A version string is split into numbers and tags. Numbers compare by value
//! (so "11" follows "2"), tags compare lexicographically, and every key ends in
//! an implicit `final` tag so that alphabetic pre-release markers ("1.1a",
//! "1.1rc1") sort before the release they precede ("1.1").

use std::cmp::Ordering;
use std::fmt;

use crate::models::ProductVersion;

const FINAL: &str = "final";
const FINAL_DASH: &str = "final-";

/// One component of a [`VersionKey`].
///
/// At the same position a tag always sorts before a number, so "1.a" < "1.1"
/// and "1.1" < "1.1.1".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Part {
    Tag(String),
    /// Decimal digits with leading zeros stripped; zero is the empty string.
    Number(String),
}

impl Part {
    fn number(digits: &str) -> Self {
        Part::Number(digits.trim_start_matches('0').to_string())
    }

    fn is_zero(&self) -> bool {
        matches!(self, Part::Number(digits) if digits.is_empty())
    }

    fn is_tag(&self, tag: &str) -> bool {
        matches!(self, Part::Tag(t) if t == tag)
    }
}

impl Ord for Part {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Part::Tag(a), Part::Tag(b)) => a.cmp(b),
            (Part::Tag(_), Part::Number(_)) => Ordering::Less,
            (Part::Number(_), Part::Tag(_)) => Ordering::Greater,
            (Part::Number(a), Part::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
        }
    }
}

impl PartialOrd for Part {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Derived, comparable form of a version string.
///
/// Parsing never fails; any string yields a key and keys form a total order.
/// Distinct strings may share a key ("1.0" and "1"), callers that need a strict
/// order break ties themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionKey(Vec<Part>);

impl VersionKey {
    pub fn parse(version: &str) -> Self {
        let mut parts: Vec<Part> = Vec::new();

        for token in tokenize(&version.to_lowercase()) {
            let part = match token {
                Token::Digits(digits) => Part::number(digits),
                Token::Text(text) => Part::Tag(alias(text).to_string()),
            };
            push_part(&mut parts, part);
        }
        push_part(&mut parts, Part::Tag(FINAL.to_string()));

        VersionKey(parts)
    }

    pub fn parts(&self) -> &[Part] {
        &self.0
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|part| match part {
                Part::Tag(tag) => format!("*{}", tag),
                Part::Number(digits) if digits.is_empty() => "0".to_string(),
                Part::Number(digits) => digits.clone(),
            })
            .collect();
        write!(f, "{}", rendered.join("."))
    }
}

/// Sort key for a product version, for use with `sort_by_key` and friends.
pub fn by_version(version: &ProductVersion) -> VersionKey {
    VersionKey::parse(&version.version)
}

pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionKey::parse(a).cmp(&VersionKey::parse(b))
}

/// Apply a part to the key under construction.
///
/// A tag closes a numeric series, so trailing zeros are dropped first ("1.0a"
/// equals "1a"). A pre-release tag also swallows a preceding dash marker.
fn push_part(parts: &mut Vec<Part>, part: Part) {
    if let Part::Tag(tag) = &part {
        if tag.as_str() < FINAL {
            while parts.last().is_some_and(|p| p.is_tag(FINAL_DASH)) {
                parts.pop();
            }
        }
        while parts.last().is_some_and(Part::is_zero) {
            parts.pop();
        }
    }
    parts.push(part);
}

fn alias(text: &str) -> &str {
    match text {
        "pre" | "preview" | "rc" => "c",
        "dev" => "@",
        "-" => FINAL_DASH,
        other => other,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Digits(&'a str),
    Text(&'a str),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Class {
    Digit,
    Letter,
    Dot,
    Dash,
    Other,
}

fn classify(c: char) -> Class {
    match c {
        '0'..='9' => Class::Digit,
        'a'..='z' => Class::Letter,
        '.' => Class::Dot,
        '-' => Class::Dash,
        _ => Class::Other,
    }
}

/// Split into runs of digits, runs of letters, single dashes and runs of any
/// other characters. Dots only separate.
fn tokenize(s: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = s.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let class = classify(c);
        let mut end = start + c.len_utf8();

        if matches!(class, Class::Digit | Class::Letter | Class::Other) {
            while let Some(&(i, next)) = chars.peek() {
                if classify(next) != class {
                    break;
                }
                end = i + next.len_utf8();
                chars.next();
            }
        }

        let text = &s[start..end];
        match class {
            Class::Dot => {}
            Class::Digit => tokens.push(Token::Digits(text)),
            Class::Letter | Class::Dash | Class::Other => tokens.push(Token::Text(text)),
        }
    }

    tokens
}
