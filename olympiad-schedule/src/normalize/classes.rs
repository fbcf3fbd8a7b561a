use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalize::text::{normalize_chars, replace_roman_numerals};

static RANGE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)-(\d+)$").unwrap());
static DASH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-\s*").unwrap());
static SEPARATOR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;\s]+").unwrap());
/// Day.month pair followed by a dash, as in `05.03-07.03.2024`.
static DATE_RANGE_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\d{1,2}\.\d{1,2}\.?(\d{4})?-\d{1,2}\.\d{1,2}").unwrap());

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassToken {
  Single(u8),
  Range(u8, u8),
}

/// Token that could not be read as a class or class range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidToken {
  pub token: String,
  pub reason: &'static str,
}

/// Character normalization, conjunction removal and numeral conversion.
pub fn prepare_classes(classes: &str) -> String {
  let text = normalize_chars(classes).replace('И', " ");
  let text = replace_roman_numerals(&text);
  DASH_REGEX.replace_all(text.trim(), "-").into_owned()
}

pub fn is_date_range(token: &str) -> bool {
  DATE_RANGE_REGEX.is_match(token)
}

fn class_number(value: &str) -> Option<u8> {
  value.parse::<u8>().ok().filter(|class| *class > 0)
}

/// Splits a prepared class column on commas and whitespace.
pub fn tokenize_classes(prepared: &str) -> Vec<Result<ClassToken, InvalidToken>> {
  SEPARATOR_REGEX
    .split(prepared)
    .filter(|token| !token.is_empty())
    .map(|token| {
      let invalid = |reason| InvalidToken {
        token: token.to_string(),
        reason,
      };

      if is_date_range(token) {
        return Err(invalid("date range in class column"));
      }

      if let Some(captures) = RANGE_REGEX.captures(token) {
        let start = class_number(&captures[1]).ok_or_else(|| invalid("invalid range start"))?;
        let end = class_number(&captures[2]).ok_or_else(|| invalid("invalid range end"))?;

        if start > end {
          return Err(invalid("range end precedes its start"));
        }

        return Ok(ClassToken::Range(start, end));
      }

      class_number(token)
        .map(ClassToken::Single)
        .ok_or_else(|| invalid("not a class number"))
    })
    .collect()
}

/// Expands ranges inclusively and returns the classes in ascending order.
pub fn expand_classes<'a>(tokens: impl IntoIterator<Item = &'a ClassToken>) -> Vec<u8> {
  let mut classes = BTreeSet::new();

  for token in tokens {
    match *token {
      ClassToken::Single(class) => {
        classes.insert(class);
      }
      ClassToken::Range(start, end) => classes.extend(start..=end),
    }
  }

  classes.into_iter().collect()
}

/// Runs all class stages, returning the classes and the tokens that were skipped.
pub fn parse_classes(classes: &str) -> (Vec<u8>, Vec<InvalidToken>) {
  let mut tokens = Vec::new();
  let mut invalid = Vec::new();

  for token in tokenize_classes(&prepare_classes(classes)) {
    match token {
      Ok(token) => tokens.push(token),
      Err(err) => invalid.push(err),
    }
  }

  (expand_classes(&tokens), invalid)
}
