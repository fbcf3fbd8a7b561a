use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use time::macros::format_description;
use time::{Date, Month};

/// Longest range that is still expanded day by day.
const MAX_RANGE_DAYS: usize = 366;

static TIME_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)НАЧАЛО\s*:?\s*(\d{1,2})[:.](\d{2})(?:\s*Ч\b\.?)?").unwrap());
/// `Г.` after a space or directly after the year, as in `2024г.`.
static YEAR_MARKER_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)(^|[\s\d])Г(?:\.|\b)").unwrap());
static UNTIL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bДО\b").unwrap());
static FROM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bОТ\b").unwrap());

static STRICT: Lazy<Patterns> = Lazy::new(|| Patterns::new(r"\d{2}", r"\."));
static LENIENT: Lazy<Patterns> = Lazy::new(|| Patterns::new(r"\d{1,2}", r"\.?\s*"));

/// How closely date expressions have to follow `DD.MM.YYYY`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strictness {
  /// Two-digit day and month, dots required.
  #[default]
  Strict,
  /// One- or two-digit day and month, optional dot before the year.
  Lenient,
}

struct Patterns {
  /// `DD.MM-DD.MM.YYYY`, both pairs sharing one year.
  short_range: Regex,
  /// `DD.MM.YYYY-DD.MM.YYYY`
  full_range: Regex,
  single: Regex,
}

impl Patterns {
  fn new(part: &str, year_dot: &str) -> Self {
    let pair = format!(r"({part})\.({part})");
    let date = format!(r"{pair}{year_dot}(\d{{4}})");

    Self {
      short_range: Regex::new(&format!(r"^{pair}\s*-\s*{pair}{year_dot}(\d{{4}})$")).unwrap(),
      full_range: Regex::new(&format!(r"^{date}\s*-\s*{date}$")).unwrap(),
      single: Regex::new(&format!(r"^{date}$")).unwrap(),
    }
  }
}

impl Strictness {
  fn patterns(&self) -> &'static Patterns {
    match self {
      Strictness::Strict => &STRICT,
      Strictness::Lenient => &LENIENT,
    }
  }
}

/// Normalized content of a date column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateColumn {
  pub dates: Vec<String>,
  pub time: Option<String>,
  /// `false` when `dates` holds the unparsed expression as a fallback.
  pub parsed: bool,
}

/// Removes a trailing `НАЧАЛО HH:MM Ч.` expression and returns it as `HH:MM`.
pub fn extract_time(text: &str) -> (String, Option<String>) {
  let Some(captures) = TIME_REGEX.captures(text) else {
    return (text.to_string(), None);
  };

  let hour = u8::from_str(&captures[1]).ok().filter(|hour| *hour < 24);
  let minute = u8::from_str(&captures[2]).ok().filter(|minute| *minute < 60);

  match (hour, minute, captures.get(0)) {
    (Some(hour), Some(minute), Some(span)) => {
      let rest = format!("{} {}", &text[..span.start()], &text[span.end()..]);
      (rest.trim().to_string(), Some(format!("{hour:02}:{minute:02}")))
    }
    _ => (text.to_string(), None),
  }
}

/// Strips the year marker `Г.` and stray separators.
pub fn clean_date(text: &str) -> String {
  let text = YEAR_MARKER_REGEX.replace_all(text, "${1} ");
  text
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .trim_matches(|c: char| c == ',' || c == ';' || c.is_whitespace())
    .to_string()
}

fn date(captures: &Captures, day: usize, month: usize, year: usize) -> Option<Date> {
  let day = u8::from_str(&captures[day]).ok()?;
  let month = u8::from_str(&captures[month]).ok()?;
  let year = i32::from_str(&captures[year]).ok()?;

  Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

fn format(date: Date) -> String {
  // `[day].[month].[year]` cannot fail to format a calendar date
  date
    .format(format_description!("[day].[month].[year]"))
    .unwrap_or_default()
}

fn expand(start: Date, end: Date) -> Option<Vec<String>> {
  if end < start {
    return None;
  }

  let mut dates = Vec::new();
  let mut current = start;
  loop {
    dates.push(format(current));
    if current == end || dates.len() > MAX_RANGE_DAYS {
      break;
    }
    current = current.next_day()?;
  }

  (dates.len() <= MAX_RANGE_DAYS).then_some(dates)
}

/// Dates of one list element: a single date or a range.
fn parse_element(element: &str, patterns: &Patterns) -> Option<Vec<String>> {
  // a leading or trailing `ДО` only bounds the date
  let element = element.trim_matches(|c: char| c == '-' || c.is_whitespace());

  if let Some(captures) = patterns.full_range.captures(element) {
    return expand(date(&captures, 1, 2, 3)?, date(&captures, 4, 5, 6)?);
  }

  if let Some(captures) = patterns.short_range.captures(element) {
    return expand(date(&captures, 1, 2, 5)?, date(&captures, 3, 4, 5)?);
  }

  let captures = patterns.single.captures(element)?;
  date(&captures, 1, 2, 3).map(|day| vec![format(day)])
}

/// Parses a cleaned date expression; `None` when it has to be kept verbatim.
pub fn parse_dates(text: &str, strictness: Strictness) -> Option<Vec<String>> {
  let patterns = strictness.patterns();
  let text = FROM_REGEX.replace_all(text, " ");
  let text = UNTIL_REGEX.replace_all(&text, "-");

  let mut dates = Vec::new();
  for element in text.split(&[',', ';'][..]) {
    dates.extend(parse_element(element, patterns)?);
  }

  Some(dates)
}

/// Runs all date stages on the last column of a table row.
pub fn parse_date_column(raw: &str, strictness: Strictness) -> DateColumn {
  let (rest, time) = extract_time(raw);
  let cleaned = clean_date(&rest);

  if cleaned.is_empty() {
    return DateColumn {
      dates: Vec::new(),
      time,
      parsed: false,
    };
  }

  match parse_dates(&cleaned, strictness) {
    Some(dates) => DateColumn {
      dates,
      time,
      parsed: true,
    },
    None => DateColumn {
      dates: vec![cleaned],
      time,
      parsed: false,
    },
  }
}
