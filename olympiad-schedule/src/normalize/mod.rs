//! Turns the tab separated table dump into a [`Schedule`].
//!
//! The work is split into stages that can be exercised on their own:
//! [`text`] (character and numeral normalization), [`classes`] (tokenizing
//! and range expansion) and [`dates`] (time extraction, cleanup, range
//! expansion).

use std::fmt;

use tracing::{debug, warn};

use crate::lookup::{LevelTable, SubjectTable};
use crate::schedule::{CompetitionLevel, Schedule, ScheduleEntry};

pub use classes::{parse_classes, ClassToken, InvalidToken};
pub use dates::{parse_date_column, DateColumn, Strictness};

pub mod classes;
pub mod dates;
pub mod text;

/// Minimum number of tab separated fields of a data row.
const MIN_FIELDS: usize = 4;

#[derive(Clone, Copy, Debug, Default)]
pub struct ParseOptions {
  pub strictness: Strictness,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssueKind {
  /// Data row before the first section header.
  MissingLevel,
  InvalidClass(InvalidToken),
  NoClasses,
  MissingDate,
  /// Date expression kept verbatim.
  UnparsedDate(String),
}

/// Non-fatal problem found while normalizing a single line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
  pub line: usize,
  pub subject: String,
  pub level: Option<CompetitionLevel>,
  pub kind: IssueKind,
}

impl fmt::Display for Issue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "line {}, {}", self.line, self.subject)?;
    if let Some(level) = self.level {
      write!(f, " ({})", level.id())?;
    }

    match &self.kind {
      IssueKind::MissingLevel => write!(f, ": row before any competition level header, dropped"),
      IssueKind::InvalidClass(token) => {
        write!(f, ": skipped class token '{}': {}", token.token, token.reason)
      }
      IssueKind::NoClasses => write!(f, ": no valid class, dropped"),
      IssueKind::MissingDate => write!(f, ": empty date column, dropped"),
      IssueKind::UnparsedDate(text) => write!(f, ": unable to parse date '{}', kept as is", text),
    }
  }
}

#[derive(Clone, Debug, Default)]
pub struct Normalized {
  pub schedule: Schedule,
  pub issues: Vec<Issue>,
}

pub struct Normalizer<'a> {
  subjects: &'a SubjectTable,
  levels: &'a LevelTable,
  options: ParseOptions,
}

impl<'a> Normalizer<'a> {
  pub fn new(subjects: &'a SubjectTable, levels: &'a LevelTable, options: ParseOptions) -> Self {
    Self {
      subjects,
      levels,
      options,
    }
  }

  pub fn normalize_text(&self, text: &str) -> Normalized {
    self.normalize(text.lines())
  }

  pub fn normalize<'l>(&self, lines: impl IntoIterator<Item = &'l str>) -> Normalized {
    let mut normalized = Normalized::default();
    let mut current_level = None;

    for (index, line) in lines.into_iter().enumerate() {
      let fields = line.split('\t').map(str::trim).collect::<Vec<_>>();
      let mut non_empty = fields.iter().filter(|field| !field.is_empty());

      if let (Some(only), None) = (non_empty.next(), non_empty.next()) {
        if let Some(level) = self.levels.get(only) {
          debug!("Line {}: section {}", index + 1, level.id());
          current_level = Some(level);
          continue;
        }
      }

      if fields.len() < MIN_FIELDS {
        continue;
      }

      self.normalize_row(index + 1, &fields, current_level, &mut normalized);
    }

    normalized
  }

  fn normalize_row(
    &self,
    line: usize,
    fields: &[&str],
    level: Option<CompetitionLevel>,
    normalized: &mut Normalized,
  ) {
    let subject = self.subjects.translate(fields[0]);
    let mut report = |level, kind| {
      let issue = Issue {
        line,
        subject: subject.clone(),
        level,
        kind,
      };
      warn!("{}", issue);
      normalized.issues.push(issue);
    };

    let Some(level) = level else {
      report(None, IssueKind::MissingLevel);
      return;
    };

    let (classes, invalid) = parse_classes(fields[1]);
    for token in invalid {
      report(Some(level), IssueKind::InvalidClass(token));
    }

    if classes.is_empty() {
      report(Some(level), IssueKind::NoClasses);
      return;
    }

    let DateColumn {
      dates,
      time,
      parsed,
    } = parse_date_column(fields[fields.len() - 1], self.options.strictness);

    if dates.is_empty() {
      report(Some(level), IssueKind::MissingDate);
      return;
    }

    if !parsed {
      report(Some(level), IssueKind::UnparsedDate(dates.join(", ")));
    }

    normalized
      .schedule
      .entry(subject)
      .or_default()
      .insert(level, ScheduleEntry { class: classes, dates, time });
  }
}
