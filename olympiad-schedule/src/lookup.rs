use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::schedule::CompetitionLevel;

const SUBJECTS: [(&str, &str); 21] = [
  ("ЗНАМ И МОГА", "know_and_can"),
  ("МАТЕМАТИКА", "math"),
  ("БЪЛГАРСКИ ЕЗИК И ЛИТЕРАТУРА", "bulgarian_language_and_literature"),
  ("АНГЛИЙСКИ ЕЗИК", "english"),
  ("НЕМСКИ ЕЗИК", "german"),
  ("ИСПАНСКИ ЕЗИК", "spanish"),
  ("ИТАЛИАНСКИ ЕЗИК", "italian"),
  ("РУСКИ ЕЗИК", "russian"),
  ("ФРЕНСКИ ЕЗИК", "french"),
  ("ИНФОРМАТИКА", "informatics"),
  ("ИНФОРМАЦИОННИ ТЕХНОЛОГИИ", "information_technologies"),
  ("ЛИНГВИСТИКА", "linguistics"),
  ("ФИЛОСОФИЯ", "philosophy"),
  ("ИСТОРИЯ И ЦИВИЛИЗАЦИИ", "history_and_civilizations"),
  ("ГЕОГРАФИЯ И ИКОНОМИКА", "geography_and_economics"),
  ("ГРАЖДАНСКО ОБРАЗОВАНИЕ", "civic_education"),
  ("ФИЗИКА", "physics"),
  ("АСТРОНОМИЯ", "astronomy"),
  ("ХИМИЯ И ОПАЗВАНЕ НА ОКОЛНАТА СРЕДА", "chemistry_and_environmental_protection"),
  ("БИОЛОГИЯ И ЗДРАВНО ОБРАЗОВАНИЕ", "biology_and_health_education"),
  ("ТЕХНИЧЕСКО ЧЕРТАНЕ", "technical_drawing"),
];

/// Uppercases, collapses whitespace and folds the Latin `X` into the Cyrillic `Х`,
/// which the PDF export mixes freely.
fn key(heading: &str) -> String {
  heading
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_uppercase()
    .replace('X', "Х")
}

/// Maps subject headings of the announcement to canonical identifiers.
#[derive(Clone, Debug)]
pub struct SubjectTable {
  entries: HashMap<String, String>,
}

impl SubjectTable {
  pub fn new<I, K, V>(entries: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
  {
    Self {
      entries: entries
        .into_iter()
        .map(|(heading, id)| (key(heading.as_ref()), id.into()))
        .collect(),
    }
  }

  /// Default table, extended or overridden by a JSON object `{"heading": "id"}`.
  pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
    let mut table = Self::default();

    if let Some(path) = path {
      let text = fs::read_to_string(path)
        .with_context(|| format!("Unable to read subject table {}", path.display()))?;
      let extra: HashMap<String, String> = serde_json::from_str(&text)
        .with_context(|| format!("Invalid subject table {}", path.display()))?;

      for (heading, id) in extra {
        table.entries.insert(key(&heading), id);
      }
    }

    Ok(table)
  }

  pub fn get(&self, heading: &str) -> Option<&str> {
    self.entries.get(&key(heading)).map(String::as_str)
  }

  pub fn contains(&self, heading: &str) -> bool {
    self.get(heading).is_some()
  }

  /// Canonical identifier, or the trimmed heading when it is not mapped.
  pub fn translate(&self, heading: &str) -> String {
    self
      .get(heading)
      .map(str::to_string)
      .unwrap_or_else(|| heading.trim().to_string())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl Default for SubjectTable {
  fn default() -> Self {
    Self::new(SUBJECTS)
  }
}

/// Recognizes the section header lines that introduce a competition level.
#[derive(Clone, Debug)]
pub struct LevelTable {
  labels: HashMap<String, CompetitionLevel>,
}

impl LevelTable {
  pub fn get(&self, line: &str) -> Option<CompetitionLevel> {
    self.labels.get(&key(line)).copied()
  }
}

impl Default for LevelTable {
  fn default() -> Self {
    Self {
      labels: CompetitionLevel::ALL
        .into_iter()
        .map(|level| (key(level.label()), level))
        .collect(),
    }
  }
}
