use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

/// Stage of the academic competition a table section belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompetitionLevel {
  #[serde(rename = "district_ring")]
  District,
  #[serde(rename = "regional_ring")]
  Regional,
  #[serde(rename = "national_ring")]
  National,
}

impl CompetitionLevel {
  pub const ALL: [CompetitionLevel; 3] = [Self::District, Self::Regional, Self::National];

  /// Identifier used as JSON key, e.g. `district_ring`.
  pub fn id(&self) -> &'static str {
    match self {
      Self::District => "district_ring",
      Self::Regional => "regional_ring",
      Self::National => "national_ring",
    }
  }

  /// Section header as printed in the announcement PDF.
  pub fn label(&self) -> &'static str {
    match self {
      Self::District => "ОБЛАСТЕН КРЪГ",
      Self::Regional => "РЕГИОНАЛЕН КРЪГ",
      Self::National => "НАЦИОНАЛЕН КРЪГ",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
  pub class: Vec<u8>,
  pub dates: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub time: Option<String>,
}

/// `subject -> level -> entry`, the JSON document consumed by the upload step.
pub type Schedule = BTreeMap<String, BTreeMap<CompetitionLevel, ScheduleEntry>>;

/// Serializes with literal non-ASCII characters and 4-space indentation.
pub fn to_json(schedule: &Schedule) -> anyhow::Result<String> {
  let mut buf = Vec::new();
  let mut serializer =
    serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
  schedule.serialize(&mut serializer)?;
  buf.push(b'\n');

  Ok(String::from_utf8(buf)?)
}

pub fn write_json(schedule: &Schedule, path: &Path) -> anyhow::Result<()> {
  if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
    fs::create_dir_all(parent)
      .with_context(|| format!("Unable to create directory {}", parent.display()))?;
  }

  fs::write(path, to_json(schedule)?)
    .with_context(|| format!("Unable to write schedule to {}", path.display()))
}

pub fn read_json(path: &Path) -> anyhow::Result<Schedule> {
  let text = fs::read_to_string(path)
    .with_context(|| format!("Unable to read schedule from {}", path.display()))?;

  serde_json::from_str(&text).with_context(|| format!("Invalid schedule in {}", path.display()))
}
