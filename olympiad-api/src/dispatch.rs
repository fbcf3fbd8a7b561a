use std::fmt;
use std::future::Future;

use olympiad_schedule::{CompetitionLevel, Schedule};
use serde::Serialize;
use time::macros::format_description;
use time::{Date, Month, PrimitiveDateTime, Time};
use tracing::{info, warn};

/// Olympiad row as accepted by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OlympiadRecord {
  pub subject: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub date_of_olympiad: String,
  pub round: String,
  pub location: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub start_time: Option<String>,
  pub academic_year_id: u8,
  pub class_number: u8,
}

/// Receiver of olympiad records, the backend or a test double.
pub trait OlympiadSink {
  fn send(&self, record: &OlympiadRecord) -> impl Future<Output = anyhow::Result<()>>;
}

/// Identifies the schedule cell a record was built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordKey {
  pub subject: String,
  pub level: CompetitionLevel,
  pub class: u8,
  pub date: String,
}

impl fmt::Display for RecordKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "subject {}, round {}, date {}, class {}",
      self.subject,
      self.level.id(),
      self.date,
      self.class
    )
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFailure {
  pub key: RecordKey,
  pub error: String,
}

impl fmt::Display for UploadFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.key, self.error)
  }
}

/// `1` before September, `2` from September on.
pub fn academic_year_id(today: Date) -> u8 {
  if (today.month() as u8) < (Month::September as u8) {
    1
  } else {
    2
  }
}

/// Python-style title case: `bulgarian_language` becomes `Bulgarian Language`.
pub fn title_case(value: &str) -> String {
  let mut title = String::with_capacity(value.len());
  let mut previous_is_letter = false;

  for c in value.replace('_', " ").chars() {
    if c.is_alphabetic() {
      if previous_is_letter {
        title.extend(c.to_lowercase());
      } else {
        title.extend(c.to_uppercase());
      }
      previous_is_letter = true;
    } else {
      title.push(c);
      previous_is_letter = false;
    }
  }

  title
}

#[derive(Clone, Debug)]
pub struct PlanOptions {
  pub academic_year_id: u8,
  pub location: String,
  pub description: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct UploadPlan {
  pub records: Vec<(RecordKey, OlympiadRecord)>,
  /// Cells that could not be turned into a record.
  pub failures: Vec<UploadFailure>,
}

fn iso_date(date: &str) -> Result<Date, String> {
  Date::parse(date.trim(), format_description!("[day].[month].[year]"))
    .map_err(|err| format!("unable to parse date '{}': {}", date, err))
}

fn iso_start_time(date: Date, time: &str) -> Result<String, String> {
  let time = time.trim().trim_end_matches("o'clock").trim();
  let time = Time::parse(time, format_description!("[hour padding:none]:[minute]"))
    .map_err(|err| format!("unable to parse time '{}': {}", time, err))?;

  PrimitiveDateTime::new(date, time)
    .format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"))
    .map_err(|err| err.to_string())
}

/// One record per `(subject, level, class, date)` of the schedule.
pub fn plan(schedule: &Schedule, options: &PlanOptions) -> UploadPlan {
  let mut plan = UploadPlan::default();

  for (subject, levels) in schedule {
    for (level, entry) in levels {
      for class in &entry.class {
        for date in &entry.dates {
          let key = RecordKey {
            subject: subject.clone(),
            level: *level,
            class: *class,
            date: date.clone(),
          };

          let record = iso_date(date).and_then(|parsed| {
            let start_time = entry
              .time
              .as_deref()
              .map(|time| iso_start_time(parsed, time))
              .transpose()?;

            Ok(OlympiadRecord {
              subject: title_case(subject),
              description: options.description.clone(),
              date_of_olympiad: parsed.to_string(),
              round: title_case(level.id()),
              location: options.location.clone(),
              start_time,
              academic_year_id: options.academic_year_id,
              class_number: *class,
            })
          });

          match record {
            Ok(record) => plan.records.push((key, record)),
            Err(error) => {
              warn!("Skipping {}: {}", key, error);
              plan.failures.push(UploadFailure { key, error });
            }
          }
        }
      }
    }
  }

  plan
}

#[derive(Debug, Default)]
pub struct DispatchReport {
  pub uploaded: usize,
  pub skipped: usize,
  pub failures: Vec<UploadFailure>,
}

/// Sends the planned records one after another. A failed upload is recorded and
/// the remaining records are still sent; at most `limit` uploads are attempted.
pub async fn dispatch<S: OlympiadSink>(sink: &S, plan: UploadPlan, limit: Option<usize>) -> DispatchReport {
  let mut report = DispatchReport {
    failures: plan.failures,
    ..DispatchReport::default()
  };
  let total = plan.records.len();

  for (index, (key, record)) in plan.records.into_iter().enumerate() {
    if limit.is_some_and(|limit| index >= limit) {
      report.skipped = total - index;
      info!("Upload limit of {} reached, skipping {} records", index, report.skipped);
      break;
    }

    match sink.send(&record).await {
      Ok(()) => {
        info!("Uploaded {}", key);
        report.uploaded += 1;
      }
      Err(err) => {
        warn!("Upload of {} failed: {:#}", key, err);
        report.failures.push(UploadFailure {
          key,
          error: format!("{:#}", err),
        });
      }
    }
  }

  report
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use anyhow::anyhow;
  use olympiad_schedule::ScheduleEntry;
  use time::macros::date;

  use super::*;

  #[derive(Default)]
  struct Recorder {
    sent: RefCell<Vec<OlympiadRecord>>,
    reject_class: Option<u8>,
  }

  impl OlympiadSink for Recorder {
    async fn send(&self, record: &OlympiadRecord) -> anyhow::Result<()> {
      if Some(record.class_number) == self.reject_class {
        return Err(anyhow!("400 Bad Request"));
      }
      self.sent.borrow_mut().push(record.clone());
      Ok(())
    }
  }

  fn options() -> PlanOptions {
    PlanOptions {
      academic_year_id: 2,
      location: "Bulgaria".to_string(),
      description: None,
    }
  }

  fn schedule() -> Schedule {
    let mut schedule = Schedule::new();
    let levels = schedule.entry("bulgarian_language_and_literature".to_string()).or_default();
    levels.insert(
      CompetitionLevel::District,
      ScheduleEntry {
        class: vec![5, 6],
        dates: vec!["05.03.2024".to_string(), "06.03.2024".to_string()],
        time: None,
      },
    );
    levels.insert(
      CompetitionLevel::National,
      ScheduleEntry {
        class: vec![12],
        dates: vec!["20.04.2024".to_string(), "предстои".to_string()],
        time: Some("9:30".to_string()),
      },
    );
    schedule
  }

  #[test]
  fn academic_year_switches_in_september() {
    assert_eq!(academic_year_id(date!(2024 - 08 - 31)), 1);
    assert_eq!(academic_year_id(date!(2024 - 09 - 01)), 2);
    assert_eq!(academic_year_id(date!(2024 - 12 - 01)), 2);
  }

  #[test]
  fn titles() {
    assert_eq!(title_case("bulgarian_language_and_literature"), "Bulgarian Language And Literature");
    assert_eq!(title_case("district_ring"), "District Ring");
    assert_eq!(title_case("МАТЕМАТИКА"), "Математика");
  }

  #[test]
  fn one_record_per_class_and_date() {
    let plan = plan(&schedule(), &options());

    assert_eq!(plan.records.len(), 5);
    assert_eq!(plan.failures.len(), 1);
    assert_eq!(plan.failures[0].key.date, "предстои");

    let (key, record) = &plan.records[0];
    assert_eq!(key.level, CompetitionLevel::District);
    assert_eq!(record.subject, "Bulgarian Language And Literature");
    assert_eq!(record.round, "District Ring");
    assert_eq!(record.date_of_olympiad, "2024-03-05");
    assert_eq!(record.class_number, 5);

    let (_, national) = &plan.records[4];
    assert_eq!(national.start_time.as_deref(), Some("2024-04-20T09:30:00"));
  }

  #[test]
  fn missing_time_omits_start_time() {
    let plan = plan(&schedule(), &options());
    let json = serde_json::to_value(&plan.records[0].1).unwrap();

    assert!(json.get("StartTime").is_none());
    assert!(json.get("Description").is_none());
    assert_eq!(json["DateOfOlympiad"], "2024-03-05");
    assert_eq!(json["AcademicYearId"], 2);
  }

  #[tokio::test]
  async fn failures_do_not_stop_the_run() {
    let recorder = Recorder {
      reject_class: Some(6),
      ..Recorder::default()
    };

    let report = dispatch(&recorder, plan(&schedule(), &options()), None).await;

    assert_eq!(report.uploaded, 3);
    assert_eq!(report.failures.len(), 3);
    assert_eq!(report.failures[1].key.class, 6);
    assert!(report.failures[1].error.contains("400"));
    assert_eq!(recorder.sent.borrow().len(), 3);
  }

  #[tokio::test]
  async fn limit_caps_uploads() {
    let recorder = Recorder::default();

    let report = dispatch(&recorder, plan(&schedule(), &options()), Some(2)).await;

    assert_eq!(report.uploaded, 2);
    assert_eq!(report.skipped, 3);
    assert_eq!(recorder.sent.borrow().len(), 2);
  }
}
