use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use reqwest::Url;
use time::OffsetDateTime;
use tracing::{info, warn};

use olympiad_api::{academic_year_id, dispatch, plan, PlanOptions};
use olympiad_forms::Application;
use olympiad_schedule::schedule::{read_json, write_json};
use olympiad_schedule::{
  dump_tables, AcademicYear, Announcements, Issue, LevelTable, Normalized, Normalizer,
  ParseOptions, SubjectTable,
};

use crate::config::{BackendArgs, FormArgs, MailArgs, NormalizeArgs, StorageArgs, TableArgs};
use crate::mail::Mailer;

#[derive(clap::Args, Debug)]
pub struct ScrapeArgs {
  /// Site that publishes the yearly announcement under `ol-<start>-<end>/`.
  #[arg(long, env = "OLYMPIAD_ANNOUNCEMENTS_URL")]
  pub announcements_url: Url,
  /// Calendar year the academic year ends in, the current one by default.
  #[arg(long, env = "OLYMPIAD_YEAR")]
  pub year: Option<i32>,
  #[arg(long, env = "OLYMPIAD_PDF_DIR", default_value = "pdfs")]
  pub pdf_dir: PathBuf,
  /// Also keep the intermediate table dump.
  #[arg(long, env = "OLYMPIAD_DUMP")]
  pub dump: Option<PathBuf>,
  #[arg(long, short, env = "OLYMPIAD_OUTPUT", default_value = "olympiads.json")]
  pub output: PathBuf,
  #[command(flatten)]
  pub table: TableArgs,
  #[command(flatten)]
  pub normalize: NormalizeArgs,
  #[command(flatten)]
  pub storage: StorageArgs,
}

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
  pub input: PathBuf,
  #[arg(long, short, default_value = "tables.txt")]
  pub output: PathBuf,
  #[command(flatten)]
  pub table: TableArgs,
}

#[derive(clap::Args, Debug)]
pub struct NormalizeCommandArgs {
  #[arg(default_value = "tables.txt")]
  pub input: PathBuf,
  #[arg(long, short, env = "OLYMPIAD_OUTPUT", default_value = "olympiads.json")]
  pub output: PathBuf,
  #[arg(long, env = "OLYMPIAD_SUBJECTS")]
  pub subjects: Option<PathBuf>,
  #[command(flatten)]
  pub normalize: NormalizeArgs,
}

#[derive(clap::Args, Debug)]
pub struct UploadArgs {
  #[arg(default_value = "olympiads.json")]
  pub input: PathBuf,
  /// Stop after this many uploads.
  #[arg(long, env = "OLYMPIAD_LIMIT")]
  pub limit: Option<usize>,
  /// Derived from today's date when absent.
  #[arg(long, env = "OLYMPIAD_ACADEMIC_YEAR_ID")]
  pub academic_year_id: Option<u8>,
  #[arg(long, env = "OLYMPIAD_LOCATION", default_value = "Bulgaria")]
  pub location: String,
  #[arg(long, env = "OLYMPIAD_DESCRIPTION")]
  pub description: Option<String>,
  #[command(flatten)]
  pub backend: BackendArgs,
}

#[derive(clap::Args, Debug)]
pub struct FillArgs {
  /// JSON file with the applicant data.
  pub application: PathBuf,
  /// Mail the filled form to the applicant.
  #[arg(long)]
  pub send: bool,
  #[command(flatten)]
  pub form: FormArgs,
  #[command(flatten)]
  pub backend: BackendArgs,
  #[command(flatten)]
  pub mail: MailArgs,
}

fn normalize(text: &str, subjects: &SubjectTable, options: ParseOptions) -> Normalized {
  let levels = LevelTable::default();
  let normalized = Normalizer::new(subjects, &levels, options).normalize_text(text);
  report_issues(&normalized.issues);
  normalized
}

fn report_issues(issues: &[Issue]) {
  if issues.is_empty() {
    return;
  }

  warn!("{} problems while normalizing:", issues.len());
  for issue in issues {
    warn!("  {}", issue);
  }
}

fn write_text(path: &Path, text: &str) -> anyhow::Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(path, text).with_context(|| format!("Unable to write {}", path.display()))
}

pub async fn scrape(args: ScrapeArgs) -> anyhow::Result<()> {
  let pages = args.table.pages()?;
  let subjects = args.table.subjects()?;
  let storage = args.storage.validate()?;

  let year = match args.year {
    Some(end) => AcademicYear { start: end - 1, end },
    None => AcademicYear::containing(OffsetDateTime::now_utc().date()),
  };
  info!("Scraping the schedule of {}", year);

  let pdf = Announcements::new(args.announcements_url).download(year).await?;
  pdf.save(&args.pdf_dir)?;

  if let Some(storage) = &storage {
    if let Err(err) = storage.upload(&year.to_string(), &pdf.file_name, pdf.bytes.clone()).await {
      warn!("Unable to archive {}: {:#}", pdf.file_name, err);
    }
  }

  let text = dump_tables(&pdf.bytes, &pages, &subjects)?;
  if let Some(dump) = &args.dump {
    write_text(dump, &text)?;
  }

  let normalized = normalize(&text, &subjects, args.normalize.options());
  write_json(&normalized.schedule, &args.output)?;
  info!("Wrote {} subjects to {}", normalized.schedule.len(), args.output.display());

  Ok(())
}

pub fn extract(args: ExtractArgs) -> anyhow::Result<()> {
  let pages = args.table.pages()?;
  let subjects = args.table.subjects()?;

  let pdf = fs::read(&args.input).with_context(|| format!("Unable to read {}", args.input.display()))?;
  let text = dump_tables(&pdf, &pages, &subjects)?;
  write_text(&args.output, &text)?;
  info!("Wrote table dump to {}", args.output.display());

  Ok(())
}

pub fn normalize_file(args: NormalizeCommandArgs) -> anyhow::Result<()> {
  let subjects = SubjectTable::load(args.subjects.as_deref())?;

  let text = fs::read_to_string(&args.input)
    .with_context(|| format!("Unable to read {}", args.input.display()))?;
  let normalized = normalize(&text, &subjects, args.normalize.options());
  write_json(&normalized.schedule, &args.output)?;
  info!("Wrote {} subjects to {}", normalized.schedule.len(), args.output.display());

  Ok(())
}

pub async fn upload(args: UploadArgs) -> anyhow::Result<()> {
  let config = args.backend.validate()?;
  let schedule = read_json(&args.input)?;

  let options = PlanOptions {
    academic_year_id: args
      .academic_year_id
      .unwrap_or_else(|| academic_year_id(OffsetDateTime::now_utc().date())),
    location: args.location,
    description: args.description,
  };
  let plan = plan(&schedule, &options);
  info!("Planned {} records", plan.records.len());

  let token = config.backend.login(&config.credentials, &config.policy).await?;
  let report = dispatch(&config.backend.authorized(&token), plan, args.limit).await;

  info!(
    "Uploaded {} records, skipped {}, {} failed",
    report.uploaded,
    report.skipped,
    report.failures.len()
  );
  for failure in &report.failures {
    warn!("  {}", failure);
  }

  if report.failures.is_empty() {
    Ok(())
  } else {
    Err(anyhow!("{} records could not be uploaded", report.failures.len()))
  }
}

pub async fn fill(args: FillArgs) -> anyhow::Result<()> {
  let form = args.form.validate()?;
  let mailer = match args.send {
    true => Some(Mailer::new(args.backend.validate()?, args.mail.clone())),
    false => None,
  };

  let text = fs::read_to_string(&args.application)
    .with_context(|| format!("Unable to read {}", args.application.display()))?;
  let application: Application = serde_json::from_str(&text)
    .with_context(|| format!("Invalid application {}", args.application.display()))?;

  let document = form.filler()?.fill_to(&application, &form.output)?;
  info!("Wrote {}", form.output.display());

  if let Some(mailer) = mailer {
    mailer.send(&application, crate::config::FILLED_FILE_NAME, document).await?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize_command_writes_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tables.txt");
    fs::write(
      &input,
      "ОБЛАСТЕН КРЪГ\nМАТЕМАТИКА\tV-VII\tонлайн\t05.03.2024 Г. НАЧАЛО 9:00 Ч.\n",
    )
    .unwrap();
    let output = dir.path().join("out/olympiads.json");

    normalize_file(NormalizeCommandArgs {
      input,
      output: output.clone(),
      subjects: None,
      normalize: NormalizeArgs {
        strictness: Default::default(),
      },
    })
    .unwrap();

    let schedule = read_json(&output).unwrap();
    let entry = &schedule["math"][&olympiad_schedule::CompetitionLevel::District];
    assert_eq!(entry.class, vec![5, 6, 7]);
    assert_eq!(entry.dates, vec!["05.03.2024"]);
    assert_eq!(entry.time.as_deref(), Some("09:00"));
  }

  #[test]
  fn extract_needs_input() {
    let dir = tempfile::tempdir().unwrap();

    let err = extract(ExtractArgs {
      input: dir.path().join("missing.pdf"),
      output: dir.path().join("tables.txt"),
      table: TableArgs {
        pages: vec![2, 3, 4],
        subjects: None,
      },
    })
    .unwrap_err();

    assert!(err.to_string().contains("missing.pdf"));
  }
}
