use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use clap::ValueEnum;
use reqwest::Url;

use olympiad_api::{Backend, Credentials, RetryPolicy, Storage};
use olympiad_forms::FormFiller;
use olympiad_schedule::{ParseOptions, Strictness, SubjectTable, TablePage};

pub const FILLED_FILE_NAME: &str = "Deklaracia_filled.pdf";

fn ensure_file(path: &Path, what: &str) -> anyhow::Result<()> {
  if path.is_file() {
    Ok(())
  } else {
    Err(anyhow!("{} not found at {}", what, path.display()))
  }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum StrictnessArg {
  #[default]
  Strict,
  Lenient,
}

impl From<StrictnessArg> for Strictness {
  fn from(value: StrictnessArg) -> Self {
    match value {
      StrictnessArg::Strict => Strictness::Strict,
      StrictnessArg::Lenient => Strictness::Lenient,
    }
  }
}

#[derive(clap::Args, Clone, Debug)]
pub struct TableArgs {
  /// Pdf pages holding the district, regional and national tables.
  #[arg(long, env = "OLYMPIAD_PAGES", value_delimiter = ',', default_values_t = [2, 3, 4])]
  pub pages: Vec<u32>,
  /// JSON object of additional subject headings and their ids.
  #[arg(long, env = "OLYMPIAD_SUBJECTS")]
  pub subjects: Option<PathBuf>,
}

impl TableArgs {
  pub fn pages(&self) -> anyhow::Result<Vec<TablePage>> {
    if self.pages.len() > 3 {
      return Err(anyhow!("At most three table pages are supported, got {}", self.pages.len()));
    }
    Ok(TablePage::from_numbers(&self.pages))
  }

  pub fn subjects(&self) -> anyhow::Result<SubjectTable> {
    if let Some(path) = &self.subjects {
      ensure_file(path, "Subject table")?;
    }
    SubjectTable::load(self.subjects.as_deref())
  }
}

#[derive(clap::Args, Clone, Debug)]
pub struct NormalizeArgs {
  #[arg(long, env = "OLYMPIAD_STRICTNESS", value_enum, default_value_t)]
  pub strictness: StrictnessArg,
}

impl NormalizeArgs {
  pub fn options(&self) -> ParseOptions {
    ParseOptions {
      strictness: self.strictness.into(),
    }
  }
}

#[derive(clap::Args, Clone, Debug)]
pub struct BackendArgs {
  #[arg(long, env = "OLYMPIAD_BACKEND_URL", default_value = "http://localhost:5138/api/")]
  pub backend_url: Url,
  #[arg(long, env = "OLYMPIAD_USERNAME")]
  pub username: Option<String>,
  #[arg(long, env = "OLYMPIAD_PASSWORD", hide_env_values = true)]
  pub password: Option<String>,
  #[arg(long, env = "OLYMPIAD_RETRY_ATTEMPTS", default_value_t = 5)]
  pub retry_attempts: u32,
  /// Seconds between two login attempts.
  #[arg(long, env = "OLYMPIAD_RETRY_DELAY", default_value_t = 2)]
  pub retry_delay: u64,
}

pub struct BackendConfig {
  pub backend: Backend,
  pub credentials: Credentials,
  pub policy: RetryPolicy,
}

impl BackendArgs {
  pub fn validate(&self) -> anyhow::Result<BackendConfig> {
    let (username, password) = match (&self.username, &self.password) {
      (Some(username), Some(password)) => (username.clone(), password.clone()),
      _ => return Err(anyhow!("Backend username and password are required")),
    };
    if self.retry_attempts == 0 {
      return Err(anyhow!("At least one login attempt is required"));
    }

    Ok(BackendConfig {
      backend: Backend::new(self.backend_url.clone()),
      credentials: Credentials {
        username_or_email: username,
        password,
      },
      policy: RetryPolicy::fixed(self.retry_attempts, Duration::from_secs(self.retry_delay)),
    })
  }
}

#[derive(clap::Args, Clone, Debug)]
pub struct StorageArgs {
  /// Base url of the storage service the downloaded pdf is archived to.
  #[arg(long, env = "OLYMPIAD_STORAGE_URL")]
  pub storage_url: Option<Url>,
  #[arg(long, env = "OLYMPIAD_STORAGE_KEY", hide_env_values = true)]
  pub storage_key: Option<String>,
  #[arg(long, env = "OLYMPIAD_STORAGE_BUCKET", default_value = "olympiads")]
  pub storage_bucket: String,
}

impl StorageArgs {
  pub fn validate(&self) -> anyhow::Result<Option<Storage>> {
    match (&self.storage_url, &self.storage_key) {
      (None, None) => Ok(None),
      (Some(url), Some(key)) => Ok(Some(Storage::new(
        url.clone(),
        key.clone(),
        self.storage_bucket.clone(),
      ))),
      _ => Err(anyhow!("Storage url and key have to be given together")),
    }
  }
}

#[derive(clap::Args, Clone, Debug)]
pub struct FormArgs {
  #[arg(long, env = "OLYMPIAD_TEMPLATE", default_value = "Deklaracia.pdf")]
  pub template: PathBuf,
  /// TrueType font with Cyrillic glyphs.
  #[arg(long, env = "OLYMPIAD_FONT", default_value = "fonts/Arial.ttf")]
  pub font: PathBuf,
  #[arg(long, env = "OLYMPIAD_FONT_SIZE", default_value_t = olympiad_forms::DEFAULT_FONT_SIZE)]
  pub font_size: f32,
  #[arg(long, env = "OLYMPIAD_OUTPUT_DIR", default_value = "filled_documents")]
  pub output_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct FormConfig {
  pub template: PathBuf,
  pub font: PathBuf,
  pub font_size: f32,
  pub output: PathBuf,
}

impl FormArgs {
  pub fn validate(&self) -> anyhow::Result<FormConfig> {
    ensure_file(&self.template, "Template")?;
    ensure_file(&self.font, "Font")?;
    if self.font_size.is_nan() || self.font_size <= 0.0 {
      return Err(anyhow!("Font size has to be positive, got {}", self.font_size));
    }

    Ok(FormConfig {
      template: self.template.clone(),
      font: self.font.clone(),
      font_size: self.font_size,
      output: self.output_dir.join(FILLED_FILE_NAME),
    })
  }
}

impl FormConfig {
  /// Reads template and font anew, so replaced files are picked up.
  pub fn filler(&self) -> anyhow::Result<FormFiller> {
    Ok(FormFiller::load(&self.template, Some(&self.font))?.with_font_size(self.font_size))
  }
}

#[derive(clap::Args, Clone, Debug)]
pub struct MailArgs {
  #[arg(long, env = "OLYMPIAD_MAIL_SUBJECT", default_value = "Декларация за участие в олимпиада")]
  pub mail_subject: String,
  /// Copy of every mail, e.g. the olympiad coordinator.
  #[arg(long, env = "OLYMPIAD_MAIL_CC")]
  pub mail_cc: Option<String>,
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;

  fn backend_args() -> BackendArgs {
    BackendArgs {
      backend_url: Url::parse("http://localhost:5138/api/").unwrap(),
      username: Some("admin@example.org".to_string()),
      password: Some("secret".to_string()),
      retry_attempts: 3,
      retry_delay: 1,
    }
  }

  #[test]
  fn backend_requires_credentials() {
    let mut args = backend_args();
    let config = args.validate().unwrap();
    assert_eq!(config.policy.max_attempts, 3);
    assert_eq!(config.policy.delay, Duration::from_secs(1));

    args.password = None;
    assert!(args.validate().is_err());
  }

  #[test]
  fn storage_is_optional() {
    let mut args = StorageArgs {
      storage_url: None,
      storage_key: None,
      storage_bucket: "olympiads".to_string(),
    };
    assert!(args.validate().unwrap().is_none());

    args.storage_url = Some(Url::parse("https://storage.example.org").unwrap());
    assert!(args.validate().is_err());

    args.storage_key = Some("key".to_string());
    assert!(args.validate().unwrap().is_some());
  }

  #[test]
  fn form_files_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("Deklaracia.pdf");
    fs::write(&template, b"%PDF-1.5").unwrap();

    let mut args = FormArgs {
      template,
      font: dir.path().join("fonts/Arial.ttf"),
      font_size: 12.0,
      output_dir: dir.path().join("filled_documents"),
    };
    let err = args.validate().unwrap_err();
    assert!(err.to_string().starts_with("Font not found"));

    fs::create_dir_all(dir.path().join("fonts")).unwrap();
    fs::write(&args.font, b"not a font").unwrap();
    let config = args.validate().unwrap();
    assert_eq!(config.output, dir.path().join("filled_documents").join(FILLED_FILE_NAME));

    args.font_size = 0.0;
    assert!(args.validate().is_err());
  }

  #[test]
  fn at_most_three_pages() {
    let args = TableArgs {
      pages: vec![2, 3, 4, 5],
      subjects: None,
    };
    assert!(args.pages().is_err());
  }
}
