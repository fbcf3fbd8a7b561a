use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use reqwest::{Client, Url};
use select::document::Document;
use select::predicate::{Class, Name, Predicate};
use time::Date;
use tracing::info;

pub use lookup::{LevelTable, SubjectTable};
pub use normalize::{Issue, IssueKind, Normalized, Normalizer, ParseOptions, Strictness};
pub use schedule::{CompetitionLevel, Schedule, ScheduleEntry};
pub use table::{dump_tables, TablePage};

pub mod lookup;
pub mod normalize;
pub mod schedule;
pub mod table;
#[cfg(test)]
mod test;

/// School year spanning two calendar years, e.g. `2023-2024`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcademicYear {
  pub start: i32,
  pub end: i32,
}

impl AcademicYear {
  /// The announcement of a calendar year is published under the year that ends in it.
  pub fn containing(date: Date) -> Self {
    Self {
      start: date.year() - 1,
      end: date.year(),
    }
  }
}

impl fmt::Display for AcademicYear {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.start, self.end)
  }
}

pub struct SchedulePdf {
  pub url: Url,
  pub file_name: String,
  pub bytes: Vec<u8>,
}

impl SchedulePdf {
  pub fn save(&self, dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Unable to create {}", dir.display()))?;

    let path = dir.join(&self.file_name);
    fs::write(&path, &self.bytes).with_context(|| format!("Unable to write {}", path.display()))?;

    info!("Saved {} ({} bytes)", path.display(), self.bytes.len());
    Ok(path)
  }
}

/// Announcement site that embeds the yearly schedule pdf through a viewer iframe.
pub struct Announcements {
  client: Client,
  base: Url,
}

impl Announcements {
  pub fn new(base: Url) -> Self {
    Self {
      client: Client::new(),
      base,
    }
  }

  pub fn page_url(&self, year: AcademicYear) -> anyhow::Result<Url> {
    let mut base = self.base.clone();
    if !base.path().ends_with('/') {
      base.set_path(&format!("{}/", base.path()));
    }

    Ok(base.join(&format!("ol-{}/", year))?)
  }

  pub async fn download(&self, year: AcademicYear) -> anyhow::Result<SchedulePdf> {
    let page_url = self.page_url(year)?;

    let html = self
      .client
      .get(page_url.clone())
      .send()
      .await?
      .error_for_status()?
      .text()
      .await?;
    info!("Crawled {}", page_url);

    let url = find_pdf_link(&html, &page_url)?;
    let bytes = self
      .client
      .get(url.clone())
      .send()
      .await?
      .error_for_status()?
      .bytes()
      .await?
      .to_vec();
    info!("Downloaded {} ({} bytes)", url, bytes.len());

    let file_name = url
      .path_segments()
      .and_then(|segments| segments.last())
      .filter(|name| !name.is_empty())
      .unwrap_or("schedule.pdf")
      .to_string();

    Ok(SchedulePdf {
      url,
      file_name,
      bytes,
    })
  }
}

/// Resolves the pdf address behind the embedded document viewer of the page.
pub fn find_pdf_link(html: &str, page_url: &Url) -> anyhow::Result<Url> {
  let document = Document::from(html);

  let src = match document
    .find(Name("iframe").and(Class("ead-iframe")))
    .find_map(|iframe| iframe.attr("src"))
  {
    None => return Err(anyhow!("Missing document viewer iframe on {}", page_url)),
    Some(src) => src,
  };

  let viewer = page_url.join(src)?;
  let pdf = match viewer.query_pairs().find(|(key, _)| key == "url") {
    None => return Err(anyhow!("Document viewer {} has no url parameter", viewer)),
    Some((_, value)) => value.into_owned(),
  };

  Url::parse(&pdf).with_context(|| format!("Invalid pdf url {}", pdf))
}
