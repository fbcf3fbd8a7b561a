use anyhow::Context;
use lopdf::Document;
use tracing::{debug, info, warn};

use crate::lookup::SubjectTable;
use crate::schedule::CompetitionLevel;

/// Page of the announcement that holds the table of one competition level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TablePage {
  /// 1-based page number.
  pub number: u32,
  pub level: CompetitionLevel,
}

impl TablePage {
  /// Pages 2, 3 and 4 carry the district, regional and national tables.
  pub fn defaults() -> Vec<TablePage> {
    Self::from_numbers(&[2, 3, 4])
  }

  /// Assigns district, regional and national in that order.
  pub fn from_numbers(numbers: &[u32]) -> Vec<TablePage> {
    numbers
      .iter()
      .zip(CompetitionLevel::ALL)
      .map(|(number, level)| TablePage {
        number: *number,
        level,
      })
      .collect()
  }
}

fn has_year_marker(cell: &str) -> bool {
  cell.contains("Г.") || cell.contains("г.")
}

/// Groups the text lines of one page into tab separated table rows.
///
/// A row ends with the cell carrying the year marker of its date. A known subject
/// heading opens a new row and drops whatever was buffered before it, which is how
/// column headers and page decorations are left out.
pub fn assemble_rows<'a>(
  lines: impl IntoIterator<Item = &'a str>,
  subjects: &SubjectTable,
) -> Vec<String> {
  let mut rows = Vec::new();
  let mut buffer: Vec<String> = Vec::new();

  for line in lines {
    let cell = line.split_whitespace().collect::<Vec<_>>().join(" ");
    if cell.is_empty() {
      continue;
    }

    if subjects.contains(&cell) && !buffer.is_empty() {
      debug!("Dropping unterminated cells {:?}", buffer);
      buffer.clear();
    }

    let closes_row = has_year_marker(&cell);
    buffer.push(cell);

    if closes_row {
      rows.push(buffer.join("\t"));
      buffer.clear();
    }
  }

  if !buffer.is_empty() {
    rows.push(buffer.join("\t"));
  }

  rows
}

/// Extracts the schedule tables into the intermediate text dump: a header line
/// per level followed by its rows.
pub fn dump_tables(pdf: &[u8], pages: &[TablePage], subjects: &SubjectTable) -> anyhow::Result<String> {
  let document = Document::load_mem(pdf).context("Unable to read schedule pdf")?;
  let page_count = document.get_pages().len();
  let mut dump = String::new();

  for page in pages {
    if page.number as usize > page_count || page.number == 0 {
      warn!(
        "Schedule pdf has {} pages, skipping {} table on page {}",
        page_count,
        page.level.id(),
        page.number
      );
      continue;
    }

    let text = document
      .extract_text(&[page.number])
      .with_context(|| format!("Unable to extract text of page {}", page.number))?;
    let rows = assemble_rows(text.lines(), subjects);
    info!("Page {}: {} rows for {}", page.number, rows.len(), page.level.id());

    dump.push_str(page.level.label());
    dump.push('\n');
    for row in rows {
      dump.push_str(&row);
      dump.push('\n');
    }
  }

  Ok(dump)
}
