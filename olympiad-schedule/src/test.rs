use reqwest::Url;
use time::macros::date;

use crate::schedule::to_json;
use crate::table::assemble_rows;
use crate::{find_pdf_link, AcademicYear, LevelTable, Normalizer, ParseOptions, SubjectTable};

#[test]
fn announcement_line() {
  let subjects = SubjectTable::default();
  let levels = LevelTable::default();
  let normalizer = Normalizer::new(&subjects, &levels, ParseOptions::default());

  let normalized = normalizer.normalize_text(
    "ОБЛАСТЕН КРЪГ\nМАТЕМАТИКА\tV-VII\tонлайн\t05.03.2024 ДО 07.03.2024 Г.\n",
  );

  assert!(normalized.issues.is_empty());
  assert_eq!(
    serde_json::to_value(&normalized.schedule).unwrap(),
    serde_json::json!({
      "math": {
        "district_ring": {
          "class": [5, 6, 7],
          "dates": ["05.03.2024", "06.03.2024", "07.03.2024"]
        }
      }
    })
  );
}

#[test]
fn page_lines_to_json() {
  let subjects = SubjectTable::default();
  let levels = LevelTable::default();

  let mut dump = String::from("НАЦИОНАЛЕН КРЪГ\n");
  for row in assemble_rows(
    [
      "Предмет",
      "Клас",
      "ИНФОРМАЦИОННИ ТЕХНОЛОГИИ",
      "V - ХІІ",
      "София",
      "12.04-14.04.2024 г. НАЧАЛО 9:00 Ч.",
    ],
    &subjects,
  ) {
    dump.push_str(&row);
    dump.push('\n');
  }

  let normalized = Normalizer::new(&subjects, &levels, ParseOptions::default()).normalize_text(&dump);
  let json = to_json(&normalized.schedule).unwrap();

  assert_eq!(
    json,
    r#"{
    "information_technologies": {
        "national_ring": {
            "class": [
                5,
                6,
                7,
                8,
                9,
                10,
                11,
                12
            ],
            "dates": [
                "12.04.2024",
                "13.04.2024",
                "14.04.2024"
            ],
            "time": "09:00"
        }
    }
}
"#
  );

  let parsed: crate::Schedule = serde_json::from_str(&json).unwrap();
  assert_eq!(parsed, normalized.schedule);
}

#[test]
fn academic_year() {
  let year = AcademicYear::containing(date!(2024 - 10 - 19));

  assert_eq!(year.to_string(), "2023-2024");
}

#[test]
fn page_url_keeps_base_path() {
  let announcements = crate::Announcements::new(Url::parse("https://example.org/olimpiadi").unwrap());
  let url = announcements
    .page_url(AcademicYear {
      start: 2023,
      end: 2024,
    })
    .unwrap();

  assert_eq!(url.as_str(), "https://example.org/olimpiadi/ol-2023-2024/");
}

#[test]
fn pdf_link_from_viewer_iframe() {
  let html = r#"<html><body>
    <iframe src="https://youtube.com/embed/x"></iframe>
    <iframe class="ead-iframe" src="/viewer/?url=https%3A%2F%2Fcdn.example.org%2Ffiles%2FGrafik%202024.pdf&amp;embedded=true"></iframe>
  </body></html>"#;
  let page = Url::parse("https://example.org/olimpiadi/ol-2023-2024/").unwrap();

  let url = find_pdf_link(html, &page).unwrap();

  assert_eq!(url.as_str(), "https://cdn.example.org/files/Grafik%202024.pdf");
}

#[test]
fn missing_iframe_is_an_error() {
  let page = Url::parse("https://example.org/").unwrap();

  assert!(find_pdf_link("<html><body><p>none</p></body></html>", &page).is_err());
}
