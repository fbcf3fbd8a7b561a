use serde::Deserialize;

/// Applicant data posted by the enrollment form.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
  pub parent_name: String,
  pub address: String,
  pub telephone: String,
  pub student_name: String,
  pub grade: String,
  pub school: String,
  pub gender: String,
  pub test: String,
  pub email: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
  pub x: f32,
  pub y: f32,
  /// 0-based page index.
  pub page: usize,
}

const fn at(x: f32, y: f32, page: usize) -> Position {
  Position { x, y, page }
}

/// Text drawn at a fixed position of the template.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
  pub text: String,
  pub position: Position,
}

/// Field coordinates of the participation declaration, in PDF points.
#[derive(Clone, Debug)]
pub struct FormLayout {
  pub parent_name: Position,
  pub address: Position,
  pub telephone: Position,
  pub student_name: Position,
  pub grade: Position,
  pub school_first_line: Position,
  pub school_second_line: Position,
  pub placeholder: Position,
  pub test: Position,
  pub male: Position,
  pub female: Position,
  /// Characters that fit the first school line.
  pub school_width: usize,
}

impl Default for FormLayout {
  fn default() -> Self {
    Self {
      parent_name: at(210.0, 615.0, 0),
      address: at(150.0, 575.0, 0),
      telephone: at(130.0, 545.0, 0),
      student_name: at(90.0, 520.0, 0),
      grade: at(250.0, 475.0, 0),
      school_first_line: at(340.0, 475.0, 0),
      school_second_line: at(75.0, 445.0, 0),
      placeholder: at(160.0, 365.0, 0),
      test: at(0.0, 0.0, 1),
      male: at(170.0, 615.0, 0),
      female: at(155.0, 615.0, 0),
      school_width: 32,
    }
  }
}

/// Wraps at the last space within `width` characters, or cuts hard when there is none.
pub fn split_school(school: &str, width: usize) -> (String, String) {
  let chars = school.chars().collect::<Vec<_>>();
  if chars.len() <= width {
    return (school.to_string(), String::new());
  }

  match chars[..width].iter().rposition(|c| *c == ' ') {
    Some(space) => (
      chars[..space].iter().collect(),
      chars[space + 1..].iter().collect(),
    ),
    None => (chars[..width].iter().collect(), chars[width..].iter().collect()),
  }
}

impl FormLayout {
  pub fn place(&self, application: &Application) -> Vec<Placement> {
    let (school_first, school_second) = split_school(&application.school, self.school_width);

    let mut fields = vec![
      (application.parent_name.clone(), self.parent_name),
      (application.address.clone(), self.address),
      (application.telephone.clone(), self.telephone),
      (application.student_name.clone(), self.student_name),
      (application.grade.clone(), self.grade),
      (school_first, self.school_first_line),
      (school_second, self.school_second_line),
      ("--".to_string(), self.placeholder),
      (application.test.clone(), self.test),
    ];

    match application.gender.trim().to_lowercase().as_str() {
      "male" => fields.push(("X".to_string(), self.male)),
      "female" => fields.push(("X".to_string(), self.female)),
      _ => {}
    }

    fields
      .into_iter()
      .filter(|(text, _)| !text.trim().is_empty())
      .map(|(text, position)| Placement { text, position })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn application_from_form_json() {
    let application: Application = serde_json::from_str(
      r#"{"parentName": "Мария Петрова", "studentName": "Иван Петров", "grade": "10Б",
          "gender": "Male", "email": "maria@example.org"}"#,
    )
    .unwrap();

    assert_eq!(application.parent_name, "Мария Петрова");
    assert_eq!(application.school, "");
    assert_eq!(application.email.as_deref(), Some("maria@example.org"));
  }

  #[test]
  fn school_wraps_on_last_space() {
    let (first, second) = split_school("Технологично училище Електронни системи", 32);

    assert_eq!(first, "Технологично училище Електронни");
    assert_eq!(second, "системи");
  }

  #[test]
  fn school_without_space_is_cut() {
    let name = "А".repeat(40);
    let (first, second) = split_school(&name, 32);

    assert_eq!(first.chars().count(), 32);
    assert_eq!(second.chars().count(), 8);
  }

  #[test]
  fn short_school_stays_on_one_line() {
    assert_eq!(split_school("ТУЕС", 32), ("ТУЕС".to_string(), String::new()));
  }

  #[test]
  fn placements() {
    let application = Application {
      parent_name: "Мария Петрова".to_string(),
      student_name: "Иван Петров".to_string(),
      gender: "female".to_string(),
      test: "Математика".to_string(),
      ..Application::default()
    };
    let layout = FormLayout::default();

    let placements = layout.place(&application);

    assert_eq!(
      placements.iter().map(|p| p.text.as_str()).collect::<Vec<_>>(),
      vec!["Мария Петрова", "Иван Петров", "--", "Математика", "X"]
    );
    assert_eq!(placements[3].position.page, 1);
    assert_eq!(placements[4].position, layout.female);
  }
}
