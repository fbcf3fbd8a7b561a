use std::fs;
use std::path::Path;

use anyhow::Context;

pub use crate::font::FontSource;
pub use crate::layout::{split_school, Application, FormLayout, Placement, Position};

mod font;
mod layout;
mod overlay;

pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Fills the participation declaration template with applicant data.
#[derive(Clone)]
pub struct FormFiller {
  template: Vec<u8>,
  font: FontSource,
  font_size: f32,
  layout: FormLayout,
}

impl FormFiller {
  pub fn new(template: Vec<u8>, font: FontSource) -> Self {
    Self {
      template,
      font,
      font_size: DEFAULT_FONT_SIZE,
      layout: FormLayout::default(),
    }
  }

  /// Reads the template and, when given, the TrueType font. Without a font the
  /// form is written in Helvetica, which cannot show Cyrillic.
  pub fn load(template: &Path, font: Option<&Path>) -> anyhow::Result<Self> {
    let bytes = fs::read(template)
      .with_context(|| format!("Template not found at {}", template.display()))?;

    let font = match font {
      Some(path) => FontSource::load(path)?,
      None => {
        tracing::warn!("No font configured, Cyrillic text will not render");
        FontSource::Standard
      }
    };

    Ok(Self::new(bytes, font))
  }

  pub fn with_font_size(mut self, font_size: f32) -> Self {
    self.font_size = font_size;
    self
  }

  pub fn with_layout(mut self, layout: FormLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn layout(&self) -> &FormLayout {
    &self.layout
  }

  pub fn fill(&self, application: &Application) -> anyhow::Result<Vec<u8>> {
    let placements = self.layout.place(application);
    overlay::merge(&self.template, &placements, &self.font, self.font_size)
  }

  /// Fills the form and writes it to `output`, creating missing directories.
  pub fn fill_to(&self, application: &Application, output: &Path) -> anyhow::Result<Vec<u8>> {
    let bytes = self.fill(application)?;
    if let Some(parent) = output.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::write(output, &bytes).with_context(|| format!("Unable to write {}", output.display()))?;
    Ok(bytes)
  }
}
