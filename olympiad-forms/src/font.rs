use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use ttf_parser::{Face, GlyphId};
use tracing::warn;

/// Font the overlay text is drawn with.
#[derive(Clone)]
pub enum FontSource {
  /// Embedded TrueType font, required for Cyrillic text.
  TrueType { name: String, data: Vec<u8> },
  /// Built-in Helvetica, Latin-1 only.
  Standard,
}

impl FontSource {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let data = fs::read(path).with_context(|| format!("Font file not found at {}", path.display()))?;
    Face::parse(&data, 0).map_err(|err| anyhow!("Invalid font {}: {}", path.display(), err))?;

    let name = path
      .file_stem()
      .map(|stem| postscript_name(&stem.to_string_lossy()))
      .unwrap_or_else(|| postscript_name(""));

    Ok(Self::TrueType { name, data })
  }
}

/// Keeps the characters allowed in a PDF font name.
pub fn postscript_name(value: &str) -> String {
  let name = value
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
    .collect::<String>();

  if name.is_empty() {
    "FormFont".to_string()
  } else {
    name
  }
}

/// Turns text into the byte strings of the font's encoding and records what the
/// font dictionary has to describe.
pub(crate) enum Encoder<'a> {
  TrueType {
    name: &'a str,
    data: &'a [u8],
    face: Face<'a>,
    used: BTreeMap<u16, char>,
  },
  Standard,
}

impl<'a> Encoder<'a> {
  pub(crate) fn new(source: &'a FontSource) -> anyhow::Result<Self> {
    Ok(match source {
      FontSource::TrueType { name, data } => Encoder::TrueType {
        name,
        data,
        face: Face::parse(data, 0).map_err(|err| anyhow!("Invalid font {}: {}", name, err))?,
        used: BTreeMap::new(),
      },
      FontSource::Standard => Encoder::Standard,
    })
  }

  pub(crate) fn encode(&mut self, text: &str) -> Object {
    match self {
      Encoder::TrueType { face, used, .. } => {
        let mut bytes = Vec::with_capacity(text.len() * 2);
        for c in text.chars() {
          let glyph = match face.glyph_index(c) {
            Some(glyph) => glyph.0,
            None => {
              warn!("Font has no glyph for {:?}", c);
              0
            }
          };
          used.entry(glyph).or_insert(c);
          bytes.extend(glyph.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
      }
      Encoder::Standard => {
        let bytes = text
          .chars()
          .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
          .collect();
        Object::String(bytes, StringFormat::Literal)
      }
    }
  }

  /// Adds the font dictionary, and for TrueType everything it references.
  pub(crate) fn add_font(self, document: &mut Document) -> ObjectId {
    match self {
      Encoder::Standard => document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
      }),
      Encoder::TrueType {
        name,
        data,
        face,
        used,
      } => add_true_type(document, name, data, &face, &used),
    }
  }
}

fn add_true_type(
  document: &mut Document,
  name: &str,
  data: &[u8],
  face: &Face,
  used: &BTreeMap<u16, char>,
) -> ObjectId {
  let scale = 1000.0 / f32::from(face.units_per_em());
  let units = |value: i16| (f32::from(value) * scale).round() as i64;
  let base_font = Object::Name(name.as_bytes().to_vec());

  let font_file = document.add_object(Stream::new(
    dictionary! { "Length1" => data.len() as i64 },
    data.to_vec(),
  ));

  let bbox = face.global_bounding_box();
  let descriptor = document.add_object(dictionary! {
    "Type" => "FontDescriptor",
    "FontName" => base_font.clone(),
    "Flags" => Object::Integer(32),
    "FontBBox" => vec![
      Object::Integer(units(bbox.x_min)),
      Object::Integer(units(bbox.y_min)),
      Object::Integer(units(bbox.x_max)),
      Object::Integer(units(bbox.y_max)),
    ],
    "ItalicAngle" => Object::Integer(0),
    "Ascent" => units(face.ascender()),
    "Descent" => units(face.descender()),
    "CapHeight" => units(face.capital_height().unwrap_or(face.ascender())),
    "StemV" => Object::Integer(80),
    "FontFile2" => font_file,
  });

  let mut widths = Vec::with_capacity(used.len() * 2);
  for glyph in used.keys() {
    let advance = face.glyph_hor_advance(GlyphId(*glyph)).unwrap_or(0);
    widths.push(Object::Integer(i64::from(*glyph)));
    widths.push(Object::Array(vec![Object::Integer(
      (f32::from(advance) * scale).round() as i64,
    )]));
  }

  let cid_font = document.add_object(dictionary! {
    "Type" => "Font",
    "Subtype" => "CIDFontType2",
    "BaseFont" => base_font.clone(),
    "CIDSystemInfo" => dictionary! {
      "Registry" => Object::string_literal("Adobe"),
      "Ordering" => Object::string_literal("Identity"),
      "Supplement" => Object::Integer(0),
    },
    "FontDescriptor" => descriptor,
    "CIDToGIDMap" => "Identity",
    "DW" => Object::Integer(1000),
    "W" => widths,
  });

  let to_unicode = document.add_object(Stream::new(dictionary! {}, to_unicode_cmap(used).into_bytes()));

  document.add_object(dictionary! {
    "Type" => "Font",
    "Subtype" => "Type0",
    "BaseFont" => base_font,
    "Encoding" => "Identity-H",
    "DescendantFonts" => vec![Object::Reference(cid_font)],
    "ToUnicode" => to_unicode,
  })
}

/// Maps glyph ids back to text so the filled form stays searchable.
pub(crate) fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> String {
  let mut cmap = String::from(
    "/CIDInit /ProcSet findresource begin\n\
     12 dict begin\n\
     begincmap\n\
     /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
     /CMapName /Adobe-Identity-UCS def\n\
     /CMapType 2 def\n\
     1 begincodespacerange\n\
     <0000> <FFFF>\n\
     endcodespacerange\n",
  );

  // glyph 0 stands in for every missing character
  let entries = used.iter().filter(|(glyph, _)| **glyph != 0).collect::<Vec<_>>();
  // at most 100 entries per block
  for chunk in entries.chunks(100) {
    cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
    for (glyph, c) in chunk {
      let mut units = [0u16; 2];
      let unicode = c
        .encode_utf16(&mut units)
        .iter()
        .map(|unit| format!("{:04X}", unit))
        .collect::<String>();
      cmap.push_str(&format!("<{:04X}> <{}>\n", glyph, unicode));
    }
    cmap.push_str("endbfchar\n");
  }

  cmap.push_str(
    "endcmap\n\
     CMapName currentdict /CIDInit /ProcSet findresource /defineresource pop\n\
     end\n\
     end\n",
  );
  cmap
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn font_names() {
    assert_eq!(postscript_name("Arial"), "Arial");
    assert_eq!(postscript_name("DejaVu Sans_Bold"), "DejaVuSansBold");
    assert_eq!(postscript_name("шрифт"), "FormFont");
  }

  #[test]
  fn cmap_entries() {
    let used = BTreeMap::from([(36u16, 'A'), (611u16, 'Ж'), (1200u16, '😀')]);

    let cmap = to_unicode_cmap(&used);

    assert!(cmap.contains("3 beginbfchar\n"));
    assert!(cmap.contains("<0024> <0041>\n"));
    assert!(cmap.contains("<0263> <0416>\n"));
    assert!(cmap.contains("<04B0> <D83DDE00>\n"));
  }

  #[test]
  fn missing_glyph_has_no_unicode() {
    let used = BTreeMap::from([(0u16, 'Ж'), (36u16, 'A')]);

    let cmap = to_unicode_cmap(&used);

    assert!(cmap.contains("1 beginbfchar\n<0024> <0041>\nendbfchar\n"));
    assert!(!cmap.contains("<0416>"));
  }

  #[test]
  fn standard_font_replaces_non_latin() {
    let mut encoder = Encoder::new(&FontSource::Standard).unwrap();

    match encoder.encode("Ivan Иван") {
      Object::String(bytes, StringFormat::Literal) => assert_eq!(bytes, b"Ivan ????"),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn missing_font_file() {
    assert!(FontSource::load(Path::new("/nonexistent/Arial.ttf")).is_err());
  }
}
