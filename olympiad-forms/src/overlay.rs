use anyhow::anyhow;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{info, warn};

use crate::font::{Encoder, FontSource};
use crate::layout::Placement;

const FONT_RESOURCE: &str = "FOverlay";

/// Draws the placements onto a copy of the template and returns the new document.
pub fn merge(
  template: &[u8],
  placements: &[Placement],
  font: &FontSource,
  font_size: f32,
) -> anyhow::Result<Vec<u8>> {
  let mut document = Document::load_mem(template)?;
  let pages = document.get_pages().into_values().collect::<Vec<ObjectId>>();
  let mut encoder = Encoder::new(font)?;

  let mut overlays = pages.iter().map(|_| Vec::new()).collect::<Vec<Vec<Operation>>>();
  for placement in placements {
    match overlays.get_mut(placement.position.page) {
      None => warn!(
        "Template has {} pages, skipping {:?} on page {}",
        pages.len(),
        placement.text,
        placement.position.page + 1
      ),
      Some(operations) => {
        let position = placement.position;
        operations.push(Operation::new(
          "Tm",
          vec![
            Object::Real(1.0),
            Object::Real(0.0),
            Object::Real(0.0),
            Object::Real(1.0),
            Object::Real(position.x),
            Object::Real(position.y),
          ],
        ));
        operations.push(Operation::new("Tj", vec![encoder.encode(&placement.text)]));
      }
    }
  }

  let font_id = encoder.add_font(&mut document);

  for (page_id, operations) in pages.into_iter().zip(overlays) {
    if operations.is_empty() {
      continue;
    }

    let mut content = vec![
      Operation::new("q", vec![]),
      Operation::new("BT", vec![]),
      Operation::new(
        "Tf",
        vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), Object::Real(font_size)],
      ),
    ];
    content.extend(operations);
    content.push(Operation::new("ET", vec![]));
    content.push(Operation::new("Q", vec![]));

    let overlay = Content { operations: content }.encode()?;
    stamp_page(&mut document, page_id, font_id, overlay)?;
  }

  let mut output = Vec::new();
  document.save_to(&mut output)?;
  info!("Filled form with {} fields", placements.len());

  Ok(output)
}

/// Appends the overlay after the page's own content, isolated by a q/Q pair so
/// the template's graphics state cannot leak into it.
fn stamp_page(
  document: &mut Document,
  page_id: ObjectId,
  font_id: ObjectId,
  overlay: Vec<u8>,
) -> anyhow::Result<()> {
  let mut resources = inherited_resources(document, page_id)?;
  let mut fonts = match resources.get(b"Font") {
    Ok(fonts) => resolve_dictionary(document, fonts)?.clone(),
    Err(_) => Dictionary::new(),
  };
  fonts.set(FONT_RESOURCE, Object::Reference(font_id));
  resources.set("Font", Object::Dictionary(fonts));

  let existing = page_contents(document, page_id)?;
  let save = document.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
  let restore = document.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
  let overlay = document.add_object(Stream::new(Dictionary::new(), overlay));

  let mut contents = Vec::with_capacity(existing.len() + 3);
  contents.push(Object::Reference(save));
  contents.extend(existing);
  contents.push(Object::Reference(restore));
  contents.push(Object::Reference(overlay));

  let page = document.get_object_mut(page_id)?.as_dict_mut()?;
  page.set("Resources", Object::Dictionary(resources));
  page.set("Contents", Object::Array(contents));

  Ok(())
}

fn page_contents(document: &Document, page_id: ObjectId) -> anyhow::Result<Vec<Object>> {
  let page = document.get_dictionary(page_id)?;
  Ok(match page.get(b"Contents") {
    Err(_) => Vec::new(),
    Ok(Object::Array(items)) => items.clone(),
    Ok(Object::Reference(id)) => match document.get_object(*id)? {
      Object::Array(items) => items.clone(),
      _ => vec![Object::Reference(*id)],
    },
    Ok(_) => return Err(anyhow!("Page {:?} has malformed contents", page_id)),
  })
}

/// Resources of the page, or of the nearest ancestor in the page tree.
fn inherited_resources(document: &Document, page_id: ObjectId) -> anyhow::Result<Dictionary> {
  let mut node = document.get_dictionary(page_id)?;
  loop {
    if let Ok(resources) = node.get(b"Resources") {
      return Ok(resolve_dictionary(document, resources)?.clone());
    }
    match node.get(b"Parent").and_then(Object::as_reference) {
      Ok(parent) => node = document.get_dictionary(parent)?,
      Err(_) => return Ok(Dictionary::new()),
    }
  }
}

fn resolve_dictionary<'a>(
  document: &'a Document,
  object: &'a Object,
) -> anyhow::Result<&'a Dictionary> {
  match object {
    Object::Dictionary(dictionary) => Ok(dictionary),
    Object::Reference(id) => Ok(document.get_dictionary(*id)?),
    _ => Err(anyhow!("Expected a dictionary, got {:?}", object)),
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use lopdf::dictionary;

  use crate::layout::Position;

  use super::*;

  /// Two page A4 template. Resources sit on the page tree node so the overlay
  /// has to find them through the parent.
  pub(crate) fn template() -> Vec<u8> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let helvetica = document.add_object(dictionary! {
      "Type" => "Font",
      "Subtype" => "Type1",
      "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for text in ["Declaration", "Test"] {
      let content = Content {
        operations: vec![
          Operation::new("BT", vec![]),
          Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(14)]),
          Operation::new("Td", vec![Object::Integer(72), Object::Integer(760)]),
          Operation::new("Tj", vec![Object::string_literal(text)]),
          Operation::new("ET", vec![]),
        ],
      };
      let content_id = document.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
      kids.push(Object::Reference(document.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
      })));
    }

    document.objects.insert(
      pages_id,
      Object::Dictionary(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(2),
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => helvetica } },
        "MediaBox" => vec![
          Object::Integer(0),
          Object::Integer(0),
          Object::Integer(595),
          Object::Integer(842),
        ],
      }),
    );
    let catalog_id = document.add_object(dictionary! {
      "Type" => "Catalog",
      "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    document.save_to(&mut bytes).unwrap();
    bytes
  }

  fn placement(text: &str, page: usize) -> Placement {
    Placement {
      text: text.to_string(),
      position: Position { x: 100.0, y: 500.0, page },
    }
  }

  fn stream_text(document: &Document, object: &Object) -> String {
    let id = object.as_reference().unwrap();
    let stream = document.get_object(id).unwrap().as_stream().unwrap();
    String::from_utf8_lossy(&stream.content).into_owned()
  }

  #[test]
  fn stamps_first_page() {
    let filled = merge(
      &template(),
      &[placement("Maria Petrova", 0)],
      &FontSource::Standard,
      12.0,
    )
    .unwrap();

    let document = Document::load_mem(&filled).unwrap();
    let pages = document.get_pages();
    let first = document.get_dictionary(pages[&1]).unwrap();

    let contents = first.get(b"Contents").unwrap().as_array().unwrap();
    assert_eq!(contents.len(), 4);
    assert_eq!(stream_text(&document, &contents[0]), "q\n");
    assert!(stream_text(&document, &contents[1]).contains("Declaration"));
    assert_eq!(stream_text(&document, &contents[2]), "\nQ\n");
    let overlay = stream_text(&document, &contents[3]);
    assert!(overlay.contains("Maria Petrova"));
    assert!(overlay.contains(FONT_RESOURCE));

    let resources = first.get(b"Resources").unwrap().as_dict().unwrap();
    let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
    assert!(fonts.has(b"F1"));
    assert!(fonts.has(FONT_RESOURCE.as_bytes()));

    let second = document.get_dictionary(pages[&2]).unwrap();
    assert!(!second.has(b"Resources"));
    assert!(second.get(b"Contents").unwrap().as_reference().is_ok());
  }

  #[test]
  fn skips_pages_beyond_template() {
    let filled = merge(
      &template(),
      &[placement("Test", 1), placement("Lost", 5)],
      &FontSource::Standard,
      12.0,
    )
    .unwrap();

    let document = Document::load_mem(&filled).unwrap();
    let pages = document.get_pages();
    let second = document.get_dictionary(pages[&2]).unwrap();
    let contents = second.get(b"Contents").unwrap().as_array().unwrap();
    let overlay = stream_text(&document, &contents[3]);
    assert!(overlay.contains("Test"));
    assert!(!overlay.contains("Lost"));
  }

  #[test]
  fn rejects_garbage_template() {
    assert!(merge(b"not a pdf", &[], &FontSource::Standard, 12.0).is_err());
  }
}
