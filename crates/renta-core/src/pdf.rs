//! PDF serialization of a rendered document

use crate::render::{Instruction, RenderedDocument};
use anyhow::{anyhow, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::path::Path;

/// Default file name offered for download
pub const DEFAULT_FILE_NAME: &str = "declaracion_renta_modelo100.pdf";

/// Serialize to PDF bytes. The same document always yields the same bytes.
pub fn to_pdf_bytes(rendered: &RenderedDocument) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in page_groups(rendered)? {
        let page_id = add_page(&mut doc, pages_id, resources_id, page)?;
        kids.push(page_id.into());
    }
    if kids.is_empty() {
        return Err(anyhow!("Rendered document has no pages"));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| anyhow!("Failed to serialize PDF: {}", e))?;
    Ok(bytes)
}

/// Serialize and write to `path`
pub fn write_pdf(rendered: &RenderedDocument, path: &Path) -> Result<()> {
    let bytes = to_pdf_bytes(rendered)?;
    std::fs::write(path, bytes)
        .map_err(|e| anyhow!("Failed to write {:?}: {}", path, e))?;
    tracing::info!("Wrote {} page(s) to {:?}", rendered.page_count(), path);
    Ok(())
}

struct PageGroup<'a> {
    width: i32,
    height: i32,
    texts: Vec<&'a Instruction>,
}

fn page_groups(rendered: &RenderedDocument) -> Result<Vec<PageGroup<'_>>> {
    let mut groups: Vec<PageGroup> = Vec::new();
    for ins in &rendered.instructions {
        match ins {
            Instruction::BeginPage { width, height } => groups.push(PageGroup {
                width: *width,
                height: *height,
                texts: Vec::new(),
            }),
            Instruction::Text { .. } => groups
                .last_mut()
                .ok_or_else(|| anyhow!("Text drawn before the first page"))?
                .texts
                .push(ins),
        }
    }
    Ok(groups)
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    page: PageGroup,
) -> Result<ObjectId> {
    let mut operations = Vec::new();
    for ins in page.texts {
        if let Instruction::Text { x, y, size, text } = ins {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Integer(*size as i64)],
            ));
            operations.push(Operation::new(
                "Td",
                vec![Object::Integer(*x as i64), Object::Integer(*y as i64)],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(win_ansi(text), StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
    }

    let content = Content { operations };
    let encoded = content
        .encode()
        .map_err(|e| anyhow!("Failed to encode page content: {}", e))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(page.width as i64),
            Object::Integer(page.height as i64),
        ],
    }))
}

/// Encode for the standard WinAnsi (CP1252) font encoding. Characters it
/// cannot represent become '?'.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => b'?',
        })
        .collect()
}
