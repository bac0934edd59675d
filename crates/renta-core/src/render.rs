//! Deterministic page layout for a form record.
//!
//! The output depends only on the record and the layout: no clock, locale
//! or randomness is involved, so the same record always produces the same
//! instruction list.
//!
//! Sections and fields are drawn in schema order. Unset fields are skipped
//! without advancing the cursor, so a field's position on the page depends
//! on which fields before it are set; only the relative order is fixed.
//! When the cursor would drop below the bottom margin a new page is started.

use crate::form::FormRecord;
use crate::schema::{Field, Section};
use serde::Serialize;

pub const DEFAULT_TITLE: &str = "Declaración de la Renta - Modelo 100";

/// Page geometry in PDF points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    pub width: i32,
    pub height: i32,
    pub margin_left: i32,
    pub margin_bottom: i32,
    pub title_y: i32,
    pub title_size: u16,
    /// Cursor position for the first section header of every page
    pub top_offset: i32,
    pub header_size: u16,
    /// Drop after a section header, before its first field
    pub header_gap: i32,
    pub field_size: u16,
    pub line_height: i32,
    /// Extra drop before every section header except the first
    pub section_gap: i32,
}

impl Default for PageLayout {
    /// A4 portrait
    fn default() -> Self {
        Self {
            width: 595,
            height: 842,
            margin_left: 50,
            margin_bottom: 50,
            title_y: 800,
            title_size: 18,
            top_offset: 750,
            header_size: 14,
            header_gap: 30,
            field_size: 12,
            line_height: 20,
            section_gap: 20,
        }
    }
}

/// One drawing step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    BeginPage { width: i32, height: i32 },
    Text { x: i32, y: i32, size: u16, text: String },
}

/// Ordered drawing instructions for a whole document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDocument {
    pub instructions: Vec<Instruction>,
}

impl RenderedDocument {
    /// Instructions grouped per page, without the `BeginPage` markers
    pub fn pages(&self) -> Vec<&[Instruction]> {
        let mut pages = Vec::new();
        let mut start = None;
        for (i, ins) in self.instructions.iter().enumerate() {
            if let Instruction::BeginPage { .. } = ins {
                if let Some(s) = start {
                    pages.push(&self.instructions[s..i]);
                }
                start = Some(i + 1);
            }
        }
        if let Some(s) = start {
            pages.push(&self.instructions[s..]);
        }
        pages
    }

    pub fn page_count(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| matches!(i, Instruction::BeginPage { .. }))
            .count()
    }

    /// Text of every text instruction, in drawing order
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.instructions.iter().filter_map(|i| match i {
            Instruction::Text { text, .. } => Some(text.as_str()),
            Instruction::BeginPage { .. } => None,
        })
    }
}

/// Lays out form records on pages
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    layout: PageLayout,
    title: String,
}

impl Default for DocumentRenderer {
    fn default() -> Self {
        Self::new(PageLayout::default(), DEFAULT_TITLE)
    }
}

impl DocumentRenderer {
    pub fn new(layout: PageLayout, title: impl Into<String>) -> Self {
        Self {
            layout,
            title: title.into(),
        }
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn render(&self, record: &FormRecord) -> RenderedDocument {
        let layout = &self.layout;
        let mut cursor = Cursor {
            layout,
            y: layout.top_offset,
            instructions: Vec::new(),
        };

        cursor.begin_page();
        cursor.instructions.push(Instruction::Text {
            x: layout.margin_left,
            y: layout.title_y,
            size: layout.title_size,
            text: self.title.clone(),
        });

        for (i, section) in Section::all().into_iter().enumerate() {
            if i > 0 {
                cursor.y -= layout.section_gap;
            }
            let fields: Vec<(Field, &str)> = section
                .fields()
                .iter()
                .filter_map(|f| record.get(*f).filter(|v| !v.is_empty()).map(|v| (*f, v)))
                .collect();

            // A header stays on the same page as its first field
            if !fields.is_empty() {
                cursor.keep_room(layout.header_gap);
            }
            cursor.line(layout.header_size, section.title().to_string(), layout.header_gap);

            for (field, value) in fields {
                cursor.line(
                    layout.field_size,
                    format!("{}: {}", field.label(), value),
                    layout.line_height,
                );
            }
        }

        RenderedDocument {
            instructions: cursor.instructions,
        }
    }
}

/// Render with the default A4 layout and title
pub fn render(record: &FormRecord) -> RenderedDocument {
    DocumentRenderer::default().render(record)
}

struct Cursor<'a> {
    layout: &'a PageLayout,
    y: i32,
    instructions: Vec<Instruction>,
}

impl Cursor<'_> {
    fn begin_page(&mut self) {
        self.instructions.push(Instruction::BeginPage {
            width: self.layout.width,
            height: self.layout.height,
        });
        self.y = self.layout.top_offset;
    }

    /// Start a new page unless a line `below` points under the cursor still fits
    fn keep_room(&mut self, below: i32) {
        if self.y - below < self.layout.margin_bottom {
            self.begin_page();
        }
    }

    /// Draw one line at the cursor, then move the cursor down by `advance`
    fn line(&mut self, size: u16, text: String, advance: i32) {
        if self.y < self.layout.margin_bottom {
            self.begin_page();
        }
        self.instructions.push(Instruction::Text {
            x: self.layout.margin_left,
            y: self.y,
            size,
            text,
        });
        self.y -= advance;
    }
}
