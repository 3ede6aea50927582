//! Page layout in millimetres, independent of the PDF writer.
//!
//! Coordinates are measured from the top-left corner of the page; `y_mm` is
//! the text baseline. The renderer flips them into PDF user space.

use crate::model::{DocModel, SectionBody};

// ---------------------------------------------------------------------------
// Page geometry
// ---------------------------------------------------------------------------

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 20.0;
pub const LINE_HEIGHT_MM: f32 = 6.0;
pub const FOOTER_BAND_MM: f32 = 15.0;

/// Lowest baseline a body line may use.
pub const CONTENT_BOTTOM_MM: f32 = PAGE_HEIGHT_MM - MARGIN_MM - FOOTER_BAND_MM;
pub const CONTENT_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;

/// Column where field values start.
pub const FIELD_VALUE_OFFSET_MM: f32 = 55.0;

pub const TITLE_SIZE_PT: f32 = 16.0;
pub const SUBTITLE_SIZE_PT: f32 = 11.0;
pub const HEADING_SIZE_PT: f32 = 12.0;
pub const BODY_SIZE_PT: f32 = 10.0;
pub const FOOTER_SIZE_PT: f32 = 8.0;

const TITLE_HEIGHT_MM: f32 = 10.0;
const HEADING_GAP_MM: f32 = 4.0;
const PARAGRAPH_GAP_MM: f32 = 2.0;

const PT_TO_MM: f32 = 25.4 / 72.0;

/// Average Helvetica glyph width is about half the font size.
pub fn estimate_width_mm(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * 0.5 * size_pt * PT_TO_MM
}

fn max_chars(width_mm: f32, size_pt: f32) -> usize {
    let per_char = 0.5 * size_pt * PT_TO_MM;
    ((width_mm / per_char).floor() as usize).max(1)
}

/// Greedy word wrap against the width estimate.
///
/// Words longer than a full line are hard-split. Blank input yields no lines.
pub fn wrap_text(text: &str, width_mm: f32, size_pt: f32) -> Vec<String> {
    let limit = max_chars(width_mm, size_pt);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > limit {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(limit);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current_len == 0 {
            word.len()
        } else {
            current_len + 1 + word.len()
        };
        if needed > limit {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

// ---------------------------------------------------------------------------
// Laid-out output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub x_mm: f32,
    pub y_mm: f32,
    pub size_pt: f32,
    pub bold: bool,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub lines: Vec<PlacedText>,
}

impl PageLayout {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.text.as_str())
    }
}

/// Lines of one unbreakable block, positioned relative to the block top.
struct Block {
    height_mm: f32,
    lines: Vec<PlacedText>,
}

impl Block {
    fn new() -> Self {
        Self {
            height_mm: 0.0,
            lines: Vec::new(),
        }
    }

    fn push_line(&mut self, x_mm: f32, size_pt: f32, bold: bool, text: String) {
        self.height_mm += LINE_HEIGHT_MM;
        self.lines.push(PlacedText {
            x_mm,
            y_mm: self.height_mm,
            size_pt,
            bold,
            text,
        });
    }

    /// Add a value continuation on the same baseline as the last pushed line.
    fn push_beside(&mut self, x_mm: f32, size_pt: f32, bold: bool, text: String) {
        self.lines.push(PlacedText {
            x_mm,
            y_mm: self.height_mm,
            size_pt,
            bold,
            text,
        });
    }

    fn gap(&mut self, mm: f32) {
        self.height_mm += mm;
    }

    fn append(&mut self, other: Block) {
        let offset = self.height_mm;
        for mut line in other.lines {
            line.y_mm += offset;
            self.lines.push(line);
        }
        self.height_mm += other.height_mm;
    }
}

struct Paginator {
    pages: Vec<PageLayout>,
    current: PageLayout,
    cursor_mm: f32,
}

impl Paginator {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: PageLayout::default(),
            cursor_mm: MARGIN_MM,
        }
    }

    fn is_page_empty(&self) -> bool {
        self.current.lines.is_empty()
    }

    fn break_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
        self.cursor_mm = MARGIN_MM;
    }

    /// Place `block`, breaking first when it does not fit below the cursor.
    /// A block taller than a whole page is placed at the top of a fresh page
    /// and split line by line.
    fn place(&mut self, block: Block) {
        if self.cursor_mm + block.height_mm > CONTENT_BOTTOM_MM && !self.is_page_empty() {
            self.break_page();
        }
        if self.cursor_mm + block.height_mm <= CONTENT_BOTTOM_MM {
            let top = self.cursor_mm;
            for mut line in block.lines {
                line.y_mm += top;
                self.current.lines.push(line);
            }
            self.cursor_mm += block.height_mm;
            return;
        }
        let mut shift = self.cursor_mm;
        for mut line in block.lines {
            if line.y_mm + shift > CONTENT_BOTTOM_MM {
                self.break_page();
                shift = MARGIN_MM + LINE_HEIGHT_MM - line.y_mm;
            }
            line.y_mm += shift;
            self.cursor_mm = line.y_mm;
            self.current.lines.push(line);
        }
    }

    fn finish(mut self) -> Vec<PageLayout> {
        if !self.is_page_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

fn heading_block(text: &str) -> Block {
    let mut b = Block::new();
    b.gap(HEADING_GAP_MM);
    for line in wrap_text(text, CONTENT_WIDTH_MM, HEADING_SIZE_PT) {
        b.push_line(MARGIN_MM, HEADING_SIZE_PT, true, line);
    }
    b
}

fn field_block(label: &str, value: &str) -> Block {
    let label_width = FIELD_VALUE_OFFSET_MM - 2.0;
    let value_width = CONTENT_WIDTH_MM - FIELD_VALUE_OFFSET_MM;
    let value_x = MARGIN_MM + FIELD_VALUE_OFFSET_MM;

    let labels = wrap_text(label, label_width, BODY_SIZE_PT);
    let values = wrap_text(value, value_width, BODY_SIZE_PT);

    let mut b = Block::new();
    for i in 0..labels.len().max(values.len()) {
        match (labels.get(i), values.get(i)) {
            (Some(l), Some(v)) => {
                b.push_line(MARGIN_MM, BODY_SIZE_PT, true, l.clone());
                b.push_beside(value_x, BODY_SIZE_PT, false, v.clone());
            }
            (Some(l), None) => b.push_line(MARGIN_MM, BODY_SIZE_PT, true, l.clone()),
            (None, Some(v)) => b.push_line(value_x, BODY_SIZE_PT, false, v.clone()),
            (None, None) => {}
        }
    }
    b
}

fn paragraph_blocks(text: &str) -> Vec<Block> {
    wrap_text(text, CONTENT_WIDTH_MM, BODY_SIZE_PT)
        .into_iter()
        .map(|line| {
            let mut b = Block::new();
            b.push_line(MARGIN_MM, BODY_SIZE_PT, false, line);
            b
        })
        .collect()
}

/// Lay out `doc` into pages. Always returns at least one page.
pub fn layout(doc: &DocModel) -> Vec<PageLayout> {
    let mut pager = Paginator::new();

    let mut header = Block::new();
    for line in wrap_text(&doc.title, CONTENT_WIDTH_MM, TITLE_SIZE_PT) {
        header.push_line(MARGIN_MM, TITLE_SIZE_PT, true, line);
    }
    header.gap(TITLE_HEIGHT_MM - LINE_HEIGHT_MM);
    if let Some(sub) = doc.subtitle.as_deref().filter(|s| !s.trim().is_empty()) {
        for line in wrap_text(sub, CONTENT_WIDTH_MM, SUBTITLE_SIZE_PT) {
            header.push_line(MARGIN_MM, SUBTITLE_SIZE_PT, false, line);
        }
    }
    pager.place(header);

    for section in doc.sections.iter().filter(|s| !s.is_empty()) {
        let mut body: Vec<Block> = match &section.body {
            SectionBody::Fields(fields) => fields
                .iter()
                .filter_map(|f| f.printable().map(|v| field_block(&f.label, v)))
                .collect(),
            SectionBody::Paragraphs(ps) => {
                let mut blocks = Vec::new();
                for (i, p) in ps.iter().filter(|p| !p.trim().is_empty()).enumerate() {
                    let mut lines = paragraph_blocks(p);
                    if i > 0 {
                        if let Some(first) = lines.first_mut() {
                            let mut gap = Block::new();
                            gap.gap(PARAGRAPH_GAP_MM);
                            gap.append(std::mem::replace(first, Block::new()));
                            *first = gap;
                        }
                    }
                    blocks.extend(lines);
                }
                blocks
            }
        };

        // Heading travels with the first body block.
        let mut lead = heading_block(&section.heading);
        if !body.is_empty() {
            lead.append(body.remove(0));
        }
        pager.place(lead);
        for block in body {
            pager.place(block);
        }
    }

    pager.finish()
}
