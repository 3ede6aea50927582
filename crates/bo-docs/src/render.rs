//! PDF writer over laid-out pages.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::layout::{
    estimate_width_mm, layout, PageLayout, PlacedText, FOOTER_SIZE_PT, MARGIN_MM, PAGE_HEIGHT_MM,
    PAGE_WIDTH_MM,
};
use crate::model::DocModel;
use crate::DocsError;

const MM_TO_PT: f32 = 72.0 / 25.4;

/// Footer baseline, inside the footer band.
const FOOTER_Y_MM: f32 = PAGE_HEIGHT_MM - MARGIN_MM - 4.0;

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";

/// `Generated on dd/mm/YYYY HH:MM` in `tz`.
pub fn generated_on(at: DateTime<Utc>, tz: Tz) -> String {
    format!(
        "Generated on {}",
        at.with_timezone(&tz).format("%d/%m/%Y %H:%M")
    )
}

pub fn page_label(index: usize, total: usize) -> String {
    format!("Page {index} / {total}")
}

/// Encode for a WinAnsi (CP-1252) font. Unmappable characters become `?`.
pub fn to_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            'Œ' => 0x8c,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            'œ' => 0x9c,
            'Ÿ' => 0x9f,
            _ => b'?',
        })
        .collect()
}

fn text_ops(ops: &mut Vec<Operation>, line: &PlacedText) {
    let font = if line.bold { FONT_BOLD } else { FONT_REGULAR };
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![font.into(), line.size_pt.into()],
    ));
    ops.push(Operation::new(
        "Td",
        vec![
            (line.x_mm * MM_TO_PT).into(),
            ((PAGE_HEIGHT_MM - line.y_mm) * MM_TO_PT).into(),
        ],
    ));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(to_win_ansi(&line.text), StringFormat::Literal)],
    ));
    ops.push(Operation::new("ET", vec![]));
}

fn footer_lines(index: usize, total: usize, generated: &str) -> [PlacedText; 2] {
    let label = page_label(index, total);
    let right_x = PAGE_WIDTH_MM - MARGIN_MM - estimate_width_mm(&label, FOOTER_SIZE_PT);
    [
        PlacedText {
            x_mm: MARGIN_MM,
            y_mm: FOOTER_Y_MM,
            size_pt: FOOTER_SIZE_PT,
            bold: false,
            text: generated.to_string(),
        },
        PlacedText {
            x_mm: right_x,
            y_mm: FOOTER_Y_MM,
            size_pt: FOOTER_SIZE_PT,
            bold: false,
            text: label,
        },
    ]
}

fn font(doc: &mut Document, base: &str) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    })
}

/// Render already laid-out pages, stamping the footer on every page.
pub fn render_pages(
    pages: &[PageLayout],
    generated_at: DateTime<Utc>,
    tz: Tz,
) -> Result<Vec<u8>, DocsError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = font(&mut doc, "Helvetica");
    let bold = font(&mut doc, "Helvetica-Bold");
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FONT_REGULAR => regular,
            FONT_BOLD => bold,
        },
    });

    let generated = generated_on(generated_at, tz);
    let total = pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(total);

    for (i, page) in pages.iter().enumerate() {
        let mut ops: Vec<Operation> = Vec::new();
        for line in &page.lines {
            text_ops(&mut ops, line);
        }
        for line in &footer_lines(i + 1, total, &generated) {
            text_ops(&mut ops, line);
        }

        let content = Content { operations: ops };
        let encoded = content
            .encode()
            .map_err(|e| DocsError::Render(format!("encode page {}: {e}", i + 1)))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => total as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            (PAGE_WIDTH_MM * MM_TO_PT).into(),
            (PAGE_HEIGHT_MM * MM_TO_PT).into(),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out: Vec<u8> = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| DocsError::Render(format!("write pdf: {e}")))?;
    Ok(out)
}

/// Lay out and render `model` to PDF bytes.
pub fn render_pdf(
    model: &DocModel,
    generated_at: DateTime<Utc>,
    tz: Tz,
) -> Result<Vec<u8>, DocsError> {
    render_pages(&layout(model), generated_at, tz)
}
