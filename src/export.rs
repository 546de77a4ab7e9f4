//! PDF export of the active conversation.
//!
//! Layout is a deterministic function of the transcript and the
//! current time: each message becomes one numbered, timestamped line,
//! and a new page starts whenever the running vertical offset would
//! pass the fixed page height. Pagination is computed as data first so
//! it can be tested without rendering; genpdf then renders the pages.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use genpdf::elements::{Break, PageBreak, Paragraph};
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{Style, StyledString};
use genpdf::{Document, Margins, SimplePageDecorator};
use tracing::info;

use crate::transcript::Transcript;

/// Font size for transcript lines (in points).
const NORMAL_SIZE: u8 = 11;

/// Font size for the document title.
const TITLE_SIZE: u8 = 16;

/// Page margins in mm.
const MARGIN_MM: f64 = 20.0;

/// Vertical offset of the first line on a page.
const START_Y: u32 = 20;

/// Vertical advance per line.
const LINE_HEIGHT: u32 = 10;

/// A line past this offset starts a new page.
const PAGE_HEIGHT: u32 = 280;

/// Format every message as `"<n>. [<time>] <author>: <text>"`.
fn transcript_lines(transcript: &Transcript, now: DateTime<Local>) -> Vec<String> {
    let timestamp = now.format("%H:%M:%S");
    transcript
        .iter()
        .enumerate()
        .map(|(i, msg)| format!("{}. [{}] {}: {}", i + 1, timestamp, msg.author, msg.text))
        .collect()
}

/// Split lines into pages under the fixed line-height and page-height
/// constants.
fn paginate(lines: Vec<String>) -> Vec<Vec<String>> {
    let mut pages = Vec::new();
    let mut page = Vec::new();
    let mut y = START_Y;

    for line in lines {
        if y > PAGE_HEIGHT && !page.is_empty() {
            pages.push(std::mem::take(&mut page));
            y = START_Y;
        }
        page.push(line);
        y += LINE_HEIGHT;
    }
    if !page.is_empty() {
        pages.push(page);
    }
    pages
}

/// File name for an export performed on `date`.
pub(crate) fn export_filename(now: DateTime<Local>) -> String {
    format!("Chat_History_{}.pdf", now.format("%Y-%m-%d"))
}

/// Write the transcript to a PDF file in `dir`, returning the path.
pub(crate) fn export_pdf(dir: &Path, transcript: &Transcript, now: DateTime<Local>) -> Result<PathBuf> {
    let path = dir.join(export_filename(now));
    info!(
        path = %path.display(),
        messages = transcript.len(),
        "Exporting chat history to PDF"
    );

    let font_family =
        load_font_family().with_context(|| "Failed to load a system font for PDF export")?;

    let mut doc = Document::new(font_family);
    doc.set_title("Chat History");

    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(Margins::trbl(MARGIN_MM, MARGIN_MM, MARGIN_MM, MARGIN_MM));
    doc.set_page_decorator(decorator);

    let title_style = Style::new().bold().with_font_size(TITLE_SIZE);
    doc.push(Paragraph::new(StyledString::new("Chat History", title_style)));
    doc.push(Break::new(1.0));

    let pages = paginate(transcript_lines(transcript, now));
    let page_count = pages.len();
    for (i, page) in pages.into_iter().enumerate() {
        if i > 0 {
            doc.push(PageBreak::new());
        }
        for line in page {
            let style = Style::new().with_font_size(NORMAL_SIZE);
            doc.push(Paragraph::new(StyledString::new(line, style)));
        }
    }

    doc.render_to_file(&path)
        .with_context(|| format!("Failed to render PDF to {}", path.display()))?;

    info!(pages = page_count, "Chat history exported");
    Ok(path)
}

/// Load a regular/bold/italic font family from well-known system font
/// locations.
fn load_font_family() -> Result<FontFamily<FontData>> {
    // (regular, bold, italic, bold italic)
    const CANDIDATES: &[[&str; 4]] = &[
        [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
            "/usr/share/fonts/truetype/dejavu/DejaVuSans-Oblique.ttf",
            "/usr/share/fonts/truetype/dejavu/DejaVuSans-BoldOblique.ttf",
        ],
        [
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Italic.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-BoldItalic.ttf",
        ],
        [
            "/System/Library/Fonts/Supplemental/Arial.ttf",
            "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
            "/System/Library/Fonts/Supplemental/Arial Italic.ttf",
            "/System/Library/Fonts/Supplemental/Arial Bold Italic.ttf",
        ],
    ];

    for paths in CANDIDATES {
        if paths.iter().all(|p| Path::new(p).exists()) {
            let load = |p: &str| -> Result<FontData> {
                FontData::new(
                    std::fs::read(p).with_context(|| format!("Failed to read font: {p}"))?,
                    None,
                )
                .map_err(|e| anyhow::anyhow!("Failed to parse font {p}: {e}"))
            };
            return Ok(FontFamily {
                regular: load(paths[0])?,
                bold: load(paths[1])?,
                italic: load(paths[2])?,
                bold_italic: load(paths[3])?,
            });
        }
    }

    anyhow::bail!("No usable sans-serif font found on this system")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Message;
    use chrono::TimeZone;

    fn transcript_of(n: usize) -> Transcript {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("question {i}"))
                } else {
                    Message::bot(format!("answer {i}"))
                }
            })
            .collect()
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap()
    }

    #[test]
    fn test_line_format() {
        let transcript: Transcript =
            [Message::user("hello"), Message::bot("hi there")].into_iter().collect();
        let lines = transcript_lines(&transcript, fixed_time());

        assert_eq!(lines[0], "1. [15:09:26] You: hello");
        assert_eq!(lines[1], "2. [15:09:26] Bot: hi there");
    }

    #[test]
    fn test_thirty_messages_span_multiple_pages() {
        let lines = transcript_lines(&transcript_of(30), fixed_time());
        let pages = paginate(lines);

        assert!(pages.len() > 1);
        let total: usize = pages.iter().map(|p| p.len()).sum();
        assert_eq!(total, 30);
    }

    #[test]
    fn test_pages_respect_height_constants() {
        let lines_per_page = ((PAGE_HEIGHT - START_Y) / LINE_HEIGHT + 1) as usize;
        let pages = paginate(transcript_lines(&transcript_of(100), fixed_time()));

        for page in &pages[..pages.len() - 1] {
            assert_eq!(page.len(), lines_per_page);
        }
        assert!(pages.last().unwrap().len() <= lines_per_page);
    }

    #[test]
    fn test_short_transcript_is_single_page() {
        let pages = paginate(transcript_lines(&transcript_of(4), fixed_time()));
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].len(), 4);
    }

    #[test]
    fn test_empty_transcript_has_no_pages() {
        assert!(paginate(Vec::new()).is_empty());
    }

    #[test]
    fn test_export_filename_embeds_date() {
        assert_eq!(export_filename(fixed_time()), "Chat_History_2025-03-14.pdf");
    }
}
