//! PDF audit report.
//!
//! Layout runs top to bottom on A4 pages: header, project score chart,
//! ranked score bars, then the detail table. The table continues onto new
//! pages with its header repeated, and every page carries a page number.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use printpdf::image_crate::{self, DynamicImage, RgbImage};
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Rect, Rgb,
};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::chart::{self, ChartImage};
use crate::config::AppConfig;
use crate::db;
use crate::error::{Error, Result};
use crate::models::{FeedbackEntry, ProjectScore, DATE_FORMAT};
use crate::scoring::{self, ScoreBand};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const LEFT: f32 = 10.0;
const TOP: f32 = 10.0;
/// Lowest y (from the top edge) the body may reach before the footer
const BODY_BOTTOM: f32 = 277.0;
const FOOTER_Y: f32 = 287.0;

const LOGO_WIDTH: f32 = 40.0;
const CHART_WIDTH: f32 = 150.0;
const CHART_X: f32 = 25.0;

const LABEL_WIDTH: f32 = 60.0;
const BAR_WIDTH: f32 = 70.0;
const BAR_HEIGHT: f32 = 5.0;
const SCORE_WIDTH: f32 = 20.0;

const COLUMN_WIDTHS: [f32; 5] = [16.0, 45.0, 75.0, 20.0, 40.0];
const COLUMN_HEADERS: [&str; 5] = ["Project", "Category", "Subcategory", "Rating", "Comment"];
const ROW_HEIGHT: f32 = 8.0;
const CELL_PADDING: f32 = 1.0;

const TEXT_COLOUR: (u8, u8, u8) = (50, 50, 50);
const HEADER_FILL: (u8, u8, u8) = (200, 220, 255);
const STRIPE_FILL: (u8, u8, u8) = (230, 230, 230);

const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica glyph width as a fraction of the font size
const GLYPH_WIDTH: f32 = 0.5;

pub fn file_name(audit_no: i64) -> String {
    format!("audit_report_{audit_no}.pdf")
}

/// Data for one audit's report, checked non-empty.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub audit_no: i64,
    pub audit_date: NaiveDateTime,
    /// Ascending by mean score
    pub rankings: Vec<ProjectScore>,
    pub entries: Vec<FeedbackEntry>,
}

pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub pages: usize,
}

impl AuditReport {
    pub fn build(audit_no: i64, entries: Vec<FeedbackEntry>) -> Result<Self> {
        let Some(first) = entries.first() else {
            return Err(Error::NoData(format!("no feedback found for audit {audit_no}")));
        };
        let audit_date = first.date;

        let mut rankings = scoring::average_by_project(&entries);
        scoring::rank_ascending(&mut rankings);

        Ok(Self {
            audit_no,
            audit_date,
            rankings,
            entries,
        })
    }

    pub fn title(&self) -> String {
        format!("MPW Audit Report for Audit No: {}", self.audit_no)
    }

    pub fn render(&self, chart: &ChartImage, logo: Option<&Path>) -> Result<RenderedReport> {
        let mut canvas = Canvas::new(&self.title())?;

        if let Some(path) = logo {
            canvas.image(load_logo(path)?, 5.0, 5.0, LOGO_WIDTH);
        }

        canvas.centered_text(&self.title(), 15.0, Style::Bold, 15.0);
        canvas.centered_text(
            &format!("Audit Date: {}", self.audit_date.format(DATE_FORMAT)),
            10.0,
            Style::Bold,
            25.0,
        );
        canvas.y = 40.0;

        let chart_height = CHART_WIDTH * chart.height as f32 / chart.width as f32;
        canvas.image(chart_to_image(chart)?, CHART_X, canvas.y, CHART_WIDTH);
        canvas.y += chart_height + 10.0;

        self.draw_rankings(&mut canvas);
        canvas.y += 10.0;
        self.draw_table(&mut canvas);

        let pages = canvas.page_no;
        let bytes = canvas
            .doc
            .save_to_bytes()
            .map_err(|e| Error::Render(e.to_string()))?;
        Ok(RenderedReport { bytes, pages })
    }

    fn draw_rankings(&self, canvas: &mut Canvas) {
        canvas.ensure_space(10.0 + BAR_HEIGHT);
        canvas.text("Project Rankings:", 8.0, Style::Bold, LEFT, canvas.y + 6.0);
        canvas.y += 10.0;

        for score in &self.rankings {
            canvas.ensure_space(BAR_HEIGHT);
            let y = canvas.y;
            let label = format!("{}:", score.label);
            let label_x = LEFT + LABEL_WIDTH - CELL_PADDING - text_width(&label, 8.0);
            canvas.text(&label, 8.0, Style::Bold, label_x, y + 3.5);

            let filled = bar_length(score.score);
            let bar_x = LEFT + LABEL_WIDTH;
            canvas.rect(bar_x, y, filled, BAR_HEIGHT, Some(ScoreBand::from_score(score.score).rgb()));
            canvas.rect(bar_x + filled, y, BAR_WIDTH - filled, BAR_HEIGHT, None);

            let value = format_score(score.score);
            let value_x = bar_x + BAR_WIDTH + (SCORE_WIDTH - text_width(&value, 8.0)) / 2.0;
            canvas.text(&value, 8.0, Style::Bold, value_x, y + 3.5);
            canvas.y += BAR_HEIGHT;
        }
    }

    fn draw_table(&self, canvas: &mut Canvas) {
        canvas.ensure_space(10.0 + ROW_HEIGHT * 2.0);
        canvas.text("Detailed Project evaluation sheet:", 8.0, Style::Bold, LEFT, canvas.y + 6.0);
        canvas.y += 10.0;
        draw_table_header(canvas);

        for (idx, entry) in self.entries.iter().enumerate() {
            if canvas.y + ROW_HEIGHT > BODY_BOTTOM {
                canvas.new_page();
                draw_table_header(canvas);
            }
            let cells = [
                entry.project.as_str(),
                entry.category.as_str(),
                entry.subcategory.as_str(),
                entry.rating.as_str(),
                entry.comment.as_str(),
            ];
            let fill = row_is_shaded(idx).then_some(STRIPE_FILL);
            draw_row(canvas, &cells, fill, Style::Regular);
        }
    }
}

fn draw_table_header(canvas: &mut Canvas) {
    draw_row(canvas, &COLUMN_HEADERS, Some(HEADER_FILL), Style::Bold);
}

fn draw_row(canvas: &mut Canvas, cells: &[&str; 5], fill: Option<(u8, u8, u8)>, style: Style) {
    let mut x = LEFT;
    let y = canvas.y;
    for (cell, width) in cells.iter().zip(COLUMN_WIDTHS) {
        canvas.rect(x, y, width, ROW_HEIGHT, fill);
        let text = fit_text(cell, width - 2.0 * CELL_PADDING, 6.0);
        canvas.text(&text, 6.0, style, x + CELL_PADDING, y + ROW_HEIGHT / 2.0 + 1.0);
        x += width;
    }
    canvas.y += ROW_HEIGHT;
}

/// Every second data row is shaded, starting with the second.
pub fn row_is_shaded(idx: usize) -> bool {
    idx % 2 == 1
}

/// Filled part of a score bar, in mm, for a score out of 100
pub fn bar_length(score: f64) -> f32 {
    (score.clamp(0.0, 100.0) / 100.0) as f32 * BAR_WIDTH
}

pub fn format_score(score: f64) -> String {
    format!("{}%", (score * 100.0).round() / 100.0)
}

fn text_width(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * size_pt * PT_TO_MM * GLYPH_WIDTH
}

/// Cut `text` so it fits `width` mm at `size_pt`, marking the cut with "..".
pub fn fit_text(text: &str, width: f32, size_pt: f32) -> String {
    if text_width(text, size_pt) <= width {
        return text.to_string();
    }
    let max_chars = (width / (size_pt * PT_TO_MM * GLYPH_WIDTH)).floor() as usize;
    let keep = max_chars.saturating_sub(2);
    let mut fitted: String = text.chars().take(keep).collect();
    fitted.push_str("..");
    fitted
}

fn load_logo(path: &Path) -> Result<Image> {
    let logo = image_crate::open(path).map_err(|e| Error::Asset {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(Image::from_dynamic_image(&logo))
}

fn chart_to_image(chart: &ChartImage) -> Result<Image> {
    let buffer = RgbImage::from_raw(chart.width, chart.height, chart.pixels.clone())
        .ok_or_else(|| Error::Render("chart buffer does not match its dimensions".to_string()))?;
    Ok(Image::from_dynamic_image(&DynamicImage::ImageRgb8(buffer)))
}

fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(Rgb::new(
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
        None,
    ))
}

#[derive(Debug, Clone, Copy)]
enum Style {
    Regular,
    Bold,
    Italic,
}

/// Page cursor over a PDF document. `y` runs downwards from the top edge in
/// mm; conversion to PDF coordinates happens at draw time.
struct Canvas {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    page_no: usize,
    y: f32,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

impl Canvas {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let font = |f: BuiltinFont| doc.add_builtin_font(f).map_err(|e| Error::Render(e.to_string()));
        let regular = font(BuiltinFont::Helvetica)?;
        let bold = font(BuiltinFont::HelveticaBold)?;
        let italic = font(BuiltinFont::HelveticaOblique)?;
        let layer = doc.get_page(page).get_layer(layer);

        let canvas = Self {
            doc,
            layer,
            page_no: 1,
            y: TOP,
            regular,
            bold,
            italic,
        };
        canvas.footer();
        Ok(canvas)
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.page_no += 1;
        self.y = TOP;
        self.footer();
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y + height > BODY_BOTTOM {
            self.new_page();
        }
    }

    fn footer(&self) {
        let label = format!("Page {}", self.page_no);
        let x = (PAGE_WIDTH - text_width(&label, 6.0)) / 2.0;
        self.text(&label, 6.0, Style::Italic, x, FOOTER_Y);
    }

    fn font(&self, style: Style) -> &IndirectFontRef {
        match style {
            Style::Regular => &self.regular,
            Style::Bold => &self.bold,
            Style::Italic => &self.italic,
        }
    }

    /// `baseline` is measured from the top edge
    fn text(&self, text: &str, size_pt: f32, style: Style, x: f32, baseline: f32) {
        self.layer.set_fill_color(rgb(TEXT_COLOUR));
        self.layer
            .use_text(text, size_pt, Mm(x), Mm(PAGE_HEIGHT - baseline), self.font(style));
    }

    fn centered_text(&self, text: &str, size_pt: f32, style: Style, baseline: f32) {
        let x = LEFT + (200.0 - text_width(text, size_pt)) / 2.0;
        self.text(text, size_pt, style, x, baseline);
    }

    /// Bordered rectangle with its top-left corner at (`x`, `y`)
    fn rect(&self, x: f32, y: f32, width: f32, height: f32, fill: Option<(u8, u8, u8)>) {
        if width <= 0.0 {
            return;
        }
        self.layer.set_outline_color(rgb((0, 0, 0)));
        self.layer.set_outline_thickness(0.2);
        let mode = match fill {
            Some(colour) => {
                self.layer.set_fill_color(rgb(colour));
                PaintMode::FillStroke
            }
            None => PaintMode::Stroke,
        };
        let rect = Rect::new(
            Mm(x),
            Mm(PAGE_HEIGHT - y - height),
            Mm(x + width),
            Mm(PAGE_HEIGHT - y),
        )
        .with_mode(mode);
        self.layer.add_rect(rect);
    }

    /// Place `image` scaled to `width` mm with its top-left corner at (`x`, `y`)
    fn image(&self, image: Image, x: f32, y: f32, width: f32) {
        let px_width = image.image.width.0 as f32;
        let px_height = image.image.height.0 as f32;
        let dpi = px_width * 25.4 / width;
        let height = px_height * 25.4 / dpi;
        image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(x)),
                translate_y: Some(Mm(PAGE_HEIGHT - y - height)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
    }
}

/// Render the report for `audit_no` into the output directory.
///
/// Nothing is written when the audit has no feedback or rendering fails.
pub async fn generate(pool: &SqlitePool, config: &AppConfig, audit_no: i64) -> Result<PathBuf> {
    let entries = db::fetch_by_audits(pool, &[audit_no]).await?;
    let report = match AuditReport::build(audit_no, entries) {
        Ok(report) => report,
        Err(err) => {
            warn!("Report for audit {audit_no} skipped: {err}");
            return Err(err);
        }
    };

    chart::load_font(&config.chart_font)?;
    let scores = scoring::average_by_project(&report.entries);
    let title = format!("Average Score by Project for Audit # {audit_no}");
    let chart_image =
        chart::render_image(|root| chart::draw_score_points(root, &title, "Project", &scores, true))?;

    let rendered = report.render(&chart_image, config.logo.as_deref())?;

    std::fs::create_dir_all(&config.output_dir)?;
    let path = config.output_path(&file_name(audit_no));
    std::fs::write(&path, &rendered.bytes)?;
    info!(
        "PDF generated: {} ({} pages, {} rows)",
        path.display(),
        rendered.pages,
        report.entries.len()
    );
    Ok(path)
}
