//! Field overlay rendering model
//!
//! The page raster is a fixed 1240 x 1754 logical canvas. A single scale
//! factor `s = min(1, container_width / 1240)` maps it into the rendering
//! container, and the same factor applies to every field on the page.

use shared_types::{CoordinateField, FieldRect, Point, SignatureField, PAGE_HEIGHT, PAGE_WIDTH};

use crate::capture::codec::image_dimensions;
use crate::fields::{FieldContent, TableGrid};

/// Font size for fields that do not carry one
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Appended to the label of an empty required field
pub const REQUIRED_MARKER: &str = " *";

/// Horizontal padding inside a text field, in page pixels
pub const TEXT_PADDING: f64 = 4.0;

const ELLIPSIS: char = '\u{2026}';

/// Display scale of the page raster inside its container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    container_width: f64,
    scale: f64,
}

impl Viewport {
    pub fn new(container_width: f64) -> Self {
        Self {
            container_width,
            scale: Self::scale_for(container_width),
        }
    }

    /// `min(1, width / 1240)`. A container that has not been laid out yet
    /// (non-finite or non-positive width) renders at full size.
    pub fn scale_for(container_width: f64) -> f64 {
        if !container_width.is_finite() || container_width <= 0.0 {
            return 1.0;
        }
        (container_width / PAGE_WIDTH).min(1.0)
    }

    /// Recompute the scale for a new container width
    pub fn resize(&mut self, container_width: f64) {
        *self = Self::new(container_width);
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn container_width(&self) -> f64 {
        self.container_width
    }

    /// On-screen size of the whole page
    pub fn display_size(&self) -> (f64, f64) {
        (PAGE_WIDTH * self.scale, PAGE_HEIGHT * self.scale)
    }

    pub fn to_display(&self, rect: &FieldRect) -> FieldRect {
        rect.scaled(self.scale)
    }

    pub fn to_page(&self, display: Point) -> Point {
        Point::new(display.x / self.scale, display.y / self.scale)
    }
}

/// Where the scale factor is applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScaleStrategy {
    /// Every field is positioned at `(x*s, y*s)` with size `(w*s, h*s)`
    #[default]
    PerField,
    /// Fields keep raw page coordinates inside a full-size container that is
    /// scaled as a whole
    Transform,
}

/// Measures rendered text width
pub trait TextMetrics {
    fn text_width(&self, text: &str, font_size: f64) -> f64;
}

/// Fixed average advance per character
#[derive(Debug, Clone, Copy)]
pub struct ApproxTextMetrics {
    pub advance: f64,
}

impl Default for ApproxTextMetrics {
    fn default() -> Self {
        Self { advance: 0.55 }
    }
}

impl TextMetrics for ApproxTextMetrics {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        text.chars().count() as f64 * self.advance * font_size
    }
}

/// Shorten `text` with a trailing ellipsis until it fits `max_width`.
/// Returns the text and whether it was cut.
pub fn truncate_to_width<M: TextMetrics + ?Sized>(
    text: &str,
    max_width: f64,
    font_size: f64,
    metrics: &M,
) -> (String, bool) {
    if metrics.text_width(text, font_size) <= max_width {
        return (text.to_string(), false);
    }

    let chars: Vec<char> = text.chars().collect();
    let with_ellipsis = |keep: usize| -> String {
        let mut candidate: String = chars[..keep].iter().collect();
        candidate.push(ELLIPSIS);
        candidate
    };

    // Width grows with the kept prefix, so search for the longest one that fits
    let (mut lo, mut hi) = (0, chars.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if metrics.text_width(&with_ellipsis(mid), font_size) <= max_width {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    (with_ellipsis(lo.saturating_sub(1)), true)
}

/// One laid-out table cell
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCell {
    pub row: usize,
    pub col: usize,
    pub rect: FieldRect,
    pub text: String,
}

/// What to draw inside a field box
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedContent {
    /// A plain value, centered
    Text {
        text: String,
        truncated: bool,
        font_size: f64,
    },
    /// The label of an empty plain field
    Label {
        text: String,
        required: bool,
        font_size: f64,
    },
    Table {
        rows: usize,
        cols: usize,
        cells: Vec<RenderedCell>,
    },
    /// A signature image fitted inside the box with its aspect ratio kept
    SignatureImage { data: String, fit: FieldRect },
    /// An unsigned signature slot
    SignaturePlaceholder { assignee: String, is_viewer: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedField {
    pub id: String,
    /// Box in container units
    pub rect: FieldRect,
    /// Stacking order, later draws on top
    pub z: usize,
    pub content: RenderedContent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub page: u32,
    pub scale: f64,
    pub strategy: ScaleStrategy,
    /// Scale applied to the whole container: `s` for
    /// [`ScaleStrategy::Transform`], 1 otherwise
    pub container_transform: f64,
    pub fields: Vec<RenderedField>,
}

/// Computes rendered geometry and content for one page
#[derive(Debug, Clone)]
pub struct OverlayRenderer<M = ApproxTextMetrics> {
    viewport: Viewport,
    strategy: ScaleStrategy,
    page: u32,
    viewer: Option<String>,
    metrics: M,
}

impl OverlayRenderer<ApproxTextMetrics> {
    pub fn new(container_width: f64, strategy: ScaleStrategy) -> Self {
        Self::with_metrics(container_width, strategy, ApproxTextMetrics::default())
    }
}

impl<M: TextMetrics> OverlayRenderer<M> {
    pub fn with_metrics(container_width: f64, strategy: ScaleStrategy, metrics: M) -> Self {
        Self {
            viewport: Viewport::new(container_width),
            strategy,
            page: 1,
            viewer: None,
            metrics,
        }
    }

    /// Identify the viewer so their own unsigned slots can be marked
    pub fn with_viewer(mut self, identifier: &str) -> Self {
        self.viewer = Some(identifier.trim().to_string());
        self
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Container resize
    pub fn resize(&mut self, container_width: f64) {
        self.viewport.resize(container_width);
    }

    /// Page or document change; the container is measured again
    pub fn set_page(&mut self, page: u32, container_width: f64) {
        self.page = page.max(1);
        self.viewport.resize(container_width);
    }

    /// Factor applied to each field box
    fn field_factor(&self) -> f64 {
        match self.strategy {
            ScaleStrategy::PerField => self.viewport.scale(),
            ScaleStrategy::Transform => 1.0,
        }
    }

    fn container_transform(&self) -> f64 {
        match self.strategy {
            ScaleStrategy::PerField => 1.0,
            ScaleStrategy::Transform => self.viewport.scale(),
        }
    }

    fn is_viewer(&self, email: Option<&str>) -> bool {
        match (self.viewer.as_deref(), email) {
            (Some(viewer), Some(email)) => viewer.eq_ignore_ascii_case(email.trim()),
            _ => false,
        }
    }

    /// Lay out the coordinate fields of the current page in z-order
    pub fn render(&self, fields: &[CoordinateField]) -> RenderedPage {
        let factor = self.field_factor();
        let rendered = fields
            .iter()
            .filter(|f| f.page == self.page)
            .enumerate()
            .map(|(z, field)| {
                let rect = field.rect.scaled(factor);
                RenderedField {
                    id: field.id.clone(),
                    rect,
                    z,
                    content: self.content_for(field, &rect, factor),
                }
            })
            .collect();

        RenderedPage {
            page: self.page,
            scale: self.viewport.scale(),
            strategy: self.strategy,
            container_transform: self.container_transform(),
            fields: rendered,
        }
    }

    /// Lay out placement-only signature slots of the current page
    pub fn render_signature_fields(&self, fields: &[SignatureField]) -> Vec<RenderedField> {
        let factor = self.field_factor();
        fields
            .iter()
            .filter(|f| f.page == self.page)
            .enumerate()
            .map(|(z, field)| RenderedField {
                id: field.id.clone(),
                rect: field.rect.scaled(factor),
                z,
                content: RenderedContent::SignaturePlaceholder {
                    assignee: display_name(
                        Some(field.assignee_name.as_str()),
                        Some(field.assignee_email.as_str()),
                    ),
                    is_viewer: self.is_viewer(Some(field.assignee_email.as_str())),
                },
            })
            .collect()
    }

    fn content_for(
        &self,
        field: &CoordinateField,
        rect: &FieldRect,
        factor: f64,
    ) -> RenderedContent {
        let font_size = field.font_size.unwrap_or(DEFAULT_FONT_SIZE) * factor;

        match FieldContent::from_field(field) {
            FieldContent::Plain {
                value,
                label,
                required,
            } => {
                if value.is_empty() {
                    let mut text = label;
                    if required {
                        text.push_str(REQUIRED_MARKER);
                    }
                    RenderedContent::Label {
                        text,
                        required,
                        font_size,
                    }
                } else {
                    let available = (rect.width - 2.0 * TEXT_PADDING * factor).max(0.0);
                    let (text, truncated) =
                        truncate_to_width(&value, available, font_size, &self.metrics);
                    RenderedContent::Text {
                        text,
                        truncated,
                        font_size,
                    }
                }
            }
            FieldContent::Table(grid) => layout_table(&grid, rect),
            FieldContent::Signature {
                image: Some(data),
                ..
            } => RenderedContent::SignatureImage {
                fit: fit_image(&data, rect),
                data,
            },
            FieldContent::Signature {
                image: None,
                assignee_email,
                assignee_name,
                ..
            } => RenderedContent::SignaturePlaceholder {
                assignee: display_name(assignee_name.as_deref(), assignee_email.as_deref()),
                is_viewer: self.is_viewer(assignee_email.as_deref()),
            },
        }
    }
}

fn display_name(name: Option<&str>, email: Option<&str>) -> String {
    [name, email]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("Unassigned")
        .to_string()
}

/// Split a field box into `rows x cols` cells
fn layout_table(grid: &TableGrid, rect: &FieldRect) -> RenderedContent {
    let rows = grid.rows();
    let cols = grid.cols();
    let mut cells = Vec::with_capacity(rows * cols);

    if rows > 0 {
        let row_height = rect.height / rows as f64;
        let spans = grid.column_spans(rect.width);
        for row in 0..rows {
            for (col, (offset, width)) in spans.iter().enumerate() {
                cells.push(RenderedCell {
                    row,
                    col,
                    rect: FieldRect::new(
                        rect.x + offset,
                        rect.y + row as f64 * row_height,
                        *width,
                        row_height,
                    ),
                    text: grid.cell(row, col).to_string(),
                });
            }
        }
    }

    RenderedContent::Table { rows, cols, cells }
}

/// Largest box with the image's aspect ratio that fits inside `rect`,
/// centered. Falls back to the whole box when the size is unknown.
fn fit_image(data: &str, rect: &FieldRect) -> FieldRect {
    let Some((w, h)) = image_dimensions(data).filter(|(w, h)| *w > 0 && *h > 0) else {
        return *rect;
    };
    let (w, h) = (w as f64, h as f64);
    let s = (rect.width / w).min(rect.height / h);
    let (fit_w, fit_h) = (w * s, h * s);

    FieldRect::new(
        rect.x + (rect.width - fit_w) / 2.0,
        rect.y + (rect.height - fit_h) / 2.0,
        fit_w,
        fit_h,
    )
}
