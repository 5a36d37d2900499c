//! Freehand signature pad

use shared_types::Point;
use tracing::{debug, warn};

use super::codec::to_data_url;
use super::surface::{Surface, INK};
use super::CaptureError;
use crate::storage::KeyValueStore;
use crate::vault::SignatureVault;

/// Stroke width in surface pixels
pub const STROKE_WIDTH: f64 = 2.0;

/// A drawing session over a transparent surface.
///
/// The backing surface is sized from the display dimensions when the pad
/// opens, and the display-to-surface ratio is fixed for the life of the pad.
/// If the display is resized mid-session, later strokes land at the old
/// ratio and will not line up with earlier ones.
#[derive(Debug, Clone)]
pub struct FreehandPad {
    surface: Surface,
    ratio_x: f64,
    ratio_y: f64,
    last: Option<Point>,
}

impl FreehandPad {
    /// Open a pad for a display area of `display_width` x `display_height`
    /// CSS pixels at the given device pixel ratio
    pub fn open(display_width: f64, display_height: f64, pixel_ratio: f64) -> Self {
        let pixel_ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        let display_width = display_width.max(1.0);
        let display_height = display_height.max(1.0);

        let width = (display_width * pixel_ratio).round().max(1.0) as u32;
        let height = (display_height * pixel_ratio).round().max(1.0) as u32;
        debug!(width, height, "freehand pad opened");

        Self {
            surface: Surface::new(width, height),
            ratio_x: width as f64 / display_width,
            ratio_y: height as f64 / display_height,
            last: None,
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Display-to-surface scale on each axis
    pub fn ratio(&self) -> (f64, f64) {
        (self.ratio_x, self.ratio_y)
    }

    pub fn is_drawing(&self) -> bool {
        self.last.is_some()
    }

    pub fn is_blank(&self) -> bool {
        self.surface.is_blank()
    }

    fn to_surface(&self, display: Point) -> Point {
        Point::new(display.x * self.ratio_x, display.y * self.ratio_y)
    }

    /// Start a stroke. A tap without movement still leaves a dot.
    pub fn pointer_down(&mut self, display: Point) {
        let p = self.to_surface(display);
        self.surface.fill_disc(p, STROKE_WIDTH / 2.0, INK);
        self.last = Some(p);
    }

    /// Extend the current stroke; ignored between strokes
    pub fn pointer_move(&mut self, display: Point) {
        let Some(last) = self.last else {
            return;
        };
        let p = self.to_surface(display);
        self.surface.stroke_segment(last, p, STROKE_WIDTH, INK);
        self.last = Some(p);
    }

    pub fn pointer_up(&mut self) {
        self.last = None;
    }

    pub fn pointer_leave(&mut self) {
        self.last = None;
    }

    /// Wipe the ink. A stroke in progress keeps going from where it was.
    pub fn clear(&mut self) {
        self.surface.clear();
    }

    /// Serialize the drawing to an image-data string
    pub fn save(&self) -> Result<String, CaptureError> {
        if self.surface.is_blank() {
            return Err(CaptureError::EmptySignature);
        }
        to_data_url(&self.surface)
    }

    /// Save, then offer to keep a named copy in the vault.
    ///
    /// `offer` returns the name to store under, or `None` when declined. The
    /// image is returned whether or not the vault accepts the copy.
    pub fn save_with_offer<S, F>(
        &self,
        vault: &mut SignatureVault<S>,
        offer: F,
    ) -> Result<String, CaptureError>
    where
        S: KeyValueStore,
        F: FnOnce() -> Option<String>,
    {
        let data = self.save()?;
        if let Some(name) = offer() {
            if let Err(e) = vault.add(&name, &data) {
                warn!(error = %e, "could not keep signature in vault");
            }
        }
        Ok(data)
    }
}
