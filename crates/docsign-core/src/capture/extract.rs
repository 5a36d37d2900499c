//! Pen-signature extraction from a captured frame
//!
//! Binarizes a photo of ink on paper: bright pixels become opaque white and
//! everything else opaque black. There is no gradient and no transparency.

use super::surface::{Rgba, Surface};

/// Luminance above which a pixel counts as paper
pub const PEN_THRESHOLD: f64 = 130.0;

const PAPER: Rgba = [255, 255, 255, 255];
const PEN: Rgba = [0, 0, 0, 255];

/// Rec. 601 luma of an RGB triple
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// Overwrite every pixel of the surface with paper or pen. Alpha of the
/// input is ignored.
pub fn extract_pen(surface: &mut Surface) {
    for px in surface.as_rgba_mut().chunks_exact_mut(4) {
        let out = if luminance(px[0], px[1], px[2]) > PEN_THRESHOLD {
            PAPER
        } else {
            PEN
        };
        px.copy_from_slice(&out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        let mut surface = Surface::new(3, 1);
        // Gray 129 is pen, gray 131 is paper
        surface.put_pixel(0, 0, [129, 129, 129, 255]);
        surface.put_pixel(1, 0, [131, 131, 131, 255]);
        surface.put_pixel(2, 0, [255, 0, 0, 0]);
        extract_pen(&mut surface);

        assert_eq!(surface.pixel(0, 0), Some(PEN));
        assert_eq!(surface.pixel(1, 0), Some(PAPER));
        // Pure red is dark (76.2) and transparency is discarded
        assert_eq!(surface.pixel(2, 0), Some(PEN));
    }

    #[test]
    fn test_blank_transparent_surface_becomes_opaque() {
        let mut surface = Surface::new(4, 4);
        extract_pen(&mut surface);
        assert!(surface.as_rgba().chunks_exact(4).all(|px| px == PEN));
    }

    #[test]
    fn test_empty_surface_is_fine() {
        let mut surface = Surface::new(0, 0);
        extract_pen(&mut surface);
        assert!(surface.as_rgba().is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_surface() -> impl Strategy<Value = Surface> {
        (1u32..16, 1u32..16).prop_flat_map(|(w, h)| {
            prop::collection::vec(any::<u8>(), (w * h * 4) as usize)
                .prop_map(move |pixels| Surface::from_rgba(w, h, pixels).unwrap())
        })
    }

    proptest! {
        /// Property: every output pixel is opaque black or opaque white
        #[test]
        fn extraction_is_binary(mut surface in any_surface()) {
            extract_pen(&mut surface);
            for px in surface.as_rgba().chunks_exact(4) {
                prop_assert!(px == PEN || px == PAPER, "unexpected pixel {:?}", px);
            }
        }

        /// Property: applying extraction twice equals applying it once
        #[test]
        fn extraction_is_idempotent(mut surface in any_surface()) {
            extract_pen(&mut surface);
            let once = surface.clone();
            extract_pen(&mut surface);
            prop_assert_eq!(surface, once);
        }

        /// Property: classification depends only on luminance
        #[test]
        fn extraction_follows_luminance(r: u8, g: u8, b: u8, a: u8) {
            let mut surface = Surface::from_rgba(1, 1, vec![r, g, b, a]).unwrap();
            extract_pen(&mut surface);
            let expected = if luminance(r, g, b) > PEN_THRESHOLD { PAPER } else { PEN };
            prop_assert_eq!(surface.pixel(0, 0), Some(expected));
        }
    }
}
