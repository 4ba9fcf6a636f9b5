//! Coordinate mapping from the model's symbolic scale to screen pixels.
//!
//! Units are decided by magnitude alone: a point whose coordinates both fall
//! inside `[-scale, scale]` is treated as normalized, anything else as pixels.
//! A genuine pixel coordinate such as `(800, 600)` on a 4K screen therefore
//! gets scaled as if it were normalized. Callers that know their model emits
//! pixels should pass a scale factor of 0, which disables scaling.
use crate::actions::types::{Coordinate, Point};
use crate::perception::types::ScreenGeometry;

/// Default symbolic range the model is asked to express positions in.
pub const COORDINATE_SCALE: u32 = 1000;

/// Maps a point to physical pixels.
pub fn point_to_screen(point: Point, geometry: ScreenGeometry, scale_factor: u32) -> (i32, i32) {
    let scale = scale_factor as f64;
    if scale_factor > 0 && point.x.abs() <= scale && point.y.abs() <= scale {
        return (
            round_px(point.x * geometry.width as f64 / scale),
            round_px(point.y * geometry.height as f64 / scale),
        );
    }
    (round_px(point.x), round_px(point.y))
}

/// Boxes are reduced to their center before mapping.
pub fn to_screen(coordinate: Coordinate, geometry: ScreenGeometry, scale_factor: u32) -> (i32, i32) {
    point_to_screen(coordinate.reduce(), geometry, scale_factor)
}

/// Ties go to the even neighbour.
fn round_px(value: f64) -> i32 {
    value.round_ties_even() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::types::BoundingBox;

    const FHD: ScreenGeometry = ScreenGeometry {
        width: 1920,
        height: 1080,
    };

    #[test]
    fn scales_normalized_point() {
        assert_eq!(point_to_screen(Point::new(500.0, 500.0), FHD, 1000), (960, 540));
    }

    #[test]
    fn out_of_range_point_is_treated_as_pixels() {
        assert_eq!(point_to_screen(Point::new(1200.0, 50.0), FHD, 1000), (1200, 50));
        assert_eq!(point_to_screen(Point::new(50.0, -1001.0), FHD, 1000), (50, -1001));
    }

    #[test]
    fn box_is_reduced_to_center_before_scaling() {
        let b = Coordinate::Box(BoundingBox::new(100.0, 100.0, 300.0, 300.0));
        assert_eq!(b.reduce(), Point::new(200.0, 200.0));
        assert_eq!(to_screen(b, FHD, 1000), (384, 216));
    }

    #[test]
    fn boundary_values_are_still_normalized() {
        assert_eq!(point_to_screen(Point::new(1000.0, 1000.0), FHD, 1000), (1920, 1080));
        assert_eq!(point_to_screen(Point::new(-1000.0, -1000.0), FHD, 1000), (-1920, -1080));
        assert_eq!(point_to_screen(Point::new(0.0, 0.0), FHD, 1000), (0, 0));
    }

    #[test]
    fn just_past_the_boundary_is_pixels() {
        assert_eq!(point_to_screen(Point::new(1000.5, 10.0), FHD, 1000), (1000, 10));
        assert_eq!(point_to_screen(Point::new(10.0, -1000.25), FHD, 1000), (10, -1000));
    }

    // Known limitation: small absolute pixels are indistinguishable from
    // normalized units and get scaled.
    #[test]
    fn small_pixel_values_are_scaled() {
        let uhd = ScreenGeometry::new(3840, 2160);
        assert_eq!(point_to_screen(Point::new(800.0, 600.0), uhd, 1000), (3072, 1296));
    }

    #[test]
    fn ties_round_to_even() {
        // 1 * 1000 / 400 = 2.5, 3 * 1000 / 400 = 7.5
        let g = ScreenGeometry::new(1000, 1000);
        assert_eq!(point_to_screen(Point::new(1.0, 3.0), g, 400), (2, 8));
        assert_eq!(point_to_screen(Point::new(2000.5, 2001.5), g, 400), (2000, 2002));
    }

    #[test]
    fn zero_scale_disables_scaling() {
        assert_eq!(point_to_screen(Point::new(0.4, 12.6), FHD, 0), (0, 13));
    }
}
