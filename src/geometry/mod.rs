//! Capture-zone geometry.
//!
//! Corner order everywhere is top-left, top-right, bottom-right, bottom-left,
//! in device-pixel space.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

/// Four-cornered polygon. Serialized as `[[x, y], [x, y], [x, y], [x, y]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 2]; 4]", into = "[[f64; 2]; 4]")]
pub struct Quad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl Quad {
    pub fn new(corners: [[f64; 2]; 4]) -> Self {
        Self::from(corners)
    }
}

impl From<[[f64; 2]; 4]> for Quad {
    fn from([tl, tr, br, bl]: [[f64; 2]; 4]) -> Self {
        Self {
            top_left: tl.into(),
            top_right: tr.into(),
            bottom_right: br.into(),
            bottom_left: bl.into(),
        }
    }
}

impl From<Quad> for [[f64; 2]; 4] {
    fn from(quad: Quad) -> Self {
        [
            quad.top_left.into(),
            quad.top_right.into(),
            quad.bottom_right.into(),
            quad.bottom_left.into(),
        ]
    }
}

/// Rectangle as reported by the UI layout, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

/// The on-screen area a detection must fall inside to count as intentional.
///
/// Fixed for the lifetime of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureZone(Quad);

impl CaptureZone {
    pub fn new(quad: Quad) -> Self {
        Self(quad)
    }

    /// Builds the zone from a layout rectangle, scaling into device pixels.
    pub fn from_client_rect(rect: ClientRect, device_pixel_ratio: f64) -> Self {
        let left = rect.left * device_pixel_ratio;
        let top = rect.top * device_pixel_ratio;
        let right = rect.right * device_pixel_ratio;
        let bottom = rect.bottom * device_pixel_ratio;

        Self(Quad::new([
            [left, top],
            [right, top],
            [right, bottom],
            [left, bottom],
        ]))
    }

    pub fn quad(&self) -> &Quad {
        &self.0
    }
}

/// Decides whether a detected polygon lies inside the capture zone.
///
/// Each corner is compared against the two zone edges it touches. This is an
/// axis-aligned check and assumes both polygons share the corner ordering.
/// With no zone (layout never measured) every detection is accepted.
pub fn accepts(zone: Option<&CaptureZone>, detection: &Quad) -> bool {
    let Some(zone) = zone else {
        return true;
    };
    let z = zone.quad();
    let d = detection;

    d.top_left.x >= z.top_left.x
        && d.top_left.y >= z.top_left.y
        && d.top_right.x <= z.top_right.x
        && d.top_right.y >= z.top_right.y
        && d.bottom_right.x <= z.bottom_right.x
        && d.bottom_right.y <= z.bottom_right.y
        && d.bottom_left.x >= z.bottom_left.x
        && d.bottom_left.y <= z.bottom_left.y
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(corners: [[f64; 2]; 4]) -> CaptureZone {
        CaptureZone::new(Quad::new(corners))
    }

    fn square(min: f64, max: f64) -> Quad {
        Quad::new([[min, min], [max, min], [max, max], [min, max]])
    }

    #[test]
    fn detection_inside_zone_is_accepted() {
        let z = zone([[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]]);
        assert!(accepts(Some(&z), &square(10.0, 50.0)));
    }

    #[test]
    fn detection_larger_than_zone_is_rejected() {
        let z = zone([[20.0, 20.0], [40.0, 20.0], [40.0, 40.0], [20.0, 40.0]]);
        assert!(!accepts(Some(&z), &square(10.0, 50.0)));
    }

    #[test]
    fn touching_the_edges_counts_as_inside() {
        let z = zone([[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]]);
        assert!(accepts(Some(&z), &square(0.0, 100.0)));
    }

    #[test]
    fn any_single_corner_outside_rejects() {
        let z = zone([[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]]);
        let inside = square(10.0, 90.0);

        let mut shifted = inside;
        shifted.top_left.x = -1.0;
        assert!(!accepts(Some(&z), &shifted));

        let mut shifted = inside;
        shifted.top_right.y = -0.5;
        assert!(!accepts(Some(&z), &shifted));

        let mut shifted = inside;
        shifted.bottom_right.x = 100.5;
        assert!(!accepts(Some(&z), &shifted));

        let mut shifted = inside;
        shifted.bottom_left.y = 101.0;
        assert!(!accepts(Some(&z), &shifted));
    }

    #[test]
    fn missing_zone_accepts_everything() {
        let far_away = square(-5000.0, 9000.0);
        assert!(accepts(None, &far_away));
    }

    #[test]
    fn client_rect_is_scaled_by_pixel_ratio() {
        let rect = ClientRect {
            left: 10.0,
            top: 20.0,
            right: 210.0,
            bottom: 220.0,
        };
        let z = CaptureZone::from_client_rect(rect, 2.0);
        assert_eq!(
            *z.quad(),
            Quad::new([[20.0, 40.0], [420.0, 40.0], [420.0, 440.0], [20.0, 440.0]])
        );
    }

    #[test]
    fn quad_deserializes_from_nested_arrays() {
        let quad: Quad = serde_json::from_str("[[1,2],[3,2],[3,4],[1,4]]").unwrap();
        assert_eq!(quad.top_right, Point::new(3.0, 2.0));
        assert_eq!(quad.bottom_left, Point::new(1.0, 4.0));
    }
}
