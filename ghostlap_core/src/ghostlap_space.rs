//! The "SPACE" Engine - Geographic to raster projection
//!
//! The track map is a north-up raster covering a rectangular lat/lon box.
//! Projection is a plain linear mapping inside that box:
//! - latitude decreases going down the image
//! - longitude increases going right
//!
//! A manual [`CalibrationOffset`] is added to every coordinate right before
//! projection to correct imprecise map registration.

use crate::config::ConfigError;
use geo::{HaversineBearing, HaversineDistance, Point};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Roughly half a metre of latitude.
pub const DEFAULT_NUDGE_STEP_DEG: f64 = 0.000005;

/// The geographic rectangle covered by the track raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub top_left_lat: f64,
    pub top_left_lon: f64,
    pub bottom_right_lat: f64,
    pub bottom_right_lon: f64,
}

impl GeoBounds {
    /// Creates validated bounds.
    ///
    /// # Errors
    /// `ConfigError::NonFiniteBounds` or `ConfigError::DegenerateBounds` when
    /// a corner is not finite or either span is zero.
    pub fn new(
        top_left_lat: f64,
        top_left_lon: f64,
        bottom_right_lat: f64,
        bottom_right_lon: f64,
    ) -> Result<Self, ConfigError> {
        let bounds = Self {
            top_left_lat,
            top_left_lon,
            bottom_right_lat,
            bottom_right_lon,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Rejects bounds that would make projection divide by zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let corners = [
            self.top_left_lat,
            self.top_left_lon,
            self.bottom_right_lat,
            self.bottom_right_lon,
        ];
        if corners.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::NonFiniteBounds);
        }
        if self.lat_span() == 0.0 {
            return Err(ConfigError::DegenerateBounds { axis: "latitude" });
        }
        if self.lon_span() == 0.0 {
            return Err(ConfigError::DegenerateBounds { axis: "longitude" });
        }
        Ok(())
    }

    /// Top minus bottom latitude (positive for a north-up map).
    pub fn lat_span(&self) -> f64 {
        self.top_left_lat - self.bottom_right_lat
    }

    /// Right minus left longitude (positive for a north-up map).
    pub fn lon_span(&self) -> f64 {
        self.bottom_right_lon - self.top_left_lon
    }

    /// Geographic center as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.top_left_lat + self.bottom_right_lat) / 2.0,
            (self.top_left_lon + self.bottom_right_lon) / 2.0,
        )
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let lat_ok = (lat - self.bottom_right_lat) * (self.top_left_lat - lat) >= 0.0;
        let lon_ok = (lon - self.top_left_lon) * (self.bottom_right_lon - lon) >= 0.0;
        lat_ok && lon_ok
    }

    /// Smallest north-up box around `points` (`(lat, lon)` pairs), grown by
    /// `margin_deg` on every side.
    ///
    /// # Errors
    /// `ConfigError::DegenerateBounds` when there are no points or all of
    /// them share a latitude or longitude and the margin is zero.
    pub fn enclosing<I>(points: I, margin_deg: f64) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut extent: Option<(f64, f64, f64, f64)> = None;
        for (lat, lon) in points {
            extent = Some(match extent {
                None => (lat, lat, lon, lon),
                Some((min_lat, max_lat, min_lon, max_lon)) => (
                    min_lat.min(lat),
                    max_lat.max(lat),
                    min_lon.min(lon),
                    max_lon.max(lon),
                ),
            });
        }
        let (min_lat, max_lat, min_lon, max_lon) =
            extent.ok_or(ConfigError::DegenerateBounds { axis: "latitude" })?;
        let margin = margin_deg.abs();
        Self::new(
            max_lat + margin,
            min_lon - margin,
            min_lat - margin,
            max_lon + margin,
        )
    }
}

/// Direction of a manual calibration nudge, as seen on a north-up map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NudgeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl FromStr for NudgeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "u" | "north" => Ok(Self::Up),
            "down" | "d" | "south" => Ok(Self::Down),
            "left" | "l" | "west" => Ok(Self::Left),
            "right" | "r" | "east" => Ok(Self::Right),
            other => Err(format!("unknown nudge direction: {}", other)),
        }
    }
}

/// Additive correction applied to coordinates before projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOffset {
    pub lat_offset: f64,
    pub lon_offset: f64,
}

impl CalibrationOffset {
    pub fn new(lat_offset: f64, lon_offset: f64) -> Self {
        Self {
            lat_offset,
            lon_offset,
        }
    }

    /// Shifts the offset by one step. Left/right move west/east.
    pub fn nudge(&mut self, direction: NudgeDirection, step_deg: f64) {
        match direction {
            NudgeDirection::Up => self.lat_offset += step_deg,
            NudgeDirection::Down => self.lat_offset -= step_deg,
            NudgeDirection::Left => self.lon_offset -= step_deg,
            NudgeDirection::Right => self.lon_offset += step_deg,
        }
    }

    /// Applies the offset to a coordinate.
    pub fn apply(&self, lat: f64, lon: f64) -> (f64, f64) {
        (lat + self.lat_offset, lon + self.lon_offset)
    }
}

/// Pixel dimensions of a raster or viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterSize {
    pub width: u32,
    pub height: u32,
}

impl RasterSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel center as floating point.
    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.width as f64 / 2.0, self.height as f64 / 2.0)
    }
}

/// Projects a geographic coordinate to raster pixels (origin top-left).
///
/// No clamping: points outside `bounds` land outside the raster.
/// `bounds` must have non-zero spans (see [`GeoBounds::validate`]).
pub fn project(
    lat: f64,
    lon: f64,
    bounds: &GeoBounds,
    calib: &CalibrationOffset,
    raster_width: f64,
    raster_height: f64,
) -> Point2<f64> {
    let (adjusted_lat, adjusted_lon) = calib.apply(lat, lon);

    let lat_progress = (bounds.top_left_lat - adjusted_lat) / bounds.lat_span();
    let lon_progress = (adjusted_lon - bounds.top_left_lon) / bounds.lon_span();

    Point2::new(lon_progress * raster_width, lat_progress * raster_height)
}

/// Projection bound to one raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoProjector {
    bounds: GeoBounds,
    raster: RasterSize,
}

impl GeoProjector {
    /// Creates a projector after validating the bounds and raster.
    pub fn new(bounds: GeoBounds, raster: RasterSize) -> Result<Self, ConfigError> {
        bounds.validate()?;
        if raster.is_empty() {
            return Err(ConfigError::EmptyRaster);
        }
        Ok(Self { bounds, raster })
    }

    pub fn bounds(&self) -> &GeoBounds {
        &self.bounds
    }

    pub fn raster(&self) -> RasterSize {
        self.raster
    }

    pub fn project(&self, lat: f64, lon: f64, calib: &CalibrationOffset) -> Point2<f64> {
        project(
            lat,
            lon,
            &self.bounds,
            calib,
            self.raster.width as f64,
            self.raster.height as f64,
        )
    }

    /// Pixels per degree as `(x per degree lon, y per degree lat)`.
    ///
    /// `y` is negative-going: adding latitude moves up the image.
    pub fn pixels_per_degree(&self) -> (f64, f64) {
        (
            self.raster.width as f64 / self.bounds.lon_span(),
            self.raster.height as f64 / self.bounds.lat_span(),
        )
    }
}

/// Initial great-circle bearing from one coordinate to another, degrees in (-180, 180].
pub fn bearing_deg(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    Point::new(from_lon, from_lat).haversine_bearing(Point::new(to_lon, to_lat))
}

/// Great-circle distance in metres.
pub fn distance_m(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    Point::new(from_lon, from_lat).haversine_distance(&Point::new(to_lon, to_lat))
}

/// Power-of-two subsampling factor for decoding a raster near `requested` size.
///
/// Picks the largest factor that keeps both halved dimensions at or above
/// the requested ones.
pub fn sample_size(source: RasterSize, requested: RasterSize) -> u32 {
    let req_w = requested.width.max(1);
    let req_h = requested.height.max(1);

    let mut factor = 1;
    if source.height > req_h || source.width > req_w {
        let half_h = source.height / 2;
        let half_w = source.width / 2;
        while half_h / factor >= req_h && half_w / factor >= req_w {
            factor *= 2;
        }
    }
    factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn lusail_bounds() -> GeoBounds {
        GeoBounds::new(25.5000, 51.4400, 25.4850, 51.4560).unwrap()
    }

    #[test]
    fn test_degenerate_bounds_rejected() {
        assert!(matches!(
            GeoBounds::new(25.0, 51.0, 25.0, 51.1),
            Err(ConfigError::DegenerateBounds { axis: "latitude" })
        ));
        assert!(matches!(
            GeoBounds::new(25.1, 51.0, 25.0, 51.0),
            Err(ConfigError::DegenerateBounds { axis: "longitude" })
        ));
        assert!(matches!(
            GeoBounds::new(f64::NAN, 51.0, 25.0, 51.1),
            Err(ConfigError::NonFiniteBounds)
        ));
    }

    #[test]
    fn test_enclosing_bounds() {
        let points = [(25.49, 51.45), (25.495, 51.442), (25.487, 51.455)];
        let b = GeoBounds::enclosing(points, 0.001).unwrap();
        assert_relative_eq!(b.top_left_lat, 25.496, epsilon = 1e-9);
        assert_relative_eq!(b.top_left_lon, 51.441, epsilon = 1e-9);
        assert_relative_eq!(b.bottom_right_lat, 25.486, epsilon = 1e-9);
        assert_relative_eq!(b.bottom_right_lon, 51.456, epsilon = 1e-9);
        assert!(points.iter().all(|&(lat, lon)| b.contains(lat, lon)));

        assert!(GeoBounds::enclosing(Vec::new(), 0.001).is_err());
        assert!(GeoBounds::enclosing([(25.0, 51.0)], 0.0).is_err());
        assert!(GeoBounds::enclosing([(25.0, 51.0)], 0.001).is_ok());
    }

    #[test]
    fn test_corners_project_to_raster_corners() {
        let b = lusail_bounds();
        let calib = CalibrationOffset::default();

        let tl = project(b.top_left_lat, b.top_left_lon, &b, &calib, 2048.0, 1024.0);
        assert_relative_eq!(tl.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(tl.y, 0.0, epsilon = 1e-9);

        let br = project(b.bottom_right_lat, b.bottom_right_lon, &b, &calib, 2048.0, 1024.0);
        assert_relative_eq!(br.x, 2048.0, epsilon = 1e-6);
        assert_relative_eq!(br.y, 1024.0, epsilon = 1e-6);
    }

    #[test]
    fn test_center_projects_to_raster_center() {
        let b = lusail_bounds();
        let calib = CalibrationOffset::new(0.00002, -0.00004);
        let (lat, lon) = b.center();

        // Remove calibration so the adjusted coordinate is the exact center
        let p = project(
            lat - calib.lat_offset,
            lon - calib.lon_offset,
            &b,
            &calib,
            1000.0,
            800.0,
        );
        assert_relative_eq!(p.x, 500.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 400.0, epsilon = 1e-6);
    }

    #[test]
    fn test_outside_bounds_not_clamped() {
        let b = lusail_bounds();
        let calib = CalibrationOffset::default();
        let p = project(25.5100, 51.4300, &b, &calib, 1000.0, 1000.0);
        assert!(p.x < 0.0);
        assert!(p.y < 0.0);
        assert!(!b.contains(25.5100, 51.4300));
        assert!(b.contains(25.49, 51.45));
    }

    #[test]
    fn test_calibration_shift_is_constant() {
        let b = lusail_bounds();
        let projector = GeoProjector::new(b, RasterSize::new(2048, 2048)).unwrap();
        let none = CalibrationOffset::default();
        let calib = CalibrationOffset::new(0.00001, -0.00002);
        let (x_per_deg, y_per_deg) = projector.pixels_per_degree();

        let expected_dx = -0.00002 * x_per_deg;
        let expected_dy = -0.00001 * y_per_deg;

        for (lat, lon) in [(25.4975, 51.4460), (25.4900, 51.4500), (25.5200, 51.4000)] {
            let base = projector.project(lat, lon, &none);
            let shifted = projector.project(lat, lon, &calib);
            assert_relative_eq!(shifted.x - base.x, expected_dx, epsilon = 1e-6);
            assert_relative_eq!(shifted.y - base.y, expected_dy, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_nudges() {
        let mut calib = CalibrationOffset::new(-0.000045, -0.000035);
        calib.nudge(NudgeDirection::Up, DEFAULT_NUDGE_STEP_DEG);
        assert_relative_eq!(calib.lat_offset, -0.000040, epsilon = 1e-12);
        calib.nudge(NudgeDirection::Down, DEFAULT_NUDGE_STEP_DEG);
        calib.nudge(NudgeDirection::Down, DEFAULT_NUDGE_STEP_DEG);
        assert_relative_eq!(calib.lat_offset, -0.000050, epsilon = 1e-12);
        calib.nudge(NudgeDirection::Left, DEFAULT_NUDGE_STEP_DEG);
        assert_relative_eq!(calib.lon_offset, -0.000040, epsilon = 1e-12);
        calib.nudge(NudgeDirection::Right, DEFAULT_NUDGE_STEP_DEG);
        assert_relative_eq!(calib.lon_offset, -0.000035, epsilon = 1e-12);
    }

    #[test]
    fn test_nudge_direction_parse() {
        assert_eq!("UP".parse::<NudgeDirection>(), Ok(NudgeDirection::Up));
        assert_eq!("west".parse::<NudgeDirection>(), Ok(NudgeDirection::Left));
        assert!("sideways".parse::<NudgeDirection>().is_err());
    }

    #[test]
    fn test_projector_rejects_empty_raster() {
        assert!(matches!(
            GeoProjector::new(lusail_bounds(), RasterSize::new(0, 100)),
            Err(ConfigError::EmptyRaster)
        ));
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        assert_relative_eq!(bearing_deg(25.0, 51.0, 25.1, 51.0), 0.0, epsilon = 1e-6);
        assert_relative_eq!(bearing_deg(25.0, 51.0, 24.9, 51.0).abs(), 180.0, epsilon = 1e-6);
        let east = bearing_deg(25.0, 51.0, 25.0, 51.1);
        assert!((east - 90.0).abs() < 0.1);
        let west = bearing_deg(25.0, 51.0, 25.0, 50.9);
        assert!((west + 90.0).abs() < 0.1);
    }

    #[test]
    fn test_distance_of_small_step() {
        // 0.00001 deg latitude is about 1.1 m
        let d = distance_m(25.0, 51.0, 25.00001, 51.0);
        assert!(d > 1.0 && d < 1.2);
    }

    #[test]
    fn test_sample_size() {
        let source = RasterSize::new(4000, 3000);
        assert_eq!(sample_size(source, RasterSize::new(4000, 3000)), 1);
        assert_eq!(sample_size(source, RasterSize::new(2000, 1500)), 2);
        assert_eq!(sample_size(source, RasterSize::new(1000, 700)), 4);
        assert_eq!(sample_size(source, RasterSize::new(900, 10)), 4);
        assert_eq!(sample_size(RasterSize::new(100, 100), RasterSize::new(0, 0)), 64);
    }
}
