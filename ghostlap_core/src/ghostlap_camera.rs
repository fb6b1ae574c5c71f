//! The "CAMERA" Engine - Player-following view composition
//!
//! Every frame the world is re-projected into a camera that sits on the
//! player, points "up" along the player's heading, and zooms in:
//!
//! ```text
//! screen = T(view_center) · R(-heading) · S(zoom) · T(-player_px) · raster_px
//! ```
//!
//! The map raster, the ghost's racing line and the ghost marker are drawn
//! under that transform. The player marker is a fixed disc at the viewport center: always "you",
//! centered and upright.

use crate::config::{ConfigError, SessionConfig};
use crate::ghostlap_space::{CalibrationOffset, GeoProjector, NudgeDirection, RasterSize};
use crate::ghostlap_time::TrajectoryStore;
use nalgebra::{Matrix3, Point2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// RGBA color of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

pub const PLAYER_COLOR: Rgba = Rgba([0xFF, 0x00, 0x00, 0xFF]);
pub const GHOST_COLOR: Rgba = Rgba([0x44, 0x8A, 0xFF, 150]);

/// The dynamic viewpoint, updated every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub player_lat: f64,
    pub player_lon: f64,
    /// Degrees clockwise from north
    pub player_heading_deg: f64,
    pub zoom_level: f64,
}

impl CameraState {
    pub fn new(zoom_level: f64) -> Self {
        Self {
            player_lat: 0.0,
            player_lon: 0.0,
            player_heading_deg: 0.0,
            zoom_level,
        }
    }
}

/// The ghost marker: hidden until the first ghost position arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GhostState {
    pub active: bool,
    pub lat: f64,
    pub lon: f64,
}

impl GhostState {
    /// Moves the ghost and makes it visible.
    pub fn update(&mut self, lat: f64, lon: f64) {
        self.active = true;
        self.lat = lat;
        self.lon = lon;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// A filled disc to draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub position: Point2<f64>,
    pub radius: f64,
    pub color: Rgba,
}

/// Builds the world-to-screen transform for a follow camera.
///
/// Composition order (applied right to left to a raster point):
/// 1. translate the player's raster pixel to the origin
/// 2. scale uniformly by `zoom`
/// 3. rotate by `-heading_deg` (y-down screen, so positive angles turn clockwise)
/// 4. translate the origin to the viewport center
pub fn camera_transform(
    player_px: &Point2<f64>,
    heading_deg: f64,
    zoom: f64,
    viewport: RasterSize,
) -> Matrix3<f64> {
    let center = viewport.center();

    Matrix3::new_translation(&center.coords)
        * Matrix3::new_rotation((-heading_deg).to_radians())
        * Matrix3::new_nonuniform_scaling(&Vector2::new(zoom, zoom))
        * Matrix3::new_translation(&(-player_px.coords))
}

/// One composed frame, ready for a rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    /// Transform for everything drawn in raster space (map, ghost)
    pub world_to_screen: Matrix3<f64>,

    /// The map raster, drawn at the raster origin under `world_to_screen`
    pub map_size: RasterSize,

    /// Player position in raster pixels
    pub player_pixel: Point2<f64>,

    /// Player disc in screen space (untransformed)
    pub player: Marker,

    /// Ghost disc in raster space, present only while the ghost is active
    pub ghost: Option<Marker>,

    /// The full recorded racing line in raster space, in recording order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ghost_line: Vec<Point2<f64>>,
}

impl RenderFrame {
    /// Maps a raster pixel to the screen.
    pub fn to_screen(&self, raster_px: &Point2<f64>) -> Point2<f64> {
        self.world_to_screen.transform_point(raster_px)
    }

    /// Where the ghost lands on screen, if it is drawn.
    pub fn ghost_on_screen(&self) -> Option<Point2<f64>> {
        self.ghost.map(|g| self.to_screen(&g.position))
    }

    /// The racing line on screen.
    pub fn ghost_line_on_screen(&self) -> Vec<Point2<f64>> {
        self.ghost_line.iter().map(|p| self.to_screen(p)).collect()
    }

    /// Raster corners on screen: top-left, top-right, bottom-right, bottom-left.
    pub fn map_corners_on_screen(&self) -> [Point2<f64>; 4] {
        let w = self.map_size.width as f64;
        let h = self.map_size.height as f64;
        [
            self.to_screen(&Point2::new(0.0, 0.0)),
            self.to_screen(&Point2::new(w, 0.0)),
            self.to_screen(&Point2::new(w, h)),
            self.to_screen(&Point2::new(0.0, h)),
        ]
    }
}

/// Composes frames for a fixed viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraCompositor {
    viewport: RasterSize,
    player_radius: f64,
    ghost_radius: f64,
}

impl CameraCompositor {
    pub fn new(viewport: RasterSize, player_radius: f64, ghost_radius: f64) -> Self {
        Self {
            viewport,
            player_radius,
            ghost_radius,
        }
    }

    pub fn viewport(&self) -> RasterSize {
        self.viewport
    }

    /// Composes the frame for the given state snapshot.
    ///
    /// `ghost_line` holds `(lat, lon)` points and is projected with the same
    /// calibration as the markers.
    pub fn compose(
        &self,
        camera: &CameraState,
        ghost: &GhostState,
        ghost_line: &[(f64, f64)],
        projector: &GeoProjector,
        calib: &CalibrationOffset,
    ) -> RenderFrame {
        let player_pixel = projector.project(camera.player_lat, camera.player_lon, calib);
        let world_to_screen = camera_transform(
            &player_pixel,
            camera.player_heading_deg,
            camera.zoom_level,
            self.viewport,
        );

        let ghost = ghost.active.then(|| Marker {
            position: projector.project(ghost.lat, ghost.lon, calib),
            radius: self.ghost_radius,
            color: GHOST_COLOR,
        });

        let ghost_line = ghost_line
            .iter()
            .map(|&(lat, lon)| projector.project(lat, lon, calib))
            .collect();

        RenderFrame {
            world_to_screen,
            map_size: projector.raster(),
            player_pixel,
            player: Marker {
                position: self.viewport.center(),
                radius: self.player_radius,
                color: PLAYER_COLOR,
            },
            ghost,
            ghost_line,
        }
    }
}

/// The rendering surface state: map registration, calibration, camera and ghost.
///
/// Owned by the session and passed by reference into projection and
/// composition; nothing here is global.
#[derive(Debug, Clone)]
pub struct TrackSurface {
    projector: GeoProjector,
    compositor: CameraCompositor,
    calibration: CalibrationOffset,
    nudge_step_deg: f64,
    camera: CameraState,
    ghost: GhostState,
    ghost_line: Vec<(f64, f64)>,
}

impl TrackSurface {
    /// Builds a surface from a configuration, validating it first.
    pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            projector: GeoProjector::new(config.bounds, config.raster)?,
            compositor: CameraCompositor::new(
                config.viewport,
                config.player_marker_radius,
                config.ghost_marker_radius,
            ),
            calibration: config.calibration,
            nudge_step_deg: config.nudge_step_deg,
            camera: CameraState::new(config.zoom_level),
            ghost: GhostState::default(),
            ghost_line: Vec::new(),
        })
    }

    pub fn update_player_position(&mut self, lat: f64, lon: f64, heading_deg: f64) {
        self.camera.player_lat = lat;
        self.camera.player_lon = lon;
        self.camera.player_heading_deg = heading_deg;
    }

    pub fn update_ghost_position(&mut self, lat: f64, lon: f64) {
        self.ghost.update(lat, lon);
    }

    pub fn hide_ghost(&mut self) {
        self.ghost.deactivate();
    }

    /// Uses every sample of `store` as the racing line drawn under the ghost.
    pub fn set_ghost_line(&mut self, store: &TrajectoryStore) {
        self.ghost_line = store.samples().iter().map(|s| (s.lat, s.lon)).collect();
        debug!("Ghost line set: {} points", self.ghost_line.len());
    }

    pub fn clear_ghost_line(&mut self) {
        self.ghost_line.clear();
    }

    /// Racing line as `(lat, lon)` points.
    pub fn ghost_line(&self) -> &[(f64, f64)] {
        &self.ghost_line
    }

    pub fn set_zoom(&mut self, zoom_level: f64) {
        self.camera.zoom_level = zoom_level;
    }

    /// Applies one calibration nudge and returns the new offset.
    pub fn nudge(&mut self, direction: NudgeDirection) -> CalibrationOffset {
        self.calibration.nudge(direction, self.nudge_step_deg);
        debug!(
            "Calibration nudged {:?}: lat={:.6} lon={:.6}",
            direction, self.calibration.lat_offset, self.calibration.lon_offset
        );
        self.calibration
    }

    pub fn set_calibration(&mut self, calibration: CalibrationOffset) {
        self.calibration = calibration;
    }

    /// Logs the current calibration so it can be copied into a config file.
    pub fn log_calibration(&self) {
        info!(
            "Final calibration: lat_offset={} lon_offset={}",
            self.calibration.lat_offset, self.calibration.lon_offset
        );
    }

    pub fn calibration(&self) -> CalibrationOffset {
        self.calibration
    }

    pub fn camera(&self) -> CameraState {
        self.camera
    }

    pub fn ghost(&self) -> GhostState {
        self.ghost
    }

    pub fn projector(&self) -> &GeoProjector {
        &self.projector
    }

    /// Composes a frame from the current state.
    pub fn render(&self) -> RenderFrame {
        self.compositor
            .compose(
                &self.camera,
                &self.ghost,
                &self.ghost_line,
                &self.projector,
                &self.calibration,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ghostlap_space::GeoBounds;
    use approx::assert_relative_eq;

    fn surface() -> TrackSurface {
        let bounds = GeoBounds::new(25.5000, 51.4400, 25.4850, 51.4560).unwrap();
        let mut config = SessionConfig::new(bounds, RasterSize::new(2048, 2048));
        config.viewport = RasterSize::new(1000, 2000);
        TrackSurface::from_config(&config).unwrap()
    }

    #[test]
    fn test_player_maps_to_viewport_center() {
        let mut surface = surface();
        for heading in [0.0, 37.5, 90.0, -135.0] {
            surface.update_player_position(25.4975, 51.4460, heading);
            let frame = surface.render();
            let screen = frame.to_screen(&frame.player_pixel);
            assert_relative_eq!(screen.x, 500.0, epsilon = 1e-6);
            assert_relative_eq!(screen.y, 1000.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_zoom_scales_offsets() {
        let player = Point2::new(100.0, 200.0);
        let m = camera_transform(&player, 0.0, 3.0, RasterSize::new(800, 600));
        let p = m.transform_point(&Point2::new(110.0, 195.0));
        assert_relative_eq!(p.x, 400.0 + 30.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 300.0 - 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_heading_points_up() {
        let player = Point2::new(100.0, 100.0);

        // Heading east: a point further east must appear straight above the player
        let m = camera_transform(&player, 90.0, 1.0, RasterSize::new(800, 600));
        let east = m.transform_point(&Point2::new(110.0, 100.0));
        assert_relative_eq!(east.x, 400.0, epsilon = 1e-9);
        assert_relative_eq!(east.y, 290.0, epsilon = 1e-9);

        // Heading south: a point further down the raster appears above the player
        let m = camera_transform(&player, 180.0, 2.0, RasterSize::new(800, 600));
        let south = m.transform_point(&Point2::new(100.0, 105.0));
        assert_relative_eq!(south.x, 400.0, epsilon = 1e-9);
        assert_relative_eq!(south.y, 290.0, epsilon = 1e-9);
    }

    #[test]
    fn test_transform_matches_step_by_step_composition() {
        let player = Point2::new(640.0, 320.0);
        let (heading, zoom) = (30.0f64, 4.0);
        let viewport = RasterSize::new(1080, 1920);
        let m = camera_transform(&player, heading, zoom, viewport);

        let world = Point2::new(700.0, 250.0);
        let (dx, dy) = ((world.x - player.x) * zoom, (world.y - player.y) * zoom);
        let a = (-heading).to_radians();
        let expected_x = 540.0 + dx * a.cos() - dy * a.sin();
        let expected_y = 960.0 + dx * a.sin() + dy * a.cos();

        let actual = m.transform_point(&world);
        assert_relative_eq!(actual.x, expected_x, epsilon = 1e-9);
        assert_relative_eq!(actual.y, expected_y, epsilon = 1e-9);
    }

    #[test]
    fn test_ghost_drawn_only_when_active() {
        let mut surface = surface();
        surface.update_player_position(25.4975, 51.4460, 0.0);
        assert!(surface.render().ghost.is_none());
        assert!(surface.render().ghost_on_screen().is_none());

        surface.update_ghost_position(25.4970, 51.4465);
        let frame = surface.render();
        let ghost = frame.ghost.unwrap();
        let expected = surface
            .projector()
            .project(25.4970, 51.4465, &surface.calibration());
        assert_eq!(ghost.position, expected);
        assert_eq!(ghost.radius, 20.0);
        assert_eq!(ghost.color, GHOST_COLOR);

        surface.hide_ghost();
        assert!(surface.render().ghost.is_none());
    }

    #[test]
    fn test_ghost_at_player_position_is_centered() {
        let mut surface = surface();
        surface.update_player_position(25.4975, 51.4460, 45.0);
        surface.update_ghost_position(25.4975, 51.4460);
        let screen = surface.render().ghost_on_screen().unwrap();
        assert_relative_eq!(screen.x, 500.0, epsilon = 1e-6);
        assert_relative_eq!(screen.y, 1000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_player_marker_fixed_at_center() {
        let mut surface = surface();
        surface.update_player_position(25.49, 51.45, 123.0);
        surface.set_zoom(2.0);
        let frame = surface.render();
        assert_eq!(frame.player.position, Point2::new(500.0, 1000.0));
        assert_eq!(frame.player.radius, 30.0);
        assert_eq!(frame.player.color, PLAYER_COLOR);
    }

    #[test]
    fn test_nudge_moves_projected_player() {
        let mut surface = surface();
        surface.update_player_position(25.4975, 51.4460, 0.0);
        let before = surface.render().player_pixel;

        let calib = surface.nudge(NudgeDirection::Right);
        assert!(calib.lon_offset > 0.0);
        let after = surface.render().player_pixel;
        assert!(after.x > before.x);
        assert_relative_eq!(after.y, before.y, epsilon = 1e-9);
    }

    #[test]
    fn test_ghost_line_follows_calibration() {
        let mut surface = surface();
        assert!(surface.render().ghost_line.is_empty());

        let (store, _) = TrajectoryStore::from_lines([
            "0,25.4975,51.4460",
            "1,25.4970,51.4465",
            "2,25.4965,51.4470",
        ]);
        surface.set_ghost_line(&store);
        surface.update_player_position(25.4975, 51.4460, 30.0);

        let before = surface.render();
        assert_eq!(before.ghost_line.len(), 3);
        // The first point of the line is where the player stands
        let start = before.ghost_line_on_screen()[0];
        assert_relative_eq!(start.x, 500.0, epsilon = 1e-6);
        assert_relative_eq!(start.y, 1000.0, epsilon = 1e-6);

        surface.nudge(NudgeDirection::Up);
        let after = surface.render();
        let dy = after.ghost_line[0].y - before.ghost_line[0].y;
        assert!(dy < 0.0);
        for (a, b) in before.ghost_line.iter().zip(&after.ghost_line) {
            assert_relative_eq!(b.x, a.x, epsilon = 1e-9);
            assert_relative_eq!(b.y - a.y, dy, epsilon = 1e-9);
        }

        surface.clear_ghost_line();
        assert!(surface.render().ghost_line.is_empty());
    }

    #[test]
    fn test_map_corners_at_zoom_one_heading_zero() {
        let mut surface = surface();
        surface.set_zoom(1.0);
        let (lat, lon) = surface.projector().bounds().center();
        surface.update_player_position(lat, lon, 0.0);
        let corners = surface.render().map_corners_on_screen();
        // Raster center sits on the viewport center
        assert_relative_eq!(corners[0].x, 500.0 - 1024.0, epsilon = 1e-6);
        assert_relative_eq!(corners[0].y, 1000.0 - 1024.0, epsilon = 1e-6);
        assert_relative_eq!(corners[2].x, 500.0 + 1024.0, epsilon = 1e-6);
        assert_relative_eq!(corners[2].y, 1000.0 + 1024.0, epsilon = 1e-6);
    }
}
