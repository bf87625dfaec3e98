use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    backend_config::PhysicalConfig,
    geometry_utils::normalise_angle,
    tracking::{FingerType, Hand},
    Point3D,
};

use super::virtual_screen::camera_rotation;

/// How far in from the top/bottom edges (as a fraction of screen height)
/// the user is asked to touch
pub const TARGET_DIST_FROM_EDGE: f32 = 0.2;

/// Recorded points closer than this (m) cannot define a screen
const MIN_SPAN_M: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum QuickSetupError {
    #[error("unable to find a hand for the top position")]
    MissingTop,
    #[error("unable to find a hand for the bottom position")]
    MissingBottom,
    #[error("top and bottom positions are only {0:.4} m apart")]
    Degenerate(f32),
    #[error("calibration produced a non-finite configuration")]
    NonFinite,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPoint {
    Top,
    Bottom,
}

/// Records the two calibration touches, then solves for the physical setup
#[derive(Debug, Default)]
pub struct QuickSetup {
    top: Option<Point3D>,
    bottom: Option<Point3D>,
}

impl QuickSetup {
    pub fn record(&mut self, point: CalibrationPoint, position: Point3D) {
        match point {
            CalibrationPoint::Top => {
                self.top = Some(position);
                self.bottom = None;
            }
            CalibrationPoint::Bottom => self.bottom = Some(position),
        }
    }

    /// Record the index fingertip of `hand` (tracking space). The top must
    /// always be recorded before the bottom
    pub fn record_hand(
        &mut self,
        point: CalibrationPoint,
        hand: Option<&Hand>,
    ) -> Result<(), QuickSetupError> {
        let missing = match point {
            CalibrationPoint::Top => QuickSetupError::MissingTop,
            CalibrationPoint::Bottom => QuickSetupError::MissingBottom,
        };
        let hand = hand.ok_or(missing)?;
        if point == CalibrationPoint::Bottom && self.top.is_none() {
            return Err(QuickSetupError::MissingTop);
        }
        self.record(point, hand.finger(FingerType::Index).tip());
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.top.is_some() && self.bottom.is_some()
    }

    pub fn reset(&mut self) {
        self.top = None;
        self.bottom = None;
    }

    pub fn solve(&self, current: &PhysicalConfig) -> Result<PhysicalConfig, QuickSetupError> {
        let top = self.top.ok_or(QuickSetupError::MissingTop)?;
        let bottom = self.bottom.ok_or(QuickSetupError::MissingBottom)?;
        solve(&top, &bottom, current)
    }
}

/// Derive screen height and camera pose from two touches on the screen surface,
/// recorded in tracking space at 80% (top) and 20% (bottom) of the screen height.
///
/// Screen size in pixels, screen tilt and mounting mode (overhead or desktop,
/// from the current camera roll) are taken from `current`.
pub fn solve(
    top: &Point3D,
    bottom: &Point3D,
    current: &PhysicalConfig,
) -> Result<PhysicalConfig, QuickSetupError> {
    let height_scaling = 1. / (1. - 2. * TARGET_DIST_FROM_EDGE);
    let edge_scaling = (height_scaling - 1.) / 2. + 1.;

    let span = top - bottom;
    // Sideways drift between the two touches says nothing about height or tilt
    let vertical_span = (span.y * span.y + span.z * span.z).sqrt();
    if vertical_span < MIN_SPAN_M {
        warn!("Quick setup points too close together: {} m", vertical_span);
        return Err(QuickSetupError::Degenerate(vertical_span));
    }

    let screen_height_m = vertical_span * height_scaling;
    let bottom_edge = top - span * edge_scaling;

    let overhead = current.is_overhead();
    let span_angle = span.z.atan2(span.y).to_degrees();
    let (pitch, roll) = if overhead {
        (span_angle - current.screen_rotation - 180., 180.)
    } else {
        (span_angle + current.screen_rotation, 0.)
    };
    let camera_rotation_degrees = Point3D::new(normalise_angle(pitch), 0., roll);

    let camera_position = -(camera_rotation(&camera_rotation_degrees) * bottom_edge);

    if !screen_height_m.is_finite()
        || camera_position.iter().any(|v| !v.is_finite())
        || camera_rotation_degrees.iter().any(|v| !v.is_finite())
    {
        return Err(QuickSetupError::NonFinite);
    }

    info!(
        "Quick setup: screen height {:.3} m, camera at {:?}, rotation {:?}",
        screen_height_m, camera_position, camera_rotation_degrees
    );

    Ok(PhysicalConfig {
        screen_height_m,
        camera_position,
        camera_rotation: camera_rotation_degrees,
        ..current.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{systems::virtual_screen::VirtualScreen, tracking::fixtures::pointing_hand};

    fn desktop() -> PhysicalConfig {
        PhysicalConfig::default()
    }

    fn overhead() -> PhysicalConfig {
        PhysicalConfig {
            camera_rotation: Point3D::new(0., 0., 180.),
            ..PhysicalConfig::default()
        }
    }

    /// Where the calibration touches land in tracking space for a known setup
    fn touches(config: &PhysicalConfig) -> (Point3D, Point3D) {
        let screen = VirtualScreen::new(config);
        let h = config.screen_height_px as f32;
        let centre = config.screen_width_px as f32 / 2.;
        let top = screen.screen_to_world(&crate::Point2D::new(centre, h * 0.8), 0.);
        let bottom = screen.screen_to_world(&crate::Point2D::new(centre, h * 0.2), 0.);
        (screen.world_to_tracking(&top), screen.world_to_tracking(&bottom))
    }

    fn assert_recovers(expected: &PhysicalConfig) {
        let (top, bottom) = touches(expected);
        let solved = solve(&top, &bottom, expected).expect("solve");
        assert!((solved.screen_height_m - expected.screen_height_m).abs() < 1e-4);
        assert!(
            (solved.camera_rotation - expected.camera_rotation).norm() < 1e-2,
            "rotation {:?} vs {:?}",
            solved.camera_rotation,
            expected.camera_rotation
        );
        assert!(
            (solved.camera_position - expected.camera_position).norm() < 1e-4,
            "position {:?} vs {:?}",
            solved.camera_position,
            expected.camera_position
        );
    }

    #[test]
    fn test_one_metre_apart() {
        let solved = solve(
            &Point3D::new(0., 1.2, 0.),
            &Point3D::new(0., 0.2, 0.),
            &desktop(),
        )
        .expect("solve");
        assert!((solved.screen_height_m - 1.0 / (1. - 0.4)).abs() < 1e-4);
    }

    #[test]
    fn test_vertical_is_zero_rotation() {
        let solved = solve(&Point3D::new(0., 1., 0.), &Point3D::zeros(), &desktop()).expect("solve");
        assert!(solved.camera_rotation.norm() < 1e-4);
    }

    #[test]
    fn test_horizontal_desktop() {
        let solved =
            solve(&Point3D::new(0., 0., -1.), &Point3D::zeros(), &desktop()).expect("solve");
        assert!((solved.camera_rotation.x + 90.).abs() < 1e-3);
    }

    #[test]
    fn test_overhead_reference_angles() {
        let vertical =
            solve(&Point3D::new(0., 1., 0.), &Point3D::zeros(), &overhead()).expect("solve");
        assert!((vertical.camera_rotation - Point3D::new(180., 0., 180.)).norm() < 1e-3);

        let horizontal =
            solve(&Point3D::new(0., 0., -1.), &Point3D::zeros(), &overhead()).expect("solve");
        assert!((horizontal.camera_rotation - Point3D::new(90., 0., 180.)).norm() < 1e-3);
    }

    #[test]
    fn test_round_trip_desktop() {
        assert_recovers(&PhysicalConfig {
            screen_height_m: 0.5,
            camera_position: Point3D::new(0., -0.04, 0.12),
            camera_rotation: Point3D::new(25., 0., 0.),
            ..desktop()
        });
        assert_recovers(&PhysicalConfig {
            screen_height_m: 0.4,
            camera_position: Point3D::new(0.02, -0.06, 0.15),
            camera_rotation: Point3D::new(-10., 0., 0.),
            screen_rotation: 20.,
            ..desktop()
        });
    }

    #[test]
    fn test_round_trip_overhead() {
        assert_recovers(&PhysicalConfig {
            screen_height_m: 0.6,
            camera_position: Point3D::new(0., 0.65, 0.1),
            camera_rotation: Point3D::new(30., 0., 180.),
            ..desktop()
        });
        assert_recovers(&PhysicalConfig {
            screen_height_m: 0.6,
            camera_position: Point3D::new(0., 0.65, 0.1),
            camera_rotation: Point3D::new(15., 0., 180.),
            screen_rotation: 10.,
            ..desktop()
        });
    }

    #[test]
    fn test_typed_failures() {
        let mut setup = QuickSetup::default();
        assert_eq!(setup.solve(&desktop()), Err(QuickSetupError::MissingTop));

        let hand = pointing_hand(Point3D::new(0., 0.3, 0.));
        assert_eq!(
            setup.record_hand(CalibrationPoint::Bottom, Some(&hand)),
            Err(QuickSetupError::MissingTop)
        );
        assert_eq!(
            setup.record_hand(CalibrationPoint::Top, None),
            Err(QuickSetupError::MissingTop)
        );
        assert!(setup.record_hand(CalibrationPoint::Top, Some(&hand)).is_ok());
        assert_eq!(setup.solve(&desktop()), Err(QuickSetupError::MissingBottom));

        // Same spot twice
        assert!(setup.record_hand(CalibrationPoint::Bottom, Some(&hand)).is_ok());
        assert!(setup.is_complete());
        assert!(matches!(
            setup.solve(&desktop()),
            Err(QuickSetupError::Degenerate(_))
        ));
    }
}
