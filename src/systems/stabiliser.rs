use log::debug;

use crate::{
    geometry_utils::{lerp, ResponseCurve},
    Point2D, Point3D,
};

/// Radii closer than this (m) count as equal
const RADIUS_TOLERANCE_M: f32 = 1e-6;

pub struct StabiliserSettings {
    /// Radius (m) of the default deadzone; 0 disables stabilisation entirely
    pub default_deadzone_radius: f32,
    /// Smoothing lerp rate (1/s) for a stationary hand
    pub smoothing_rate: f32,
}

/// Smoothing plus a dual-anchor deadzone.
///
/// Two deadzones run side by side over the same samples: one always at the
/// default radius, and the "current" one whose radius interactions may enlarge
/// (e.g. after a press) and later shrink back. The current anchor is the output.
pub struct PositionStabiliser {
    settings: StabiliserSettings,
    smoothed: Option<Point3D>,

    default_anchor: Option<Point2D>,
    current_anchor: Point2D,
    current_radius: f32,

    shrinking: bool,
    shrink_speed: f32,

    deadzone_offset: Point2D,
    last_raw: Point2D,
}

/// Move `anchor` just far enough that `sample` lies on the edge of its radius
pub fn apply_deadzone_sized(anchor: &Point2D, sample: &Point2D, radius: f32) -> Point2D {
    let separation = anchor - sample;
    if separation.norm() > radius {
        sample + separation.normalize() * radius
    } else {
        *anchor
    }
}

impl PositionStabiliser {
    pub fn new(settings: StabiliserSettings) -> Self {
        let current_radius = settings.default_deadzone_radius;
        PositionStabiliser {
            settings,
            smoothed: None,
            default_anchor: None,
            current_anchor: Point2D::zeros(),
            current_radius,
            shrinking: false,
            shrink_speed: 0.,
            deadzone_offset: Point2D::zeros(),
            last_raw: Point2D::zeros(),
        }
    }

    pub fn update_settings(&mut self, settings: StabiliserSettings) {
        self.settings = settings;
        if self.current_radius < self.settings.default_deadzone_radius || !self.shrinking {
            self.current_radius = self.settings.default_deadzone_radius;
        }
    }

    pub fn default_radius(&self) -> f32 {
        self.settings.default_deadzone_radius
    }

    pub fn current_radius(&self) -> f32 {
        self.current_radius
    }

    /// Enlarge (or shrink) the current deadzone; never below the default
    pub fn set_current_radius(&mut self, radius: f32) {
        self.current_radius = radius.max(self.settings.default_deadzone_radius);
    }

    pub fn is_shrinking(&self) -> bool {
        self.shrinking
    }

    fn is_disabled(&self) -> bool {
        self.settings.default_deadzone_radius <= 0.
    }

    /// Forget all history, e.g. when the hand is lost
    pub fn reset(&mut self) {
        self.smoothed = None;
        self.default_anchor = None;
        self.current_radius = self.settings.default_deadzone_radius;
        self.shrinking = false;
        self.shrink_speed = 0.;
        self.deadzone_offset = Point2D::zeros();
    }

    /// Exponential smoothing whose rate rises towards "follow exactly" as the
    /// hand speeds up (velocity in m/s, saturating at 1)
    pub fn smooth(&mut self, raw: &Point3D, velocity: f32, delta_time: f32) -> Point3D {
        if self.is_disabled() {
            return *raw;
        }
        let smoothed = match self.smoothed {
            None => *raw,
            Some(previous) if delta_time > 0. => {
                let rate = lerp(
                    self.settings.smoothing_rate,
                    1. / delta_time,
                    velocity.clamp(0., 1.),
                );
                previous.lerp(raw, (rate * delta_time).clamp(0., 1.))
            }
            Some(previous) => previous,
        };
        self.smoothed = Some(smoothed);
        smoothed
    }

    /// Deadzone filter over screen positions in metres
    pub fn apply_deadzone(&mut self, position: &Point2D) -> Point2D {
        self.last_raw = *position;
        let position = position + self.deadzone_offset;

        if self.is_disabled() {
            return position;
        }

        let Some(previous_default) = self.default_anchor else {
            self.default_anchor = Some(position);
            self.current_anchor = position;
            return position;
        };

        let new_default =
            apply_deadzone_sized(&previous_default, &position, self.settings.default_deadzone_radius);

        if self.shrinking {
            self.shrink(&previous_default, &new_default);
        }

        self.current_anchor = apply_deadzone_sized(&self.current_anchor, &position, self.current_radius);
        self.default_anchor = Some(new_default);
        self.current_anchor
    }

    /// Shrink the current radius by however far the default anchor moved away
    /// from the current one
    fn shrink(&mut self, previous_default: &Point2D, new_default: &Point2D) {
        if self.finish_shrink_at_default() {
            return;
        }
        let default_change = new_default - previous_default;
        let separation = previous_default - self.current_anchor;
        let length = separation.norm();
        if length <= f32::EPSILON {
            return;
        }
        let moved_away = (default_change.dot(&separation) / length).max(0.);
        self.current_radius -= moved_away * self.shrink_speed;
        self.finish_shrink_at_default();
    }

    /// Snap to the default radius and stop once within float noise of it
    fn finish_shrink_at_default(&mut self) -> bool {
        if self.current_radius - self.settings.default_deadzone_radius > RADIUS_TOLERANCE_M {
            return false;
        }
        self.current_radius = self.settings.default_deadzone_radius;
        self.stop_shrinking();
        debug!("Deadzone shrunk back to default");
        true
    }

    pub fn start_shrinking(&mut self, speed: f32) {
        if self.current_radius - self.settings.default_deadzone_radius <= RADIUS_TOLERANCE_M {
            // Already at default size
            return;
        }
        self.shrink_speed = speed;
        self.shrinking = true;
    }

    pub fn stop_shrinking(&mut self) {
        self.shrink_speed = 0.;
        self.shrinking = false;
    }

    /// Grow the current radius from default towards default + `max_increase`
    /// as progress approaches 1
    pub fn scale_deadzone_by_progress(&mut self, progress: f32, max_increase: f32, curve: &ResponseCurve) {
        let scaled = curve.evaluate(progress.clamp(0., 1.));
        let default = self.settings.default_deadzone_radius;
        self.current_radius = lerp(default, default + max_increase, scaled);
    }

    /// Hold the output where it currently is, even though the raw position has moved on
    pub fn set_deadzone_offset(&mut self) {
        if !self.is_disabled() {
            self.deadzone_offset = self.current_anchor - self.last_raw;
        }
    }

    /// Let a held offset decay back towards the raw position
    pub fn reduce_deadzone_offset(&mut self) {
        self.deadzone_offset *= 0.9;
    }
}
