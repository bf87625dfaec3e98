use serde::{Deserialize, Serialize};

use crate::{
    backend_config::{InteractionConfig, SnapSettings},
    geometry_utils::distance,
    tracking::{Hand, Positions},
    Point2D,
};

use super::{
    position_trackers::{CombinedTracker, PositionTracker, TrackerWeight},
    stabiliser::{PositionStabiliser, StabiliserSettings},
    virtual_screen::VirtualScreen,
};

/// Heavier smoothing while dragging
pub const DRAG_SMOOTHING_FACTOR: f32 = 10.;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapMode {
    None,
    /// Only the click position snaps; the cursor stays where the hand is
    Click,
    ClickAndCursor,
    /// Click snaps; cursor eases between target and hand by separation
    SoftClickAndCursor,
}

/// A UI element (screen pixels) that clicks may be pulled towards
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapTarget {
    pub centre: Point2D,
    pub radius: f32,
}

pub struct PositioningModule {
    tracker: Box<dyn PositionTracker>,
    pub stabiliser: PositionStabiliser,
    vertical_offset_m: f32,
    snapping: SnapSettings,
    snap_targets: Vec<SnapTarget>,
    dragging: bool,
    last_positions: Positions,
}

impl PositioningModule {
    pub fn new(trackers: &[TrackerWeight], config: &InteractionConfig) -> Self {
        PositioningModule {
            tracker: Box::new(CombinedTracker::new(trackers)),
            stabiliser: PositionStabiliser::new(stabiliser_settings(config)),
            vertical_offset_m: config.vertical_offset_m,
            snapping: config.snapping.clone(),
            snap_targets: Vec::new(),
            dragging: false,
            last_positions: Positions::default(),
        }
    }

    pub fn apply_config(&mut self, trackers: &[TrackerWeight], config: &InteractionConfig) {
        self.tracker = Box::new(CombinedTracker::new(trackers));
        self.stabiliser.update_settings(stabiliser_settings(config));
        self.vertical_offset_m = config.vertical_offset_m;
        self.snapping = config.snapping.clone();
    }

    pub fn set_snap_targets(&mut self, targets: &[SnapTarget]) {
        self.snap_targets = targets.to_vec();
    }

    /// Interactions flag an active drag to get heavier smoothing
    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    pub fn last_positions(&self) -> Positions {
        self.last_positions
    }

    /// Run the full pipeline for one tick. With no hand, the previous
    /// positions are returned unchanged
    pub fn update(&mut self, hand: Option<&Hand>, screen: &VirtualScreen, delta_time: f32) -> Positions {
        let Some(hand) = hand else {
            return self.last_positions;
        };

        let tracked = self.tracker.tracked_position(hand, screen);

        let delta_time = if self.dragging {
            delta_time * DRAG_SMOOTHING_FACTOR
        } else {
            delta_time
        };
        let smoothed = self
            .stabiliser
            .smooth(&tracked, hand.palm_velocity.norm(), delta_time);

        let on_screen = screen.world_to_screen(&smoothed);
        let metres = screen.pixels_to_meters(&Point2D::new(on_screen.x, on_screen.y));
        let stabilised = self.stabiliser.apply_deadzone(&metres);
        let mut cursor = screen.meters_to_pixels(&stabilised);
        cursor.y += screen.meters_to_pixels(&Point2D::new(0., self.vertical_offset_m)).y;

        let positions = self.snap(Positions {
            cursor_position: cursor,
            click_position: cursor,
            distance_from_screen: on_screen.z,
        });
        self.last_positions = positions;
        positions
    }

    fn nearest_target(&self, cursor: &Point2D) -> Option<(Point2D, f32)> {
        self.snap_targets
            .iter()
            .map(|t| (t, distance(&t.centre, cursor)))
            .filter(|(t, d)| *d <= t.radius + self.snapping.margin_px)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(t, d)| (t.centre, d))
    }

    fn snap(&self, positions: Positions) -> Positions {
        if self.snapping.mode == SnapMode::None {
            return positions;
        }
        let raw = positions.cursor_position;
        let Some((target, separation)) = self.nearest_target(&raw) else {
            return positions;
        };

        let cursor = match self.snapping.mode {
            SnapMode::None | SnapMode::Click => raw,
            SnapMode::ClickAndCursor => target,
            SnapMode::SoftClickAndCursor => {
                let t = self
                    .snapping
                    .easing
                    .evaluate((separation * self.snapping.softness).clamp(0., 1.));
                target.lerp(&raw, t)
            }
        };

        Positions {
            cursor_position: cursor,
            click_position: target,
            distance_from_screen: positions.distance_from_screen,
        }
    }

    pub fn reset(&mut self) {
        self.stabiliser.reset();
        self.dragging = false;
    }
}

fn stabiliser_settings(config: &InteractionConfig) -> StabiliserSettings {
    StabiliserSettings {
        default_deadzone_radius: config.deadzone_radius,
        smoothing_rate: config.smoothing_rate,
    }
}
