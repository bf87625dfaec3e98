use serde::{Deserialize, Serialize};

use crate::{
    tracking::{BoneType, FingerType, Hand},
    Point3D,
};

use super::virtual_screen::VirtualScreen;

/// Forward offset (m) applied to the stabilised index point, to make up for
/// the fingertip curling back as the user pushes
pub const INDEX_STABLE_FORWARD_OFFSET: f32 = 0.0533;

/// Bias (m) in favour of the joint chosen last tick by the nearest tracker
pub const NEAREST_HYSTERESIS: f32 = 0.01;

/// How much of the palm normal is mixed into the pointing direction for hand projection
const PROJECTION_PALM_BLEND: f32 = 0.25;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedPosition {
    IndexStable,
    IndexTip,
    Wrist,
    Nearest,
    HandProjection,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackerWeight {
    pub position: TrackedPosition,
    pub weight: f32,
}

impl TrackerWeight {
    pub fn new(position: TrackedPosition, weight: f32) -> Self {
        TrackerWeight { position, weight }
    }
}

/// Picks the point on a (screen-world space) hand that drives the cursor
pub trait PositionTracker: Send {
    fn tracked_position(&mut self, hand: &Hand, screen: &VirtualScreen) -> Point3D;
}

pub fn create_tracker(position: TrackedPosition) -> Box<dyn PositionTracker> {
    match position {
        TrackedPosition::IndexStable => Box::new(IndexStableTracker),
        TrackedPosition::IndexTip => Box::new(IndexTipTracker),
        TrackedPosition::Wrist => Box::new(WristTracker),
        TrackedPosition::Nearest => Box::new(NearestTracker::default()),
        TrackedPosition::HandProjection => Box::new(HandProjectionTracker),
    }
}

pub struct IndexStableTracker;

impl PositionTracker for IndexStableTracker {
    fn tracked_position(&mut self, hand: &Hand, screen: &VirtualScreen) -> Point3D {
        let index = hand.finger(FingerType::Index);
        let midpoint = (index.bone(BoneType::Metacarpal).next_joint
            + index.bone(BoneType::Proximal).next_joint)
            / 2.;
        midpoint - screen.normal() * INDEX_STABLE_FORWARD_OFFSET
    }
}

pub struct IndexTipTracker;

impl PositionTracker for IndexTipTracker {
    fn tracked_position(&mut self, hand: &Hand, _screen: &VirtualScreen) -> Point3D {
        hand.finger(FingerType::Index).tip()
    }
}

pub struct WristTracker;

impl PositionTracker for WristTracker {
    fn tracked_position(&mut self, hand: &Hand, _screen: &VirtualScreen) -> Point3D {
        hand.wrist_position
    }
}

/// Follows whichever joint is closest to the screen plane
#[derive(Default)]
pub struct NearestTracker {
    last_chosen: Option<(FingerType, usize)>,
}

impl PositionTracker for NearestTracker {
    fn tracked_position(&mut self, hand: &Hand, screen: &VirtualScreen) -> Point3D {
        let mut nearest: Option<((FingerType, usize), Point3D, f32)> = None;

        for finger in hand.fingers.iter() {
            for (bone_index, bone) in finger.bones.iter().enumerate() {
                let joint = bone.next_joint;
                let mut distance = screen.distance_from_screen_plane(&joint);
                if self.last_chosen == Some((finger.finger_type, bone_index)) {
                    distance -= NEAREST_HYSTERESIS;
                }
                if nearest.is_none_or(|(_, _, d)| distance < d) {
                    nearest = Some(((finger.finger_type, bone_index), joint, distance));
                }
            }
        }

        match nearest {
            Some((identity, joint, _)) => {
                self.last_chosen = Some(identity);
                joint
            }
            None => hand.palm_position,
        }
    }
}

/// Casts a ray from an estimated shoulder-side origin through the index knuckle
/// and returns where it meets the screen plane
pub struct HandProjectionTracker;

impl PositionTracker for HandProjectionTracker {
    fn tracked_position(&mut self, hand: &Hand, screen: &VirtualScreen) -> Point3D {
        let knuckle = hand
            .finger(FingerType::Index)
            .bone(BoneType::Metacarpal)
            .next_joint;

        // Roughly where the forearm line meets the elbow
        let origin = hand.wrist_position - (hand.palm_position - hand.wrist_position) * 3.;

        let direction = ((knuckle - origin).normalize() * (1. - PROJECTION_PALM_BLEND)
            + hand.palm_normal * PROJECTION_PALM_BLEND)
            .try_normalize(f32::EPSILON);

        let normal = screen.normal();
        let Some(direction) = direction else {
            return knuckle;
        };
        let approach = direction.dot(&normal);
        if approach >= -f32::EPSILON {
            // Pointing away from (or along) the screen; fall back to the knuckle
            return knuckle;
        }

        let distance = screen.distance_from_screen_plane(&knuckle);
        let on_plane = knuckle + direction * (-distance / approach);
        // Keep the hand's own distance so push-style interactions still work
        on_plane + normal * distance
    }
}

/// Weighted mean of several trackers
pub struct CombinedTracker {
    trackers: Vec<(Box<dyn PositionTracker>, f32)>,
}

impl CombinedTracker {
    pub fn new(weights: &[TrackerWeight]) -> Self {
        CombinedTracker {
            trackers: weights
                .iter()
                .map(|w| (create_tracker(w.position), w.weight))
                .collect(),
        }
    }
}

impl PositionTracker for CombinedTracker {
    fn tracked_position(&mut self, hand: &Hand, screen: &VirtualScreen) -> Point3D {
        let mut total = Point3D::zeros();
        let mut total_weight = 0.;
        for (tracker, weight) in self.trackers.iter_mut() {
            total += tracker.tracked_position(hand, screen) * *weight;
            total_weight += *weight;
        }
        if total_weight > 0. {
            total / total_weight
        } else {
            IndexStableTracker.tracked_position(hand, screen)
        }
    }
}
