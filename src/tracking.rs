use serde::{Deserialize, Serialize};

use crate::{Point2D, Point3D};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chirality {
    Left,
    Right,
}

/// Which of the (up to two) tracked hands a module listens to
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandType {
    Primary,
    Secondary,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputType {
    /// Position-only update; clients react to the data without treating it as input
    None,
    Cancel,
    Down,
    Move,
    Hover,
    Hold,
    Drag,
    Up,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionType {
    Grab,
    Hover,
    Push,
    TouchPlane,
    AirTap,
    AirClick,
    VelocitySwipe,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerType {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl FingerType {
    pub const ALL: [FingerType; 5] = [
        FingerType::Thumb,
        FingerType::Index,
        FingerType::Middle,
        FingerType::Ring,
        FingerType::Pinky,
    ];
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoneType {
    Metacarpal,
    Proximal,
    Intermediate,
    Distal,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bone {
    pub prev_joint: Point3D,
    pub next_joint: Point3D,
}

impl Bone {
    pub fn direction(&self) -> Point3D {
        (self.next_joint - self.prev_joint)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Point3D::zeros)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Finger {
    pub finger_type: FingerType,
    /// Metacarpal, proximal, intermediate, distal
    pub bones: [Bone; 4],
}

impl Finger {
    pub fn bone(&self, bone_type: BoneType) -> &Bone {
        &self.bones[bone_type as usize]
    }

    pub fn tip(&self) -> Point3D {
        self.bones[3].next_joint
    }

    /// Pointing direction of the finger, taken from the intermediate bone
    pub fn direction(&self) -> Point3D {
        self.bone(BoneType::Intermediate).direction()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hand {
    pub id: u32,
    pub chirality: Chirality,
    pub palm_position: Point3D,
    pub palm_normal: Point3D,
    /// From the palm towards the fingers
    pub palm_direction: Point3D,
    /// m/s
    pub palm_velocity: Point3D,
    pub wrist_position: Point3D,
    /// Thumb, index, middle, ring, pinky
    pub fingers: [Finger; 5],
    pub pinch_strength: f32,
    pub grab_strength: f32,
}

impl Hand {
    pub fn finger(&self, finger_type: FingerType) -> &Finger {
        &self.fingers[finger_type as usize]
    }

    /// 0 for a flat hand, 1 for a closed fist; ignores the thumb
    pub fn fist_strength(&self) -> f32 {
        let backwards = -self.palm_direction;
        let total: f32 = self.fingers[1..]
            .iter()
            .map(|f| f.direction().dot(&backwards))
            .sum();
        ((total / 4. + 1.) * 0.5).clamp(0., 1.)
    }

    /// Copy of this hand with every position mapped by `point` and every
    /// direction/velocity mapped by `vector`
    pub fn transformed(
        &self,
        point: impl Fn(&Point3D) -> Point3D,
        vector: impl Fn(&Point3D) -> Point3D,
    ) -> Hand {
        let mut hand = self.clone();
        hand.palm_position = point(&self.palm_position);
        hand.wrist_position = point(&self.wrist_position);
        hand.palm_normal = vector(&self.palm_normal);
        hand.palm_direction = vector(&self.palm_direction);
        hand.palm_velocity = vector(&self.palm_velocity);
        for finger in hand.fingers.iter_mut() {
            for bone in finger.bones.iter_mut() {
                bone.prev_joint = point(&bone.prev_joint);
                bone.next_joint = point(&bone.next_joint);
            }
        }
        hand
    }
}

/// One tick of tracking data, as delivered by the hand tracking source
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HandFrame {
    /// Microseconds
    pub timestamp: i64,
    pub hands: Vec<Hand>,
}

/// Per-tick output of the positioning pipeline. Screen positions are in
/// pixels, distance in metres (positive in front of the screen)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Positions {
    pub cursor_position: Point2D,
    pub click_position: Point2D,
    pub distance_from_screen: f32,
}

impl Positions {
    /// Same distance, but both screen positions pinned to `position`
    pub fn pinned_to(&self, position: Point2D) -> Positions {
        Positions {
            cursor_position: position,
            click_position: position,
            distance_from_screen: self.distance_from_screen,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputAction {
    pub timestamp: i64,
    pub interaction_type: InteractionType,
    pub hand_type: HandType,
    pub chirality: Chirality,
    pub input_type: InputType,
    pub cursor_position: Point2D,
    pub distance_from_screen: f32,
    pub progress_to_click: f32,
}

/// Keeps the primary hand stable by id, so a second hand entering the
/// view does not steal the cursor
#[derive(Debug, Default)]
pub struct HandAssigner {
    primary_id: Option<u32>,
}

/// The hands assigned for one tick; `None` means that hand is absent
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignedHands<'a> {
    pub primary: Option<&'a Hand>,
    pub secondary: Option<&'a Hand>,
}

impl<'a> AssignedHands<'a> {
    pub fn get(&self, hand_type: HandType) -> Option<&'a Hand> {
        match hand_type {
            HandType::Primary => self.primary,
            HandType::Secondary => self.secondary,
        }
    }
}

impl HandAssigner {
    pub fn assign<'a>(&mut self, hands: &'a [Hand]) -> AssignedHands<'a> {
        let primary = self
            .primary_id
            .and_then(|id| hands.iter().find(|h| h.id == id))
            .or_else(|| hands.first());

        self.primary_id = primary.map(|h| h.id);

        let secondary = primary.and_then(|p| hands.iter().find(|h| h.id != p.id));

        AssignedHands { primary, secondary }
    }
}
