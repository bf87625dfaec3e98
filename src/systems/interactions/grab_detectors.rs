use log::debug;
use map_range::MapRange;
use serde::{Deserialize, Serialize};

use crate::{
    backend_config::GrabSettings,
    tracking::{Finger, FingerType, Hand},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabAlgorithm {
    ClassicPinch,
    ClassicGrab,
    PinchOrGrab,
    /// Weighted blend of pinch strength and fist strength
    PinchAndFist,
    /// Average finger curl, with curl/uncurl angles
    FingerCurl,
    /// Finger curl, ignored while the hand is pointing (poking)
    FingerCurlPokeSuppressed,
    /// Integrates the speed of hand closing into a grab strength
    Physics,
}

/// What a detector may need besides the hand itself
pub struct DetectorContext {
    /// Microseconds
    pub timestamp: i64,
    /// Cursor speed in screen-world space (m/s)
    pub cursor_velocity: f32,
}

pub trait GestureDetector: Send {
    /// Returns whether the hand is grabbing, and how close it is to grabbing (0..1)
    fn evaluate(&mut self, hand: &Hand, ctx: &DetectorContext) -> (bool, f32);

    fn reset(&mut self);
}

pub fn create_detector(settings: &GrabSettings) -> Box<dyn GestureDetector> {
    debug!("Grab detector: {:?}", settings.algorithm);
    let pinch = || Hysteresis::new(settings.pinch_threshold, settings.unpinch_threshold);
    let grab = || Hysteresis::new(settings.grab_threshold, settings.ungrab_threshold);
    match settings.algorithm {
        GrabAlgorithm::ClassicPinch => Box::new(StrengthDetector {
            strength: |h: &Hand| h.pinch_strength,
            threshold: pinch(),
        }),
        GrabAlgorithm::ClassicGrab => Box::new(StrengthDetector {
            strength: |h: &Hand| h.grab_strength,
            threshold: grab(),
        }),
        GrabAlgorithm::PinchOrGrab => Box::new(PinchOrGrabDetector {
            pinch: pinch(),
            grab: grab(),
            grabbing: false,
        }),
        GrabAlgorithm::PinchAndFist => Box::new(PinchAndFistDetector {
            pinch_weight: settings.pinch_weight,
            threshold: grab(),
        }),
        GrabAlgorithm::FingerCurl => Box::new(PoseDetector::new(
            Box::new(FingerCurlPose),
            settings.curl_angle_deg,
            settings.uncurl_angle_deg,
        )),
        GrabAlgorithm::FingerCurlPokeSuppressed => Box::new(
            PoseDetector::new(
                Box::new(FingerCurlPose),
                settings.curl_angle_deg,
                settings.uncurl_angle_deg,
            )
            .suppressed_by(Box::new(PokePose {
                curl_angle_deg: settings.curl_angle_deg,
            })),
        ),
        GrabAlgorithm::Physics => Box::new(PhysicsGrabDetector::default()),
    }
}

/// Enter at `on`, leave below `off`
#[derive(Debug, Clone, Copy)]
struct Hysteresis {
    on: f32,
    off: f32,
    active: bool,
}

impl Hysteresis {
    fn new(on: f32, off: f32) -> Self {
        Hysteresis {
            on,
            off: off.min(on),
            active: false,
        }
    }

    fn threshold(&self) -> f32 {
        if self.active {
            self.off
        } else {
            self.on
        }
    }

    fn update(&mut self, value: f32) -> bool {
        self.active = value >= self.threshold();
        self.active
    }

    /// Value normalised against the threshold currently in force
    fn normalised(&self, value: f32) -> f32 {
        normalised(value, self.threshold())
    }
}

fn normalised(value: f32, threshold: f32) -> f32 {
    if threshold <= 0. {
        return 1.;
    }
    value.clamp(0., threshold).map_range(0. ..threshold, 0. ..1.)
}

/// A single strength value against a threshold pair
struct StrengthDetector<F: Fn(&Hand) -> f32 + Send> {
    strength: F,
    threshold: Hysteresis,
}

impl<F: Fn(&Hand) -> f32 + Send> GestureDetector for StrengthDetector<F> {
    fn evaluate(&mut self, hand: &Hand, _ctx: &DetectorContext) -> (bool, f32) {
        let value = (self.strength)(hand);
        let strength = self.threshold.normalised(value);
        (self.threshold.update(value), strength)
    }

    fn reset(&mut self) {
        self.threshold.active = false;
    }
}

struct PinchOrGrabDetector {
    pinch: Hysteresis,
    grab: Hysteresis,
    grabbing: bool,
}

impl GestureDetector for PinchOrGrabDetector {
    fn evaluate(&mut self, hand: &Hand, _ctx: &DetectorContext) -> (bool, f32) {
        // Both thresholds follow the combined state, not their own
        self.pinch.active = self.grabbing;
        self.grab.active = self.grabbing;
        let pinching = hand.pinch_strength >= self.pinch.threshold();
        let grabbing = hand.grab_strength >= self.grab.threshold();
        self.grabbing = pinching || grabbing;

        let strength = if self.grabbing {
            1.
        } else {
            normalised(hand.pinch_strength, self.pinch.on).max(normalised(hand.grab_strength, self.grab.on))
        };
        (self.grabbing, strength)
    }

    fn reset(&mut self) {
        self.grabbing = false;
    }
}

struct PinchAndFistDetector {
    pinch_weight: f32,
    threshold: Hysteresis,
}

impl GestureDetector for PinchAndFistDetector {
    fn evaluate(&mut self, hand: &Hand, _ctx: &DetectorContext) -> (bool, f32) {
        let score = self.pinch_weight * hand.pinch_strength
            + (1. - self.pinch_weight) * hand.fist_strength();
        let strength = self.threshold.normalised(score);
        (self.threshold.update(score), strength)
    }

    fn reset(&mut self) {
        self.threshold.active = false;
    }
}

/// A measurable hand shape
pub trait HandPose: Send {
    /// The pose metric, in whatever unit the pose thresholds use
    fn measure(&self, hand: &Hand) -> f32;
}

/// Angle (degrees) a finger bends through from its metacarpal to its distal bone
fn finger_curl(finger: &Finger) -> f32 {
    let base = finger.bones[0].direction();
    let end = finger.bones[3].direction();
    let angle = base.dot(&end).clamp(-1., 1.).acos().to_degrees();
    if angle.is_finite() { angle } else { 0. }
}

/// Average curl of the four fingers, in degrees
pub struct FingerCurlPose;

impl HandPose for FingerCurlPose {
    fn measure(&self, hand: &Hand) -> f32 {
        let fingers = &FingerType::ALL[1..];
        fingers.iter().map(|f| finger_curl(hand.finger(*f))).sum::<f32>() / fingers.len() as f32
    }
}

/// 1 when the index is straight while the other fingers are curled, else 0
pub struct PokePose {
    pub curl_angle_deg: f32,
}

impl HandPose for PokePose {
    fn measure(&self, hand: &Hand) -> f32 {
        let index_straight = finger_curl(hand.finger(FingerType::Index)) < self.curl_angle_deg / 2.;
        let others_curled = [FingerType::Middle, FingerType::Ring, FingerType::Pinky]
            .iter()
            .all(|f| finger_curl(hand.finger(*f)) >= self.curl_angle_deg);
        if index_straight && others_curled {
            1.
        } else {
            0.
        }
    }
}

pub struct PoseDetector {
    pose: Box<dyn HandPose>,
    threshold: Hysteresis,
    suppressor: Option<Box<dyn HandPose>>,
}

impl PoseDetector {
    pub fn new(pose: Box<dyn HandPose>, on: f32, off: f32) -> Self {
        PoseDetector {
            pose,
            threshold: Hysteresis::new(on, off),
            suppressor: None,
        }
    }

    /// A new grab cannot start while `pose` is held
    pub fn suppressed_by(mut self, pose: Box<dyn HandPose>) -> Self {
        self.suppressor = Some(pose);
        self
    }
}

impl GestureDetector for PoseDetector {
    fn evaluate(&mut self, hand: &Hand, _ctx: &DetectorContext) -> (bool, f32) {
        let value = self.pose.measure(hand);
        let strength = self.threshold.normalised(value);
        let suppressed = !self.threshold.active
            && self
                .suppressor
                .as_ref()
                .is_some_and(|s| s.measure(hand) >= 1.);
        if suppressed {
            return (false, 0.);
        }
        (self.threshold.update(value), strength)
    }

    fn reset(&mut self) {
        self.threshold.active = false;
    }
}

/// Change in the hand metric smaller than this is treated as noise
const METRIC_DEADZONE: f32 = 0.05;
const MAX_STIFFNESS: f32 = 10.;
const TRIGGER_VELOCITY: f32 = 1.;
const UNTRIGGER_VELOCITY: f32 = 0.001;
/// Cursor speed (m/s) above which an idle hand's grab strength drains
const CURSOR_DRAIN_VELOCITY: f32 = 0.15;
const RELEASE_STRENGTH: f32 = 0.9;

/// Weighted sum of the bend at each joint across the hand, normalised so a
/// flat hand is 0 and a closed fist approaches 1
fn closure_metric(hand: &Hand) -> f32 {
    const JOINT_WEIGHTS: [f32; 3] = [3., 1., 1.];
    const THUMB_JOINT_WEIGHTS: [f32; 3] = [1., 1., 1.];
    const FINGER_WEIGHTS: [f32; 5] = [1., 0.5, 1., 1., 1.];

    let mut sum = 0.;
    let mut total_weight = 0.;
    for finger_type in FingerType::ALL {
        let finger = hand.finger(finger_type);
        let weights = if finger_type == FingerType::Thumb {
            THUMB_JOINT_WEIGHTS
        } else {
            JOINT_WEIGHTS
        };
        let finger_weight = FINGER_WEIGHTS[finger_type as usize];
        for (joint, weight) in weights.iter().enumerate() {
            let a = finger.bones[joint].direction();
            let b = finger.bones[joint + 1].direction();
            let angle = a.dot(&b).clamp(-1., 1.).acos();
            if angle.is_finite() {
                sum += finger_weight * weight * angle;
            }
            total_weight += finger_weight * weight;
        }
    }
    sum / (total_weight * std::f32::consts::FRAC_PI_2)
}

/// Treats the grab strength as a spring driven by how fast the hand closes
#[derive(Default)]
pub struct PhysicsGrabDetector {
    previous: Option<(i64, f32)>,
    strength: f32,
    grabbing: bool,
    triggered: bool,
    forward: bool,
}

impl GestureDetector for PhysicsGrabDetector {
    fn evaluate(&mut self, hand: &Hand, ctx: &DetectorContext) -> (bool, f32) {
        let metric = closure_metric(hand);
        let Some((previous_timestamp, previous_metric)) = self.previous else {
            self.previous = Some((ctx.timestamp, metric));
            return (self.grabbing, self.strength);
        };
        let delta_time = (ctx.timestamp - previous_timestamp) as f32 / 1_000_000.;
        if delta_time <= 0. {
            return (self.grabbing, self.strength);
        }

        let stabilised = if (metric - previous_metric).abs() > METRIC_DEADZONE {
            metric - METRIC_DEADZONE * (metric - previous_metric).signum()
        } else {
            previous_metric
        };

        let mut velocity = (stabilised - previous_metric) / delta_time;
        if !self.triggered && velocity.abs() > TRIGGER_VELOCITY {
            self.triggered = true;
            self.forward = velocity > 0.;
        } else if self.triggered {
            let along = if self.forward { velocity } else { -velocity };
            if along < UNTRIGGER_VELOCITY {
                self.triggered = false;
            }
        }
        if !self.triggered {
            velocity = 0.;
        }
        if ctx.cursor_velocity > CURSOR_DRAIN_VELOCITY && !self.grabbing {
            velocity = -ctx.cursor_velocity;
        }

        self.strength = (self.strength + MAX_STIFFNESS * velocity * delta_time).clamp(0., 1.);
        if !self.grabbing && self.strength >= 1. {
            self.grabbing = true;
        } else if self.grabbing && self.strength < RELEASE_STRENGTH {
            self.grabbing = false;
        }

        self.previous = Some((ctx.timestamp, stabilised));
        (self.grabbing, self.strength)
    }

    fn reset(&mut self) {
        *self = PhysicsGrabDetector::default();
    }
}
