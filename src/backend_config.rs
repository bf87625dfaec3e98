use log::{debug, error, info, warn};
use std::fs;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::{
    geometry_utils::{normalise_angle, ResponseCurve},
    systems::{
        interactions::grab_detectors::GrabAlgorithm,
        position_trackers::{TrackedPosition, TrackerWeight},
        positioning::SnapMode,
    },
    tracking::{HandType, InteractionType},
    Point3D,
};

const MIN_SCREEN_HEIGHT_M: f32 = 0.01;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PhysicalConfig {
    /// Height of the visible screen area, in metres
    pub screen_height_m: f32,

    pub screen_width_px: u32,
    pub screen_height_px: u32,

    /// Camera position (m) relative to the bottom-centre of the screen;
    /// X right, Y up, Z towards the user
    pub camera_position: Point3D,

    /// Camera rotation (degrees) about X, Y, Z. A Z rotation beyond ±90 means the
    /// camera is mounted overhead (screentop/HMD); positive X always tilts towards the screen
    pub camera_rotation: Point3D,

    /// Tilt of the screen (degrees) away from vertical; positive leans the top away from the user
    pub screen_rotation: f32,
}

impl Default for PhysicalConfig {
    fn default() -> Self {
        PhysicalConfig {
            screen_height_m: 0.33,
            screen_width_px: 1920,
            screen_height_px: 1080,
            camera_position: Point3D::new(0., -0.05, 0.05),
            camera_rotation: Point3D::zeros(),
            screen_rotation: 0.,
        }
    }
}

impl PhysicalConfig {
    pub fn is_overhead(&self) -> bool {
        self.camera_rotation.z.abs() > 90.
    }

    /// Copy with out-of-range values pulled back into bounds and angles normalised
    pub fn sanitised(&self) -> PhysicalConfig {
        let mut config = self.clone();
        if !config.screen_height_m.is_finite() || config.screen_height_m < MIN_SCREEN_HEIGHT_M {
            warn!(
                "Screen height {} m is out of range; using {} m",
                config.screen_height_m, MIN_SCREEN_HEIGHT_M
            );
            config.screen_height_m = MIN_SCREEN_HEIGHT_M;
        }
        config.screen_width_px = config.screen_width_px.max(1);
        config.screen_height_px = config.screen_height_px.max(1);
        config.camera_rotation = config.camera_rotation.map(normalise_angle);
        config.screen_rotation = normalise_angle(config.screen_rotation);
        config
    }
}

// -------- PER-INTERACTION SETTINGS

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct InteractionZoneSettings {
    /// When enabled, hands outside [minDistanceM;maxDistanceM] from the screen are ignored
    pub enabled: bool,
    pub min_distance_m: f32,
    pub max_distance_m: f32,
}

impl Default for InteractionZoneSettings {
    fn default() -> Self {
        InteractionZoneSettings {
            enabled: false,
            min_distance_m: 0.,
            max_distance_m: 0.25,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapSettings {
    pub mode: SnapMode,
    /// Extra distance (px) beyond a target's radius within which it can still be snapped to
    pub margin_px: f32,
    /// Soft snapping: how quickly (per px of separation) the cursor eases back to its raw position
    pub softness: f32,
    pub easing: ResponseCurve,
}

impl Default for SnapSettings {
    fn default() -> Self {
        SnapSettings {
            mode: SnapMode::None,
            margin_px: 20.,
            softness: 0.005,
            easing: ResponseCurve::Linear,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PushSettings {
    pub trackers: Vec<TrackerWeight>,
    /// Distance (m) at and beyond which progress is 0
    pub distance_at_no_progress_m: f32,
    /// Distance (m) at which progress reaches 1
    pub distance_at_max_progress_m: f32,
    pub drag_start_distance_m: f32,
    /// A press held this long (s) becomes a drag even without movement
    pub drag_start_time_s: f32,
}

impl Default for PushSettings {
    fn default() -> Self {
        PushSettings {
            trackers: vec![TrackerWeight::new(TrackedPosition::IndexStable, 1.)],
            distance_at_no_progress_m: 0.1,
            distance_at_max_progress_m: 0.,
            drag_start_distance_m: 0.04,
            drag_start_time_s: 0.6,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TouchPlaneSettings {
    pub trackers: Vec<TrackerWeight>,
    /// Distance (m) in front of the screen at which the touch plane sits
    pub touch_distance_m: f32,
    /// Once pressed, the hand must retreat this much further (m) beyond the plane to release
    pub release_hysteresis_m: f32,
    /// Distance (m) beyond the plane at which progress drops to 0
    pub progress_span_m: f32,
    pub drag_start_distance_m: f32,
    pub deadzone_shrink_speed: f32,
}

impl Default for TouchPlaneSettings {
    fn default() -> Self {
        TouchPlaneSettings {
            trackers: vec![TrackerWeight::new(TrackedPosition::Nearest, 1.)],
            touch_distance_m: 0.05,
            release_hysteresis_m: 0.01,
            progress_span_m: 0.1,
            drag_start_distance_m: 0.01,
            deadzone_shrink_speed: 0.3,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AirTapSettings {
    pub trackers: Vec<TrackerWeight>,
    /// Maps dot(palm forward, index forward) to progress
    pub progress_curve: ResponseCurve,
    pub max_deadzone_increase_m: f32,
    pub drag_start_distance_m: f32,
    pub deadzone_shrink_speed: f32,
}

impl Default for AirTapSettings {
    fn default() -> Self {
        AirTapSettings {
            trackers: vec![TrackerWeight::new(TrackedPosition::IndexStable, 1.)],
            progress_curve: ResponseCurve::Keyframes(vec![[0.55, 1.], [0.95, 0.]]),
            max_deadzone_increase_m: 0.02,
            drag_start_distance_m: 0.01,
            deadzone_shrink_speed: 0.3,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AirClickSettings {
    pub trackers: Vec<TrackerWeight>,
    /// Index flex (degrees) from the start of a fast movement needed to click
    pub max_angle_change_deg: f32,
    /// Slower flexing than this (deg/s) does not progress a click
    pub min_angle_change_per_second: f32,
    /// Deadzone radius (m) applied on press; doubles as the drag start threshold
    pub drag_start_distance_m: f32,
    /// While dragging, the press is held as long as progress stays above this
    pub drag_hold_progress: f32,
    pub max_deadzone_increase_m: f32,
    pub deadzone_shrink_speed: f32,
}

impl Default for AirClickSettings {
    fn default() -> Self {
        AirClickSettings {
            trackers: vec![TrackerWeight::new(TrackedPosition::IndexStable, 1.)],
            max_angle_change_deg: 30.,
            min_angle_change_per_second: 180.,
            drag_start_distance_m: 0.03,
            drag_hold_progress: 0.8,
            max_deadzone_increase_m: 0.02,
            deadzone_shrink_speed: 0.9,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GrabSettings {
    pub trackers: Vec<TrackerWeight>,
    pub algorithm: GrabAlgorithm,
    pub pinch_threshold: f32,
    pub unpinch_threshold: f32,
    pub grab_threshold: f32,
    pub ungrab_threshold: f32,
    /// Weight of pinch (vs fist) in the combined pinch+fist score
    pub pinch_weight: f32,
    /// Average finger curl (degrees) that counts as a grab for pose-based detection
    pub curl_angle_deg: f32,
    pub uncurl_angle_deg: f32,
    /// Grabs shorter than this (s) are never reported
    pub min_grab_duration_s: f32,
    /// A new grab is ignored while the cursor moves faster than this (m/s)
    pub max_hand_velocity: f32,
    pub deadzone_enlargement_m: f32,
    pub deadzone_shrink_speed: f32,
    pub drag_start_distance_m: f32,
}

impl Default for GrabSettings {
    fn default() -> Self {
        GrabSettings {
            trackers: vec![TrackerWeight::new(TrackedPosition::IndexStable, 1.)],
            algorithm: GrabAlgorithm::PinchOrGrab,
            pinch_threshold: 0.8,
            unpinch_threshold: 0.6,
            grab_threshold: 0.8,
            ungrab_threshold: 0.6,
            pinch_weight: 0.5,
            curl_angle_deg: 70.,
            uncurl_angle_deg: 40.,
            min_grab_duration_s: 0.05,
            max_hand_velocity: 0.15,
            deadzone_enlargement_m: 0.02,
            deadzone_shrink_speed: 0.3,
            drag_start_distance_m: 0.01,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HoverAndHoldSettings {
    pub trackers: Vec<TrackerWeight>,
    /// How long (s) the cursor must stay put before the hold timer starts
    pub hover_start_time_s: f32,
    /// How long (s) the hold timer runs before clicking
    pub hover_complete_time_s: f32,
    pub click_hold_time_s: f32,
    pub deadzone_enlargement_m: f32,
    pub deadzone_shrink_speed: f32,
}

impl Default for HoverAndHoldSettings {
    fn default() -> Self {
        HoverAndHoldSettings {
            trackers: vec![TrackerWeight::new(TrackedPosition::IndexStable, 1.)],
            hover_start_time_s: 0.5,
            hover_complete_time_s: 0.6,
            click_hold_time_s: 0.2,
            deadzone_enlargement_m: 0.005,
            deadzone_shrink_speed: 0.3,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VelocitySwipeSettings {
    pub trackers: Vec<TrackerWeight>,
    /// Cursor speed (m/s) along the swipe axis that starts a swipe
    pub min_scroll_velocity: f32,
    /// Upward swipes start this much (m/s) below the minimum
    pub upwards_min_velocity_decrease: f32,
    /// Downward swipes need this much (m/s) above the minimum
    pub downwards_min_velocity_increase: f32,
    /// The swipe ends once the cursor slows below this (m/s) along its axis
    pub max_release_velocity: f32,
    /// Sideways speed (m/s) above which a single-axis swipe cannot start
    pub max_lateral_velocity: f32,
    /// After a swipe, moving back faster than this (m/s) keeps new swipes blocked
    pub max_opposing_velocity: f32,
    /// No new swipe for this long (s) after one ends
    pub scroll_delay_s: f32,
    /// Fast travel (m) needed before a swipe counts
    pub min_swipe_length_m: f32,
    /// Sideways drift (m) allowed from the swipe origin, plus `swipe_width_scaling`
    /// times the distance swiped
    pub max_swipe_width_m: f32,
    pub swipe_width_scaling: f32,
    /// With both axes allowed, let a swipe start whatever the sideways speed
    pub allow_bidirectional: bool,
    pub allow_horizontal: bool,
    pub allow_vertical: bool,
}

impl Default for VelocitySwipeSettings {
    fn default() -> Self {
        VelocitySwipeSettings {
            trackers: vec![TrackerWeight::new(TrackedPosition::IndexTip, 1.)],
            min_scroll_velocity: 0.625,
            upwards_min_velocity_decrease: 0.05,
            downwards_min_velocity_increase: 0.05,
            max_release_velocity: 0.2,
            max_lateral_velocity: 0.3,
            max_opposing_velocity: 0.065,
            scroll_delay_s: 0.45,
            min_swipe_length_m: 0.01,
            max_swipe_width_m: 0.01,
            swipe_width_scaling: 0.2,
            allow_bidirectional: false,
            allow_horizontal: true,
            allow_vertical: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct InteractionConfig {
    /// The main interaction; it alone runs unless additional ones are listed
    pub interaction_type: InteractionType,

    /// Further interactions to run alongside the main one. With more than one,
    /// the interaction making the most progress wins each tick
    pub additional_interaction_types: Vec<InteractionType>,

    pub hand_type: HandType,

    /// Allow press-and-move to drag/scroll. When disabled, presses become clicks
    pub use_scrolling_or_dragging: bool,

    /// Also run the velocity swipe, unless the main interaction is grab
    pub use_swipe_interaction: bool,

    /// Without dragging: release the click straight after pressing rather than
    /// waiting for the hand to withdraw
    pub instant_unclick: bool,

    /// Default deadzone radius (m); 0 disables stabilisation
    pub deadzone_radius: f32,

    /// Base smoothing rate (1/s); raised towards "no smoothing" as the hand speeds up
    pub smoothing_rate: f32,

    /// Moves the cursor up (m) from the tracked point
    pub vertical_offset_m: f32,

    pub interaction_zone: InteractionZoneSettings,
    pub snapping: SnapSettings,

    // -------- INTERACTIONS
    pub push: PushSettings,
    pub touch_plane: TouchPlaneSettings,
    pub air_tap: AirTapSettings,
    pub air_click: AirClickSettings,
    pub grab: GrabSettings,
    pub hover_and_hold: HoverAndHoldSettings,
    pub velocity_swipe: VelocitySwipeSettings,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        InteractionConfig {
            interaction_type: InteractionType::Push,
            additional_interaction_types: Vec::new(),
            hand_type: HandType::Primary,
            use_scrolling_or_dragging: false,
            use_swipe_interaction: false,
            instant_unclick: true,
            deadzone_radius: 0.003,
            smoothing_rate: 10.,
            vertical_offset_m: 0.,
            interaction_zone: InteractionZoneSettings::default(),
            snapping: SnapSettings::default(),
            push: PushSettings::default(),
            touch_plane: TouchPlaneSettings::default(),
            air_tap: AirTapSettings::default(),
            air_click: AirClickSettings::default(),
            grab: GrabSettings::default(),
            hover_and_hold: HoverAndHoldSettings::default(),
            velocity_swipe: VelocitySwipeSettings::default(),
        }
    }
}

fn at_least(name: &str, value: f32, min: f32) -> f32 {
    if value.is_finite() && value >= min {
        value
    } else {
        warn!("{} = {} is out of range; clamped to {}", name, value, min);
        min
    }
}

fn unit_range(name: &str, value: f32) -> f32 {
    let clamped = at_least(name, value, 0.);
    if clamped > 1. {
        warn!("{} = {} is out of range; clamped to 1", name, value);
        1.
    } else {
        clamped
    }
}

impl InteractionConfig {
    /// Every enabled interaction, main one first, without duplicates
    pub fn enabled_interactions(&self) -> Vec<InteractionType> {
        let mut enabled = vec![self.interaction_type];
        for t in &self.additional_interaction_types {
            if !enabled.contains(t) {
                enabled.push(*t);
            }
        }
        let swipe = InteractionType::VelocitySwipe;
        if self.use_swipe_interaction
            && self.interaction_type != InteractionType::Grab
            && !enabled.contains(&swipe)
        {
            enabled.push(swipe);
        }
        enabled
    }

    /// Copy with every value clamped into its documented bounds
    pub fn sanitised(&self) -> InteractionConfig {
        let mut c = self.clone();

        c.deadzone_radius = at_least("deadzoneRadius", c.deadzone_radius, 0.);
        c.smoothing_rate = at_least("smoothingRate", c.smoothing_rate, 0.);
        if !c.vertical_offset_m.is_finite() {
            c.vertical_offset_m = 0.;
        }

        let zone = &mut c.interaction_zone;
        zone.min_distance_m = at_least("interactionZone.minDistanceM", zone.min_distance_m, 0.);
        zone.max_distance_m = at_least(
            "interactionZone.maxDistanceM",
            zone.max_distance_m,
            zone.min_distance_m,
        );

        c.snapping.margin_px = at_least("snapping.marginPx", c.snapping.margin_px, 0.);
        c.snapping.softness = at_least("snapping.softness", c.snapping.softness, 0.);

        let push = &mut c.push;
        push.distance_at_max_progress_m = at_least(
            "push.distanceAtMaxProgressM",
            push.distance_at_max_progress_m,
            0.,
        );
        push.distance_at_no_progress_m = at_least(
            "push.distanceAtNoProgressM",
            push.distance_at_no_progress_m,
            push.distance_at_max_progress_m,
        );
        push.drag_start_distance_m =
            at_least("push.dragStartDistanceM", push.drag_start_distance_m, 0.);
        push.drag_start_time_s = at_least("push.dragStartTimeS", push.drag_start_time_s, 0.);

        let touch_plane = &mut c.touch_plane;
        touch_plane.touch_distance_m =
            at_least("touchPlane.touchDistanceM", touch_plane.touch_distance_m, 0.);
        touch_plane.release_hysteresis_m = at_least(
            "touchPlane.releaseHysteresisM",
            touch_plane.release_hysteresis_m,
            0.,
        );
        touch_plane.progress_span_m =
            at_least("touchPlane.progressSpanM", touch_plane.progress_span_m, 0.001);
        touch_plane.drag_start_distance_m = at_least(
            "touchPlane.dragStartDistanceM",
            touch_plane.drag_start_distance_m,
            0.,
        );

        let air_tap = &mut c.air_tap;
        air_tap.max_deadzone_increase_m = at_least(
            "airTap.maxDeadzoneIncreaseM",
            air_tap.max_deadzone_increase_m,
            0.,
        );

        let air_click = &mut c.air_click;
        air_click.max_angle_change_deg =
            at_least("airClick.maxAngleChangeDeg", air_click.max_angle_change_deg, 1.);
        air_click.drag_hold_progress =
            unit_range("airClick.dragHoldProgress", air_click.drag_hold_progress);

        let grab = &mut c.grab;
        grab.pinch_threshold = unit_range("grab.pinchThreshold", grab.pinch_threshold);
        grab.grab_threshold = unit_range("grab.grabThreshold", grab.grab_threshold);
        grab.unpinch_threshold = unit_range("grab.unpinchThreshold", grab.unpinch_threshold)
            .min(grab.pinch_threshold);
        grab.ungrab_threshold =
            unit_range("grab.ungrabThreshold", grab.ungrab_threshold).min(grab.grab_threshold);
        grab.pinch_weight = unit_range("grab.pinchWeight", grab.pinch_weight);
        grab.uncurl_angle_deg = grab.uncurl_angle_deg.min(grab.curl_angle_deg);
        grab.min_grab_duration_s = at_least("grab.minGrabDurationS", grab.min_grab_duration_s, 0.);
        grab.max_hand_velocity = at_least("grab.maxHandVelocity", grab.max_hand_velocity, 0.);

        let hover = &mut c.hover_and_hold;
        hover.hover_start_time_s =
            at_least("hoverAndHold.hoverStartTimeS", hover.hover_start_time_s, 0.);
        hover.hover_complete_time_s = at_least(
            "hoverAndHold.hoverCompleteTimeS",
            hover.hover_complete_time_s,
            0.01,
        );
        hover.click_hold_time_s =
            at_least("hoverAndHold.clickHoldTimeS", hover.click_hold_time_s, 0.);

        let swipe = &mut c.velocity_swipe;
        swipe.min_scroll_velocity =
            at_least("velocitySwipe.minScrollVelocity", swipe.min_scroll_velocity, 0.);
        swipe.upwards_min_velocity_decrease = at_least(
            "velocitySwipe.upwardsMinVelocityDecrease",
            swipe.upwards_min_velocity_decrease,
            0.,
        );
        swipe.downwards_min_velocity_increase = at_least(
            "velocitySwipe.downwardsMinVelocityIncrease",
            swipe.downwards_min_velocity_increase,
            0.,
        );
        swipe.max_release_velocity =
            at_least("velocitySwipe.maxReleaseVelocity", swipe.max_release_velocity, 0.);
        swipe.max_lateral_velocity =
            at_least("velocitySwipe.maxLateralVelocity", swipe.max_lateral_velocity, 0.);
        swipe.max_opposing_velocity =
            at_least("velocitySwipe.maxOpposingVelocity", swipe.max_opposing_velocity, 0.);
        swipe.scroll_delay_s = at_least("velocitySwipe.scrollDelayS", swipe.scroll_delay_s, 0.);
        swipe.min_swipe_length_m =
            at_least("velocitySwipe.minSwipeLengthM", swipe.min_swipe_length_m, 0.);
        swipe.max_swipe_width_m =
            at_least("velocitySwipe.maxSwipeWidthM", swipe.max_swipe_width_m, 0.);
        swipe.swipe_width_scaling =
            at_least("velocitySwipe.swipeWidthScaling", swipe.swipe_width_scaling, 0.);

        for trackers in [
            &mut c.push.trackers,
            &mut c.touch_plane.trackers,
            &mut c.air_tap.trackers,
            &mut c.air_click.trackers,
            &mut c.grab.trackers,
            &mut c.hover_and_hold.trackers,
            &mut c.velocity_swipe.trackers,
        ] {
            trackers.retain(|t| t.weight.is_finite() && t.weight > 0.);
            if trackers.is_empty() {
                warn!("No usable trackers configured; falling back to index stable");
                trackers.push(TrackerWeight::new(TrackedPosition::IndexStable, 1.));
            }
        }

        c
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendConfig {
    pub physical: PhysicalConfig,
    pub interaction: InteractionConfig,
}

impl BackendConfig {
    pub fn sanitised(&self) -> BackendConfig {
        BackendConfig {
            physical: self.physical.sanitised(),
            interaction: self.interaction.sanitised(),
        }
    }

    pub fn parse_remote_config(payload: &[u8]) -> Result<BackendConfig> {
        rmp_serde::from_slice::<BackendConfig>(payload)
            .map_err(|e| anyhow!("Failed to parse Config from message: {}", e))
    }
}

pub fn load_config_from_file(config_file_path: &str) -> Result<BackendConfig> {
    match fs::read_to_string(config_file_path) {
        Err(e) => {
            if e.kind() == std::io::ErrorKind::NotFound {
                warn!(
                    "Touchless Config file not found, will use defaults; save to create one at {}",
                    &config_file_path
                );
                let config = BackendConfig::default();
                debug!("Created init config object {:?}", config);
                Ok(config)
            } else {
                Err(anyhow!("Failed to load Touchless Config from disk: {}", e))
            }
        }
        Ok(s) => {
            info!("Loaded Touchless config OK from \"{}\"", config_file_path);
            match serde_json::from_str::<BackendConfig>(&s) {
                Ok(loaded_config) => {
                    debug!("Config parsed data from file: {:?}", &loaded_config);
                    Ok(loaded_config)
                }
                Err(e) => Err(anyhow!("Failed to parse config data: {}", e)),
            }
        }
    }
}

pub fn write_config_to_file(config: &BackendConfig, config_file_path: &str) -> Result<()> {
    let text = serde_json::to_string_pretty(config)?;
    match fs::write(config_file_path, text) {
        Ok(()) => {
            info!("Wrote config to file: {:?}", config_file_path);
            Ok(())
        }
        Err(e) => {
            error!("Error writing config to file: {:?}", e);
            Err(anyhow!("Failed to write config to {}: {}", config_file_path, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitise_negative_deadzone() {
        let mut config = InteractionConfig::default();
        config.deadzone_radius = -0.5;
        config.grab.unpinch_threshold = 0.95;
        let clean = config.sanitised();
        assert_eq!(clean.deadzone_radius, 0.);
        assert_eq!(clean.grab.unpinch_threshold, clean.grab.pinch_threshold);
    }

    #[test]
    fn test_sanitise_rotation_normalised() {
        let mut physical = PhysicalConfig::default();
        physical.camera_rotation = Point3D::new(270., -180., 360.);
        physical.screen_height_m = 0.;
        let clean = physical.sanitised();
        assert_eq!(clean.camera_rotation, Point3D::new(-90., 180., 0.));
        assert_eq!(clean.screen_height_m, MIN_SCREEN_HEIGHT_M);
    }

    #[test]
    fn test_empty_trackers_fall_back() {
        let mut config = InteractionConfig::default();
        config.push.trackers.clear();
        let clean = config.sanitised();
        assert_eq!(clean.push.trackers.len(), 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: BackendConfig =
            serde_json::from_str(r#"{"interaction":{"interactionType":"TouchPlane"}}"#)
                .expect("parse");
        assert_eq!(config.interaction.interaction_type, InteractionType::TouchPlane);
        assert_eq!(config.interaction.deadzone_radius, 0.003);
        assert_eq!(config.physical, PhysicalConfig::default());
    }

    #[test]
    fn test_enabled_interactions_deduplicated() {
        let mut config = InteractionConfig::default();
        config.additional_interaction_types =
            vec![InteractionType::Grab, InteractionType::Push, InteractionType::Grab];
        assert_eq!(
            config.enabled_interactions(),
            vec![InteractionType::Push, InteractionType::Grab]
        );
    }

    #[test]
    fn test_swipe_joins_unless_grabbing() {
        let mut config = InteractionConfig::default();
        config.use_swipe_interaction = true;
        assert_eq!(
            config.enabled_interactions(),
            vec![InteractionType::Push, InteractionType::VelocitySwipe]
        );
        config.interaction_type = InteractionType::Grab;
        assert_eq!(config.enabled_interactions(), vec![InteractionType::Grab]);
    }

    #[test]
    fn test_missing_file_gives_default() {
        let config = load_config_from_file("./definitely-not-here.json").expect("default");
        assert_eq!(config, BackendConfig::default());
    }
}
