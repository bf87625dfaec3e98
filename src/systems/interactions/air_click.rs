use crate::{
    backend_config::{AirClickSettings, InteractionConfig},
    geometry_utils::{inverse_lerp, ResponseCurve},
    tracking::{BoneType, FingerType, Hand, InputAction, InputType, InteractionType},
};

use super::{
    press::{PressMachine, PressStep, ReleasePolicy},
    InteractionModule, ModuleCore, TickContext,
};

/// Flex progress this close to 1 completes the click
const COMPLETION_TOLERANCE: f32 = 1e-4;

/// Press by flexing the index finger quickly through a set angle
pub struct AirClickInteraction {
    core: ModuleCore,
    settings: AirClickSettings,
    press: PressMachine,
    progress: f32,
    flex: FlexTracker,
}

/// Follows the index flex angle over time and turns fast flexing into progress
#[derive(Debug, Default)]
struct FlexTracker {
    previous_timestamp: Option<i64>,
    previous_angle: f32,
    progressing: bool,
    start_angle: f32,
    end_angle: f32,
    completed: bool,
}

impl FlexTracker {
    fn update(&mut self, angle: f32, timestamp: i64, touching: bool, settings: &AirClickSettings) -> f32 {
        let Some(previous_timestamp) = self.previous_timestamp.replace(timestamp) else {
            self.previous_angle = angle;
            return 0.;
        };
        let delta_time = (timestamp - previous_timestamp) as f32 / 1_000_000.;

        let mut progress = 0.;
        if touching {
            self.completed = false;
            self.progressing = false;
            // Straightening back past the start angle releases
            progress = 1. - inverse_lerp(self.end_angle, self.start_angle, angle);
        } else {
            if angle - self.previous_angle > settings.min_angle_change_per_second * delta_time {
                if !self.progressing {
                    self.progressing = true;
                    self.start_angle = angle;
                }
                progress = inverse_lerp(0., settings.max_angle_change_deg, angle - self.start_angle);
                if progress >= 1. - COMPLETION_TOLERANCE && !self.completed {
                    self.completed = true;
                    self.end_angle = angle;
                }
            } else {
                self.progressing = false;
            }
            if self.completed {
                progress = 1.;
            }
        }

        self.previous_angle = angle;
        progress
    }
}

/// Angle (degrees) between the back of the hand and the index finger
pub fn index_flex_angle(hand: &Hand) -> f32 {
    let middle_knuckle = hand
        .finger(FingerType::Middle)
        .bone(BoneType::Metacarpal)
        .next_joint;
    let palm_forward = (middle_knuckle - hand.palm_position).normalize();
    let index_forward = hand.finger(FingerType::Index).direction().normalize();
    let angle = palm_forward.dot(&index_forward).clamp(-1., 1.).acos().to_degrees();
    if angle.is_finite() {
        angle
    } else {
        0.
    }
}

fn release_policy(config: &InteractionConfig) -> ReleasePolicy {
    ReleasePolicy::from_flags(
        config.use_scrolling_or_dragging,
        config.instant_unclick,
        ReleasePolicy::ImmediateUp,
    )
}

impl AirClickInteraction {
    pub fn new(config: &InteractionConfig) -> Self {
        AirClickInteraction {
            core: ModuleCore::new(InteractionType::AirClick, &config.air_click.trackers, config),
            settings: config.air_click.clone(),
            press: PressMachine::new(release_policy(config)),
            progress: 0.,
            flex: FlexTracker::default(),
        }
    }
}

impl InteractionModule for AirClickInteraction {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn update_data(&mut self, hand: &Hand, ctx: &TickContext) -> Option<InputAction> {
        self.progress = self.flex.update(
            index_flex_angle(hand),
            ctx.timestamp,
            !self.press.is_idle(),
            &self.settings,
        );

        let activated = self.progress >= 1. - COMPLETION_TOLERANCE
            || (self.press.is_dragging() && self.progress > self.settings.drag_hold_progress);

        let positions = self.core.positions;
        let core = &self.core;
        let threshold = self.settings.drag_start_distance_m;
        let step = self.press.step(activated, &positions, ctx.timestamp, |down, _| {
            core.moved_beyond(ctx.screen, down, threshold)
        });

        let stabiliser = &mut self.core.positioning.stabiliser;
        if !activated {
            stabiliser.scale_deadzone_by_progress(
                self.progress,
                self.settings.max_deadzone_increase_m,
                &ResponseCurve::Linear,
            );
        }
        match step {
            PressStep::Pressed => {
                stabiliser.set_deadzone_offset();
                stabiliser.set_current_radius(self.settings.drag_start_distance_m);
            }
            PressStep::DragStarted => {
                stabiliser.start_shrinking(self.settings.deadzone_shrink_speed);
                stabiliser.reduce_deadzone_offset();
                self.core.positioning.set_dragging(true);
            }
            PressStep::Dragging | PressStep::Idle => stabiliser.reduce_deadzone_offset(),
            PressStep::Released { .. } => self.core.positioning.set_dragging(false),
            _ => {}
        }

        Some(
            self.core
                .press_action(step, &self.press, InputType::Move, self.progress),
        )
    }

    fn cancel(&mut self) -> bool {
        self.progress = 0.;
        self.flex = FlexTracker::default();
        self.press.cancel()
    }

    fn apply_config(&mut self, config: &InteractionConfig) {
        self.core.apply_config(&config.air_click.trackers, config);
        self.settings = config.air_click.clone();
        self.press.set_policy(release_policy(config));
    }

    fn progress(&self) -> f32 {
        self.progress
    }
}
