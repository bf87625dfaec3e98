use crate::{
    backend_config::{AirTapSettings, InteractionConfig},
    geometry_utils::ResponseCurve,
    tracking::{BoneType, FingerType, Hand, InputAction, InputType, InteractionType},
};

use super::{
    press::{PressMachine, PressStep, ReleasePolicy},
    InteractionModule, ModuleCore, TickContext,
};

/// Press by flicking the index finger down relative to the palm
pub struct AirTapInteraction {
    core: ModuleCore,
    settings: AirTapSettings,
    press: PressMachine,
    progress: f32,
}

fn release_policy(config: &InteractionConfig) -> ReleasePolicy {
    ReleasePolicy::from_flags(
        config.use_scrolling_or_dragging,
        config.instant_unclick,
        ReleasePolicy::ImmediateUp,
    )
}

/// Alignment of the index finger's outer bones with the palm's forward
/// direction: 1 when straight, falling as the finger curls
pub fn index_alignment(hand: &Hand) -> f32 {
    let palm_forward = (hand.palm_position - hand.wrist_position).normalize();
    let index = hand.finger(FingerType::Index);
    let index_forward = (index.bone(BoneType::Distal).next_joint
        - index.bone(BoneType::Intermediate).next_joint)
        .normalize();
    let dot = palm_forward.dot(&index_forward);
    if dot.is_finite() {
        dot
    } else {
        1.
    }
}

impl AirTapInteraction {
    pub fn new(config: &InteractionConfig) -> Self {
        AirTapInteraction {
            core: ModuleCore::new(InteractionType::AirTap, &config.air_tap.trackers, config),
            settings: config.air_tap.clone(),
            press: PressMachine::new(release_policy(config)),
            progress: 0.,
        }
    }
}

impl InteractionModule for AirTapInteraction {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn update_data(&mut self, hand: &Hand, ctx: &TickContext) -> Option<InputAction> {
        self.progress = self
            .settings
            .progress_curve
            .evaluate(index_alignment(hand))
            .clamp(0., 1.);

        // Steady the cursor as the tap nears completion
        if self.press.is_idle() {
            self.core.positioning.stabiliser.scale_deadzone_by_progress(
                self.progress,
                self.settings.max_deadzone_increase_m,
                &ResponseCurve::Squared,
            );
        }

        let positions = self.core.positions;
        let core = &self.core;
        let threshold = self.settings.drag_start_distance_m;
        let step = self
            .press
            .step(self.progress >= 1., &positions, ctx.timestamp, |down, _| {
                core.moved_beyond(ctx.screen, down, threshold)
            });

        match step {
            PressStep::DragStarted => {
                self.core
                    .positioning
                    .stabiliser
                    .start_shrinking(self.settings.deadzone_shrink_speed);
                self.core.positioning.set_dragging(true);
            }
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
        self.press.cancel()
    }

    fn apply_config(&mut self, config: &InteractionConfig) {
        self.core.apply_config(&config.air_tap.trackers, config);
        self.settings = config.air_tap.clone();
        self.press.set_policy(release_policy(config));
    }

    fn progress(&self) -> f32 {
        self.progress
    }
}
