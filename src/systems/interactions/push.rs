use crate::{
    backend_config::{InteractionConfig, PushSettings},
    geometry_utils::inverse_lerp,
    tracking::{Hand, InputAction, InputType, InteractionType},
};

use super::{
    press::{PressMachine, PressStep, ReleasePolicy},
    InteractionModule, ModuleCore, TickContext,
};

/// Press by pushing through the screen plane; progress ramps up on approach
pub struct PushInteraction {
    core: ModuleCore,
    settings: PushSettings,
    press: PressMachine,
    progress: f32,
}

fn release_policy(config: &InteractionConfig) -> ReleasePolicy {
    ReleasePolicy::from_flags(
        config.use_scrolling_or_dragging,
        config.instant_unclick,
        ReleasePolicy::HoldThenUp,
    )
}

impl PushInteraction {
    pub fn new(config: &InteractionConfig) -> Self {
        PushInteraction {
            core: ModuleCore::new(InteractionType::Push, &config.push.trackers, config),
            settings: config.push.clone(),
            press: PressMachine::new(release_policy(config)),
            progress: 0.,
        }
    }

    fn progress_at(&self, distance: f32) -> f32 {
        1. - inverse_lerp(
            self.settings.distance_at_max_progress_m,
            self.settings.distance_at_no_progress_m,
            distance,
        )
    }
}

impl InteractionModule for PushInteraction {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn update_data(&mut self, _hand: &Hand, ctx: &TickContext) -> Option<InputAction> {
        let positions = self.core.positions;
        let distance = positions.distance_from_screen;
        self.progress = self.progress_at(distance);

        let core = &self.core;
        let settings = &self.settings;
        let step = self.press.step(distance < 0., &positions, ctx.timestamp, |down, held_for| {
            held_for >= settings.drag_start_time_s
                || core.moved_beyond(ctx.screen, down, settings.drag_start_distance_m)
        });

        match step {
            PressStep::DragStarted => self.core.positioning.set_dragging(true),
            PressStep::Released { .. } => self.core.positioning.set_dragging(false),
            _ => {}
        }

        let idle = if self.progress > 0. {
            InputType::Hover
        } else {
            InputType::Move
        };
        Some(self.core.press_action(step, &self.press, idle, self.progress))
    }

    fn cancel(&mut self) -> bool {
        self.progress = 0.;
        self.press.cancel()
    }

    fn apply_config(&mut self, config: &InteractionConfig) {
        self.core.apply_config(&config.push.trackers, config);
        self.settings = config.push.clone();
        self.press.set_policy(release_policy(config));
    }

    fn progress(&self) -> f32 {
        self.progress
    }
}
