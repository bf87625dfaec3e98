use log::debug;

use crate::{
    backend_config::{InteractionConfig, TouchPlaneSettings},
    geometry_utils::inverse_lerp,
    tracking::{Hand, InputAction, InputType, InteractionType},
};

use super::{
    press::{PressMachine, PressStep, ReleasePolicy},
    InteractionModule, ModuleCore, TickContext,
};

/// Press by crossing a virtual plane some distance in front of the screen
pub struct TouchPlaneInteraction {
    core: ModuleCore,
    settings: TouchPlaneSettings,
    press: PressMachine,
    progress: f32,
    /// False until the hand has been seen in front of the plane; hands that
    /// appear already through it never press
    hand_ready: bool,
}

fn release_policy(config: &InteractionConfig) -> ReleasePolicy {
    ReleasePolicy::from_flags(
        config.use_scrolling_or_dragging,
        config.instant_unclick,
        ReleasePolicy::ImmediateUp,
    )
}

impl TouchPlaneInteraction {
    pub fn new(config: &InteractionConfig) -> Self {
        TouchPlaneInteraction {
            core: ModuleCore::new(InteractionType::TouchPlane, &config.touch_plane.trackers, config),
            settings: config.touch_plane.clone(),
            press: PressMachine::new(release_policy(config)),
            progress: 0.,
            hand_ready: false,
        }
    }

    fn is_through_plane(&self, distance: f32) -> bool {
        if self.press.is_idle() {
            distance < self.settings.touch_distance_m
        } else {
            distance < self.settings.touch_distance_m + self.settings.release_hysteresis_m
        }
    }
}

impl InteractionModule for TouchPlaneInteraction {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn update_data(&mut self, _hand: &Hand, ctx: &TickContext) -> Option<InputAction> {
        let positions = self.core.positions;
        let distance = positions.distance_from_screen;
        let touch = self.settings.touch_distance_m;
        self.progress = 1. - inverse_lerp(touch, touch + self.settings.progress_span_m, distance);

        let through = self.is_through_plane(distance);
        if !through && !self.hand_ready {
            debug!("TouchPlane hand ready");
            self.hand_ready = true;
        }

        let core = &self.core;
        let threshold = self.settings.drag_start_distance_m;
        let step = self.press.step(
            through && self.hand_ready,
            &positions,
            ctx.timestamp,
            |down, _| core.moved_beyond(ctx.screen, down, threshold),
        );

        let stabiliser = &mut self.core.positioning.stabiliser;
        match step {
            PressStep::Pressed => {
                let enlarged = stabiliser.default_radius() + self.settings.drag_start_distance_m;
                stabiliser.set_current_radius(enlarged);
            }
            PressStep::DragStarted => {
                stabiliser.start_shrinking(self.settings.deadzone_shrink_speed);
                self.core.positioning.set_dragging(true);
            }
            PressStep::Released { .. } => {
                stabiliser.start_shrinking(self.settings.deadzone_shrink_speed);
                self.core.positioning.set_dragging(false);
            }
            _ => {}
        }

        Some(
            self.core
                .press_action(step, &self.press, InputType::Move, self.progress),
        )
    }

    fn cancel(&mut self) -> bool {
        self.progress = 0.;
        self.hand_ready = false;
        self.press.cancel()
    }

    fn apply_config(&mut self, config: &InteractionConfig) {
        self.core.apply_config(&config.touch_plane.trackers, config);
        self.settings = config.touch_plane.clone();
        self.press.set_policy(release_policy(config));
    }

    fn progress(&self) -> f32 {
        self.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::{
        interactions::test_support::{assert_balanced, input_types, Driver},
        position_trackers::{TrackedPosition, TrackerWeight},
    };

    fn config(dragging: bool, instant_unclick: bool) -> InteractionConfig {
        let mut config = InteractionConfig::default();
        config.use_scrolling_or_dragging = dragging;
        config.instant_unclick = instant_unclick;
        config.touch_plane.trackers = vec![TrackerWeight::new(TrackedPosition::IndexTip, 1.)];
        config
    }

    #[test]
    fn test_no_flicker_around_plane() {
        for (dragging, instant) in [(false, false), (false, true), (true, false)] {
            let mut driver = Driver::new();
            let mut plane = TouchPlaneInteraction::new(&config(dragging, instant));
            let touch = plane.settings.touch_distance_m;
            let epsilon = plane.settings.release_hysteresis_m * 0.4;

            let mut actions = vec![driver.tick(&mut plane, Some(&driver.tip_at(0., 0.15, 0.2)))];
            for i in 0..60 {
                let d = if i % 2 == 0 { touch - epsilon } else { touch + epsilon };
                actions.push(driver.tick(&mut plane, Some(&driver.tip_at(0., 0.15, d))));
            }
            let types = input_types(&actions);
            assert_eq!(types.iter().filter(|t| **t == InputType::Down).count(), 1);
            assert!(
                types
                    .iter()
                    .filter(|t| matches!(t, InputType::Up | InputType::Cancel))
                    .count()
                    <= 1
            );
            assert_balanced(&types);
        }
    }

    #[test]
    fn test_hand_arriving_through_plane_is_ignored() {
        let mut driver = Driver::new();
        let mut plane = TouchPlaneInteraction::new(&config(false, false));
        let through = driver.tip_at(0., 0.15, 0.01);
        let first = driver.tick(&mut plane, Some(&through)).expect("action");
        assert_eq!(first.input_type, InputType::Move);

        let actions = vec![
            driver.tick(&mut plane, Some(&driver.tip_at(0., 0.15, 0.1))),
            driver.tick(&mut plane, Some(&through)),
        ];
        assert_eq!(input_types(&actions), vec![InputType::Move, InputType::Down]);
    }

    #[test]
    fn test_progress_span() {
        let mut driver = Driver::new();
        let mut plane = TouchPlaneInteraction::new(&config(false, false));
        let action = driver
            .tick(&mut plane, Some(&driver.tip_at(0., 0.15, 0.1)))
            .expect("action");
        assert!((action.progress_to_click - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_drag_shrinks_deadzone() {
        let mut driver = Driver::new();
        let mut plane = TouchPlaneInteraction::new(&config(true, false));
        driver.tick(&mut plane, Some(&driver.tip_at(0., 0.15, 0.1)));
        let down = driver.tick(&mut plane, Some(&driver.tip_at(0., 0.15, 0.02)));
        assert_eq!(down.map(|a| a.input_type), Some(InputType::Down));
        assert!(plane.core.positioning.stabiliser.current_radius() > 0.01);

        let drag = driver.tick(&mut plane, Some(&driver.tip_at(0.05, 0.15, 0.02)));
        assert_eq!(drag.map(|a| a.input_type), Some(InputType::Drag));
        assert!(plane.core.positioning.stabiliser.is_shrinking());
    }

    #[test]
    fn test_hand_loss_resets_readiness() {
        let mut driver = Driver::new();
        let mut plane = TouchPlaneInteraction::new(&config(false, false));
        let actions = vec![
            driver.tick(&mut plane, Some(&driver.tip_at(0., 0.15, 0.1))),
            driver.tick(&mut plane, Some(&driver.tip_at(0., 0.15, 0.02))),
            driver.tick(&mut plane, None),
            driver.tick(&mut plane, Some(&driver.tip_at(0., 0.15, 0.02))),
        ];
        assert_eq!(
            input_types(&actions),
            vec![InputType::Move, InputType::Down, InputType::Cancel, InputType::Move]
        );
    }
}
