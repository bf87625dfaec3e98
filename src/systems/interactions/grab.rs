use log::debug;

use crate::{
    backend_config::{GrabSettings, InteractionConfig},
    tracking::{Hand, InputAction, InputType, InteractionType, Positions},
};

use super::{
    grab_detectors::{create_detector, DetectorContext, GestureDetector},
    press::{PressMachine, PressStep, ReleasePolicy},
    InteractionModule, ModuleCore, TickContext,
};

/// Press by pinching or grabbing, with the gesture itself decided by a
/// configurable detector
pub struct GrabInteraction {
    core: ModuleCore,
    settings: GrabSettings,
    detector: Box<dyn GestureDetector>,
    press: PressMachine,
    progress: f32,
    /// When the detector last started reporting a grab (µs)
    grab_started: Option<i64>,
    previous: Option<(i64, Positions)>,
}

fn release_policy(config: &InteractionConfig) -> ReleasePolicy {
    ReleasePolicy::from_flags(
        config.use_scrolling_or_dragging,
        config.instant_unclick,
        ReleasePolicy::HoldThenUp,
    )
}

impl GrabInteraction {
    pub fn new(config: &InteractionConfig) -> Self {
        GrabInteraction {
            core: ModuleCore::new(InteractionType::Grab, &config.grab.trackers, config),
            settings: config.grab.clone(),
            detector: create_detector(&config.grab),
            press: PressMachine::new(release_policy(config)),
            progress: 0.,
            grab_started: None,
            previous: None,
        }
    }

    /// Cursor speed in screen-world space (m/s); palm speed until there is a previous tick
    fn cursor_velocity(&self, hand: &Hand, ctx: &TickContext) -> f32 {
        let current = self.core.positions;
        let Some((previous_timestamp, previous)) = self.previous else {
            return hand.palm_velocity.norm();
        };
        let delta_time = (ctx.timestamp - previous_timestamp) as f32 / 1_000_000.;
        if delta_time <= 0. {
            return hand.palm_velocity.norm();
        }
        let from = ctx
            .screen
            .screen_to_world(&previous.cursor_position, previous.distance_from_screen);
        let to = ctx
            .screen
            .screen_to_world(&current.cursor_position, current.distance_from_screen);
        (to - from).norm() / delta_time
    }

    /// Detector output, held back until the grab has lasted the minimum duration
    fn is_grabbing(&mut self, hand: &Hand, timestamp: i64, cursor_velocity: f32) -> bool {
        let (grabbing, strength) = self.detector.evaluate(
            hand,
            &DetectorContext {
                timestamp,
                cursor_velocity,
            },
        );
        self.progress = strength;
        if !grabbing {
            self.grab_started = None;
            return false;
        }
        let started = *self.grab_started.get_or_insert(timestamp);
        (timestamp - started) as f32 / 1_000_000. > self.settings.min_grab_duration_s
    }
}

impl InteractionModule for GrabInteraction {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn update_data(&mut self, hand: &Hand, ctx: &TickContext) -> Option<InputAction> {
        let velocity = self.cursor_velocity(hand, ctx);
        let grabbing = self.is_grabbing(hand, ctx.timestamp, velocity);

        // A grab already under way carries on however fast the hand moves
        let activated =
            grabbing && (!self.press.is_idle() || velocity < self.settings.max_hand_velocity);

        let positions = self.core.positions;
        let core = &self.core;
        let threshold = self.settings.drag_start_distance_m;
        let step = self.press.step(activated, &positions, ctx.timestamp, |down, _| {
            core.moved_beyond(ctx.screen, down, threshold)
        });

        let stabiliser = &mut self.core.positioning.stabiliser;
        match step {
            PressStep::Pressed => {
                stabiliser.stop_shrinking();
                let enlarged = stabiliser.default_radius() + self.settings.deadzone_enlargement_m;
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
        if grabbing && !activated && self.press.is_idle() {
            debug!("Grab ignored; hand moving at {:.3} m/s", velocity);
        }

        self.previous = Some((ctx.timestamp, positions));
        Some(
            self.core
                .press_action(step, &self.press, InputType::Move, self.progress),
        )
    }

    fn cancel(&mut self) -> bool {
        self.progress = 0.;
        self.grab_started = None;
        self.previous = None;
        self.detector.reset();
        self.press.cancel()
    }

    fn apply_config(&mut self, config: &InteractionConfig) {
        self.core.apply_config(&config.grab.trackers, config);
        if config.grab != self.settings {
            self.detector = create_detector(&config.grab);
        }
        self.settings = config.grab.clone();
        self.press.set_policy(release_policy(config));
    }

    fn progress(&self) -> f32 {
        self.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::interactions::test_support::{assert_balanced, input_types, Driver};

    fn pinching(driver: &Driver, x: f32, pinch: f32) -> Hand {
        let mut hand = driver.tip_at(x, 0.15, 0.1);
        hand.pinch_strength = pinch;
        hand
    }

    #[test]
    fn test_minimum_grab_duration() {
        let mut driver = Driver::new();
        let mut grab = GrabInteraction::new(&InteractionConfig::default());
        let mut actions = vec![driver.tick(&mut grab, Some(&pinching(&driver, 0., 0.)))];
        for _ in 0..6 {
            actions.push(driver.tick(&mut grab, Some(&pinching(&driver, 0., 0.95))));
        }
        let types = input_types(&actions);
        let down = types.iter().position(|t| *t == InputType::Down).expect("down");
        // Detector fires on tick 1; 0.05 s must pass before the press counts
        assert!(down >= 4, "{:?}", types);
    }

    #[test]
    fn test_micro_grab_ignored() {
        let mut driver = Driver::new();
        let mut grab = GrabInteraction::new(&InteractionConfig::default());
        let actions = vec![
            driver.tick(&mut grab, Some(&pinching(&driver, 0., 0.))),
            driver.tick(&mut grab, Some(&pinching(&driver, 0., 0.95))),
            driver.tick(&mut grab, Some(&pinching(&driver, 0., 0.95))),
            driver.tick(&mut grab, Some(&pinching(&driver, 0., 0.))),
        ];
        assert!(input_types(&actions).iter().all(|t| *t == InputType::Move));
    }

    #[test]
    fn test_fast_hand_cannot_start_grab() {
        let mut driver = Driver::new();
        let mut grab = GrabInteraction::new(&InteractionConfig::default());
        let actions: Vec<_> = (0..20)
            .map(|i| {
                // 1 cm per tick is 0.6 m/s
                let hand = pinching(&driver, -0.1 + i as f32 * 0.01, 0.95);
                driver.tick(&mut grab, Some(&hand))
            })
            .collect();
        assert!(!input_types(&actions).contains(&InputType::Down));
    }

    #[test]
    fn test_grab_drag_and_release() {
        let mut driver = Driver::new();
        let mut config = InteractionConfig::default();
        config.use_scrolling_or_dragging = true;
        let mut grab = GrabInteraction::new(&config);

        let mut actions = Vec::new();
        for _ in 0..6 {
            actions.push(driver.tick(&mut grab, Some(&pinching(&driver, 0., 0.95))));
        }
        // Already pressing, so speed no longer matters
        for i in 1..6 {
            actions.push(driver.tick(&mut grab, Some(&pinching(&driver, i as f32 * 0.02, 0.95))));
        }
        actions.push(driver.tick(&mut grab, Some(&pinching(&driver, 0.1, 0.))));

        let types = input_types(&actions);
        assert!(types.contains(&InputType::Down));
        assert!(types.contains(&InputType::Drag));
        assert_eq!(types.last(), Some(&InputType::Up));
        assert_balanced(&types);
        assert!(grab.core.positioning.stabiliser.is_shrinking());
    }

    #[test]
    fn test_hand_loss_mid_grab_cancels() {
        let mut driver = Driver::new();
        let mut config = InteractionConfig::default();
        config.instant_unclick = false;
        let mut grab = GrabInteraction::new(&config);
        let mut actions = Vec::new();
        for _ in 0..6 {
            actions.push(driver.tick(&mut grab, Some(&pinching(&driver, 0., 0.95))));
        }
        actions.push(driver.tick(&mut grab, None));
        let types = input_types(&actions);
        assert_eq!(types.last(), Some(&InputType::Cancel));
        assert_balanced(&types);
    }
}
