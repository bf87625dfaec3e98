pub mod air_click;
pub mod air_tap;
pub mod grab;
pub mod grab_detectors;
pub mod hover_and_hold;
pub mod manager;
pub mod press;
pub mod push;
pub mod touch_plane;
pub mod velocity_swipe;

use log::debug;

use crate::{
    backend_config::InteractionConfig,
    tracking::{Chirality, Hand, HandType, InputAction, InputType, InteractionType, Positions},
    Point2D,
};

use super::{
    position_trackers::TrackerWeight,
    positioning::{PositioningModule, SnapTarget},
    presence::{InteractionZone, ZoneChange},
    virtual_screen::VirtualScreen,
};

use press::{PressMachine, PressStep};

/// Everything an interaction needs to know about the current tick
pub struct TickContext<'a> {
    /// Microseconds
    pub timestamp: i64,
    /// Seconds since the previous tick
    pub delta_time: f32,
    pub screen: &'a VirtualScreen,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ModuleOutput {
    pub action: Option<InputAction>,
    pub zone_change: Option<ZoneChange>,
}

/// State every interaction carries: positioning, zone and hand bookkeeping
pub struct ModuleCore {
    pub interaction_type: InteractionType,
    pub hand_type: HandType,
    pub positioning: PositioningModule,
    pub positions: Positions,
    pub timestamp: i64,
    zone: InteractionZone,
    chirality: Chirality,
    had_hand_last_frame: bool,
}

impl ModuleCore {
    pub fn new(
        interaction_type: InteractionType,
        trackers: &[TrackerWeight],
        config: &InteractionConfig,
    ) -> Self {
        ModuleCore {
            interaction_type,
            hand_type: config.hand_type,
            positioning: PositioningModule::new(trackers, config),
            positions: Positions::default(),
            timestamp: 0,
            zone: InteractionZone::new(&config.interaction_zone),
            chirality: Chirality::Right,
            had_hand_last_frame: false,
        }
    }

    pub fn apply_config(&mut self, trackers: &[TrackerWeight], config: &InteractionConfig) {
        self.hand_type = config.hand_type;
        self.positioning.apply_config(trackers, config);
        self.zone.update_settings(&config.interaction_zone);
    }

    /// Update positions for this tick and decide whether the hand counts as
    /// present. A hand outside the interaction zone is treated as absent
    fn refresh<'h>(
        &mut self,
        hand: Option<&'h Hand>,
        ctx: &TickContext,
    ) -> (Option<&'h Hand>, Option<ZoneChange>) {
        self.timestamp = ctx.timestamp;

        let present = match hand {
            Some(hand) => {
                self.chirality = hand.chirality;
                self.positions = self.positioning.update(Some(hand), ctx.screen, ctx.delta_time);
                Some(hand).filter(|_| self.zone.contains(self.positions.distance_from_screen))
            }
            None => None,
        };

        let zone_change = self
            .zone
            .update(present.map(|_| self.positions.distance_from_screen))
            .map(|state| ZoneChange {
                interaction_type: self.interaction_type,
                hand_type: self.hand_type,
                state,
            });

        (present, zone_change)
    }

    pub fn action(&self, input_type: InputType, positions: &Positions, progress: f32) -> InputAction {
        InputAction {
            timestamp: self.timestamp,
            interaction_type: self.interaction_type,
            hand_type: self.hand_type,
            chirality: self.chirality,
            input_type,
            cursor_position: positions.cursor_position,
            distance_from_screen: positions.distance_from_screen,
            progress_to_click: if progress.is_finite() {
                progress.clamp(0., 1.)
            } else {
                0.
            },
        }
    }

    /// Has the cursor moved far enough (m) from `down` to count as a drag?
    pub fn moved_beyond(&self, screen: &VirtualScreen, down: &Point2D, threshold_m: f32) -> bool {
        let a = screen.pixels_to_meters(down);
        let b = screen.pixels_to_meters(&self.positions.cursor_position);
        (a - b).norm() > threshold_m
    }

    /// Turn a press step into the action clients see. `idle` is what to send
    /// while not pressing (MOVE or HOVER)
    pub fn press_action(
        &self,
        step: PressStep,
        press: &PressMachine,
        idle: InputType,
        progress: f32,
    ) -> InputAction {
        let positions = self.positions;
        let down = press.down_positions(&positions);
        match step {
            PressStep::Idle => self.action(idle, &positions, progress),
            PressStep::Pressed => {
                debug!("{:?} DOWN", self.interaction_type);
                self.action(InputType::Down, &positions, progress)
            }
            PressStep::Holding => self.action(InputType::Hold, &down, progress),
            PressStep::DragStarted | PressStep::Dragging => {
                self.action(InputType::Drag, &positions, progress)
            }
            PressStep::Released { dragged } => {
                debug!("{:?} UP (dragged: {})", self.interaction_type, dragged);
                if dragged {
                    self.action(InputType::Up, &positions, progress)
                } else {
                    self.action(InputType::Up, &down, progress)
                }
            }
            PressStep::Waiting => self.action(InputType::None, &positions, progress),
        }
    }
}

/// One gesture type's state machine.
///
/// Implementors provide `update_data`; `update` wraps it with positioning,
/// interaction zone handling and the hand-loss CANCEL.
pub trait InteractionModule: Send {
    fn core(&self) -> &ModuleCore;
    fn core_mut(&mut self) -> &mut ModuleCore;

    /// Run the gesture for a present hand
    fn update_data(&mut self, hand: &Hand, ctx: &TickContext) -> Option<InputAction>;

    /// Abandon any gesture in progress. Returns true if a DOWN is left unanswered
    fn cancel(&mut self) -> bool;

    fn apply_config(&mut self, config: &InteractionConfig);

    /// Latest progress towards a click, for choosing between hybrid interactions
    fn progress(&self) -> f32;

    fn interaction_type(&self) -> InteractionType {
        self.core().interaction_type
    }

    fn hand_type(&self) -> HandType {
        self.core().hand_type
    }

    fn set_snap_targets(&mut self, targets: &[SnapTarget]) {
        self.core_mut().positioning.set_snap_targets(targets);
    }

    fn update(&mut self, hand: Option<&Hand>, ctx: &TickContext) -> ModuleOutput {
        let (present, zone_change) = self.core_mut().refresh(hand, ctx);

        let action = match present {
            Some(hand) => {
                self.core_mut().had_hand_last_frame = true;
                self.update_data(hand, ctx)
            }
            None => {
                let had_hand = std::mem::replace(&mut self.core_mut().had_hand_last_frame, false);
                let unanswered = self.cancel();
                let core = self.core_mut();
                if had_hand {
                    core.positioning.reset();
                }
                if unanswered {
                    debug!("{:?} hand lost mid-gesture; CANCEL", core.interaction_type);
                    Some(core.action(InputType::Cancel, &core.positions, 0.))
                } else {
                    if had_hand {
                        debug!("{:?} hand lost", core.interaction_type);
                    }
                    None
                }
            }
        };

        ModuleOutput {
            action,
            zone_change,
        }
    }
}

/// Build the module for one interaction type
pub fn create_module(
    interaction_type: InteractionType,
    config: &InteractionConfig,
) -> Box<dyn InteractionModule> {
    match interaction_type {
        InteractionType::Push => Box::new(push::PushInteraction::new(config)),
        InteractionType::TouchPlane => Box::new(touch_plane::TouchPlaneInteraction::new(config)),
        InteractionType::AirTap => Box::new(air_tap::AirTapInteraction::new(config)),
        InteractionType::AirClick => Box::new(air_click::AirClickInteraction::new(config)),
        InteractionType::Grab => Box::new(grab::GrabInteraction::new(config)),
        InteractionType::Hover => Box::new(hover_and_hold::HoverAndHoldInteraction::new(config)),
        InteractionType::VelocitySwipe => {
            Box::new(velocity_swipe::VelocitySwipeInteraction::new(config))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::{backend_config::PhysicalConfig, tracking::fixtures::pointing_hand, Point3D};

    pub const TICK_US: i64 = 16_667;

    pub fn screen() -> VirtualScreen {
        VirtualScreen::new(&PhysicalConfig::default())
    }

    /// Drives a module tick by tick with a moving index fingertip
    pub struct Driver {
        pub screen: VirtualScreen,
        pub timestamp: i64,
    }

    impl Driver {
        pub fn new() -> Self {
            Driver {
                screen: screen(),
                timestamp: 0,
            }
        }

        pub fn tick(&mut self, module: &mut dyn InteractionModule, hand: Option<&Hand>) -> Option<InputAction> {
            self.timestamp += TICK_US;
            let ctx = TickContext {
                timestamp: self.timestamp,
                delta_time: TICK_US as f32 / 1_000_000.,
                screen: &self.screen,
            };
            module.update(hand, &ctx).action
        }

        /// Fast-moving hand with its index tip at (x, y) and `distance` in front of the screen
        pub fn tip_at(&self, x: f32, y: f32, distance: f32) -> Hand {
            let mut hand = pointing_hand(Point3D::new(x, y, distance));
            // Fast enough that smoothing follows exactly
            hand.palm_velocity = Point3D::new(2., 0., 0.);
            hand
        }
    }

    pub fn input_types(actions: &[Option<InputAction>]) -> Vec<InputType> {
        actions.iter().flatten().map(|a| a.input_type).collect()
    }

    /// Every DOWN answered by exactly one UP or CANCEL before the next DOWN
    pub fn assert_balanced(types: &[InputType]) {
        let mut open = false;
        for t in types {
            match t {
                InputType::Down => {
                    assert!(!open, "DOWN before previous was answered: {:?}", types);
                    open = true;
                }
                InputType::Up | InputType::Cancel if open => open = false,
                InputType::Up => panic!("UP without DOWN: {:?}", types),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_support::Driver, *};
    use crate::systems::position_trackers::{TrackedPosition, TrackerWeight};

    #[test]
    fn test_hand_outside_zone_keeps_deadzone_history() {
        let mut config = InteractionConfig::default();
        config.push.trackers = vec![TrackerWeight::new(TrackedPosition::IndexTip, 1.)];
        config.interaction_zone.enabled = true;
        config.interaction_zone.max_distance_m = 0.05;
        let mut driver = Driver::new();
        let mut push = push::PushInteraction::new(&config);

        driver.tick(&mut push, Some(&driver.tip_at(0., 0.15, 0.03)));
        // Leaving the zone forgets the history once
        driver.tick(&mut push, Some(&driver.tip_at(0., 0.15, 0.1)));
        driver.tick(&mut push, Some(&driver.tip_at(0., 0.15, 0.1)));
        let anchored = push.core().positioning.last_positions().cursor_position;

        // Within the deadzone, so the cursor holds while the hand stays outside
        driver.tick(&mut push, Some(&driver.tip_at(0.001, 0.15, 0.1)));
        let held = push.core().positioning.last_positions().cursor_position;
        assert!((held - anchored).norm() < 1e-3);
    }
}
