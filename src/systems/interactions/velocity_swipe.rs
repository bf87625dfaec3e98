use log::debug;

use crate::{
    backend_config::{InteractionConfig, VelocitySwipeSettings},
    systems::virtual_screen::VirtualScreen,
    tracking::{Hand, InputAction, InputType, InteractionType},
    Point2D,
};

use super::{InteractionModule, ModuleCore, TickContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl SwipeDirection {
    /// Dominant axis of `velocity`, horizontal on a tie
    fn of(velocity: &Point2D) -> Self {
        if velocity.x.abs() >= velocity.y.abs() {
            if velocity.x > 0. {
                SwipeDirection::Right
            } else {
                SwipeDirection::Left
            }
        } else if velocity.y > 0. {
            SwipeDirection::Up
        } else {
            SwipeDirection::Down
        }
    }

    fn is_horizontal(self) -> bool {
        matches!(self, SwipeDirection::Left | SwipeDirection::Right)
    }
}

/// Swipe by moving the cursor fast along one axis. DOWN when the swipe starts,
/// MOVE while it continues, UP once it slows or drifts sideways
pub struct VelocitySwipeInteraction {
    core: ModuleCore,
    settings: VelocitySwipeSettings,
    swiping: Option<SwipeDirection>,
    /// Cursor (px) and timestamp from the previous tick
    previous: Option<(Point2D, i64)>,
    /// Where the fast movement began, before it was long enough to count
    potential_origin: Option<Point2D>,
    origin: Point2D,
    /// Last swipe and when it ended; new swipes are blocked until this clears
    cooldown: Option<(SwipeDirection, i64)>,
}

impl VelocitySwipeInteraction {
    pub fn new(config: &InteractionConfig) -> Self {
        VelocitySwipeInteraction {
            core: ModuleCore::new(
                InteractionType::VelocitySwipe,
                &config.velocity_swipe.trackers,
                config,
            ),
            settings: config.velocity_swipe.clone(),
            swiping: None,
            previous: None,
            potential_origin: None,
            origin: Point2D::zeros(),
            cooldown: None,
        }
    }

    /// Blocked for the scroll delay after a swipe, then until the hand stops
    /// moving back against the last swipe
    fn swipe_allowed(&mut self, velocity: &Point2D, now: i64) -> bool {
        let Some((direction, ended_at)) = self.cooldown else {
            return true;
        };
        if (now - ended_at) as f32 / 1_000_000. > self.settings.scroll_delay_s {
            let limit = self.settings.max_opposing_velocity;
            let opposing = match direction {
                SwipeDirection::Left => velocity.x >= limit,
                SwipeDirection::Right => velocity.x <= -limit,
                SwipeDirection::Up => velocity.y <= -limit,
                SwipeDirection::Down => velocity.y >= limit,
            };
            if !opposing {
                debug!("Swipe cooldown over");
                self.cooldown = None;
            }
        }
        false
    }

    fn starts_swipe(&mut self, velocity: &Point2D, now: i64) -> bool {
        if !self.swipe_allowed(velocity, now) {
            return false;
        }
        let s = &self.settings;
        let horizontal = velocity.x.abs() > s.min_scroll_velocity;
        let vertical = velocity.y > s.min_scroll_velocity - s.upwards_min_velocity_decrease
            || -velocity.y > s.min_scroll_velocity + s.downwards_min_velocity_increase;

        if s.allow_bidirectional && s.allow_horizontal && s.allow_vertical {
            return horizontal || vertical;
        }
        (s.allow_horizontal && horizontal && velocity.y.abs() < s.max_lateral_velocity)
            || (s.allow_vertical && vertical && velocity.x.abs() < s.max_lateral_velocity)
    }

    fn swipe_ended(
        &self,
        direction: SwipeDirection,
        velocity: &Point2D,
        cursor: &Point2D,
        screen: &VirtualScreen,
    ) -> bool {
        let s = &self.settings;
        let travelled =
            (screen.pixels_to_meters(cursor) - screen.pixels_to_meters(&self.origin)).abs();
        let (along, across) = if direction.is_horizontal() {
            (travelled.x, travelled.y)
        } else {
            (travelled.y, travelled.x)
        };
        let drifted = across > s.max_swipe_width_m + s.swipe_width_scaling * along;
        let slowed = match direction {
            SwipeDirection::Left => velocity.x > -s.max_release_velocity,
            SwipeDirection::Right => velocity.x < s.max_release_velocity,
            SwipeDirection::Up => velocity.y < s.max_release_velocity,
            SwipeDirection::Down => velocity.y > -s.max_release_velocity,
        };
        slowed || drifted
    }
}

impl InteractionModule for VelocitySwipeInteraction {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn update_data(&mut self, _hand: &Hand, ctx: &TickContext) -> Option<InputAction> {
        let positions = self.core.positions;
        let cursor = positions.cursor_position;
        let now = ctx.timestamp;

        let Some((previous, previous_timestamp)) = self.previous.replace((cursor, now)) else {
            return Some(self.core.action(InputType::Move, &positions, 0.));
        };
        let delta_time = (now - previous_timestamp) as f32 / 1_000_000.;
        if delta_time <= 0. {
            return None;
        }
        let cursor_m = ctx.screen.pixels_to_meters(&cursor);
        let velocity = (cursor_m - ctx.screen.pixels_to_meters(&previous)) / delta_time;

        let mut input_type = InputType::Move;
        let swiping = self.swiping;
        match swiping {
            None if self.starts_swipe(&velocity, now) => match self.potential_origin {
                Some(start) => {
                    let change = (cursor_m - ctx.screen.pixels_to_meters(&start)).abs();
                    if change.x > self.settings.min_swipe_length_m
                        || change.y > self.settings.min_swipe_length_m
                    {
                        let direction = SwipeDirection::of(&velocity);
                        debug!("Swipe {:?} DOWN", direction);
                        self.swiping = Some(direction);
                        self.origin = previous;
                        self.potential_origin = None;
                        input_type = InputType::Down;
                    }
                }
                None => self.potential_origin = Some(previous),
            },
            Some(direction) if self.swipe_ended(direction, &velocity, &cursor, ctx.screen) => {
                debug!("Swipe {:?} UP", direction);
                self.swiping = None;
                self.cooldown = Some((direction, now));
                return Some(self.core.action(InputType::Up, &positions, 0.));
            }
            _ => self.potential_origin = None,
        }

        let progress = if self.swiping.is_some() { 1. } else { 0. };
        Some(self.core.action(input_type, &positions, progress))
    }

    fn cancel(&mut self) -> bool {
        let unanswered = self.swiping.take().is_some();
        self.previous = None;
        self.potential_origin = None;
        self.cooldown = None;
        unanswered
    }

    fn apply_config(&mut self, config: &InteractionConfig) {
        self.core.apply_config(&config.velocity_swipe.trackers, config);
        self.settings = config.velocity_swipe.clone();
    }

    fn progress(&self) -> f32 {
        if self.swiping.is_some() { 1. } else { 0. }
    }
}
