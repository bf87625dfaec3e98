use serde::{Deserialize, Serialize};

use crate::{tracking::Positions, Point2D};

/// How a press ends up being released.
///
/// Each dragging and instant-click combination gives the client a different
/// HOLD/UP timing.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// HOLD, locked to the down position, until movement or time starts a DRAG; UP on release
    Drag,
    /// One (or a few) HOLD ticks, then UP while still pressed; nothing on release
    HoldThenUp,
    /// UP on the very next tick after DOWN
    ImmediateUp,
    /// HOLD until released, then UP; never drags
    UpOnRelease,
}

impl ReleasePolicy {
    /// Policy for a module that can drag, given the shared interaction flags.
    /// `instant` is what the module does when clicking instantly
    pub fn from_flags(dragging: bool, instant_unclick: bool, instant: ReleasePolicy) -> Self {
        if dragging {
            ReleasePolicy::Drag
        } else if instant_unclick {
            instant
        } else {
            ReleasePolicy::UpOnRelease
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pressing,
    Dragging,
    /// UP already sent; waiting for the activation to end
    Complete,
}

/// What the press state machine decided this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressStep {
    Idle,
    Pressed,
    Holding,
    DragStarted,
    Dragging,
    Released { dragged: bool },
    /// Still activated after an early UP
    Waiting,
}

/// Shared IDLE → PRESSING → (HOLDING | DRAGGING) → IDLE machine for every
/// press-style interaction. A DOWN is always followed by exactly one UP
/// (`Released`) or a cancel before the next DOWN
pub struct PressMachine {
    policy: ReleasePolicy,
    required_hold_ticks: u32,
    phase: Phase,
    held_ticks: u32,
    down_positions: Positions,
    down_timestamp: i64,
}

impl PressMachine {
    pub fn new(policy: ReleasePolicy) -> Self {
        PressMachine {
            policy,
            required_hold_ticks: 1,
            phase: Phase::Idle,
            held_ticks: 0,
            down_positions: Positions::default(),
            down_timestamp: 0,
        }
    }

    pub fn set_policy(&mut self, policy: ReleasePolicy) {
        self.policy = policy;
    }

    pub fn policy(&self) -> ReleasePolicy {
        self.policy
    }

    /// A press is in flight: DOWN sent, UP not yet sent
    pub fn is_pressing(&self) -> bool {
        matches!(self.phase, Phase::Pressing | Phase::Dragging)
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == Phase::Dragging
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn down_position(&self) -> Point2D {
        self.down_positions.cursor_position
    }

    /// Positions as they were at DOWN, with the current distance
    pub fn down_positions(&self, current: &Positions) -> Positions {
        Positions {
            distance_from_screen: current.distance_from_screen,
            ..self.down_positions
        }
    }

    /// Seconds since DOWN
    pub fn held_for(&self, timestamp: i64) -> f32 {
        (timestamp - self.down_timestamp) as f32 / 1_000_000.
    }

    /// Advance one tick. `should_drag` is asked (with the down position) only
    /// while a drag could start
    pub fn step(
        &mut self,
        activated: bool,
        positions: &Positions,
        timestamp: i64,
        should_drag: impl FnOnce(&Point2D, f32) -> bool,
    ) -> PressStep {
        match (self.phase, activated) {
            (Phase::Idle, false) => PressStep::Idle,
            (Phase::Idle, true) => {
                self.phase = Phase::Pressing;
                self.down_positions = *positions;
                self.down_timestamp = timestamp;
                self.held_ticks = 0;
                PressStep::Pressed
            }
            (Phase::Pressing, true) => match self.policy {
                ReleasePolicy::Drag => {
                    if should_drag(&self.down_positions.cursor_position, self.held_for(timestamp)) {
                        self.phase = Phase::Dragging;
                        PressStep::DragStarted
                    } else {
                        PressStep::Holding
                    }
                }
                ReleasePolicy::HoldThenUp => {
                    if self.held_ticks < self.required_hold_ticks {
                        self.held_ticks += 1;
                        PressStep::Holding
                    } else {
                        self.phase = Phase::Complete;
                        PressStep::Released { dragged: false }
                    }
                }
                ReleasePolicy::ImmediateUp => {
                    self.phase = Phase::Complete;
                    PressStep::Released { dragged: false }
                }
                ReleasePolicy::UpOnRelease => PressStep::Holding,
            },
            (Phase::Dragging, true) => PressStep::Dragging,
            (Phase::Complete, true) => PressStep::Waiting,
            (Phase::Pressing | Phase::Dragging, false) => {
                let dragged = self.phase == Phase::Dragging;
                self.phase = Phase::Idle;
                PressStep::Released { dragged }
            }
            (Phase::Complete, false) => {
                self.phase = Phase::Idle;
                PressStep::Idle
            }
        }
    }

    /// Abandon any press. Returns true if a DOWN was left unanswered, in which
    /// case the caller owes the client a CANCEL
    pub fn cancel(&mut self) -> bool {
        let in_flight = self.is_pressing();
        self.phase = Phase::Idle;
        self.held_ticks = 0;
        in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(x: f32) -> Positions {
        Positions {
            cursor_position: Point2D::new(x, 0.),
            click_position: Point2D::new(x, 0.),
            distance_from_screen: 0.,
        }
    }

    fn run(machine: &mut PressMachine, activations: &[bool]) -> Vec<PressStep> {
        activations
            .iter()
            .enumerate()
            .map(|(i, a)| machine.step(*a, &positions(i as f32), i as i64 * 16_000, |_, _| false))
            .collect()
    }

    #[test]
    fn test_hold_then_up() {
        let mut m = PressMachine::new(ReleasePolicy::HoldThenUp);
        let steps = run(&mut m, &[true, true, true, true, false]);
        assert_eq!(
            steps,
            vec![
                PressStep::Pressed,
                PressStep::Holding,
                PressStep::Released { dragged: false },
                PressStep::Waiting,
                PressStep::Idle
            ]
        );
    }

    #[test]
    fn test_immediate_up() {
        let mut m = PressMachine::new(ReleasePolicy::ImmediateUp);
        let steps = run(&mut m, &[true, true, false]);
        assert_eq!(
            steps,
            vec![
                PressStep::Pressed,
                PressStep::Released { dragged: false },
                PressStep::Idle
            ]
        );
    }

    #[test]
    fn test_up_on_release() {
        let mut m = PressMachine::new(ReleasePolicy::UpOnRelease);
        let steps = run(&mut m, &[true, true, true, false]);
        assert_eq!(steps[2], PressStep::Holding);
        assert_eq!(steps[3], PressStep::Released { dragged: false });
    }

    #[test]
    fn test_drag_starts_when_asked() {
        let mut m = PressMachine::new(ReleasePolicy::Drag);
        assert_eq!(m.step(true, &positions(0.), 0, |_, _| true), PressStep::Pressed);
        assert_eq!(m.step(true, &positions(0.), 1, |_, _| false), PressStep::Holding);
        assert_eq!(
            m.step(true, &positions(5.), 2, |down, _| down.x == 0.),
            PressStep::DragStarted
        );
        assert_eq!(m.step(true, &positions(6.), 3, |_, _| false), PressStep::Dragging);
        assert_eq!(
            m.step(false, &positions(6.), 4, |_, _| false),
            PressStep::Released { dragged: true }
        );
    }

    #[test]
    fn test_every_down_answered_once() {
        // Pseudo-random activations and hand losses under every policy
        for policy in [
            ReleasePolicy::Drag,
            ReleasePolicy::HoldThenUp,
            ReleasePolicy::ImmediateUp,
            ReleasePolicy::UpOnRelease,
        ] {
            let mut m = PressMachine::new(policy);
            let mut seed: u32 = 12345;
            let mut open_downs = 0;
            for tick in 0..5000 {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
                let roll = (seed >> 16) % 10;
                if roll == 0 {
                    if m.cancel() {
                        open_downs -= 1;
                    }
                    continue;
                }
                let step = m.step(roll > 3, &positions(tick as f32), tick * 16_000, |_, t| {
                    t > 0.05
                });
                match step {
                    PressStep::Pressed => {
                        assert_eq!(open_downs, 0, "DOWN before previous was answered");
                        open_downs += 1;
                    }
                    PressStep::Released { .. } => {
                        assert_eq!(open_downs, 1, "UP without a DOWN");
                        open_downs -= 1;
                    }
                    _ => {}
                }
            }
        }
    }
}
