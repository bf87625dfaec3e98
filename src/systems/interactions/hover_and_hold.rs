use log::debug;

use crate::{
    backend_config::{HoverAndHoldSettings, InteractionConfig},
    geometry_utils::lerp,
    systems::stabiliser::apply_deadzone_sized,
    tracking::{Hand, InputAction, InputType, InteractionType},
    Point2D,
};

use super::{InteractionModule, ModuleCore, TickContext};

#[derive(Debug, Clone, Copy, PartialEq)]
enum HoverPhase {
    /// Waiting for the cursor to settle
    Watching { still_since: Option<i64> },
    /// Settled; the hold timer is running
    Timing { started: i64, start_radius: f32 },
    /// DOWN sent
    Clicked { down_at: i64, up_sent: bool },
}

/// Click by holding the cursor still: hover, then a timed hold, then DOWN/UP
pub struct HoverAndHoldInteraction {
    core: ModuleCore,
    settings: HoverAndHoldSettings,
    phase: HoverPhase,
    hover_anchor: Option<Point2D>,
    progress: f32,
}

fn seconds_between(from: i64, to: i64) -> f32 {
    (to - from) as f32 / 1_000_000.
}

impl HoverAndHoldInteraction {
    pub fn new(config: &InteractionConfig) -> Self {
        HoverAndHoldInteraction {
            core: ModuleCore::new(InteractionType::Hover, &config.hover_and_hold.trackers, config),
            settings: config.hover_and_hold.clone(),
            phase: HoverPhase::Watching { still_since: None },
            hover_anchor: None,
            progress: 0.,
        }
    }

    fn enlarged_radius(&self) -> f32 {
        self.core.positioning.stabiliser.default_radius() + self.settings.deadzone_enlargement_m
    }

    /// Hold the cursor in a slightly larger deadzone while hovering. Returns
    /// whether the hover position stayed put
    fn apply_hover_zone(&mut self, ctx: &TickContext) -> bool {
        let cursor_m = ctx.screen.pixels_to_meters(&self.core.positions.cursor_position);
        let radius = self.enlarged_radius();
        let (anchor, still) = match self.hover_anchor {
            Some(previous) => {
                let anchor = apply_deadzone_sized(&previous, &cursor_m, radius);
                (anchor, anchor == previous)
            }
            None => (cursor_m, false),
        };
        self.hover_anchor = Some(anchor);
        self.core.positions = self.core.positions.pinned_to(ctx.screen.meters_to_pixels(&anchor));
        still
    }

    fn abandon(&mut self) {
        debug!("Hover abandoned");
        self.phase = HoverPhase::Watching { still_since: None };
        self.progress = 0.;
        self.core
            .positioning
            .stabiliser
            .start_shrinking(self.settings.deadzone_shrink_speed);
    }
}

impl InteractionModule for HoverAndHoldInteraction {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn update_data(&mut self, _hand: &Hand, ctx: &TickContext) -> Option<InputAction> {
        let still = self.apply_hover_zone(ctx);
        let now = ctx.timestamp;
        let positions = self.core.positions;

        let mut input_type = InputType::Move;
        match self.phase {
            HoverPhase::Watching { still_since } => {
                if !still {
                    self.phase = HoverPhase::Watching { still_since: None };
                } else {
                    let since = still_since.unwrap_or(now);
                    if seconds_between(since, now) > self.settings.hover_start_time_s {
                        debug!("Hover triggered");
                        self.phase = HoverPhase::Timing {
                            started: now,
                            start_radius: self.core.positioning.stabiliser.current_radius(),
                        };
                        input_type = InputType::Hover;
                    } else {
                        self.phase = HoverPhase::Watching {
                            still_since: Some(since),
                        };
                    }
                }
            }
            HoverPhase::Timing {
                started,
                start_radius,
            } => {
                if !still {
                    self.abandon();
                } else {
                    self.progress = (seconds_between(started, now)
                        / self.settings.hover_complete_time_s)
                        .clamp(0., 1.);
                    let enlarged = self.enlarged_radius();
                    let stabiliser = &mut self.core.positioning.stabiliser;
                    if self.progress >= 1. {
                        stabiliser.set_current_radius(enlarged);
                        self.phase = HoverPhase::Clicked {
                            down_at: now,
                            up_sent: false,
                        };
                        debug!("Hover DOWN");
                        input_type = InputType::Down;
                    } else {
                        stabiliser.set_current_radius(lerp(start_radius, enlarged, self.progress));
                        input_type = InputType::Hover;
                    }
                }
            }
            HoverPhase::Clicked { down_at, up_sent } => {
                if !still {
                    if !up_sent {
                        input_type = InputType::Up;
                    }
                    self.abandon();
                } else if !up_sent {
                    if seconds_between(down_at, now) > self.settings.click_hold_time_s {
                        debug!("Hover UP");
                        self.phase = HoverPhase::Clicked {
                            down_at,
                            up_sent: true,
                        };
                        input_type = InputType::Up;
                    } else {
                        input_type = InputType::Hold;
                    }
                }
            }
        }

        Some(self.core.action(input_type, &positions, self.progress))
    }

    fn cancel(&mut self) -> bool {
        let unanswered = matches!(self.phase, HoverPhase::Clicked { up_sent: false, .. });
        self.phase = HoverPhase::Watching { still_since: None };
        self.hover_anchor = None;
        self.progress = 0.;
        unanswered
    }

    fn apply_config(&mut self, config: &InteractionConfig) {
        self.core.apply_config(&config.hover_and_hold.trackers, config);
        self.settings = config.hover_and_hold.clone();
    }

    fn progress(&self) -> f32 {
        self.progress
    }
}
