use indexmap::IndexMap;
use log::{debug, info};

use crate::{
    backend_config::InteractionConfig,
    systems::{positioning::SnapTarget, presence::ZoneChange},
    tracking::{AssignedHands, InputAction, InputType, InteractionType},
};

use super::{create_module, InteractionModule, TickContext};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ManagerOutput {
    pub actions: Vec<InputAction>,
    pub zone_changes: Vec<ZoneChange>,
}

/// Runs the enabled interactions and decides which of their actions reach clients.
///
/// With one interaction everything it emits is forwarded. With several (hybrid),
/// every module still sees every frame, but only one is "heard": the one making
/// the most progress. Whichever module's DOWN was forwarded stays locked in until
/// its UP or CANCEL, across config changes to the module set.
pub struct InteractionManager {
    modules: IndexMap<InteractionType, Box<dyn InteractionModule>>,
    pressing: Option<InteractionType>,
}

impl InteractionManager {
    pub fn new(config: &InteractionConfig) -> Self {
        let mut manager = InteractionManager {
            modules: IndexMap::new(),
            pressing: None,
        };
        manager.apply_config(config);
        manager
    }

    pub fn enabled(&self) -> Vec<InteractionType> {
        self.modules.keys().copied().collect()
    }

    pub fn is_hybrid(&self) -> bool {
        self.modules.len() > 1
    }

    /// Bring the module set and every module's settings in line with `config`.
    /// Returns CANCELs for presses cut short by a module being disabled
    pub fn apply_config(&mut self, config: &InteractionConfig) -> Vec<InputAction> {
        let enabled = config.enabled_interactions();
        let mut cancels = Vec::new();

        let removed: Vec<InteractionType> = self
            .modules
            .keys()
            .filter(|t| !enabled.contains(t))
            .copied()
            .collect();
        for interaction_type in removed {
            if let Some(mut module) = self.modules.shift_remove(&interaction_type) {
                info!("Disabling interaction {:?}", interaction_type);
                let core = module.core();
                let last = core.action(InputType::Cancel, &core.positions, 0.);
                let unanswered = module.cancel();
                // Only a press clients saw the DOWN for needs answering
                if self.pressing == Some(interaction_type) {
                    self.pressing = None;
                    if unanswered {
                        cancels.push(last);
                    }
                }
            }
        }

        for interaction_type in &enabled {
            match self.modules.get_mut(interaction_type) {
                Some(module) => module.apply_config(config),
                None => {
                    info!("Enabling interaction {:?}", interaction_type);
                    self.modules
                        .insert(*interaction_type, create_module(*interaction_type, config));
                }
            }
        }
        // Keep the main interaction first
        let rank = |t: &InteractionType| enabled.iter().position(|e| e == t).unwrap_or(usize::MAX);
        self.modules.sort_by(|a, _, b, _| rank(a).cmp(&rank(b)));

        cancels
    }

    pub fn set_snap_targets(&mut self, targets: &[SnapTarget]) {
        for module in self.modules.values_mut() {
            module.set_snap_targets(targets);
        }
    }

    pub fn update(&mut self, hands: &AssignedHands, ctx: &TickContext) -> ManagerOutput {
        let mut output = ManagerOutput::default();
        let mut candidates = Vec::with_capacity(self.modules.len());

        for (interaction_type, module) in self.modules.iter_mut() {
            let result = module.update(hands.get(module.hand_type()), ctx);
            output.zone_changes.extend(result.zone_change);
            if let Some(action) = result.action {
                candidates.push((*interaction_type, action));
            }
        }

        let chosen = match self.pressing {
            Some(pressing) => candidates.into_iter().find(|(t, _)| *t == pressing),
            // Presses that were never heard stay unheard
            None if !self.is_hybrid() => candidates.into_iter().find(|(_, a)| {
                !matches!(
                    a.input_type,
                    InputType::Hold | InputType::Drag | InputType::Up | InputType::Cancel
                )
            }),
            None => candidates
                .into_iter()
                .filter(|(_, a)| {
                    matches!(a.input_type, InputType::Down | InputType::Move | InputType::Hover)
                })
                .max_by(|(_, a), (_, b)| {
                    let a_down = a.input_type == InputType::Down;
                    let b_down = b.input_type == InputType::Down;
                    a_down
                        .cmp(&b_down)
                        .then(a.progress_to_click.total_cmp(&b.progress_to_click))
                }),
        };

        if let Some((interaction_type, action)) = chosen {
            match action.input_type {
                InputType::Down => {
                    debug!("{:?} took the press", interaction_type);
                    self.pressing = Some(interaction_type);
                }
                InputType::Up | InputType::Cancel => self.pressing = None,
                _ => {}
            }
            output.actions.push(action);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend_config::PhysicalConfig,
        systems::{
            position_trackers::{TrackedPosition, TrackerWeight},
            virtual_screen::VirtualScreen,
        },
        tracking::{fixtures::pointing_hand, Hand},
        Point3D,
    };

    fn tick(manager: &mut InteractionManager, screen: &VirtualScreen, n: i64, hand: Option<&Hand>) -> ManagerOutput {
        let hands = AssignedHands {
            primary: hand,
            secondary: None,
        };
        manager.update(
            &hands,
            &TickContext {
                timestamp: n * 16_667,
                delta_time: 1. / 60.,
                screen,
            },
        )
    }

    fn hand_at(distance: f32, pinch: f32) -> Hand {
        let mut hand = pointing_hand(Point3D::new(0., 0.15, distance));
        hand.palm_velocity = Point3D::new(2., 0., 0.);
        hand.pinch_strength = pinch;
        hand
    }

    fn hybrid_config() -> InteractionConfig {
        let mut config = InteractionConfig::default();
        config.instant_unclick = false;
        config.additional_interaction_types = vec![InteractionType::Grab];
        config.push.trackers = vec![TrackerWeight::new(TrackedPosition::IndexTip, 1.)];
        config
    }

    #[test]
    fn test_single_module_forwards_everything() {
        let screen = VirtualScreen::new(&PhysicalConfig::default());
        let mut manager = InteractionManager::new(&InteractionConfig::default());
        assert_eq!(manager.enabled(), vec![InteractionType::Push]);
        let out = tick(&mut manager, &screen, 1, Some(&hand_at(0.2, 0.)));
        assert_eq!(out.actions.len(), 1);
        assert_eq!(out.actions[0].interaction_type, InteractionType::Push);
    }

    #[test]
    fn test_hybrid_locks_to_pressing_module() {
        let screen = VirtualScreen::new(&PhysicalConfig::default());
        let mut manager = InteractionManager::new(&hybrid_config());
        assert!(manager.is_hybrid());

        // Pinching far from the screen: grab wins the press
        let mut types = Vec::new();
        for n in 1..10 {
            let out = tick(&mut manager, &screen, n, Some(&hand_at(0.2, 0.95)));
            assert!(out.actions.len() <= 1);
            types.extend(out.actions.iter().map(|a| (a.interaction_type, a.input_type)));
        }
        assert!(types.contains(&(InteractionType::Grab, InputType::Down)));

        // Pushing through the screen while still grabbing: push is not heard
        for n in 10..15 {
            let out = tick(&mut manager, &screen, n, Some(&hand_at(-0.01, 0.95)));
            assert!(out.actions.iter().all(|a| a.interaction_type == InteractionType::Grab));
        }

        let out = tick(&mut manager, &screen, 15, None);
        assert_eq!(out.actions.len(), 1);
        assert_eq!(out.actions[0].input_type, InputType::Cancel);
        assert_eq!(out.actions[0].interaction_type, InteractionType::Grab);
    }

    #[test]
    fn test_disabling_pressed_module_cancels() {
        let screen = VirtualScreen::new(&PhysicalConfig::default());
        let mut config = InteractionConfig::default();
        config.instant_unclick = false;
        config.push.trackers = vec![TrackerWeight::new(TrackedPosition::IndexTip, 1.)];
        let mut manager = InteractionManager::new(&config);
        let out = tick(&mut manager, &screen, 1, Some(&hand_at(-0.01, 0.)));
        assert_eq!(out.actions[0].input_type, InputType::Down);

        config.interaction_type = InteractionType::TouchPlane;
        let cancels = manager.apply_config(&config);
        assert_eq!(cancels.len(), 1);
        assert_eq!(cancels[0].input_type, InputType::Cancel);
        assert_eq!(manager.enabled(), vec![InteractionType::TouchPlane]);
    }

    #[test]
    fn test_main_interaction_stays_first() {
        let mut config = InteractionConfig::default();
        config.additional_interaction_types = vec![InteractionType::Grab];
        let mut manager = InteractionManager::new(&config);
        config.interaction_type = InteractionType::AirTap;
        config.additional_interaction_types = vec![InteractionType::Grab];
        manager.apply_config(&config);
        assert_eq!(
            manager.enabled(),
            vec![InteractionType::AirTap, InteractionType::Grab]
        );
    }

    fn push_config() -> InteractionConfig {
        let mut config = hybrid_config();
        config.additional_interaction_types = Vec::new();
        config
    }

    /// Every forwarded DOWN answered by one UP or CANCEL, and nothing answered twice
    fn assert_forwarded_balanced(actions: &[InputAction]) {
        let mut open: Option<InteractionType> = None;
        for a in actions {
            match a.input_type {
                InputType::Down => {
                    assert_eq!(open, None, "DOWN before previous was answered: {:?}", actions);
                    open = Some(a.interaction_type);
                }
                InputType::Hold | InputType::Drag | InputType::Up | InputType::Cancel => {
                    assert_eq!(open, Some(a.interaction_type), "{:?} outside a press", a);
                    if matches!(a.input_type, InputType::Up | InputType::Cancel) {
                        open = None;
                    }
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_press_survives_switch_to_hybrid() {
        let screen = VirtualScreen::new(&PhysicalConfig::default());
        let mut manager = InteractionManager::new(&push_config());
        let mut forwarded = tick(&mut manager, &screen, 1, Some(&hand_at(-0.01, 0.))).actions;
        assert_eq!(forwarded[0].input_type, InputType::Down);

        assert!(manager.apply_config(&hybrid_config()).is_empty());
        for n in 2..10 {
            let out = tick(&mut manager, &screen, n, Some(&hand_at(-0.01, 0.95)));
            assert!(out.actions.iter().all(|a| a.interaction_type == InteractionType::Push));
            forwarded.extend(out.actions);
        }
        let out = tick(&mut manager, &screen, 10, None);
        assert_eq!(out.actions.len(), 1);
        assert_eq!(out.actions[0].input_type, InputType::Cancel);
        assert_eq!(out.actions[0].interaction_type, InteractionType::Push);
        forwarded.extend(out.actions);
        assert_forwarded_balanced(&forwarded);
    }

    #[test]
    fn test_unheard_press_stays_unheard_after_switch_to_single() {
        let screen = VirtualScreen::new(&PhysicalConfig::default());
        let mut manager = InteractionManager::new(&hybrid_config());
        let mut forwarded = Vec::new();
        for n in 1..10 {
            forwarded.extend(tick(&mut manager, &screen, n, Some(&hand_at(0.2, 0.95))).actions);
        }
        // Push presses too, but grab holds the lock
        for n in 10..14 {
            forwarded.extend(tick(&mut manager, &screen, n, Some(&hand_at(-0.01, 0.95))).actions);
        }

        let cancels = manager.apply_config(&push_config());
        assert_eq!(cancels.len(), 1);
        assert_eq!(cancels[0].interaction_type, InteractionType::Grab);
        forwarded.extend(cancels);

        // Push's own press finishing is never forwarded
        for n in 14..18 {
            forwarded.extend(tick(&mut manager, &screen, n, Some(&hand_at(-0.01, 0.))).actions);
        }
        forwarded.extend(tick(&mut manager, &screen, 18, None).actions);

        // A fresh press is heard again
        let mut pressed = false;
        for n in 19..25 {
            let out = tick(&mut manager, &screen, n, Some(&hand_at(0.2 - 0.05 * (n - 19) as f32, 0.)));
            pressed |= out.actions.iter().any(|a| a.input_type == InputType::Down);
            forwarded.extend(out.actions);
        }
        assert!(pressed);
        assert_forwarded_balanced(&forwarded);
    }

    #[test]
    fn test_removing_unheard_module_sends_no_cancel() {
        let screen = VirtualScreen::new(&PhysicalConfig::default());
        let mut manager = InteractionManager::new(&hybrid_config());
        let mut forwarded = Vec::new();
        for n in 1..10 {
            forwarded.extend(tick(&mut manager, &screen, n, Some(&hand_at(0.2, 0.95))).actions);
        }
        for n in 10..14 {
            forwarded.extend(tick(&mut manager, &screen, n, Some(&hand_at(-0.01, 0.95))).actions);
        }
        // Letting go of the grab frees the lock while push is still pressed
        for n in 14..30 {
            forwarded.extend(tick(&mut manager, &screen, n, Some(&hand_at(-0.01, 0.))).actions);
        }
        assert!(forwarded
            .iter()
            .any(|a| a.interaction_type == InteractionType::Grab && a.input_type == InputType::Up));

        let mut config = hybrid_config();
        config.interaction_type = InteractionType::Grab;
        config.additional_interaction_types = Vec::new();
        assert!(manager.apply_config(&config).is_empty());
        assert_eq!(manager.enabled(), vec![InteractionType::Grab]);
        assert_forwarded_balanced(&forwarded);
    }

    #[test]
    fn test_forwarded_presses_balanced_across_config_changes() {
        let screen = VirtualScreen::new(&PhysicalConfig::default());
        let mut manager = InteractionManager::new(&push_config());
        let mut forwarded = Vec::new();
        let mut seed: u64 = 0x5eed;
        let mut next = move |n: u64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % n
        };

        for n in 1..2000 {
            if next(12) == 0 {
                let config = if next(2) == 0 {
                    hybrid_config()
                } else {
                    push_config()
                };
                forwarded.extend(manager.apply_config(&config));
            }
            let distance = [0.2, 0.08, 0.02, -0.01][next(4) as usize];
            let pinch = [0., 0.5, 0.95][next(3) as usize];
            let hand = hand_at(distance, pinch);
            let hand = (next(10) != 0).then_some(&hand);
            let out = tick(&mut manager, &screen, n as i64, hand);
            assert!(out.actions.len() <= 1);
            forwarded.extend(out.actions);
        }
        assert!(forwarded.iter().any(|a| a.input_type == InputType::Down));
        assert_forwarded_balanced(&forwarded);
    }
}
