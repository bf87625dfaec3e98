use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use log::{debug, info, warn};

use crate::{
    backend_config::{BackendConfig, PhysicalConfig},
    config_manager::{ConfigChangeNotifier, ConfigManager, ConfigStore},
    systems::{
        interactions::TickContext,
        positioning::SnapTarget,
        presence::ZoneChange,
        quick_setup::{CalibrationPoint, QuickSetupError},
        Systems,
    },
    tracking::{Hand, HandAssigner, HandFrame, InputAction},
    Point3D,
};

/// Assumed frame interval until two timestamps have been seen
const DEFAULT_DELTA_TIME: f32 = 1. / 60.;

pub trait HandFrameSource {
    fn next_frame(&mut self) -> Option<HandFrame>;
}

/// Receives every tick's actions, in order. Delivery and retry are up to the sink;
/// errors are logged and counted, never fatal to the tick
pub trait InputActionSink {
    fn dispatch(&mut self, actions: &[InputAction]) -> Result<()>;

    fn dispatch_zone_change(&mut self, _change: &ZoneChange) -> Result<()> {
        Ok(())
    }
}

/// Frames pushed in by whoever receives them, consumed oldest first
#[derive(Debug, Default)]
pub struct FrameQueue {
    frames: VecDeque<HandFrame>,
}

impl FrameQueue {
    pub fn push(&mut self, frame: HandFrame) {
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl HandFrameSource for FrameQueue {
    fn next_frame(&mut self) -> Option<HandFrame> {
        self.frames.pop_front()
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub actions: Vec<InputAction>,
    pub zone_changes: Vec<ZoneChange>,
    /// Reject everything, as an unreachable transport would
    pub failing: bool,
}

impl InputActionSink for RecordingSink {
    fn dispatch(&mut self, actions: &[InputAction]) -> Result<()> {
        if self.failing {
            return Err(anyhow!("sink unavailable"));
        }
        self.actions.extend_from_slice(actions);
        Ok(())
    }

    fn dispatch_zone_change(&mut self, change: &ZoneChange) -> Result<()> {
        if self.failing {
            return Err(anyhow!("sink unavailable"));
        }
        self.zone_changes.push(*change);
        Ok(())
    }
}

fn is_usable(hand: &Hand) -> bool {
    hand.palm_position.iter().all(|v| v.is_finite())
        && hand.wrist_position.iter().all(|v| v.is_finite())
}

/// Drives everything, one tick per hand frame:
/// apply pending config, move hands into screen space, run the interactions, dispatch
pub struct Engine<S: HandFrameSource, C: ConfigStore, K: InputActionSink> {
    source: S,
    store: C,
    sink: K,
    config: ConfigManager,
    systems: Systems,
    hand_assigner: HandAssigner,
    last_timestamp: Option<i64>,
    /// Primary hand from the latest frame, still in tracking space
    primary_hand: Option<Hand>,
    sink_failures: u64,
}

impl<S: HandFrameSource, C: ConfigStore, K: InputActionSink> Engine<S, C, K> {
    pub fn new(source: S, mut store: C, sink: K) -> Self {
        let config = ConfigManager::new(&mut store);
        let systems = Systems::new(config.config());
        info!(
            "Engine ready; interactions {:?}",
            systems.interaction_manager.enabled()
        );
        Engine {
            source,
            store,
            sink,
            config,
            systems,
            hand_assigner: HandAssigner::default(),
            last_timestamp: None,
            primary_hand: None,
            sink_failures: 0,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        self.config.config()
    }

    pub fn config_version(&self) -> u64 {
        self.config.version()
    }

    pub fn notifier(&self) -> ConfigChangeNotifier {
        self.config.notifier()
    }

    pub fn systems(&self) -> &Systems {
        &self.systems
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn store_mut(&mut self) -> &mut C {
        &mut self.store
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_failures(&self) -> u64 {
        self.sink_failures
    }

    /// Pull one frame from the source and tick it; `None` if no frame was waiting
    pub fn run_once(&mut self) -> Option<Vec<InputAction>> {
        let frame = self.source.next_frame()?;
        Some(self.tick(&frame))
    }

    pub fn tick(&mut self, frame: &HandFrame) -> Vec<InputAction> {
        let mut actions = Vec::new();

        if let Some(config) = self.config.apply_if_dirty(&mut self.store) {
            actions.extend(self.systems.apply_config(config));
        }

        let delta_time = match self.last_timestamp {
            Some(previous) if frame.timestamp > previous => {
                (frame.timestamp - previous) as f32 / 1_000_000.
            }
            _ => DEFAULT_DELTA_TIME,
        };
        self.last_timestamp = Some(frame.timestamp);

        let world_hands: Vec<Hand> = frame
            .hands
            .iter()
            .filter(|h| {
                let usable = is_usable(h);
                if !usable {
                    debug!("Dropping hand {} with non-finite position", h.id);
                }
                usable
            })
            .map(|h| self.systems.virtual_screen.transform_hand(h))
            .collect();
        let hands = self.hand_assigner.assign(&world_hands);

        self.primary_hand = hands
            .primary
            .and_then(|p| frame.hands.iter().find(|h| h.id == p.id))
            .cloned();

        let ctx = TickContext {
            timestamp: frame.timestamp,
            delta_time,
            screen: &self.systems.virtual_screen,
        };
        let output = self.systems.interaction_manager.update(&hands, &ctx);
        actions.extend(output.actions);

        self.dispatch(&actions);
        for change in &output.zone_changes {
            if let Err(e) = self.sink.dispatch_zone_change(change) {
                warn!("Failed to dispatch zone change: {}", e);
                self.sink_failures += 1;
            }
        }

        actions
    }

    fn dispatch(&mut self, actions: &[InputAction]) {
        if actions.is_empty() {
            return;
        }
        if let Err(e) = self.sink.dispatch(actions) {
            self.sink_failures += 1;
            warn!(
                "Failed to dispatch {} action(s) ({} failures so far): {}",
                actions.len(),
                self.sink_failures,
                e
            );
        }
    }

    /// Replace the whole config, apply it now and persist it. The new config is
    /// live even if saving fails
    pub fn update_config(&mut self, config: BackendConfig) -> Result<()> {
        let saved = self.config.update(config, &mut self.store);
        let cancels = self.systems.apply_config(self.config.config());
        self.dispatch(&cancels);
        saved
    }

    pub fn set_snap_targets(&mut self, targets: &[SnapTarget]) {
        self.systems.interaction_manager.set_snap_targets(targets);
    }

    /// Record the current primary hand's index fingertip as a calibration touch
    pub fn record_calibration(&mut self, point: CalibrationPoint) -> Result<(), QuickSetupError> {
        self.systems
            .quick_setup
            .record_hand(point, self.primary_hand.as_ref())
    }

    /// Record a calibration touch measured elsewhere (tracking space)
    pub fn record_calibration_position(&mut self, point: CalibrationPoint, position: Point3D) {
        self.systems.quick_setup.record(point, position);
    }

    /// Solve for the physical setup from both recorded touches and make it live.
    /// Recorded touches are cleared on success
    pub fn apply_quick_setup(&mut self) -> Result<PhysicalConfig, QuickSetupError> {
        let physical = self
            .systems
            .quick_setup
            .solve(&self.config.config().physical)?;
        self.systems.quick_setup.reset();

        let config = BackendConfig {
            physical: physical.clone(),
            ..self.config.config().clone()
        };
        if let Err(e) = self.update_config(config) {
            warn!("Quick setup applied but could not be saved: {}", e);
        }
        Ok(physical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config_manager::MemoryConfigStore,
        systems::{
            position_trackers::{TrackedPosition, TrackerWeight},
            presence::ZoneState,
            quick_setup::TARGET_DIST_FROM_EDGE,
            virtual_screen::VirtualScreen,
        },
        tracking::{fixtures::pointing_hand, InputType, InteractionType},
    };

    fn push_config() -> BackendConfig {
        let mut config = BackendConfig::default();
        config.interaction.instant_unclick = false;
        config.interaction.push.trackers = vec![TrackerWeight::new(TrackedPosition::IndexTip, 1.)];
        config
    }

    /// Frame with one hand whose index tip is at `tip` in screen-world space
    fn frame_at(config: &BackendConfig, n: i64, tip: Option<Point3D>) -> HandFrame {
        let screen = VirtualScreen::new(&config.physical);
        let hands = tip
            .map(|tip| {
                let mut hand = pointing_hand(screen.world_to_tracking(&tip));
                hand.palm_velocity = Point3D::new(2., 0., 0.);
                vec![hand]
            })
            .unwrap_or_default();
        HandFrame {
            timestamp: n * 16_667,
            hands,
        }
    }

    fn engine(
        config: BackendConfig,
        sink: RecordingSink,
    ) -> Engine<FrameQueue, MemoryConfigStore, RecordingSink> {
        Engine::new(FrameQueue::default(), MemoryConfigStore::new(config), sink)
    }

    #[test]
    fn test_hand_loss_cancels_same_tick() {
        let config = push_config();
        let mut engine = engine(config.clone(), RecordingSink::default());
        let down = engine.tick(&frame_at(&config, 1, Some(Point3D::new(0., 0.15, -0.01))));
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].input_type, InputType::Down);

        let lost = engine.tick(&frame_at(&config, 2, None));
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].input_type, InputType::Cancel);
        assert_eq!(engine.sink().actions.len(), 2);
    }

    #[test]
    fn test_sink_failure_does_not_abort_tick() {
        let config = push_config();
        let sink = RecordingSink {
            failing: true,
            ..Default::default()
        };
        let mut engine = engine(config.clone(), sink);
        for n in 1..4 {
            let actions = engine.tick(&frame_at(&config, n, Some(Point3D::new(0., 0.15, 0.1))));
            assert_eq!(actions.len(), 1);
        }
        assert_eq!(engine.sink_failures(), 3);
        assert!(engine.sink().actions.is_empty());
    }

    #[test]
    fn test_zone_changes_only_when_enabled() {
        let config = push_config();
        let mut engine = engine(config.clone(), RecordingSink::default());
        engine.tick(&frame_at(&config, 1, Some(Point3D::new(0., 0.15, 0.1))));
        engine.tick(&frame_at(&config, 2, None));
        assert!(engine.sink().zone_changes.is_empty());

        let mut zoned = config.clone();
        zoned.interaction.interaction_zone.enabled = true;
        engine.update_config(zoned.clone()).unwrap();
        engine.tick(&frame_at(&zoned, 3, Some(Point3D::new(0., 0.15, 0.1))));
        engine.tick(&frame_at(&zoned, 4, None));
        let states: Vec<ZoneState> = engine.sink().zone_changes.iter().map(|c| c.state).collect();
        assert_eq!(states, vec![ZoneState::HandEntered, ZoneState::HandExited]);
    }

    #[test]
    fn test_run_once_drains_source() {
        let config = push_config();
        let mut engine = engine(config.clone(), RecordingSink::default());
        assert!(engine.run_once().is_none());
        engine
            .source_mut()
            .push(frame_at(&config, 1, Some(Point3D::new(0., 0.15, 0.1))));
        engine.source_mut().push(frame_at(&config, 2, None));
        assert_eq!(engine.run_once().map(|a| a.len()), Some(1));
        assert!(engine.run_once().is_some());
        assert!(engine.source_mut().is_empty());
    }

    #[test]
    fn test_config_reload_applies_on_tick() {
        let config = push_config();
        let mut engine = engine(config.clone(), RecordingSink::default());
        engine.store_mut().config.interaction.interaction_type = InteractionType::Grab;

        // Not flagged yet: nothing changes
        let actions = engine.tick(&frame_at(&config, 1, Some(Point3D::new(0., 0.15, 0.1))));
        assert_eq!(actions[0].interaction_type, InteractionType::Push);

        engine.notifier().mark_dirty();
        let actions = engine.tick(&frame_at(&config, 2, Some(Point3D::new(0., 0.15, 0.1))));
        assert_eq!(actions[0].interaction_type, InteractionType::Grab);
        assert_eq!(engine.config_version(), 1);
    }

    #[test]
    fn test_disabling_pressed_interaction_cancels() {
        let config = push_config();
        let mut engine = engine(config.clone(), RecordingSink::default());
        engine.tick(&frame_at(&config, 1, Some(Point3D::new(0., 0.15, -0.01))));

        let mut next = config.clone();
        next.interaction.interaction_type = InteractionType::TouchPlane;
        engine.update_config(next).unwrap();
        let types: Vec<InputType> = engine.sink().actions.iter().map(|a| a.input_type).collect();
        assert_eq!(types, vec![InputType::Down, InputType::Cancel]);
    }

    #[test]
    fn test_quick_setup_from_hands() {
        let config = push_config();
        let mut engine = engine(config.clone(), RecordingSink::default());
        let height = config.physical.screen_height_m;

        assert_eq!(
            engine.apply_quick_setup(),
            Err(QuickSetupError::MissingTop)
        );

        let top = Point3D::new(0., height * (1. - TARGET_DIST_FROM_EDGE), 0.);
        let bottom = Point3D::new(0., height * TARGET_DIST_FROM_EDGE, 0.);
        engine.tick(&frame_at(&config, 1, Some(top)));
        engine.record_calibration(CalibrationPoint::Top).unwrap();
        engine.tick(&frame_at(&config, 2, Some(bottom)));
        engine.record_calibration(CalibrationPoint::Bottom).unwrap();

        let physical = engine.apply_quick_setup().unwrap();
        assert!((physical.screen_height_m - height).abs() < 1e-3);
        assert_eq!(engine.config().physical, physical);
        assert_eq!(engine.store_mut().saves, 1);
    }

    #[test]
    fn test_calibration_needs_a_hand() {
        let config = push_config();
        let mut engine = engine(config.clone(), RecordingSink::default());
        engine.tick(&frame_at(&config, 1, None));
        assert_eq!(
            engine.record_calibration(CalibrationPoint::Top),
            Err(QuickSetupError::MissingTop)
        );
    }
}
