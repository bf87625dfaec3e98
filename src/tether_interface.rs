use anyhow::Result;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tether_agent::{ChannelDefinition, ChannelOptionsBuilder, TetherAgent};

use crate::{
    backend_config::{BackendConfig, PhysicalConfig},
    config_manager::ConfigStore,
    engine::{Engine, HandFrameSource, InputActionSink},
    systems::{
        presence::ZoneChange,
        quick_setup::{CalibrationPoint, QuickSetupError},
    },
    tracking::InputAction,
    Point3D,
};

pub struct Outputs {
    pub input_actions_output: ChannelDefinition,
    pub zone_output: ChannelDefinition,
    pub config_output: ChannelDefinition,
    pub quick_setup_output: ChannelDefinition,
}

impl Outputs {
    pub fn new(tether_agent: &mut TetherAgent) -> Outputs {
        let config_output = ChannelOptionsBuilder::create_sender("provideTouchlessConfig")
            .qos(Some(2))
            .retain(Some(true))
            .build(tether_agent)
            .expect("failed to create Output Plug");

        // Every tick's actions, in order
        let input_actions_output = ChannelOptionsBuilder::create_sender("inputActions")
            .qos(Some(1))
            .build(tether_agent)
            .expect("failed to create Output Plug");

        let zone_output = ChannelOptionsBuilder::create_sender("interactionZone")
            .qos(Some(1))
            .build(tether_agent)
            .expect("failed to create Output Plug");

        let quick_setup_output = ChannelOptionsBuilder::create_sender("quickSetupResult")
            .qos(Some(2))
            .build(tether_agent)
            .expect("failed to create Output Plug");

        Outputs {
            input_actions_output,
            zone_output,
            config_output,
            quick_setup_output,
        }
    }
}

pub struct Inputs {
    pub hand_frames_input: ChannelDefinition,
    pub save_config_input: ChannelDefinition,
    pub quick_setup_input: ChannelDefinition,
    pub snap_targets_input: ChannelDefinition,
}

impl Inputs {
    pub fn new(tether_agent: &mut TetherAgent) -> Inputs {
        let hand_frames_input = ChannelOptionsBuilder::create_receiver("handFrames")
            .qos(Some(0))
            .build(tether_agent)
            .expect("failed to create Input Plug");
        let save_config_input = ChannelOptionsBuilder::create_receiver("saveTouchlessConfig")
            .qos(Some(2))
            .build(tether_agent)
            .expect("failed to create Input Plug");
        let quick_setup_input = ChannelOptionsBuilder::create_receiver("quickSetup")
            .qos(Some(2))
            .build(tether_agent)
            .expect("failed to create Input Plug");
        let snap_targets_input = ChannelOptionsBuilder::create_receiver("snapTargets")
            .qos(Some(1))
            .build(tether_agent)
            .expect("failed to create Input Plug");

        Inputs {
            hand_frames_input,
            save_config_input,
            quick_setup_input,
            snap_targets_input,
        }
    }
}

/// A calibration touch. Without a position, the engine's current primary
/// index fingertip is used
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuickSetupRequest {
    pub point: CalibrationPoint,
    #[serde(default)]
    pub position: Option<Point3D>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuickSetupResult {
    pub point: CalibrationPoint,
    /// Set once the bottom touch has completed a successful setup
    pub physical: Option<PhysicalConfig>,
    pub error: Option<String>,
}

impl QuickSetupResult {
    fn failed(point: CalibrationPoint, e: QuickSetupError) -> Self {
        warn!("Quick setup {:?} failed: {}", point, e);
        QuickSetupResult {
            point,
            physical: None,
            error: Some(e.to_string()),
        }
    }
}

/// Record the requested touch; recording the bottom touch also solves and
/// applies the new physical config
pub fn handle_quick_setup_request<S, C, K>(
    request: &QuickSetupRequest,
    engine: &mut Engine<S, C, K>,
) -> QuickSetupResult
where
    S: HandFrameSource,
    C: ConfigStore,
    K: InputActionSink,
{
    let QuickSetupRequest { point, position } = *request;
    let recorded = match position {
        Some(position) => {
            engine.record_calibration_position(point, position);
            Ok(())
        }
        None => engine.record_calibration(point),
    };
    if let Err(e) = recorded {
        return QuickSetupResult::failed(point, e);
    }
    debug!("Quick setup {:?} recorded", point);

    if point == CalibrationPoint::Top {
        return QuickSetupResult {
            point,
            physical: None,
            error: None,
        };
    }
    match engine.apply_quick_setup() {
        Ok(physical) => {
            info!("Quick setup complete");
            QuickSetupResult {
                point,
                physical: Some(physical),
                error: None,
            }
        }
        Err(e) => QuickSetupResult::failed(point, e),
    }
}

pub fn publish_config(
    tether_agent: &TetherAgent,
    outputs: &Outputs,
    config: &BackendConfig,
) -> Result<()> {
    let payload = rmp_serde::to_vec_named(config)?;
    tether_agent.send(&outputs.config_output, Some(&payload))?;
    debug!("Published config");
    Ok(())
}

pub fn publish_quick_setup_result(
    tether_agent: &TetherAgent,
    outputs: &Outputs,
    result: &QuickSetupResult,
) -> Result<()> {
    let payload = rmp_serde::to_vec_named(result)?;
    tether_agent.send(&outputs.quick_setup_output, Some(&payload))?;
    Ok(())
}

/// Publishes actions and zone changes on their Tether channels
pub struct TetherSink<'a> {
    tether_agent: &'a TetherAgent,
    outputs: &'a Outputs,
}

impl<'a> TetherSink<'a> {
    pub fn new(tether_agent: &'a TetherAgent, outputs: &'a Outputs) -> Self {
        TetherSink {
            tether_agent,
            outputs,
        }
    }
}

impl InputActionSink for TetherSink<'_> {
    fn dispatch(&mut self, actions: &[InputAction]) -> Result<()> {
        let payload = rmp_serde::to_vec_named(actions)?;
        self.tether_agent
            .send(&self.outputs.input_actions_output, Some(&payload))?;
        Ok(())
    }

    fn dispatch_zone_change(&mut self, change: &ZoneChange) -> Result<()> {
        let payload = rmp_serde::to_vec_named(change)?;
        self.tether_agent
            .send(&self.outputs.zone_output, Some(&payload))?;
        Ok(())
    }
}
