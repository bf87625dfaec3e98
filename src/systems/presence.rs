use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    backend_config::InteractionZoneSettings,
    tracking::{HandType, InteractionType},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    HandEntered,
    HandExited,
}

/// Reported whenever a module's hand crosses into or out of its interaction zone
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneChange {
    pub interaction_type: InteractionType,
    pub hand_type: HandType,
    pub state: ZoneState,
}

/// Distance band in front of the screen inside which a hand is allowed to interact
pub struct InteractionZone {
    settings: InteractionZoneSettings,
    inside: bool,
}

impl InteractionZone {
    pub fn new(settings: &InteractionZoneSettings) -> Self {
        InteractionZone {
            settings: settings.clone(),
            inside: false,
        }
    }

    pub fn update_settings(&mut self, settings: &InteractionZoneSettings) {
        self.settings = settings.clone();
    }

    pub fn contains(&self, distance: f32) -> bool {
        !self.settings.enabled
            || (distance >= self.settings.min_distance_m && distance <= self.settings.max_distance_m)
    }

    /// Track whether a hand is usable this tick; returns the new state if it changed.
    /// `distance` is `None` when there is no hand at all. A disabled zone never reports
    pub fn update(&mut self, distance: Option<f32>) -> Option<ZoneState> {
        if !self.settings.enabled {
            self.inside = false;
            return None;
        }
        let inside = distance.is_some_and(|d| self.contains(d));
        if inside == self.inside {
            return None;
        }
        self.inside = inside;
        let state = if inside {
            ZoneState::HandEntered
        } else {
            ZoneState::HandExited
        };
        debug!("Interaction zone: {:?}", state);
        Some(state)
    }
}
