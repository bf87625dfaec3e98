pub mod interactions;
pub mod position_trackers;
pub mod positioning;
pub mod presence;
pub mod quick_setup;
pub mod stabiliser;
pub mod virtual_screen;

use interactions::manager::InteractionManager;
use log::info;
use quick_setup::QuickSetup;
use virtual_screen::VirtualScreen;

use crate::{backend_config::BackendConfig, tracking::InputAction};

pub struct Systems {
    pub virtual_screen: VirtualScreen,
    pub interaction_manager: InteractionManager,
    pub quick_setup: QuickSetup,
}

impl Systems {
    pub fn new(config: &BackendConfig) -> Systems {
        let virtual_screen = VirtualScreen::new(&config.physical);
        info!(
            "Virtual screen {}x{} px, {:.3}x{:.3} m",
            virtual_screen.width_px(),
            virtual_screen.height_px(),
            virtual_screen.width_m(),
            virtual_screen.height_m()
        );

        Systems {
            virtual_screen,
            interaction_manager: InteractionManager::new(&config.interaction),
            quick_setup: QuickSetup::default(),
        }
    }

    /// Swap in a new config without losing gesture state. Returns CANCELs for
    /// any press cut short by its interaction being disabled
    pub fn apply_config(&mut self, config: &BackendConfig) -> Vec<InputAction> {
        self.virtual_screen = VirtualScreen::new(&config.physical);
        self.interaction_manager.apply_config(&config.interaction)
    }
}
