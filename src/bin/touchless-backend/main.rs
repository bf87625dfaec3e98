use clap::Parser;
use env_logger::Env;
use log::{debug, error, info, warn};
use std::fs;
use std::thread;
use std::time::{Duration, SystemTime};
use tether_agent::TetherAgentOptionsBuilder;

use tether_touchless::backend_config::BackendConfig;
use tether_touchless::config_manager::{ConfigChangeNotifier, JsonFileConfigStore};
use tether_touchless::engine::{Engine, FrameQueue};
use tether_touchless::systems::positioning::SnapTarget;
use tether_touchless::tether_interface::{
    handle_quick_setup_request, publish_config, publish_quick_setup_result, Inputs, Outputs,
    QuickSetupRequest, TetherSink,
};
use tether_touchless::tracking::HandFrame;

mod cli;
use cli::Cli;

const CONFIG_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Flag the config dirty whenever the file's modification time changes
fn watch_config_file(path: String, notifier: ConfigChangeNotifier) {
    let modified = |path: &str| -> Option<SystemTime> { fs::metadata(path).ok()?.modified().ok() };
    thread::spawn(move || {
        let mut last = modified(&path);
        loop {
            thread::sleep(CONFIG_POLL_INTERVAL);
            let current = modified(&path);
            if current != last {
                debug!("Config file {} changed on disk", path);
                last = current;
                notifier.mark_dirty();
            }
        }
    });
}

fn main() {
    let cli = Cli::parse();

    // Initialize the logger from the environment

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level))
        .filter_module("paho_mqtt", log::LevelFilter::Warn)
        .filter_module("tether_agent", log::LevelFilter::Warn)
        .init();

    debug!("Started; args: {:?}", cli);

    let mut tether_agent = TetherAgentOptionsBuilder::new(&cli.agent_role)
        .id(Some(&cli.agent_group))
        .host(Some(&cli.tether_host.to_string()))
        .username(cli.tether_username.as_deref())
        .password(cli.tether_password.as_deref())
        .build()
        .expect("failed to init and/or connect Tether Agent");

    let inputs = Inputs::new(&mut tether_agent);
    let outputs = Outputs::new(&mut tether_agent);

    let store = JsonFileConfigStore::new(&cli.config_path);
    info!("Using config file {}", store.path());
    let mut engine = Engine::new(
        FrameQueue::default(),
        store,
        TetherSink::new(&tether_agent, &outputs),
    );

    watch_config_file(cli.config_path.clone(), engine.notifier());

    // Always publish on first start/load...
    publish_config(&tether_agent, &outputs, engine.config()).expect("failed to publish config");
    let mut published_version = engine.config_version();

    loop {
        let mut work_done = false;

        if let Some((topic, message)) = tether_agent.check_messages() {
            work_done = true;

            if inputs.hand_frames_input.matches(&topic) {
                match rmp_serde::from_slice::<HandFrame>(&message) {
                    Ok(frame) => engine.source_mut().push(frame),
                    Err(e) => warn!("Failed to decode hand frame: {}", e),
                }
            }

            if inputs.save_config_input.matches(&topic) {
                match BackendConfig::parse_remote_config(&message) {
                    Ok(config) => {
                        if let Err(e) = engine.update_config(config) {
                            error!("Config applied but not saved: {}", e);
                        }
                    }
                    Err(e) => error!("Ignoring saveTouchlessConfig message: {}", e),
                }
            }

            if inputs.quick_setup_input.matches(&topic) {
                match rmp_serde::from_slice::<QuickSetupRequest>(&message) {
                    Ok(request) => {
                        info!("quickSetup message: {:?}", request.point);
                        let result = handle_quick_setup_request(&request, &mut engine);
                        if let Err(e) = publish_quick_setup_result(&tether_agent, &outputs, &result)
                        {
                            error!("Failed to publish quick setup result: {}", e);
                        }
                    }
                    Err(e) => warn!("Failed to decode quick setup request: {}", e),
                }
            }

            if inputs.snap_targets_input.matches(&topic) {
                match rmp_serde::from_slice::<Vec<SnapTarget>>(&message) {
                    Ok(targets) => {
                        debug!("{} snap targets", targets.len());
                        engine.set_snap_targets(&targets);
                    }
                    Err(e) => warn!("Failed to decode snap targets: {}", e),
                }
            }
        }

        if engine.run_once().is_some() {
            work_done = true;
        }

        // Saved, calibrated or reloaded from disk: republish (retained)
        if engine.config_version() != published_version {
            match publish_config(&tether_agent, &outputs, engine.config()) {
                Ok(()) => published_version = engine.config_version(),
                Err(e) => error!("Failed to publish config: {}", e),
            }
        }

        if !work_done {
            thread::sleep(Duration::from_millis(cli.tick_interval_ms));
        }
    }
}
