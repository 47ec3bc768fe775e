use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use super::input::InputSource;
use super::scene::{Scene, SceneCommand, SceneMachine};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    /// Stop after this many fixed ticks; `None` runs until quit.
    pub max_ticks: Option<u64>,
    /// Sleep between ticks to hold `target_tps` in wall-clock time.
    pub realtime: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_ticks: Some(600),
            realtime: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TickLimit,
    QuitRequested,
    SceneQuit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks_run: u64,
    pub restarts: u32,
    pub stop_reason: StopReason,
}

/// Drives one scene at a fixed timestep without a window. Restart requests
/// from the scene are served in place by the [`SceneMachine`].
pub fn run_headless(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    input: &mut dyn InputSource,
) -> LoopSummary {
    let mut scenes = SceneMachine::new(scene);
    let target_tps = config.target_tps.max(1);
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();

    scenes.load();
    info!(
        entity_count = scenes.world().entity_count(),
        title = scenes.debug_title().unwrap_or_default(),
        "scene_loaded"
    );
    info!(
        target_tps,
        max_ticks = config.max_ticks.unwrap_or(0),
        realtime = config.realtime,
        "loop_config"
    );

    let mut ticks_run = 0u64;
    let mut next_deadline = Instant::now();
    let stop_reason = loop {
        if config.max_ticks.is_some_and(|max_ticks| ticks_run >= max_ticks) {
            break StopReason::TickLimit;
        }

        let snapshot = input.snapshot_for_tick(ticks_run);
        if snapshot.quit_requested() {
            info!(reason = "input", "shutdown_requested");
            break StopReason::QuitRequested;
        }

        let command = scenes.update(fixed_dt_seconds, &snapshot);
        ticks_run = ticks_run.saturating_add(1);
        match command {
            SceneCommand::None => {}
            SceneCommand::RestartLevel => scenes.restart(),
            SceneCommand::Quit => {
                info!(reason = "scene", "shutdown_requested");
                break StopReason::SceneQuit;
            }
        }
        scenes.render();

        if config.realtime {
            next_deadline += fixed_dt;
            let now = Instant::now();
            if next_deadline > now {
                thread::sleep(next_deadline - now);
            } else {
                next_deadline = now;
            }
        }
    };

    let summary = LoopSummary {
        ticks_run,
        restarts: scenes.restart_count(),
        stop_reason,
    };
    scenes.shutdown();
    info!(
        ticks_run = summary.ticks_run,
        restarts = summary.restarts,
        stop_reason = ?summary.stop_reason,
        "loop_finished"
    );
    summary
}
