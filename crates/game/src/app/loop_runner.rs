use std::process::ExitCode;

use engine::run_headless;
use tracing::info;

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        scene,
        mut input,
    } = app;
    let summary = run_headless(config, scene, input.as_mut());
    info!(
        ticks_run = summary.ticks_run,
        restarts = summary.restarts,
        stop_reason = ?summary.stop_reason,
        "session_finished"
    );
    ExitCode::SUCCESS
}
