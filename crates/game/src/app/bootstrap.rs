use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{
    resolve_app_paths, AppPaths, IdleInput, InputScript, InputScriptError, InputSource,
    LoopConfig, Scene, ScriptedInput, StartupError,
};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use super::content::{load_dialogue_script, load_level, ContentError};
use super::gameplay::{LevelAssets, StealthScene};

const LEVEL_ENV_VAR: &str = "STEALTH_LEVEL";
const MAX_TICKS_ENV_VAR: &str = "STEALTH_MAX_TICKS";
const INPUT_SCRIPT_ENV_VAR: &str = "STEALTH_INPUT_SCRIPT";
const DEFAULT_LEVEL_NAME: &str = "demo";
const DEFAULT_MAX_TICKS: u64 = 600;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("failed to read input script '{}': {source}", .path.display())]
    InputScriptIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid input script '{}': {source}", .path.display())]
    InputScript {
        path: PathBuf,
        #[source]
        source: InputScriptError,
    },
    #[error("{var} must be a non-negative integer, got `{value}`")]
    InvalidEnvValue { var: &'static str, value: String },
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
    pub(crate) input: Box<dyn InputSource>,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Stealth Startup ===");

    let paths = resolve_app_paths()?;
    let level_name = env::var(LEVEL_ENV_VAR)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_LEVEL_NAME.to_string());
    let assets = load_level_assets(&paths, &level_name)?;

    let config = LoopConfig {
        max_ticks: parse_max_ticks(env::var(MAX_TICKS_ENV_VAR).ok().as_deref())?,
        ..LoopConfig::default()
    };
    let input = build_input_source(env::var_os(INPUT_SCRIPT_ENV_VAR).map(PathBuf::from))?;
    info!(
        root = %paths.root.display(),
        level = %level_name,
        max_ticks = config.max_ticks.unwrap_or(0),
        "app_configured"
    );

    Ok(AppWiring {
        config,
        scene: Box::new(StealthScene::new(assets)),
        input,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Loads the level and every dialogue script its triggers name. A script that
/// fails to load is logged and left out, which leaves its trigger inert.
pub(crate) fn load_level_assets(paths: &AppPaths, level_name: &str) -> Result<LevelAssets, ContentError> {
    let level = load_level(&paths.level_file(level_name))?;

    let mut dialogue = HashMap::new();
    for trigger in &level.dialogue_triggers {
        if dialogue.contains_key(&trigger.script) {
            continue;
        }
        match load_dialogue_script(&paths.dialogue_file(&trigger.script)) {
            Ok(script) => {
                dialogue.insert(trigger.script.clone(), script.segments);
            }
            Err(err) => error!(script = %trigger.script, error = %err, "dialogue_script_unavailable"),
        }
    }

    info!(
        level = %level.name,
        dialogue_scripts = dialogue.len(),
        "level_assets_loaded"
    );
    Ok(LevelAssets { level, dialogue })
}

/// `0` lifts the tick limit.
fn parse_max_ticks(raw: Option<&str>) -> Result<Option<u64>, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(Some(DEFAULT_MAX_TICKS));
    };
    match raw.parse::<u64>() {
        Ok(0) => Ok(None),
        Ok(ticks) => Ok(Some(ticks)),
        Err(_) => Err(AppError::InvalidEnvValue {
            var: MAX_TICKS_ENV_VAR,
            value: raw.to_string(),
        }),
    }
}

fn build_input_source(script_path: Option<PathBuf>) -> Result<Box<dyn InputSource>, AppError> {
    let Some(path) = script_path else {
        return Ok(Box::new(IdleInput));
    };
    let script = load_input_script(&path)?;
    info!(path = %path.display(), steps = script.steps.len(), "input_script_loaded");
    Ok(Box::new(ScriptedInput::new(script)))
}

fn load_input_script(path: &Path) -> Result<InputScript, AppError> {
    let raw = fs::read_to_string(path).map_err(|source| AppError::InputScriptIo {
        path: path.to_path_buf(),
        source,
    })?;
    InputScript::from_json_str(&raw).map_err(|source| AppError::InputScript {
        path: path.to_path_buf(),
        source,
    })
}
