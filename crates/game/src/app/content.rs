use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{Vec2, WorldAabb};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use super::gameplay::dialogue::{validate_segments, DialogueSegment, DEFAULT_TYPING_INTERVAL_SECONDS};
use super::gameplay::effects::{
    CombinationRecipe, EffectKind, RecipeBook, DEFAULT_EFFECT_DURATION_SECONDS,
};
use super::gameplay::light_switch::LightTiming;
use super::gameplay::parallax::ParallaxLayerDef;
use super::gameplay::patrol::PatrolTuning;
use super::gameplay::player::DEFAULT_PLAYER_SPEED;

#[derive(Debug, Error)]
pub(crate) enum ContentError {
    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse '{}' at {json_path}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed in '{}' at {field}: {message}", .path.display())]
    Validation {
        path: PathBuf,
        field: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LevelConfig {
    pub(crate) name: String,
    pub(crate) player: PlayerConfig,
    #[serde(default = "default_typing_interval")]
    pub(crate) typing_interval: f32,
    #[serde(default)]
    pub(crate) parallax_layers: Vec<ParallaxLayerDef>,
    #[serde(default)]
    pub(crate) obstacles: Vec<WorldAabb>,
    #[serde(default)]
    pub(crate) patrol_enemies: Vec<PatrolEnemyConfig>,
    #[serde(default)]
    pub(crate) light_enemies: Vec<LightEnemyConfig>,
    #[serde(default)]
    pub(crate) word_pickups: Vec<WordPickupDef>,
    #[serde(default)]
    pub(crate) dialogue_triggers: Vec<DialogueTriggerDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PlayerConfig {
    pub(crate) spawn: Vec2,
    #[serde(default = "default_player_speed")]
    pub(crate) move_speed: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PatrolEnemyConfig {
    pub(crate) name: String,
    pub(crate) start: Vec2,
    #[serde(default)]
    pub(crate) facing_degrees: f32,
    pub(crate) waypoints: Vec<Vec2>,
    #[serde(default)]
    pub(crate) tuning: PatrolTuning,
    #[serde(default = "default_recipes")]
    pub(crate) recipes: Vec<CombinationRecipeDef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LightEnemyConfig {
    pub(crate) name: String,
    pub(crate) position: Vec2,
    #[serde(default)]
    pub(crate) timing: LightTiming,
    #[serde(default = "default_recipes")]
    pub(crate) recipes: Vec<CombinationRecipeDef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CombinationRecipeDef {
    pub(crate) words: [String; 2],
    pub(crate) effect: String,
    #[serde(default = "default_effect_duration")]
    pub(crate) duration_seconds: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct WordPickupDef {
    pub(crate) word: String,
    pub(crate) position: Vec2,
    #[serde(default = "default_pickup_radius")]
    pub(crate) radius: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DialogueTriggerDef {
    pub(crate) script: String,
    pub(crate) position: Vec2,
    #[serde(default = "default_trigger_radius")]
    pub(crate) radius: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DialogueScript {
    pub(crate) segments: Vec<DialogueSegment>,
}

fn default_typing_interval() -> f32 {
    DEFAULT_TYPING_INTERVAL_SECONDS
}

fn default_player_speed() -> f32 {
    DEFAULT_PLAYER_SPEED
}

fn default_effect_duration() -> f32 {
    DEFAULT_EFFECT_DURATION_SECONDS
}

fn default_pickup_radius() -> f32 {
    0.5
}

fn default_trigger_radius() -> f32 {
    1.0
}

pub(crate) fn default_recipes() -> Vec<CombinationRecipeDef> {
    vec![
        CombinationRecipeDef {
            words: ["Mist".to_string(), "Lull".to_string()],
            effect: EffectKind::Invisibility.name().to_string(),
            duration_seconds: DEFAULT_EFFECT_DURATION_SECONDS,
        },
        CombinationRecipeDef {
            words: ["Lull".to_string(), "Drift".to_string()],
            effect: EffectKind::Sleep.name().to_string(),
            duration_seconds: DEFAULT_EFFECT_DURATION_SECONDS,
        },
    ]
}

pub(crate) fn recipe_book(recipes: &[CombinationRecipeDef]) -> RecipeBook {
    let mut book = RecipeBook::default();
    for recipe in recipes {
        book.insert(
            &recipe.words[0],
            &recipe.words[1],
            CombinationRecipe {
                effect: recipe.effect.clone(),
                duration_seconds: recipe.duration_seconds,
            },
        );
    }
    book
}

pub(crate) fn load_level(path: &Path) -> Result<LevelConfig, ContentError> {
    let raw = read_file(path)?;
    parse_level(path, &raw)
}

pub(crate) fn parse_level(path: &Path, raw: &str) -> Result<LevelConfig, ContentError> {
    let level: LevelConfig = parse_json(path, raw)?;
    validate_level(&level).map_err(|(field, message)| ContentError::Validation {
        path: path.to_path_buf(),
        field,
        message,
    })?;
    Ok(level)
}

pub(crate) fn load_dialogue_script(path: &Path) -> Result<DialogueScript, ContentError> {
    let raw = read_file(path)?;
    parse_dialogue_script(path, &raw)
}

pub(crate) fn parse_dialogue_script(path: &Path, raw: &str) -> Result<DialogueScript, ContentError> {
    let script: DialogueScript = parse_json(path, raw)?;
    validate_segments(&script.segments).map_err(|error| ContentError::Validation {
        path: path.to_path_buf(),
        field: "segments".to_string(),
        message: error.to_string(),
    })?;
    Ok(script)
}

fn read_file(path: &Path) -> Result<String, ContentError> {
    fs::read_to_string(path).map_err(|source| ContentError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_json<T: DeserializeOwned>(path: &Path, raw: &str) -> Result<T, ContentError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, T>(&mut deserializer).map_err(|error| {
        let json_path = error.path().to_string();
        ContentError::Parse {
            path: path.to_path_buf(),
            json_path,
            source: error.into_inner(),
        }
    })
}

type FieldResult = Result<(), (String, String)>;

fn validation_err(field: impl Into<String>, message: impl Into<String>) -> FieldResult {
    Err((field.into(), message.into()))
}

fn expected_actual(field: impl Into<String>, expected: impl Display, actual: impl Display) -> FieldResult {
    validation_err(field, format!("expected {expected}, got {actual}"))
}

fn require_positive(field: String, value: f32) -> FieldResult {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        expected_actual(field, "positive number", value)
    }
}

fn require_non_negative(field: String, value: f32) -> FieldResult {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        expected_actual(field, "non-negative number", value)
    }
}

fn require_finite(field: String, value: Vec2) -> FieldResult {
    if value.x.is_finite() && value.y.is_finite() {
        Ok(())
    } else {
        expected_actual(field, "finite position", format!("{value:?}"))
    }
}

fn validate_level(level: &LevelConfig) -> FieldResult {
    if level.name.trim().is_empty() {
        return validation_err("name", "level name must not be empty");
    }
    require_finite("player.spawn".to_string(), level.player.spawn)?;
    require_non_negative("player.move_speed".to_string(), level.player.move_speed)?;
    require_positive("typing_interval".to_string(), level.typing_interval)?;

    for (index, layer) in level.parallax_layers.iter().enumerate() {
        require_non_negative(format!("parallax_layers[{index}].size.x"), layer.size.x)?;
        require_non_negative(format!("parallax_layers[{index}].size.y"), layer.size.y)?;
        if !layer.parallax_effect.is_finite() {
            return expected_actual(
                format!("parallax_layers[{index}].parallax_effect"),
                "finite number",
                layer.parallax_effect,
            );
        }
    }

    for (index, obstacle) in level.obstacles.iter().enumerate() {
        if obstacle.min.x > obstacle.max.x || obstacle.min.y > obstacle.max.y {
            return validation_err(format!("obstacles[{index}]"), "min must not exceed max");
        }
    }

    for (index, enemy) in level.patrol_enemies.iter().enumerate() {
        let prefix = format!("patrol_enemies[{index}]");
        if enemy.waypoints.is_empty() {
            return validation_err(
                format!("{prefix}.waypoints"),
                "patrol route needs at least one waypoint",
            );
        }
        require_finite(format!("{prefix}.start"), enemy.start)?;
        let tuning = &enemy.tuning;
        require_non_negative(format!("{prefix}.tuning.move_speed"), tuning.move_speed)?;
        require_non_negative(format!("{prefix}.tuning.wait_time"), tuning.wait_time)?;
        require_positive(format!("{prefix}.tuning.vision_distance"), tuning.vision_distance)?;
        for (field, angle) in [
            ("vision_angle", tuning.vision_angle),
            ("vision_angle_idle", tuning.vision_angle_idle),
        ] {
            if !(0.0..=360.0).contains(&angle) {
                return expected_actual(
                    format!("{prefix}.tuning.{field}"),
                    "angle within 0..=360 degrees",
                    angle,
                );
            }
        }
        if tuning.segments == 0 {
            return expected_actual(format!("{prefix}.tuning.segments"), "at least 1", 0);
        }
        validate_recipes(&prefix, &enemy.recipes)?;
    }

    for (index, enemy) in level.light_enemies.iter().enumerate() {
        let prefix = format!("light_enemies[{index}]");
        require_finite(format!("{prefix}.position"), enemy.position)?;
        require_positive(format!("{prefix}.timing.green_duration"), enemy.timing.green_duration)?;
        require_positive(format!("{prefix}.timing.red_duration"), enemy.timing.red_duration)?;
        require_non_negative(format!("{prefix}.timing.sight_distance"), enemy.timing.sight_distance)?;
        validate_recipes(&prefix, &enemy.recipes)?;
    }

    for (index, pickup) in level.word_pickups.iter().enumerate() {
        if pickup.word.trim().is_empty() {
            return validation_err(format!("word_pickups[{index}].word"), "word must not be empty");
        }
        require_non_negative(format!("word_pickups[{index}].radius"), pickup.radius)?;
    }

    for (index, trigger) in level.dialogue_triggers.iter().enumerate() {
        if trigger.script.trim().is_empty() {
            return validation_err(
                format!("dialogue_triggers[{index}].script"),
                "script name must not be empty",
            );
        }
        require_non_negative(format!("dialogue_triggers[{index}].radius"), trigger.radius)?;
    }

    Ok(())
}

fn validate_recipes(prefix: &str, recipes: &[CombinationRecipeDef]) -> FieldResult {
    for (index, recipe) in recipes.iter().enumerate() {
        if recipe.words.iter().any(|word| word.trim().is_empty()) {
            return validation_err(
                format!("{prefix}.recipes[{index}].words"),
                "recipe words must not be empty",
            );
        }
        if recipe.effect.trim().is_empty() {
            return validation_err(
                format!("{prefix}.recipes[{index}].effect"),
                "effect name must not be empty",
            );
        }
        require_positive(
            format!("{prefix}.recipes[{index}].duration_seconds"),
            recipe.duration_seconds,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::gameplay::words::combination_key;
    use serde_json::json;

    fn minimal_level() -> serde_json::Value {
        json!({
            "name": "test",
            "player": { "spawn": { "x": 0.0, "y": 0.0 } }
        })
    }

    fn parse(value: serde_json::Value) -> Result<LevelConfig, ContentError> {
        parse_level(Path::new("level.json"), &value.to_string())
    }

    #[test]
    fn minimal_level_gets_default_tuning() {
        let mut value = minimal_level();
        value["patrol_enemies"] = json!([{
            "name": "guard",
            "start": { "x": 0.0, "y": 0.0 },
            "waypoints": [{ "x": 1.0, "y": 0.0 }]
        }]);
        value["light_enemies"] = json!([{ "name": "lamp", "position": { "x": 4.0, "y": 4.0 } }]);

        let level = parse(value).expect("level");
        assert_eq!(level.player.move_speed, DEFAULT_PLAYER_SPEED);
        assert_eq!(level.typing_interval, DEFAULT_TYPING_INTERVAL_SECONDS);
        let guard = &level.patrol_enemies[0];
        assert_eq!(guard.tuning, PatrolTuning::default());
        assert_eq!(guard.recipes, default_recipes());
        assert_eq!(level.light_enemies[0].timing, LightTiming::default());

        let book = recipe_book(&guard.recipes);
        assert_eq!(book.len(), 2);
        assert_eq!(
            book.get(&combination_key("Drift", "Lull"))
                .map(|recipe| recipe.effect.as_str()),
            Some("Sleep")
        );
    }

    #[test]
    fn unknown_recipe_effect_still_loads() {
        let mut value = minimal_level();
        value["patrol_enemies"] = json!([{
            "name": "odd_guard",
            "start": { "x": 0.0, "y": 0.0 },
            "waypoints": [{ "x": 1.0, "y": 0.0 }],
            "recipes": [{ "words": ["Star", "Water"], "effect": "Levitate" }]
        }]);
        let level = parse(value).expect("level with unknown effect name");
        let recipe = &level.patrol_enemies[0].recipes[0];
        assert_eq!(recipe.effect, "Levitate");
        assert_eq!(recipe.duration_seconds, DEFAULT_EFFECT_DURATION_SECONDS);
    }

    #[test]
    fn parse_errors_report_json_path() {
        let mut value = minimal_level();
        value["patrol_enemies"] = json!([{
            "name": "guard",
            "start": { "x": 0.0, "y": 0.0 },
            "waypoints": [{ "x": "far", "y": 0.0 }]
        }]);
        let error = parse(value).expect_err("bad waypoint");
        match error {
            ContentError::Parse { json_path, .. } => {
                assert_eq!(json_path, "patrol_enemies[0].waypoints[0].x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut value = minimal_level();
        value["player"]["jump_height"] = json!(3.0);
        assert!(matches!(parse(value), Err(ContentError::Parse { .. })));
    }

    #[test]
    fn validation_rejects_empty_route_and_zero_durations() {
        let mut value = minimal_level();
        value["patrol_enemies"] = json!([{
            "name": "guard",
            "start": { "x": 0.0, "y": 0.0 },
            "waypoints": []
        }]);
        match parse(value).expect_err("empty route") {
            ContentError::Validation { field, .. } => {
                assert_eq!(field, "patrol_enemies[0].waypoints");
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut value = minimal_level();
        value["light_enemies"] = json!([{
            "name": "lamp",
            "position": { "x": 0.0, "y": 0.0 },
            "timing": { "red_duration": 0.0 }
        }]);
        let error = parse(value).expect_err("zero red duration");
        assert!(
            error.to_string().contains("light_enemies[0].timing.red_duration"),
            "{error}"
        );
    }

    #[test]
    fn dialogue_script_rejects_empty_segments() {
        let error = parse_dialogue_script(Path::new("intro.json"), r#"{ "segments": [] }"#)
            .expect_err("empty script");
        assert!(matches!(error, ContentError::Validation { .. }));
    }

    #[test]
    fn level_and_script_load_from_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let level_path = temp.path().join("demo.json");
        fs::write(&level_path, minimal_level().to_string()).expect("write level");
        let script_path = temp.path().join("intro.json");
        fs::write(
            &script_path,
            json!({ "segments": [{ "speaker": "Cat", "text": "Hi" }] }).to_string(),
        )
        .expect("write script");

        assert_eq!(load_level(&level_path).expect("level").name, "test");
        assert_eq!(
            load_dialogue_script(&script_path).expect("script").segments.len(),
            1
        );
        assert!(matches!(
            load_level(&temp.path().join("missing.json")),
            Err(ContentError::Io { .. })
        ));
    }
}
