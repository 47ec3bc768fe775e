use std::collections::HashMap;
use std::path::Path;

use engine::{InputAction, InputSnapshot, Scene, SceneCommand, SceneWorld, Vec2};
use serde_json::json;

use super::dialogue::{DialogueSegment, DialogueState};
use super::light_switch::LightState;
use super::patrol::PatrolPhase;
use super::scene::{LevelAssets, StealthScene, STEALTH_SYSTEM_ORDER, STEALTH_SYSTEM_ORDER_TEXT};
use crate::app::content::parse_level;

const DT: f32 = 1.0 / 60.0;

fn level_assets(level: serde_json::Value) -> LevelAssets {
    LevelAssets {
        level: parse_level(Path::new("test_level.json"), &level.to_string()).expect("level"),
        dialogue: HashMap::new(),
    }
}

fn loaded_scene(assets: LevelAssets) -> (StealthScene, SceneWorld) {
    let mut scene = StealthScene::new(assets);
    let mut world = SceneWorld::default();
    scene.load(&mut world);
    (scene, world)
}

fn step(scene: &mut StealthScene, world: &mut SceneWorld, input: &InputSnapshot) -> SceneCommand {
    let command = scene.update(DT, input, world);
    world.apply_pending();
    scene.render(world);
    command
}

fn holding(action: InputAction) -> InputSnapshot {
    InputSnapshot::empty().with_action_down(action, true)
}

fn assert_vec2_close(actual: Vec2, expected: Vec2) {
    assert!(
        actual.distance(expected) < 1.0e-3,
        "expected {expected:?}, got {actual:?}"
    );
}

fn guard_walking_toward_player() -> serde_json::Value {
    json!({
        "name": "sleepy_guard",
        "player": { "spawn": { "x": 0.0, "y": 0.0 } },
        "patrol_enemies": [{
            "name": "guard",
            "start": { "x": 6.0, "y": 0.0 },
            "facing_degrees": 180.0,
            "waypoints": [{ "x": -10.0, "y": 0.0 }]
        }],
        "word_pickups": [
            { "word": "Lull", "position": { "x": 0.0, "y": 0.0 } },
            { "word": "Drift", "position": { "x": 0.0, "y": 0.0 } }
        ]
    })
}

#[test]
fn stealth_system_order_is_stable_and_expected_names() {
    let names: Vec<&'static str> = STEALTH_SYSTEM_ORDER
        .iter()
        .map(|system_id| system_id.name())
        .collect();
    assert_eq!(names.join(">"), STEALTH_SYSTEM_ORDER_TEXT);
    assert_eq!(names.first(), Some(&"Input"));
    assert_eq!(names.last(), Some(&"Camera"));
}

#[test]
fn load_spawns_level_entities_and_publishes_view() {
    let (scene, world) = loaded_scene(level_assets(json!({
        "name": "layout",
        "player": { "spawn": { "x": 1.0, "y": 2.0 } },
        "obstacles": [{ "min": { "x": 3.0, "y": 3.0 }, "max": { "x": 4.0, "y": 4.0 } }],
        "parallax_layers": [{
            "name": "sky",
            "size": { "x": 20.0, "y": 10.0 },
            "parallax_effect": 1.0
        }],
        "patrol_enemies": [{
            "name": "guard",
            "start": { "x": 8.0, "y": 8.0 },
            "waypoints": [{ "x": 8.0, "y": 12.0 }]
        }],
        "light_enemies": [{ "name": "lamp", "position": { "x": -8.0, "y": 0.0 } }],
        "word_pickups": [{ "word": "Mist", "position": { "x": 5.0, "y": -5.0 } }]
    })));

    assert_eq!(world.entity_count(), 4);
    assert_eq!(world.colliders().len(), 1);
    assert_eq!(scene.system_order_text(), STEALTH_SYSTEM_ORDER_TEXT);
    assert_eq!(scene.debug_title(&world).as_deref(), Some("stealth: layout"));

    let view = scene.view();
    assert_eq!(view.player_position, Vec2::new(1.0, 2.0));
    assert_eq!(view.camera_position, Vec2::new(1.0, 2.0));
    assert_eq!(view.vision_cones.len(), 1);
    assert_eq!(view.vision_cones[0].mesh.triangles.len(), 20);
    assert_eq!(view.lights.len(), 1);
    assert_eq!(view.lights[0].state, LightState::Green);
    assert_eq!(view.parallax.len(), 1);
    assert!(!view.word_panel.open);
}

#[test]
fn camera_and_parallax_follow_the_player() {
    let (mut scene, mut world) = loaded_scene(level_assets(json!({
        "name": "scroll",
        "player": { "spawn": { "x": 0.0, "y": 0.0 }, "move_speed": 6.0 },
        "parallax_layers": [{
            "name": "hills",
            "size": { "x": 50.0, "y": 10.0 },
            "parallax_effect": 0.5
        }]
    })));

    for _ in 0..60 {
        step(&mut scene, &mut world, &holding(InputAction::MoveRight));
    }
    let view = scene.view();
    assert_vec2_close(view.player_position, Vec2::new(6.0, 0.0));
    assert_vec2_close(view.camera_position, view.player_position);
    let (name, hills) = &view.parallax[0];
    assert_eq!(name, "hills");
    assert!(hills.x > 2.5 && hills.x < 3.0, "{hills:?}");
}

#[test]
fn word_pickup_collects_once_and_despawns() {
    let (mut scene, mut world) = loaded_scene(level_assets(json!({
        "name": "pickup",
        "player": { "spawn": { "x": 0.0, "y": 0.0 } },
        "word_pickups": [{ "word": "Mist", "position": { "x": 1.0, "y": 0.0 }, "radius": 0.5 }]
    })));
    assert_eq!(world.entity_count(), 2);

    for _ in 0..30 {
        step(&mut scene, &mut world, &holding(InputAction::MoveRight));
    }
    assert_eq!(world.entity_count(), 1);
    assert_eq!(
        scene.view().word_panel.words,
        vec![("Mist".to_string(), 1)]
    );
}

#[test]
fn dialogue_trigger_freezes_player_until_session_ends() {
    let mut assets = level_assets(json!({
        "name": "talk",
        "player": { "spawn": { "x": 0.0, "y": 0.0 } },
        "dialogue_triggers": [{ "script": "intro", "position": { "x": 0.0, "y": 0.0 } }]
    }));
    assets.dialogue.insert(
        "intro".to_string(),
        vec![
            DialogueSegment::line("Cat", "Hi"),
            DialogueSegment::line("Cat", "Go"),
        ],
    );
    let (mut scene, mut world) = loaded_scene(assets);

    step(&mut scene, &mut world, &holding(InputAction::MoveRight));
    assert_eq!(scene.dialogue_state(), DialogueState::Typing);
    assert_eq!(scene.view().dialogue.speaker, "Cat");
    let frozen_at = scene.view().player_position;

    step(&mut scene, &mut world, &holding(InputAction::MoveRight));
    assert_eq!(scene.view().player_position, frozen_at);

    let advance = InputSnapshot::empty().with_advance_pressed(true);
    step(&mut scene, &mut world, &advance);
    assert_eq!(scene.view().dialogue.visible_text, "Hi");
    step(&mut scene, &mut world, &advance);
    assert_eq!(scene.view().dialogue.visible_text, "G");
    step(&mut scene, &mut world, &advance);
    step(&mut scene, &mut world, &advance);
    assert_eq!(scene.dialogue_state(), DialogueState::Ended);
    assert_eq!(scene.view().player_position, frozen_at);

    step(&mut scene, &mut world, &holding(InputAction::MoveRight));
    assert!(scene.view().player_position.x > frozen_at.x);
    assert_eq!(scene.dialogue_state(), DialogueState::Ended);
}

#[test]
fn dialogue_trigger_with_unknown_script_stays_inert() {
    let (mut scene, mut world) = loaded_scene(level_assets(json!({
        "name": "silent",
        "player": { "spawn": { "x": 0.0, "y": 0.0 } },
        "dialogue_triggers": [{ "script": "missing", "position": { "x": 0.0, "y": 0.0 } }]
    })));
    step(&mut scene, &mut world, &InputSnapshot::empty());
    assert_eq!(scene.dialogue_state(), DialogueState::Idle);
}

#[test]
fn patrol_detection_requests_restart_and_reload_resets_level() {
    let (mut scene, mut world) = loaded_scene(level_assets(json!({
        "name": "spotted",
        "player": { "spawn": { "x": 2.0, "y": 0.0 } },
        "patrol_enemies": [{
            "name": "guard",
            "start": { "x": 0.0, "y": 0.0 },
            "waypoints": [{ "x": 10.0, "y": 0.0 }]
        }]
    })));

    let command = step(&mut scene, &mut world, &InputSnapshot::empty());
    assert_eq!(command, SceneCommand::RestartLevel);
    assert_eq!(scene.patrol_phases(), vec![PatrolPhase::Alerted]);

    scene.unload(&mut world);
    world.clear();
    scene.load(&mut world);
    assert_eq!(scene.patrol_phases(), vec![PatrolPhase::Moving]);
    assert_eq!(world.entity_count(), 2);
    assert_eq!(scene.view().player_position, Vec2::new(2.0, 0.0));
}

#[test]
fn obstacle_between_guard_and_player_prevents_detection() {
    let (mut scene, mut world) = loaded_scene(level_assets(json!({
        "name": "hidden",
        "player": { "spawn": { "x": 3.0, "y": 0.0 } },
        "obstacles": [{ "min": { "x": 1.0, "y": -1.0 }, "max": { "x": 2.0, "y": 1.0 } }],
        "patrol_enemies": [{
            "name": "guard",
            "start": { "x": 0.0, "y": 0.0 },
            "waypoints": [{ "x": 0.0, "y": 0.0 }]
        }]
    })));

    for _ in 0..30 {
        let command = step(&mut scene, &mut world, &InputSnapshot::empty());
        assert_eq!(command, SceneCommand::None);
    }
}

#[test]
fn confirmed_sleep_combination_freezes_and_blinds_patrol() {
    let (mut scene, mut world) = loaded_scene(level_assets(guard_walking_toward_player()));

    let open_and_pick_first = InputSnapshot::empty()
        .with_toggle_word_panel_pressed(true)
        .with_choice_pressed(Some(0));
    assert_eq!(
        step(&mut scene, &mut world, &open_and_pick_first),
        SceneCommand::None
    );
    assert!(scene.view().word_panel.open);
    assert_eq!(scene.view().word_panel.pending, vec!["Drift".to_string()]);

    let pick_second = InputSnapshot::empty().with_choice_pressed(Some(1));
    step(&mut scene, &mut world, &pick_second);
    let confirm = InputSnapshot::empty().with_confirm_pressed(true);
    step(&mut scene, &mut world, &confirm);

    assert_eq!(scene.sleeping_enemy_count(), 1);
    let view = scene.view();
    assert!(!view.word_panel.open);
    assert!(view.word_panel.words.is_empty());
    assert!(view.vision_cones[0].mesh.is_empty());
    let asleep_at = view.vision_cones[0].pose.origin;

    for _ in 0..200 {
        assert_eq!(
            step(&mut scene, &mut world, &InputSnapshot::empty()),
            SceneCommand::None
        );
    }
    assert_eq!(scene.view().vision_cones[0].pose.origin, asleep_at);

    let mut restarted = false;
    for _ in 0..400 {
        if step(&mut scene, &mut world, &InputSnapshot::empty()) == SceneCommand::RestartLevel {
            restarted = true;
            break;
        }
    }
    assert!(restarted, "guard should wake up and spot the player");
    assert_eq!(scene.sleeping_enemy_count(), 0);
}

#[test]
fn closing_word_panel_returns_pending_words() {
    let (mut scene, mut world) = loaded_scene(level_assets(guard_walking_toward_player()));
    let open_and_pick = InputSnapshot::empty()
        .with_toggle_word_panel_pressed(true)
        .with_choice_pressed(Some(1));
    step(&mut scene, &mut world, &open_and_pick);
    assert_eq!(scene.view().word_panel.pending, vec!["Lull".to_string()]);

    let close = InputSnapshot::empty().with_toggle_word_panel_pressed(true);
    step(&mut scene, &mut world, &close);
    let panel = &scene.view().word_panel;
    assert!(!panel.open);
    assert!(panel.pending.is_empty());
    assert_eq!(panel.words.len(), 2);
}

#[test]
fn red_light_spots_player_in_the_open() {
    let (mut scene, mut world) = loaded_scene(level_assets(json!({
        "name": "lights",
        "player": { "spawn": { "x": 3.0, "y": 0.0 } },
        "light_enemies": [{
            "name": "lamp",
            "position": { "x": 0.0, "y": 0.0 },
            "timing": { "green_duration": 0.5, "red_duration": 1.0 }
        }]
    })));

    let mut ticks_until_restart = None;
    for tick in 1..=120 {
        if step(&mut scene, &mut world, &InputSnapshot::empty()) == SceneCommand::RestartLevel {
            ticks_until_restart = Some(tick);
            break;
        }
        assert_eq!(scene.view().lights[0].state, LightState::Green);
    }
    let ticks = ticks_until_restart.expect("red light should detect the player");
    assert!((29..=31).contains(&ticks), "detected at tick {ticks}");
}

#[test]
fn unknown_recipe_effect_leaves_other_enemies_affected() {
    let (mut scene, mut world) = loaded_scene(level_assets(json!({
        "name": "mixed_recipes",
        "player": { "spawn": { "x": 0.0, "y": 0.0 } },
        "patrol_enemies": [
            {
                "name": "floater",
                "start": { "x": 20.0, "y": 20.0 },
                "waypoints": [{ "x": 20.0, "y": 24.0 }],
                "recipes": [{ "words": ["Lull", "Drift"], "effect": "Levitate" }]
            },
            {
                "name": "sleeper",
                "start": { "x": -20.0, "y": 20.0 },
                "waypoints": [{ "x": -20.0, "y": 24.0 }]
            }
        ],
        "word_pickups": [
            { "word": "Lull", "position": { "x": 0.0, "y": 0.0 } },
            { "word": "Drift", "position": { "x": 0.0, "y": 0.0 } }
        ]
    })));

    let open_and_pick_first = InputSnapshot::empty()
        .with_toggle_word_panel_pressed(true)
        .with_choice_pressed(Some(0));
    step(&mut scene, &mut world, &open_and_pick_first);
    step(&mut scene, &mut world, &InputSnapshot::empty().with_choice_pressed(Some(1)));
    let command = step(&mut scene, &mut world, &InputSnapshot::empty().with_confirm_pressed(true));

    assert_eq!(command, SceneCommand::None);
    assert_eq!(scene.sleeping_enemy_count(), 1);
    assert!(scene.view().word_panel.words.is_empty());
}

fn talking_level(segments: Vec<DialogueSegment>) -> (StealthScene, SceneWorld) {
    let mut assets = level_assets(json!({
        "name": "talk",
        "player": { "spawn": { "x": 0.0, "y": 0.0 } },
        "dialogue_triggers": [{ "script": "intro", "position": { "x": 0.0, "y": 0.0 } }]
    }));
    assets.dialogue.insert("intro".to_string(), segments);
    loaded_scene(assets)
}

#[test]
fn skip_reveals_the_whole_line_at_once() {
    let (mut scene, mut world) = talking_level(vec![
        DialogueSegment::line("Cat", "Hello there"),
        DialogueSegment::line("Dog", "Bye"),
    ]);
    step(&mut scene, &mut world, &InputSnapshot::empty());
    assert_eq!(scene.dialogue_state(), DialogueState::Typing);
    assert_ne!(scene.view().dialogue.visible_text, "Hello there");

    step(&mut scene, &mut world, &InputSnapshot::empty().with_skip_pressed(true));
    assert_eq!(scene.dialogue_state(), DialogueState::AwaitingAdvance);
    assert_eq!(scene.view().dialogue.visible_text, "Hello there");

    // Skip has nothing left to do once the line is complete.
    step(&mut scene, &mut world, &InputSnapshot::empty().with_skip_pressed(true));
    assert_eq!(scene.dialogue_state(), DialogueState::AwaitingAdvance);
    assert_eq!(scene.view().dialogue.speaker, "Cat");
}

#[test]
fn skip_and_advance_on_one_tick_only_finish_the_line() {
    let (mut scene, mut world) = talking_level(vec![
        DialogueSegment::line("Cat", "Hello there"),
        DialogueSegment::line("Dog", "Bye"),
    ]);
    step(&mut scene, &mut world, &InputSnapshot::empty());
    assert_eq!(scene.dialogue_state(), DialogueState::Typing);

    let both = InputSnapshot::empty()
        .with_skip_pressed(true)
        .with_advance_pressed(true);
    step(&mut scene, &mut world, &both);
    assert_eq!(scene.dialogue_state(), DialogueState::AwaitingAdvance);
    assert_eq!(scene.view().dialogue.speaker, "Cat");
    assert_eq!(scene.view().dialogue.visible_text, "Hello there");

    step(&mut scene, &mut world, &both);
    assert_eq!(scene.view().dialogue.speaker, "Dog");
}

#[test]
fn cancel_only_clears_pending_words_while_panel_is_open() {
    let (mut scene, mut world) = loaded_scene(level_assets(guard_walking_toward_player()));
    let cancel = InputSnapshot::empty().with_cancel_pressed(true);
    step(&mut scene, &mut world, &cancel);
    assert!(!scene.view().word_panel.open);
    assert_eq!(scene.view().word_panel.words.len(), 2);

    let open_and_pick = InputSnapshot::empty()
        .with_toggle_word_panel_pressed(true)
        .with_choice_pressed(Some(0));
    step(&mut scene, &mut world, &open_and_pick);
    step(&mut scene, &mut world, &cancel);
    let panel = &scene.view().word_panel;
    assert!(panel.open);
    assert!(panel.pending.is_empty());
    assert_eq!(panel.words.len(), 2);
}
