use std::collections::{BTreeMap, HashMap};

use engine::{
    EntityId, InputSnapshot, LayerMask, RenderableDesc, Scene, SceneCommand, SceneWorld,
    Transform, Vec2,
};
use tracing::{debug, error, info, trace, warn};

use super::detection::{check_target, DetectionCheck, VisionPose};
use super::dialogue::{DialogueEvent, DialogueRunner, DialogueSegment, DialogueState, DialogueView};
use super::effects::{EffectKind, EffectOutcome, EffectScheduler};
use super::light_switch::{LightState, LightTick, TimedLightSwitch};
use super::parallax::ParallaxLayer;
use super::patrol::{PatrolStateMachine, PatrolTransition};
use super::player::PlayerMotor;
use super::vision_cone::VisionMesh;
use super::words::CombinationPanel;
use crate::app::content::{recipe_book, LevelConfig};

pub(crate) const STEALTH_SYSTEM_ORDER_TEXT: &str =
    "Input>Dialogue>Player>Triggers>Words>Effects>Patrol>LightSwitch>Detection>Parallax>Camera";
pub(crate) const OBSTACLE_MASK: LayerMask = LayerMask::OBSTACLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StealthSystemId {
    Input,
    Dialogue,
    Player,
    Triggers,
    Words,
    Effects,
    Patrol,
    LightSwitch,
    Detection,
    Parallax,
    Camera,
}

impl StealthSystemId {
    #[cfg(test)]
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Dialogue => "Dialogue",
            Self::Player => "Player",
            Self::Triggers => "Triggers",
            Self::Words => "Words",
            Self::Effects => "Effects",
            Self::Patrol => "Patrol",
            Self::LightSwitch => "LightSwitch",
            Self::Detection => "Detection",
            Self::Parallax => "Parallax",
            Self::Camera => "Camera",
        }
    }
}

pub(crate) const STEALTH_SYSTEM_ORDER: [StealthSystemId; 11] = [
    StealthSystemId::Input,
    StealthSystemId::Dialogue,
    StealthSystemId::Player,
    StealthSystemId::Triggers,
    StealthSystemId::Words,
    StealthSystemId::Effects,
    StealthSystemId::Patrol,
    StealthSystemId::LightSwitch,
    StealthSystemId::Detection,
    StealthSystemId::Parallax,
    StealthSystemId::Camera,
];

/// Read-only content a level is (re)built from.
#[derive(Debug, Clone)]
pub(crate) struct LevelAssets {
    pub(crate) level: LevelConfig,
    pub(crate) dialogue: HashMap<String, Vec<DialogueSegment>>,
}

#[derive(Debug, Clone)]
struct PatrolEnemy {
    name: String,
    machine: PatrolStateMachine,
    effects: EffectScheduler,
}

#[derive(Debug, Clone)]
struct LightEnemy {
    name: String,
    light: TimedLightSwitch,
    effects: EffectScheduler,
}

#[derive(Debug, Clone)]
struct WordPickup {
    entity_id: EntityId,
    word: String,
    position: Vec2,
    radius: f32,
}

#[derive(Debug, Clone)]
struct DialogueTrigger {
    script: String,
    position: Vec2,
    radius: f32,
    fired: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct WordPanelView {
    pub(crate) open: bool,
    pub(crate) words: Vec<(String, u32)>,
    pub(crate) pending: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ConeView {
    pub(crate) enemy_id: EntityId,
    pub(crate) pose: VisionPose,
    pub(crate) mesh: VisionMesh,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LightView {
    pub(crate) enemy_id: EntityId,
    pub(crate) position: Vec2,
    pub(crate) state: LightState,
}

/// Everything a presentation layer needs after a tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StealthView {
    pub(crate) player_position: Vec2,
    pub(crate) camera_position: Vec2,
    pub(crate) dialogue: DialogueView,
    pub(crate) word_panel: WordPanelView,
    pub(crate) vision_cones: Vec<ConeView>,
    pub(crate) lights: Vec<LightView>,
    pub(crate) parallax: Vec<(String, Vec2)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialogueAction {
    Skip,
    Advance,
}

/// Edge presses resolved to the system that consumes them this tick.
#[derive(Debug, Clone, Copy, Default)]
struct RoutedInput {
    answer_choice: Option<usize>,
    word_choice: Option<usize>,
    dialogue_action: Option<DialogueAction>,
}

struct TickContext<'a> {
    fixed_dt_seconds: f32,
    input: &'a InputSnapshot,
    routed: RoutedInput,
    detected_by: Option<String>,
}

pub(crate) struct StealthScene {
    assets: LevelAssets,
    player_id: Option<EntityId>,
    player: PlayerMotor,
    patrol_enemies: BTreeMap<EntityId, PatrolEnemy>,
    light_enemies: BTreeMap<EntityId, LightEnemy>,
    pickups: Vec<WordPickup>,
    triggers: Vec<DialogueTrigger>,
    dialogue: DialogueRunner,
    words: CombinationPanel,
    parallax: Vec<ParallaxLayer>,
    system_order_text: String,
    view: StealthView,
}

impl StealthScene {
    pub(crate) fn new(assets: LevelAssets) -> Self {
        let player = PlayerMotor::new(assets.level.player.spawn, assets.level.player.move_speed);
        let dialogue = DialogueRunner::new(assets.level.typing_interval);
        Self {
            assets,
            player_id: None,
            player,
            patrol_enemies: BTreeMap::new(),
            light_enemies: BTreeMap::new(),
            pickups: Vec::new(),
            triggers: Vec::new(),
            dialogue,
            words: CombinationPanel::default(),
            parallax: Vec::new(),
            system_order_text: String::new(),
            view: StealthView::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn view(&self) -> &StealthView {
        &self.view
    }

    #[cfg(test)]
    pub(crate) fn system_order_text(&self) -> &str {
        &self.system_order_text
    }

    fn reset_state(&mut self) {
        let level = &self.assets.level;
        self.player_id = None;
        self.player = PlayerMotor::new(level.player.spawn, level.player.move_speed);
        self.patrol_enemies.clear();
        self.light_enemies.clear();
        self.pickups.clear();
        self.triggers.clear();
        self.dialogue = DialogueRunner::new(level.typing_interval);
        self.words = CombinationPanel::default();
        self.parallax.clear();
        self.view = StealthView::default();
    }

    fn spawn_level(&mut self, world: &mut SceneWorld) {
        let level = &self.assets.level;

        for obstacle in &level.obstacles {
            world.colliders_mut().insert(*obstacle, OBSTACLE_MASK);
        }

        self.player_id = Some(world.spawn(
            Transform {
                position: level.player.spawn,
                rotation_radians: None,
            },
            RenderableDesc {
                debug_name: "player",
            },
        ));

        for enemy in &level.patrol_enemies {
            let facing = enemy.facing_degrees.to_radians();
            let machine = match PatrolStateMachine::new(
                enemy.tuning,
                enemy.waypoints.clone(),
                enemy.start,
                facing,
            ) {
                Ok(machine) => machine,
                Err(err) => {
                    error!(enemy = %enemy.name, error = %err, "patrol_enemy_inert");
                    continue;
                }
            };
            let entity_id = world.spawn(
                Transform {
                    position: enemy.start,
                    rotation_radians: Some(facing),
                },
                RenderableDesc {
                    debug_name: "patrol_enemy",
                },
            );
            self.patrol_enemies.insert(
                entity_id,
                PatrolEnemy {
                    name: enemy.name.clone(),
                    machine,
                    effects: EffectScheduler::new(entity_id, recipe_book(&enemy.recipes)),
                },
            );
        }

        for enemy in &level.light_enemies {
            let entity_id = world.spawn(
                Transform {
                    position: enemy.position,
                    rotation_radians: None,
                },
                RenderableDesc {
                    debug_name: "light_enemy",
                },
            );
            self.light_enemies.insert(
                entity_id,
                LightEnemy {
                    name: enemy.name.clone(),
                    light: TimedLightSwitch::new(enemy.timing, enemy.position),
                    effects: EffectScheduler::new(entity_id, recipe_book(&enemy.recipes)),
                },
            );
        }

        for pickup in &level.word_pickups {
            let entity_id = world.spawn(
                Transform {
                    position: pickup.position,
                    rotation_radians: None,
                },
                RenderableDesc {
                    debug_name: "word_pickup",
                },
            );
            self.pickups.push(WordPickup {
                entity_id,
                word: pickup.word.clone(),
                position: pickup.position,
                radius: pickup.radius,
            });
        }

        for trigger in &level.dialogue_triggers {
            if !self.assets.dialogue.contains_key(&trigger.script) {
                error!(script = %trigger.script, "dialogue_trigger_inert");
                continue;
            }
            self.triggers.push(DialogueTrigger {
                script: trigger.script.clone(),
                position: trigger.position,
                radius: trigger.radius,
                fired: false,
            });
        }

        self.parallax = level
            .parallax_layers
            .iter()
            .map(ParallaxLayer::from_def)
            .collect();

        world.camera_mut().position = level.player.spawn;
    }

    fn run_system(
        &mut self,
        system_id: StealthSystemId,
        context: &mut TickContext<'_>,
        world: &mut SceneWorld,
    ) {
        match system_id {
            StealthSystemId::Input => self.run_input_system(context),
            StealthSystemId::Dialogue => self.run_dialogue_system(context),
            StealthSystemId::Player => self.run_player_system(context, world),
            StealthSystemId::Triggers => self.run_trigger_system(),
            StealthSystemId::Words => self.run_word_system(context, world),
            StealthSystemId::Effects => self.run_effect_system(context),
            StealthSystemId::Patrol => self.run_patrol_system(context, world),
            StealthSystemId::LightSwitch => self.run_light_switch_system(context, world),
            StealthSystemId::Detection => self.run_detection_system(context, world),
            StealthSystemId::Parallax => {
                let camera = world.camera().position;
                for layer in &mut self.parallax {
                    layer.update(camera);
                }
            }
            StealthSystemId::Camera => {
                world.camera_mut().position = self.player.position();
            }
        }
    }

    /// Digits answer an open question, otherwise they pick words. Skip wins
    /// over advance while text is still typing so the completed line stays
    /// on screen for at least one tick.
    fn run_input_system(&self, context: &mut TickContext<'_>) {
        let input = context.input;
        let state = self.dialogue.state();
        let question_open = state == DialogueState::AwaitingAnswer;
        let dialogue_action = if !self.dialogue.is_active() {
            None
        } else if input.skip_pressed() && state == DialogueState::Typing {
            Some(DialogueAction::Skip)
        } else if input.advance_pressed() {
            Some(DialogueAction::Advance)
        } else {
            None
        };
        context.routed = RoutedInput {
            answer_choice: input.choice_pressed().filter(|_| question_open),
            word_choice: input.choice_pressed().filter(|_| !question_open),
            dialogue_action,
        };
    }

    fn run_dialogue_system(&mut self, context: &mut TickContext<'_>) {
        if !self.dialogue.is_active() {
            return;
        }
        let routed = context.routed;
        let mut events = Vec::new();

        if let Some(choice) = routed.answer_choice {
            match self.dialogue.select_answer(choice) {
                Ok(answer_events) => events.extend(answer_events),
                Err(err) => warn!(choice, error = %err, "dialogue_answer_rejected"),
            }
        }
        match routed.dialogue_action {
            Some(DialogueAction::Skip) => events.extend(self.dialogue.skip()),
            Some(DialogueAction::Advance) => events.extend(self.dialogue.advance()),
            None => {}
        }
        events.extend(self.dialogue.tick(context.fixed_dt_seconds));

        for event in events {
            match event {
                DialogueEvent::SessionEnded => info!("player_control_restored"),
                other => debug!(event = ?other, "dialogue_event"),
            }
        }
    }

    fn run_player_system(&mut self, context: &TickContext<'_>, world: &mut SceneWorld) {
        self.player.set_enabled(!self.dialogue.is_active());
        let position = self.player.step(
            context.input.axis(),
            context.fixed_dt_seconds,
            OBSTACLE_MASK,
            world.colliders(),
        );
        if let Some(entity) = self.player_id.and_then(|id| world.find_entity_mut(id)) {
            entity.transform.position = position;
        }
    }

    fn run_trigger_system(&mut self) {
        if self.dialogue.is_active() {
            return;
        }
        let player = self.player.position();
        let Some(trigger) = self
            .triggers
            .iter_mut()
            .find(|trigger| !trigger.fired && player.distance(trigger.position) <= trigger.radius)
        else {
            return;
        };
        trigger.fired = true;

        let Some(segments) = self.assets.dialogue.get(&trigger.script) else {
            error!(script = %trigger.script, "dialogue_script_missing");
            return;
        };
        match self.dialogue.start_session(segments) {
            Ok(_) => info!(script = %trigger.script, "dialogue_triggered"),
            Err(err) => error!(script = %trigger.script, error = %err, "dialogue_start_failed"),
        }
    }

    fn run_word_system(&mut self, context: &TickContext<'_>, world: &mut SceneWorld) {
        let player = self.player.position();
        let inventory = self.words.inventory_mut();
        self.pickups.retain(|pickup| {
            if player.distance(pickup.position) > pickup.radius {
                return true;
            }
            inventory.collect(&pickup.word);
            world.despawn(pickup.entity_id);
            false
        });

        if self.dialogue.is_active() {
            return;
        }
        let input = context.input;
        if input.toggle_word_panel_pressed() {
            self.words.toggle();
        }
        if !self.words.is_open() {
            return;
        }

        if let Some(index) = context.routed.word_choice {
            if let Err(err) = self.words.select_index(index) {
                debug!(index, error = %err, "word_selection_rejected");
            }
        }
        if let Some(slot) = input.remove_slot_pressed() {
            if let Err(err) = self.words.remove_slot(slot) {
                debug!(slot, error = %err, "word_removal_rejected");
            }
        }
        if input.cancel_pressed() {
            if let Err(err) = self.words.cancel() {
                debug!(error = %err, "combination_cancel_rejected");
            }
        }
        if input.confirm_pressed() {
            let targets = self
                .patrol_enemies
                .values_mut()
                .map(|enemy| &mut enemy.effects)
                .chain(self.light_enemies.values_mut().map(|enemy| &mut enemy.effects));
            match self.words.confirm(targets) {
                Ok(report) => {
                    let applied = report
                        .outcomes
                        .iter()
                        .filter(|(_, outcome)| matches!(outcome, EffectOutcome::Applied(_)))
                        .count();
                    info!(combination = %report.key, applied, "combination_dispatched");
                }
                Err(err) => debug!(error = %err, "combination_rejected"),
            }
        }
    }

    fn run_effect_system(&mut self, context: &TickContext<'_>) {
        let dt = context.fixed_dt_seconds;
        for enemy in self.patrol_enemies.values_mut() {
            let reverted = enemy.effects.tick(dt);
            if reverted.contains(&EffectKind::Sleep) {
                debug!(enemy = %enemy.name, "patrol_enemy_woke");
            }
        }
        for enemy in self.light_enemies.values_mut() {
            enemy.effects.tick(dt);
        }
    }

    fn run_patrol_system(&mut self, context: &TickContext<'_>, world: &mut SceneWorld) {
        for (entity_id, enemy) in &mut self.patrol_enemies {
            let hidden = enemy.effects.vision_hidden();
            if hidden && !enemy.machine.is_vision_hidden() {
                enemy.machine.hide_vision();
            } else if !hidden && enemy.machine.is_vision_hidden() {
                enemy.machine.restore_vision();
            }

            if !enemy.effects.movement_suppressed() {
                match enemy.machine.tick(context.fixed_dt_seconds) {
                    Some(PatrolTransition::Arrived { waypoint_index }) => {
                        debug!(enemy = %enemy.name, waypoint_index, "patrol_arrived");
                    }
                    Some(PatrolTransition::Departed { waypoint_index }) => {
                        debug!(enemy = %enemy.name, waypoint_index, "patrol_departed");
                    }
                    None => {}
                }
            }

            if let Some(entity) = world.find_entity_mut(*entity_id) {
                let pose = enemy.machine.pose();
                entity.transform.position = pose.origin;
                entity.transform.rotation_radians = Some(pose.facing_radians);
            }
        }
    }

    fn run_light_switch_system(&mut self, context: &mut TickContext<'_>, world: &SceneWorld) {
        let player = self.player.position();
        for enemy in self.light_enemies.values_mut() {
            let target = (!enemy.effects.detection_suppressed()).then_some(player);
            let tick = enemy.light.update(
                context.fixed_dt_seconds,
                target,
                OBSTACLE_MASK,
                world.colliders(),
            );
            if tick == LightTick::Detected && context.detected_by.is_none() {
                context.detected_by = Some(enemy.name.clone());
            }
        }
    }

    fn run_detection_system(&mut self, context: &mut TickContext<'_>, world: &SceneWorld) {
        let player = self.player.position();
        for enemy in self.patrol_enemies.values() {
            if context.detected_by.is_some() {
                return;
            }
            if enemy.effects.detection_suppressed() || enemy.machine.mesh().is_empty() {
                continue;
            }
            let check = check_target(
                enemy.machine.pose(),
                player,
                enemy.machine.cone_shape(),
                OBSTACLE_MASK,
                world.colliders(),
            );
            if let DetectionCheck::Visible { distance } = check {
                debug!(enemy = %enemy.name, distance, "patrol_enemy_sees_player");
                context.detected_by = Some(enemy.name.clone());
            }
        }
    }

    fn rebuild_view(&mut self, world: &SceneWorld) {
        let inventory = self.words.inventory();
        self.view = StealthView {
            player_position: self.player.position(),
            camera_position: world.camera().position,
            dialogue: self.dialogue.view(),
            word_panel: WordPanelView {
                open: self.words.is_open(),
                words: inventory
                    .words()
                    .map(|(word, count)| (word.to_string(), count))
                    .collect(),
                pending: inventory.pending().to_vec(),
            },
            vision_cones: self
                .patrol_enemies
                .iter()
                .map(|(entity_id, enemy)| ConeView {
                    enemy_id: *entity_id,
                    pose: enemy.machine.pose(),
                    mesh: enemy.machine.mesh().clone(),
                })
                .collect(),
            lights: self
                .light_enemies
                .iter()
                .map(|(entity_id, enemy)| LightView {
                    enemy_id: *entity_id,
                    position: enemy.light.position(),
                    state: enemy.light.state(),
                })
                .collect(),
            parallax: self
                .parallax
                .iter()
                .map(|layer| (layer.name().to_string(), layer.position()))
                .collect(),
        };
    }

    #[cfg(test)]
    pub(crate) fn patrol_phases(&self) -> Vec<super::patrol::PatrolPhase> {
        self.patrol_enemies
            .values()
            .map(|enemy| enemy.machine.phase())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn sleeping_enemy_count(&self) -> usize {
        self.patrol_enemies
            .values()
            .filter(|enemy| enemy.effects.is_active(EffectKind::Sleep))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn dialogue_state(&self) -> DialogueState {
        self.dialogue.state()
    }
}

impl Scene for StealthScene {
    fn load(&mut self, world: &mut SceneWorld) {
        self.reset_state();
        self.system_order_text = STEALTH_SYSTEM_ORDER_TEXT.to_string();
        self.spawn_level(world);
        world.apply_pending();
        self.rebuild_view(world);
        info!(
            level = %self.assets.level.name,
            patrol_enemies = self.patrol_enemies.len(),
            light_enemies = self.light_enemies.len(),
            word_pickups = self.pickups.len(),
            dialogue_triggers = self.triggers.len(),
            system_order = %self.system_order_text,
            "level_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        let mut context = TickContext {
            fixed_dt_seconds,
            input,
            routed: RoutedInput::default(),
            detected_by: None,
        };
        for system_id in STEALTH_SYSTEM_ORDER {
            self.run_system(system_id, &mut context, world);
        }

        if let Some(enemy) = context.detected_by {
            for patrol in self.patrol_enemies.values_mut() {
                patrol.machine.alert();
            }
            let player = self.player.position();
            warn!(enemy = %enemy, x = player.x, y = player.y, "player_detected");
            return SceneCommand::RestartLevel;
        }
        SceneCommand::None
    }

    fn render(&mut self, world: &SceneWorld) {
        self.rebuild_view(world);
        trace_view(&self.view);
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        for enemy in self.patrol_enemies.values_mut() {
            enemy.effects.reset();
        }
        for enemy in self.light_enemies.values_mut() {
            enemy.effects.reset();
        }
        self.dialogue.cancel();
        debug!(level = %self.assets.level.name, "level_unloaded");
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        Some(format!("stealth: {}", self.assets.level.name))
    }
}

fn trace_view(view: &StealthView) {
    trace!(
        x = view.player_position.x,
        y = view.player_position.y,
        camera_x = view.camera_position.x,
        camera_y = view.camera_position.y,
        "view_player"
    );
    if !view.dialogue.speaker.is_empty() {
        trace!(
            speaker = %view.dialogue.speaker,
            text = %view.dialogue.visible_text,
            answers = view.dialogue.answer_options.len(),
            "view_dialogue"
        );
    }
    if view.word_panel.open {
        trace!(
            words = ?view.word_panel.words,
            pending = ?view.word_panel.pending,
            "view_word_panel"
        );
    }
    for cone in &view.vision_cones {
        trace!(
            enemy = cone.enemy_id.0,
            x = cone.pose.origin.x,
            y = cone.pose.origin.y,
            facing = cone.pose.facing_radians,
            triangles = cone.mesh.triangles.len(),
            "view_cone"
        );
    }
    for light in &view.lights {
        trace!(
            enemy = light.enemy_id.0,
            x = light.position.x,
            y = light.position.y,
            state = ?light.state,
            "view_light"
        );
    }
    for (name, position) in &view.parallax {
        trace!(layer = %name, x = position.x, y = position.y, "view_parallax");
    }
}
