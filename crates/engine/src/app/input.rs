use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::scene::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
}

const ACTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
        }
    }
}

/// Abstracted per-tick input. Held movement actions plus edge-triggered
/// presses that are true only on the tick they happened.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    actions: ActionStates,
    quit_requested: bool,
    advance_pressed: bool,
    skip_pressed: bool,
    toggle_word_panel_pressed: bool,
    confirm_pressed: bool,
    cancel_pressed: bool,
    choice_pressed: Option<usize>,
    remove_slot_pressed: Option<usize>,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    /// Movement axis in world space, each component in `-1.0..=1.0`.
    pub fn axis(&self) -> Vec2 {
        let mut axis = Vec2::default();
        if self.is_down(InputAction::MoveRight) {
            axis.x += 1.0;
        }
        if self.is_down(InputAction::MoveLeft) {
            axis.x -= 1.0;
        }
        if self.is_down(InputAction::MoveUp) {
            axis.y += 1.0;
        }
        if self.is_down(InputAction::MoveDown) {
            axis.y -= 1.0;
        }
        axis
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_quit_requested(mut self, quit_requested: bool) -> Self {
        self.quit_requested = quit_requested;
        self
    }

    pub fn with_advance_pressed(mut self, advance_pressed: bool) -> Self {
        self.advance_pressed = advance_pressed;
        self
    }

    pub fn with_skip_pressed(mut self, skip_pressed: bool) -> Self {
        self.skip_pressed = skip_pressed;
        self
    }

    pub fn with_toggle_word_panel_pressed(mut self, pressed: bool) -> Self {
        self.toggle_word_panel_pressed = pressed;
        self
    }

    pub fn with_confirm_pressed(mut self, confirm_pressed: bool) -> Self {
        self.confirm_pressed = confirm_pressed;
        self
    }

    pub fn with_cancel_pressed(mut self, cancel_pressed: bool) -> Self {
        self.cancel_pressed = cancel_pressed;
        self
    }

    pub fn with_choice_pressed(mut self, choice: Option<usize>) -> Self {
        self.choice_pressed = choice;
        self
    }

    pub fn with_remove_slot_pressed(mut self, slot: Option<usize>) -> Self {
        self.remove_slot_pressed = slot;
        self
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn advance_pressed(&self) -> bool {
        self.advance_pressed
    }

    pub fn skip_pressed(&self) -> bool {
        self.skip_pressed
    }

    pub fn toggle_word_panel_pressed(&self) -> bool {
        self.toggle_word_panel_pressed
    }

    pub fn confirm_pressed(&self) -> bool {
        self.confirm_pressed
    }

    pub fn cancel_pressed(&self) -> bool {
        self.cancel_pressed
    }

    pub fn choice_pressed(&self) -> Option<usize> {
        self.choice_pressed
    }

    pub fn remove_slot_pressed(&self) -> Option<usize> {
        self.remove_slot_pressed
    }
}

/// Supplies one snapshot per fixed tick to the headless loop.
pub trait InputSource {
    fn snapshot_for_tick(&mut self, tick: u64) -> InputSnapshot;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn snapshot_for_tick(&mut self, _tick: u64) -> InputSnapshot {
        InputSnapshot::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptedPress {
    Advance,
    Skip,
    ToggleWordPanel,
    Confirm,
    Cancel,
    Choice(usize),
    RemoveSlot(usize),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedStep {
    pub tick: u64,
    #[serde(default = "default_hold_ticks")]
    pub hold_ticks: u64,
    #[serde(default)]
    pub hold: Vec<InputAction>,
    #[serde(default)]
    pub press: Vec<ScriptedPress>,
}

fn default_hold_ticks() -> u64 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputScript {
    pub steps: Vec<ScriptedStep>,
}

#[derive(Debug, Error)]
pub enum InputScriptError {
    #[error("failed to parse input script: {0}")]
    Parse(#[from] serde_json::Error),
}

impl InputScript {
    pub fn from_json_str(raw: &str) -> Result<Self, InputScriptError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Replays an [`InputScript`]: holds cover `[tick, tick + hold_ticks)`,
/// presses fire only on `tick`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    script: InputScript,
}

impl ScriptedInput {
    pub fn new(script: InputScript) -> Self {
        Self { script }
    }
}

impl InputSource for ScriptedInput {
    fn snapshot_for_tick(&mut self, tick: u64) -> InputSnapshot {
        let mut snapshot = InputSnapshot::empty();
        for step in &self.script.steps {
            let hold_end = step.tick.saturating_add(step.hold_ticks.max(1));
            if tick >= step.tick && tick < hold_end {
                for action in &step.hold {
                    snapshot = snapshot.with_action_down(*action, true);
                }
            }
            if tick != step.tick {
                continue;
            }
            for press in &step.press {
                snapshot = match *press {
                    ScriptedPress::Advance => snapshot.with_advance_pressed(true),
                    ScriptedPress::Skip => snapshot.with_skip_pressed(true),
                    ScriptedPress::ToggleWordPanel => snapshot.with_toggle_word_panel_pressed(true),
                    ScriptedPress::Confirm => snapshot.with_confirm_pressed(true),
                    ScriptedPress::Cancel => snapshot.with_cancel_pressed(true),
                    ScriptedPress::Choice(index) => snapshot.with_choice_pressed(Some(index)),
                    ScriptedPress::RemoveSlot(slot) => {
                        snapshot.with_remove_slot_pressed(Some(slot))
                    }
                    ScriptedPress::Quit => snapshot.with_quit_requested(true),
                };
            }
        }
        snapshot
    }
}
