use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use engine::EntityId;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::words::combination_key;

pub(crate) const DEFAULT_EFFECT_DURATION_SECONDS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum EffectKind {
    Invisibility,
    Sleep,
}

/// At most one effect per family is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EffectFamily {
    Visibility,
    Mobility,
}

impl EffectKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Invisibility => "Invisibility",
            Self::Sleep => "Sleep",
        }
    }

    pub(crate) fn family(self) -> EffectFamily {
        match self {
            Self::Invisibility => EffectFamily::Visibility,
            Self::Sleep => EffectFamily::Mobility,
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown effect `{0}`")]
pub(crate) struct UnknownEffect(pub(crate) String);

impl FromStr for EffectKind {
    type Err = UnknownEffect;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Invisibility" => Ok(Self::Invisibility),
            "Sleep" => Ok(Self::Sleep),
            other => Err(UnknownEffect(other.to_string())),
        }
    }
}

/// The effect is kept by name so a recipe naming an unknown effect only
/// affects the enemy that holds it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CombinationRecipe {
    pub(crate) effect: String,
    pub(crate) duration_seconds: f32,
}

/// Combination key to effect, keyed by the order-independent word pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RecipeBook {
    recipes: HashMap<String, CombinationRecipe>,
}

impl RecipeBook {
    #[cfg(test)]
    pub(crate) fn with_default_recipes() -> Self {
        let mut book = Self::default();
        book.insert(
            "Mist",
            "Lull",
            CombinationRecipe {
                effect: EffectKind::Invisibility.name().to_string(),
                duration_seconds: DEFAULT_EFFECT_DURATION_SECONDS,
            },
        );
        book.insert(
            "Lull",
            "Drift",
            CombinationRecipe {
                effect: EffectKind::Sleep.name().to_string(),
                duration_seconds: DEFAULT_EFFECT_DURATION_SECONDS,
            },
        );
        book
    }

    pub(crate) fn insert(&mut self, first: &str, second: &str, recipe: CombinationRecipe) {
        self.recipes.insert(combination_key(first, second), recipe);
    }

    pub(crate) fn get(&self, key: &str) -> Option<&CombinationRecipe> {
        self.recipes.get(key)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.recipes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ActiveEffect {
    pub(crate) kind: EffectKind,
    pub(crate) remaining_seconds: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EffectOutcome {
    Applied(EffectKind),
    AlreadyActive(EffectKind),
    UnknownEffect,
    UnknownCombination,
}

#[derive(Debug, Clone)]
pub(crate) struct EffectScheduler {
    owner: EntityId,
    recipes: RecipeBook,
    visibility: Option<ActiveEffect>,
    mobility: Option<ActiveEffect>,
}

impl EffectScheduler {
    pub(crate) fn new(owner: EntityId, recipes: RecipeBook) -> Self {
        Self {
            owner,
            recipes,
            visibility: None,
            mobility: None,
        }
    }

    pub(crate) fn owner(&self) -> EntityId {
        self.owner
    }

    pub(crate) fn apply_effect(&mut self, effect_name: &str, duration_seconds: f32) -> EffectOutcome {
        match effect_name.parse::<EffectKind>() {
            Ok(kind) => self.apply(kind, duration_seconds),
            Err(err) => {
                warn!(owner = self.owner.0, error = %err, "effect_unknown");
                EffectOutcome::UnknownEffect
            }
        }
    }

    /// Re-applying an effect whose family is already active does nothing; the
    /// running timer is not extended.
    pub(crate) fn apply(&mut self, kind: EffectKind, duration_seconds: f32) -> EffectOutcome {
        let slot = self.slot_mut(kind.family());
        if let Some(active) = slot {
            debug!(
                effect = kind.name(),
                active = active.kind.name(),
                remaining_seconds = active.remaining_seconds,
                "effect_already_active"
            );
            return EffectOutcome::AlreadyActive(active.kind);
        }
        *slot = Some(ActiveEffect {
            kind,
            remaining_seconds: duration_seconds,
        });
        info!(
            owner = self.owner.0,
            effect = kind.name(),
            duration_seconds,
            "effect_applied"
        );
        EffectOutcome::Applied(kind)
    }

    pub(crate) fn apply_combination(&mut self, key: &str) -> EffectOutcome {
        let Some(recipe) = self.recipes.get(key).cloned() else {
            warn!(owner = self.owner.0, combination = key, "combination_unknown");
            return EffectOutcome::UnknownCombination;
        };
        self.apply_effect(&recipe.effect, recipe.duration_seconds)
    }

    /// Advances active timers and returns the effects that reverted this tick.
    pub(crate) fn tick(&mut self, dt: f32) -> Vec<EffectKind> {
        let owner = self.owner;
        let mut reverted = Vec::new();
        for slot in [&mut self.visibility, &mut self.mobility] {
            let Some(active) = slot.as_mut() else {
                continue;
            };
            active.remaining_seconds -= dt;
            if active.remaining_seconds <= 0.0 {
                let kind = active.kind;
                *slot = None;
                info!(owner = owner.0, effect = kind.name(), "effect_reverted");
                reverted.push(kind);
            }
        }
        reverted
    }

    /// Cancels every timer without running revert handling.
    pub(crate) fn reset(&mut self) {
        self.visibility = None;
        self.mobility = None;
    }

    pub(crate) fn is_active(&self, kind: EffectKind) -> bool {
        self.slot(kind.family())
            .is_some_and(|active| active.kind == kind)
    }

    #[cfg(test)]
    pub(crate) fn remaining_seconds(&self, kind: EffectKind) -> Option<f32> {
        self.slot(kind.family())
            .filter(|active| active.kind == kind)
            .map(|active| active.remaining_seconds)
    }

    #[cfg(test)]
    pub(crate) fn active_effects(&self) -> Vec<ActiveEffect> {
        self.visibility.into_iter().chain(self.mobility).collect()
    }

    pub(crate) fn detection_suppressed(&self) -> bool {
        self.visibility.is_some() || self.mobility.is_some()
    }

    pub(crate) fn movement_suppressed(&self) -> bool {
        self.is_active(EffectKind::Sleep)
    }

    pub(crate) fn vision_hidden(&self) -> bool {
        self.is_active(EffectKind::Sleep)
    }

    fn slot(&self, family: EffectFamily) -> Option<&ActiveEffect> {
        match family {
            EffectFamily::Visibility => self.visibility.as_ref(),
            EffectFamily::Mobility => self.mobility.as_ref(),
        }
    }

    fn slot_mut(&mut self, family: EffectFamily) -> &mut Option<ActiveEffect> {
        match family {
            EffectFamily::Visibility => &mut self.visibility,
            EffectFamily::Mobility => &mut self.mobility,
        }
    }
}
