use std::collections::BTreeMap;

use engine::EntityId;
use thiserror::Error;
use tracing::{debug, info};

use super::effects::{EffectOutcome, EffectScheduler};

pub(crate) const MAX_PENDING_WORDS: usize = 2;

/// Order-independent key for a word pair: the two words sorted and joined by
/// a single space.
pub(crate) fn combination_key(first: &str, second: &str) -> String {
    let (low, high) = if first <= second {
        (first, second)
    } else {
        (second, first)
    };
    format!("{low} {high}")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum WordError {
    #[error("word `{0}` is not in the inventory")]
    NotHeld(String),
    #[error("every held copy of `{0}` is already selected")]
    AllCopiesSelected(String),
    #[error("combination already holds {MAX_PENDING_WORDS} words")]
    SelectionFull,
    #[error("no pending word in slot {0}")]
    EmptySlot(usize),
    #[error("no word at inventory index {0}")]
    NoWordAtIndex(usize),
    #[error("combination needs exactly {MAX_PENDING_WORDS} words, {selected} selected")]
    IncompleteSelection { selected: usize },
    #[error("word panel is closed")]
    PanelClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CombinationReport {
    pub(crate) key: String,
    pub(crate) outcomes: Vec<(EntityId, EffectOutcome)>,
}

/// Counted multiset of collected words plus up to two pending selections.
/// Pending words are only consumed by a successful `confirm`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct WordInventory {
    counts: BTreeMap<String, u32>,
    pending: Vec<String>,
}

impl WordInventory {
    pub(crate) fn collect(&mut self, word: &str) -> u32 {
        let count = self.counts.entry(word.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        info!(word, count = *count, "word_collected");
        *count
    }

    pub(crate) fn count(&self, word: &str) -> u32 {
        self.counts.get(word).copied().unwrap_or(0)
    }

    /// Held words in sorted order, the same listing panel indices refer to.
    pub(crate) fn words(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts
            .iter()
            .map(|(word, count)| (word.as_str(), *count))
    }

    pub(crate) fn word_at(&self, index: usize) -> Option<&str> {
        self.counts.keys().nth(index).map(String::as_str)
    }

    pub(crate) fn pending(&self) -> &[String] {
        &self.pending
    }

    pub(crate) fn select_for_combination(&mut self, word: &str) -> Result<usize, WordError> {
        let held = self.count(word);
        if held == 0 {
            return Err(WordError::NotHeld(word.to_string()));
        }
        if self.pending.len() >= MAX_PENDING_WORDS {
            return Err(WordError::SelectionFull);
        }
        let already_pending = self.pending.iter().filter(|pending| *pending == word).count();
        if already_pending as u32 >= held {
            return Err(WordError::AllCopiesSelected(word.to_string()));
        }
        self.pending.push(word.to_string());
        let slot = self.pending.len() - 1;
        debug!(word, slot, "word_selected");
        Ok(slot)
    }

    pub(crate) fn deselect(&mut self, slot: usize) -> Result<String, WordError> {
        if slot >= self.pending.len() {
            return Err(WordError::EmptySlot(slot));
        }
        let word = self.pending.remove(slot);
        debug!(word = %word, slot, "word_deselected");
        Ok(word)
    }

    pub(crate) fn cancel(&mut self) {
        if !self.pending.is_empty() {
            debug!(pending = self.pending.len(), "combination_cancelled");
        }
        self.pending.clear();
    }

    /// Consumes both pending words and hands the combination key to every
    /// target scheduler before returning.
    pub(crate) fn confirm<'a>(
        &mut self,
        targets: impl IntoIterator<Item = &'a mut EffectScheduler>,
    ) -> Result<CombinationReport, WordError> {
        let [first, second] = self.pending.as_slice() else {
            return Err(WordError::IncompleteSelection {
                selected: self.pending.len(),
            });
        };
        let key = combination_key(first, second);

        for word in std::mem::take(&mut self.pending) {
            if let Some(count) = self.counts.get_mut(&word) {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(&word);
                }
            }
        }
        info!(combination = %key, "combination_confirmed");

        let outcomes = targets
            .into_iter()
            .map(|scheduler| (scheduler.owner(), scheduler.apply_combination(&key)))
            .collect();
        Ok(CombinationReport { key, outcomes })
    }
}

/// Open/closed selection surface over the inventory. Closing the panel
/// returns any pending words; a confirmed combination closes it.
#[derive(Debug, Clone, Default)]
pub(crate) struct CombinationPanel {
    inventory: WordInventory,
    open: bool,
}

impl CombinationPanel {
    pub(crate) fn inventory(&self) -> &WordInventory {
        &self.inventory
    }

    pub(crate) fn inventory_mut(&mut self) -> &mut WordInventory {
        &mut self.inventory
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn toggle(&mut self) -> bool {
        if self.open {
            self.inventory.cancel();
        }
        self.open = !self.open;
        debug!(open = self.open, "word_panel_toggled");
        self.open
    }

    pub(crate) fn select_index(&mut self, index: usize) -> Result<usize, WordError> {
        self.ensure_open()?;
        let word = self
            .inventory
            .word_at(index)
            .map(str::to_string)
            .ok_or(WordError::NoWordAtIndex(index))?;
        self.inventory.select_for_combination(&word)
    }

    pub(crate) fn remove_slot(&mut self, slot: usize) -> Result<String, WordError> {
        self.ensure_open()?;
        self.inventory.deselect(slot)
    }

    pub(crate) fn confirm<'a>(
        &mut self,
        targets: impl IntoIterator<Item = &'a mut EffectScheduler>,
    ) -> Result<CombinationReport, WordError> {
        self.ensure_open()?;
        let report = self.inventory.confirm(targets)?;
        self.open = false;
        Ok(report)
    }

    pub(crate) fn cancel(&mut self) -> Result<(), WordError> {
        self.ensure_open()?;
        self.inventory.cancel();
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), WordError> {
        if self.open {
            Ok(())
        } else {
            Err(WordError::PanelClosed)
        }
    }
}
