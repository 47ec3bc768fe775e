use std::collections::VecDeque;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

pub(crate) const DEFAULT_TYPING_INTERVAL_SECONDS: f32 = 0.05;
const REVEAL_EPSILON_SECONDS: f32 = 1.0e-5;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DialogueAnswer {
    pub(crate) choice_text: String,
    pub(crate) response_text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DialogueSegment {
    pub(crate) speaker: String,
    #[serde(default)]
    pub(crate) is_question: bool,
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) answers: Vec<DialogueAnswer>,
}

impl DialogueSegment {
    #[cfg(test)]
    pub(crate) fn line(speaker: &str, text: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            is_question: false,
            text: text.to_string(),
            answers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DialogueState {
    Idle,
    Typing,
    AwaitingAdvance,
    AwaitingAnswer,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DialogueEvent {
    SegmentStarted { speaker: String },
    RevealCompleted,
    AnswersPresented { count: usize },
    AnswerChosen { index: usize },
    SessionEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum DialogueError {
    #[error("dialogue script has no segments")]
    EmptyScript,
    #[error("question segment {segment} has no answers")]
    QuestionWithoutAnswers { segment: usize },
    #[error("answer {index} is out of range ({available} available)")]
    AnswerOutOfRange { index: usize, available: usize },
    #[error("no question is waiting for an answer")]
    NoQuestionOpen,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DialogueView {
    pub(crate) speaker: String,
    pub(crate) visible_text: String,
    pub(crate) answer_options: Vec<String>,
}

/// Number of characters shown after `elapsed` seconds: the first at once,
/// then one more per interval.
fn revealed_chars(text: &str, elapsed: f32, interval: f32) -> usize {
    let total = text.chars().count();
    if interval <= 0.0 {
        return total;
    }
    let steps = ((elapsed + REVEAL_EPSILON_SECONDS) / interval).floor() as usize;
    total.min(steps.saturating_add(1))
}

fn reveal_finished(text: &str, elapsed: f32, interval: f32) -> bool {
    let total = text.chars().count() as f32;
    elapsed + REVEAL_EPSILON_SECONDS >= total * interval.max(0.0)
}

#[derive(Debug, Clone)]
pub(crate) struct DialogueRunner {
    typing_interval: f32,
    state: DialogueState,
    queue: VecDeque<DialogueSegment>,
    speaker: String,
    current_text: String,
    reveal_elapsed: f32,
    answers: Vec<DialogueAnswer>,
}

impl Default for DialogueRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_INTERVAL_SECONDS)
    }
}

impl DialogueRunner {
    pub(crate) fn new(typing_interval: f32) -> Self {
        Self {
            typing_interval,
            state: DialogueState::Idle,
            queue: VecDeque::new(),
            speaker: String::new(),
            current_text: String::new(),
            reveal_elapsed: 0.0,
            answers: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> DialogueState {
        self.state
    }

    pub(crate) fn is_active(&self) -> bool {
        !matches!(self.state, DialogueState::Idle | DialogueState::Ended)
    }

    /// Replaces any running session. The runner is left untouched when the
    /// script is rejected.
    pub(crate) fn start_session(
        &mut self,
        segments: &[DialogueSegment],
    ) -> Result<Vec<DialogueEvent>, DialogueError> {
        validate_segments(segments)?;

        self.queue = segments.iter().cloned().collect();
        info!(segments = segments.len(), "dialogue_started");
        let mut events = Vec::new();
        self.show_next_segment(&mut events);
        Ok(events)
    }

    pub(crate) fn tick(&mut self, dt: f32) -> Option<DialogueEvent> {
        if self.state != DialogueState::Typing {
            return None;
        }
        self.reveal_elapsed += dt;
        if reveal_finished(&self.current_text, self.reveal_elapsed, self.typing_interval) {
            return Some(self.complete_reveal());
        }
        None
    }

    pub(crate) fn skip(&mut self) -> Option<DialogueEvent> {
        if self.state != DialogueState::Typing {
            return None;
        }
        Some(self.complete_reveal())
    }

    /// Skips an unfinished reveal, otherwise moves to the next segment or ends
    /// the session once the queue is drained.
    pub(crate) fn advance(&mut self) -> Vec<DialogueEvent> {
        let mut events = Vec::new();
        match self.state {
            DialogueState::Typing => events.extend(self.skip()),
            DialogueState::AwaitingAdvance => self.show_next_segment(&mut events),
            DialogueState::Idle | DialogueState::AwaitingAnswer | DialogueState::Ended => {}
        }
        events
    }

    pub(crate) fn select_answer(&mut self, index: usize) -> Result<Vec<DialogueEvent>, DialogueError> {
        if self.state != DialogueState::AwaitingAnswer {
            return Err(DialogueError::NoQuestionOpen);
        }
        let Some(answer) = self.answers.get(index) else {
            return Err(DialogueError::AnswerOutOfRange {
                index,
                available: self.answers.len(),
            });
        };
        let response = answer.response_text.clone();
        debug!(index, choice = %answer.choice_text, "dialogue_answer_chosen");

        let mut events = vec![DialogueEvent::AnswerChosen { index }];
        self.begin_reveal(response, &mut events);
        Ok(events)
    }

    /// Drops the session without emitting an end event; used on level reset.
    pub(crate) fn cancel(&mut self) {
        *self = Self::new(self.typing_interval);
    }

    pub(crate) fn view(&self) -> DialogueView {
        let visible_text = match self.state {
            DialogueState::Idle | DialogueState::Ended => String::new(),
            DialogueState::Typing => self
                .current_text
                .chars()
                .take(revealed_chars(
                    &self.current_text,
                    self.reveal_elapsed,
                    self.typing_interval,
                ))
                .collect(),
            DialogueState::AwaitingAdvance | DialogueState::AwaitingAnswer => {
                self.current_text.clone()
            }
        };
        let speaker = if self.is_active() {
            self.speaker.clone()
        } else {
            String::new()
        };
        DialogueView {
            speaker,
            visible_text,
            answer_options: self
                .answers
                .iter()
                .map(|answer| answer.choice_text.clone())
                .collect(),
        }
    }

    fn show_next_segment(&mut self, events: &mut Vec<DialogueEvent>) {
        let Some(segment) = self.queue.pop_front() else {
            self.end_session(events);
            return;
        };

        self.speaker = segment.speaker;
        events.push(DialogueEvent::SegmentStarted {
            speaker: self.speaker.clone(),
        });
        debug!(speaker = %self.speaker, question = segment.is_question, "dialogue_segment_started");

        if segment.is_question {
            self.current_text = segment.text;
            self.reveal_elapsed = 0.0;
            self.answers = segment.answers;
            self.state = DialogueState::AwaitingAnswer;
            events.push(DialogueEvent::AnswersPresented {
                count: self.answers.len(),
            });
        } else {
            self.begin_reveal(segment.text, events);
        }
    }

    fn begin_reveal(&mut self, text: String, events: &mut Vec<DialogueEvent>) {
        self.answers.clear();
        self.current_text = text;
        self.reveal_elapsed = 0.0;
        self.state = DialogueState::Typing;
        if self.current_text.is_empty() {
            events.push(self.complete_reveal());
        }
    }

    fn complete_reveal(&mut self) -> DialogueEvent {
        self.state = DialogueState::AwaitingAdvance;
        DialogueEvent::RevealCompleted
    }

    fn end_session(&mut self, events: &mut Vec<DialogueEvent>) {
        self.state = DialogueState::Ended;
        self.queue.clear();
        self.answers.clear();
        self.current_text.clear();
        info!("dialogue_ended");
        events.push(DialogueEvent::SessionEnded);
    }
}

pub(crate) fn validate_segments(segments: &[DialogueSegment]) -> Result<(), DialogueError> {
    if segments.is_empty() {
        return Err(DialogueError::EmptyScript);
    }
    if let Some(segment) = segments
        .iter()
        .position(|segment| segment.is_question && segment.answers.is_empty())
    {
        return Err(DialogueError::QuestionWithoutAnswers { segment });
    }
    Ok(())
}
