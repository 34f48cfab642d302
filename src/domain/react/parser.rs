//! Parser for Thought / Action / Action Input / Observation / Final Answer text
//!
//! Each section runs from its marker to the next recognised marker. The four
//! step markers are folded left to right into steps; `Final Answer` is found
//! by its own search, runs to the end of the text and is attached to the
//! first step regardless of where it appears.

use once_cell::sync::Lazy;
use regex::Regex;

use super::step::ReActStep;

static MARKER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(thought|action\s+input|action|observation|final\s+answer)\s*:")
        .expect("marker regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Thought,
    Action,
    ActionInput,
    Observation,
    FinalAnswer,
}

impl Marker {
    fn from_label(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        if label.starts_with("thought") {
            Self::Thought
        } else if label.starts_with("observation") {
            Self::Observation
        } else if label.starts_with("final") {
            Self::FinalAnswer
        } else if label.split_whitespace().count() > 1 {
            Self::ActionInput
        } else {
            Self::Action
        }
    }
}

/// A marker occurrence and the span of its content
#[derive(Debug, Clone, Copy)]
struct Section {
    marker: Marker,
    content_start: usize,
    content_end: usize,
}

/// Step plus the offset where its observation section ends
#[derive(Debug, Default)]
struct ParsedStep {
    step: ReActStep,
    observation_end: Option<usize>,
    /// Built from unmarked text rather than from any section
    fallback: bool,
}

/// Stateless parser for agent-style model output
#[derive(Debug, Clone, Copy, Default)]
pub struct ReActParser;

impl ReActParser {
    /// Ordered steps; text without any section yields one final-answer step
    pub fn parse(text: &str) -> Vec<ReActStep> {
        let trimmed = text.trim();
        Self::parse_trimmed(trimmed)
            .into_iter()
            .map(|parsed| parsed.step)
            .collect()
    }

    /// The last complete step in the buffer and the text that follows it
    ///
    /// The buffer is re-parsed on every call. Returns `(None, text)` while no
    /// step is complete.
    pub fn parse_streaming(accumulated: &str) -> (Option<ReActStep>, String) {
        let trimmed = accumulated.trim();
        let parsed = Self::parse_trimmed(trimmed);

        // Unmarked text may be a marker that has not fully arrived yet
        let last_complete = parsed
            .into_iter()
            .rev()
            .find(|p| !p.fallback && p.step.is_complete());

        match last_complete {
            Some(ParsedStep { step, .. }) if step.final_answer.is_some() => (Some(step), String::new()),
            Some(ParsedStep {
                step,
                observation_end: Some(end),
                ..
            }) => (Some(step), trimmed[end..].trim().to_string()),
            _ => (None, accumulated.to_string()),
        }
    }

    /// The explicit final answer, else the last step's answer, observation or thought
    pub fn extract_final_answer(text: &str) -> Option<String> {
        let trimmed = text.trim();
        let sections = Self::sections(trimmed);

        if let Some(answer) = Self::final_answer_section(trimmed, &sections) {
            return Some(answer);
        }

        let steps = Self::parse(trimmed);
        let last = steps.last()?;

        last.final_answer
            .clone()
            .or_else(|| last.observation.clone())
            .or_else(|| Some(last.thought.clone()))
            .filter(|s| !s.is_empty())
    }

    fn parse_trimmed(text: &str) -> Vec<ParsedStep> {
        let sections = Self::sections(text);
        let mut steps = Vec::new();

        let mut current = ParsedStep::default();
        current.step.final_answer = Self::final_answer_section(text, &sections);

        for section in sections.iter().filter(|s| s.marker != Marker::FinalAnswer) {
            let content = text[section.content_start..section.content_end].trim();
            if content.is_empty() {
                continue;
            }

            match section.marker {
                Marker::Thought => {
                    if current.step.has_thought_or_action() {
                        steps.push(std::mem::take(&mut current));
                    }
                    current.step.thought = content.to_string();
                }
                Marker::Action => current.step.action = Some(content.to_string()),
                Marker::ActionInput => current.step.action_input = Some(content.to_string()),
                Marker::Observation => {
                    current.step.observation = Some(content.to_string());
                    current.observation_end = Some(section.content_end);
                    if current.step.has_thought_or_action() {
                        steps.push(std::mem::take(&mut current));
                    }
                }
                Marker::FinalAnswer => {}
            }
        }

        if !current.step.is_empty() {
            steps.push(current);
        }

        if steps.is_empty() {
            steps.push(ParsedStep {
                step: ReActStep::final_answer(text),
                observation_end: None,
                fallback: true,
            });
        }

        steps
    }

    fn sections(text: &str) -> Vec<Section> {
        let markers: Vec<(Marker, usize, usize)> = MARKER_REGEX
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let label = caps.get(1)?;
                Some((Marker::from_label(label.as_str()), whole.start(), whole.end()))
            })
            .collect();

        markers
            .iter()
            .enumerate()
            .map(|(i, &(marker, _, content_start))| Section {
                marker,
                content_start,
                content_end: markers.get(i + 1).map_or(text.len(), |next| next.1),
            })
            .collect()
    }

    /// First `Final Answer` section, running to the end of the text
    fn final_answer_section(text: &str, sections: &[Section]) -> Option<String> {
        sections
            .iter()
            .find(|s| s.marker == Marker::FinalAnswer)
            .map(|s| text[s.content_start..].trim().to_string())
            .filter(|answer| !answer.is_empty())
    }
}
