//! Narrative feedback queued for the presentation layer.
//!
//! The core only hands over template text plus substitution values; final
//! wording is assembled by whoever renders the queue.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Combat,
    Emote,
    Taunt,
    Status,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub template: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl Feedback {
    /// Substitute `{key}` placeholders with metadata values.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = self.template.clone();
        for (key, value) in &self.meta {
            let needle = format!("{{{key}}}");
            let replacement = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            text = text.replace(&needle, &replacement);
        }
        text
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackBus {
    queue: Vec<Feedback>,
}

impl FeedbackBus {
    pub fn push(&mut self, kind: FeedbackKind, template: &str, meta: Value) {
        let meta = match meta {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.queue.push(Feedback {
            kind,
            template: template.to_string(),
            meta,
        });
    }

    #[must_use]
    pub fn pending(&self) -> &[Feedback] {
        &self.queue
    }

    pub fn drain(&mut self) -> Vec<Feedback> {
        std::mem::take(&mut self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn push_and_render() {
        let mut bus = FeedbackBus::default();
        bus.push(
            FeedbackKind::Emote,
            "{monster} sneers at {target}.",
            json!({ "monster": "Ghoul", "target": "you" }),
        );
        assert_eq!(bus.pending()[0].render(), "Ghoul sneers at you.");
        assert_eq!(bus.drain().len(), 1);
        assert!(bus.pending().is_empty());
    }
}
