//! Synthesis hand-off types
//!
//! The synthesis engine runs as an isolated worker and reports progress one
//! message at a time. A message is either a chunk of samples (with the engine
//! events that fall inside it) or the end-of-utterance marker.

use serde::{Deserialize, Serialize};

/// One message from the synthesis engine to a consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SynthesisMessage {
    /// A chunk of mono samples is ready
    Chunk {
        samples: Vec<f32>,
        #[serde(default)]
        events: Vec<SynthesisEvent>,
    },

    /// The utterance is complete; no further chunks follow
    EndOfUtterance,
}

impl SynthesisMessage {
    /// Chunk without engine events
    pub fn chunk(samples: Vec<f32>) -> Self {
        SynthesisMessage::Chunk {
            samples,
            events: Vec::new(),
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, SynthesisMessage::EndOfUtterance)
    }

    /// Get message type as string (for logging)
    pub fn message_type(&self) -> &'static str {
        match self {
            SynthesisMessage::Chunk { .. } => "Chunk",
            SynthesisMessage::EndOfUtterance => "EndOfUtterance",
        }
    }
}

/// Kind of marker reported by the synthesis engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisEventKind {
    Word,
    Sentence,
    Mark,
    Phoneme,
    End,
}

impl std::fmt::Display for SynthesisEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SynthesisEventKind::Word => "word",
            SynthesisEventKind::Sentence => "sentence",
            SynthesisEventKind::Mark => "mark",
            SynthesisEventKind::Phoneme => "phoneme",
            SynthesisEventKind::End => "end",
        };
        write!(f, "{}", name)
    }
}

/// Marker reported alongside a chunk
///
/// `audio_position_ms` is measured from the start of the utterance, so it can
/// be scheduled directly against the playback clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisEvent {
    pub kind: SynthesisEventKind,

    /// Position in the synthesized audio, milliseconds from utterance start
    pub audio_position_ms: u64,

    /// Character offset into the source text
    #[serde(default)]
    pub text_position: usize,

    /// Length in characters of the text this event covers
    #[serde(default)]
    pub length: usize,

    /// Name of an SSML mark (mark events only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SynthesisEvent {
    pub fn new(kind: SynthesisEventKind, audio_position_ms: u64) -> Self {
        Self {
            kind,
            audio_position_ms,
            text_position: 0,
            length: 0,
            name: None,
        }
    }

    /// Audio position in seconds (playback-clock units)
    pub fn audio_position_secs(&self) -> f64 {
        self.audio_position_ms as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_serialization_shape() {
        let msg = SynthesisMessage::Chunk {
            samples: vec![0.5, -0.5],
            events: vec![SynthesisEvent::new(SynthesisEventKind::Word, 120)],
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"chunk\""));
        assert!(json.contains("\"kind\":\"word\""));
        assert!(!json.contains("\"name\""), "absent mark name is skipped");

        let decoded: SynthesisMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_end_of_utterance_from_json() {
        let decoded: SynthesisMessage = serde_json::from_str(r#"{"type":"end_of_utterance"}"#).unwrap();
        assert!(decoded.is_end());
        assert_eq!(decoded.message_type(), "EndOfUtterance");
    }

    #[test]
    fn test_chunk_without_events_field() {
        // Engines that report no markers may omit the events list entirely
        let decoded: SynthesisMessage =
            serde_json::from_str(r#"{"type":"chunk","samples":[0.25]}"#).unwrap();
        assert_eq!(decoded, SynthesisMessage::chunk(vec![0.25]));
        assert!(!decoded.is_end());
    }

    #[test]
    fn test_event_position_seconds() {
        let event = SynthesisEvent::new(SynthesisEventKind::Sentence, 1500);
        assert_eq!(event.audio_position_secs(), 1.5);
        assert_eq!(event.kind.to_string(), "sentence");
    }
}
