use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::ValidationError;

/// Default transcription language
pub const DEFAULT_LANGUAGE: &str = "en";

/// Default pitch shift in semitones
pub const DEFAULT_N_STEPS: i32 = 2;

/// Default speed-up factor
pub const DEFAULT_SPEED_FACTOR: f64 = 1.5;

const AUDIO_EXTENSIONS: &[&str] = &["mp3"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorAction {
    Transcribe,
    Shift,
    NoiseCancel,
    BassBoost,
    SpeechIdentifier,
    SpeedUp,
    VideoTranscribe,
}

impl ProcessorAction {
    pub const ALL: [ProcessorAction; 7] = [
        ProcessorAction::Transcribe,
        ProcessorAction::Shift,
        ProcessorAction::NoiseCancel,
        ProcessorAction::BassBoost,
        ProcessorAction::SpeechIdentifier,
        ProcessorAction::SpeedUp,
        ProcessorAction::VideoTranscribe,
    ];

    /// Path segment under `processor/`.
    pub fn slug(&self) -> &'static str {
        match self {
            ProcessorAction::Transcribe => "transcribe",
            ProcessorAction::Shift => "shift",
            ProcessorAction::NoiseCancel => "noisecancel",
            ProcessorAction::BassBoost => "bassboost",
            ProcessorAction::SpeechIdentifier => "speechidentifier",
            ProcessorAction::SpeedUp => "speedup",
            ProcessorAction::VideoTranscribe => "video-transcribe",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProcessorAction::Transcribe => "Transcription",
            ProcessorAction::Shift => "Pitch Shifting",
            ProcessorAction::NoiseCancel => "Noise Cancellation",
            ProcessorAction::BassBoost => "Bass Boost",
            ProcessorAction::SpeechIdentifier => "Speech Identification",
            ProcessorAction::SpeedUp => "Speed Up",
            ProcessorAction::VideoTranscribe => "Video Transcription",
        }
    }

    /// Whether the backend answers with JSON rather than a media file.
    pub fn returns_json(&self) -> bool {
        matches!(
            self,
            ProcessorAction::Transcribe | ProcessorAction::SpeechIdentifier
        )
    }

    /// File name used for a media result when the response carries none.
    pub fn default_output_name(&self) -> &'static str {
        match self {
            ProcessorAction::Shift => "shifted_audio.mp3",
            ProcessorAction::NoiseCancel => "noisecancel_audio.mp3",
            ProcessorAction::BassBoost => "bassboost_audio.mp3",
            ProcessorAction::SpeedUp => "speedup_audio.mp3",
            ProcessorAction::VideoTranscribe => "transcribed_video.mp4",
            ProcessorAction::Transcribe | ProcessorAction::SpeechIdentifier => "output.json",
        }
    }

    /// Check the upload's extension against what this action accepts.
    pub fn validate_file_name(&self, file_name: &str) -> Result<(), ValidationError> {
        let (accepted, expected) = match self {
            ProcessorAction::VideoTranscribe => (VIDEO_EXTENSIONS, "video"),
            _ => (AUDIO_EXTENSIONS, "MP3"),
        };
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension {
            Some(ext) if accepted.contains(&ext.as_str()) => Ok(()),
            _ => Err(ValidationError::UnsupportedFile { expected }),
        }
    }
}

impl fmt::Display for ProcessorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ProcessorAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        ProcessorAction::ALL
            .into_iter()
            .find(|action| action.slug() == normalized)
            .ok_or_else(|| format!("unknown processor action: {}", s))
    }
}

/// One processing job: the action plus whichever parameters it reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorRequest {
    pub action: ProcessorAction,
    pub language: String,
    pub n_steps: i32,
    pub speed_factor: f64,
}

impl ProcessorRequest {
    pub fn new(action: ProcessorAction) -> Self {
        Self {
            action,
            language: DEFAULT_LANGUAGE.to_string(),
            n_steps: DEFAULT_N_STEPS,
            speed_factor: DEFAULT_SPEED_FACTOR,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_n_steps(mut self, n_steps: i32) -> Self {
        self.n_steps = n_steps;
        self
    }

    pub fn with_speed_factor(mut self, speed_factor: f64) -> Self {
        self.speed_factor = speed_factor;
        self
    }

    pub fn validate(&self, file_name: &str, file_len: usize) -> Result<(), ValidationError> {
        self.action.validate_file_name(file_name)?;
        if file_len == 0 {
            return Err(ValidationError::EmptyFile);
        }
        match self.action {
            ProcessorAction::SpeedUp => {
                if !self.speed_factor.is_finite() || self.speed_factor <= 0.0 {
                    return Err(ValidationError::InvalidParameter {
                        field: "speed_factor",
                        reason: "must be a positive number".to_string(),
                    });
                }
            }
            ProcessorAction::Transcribe | ProcessorAction::VideoTranscribe => {
                if self.language.trim().is_empty() {
                    return Err(ValidationError::Required("Language"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Multipart text fields sent alongside the file.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        match self.action {
            ProcessorAction::Transcribe | ProcessorAction::VideoTranscribe => {
                vec![("language", self.language.trim().to_string())]
            }
            ProcessorAction::Shift => vec![("n_steps", self.n_steps.to_string())],
            ProcessorAction::SpeedUp => vec![("speed_factor", self.speed_factor.to_string())],
            ProcessorAction::NoiseCancel
            | ProcessorAction::BassBoost
            | ProcessorAction::SpeechIdentifier => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerSegment {
    pub start_time: f64,
    pub end_time: f64,
    pub speaker: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechInfo {
    pub transcription: String,
    #[serde(default)]
    pub speaker_segments: Vec<SpeakerSegment>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TranscriptResponse {
    pub transcript: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpeechIdentifierResponse {
    pub speech_info: Option<SpeechInfo>,
}

/// Result of a processing job.
#[derive(Debug, Clone)]
pub enum ProcessorOutput {
    Transcript(String),
    SpeechInfo(SpeechInfo),
    Media { file_name: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorUsage {
    #[serde(default)]
    pub id: Option<i64>,
    pub processor_type: String,
    #[serde(default)]
    pub file: String,
    pub timestamp: DateTime<Utc>,
}

impl ProcessorUsage {
    pub fn label(&self) -> &str {
        match self.processor_type.as_str() {
            "transcribe" => "Transcription",
            "pitch_shift" => "Pitch Shifting",
            "noise_cancel" => "Noise Cancellation",
            "bass_boost" => "Bass Boost",
            "speech_identifier" => "Speech Identifier",
            "speed_up" => "Speed Up",
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_str() {
        assert_eq!("transcribe".parse::<ProcessorAction>(), Ok(ProcessorAction::Transcribe));
        assert_eq!(
            "Video_Transcribe".parse::<ProcessorAction>(),
            Ok(ProcessorAction::VideoTranscribe)
        );
        assert_eq!("speedup".parse::<ProcessorAction>(), Ok(ProcessorAction::SpeedUp));
        assert!("explode".parse::<ProcessorAction>().is_err());
    }

    #[test]
    fn test_returns_json() {
        assert!(ProcessorAction::Transcribe.returns_json());
        assert!(ProcessorAction::SpeechIdentifier.returns_json());
        assert!(!ProcessorAction::BassBoost.returns_json());
        assert!(!ProcessorAction::VideoTranscribe.returns_json());
    }

    #[test]
    fn test_validate_file_name() {
        assert!(ProcessorAction::Shift.validate_file_name("song.MP3").is_ok());
        assert_eq!(
            ProcessorAction::Shift.validate_file_name("song.wav"),
            Err(ValidationError::UnsupportedFile { expected: "MP3" })
        );
        assert!(ProcessorAction::VideoTranscribe.validate_file_name("talk.mp4").is_ok());
        assert_eq!(
            ProcessorAction::VideoTranscribe.validate_file_name("talk"),
            Err(ValidationError::UnsupportedFile { expected: "video" })
        );
    }

    #[test]
    fn test_request_validation() {
        let req = ProcessorRequest::new(ProcessorAction::SpeedUp).with_speed_factor(0.0);
        assert!(matches!(
            req.validate("a.mp3", 10),
            Err(ValidationError::InvalidParameter { field: "speed_factor", .. })
        ));
        let req = ProcessorRequest::new(ProcessorAction::NoiseCancel);
        assert_eq!(req.validate("a.mp3", 0), Err(ValidationError::EmptyFile));
        assert!(req.validate("a.mp3", 10).is_ok());
    }

    #[test]
    fn test_form_fields_per_action() {
        let shift = ProcessorRequest::new(ProcessorAction::Shift).with_n_steps(-3);
        assert_eq!(shift.form_fields(), vec![("n_steps", "-3".to_string())]);

        let transcribe = ProcessorRequest::new(ProcessorAction::Transcribe).with_language("de");
        assert_eq!(transcribe.form_fields(), vec![("language", "de".to_string())]);

        let speed = ProcessorRequest::new(ProcessorAction::SpeedUp);
        assert_eq!(speed.form_fields(), vec![("speed_factor", "1.5".to_string())]);

        assert!(ProcessorRequest::new(ProcessorAction::BassBoost)
            .form_fields()
            .is_empty());
    }

    #[test]
    fn test_speech_info_parses() {
        let json = r#"{"speech_info": {
            "transcription": "hello there",
            "speaker_segments": [
                {"start_time": 0.0, "end_time": 1.5, "speaker": "A", "text": "hello"},
                {"start_time": 1.5, "end_time": 2.0, "speaker": "B", "text": "there"}
            ]
        }}"#;
        let parsed: SpeechIdentifierResponse = serde_json::from_str(json).unwrap();
        let info = parsed.speech_info.unwrap();
        assert_eq!(info.speaker_segments.len(), 2);
        assert_eq!(info.speaker_segments[1].speaker, "B");
    }

    #[test]
    fn test_usage_label() {
        let usage: ProcessorUsage = serde_json::from_str(
            r#"{"processor_type": "pitch_shift", "file": "processor_files/a.mp3",
                "timestamp": "2025-01-05T10:20:30Z"}"#,
        )
        .unwrap();
        assert_eq!(usage.label(), "Pitch Shifting");
    }
}
