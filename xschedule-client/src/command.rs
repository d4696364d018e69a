//! Commands understood by `/xScheduleCommand`
//!
//! Each variant maps to one device command string plus its parameter string.
//! Validation of user input happens before a [`Command`] is built, see
//! [`Command::validate`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Pattern a test mode runs on the lights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestPattern {
    Alternate,
    Foreground,
    #[serde(rename = "A-B-C")]
    Abc,
    #[serde(rename = "A-B-C-All")]
    AbcAll,
    #[serde(rename = "A-B-C-All-None")]
    AbcAllNone,
    A,
    B,
    C,
}

impl TestPattern {
    pub const ALL: [TestPattern; 8] = [
        TestPattern::Alternate,
        TestPattern::Foreground,
        TestPattern::Abc,
        TestPattern::AbcAll,
        TestPattern::AbcAllNone,
        TestPattern::A,
        TestPattern::B,
        TestPattern::C,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestPattern::Alternate => "Alternate",
            TestPattern::Foreground => "Foreground",
            TestPattern::Abc => "A-B-C",
            TestPattern::AbcAll => "A-B-C-All",
            TestPattern::AbcAllNone => "A-B-C-All-None",
            TestPattern::A => "A",
            TestPattern::B => "B",
            TestPattern::C => "C",
        }
    }
}

impl Default for TestPattern {
    fn default() -> Self {
        TestPattern::Alternate
    }
}

impl fmt::Display for TestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TestPattern::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown test mode '{}'", s))
    }
}

/// Arguments for `Start test mode`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestModeRequest {
    pub pattern: TestPattern,
    pub model: Option<String>,
    pub interval_ms: Option<u32>,
    pub foreground: Option<u32>,
    pub background: Option<u32>,
}

impl TestModeRequest {
    pub fn new(pattern: TestPattern) -> Self {
        Self {
            pattern,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_interval_ms(mut self, interval_ms: u32) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    pub fn with_colors(mut self, foreground: u32, background: u32) -> Self {
        self.foreground = Some(foreground);
        self.background = Some(background);
        self
    }

    /// `mode|model|interval|fg|bg`, omitting absent trailing parts
    fn parameters(&self) -> String {
        let mut parts = vec![self.pattern.as_str().to_string()];
        if let Some(model) = self.model.as_deref().filter(|m| !m.is_empty()) {
            parts.push(model.to_string());
        }
        parts.extend(self.interval_ms.map(|v| v.to_string()));
        parts.extend(self.foreground.map(|v| v.to_string()));
        parts.extend(self.background.map(|v| v.to_string()));
        parts.join("|")
    }
}

/// A command the scheduler accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    PlayPlaylist { playlist: String, looped: bool },
    PlayStep { playlist: String, step: String, looped: bool },
    Stop,
    StopAllNow,
    PauseToggle,
    NextStep,
    PriorStep,
    RestartStep,
    SeekMs { position_ms: u64 },
    SetVolume { volume: u8 },
    AdjustVolume { delta: i32 },
    TogglePlaylistLoop,
    ToggleOutputToLights,
    StartTestMode(TestModeRequest),
    StopTestMode,
    SetBrightness { percent: u8 },
    SetBackgroundPlaylist { playlist: String },
    ClearBackgroundPlaylist,
    CloseScheduler,
}

impl Command {
    /// Device command string
    pub fn name(&self) -> &'static str {
        match self {
            Command::PlayPlaylist { looped: false, .. } => "Play specified playlist",
            Command::PlayPlaylist { looped: true, .. } => "Play specified playlist looped",
            Command::PlayStep { looped: false, .. } => "Play playlist step",
            Command::PlayStep { looped: true, .. } => {
                "Play specified step in specified playlist looped"
            }
            Command::Stop => "Stop",
            Command::StopAllNow => "Stop all now",
            Command::PauseToggle => "Pause",
            Command::NextStep => "Next step in current playlist",
            Command::PriorStep => "Prior step in current playlist",
            Command::RestartStep => "Restart step in current playlist",
            Command::SeekMs { .. } => "Set step position ms",
            Command::SetVolume { .. } => "Set volume to",
            Command::AdjustVolume { .. } => "Adjust volume by",
            Command::TogglePlaylistLoop => "Toggle current playlist loop",
            Command::ToggleOutputToLights => "Toggle output to lights",
            Command::StartTestMode(_) => "Start test mode",
            Command::StopTestMode => "Stop test mode",
            Command::SetBrightness { .. } => "Set brightness to n%",
            Command::SetBackgroundPlaylist { .. } => "Set playlist as background",
            Command::ClearBackgroundPlaylist => "Clear background playlist",
            Command::CloseScheduler => "Close xSchedule",
        }
    }

    /// Parameter string sent alongside the command
    pub fn parameters(&self) -> String {
        match self {
            Command::PlayPlaylist { playlist, .. } => playlist.clone(),
            Command::PlayStep { playlist, step, .. } => format!("{},{}", playlist, step),
            Command::SeekMs { position_ms } => position_ms.to_string(),
            Command::SetVolume { volume } => volume.to_string(),
            Command::AdjustVolume { delta } => delta.to_string(),
            Command::StartTestMode(request) => request.parameters(),
            Command::SetBrightness { percent } => percent.to_string(),
            Command::SetBackgroundPlaylist { playlist } => playlist.clone(),
            _ => String::new(),
        }
    }

    /// Check arguments that cannot be expressed in the field types
    ///
    /// Returns a description of the first invalid argument.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Command::PlayPlaylist { playlist, .. } | Command::SetBackgroundPlaylist { playlist } => {
                if playlist.trim().is_empty() {
                    return Err("playlist name must not be empty".to_string());
                }
            }
            Command::PlayStep { playlist, step, .. } => {
                if playlist.trim().is_empty() || step.trim().is_empty() {
                    return Err("playlist and step must both be given".to_string());
                }
            }
            Command::SetVolume { volume } if *volume > 100 => {
                return Err(format!("volume {} is outside 0..=100", volume));
            }
            Command::AdjustVolume { delta } if !(-100..=100).contains(delta) => {
                return Err(format!("volume delta {} is outside -100..=100", delta));
            }
            Command::SetBrightness { percent } if *percent > 100 => {
                return Err(format!("brightness {} is outside 0..=100", percent));
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self.parameters();
        if params.is_empty() {
            f.write_str(self.name())
        } else {
            write!(f, "{} [{}]", self.name(), params)
        }
    }
}
