//! Difficulty profiles
//!
//! A profile selects how stochastic action sampling is: the softmax
//! temperature and whether the engine samples at all or just takes the
//! argmax. Profiles are applied immediately and read at the start of
//! every prediction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named exploration configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DifficultyProfile {
    /// Profile name ("easy", "medium", "hard").
    pub name: String,

    /// Softmax temperature; higher is more random. Ignored in
    /// deterministic mode.
    pub temperature: f32,

    /// When true, always act on the argmax of the logits.
    pub deterministic: bool,
}

impl DifficultyProfile {
    /// High-temperature sampling; the AI makes exploitable mistakes.
    pub fn easy() -> Self {
        Self {
            name: "easy".into(),
            temperature: 2.0,
            deterministic: false,
        }
    }

    /// Sampling at the training temperature.
    pub fn medium() -> Self {
        Self {
            name: "medium".into(),
            temperature: 1.0,
            deterministic: false,
        }
    }

    /// Greedy argmax play.
    pub fn hard() -> Self {
        Self {
            name: "hard".into(),
            temperature: 1.0,
            deterministic: true,
        }
    }
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        Self::medium()
    }
}

impl FromStr for DifficultyProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::easy()),
            "medium" => Ok(Self::medium()),
            "hard" => Ok(Self::hard()),
            other => Err(UnknownProfile(other.to_string())),
        }
    }
}

/// Unknown profile name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProfile(pub String);

impl fmt::Display for UnknownProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown difficulty profile: {}", self.0)
    }
}

impl std::error::Error for UnknownProfile {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_presets() {
        let easy: DifficultyProfile = "easy".parse().unwrap();
        assert!(!easy.deterministic);
        assert!(easy.temperature > 1.0);

        let hard: DifficultyProfile = "HARD".parse().unwrap();
        assert!(hard.deterministic);

        assert!("nightmare".parse::<DifficultyProfile>().is_err());
    }
}
