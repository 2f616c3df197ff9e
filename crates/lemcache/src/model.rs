//! Lemming entity

use serde::{Deserialize, Serialize};

/// How a lemming is feeling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    /// Happy lemming
    Happy,
    /// Sad lemming
    Sad,
    /// Angry lemming
    Angry,
    /// Bored lemming
    Bored,
}

/// A cached lemming, identified by its name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Lemming {
    /// Unique name, also the cache key suffix
    pub name: String,

    /// Current mood
    pub mood: Mood,
}

impl Lemming {
    /// Create a lemming with the given name and mood
    pub fn new(name: impl Into<String>, mood: Mood) -> Self {
        Self {
            name: name.into(),
            mood,
        }
    }
}
