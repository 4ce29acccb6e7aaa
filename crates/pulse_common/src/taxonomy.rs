//! Closed category/platform taxonomy.
//!
//! The surrounding application used to pass free-form strings around;
//! the engine accepts only these values. Unknown inputs are rejected at
//! the parse boundary, not silently coerced.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Trend category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Political,
    Finance,
    Fashion,
    Meme,
    Gaming,
    Lifestyle,
    Health,
    Music,
    Brand,
    SocialCause,
    Other,
}

impl Category {
    pub const ALL: &'static [Category] = &[
        Category::Political,
        Category::Finance,
        Category::Fashion,
        Category::Meme,
        Category::Gaming,
        Category::Lifestyle,
        Category::Health,
        Category::Music,
        Category::Brand,
        Category::SocialCause,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Political => "political",
            Category::Finance => "finance",
            Category::Fashion => "fashion",
            Category::Meme => "meme",
            Category::Gaming => "gaming",
            Category::Lifestyle => "lifestyle",
            Category::Health => "health",
            Category::Music => "music",
            Category::Brand => "brand",
            Category::SocialCause => "social_cause",
            Category::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| EngineError::UnknownCategory(s.to_string()))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source platform of a trend observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Tiktok,
    Instagram,
    Twitter,
    Youtube,
    Reddit,
    Linkedin,
    Unknown,
}

impl Platform {
    pub const ALL: &'static [Platform] = &[
        Platform::Tiktok,
        Platform::Instagram,
        Platform::Twitter,
        Platform::Youtube,
        Platform::Reddit,
        Platform::Linkedin,
        Platform::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Youtube => "youtube",
            Platform::Reddit => "reddit",
            Platform::Linkedin => "linkedin",
            Platform::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        Platform::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| EngineError::UnknownPlatform(s.to_string()))
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
