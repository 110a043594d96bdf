use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile id must not be empty")]
    EmptyId,

    #[error("profile '{0}' must declare at least one required field")]
    NoRequiredFields(String),

    #[error("profile '{0}' constrains categories but does not require a 'category' field")]
    CategoryFieldMissing(String),

    #[error("profile '{0}' prompt must not be empty")]
    EmptyPrompt(String),
}

/// A named processing profile: the single schema object driving the prompt,
/// the response contract, the cache key, and the CSV export layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingProfile {
    pub id: String,
    /// System prompt sent to the vision model
    pub prompt: String,
    /// Output fields the model response must contain, non-empty
    pub required_fields: Vec<String>,
    /// Permitted category values; empty means no category constraint
    #[serde(default)]
    pub categories: BTreeSet<String>,
    /// Column order for CSV export
    #[serde(default)]
    pub csv_columns: Vec<String>,
}

impl ProcessingProfile {
    /// Check the profile invariants before it enters the registry
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.id.trim().is_empty() {
            return Err(ProfileError::EmptyId);
        }

        if self.prompt.trim().is_empty() {
            return Err(ProfileError::EmptyPrompt(self.id.clone()));
        }

        if self.required_fields.is_empty() {
            return Err(ProfileError::NoRequiredFields(self.id.clone()));
        }

        if !self.categories.is_empty()
            && !self.required_fields.iter().any(|f| f == "category")
        {
            return Err(ProfileError::CategoryFieldMissing(self.id.clone()));
        }

        Ok(())
    }

    pub fn constrains_categories(&self) -> bool {
        !self.categories.is_empty()
    }

    /// Built-in profile mirroring the stock wallpaper-tagging prompt
    pub fn default_profile() -> Self {
        let categories: BTreeSet<String> = [
            "Animals",
            "Anime",
            "Cars & Vehicles",
            "Comics",
            "Designs",
            "Drawings",
            "Entertainment",
            "Funny",
            "Games",
            "Holidays",
            "Love",
            "Music",
            "Nature",
            "Other",
            "Patterns",
            "People",
            "Sayings",
            "Space",
            "Spiritual",
            "Sports",
            "Technology",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let category_list = categories
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "You MUST follow these rules:\n\
             1. Category MUST be exactly one of:\n{category_list}\n\
             2. Title: 30-60 chars, no filler words/punctuation\n\
             3. Description: 100-150 SEO-optimized chars\n\
             4. Tags: 10 comma-separated single words"
        );

        Self {
            id: "default".to_string(),
            prompt,
            required_fields: vec![
                "title".to_string(),
                "description".to_string(),
                "tags".to_string(),
                "category".to_string(),
            ],
            categories,
            csv_columns: vec![
                "title".to_string(),
                "description".to_string(),
                "tags".to_string(),
                "category".to_string(),
            ],
        }
    }
}
