//! Source profile types.
//!
//! A source profile is the identity and instruction bundle attached to a
//! retrieval target: who the assistant speaks as, in which tone, and the
//! preamble that opens every augmented prompt.

use serde::{Deserialize, Serialize};

/// Identifier of the profile used when a source names none.
pub const DEFAULT_PROFILE_ID: &str = "citeflow.default";

/// A source profile loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceProfile {
    /// Unique profile identifier
    pub id: String,

    /// Human-readable title, also the assistant's display name
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Behavioral settings
    pub behavior: ProfileBehavior,

    /// Optional system message sent ahead of the augmented prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Preamble template with Handlebars syntax
    pub preamble: String,
}

/// Behavioral settings for a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileBehavior {
    /// Tone (e.g., "professional", "casual", "technical")
    pub tone: String,

    /// Style (e.g., "concise", "detailed", "conversational")
    pub style: String,
}

impl Default for SourceProfile {
    fn default() -> Self {
        Self {
            id: DEFAULT_PROFILE_ID.to_string(),
            title: "Research Assistant".to_string(),
            api_version: "1.0".to_string(),
            created_by: "citeflow".to_string(),
            behavior: ProfileBehavior {
                tone: "professional".to_string(),
                style: "concise".to_string(),
            },
            system: None,
            preamble: "You are {{title}}, a {{tone}} assistant. Answer in a {{style}} style \
                       using only the {{sourceCount}} numbered sources below."
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_deserialization() {
        let yaml = r#"
id: handbook.assistant
title: Handbook Helper
apiVersion: "1.0"
createdBy: hr-team
behavior:
  tone: friendly
  style: detailed
system: "Never speculate about salaries."
preamble: "You are {{title}}."
"#;

        let profile: SourceProfile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(profile.id, "handbook.assistant");
        assert_eq!(profile.behavior.tone, "friendly");
        assert_eq!(
            profile.system.as_deref(),
            Some("Never speculate about salaries.")
        );
    }

    #[test]
    fn test_default_profile() {
        let profile = SourceProfile::default();
        assert_eq!(profile.id, DEFAULT_PROFILE_ID);
        assert!(profile.preamble.contains("{{sourceCount}}"));
        assert!(profile.system.is_none());
    }
}
