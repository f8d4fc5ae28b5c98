//! Sources command handler.

use clap::Args;
use citeflow_core::{config::AppConfig, AppResult};
use citeflow_prompt::{list_profiles, DEFAULT_PROFILE_ID};
use citeflow_rag::sources::SourceEntry;
use citeflow_rag::SourceCatalog;

/// List configured document sources
#[derive(Args, Debug)]
pub struct SourcesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SourcesCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let entries = SourceCatalog::read_entries(&config.workspace)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }

        if entries.is_empty() {
            println!(
                "No sources configured. Add entries to {}",
                SourceCatalog::catalog_path(&config.workspace).display()
            );
            return Ok(());
        }

        let profiles = list_profiles(&config.workspace).unwrap_or_default();
        for entry in &entries {
            println!("{}", describe(entry, &profiles));
        }

        Ok(())
    }
}

fn describe(entry: &SourceEntry, profiles: &[String]) -> String {
    let profile = match &entry.profile {
        Some(id) if profiles.contains(id) => id.clone(),
        Some(id) => format!("{} (missing)", id),
        None => DEFAULT_PROFILE_ID.to_string(),
    };
    format!(
        "{:<16} {:<8} {}  [profile: {}, documents: {}]",
        entry.id,
        entry.mode,
        entry.name,
        profile,
        entry.documents.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeflow_rag::SearchMode;
    use std::path::PathBuf;

    fn entry(profile: Option<&str>) -> SourceEntry {
        SourceEntry {
            id: "handbook".into(),
            name: "Employee Handbook".into(),
            mode: SearchMode::Keyword,
            profile: profile.map(str::to_string),
            documents: PathBuf::from("data/handbook.jsonl"),
        }
    }

    #[test]
    fn test_describe_default_profile() {
        let line = describe(&entry(None), &[]);
        assert!(line.starts_with("handbook"));
        assert!(line.contains("keyword"));
        assert!(line.contains(DEFAULT_PROFILE_ID));
        assert!(line.contains("data/handbook.jsonl"));
    }

    #[test]
    fn test_describe_missing_profile() {
        let profiles = vec!["other".to_string()];
        assert!(describe(&entry(Some("hr")), &profiles).contains("hr (missing)"));
        assert!(!describe(&entry(Some("other")), &profiles).contains("missing"));
    }
}
