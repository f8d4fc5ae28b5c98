//! Loader for YAML source profiles.

use crate::types::SourceProfile;
use citeflow_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Directory holding profile files, relative to the workspace.
fn profiles_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".citeflow/profiles")
}

/// Load a source profile by ID from the workspace.
///
/// This function searches for a file named `<id>.yml` in the
/// `.citeflow/profiles/` directory.
///
/// # Example
/// ```no_run
/// use citeflow_prompt::load_profile;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let profile = load_profile(Path::new("."), "handbook.assistant")?;
/// println!("Loaded profile: {}", profile.title);
/// # Ok(())
/// # }
/// ```
pub fn load_profile(workspace_path: &Path, profile_id: &str) -> AppResult<SourceProfile> {
    let profile_file = profiles_dir(workspace_path).join(format!("{}.yml", profile_id));

    tracing::debug!("Loading profile from: {:?}", profile_file);

    if !profile_file.exists() {
        return Err(AppError::Prompt(format!(
            "Profile file not found: {:?}",
            profile_file
        )));
    }

    let contents = std::fs::read_to_string(&profile_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read profile file {:?}: {}",
            profile_file, e
        ))
    })?;

    let profile: SourceProfile = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse profile YAML {:?}: {}",
            profile_file, e
        ))
    })?;

    validate_profile(&profile)?;

    if profile.id != profile_id {
        tracing::warn!(
            "Profile file {:?} declares id '{}'",
            profile_file,
            profile.id
        );
    }

    tracing::debug!("Loaded profile: {} ({})", profile.id, profile.title);

    Ok(profile)
}

/// List all available profile IDs in the workspace.
pub fn list_profiles(workspace_path: &Path) -> AppResult<Vec<String>> {
    let dir = profiles_dir(workspace_path);

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut profile_ids = Vec::new();

    for entry in walkdir::WalkDir::new(&dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                profile_ids.push(stem.to_string());
            }
        }
    }

    profile_ids.sort();
    Ok(profile_ids)
}

/// Validate a profile.
pub fn validate_profile(profile: &SourceProfile) -> AppResult<()> {
    if profile.id.is_empty() {
        return Err(AppError::Prompt("Profile ID cannot be empty".to_string()));
    }

    if profile.title.is_empty() {
        return Err(AppError::Prompt("Profile title cannot be empty".to_string()));
    }

    if profile.preamble.trim().is_empty() {
        return Err(AppError::Prompt(
            "Profile preamble cannot be empty".to_string(),
        ));
    }

    if !profile.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            profile.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_profile(dir: &Path, id: &str, valid: bool) -> PathBuf {
        let dir = profiles_dir(dir);
        fs::create_dir_all(&dir).unwrap();

        let content = if valid {
            format!(
                r#"
id: {}
title: "Test Profile"
apiVersion: "1.0"
createdBy: test
behavior:
  tone: professional
  style: concise
preamble: "You are {{{{title}}}}."
"#,
                id
            )
        } else {
            "invalid: yaml: content:".to_string()
        };

        let file_path = dir.join(format!("{}.yml", id));
        fs::write(&file_path, content).unwrap();
        file_path
    }

    #[test]
    fn test_load_valid_profile() {
        let temp_dir = TempDir::new().unwrap();
        create_test_profile(temp_dir.path(), "test.profile", true);

        let profile = load_profile(temp_dir.path(), "test.profile").unwrap();
        assert_eq!(profile.id, "test.profile");
        assert_eq!(profile.title, "Test Profile");
        assert_eq!(profile.preamble, "You are {{title}}.");
    }

    #[test]
    fn test_load_nonexistent_profile() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_profile(temp_dir.path(), "nonexistent");
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        create_test_profile(temp_dir.path(), "invalid", false);

        assert!(load_profile(temp_dir.path(), "invalid").is_err());
    }

    #[test]
    fn test_list_profiles() {
        let temp_dir = TempDir::new().unwrap();
        create_test_profile(temp_dir.path(), "profile2", true);
        create_test_profile(temp_dir.path(), "profile1", true);

        let profiles = list_profiles(temp_dir.path()).unwrap();
        assert_eq!(profiles, vec!["profile1".to_string(), "profile2".to_string()]);
    }

    #[test]
    fn test_validate_rejects_bad_version() {
        let mut profile = SourceProfile::default();
        profile.api_version = "1".to_string();
        assert!(validate_profile(&profile).is_err());
    }
}
