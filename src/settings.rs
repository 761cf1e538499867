use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Configuration of an extraction run.
///
/// Every field is optional in JSON; missing fields take the defaults below.
///
/// ```json
/// { "merged_mesh_name": "body", "strict_alignment": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    /// Name of the group receiving the cleaned joint chains
    pub joint_group_name: String,
    /// Name of the group receiving the cleaned meshes
    pub mesh_group_name: String,
    /// Name of the merged mesh when more than one mesh is extracted
    pub merged_mesh_name: String,
    /// Fail with `AlignmentMismatch` instead of skipping the weight copy
    /// when source and target lists differ in length
    pub strict_alignment: bool,
    /// Make every short name unique before classifying
    pub rename_duplicates: bool,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            joint_group_name: "clean_joint_group".to_string(),
            mesh_group_name: "clean_mesh_group".to_string(),
            merged_mesh_name: "unite_mesh".to_string(),
            strict_alignment: false,
            rename_duplicates: false,
        }
    }
}

impl ExtractSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = ExtractSettings::from_json(r#"{ "strict_alignment": true }"#).unwrap();

        assert!(settings.strict_alignment);
        assert_eq!(settings.joint_group_name, "clean_joint_group");
        assert_eq!(settings.merged_mesh_name, "unite_mesh");
    }
}
