//! Declarative model of the CI build/test matrix.
//!
//! The schema core never executes these; an external job runner consumes
//! one [`BuildMatrix`] document and reports pass/fail per configuration.
//! Unknown fields are rejected on load so a typo in a matrix file fails
//! loudly instead of silently dropping a build step.

use serde::{Serialize, Deserialize};

/// One dataset fetched before tests run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataIngest {
    /// Source URL or URL pattern.
    pub source: String,
    /// Destination directory, relative to the workspace.
    pub dest_dir: String,
}

/// One entry of the job matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Node label the runner schedules this configuration on.
    pub node: String,
    pub name: String,
    /// `NAME=value` environment entries, applied in order.
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub conda_channels: Vec<String>,
    #[serde(default)]
    pub conda_packages: Vec<String>,
    /// Ordered build commands; the runner stops at the first failure.
    #[serde(default)]
    pub build_cmds: Vec<String>,
    #[serde(default)]
    pub test_cmds: Vec<String>,
    #[serde(default)]
    pub ingests: Vec<DataIngest>,
}

/// Job-level settings shared by every configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Credential ids the runner resolves out-of-band.
    #[serde(default)]
    pub credentials: Vec<String>,
    #[serde(default)]
    pub post_test_summary: bool,
}

/// The complete descriptor handed to the job runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildMatrix {
    #[serde(default)]
    pub configs: Vec<BuildConfig>,
    #[serde(default)]
    pub job: JobConfig,
}

impl BuildMatrix {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATRIX_JSON: &str = r#"{
        "configs": [
            {
                "node": "linux",
                "name": "egg",
                "build_cmds": ["python setup.py egg_info"]
            },
            {
                "node": "linux",
                "name": "release",
                "env": ["BUILD_MATRIX_SUFFIX=release"],
                "conda_channels": ["astropy-ci-extras", "defaults"],
                "conda_packages": ["python=3.9", "numpy", "astropy"],
                "build_cmds": ["python setup.py install"],
                "test_cmds": ["pytest --basetemp=tests_output"],
                "ingests": [
                    {"source": "ssb/ins/shared/calib/*.fits", "dest_dir": "calib"}
                ]
            }
        ],
        "job": {
            "credentials": ["codecov-token"],
            "post_test_summary": true
        }
    }"#;

    #[test]
    fn test_load_matrix() {
        let matrix = BuildMatrix::from_json(MATRIX_JSON).unwrap();
        assert_eq!(matrix.configs.len(), 2);
        assert_eq!(matrix.configs[1].conda_packages.len(), 3);
        assert_eq!(matrix.configs[1].ingests[0].dest_dir, "calib");
        assert!(matrix.job.post_test_summary);

        // Omitted lists default to empty.
        assert!(matrix.configs[0].env.is_empty());
        assert!(matrix.configs[0].test_cmds.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let bad = r#"{"configs": [{"node": "linux", "name": "x", "artifacts": []}]}"#;
        assert!(BuildMatrix::from_json(bad).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let matrix = BuildMatrix::from_json(MATRIX_JSON).unwrap();
        let again = BuildMatrix::from_json(&matrix.to_json().unwrap()).unwrap();
        assert_eq!(matrix, again);
    }
}
