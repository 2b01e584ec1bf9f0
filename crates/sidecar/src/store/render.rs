//! Render — typed shipper input syntax for artifacts.
//!
//! Artifacts are rendered from serde structs rather than an operator
//! template so that `read_paths` is a lossless round-trip of what was
//! written.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::collect::LogSourceSpec;

fn is_false(b: &bool) -> bool {
    !b
}

/// One shipper input block. Field set follows the filebeat input
/// sections the original deployment shipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipperInput {
    #[serde(rename = "type")]
    pub input_type: String,
    pub enabled: bool,
    pub paths: Vec<String>,
    pub scan_frequency: String,
    pub fields_under_root: bool,
    /// Set for stdout sources: lines are docker JSON log envelopes.
    #[serde(rename = "docker-json", default, skip_serializing_if = "is_false")]
    pub docker_json: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub format_options: BTreeMap<String, String>,
    pub fields: BTreeMap<String, String>,
    pub tail_files: bool,
    pub close_inactive: String,
    pub close_removed: bool,
    pub clean_removed: bool,
}

impl ShipperInput {
    fn from_spec(
        spec: &LogSourceSpec,
        identity: &BTreeMap<String, String>,
        output: &str,
    ) -> Self {
        let mut fields = spec.tags.clone();
        for (key, value) in identity {
            fields.insert(key.clone(), value.clone());
        }
        if !output.is_empty() {
            fields.insert("output".to_string(), output.to_string());
        }

        Self {
            input_type: "log".to_string(),
            enabled: true,
            paths: vec![spec.path()],
            scan_frequency: "10s".to_string(),
            fields_under_root: true,
            docker_json: spec.stdout,
            format: if spec.format == "nonex" {
                String::new()
            } else {
                spec.format.clone()
            },
            format_options: spec.format_props.clone(),
            fields,
            tail_files: false,
            close_inactive: "2h".to_string(),
            close_removed: true,
            clean_removed: true,
        }
    }
}

/// Render the full artifact document for one container.
pub fn render(
    specs: &[LogSourceSpec],
    identity: &BTreeMap<String, String>,
    output: &str,
) -> Result<String, serde_yaml::Error> {
    let inputs: Vec<ShipperInput> = specs
        .iter()
        .map(|spec| ShipperInput::from_spec(spec, identity, output))
        .collect();
    serde_yaml::to_string(&inputs)
}

/// Parse an artifact document back into the path globs it declares.
pub fn read_paths(document: &str) -> Result<Vec<String>, serde_yaml::Error> {
    #[derive(Deserialize)]
    struct InputPaths {
        #[serde(default)]
        paths: Vec<String>,
    }

    let inputs: Vec<InputPaths> = serde_yaml::from_str(document)?;
    Ok(inputs.into_iter().flat_map(|i| i.paths).collect())
}
