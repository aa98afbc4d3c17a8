//! Post-processing of parameter sweeps
//!
//! A sweep produces one definition file per simulation. These helpers find the
//! parameters that actually change between the definitions and tabulate
//! per-simulation results against them.

use crate::error::Result;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Values of the varied parameters, keyed by definition file prefix
pub type ParameterValues = IndexMap<String, Vec<Option<Value>>>;

fn file_key(path: &Path) -> String {
    path.to_string_lossy().replace(".json", "")
}

fn parameters_of(path: &Path) -> Result<serde_json::Map<String, Value>> {
    let content = std::fs::read_to_string(path)?;
    let definition: Value = serde_json::from_str(&content)?;
    Ok(match definition.get("parameters") {
        Some(Value::Object(map)) => map.clone(),
        _ => {
            tracing::warn!("{} has no parameters section", path.display());
            serde_json::Map::new()
        }
    })
}

/// Find the parameters that differ between the definitions in `json_files`
///
/// Returns the varied parameter names (in order of first appearance) and, per
/// file prefix, the values of those parameters (`None` where a file does not
/// define one).
pub fn find_varied_parameters(json_files: &[PathBuf]) -> Result<(Vec<String>, ParameterValues)> {
    let mut nominal: IndexMap<String, Value> = IndexMap::new();
    let mut per_file: IndexMap<String, serde_json::Map<String, Value>> = IndexMap::new();
    for path in json_files {
        let parameters = parameters_of(path)?;
        for (k, v) in &parameters {
            nominal.insert(k.clone(), v.clone());
        }
        per_file.insert(file_key(path), parameters);
    }

    let parameters: Vec<String> = nominal
        .iter()
        .filter(|(k, v)| {
            per_file
                .values()
                .any(|params| params.get(k.as_str()).is_some_and(|value| value != *v))
        })
        .map(|(k, _)| k.clone())
        .collect();

    let values: ParameterValues = per_file
        .into_iter()
        .map(|(key, params)| {
            let row: Vec<Option<Value>> = parameters.iter().map(|p| params.get(p).cloned()).collect();
            (key, row)
        })
        .collect();

    Ok((parameters, values))
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn value_field(value: &Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Write `data` as CSV against the varied parameters
///
/// Columns are `key`, the parameters, then every layer name found in `data`
/// (sorted). Keys without data are skipped and missing layer values are 0.
pub fn tabulate_into_csv(
    file_name: &Path,
    data: &IndexMap<String, IndexMap<String, f64>>,
    parameters: &[String],
    parameter_values: &ParameterValues,
) -> Result<()> {
    let layer_names: BTreeSet<&str> = data
        .values()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let mut out = String::new();
    let header: Vec<String> = std::iter::once("key")
        .chain(parameters.iter().map(String::as_str))
        .chain(layer_names.iter().copied())
        .map(csv_field)
        .collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for (key, values) in parameter_values {
        let Some(row) = data.get(key) else {
            continue;
        };
        let mut fields = vec![csv_field(key)];
        fields.extend(values.iter().map(|v| csv_field(&value_field(v))));
        fields.extend(
            layer_names
                .iter()
                .map(|n| row.get(*n).copied().unwrap_or(0.0).to_string()),
        );
        out.push_str(&fields.join(","));
        out.push('\n');
    }

    std::fs::write(file_name, out)?;
    Ok(())
}
