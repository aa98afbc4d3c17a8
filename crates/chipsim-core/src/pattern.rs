//! Layer name patterns
//!
//! Mesh-size and material settings address layers by glob-like patterns where
//! `*` stands for any (possibly empty) substring. Everything else is literal.

use regex::Regex;

/// Return true if `layer_name` matches `layer_pattern` in full
pub fn match_layer(layer_name: &str, layer_pattern: &str) -> bool {
    let pattern = format!("^{}$", regex::escape(layer_pattern).replace(r"\*", ".*"));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(layer_name),
        Err(e) => {
            tracing::warn!("Unusable layer pattern '{}': {}", layer_pattern, e);
            false
        }
    }
}

/// Names from `layer_names` that match `layer_pattern`, in input order
pub fn matching_layers<'a, I>(layer_names: I, layer_pattern: &str) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    layer_names
        .into_iter()
        .filter(|name| match_layer(name, layer_pattern))
        .collect()
}
