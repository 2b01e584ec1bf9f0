//! Compile — turns a container's prefixed labels into log-source specs.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::formats::FormatRegistry;
use super::tree::TreeNode;
use super::{CompileError, LogSourceSpec};

/// Fold qualifying env assignments into the label map.
///
/// `watchlog_app_format=json` becomes the label `watchlog.app.format`,
/// so env-declared sources and label-declared sources share one grammar.
pub fn fold_env_labels(prefix: &str, env: &[String], labels: &mut HashMap<String, String>) {
    let marker = format!("{}_", prefix);
    for assignment in env {
        if !assignment.starts_with(&marker) {
            continue;
        }
        if let Some((name, value)) = assignment.split_once('=') {
            labels.insert(name.replace('_', "."), value.to_string());
        }
    }
}

/// Parse a `k=v,k2=v2` tag declaration. Both sides of every pair are
/// trimmed and must be non-empty.
pub fn parse_tags(raw: &str) -> Result<BTreeMap<String, String>, CompileError> {
    let mut tags = BTreeMap::new();
    if raw.trim().is_empty() {
        return Ok(tags);
    }
    for pair in raw.split(',') {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| CompileError::MalformedTag(pair.trim().to_string()))?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return Err(CompileError::MalformedTag(pair.trim().to_string()));
        }
        tags.insert(key.to_string(), value.to_string());
    }
    Ok(tags)
}

/// Compile every log source a container declares under `prefix`.
///
/// Any malformed declaration fails the whole container: a partial
/// artifact could silently watch the wrong files.
pub fn compile(
    prefix: &str,
    labels: &HashMap<String, String>,
    json_log_path: &str,
    registry: &FormatRegistry,
) -> Result<Vec<LogSourceSpec>, CompileError> {
    let namespace = format!("{}.", prefix);

    // Lexicographic order guarantees parents are inserted before their
    // children and keeps artifact output stable.
    let mut keys: Vec<&String> = labels.keys().filter(|k| k.starts_with(&namespace)).collect();
    keys.sort();

    let mut root = TreeNode::default();
    for key in keys {
        let rest = &key[namespace.len()..];
        if rest.is_empty() {
            continue;
        }
        let segments: Vec<&str> = rest.split('.').collect();
        root.insert(&segments, &labels[key])?;
    }

    let mut specs = Vec::new();
    for (name, node) in &root.children {
        if let Some(spec) = compile_source(name, node, json_log_path, registry)? {
            specs.push(spec);
        }
    }
    Ok(specs)
}

fn compile_source(
    name: &str,
    node: &TreeNode,
    json_log_path: &str,
    registry: &FormatRegistry,
) -> Result<Option<LogSourceSpec>, CompileError> {
    let path = node.value.trim();
    if path.is_empty() {
        return Err(CompileError::EmptyPath(name.to_string()));
    }

    let mut tags = match node.child("tags") {
        Some(tags_node) => parse_tags(&tags_node.value)?,
        None => BTreeMap::new(),
    };

    let target = Some(node.child_value("target"))
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    // An absent format, or the literal "none", means raw collection.
    // The replacement node drops any stray property children on purpose.
    let format_node = match node.child("format") {
        Some(f) if !f.value.is_empty() && f.value != "none" => f.clone(),
        _ => TreeNode::new("nonex"),
    };

    let mut format = format_node.value.clone();
    let mut format_props = registry.validate(&format, &format_node)?;
    if format == "regexp" {
        let pattern = format_props
            .remove("pattern")
            .filter(|p| !p.is_empty())
            .ok_or(CompileError::MissingPattern)?;
        format = format!("/{}/", pattern);
    }

    // index/topic default to the target override, else the source name;
    // explicit tags always win.
    let default_topic = target.unwrap_or_else(|| name.to_string());
    tags.entry("index".to_string()).or_insert_with(|| default_topic.clone());
    tags.entry("topic".to_string()).or_insert_with(|| default_topic.clone());

    // Only stdout sources compile to a concrete spec today. A file-path
    // value passes validation but is not produced.
    if path != "stdout" {
        return Ok(None);
    }

    let log_path = Path::new(json_log_path);
    let file_name = log_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let host_dir = log_path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Some(LogSourceSpec {
        name: name.to_string(),
        host_dir,
        file_glob: format!("{}*", file_name),
        format,
        format_props,
        tags,
        stdout: true,
        time_sorted: false,
        log_type: "container".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG_PATH: &str = "/host/var/log/pods/containers/abc/abc-json.log";

    fn labels(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn compile_one(entries: &[(&str, &str)]) -> Result<Vec<LogSourceSpec>, CompileError> {
        compile("watchlog", &labels(entries), LOG_PATH, &FormatRegistry::standard())
    }

    #[test]
    fn test_empty_labels_compile_to_nothing() {
        let specs = compile_one(&[]).unwrap();
        assert!(specs.is_empty());
    }

    #[test]
    fn test_unrelated_labels_ignored() {
        let specs = compile_one(&[("io.kubernetes.pod.name", "web-1"), ("team", "infra")]).unwrap();
        assert!(specs.is_empty());
    }

    #[test]
    fn test_stdout_source_defaults() {
        let specs = compile_one(&[("watchlog.app", "stdout")]).unwrap();
        assert_eq!(specs.len(), 1);
        let spec = &specs[0];
        assert_eq!(spec.name, "app");
        assert!(spec.stdout);
        assert_eq!(spec.format, "nonex");
        assert_eq!(spec.host_dir, "/host/var/log/pods/containers/abc");
        assert_eq!(spec.file_glob, "abc-json.log*");
        assert_eq!(spec.tags.get("index").map(String::as_str), Some("app"));
        assert_eq!(spec.tags.get("topic").map(String::as_str), Some("app"));
        assert_eq!(spec.log_type, "container");
    }

    #[test]
    fn test_target_overrides_default_tags() {
        let specs = compile_one(&[
            ("watchlog.app", "stdout"),
            ("watchlog.app.target", "prod-app"),
        ])
        .unwrap();
        let spec = &specs[0];
        assert_eq!(spec.tags.get("index").map(String::as_str), Some("prod-app"));
        assert_eq!(spec.tags.get("topic").map(String::as_str), Some("prod-app"));
    }

    #[test]
    fn test_explicit_tags_always_win() {
        let specs = compile_one(&[
            ("watchlog.app", "stdout"),
            ("watchlog.app.target", "prod-app"),
            ("watchlog.app.tags", "index=custom,team=infra"),
        ])
        .unwrap();
        let spec = &specs[0];
        assert_eq!(spec.tags.get("index").map(String::as_str), Some("custom"));
        // topic was not set explicitly, so the target still applies
        assert_eq!(spec.tags.get("topic").map(String::as_str), Some("prod-app"));
        assert_eq!(spec.tags.get("team").map(String::as_str), Some("infra"));
    }

    #[test]
    fn test_malformed_tag_pair_rejected() {
        let err = compile_one(&[("watchlog.app", "stdout"), ("watchlog.app.tags", "index")])
            .unwrap_err();
        assert_eq!(err, CompileError::MalformedTag("index".to_string()));

        let err = compile_one(&[("watchlog.app", "stdout"), ("watchlog.app.tags", "index=")])
            .unwrap_err();
        assert!(matches!(err, CompileError::MalformedTag(_)));
    }

    #[test]
    fn test_tag_pairs_are_trimmed() {
        let specs = compile_one(&[
            ("watchlog.app", "stdout"),
            ("watchlog.app.tags", " index = idx , topic = tp "),
        ])
        .unwrap();
        let spec = &specs[0];
        assert_eq!(spec.tags.get("index").map(String::as_str), Some("idx"));
        assert_eq!(spec.tags.get("topic").map(String::as_str), Some("tp"));
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = compile_one(&[("watchlog.app", "")]).unwrap_err();
        assert_eq!(err, CompileError::EmptyPath("app".to_string()));
    }

    #[test]
    fn test_missing_parent_rejected() {
        // "watchlog.app.format" without "watchlog.app" never declares a
        // source named "app"; dropping the key silently would be worse.
        let err = compile_one(&[("watchlog.app.format", "json")]).unwrap_err();
        assert_eq!(err, CompileError::MissingParent("app".to_string()));
    }

    #[test]
    fn test_format_none_means_nonex() {
        let specs =
            compile_one(&[("watchlog.app", "stdout"), ("watchlog.app.format", "none")]).unwrap();
        assert_eq!(specs[0].format, "nonex");
    }

    #[test]
    fn test_json_format_with_properties() {
        let specs = compile_one(&[
            ("watchlog.app", "stdout"),
            ("watchlog.app.format", "json"),
            ("watchlog.app.format.time_key", "ts"),
        ])
        .unwrap();
        let spec = &specs[0];
        assert_eq!(spec.format, "json");
        assert_eq!(spec.format_props.get("time_key").map(String::as_str), Some("ts"));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = compile_one(&[("watchlog.app", "stdout"), ("watchlog.app.format", "xml")])
            .unwrap_err();
        assert_eq!(err, CompileError::UnknownFormat("xml".to_string()));
    }

    #[test]
    fn test_invalid_format_property_rejected() {
        let err = compile_one(&[
            ("watchlog.app", "stdout"),
            ("watchlog.app.format", "json"),
            ("watchlog.app.format.keys", "a,b"),
        ])
        .unwrap_err();
        assert!(matches!(err, CompileError::InvalidProperty { .. }));
    }

    #[test]
    fn test_regexp_pattern_wrapped_into_format() {
        let specs = compile_one(&[
            ("watchlog.app", "stdout"),
            ("watchlog.app.format", "regexp"),
            ("watchlog.app.format.pattern", r"^(?<time>\d+)"),
        ])
        .unwrap();
        let spec = &specs[0];
        assert_eq!(spec.format, r"/^(?<time>\d+)/");
        assert!(!spec.format_props.contains_key("pattern"));
    }

    #[test]
    fn test_regexp_missing_pattern_rejected() {
        let err = compile_one(&[("watchlog.app", "stdout"), ("watchlog.app.format", "regexp")])
            .unwrap_err();
        assert_eq!(err, CompileError::MissingPattern);
    }

    #[test]
    fn test_file_path_source_validated_but_unproduced() {
        let specs = compile_one(&[("watchlog.access", "/var/log/app/access.log")]).unwrap();
        assert!(specs.is_empty());

        // validation still applies to unproduced sources
        let err = compile_one(&[
            ("watchlog.access", "/var/log/app/access.log"),
            ("watchlog.access.format", "xml"),
        ])
        .unwrap_err();
        assert_eq!(err, CompileError::UnknownFormat("xml".to_string()));
    }

    #[test]
    fn test_multiple_sources_sorted_by_name() {
        let specs = compile_one(&[
            ("watchlog.zeta", "stdout"),
            ("watchlog.alpha", "stdout"),
        ])
        .unwrap();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_one_bad_source_fails_whole_container() {
        let err = compile_one(&[("watchlog.good", "stdout"), ("watchlog.bad", "")]).unwrap_err();
        assert_eq!(err, CompileError::EmptyPath("bad".to_string()));
    }

    #[test]
    fn test_fold_env_labels_rewrites_underscores() {
        let mut map = labels(&[("io.kubernetes.pod.name", "web-1")]);
        let env = vec![
            "watchlog_app=stdout".to_string(),
            "PATH=/usr/bin".to_string(),
            "watchlog_app_format=json".to_string(),
        ];
        fold_env_labels("watchlog", &env, &mut map);
        assert_eq!(map.get("watchlog.app").map(String::as_str), Some("stdout"));
        assert_eq!(map.get("watchlog.app.format").map(String::as_str), Some("json"));
        assert!(!map.contains_key("PATH"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_fold_env_labels_requires_prefix_and_assignment() {
        let mut map = HashMap::new();
        let env = vec!["watchlogapp=stdout".to_string(), "watchlog_app".to_string()];
        fold_env_labels("watchlog", &env, &mut map);
        assert!(map.is_empty());
    }

    #[test]
    fn test_parse_tags_round_trip() {
        let tags = parse_tags("a=1,b=2,c=3").unwrap();
        let rendered: Vec<String> = tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        assert_eq!(rendered, vec!["a=1", "b=2", "c=3"]);
    }
}
