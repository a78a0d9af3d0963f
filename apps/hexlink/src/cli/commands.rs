//! # CLI Command Implementations
//!
//! Every command opens the store, runs one engine operation and prints
//! its result as pretty JSON on stdout. Logs and the banner go to stderr.

use crate::api;
use hexlink_core::{AuditLevel, FilterSpec, HexStore, HexlinkError, StoreConfig, Traversal};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Merge the config file (if any) with command-line overrides.
pub fn resolve_config(
    config_path: Option<&Path>,
    database: Option<PathBuf>,
    audit: Option<AuditLevel>,
) -> Result<StoreConfig, HexlinkError> {
    let mut config = match config_path {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(folder) = database {
        config.folder = Some(folder);
    }
    if let Some(level) = audit {
        config.audit_level = level;
    }
    Ok(config)
}

/// Parse a `--filter` argument: `{"<Type>": [{"Predicate": .., "TargetValue": ..}]}`.
pub fn parse_filter(filter: Option<&str>) -> Result<FilterSpec, HexlinkError> {
    match filter {
        Some(text) => serde_json::from_str(text)
            .map_err(|e| HexlinkError::SerializationError(format!("invalid --filter: {}", e))),
        None => Ok(FilterSpec::new()),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), HexlinkError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| HexlinkError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// INGEST COMMAND
// =============================================================================

/// Ingest every file, then persist the link filter even if one failed.
pub fn cmd_ingest(config: StoreConfig, files: &[PathBuf]) -> Result<(), HexlinkError> {
    let store = HexStore::open_with_config(config)?;

    let mut objects = 0;
    let mut first_error = None;
    for file in files {
        match store.ingest_file(file) {
            Ok(count) => objects += count,
            Err(e) => {
                tracing::error!(path = %file.display(), error = %e, "ingest failed");
                first_error.get_or_insert(e);
            }
        }
    }
    store.close()?;

    print_json(&serde_json::json!({ "files": files.len(), "objects": objects }))?;
    first_error.map_or(Ok(()), Err)
}

// =============================================================================
// QUERY COMMANDS
// =============================================================================

/// The lookup a query command performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Type(String),
    Value(String),
    Predicate(String),
}

pub fn cmd_get(config: StoreConfig, id: &str, filter: Option<&str>) -> Result<(), HexlinkError> {
    let filters = parse_filter(filter)?;
    let store = HexStore::open_with_config(config)?;
    print_json(&store.find_by_id(id, &filters)?)
}

pub fn cmd_query(
    config: StoreConfig,
    lookup: Lookup,
    filter: Option<&str>,
) -> Result<(), HexlinkError> {
    let filters = parse_filter(filter)?;
    let store = HexStore::open_with_config(config)?;
    let results = match lookup {
        Lookup::Type(object_type) => store.find_by_type(&object_type, &filters)?,
        Lookup::Value(term) => store.find_by_value(&term, &filters)?,
        Lookup::Predicate(path) => store.find_by_predicate(&path, &filters)?,
    };
    print_json(&results)
}

// =============================================================================
// TRAVERSE COMMAND
// =============================================================================

pub fn cmd_traverse(
    config: StoreConfig,
    id: Option<String>,
    value: Option<String>,
    spec: Vec<String>,
    filter: Option<&str>,
) -> Result<(), HexlinkError> {
    let filters = parse_filter(filter)?;
    let walk = Traversal::new(spec);
    let store = HexStore::open_with_config(config)?;
    let results = match (id, value) {
        (Some(id), None) => store.traversal_with_id(&id, &walk, &filters)?,
        (None, Some(value)) => store.traversal_with_value(&value, &walk, &filters)?,
        _ => {
            return Err(HexlinkError::InvalidTraversal(
                "exactly one of --id or --value is required".to_string(),
            ));
        }
    };
    print_json(&results)
}

// =============================================================================
// DELETE COMMAND
// =============================================================================

pub fn cmd_delete(config: StoreConfig, id: &str) -> Result<(), HexlinkError> {
    let store = HexStore::open_with_config(config)?;
    let result = store.delete(id);
    store.close()?;
    result?;
    print_json(&serde_json::json!({ "deleted": id }))
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

pub fn cmd_status(config: StoreConfig) -> Result<(), HexlinkError> {
    let store = HexStore::open_with_config(config)?;
    let stats = store.stats()?;
    print_json(&serde_json::json!({
        "database": store.config().folder().display().to_string(),
        "audit_level": store.config().audit_level.to_string(),
        "triples": stats.triples,
        "links": stats.links,
        "filter_values": stats.filter_values,
    }))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

pub async fn cmd_server(config: StoreConfig, host: &str, port: u16) -> Result<(), HexlinkError> {
    let store = HexStore::open_with_config(config)?;

    eprintln!("Hexlink server starting");
    eprintln!("  Database: {}", store.config().folder().display());
    eprintln!("  Address:  {}:{}", host, port);
    eprintln!("Press Ctrl+C to stop");

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, store).await
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn filter_argument_parses() {
        let spec = parse_filter(Some(
            r#"{"StudentPersonal": [{"Predicate": "Name", "TargetValue": "Ann"}]}"#,
        ))
        .expect("parse");
        assert_eq!(spec["StudentPersonal"][0].target_value, "Ann");

        assert!(parse_filter(None).expect("empty").is_empty());
        assert!(parse_filter(Some("[1, 2]")).is_err());
    }

    #[test]
    fn overrides_beat_config_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("hexlink.toml");
        std::fs::write(&path, "folder = \"/srv/a\"\naudit_level = \"basic\"\n").expect("write");

        let config = resolve_config(Some(&path), Some(PathBuf::from("/srv/b")), None)
            .expect("resolve");
        assert_eq!(config.folder(), PathBuf::from("/srv/b"));
        assert_eq!(config.audit_level, AuditLevel::Basic);

        let config = resolve_config(None, None, Some(AuditLevel::High)).expect("resolve");
        assert_eq!(config.audit_level, AuditLevel::High);
    }

    #[test]
    fn commands_run_against_a_folder() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("input.json");
        std::fs::write(
            &input,
            r#"[{"StudentPersonal": {"RefId": "S1"}}, {"TeachingGroup": {"RefId": "T1", "StudentRefId": "S1"}}]"#,
        )
        .expect("write");
        let config = || StoreConfig::for_folder(dir.path().join("db"));

        cmd_ingest(config(), &[input]).expect("ingest");
        cmd_traverse(
            config(),
            Some("S1".to_string()),
            None,
            vec!["StudentPersonal".to_string(), "TeachingGroup".to_string()],
            None,
        )
        .expect("traverse");
        cmd_delete(config(), "T1").expect("delete");

        let store = HexStore::open_with_config(config()).expect("open");
        assert_eq!(store.stats().expect("stats").links, 0);
    }
}
