//! Command handler modules for bo-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod docs;
pub mod modules;
pub mod naf;

use anyhow::{Context, Result};
use bo_config::{report_unused_keys, ConfigMode, LoadedConfig, UnusedKeyPolicy};
use serde::Serialize;
use serde_json::Value;
use std::fs;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered config for `mode`, or the defaults when no path is given.
///
/// Unused keys are reported on stderr and never fail the command.
pub fn load_config(paths: &[String], mode: ConfigMode) -> Result<LoadedConfig> {
    if paths.is_empty() {
        return LoadedConfig::defaults();
    }
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = bo_config::load_layered_yaml(&path_refs)?;

    let report = report_unused_keys(mode, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS mode={} unused_leaf_keys={}",
            mode.as_str(),
            report.unused_leaf_pointers.len()
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            eprintln!("  unused={}", p);
        }
        let extra = report.unused_leaf_pointers.len().saturating_sub(50);
        if extra > 0 {
            eprintln!("  ... and {} more", extra);
        }
    }
    Ok(loaded)
}

/// Read a UTF-8 text file, stripping a leading BOM.
pub fn read_text(path: &str) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read failed: {}", path))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    String::from_utf8(bytes.to_vec()).with_context(|| format!("{} must be UTF-8 text", path))
}

/// Parse a JSON argument: inline JSON, or `@path` to read it from a file.
pub fn load_json_arg(flag: &str, raw: &str) -> Result<Value> {
    if let Some(path) = raw.strip_prefix('@') {
        let text = read_text(path)?;
        return serde_json::from_str(text.trim())
            .with_context(|| format!("{} file {} must contain valid JSON", flag, path));
    }
    serde_json::from_str(raw.trim()).with_context(|| format!("{} must be valid JSON", flag))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value).context("json serialize failed")?;
    println!("{}", s);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_json_is_trimmed() {
        let v = load_json_arg("--features", "  {\"a\": true} ").unwrap();
        assert_eq!(v, serde_json::json!({"a": true}));
    }

    #[test]
    fn invalid_json_names_the_flag() {
        let err = load_json_arg("--prior", "{nope").unwrap_err();
        assert!(err.to_string().contains("--prior"));
    }

    #[test]
    fn at_path_reads_file_and_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("f.json");
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"{\"clients\": 1}\n");
        fs::write(&p, bytes).unwrap();
        let v = load_json_arg("--features", &format!("@{}", p.display())).unwrap();
        assert_eq!(v, serde_json::json!({"clients": 1}));
    }
}
