//! `bo naf seed` handler.

use anyhow::{Context, Result};
use bo_config::ConfigMode;
use std::fs;
use std::path::Path;

use super::load_config;

/// `--table`, then `/naf/table`, then [`bo_naf::DEFAULT_TABLE`].
fn resolve_table(flag: Option<String>, config: &bo_config::LoadedConfig) -> String {
    flag.map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| config.str_at("/naf/table").map(str::to_string))
        .unwrap_or_else(|| bo_naf::DEFAULT_TABLE.to_string())
}

pub fn naf_seed(
    input: String,
    output: String,
    table: Option<String>,
    config_paths: Vec<String>,
) -> Result<()> {
    let loaded = load_config(&config_paths, ConfigMode::Seed)?;
    let table = resolve_table(table, &loaded);

    let records = bo_naf::parse_csv_file(Path::new(&input))
        .with_context(|| format!("naf seed: parse failed input={}", input))?;
    let sql = bo_naf::render_sql(&records, &table)?;

    if let Some(parent) = Path::new(&output).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir failed: {}", parent.display()))?;
        }
    }
    fs::write(&output, sql).with_context(|| format!("write failed: {}", output))?;

    println!("naf_records={}", records.len());
    println!("table={}", table);
    println!("output={}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_flag_wins_over_config() {
        let cfg = bo_config::load_layered_yaml_from_strings(&["naf:\n  table: ref_naf\n"]).unwrap();
        assert_eq!(resolve_table(Some("custom".into()), &cfg), "custom");
        assert_eq!(resolve_table(Some("  ".into()), &cfg), "ref_naf");
        assert_eq!(resolve_table(None, &cfg), "ref_naf");

        let empty = bo_config::LoadedConfig::defaults().unwrap();
        assert_eq!(resolve_table(None, &empty), bo_naf::DEFAULT_TABLE);
    }
}
