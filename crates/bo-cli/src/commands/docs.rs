//! `bo docs ...` handlers.

use anyhow::{Context, Result};
use bo_config::ConfigMode;
use bo_docs::{
    collaborator_sheet, employment_contract, Collaborator, DocModel, DocumentSettings,
    EmploymentContract,
};
use chrono::Utc;
use std::fs;
use std::path::Path;

use super::{load_config, read_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Collaborator,
    Contract,
}

impl DocKind {
    fn as_str(&self) -> &'static str {
        match self {
            DocKind::Collaborator => "collaborator",
            DocKind::Contract => "contract",
        }
    }

    fn build(&self, raw: &str) -> Result<DocModel> {
        match self {
            DocKind::Collaborator => {
                let c: Collaborator =
                    serde_json::from_str(raw).context("invalid collaborator json")?;
                Ok(collaborator_sheet(&c))
            }
            DocKind::Contract => {
                let k: EmploymentContract =
                    serde_json::from_str(raw).context("invalid contract json")?;
                Ok(employment_contract(&k))
            }
        }
    }
}

pub fn docs_render(
    kind: DocKind,
    input: String,
    output: String,
    config_paths: Vec<String>,
) -> Result<()> {
    let loaded = load_config(&config_paths, ConfigMode::Documents)?;
    let settings = DocumentSettings::from_config_json(&loaded.config_json)?;

    let raw = read_text(&input)?;
    let model = kind.build(&raw)?;
    let pages = bo_docs::layout(&model).len();
    let pdf = settings.render(&model, Utc::now())?;

    if let Some(parent) = Path::new(&output).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir failed: {}", parent.display()))?;
        }
    }
    fs::write(&output, &pdf).with_context(|| format!("write failed: {}", output))?;

    println!("document={}", kind.as_str());
    println!("pages={}", pages);
    println!("bytes={}", pdf.len());
    println!("output={}", output);
    Ok(())
}
