//! bo-docs
//!
//! HR document generation: collaborator sheets and employment contracts.
//!
//! Records are turned into a format-independent [`DocModel`], laid out on A4
//! pages in millimetres ([`layout`]), and written as PDF with the standard
//! Helvetica fonts ([`render_pdf`]). Every page carries a page counter and a
//! generation timestamp in the configured timezone.

use std::fmt;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;

mod builders;
pub mod layout;
mod model;
mod render;

pub use builders::{collaborator_sheet, employment_contract, Collaborator, Employer, EmploymentContract};
pub use layout::{layout, wrap_text, PageLayout, PlacedText};
pub use model::{DocModel, Field, Section, SectionBody};
pub use render::{generated_on, page_label, render_pages, render_pdf, to_win_ansi};

pub const DEFAULT_TIMEZONE: &str = "Europe/Paris";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocsError {
    /// Configured timezone is not an IANA name.
    Timezone(String),
    /// PDF serialisation failed.
    Render(String),
}

impl fmt::Display for DocsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocsError::Timezone(tz) => write!(f, "unknown timezone '{tz}'"),
            DocsError::Render(msg) => write!(f, "pdf render failed: {msg}"),
        }
    }
}

impl std::error::Error for DocsError {}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSettings {
    pub timezone: Tz,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Paris,
        }
    }
}

impl DocumentSettings {
    /// Reads `/documents/timezone`; absent means Europe/Paris.
    pub fn from_config_json(config: &Value) -> Result<Self, DocsError> {
        match config.pointer("/documents/timezone").and_then(Value::as_str) {
            None => Ok(Self::default()),
            Some(name) => {
                let name = name.trim();
                let timezone = name
                    .parse::<Tz>()
                    .map_err(|_| DocsError::Timezone(name.to_string()))?;
                Ok(Self { timezone })
            }
        }
    }

    pub fn render(&self, model: &DocModel, generated_at: DateTime<Utc>) -> Result<Vec<u8>, DocsError> {
        render_pdf(model, generated_at, self.timezone)
    }
}
