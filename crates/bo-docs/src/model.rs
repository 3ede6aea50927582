//! Format-independent document model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocModel {
    pub title: String,
    pub subtitle: Option<String>,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum SectionBody {
    /// Labelled values; `None` or blank values are not printed.
    Fields(Vec<Field>),
    Paragraphs(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub label: String,
    pub value: Option<String>,
}

impl Field {
    pub fn new(label: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            label: label.into(),
            value: value.map(Into::into),
        }
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn printable(&self) -> Option<&str> {
        self.value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

impl Section {
    pub fn fields(heading: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            heading: heading.into(),
            body: SectionBody::Fields(fields),
        }
    }

    pub fn paragraphs(heading: impl Into<String>, paragraphs: Vec<String>) -> Self {
        Self {
            heading: heading.into(),
            body: SectionBody::Paragraphs(paragraphs),
        }
    }

    /// `true` when nothing in the section would be printed.
    pub fn is_empty(&self) -> bool {
        match &self.body {
            SectionBody::Fields(fields) => fields.iter().all(|f| f.printable().is_none()),
            SectionBody::Paragraphs(ps) => ps.iter().all(|p| p.trim().is_empty()),
        }
    }
}

impl DocModel {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            sections: Vec::new(),
        }
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }
}
