//! Document builders for HR records.
//!
//! Input records mirror the JSON the back-office stores for a collaborator
//! and a contract; every field is optional so partially filled records still
//! render. Empty sections drop out at layout time.

use serde::{Deserialize, Serialize};

use crate::model::{DocModel, Field, Section};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collaborator {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub nationality: Option<String>,
    pub address: Option<String>,
    pub social_security_number: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub manager: Option<String>,
    pub contract_type: Option<String>,
    pub hire_date: Option<String>,
    pub weekly_hours: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub notes: Option<String>,
}

impl Collaborator {
    pub fn full_name(&self) -> Option<String> {
        join_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Employer {
    pub company_name: Option<String>,
    pub legal_form: Option<String>,
    pub siret: Option<String>,
    pub naf_code: Option<String>,
    pub address: Option<String>,
    pub representative: Option<String>,
    pub representative_title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmploymentContract {
    pub employer: Employer,
    pub employee: Collaborator,
    /// `CDI`, `CDD`, apprenticeship...
    pub contract_type: Option<String>,
    pub job_title: Option<String>,
    pub classification: Option<String>,
    pub collective_agreement: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub trial_period: Option<String>,
    pub work_location: Option<String>,
    pub weekly_hours: Option<String>,
    pub gross_monthly_salary: Option<String>,
    pub benefits: Option<String>,
    pub clauses: Vec<String>,
    pub signature_place: Option<String>,
    pub signature_date: Option<String>,
}

fn join_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn field(label: &str, value: &Option<String>) -> Field {
    Field::new(label, value.clone())
}

/// One-page (usually) summary of a collaborator record.
pub fn collaborator_sheet(c: &Collaborator) -> DocModel {
    let title = match c.full_name() {
        Some(name) => format!("Collaborator sheet: {name}"),
        None => "Collaborator sheet".to_string(),
    };
    let mut doc = DocModel::new(title);
    if let Some(job) = non_blank(&c.job_title) {
        doc = doc.subtitle(job);
    }

    doc.section(Section::fields(
        "Identity",
        vec![
            field("First name", &c.first_name),
            field("Last name", &c.last_name),
            field("Date of birth", &c.birth_date),
            field("Nationality", &c.nationality),
            field("Social security no.", &c.social_security_number),
        ],
    ))
    .section(Section::fields(
        "Contact",
        vec![
            field("Email", &c.email),
            field("Phone", &c.phone),
            field("Address", &c.address),
        ],
    ))
    .section(Section::fields(
        "Position",
        vec![
            field("Job title", &c.job_title),
            field("Department", &c.department),
            field("Manager", &c.manager),
            field("Contract type", &c.contract_type),
            field("Hire date", &c.hire_date),
            field("Weekly hours", &c.weekly_hours),
        ],
    ))
    .section(Section::fields(
        "Emergency contact",
        vec![
            field("Name", &c.emergency_contact_name),
            field("Phone", &c.emergency_contact_phone),
        ],
    ))
    .section(Section::paragraphs(
        "Notes",
        c.notes.iter().cloned().collect(),
    ))
}

/// Employment contract between the employer and one collaborator.
pub fn employment_contract(k: &EmploymentContract) -> DocModel {
    let kind = non_blank(&k.contract_type);
    let title = match kind {
        Some(kind) => format!("Employment contract ({kind})"),
        None => "Employment contract".to_string(),
    };
    let mut doc = DocModel::new(title);
    let parties = match (non_blank(&k.employer.company_name), k.employee.full_name()) {
        (Some(company), Some(name)) => Some(format!("Between {company} and {name}")),
        _ => None,
    };
    if let Some(p) = parties {
        doc = doc.subtitle(p);
    }

    let employee_name = k.employee.full_name();
    let signatures: Vec<String> = {
        let mut lines = Vec::new();
        let place = non_blank(&k.signature_place);
        let date = non_blank(&k.signature_date);
        match (place, date) {
            (Some(p), Some(d)) => lines.push(format!("Signed in two copies at {p} on {d}.")),
            (Some(p), None) => lines.push(format!("Signed in two copies at {p}.")),
            (None, Some(d)) => lines.push(format!("Signed in two copies on {d}.")),
            (None, None) => {}
        }
        if let Some(rep) = non_blank(&k.employer.representative) {
            lines.push(format!("For the employer: {rep}"));
        }
        if let Some(name) = &employee_name {
            lines.push(format!("The employee: {name}"));
        }
        lines
    };

    doc.section(Section::fields(
        "Employer",
        vec![
            field("Company", &k.employer.company_name),
            field("Legal form", &k.employer.legal_form),
            field("SIRET", &k.employer.siret),
            field("NAF code", &k.employer.naf_code),
            field("Registered address", &k.employer.address),
            field("Represented by", &k.employer.representative),
            field("Acting as", &k.employer.representative_title),
        ],
    ))
    .section(Section::fields(
        "Employee",
        vec![
            Field::new("Name", employee_name.clone()),
            field("Date of birth", &k.employee.birth_date),
            field("Nationality", &k.employee.nationality),
            field("Address", &k.employee.address),
            field("Social security no.", &k.employee.social_security_number),
        ],
    ))
    .section(Section::fields(
        "Position",
        vec![
            field("Job title", &k.job_title),
            field("Classification", &k.classification),
            field("Collective agreement", &k.collective_agreement),
            field("Work location", &k.work_location),
        ],
    ))
    .section(Section::fields(
        "Term",
        vec![
            field("Contract type", &k.contract_type),
            field("Start date", &k.start_date),
            field("End date", &k.end_date),
            field("Trial period", &k.trial_period),
        ],
    ))
    .section(Section::fields(
        "Working time and pay",
        vec![
            field("Weekly hours", &k.weekly_hours),
            field("Gross monthly salary", &k.gross_monthly_salary),
            field("Benefits", &k.benefits),
        ],
    ))
    .section(Section::paragraphs("Clauses", k.clauses.clone()))
    .section(Section::paragraphs("Signatures", signatures))
}
