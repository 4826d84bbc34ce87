//! Normalized result items returned by every source adapter.

use serde::{Deserialize, Serialize};

use super::paper::Paper;

/// A ChEMBL molecule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compound {
    pub chembl_id: String,
    pub pref_name: Option<String>,
    /// Canonical SMILES
    pub smiles: Option<String>,
    /// Highest clinical phase reached (4 = approved)
    pub max_phase: Option<f64>,
    pub molecular_formula: Option<String>,
    pub molecular_weight: Option<f64>,
}

/// A ChEMBL drug target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub chembl_id: String,
    pub pref_name: Option<String>,
    pub organism: Option<String>,
    pub target_type: Option<String>,
}

/// A single bioactivity measurement linking a compound to a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub activity_id: String,
    pub molecule_chembl_id: String,
    pub target_chembl_id: String,
    pub target_name: Option<String>,
    /// ChEMBL assay type code (B = binding, F = functional, A = ADMET, ...)
    pub assay_type: Option<String>,
    /// Measurement type, e.g. IC50, Ki
    pub standard_type: Option<String>,
    /// Potency value in `standard_units`
    pub standard_value: Option<f64>,
    pub standard_units: Option<String>,
    pub pchembl_value: Option<f64>,
}

/// A registered clinical study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub nct_id: String,
    pub title: String,
    pub status: Option<String>,
    pub phases: Vec<String>,
    pub sponsor: Option<String>,
    pub summary: Option<String>,
    pub conditions: Vec<String>,
    pub interventions: Vec<String>,
    pub start_date: Option<String>,
    pub url: String,
}

/// One ranked web search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    /// 1-based position in the provider's ranking
    pub rank: usize,
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub score: Option<f64>,
    pub published_date: Option<String>,
}

/// A direct answer synthesized by the web search provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
}

/// A normalized result item
///
/// There is no shared schema across variants beyond [`Record::summary`] and [`Record::id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Paper(Paper),
    Compound(Compound),
    Target(Target),
    Activity(Activity),
    Trial(Trial),
    WebResult(WebResult),
    Answer(Answer),
}

impl Record {
    /// Identifier of the underlying item, when it has one
    pub fn id(&self) -> Option<&str> {
        match self {
            Record::Paper(p) => Some(&p.paper_id),
            Record::Compound(c) => Some(&c.chembl_id),
            Record::Target(t) => Some(&t.chembl_id),
            Record::Activity(a) => Some(&a.activity_id),
            Record::Trial(t) => Some(&t.nct_id),
            Record::WebResult(w) => Some(&w.url),
            Record::Answer(_) => None,
        }
    }

    /// Human-readable one-liner used for display
    pub fn summary(&self) -> String {
        match self {
            Record::Paper(p) => p.summary(),
            Record::Compound(c) => {
                let mut line = c.chembl_id.clone();
                if let Some(name) = &c.pref_name {
                    line.push_str(&format!(" {}", name));
                }
                if let Some(phase) = c.max_phase {
                    line.push_str(&format!(" (max phase {})", phase));
                }
                if let Some(smiles) = &c.smiles {
                    line.push_str(&format!(" SMILES {}", smiles));
                }
                line
            }
            Record::Target(t) => format!(
                "{} {} ({}, {})",
                t.chembl_id,
                t.pref_name.as_deref().unwrap_or("unnamed target"),
                t.organism.as_deref().unwrap_or("unknown organism"),
                t.target_type.as_deref().unwrap_or("unknown type")
            ),
            Record::Activity(a) => {
                let potency = match (&a.standard_type, a.standard_value) {
                    (Some(kind), Some(value)) => format!(
                        "{} = {} {}",
                        kind,
                        value,
                        a.standard_units.as_deref().unwrap_or("")
                    ),
                    (Some(kind), None) => kind.clone(),
                    _ => "activity".to_string(),
                };
                format!(
                    "{} -> {}{}: {}",
                    a.molecule_chembl_id,
                    a.target_chembl_id,
                    a.target_name
                        .as_deref()
                        .map(|n| format!(" ({})", n))
                        .unwrap_or_default(),
                    potency.trim_end()
                )
            }
            Record::Trial(t) => {
                let phase = if t.phases.is_empty() {
                    "N/A".to_string()
                } else {
                    t.phases.join("/")
                };
                format!(
                    "{} [{}; {}] {}",
                    t.nct_id,
                    t.status.as_deref().unwrap_or("UNKNOWN"),
                    phase,
                    t.title
                )
            }
            Record::WebResult(w) => format!("{}. {} <{}>", w.rank, w.title, w.url),
            Record::Answer(a) => format!("Answer: {}", a.text),
        }
    }
}

impl From<Paper> for Record {
    fn from(paper: Paper) -> Self {
        Record::Paper(paper)
    }
}
