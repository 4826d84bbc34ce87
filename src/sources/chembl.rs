//! ChEMBL bioactivity database: compound search, target search and activity lookup.
//!
//! All three tools share one `ChemblApi` (client plus base URL).

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::ChemblConfig;
use crate::models::{
    default_max_results, Activity, Compound, ParamSpec, Query, Record, Target, ToolDescriptor,
};
use crate::sources::{parse_query, require_text, Source, SourceError};
use crate::utils::HttpClient;

const NAME: &str = "ChEMBL";
const PROVIDER: &str = "chembl";
const CHEMBL_ID_PATTERN: &str = r"^CHEMBL\d+$";

/// Client and base URL shared by the ChEMBL tools
#[derive(Debug, Clone)]
struct ChemblApi {
    client: HttpClient,
    base_url: String,
}

impl ChemblApi {
    fn new(config: &ChemblConfig, client: HttpClient) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let url = format!("{}/{}", self.base_url, resource);
        self.client.get_json(NAME, &url, params).await
    }
}

fn max_results_param() -> ParamSpec {
    ParamSpec::integer("max_results", "Maximum number of records to return")
        .default_value(default_max_results())
        .range(1, 100)
}

/// ChEMBL sends decimals as strings ("12.5"), numbers or null
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Identifiers arrive as integers (activity_id) or strings
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

// ========== COMPOUNDS ==========

#[derive(Debug, Deserialize)]
struct CompoundParams {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct MoleculeResponse {
    molecules: Vec<MoleculeRow>,
}

#[derive(Debug, Deserialize)]
struct MoleculeRow {
    molecule_chembl_id: Option<String>,
    pref_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    max_phase: Option<f64>,
    molecule_structures: Option<MoleculeStructures>,
    molecule_properties: Option<MoleculeProperties>,
}

#[derive(Debug, Deserialize)]
struct MoleculeStructures {
    canonical_smiles: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MoleculeProperties {
    full_molformula: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    full_mwt: Option<f64>,
}

impl MoleculeRow {
    fn into_compound(self) -> Result<Compound, SourceError> {
        Ok(Compound {
            chembl_id: require_text(NAME, self.molecule_chembl_id, "molecule_chembl_id")?,
            pref_name: self.pref_name,
            smiles: self.molecule_structures.and_then(|s| s.canonical_smiles),
            max_phase: self.max_phase,
            molecular_formula: self
                .molecule_properties
                .as_ref()
                .and_then(|p| p.full_molformula.clone()),
            molecular_weight: self.molecule_properties.and_then(|p| p.full_mwt),
        })
    }
}

/// `search_compounds`: free-text molecule search
#[derive(Debug, Clone)]
pub struct CompoundSearchSource {
    api: ChemblApi,
    descriptor: ToolDescriptor,
}

impl CompoundSearchSource {
    pub fn new(config: &ChemblConfig, client: HttpClient) -> Self {
        let descriptor = ToolDescriptor::new(
            "search_compounds",
            "Search ChEMBL molecules by name or synonym. Returns ChEMBL ids, preferred \
             names, canonical SMILES, maximum clinical phase and molecular properties.",
        )
        .param(
            ParamSpec::string("query", "Compound name, synonym or ChEMBL id, e.g. 'lapatinib'")
                .required(),
        )
        .param(max_results_param());

        Self {
            api: ChemblApi::new(config, client),
            descriptor,
        }
    }

    fn parse(body: MoleculeResponse) -> Result<Vec<Record>, SourceError> {
        body.molecules
            .into_iter()
            .map(|row| row.into_compound().map(Record::Compound))
            .collect()
    }
}

#[async_trait]
impl Source for CompoundSearchSource {
    fn id(&self) -> &str {
        "search_compounds"
    }

    fn provider(&self) -> &str {
        PROVIDER
    }

    fn name(&self) -> &str {
        "ChEMBL compound search"
    }

    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        let params: CompoundParams = parse_query(NAME, query)?;
        let body = self
            .api
            .get(
                "molecule/search.json",
                &[("q", params.query), ("limit", params.max_results.to_string())],
            )
            .await?;
        Self::parse(body)
    }
}

// ========== TARGETS ==========

#[derive(Debug, Deserialize)]
struct TargetParams {
    #[serde(alias = "gene")]
    query: String,
    #[serde(default)]
    organism: Option<String>,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TargetResponse {
    targets: Vec<TargetRow>,
}

#[derive(Debug, Deserialize)]
struct TargetRow {
    target_chembl_id: Option<String>,
    pref_name: Option<String>,
    organism: Option<String>,
    target_type: Option<String>,
}

impl TargetRow {
    fn into_target(self) -> Result<Target, SourceError> {
        Ok(Target {
            chembl_id: require_text(NAME, self.target_chembl_id, "target_chembl_id")?,
            pref_name: self.pref_name,
            organism: self.organism,
            target_type: self.target_type,
        })
    }
}

/// `search_targets`: free-text target search, optionally narrowed to one organism
#[derive(Debug, Clone)]
pub struct TargetSearchSource {
    api: ChemblApi,
    descriptor: ToolDescriptor,
}

impl TargetSearchSource {
    pub fn new(config: &ChemblConfig, client: HttpClient) -> Self {
        let descriptor = ToolDescriptor::new(
            "search_targets",
            "Search ChEMBL drug targets by gene or protein name. Returns target ChEMBL \
             ids for use with get_bioactivity.",
        )
        .param(
            ParamSpec::string("query", "Gene symbol or protein name, e.g. 'ERBB2'")
                .required()
                .alias("gene"),
        )
        .param(ParamSpec::string(
            "organism",
            "Keep only targets from this organism, e.g. 'Homo sapiens'",
        ))
        .param(max_results_param());

        Self {
            api: ChemblApi::new(config, client),
            descriptor,
        }
    }

    /// The search endpoint has no organism filter, so it is applied to the page
    fn parse(body: TargetResponse, organism: Option<&str>) -> Result<Vec<Record>, SourceError> {
        let wanted = organism
            .map(|o| o.trim().to_lowercase())
            .filter(|o| !o.is_empty());

        body.targets
            .into_iter()
            .map(TargetRow::into_target)
            .filter(|target| match (&wanted, target) {
                (Some(wanted), Ok(t)) => t
                    .organism
                    .as_deref()
                    .is_some_and(|o| o.to_lowercase().contains(wanted.as_str())),
                _ => true,
            })
            .map(|target| target.map(Record::Target))
            .collect()
    }
}

#[async_trait]
impl Source for TargetSearchSource {
    fn id(&self) -> &str {
        "search_targets"
    }

    fn provider(&self) -> &str {
        PROVIDER
    }

    fn name(&self) -> &str {
        "ChEMBL target search"
    }

    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        let params: TargetParams = parse_query(NAME, query)?;
        let body = self
            .api
            .get(
                "target/search.json",
                &[("q", params.query), ("limit", params.max_results.to_string())],
            )
            .await?;
        Self::parse(body, params.organism.as_deref())
    }
}

// ========== ACTIVITIES ==========

#[derive(Debug, Deserialize)]
struct ActivityParams {
    #[serde(default)]
    target_chembl_id: Option<String>,
    #[serde(default)]
    molecule_chembl_id: Option<String>,
    #[serde(default)]
    standard_type: Option<String>,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

impl ActivityParams {
    fn to_request(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(id) = &self.target_chembl_id {
            out.push(("target_chembl_id", id.clone()));
        }
        if let Some(id) = &self.molecule_chembl_id {
            out.push(("molecule_chembl_id", id.clone()));
        }
        if let Some(kind) = &self.standard_type {
            out.push(("standard_type", kind.clone()));
        }
        out.push(("limit", self.max_results.to_string()));
        out
    }
}

#[derive(Debug, Deserialize)]
struct ActivityResponse {
    activities: Vec<ActivityRow>,
}

#[derive(Debug, Deserialize)]
struct ActivityRow {
    #[serde(default, deserialize_with = "lenient_id")]
    activity_id: Option<String>,
    molecule_chembl_id: Option<String>,
    target_chembl_id: Option<String>,
    target_pref_name: Option<String>,
    assay_type: Option<String>,
    standard_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    standard_value: Option<f64>,
    standard_units: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pchembl_value: Option<f64>,
}

impl ActivityRow {
    fn into_activity(self) -> Result<Activity, SourceError> {
        Ok(Activity {
            activity_id: require_text(NAME, self.activity_id, "activity_id")?,
            molecule_chembl_id: require_text(NAME, self.molecule_chembl_id, "molecule_chembl_id")?,
            target_chembl_id: require_text(NAME, self.target_chembl_id, "target_chembl_id")?,
            target_name: self.target_pref_name,
            assay_type: self.assay_type,
            standard_type: self.standard_type,
            standard_value: self.standard_value,
            standard_units: self.standard_units,
            pchembl_value: self.pchembl_value,
        })
    }
}

/// `get_bioactivity`: measured activities for a target, a molecule or both
#[derive(Debug, Clone)]
pub struct BioactivitySource {
    api: ChemblApi,
    descriptor: ToolDescriptor,
}

impl BioactivitySource {
    pub fn new(config: &ChemblConfig, client: HttpClient) -> Result<Self, regex::Error> {
        let descriptor = ToolDescriptor::new(
            "get_bioactivity",
            "Get ChEMBL bioactivity measurements (IC50, Ki, EC50, ...) for a target, a \
             molecule or a target/molecule pair. Resolve names to ChEMBL ids first with \
             search_targets or search_compounds.",
        )
        .param(
            ParamSpec::string("target_chembl_id", "Target ChEMBL id, e.g. 'CHEMBL1824'")
                .pattern(CHEMBL_ID_PATTERN)?,
        )
        .param(
            ParamSpec::string("molecule_chembl_id", "Molecule ChEMBL id, e.g. 'CHEMBL554'")
                .pattern(CHEMBL_ID_PATTERN)?,
        )
        .param(ParamSpec::string(
            "standard_type",
            "Measurement type to keep, e.g. 'IC50'",
        ))
        .param(max_results_param())
        .at_least_one_of(&["target_chembl_id", "molecule_chembl_id"]);

        Ok(Self {
            api: ChemblApi::new(config, client),
            descriptor,
        })
    }

    fn parse(body: ActivityResponse) -> Result<Vec<Record>, SourceError> {
        body.activities
            .into_iter()
            .map(|row| row.into_activity().map(Record::Activity))
            .collect()
    }
}

#[async_trait]
impl Source for BioactivitySource {
    fn id(&self) -> &str {
        "get_bioactivity"
    }

    fn provider(&self) -> &str {
        PROVIDER
    }

    fn name(&self) -> &str {
        "ChEMBL bioactivity"
    }

    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        let params: ActivityParams = parse_query(NAME, query)?;
        if params.target_chembl_id.is_none() && params.molecule_chembl_id.is_none() {
            return Err(SourceError::invalid_query(
                NAME,
                "target_chembl_id or molecule_chembl_id is required",
            ));
        }

        let body = self.api.get("activity.json", &params.to_request()).await?;
        Self::parse(body)
    }
}
