//! ClinicalTrials.gov registry (API v2): study search and single-study lookup.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ClinicalTrialsConfig;
use crate::models::{default_max_results, ParamSpec, Query, Record, ToolDescriptor, Trial};
use crate::sources::{parse_query, require_text, Source, SourceError};
use crate::utils::HttpClient;

const NAME: &str = "ClinicalTrials.gov";
const PROVIDER: &str = "clinicaltrials";

const STATUSES: &[&str] = &[
    "recruiting",
    "active_not_recruiting",
    "completed",
    "not_yet_recruiting",
    "terminated",
    "withdrawn",
    "suspended",
];

const PHASES: &[&str] = &["early_phase1", "phase1", "phase2", "phase3", "phase4", "na"];

/// Client plus URLs shared by the two trial tools
#[derive(Debug, Clone)]
struct TrialsApi {
    client: HttpClient,
    base_url: String,
    study_url: String,
}

impl TrialsApi {
    fn new(config: &ClinicalTrialsConfig, client: HttpClient) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            study_url: config.study_url.trim_end_matches('/').to_string(),
        }
    }

    fn to_trial(&self, study: Study) -> Result<Trial, SourceError> {
        let protocol = study.protocol_section.unwrap_or_default();
        let identification = protocol.identification_module.unwrap_or_default();

        let nct_id = require_text(NAME, identification.nct_id, "nctId")?;
        let title = require_text(
            NAME,
            identification.brief_title.or(identification.official_title),
            &format!("title for {}", nct_id),
        )?;

        let status = protocol.status_module.unwrap_or_default();
        let interventions = protocol
            .arms_interventions_module
            .map(|m| {
                m.interventions
                    .into_iter()
                    .filter_map(|i| match (i.kind, i.name) {
                        (Some(kind), Some(name)) => Some(format!("{}: {}", kind, name)),
                        (None, Some(name)) => Some(name),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Trial {
            url: format!("{}/{}", self.study_url, nct_id),
            nct_id,
            title,
            status: status.overall_status,
            phases: protocol
                .design_module
                .map(|d| d.phases)
                .unwrap_or_default(),
            sponsor: protocol
                .sponsor_collaborators_module
                .and_then(|s| s.lead_sponsor)
                .and_then(|s| s.name),
            summary: protocol.description_module.and_then(|d| d.brief_summary),
            conditions: protocol
                .conditions_module
                .map(|c| c.conditions)
                .unwrap_or_default(),
            interventions,
            start_date: status.start_date_struct.and_then(|d| d.date),
        })
    }
}

// ========== RESPONSE SHAPE ==========

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudiesPage {
    #[serde(default)]
    studies: Vec<Study>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Study {
    protocol_section: Option<ProtocolSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProtocolSection {
    identification_module: Option<IdentificationModule>,
    status_module: Option<StatusModule>,
    sponsor_collaborators_module: Option<SponsorModule>,
    description_module: Option<DescriptionModule>,
    conditions_module: Option<ConditionsModule>,
    design_module: Option<DesignModule>,
    arms_interventions_module: Option<ArmsInterventionsModule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentificationModule {
    nct_id: Option<String>,
    brief_title: Option<String>,
    official_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusModule {
    overall_status: Option<String>,
    start_date_struct: Option<DateStruct>,
}

#[derive(Debug, Deserialize)]
struct DateStruct {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SponsorModule {
    lead_sponsor: Option<Sponsor>,
}

#[derive(Debug, Deserialize)]
struct Sponsor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptionModule {
    brief_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConditionsModule {
    #[serde(default)]
    conditions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DesignModule {
    #[serde(default)]
    phases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ArmsInterventionsModule {
    #[serde(default)]
    interventions: Vec<Intervention>,
}

#[derive(Debug, Deserialize)]
struct Intervention {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
}

// ========== SEARCH ==========

#[derive(Debug, Deserialize)]
struct TrialSearchParams {
    #[serde(default, alias = "disease")]
    condition: Option<String>,
    #[serde(default, alias = "drug")]
    intervention: Option<String>,
    #[serde(default, alias = "keyword")]
    query: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    phase: Option<String>,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

impl TrialSearchParams {
    fn to_request(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(condition) = &self.condition {
            out.push(("query.cond", condition.clone()));
        }
        if let Some(intervention) = &self.intervention {
            out.push(("query.intr", intervention.clone()));
        }
        if let Some(term) = &self.query {
            out.push(("query.term", term.clone()));
        }
        if let Some(status) = &self.status {
            out.push(("filter.overallStatus", status.to_uppercase()));
        }
        if let Some(phase) = &self.phase {
            out.push(("filter.advanced", format!("AREA[Phase]{}", phase.to_uppercase())));
        }
        out.push(("pageSize", self.max_results.to_string()));
        out.push(("format", "json".to_string()));
        out
    }
}

/// `search_trials`: search registered studies by condition, intervention or free text
#[derive(Debug, Clone)]
pub struct TrialSearchSource {
    api: TrialsApi,
    descriptor: ToolDescriptor,
}

impl TrialSearchSource {
    pub fn new(config: &ClinicalTrialsConfig, client: HttpClient) -> Self {
        let descriptor = ToolDescriptor::new(
            "search_trials",
            "Search ClinicalTrials.gov studies by condition, intervention or free text. \
             Returns NCT ids, titles, status, phases, sponsors and interventions.",
        )
        .param(
            ParamSpec::string("condition", "Disease or condition, e.g. 'breast cancer'")
                .alias("disease"),
        )
        .param(
            ParamSpec::string("intervention", "Drug or other intervention, e.g. 'trastuzumab'")
                .alias("drug"),
        )
        .param(ParamSpec::string("query", "Free-text search over all study fields").alias("keyword"))
        .param(ParamSpec::string("status", "Overall recruitment status").one_of(STATUSES))
        .param(ParamSpec::string("phase", "Study phase").one_of(PHASES))
        .param(
            ParamSpec::integer("max_results", "Maximum number of studies to return")
                .default_value(default_max_results())
                .range(1, 100),
        )
        .at_least_one_of(&["condition", "intervention", "query"]);

        Self {
            api: TrialsApi::new(config, client),
            descriptor,
        }
    }

    fn parse(&self, page: StudiesPage) -> Result<Vec<Record>, SourceError> {
        page.studies
            .into_iter()
            .map(|study| self.api.to_trial(study).map(Record::Trial))
            .collect()
    }
}

#[async_trait]
impl Source for TrialSearchSource {
    fn id(&self) -> &str {
        "search_trials"
    }

    fn provider(&self) -> &str {
        PROVIDER
    }

    fn name(&self) -> &str {
        "ClinicalTrials.gov search"
    }

    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        let params: TrialSearchParams = parse_query(NAME, query)?;
        if params.condition.is_none() && params.intervention.is_none() && params.query.is_none() {
            return Err(SourceError::invalid_query(
                NAME,
                "one of condition, intervention or query is required",
            ));
        }

        let url = format!("{}/studies", self.api.base_url);
        let page: StudiesPage = self
            .api
            .client
            .get_json(NAME, &url, &params.to_request())
            .await?;
        self.parse(page)
    }
}

// ========== LOOKUP ==========

#[derive(Debug, Deserialize)]
struct TrialLookupParams {
    nct_id: String,
}

/// `get_trial`: fetch one study by NCT id
#[derive(Debug, Clone)]
pub struct TrialLookupSource {
    api: TrialsApi,
    descriptor: ToolDescriptor,
}

impl TrialLookupSource {
    pub fn new(config: &ClinicalTrialsConfig, client: HttpClient) -> Result<Self, regex::Error> {
        let descriptor = ToolDescriptor::new(
            "get_trial",
            "Get one ClinicalTrials.gov study by NCT id, with status, phases, sponsor, \
             summary, conditions and interventions.",
        )
        .param(
            ParamSpec::string("nct_id", "ClinicalTrials.gov identifier, e.g. 'NCT01234567'")
                .required()
                .pattern(r"^NCT\d{8}$")?,
        );

        Ok(Self {
            api: TrialsApi::new(config, client),
            descriptor,
        })
    }
}

#[async_trait]
impl Source for TrialLookupSource {
    fn id(&self) -> &str {
        "get_trial"
    }

    fn provider(&self) -> &str {
        PROVIDER
    }

    fn name(&self) -> &str {
        "ClinicalTrials.gov lookup"
    }

    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        let params: TrialLookupParams = parse_query(NAME, query)?;

        let url = format!(
            "{}/studies/{}",
            self.api.base_url,
            urlencoding::encode(params.nct_id.trim())
        );
        let study: Study = self
            .api
            .client
            .get_json(NAME, &url, &[("format", "json".to_string())])
            .await?;

        Ok(vec![Record::Trial(self.api.to_trial(study)?)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::sources::ErrorKind;
    use serde_json::json;

    fn api() -> TrialsApi {
        TrialsApi::new(
            &ClinicalTrialsConfig::default(),
            HttpClient::new(&HttpConfig::default()).unwrap(),
        )
    }

    fn study_json() -> serde_json::Value {
        json!({
            "protocolSection": {
                "identificationModule": {
                    "nctId": "NCT01234567",
                    "briefTitle": "Neratinib in HER2-Positive Breast Cancer",
                    "officialTitle": "A Phase 2 Study of Neratinib"
                },
                "statusModule": {
                    "overallStatus": "RECRUITING",
                    "startDateStruct": {"date": "2021-03", "type": "ACTUAL"}
                },
                "sponsorCollaboratorsModule": {"leadSponsor": {"name": "Example Oncology", "class": "INDUSTRY"}},
                "descriptionModule": {"briefSummary": "Evaluates neratinib."},
                "conditionsModule": {"conditions": ["Breast Cancer", "HER2-positive"]},
                "designModule": {"phases": ["PHASE2"]},
                "armsInterventionsModule": {
                    "interventions": [{"type": "DRUG", "name": "Neratinib"}, {"type": "OTHER"}]
                }
            },
            "hasResults": false
        })
    }

    #[test]
    fn test_to_trial() {
        let study: Study = serde_json::from_value(study_json()).unwrap();
        let trial = api().to_trial(study).unwrap();

        assert_eq!(trial.nct_id, "NCT01234567");
        assert_eq!(trial.title, "Neratinib in HER2-Positive Breast Cancer");
        assert_eq!(trial.status.as_deref(), Some("RECRUITING"));
        assert_eq!(trial.phases, vec!["PHASE2"]);
        assert_eq!(trial.sponsor.as_deref(), Some("Example Oncology"));
        assert_eq!(trial.conditions.len(), 2);
        assert_eq!(trial.interventions, vec!["DRUG: Neratinib"]);
        assert_eq!(trial.start_date.as_deref(), Some("2021-03"));
        assert_eq!(trial.url, "https://clinicaltrials.gov/study/NCT01234567");
    }

    #[test]
    fn test_study_without_nct_id_is_malformed() {
        let study: Study = serde_json::from_value(json!({
            "protocolSection": {"identificationModule": {"briefTitle": "Untitled"}}
        }))
        .unwrap();

        let err = api().to_trial(study).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_empty_page() {
        let page: StudiesPage = serde_json::from_value(json!({"studies": []})).unwrap();
        assert!(page.studies.is_empty());

        let page: StudiesPage = serde_json::from_value(json!({})).unwrap();
        assert!(page.studies.is_empty());
    }

    #[test]
    fn test_search_request_params() {
        let params = TrialSearchParams {
            condition: Some("breast cancer".to_string()),
            intervention: None,
            query: None,
            status: Some("recruiting".to_string()),
            phase: Some("phase2".to_string()),
            max_results: 10,
        };

        let request = params.to_request();
        assert!(request.contains(&("query.cond", "breast cancer".to_string())));
        assert!(request.contains(&("filter.overallStatus", "RECRUITING".to_string())));
        assert!(request.contains(&("filter.advanced", "AREA[Phase]PHASE2".to_string())));
        assert!(request.contains(&("pageSize", "10".to_string())));
    }
}
