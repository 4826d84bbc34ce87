//! Integration tests for Drug Discovery MCP
//!
//! Every upstream API is replaced by a mockito server; the registry is built
//! from a config pointing all adapters at it.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use drug_discovery_mcp::chat::{self, AgentError, AgentSession, AppState, ChatMessage, DeltaStream};
use drug_discovery_mcp::config::{ChatConfig, Config};
use drug_discovery_mcp::mcp::{McpServer, ToolError, ToolRegistry};
use drug_discovery_mcp::models::Record;
use drug_discovery_mcp::sources::{ErrorKind, SourceRegistry};
use futures_util::StreamExt;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

/// Config with every adapter pointed at `base`
fn config_for(base: &str) -> Config {
    let mut config = Config::default();
    config.pubmed.base_url = base.to_string();
    config.arxiv.base_url = base.to_string();
    config.chembl.base_url = base.to_string();
    config.clinical_trials.base_url = base.to_string();
    config.tavily.base_url = base.to_string();
    config
}

fn tools_for(server: &ServerGuard) -> ToolRegistry {
    let sources = SourceRegistry::from_config(&config_for(&server.url())).unwrap();
    ToolRegistry::from_sources(sources)
}

const ESEARCH_TWO: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<eSearchResult>
  <Count>2</Count><RetMax>2</RetMax><RetStart>0</RetStart>
  <IdList><Id>39000002</Id><Id>39000001</Id></IdList>
</eSearchResult>"#;

// efetch returns the articles in PMID order, not relevance order
const EFETCH_TWO: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>39000001</PMID>
      <Article>
        <Journal><Title>Cancer Research</Title></Journal>
        <ArticleTitle><i>ERBB2</i> (HER2) amplification in breast cancer.</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>39000002</PMID>
      <Article>
        <Journal><Title>Nature Medicine</Title></Journal>
        <ArticleTitle>Trastuzumab deruxtecan in HER2-low disease.</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

async fn mock_pubmed(server: &mut ServerGuard, hits: usize) -> (mockito::Mock, mockito::Mock) {
    let esearch = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("db".into(), "pubmed".into()),
            Matcher::UrlEncoded("term".into(), "HER2".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(ESEARCH_TWO)
        .expect(hits)
        .create_async()
        .await;
    let efetch = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "39000002,39000001".into()))
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(EFETCH_TWO)
        .expect(hits)
        .create_async()
        .await;
    (esearch, efetch)
}

fn paper_ids(records: &[Record]) -> Vec<&str> {
    records
        .iter()
        .map(|r| match r {
            Record::Paper(p) => p.paper_id.as_str(),
            other => panic!("expected paper, got {other:?}"),
        })
        .collect()
}

#[tokio::test]
async fn test_literature_search_by_gene_returns_papers_in_upstream_order() {
    let mut server = Server::new_async().await;
    let (esearch, efetch) = mock_pubmed(&mut server, 1).await;
    let tools = tools_for(&server);

    let records = tools
        .invoke("search_pubmed", json!({"gene": "HER2"}))
        .await
        .unwrap();

    assert_eq!(paper_ids(&records), vec!["39000002", "39000001"]);
    match &records[0] {
        Record::Paper(p) => assert_eq!(p.title, "Trastuzumab deruxtecan in HER2-low disease."),
        _ => unreachable!(),
    }
    match &records[1] {
        Record::Paper(p) => assert_eq!(p.title, "ERBB2 (HER2) amplification in breast cancer."),
        _ => unreachable!(),
    }
    esearch.assert_async().await;
    efetch.assert_async().await;
}

#[tokio::test]
async fn test_trial_search_with_no_matches_is_empty() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/studies")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query.cond".into(), "breast cancer".into()),
            Matcher::UrlEncoded("filter.overallStatus".into(), "RECRUITING".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"studies": []}"#)
        .create_async()
        .await;
    let tools = tools_for(&server);

    let records = tools
        .invoke(
            "search_trials",
            json!({"condition": "breast cancer", "status": "recruiting"}),
        )
        .await
        .unwrap();

    assert!(records.is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_required_field_fails_before_any_request() {
    let mut server = Server::new_async().await;
    let any = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let tools = tools_for(&server);

    let err = tools.invoke("search_pubmed", json!({})).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    assert_eq!(err.field(), Some("query"));
    any.assert_async().await;
}

#[tokio::test]
async fn test_wrong_type_and_bad_pattern_are_schema_violations() {
    let mut server = Server::new_async().await;
    let any = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let tools = tools_for(&server);

    let err = tools
        .invoke("search_pubmed", json!({"query": "HER2", "max_results": "ten"}))
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("max_results"));

    let err = tools
        .invoke("get_trial", json!({"nct_id": "NCT123"}))
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("nct_id"));

    let err = tools
        .invoke("get_bioactivity", json!({"standard_type": "IC50"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    assert!(err.field().unwrap().contains("target_chembl_id"));

    any.assert_async().await;
}

#[tokio::test]
async fn test_same_query_twice_is_idempotent() {
    let mut server = Server::new_async().await;
    let (esearch, efetch) = mock_pubmed(&mut server, 2).await;
    let tools = tools_for(&server);

    let first = tools
        .invoke("search_pubmed", json!({"query": "HER2"}))
        .await
        .unwrap();
    let second = tools
        .invoke("search_pubmed", json!({"keyword": "HER2"}))
        .await
        .unwrap();

    assert_eq!(first, second);
    esearch.assert_async().await;
    efetch.assert_async().await;
}

#[tokio::test]
async fn test_failing_adapter_does_not_affect_another() {
    let mut server = Server::new_async().await;
    let _pubmed = mock_pubmed(&mut server, 1).await;
    server
        .mock("GET", "/activity.json")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;
    let tools = tools_for(&server);

    let err = tools
        .invoke("get_bioactivity", json!({"target_chembl_id": "CHEMBL1824"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    match &err {
        ToolError::Source(source) => assert_eq!(source.status(), Some(500)),
        other => panic!("unexpected error: {other:?}"),
    }

    let records = tools
        .invoke("search_pubmed", json!({"query": "HER2"}))
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_bioactivity_records() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/activity.json")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("target_chembl_id".into(), "CHEMBL1824".into()),
            Matcher::UrlEncoded("limit".into(), "10".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "activities": [{
                    "activity_id": 31863,
                    "molecule_chembl_id": "CHEMBL554",
                    "target_chembl_id": "CHEMBL1824",
                    "target_pref_name": "Receptor protein-tyrosine kinase erbB-2",
                    "assay_type": "B",
                    "standard_type": "IC50",
                    "standard_value": "9.2",
                    "standard_units": "nM",
                    "pchembl_value": "8.04"
                }],
                "page_meta": {"total_count": 1}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let tools = tools_for(&server);

    let records = tools
        .invoke("get_bioactivity", json!({"target_chembl_id": "CHEMBL1824"}))
        .await
        .unwrap();

    match records.as_slice() {
        [Record::Activity(a)] => {
            assert_eq!(a.activity_id, "31863");
            assert_eq!(a.molecule_chembl_id, "CHEMBL554");
            assert_eq!(a.standard_value, Some(9.2));
        }
        other => panic!("unexpected records: {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_trial_is_unavailable_not_empty() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/studies/NCT99999999")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body("not found")
        .create_async()
        .await;
    let tools = tools_for(&server);

    let err = tools
        .invoke("get_trial", json!({"nct_id": "NCT99999999"}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(err.to_failure("get_trial").tool, "get_trial");
}

#[tokio::test]
async fn test_web_search_without_key_fails_but_other_tools_remain() {
    let mut server = Server::new_async().await;
    let tavily = server
        .mock("POST", "/search")
        .expect(0)
        .create_async()
        .await;
    let tools = tools_for(&server);

    assert_eq!(tools.len(), 8);
    let err = tools
        .invoke("web_search", json!({"query": "HER2 inhibitors"}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
    tavily.assert_async().await;
}

#[tokio::test]
async fn test_web_search_answer_mode() {
    let mut server = Server::new_async().await;
    let mut config = config_for(&server.url());
    config.tavily.api_key = Some("tvly-test".to_string());
    server
        .mock("POST", "/search")
        .match_header("authorization", "Bearer tvly-test")
        .match_body(Matcher::PartialJson(json!({"include_answer": true, "max_results": 5})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "answer": "Tucatinib is an oral HER2 inhibitor.",
                "results": [{"title": "Tucatinib", "url": "https://example.org/t", "content": "..."}]
            })
            .to_string(),
        )
        .create_async()
        .await;
    let tools = ToolRegistry::from_sources(SourceRegistry::from_config(&config).unwrap());

    let records = tools
        .invoke("web_search", json!({"query": "HER2 inhibitor", "search_type": "answer"}))
        .await
        .unwrap();

    assert!(matches!(&records[0], Record::Answer(a) if a.text.starts_with("Tucatinib")));
    assert!(matches!(&records[1], Record::WebResult(w) if w.rank == 1));
}

#[tokio::test]
async fn test_provider_subset() {
    let mut sources = SourceRegistry::from_config(&Config::default()).unwrap();
    sources.retain_providers(&["chembl".to_string()]).unwrap();
    let tools = ToolRegistry::from_sources(sources);

    assert_eq!(
        tools.names().collect::<Vec<_>>(),
        vec!["get_bioactivity", "search_compounds", "search_targets"]
    );
    let err = tools
        .invoke("search_pubmed", json!({"query": "HER2"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownTool);
}

#[test]
fn test_mcp_server_builds_from_full_registry() {
    let sources = SourceRegistry::from_config(&Config::default()).unwrap();
    let server = McpServer::new(Arc::new(ToolRegistry::from_sources(sources)));
    assert!(server.is_ok());
}

#[test]
fn test_every_tool_schema_is_an_object() {
    let tools = ToolRegistry::from_sources(SourceRegistry::from_config(&Config::default()).unwrap());
    for descriptor in tools.descriptors() {
        let schema = descriptor.input_schema();
        assert_eq!(schema["type"], "object", "{}", descriptor.name);
        assert!(schema["properties"].is_object(), "{}", descriptor.name);
    }
}

#[derive(Debug)]
struct EchoAgent;

#[async_trait]
impl AgentSession for EchoAgent {
    async fn stream(
        &self,
        _model: &str,
        _reasoning: bool,
        messages: Vec<ChatMessage>,
    ) -> Result<DeltaStream, AgentError> {
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let parts = vec![Ok("You asked: ".to_string()), Ok(last)];
        Ok(futures_util::stream::iter(parts).boxed())
    }
}

#[tokio::test]
async fn test_chat_round_trip_through_router() {
    let app = chat::router(AppState::new(ChatConfig::default(), Arc::new(EchoAgent)));

    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"message": "Which trials target HER2?", "use_history": false}).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("event: done"));
    assert!(text.contains("You asked: Which trials target HER2?"));
}
