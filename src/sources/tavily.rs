//! Tavily web search.
//!
//! The only adapter that needs a credential. Without a key the tool stays
//! registered and fails at call time with an authentication error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::TavilyConfig;
use crate::models::{Answer, ParamSpec, Query, Record, ToolDescriptor, WebResult};
use crate::sources::{parse_query, require_text, Source, SourceError};
use crate::utils::HttpClient;

const NAME: &str = "Tavily";

/// Search modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SearchType {
    /// Ranked web results
    #[default]
    General,
    /// Recent news, optionally limited to the last `days`
    News,
    /// Ranked results preceded by a synthesized answer
    Answer,
}

#[derive(Debug, Deserialize)]
struct WebSearchParams {
    #[serde(alias = "keyword")]
    query: String,
    #[serde(default)]
    search_type: SearchType,
    #[serde(default = "default_web_results")]
    max_results: usize,
    #[serde(default)]
    days: Option<u32>,
}

fn default_web_results() -> usize {
    5
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    topic: &'static str,
    search_depth: &'a str,
    max_results: usize,
    include_answer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<ResultRow>,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    title: Option<String>,
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    published_date: Option<String>,
}

/// `web_search`: general, news or answer-style web search
#[derive(Debug, Clone)]
pub struct TavilySource {
    client: HttpClient,
    config: TavilyConfig,
    descriptor: ToolDescriptor,
}

impl TavilySource {
    pub fn new(config: &TavilyConfig, client: HttpClient) -> Self {
        let descriptor = ToolDescriptor::new(
            "web_search",
            "Search the web with Tavily. 'general' returns ranked pages, 'news' returns \
             recent news articles, 'answer' adds a direct answer before the results.",
        )
        .param(ParamSpec::string("query", "Search query").required().alias("keyword"))
        .param(
            ParamSpec::string("search_type", "Kind of search")
                .one_of(&["general", "news", "answer"])
                .default_value("general"),
        )
        .param(
            ParamSpec::integer("max_results", "Maximum number of results")
                .default_value(default_web_results())
                .range(1, 20),
        )
        .param(
            ParamSpec::integer("days", "For news searches, how many days back to look")
                .range(1, 365),
        );

        Self {
            client,
            config: config.clone(),
            descriptor,
        }
    }

    fn build_request<'a>(&'a self, params: &'a WebSearchParams) -> SearchRequest<'a> {
        SearchRequest {
            query: &params.query,
            topic: match params.search_type {
                SearchType::News => "news",
                _ => "general",
            },
            search_depth: &self.config.search_depth,
            max_results: params.max_results,
            include_answer: params.search_type == SearchType::Answer,
            days: match params.search_type {
                SearchType::News => params.days,
                _ => None,
            },
        }
    }

    fn parse(body: SearchResponse, search_type: SearchType) -> Result<Vec<Record>, SourceError> {
        let mut records = Vec::with_capacity(body.results.len() + 1);

        if search_type == SearchType::Answer {
            match body.answer.filter(|a| !a.trim().is_empty()) {
                Some(text) => records.push(Record::Answer(Answer {
                    text: text.trim().to_string(),
                })),
                None => tracing::debug!("Tavily returned no answer"),
            }
        }

        for (index, row) in body.results.into_iter().enumerate() {
            let rank = index + 1;
            records.push(Record::WebResult(WebResult {
                rank,
                title: require_text(NAME, row.title, &format!("title of result {}", rank))?,
                url: require_text(NAME, row.url, &format!("url of result {}", rank))?,
                snippet: row.content.unwrap_or_default().trim().to_string(),
                score: row.score,
                published_date: row.published_date,
            }));
        }

        Ok(records)
    }
}

#[async_trait]
impl Source for TavilySource {
    fn id(&self) -> &str {
        "web_search"
    }

    fn provider(&self) -> &str {
        "tavily"
    }

    fn name(&self) -> &str {
        NAME
    }

    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::authentication(NAME, "TAVILY_API_KEY is not configured"))?;

        let params: WebSearchParams = parse_query(NAME, query)?;
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));

        let body: SearchResponse = self
            .client
            .post_json(NAME, &url, api_key, &self.build_request(&params))
            .await?;

        Self::parse(body, params.search_type)
    }
}
