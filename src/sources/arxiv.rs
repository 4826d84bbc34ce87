//! arXiv preprint search using the Atom export API.

use async_trait::async_trait;
use feed_rs::parser;
use serde::Deserialize;

use crate::config::ArxivConfig;
use crate::models::{
    default_max_results, Paper, PaperBuilder, PaperOrigin, ParamSpec, Query, Record,
    ToolDescriptor,
};
use crate::sources::{parse_query, require_text, Source, SourceError};
use crate::utils::HttpClient;

const NAME: &str = "arXiv";

/// Sort orders the export API understands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SortBy {
    #[default]
    Relevance,
    Submitted,
    Updated,
}

impl SortBy {
    fn as_api(&self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::Submitted => "submittedDate",
            SortBy::Updated => "lastUpdatedDate",
        }
    }
}

/// Query parameters accepted by `search_arxiv`
#[derive(Debug, Deserialize)]
struct ArxivParams {
    #[serde(alias = "keyword", alias = "gene")]
    query: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    sort_by: SortBy,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

/// arXiv research source
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: HttpClient,
    config: ArxivConfig,
    descriptor: ToolDescriptor,
}

impl ArxivSource {
    /// Create a new arXiv source
    pub fn new(config: &ArxivConfig, client: HttpClient) -> Self {
        let descriptor = ToolDescriptor::new(
            "search_arxiv",
            "Search arXiv preprints (q-bio, physics, cs and more). Returns papers with \
             title, authors, abstract, categories and PDF link.",
        )
        .param(
            ParamSpec::string("query", "Search terms matched against all fields")
                .required()
                .alias("keyword")
                .alias("gene"),
        )
        .param(ParamSpec::string("author", "Restrict to an author name"))
        .param(ParamSpec::string(
            "category",
            "arXiv category, e.g. 'q-bio.BM' or 'cs.LG'",
        ))
        .param(
            ParamSpec::string("sort_by", "Result ordering")
                .one_of(&["relevance", "submitted", "updated"])
                .default_value("relevance"),
        )
        .param(
            ParamSpec::integer("max_results", "Maximum number of papers to return")
                .default_value(default_max_results())
                .range(1, 100),
        );

        Self {
            client,
            config: config.clone(),
            descriptor,
        }
    }

    /// Build the `search_query` expression for the arXiv API
    fn build_search_query(params: &ArxivParams) -> String {
        let mut parts = vec![format!("all:{}", quote(&params.query))];

        if let Some(author) = params.author.as_deref().filter(|a| !a.trim().is_empty()) {
            parts.push(format!("au:{}", quote(author)));
        }

        if let Some(category) = params.category.as_deref().filter(|c| !c.trim().is_empty()) {
            parts.push(format!("cat:{}", category.trim()));
        }

        parts.join(" AND ")
    }

    /// Strip URL prefix and version suffix from an Atom entry id
    ///
    /// `http://arxiv.org/abs/2301.12345v2` becomes `2301.12345`, and old-style
    /// ids such as `q-bio/0401001v1` keep their archive prefix.
    fn parse_id(entry_id: &str) -> Option<String> {
        let id = entry_id.split("/abs/").nth(1)?.trim();
        let id = match id.rsplit_once('v') {
            Some((base, version))
                if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) =>
            {
                base
            }
            _ => id,
        };
        (!id.is_empty()).then(|| id.to_string())
    }

    /// Parse an Atom feed into papers
    fn parse_feed(&self, bytes: &[u8]) -> Result<Vec<Paper>, SourceError> {
        let feed = parser::parse(bytes)
            .map_err(|e| SourceError::malformed(NAME, format!("Atom feed: {}", e)))?;

        // the API reports bad queries as a single entry under /api/errors
        if let Some(error) = feed.entries.iter().find(|e| e.id.contains("/api/errors")) {
            let detail = error
                .summary
                .as_ref()
                .map(|s| s.content.trim().to_string())
                .unwrap_or_else(|| "query rejected".to_string());
            return Err(SourceError::unavailable(NAME, None, detail));
        }

        feed.entries.iter().map(|e| self.parse_entry(e)).collect()
    }

    /// Parse arXiv Atom feed entry into Paper
    fn parse_entry(&self, entry: &feed_rs::model::Entry) -> Result<Paper, SourceError> {
        let paper_id = require_text(NAME, Self::parse_id(&entry.id), "entry id")?;

        let title = require_text(
            NAME,
            entry.title.as_ref().map(|t| collapse_whitespace(&t.content)),
            &format!("title for {}", paper_id),
        )?;

        let authors = entry
            .authors
            .iter()
            .map(|a| a.name.trim())
            .collect::<Vec<_>>()
            .join("; ");

        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| collapse_whitespace(&s.content))
            .unwrap_or_default();

        let published_date = entry.published.or(entry.updated).map(|d| d.to_rfc3339());

        let categories = entry
            .categories
            .iter()
            .map(|c| c.term.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let pdf_url = entry
            .links
            .iter()
            .find(|l| {
                l.media_type.as_deref() == Some("application/pdf")
                    || l.title.as_deref() == Some("pdf")
            })
            .map(|l| l.href.clone())
            .unwrap_or_else(|| {
                format!("{}/{}", self.config.pdf_base_url.trim_end_matches('/'), paper_id)
            });

        let url = format!("https://arxiv.org/abs/{}", paper_id);

        Ok(PaperBuilder::new(paper_id, title, url, PaperOrigin::Arxiv)
            .authors(authors)
            .abstract_text(abstract_text)
            .published_date(published_date.unwrap_or_default())
            .pdf_url(pdf_url)
            .categories(categories)
            .build())
    }
}

fn quote(term: &str) -> String {
    let term = term.trim();
    if term.contains(char::is_whitespace) {
        format!("\"{}\"", term.replace('"', ""))
    } else {
        term.to_string()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        "search_arxiv"
    }

    fn provider(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        NAME
    }

    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        let params: ArxivParams = parse_query(NAME, query)?;

        let url = format!("{}/query", self.config.base_url.trim_end_matches('/'));
        let request_params = [
            ("search_query", Self::build_search_query(&params)),
            ("start", "0".to_string()),
            ("max_results", params.max_results.to_string()),
            ("sortBy", params.sort_by.as_api().to_string()),
            ("sortOrder", "descending".to_string()),
        ];

        let body = self.client.get_text(NAME, &url, &request_params).await?;
        let papers = self.parse_feed(body.as_bytes())?;

        Ok(papers.into_iter().map(Record::from).collect())
    }
}
