//! PubMed literature search using the NCBI E-utilities API.
//!
//! One logical search is two requests: `esearch` resolves the term to PMIDs,
//! `efetch` returns the article records for those ids.

use async_trait::async_trait;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use serde::Deserialize;

use crate::config::PubMedConfig;
use crate::models::{
    default_max_results, Paper, PaperBuilder, PaperOrigin, ParamSpec, Query, Record,
    ToolDescriptor,
};
use crate::sources::{parse_query, require_text, Source, SourceError};
use crate::utils::HttpClient;

const NAME: &str = "PubMed";

/// Query parameters accepted by `search_pubmed`
#[derive(Debug, Deserialize)]
struct PubMedParams {
    #[serde(alias = "keyword", alias = "gene")]
    query: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    min_date: Option<String>,
    #[serde(default)]
    max_date: Option<String>,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

/// PubMed research source
#[derive(Debug, Clone)]
pub struct PubMedSource {
    client: HttpClient,
    config: PubMedConfig,
    descriptor: ToolDescriptor,
}

impl PubMedSource {
    /// Create a new PubMed source
    pub fn new(config: &PubMedConfig, client: HttpClient) -> Result<Self, regex::Error> {
        let descriptor = ToolDescriptor::new(
            "search_pubmed",
            "Search PubMed biomedical literature. Returns papers with title, authors, \
             journal, publication date, DOI and abstract.",
        )
        .param(
            ParamSpec::string(
                "query",
                "Search terms: gene, protein, compound or disease names, with optional \
                 PubMed field tags",
            )
            .required()
            .alias("keyword")
            .alias("gene"),
        )
        .param(ParamSpec::string("author", "Restrict to an author, e.g. 'Slamon DJ'"))
        .param(
            ParamSpec::string("min_date", "Earliest publication date (YYYY, YYYY/MM or YYYY/MM/DD)")
                .pattern(DATE_PATTERN)?,
        )
        .param(
            ParamSpec::string("max_date", "Latest publication date (YYYY, YYYY/MM or YYYY/MM/DD)")
                .pattern(DATE_PATTERN)?,
        )
        .param(
            ParamSpec::integer("max_results", "Maximum number of papers to return")
                .default_value(default_max_results())
                .range(1, 100),
        );

        Ok(Self {
            client,
            config: config.clone(),
            descriptor,
        })
    }

    fn endpoint(&self, utility: &str) -> String {
        format!("{}/{}.fcgi", self.config.base_url.trim_end_matches('/'), utility)
    }

    /// Parameters NCBI asks every request to carry
    fn identity_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("tool", self.config.tool.clone())];
        if let Some(email) = &self.config.email {
            params.push(("email", email.clone()));
        }
        if let Some(key) = &self.config.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// Build E-utilities search parameters
    fn search_params(&self, params: &PubMedParams) -> Vec<(&'static str, String)> {
        let term = match &params.author {
            Some(author) if !author.trim().is_empty() => {
                format!("({}) AND {}[Author]", params.query, author.trim())
            }
            _ => params.query.clone(),
        };

        let mut out = vec![
            ("db", "pubmed".to_string()),
            ("term", term),
            ("retmax", params.max_results.to_string()),
            ("retmode", "xml".to_string()),
        ];

        // E-utilities only honours a date range when both ends are given
        if params.min_date.is_some() || params.max_date.is_some() {
            out.push(("datetype", "pdat".to_string()));
            out.push((
                "mindate",
                params.min_date.clone().unwrap_or_else(|| "1800".to_string()),
            ));
            out.push((
                "maxdate",
                params.max_date.clone().unwrap_or_else(|| "3000".to_string()),
            ));
        }

        out.extend(self.identity_params());
        out
    }

    /// Parse E-utilities search response XML into PMIDs
    fn parse_search_response(xml: &str) -> Result<Vec<String>, SourceError> {
        #[derive(Debug, Deserialize)]
        struct ESearchResult {
            #[serde(rename = "IdList")]
            id_list: Option<IdList>,
            #[serde(rename = "ERROR")]
            error: Option<String>,
        }

        #[derive(Debug, Deserialize)]
        struct IdList {
            #[serde(rename = "Id", default)]
            ids: Vec<String>,
        }

        let result: ESearchResult = from_str(xml)
            .map_err(|e| SourceError::malformed(NAME, format!("esearch XML: {}", e)))?;

        match (result.id_list, result.error) {
            (_, Some(error)) => Err(SourceError::unavailable(NAME, None, error)),
            (Some(list), None) => Ok(list.ids),
            (None, None) => Err(SourceError::malformed(NAME, "esearch response has no IdList")),
        }
    }

    /// Parse E-utilities fetch response XML
    fn parse_fetch_response(xml: &str) -> Result<Vec<Paper>, SourceError> {
        let xml = strip_inline_markup(xml)?;
        let result: PubmedArticleSet = from_str(&xml).map_err(malformed_xml)?;

        if let Some(error) = result.error {
            return Err(SourceError::unavailable(NAME, None, error));
        }

        result.articles.into_iter().map(article_to_paper).collect()
    }
}

/// Formatting tags PubMed allows inside titles and abstracts
const INLINE_TAGS: &[&[u8]] = &[b"i", b"b", b"u", b"sup", b"sub", b"em", b"strong"];

fn is_inline(name: &[u8]) -> bool {
    INLINE_TAGS.contains(&name) || name.starts_with(b"mml:")
}

/// Drop inline formatting and MathML tags but keep their text, so each
/// title and abstract section reads as one text node.
fn strip_inline_markup(xml: &str) -> Result<String, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    loop {
        let event = reader.read_event().map_err(malformed_xml)?;
        match &event {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if is_inline(e.name().as_ref()) => continue,
            Event::End(e) if is_inline(e.name().as_ref()) => continue,
            _ => {}
        }
        writer.write_event(event).map_err(malformed_xml)?;
    }

    String::from_utf8(writer.into_inner()).map_err(malformed_xml)
}

fn malformed_xml(e: impl std::fmt::Display) -> SourceError {
    SourceError::malformed(NAME, format!("efetch XML: {}", e))
}

const DATE_PATTERN: &str = r"^\d{4}(/\d{2}(/\d{2})?)?$";

#[derive(Debug, Deserialize)]
struct PubmedArticleSet {
    #[serde(rename = "PubmedArticle", default)]
    articles: Vec<PubmedArticle>,
    #[serde(rename = "ERROR")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubmedArticle {
    MedlineCitation: Option<MedlineCitation>,
    PubmedData: Option<PubmedData>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct MedlineCitation {
    PMID: Option<Text>,
    Article: Option<Article>,
}

#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Article {
    Journal: Option<Journal>,
    ArticleTitle: Option<Text>,
    Abstract: Option<Abstract>,
    AuthorList: Option<AuthorList>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Journal {
    Title: Option<String>,
    JournalIssue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JournalIssue {
    PubDate: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubDate {
    Year: Option<String>,
    Month: Option<String>,
    Day: Option<String>,
    MedlineDate: Option<String>,
}

impl PubDate {
    fn render(&self) -> Option<String> {
        if let Some(year) = &self.Year {
            let parts: Vec<&str> = [Some(year), self.Month.as_ref(), self.Day.as_ref()]
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect();
            return Some(parts.join(" "));
        }
        self.MedlineDate.clone()
    }
}

#[derive(Debug, Deserialize)]
struct Abstract {
    #[serde(rename = "AbstractText", default)]
    sections: Vec<AbstractText>,
}

#[derive(Debug, Deserialize)]
struct AbstractText {
    #[serde(rename = "@Label")]
    label: Option<String>,
    #[serde(rename = "$text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Author {
    LastName: Option<String>,
    ForeName: Option<String>,
    CollectiveName: Option<String>,
}

impl Author {
    fn display(&self) -> String {
        if let Some(collective) = &self.CollectiveName {
            return collective.trim().to_string();
        }
        format!(
            "{} {}",
            self.ForeName.as_deref().unwrap_or(""),
            self.LastName.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubmedData {
    ArticleIdList: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "@IdType")]
    id_type: String,
    #[serde(rename = "$text", default)]
    value: String,
}

fn article_to_paper(article: PubmedArticle) -> Result<Paper, SourceError> {
    let citation = article.MedlineCitation;
    let pmid = require_text(
        NAME,
        citation.as_ref().and_then(|m| m.PMID.as_ref()).map(|p| p.value.clone()),
        "PMID",
    )?;

    let details = citation.and_then(|m| m.Article);
    let title = require_text(
        NAME,
        details
            .as_ref()
            .and_then(|a| a.ArticleTitle.as_ref())
            .map(|t| t.value.clone()),
        &format!("ArticleTitle for PMID {}", pmid),
    )?;

    let authors = details
        .as_ref()
        .and_then(|a| a.AuthorList.as_ref())
        .map(|list| {
            list.authors
                .iter()
                .map(Author::display)
                .filter(|name| !name.is_empty())
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_default();

    let abstract_text = details
        .as_ref()
        .and_then(|a| a.Abstract.as_ref())
        .map(|ab| {
            ab.sections
                .iter()
                .map(|s| match &s.label {
                    Some(label) => format!("{}: {}", label, s.text.trim()),
                    None => s.text.trim().to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let journal = details.as_ref().and_then(|a| a.Journal.as_ref());
    let journal_title = journal.and_then(|j| j.Title.clone()).unwrap_or_default();
    let published_date = journal
        .and_then(|j| j.JournalIssue.as_ref())
        .and_then(|ji| ji.PubDate.as_ref())
        .and_then(PubDate::render)
        .unwrap_or_default();

    let doi = article
        .PubmedData
        .as_ref()
        .and_then(|pd| pd.ArticleIdList.as_ref())
        .and_then(|list| list.ids.iter().find(|id| id.id_type == "doi"))
        .map(|id| id.value.clone())
        .unwrap_or_default();

    let url = format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid);

    Ok(PaperBuilder::new(pmid, title, url, PaperOrigin::PubMed)
        .authors(authors)
        .abstract_text(abstract_text)
        .journal(journal_title)
        .doi(doi)
        .published_date(published_date)
        .build())
}

#[async_trait]
impl Source for PubMedSource {
    fn id(&self) -> &str {
        "search_pubmed"
    }

    fn provider(&self) -> &str {
        "pubmed"
    }

    fn name(&self) -> &str {
        NAME
    }

    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        let params: PubMedParams = parse_query(NAME, query)?;

        let xml = self
            .client
            .get_text(NAME, &self.endpoint("esearch"), &self.search_params(&params))
            .await?;
        let ids = Self::parse_search_response(&xml)?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut fetch_params = vec![
            ("db", "pubmed".to_string()),
            ("id", ids.join(",")),
            ("retmode", "xml".to_string()),
        ];
        fetch_params.extend(self.identity_params());

        let xml = self
            .client
            .get_text(NAME, &self.endpoint("efetch"), &fetch_params)
            .await?;
        let mut papers = Self::parse_fetch_response(&xml)?;

        // keep esearch relevance order
        papers.sort_by_key(|p| ids.iter().position(|id| *id == p.paper_id).unwrap_or(usize::MAX));

        Ok(papers.into_iter().map(Record::from).collect())
    }
}
