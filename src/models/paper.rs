//! Paper record returned by the literature adapters.

use serde::{Deserialize, Serialize};

/// The literature index a paper was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperOrigin {
    PubMed,
    Arxiv,
}

impl PaperOrigin {
    /// Returns the display name of the index
    pub fn name(&self) -> &'static str {
        match self {
            PaperOrigin::PubMed => "PubMed",
            PaperOrigin::Arxiv => "arXiv",
        }
    }
}

impl std::fmt::Display for PaperOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A research paper from one of the literature indexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Index-specific identifier (PMID, arXiv ID)
    pub paper_id: String,

    /// Paper title
    pub title: String,

    /// Authors (semicolon-separated)
    pub authors: String,

    /// Abstract text
    pub r#abstract: String,

    /// Digital Object Identifier
    pub doi: Option<String>,

    /// Publication date as reported by the index
    pub published_date: Option<String>,

    /// Journal title
    pub journal: Option<String>,

    /// Paper page URL
    pub url: String,

    /// Direct PDF URL
    pub pdf_url: Option<String>,

    /// Categories (semicolon-separated)
    pub categories: Option<String>,

    /// Index the paper was found in
    pub origin: PaperOrigin,
}

impl Paper {
    /// Create a new paper with required fields
    pub fn new(paper_id: String, title: String, url: String, origin: PaperOrigin) -> Self {
        Self {
            paper_id,
            title,
            authors: String::new(),
            r#abstract: String::new(),
            doi: None,
            published_date: None,
            journal: None,
            url,
            pdf_url: None,
            categories: None,
            origin,
        }
    }

    /// Returns the author names as a vector
    pub fn author_list(&self) -> Vec<&str> {
        self.authors
            .split(';')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// One-line display form: first author, year, title, identifier
    pub fn summary(&self) -> String {
        let authors = self.author_list();
        let lead = match authors.len() {
            0 => String::new(),
            1 => format!("{} ", authors[0]),
            _ => format!("{} et al. ", authors[0]),
        };
        let year = self
            .published_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .map(|y| format!("({}) ", y))
            .unwrap_or_default();
        format!(
            "{}{}{} [{} {}]",
            lead,
            year,
            self.title,
            self.origin.name(),
            self.paper_id
        )
    }
}

/// Builder for constructing Paper objects
///
/// Optional setters ignore empty values so that missing upstream fields stay `None`.
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(
        paper_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        origin: PaperOrigin,
    ) -> Self {
        Self {
            paper: Paper::new(paper_id.into(), title.into(), url.into(), origin),
        }
    }

    /// Set authors
    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.paper.authors = authors.into();
        self
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.r#abstract = abstract_text.into();
        self
    }

    /// Set DOI
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.paper.doi = non_empty(doi.into());
        self
    }

    /// Set publication date
    pub fn published_date(mut self, date: impl Into<String>) -> Self {
        self.paper.published_date = non_empty(date.into());
        self
    }

    /// Set journal
    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.paper.journal = non_empty(journal.into());
        self
    }

    /// Set PDF URL
    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.paper.pdf_url = non_empty(url.into());
        self
    }

    /// Set categories
    pub fn categories(mut self, categories: impl Into<String>) -> Self {
        self.paper.categories = non_empty(categories.into());
        self
    }

    /// Build the Paper
    pub fn build(self) -> Paper {
        self.paper
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
