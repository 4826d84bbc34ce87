//! Mock source for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{Paper, PaperOrigin, ParamSpec, Query, Record, ToolDescriptor};
use crate::sources::{Source, SourceError};

/// A mock source that returns a canned response and counts its calls.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    provider: String,
    descriptor: ToolDescriptor,
    response: Mutex<Result<Vec<Record>, SourceError>>,
    last_query: Mutex<Option<Query>>,
    calls: AtomicUsize,
}

impl MockSource {
    /// Create a mock tool named `id` taking a required `query` string
    pub fn new(id: &str) -> Self {
        let descriptor = ToolDescriptor::new(id, "Mock tool")
            .param(ParamSpec::string("query", "Search terms").required())
            .param(ParamSpec::integer("max_results", "Maximum results").default_value(10));

        Self {
            id: id.to_string(),
            provider: "mock".to_string(),
            descriptor,
            response: Mutex::new(Ok(Vec::new())),
            last_query: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Replace the descriptor; the tool name follows the descriptor
    pub fn with_descriptor(mut self, descriptor: ToolDescriptor) -> Self {
        self.id = descriptor.name.clone();
        self.descriptor = descriptor;
        self
    }

    pub fn with_provider(mut self, provider: &str) -> Self {
        self.provider = provider.to_string();
        self
    }

    /// Return these records from every call
    pub fn with_records(self, records: Vec<Record>) -> Self {
        self.set_response(Ok(records));
        self
    }

    /// Fail every call with this error
    pub fn with_error(self, error: SourceError) -> Self {
        self.set_response(Err(error));
        self
    }

    /// Set the response to return.
    pub fn set_response(&self, response: Result<Vec<Record>, SourceError>) {
        let mut guard = self.response.lock().unwrap_or_else(|e| e.into_inner());
        *guard = response;
    }

    /// Number of times `invoke` ran
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The query most recently passed to `invoke`
    pub fn last_query(&self) -> Option<Query> {
        self.last_query
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap_or_else(|e| e.into_inner()) = Some(query.clone());
        self.response
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Helper function to create a mock paper record for testing.
pub fn make_paper(paper_id: &str, title: &str, origin: PaperOrigin) -> Record {
    Record::Paper(Paper::new(
        paper_id.to_string(),
        title.to_string(),
        format!("http://example.com/{}", paper_id),
        origin,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::ErrorKind;

    #[tokio::test]
    async fn test_mock_returns_records_and_counts_calls() {
        let mock = MockSource::new("search_mock")
            .with_records(vec![make_paper("1", "First", PaperOrigin::PubMed)]);

        let query = Query::new().with("query", "HER2");
        let records = mock.invoke(&query).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(mock.calls(), 1);
        assert_eq!(mock.last_query(), Some(query));
    }

    #[tokio::test]
    async fn test_mock_error() {
        let mock = MockSource::new("search_mock")
            .with_error(SourceError::unavailable("Mock", Some(503), "down"));

        let err = mock.invoke(&Query::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    }
}
