//! # Search Actions
//!
//! Request descriptions executed by a [`SearchClient`](super::SearchClient),
//! following the Elasticsearch REST layout (`/{index}/{type}/{id}`,
//! `/{indices}/_search`, ...), and the [`SearchResult`] they produce.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ClientError;
use crate::serializer::JsonSerializer;

/// Document type used when an action does not name one.
pub const DEFAULT_TYPE: &str = "_doc";

/// A single REST call against a search endpoint.
pub trait Action: Send + Sync {
    /// HTTP verb.
    fn method(&self) -> Method;

    /// Unencoded path segments below the server root.
    fn path_segments(&self) -> Vec<String>;

    /// Query string without the leading `?`.
    fn query(&self) -> Option<String> {
        None
    }

    /// Encoded request body, if the action carries one.
    fn payload(&self, serializer: &dyn JsonSerializer) -> Result<Option<Vec<u8>>, ClientError>;

    /// A short name used in log events.
    fn name(&self) -> &'static str;

    /// Human readable relative path, as used in log events.
    fn path(&self) -> String {
        let mut path = self.path_segments().join("/");
        if let Some(query) = self.query() {
            path.push('?');
            path.push_str(&query);
        }
        path
    }
}

/// Indexes one document.
#[derive(Debug, Clone)]
pub struct Index {
    source: Value,
    index: String,
    doc_type: String,
    id: Option<String>,
    refresh: bool,
}

impl Index {
    /// Starts an index action for any serializable document.
    pub fn builder<T: Serialize>(source: &T) -> Result<IndexBuilder, ClientError> {
        Ok(IndexBuilder {
            source: serde_json::to_value(source)?,
            index: None,
            doc_type: None,
            id: None,
            refresh: false,
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Builder for [`Index`].
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    source: Value,
    index: Option<String>,
    doc_type: Option<String>,
    id: Option<String>,
    refresh: bool,
}

impl IndexBuilder {
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Makes the document visible to search as soon as the call returns.
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Freezes the action. A missing index name becomes `default`.
    pub fn build(self) -> Index {
        Index {
            source: self.source,
            index: self.index.unwrap_or_else(|| "default".to_string()),
            doc_type: self.doc_type.unwrap_or_else(|| DEFAULT_TYPE.to_string()),
            id: self.id,
            refresh: self.refresh,
        }
    }
}

impl Action for Index {
    fn method(&self) -> Method {
        if self.id.is_some() {
            Method::PUT
        } else {
            Method::POST
        }
    }

    fn path_segments(&self) -> Vec<String> {
        let mut segments = vec![self.index.clone(), self.doc_type.clone()];
        segments.extend(self.id.clone());
        segments
    }

    fn query(&self) -> Option<String> {
        self.refresh.then(|| "refresh=true".to_string())
    }

    fn payload(&self, serializer: &dyn JsonSerializer) -> Result<Option<Vec<u8>>, ClientError> {
        Ok(Some(serializer.serialize(&self.source)?))
    }

    fn name(&self) -> &'static str {
        "index"
    }
}

/// Runs a query against one or more indices.
#[derive(Debug, Clone)]
pub struct Search {
    query: String,
    indices: Vec<String>,
    types: Vec<String>,
}

impl Search {
    /// Starts a search from a JSON query string.
    pub fn builder(query: impl Into<String>) -> SearchBuilder {
        SearchBuilder {
            query: query.into(),
            indices: Vec::new(),
            types: Vec::new(),
        }
    }
}

/// Builder for [`Search`].
#[derive(Debug, Clone)]
pub struct SearchBuilder {
    query: String,
    indices: Vec<String>,
    types: Vec<String>,
}

impl SearchBuilder {
    pub fn add_index(mut self, index: impl Into<String>) -> Self {
        self.indices.push(index.into());
        self
    }

    pub fn add_type(mut self, doc_type: impl Into<String>) -> Self {
        self.types.push(doc_type.into());
        self
    }

    pub fn build(self) -> Search {
        Search {
            query: self.query,
            indices: self.indices,
            types: self.types,
        }
    }
}

impl Action for Search {
    fn method(&self) -> Method {
        Method::POST
    }

    fn path_segments(&self) -> Vec<String> {
        let mut segments = Vec::new();
        if !self.indices.is_empty() {
            segments.push(self.indices.join(","));
        }
        if !self.types.is_empty() {
            if self.indices.is_empty() {
                segments.push("_all".to_string());
            }
            segments.push(self.types.join(","));
        }
        segments.push("_search".to_string());
        segments
    }

    fn payload(&self, _serializer: &dyn JsonSerializer) -> Result<Option<Vec<u8>>, ClientError> {
        // The query is already JSON; send it untouched.
        Ok(Some(self.query.clone().into_bytes()))
    }

    fn name(&self) -> &'static str {
        "search"
    }
}

/// Fetches a document by id.
#[derive(Debug, Clone)]
pub struct Get {
    index: String,
    doc_type: String,
    id: String,
}

impl Get {
    pub fn new(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: DEFAULT_TYPE.to_string(),
            id: id.into(),
        }
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = doc_type.into();
        self
    }
}

impl Action for Get {
    fn method(&self) -> Method {
        Method::GET
    }

    fn path_segments(&self) -> Vec<String> {
        vec![self.index.clone(), self.doc_type.clone(), self.id.clone()]
    }

    fn payload(&self, _serializer: &dyn JsonSerializer) -> Result<Option<Vec<u8>>, ClientError> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "get"
    }
}

/// Deletes a document, or a whole index when no id is given.
#[derive(Debug, Clone)]
pub struct Delete {
    index: String,
    doc_type: Option<String>,
    id: Option<String>,
}

impl Delete {
    pub fn document(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: Some(DEFAULT_TYPE.to_string()),
            id: Some(id.into()),
        }
    }

    pub fn index(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: None,
            id: None,
        }
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }
}

impl Action for Delete {
    fn method(&self) -> Method {
        Method::DELETE
    }

    fn path_segments(&self) -> Vec<String> {
        match &self.id {
            Some(id) => vec![
                self.index.clone(),
                self.doc_type.clone().unwrap_or_else(|| DEFAULT_TYPE.to_string()),
                id.clone(),
            ],
            None => vec![self.index.clone()],
        }
    }

    fn payload(&self, _serializer: &dyn JsonSerializer) -> Result<Option<Vec<u8>>, ClientError> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "delete"
    }
}

/// Outcome of an executed action.
///
/// Non-2xx answers are not errors: they come back with `succeeded == false`
/// and the server's error text in `error_message`.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The numeric HTTP status code.
    pub status: u16,
    /// True when the status code was in the 2xx range.
    pub succeeded: bool,
    /// The decoded response body (`Null` when empty).
    pub json: Value,
    /// Error description extracted from a failed response.
    pub error_message: Option<String>,
}

impl SearchResult {
    pub(crate) fn from_response(status: u16, json: Value) -> Self {
        let succeeded = (200..300).contains(&status);
        let error_message = if succeeded {
            None
        } else {
            Some(match json.get("error") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Object(obj)) => obj
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
                _ => format!("{} {}", status, json),
            })
        };
        Self {
            status,
            succeeded,
            json,
            error_message,
        }
    }

    /// Deserializes `_source` of every search hit.
    pub fn source_as_list<T: DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        let hits = match self.json.pointer("/hits/hits").and_then(Value::as_array) {
            Some(hits) => hits,
            None => return Ok(Vec::new()),
        };
        hits.iter()
            .filter_map(|hit| hit.get("_source"))
            .map(|source| serde_json::from_value(source.clone()))
            .collect()
    }

    /// Deserializes `_source` of a single-document response (e.g. a get).
    pub fn source_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.json
            .get("_source")
            .map(|source| serde_json::from_value(source.clone()))
            .transpose()
    }

    /// Total hit count reported by a search, accepting both the numeric and
    /// the `{ "value": n }` layouts.
    pub fn total_hits(&self) -> Option<u64> {
        match self.json.pointer("/hits/total")? {
            Value::Number(n) => n.as_u64(),
            Value::Object(obj) => obj.get("value").and_then(Value::as_u64),
            _ => None,
        }
    }
}
