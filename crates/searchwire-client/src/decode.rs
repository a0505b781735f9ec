//! Typed views of response bodies
//!
//! Decoding never fails the call: a body that does not match the expected
//! shape is logged at `ERROR` and the typed payload is left empty, while the
//! status and raw body remain available.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use searchwire_common::{RestResponse, Status};

pub(crate) fn decode_body<T: DeserializeOwned>(response: &RestResponse, what: &str) -> Option<T> {
    let body = response.body_str()?;
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(
                status = response.status.code(),
                error = %e,
                "Failed to decode {} response body",
                what
            );
            None
        }
    }
}

/// Acknowledgement returned by write and admin operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperateAck {
    #[serde(rename = "_index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged: Option<bool>,
}

/// Outcome of an index, delete, bulk or admin call.
#[derive(Debug, Clone, PartialEq)]
pub struct OperateResult {
    pub success: bool,
    pub status: Status,
    pub body: Option<String>,
    pub ack: Option<OperateAck>,
}

impl OperateResult {
    /// Success means a 2xx status and, if the body carries an `ok` or
    /// `acknowledged` flag, that flag being true.
    pub fn from_response(response: &RestResponse) -> Self {
        let ack: Option<OperateAck> = decode_body(response, "operate");
        let flagged_ok = ack
            .as_ref()
            .map(|a| a.ok.unwrap_or(true) && a.acknowledged.unwrap_or(true))
            .unwrap_or(true);

        Self {
            success: response.is_success() && flagged_ok,
            status: response.status,
            body: response.body.clone(),
            ack,
        }
    }
}

/// A single search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    #[serde(rename = "_type", default)]
    pub doc_type: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
    #[serde(default)]
    pub fields: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub took: Option<u64>,
    pub timed_out: Option<bool>,
    pub total: u64,
    pub max_score: Option<f64>,
    pub hits: Vec<Hit>,
}

// Older clusters report `total` as a number, newer ones as `{"value": n}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Total {
    Count(u64),
    Object { value: u64 },
}

#[derive(Deserialize)]
struct RawHits {
    #[serde(default)]
    total: Option<Total>,
    #[serde(default)]
    max_score: Option<f64>,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct RawSearch {
    #[serde(default)]
    took: Option<u64>,
    #[serde(default)]
    timed_out: Option<bool>,
    hits: RawHits,
}

impl From<RawSearch> for SearchHits {
    fn from(raw: RawSearch) -> Self {
        let total = match raw.hits.total {
            Some(Total::Count(n)) | Some(Total::Object { value: n }) => n,
            None => raw.hits.hits.len() as u64,
        };
        Self {
            took: raw.took,
            timed_out: raw.timed_out,
            total,
            max_score: raw.hits.max_score,
            hits: raw.hits.hits,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub status: Status,
    pub body: Option<String>,
    pub hits: Option<SearchHits>,
}

impl SearchResult {
    pub fn from_response(response: &RestResponse) -> Self {
        let hits = if response.is_success() {
            decode_body::<RawSearch>(response, "search").map(SearchHits::from)
        } else {
            None
        };
        Self {
            status: response.status,
            body: response.body.clone(),
            hits,
        }
    }

    /// Ids of the returned hits, in result order
    pub fn ids(&self) -> Vec<String> {
        self.hits
            .iter()
            .flat_map(|h| h.hits.iter())
            .filter_map(|hit| hit.id.clone())
            .collect()
    }

    pub fn total(&self) -> u64 {
        self.hits.as_ref().map(|h| h.total).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPayload {
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    #[serde(rename = "_type", default)]
    pub doc_type: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_version", default)]
    pub version: Option<u64>,
    #[serde(default, alias = "found")]
    pub exists: Option<bool>,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}

/// A fetched document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub status: Status,
    pub body: Option<String>,
    pub payload: Option<DocumentPayload>,
}

impl Document {
    pub fn from_response(response: &RestResponse) -> Self {
        Self {
            status: response.status,
            body: response.body.clone(),
            payload: decode_body(response, "document"),
        }
    }

    /// True when the cluster reported the document present.
    pub fn exists(&self) -> bool {
        match &self.payload {
            Some(payload) => payload.exists.unwrap_or(self.status.is_success()),
            None => false,
        }
    }

    pub fn source(&self) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.source.as_ref())
    }
}

/// Reads the `count` field of a count response.
pub fn decode_count(response: &RestResponse) -> Option<u64> {
    #[derive(Deserialize)]
    struct CountBody {
        count: u64,
    }

    if !response.is_success() {
        return None;
    }
    decode_body::<CountBody>(response, "count").map(|c| c.count)
}
