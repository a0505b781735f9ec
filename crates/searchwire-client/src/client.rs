use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use searchwire_common::protocol::error::{Result, SearchwireError};
use searchwire_common::{Method, RestResponse, Status};

use crate::config::ConnectionBuilder;
use crate::decode::{self, Document, OperateResult, SearchResult};
use crate::executor::RestExecutor;
use crate::provider::ConnectionProvider;

/// Shard and replica counts for a new or modified index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexSettings {
    #[serde(rename = "number_of_shards")]
    pub shards: u32,
    #[serde(rename = "number_of_replicas")]
    pub replicas: u32,
}

impl IndexSettings {
    pub fn new(shards: u32, replicas: u32) -> Self {
        Self { shards, replicas }
    }

    fn to_body(self) -> Result<String> {
        Ok(serde_json::to_string(&json!({ "index": self }))?)
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self::new(5, 1)
    }
}

/// One action of a bulk request
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    Index {
        index: String,
        doc_type: String,
        id: String,
        source: Value,
    },
    Delete {
        index: String,
        doc_type: String,
        id: String,
    },
}

impl BulkOperation {
    fn write_to(&self, out: &mut String) -> Result<()> {
        match self {
            BulkOperation::Index {
                index,
                doc_type,
                id,
                source,
            } => {
                let action = json!({ "index": action_meta(index, doc_type, id)? });
                out.push_str(&serde_json::to_string(&action)?);
                out.push('\n');
                out.push_str(&serde_json::to_string(source)?);
                out.push('\n');
            }
            BulkOperation::Delete { index, doc_type, id } => {
                let action = json!({ "delete": action_meta(index, doc_type, id)? });
                out.push_str(&serde_json::to_string(&action)?);
                out.push('\n');
            }
        }
        Ok(())
    }
}

fn action_meta(index: &str, doc_type: &str, id: &str) -> Result<Value> {
    Ok(json!({
        "_index": index_name(index)?,
        "_type": non_empty(doc_type, "type")?,
        "_id": non_empty(id, "id")?,
    }))
}

/// A query-string search
///
/// ```
/// use searchwire_client::SearchRequest;
///
/// let request = SearchRequest::new("twitter", "user:kimchy")
///     .types(["tweet"])
///     .from(20)
///     .size(10)
///     .sort("date:desc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    indices: Vec<String>,
    types: Vec<String>,
    query: String,
    from: u32,
    size: u32,
    sort: Option<String>,
    fields: Vec<String>,
}

impl SearchRequest {
    pub fn new(index: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            indices: vec![index.into()],
            types: Vec::new(),
            query: query.into(),
            from: 0,
            size: 10,
            sort: None,
            fields: Vec::new(),
        }
    }

    pub fn indices<I, S>(mut self, indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indices = indices.into_iter().map(Into::into).collect();
        self
    }

    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn from(mut self, from: u32) -> Self {
        self.from = from;
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// `/{indices}[/{types}]/_search?q=..&from=..&size=..[&sort=..][&fields=..]`
    pub fn path(&self) -> Result<String> {
        if self.size == 0 {
            return Err(SearchwireError::InvalidRequest(
                "Search size must be greater than zero".to_string(),
            ));
        }
        let indices: Vec<&str> = self.indices.iter().map(String::as_str).collect();
        let types: Vec<&str> = self.types.iter().map(String::as_str).collect();

        let mut path = format!(
            "{}/_search?q={}&from={}&size={}",
            scope(&required_indices(&indices)?, &types)?,
            encode_query(&self.query)?,
            self.from,
            self.size
        );
        if let Some(sort) = &self.sort {
            path.push_str("&sort=");
            path.push_str(&urlencoding::encode(sort));
        }
        if !self.fields.is_empty() {
            path.push_str("&fields=");
            path.push_str(&urlencoding::encode(&self.fields.join(",")));
        }
        Ok(path)
    }
}

/// Convenience API over the [`RestExecutor`].
///
/// Builds paths and JSON bodies for document, search, admin, mapping and
/// template calls. Arguments are validated before any connection is made;
/// index names are lowercased and query strings URL-encoded.
///
/// There is no shared global client: construct one and share it behind an
/// `Arc` or by cloning (clones share the provider).
#[derive(Debug, Clone)]
pub struct SearchClient {
    executor: RestExecutor,
}

impl SearchClient {
    pub fn new(provider: Arc<ConnectionProvider>) -> Self {
        Self {
            executor: RestExecutor::new(provider),
        }
    }

    pub fn from_builder(builder: ConnectionBuilder) -> Result<Self> {
        Ok(Self::new(Arc::new(builder.build()?)))
    }

    pub fn executor(&self) -> &RestExecutor {
        &self.executor
    }

    // Documents

    /// Index `json` under `/{index}/{type}/{id}/`.
    pub fn index(&self, index: &str, doc_type: &str, id: &str, json: &str) -> Result<OperateResult> {
        let path = format!(
            "/{}/{}/{}/",
            index_segment(index)?,
            segment(doc_type, "type")?,
            segment(id, "id")?
        );
        let body = non_empty(json, "document body")?;
        self.operate(Method::Post, &path, Some(body))
    }

    /// Run several actions in one `/_bulk` request.
    ///
    /// Success is judged by the HTTP status alone: a 200 may still carry
    /// per-item failures in the body.
    pub fn bulk(&self, operations: &[BulkOperation]) -> Result<OperateResult> {
        if operations.is_empty() {
            return Err(SearchwireError::InvalidRequest(
                "Bulk request needs at least one operation".to_string(),
            ));
        }
        let mut body = String::new();
        for operation in operations {
            operation.write_to(&mut body)?;
        }

        let response = self.executor.post("/_bulk", Some(&body))?;
        let mut result = OperateResult::from_response(&response);
        result.success = response.status == Status::Ok;
        Ok(result)
    }

    /// Delete several ids of one type through `/_bulk`.
    pub fn delete_many(&self, index: &str, doc_type: &str, ids: &[&str]) -> Result<OperateResult> {
        if ids.is_empty() {
            return Err(SearchwireError::InvalidRequest(
                "At least one id is required".to_string(),
            ));
        }
        let operations: Vec<BulkOperation> = ids
            .iter()
            .map(|id| BulkOperation::Delete {
                index: index.to_string(),
                doc_type: doc_type.to_string(),
                id: id.to_string(),
            })
            .collect();
        self.bulk(&operations)
    }

    pub fn get(&self, index: &str, doc_type: &str, id: &str) -> Result<Document> {
        let path = format!(
            "/{}/{}/{}",
            index_segment(index)?,
            segment(doc_type, "type")?,
            segment(id, "id")?
        );
        let response = self.executor.get(&path)?;
        Ok(Document::from_response(&response))
    }

    pub fn delete(&self, index: &str, doc_type: &str, id: &str) -> Result<OperateResult> {
        let path = format!(
            "/{}/{}/{}/",
            index_segment(index)?,
            segment(doc_type, "type")?,
            segment(id, "id")?
        );
        self.operate(Method::Delete, &path, None)
    }

    /// Delete everything matching `query`.
    ///
    /// No indices means every index (`_all`); no types means every type.
    pub fn delete_by_query(&self, indices: &[&str], types: &[&str], query: &str) -> Result<OperateResult> {
        let indices = if indices.is_empty() {
            "_all".to_string()
        } else {
            required_indices(indices)?
        };
        let path = format!("{}/_query?q={}", scope(&indices, types)?, encode_query(query)?);
        self.operate(Method::Delete, &path, None)
    }

    // Search

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResult> {
        let response = self.executor.get(&request.path()?)?;
        Ok(SearchResult::from_response(&response))
    }

    /// Search returning only the ids of matching documents.
    pub fn search_ids(
        &self,
        indices: &[&str],
        types: &[&str],
        query: &str,
        from: u32,
        size: u32,
    ) -> Result<Vec<String>> {
        let request = SearchRequest::new("", query)
            .indices(indices.iter().copied())
            .types(types.iter().copied())
            .from(from)
            .size(size)
            .fields(["_id"]);
        Ok(self.search(&request)?.ids())
    }

    /// Search with a `query_string` query sent in the request body.
    pub fn search_dsl(
        &self,
        indices: &[&str],
        types: &[&str],
        query: &str,
        from: u32,
        size: u32,
    ) -> Result<SearchResult> {
        let path = format!("{}/_search", scope(&required_indices(indices)?, types)?);
        let body = json!({
            "from": from,
            "size": size,
            "query": { "query_string": { "query": non_empty(query.trim(), "query")? } },
        });
        let response = self
            .executor
            .post(&path, Some(&serde_json::to_string(&body)?))?;
        Ok(SearchResult::from_response(&response))
    }

    /// Number of documents matching `query`; `None` when the count could
    /// not be read from the response.
    ///
    /// No indices counts across the whole cluster.
    pub fn count(&self, indices: &[&str], types: &[&str], query: &str) -> Result<Option<u64>> {
        let prefix = if indices.is_empty() {
            if !types.is_empty() {
                return Err(SearchwireError::InvalidRequest(
                    "Types require at least one index".to_string(),
                ));
            }
            String::new()
        } else {
            scope(&required_indices(indices)?, types)?
        };
        let path = format!("{}/_count?q={}", prefix, encode_query(query)?);
        let response = self.executor.get(&path)?;
        Ok(decode::decode_count(&response))
    }

    // Index administration

    pub fn refresh(&self, indices: &[&str]) -> Result<OperateResult> {
        self.admin(indices, "_refresh")
    }

    pub fn flush(&self, indices: &[&str]) -> Result<OperateResult> {
        self.admin(indices, "_flush")
    }

    pub fn optimize(&self, indices: &[&str]) -> Result<OperateResult> {
        self.admin(indices, "_optimize")
    }

    /// Raw status document for the given indices (all when empty).
    pub fn status(&self, indices: &[&str]) -> Result<Option<String>> {
        let response = self.executor.get(&admin_path(indices, "_status")?)?;
        Ok(response.body)
    }

    pub fn create_index(&self, index: &str, settings: IndexSettings) -> Result<OperateResult> {
        let path = format!("/{}/", index_segment(index)?);
        self.operate(Method::Post, &path, Some(&settings.to_body()?))
    }

    pub fn modify_index(&self, index: &str, settings: IndexSettings) -> Result<OperateResult> {
        let path = format!("/{}/_settings", index_segment(index)?);
        self.operate(Method::Put, &path, Some(&settings.to_body()?))
    }

    pub fn delete_index(&self, index: &str) -> Result<OperateResult> {
        let path = format!("/{}", index_segment(index)?);
        self.operate(Method::Delete, &path, None)
    }

    // Mappings and templates

    /// Put the mapping for `doc_type` on `index`.
    ///
    /// A missing index surfaces as 400 or 500; in that case the index is
    /// created with default settings and the mapping is sent exactly once
    /// more. If creating the index fails, the first response is returned.
    pub fn put_mapping(&self, index: &str, doc_type: &str, mapping: &Value) -> Result<OperateResult> {
        let index = index_name(index)?;
        let path = format!("/{}/_mapping", urlencoding::encode(&index));
        let mut mappings = serde_json::Map::new();
        mappings.insert(non_empty(doc_type, "type")?.to_string(), mapping.clone());
        let body = serde_json::to_string(&mappings)?;

        let response = self.executor.put(&path, Some(&body))?;
        if !matches!(
            response.status,
            Status::BadRequest | Status::InternalServerError
        ) {
            return Ok(OperateResult::from_response(&response));
        }

        tracing::info!(
            index = %index,
            status = response.status.code(),
            "Mapping rejected, creating index and retrying"
        );
        match self.create_index(&index, IndexSettings::default()) {
            Ok(created) if !created.success => {
                tracing::debug!(index = %index, status = created.status.code(), "Index creation not acknowledged");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(index = %index, error = %err, "Index creation failed");
                return Ok(OperateResult::from_response(&response));
            }
        }

        let response = self.executor.put(&path, Some(&body))?;
        Ok(OperateResult::from_response(&response))
    }

    pub fn create_template(&self, name: &str, template: &Value) -> Result<OperateResult> {
        let path = format!("/_template/{}", segment(name, "template name")?);
        self.operate(Method::Post, &path, Some(&serde_json::to_string(template)?))
    }

    /// The template definitions keyed by name, or `None` when absent or
    /// unreadable.
    pub fn get_template(&self, name: &str) -> Result<Option<serde_json::Map<String, Value>>> {
        let path = format!("/_template/{}", segment(name, "template name")?);
        let response = self.executor.get(&path)?;
        if !response.is_success() {
            return Ok(None);
        }
        Ok(decode::decode_body(&response, "template"))
    }

    pub fn delete_template(&self, name: &str) -> Result<OperateResult> {
        let path = format!("/_template/{}", segment(name, "template name")?);
        self.operate(Method::Delete, &path, None)
    }

    fn operate(&self, method: Method, path: &str, body: Option<&str>) -> Result<OperateResult> {
        let response: RestResponse = self.executor.execute(method, path, body)?;
        Ok(OperateResult::from_response(&response))
    }

    fn admin(&self, indices: &[&str], action: &str) -> Result<OperateResult> {
        self.operate(Method::Get, &admin_path(indices, action)?, None)
    }
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        Err(SearchwireError::InvalidRequest(format!("{} must not be empty", what)))
    } else {
        Ok(value)
    }
}

fn index_name(index: &str) -> Result<String> {
    Ok(non_empty(index.trim(), "index")?.to_lowercase())
}

/// A caller value encoded for use as one path segment.
fn segment(value: &str, what: &str) -> Result<String> {
    Ok(urlencoding::encode(non_empty(value, what)?).into_owned())
}

fn index_segment(index: &str) -> Result<String> {
    Ok(urlencoding::encode(&index_name(index)?).into_owned())
}

/// Comma-joined lowercase index list; at least one index is required.
fn required_indices(indices: &[&str]) -> Result<String> {
    if indices.is_empty() {
        return Err(SearchwireError::InvalidRequest(
            "At least one index is required".to_string(),
        ));
    }
    let names = indices
        .iter()
        .map(|i| index_segment(i))
        .collect::<Result<Vec<_>>>()?;
    Ok(names.join(","))
}

/// `/{indices}` or `/{indices}/{types}`
fn scope(indices: &str, types: &[&str]) -> Result<String> {
    if types.is_empty() {
        return Ok(format!("/{}", indices));
    }
    let types = types
        .iter()
        .map(|t| segment(t.trim(), "type"))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("/{}/{}", indices, types.join(",")))
}

fn admin_path(indices: &[&str], action: &str) -> Result<String> {
    if indices.is_empty() {
        Ok(format!("/{}", action))
    } else {
        Ok(format!("/{}/{}", required_indices(indices)?, action))
    }
}

fn encode_query(query: &str) -> Result<String> {
    Ok(urlencoding::encode(non_empty(query.trim(), "query")?).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_path_minimal() {
        let path = SearchRequest::new("Twitter", "user:kimchy").path().unwrap();
        assert_eq!(path, "/twitter/_search?q=user%3Akimchy&from=0&size=10");
    }

    #[test]
    fn test_search_path_full() {
        let path = SearchRequest::new("a", " title:hello world ")
            .indices(["A", "b"])
            .types(["post", "comment"])
            .from(5)
            .size(20)
            .sort("date:desc")
            .fields(["_id", "title"])
            .path()
            .unwrap();
        assert_eq!(
            path,
            "/a,b/post,comment/_search?q=title%3Ahello%20world&from=5&size=20&sort=date%3Adesc&fields=_id%2Ctitle"
        );
    }

    #[test]
    fn test_search_path_validation() {
        assert!(matches!(
            SearchRequest::new("", "q").path(),
            Err(SearchwireError::InvalidRequest(_))
        ));
        assert!(matches!(
            SearchRequest::new("idx", "  ").path(),
            Err(SearchwireError::InvalidRequest(_))
        ));
        assert!(matches!(
            SearchRequest::new("idx", "q").size(0).path(),
            Err(SearchwireError::InvalidRequest(_))
        ));
        assert!(matches!(
            SearchRequest::new("idx", "q").indices(Vec::<String>::new()).path(),
            Err(SearchwireError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_bulk_body_ndjson() {
        let mut body = String::new();
        BulkOperation::Index {
            index: "Idx".into(),
            doc_type: "t".into(),
            id: "1".into(),
            source: json!({"f": "v"}),
        }
        .write_to(&mut body)
        .unwrap();
        BulkOperation::Delete {
            index: "idx".into(),
            doc_type: "t".into(),
            id: "2".into(),
        }
        .write_to(&mut body)
        .unwrap();

        let lines: Vec<Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], json!({"index": {"_index": "idx", "_type": "t", "_id": "1"}}));
        assert_eq!(lines[1], json!({"f": "v"}));
        assert_eq!(lines[2], json!({"delete": {"_index": "idx", "_type": "t", "_id": "2"}}));
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn test_bulk_operation_requires_id() {
        let mut body = String::new();
        let err = BulkOperation::Delete {
            index: "idx".into(),
            doc_type: "t".into(),
            id: "".into(),
        }
        .write_to(&mut body)
        .unwrap_err();
        assert!(matches!(err, SearchwireError::InvalidRequest(_)));
    }

    #[test]
    fn test_index_settings_body() {
        let body: Value = serde_json::from_str(&IndexSettings::default().to_body().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"index": {"number_of_shards": 5, "number_of_replicas": 1}})
        );
    }

    #[test]
    fn test_scope_and_admin_paths() {
        assert_eq!(scope("idx", &[]).unwrap(), "/idx");
        assert_eq!(scope("idx", &["a", "b"]).unwrap(), "/idx/a,b");
        assert!(scope("idx", &[""]).is_err());

        assert_eq!(admin_path(&[], "_refresh").unwrap(), "/_refresh");
        assert_eq!(admin_path(&["A", "b"], "_flush").unwrap(), "/a,b/_flush");
    }

    #[test]
    fn test_path_segments_are_encoded() {
        assert_eq!(segment("my doc", "id").unwrap(), "my%20doc");
        assert_eq!(segment("a/b?x", "id").unwrap(), "a%2Fb%3Fx");
        assert_eq!(segment("1\r\nX-Injected: 1", "id").unwrap(), "1%0D%0AX-Injected%3A%201");
        assert_eq!(index_segment(" Logs#1 ").unwrap(), "logs%231");
        assert_eq!(scope("idx", &["a b"]).unwrap(), "/idx/a%20b");
        assert!(segment(" ", "id").is_err());
    }

    #[test]
    fn test_required_indices_lowercases() {
        assert_eq!(required_indices(&["Logs-2024", "USERS"]).unwrap(), "logs-2024,users");
        assert!(required_indices(&[]).is_err());
        assert!(required_indices(&["ok", " "]).is_err());
    }
}
