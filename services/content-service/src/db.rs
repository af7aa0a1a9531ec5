use reqwest::{header, Method, RequestBuilder, StatusCode};
use serde_json::Value;

/// Client for the hosted relational-table API (PostgREST dialect).
///
/// Handlers receive this through `AppState` rather than a process global, so
/// tests can point it at a mock server.
#[derive(Clone)]
pub struct TableClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TableClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn table(&self, name: &str) -> TableQuery {
        TableQuery {
            client: self.clone(),
            table: name.to_string(),
            filters: Vec::new(),
            order: None,
            range: None,
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        self.http
            .request(method, url)
            .header("apikey", self.api_key.as_str())
            .bearer_auth(self.api_key.as_str())
    }
}

/// One table operation, built up with `eq`/`order`/`range` before execution.
pub struct TableQuery {
    client: TableClient,
    table: String,
    filters: Vec<(String, String)>,
    order: Option<(String, bool)>,
    range: Option<(i64, i64)>,
}

impl TableQuery {
    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.filters.push((column.to_string(), format!("eq.{value}")));
        self
    }

    pub fn order(mut self, column: &str, descending: bool) -> Self {
        self.order = Some((column.to_string(), descending));
        self
    }

    pub fn range(mut self, offset: i64, limit: i64) -> Self {
        let from = offset.max(0);
        let to = from + limit.max(1) - 1;
        self.range = Some((from, to));
        self
    }

    pub async fn select(self) -> Result<Vec<Value>, String> {
        let request = self.read_request().query(&[("select", "*")]);
        let response = send(request, &self.table).await?;
        decode_rows(response, &self.table).await
    }

    /// Fetch at most one row; `Ok(None)` when the filter matches nothing.
    pub async fn select_single(self) -> Result<Option<Value>, String> {
        let request = self
            .read_request()
            .query(&[("select", "*")])
            .header(header::ACCEPT, "application/vnd.pgrst.object+json");
        let response = request
            .send()
            .await
            .map_err(|err| format!("table {} request failed: {err}", self.table))?;
        // The object representation responds 406 when zero rows match.
        if response.status() == StatusCode::NOT_ACCEPTABLE
            || response.status() == StatusCode::NOT_FOUND
        {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_body(response, &self.table).await);
        }
        let row: Value = response
            .json()
            .await
            .map_err(|err| format!("table {} decode failed: {err}", self.table))?;
        Ok(Some(row))
    }

    pub async fn insert(self, rows: &Value) -> Result<Vec<Value>, String> {
        let request = self
            .client
            .request(Method::POST, &self.table)
            .header("Prefer", "return=representation")
            .json(rows);
        let response = send(request, &self.table).await?;
        decode_rows(response, &self.table).await
    }

    pub async fn update(self, changes: &Value) -> Result<Vec<Value>, String> {
        let mut request = self
            .client
            .request(Method::PATCH, &self.table)
            .header("Prefer", "return=representation")
            .json(changes);
        for (column, op) in &self.filters {
            request = request.query(&[(column.as_str(), op.as_str())]);
        }
        let response = send(request, &self.table).await?;
        decode_rows(response, &self.table).await
    }

    /// Returns the deleted rows so callers can 404 on an empty match.
    pub async fn delete(self) -> Result<Vec<Value>, String> {
        let mut request = self
            .client
            .request(Method::DELETE, &self.table)
            .header("Prefer", "return=representation");
        for (column, op) in &self.filters {
            request = request.query(&[(column.as_str(), op.as_str())]);
        }
        let response = send(request, &self.table).await?;
        decode_rows(response, &self.table).await
    }

    fn read_request(&self) -> RequestBuilder {
        let mut request = self.client.request(Method::GET, &self.table);
        for (column, op) in &self.filters {
            request = request.query(&[(column.as_str(), op.as_str())]);
        }
        if let Some((column, descending)) = &self.order {
            let direction = if *descending { "desc" } else { "asc" };
            request = request.query(&[("order", format!("{column}.{direction}"))]);
        }
        if let Some((from, to)) = self.range {
            request = request
                .header("Range-Unit", "items")
                .header(header::RANGE, format!("{from}-{to}"));
        }
        request
    }
}

async fn send(request: RequestBuilder, table: &str) -> Result<reqwest::Response, String> {
    let response = request
        .send()
        .await
        .map_err(|err| format!("table {table} request failed: {err}"))?;
    if !response.status().is_success() {
        return Err(error_body(response, table).await);
    }
    Ok(response)
}

async fn error_body(response: reqwest::Response, table: &str) -> String {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let detail: String = body.chars().take(300).collect();
    format!("table {table} returned {status}: {detail}")
}

async fn decode_rows(response: reqwest::Response, table: &str) -> Result<Vec<Value>, String> {
    response
        .json()
        .await
        .map_err(|err| format!("table {table} decode failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::TableClient;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> TableClient {
        TableClient::new(reqwest::Client::new(), &server.base_url(), "test-key")
    }

    #[tokio::test]
    async fn select_builds_filters_order_and_range() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/roles")
                    .query_param("select", "*")
                    .query_param("status", "eq.published")
                    .query_param("order", "name.asc")
                    .header("Range", "0-99")
                    .header("apikey", "test-key");
                then.status(200).json_body(json!([{"id": "role-1"}]));
            })
            .await;

        let rows = client(&server)
            .table("roles")
            .eq("status", "published")
            .order("name", false)
            .range(0, 100)
            .select()
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "role-1");
    }

    #[tokio::test]
    async fn select_single_returns_none_for_missing_row() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/roles");
                then.status(406).body("JSON object requested, multiple (or no) rows returned");
            })
            .await;

        let row = client(&server)
            .table("roles")
            .eq("id", "missing")
            .select_single()
            .await
            .unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn insert_then_select_round_trips_fields() {
        let server = MockServer::start_async().await;
        let stored = json!({"id": "role-9", "name": "Kieran", "tags": ["stoic"]});
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/roles")
                    .header("Prefer", "return=representation");
                then.status(201).json_body(json!([stored.clone()]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/roles")
                    .query_param("id", "eq.role-9");
                then.status(200).json_body(stored.clone());
            })
            .await;

        let table = client(&server);
        let inserted = table
            .table("roles")
            .insert(&json!([{"id": "role-9", "name": "Kieran", "tags": ["stoic"]}]))
            .await
            .unwrap();
        let fetched = table
            .table("roles")
            .eq("id", "role-9")
            .select_single()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inserted[0], fetched);
    }

    #[tokio::test]
    async fn non_success_becomes_error_string() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/rest/v1/explore_items");
                then.status(500).body("boom");
            })
            .await;

        let err = client(&server)
            .table("explore_items")
            .eq("id", "x")
            .delete()
            .await
            .unwrap_err();
        assert!(err.contains("500"), "{err}");
    }
}
