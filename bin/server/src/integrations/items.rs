//! Sample data loaders that normalize provider records into [`IntegrationItem`]s.

use crate::error::ProviderError;
use reqwest::{RequestBuilder, Url};
use rootcause::prelude::Report;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tether_core::IntegrationType;
use tracing::{debug, instrument, warn};

/// Upper bound on followed pagination cursors per request.
const MAX_PAGES: usize = 50;

const HUBSPOT_PAGE_SIZE: &str = "100";
const HUBSPOT_PROPERTIES: &str = "firstname,lastname,email";
const NOTION_VERSION: &str = "2022-06-28";

/// A provider record in a common shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub parent_id: Option<String>,
    pub parent_path_or_name: Option<String>,
    pub creation_time: Option<String>,
    pub last_modified_time: Option<String>,
}

/// Loads sample items for an integration using the given credentials.
///
/// # Errors
///
/// Returns `MissingAccessToken` if `credentials` has no `access_token`, and
/// `Upstream`, `Transport` or `Decode` when the provider call fails.
#[instrument(skip(http, api_base_url, credentials), fields(integration = %integration_type))]
pub async fn load_items(
    http: &reqwest::Client,
    integration_type: IntegrationType,
    api_base_url: &Url,
    credentials: &JsonValue,
) -> Result<Vec<IntegrationItem>, Report<ProviderError>> {
    let token = credentials
        .get("access_token")
        .and_then(JsonValue::as_str)
        .filter(|token| !token.is_empty())
        .ok_or(ProviderError::MissingAccessToken)?;

    let items = match integration_type {
        IntegrationType::Hubspot => hubspot_contacts(http, api_base_url, token).await?,
        IntegrationType::Airtable => airtable_bases_and_tables(http, api_base_url, token).await?,
        IntegrationType::Notion => notion_search(http, api_base_url, token).await?,
    };

    debug!(count = items.len(), "loaded integration items");
    Ok(items)
}

fn endpoint(base: &Url, path: &str) -> Result<Url, Report<ProviderError>> {
    let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
    Ok(Url::parse(&joined).map_err(|e| ProviderError::Configuration {
        details: format!("invalid provider endpoint '{joined}': {e}"),
    })?)
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, Report<ProviderError>> {
    let response = request.send().await.map_err(|e| ProviderError::Transport {
        details: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Upstream {
            status: status.as_u16(),
            body,
        }
        .into());
    }

    Ok(response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Decode {
            details: e.to_string(),
        })?)
}

// HubSpot

#[derive(Debug, Deserialize)]
struct HubspotPage {
    #[serde(default)]
    results: Vec<HubspotContact>,
    paging: Option<HubspotPaging>,
}

#[derive(Debug, Deserialize)]
struct HubspotPaging {
    next: Option<HubspotCursor>,
}

#[derive(Debug, Deserialize)]
struct HubspotCursor {
    after: String,
}

#[derive(Debug, Deserialize)]
struct HubspotContact {
    id: String,
    #[serde(default)]
    properties: HashMap<String, Option<String>>,
    #[serde(rename = "createdAt")]
    created_at: Option<String>,
    #[serde(rename = "updatedAt")]
    updated_at: Option<String>,
}

impl HubspotContact {
    fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Option::as_deref)
    }

    fn into_item(self) -> IntegrationItem {
        let name = [self.property("firstname"), self.property("lastname")]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let name = name.trim();
        let email = self.property("email").map(str::to_string);

        IntegrationItem {
            item_type: Some("Contact".to_string()),
            name: (!name.is_empty()).then(|| name.to_string()),
            email,
            creation_time: self.created_at,
            last_modified_time: self.updated_at,
            id: self.id,
            ..IntegrationItem::default()
        }
    }
}

async fn hubspot_contacts(
    http: &reqwest::Client,
    base: &Url,
    token: &str,
) -> Result<Vec<IntegrationItem>, Report<ProviderError>> {
    let url = endpoint(base, "crm/v3/objects/contacts")?;
    let mut items = Vec::new();
    let mut after: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let mut request = http
            .get(url.clone())
            .bearer_auth(token)
            .query(&[("limit", HUBSPOT_PAGE_SIZE), ("properties", HUBSPOT_PROPERTIES)]);
        if let Some(cursor) = &after {
            request = request.query(&[("after", cursor)]);
        }

        let page: HubspotPage = send_json(request).await?;
        items.extend(page.results.into_iter().map(HubspotContact::into_item));

        after = page.paging.and_then(|paging| paging.next).map(|next| next.after);
        if after.is_none() {
            return Ok(items);
        }
    }

    warn!(max_pages = MAX_PAGES, "stopped following HubSpot pagination");
    Ok(items)
}

// Airtable

#[derive(Debug, Deserialize)]
struct AirtableBasesPage {
    #[serde(default)]
    bases: Vec<AirtableRecord>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirtableTables {
    #[serde(default)]
    tables: Vec<AirtableRecord>,
}

#[derive(Debug, Clone, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(default)]
    name: String,
}

fn airtable_item(
    record: &AirtableRecord,
    item_type: &str,
    parent: Option<&AirtableRecord>,
) -> IntegrationItem {
    IntegrationItem {
        id: format!("{}_{}", record.id, item_type),
        item_type: Some(item_type.to_string()),
        name: Some(record.name.clone()),
        parent_id: parent.map(|base| format!("{}_Base", base.id)),
        parent_path_or_name: parent.map(|base| base.name.clone()),
        ..IntegrationItem::default()
    }
}

async fn airtable_bases_and_tables(
    http: &reqwest::Client,
    base: &Url,
    token: &str,
) -> Result<Vec<IntegrationItem>, Report<ProviderError>> {
    let bases_url = endpoint(base, "v0/meta/bases")?;
    let mut bases = Vec::new();
    let mut offset: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let mut request = http.get(bases_url.clone()).bearer_auth(token);
        if let Some(cursor) = &offset {
            request = request.query(&[("offset", cursor)]);
        }

        let page: AirtableBasesPage = send_json(request).await?;
        bases.extend(page.bases);

        offset = page.offset;
        if offset.is_none() {
            break;
        }
    }
    if offset.is_some() {
        warn!(max_pages = MAX_PAGES, "stopped following Airtable pagination");
    }

    let mut items = Vec::new();
    for airtable_base in &bases {
        items.push(airtable_item(airtable_base, "Base", None));

        let tables_url = endpoint(base, &format!("v0/meta/bases/{}/tables", airtable_base.id))?;
        // A base whose tables cannot be read is still listed.
        match send_json::<AirtableTables>(http.get(tables_url).bearer_auth(token)).await {
            Ok(tables) => items.extend(
                tables
                    .tables
                    .iter()
                    .map(|table| airtable_item(table, "Table", Some(airtable_base))),
            ),
            Err(err) => warn!(base_id = %airtable_base.id, error = %err, "skipping Airtable tables"),
        }
    }

    Ok(items)
}

// Notion

#[derive(Debug, Deserialize)]
struct NotionSearch {
    #[serde(default)]
    results: Vec<JsonValue>,
}

/// Finds the first string under `key`, depth first.
fn find_string<'a>(value: &'a JsonValue, key: &str) -> Option<&'a str> {
    match value {
        JsonValue::Object(map) => match map.get(key) {
            Some(found) => found.as_str(),
            None => map.values().find_map(|nested| find_string(nested, key)),
        },
        JsonValue::Array(values) => values.iter().find_map(|nested| find_string(nested, key)),
        _ => None,
    }
}

fn notion_item(result: &JsonValue) -> IntegrationItem {
    let text = |key: &str| result.get(key).and_then(JsonValue::as_str).map(str::to_string);
    let object = result
        .get("object")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();

    let name = result
        .get("properties")
        .and_then(|properties| find_string(properties, "content"))
        .filter(|name| !name.is_empty())
        .map_or_else(|| format!("{object} multi_select"), str::to_string);

    let parent = result.get("parent");
    let parent_type = parent
        .and_then(|parent| parent.get("type"))
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    let parent_id = if parent_type == "workspace" {
        None
    } else {
        parent
            .and_then(|parent| parent.get(parent_type))
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    };

    IntegrationItem {
        id: text("id").unwrap_or_default(),
        item_type: Some(object.to_string()),
        name: Some(name),
        parent_id,
        creation_time: text("created_time"),
        last_modified_time: text("last_edited_time"),
        ..IntegrationItem::default()
    }
}

async fn notion_search(
    http: &reqwest::Client,
    base: &Url,
    token: &str,
) -> Result<Vec<IntegrationItem>, Report<ProviderError>> {
    let url = endpoint(base, "v1/search")?;
    let request = http
        .post(url)
        .bearer_auth(token)
        .header("Notion-Version", NOTION_VERSION)
        .json(&serde_json::json!({}));

    let search: NotionSearch = send_json(request).await?;
    Ok(search.results.iter().map(notion_item).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> JsonValue {
        json!({"access_token": "token-123", "token_type": "bearer"})
    }

    fn base(server: &MockServer) -> Url {
        Url::parse(&server.uri()).expect("mock server url")
    }

    #[tokio::test]
    async fn missing_access_token_is_rejected() {
        let err = load_items(
            &reqwest::Client::new(),
            IntegrationType::Hubspot,
            &Url::parse("http://127.0.0.1:9").expect("url"),
            &json!({"refresh_token": "r"}),
        )
        .await
        .expect_err("should fail");
        assert!(matches!(
            err.current_context(),
            ProviderError::MissingAccessToken
        ));
    }

    #[tokio::test]
    async fn hubspot_follows_paging_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/contacts"))
            .and(query_param("after", "cursor-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "id": "2",
                    "properties": {"firstname": "Grace", "lastname": null, "email": "grace@example.com"},
                    "createdAt": "2024-02-01T00:00:00Z"
                }]
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/contacts"))
            .and(query_param("limit", "100"))
            .and(query_param("properties", "firstname,lastname,email"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "id": "1",
                    "properties": {"firstname": "Ada", "lastname": "Lovelace", "email": "ada@example.com"},
                    "createdAt": "2024-01-01T00:00:00Z",
                    "updatedAt": "2024-01-02T00:00:00Z"
                }],
                "paging": {"next": {"after": "cursor-2"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = load_items(
            &reqwest::Client::new(),
            IntegrationType::Hubspot,
            &base(&server),
            &credentials(),
        )
        .await
        .expect("items");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "1");
        assert_eq!(items[0].name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(items[0].email.as_deref(), Some("ada@example.com"));
        assert_eq!(
            items[0].last_modified_time.as_deref(),
            Some("2024-01-02T00:00:00Z")
        );
        assert_eq!(items[1].name.as_deref(), Some("Grace"));
    }

    #[tokio::test]
    async fn hubspot_error_status_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired token"))
            .mount(&server)
            .await;

        let err = load_items(
            &reqwest::Client::new(),
            IntegrationType::Hubspot,
            &base(&server),
            &credentials(),
        )
        .await
        .expect_err("should fail");

        match err.current_context() {
            ProviderError::Upstream { status, body } => {
                assert_eq!(*status, 401);
                assert_eq!(body, "expired token");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn airtable_lists_bases_then_tables() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/meta/bases"))
            .and(query_param("offset", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bases": [{"id": "appB", "name": "Inventory"}]
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v0/meta/bases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bases": [{"id": "appA", "name": "CRM"}],
                "offset": "page-2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v0/meta/bases/appA/tables"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tables": [{"id": "tblX", "name": "Leads"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v0/meta/bases/appB/tables"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let items = load_items(
            &reqwest::Client::new(),
            IntegrationType::Airtable,
            &base(&server),
            &credentials(),
        )
        .await
        .expect("items");

        let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["appA_Base", "tblX_Table", "appB_Base"]);

        let table = &items[1];
        assert_eq!(table.item_type.as_deref(), Some("Table"));
        assert_eq!(table.parent_id.as_deref(), Some("appA_Base"));
        assert_eq!(table.parent_path_or_name.as_deref(), Some("CRM"));
        assert!(items[0].parent_id.is_none());
    }

    #[tokio::test]
    async fn airtable_pagination_stops_at_page_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/meta/bases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bases": [],
                "offset": "again"
            })))
            .expect(MAX_PAGES as u64)
            .mount(&server)
            .await;

        let items = load_items(
            &reqwest::Client::new(),
            IntegrationType::Airtable,
            &base(&server),
            &credentials(),
        )
        .await
        .expect("items");

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn notion_search_normalizes_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .and(header("notion-version", NOTION_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {
                        "object": "page",
                        "id": "page-1",
                        "created_time": "2024-01-01T00:00:00.000Z",
                        "last_edited_time": "2024-01-03T00:00:00.000Z",
                        "parent": {"type": "workspace", "workspace": true},
                        "properties": {
                            "title": {"title": [{"text": {"content": "Roadmap"}}]}
                        }
                    },
                    {
                        "object": "database",
                        "id": "db-1",
                        "parent": {"type": "page_id", "page_id": "page-1"},
                        "properties": {}
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = load_items(
            &reqwest::Client::new(),
            IntegrationType::Notion,
            &base(&server),
            &credentials(),
        )
        .await
        .expect("items");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name.as_deref(), Some("Roadmap"));
        assert_eq!(items[0].item_type.as_deref(), Some("page"));
        assert!(items[0].parent_id.is_none());
        assert_eq!(items[1].name.as_deref(), Some("database multi_select"));
        assert_eq!(items[1].parent_id.as_deref(), Some("page-1"));
    }

    #[test]
    fn find_string_searches_nested_lists() {
        let value = json!({
            "a": {"b": [1, {"c": {"content": "deep"}}]}
        });
        assert_eq!(find_string(&value, "content"), Some("deep"));
        assert_eq!(find_string(&json!({"x": 1}), "content"), None);
    }

    #[test]
    fn item_serializes_type_field() {
        let item = IntegrationItem {
            id: "1".to_string(),
            item_type: Some("Base".to_string()),
            ..IntegrationItem::default()
        };
        let json = serde_json::to_value(&item).expect("serialize");
        assert_eq!(json["type"], "Base");
        assert!(json.get("item_type").is_none());
    }
}
