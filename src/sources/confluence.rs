use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::ContentError;
use crate::models::{ConfluenceConfig, Document};
use crate::sources::ContentProvider;
use crate::utils::strip_html;

const PAGE_LIST_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ConfluencePage {
    id: String,
    #[serde(default)]
    title: String,
    body: Option<Body>,
    #[serde(rename = "_links")]
    links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct Body {
    export_view: Option<ExportView>,
}

#[derive(Debug, Deserialize)]
struct ExportView {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Links {
    webui: Option<String>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageList {
    #[serde(default)]
    results: Vec<PageSummary>,
    #[serde(rename = "_links")]
    links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct PageSummary {
    id: String,
}

/// Confluence Cloud REST client.
#[derive(Debug, Clone)]
pub struct ConfluenceClient {
    client: Client,
    base_url: String,
    email: String,
    api_key: String,
}

impl ConfluenceClient {
    pub fn new(config: &ConfluenceConfig) -> Result<Self, ContentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_domain(&config.domain),
            email: config.email.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Response, ContentError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.email, Some(&self.api_key))
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;
        Ok(response)
    }

    fn page_url(&self, webui: Option<&str>) -> String {
        match webui {
            Some(path) => format!("{}/wiki/{}", self.base_url, path.trim_start_matches('/')),
            None => format!("{}/wiki", self.base_url),
        }
    }
}

fn normalize_domain(domain: &str) -> String {
    let trimmed = domain.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Turn a non-success response into a [`ContentError::Server`].
async fn check_status(response: Response) -> Result<Response, ContentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ContentError::Server(format!("status {}: {}", status, body)))
}

#[async_trait]
impl ContentProvider for ConfluenceClient {
    fn name(&self) -> &str {
        "Confluence"
    }

    async fn list_page_ids(&self) -> Result<Vec<String>, ContentError> {
        let mut ids = Vec::new();
        let mut url = format!("{}/wiki/api/v2/pages", self.base_url);
        let mut query = vec![("limit", PAGE_LIST_LIMIT.to_string())];

        loop {
            let response = check_status(self.get(&url, &query).await?).await?;
            let page: PageList = response
                .json()
                .await
                .map_err(|e| ContentError::InvalidResponse(e.to_string()))?;

            ids.extend(page.results.into_iter().map(|p| p.id));

            // The next link is server-relative and already carries the cursor.
            match page.links.and_then(|l| l.next) {
                Some(next) if !next.is_empty() => {
                    url = format!("{}{}", self.base_url, next);
                    query.clear();
                }
                _ => break,
            }
        }

        debug!(count = ids.len(), "listed confluence pages");
        Ok(ids)
    }

    async fn get_document(&self, id: &str) -> Result<Document, ContentError> {
        let url = format!("{}/wiki/api/v2/pages/{}", self.base_url, id);
        let response = self
            .get(&url, &[("body-format", "export_view".to_string())])
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ContentError::NotFound(id.to_string()));
        }
        let page: ConfluencePage = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ContentError::InvalidResponse(e.to_string()))?;

        let html = page
            .body
            .and_then(|b| b.export_view)
            .and_then(|v| v.value)
            .unwrap_or_default();
        if html.trim().is_empty() {
            return Err(ContentError::InvalidResponse(format!(
                "page {} has no content",
                id
            )));
        }

        let url = self.page_url(page.links.as_ref().and_then(|l| l.webui.as_deref()));
        Ok(Document::new(page.id, page.title, strip_html(&html), url))
    }

    async fn keyword_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, ContentError> {
        let url = format!("{}/wiki/rest/api/content/search", self.base_url);
        let cql = format!("text~\"{}\"", query.replace('"', ""));

        let response = self
            .get(&url, &[("cql", cql), ("limit", limit.to_string())])
            .await?;
        let results: SearchResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ContentError::InvalidResponse(e.to_string()))?;

        Ok(results.results.into_iter().map(|r| r.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ConfluenceClient {
        ConfluenceClient::new(&ConfluenceConfig {
            domain: server.uri(),
            email: "dev@example.com".to_string(),
            api_key: "token".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(
            normalize_domain("acme.atlassian.net/"),
            "https://acme.atlassian.net"
        );
        assert_eq!(normalize_domain("http://localhost:9000"), "http://localhost:9000");
    }

    #[tokio::test]
    async fn test_keyword_search_strips_quotes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/rest/api/content/search"))
            .and(query_param("cql", "text~\"deploy pipeline\""))
            .and(query_param("limit", "3"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": "11"}, {"id": "42"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ids = client_for(&server)
            .keyword_search("\"deploy\" pipeline", 3)
            .await
            .unwrap();
        assert_eq!(ids, vec!["11", "42"]);
    }

    #[tokio::test]
    async fn test_get_document_strips_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/api/v2/pages/42"))
            .and(query_param("body-format", "export_view"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "42",
                "title": "Onboarding",
                "body": {"export_view": {"value": "<h1>Welcome</h1><p>Read this</p>"}},
                "_links": {"webui": "/spaces/ENG/pages/42/Onboarding"}
            })))
            .mount(&server)
            .await;

        let doc = client_for(&server).get_document("42").await.unwrap();
        assert_eq!(doc.id, "42");
        assert_eq!(doc.title, "Onboarding");
        assert_eq!(doc.content, "WelcomeRead this");
        assert_eq!(
            doc.url,
            format!("{}/wiki/spaces/ENG/pages/42/Onboarding", server.uri())
        );
    }

    #[tokio::test]
    async fn test_get_document_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/api/v2/pages/7"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).get_document("7").await.unwrap_err();
        assert!(matches!(err, ContentError::NotFound(id) if id == "7"));
    }

    #[tokio::test]
    async fn test_get_document_empty_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/api/v2/pages/8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "8",
                "title": "Blank",
                "body": {"export_view": {"value": ""}}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).get_document("8").await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_list_page_ids_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/api/v2/pages"))
            .and(query_param("cursor", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": "3"}],
                "_links": {}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wiki/api/v2/pages"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": "1"}, {"id": "2"}],
                "_links": {"next": "/wiki/api/v2/pages?cursor=abc"}
            })))
            .mount(&server)
            .await;

        let ids = client_for(&server).list_page_ids().await.unwrap();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_server_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/rest/api/content/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let err = client_for(&server).keyword_search("x", 5).await.unwrap_err();
        match err {
            ContentError::Server(msg) => assert!(msg.contains("503")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
