//! Navbar admin API client utilities.
//!
//! This crate talks to the project endpoints behind the navbar editor. It
//! focuses on:
//!
//! - Deriving the project's page and rest bases from the page URL
//! - Constructing an HTTP client with a cookie jar for the session cookie
//! - Posting form-encoded admin mutations and fetching `_nav.json`
//! - Wrapping those calls in a [`PersistenceClient`] that reports failures
//!   through the notification channel
//!
//! # Example
//!
//! ```ignore
//! use navbar_api::{HttpTransport, NavConfig, PersistenceClient};
//!
//! async fn load() -> anyhow::Result<()> {
//!     let transport = HttpTransport::new(NavConfig::from_env()?)?;
//!     let (notifier, _notifications) = tokio::sync::mpsc::unbounded_channel();
//!     let client = PersistenceClient::new(transport, notifier);
//!     let tree = client.fetch_snapshot().await?;
//!     println!("{} top-level tools", tree.entries().len());
//!     Ok(())
//! }
//! ```

pub mod persistence;
pub mod transport;

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, RequestBuilder, header};
use tracing::debug;
use url::Url;

pub use persistence::{NotificationSender, PersistenceClient, PostTicket, Resolution};
pub use transport::{Endpoint, NavTransport, SESSION_COOKIE, TransportError};

/// Environment variable holding the URL of the page the editor runs on.
pub const PAGE_URL_ENV: &str = "NAVBAR_PAGE_URL";
/// Environment variable seeding the session cookie.
pub const SESSION_ID_ENV: &str = "NAVBAR_SESSION_ID";

/// Where a project lives, derived from a page URL of the form
/// `{scheme}://{host}/{neighborhood}/{project}/...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLocation {
    origin: String,
    neighborhood: String,
    project: String,
}

impl ProjectLocation {
    pub fn from_page_url(page_url: &str) -> Result<Self> {
        let parsed = validate_page_url(page_url)?;
        let mut segments = parsed
            .path_segments()
            .map(|segments| segments.filter(|segment| !segment.is_empty()))
            .ok_or_else(|| anyhow!("page URL '{}' cannot be a base", page_url))?;
        let (Some(neighborhood), Some(project)) = (segments.next(), segments.next()) else {
            return Err(anyhow!(
                "page URL '{}' must include a neighborhood and project segment",
                page_url
            ));
        };
        Ok(Self {
            origin: parsed.origin().ascii_serialization(),
            neighborhood: neighborhood.to_string(),
            project: project.to_string(),
        })
    }

    /// Project base; the rest flavour is prefixed with `/rest`.
    pub fn project_url(&self, rest: bool) -> String {
        if rest {
            format!("{}/rest/{}/{}", self.origin, self.neighborhood, self.project)
        } else {
            format!("{}/{}/{}", self.origin, self.neighborhood, self.project)
        }
    }

    pub fn snapshot_url(&self) -> String {
        format!("{}/_nav.json", self.project_url(false))
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.project_url(true), endpoint.path())
    }
}

/// Editor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavConfig {
    pub location: ProjectLocation,
    /// Seeds the session cookie; `None` leaves the jar empty.
    pub session_id: Option<String>,
}

impl NavConfig {
    pub fn new(page_url: &str, session_id: Option<String>) -> Result<Self> {
        Ok(Self {
            location: ProjectLocation::from_page_url(page_url)?,
            session_id,
        })
    }

    /// Reads `NAVBAR_PAGE_URL` (required) and `NAVBAR_SESSION_ID` (optional).
    pub fn from_env() -> Result<Self> {
        let page_url = env::var(PAGE_URL_ENV).with_context(|| format!("{PAGE_URL_ENV} is not set"))?;
        let session_id = env::var(SESSION_ID_ENV).ok().filter(|value| !value.trim().is_empty());
        Self::new(&page_url, session_id)
    }
}

/// [`NavTransport`] over `reqwest` with a shared cookie jar.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    pub location: ProjectLocation,
    pub http: Client,
    pub user_agent: String,
    cookies: Arc<Jar>,
    cookie_url: Url,
}

impl HttpTransport {
    /// Build the client. No request timeout is set; a request stays pending
    /// until the server answers or the caller drops it.
    pub fn new(config: NavConfig) -> Result<Self> {
        let cookie_url = Url::parse(&config.location.project_url(false)).context("parse project url")?;
        let cookies = Arc::new(Jar::default());
        if let Some(session_id) = &config.session_id {
            cookies.add_cookie_str(&format!("{SESSION_COOKIE}={session_id}; Path=/"), &cookie_url);
        }

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .cookie_provider(Arc::clone(&cookies))
            .build()
            .context("build http client")?;

        Ok(Self {
            location: config.location,
            http,
            user_agent: format!("navbar-admin/0.1; {}", env::consts::OS),
            cookies,
            cookie_url,
        })
    }

    /// The jar backing the session cookie, shared with the HTTP client.
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.cookies
    }

    /// Build a `reqwest::RequestBuilder` with the configured User-Agent.
    pub fn request(&self, method: reqwest::Method, url: &str) -> RequestBuilder {
        debug!(%url, "building request");
        self.http
            .request(method, url)
            .header(header::USER_AGENT, &self.user_agent)
    }
}

#[async_trait::async_trait]
impl NavTransport for HttpTransport {
    async fn fetch_snapshot(&self) -> Result<String, TransportError> {
        let response = self
            .request(reqwest::Method::GET, &self.location.snapshot_url())
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| TransportError::network(e.to_string()))?;
        if !status.is_success() {
            return Err(TransportError::status(status.as_u16(), body));
        }
        Ok(body)
    }

    async fn post_form(&self, endpoint: Endpoint, fields: &[(String, String)]) -> Result<(), TransportError> {
        let response = self
            .request(reqwest::Method::POST, &self.location.endpoint_url(endpoint))
            .form(fields)
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::status(status.as_u16(), body));
        }
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        let header = self.cookies.cookies(&self.cookie_url)?;
        let header = header.to_str().ok()?;
        header.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE).then(|| value.to_string())
        })
    }
}

/// Validate that a page URL can anchor the editor.
///
/// Rules:
/// - must parse and use `http` or `https`
/// - must include a host
fn validate_page_url(page_url: &str) -> Result<Url> {
    let parsed = Url::parse(page_url).map_err(|e| anyhow!("Invalid {} '{}': {}", PAGE_URL_ENV, page_url, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(anyhow!(
            "{} must use http or https; got '{}://'",
            PAGE_URL_ENV,
            parsed.scheme()
        ));
    }
    if parsed.host_str().is_none() {
        return Err(anyhow!("{} must include a host", PAGE_URL_ENV));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_page_and_rest_bases() {
        let location = ProjectLocation::from_page_url("https://forge.example.com/p/demo/wiki/Home/").expect("location");
        assert_eq!(location.project_url(false), "https://forge.example.com/p/demo");
        assert_eq!(location.project_url(true), "https://forge.example.com/rest/p/demo");
        assert_eq!(location.snapshot_url(), "https://forge.example.com/p/demo/_nav.json");
        assert_eq!(
            location.endpoint_url(Endpoint::MountOrder),
            "https://forge.example.com/rest/p/demo/admin/mount_order"
        );
        assert_eq!(
            location.endpoint_url(Endpoint::ConfigureToolGrouping),
            "https://forge.example.com/rest/p/demo/admin/configure_tool_grouping"
        );
    }

    #[test]
    fn keeps_non_default_ports() {
        let location = ProjectLocation::from_page_url("http://localhost:8080/u/alice/").expect("location");
        assert_eq!(location.snapshot_url(), "http://localhost:8080/u/alice/_nav.json");
    }

    #[test]
    fn rejects_unusable_page_urls() {
        assert!(ProjectLocation::from_page_url("not a url").is_err());
        assert!(ProjectLocation::from_page_url("ftp://forge.example.com/p/demo/").is_err());
        assert!(ProjectLocation::from_page_url("https://forge.example.com/p/").is_err());
    }

    #[test]
    fn config_from_env() {
        temp_env::with_vars(
            [
                (PAGE_URL_ENV, Some("https://forge.example.com/p/demo/")),
                (SESSION_ID_ENV, Some("abc123")),
            ],
            || {
                let config = NavConfig::from_env().expect("config");
                assert_eq!(config.session_id.as_deref(), Some("abc123"));
                assert_eq!(config.location.project_url(false), "https://forge.example.com/p/demo");
            },
        );
        temp_env::with_var_unset(PAGE_URL_ENV, || {
            assert!(NavConfig::from_env().is_err());
        });
    }

    #[test]
    fn session_cookie_is_read_from_the_jar() {
        let config = NavConfig::new("https://forge.example.com/p/demo/", Some("first".into())).expect("config");
        let transport = HttpTransport::new(config).expect("transport");
        assert_eq!(transport.session_id().as_deref(), Some("first"));

        // a rotated cookie is picked up on the next read
        let url = Url::parse("https://forge.example.com/").expect("url");
        transport.cookie_jar().add_cookie_str("_session_id=second; Path=/", &url);
        assert_eq!(transport.session_id().as_deref(), Some("second"));
    }

    #[test]
    fn no_session_without_cookie() {
        let config = NavConfig::new("https://forge.example.com/p/demo/", None).expect("config");
        let transport = HttpTransport::new(config).expect("transport");
        assert_eq!(transport.session_id(), None);
    }
}
