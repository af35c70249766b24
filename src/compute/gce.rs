use facet::Facet;
use reqwest::Method;

use super::{
    ComputeApi, DiskLicensePatch, DiskResource, InstanceAggregatedList, InstanceResource,
    Metadata, Operation,
};
use crate::auth::TokenSource;
use crate::config::ApiConfig;
use crate::error::{ApiError, GcexError};

/// REST client for the Compute Engine API. Each request carries a bearer
/// token fetched from `tokens`, so long sessions pick up refreshed tokens.
pub struct GceClient {
    http: reqwest::Client,
    tokens: TokenSource,
    compute_base: String,
    disk_patch_base: String,
}

impl GceClient {
    pub fn new(api: &ApiConfig, tokens: TokenSource) -> Result<Self, GcexError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gcex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GcexError::ClientSetup {
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            tokens,
            compute_base: api.compute_base.trim_end_matches('/').to_string(),
            disk_patch_base: api.disk_patch_base.trim_end_matches('/').to_string(),
        })
    }

    fn zonal(&self, project: &str, zone: &str, rest: &str) -> String {
        format!("{}/projects/{project}/zones/{zone}/{rest}", self.compute_base)
    }

    /// Aggregated instance listing, with the page token query-encoded.
    fn list_url(&self, project: &str, page_token: Option<&str>) -> Result<reqwest::Url, ApiError> {
        let base = format!("{}/projects/{project}/aggregated/instances", self.compute_base);
        let mut url = reqwest::Url::parse(&base).map_err(|e| ApiError::InvalidUrl {
            url: base.clone(),
            message: e.to_string(),
        })?;
        if let Some(token) = page_token {
            url.query_pairs_mut().append_pair("pageToken", token);
        }
        Ok(url)
    }

    /// Send a request and return the body of a 2xx response.
    async fn send(&self, method: Method, url: &str, body: Option<String>) -> Result<String, ApiError> {
        tracing::debug!(%method, %url, "compute request");

        let token = self.tokens.token().await?;
        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            tracing::debug!(%body, "request body");
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        tracing::debug!(status = status.as_u16(), body = %text, "compute response");

        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

/// Decode a JSON response body into a wire type, naming the URL on failure.
macro_rules! decode {
    ($url:expr, $text:expr) => {
        facet_json::from_str(&$text).map_err(|e| ApiError::Decode {
            context: $url.to_string(),
            message: e.to_string(),
        })
    };
}

fn encode<'a, T: Facet<'a>>(context: &str, value: &T) -> Result<String, ApiError> {
    facet_json::to_string(value).map_err(|e| ApiError::Decode {
        context: context.to_string(),
        message: e.to_string(),
    })
}

impl ComputeApi for GceClient {
    async fn list_instances_page(
        &self,
        project: &str,
        page_token: Option<&str>,
    ) -> Result<InstanceAggregatedList, ApiError> {
        let url = self.list_url(project, page_token)?;
        let text = self.send(Method::GET, url.as_str(), None).await?;
        decode!(url, text)
    }

    async fn get_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<InstanceResource, ApiError> {
        let url = self.zonal(project, zone, &format!("instances/{name}"));
        let text = self.send(Method::GET, &url, None).await?;
        decode!(url, text)
    }

    async fn get_disk(
        &self,
        project: &str,
        zone: &str,
        disk: &str,
    ) -> Result<DiskResource, ApiError> {
        let url = self.zonal(project, zone, &format!("disks/{disk}"));
        let text = self.send(Method::GET, &url, None).await?;
        decode!(url, text)
    }

    async fn start_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Operation, ApiError> {
        let url = self.zonal(project, zone, &format!("instances/{name}/start"));
        let text = self.send(Method::POST, &url, None).await?;
        decode!(url, text)
    }

    async fn stop_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Operation, ApiError> {
        let url = self.zonal(project, zone, &format!("instances/{name}/stop"));
        let text = self.send(Method::POST, &url, None).await?;
        decode!(url, text)
    }

    async fn set_metadata(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        metadata: &Metadata,
    ) -> Result<Operation, ApiError> {
        let url = self.zonal(project, zone, &format!("instances/{name}/setMetadata"));
        let body = encode(&url, metadata)?;
        let text = self.send(Method::POST, &url, Some(body)).await?;
        decode!(url, text)
    }

    async fn patch_disk_licenses(
        &self,
        project: &str,
        zone: &str,
        disk: &str,
        license_url: &str,
    ) -> Result<String, ApiError> {
        let url = self.disk_patch_url(project, zone, disk);
        let body = encode(
            &url,
            &DiskLicensePatch {
                name: disk.to_string(),
                licenses: vec![license_url.to_string()],
            },
        )?;
        self.send(Method::PATCH, &url, Some(body)).await
    }

    async fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, ApiError> {
        let url = self.zonal(project, zone, &format!("operations/{operation}"));
        let text = self.send(Method::GET, &url, None).await?;
        decode!(url, text)
    }

    fn disk_patch_url(&self, project: &str, zone: &str, disk: &str) -> String {
        format!(
            "{}/projects/{project}/zones/{zone}/disks/{disk}?paths=licenses",
            self.disk_patch_base
        )
    }
}
