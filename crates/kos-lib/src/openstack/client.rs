use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::auth::{authenticate, Session};
use crate::config::OpenStackCredentials;
use crate::error::{Error, Result};
use crate::inventory::{CloudActions, CloudSource};
use crate::models::{
    CloudServer, CloudVolume, FloatingIp, Listener, LoadBalancer, Member, Monitor,
    NovaVolumeAttachment, Pool,
};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

const VOLUME_SERVICE_TYPES: &[&str] = &["volumev3", "block-storage", "volumev2"];
const COMPUTE_SERVICE_TYPES: &[&str] = &["compute"];
const NETWORK_SERVICE_TYPES: &[&str] = &["network"];

/// Cloud client for one tenant, holding a token and the public endpoints of
/// the services it talks to
#[derive(Debug, Clone)]
pub struct OpenStackClient {
    http: Client,
    token: String,
    volume: Option<Url>,
    compute: Option<Url>,
    network: Option<Url>,
}

/// Append path segments to an endpoint, keeping its own path
pub fn service_url(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::config(format!("endpoint {base} cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn next_link(body: &Value, key: &str) -> Option<String> {
    body.get(format!("{key}_links"))?
        .as_array()?
        .iter()
        .find(|link| link.get("rel").and_then(Value::as_str) == Some("next"))?
        .get("href")?
        .as_str()
        .map(str::to_string)
}

impl OpenStackClient {
    /// Authenticate and resolve the service endpoints
    pub async fn connect(credentials: &OpenStackCredentials) -> Result<Self> {
        let http = Client::builder().build()?;
        let session = authenticate(&http, credentials).await?;
        Ok(Self::from_session(http, session, credentials.region.as_deref()))
    }

    /// Endpoints missing from the catalog are only an error once used
    pub fn from_session(http: Client, session: Session, region: Option<&str>) -> Self {
        let lookup = |types: &[&str]| match session.catalog.endpoint(types, region) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!(error = %e, "Service not in catalog");
                None
            }
        };
        Self {
            volume: lookup(VOLUME_SERVICE_TYPES),
            compute: lookup(COMPUTE_SERVICE_TYPES),
            network: lookup(NETWORK_SERVICE_TYPES),
            token: session.token,
            http,
        }
    }

    pub fn with_endpoints(
        http: Client,
        token: impl Into<String>,
        volume: Option<Url>,
        compute: Option<Url>,
        network: Option<Url>,
    ) -> Self {
        Self {
            http,
            token: token.into(),
            volume,
            compute,
            network,
        }
    }

    fn volume_url(&self, segments: &[&str]) -> Result<Url> {
        let base = self
            .volume
            .as_ref()
            .ok_or_else(|| Error::MissingEndpoint(VOLUME_SERVICE_TYPES.join("|")))?;
        service_url(base, segments)
    }

    fn compute_url(&self, segments: &[&str]) -> Result<Url> {
        let base = self
            .compute
            .as_ref()
            .ok_or_else(|| Error::MissingEndpoint(COMPUTE_SERVICE_TYPES.join("|")))?;
        service_url(base, segments)
    }

    fn network_url(&self, segments: &[&str]) -> Result<Url> {
        let base = self
            .network
            .as_ref()
            .ok_or_else(|| Error::MissingEndpoint(NETWORK_SERVICE_TYPES.join("|")))?;
        service_url(base, segments)
    }

    /// Send a request and return the body, failing on any status other
    /// than `expected`
    async fn send(&self, method: Method, url: Url, body: Option<Value>, expected: StatusCode) -> Result<String> {
        debug!(method = %method, url = %url, "OpenStack request");
        let mut request = self
            .http
            .request(method, url.clone())
            .header(AUTH_TOKEN_HEADER, &self.token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if status != expected {
            return Err(Error::Api {
                status,
                url: url.to_string(),
                body: text,
            });
        }
        Ok(text)
    }

    /// GET a collection and follow its `<key>_links` until exhausted
    async fn list<T: DeserializeOwned>(&self, url: Url, key: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            visited.insert(url.clone());
            let text = self.send(Method::GET, url.clone(), None, StatusCode::OK).await?;
            let mut body: Value = serde_json::from_str(&text)?;

            if let Some(page) = body.get_mut(key).map(Value::take) {
                items.extend(serde_json::from_value::<Vec<T>>(page)?);
            }

            if let Some(href) = next_link(&body, key) {
                let href = Url::parse(&href)?;
                if visited.contains(&href) {
                    warn!(collection = key, url = %href, "Pagination loops back, stopping");
                } else {
                    next = Some(href);
                }
            }
        }

        debug!(collection = key, count = items.len(), "Listed collection");
        Ok(items)
    }
}

#[async_trait]
impl CloudSource for OpenStackClient {
    async fn list_volumes(&self) -> Result<Vec<CloudVolume>> {
        self.list(self.volume_url(&["volumes", "detail"])?, "volumes").await
    }

    async fn list_servers(&self) -> Result<Vec<CloudServer>> {
        self.list(self.compute_url(&["servers", "detail"])?, "servers").await
    }

    async fn list_volume_attachments(&self, server_id: &str) -> Result<Vec<NovaVolumeAttachment>> {
        let url = self.compute_url(&["servers", server_id, "os-volume_attachments"])?;
        self.list(url, "volumeAttachments").await
    }

    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        let url = self.network_url(&["v2.0", "lbaas", "loadbalancers"])?;
        self.list(url, "loadbalancers").await
    }

    async fn list_listeners(&self) -> Result<Vec<Listener>> {
        self.list(self.network_url(&["v2.0", "lbaas", "listeners"])?, "listeners").await
    }

    async fn list_pools(&self) -> Result<Vec<Pool>> {
        self.list(self.network_url(&["v2.0", "lbaas", "pools"])?, "pools").await
    }

    async fn list_pool_members(&self, pool_id: &str) -> Result<Vec<Member>> {
        let url = self.network_url(&["v2.0", "lbaas", "pools", pool_id, "members"])?;
        let mut members: Vec<Member> = self.list(url, "members").await?;
        for member in &mut members {
            member.pool_id = pool_id.to_string();
        }
        Ok(members)
    }

    async fn list_monitors(&self) -> Result<Vec<Monitor>> {
        let url = self.network_url(&["v2.0", "lbaas", "healthmonitors"])?;
        self.list(url, "healthmonitors").await
    }

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>> {
        self.list(self.network_url(&["v2.0", "floatingips"])?, "floatingips").await
    }
}

#[async_trait]
impl CloudActions for OpenStackClient {
    async fn attach_volume_cinder(&self, volume_id: &str, server_id: &str, mountpoint: &str) -> Result<String> {
        info!(volume = %volume_id, server = %server_id, mountpoint = %mountpoint, "Cinder attach");
        let body = json!({ "os-attach": { "instance_uuid": server_id, "mountpoint": mountpoint } });
        let url = self.volume_url(&["volumes", volume_id, "action"])?;
        self.send(Method::POST, url, Some(body), StatusCode::ACCEPTED).await
    }

    async fn detach_volume_cinder(&self, volume_id: &str, attachment_id: Option<&str>, force: bool) -> Result<String> {
        info!(volume = %volume_id, attachment = ?attachment_id, force, "Cinder detach");
        let action = if force { "os-force_detach" } else { "os-detach" };
        let params = match attachment_id {
            Some(id) => json!({ "attachment_id": id }),
            None => json!({}),
        };
        let url = self.volume_url(&["volumes", volume_id, "action"])?;
        self.send(Method::POST, url, Some(json!({ action: params })), StatusCode::ACCEPTED)
            .await
    }

    async fn attach_volume_nova(&self, volume_id: &str, server_id: &str) -> Result<String> {
        info!(volume = %volume_id, server = %server_id, "Nova attach");
        let body = json!({ "volumeAttachment": { "volumeId": volume_id } });
        let url = self.compute_url(&["servers", server_id, "os-volume_attachments"])?;
        self.send(Method::POST, url, Some(body), StatusCode::OK).await
    }

    async fn detach_volume_nova(&self, volume_id: &str, server_id: &str) -> Result<String> {
        info!(volume = %volume_id, server = %server_id, "Nova detach");
        let url = self.compute_url(&["servers", server_id, "os-volume_attachments", volume_id])?;
        self.send(Method::DELETE, url, None, StatusCode::ACCEPTED).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::Server) -> OpenStackClient {
        let base = Url::parse(&server.url()).unwrap();
        OpenStackClient::with_endpoints(
            Client::new(),
            "tok-123",
            Some(service_url(&base, &["volume", "v3", "p1"]).unwrap()),
            Some(service_url(&base, &["compute", "v2.1"]).unwrap()),
            Some(service_url(&base, &["network"]).unwrap()),
        )
    }

    #[test]
    fn test_service_url_keeps_endpoint_path() {
        let base = Url::parse("https://cinder.example.com:8776/v3/p1/").unwrap();
        let url = service_url(&base, &["volumes", "detail"]).unwrap();
        assert_eq!(url.as_str(), "https://cinder.example.com:8776/v3/p1/volumes/detail");
    }

    #[tokio::test]
    async fn test_volumes_follow_pagination() {
        let mut server = mockito::Server::new_async().await;
        let next = format!("{}/volume/v3/p1/volumes/detail?marker=v1", server.url());
        let first = server
            .mock("GET", "/volume/v3/p1/volumes/detail")
            .match_query(Matcher::Missing)
            .match_header("x-auth-token", "tok-123")
            .with_body(
                json!({
                    "volumes": [{"id": "v1", "name": "a", "size": 1, "status": "available", "attachments": []}],
                    "volumes_links": [{"rel": "next", "href": next}]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/volume/v3/p1/volumes/detail")
            .match_query(Matcher::UrlEncoded("marker".into(), "v1".into()))
            .with_body(
                json!({"volumes": [{"id": "v2", "name": null, "size": 2, "status": "in-use",
                    "attachments": [{"server_id": "s1"}]}]})
                .to_string(),
            )
            .create_async()
            .await;

        let volumes = client(&server).list_volumes().await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let ids: Vec<_> = volumes.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2"]);
        assert_eq!(volumes[1].attachments[0].server_id, "s1");
    }

    #[tokio::test]
    async fn test_pagination_cycle_stops() {
        let mut server = mockito::Server::new_async().await;
        let first_url = format!("{}/volume/v3/p1/volumes/detail", server.url());
        let second_url = format!("{first_url}?marker=v1");
        let first = server
            .mock("GET", "/volume/v3/p1/volumes/detail")
            .match_query(Matcher::Missing)
            .with_body(
                json!({
                    "volumes": [{"id": "v1", "name": "a", "size": 1, "status": "available", "attachments": []}],
                    "volumes_links": [{"rel": "next", "href": second_url}]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/volume/v3/p1/volumes/detail")
            .match_query(Matcher::UrlEncoded("marker".into(), "v1".into()))
            .with_body(
                json!({
                    "volumes": [{"id": "v2", "name": "b", "size": 1, "status": "available", "attachments": []}],
                    "volumes_links": [{"rel": "next", "href": first_url}]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let volumes = client(&server).list_volumes().await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let ids: Vec<_> = volumes.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2"]);
    }

    #[tokio::test]
    async fn test_pool_members_carry_pool_id() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/network/v2.0/lbaas/pools/P1/members")
            .with_body(
                json!({"members": [{"id": "m1", "address": "10.0.0.5", "protocol_port": 30080}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let members = client(&server).list_pool_members("P1").await.unwrap();

        assert_eq!(members[0].pool_id, "P1");
        assert_eq!(members[0].protocol_port, 30080);
    }

    #[tokio::test]
    async fn test_api_error_keeps_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/compute/v2.1/servers/detail")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let err = client(&server).list_servers().await.unwrap_err();

        match err {
            Error::Api { status, body, .. } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cinder_force_detach() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/volume/v3/p1/volumes/VOL1/action")
            .match_body(Matcher::Json(json!({"os-force_detach": {"attachment_id": "att-1"}})))
            .with_status(202)
            .create_async()
            .await;

        client(&server)
            .detach_volume_cinder("VOL1", Some("att-1"), true)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_nova_attach_and_detach() {
        let mut server = mockito::Server::new_async().await;
        let attach = server
            .mock("POST", "/compute/v2.1/servers/SRV1/os-volume_attachments")
            .match_body(Matcher::Json(json!({"volumeAttachment": {"volumeId": "VOL1"}})))
            .with_body(r#"{"volumeAttachment": {"device": "/dev/vdb"}}"#)
            .create_async()
            .await;
        let detach = server
            .mock("DELETE", "/compute/v2.1/servers/SRV1/os-volume_attachments/VOL1")
            .with_status(202)
            .create_async()
            .await;

        let os = client(&server);
        let body = os.attach_volume_nova("VOL1", "SRV1").await.unwrap();
        os.detach_volume_nova("VOL1", "SRV1").await.unwrap();

        attach.assert_async().await;
        detach.assert_async().await;
        assert!(body.contains("/dev/vdb"));
    }

    #[tokio::test]
    async fn test_missing_endpoint() {
        let os = OpenStackClient::with_endpoints(Client::new(), "tok", None, None, None);
        assert!(matches!(
            os.list_floating_ips().await,
            Err(Error::MissingEndpoint(t)) if t == "network"
        ));
    }
}
