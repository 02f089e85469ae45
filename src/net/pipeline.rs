use crate::prelude::HashMap;
use crate::{HostError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared HTTP client with a custom User-Agent so that public tile and style
/// servers don't reject the request. Building the client once avoids the
/// cost of TLS and connection pool setup for every fetch.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent("maphost/0.1 (+https://github.com/maphost/maphost)")
        .build()
        .unwrap_or_default()
});

/// An outgoing application fetch before it hits the network
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub init: FetchInit,
}

impl FetchRequest {
    pub fn get(url: &str) -> Self {
        Self {
            url: url.to_string(),
            init: FetchInit::default(),
        }
    }
}

/// Request options carried alongside the URL
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchInit {
    /// HTTP method; `None` means GET
    pub method: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

/// What kind of map resource the renderer is requesting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Tile,
    Style,
    Glyphs,
    Sprite,
    Source,
    Other,
}

/// Parameters handed to the renderer for a map-resource request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestParameters {
    pub url: String,
    pub headers: HashMap<String, String>,
    /// Credentials mode, e.g. `"include"`
    pub credentials: Option<String>,
}

impl RequestParameters {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            headers: HashMap::default(),
            credentials: None,
        }
    }

    /// Folds another stage's output into this one: headers are merged, the
    /// other fields are overwritten.
    fn merge(&mut self, other: RequestParameters) {
        self.url = other.url;
        self.headers.extend(other.headers);
        if other.credentials.is_some() {
            self.credentials = other.credentials;
        }
    }
}

/// A stage in the request pipeline.
///
/// Both hooks default to pass-through; a transform overrides the ones it
/// cares about. `transform_map_request` is strictly synchronous because the
/// renderer cannot await tile requests.
#[async_trait]
pub trait RequestTransform: Send + Sync {
    fn id(&self) -> &str;

    /// Rewrites an outgoing application fetch
    async fn transform_fetch(&self, request: FetchRequest) -> Result<FetchRequest> {
        Ok(request)
    }

    /// Rewrites a renderer resource request. Returning `None` leaves the
    /// parameters unchanged.
    fn transform_map_request(
        &self,
        params: &RequestParameters,
        resource: ResourceType,
    ) -> Option<RequestParameters> {
        let _ = (params, resource);
        None
    }
}

/// Ordered chain of request interceptors.
///
/// The registry is an insertion-ordered mapping keyed by transform id; both
/// transform kinds are applied as a left-fold over all registered transforms
/// in registration order, each stage receiving the previous stage's output.
/// There is no priority field.
#[derive(Clone, Default)]
pub struct RequestPipeline {
    transforms: Arc<Mutex<Vec<Arc<dyn RequestTransform>>>>,
}

impl RequestPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn transforms(&self) -> MutexGuard<'_, Vec<Arc<dyn RequestTransform>>> {
        self.transforms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a transform. Re-adding an id replaces the existing transform in
    /// place, keeping its position in the chain.
    pub fn add(&self, transform: Arc<dyn RequestTransform>) {
        let mut transforms = self.transforms();
        match transforms.iter().position(|t| t.id() == transform.id()) {
            Some(index) => transforms[index] = transform,
            None => transforms.push(transform),
        }
    }

    /// Removes a transform by id. Unknown ids are ignored.
    pub fn remove(&self, id: &str) {
        self.transforms().retain(|t| t.id() != id);
    }

    /// Registered transform ids, in chain order
    pub fn ids(&self) -> Vec<String> {
        self.transforms()
            .iter()
            .map(|t| t.id().to_string())
            .collect()
    }

    /// Folds an application fetch through every transform
    pub async fn transform_fetch(&self, url: &str, init: FetchInit) -> Result<FetchRequest> {
        let snapshot: Vec<Arc<dyn RequestTransform>> = self.transforms().clone();
        let mut request = FetchRequest {
            url: url.to_string(),
            init,
        };
        for transform in snapshot {
            request = transform.transform_fetch(request).await?;
        }
        Ok(request)
    }

    /// Folds a renderer resource request through every transform.
    /// Synchronous by contract.
    pub fn transform_map_request(&self, url: &str, resource: ResourceType) -> RequestParameters {
        let snapshot: Vec<Arc<dyn RequestTransform>> = self.transforms().clone();
        let mut params = RequestParameters::new(url);
        for transform in snapshot {
            if let Some(next) = transform.transform_map_request(&params, resource) {
                params.merge(next);
            }
        }
        params
    }

    /// Runs the fetch fold, then performs the network call
    pub async fn fetch(&self, url: &str, init: FetchInit) -> Result<reqwest::Response> {
        let request = self.transform_fetch(url, init).await?;

        let method = match request.init.method.as_deref() {
            None => reqwest::Method::GET,
            Some(name) => name
                .parse::<reqwest::Method>()
                .map_err(|_| HostError::InvalidConfig(format!("invalid HTTP method '{}'", name)))?,
        };

        log::debug!("fetch {} {}", method, request.url);
        let mut builder = HTTP_CLIENT.request(method, &request.url);
        for (name, value) in &request.init.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.init.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct HeaderTransform {
        id: String,
        name: String,
        value: String,
    }

    #[async_trait]
    impl RequestTransform for HeaderTransform {
        fn id(&self) -> &str {
            &self.id
        }

        async fn transform_fetch(&self, mut request: FetchRequest) -> Result<FetchRequest> {
            request
                .init
                .headers
                .insert(self.name.clone(), self.value.clone());
            Ok(request)
        }

        fn transform_map_request(
            &self,
            params: &RequestParameters,
            _resource: ResourceType,
        ) -> Option<RequestParameters> {
            let mut next = params.clone();
            next.headers.insert(self.name.clone(), self.value.clone());
            Some(next)
        }
    }

    struct HostRewriteTransform;

    #[async_trait]
    impl RequestTransform for HostRewriteTransform {
        fn id(&self) -> &str {
            "host-rewrite"
        }

        async fn transform_fetch(&self, mut request: FetchRequest) -> Result<FetchRequest> {
            request.url = request.url.replace("example.com", "proxy.example.net");
            Ok(request)
        }

        fn transform_map_request(
            &self,
            params: &RequestParameters,
            resource: ResourceType,
        ) -> Option<RequestParameters> {
            if resource != ResourceType::Tile {
                return None;
            }
            let mut next = params.clone();
            next.url = params.url.replace("example.com", "proxy.example.net");
            next.credentials = Some("include".to_string());
            Some(next)
        }
    }

    fn auth(id: &str, value: &str) -> Arc<dyn RequestTransform> {
        Arc::new(HeaderTransform {
            id: id.to_string(),
            name: "Authorization".to_string(),
            value: value.to_string(),
        })
    }

    #[tokio::test]
    async fn test_fetch_fold_in_registration_order() {
        let pipeline = RequestPipeline::new();
        pipeline.add(auth("first", "Bearer one"));
        pipeline.add(Arc::new(HostRewriteTransform));

        let request = pipeline
            .transform_fetch("https://example.com/search?q=berlin", FetchInit::default())
            .await
            .unwrap();

        assert_eq!(request.url, "https://proxy.example.net/search?q=berlin");
        assert_eq!(
            request.init.headers.get("Authorization").map(String::as_str),
            Some("Bearer one")
        );
    }

    #[tokio::test]
    async fn test_later_transform_sees_earlier_output() {
        let pipeline = RequestPipeline::new();
        pipeline.add(Arc::new(HostRewriteTransform));

        struct AssertRewritten;
        #[async_trait]
        impl RequestTransform for AssertRewritten {
            fn id(&self) -> &str {
                "assert"
            }
            async fn transform_fetch(&self, request: FetchRequest) -> Result<FetchRequest> {
                assert!(request.url.contains("proxy.example.net"));
                Ok(request)
            }
        }
        pipeline.add(Arc::new(AssertRewritten));

        pipeline
            .transform_fetch("https://example.com/x", FetchInit::default())
            .await
            .unwrap();
    }

    #[test]
    fn test_map_request_merges_headers_and_overwrites_url() {
        let pipeline = RequestPipeline::new();
        pipeline.add(auth("auth", "Bearer tiles"));
        pipeline.add(Arc::new(HostRewriteTransform));

        let params =
            pipeline.transform_map_request("https://example.com/tiles/1/2/3.pbf", ResourceType::Tile);

        assert_eq!(params.url, "https://proxy.example.net/tiles/1/2/3.pbf");
        assert_eq!(
            params.headers.get("Authorization").map(String::as_str),
            Some("Bearer tiles")
        );
        assert_eq!(params.credentials.as_deref(), Some("include"));
    }

    #[test]
    fn test_transform_returning_none_leaves_params_unchanged() {
        let pipeline = RequestPipeline::new();
        pipeline.add(Arc::new(HostRewriteTransform));

        // The rewrite transform only touches tiles.
        let params =
            pipeline.transform_map_request("https://example.com/style.json", ResourceType::Style);
        assert_eq!(params.url, "https://example.com/style.json");
        assert!(params.credentials.is_none());
    }

    #[test]
    fn test_re_adding_id_replaces_in_place() {
        let pipeline = RequestPipeline::new();
        pipeline.add(auth("auth", "Bearer old"));
        pipeline.add(Arc::new(HostRewriteTransform));
        pipeline.add(auth("auth", "Bearer new"));

        assert_eq!(pipeline.ids(), vec!["auth", "host-rewrite"]);
        let params = pipeline.transform_map_request("https://example.com/t", ResourceType::Tile);
        assert_eq!(
            params.headers.get("Authorization").map(String::as_str),
            Some("Bearer new")
        );
    }

    #[test]
    fn test_remove_unknown_is_ignored() {
        let pipeline = RequestPipeline::new();
        pipeline.add(auth("auth", "Bearer x"));
        pipeline.remove("ghost");
        pipeline.remove("auth");
        assert!(pipeline.ids().is_empty());
    }
}
