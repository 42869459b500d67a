//! OCI distribution API client for a single repository

use crate::content::descriptor::{media_types, Descriptor, Digest};
use crate::registry::auth::{fetch_token, Challenge, Credentials};
use crate::registry::reference::Reference;
use crate::registry::scope::{repository_scope, AuthAction, ScopeHint};
use crate::registry::{ManifestStore, ScopeRegistry, Target};
use crate::{OrasError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, WWW_AUTHENTICATE};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use std::sync::{Mutex, PoisonError};

const DOCKER_CONTENT_DIGEST: &str = "Docker-Content-Digest";

/// Connection settings for a remote repository
#[derive(Debug, Clone, Default)]
pub struct RemoteOptions {
    /// Use HTTP instead of HTTPS
    pub plain_http: bool,
    pub credentials: Credentials,
}

/// Remote repository speaking the distribution API
pub struct Repository {
    client: reqwest::Client,
    reference: Reference,
    base_url: String,
    credentials: Credentials,
    /// Scopes registered ahead of the first request
    scopes: Mutex<Vec<String>>,
    /// Cached `Authorization` header value
    authorization: Mutex<Option<String>>,
}

impl Repository {
    /// Create a client for the repository named by `reference`
    pub fn new(reference: &Reference, options: RemoteOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()?;

        Ok(Self {
            client,
            base_url: reference.registry_url(options.plain_http),
            reference: reference.clone(),
            credentials: options.credentials,
            scopes: Mutex::new(Vec::new()),
            authorization: Mutex::new(None),
        })
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    fn manifest_url(&self, reference: &str) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.base_url, self.reference.repository, reference
        )
    }

    fn blob_url(&self, digest: &Digest) -> String {
        format!(
            "{}/v2/{}/blobs/{}",
            self.base_url, self.reference.repository, digest
        )
    }

    /// Tag or digest part of a reference given either in full or bare
    fn reference_part(&self, reference: &str) -> Result<String> {
        if reference.contains('/') {
            let parsed = Reference::parse(reference)?;
            if parsed.reference.is_empty() {
                return Err(OrasError::InvalidReference(reference.to_string()));
            }
            Ok(parsed.reference)
        } else {
            Ok(reference.to_string())
        }
    }

    /// Send a request, answering one authentication challenge if needed
    async fn send<F>(&self, action: AuthAction, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let response = self.authorize(build(&self.client)).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(Challenge::parse);

        let authorization = match challenge {
            Some(Challenge::Bearer {
                realm,
                service,
                scope,
            }) => {
                let scopes = self.token_scopes(action, scope);
                let token =
                    fetch_token(&self.client, &realm, service.as_deref(), &scopes, &self.credentials)
                        .await?;
                format!("Bearer {}", token)
            }
            Some(Challenge::Basic) => self.credentials.basic_header().ok_or_else(|| {
                OrasError::Auth(format!("{}: credentials required", self.reference.registry))
            })?,
            None => {
                return Err(OrasError::Auth(format!(
                    "{}: unsupported authentication challenge",
                    self.reference.registry
                )))
            }
        };

        *self
            .authorization
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(authorization);

        Ok(self.authorize(build(&self.client)).send().await?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let authorization = self
            .authorization
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match authorization.and_then(|a| HeaderValue::from_str(&a).ok()) {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        }
    }

    /// Scopes for a token request: the operation's own scope, the
    /// challenge's scope, then every registered hint
    fn token_scopes(&self, action: AuthAction, challenge_scope: Option<String>) -> Vec<String> {
        let own: ScopeHint = match action {
            AuthAction::Pull => [AuthAction::Pull].into_iter().collect(),
            AuthAction::Push => [AuthAction::Pull, AuthAction::Push].into_iter().collect(),
            AuthAction::Delete => [AuthAction::Delete].into_iter().collect(),
        };

        let mut scopes = vec![repository_scope(&self.reference.repository, &own)];
        scopes.extend(challenge_scope);
        for scope in self
            .scopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            if !scopes.contains(scope) {
                scopes.push(scope.clone());
            }
        }
        scopes
    }

    async fn push_blob(&self, desc: &Descriptor, content: Vec<u8>) -> Result<()> {
        let start_url = format!(
            "{}/v2/{}/blobs/uploads/",
            self.base_url, self.reference.repository
        );
        let response = self
            .send(AuthAction::Push, |c| c.post(&start_url).header(CONTENT_LENGTH, 0))
            .await?;
        if response.status() != StatusCode::ACCEPTED {
            return Err(OrasError::Registry(format!(
                "Failed to start upload of {}: {}",
                desc.digest,
                response.status()
            )));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| OrasError::Registry("Upload response has no location".to_string()))?;

        let mut upload_url = Url::parse(&self.base_url)
            .and_then(|base| base.join(location))
            .map_err(|e| OrasError::Registry(format!("Invalid upload location: {}", e)))?;
        upload_url
            .query_pairs_mut()
            .append_pair("digest", desc.digest.as_str());

        let response = self
            .send(AuthAction::Push, |c| {
                c.put(upload_url.clone())
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(content.clone())
            })
            .await?;
        if response.status() != StatusCode::CREATED {
            return Err(OrasError::Registry(format!(
                "Failed to upload {}: {}",
                desc.digest,
                response.status()
            )));
        }

        Ok(())
    }

    async fn put_manifest(&self, desc: &Descriptor, content: Vec<u8>, reference: &str) -> Result<()> {
        let url = self.manifest_url(reference);
        let response = self
            .send(AuthAction::Push, |c| {
                c.put(&url)
                    .header(CONTENT_TYPE, desc.media_type.as_str())
                    .body(content.clone())
            })
            .await?;
        if !response.status().is_success() {
            return Err(OrasError::Registry(format!(
                "Failed to push manifest {}: {}",
                reference,
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ManifestStore for Repository {
    async fn resolve(&self, reference: &str) -> Result<Descriptor> {
        let part = self.reference_part(reference)?;
        let url = self.manifest_url(&part);
        let accept = media_types::MANIFEST_ACCEPT.join(", ");

        tracing::debug!("resolving {}", url);
        let response = self
            .send(AuthAction::Pull, |c| c.head(&url).header(ACCEPT, accept.as_str()))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(OrasError::NotFound(reference.to_string())),
            status if !status.is_success() => {
                return Err(OrasError::Registry(format!(
                    "Failed to resolve {}: {}",
                    reference, status
                )))
            }
            _ => {}
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let media_type = header("content-type")
            .unwrap_or_else(|| media_types::OCI_IMAGE_MANIFEST.to_string());
        let size = header("content-length").and_then(|v| v.parse::<i64>().ok());
        let digest = header(DOCKER_CONTENT_DIGEST)
            .map(|d| Digest::parse(&d))
            .transpose()?;

        let expected = Digest::parse(&part).ok();
        let (digest, size) = match (digest, size) {
            (Some(digest), Some(size)) => (digest, size),
            _ => {
                // registry did not describe the manifest, fetch and hash it
                let response = self
                    .send(AuthAction::Pull, |c| c.request(Method::GET, &url).header(ACCEPT, accept.as_str()))
                    .await?;
                if !response.status().is_success() {
                    return Err(OrasError::Registry(format!(
                        "Failed to fetch {}: {}",
                        reference,
                        response.status()
                    )));
                }
                let body = response.bytes().await?;
                (Digest::from_bytes(&body), body.len() as i64)
            }
        };

        if let Some(expected) = expected {
            if expected != digest {
                return Err(OrasError::Registry(format!(
                    "{}: digest mismatch, registry returned {}",
                    reference, digest
                )));
            }
        }

        Ok(Descriptor {
            media_type,
            digest,
            size,
            annotations: None,
        })
    }

    async fn delete(&self, desc: &Descriptor) -> Result<()> {
        let url = self.manifest_url(desc.digest.as_str());

        tracing::debug!("deleting {}", url);
        let response = self.send(AuthAction::Delete, |c| c.delete(&url)).await?;

        match response.status() {
            StatusCode::ACCEPTED | StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(OrasError::NotFound(desc.digest.to_string())),
            StatusCode::METHOD_NOT_ALLOWED => Err(OrasError::Registry(format!(
                "{}: registry does not allow deleting manifests",
                self.reference.registry
            ))),
            status => Err(OrasError::Registry(format!(
                "Failed to delete manifest {}: {}",
                desc.digest, status
            ))),
        }
    }
}

#[async_trait]
impl Target for Repository {
    async fn exists(&self, desc: &Descriptor) -> Result<bool> {
        let url = if media_types::is_manifest(&desc.media_type) {
            self.manifest_url(desc.digest.as_str())
        } else {
            self.blob_url(&desc.digest)
        };
        let response = self
            .send(AuthAction::Pull, |c| {
                c.head(&url).header(ACCEPT, desc.media_type.as_str())
            })
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(OrasError::Registry(format!(
                "Failed to check {}: {}",
                desc.digest, status
            ))),
        }
    }

    async fn push(&self, desc: &Descriptor, content: Vec<u8>) -> Result<()> {
        if media_types::is_manifest(&desc.media_type) {
            self.put_manifest(desc, content, desc.digest.as_str()).await
        } else {
            self.push_blob(desc, content).await
        }
    }

    async fn tag(&self, desc: &Descriptor, content: Vec<u8>, reference: &str) -> Result<()> {
        self.put_manifest(desc, content, reference).await
    }
}

impl ScopeRegistry for Repository {
    fn register_scope_hints(&self, repository: &str, hints: &ScopeHint) {
        let scope = repository_scope(repository, hints);
        let mut scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        if !scopes.contains(&scope) {
            tracing::debug!("registered scope hint {}", scope);
            scopes.push(scope);
        }
    }
}
