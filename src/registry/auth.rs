//! Bearer token authentication for the distribution API

use crate::{OrasError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

/// Registry credentials
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    #[default]
    Anonymous,
    Basic { username: String, password: String },
}

impl Credentials {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        match (username, password) {
            (Some(username), password) => Credentials::Basic {
                username,
                password: password.unwrap_or_default(),
            },
            _ => Credentials::Anonymous,
        }
    }

    /// Value of a basic `Authorization` header
    pub fn basic_header(&self) -> Option<String> {
        match self {
            Credentials::Anonymous => None,
            Credentials::Basic { username, password } => Some(format!(
                "Basic {}",
                STANDARD.encode(format!("{}:{}", username, password))
            )),
        }
    }
}

/// Parsed `WWW-Authenticate` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Basic,
    Bearer {
        realm: String,
        service: Option<String>,
        scope: Option<String>,
    },
}

impl Challenge {
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));

        if scheme.eq_ignore_ascii_case("basic") {
            return Some(Challenge::Basic);
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in parse_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        Some(Challenge::Bearer {
            realm: realm?,
            service,
            scope,
        })
    }
}

/// Split `key="value",key2="a,b"` respecting quotes
fn parse_params(params: &str) -> Vec<(String, String)> {
    let mut result = Vec::new();
    let mut rest = params.trim();

    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_string();

        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (quoted[..end].to_string(), &quoted[end + 1..]),
                None => (quoted.to_string(), ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (after[..end].trim().to_string(), &after[end..]),
                None => (after.trim().to_string(), ""),
            }
        };

        result.push((key, value));
        rest = remaining.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
    }

    result
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Exchange credentials for a bearer token covering `scopes`
pub async fn fetch_token(
    client: &reqwest::Client,
    realm: &str,
    service: Option<&str>,
    scopes: &[String],
    credentials: &Credentials,
) -> Result<String> {
    let mut query: Vec<(&str, &str)> = Vec::new();
    if let Some(service) = service {
        query.push(("service", service));
    }
    for scope in scopes {
        query.push(("scope", scope.as_str()));
    }

    tracing::debug!(realm, ?scopes, "requesting registry token");

    let mut request = client.get(realm).query(&query);
    if let Some(basic) = credentials.basic_header() {
        request = request.header(reqwest::header::AUTHORIZATION, basic);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(OrasError::Auth(format!(
            "token request to {} failed: {}",
            realm,
            response.status()
        )));
    }

    let body: TokenResponse = response.json().await?;
    body.token
        .or(body.access_token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| OrasError::Auth(format!("no token in response from {}", realm)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_challenge() {
        let challenge = Challenge::parse(
            r#"Bearer realm="https://auth.example.io/token",service="registry.example.io",scope="repository:hello:pull,push""#,
        )
        .unwrap();
        assert_eq!(
            challenge,
            Challenge::Bearer {
                realm: "https://auth.example.io/token".to_string(),
                service: Some("registry.example.io".to_string()),
                scope: Some("repository:hello:pull,push".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_other_challenges() {
        assert_eq!(Challenge::parse(r#"Basic realm="registry""#), Some(Challenge::Basic));
        assert_eq!(Challenge::parse("Bearer service=\"x\""), None);
        assert_eq!(Challenge::parse("Digest realm=\"x\""), None);
    }

    #[test]
    fn test_basic_header() {
        let credentials = Credentials::new(Some("user".to_string()), Some("pass".to_string()));
        assert_eq!(credentials.basic_header().unwrap(), "Basic dXNlcjpwYXNz");
        assert!(Credentials::new(None, Some("pass".to_string())).basic_header().is_none());
    }
}
