use std::time::Duration;

use authload_http::HttpRequest;
use serde_json::json;

use crate::config::{AuthConfig, ChainConfig};
use crate::payload::{Credentials, SignupPayload};

pub const PATH_SIGNUP: &str = "/api/auth/sign-up";
pub const PATH_LOGIN: &str = "/api/auth/login";
pub const PATH_DB_POKE: &str = "/diag/db-poke";

/// Call category; also the `endpoint` tag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum EndpointKind {
    Signup,
    Login,
    Chain,
}

/// Builds request descriptors against one base URL.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: String,
    timeout: Duration,
    chain: ChainConfig,
    token_scheme: String,
}

impl RequestBuilder {
    pub fn new(cfg: &AuthConfig) -> Self {
        Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            timeout: cfg.request_timeout,
            chain: cfg.chain.clone(),
            token_scheme: cfg.token.scheme.clone(),
        }
    }

    fn json(&self, req: HttpRequest) -> HttpRequest {
        req.with_header("content-type", "application/json")
            .with_header("accept", "application/json")
            .with_timeout(self.timeout)
    }

    pub fn signup(&self, payload: &SignupPayload) -> HttpRequest {
        let body = serde_json::to_value(payload)
            .map(|v| v.to_string())
            .unwrap_or_default();
        self.json(HttpRequest::post(
            format!("{}{PATH_SIGNUP}", self.base_url),
            body,
        ))
    }

    pub fn login(&self, creds: &Credentials) -> HttpRequest {
        let body = json!({ "loginId": creds.login_id, "password": creds.password });
        self.json(HttpRequest::post(
            format!("{}{PATH_LOGIN}", self.base_url),
            body.to_string(),
        ))
    }

    /// The follow-up call; sent without `authorization` when no token was found.
    pub fn chain(&self, token: Option<&str>) -> HttpRequest {
        let mut req = if self.chain.use_diag {
            HttpRequest::get(format!(
                "{}{PATH_DB_POKE}?ms={}",
                self.base_url, self.chain.diag_ms
            ))
        } else {
            let mut req = HttpRequest::new(
                self.chain.method.as_http(),
                format!("{}{}", self.base_url, self.chain.path),
            );
            if self.chain.method.sends_body() && !self.chain.body.is_empty() {
                req = req.with_body(self.chain.body.clone());
            }
            req
        };

        if let Some(token) = token {
            req = req.with_header("authorization", format!("{} {token}", self.token_scheme));
        }
        self.json(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainMethod;

    fn builder(chain: ChainConfig) -> RequestBuilder {
        RequestBuilder::new(&AuthConfig {
            base_url: "http://api.test/".to_string(),
            chain,
            ..Default::default()
        })
    }

    #[test]
    fn login_posts_credentials_as_json() {
        let b = builder(ChainConfig::default());
        let req = b.login(&Credentials {
            login_id: "tabc".to_string(),
            password: "Pw!1".to_string(),
        });

        assert_eq!(req.method, http::Method::POST);
        assert_eq!(req.url, "http://api.test/api/auth/login");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.timeout, Some(Duration::from_secs(30)));

        let body: serde_json::Value =
            serde_json::from_slice(&req.body).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(body["loginId"], "tabc");
        assert_eq!(body["password"], "Pw!1");
    }

    #[test]
    fn chain_attaches_token_with_scheme() {
        let b = builder(ChainConfig::default());
        let with = b.chain(Some("abc"));
        assert_eq!(with.method, http::Method::GET);
        assert_eq!(with.url, "http://api.test/api/user/profile");
        assert_eq!(with.header("authorization"), Some("Bearer abc"));
        assert!(with.body.is_empty());

        let without = b.chain(None);
        assert_eq!(without.header("authorization"), None);
    }

    #[test]
    fn chain_diag_and_body_methods() {
        let diag = builder(ChainConfig {
            use_diag: true,
            diag_ms: 75,
            ..Default::default()
        })
        .chain(None);
        assert_eq!(diag.url, "http://api.test/diag/db-poke?ms=75");

        let put = builder(ChainConfig {
            method: ChainMethod::Put,
            path: "/api/user/nickname".to_string(),
            body: r#"{"nickname":"x"}"#.to_string(),
            ..Default::default()
        })
        .chain(Some("t"));
        assert_eq!(put.method, http::Method::PUT);
        assert_eq!(put.body.as_ref(), br#"{"nickname":"x"}"#);
    }

    #[test]
    fn endpoint_tag_values() {
        assert_eq!(EndpointKind::Signup.as_ref(), "signup");
        assert_eq!(EndpointKind::Chain.to_string(), "chain");
    }
}
