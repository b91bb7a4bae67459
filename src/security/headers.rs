//! Header manipulation across the proxy boundary.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Withhold caller credentials unless the route forwards them
//! - Apply per-route header rules in configured order
//! - Add X-Forwarded-For / X-Forwarded-Host

use std::net::SocketAddr;

use axum::http::header::{AUTHORIZATION, CONNECTION, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::HeaderRuleConfig;
use crate::routing::RouteDescriptor;

/// Headers that only describe a single transport connection.
const HOP_BY_HOP: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// What a header rule does to the outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderAction {
    Forward,
    Strip,
    Override(HeaderValue),
}

/// A compiled header rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRule {
    pub name: HeaderName,
    pub action: HeaderAction,
}

impl HeaderRule {
    /// Compile a configured rule. The error is a human readable reason.
    pub fn compile(config: &HeaderRuleConfig) -> Result<Self, String> {
        let name = HeaderName::from_bytes(config.name.as_bytes())
            .map_err(|_| "is not a valid header name".to_string())?;

        if is_hop_by_hop(&name) {
            return Err("targets a hop-by-hop header".to_string());
        }

        let action = match (config.action.to_ascii_lowercase().as_str(), &config.value) {
            ("forward", None) => HeaderAction::Forward,
            ("strip", None) => HeaderAction::Strip,
            ("override", Some(value)) => HeaderAction::Override(
                HeaderValue::from_str(value).map_err(|_| "has an invalid value".to_string())?,
            ),
            ("override", None) => return Err("needs a value to override with".to_string()),
            ("forward" | "strip", Some(_)) => {
                return Err("only accepts a value with action \"override\"".to_string())
            }
            (other, _) => return Err(format!("has unknown action {:?}", other)),
        };

        Ok(Self { name, action })
    }
}

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Build the header set sent to the upstream for a matched route.
pub fn upstream_request_headers(
    inbound: &HeaderMap,
    route: &RouteDescriptor,
    client_addr: Option<SocketAddr>,
) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);

    // The client library derives Host from the target URL.
    if let Some(host) = headers.remove(HOST) {
        headers.insert(X_FORWARDED_HOST, host);
    }

    if let Some(addr) = client_addr {
        let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, addr.ip()),
            None => addr.ip().to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    let forwards_authorization = route
        .header_rules
        .iter()
        .any(|r| r.name == AUTHORIZATION && r.action == HeaderAction::Forward);
    if !route.credential_policy.forwards_credentials() && !forwards_authorization {
        headers.remove(AUTHORIZATION);
    }

    for rule in &route.header_rules {
        match &rule.action {
            HeaderAction::Forward => {}
            HeaderAction::Strip => {
                headers.remove(&rule.name);
            }
            HeaderAction::Override(value) => {
                headers.insert(rule.name.clone(), value.clone());
            }
        }
    }

    headers
}

/// Build the header set relayed to the caller from an upstream response.
pub fn downstream_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    strip_hop_by_hop(&mut headers);
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;

    fn rule(name: &str, action: &str, value: Option<&str>) -> HeaderRuleConfig {
        HeaderRuleConfig {
            name: name.into(),
            action: action.into(),
            value: value.map(String::from),
        }
    }

    fn route(credentials: &str, rules: Vec<HeaderRuleConfig>) -> RouteDescriptor {
        RouteDescriptor::compile(
            "/svc",
            &EndpointConfig {
                target: "http://localhost:3000".into(),
                credentials: credentials.into(),
                headers: rules,
                ..EndpointConfig::default()
            },
        )
        .unwrap()
    }

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("proxy.local"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, x-session"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session", HeaderValue::from_static("abc"));
        headers.insert("accept", HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn strips_hop_by_hop_and_connection_listed_headers() {
        let mut headers = inbound();
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        strip_hop_by_hop(&mut headers);

        assert!(headers.get(CONNECTION).is_none());
        assert!(headers.get("keep-alive").is_none());
        assert!(headers.get("x-session").is_none());
        assert!(headers.get("transfer-encoding").is_none());
        assert_eq!(headers["accept"], "application/json");
    }

    #[test]
    fn require_policy_withholds_authorization() {
        let headers = upstream_request_headers(&inbound(), &route("require", vec![]), None);
        assert!(headers.get(AUTHORIZATION).is_none());
        assert!(headers.get(HOST).is_none());
        assert_eq!(headers[X_FORWARDED_HOST], "proxy.local");
    }

    #[test]
    fn forward_policy_and_forward_rule_keep_authorization() {
        let headers = upstream_request_headers(&inbound(), &route("forward", vec![]), None);
        assert_eq!(headers[AUTHORIZATION], "Bearer secret");

        let headers = upstream_request_headers(
            &inbound(),
            &route("require", vec![rule("Authorization", "forward", None)]),
            None,
        );
        assert_eq!(headers[AUTHORIZATION], "Bearer secret");
    }

    #[test]
    fn rules_apply_in_order() {
        let route = route(
            "dangerously-allow-unauthenticated",
            vec![
                rule("accept", "strip", None),
                rule("x-api-key", "override", Some("one")),
                rule("x-api-key", "override", Some("two")),
                rule("authorization", "strip", None),
            ],
        );
        let headers = upstream_request_headers(&inbound(), &route, None);

        assert!(headers.get("accept").is_none());
        assert_eq!(headers["x-api-key"], "two");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn appends_client_address_to_forwarded_for() {
        let mut inbound = inbound();
        inbound.insert(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"));
        let addr: SocketAddr = "192.168.1.7:5000".parse().unwrap();

        let headers = upstream_request_headers(&inbound, &route("forward", vec![]), Some(addr));
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1, 192.168.1.7");
    }

    #[test]
    fn rejects_invalid_rules() {
        assert!(HeaderRule::compile(&rule("bad header", "strip", None)).is_err());
        assert!(HeaderRule::compile(&rule("connection", "forward", None)).is_err());
        assert!(HeaderRule::compile(&rule("x-key", "override", None)).is_err());
        assert!(HeaderRule::compile(&rule("x-key", "strip", Some("v"))).is_err());
        assert!(HeaderRule::compile(&rule("x-key", "rename", None)).is_err());
        assert_eq!(
            HeaderRule::compile(&rule("X-Key", "STRIP", None)),
            Ok(HeaderRule {
                name: HeaderName::from_static("x-key"),
                action: HeaderAction::Strip,
            })
        );
    }
}
