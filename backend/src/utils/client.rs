use axum::http::{header::USER_AGENT, HeaderMap};

const MAX_USER_AGENT_LEN: usize = 512;

/// Caller details recorded next to challenges and refresh tokens.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip: extract_ip(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

pub fn extract_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        return value
            .split(',')
            .next()
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty());
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|agent| agent.trim().chars().take(MAX_USER_AGENT_LEN).collect::<String>())
        .filter(|agent| !agent.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_wins_over_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        headers.insert(USER_AGENT, HeaderValue::from_static("  KioskApp/1.0 "));

        let meta = ClientMeta::from_headers(&headers);
        assert_eq!(meta.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(meta.user_agent.as_deref(), Some("KioskApp/1.0"));
    }

    #[test]
    fn missing_headers_give_none() {
        let meta = ClientMeta::from_headers(&HeaderMap::new());
        assert!(meta.ip.is_none());
        assert!(meta.user_agent.is_none());
    }
}
