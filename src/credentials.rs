//! Page query parameters and the two credential tokens they carry.

use std::collections::HashMap;

use crate::error::{ClientError, Result};

/// Query parameters of the page that started the session.
///
/// Credentials are read from here on every send, never cached, so a missing
/// token fails each request individually.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageParams {
    params: HashMap<String, String>,
}

impl PageParams {
    /// Parse a bare query string (`pid=1&ks=abc`, leading `?` allowed).
    pub fn from_query(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        let params = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        Self { params }
    }

    /// Parse the query string of a full page URL.
    ///
    /// # Errors
    /// `InvalidRequest` when `page_url` is not a URL.
    pub fn from_page_url(page_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(page_url)
            .map_err(|e| ClientError::InvalidRequest(format!("page url '{page_url}': {e}")))?;
        Ok(Self::from_query(parsed.query().unwrap_or("")))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Both tokens, or the name of the first missing one.
    pub fn credentials(&self) -> Result<Credentials> {
        let partner_id = self
            .get("pid")
            .ok_or(ClientError::MissingCredentials { missing: "pid" })?;
        let session_key = self
            .get("ks")
            .ok_or(ClientError::MissingCredentials { missing: "ks" })?;
        Ok(Credentials {
            partner_id: partner_id.to_string(),
            session_key: session_key.to_string(),
        })
    }
}

/// Partner id and session key, forwarded opaquely.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub partner_id: String,
    pub session_key: String,
}

impl Credentials {
    /// `"<pid>:<ks>"`, the `X-Authentication` header value.
    pub fn auth_header(&self) -> String {
        format!("{}:{}", self.partner_id, self.session_key)
    }

    /// Session key with the middle elided, safe for logs.
    pub fn masked_key(&self) -> String {
        let ks = &self.session_key;
        if ks.chars().count() <= 10 {
            return "*****".to_string();
        }
        let head: String = ks.chars().take(5).collect();
        let tail: String = ks.chars().rev().take(5).collect::<Vec<_>>().into_iter().rev().collect();
        format!("{head}...{tail}")
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("partner_id", &self.partner_id)
            .field("session_key", &self.masked_key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query_reads_both_tokens() {
        let params = PageParams::from_query("?pid=123&ks=abcdef");
        let creds = params.credentials().unwrap();
        assert_eq!(creds.partner_id, "123");
        assert_eq!(creds.auth_header(), "123:abcdef");
    }

    #[test]
    fn test_from_page_url() {
        let params = PageParams::from_page_url("https://host/index.html?ks=k%3D%3D&pid=9").unwrap();
        assert_eq!(params.get("ks"), Some("k=="));
        assert_eq!(params.get("pid"), Some("9"));
    }

    #[test]
    fn test_from_page_url_rejects_garbage() {
        assert!(PageParams::from_page_url("::::").is_err());
    }

    #[test]
    fn test_missing_pid_reported_first() {
        let err = PageParams::from_query("").credentials().unwrap_err();
        assert!(matches!(err, ClientError::MissingCredentials { missing: "pid" }));
    }

    #[test]
    fn test_empty_ks_counts_as_missing() {
        let err = PageParams::from_query("pid=1&ks=").credentials().unwrap_err();
        assert!(matches!(err, ClientError::MissingCredentials { missing: "ks" }));
    }

    #[test]
    fn test_debug_masks_session_key() {
        let creds = Credentials {
            partner_id: "1".into(),
            session_key: "djJ8MTIzfGFiY2RlZmdoaWprbA==".into(),
        };
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("djJ8MTIzfGFiY2RlZmdoaWprbA=="));
        assert!(dbg.contains("djJ8M...rbA=="));
    }
}
