//! Embedding context passed in through the page's query string.
//!
//! When the console is hosted inside another product, the host hands over a
//! token, the org slug, and which panels to hide via `?token=..&org=..`.
//! Values from the query win over whatever the session already had.

use crate::config::RemoteConfig;
use serde::{Deserialize, Serialize};

/// Raw parameters read from a query string. Unset keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedParams {
    pub token: Option<String>,
    pub org: Option<String>,
    pub embedded: Option<bool>,
    pub hide: Option<Vec<String>>,
}

impl EmbedParams {
    /// Parse `query`, with or without the leading `?`. Unknown keys are
    /// ignored; a repeated key keeps its last value.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "token" if !value.is_empty() => params.token = Some(value.into_owned()),
                "org" if !value.is_empty() => params.org = Some(value.into_owned()),
                "embedded" => params.embedded = Some(parse_flag(&value)),
                "hide" => {
                    params.hide = Some(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect(),
                    );
                }
                _ => {}
            }
        }
        params
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

/// Resolved embedding state, kept in the session between page loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedContext {
    pub token: Option<String>,
    pub org: Option<String>,
    /// Panels the host asked to hide, e.g. `header`, `sidebar`.
    pub hide: Vec<String>,
    pub is_embedded: bool,
}

impl EmbedContext {
    /// Overlay query parameters on a previously stored context.
    ///
    /// A token in the query implies embedding even when `embedded` is not
    /// given explicitly.
    #[must_use]
    pub fn resolve(stored: Option<&EmbedContext>, params: &EmbedParams) -> Self {
        let mut ctx = stored.cloned().unwrap_or_default();
        if let Some(token) = &params.token {
            ctx.token = Some(token.clone());
            ctx.is_embedded = true;
        }
        if let Some(org) = &params.org {
            ctx.org = Some(org.clone());
        }
        if let Some(hide) = &params.hide {
            ctx.hide = hide.clone();
        }
        if let Some(embedded) = params.embedded {
            ctx.is_embedded = embedded;
        }
        ctx
    }

    pub fn hides(&self, panel: &str) -> bool {
        self.hide.iter().any(|p| p.eq_ignore_ascii_case(panel))
    }

    /// Carry the embedded credentials into a remote configuration.
    pub fn apply_to(&self, config: &mut RemoteConfig) {
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
        if let Some(org) = &self.org {
            config.org = Some(org.clone());
        }
    }
}
