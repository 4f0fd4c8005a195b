//! Parsing of Baidu Pan shared links

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Canonical prefix of a shared link
pub const SHARED_URL_PREFIX: &str = "https://pan.baidu.com/s/";

static STANDARD_LINK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"pan\.baidu\.com/s/([^?#/&]+)").ok());
static SURL_LINK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"baidu\.com.*?[?&]surl=([^?#/&]+)").ok());

/// Identity of a shared link: the provider's share id and its access password
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedLink {
    /// Share id as used in `https://pan.baidu.com/s/<id>`
    pub shared_id: String,
    /// Access password, empty when the share is public
    pub shared_password: String,
}

impl SharedLink {
    /// Parse a raw link
    ///
    /// An explicit non-empty `password` wins over a `pwd` query parameter.
    pub fn parse(link: &str, password: Option<&str>) -> Result<Self> {
        let link = link.trim();
        let shared_id = extract_id(link).ok_or_else(|| {
            Error::InvalidSharedLink(format!("The shared url is not a valid url. {}", link))
        })?;

        let shared_password = match password.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => p.to_string(),
            None => query_password(link).unwrap_or_default(),
        };

        if shared_password.contains('.') || shared_id.contains('.') {
            return Err(Error::InvalidSharedLink(format!(
                "shared id and password must not contain '.': {}",
                link
            )));
        }

        Ok(Self {
            shared_id,
            shared_password,
        })
    }

    /// Canonical URL of the share
    pub fn url(&self) -> String {
        format!("{}{}", SHARED_URL_PREFIX, self.shared_id)
    }
}

fn extract_id(link: &str) -> Option<String> {
    if let Some(re) = STANDARD_LINK.as_ref()
        && let Some(caps) = re.captures(link)
    {
        return Some(caps[1].to_string());
    }
    // surl ids drop the leading "1" of the standard form
    if let Some(re) = SURL_LINK.as_ref()
        && let Some(caps) = re.captures(link)
    {
        return Some(format!("1{}", &caps[1]));
    }
    None
}

fn query_password(link: &str) -> Option<String> {
    let absolute = if link.contains("://") {
        link.to_string()
    } else {
        format!("https://{}", link)
    };
    let url = Url::parse(&absolute).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "pwd")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
