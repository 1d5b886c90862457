use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::Error;
use crate::types::Region;
use crate::{DEFAULT_DOMAIN, DEFAULT_TIMEOUT, Result, USER_AGENT};

/// Values as typically read from a config file or the environment.
#[derive(Clone, Debug)]
pub struct RawConfig {
    pub region: String,
    pub kingdom_id: u32,
    pub secret_key: SecretString,
    pub device_id: String,
}

/// Session client configuration. Immutable once the client is built.
#[derive(Clone, Debug, bon::Builder)]
pub struct Config {
    pub region: Region,
    /// Kingdom used by castle lookups that do not name one.
    pub kingdom_id: u32,
    pub secret_key: SecretString,
    #[builder(into)]
    pub device_id: String,
    #[builder(into, default = DEFAULT_DOMAIN.to_owned())]
    pub domain: String,
    #[builder(into, default = USER_AGENT.to_owned())]
    pub user_agent: String,
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
    /// Replaces the region-derived API base, e.g. to target a mock server.
    pub base_url: Option<Url>,
}

impl Config {
    pub fn from_raw(raw: RawConfig) -> Result<Self> {
        let region = Region::parse(&raw.region)?;

        Ok(Config::builder()
            .region(region)
            .kingdom_id(raw.kingdom_id)
            .secret_key(raw.secret_key)
            .device_id(raw.device_id)
            .build())
    }

    /// Base URL endpoints are joined onto, always ending in `/`.
    pub fn api_base(&self) -> Result<Url> {
        match &self.base_url {
            Some(url) if url.path().ends_with('/') => Ok(url.clone()),
            Some(url) => {
                let mut url = url.clone();
                let path = format!("{}/", url.path());
                url.set_path(&path);
                Ok(url)
            }
            None => {
                if self.domain.trim().is_empty() {
                    return Err(Error::validation("domain must not be empty"));
                }
                Ok(Url::parse(&format!(
                    "https://lmapi-{}.{}/api/",
                    self.region, self.domain
                ))?)
            }
        }
    }
}
