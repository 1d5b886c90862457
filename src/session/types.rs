use secrecy::SecretString;
use serde::Deserialize;

use crate::types::{CastleInfo, Params, UserInfo};

pub const DEFAULT_DEVICE_TYPE: &str = "android";
pub const DEFAULT_PLATFORM: &str = "igg";

/// Input values for `login_by_udid`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginRequest {
    pub udid: String,
    pub device_type: String,
    pub platform: String,
}

impl LoginRequest {
    #[must_use]
    pub fn new<S: Into<String>>(udid: S) -> Self {
        Self {
            udid: udid.into(),
            device_type: DEFAULT_DEVICE_TYPE.to_owned(),
            platform: DEFAULT_PLATFORM.to_owned(),
        }
    }

    #[must_use]
    pub fn with_device_type<S: Into<String>>(mut self, device_type: S) -> Self {
        self.device_type = device_type.into();
        self
    }

    #[must_use]
    pub fn with_platform<S: Into<String>>(mut self, platform: S) -> Self {
        self.platform = platform.into();
        self
    }

    pub(crate) fn params(&self) -> Params {
        Params::new()
            .with("udid", self.udid.as_str())
            .with("device_type", self.device_type.as_str())
            .with("platform", self.platform.as_str())
    }
}

/// `{"response_data": ...}` wrapper of every 200 response.
#[derive(Debug, Deserialize)]
pub(crate) struct ResponseEnvelope<T> {
    pub response_data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    pub token: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserData {
    #[serde(default)]
    pub user: UserInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CastleData {
    #[serde(default)]
    pub castle: CastleInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshData {
    pub new_token: Option<SecretString>,
}
