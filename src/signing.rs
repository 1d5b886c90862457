//! Request signing and envelope construction.
//!
//! The signature is `md5(sorted "k=v" pairs joined by '&' ++ secret)` rendered
//! as lowercase hex. The secret is appended with no separator. MD5 is what the
//! server verifies against; it gives tamper evidence against naive edits only.

use chrono::Utc;
use md5::{Digest as _, Md5};
use reqwest::header::{
    AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use url::Url;

use crate::error::Error;
use crate::types::Params;
use crate::{Result, Timestamp};

pub const DEVICE_ID: HeaderName = HeaderName::from_static("device-id");

/// Signs `params` with `secret`.
///
/// Deterministic: the pairs are serialized in ascending key order no matter how
/// `params` was built.
#[must_use]
pub fn sign(params: &Params, secret: &str) -> String {
    let mut material = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    material.push_str(secret);

    format!("{:x}", Md5::digest(material.as_bytes()))
}

/// JSON body of every call: `{"params": {...}, "ts": 1700000000, "sign": "..."}`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequestBody {
    pub params: Params,
    pub ts: Timestamp,
    pub sign: String,
}

/// A fully built call, ready for a [`Transport`](crate::Transport).
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct SignedRequest {
    pub endpoint: &'static str,
    pub url: Url,
    pub body: RequestBody,
    pub headers: HeaderMap,
}

impl SignedRequest {
    /// The bearer token attached to this request, if any.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// Builds signed envelopes for one API host. Performs no I/O.
#[derive(Clone, Debug)]
pub struct RequestSigner {
    base: Url,
    secret: SecretString,
    device_id: HeaderValue,
    user_agent: HeaderValue,
}

impl RequestSigner {
    /// `base` must end with `/` so endpoints join beneath it.
    pub fn new(base: Url, secret: SecretString, device_id: &str, user_agent: &str) -> Result<Self> {
        if device_id.trim().is_empty() {
            return Err(Error::validation("device id must not be empty"));
        }

        Ok(Self {
            base,
            secret,
            device_id: HeaderValue::from_str(device_id)?,
            user_agent: HeaderValue::from_str(user_agent)?,
        })
    }

    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Signs `params` and packages them for `endpoint`.
    ///
    /// `timestamp` overrides the current time, which makes the result fully
    /// reproducible.
    pub fn build(
        &self,
        endpoint: &'static str,
        params: Params,
        token: Option<&SecretString>,
        timestamp: Option<Timestamp>,
    ) -> Result<SignedRequest> {
        if params.is_empty() {
            return Err(Error::validation(format!(
                "refusing to send {endpoint} with no params"
            )));
        }

        let sign = sign(&params, self.secret.expose_secret());
        let ts = timestamp.unwrap_or_else(|| Utc::now().timestamp());

        Ok(SignedRequest {
            endpoint,
            url: self.base.join(endpoint)?,
            body: RequestBody { params, ts, sign },
            headers: self.headers(token)?,
        })
    }

    fn headers(&self, token: Option<&SecretString>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(DEVICE_ID, self.device_id.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, self.user_agent.clone());

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }
}
