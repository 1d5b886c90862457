#![allow(dead_code, reason = "not every test binary uses every helper")]

use std::time::Duration;

use httpmock::MockServer;
use lords_client::types::{Params, Region};
use lords_client::{Config, SessionClient, sign};
use secrecy::SecretString;
use url::Url;

pub const SECRET: &str = "lm2025iggtrackx9";
pub const DEVICE_ID: &str = "android_test_001";
pub const KINGDOM_ID: u32 = 1234;

pub fn config(server: &MockServer) -> Config {
    Config::builder()
        .region(Region::ApSeoul)
        .kingdom_id(KINGDOM_ID)
        .secret_key(SecretString::from(SECRET))
        .device_id(DEVICE_ID)
        .base_url(Url::parse(&server.url("/api")).expect("mock server url"))
        .build()
}

pub fn client(server: &MockServer) -> SessionClient {
    SessionClient::new(config(server)).expect("client")
}

pub fn client_with_timeout(server: &MockServer, timeout: Duration) -> SessionClient {
    let mut config = config(server);
    config.timeout = timeout;
    SessionClient::new(config).expect("client")
}

/// The `"sign":"..."` fragment the request body must contain for `params`.
pub fn sign_fragment(params: &Params) -> String {
    format!("\"sign\":\"{}\"", sign(params, SECRET))
}
