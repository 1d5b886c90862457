//! Signed-request client for the Lords Mobile private HTTP API.
//!
//! The crate is split into a pure signing layer and an effectful session layer:
//! - [`signing`] canonicalizes business parameters, signs them with the shared
//!   secret and packages the JSON body plus headers for one call
//! - [`transport`] is the narrow POST boundary the session layer sends through
//! - [`session`] owns the session token and exposes `login_by_udid`,
//!   `get_user_info`, `get_castle_detail` and `refresh_token`
//!
//! Nothing in this crate prints. Results are returned as plain records for a
//! front end to render.

pub mod error;
pub mod session;
pub mod signing;
pub mod transport;
pub mod types;

use std::time::Duration;

pub use error::Error;
pub use session::{Config, LoginRequest, RawConfig, SessionClient};
pub use signing::{RequestBody, RequestSigner, SignedRequest, sign};
pub use transport::{RawResponse, ReqwestTransport, Transport};
pub use types::{CastleInfo, ParamValue, Params, Region, Resources, UserInfo};

pub type Result<T> = std::result::Result<T, Error>;

/// Unix timestamp in whole seconds.
pub type Timestamp = i64;

/// Default API domain; the full host is `lmapi-{region}.{domain}`.
pub const DEFAULT_DOMAIN: &str = "lordsmobile.igg.com";

/// The game client's `User-Agent`. The server expects this exact value.
pub const USER_AGENT: &str = "UnityPlayer/2022.3.40f1 (Android)";

/// Upper bound for a single call, including connect.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoint names, appended to the region base URL.
pub mod endpoint {
    pub const LOGIN_BY_UDID: &str = "login_by_udid";
    pub const GET_USER_INFO: &str = "get_user_info";
    pub const GET_CASTLE_DETAIL: &str = "get_castle_detail";
    pub const REFRESH_TOKEN: &str = "refresh_token";
}
