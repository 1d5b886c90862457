use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret as _, SecretString};
use serde::de::DeserializeOwned;

use crate::Result;
use crate::endpoint::{GET_CASTLE_DETAIL, GET_USER_INFO, LOGIN_BY_UDID, REFRESH_TOKEN};
use crate::error::Error;
use crate::session::Config;
use crate::session::types::{
    CastleData, LoginData, LoginRequest, RefreshData, ResponseEnvelope, UserData,
};
use crate::signing::RequestSigner;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{CastleInfo, Params, UserInfo};

/// Client for one device session.
///
/// Holds at most one token. Only a successful `authenticate` or refresh
/// replaces it; those take `&mut self`, so the borrow checker serializes token
/// writes against every other use of the client.
#[derive(Debug)]
pub struct SessionClient<T = ReqwestTransport> {
    config: Config,
    signer: RequestSigner,
    transport: T,
    token: Option<SecretString>,
}

impl SessionClient {
    /// Creates an unauthenticated client over the default HTTP transport.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_transport(config, ReqwestTransport::default())
    }
}

impl<T: Transport> SessionClient<T> {
    /// Creates an unauthenticated client over a custom transport.
    pub fn with_transport(config: Config, transport: T) -> Result<Self> {
        let signer = RequestSigner::new(
            config.api_base()?,
            config.secret_key.clone(),
            &config.device_id,
            &config.user_agent,
        )?;

        Ok(Self {
            config,
            signer,
            transport,
            token: None,
        })
    }

    /// Starts the session from an already issued token.
    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Logs in by device UDID with the default device type and platform.
    pub async fn authenticate(&mut self, udid: &str) -> Result<SecretString> {
        self.authenticate_with(&LoginRequest::new(udid)).await
    }

    /// Logs in by device UDID and stores the issued token.
    pub async fn authenticate_with(&mut self, request: &LoginRequest) -> Result<SecretString> {
        let data: LoginData = self.call(LOGIN_BY_UDID, request.params(), None).await?;
        let token = data
            .token
            .ok_or_else(|| Error::malformed(LOGIN_BY_UDID, "missing field `token`"))?;

        #[cfg(feature = "tracing")]
        tracing::info!(udid = %request.udid, "authenticated");

        self.token = Some(token.clone());
        Ok(token)
    }

    /// Fetches a player's profile by user id, or by castle id if no user id is given.
    ///
    /// Zero ids count as absent.
    pub async fn fetch_user_info(
        &self,
        user_id: Option<i64>,
        castle_id: Option<i64>,
    ) -> Result<UserInfo> {
        let token = self.require_token(GET_USER_INFO)?;

        let params = match (nonzero(user_id), nonzero(castle_id)) {
            (Some(user_id), _) => Params::new().with("user_id", user_id),
            (None, Some(castle_id)) => Params::new().with("castle_id", castle_id),
            (None, None) => {
                return Err(Error::missing_parameter(
                    GET_USER_INFO,
                    "user_id or castle_id",
                ));
            }
        };

        let data: UserData = self.call(GET_USER_INFO, params, Some(token)).await?;
        Ok(data.user)
    }

    /// Fetches the castle at `(x, y)`, in the configured kingdom unless one is given.
    pub async fn fetch_castle_detail(
        &self,
        x: i64,
        y: i64,
        kingdom_id: Option<u32>,
    ) -> Result<CastleInfo> {
        let token = self.require_token(GET_CASTLE_DETAIL)?;

        let kingdom_id = kingdom_id
            .filter(|id| *id != 0)
            .unwrap_or(self.config.kingdom_id);
        let params = Params::new()
            .with("kingdom_id", kingdom_id)
            .with("x", x)
            .with("y", y);

        let data: CastleData = self.call(GET_CASTLE_DETAIL, params, Some(token)).await?;
        Ok(data.castle)
    }

    /// Exchanges `old_token` for a new one and stores it.
    ///
    /// Sent without an `Authorization` header: the old token travels in the
    /// signed params instead.
    pub async fn refresh_token(&mut self, old_token: &str) -> Result<SecretString> {
        let params = Params::new().with("old_token", old_token);
        let data: RefreshData = self.call(REFRESH_TOKEN, params, None).await?;
        let token = data
            .new_token
            .ok_or_else(|| Error::malformed(REFRESH_TOKEN, "missing field `new_token`"))?;

        #[cfg(feature = "tracing")]
        tracing::info!("session token refreshed");

        self.token = Some(token.clone());
        Ok(token)
    }

    /// Refreshes the token this client currently holds.
    pub async fn refresh_current_token(&mut self) -> Result<SecretString> {
        let old = self.require_token(REFRESH_TOKEN)?.clone();
        self.refresh_token(old.expose_secret()).await
    }

    fn require_token(&self, endpoint: &'static str) -> Result<&SecretString> {
        self.token
            .as_ref()
            .ok_or_else(|| Error::not_authenticated(endpoint))
    }

    async fn call<D: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: Params,
        token: Option<&SecretString>,
    ) -> Result<D> {
        let request = self.signer.build(endpoint, params, token, None)?;
        let response = self.transport.post(&request, self.config.timeout).await?;

        if response.status_code != StatusCode::OK {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                endpoint,
                status = %response.status_code,
                body = %response.body,
                "API request failed"
            );
            return Err(Error::status(
                response.status_code,
                Method::POST,
                request.url.path().to_owned(),
                response.body,
            ));
        }

        let de = &mut serde_json::Deserializer::from_str(&response.body);
        let envelope: ResponseEnvelope<D> = serde_path_to_error::deserialize(de).map_err(|e| {
            #[cfg(feature = "tracing")]
            tracing::warn!(endpoint, error = %e, "unexpected response shape");
            Error::malformed(endpoint, e.to_string())
        })?;

        envelope
            .response_data
            .ok_or_else(|| Error::malformed(endpoint, "missing `response_data`"))
    }
}

fn nonzero(id: Option<i64>) -> Option<i64> {
    id.filter(|id| *id != 0)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use secrecy::ExposeSecret as _;
    use serde_json::json;

    use super::*;
    use crate::error::{Kind, Status};
    use crate::signing::{SignedRequest, sign};
    use crate::transport::RawResponse;
    use crate::types::Region;

    const SECRET: &str = "lm2025iggtrackx9";

    /// Replays queued responses and records every request it receives.
    #[derive(Debug, Default)]
    struct MockTransport {
        responses: Mutex<VecDeque<Result<RawResponse>>>,
        requests: Mutex<Vec<SignedRequest>>,
    }

    impl MockTransport {
        fn replying<I: IntoIterator<Item = Result<RawResponse>>>(responses: I) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
                requests: Mutex::default(),
            })
        }

        fn silent() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, index: usize) -> SignedRequest {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn post(&self, request: &SignedRequest, timeout: Duration) -> Result<RawResponse> {
            assert_eq!(timeout, crate::DEFAULT_TIMEOUT);
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected call to {}", request.endpoint))
        }
    }

    fn ok(body: serde_json::Value) -> Result<RawResponse> {
        Ok(RawResponse::new(StatusCode::OK, body.to_string()))
    }

    fn forbidden() -> Result<RawResponse> {
        Ok(RawResponse::new(StatusCode::FORBIDDEN, "forbidden"))
    }

    fn config() -> Config {
        Config::builder()
            .region(Region::ApSeoul)
            .kingdom_id(1234)
            .secret_key(SecretString::from(SECRET))
            .device_id("android_test_001")
            .build()
    }

    fn client(transport: &Arc<MockTransport>) -> SessionClient<Arc<MockTransport>> {
        SessionClient::with_transport(config(), Arc::clone(transport)).unwrap()
    }

    fn login_ok() -> Result<RawResponse> {
        ok(json!({ "response_data": { "token": "abc123" } }))
    }

    fn token_of(client: &SessionClient<Arc<MockTransport>>) -> Option<String> {
        client.token().map(|t| t.expose_secret().to_owned())
    }

    #[tokio::test]
    async fn authenticate_stores_token_and_sends_unauthenticated() {
        let transport = MockTransport::replying([login_ok()]);
        let mut client = client(&transport);

        let token = client.authenticate("udid1").await.unwrap();

        assert_eq!(token.expose_secret(), "abc123");
        assert_eq!(token_of(&client).as_deref(), Some("abc123"));

        let request = transport.request(0);
        assert_eq!(request.endpoint, "login_by_udid");
        assert_eq!(request.bearer(), None);
        assert_eq!(
            request.url.as_str(),
            "https://lmapi-ap-seoul.lordsmobile.igg.com/api/login_by_udid"
        );
        let expected = Params::new()
            .with("udid", "udid1")
            .with("device_type", "android")
            .with("platform", "igg");
        assert_eq!(request.body.sign, sign(&expected, SECRET));
        assert_eq!(request.body.params, expected);
    }

    #[tokio::test]
    async fn authenticated_calls_attach_bearer() {
        let transport = MockTransport::replying([
            login_ok(),
            ok(json!({ "response_data": { "user": { "name": "Ragnar" } } })),
            ok(json!({ "response_data": { "castle": { "owner_name": "Ragnar" } } })),
        ]);
        let mut client = client(&transport);

        client.authenticate("udid1").await.unwrap();
        client.fetch_user_info(Some(1), None).await.unwrap();
        client.fetch_castle_detail(100, 200, None).await.unwrap();

        assert_eq!(transport.request(1).bearer(), Some("abc123"));
        assert_eq!(transport.request(2).bearer(), Some("abc123"));
    }

    #[tokio::test]
    async fn authenticate_without_token_field_is_malformed() {
        let transport = MockTransport::replying([ok(json!({ "response_data": {} }))]);
        let mut client = client(&transport);

        let err = client.authenticate("udid1").await.unwrap_err();

        assert_eq!(err.kind(), Kind::MalformedResponse);
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn authenticate_with_non_json_body_is_malformed() {
        let transport =
            MockTransport::replying([Ok(RawResponse::new(StatusCode::OK, "<html>oops</html>"))]);
        let mut client = client(&transport);

        let err = client.authenticate("udid1").await.unwrap_err();

        assert_eq!(err.kind(), Kind::MalformedResponse);
    }

    #[tokio::test]
    async fn authenticate_with_custom_device() {
        let transport = MockTransport::replying([login_ok()]);
        let mut client = client(&transport);

        client
            .authenticate_with(&LoginRequest::new("udid1").with_device_type("ios"))
            .await
            .unwrap();

        let request = transport.request(0);
        assert_eq!(request.body.params.get("device_type"), Some(&"ios".into()));
        assert_eq!(request.body.params.get("platform"), Some(&"igg".into()));
    }

    #[tokio::test]
    async fn failed_authenticate_keeps_previous_token() {
        let transport = MockTransport::replying([forbidden()]);
        let mut client = client(&transport).with_token(SecretString::from("previous"));

        let err = client.authenticate("udid1").await.unwrap_err();

        assert_eq!(err.kind(), Kind::Status);
        assert_eq!(token_of(&client).as_deref(), Some("previous"));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_unchanged() {
        let transport = MockTransport::replying([Err(Error::with_source(
            Kind::Transport,
            io::Error::new(io::ErrorKind::TimedOut, "timed out"),
        ))]);
        let mut client = client(&transport).with_token(SecretString::from("previous"));

        let err = client.authenticate("udid1").await.unwrap_err();

        assert_eq!(err.kind(), Kind::Transport);
        assert_eq!(token_of(&client).as_deref(), Some("previous"));
    }

    #[tokio::test]
    async fn fetch_user_info_requires_token() {
        let transport = MockTransport::silent();
        let client = client(&transport);

        let err = client.fetch_user_info(Some(1), None).await.unwrap_err();

        assert_eq!(err.kind(), Kind::NotAuthenticated);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn fetch_castle_detail_requires_token() {
        let transport = MockTransport::silent();
        let client = client(&transport);

        let err = client.fetch_castle_detail(1, 2, None).await.unwrap_err();

        assert_eq!(err.kind(), Kind::NotAuthenticated);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn fetch_user_info_requires_an_id() {
        let transport = MockTransport::silent();
        let client = client(&transport).with_token(SecretString::from("abc123"));

        let neither = client.fetch_user_info(None, None).await.unwrap_err();
        let zeros = client.fetch_user_info(Some(0), Some(0)).await.unwrap_err();

        assert_eq!(neither.kind(), Kind::MissingParameter);
        assert_eq!(zeros.kind(), Kind::MissingParameter);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn fetch_user_info_prefers_user_id() {
        let transport = MockTransport::replying([
            ok(json!({ "response_data": { "user": {} } })),
            ok(json!({ "response_data": { "user": {} } })),
        ]);
        let client = client(&transport).with_token(SecretString::from("abc123"));

        client.fetch_user_info(Some(7), Some(9)).await.unwrap();
        client.fetch_user_info(Some(0), Some(9)).await.unwrap();

        assert_eq!(
            transport.request(0).body.params,
            Params::new().with("user_id", 7_i64)
        );
        assert_eq!(
            transport.request(1).body.params,
            Params::new().with("castle_id", 9_i64)
        );
    }

    #[tokio::test]
    async fn fetch_user_info_passes_payload_through() {
        let transport = MockTransport::replying([ok(json!({
            "response_data": {
                "user": {
                    "castle_id": 555,
                    "name": "Ragnar",
                    "might": 987_654_321_u64,
                    "vip_level": 12,
                    "leader_level": 60,
                    "guild_name": "Vikings",
                    "resources": { "food": 1, "ore": 2, "timber": 3, "stone": 4, "gold": 5, "gems": 6 },
                    "troops": { "t1": 100, "t4": 4 }
                }
            }
        }))]);
        let client = client(&transport).with_token(SecretString::from("abc123"));

        let user = client.fetch_user_info(Some(1), None).await.unwrap();

        assert_eq!(user.castle_id(), Some(555));
        assert_eq!(user.might(), Some(987_654_321));
        assert_eq!(user.guild_name(), Some("Vikings"));
        assert_eq!(user.resources().map(|r| r.gems), Some(6));
        assert_eq!(user.troops().len(), 2);
    }

    #[tokio::test]
    async fn missing_user_object_defaults() {
        let transport = MockTransport::replying([ok(json!({ "response_data": {} }))]);
        let client = client(&transport).with_token(SecretString::from("abc123"));

        let user = client.fetch_user_info(Some(1), None).await.unwrap();

        assert_eq!(user, UserInfo::default());
    }

    #[tokio::test]
    async fn missing_response_data_is_malformed() {
        let transport = MockTransport::replying([ok(json!({ "status": "ok" }))]);
        let client = client(&transport).with_token(SecretString::from("abc123"));

        let err = client.fetch_user_info(Some(1), None).await.unwrap_err();

        assert_eq!(err.kind(), Kind::MalformedResponse);
    }

    #[tokio::test]
    async fn unexpected_scalar_types_pass_through() {
        let transport = MockTransport::replying([
            ok(json!({ "response_data": { "user": { "castle_id": "9001" } } })),
            ok(json!({ "response_data": { "user": { "might": 1.5e6 } } })),
            ok(json!({ "response_data": { "user": { "troops": { "t1": -3 } } } })),
            ok(json!({ "response_data": { "castle": { "might": "lots" } } })),
        ]);
        let client = client(&transport).with_token(SecretString::from("abc123"));

        let user = client.fetch_user_info(Some(1), None).await.unwrap();
        assert_eq!(user.get("castle_id"), Some(&json!("9001")));
        assert_eq!(user.castle_id(), Some(9001));

        let user = client.fetch_user_info(Some(1), None).await.unwrap();
        assert_eq!(user.get("might"), Some(&json!(1.5e6)));
        assert_eq!(user.might(), Some(1_500_000));

        let user = client.fetch_user_info(Some(1), None).await.unwrap();
        assert_eq!(user.troops().get("t1"), Some(&-3));

        let castle = client.fetch_castle_detail(1, 2, None).await.unwrap();
        assert_eq!(castle.get("might"), Some(&json!("lots")));
        assert_eq!(castle.might(), None);
    }

    #[tokio::test]
    async fn non_object_user_is_malformed_with_path() {
        let transport = MockTransport::replying([ok(json!({
            "response_data": { "user": [1, 2, 3] }
        }))]);
        let client = client(&transport).with_token(SecretString::from("abc123"));

        let err = client.fetch_user_info(Some(1), None).await.unwrap_err();

        assert_eq!(err.kind(), Kind::MalformedResponse);
        assert!(err.to_string().contains("user"), "{err}");
    }

    #[tokio::test]
    async fn fetch_castle_detail_defaults_kingdom() {
        let transport = MockTransport::replying([
            ok(json!({ "response_data": { "castle": {} } })),
            ok(json!({ "response_data": { "castle": {} } })),
            ok(json!({ "response_data": { "castle": {} } })),
        ]);
        let client = client(&transport).with_token(SecretString::from("abc123"));

        client.fetch_castle_detail(10, 20, None).await.unwrap();
        client.fetch_castle_detail(10, 20, Some(0)).await.unwrap();
        client.fetch_castle_detail(10, 20, Some(99)).await.unwrap();

        let expected = |kingdom_id: u32| {
            Params::new()
                .with("kingdom_id", kingdom_id)
                .with("x", 10_i64)
                .with("y", 20_i64)
        };
        assert_eq!(transport.request(0).body.params, expected(1234));
        assert_eq!(transport.request(1).body.params, expected(1234));
        assert_eq!(transport.request(2).body.params, expected(99));
    }

    #[tokio::test]
    async fn fetch_castle_detail_returns_castle() {
        let transport = MockTransport::replying([ok(json!({
            "response_data": {
                "castle": {
                    "owner_name": "Bjorn",
                    "might": 42,
                    "guild_name": "Raiders",
                    "shield_remaining": 3600,
                    "fury_time": 0,
                    "incoming_rallies": [{ "from": "x" }, { "from": "y" }]
                }
            }
        }))]);
        let client = client(&transport).with_token(SecretString::from("abc123"));

        let castle = client.fetch_castle_detail(1, 2, None).await.unwrap();

        assert_eq!(castle.owner_name(), Some("Bjorn"));
        assert_eq!(castle.shield_remaining(), Some(3600));
        assert_eq!(castle.incoming_rallies().len(), 2);
    }

    #[tokio::test]
    async fn refresh_token_overwrites_token() {
        let transport =
            MockTransport::replying([ok(json!({ "response_data": { "new_token": "xyz" } }))]);
        let mut client = client(&transport).with_token(SecretString::from("abc123"));

        let token = client.refresh_token("old").await.unwrap();

        assert_eq!(token.expose_secret(), "xyz");
        assert_eq!(token_of(&client).as_deref(), Some("xyz"));

        let request = transport.request(0);
        assert_eq!(request.endpoint, "refresh_token");
        assert_eq!(request.bearer(), None);
        assert_eq!(request.body.params, Params::new().with("old_token", "old"));
    }

    #[tokio::test]
    async fn refresh_token_without_new_token_keeps_old() {
        let transport = MockTransport::replying([ok(json!({ "response_data": {} }))]);
        let mut client = client(&transport).with_token(SecretString::from("abc123"));

        let err = client.refresh_token("abc123").await.unwrap_err();

        assert_eq!(err.kind(), Kind::MalformedResponse);
        assert_eq!(token_of(&client).as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn refresh_current_token_uses_stored_token() {
        let transport =
            MockTransport::replying([ok(json!({ "response_data": { "new_token": "xyz" } }))]);
        let mut client = client(&transport).with_token(SecretString::from("abc123"));

        client.refresh_current_token().await.unwrap();

        assert_eq!(
            transport.request(0).body.params,
            Params::new().with("old_token", "abc123")
        );
        assert_eq!(token_of(&client).as_deref(), Some("xyz"));
    }

    #[tokio::test]
    async fn refresh_current_token_requires_token() {
        let transport = MockTransport::silent();
        let mut client = client(&transport);

        let err = client.refresh_current_token().await.unwrap_err();

        assert_eq!(err.kind(), Kind::NotAuthenticated);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn forbidden_fails_every_operation_and_keeps_token() {
        let transport = MockTransport::replying([forbidden(), forbidden(), forbidden(), forbidden()]);
        let mut client = client(&transport).with_token(SecretString::from("keep"));

        let errors = vec![
            client.authenticate("udid1").await.unwrap_err(),
            client.fetch_user_info(Some(1), None).await.unwrap_err(),
            client.fetch_castle_detail(1, 2, None).await.unwrap_err(),
            client.refresh_token("keep").await.unwrap_err(),
        ];

        for err in errors {
            assert_eq!(err.kind(), Kind::Status);
            assert_eq!(err.status_code(), Some(StatusCode::FORBIDDEN));
            assert_eq!(err.downcast_ref::<Status>().unwrap().message, "forbidden");
        }
        assert_eq!(transport.calls(), 4);
        assert_eq!(token_of(&client).as_deref(), Some("keep"));
    }
}
