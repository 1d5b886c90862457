//! Logs in by UDID, then optionally looks up a player and a castle.
//!
//! ```sh
//! RUST_LOG=info LORDS_UDID=... LORDS_USER_ID=123 LORDS_CASTLE_X=10 LORDS_CASTLE_Y=20 \
//!     cargo run --example diagnose --features tracing
//! ```
//!
//! `LORDS_REGION`, `LORDS_KINGDOM_ID`, `LORDS_SECRET_KEY` and `LORDS_DEVICE_ID`
//! override the defaults.

use std::env;
use std::str::FromStr;

use lords_client::types::{CastleInfo, UserInfo};
use lords_client::{Config, RawConfig, SessionClient};
use secrecy::{ExposeSecret as _, SecretString};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const FAKE_UDID: &str = "test_device_12345678";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_raw(RawConfig {
        region: var("LORDS_REGION").unwrap_or_else(|| "ap-seoul".to_owned()),
        kingdom_id: parsed("LORDS_KINGDOM_ID")?.unwrap_or(1234),
        secret_key: SecretString::from(
            var("LORDS_SECRET_KEY").unwrap_or_else(|| "lm2025iggtrackx9".to_owned()),
        ),
        device_id: var("LORDS_DEVICE_ID").unwrap_or_else(|| "android_test_001".to_owned()),
    })?;
    let base = config.api_base()?;
    let mut client = SessionClient::new(config)?;

    let udid = var("LORDS_UDID").unwrap_or_else(|| {
        warn!(udid = FAKE_UDID, "LORDS_UDID not set, login will most likely fail");
        FAKE_UDID.to_owned()
    });

    match client.authenticate(&udid).await {
        Ok(token) => info!(token = %preview(token.expose_secret()), "login succeeded"),
        Err(e) => {
            error!(error = %e, kind = ?e.kind(), "login failed");
            info!(api = %base, authenticated = false, "summary");
            return Ok(());
        }
    }

    if let Some(user_id) = parsed::<i64>("LORDS_USER_ID")? {
        match client.fetch_user_info(Some(user_id), None).await {
            Ok(user) => render_user(&user),
            Err(e) => error!(error = %e, kind = ?e.kind(), "get_user_info failed"),
        }
    }

    if let (Some(x), Some(y)) = (parsed::<i64>("LORDS_CASTLE_X")?, parsed::<i64>("LORDS_CASTLE_Y")?) {
        match client.fetch_castle_detail(x, y, None).await {
            Ok(castle) => render_castle(x, y, &castle),
            Err(e) => error!(error = %e, kind = ?e.kind(), "get_castle_detail failed"),
        }
    }

    info!(api = %base, authenticated = client.is_authenticated(), "summary");
    Ok(())
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|v| v.trim().parse::<T>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("{name}: {e}"))
}

fn preview(token: &str) -> String {
    let head: String = token.chars().take(12).collect();
    format!("{head}...")
}

fn render_user(user: &UserInfo) {
    let resources = user.resources().unwrap_or_default();

    info!(
        castle_id = ?user.castle_id(),
        name = user.name().unwrap_or("N/A"),
        might = user.might().unwrap_or(0),
        vip_level = user.vip_level().unwrap_or(0),
        leader_level = user.leader_level().unwrap_or(0),
        guild = user.guild_name().unwrap_or("No Guild"),
        "player"
    );
    info!(
        food = resources.food,
        ore = resources.ore,
        timber = resources.timber,
        stone = resources.stone,
        gold = resources.gold,
        gems = resources.gems,
        "resources"
    );
    for (tier, count) in user.troops() {
        info!(tier, count, "troops");
    }
}

fn render_castle(x: i64, y: i64, castle: &CastleInfo) {
    info!(
        x,
        y,
        owner = castle.owner_name().unwrap_or("N/A"),
        might = castle.might().unwrap_or(0),
        guild = castle.guild_name().unwrap_or("No Guild"),
        shield_secs = castle.shield_remaining().unwrap_or(0),
        fury_secs = castle.fury_time().unwrap_or(0),
        rallies = castle.incoming_rallies().len(),
        "castle"
    );
}
