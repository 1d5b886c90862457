use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;
use crate::error::Error;

/// Server region. Each region has its own API host.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, strum_macros::Display)]
pub enum Region {
    #[default]
    #[strum(serialize = "ap-seoul")]
    ApSeoul,
    #[strum(serialize = "eu-frankfurt")]
    EuFrankfurt,
    #[strum(serialize = "na-newyork")]
    NaNewYork,
}

impl Region {
    pub fn parse(value: &str) -> Result<Region> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ap-seoul" => Ok(Region::ApSeoul),
            "eu-frankfurt" => Ok(Region::EuFrankfurt),
            "na-newyork" => Ok(Region::NaNewYork),
            other => Err(Error::validation(format!(
                "invalid region `{other}`; expected one of: ap-seoul|eu-frankfurt|na-newyork"
            ))),
        }
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Region::parse(s)
    }
}

/// A scalar business parameter.
///
/// Integers render in plain decimal and strings render as-is when building the
/// signature string, which is what the server expects.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

/// Business parameters of one call, kept sorted by key.
///
/// Ordering is a property of the container, so the canonical signature string
/// does not depend on insertion order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<K: Into<String>, V: Into<ParamValue>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<K: Into<String>, V: Into<ParamValue>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Reads a JSON scalar as an integer: integers, integral or fractional
/// floats (truncated) and numeric strings.
fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(truncate)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "display values; fractional parts are dropped and out-of-range values saturate"
)]
fn truncate(value: f64) -> i64 {
    value as i64
}

fn lenient_str(value: &Value) -> Option<&str> {
    value.as_str()
}

/// Deserializes an object payload, treating `null` as empty.
fn object_or_empty<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Map<String, Value>, D::Error> {
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A player's profile as returned by `get_user_info`.
///
/// The payload is kept verbatim. The accessors read the well-known fields
/// leniently and return `None` when a field is absent or unreadable; the raw
/// value stays available through [`UserInfo::get`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UserInfo(#[serde(deserialize_with = "object_or_empty")] Map<String, Value>);

impl UserInfo {
    #[must_use]
    pub fn from_object(object: Map<String, Value>) -> Self {
        Self(object)
    }

    #[must_use]
    pub fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_object(self) -> Map<String, Value> {
        self.0
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn castle_id(&self) -> Option<i64> {
        self.get("castle_id").and_then(lenient_i64)
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(lenient_str)
    }

    #[must_use]
    pub fn might(&self) -> Option<i64> {
        self.get("might").and_then(lenient_i64)
    }

    #[must_use]
    pub fn vip_level(&self) -> Option<i64> {
        self.get("vip_level").and_then(lenient_i64)
    }

    #[must_use]
    pub fn leader_level(&self) -> Option<i64> {
        self.get("leader_level").and_then(lenient_i64)
    }

    #[must_use]
    pub fn guild_name(&self) -> Option<&str> {
        self.get("guild_name").and_then(lenient_str)
    }

    /// `None` unless `resources` is an object. Unreadable amounts read as 0.
    #[must_use]
    pub fn resources(&self) -> Option<Resources> {
        let resources = self.get("resources")?.as_object()?;
        let amount = |key: &str| resources.get(key).and_then(lenient_i64).unwrap_or(0);

        Some(Resources {
            food: amount("food"),
            ore: amount("ore"),
            timber: amount("timber"),
            stone: amount("stone"),
            gold: amount("gold"),
            gems: amount("gems"),
        })
    }

    /// Troop counts keyed by tier name. Tiers with unreadable counts are skipped.
    #[must_use]
    pub fn troops(&self) -> BTreeMap<&str, i64> {
        self.get("troops")
            .and_then(Value::as_object)
            .map(|troops| {
                troops
                    .iter()
                    .filter_map(|(tier, count)| Some((tier.as_str(), lenient_i64(count)?)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Resources {
    pub food: i64,
    pub ore: i64,
    pub timber: i64,
    pub stone: i64,
    pub gold: i64,
    pub gems: i64,
}

/// A castle as returned by `get_castle_detail`, kept verbatim like [`UserInfo`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CastleInfo(#[serde(deserialize_with = "object_or_empty")] Map<String, Value>);

impl CastleInfo {
    #[must_use]
    pub fn from_object(object: Map<String, Value>) -> Self {
        Self(object)
    }

    #[must_use]
    pub fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_object(self) -> Map<String, Value> {
        self.0
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn owner_name(&self) -> Option<&str> {
        self.get("owner_name").and_then(lenient_str)
    }

    #[must_use]
    pub fn might(&self) -> Option<i64> {
        self.get("might").and_then(lenient_i64)
    }

    #[must_use]
    pub fn guild_name(&self) -> Option<&str> {
        self.get("guild_name").and_then(lenient_str)
    }

    /// Seconds.
    #[must_use]
    pub fn shield_remaining(&self) -> Option<i64> {
        self.get("shield_remaining").and_then(lenient_i64)
    }

    /// Seconds.
    #[must_use]
    pub fn fury_time(&self) -> Option<i64> {
        self.get("fury_time").and_then(lenient_i64)
    }

    /// Empty unless `incoming_rallies` is an array.
    #[must_use]
    pub fn incoming_rallies(&self) -> &[Value] {
        self.get("incoming_rallies")
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }
}
