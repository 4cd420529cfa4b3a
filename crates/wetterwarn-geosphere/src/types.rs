use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Mark a field as present, so an explicit `null` is kept apart from a missing key.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A single query point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Debug keeps the trailing `.0` on whole degrees
        write!(f, "{:?},{:?}", self.latitude, self.longitude)
    }
}

/// State of a zone entity as seen by the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneState {
    pub attributes: Map<String, Value>,
}

impl ZoneState {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }

    /// Attribute value, with `null` reported as absent.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).filter(|value| !value.is_null())
    }
}

/// Upstream-specific block of a warning.
///
/// Every field is optional and loosely typed; the accessors below define how
/// each one is read. A field sent as `null` is held as `Some(Value::Null)` so
/// it is written back out, and unknown fields are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInfo {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub awcode: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub warnid: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub wcode: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub wtype: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub wlevel: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub start: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub end: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawInfo {
    /// Identity-like fields in lookup priority order.
    pub fn identity_fields(&self) -> [(&'static str, Option<&Value>); 4] {
        [
            ("id", self.id.as_ref()),
            ("awcode", self.awcode.as_ref()),
            ("warnid", self.warnid.as_ref()),
            ("wcode", self.wcode.as_ref()),
        ]
    }

    /// Fields making up the composite identity when no identity field is set.
    pub fn descriptive_fields(&self) -> [Option<&Value>; 4] {
        [
            self.wtype.as_ref(),
            self.wlevel.as_ref(),
            self.start.as_ref(),
            self.end.as_ref(),
        ]
    }

    /// End of the warning in epoch seconds, or 0 when missing or unreadable.
    ///
    /// Integers are taken as-is, floats are truncated, booleans count as 1 or 0
    /// and strings must hold an integer.
    pub fn end_ts(&self) -> i64 {
        match &self.end {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            Some(Value::Bool(b)) => i64::from(*b),
            _ => 0,
        }
    }
}

fn empty_rawinfo() -> &'static RawInfo {
    static EMPTY: OnceLock<RawInfo> = OnceLock::new();
    EMPTY.get_or_init(RawInfo::default)
}

/// `properties` of a warning. The outer `Option` is the key, the inner one its
/// value, so both a missing and a `null` block survive re-serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarningProperties {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub rawinfo: Option<Option<RawInfo>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One warning feature as delivered by the warning service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub properties: Option<Option<WarningProperties>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Warning {
    /// The raw-info block, empty when missing or `null`.
    pub fn rawinfo(&self) -> &RawInfo {
        self.properties
            .as_ref()
            .and_then(Option::as_ref)
            .and_then(|properties| properties.rawinfo.as_ref())
            .and_then(Option::as_ref)
            .unwrap_or_else(|| empty_rawinfo())
    }

    pub fn end_ts(&self) -> i64 {
        self.rawinfo().end_ts()
    }

    /// Copy of this warning with `rawinfo.end` replaced.
    pub fn with_end(&self, end: i64) -> Self {
        let mut copy = self.clone();
        let properties = copy
            .properties
            .get_or_insert(None)
            .get_or_insert_with(WarningProperties::default);
        let rawinfo = properties
            .rawinfo
            .get_or_insert(None)
            .get_or_insert_with(RawInfo::default);
        rawinfo.end = Some(Value::from(end));
        copy
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionProperties {
    #[serde(default, deserialize_with = "null_as_default")]
    pub warnings: Vec<Warning>,
}

/// `{"properties": {"warnings": [...]}}`, both as returned upstream and as the
/// result of one update cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarningCollection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: CollectionProperties,
}

impl WarningCollection {
    pub fn new(warnings: Vec<Warning>) -> Self {
        Self {
            properties: CollectionProperties { warnings },
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.properties.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.properties.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.properties.warnings.is_empty()
    }
}
