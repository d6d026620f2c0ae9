use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A basket line as sent by the browser extension.
///
/// Every field is optional and decoding never fails: strings accept numbers
/// and booleans, `estimatedCarbon` accepts numeric strings, and anything else
/// decodes as absent. The JSON the item was decoded from is kept as-is and
/// returned by [`Item::original`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_scalar", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Value>,
    #[serde(default, deserialize_with = "lenient_scalar", skip_serializing_if = "Option::is_none")]
    pub price: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub source_location: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub source_pincode: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub seller_pincode: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub country_of_origin: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub ean_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub estimated_carbon: Option<f64>,
    #[serde(skip)]
    raw: Option<Value>,
}

impl Item {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Decodes an item from arbitrary JSON. Non-objects become an empty item.
    pub fn from_value(value: Value) -> Self {
        let mut item = Self::deserialize(&value).unwrap_or_default();
        item.raw = Some(value);
        item
    }

    /// The item exactly as received. Items built in code serialize their
    /// decoded fields instead.
    pub fn original(&self) -> Value {
        match &self.raw {
            Some(raw) => raw.clone(),
            None => serde_json::to_value(self).unwrap_or(Value::Null),
        }
    }

    /// First non-empty of `sourcePincode` and `sellerPincode`.
    pub fn resolved_pincode(&self) -> Option<&str> {
        [self.source_pincode.as_deref(), self.seller_pincode.as_deref()]
            .into_iter()
            .flatten()
            .find(|code| !code.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct RecalculationRequest {
    pub pincode: String,
    pub items: Vec<Item>,
}

impl RecalculationRequest {
    pub fn new(pincode: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            pincode: pincode.into().trim().to_string(),
            items,
        }
    }

    /// Decodes a raw request body. Invalid JSON yields an empty request.
    pub fn from_slice(bytes: &[u8]) -> Self {
        serde_json::from_slice::<Value>(bytes)
            .map(Self::from)
            .unwrap_or_default()
    }
}

impl From<Value> for RecalculationRequest {
    fn from(value: Value) -> Self {
        let pincode = value
            .get("pincode")
            .and_then(text_from_value)
            .map(|code| code.trim().to_string())
            .unwrap_or_default();
        let items = match value.get("items") {
            Some(Value::Array(items)) => items.iter().cloned().map(Item::from_value).collect(),
            _ => Vec::new(),
        };

        Self { pincode, items }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoCredential,
    Transport,
    Status,
    MalformedResponse,
    NoNumeral,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::Transport => "transport",
            Self::Status => "status",
            Self::MalformedResponse => "malformed_response",
            Self::NoNumeral => "no_numeral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum EstimateSource {
    Remote,
    Fallback(FallbackReason),
}

impl EstimateSource {
    pub fn is_fallback(self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FootprintEstimate {
    pub value: f64,
    pub source: EstimateSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecalculationResult {
    pub name: Option<String>,
    pub original: Value,
    pub distance_km: Option<f64>,
    pub carbon_footprint: f64,
    #[serde(rename = "sourcePincode")]
    pub source_pincode: Option<String>,
    #[serde(rename = "userPincode")]
    pub user_pincode: String,
    #[serde(skip)]
    pub estimate_source: EstimateSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecalculationResponse {
    pub success: bool,
    #[serde(rename = "userPincode")]
    pub user_pincode: String,
    pub results: Vec<RecalculationResult>,
    pub gemini_key_present: bool,
}

fn text_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(text_from_value))
}

fn lenient_scalar<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.filter(|value| {
        matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
    }))
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let number = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|value| value.is_finite()))
}
