use serde::{Deserialize, Serialize};

/// Namespace used for attributes set by the serializer itself.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttributeValueVariant {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Anything that does not fit the scalar variants, kept as raw JSON.
    Json(serde_json::Value),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub value: AttributeValueVariant,
    pub confidence: Option<f32>,
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value: AttributeValueVariant::String(value.into()),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: Option<f32>) -> Self {
        self.confidence = confidence;
        self
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        let value = match value {
            serde_json::Value::String(s) => AttributeValueVariant::String(s),
            serde_json::Value::Bool(b) => AttributeValueVariant::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValueVariant::Integer(i),
                None => match n.as_f64() {
                    Some(f) => AttributeValueVariant::Float(f),
                    None => AttributeValueVariant::Json(serde_json::Value::Number(n)),
                },
            },
            other => AttributeValueVariant::Json(other),
        };
        Self {
            value,
            confidence: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub namespace: String,
    pub name: String,
    pub values: Vec<AttributeValue>,
    pub hint: Option<String>,
    pub is_persistent: bool,
}

impl Attribute {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        values: Vec<AttributeValue>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            values,
            hint: None,
            is_persistent: false,
        }
    }
}
