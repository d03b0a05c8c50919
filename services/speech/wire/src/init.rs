//! Session initialization payload.
//!
//! The payload is built by the caller and treated as an opaque JSON object.
//! Only the pieces the session has to patch are exposed: identity, the
//! capability list and the text body. Identity fields are kept out of band
//! and reach the wire only through the `id.values` list.

use crate::error::WireError;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Capability announced when a context message will follow init
pub const CONTEXT_CAPABILITY: &str = "CONTEXT";

const CAPABILITIES: &str = "capabilities";
const TEXT: &str = "text";
const AUDIO: &str = "audio";

/// One `id.values` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdValue {
    /// Identity key, e.g. `deviceId`
    pub key: String,
    /// Identity value
    pub value: String,
}

/// Init payload as sent in the `init` envelope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitPayload {
    fields: Map<String, Value>,
    device_id: Option<String>,
    account_id: Option<String>,
    customer_id: Option<String>,
}

impl InitPayload {
    /// Create an empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a caller-built JSON object
    pub fn from_value(value: Value) -> Result<Self, WireError> {
        let fields: Map<String, Value> = serde_json::from_value(value)
            .map_err(|source| WireError::Payload { kind: "init", source })?;
        Ok(Self {
            fields,
            ..Self::default()
        })
    }

    /// Set a top level field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Read a top level field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Device id, kept outside the object map
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Account id, kept outside the object map
    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    /// Customer id, kept outside the object map
    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    /// Set the device id
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Set the account id
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Set the customer id
    pub fn with_customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Rebuild `id.values` from the identity fields currently set
    ///
    /// Any other member of `id` is preserved.
    pub fn refresh_ids(&mut self) {
        let values: Vec<IdValue> = [
            ("deviceId", &self.device_id),
            ("accountId", &self.account_id),
            ("customerId", &self.customer_id),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value.as_ref().map(|value| IdValue {
                key: key.to_string(),
                value: value.clone(),
            })
        })
        .collect();

        let id = self
            .fields
            .entry("id")
            .or_insert_with(|| Value::Object(Map::new()));
        if !id.is_object() {
            *id = Value::Object(Map::new());
        }
        if let Value::Object(id) = id {
            id.insert(
                "values".to_string(),
                Value::Array(
                    values
                        .iter()
                        .filter_map(|entry| serde_json::to_value(entry).ok())
                        .collect(),
                ),
            );
        }
    }

    /// Identity entries as last refreshed
    pub fn id_values(&self) -> Vec<IdValue> {
        self.fields
            .get("id")
            .and_then(|id| id.get("values"))
            .and_then(|values| serde_json::from_value(values.clone()).ok())
            .unwrap_or_default()
    }

    /// Capabilities announced to the server
    pub fn capabilities(&self) -> Vec<&str> {
        match self.fields.get(CAPABILITIES) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether `capability` is announced
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Add a capability unless already present
    pub fn add_capability(&mut self, capability: &str) {
        if self.has_capability(capability) {
            return;
        }
        let entry = self
            .fields
            .entry(CAPABILITIES)
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
        if let Value::Array(items) = entry {
            items.push(Value::String(capability.to_string()));
        }
    }

    /// Drop every occurrence of `capability`
    pub fn remove_capability(&mut self, capability: &str) {
        if let Some(Value::Array(items)) = self.fields.get_mut(CAPABILITIES) {
            items.retain(|item| item.as_str() != Some(capability));
        }
    }

    /// Embed a text request
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Embed a text request in place
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.fields.insert(TEXT.to_string(), Value::String(text.into()));
    }

    /// Embedded text request, if any
    pub fn text(&self) -> Option<&str> {
        self.fields.get(TEXT).and_then(Value::as_str)
    }

    /// Wire form of the payload
    ///
    /// A text request never carries an `audio` block.
    pub fn to_value(&self) -> Value {
        let mut fields = self.fields.clone();
        if self.text().is_some() {
            fields.remove(AUDIO);
        }
        Value::Object(fields)
    }
}

impl Serialize for InitPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
