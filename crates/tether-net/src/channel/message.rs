//! Inbound messages and outbound batches.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A single object received from the server.
///
/// The channel does no type filtering; subscribers inspect the payload or
/// [`decode`](Self::decode) it into the type they expect.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    payload: Value,
}

impl Message {
    /// Wrap a decoded payload.
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// The raw payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Take the raw payload.
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// The payload as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        self.payload.as_str()
    }

    /// Interpret the payload as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}

impl From<Value> for Message {
    fn from(payload: Value) -> Self {
        Self::new(payload)
    }
}

/// An ordered group of objects written to the server as one frame.
///
/// # Example
///
/// ```
/// use tether_net::Batch;
///
/// let batch = Batch::new().with("login")?.with(("erik", 42))?;
/// assert_eq!(batch.len(), 2);
/// # Ok::<(), tether_net::ChannelError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    items: Vec<Value>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a batch from a sequence of serializable items, keeping their order.
    pub fn from_items<I, T>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        let items = items
            .into_iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(Self { items })
    }

    /// Append an item.
    pub fn push<T: Serialize>(&mut self, item: T) -> Result<&mut Self> {
        self.items.push(serde_json::to_value(item)?);
        Ok(self)
    }

    /// Append an item, builder style.
    pub fn with<T: Serialize>(mut self, item: T) -> Result<Self> {
        self.push(item)?;
        Ok(self)
    }

    /// The items, in send order.
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Take the items.
    pub fn into_items(self) -> Vec<Value> {
        self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
