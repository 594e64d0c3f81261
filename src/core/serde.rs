use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

use super::types::NodeName;

/// Serializes Duration as whole milliseconds
pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    (duration.as_millis() as u64).serialize(serializer)
}

/// Deserializes Duration from whole milliseconds
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// Serializes a NodeName as its trimmed text
pub fn serialize_node_name<S>(name: &NodeName, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    name.as_str().serialize(serializer)
}

/// Deserializes a NodeName from text, truncating to the wire width
pub fn deserialize_node_name<'de, D>(deserializer: D) -> Result<NodeName, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    Ok(NodeName::new(&text))
}
