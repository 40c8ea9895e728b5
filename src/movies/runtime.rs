use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Movie runtime in minutes. On the wire it is the human-readable string
/// `"<minutes> mins"`, in the database a plain integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Runtime(pub i32);

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{} mins", self.0))
    }
}

struct RuntimeVisitor;

impl<'de> Visitor<'de> for RuntimeVisitor {
    type Value = Runtime;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string of the form \"<minutes> mins\"")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Runtime, E> {
        let minutes = value
            .strip_suffix(" mins")
            .and_then(|m| m.parse::<i32>().ok())
            .ok_or_else(|| de::Error::custom("invalid runtime format"))?;
        Ok(Runtime(minutes))
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(RuntimeVisitor)
    }
}
