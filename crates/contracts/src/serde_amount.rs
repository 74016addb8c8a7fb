//! Minor-currency amounts cross the JSON boundary as strings so a JS client
//! never rounds them; plain numbers are still accepted on input.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum I64Input {
        String(String),
        Number(i64),
    }

    match I64Input::deserialize(deserializer)? {
        I64Input::String(raw) => raw.parse::<i64>().map_err(D::Error::custom),
        I64Input::Number(value) => Ok(value),
    }
}

/// Same treatment for u64 fields (seeds).
pub mod u64_string {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum U64Input {
            String(String),
            Number(u64),
        }

        match U64Input::deserialize(deserializer)? {
            U64Input::String(raw) => raw.parse::<u64>().map_err(D::Error::custom),
            U64Input::Number(value) => Ok(value),
        }
    }
}
