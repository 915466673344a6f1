//! The service's reply envelope.
//!
//! Every call answers with either `{ "success": true, "data": … }` or
//! `{ "success": false, "error": "…" }`. [`Reply`] is the typed form of that
//! envelope; [`Reply::into_result`] folds it into the crate's error channel so
//! a rejection and a thrown transport failure are handled the same way.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::de::{DeserializeOwned, Error as DeError};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

const DEFAULT_REJECTION: &str = "request rejected";

#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Success(T),
    Failure(String),
}
impl<T> Reply<T> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Failure(message) => exn::bail!(ErrorKind::Rejected(message)),
        }
    }
}
impl<T: DeserializeOwned> Reply<T> {
    /// Decode a raw envelope, folding both rejections and undecodable
    /// payloads into the error channel.
    pub fn decode(json: &str) -> Result<T> {
        serde_json::from_str::<Self>(json).or_raise(|| ErrorKind::MalformedReply)?.into_result()
    }
}
impl<T> From<std::result::Result<T, String>> for Reply<T> {
    fn from(result: std::result::Result<T, String>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(message) => Self::Failure(message),
        }
    }
}

impl<T: Serialize> Serialize for Reply<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut envelope = serializer.serialize_struct("Reply", 2)?;
        match self {
            Self::Success(data) => {
                envelope.serialize_field("success", &true)?;
                envelope.serialize_field("data", data)?;
            },
            Self::Failure(message) => {
                envelope.serialize_field("success", &false)?;
                envelope.serialize_field("error", message)?;
            },
        }
        envelope.end()
    }
}

/// Wire shape, before the payload is interpreted.
#[derive(Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Reply<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let envelope = Envelope::deserialize(deserializer)?;
        if envelope.success {
            // Unit payloads are commonly sent without `data`; `null` decodes into `()`.
            serde_json::from_value(envelope.data).map(Self::Success).map_err(D::Error::custom)
        } else {
            Ok(Self::Failure(envelope.error.unwrap_or_else(|| DEFAULT_REJECTION.to_string())))
        }
    }
}
