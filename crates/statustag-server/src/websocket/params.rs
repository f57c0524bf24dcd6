//! Connect-time query parameters.

use std::collections::HashMap;
use std::str::FromStr;

use statustag_core::{DeviceId, DisplayTarget, StreamError};

/// Why a device's connect parameters were refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("missing required parameter `{0}`")]
    Missing(&'static str),
    #[error("parameter `{key}` must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl ParamError {
    /// The offending query key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Missing(key) | Self::Invalid { key, .. } => key,
        }
    }
}

impl From<ParamError> for StreamError {
    fn from(err: ParamError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Validated `?id=&width=&height=[&bufferSize=][&maxFileSize=]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub device_id: DeviceId,
    pub width: u16,
    pub height: u16,
    pub buffer_size: Option<usize>,
    pub max_file_size: Option<u64>,
}

impl ConnectParams {
    /// Validate a raw query map.
    pub fn parse(query: &HashMap<String, String>) -> Result<Self, ParamError> {
        let id = query.get("id").ok_or(ParamError::Missing("id"))?;
        if id.trim().is_empty() {
            return Err(ParamError::Invalid {
                key: "id",
                expected: "a non-empty string",
                value: id.clone(),
            });
        }

        Ok(Self {
            device_id: DeviceId::from_string(id.clone()),
            width: required(query, "width", "an integer in 1..=65535")?,
            height: required(query, "height", "an integer in 1..=65535")?,
            buffer_size: optional(query, "bufferSize", "a positive integer")?,
            max_file_size: optional(query, "maxFileSize", "a positive integer")?,
        })
    }

    /// Display target, filling omitted limits with the server defaults.
    pub fn into_target(self, default_buffer_size: usize, default_max_file_size: u64) -> DisplayTarget {
        DisplayTarget::new(self.device_id, self.width, self.height)
            .with_buffer_size(self.buffer_size.unwrap_or(default_buffer_size))
            .with_max_file_size(self.max_file_size.unwrap_or(default_max_file_size))
    }
}

fn required<T>(query: &HashMap<String, String>, key: &'static str, expected: &'static str) -> Result<T, ParamError>
where
    T: FromStr + PartialOrd + Default,
{
    optional(query, key, expected)?.ok_or(ParamError::Missing(key))
}

fn optional<T>(query: &HashMap<String, String>, key: &'static str, expected: &'static str) -> Result<Option<T>, ParamError>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = query.get(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(Some(value)),
        _ => Err(ParamError::Invalid {
            key,
            expected,
            value: raw.clone(),
        }),
    }
}
