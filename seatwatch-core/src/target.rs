use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Closed range of valid carriage numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRange {
    pub min: u16,
    pub max: u16,
}

impl TargetRange {
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= i64::from(self.min) && value <= i64::from(self.max)
    }

    /// Validate a raw identifier. Called once, before any network activity.
    pub fn validate(&self, value: i64) -> Result<TargetId, ValidationError> {
        if self.contains(value) {
            // contains() bounds value to u16
            Ok(TargetId(value as u16))
        } else {
            Err(ValidationError {
                value,
                min: self.min,
                max: self.max,
            })
        }
    }
}

impl Default for TargetRange {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// Validated carriage number. Only obtainable through [`TargetRange::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TargetId(u16);

impl TargetId {
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of the observable seat resource for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUri {
    pub host: String,
    pub port: Option<u16>,
    pub path: Vec<String>,
}

impl ResourceUri {
    pub fn seats_available(host: impl Into<String>, port: Option<u16>, target: TargetId) -> Self {
        Self {
            host: host.into(),
            port,
            path: vec![
                "seats".to_string(),
                target.to_string(),
                "available".to_string(),
            ],
        }
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "coap://{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        for segment in &self.path {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
