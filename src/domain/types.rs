use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a building (or of a complex, which is a building marked as a group)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingId(pub String);

impl BuildingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BuildingId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a physical meter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeterId(pub String);

impl MeterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MeterId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Physical Unit Newtypes
// ============================================================================

/// Power in Watts (W)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct Power(pub f64);

impl Power {
    pub fn watts(w: f64) -> Self {
        Self(w)
    }

    pub fn kilowatts(kw: f64) -> Self {
        Self(kw * 1000.0)
    }

    pub fn as_watts(&self) -> f64 {
        self.0
    }

    pub fn as_kilowatts(&self) -> f64 {
        self.0 / 1000.0
    }

    /// A usable instantaneous sample: finite and not negative.
    ///
    /// Bidirectional meters report each direction as its own non-negative
    /// sample, so anything else is treated as missing data.
    pub fn is_usable_sample(&self) -> bool {
        self.0.is_finite() && self.0 >= 0.0
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.abs() >= 1000.0 {
            write!(f, "{:.2} kW", self.as_kilowatts())
        } else {
            write!(f, "{:.1} W", self.0)
        }
    }
}

impl Add for Power {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Power {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_conversion() {
        assert_eq!(Power::watts(2500.0).as_kilowatts(), 2.5);
        assert_eq!(Power::kilowatts(1.5).as_watts(), 1500.0);
    }

    #[test]
    fn test_power_display() {
        assert_eq!(Power::watts(2500.0).to_string(), "2.50 kW");
        assert_eq!(Power::watts(420.0).to_string(), "420.0 W");
    }

    #[test]
    fn test_usable_sample() {
        assert!(Power::watts(0.0).is_usable_sample());
        assert!(Power::watts(1200.0).is_usable_sample());
        assert!(!Power::watts(-5.0).is_usable_sample());
        assert!(!Power::watts(f64::NAN).is_usable_sample());
        assert!(!Power::watts(f64::INFINITY).is_usable_sample());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = BuildingId::from("house-a");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"house-a\"");
        let meter: MeterId = serde_json::from_str("\"m-17\"").unwrap();
        assert_eq!(meter, MeterId::new("m-17"));
    }
}
