use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::types::{BuildingId, MeterId, Power};

/// What a meter measures inside a building
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterRole {
    /// Bidirectional meter at the building's grid connection point
    TotalGrid,
    /// Bidirectional meter on the PV installation
    Solar,
    /// EV charger (import only)
    Charger,
    Heating,
    Other,
    Apartment,
}

impl MeterRole {
    /// Parse a role name, falling back to `Other` for anything unknown.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "total_grid" | "total-grid" | "totalgrid" => MeterRole::TotalGrid,
            "solar" => MeterRole::Solar,
            "charger" => MeterRole::Charger,
            "heating" => MeterRole::Heating,
            "apartment" => MeterRole::Apartment,
            _ => MeterRole::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeterRole::TotalGrid => "total_grid",
            MeterRole::Solar => "solar",
            MeterRole::Charger => "charger",
            MeterRole::Heating => "heating",
            MeterRole::Other => "other",
            MeterRole::Apartment => "apartment",
        }
    }

    /// Roles whose physical meter reports import and export as separate samples
    pub fn is_bidirectional(&self) -> bool {
        matches!(self, MeterRole::TotalGrid | MeterRole::Solar)
    }
}

impl fmt::Display for MeterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MeterRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MeterRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(MeterRole::parse(&raw))
    }
}

/// Direction a sample of a bidirectional meter represents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SourceTag {
    #[default]
    Import,
    Export,
}

impl SourceTag {
    /// Only an explicit `export` tag selects the export side; everything else is import.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "export" => SourceTag::Export,
            _ => SourceTag::Import,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Import => "import",
            SourceTag::Export => "export",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SourceTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SourceTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(SourceTag::parse).unwrap_or_default())
    }
}

/// One raw instantaneous sample from a meter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub meter_id: MeterId,
    pub building_id: BuildingId,
    pub role: MeterRole,
    /// Instantaneous power (W) for the direction named by `source_tag`
    pub power_w: f64,
    #[serde(default)]
    pub source_tag: SourceTag,
    pub timestamp: DateTime<Utc>,
}

impl MeterReading {
    pub fn new(
        meter_id: impl Into<String>,
        building_id: impl Into<String>,
        role: MeterRole,
        power_w: f64,
        source_tag: SourceTag,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            meter_id: MeterId::new(meter_id),
            building_id: BuildingId::new(building_id),
            role,
            power_w,
            source_tag,
            timestamp,
        }
    }

    pub fn power(&self) -> Power {
        Power::watts(self.power_w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("total_grid", MeterRole::TotalGrid)]
    #[case("TOTAL_GRID", MeterRole::TotalGrid)]
    #[case("solar", MeterRole::Solar)]
    #[case(" Charger ", MeterRole::Charger)]
    #[case("heating", MeterRole::Heating)]
    #[case("apartment", MeterRole::Apartment)]
    #[case("other", MeterRole::Other)]
    #[case("heat_pump_2", MeterRole::Other)]
    fn test_role_parse(#[case] raw: &str, #[case] expected: MeterRole) {
        assert_eq!(MeterRole::parse(raw), expected);
    }

    #[rstest]
    #[case("import", SourceTag::Import)]
    #[case("Export", SourceTag::Export)]
    #[case("", SourceTag::Import)]
    #[case("bezug", SourceTag::Import)]
    fn test_source_tag_parse(#[case] raw: &str, #[case] expected: SourceTag) {
        assert_eq!(SourceTag::parse(raw), expected);
    }

    #[test]
    fn test_bidirectional_roles() {
        assert!(MeterRole::TotalGrid.is_bidirectional());
        assert!(MeterRole::Solar.is_bidirectional());
        assert!(!MeterRole::Charger.is_bidirectional());
    }

    #[test]
    fn test_reading_deserialize_untagged_defaults_to_import() {
        let json = r#"{
            "meter_id": "m1",
            "building_id": "b1",
            "role": "total_grid",
            "power_w": 1500.0,
            "timestamp": "2024-05-01T12:00:00Z"
        }"#;
        let reading: MeterReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.source_tag, SourceTag::Import);
        assert_eq!(reading.role, MeterRole::TotalGrid);
        assert_eq!(reading.power().as_kilowatts(), 1.5);
    }

    #[test]
    fn test_reading_deserialize_null_tag_and_unknown_role() {
        let json = r#"{
            "meter_id": "m1",
            "building_id": "b1",
            "role": "sauna",
            "power_w": 10.0,
            "source_tag": null,
            "timestamp": "2024-05-01T12:00:00Z"
        }"#;
        let reading: MeterReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.source_tag, SourceTag::Import);
        assert_eq!(reading.role, MeterRole::Other);
    }
}
