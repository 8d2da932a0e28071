//! Event fan-out payloads (§4.F). These are the types the scheduler hands to
//! the publisher and the telemetry sink; both consume the same `EngineEvent`
//! so the wire shape and the on-disk shape never drift apart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::flight::{Controller, Phase, Sector, ThresholdEvent};

/// The `data.aircraft` payload of `aircraft.position_updated` (§4.F).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftPosition {
    pub id: i64,
    pub callsign: String,
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: f64,
    pub speed_kts: f64,
    pub heading: f64,
    pub vertical_speed_fpm: f64,
    pub distance_to_airport_nm: Option<f64>,
    pub controller: Controller,
    pub phase: Option<Phase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    #[serde(rename = "aircraft.position_updated")]
    PositionUpdated { aircraft: AircraftPosition },
    #[serde(rename = "aircraft.threshold_event")]
    ThresholdFired {
        flight_id: i64,
        event_type: ThresholdEvent,
    },
    #[serde(rename = "sector.handoff")]
    SectorHandoff {
        flight_id: i64,
        from: Option<Sector>,
        to: Sector,
    },
    #[serde(rename = "sector.boundary_reflection")]
    BoundaryReflection {
        flight_id: i64,
        new_heading_deg: f64,
    },
    #[serde(rename = "engine.state_snapshot")]
    StateSnapshot {
        tick: u64,
        active_flights: usize,
    },
    #[serde(rename = "system.status")]
    SystemStatus {
        state: SystemState,
        detail: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    Starting,
    Running,
    Stopping,
    Error,
}

/// The `{type, timestamp, data}` wrapper every event is published and logged
/// as (§4.F). `timestamp` is ISO-8601 with millisecond precision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

impl EventEnvelope {
    pub fn wrap(event: &EngineEvent, timestamp: DateTime<Utc>) -> serde_json::Result<Self> {
        let mut full = serde_json::to_value(event)?;
        if let Some(obj) = full.as_object_mut() {
            obj.remove("type");
        }

        Ok(Self {
            event_type: event.type_tag(),
            timestamp,
            data: full,
        })
    }

    pub fn to_jsonl(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl EngineEvent {
    pub fn type_tag(&self) -> &'static str {
        match self {
            EngineEvent::PositionUpdated { .. } => "aircraft.position_updated",
            EngineEvent::ThresholdFired { .. } => "aircraft.threshold_event",
            EngineEvent::SectorHandoff { .. } => "sector.handoff",
            EngineEvent::BoundaryReflection { .. } => "sector.boundary_reflection",
            EngineEvent::StateSnapshot { .. } => "engine.state_snapshot",
            EngineEvent::SystemStatus { .. } => "system.status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn envelope_carries_flattened_data_under_its_type_tag() {
        let event = EngineEvent::ThresholdFired {
            flight_id: 7,
            event_type: ThresholdEvent::HandoffReady,
        };
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let envelope = EventEnvelope::wrap(&event, ts).unwrap();
        assert_eq!(envelope.event_type, "aircraft.threshold_event");
        assert_eq!(envelope.data["flight_id"], 7);
        assert_eq!(envelope.data["event_type"], "HANDOFF_READY".to_string());
    }

    #[test]
    fn jsonl_round_trips_through_serde_json() {
        let event = EngineEvent::SectorHandoff {
            flight_id: 3,
            from: Some(Sector::Enroute),
            to: Sector::Approach,
        };
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let envelope = EventEnvelope::wrap(&event, ts).unwrap();
        let line = envelope.to_jsonl().unwrap();
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["type"], "sector.handoff");
        assert_eq!(parsed["data"]["to"], "APPROACH");
    }

    #[test]
    fn position_updated_nests_aircraft_fields_under_data() {
        let event = EngineEvent::PositionUpdated {
            aircraft: AircraftPosition {
                id: 42,
                callsign: "TST42".into(),
                lat: 51.5,
                lon: -0.1,
                altitude_ft: 18_000.0,
                speed_kts: 280.0,
                heading: 180.0,
                vertical_speed_fpm: -1_500.0,
                distance_to_airport_nm: Some(35.0),
                controller: Controller::Engine,
                phase: Some(Phase::Descent),
            },
        };
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let envelope = EventEnvelope::wrap(&event, ts).unwrap();
        assert_eq!(envelope.event_type, "aircraft.position_updated");
        assert_eq!(envelope.data["aircraft"]["id"], 42);
        assert_eq!(envelope.data["aircraft"]["controller"], "ENGINE");
        assert_eq!(envelope.data["aircraft"]["phase"], "DESCENT");
    }
}
