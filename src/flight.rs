//! The Flight record: the single strongly-typed record the engine reads,
//! mutates and persists once per tick. Deliberately flat rather than a class
//! hierarchy — ownership of mutation is expressed by the `Controller` tag,
//! not by type.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightType {
    Arrival,
    Departure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Controller {
    Engine,
    EntryAtc,
    EnrouteAtc,
    ApproachAtc,
    TowerAtc,
    Ground,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Active,
    Landed,
    Departed,
}

/// Concentric ring the flight is currently classified into. `None` means the
/// flight is outside managed airspace (engine still evolves it kinematically).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sector {
    Entry,
    Enroute,
    Approach,
    Runway,
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sector::Entry => write!(f, "ENTRY"),
            Sector::Enroute => write!(f, "ENROUTE"),
            Sector::Approach => write!(f, "APPROACH"),
            Sector::Runway => write!(f, "RUNWAY"),
        }
    }
}

/// Derived-only flight phase. Never used as an authoritative control input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Cruise,
    Descent,
    Approach,
    Final,
    Touchdown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Cruise => "CRUISE",
            Phase::Descent => "DESCENT",
            Phase::Approach => "APPROACH",
            Phase::Final => "FINAL",
            Phase::Touchdown => "TOUCHDOWN",
        };
        write!(f, "{s}")
    }
}

/// Names of at-most-once threshold events, kept in a flight's
/// `last_event_fired` set for the lifetime of the flight (invariant I4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdEvent {
    EnteredEntryZone,
    HandoffReady,
    Touchdown,
}

impl ThresholdEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ThresholdEvent::EnteredEntryZone => "ENTERED_ENTRY_ZONE",
            ThresholdEvent::HandoffReady => "HANDOFF_READY",
            ThresholdEvent::Touchdown => "TOUCHDOWN",
        }
    }
}

impl fmt::Display for ThresholdEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    // identity
    pub id: i64,
    pub icao24: String,
    pub registration: String,
    pub callsign: String,
    pub squawk: String,

    // classification
    pub aircraft_type_id: i64,
    pub airline_id: i64,
    pub flight_type: FlightType,

    // kinematic state
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: f64,
    pub speed_kts: f64,
    pub heading_deg: f64,
    pub vertical_speed_fpm: f64,

    // targets
    pub target_speed_kts: Option<f64>,
    pub target_heading_deg: Option<f64>,
    pub target_altitude_ft: Option<f64>,

    // control
    pub controller: Controller,
    pub status: Status,

    // derived/cached
    pub distance_to_airport_nm: Option<f64>,
    pub last_distance_nm: Option<f64>,
    pub phase: Option<Phase>,

    // sector bookkeeping
    pub sector: Option<Sector>,
    pub sector_stable_ticks: u32,
    pub sector_entry_tick: Option<u64>,
    /// Sector a directed transition is pending into, and how many
    /// consecutive ticks it has been observed. Persisted alongside `sector`
    /// so the debounce survives the fresh `list_engine_arrivals` load every
    /// tick.
    pub sector_candidate: Option<Sector>,
    pub sector_candidate_ticks: u32,

    // event bookkeeping
    pub last_event_fired: BTreeSet<ThresholdEvent>,
}

impl Flight {
    /// True when the engine is the owner and must evolve this flight (I3).
    pub fn is_engine_arrival(&self) -> bool {
        self.controller == Controller::Engine
            && self.status == Status::Active
            && self.flight_type == FlightType::Arrival
    }

    /// Validate the §3 bounds. Called at the top of `integrate`; a violation
    /// is surfaced as `EngineError::InvalidState` rather than silently clamped.
    pub fn validate(&self) -> Result<(), String> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(format!("lat {} out of range", self.lat));
        }
        if !(-180.0..180.0).contains(&self.lon) {
            return Err(format!("lon {} out of range", self.lon));
        }
        if !(0.0..=60_000.0).contains(&self.altitude_ft) {
            return Err(format!("altitude {} out of range", self.altitude_ft));
        }
        if !(0.0..=600.0).contains(&self.speed_kts) {
            return Err(format!("speed {} out of range", self.speed_kts));
        }
        if !(0.0..360.0).contains(&self.heading_deg) {
            return Err(format!("heading {} out of range", self.heading_deg));
        }
        if !(-6_000.0..=6_000.0).contains(&self.vertical_speed_fpm) {
            return Err(format!("vertical speed {} out of range", self.vertical_speed_fpm));
        }
        Ok(())
    }

    /// Records a threshold event if it hasn't already fired (I4). Returns
    /// `true` if this call is the one that caused it to fire.
    pub fn fire_threshold_event(&mut self, event: ThresholdEvent) -> bool {
        self.last_event_fired.insert(event)
    }
}
