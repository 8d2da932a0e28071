//! Component E: the state store gateway. A `StateStore` is the engine's only
//! window onto `aircraft_instances` — every read/write the scheduler needs
//! goes through this trait so the Postgres specifics stay out of §4.H.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::flight::{Controller, Flight, FlightType, Phase, Sector, Status, ThresholdEvent};

/// Engine's read/write surface onto persisted flight records (§4.E).
/// Per-flight calls are independent: a transient failure on one flight must
/// never block or roll back another's.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// All flights currently owned and active under the engine's control,
    /// in stable id-sorted order (required for PRNG-stream reproducibility).
    async fn list_engine_arrivals(&self) -> Result<Vec<Flight>, EngineError>;

    /// Writes back a flight's updated kinematic/sector/event state for this tick.
    async fn persist_tick(&self, flight: &Flight) -> Result<(), EngineError>;

    /// Touchdown's terminal write: status, controller and final position in
    /// one call, called exactly once per flight (guarded by I4's dedup).
    async fn finalize_touchdown(&self, flight: &Flight) -> Result<(), EngineError>;

    /// Idempotent claim of a newly spawned arrival: flips controller to
    /// ENGINE only if it is not already owned by another controller.
    async fn claim_arrival(&self, flight_id: i64) -> Result<bool, EngineError>;
}

/// PostgreSQL-backed `StateStore`. The pool should be sized at least 2x the
/// expected peak concurrent flight count (§5) so persistence calls never
/// queue behind the read that starts each tick.
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, EngineError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| EngineError::StoreFatal(format!("failed to connect: {e}")))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn list_engine_arrivals(&self) -> Result<Vec<Flight>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT id, icao24, registration, callsign, squawk_code,
                   aircraft_type_id, airline_id, flight_type,
                   lat, lon, altitude_ft, speed_kts, heading, vertical_speed_fpm,
                   target_speed_kts, target_heading_deg, target_altitude_ft,
                   controller, status, distance_to_airport_nm, last_distance_nm,
                   phase, sector, sector_stable_ticks, sector_entry_tick,
                   sector_candidate, sector_candidate_ticks, last_event_fired
            FROM aircraft_instances
            WHERE controller = 'ENGINE' AND status = 'ACTIVE' AND flight_type = 'ARRIVAL'
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::StoreTransient(format!("list_engine_arrivals: {e}")))?;

        let mut flights = Vec::with_capacity(rows.len());
        for row in rows {
            match row_to_flight(&row) {
                Ok(flight) => flights.push(flight),
                Err(reason) => warn!(target: "STORE", %reason, "skipping malformed row"),
            }
        }
        flights.sort_by_key(|f| f.id);
        Ok(flights)
    }

    async fn persist_tick(&self, flight: &Flight) -> Result<(), EngineError> {
        let last_event_fired = encode_event_set(flight);
        sqlx::query(
            r#"
            UPDATE aircraft_instances
            SET lat = $2, lon = $3, altitude_ft = $4, speed_kts = $5, heading = $6,
                vertical_speed_fpm = $7, target_speed_kts = $8, target_heading_deg = $9,
                target_altitude_ft = $10, controller = $11, status = $12,
                distance_to_airport_nm = $13, last_distance_nm = $14, phase = $15,
                sector = $16, sector_stable_ticks = $17, sector_entry_tick = $18,
                sector_candidate = $19, sector_candidate_ticks = $20, last_event_fired = $21
            WHERE id = $1
            "#,
        )
        .bind(flight.id)
        .bind(flight.lat)
        .bind(flight.lon)
        .bind(flight.altitude_ft)
        .bind(flight.speed_kts)
        .bind(flight.heading_deg)
        .bind(flight.vertical_speed_fpm)
        .bind(flight.target_speed_kts)
        .bind(flight.target_heading_deg)
        .bind(flight.target_altitude_ft)
        .bind(controller_text(flight.controller))
        .bind(status_text(flight.status))
        .bind(flight.distance_to_airport_nm)
        .bind(flight.last_distance_nm)
        .bind(flight.phase.map(|p| p.to_string()))
        .bind(flight.sector.map(|s| s.to_string()))
        .bind(flight.sector_stable_ticks as i32)
        .bind(flight.sector_entry_tick.map(|t| t as i64))
        .bind(flight.sector_candidate.map(|s| s.to_string()))
        .bind(flight.sector_candidate_ticks as i32)
        .bind(last_event_fired)
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::StoreTransient(format!("persist_tick({}): {e}", flight.id)))?;

        debug!(target: "STORE", flight_id = flight.id, "tick persisted");
        Ok(())
    }

    async fn finalize_touchdown(&self, flight: &Flight) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            UPDATE aircraft_instances
            SET status = $2, controller = $3, lat = $4, lon = $5, altitude_ft = $6,
                speed_kts = $7, vertical_speed_fpm = $8, last_event_fired = $9
            WHERE id = $1
            "#,
        )
        .bind(flight.id)
        .bind(status_text(flight.status))
        .bind(controller_text(flight.controller))
        .bind(flight.lat)
        .bind(flight.lon)
        .bind(flight.altitude_ft)
        .bind(flight.speed_kts)
        .bind(flight.vertical_speed_fpm)
        .bind(encode_event_set(flight))
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::StoreTransient(format!("finalize_touchdown({}): {e}", flight.id)))?;

        debug!(target: "STORE", flight_id = flight.id, "touchdown finalized");
        Ok(())
    }

    async fn claim_arrival(&self, flight_id: i64) -> Result<bool, EngineError> {
        let result = sqlx::query(
            r#"
            UPDATE aircraft_instances
            SET controller = 'ENGINE'
            WHERE id = $1 AND flight_type = 'ARRIVAL' AND controller != 'ENGINE' AND status = 'ACTIVE'
            "#,
        )
        .bind(flight_id)
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::StoreTransient(format!("claim_arrival({flight_id}): {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_flight(row: &sqlx::postgres::PgRow) -> Result<Flight, String> {
    let flight_type = match row.try_get::<String, _>("flight_type").map_err(|e| e.to_string())?.as_str() {
        "ARRIVAL" => FlightType::Arrival,
        "DEPARTURE" => FlightType::Departure,
        other => return Err(format!("unknown flight_type {other}")),
    };
    let controller = parse_controller(&row.try_get::<String, _>("controller").map_err(|e| e.to_string())?)?;
    let status = parse_status(&row.try_get::<String, _>("status").map_err(|e| e.to_string())?)?;
    let phase = row
        .try_get::<Option<String>, _>("phase")
        .map_err(|e| e.to_string())?
        .and_then(|s| parse_phase(&s));
    let sector = row
        .try_get::<Option<String>, _>("sector")
        .map_err(|e| e.to_string())?
        .and_then(|s| parse_sector(&s));
    let last_event_fired = row
        .try_get::<Option<String>, _>("last_event_fired")
        .map_err(|e| e.to_string())?
        .map(decode_event_set)
        .unwrap_or_default();

    Ok(Flight {
        id: row.try_get("id").map_err(|e| e.to_string())?,
        icao24: row.try_get("icao24").map_err(|e| e.to_string())?,
        registration: row.try_get("registration").map_err(|e| e.to_string())?,
        callsign: row.try_get("callsign").map_err(|e| e.to_string())?,
        squawk: row.try_get("squawk_code").map_err(|e| e.to_string())?,
        aircraft_type_id: row.try_get("aircraft_type_id").map_err(|e| e.to_string())?,
        airline_id: row.try_get("airline_id").map_err(|e| e.to_string())?,
        flight_type,
        lat: row.try_get("lat").map_err(|e| e.to_string())?,
        lon: row.try_get("lon").map_err(|e| e.to_string())?,
        altitude_ft: row.try_get("altitude_ft").map_err(|e| e.to_string())?,
        speed_kts: row.try_get("speed_kts").map_err(|e| e.to_string())?,
        heading_deg: row.try_get("heading").map_err(|e| e.to_string())?,
        vertical_speed_fpm: row.try_get("vertical_speed_fpm").map_err(|e| e.to_string())?,
        target_speed_kts: row.try_get("target_speed_kts").map_err(|e| e.to_string())?,
        target_heading_deg: row.try_get("target_heading_deg").map_err(|e| e.to_string())?,
        target_altitude_ft: row.try_get("target_altitude_ft").map_err(|e| e.to_string())?,
        controller,
        status,
        distance_to_airport_nm: row.try_get("distance_to_airport_nm").map_err(|e| e.to_string())?,
        last_distance_nm: row.try_get("last_distance_nm").map_err(|e| e.to_string())?,
        phase,
        sector,
        sector_stable_ticks: row
            .try_get::<Option<i32>, _>("sector_stable_ticks")
            .map_err(|e| e.to_string())?
            .unwrap_or(0) as u32,
        sector_entry_tick: row
            .try_get::<Option<i64>, _>("sector_entry_tick")
            .map_err(|e| e.to_string())?
            .map(|t| t as u64),
        sector_candidate: row
            .try_get::<Option<String>, _>("sector_candidate")
            .map_err(|e| e.to_string())?
            .and_then(|s| parse_sector(&s)),
        sector_candidate_ticks: row
            .try_get::<Option<i32>, _>("sector_candidate_ticks")
            .map_err(|e| e.to_string())?
            .unwrap_or(0) as u32,
        last_event_fired,
    })
}

fn controller_text(c: Controller) -> &'static str {
    match c {
        Controller::Engine => "ENGINE",
        Controller::EntryAtc => "ENTRY_ATC",
        Controller::EnrouteAtc => "ENROUTE_ATC",
        Controller::ApproachAtc => "APPROACH_ATC",
        Controller::TowerAtc => "TOWER_ATC",
        Controller::Ground => "GROUND",
    }
}

fn parse_controller(s: &str) -> Result<Controller, String> {
    Ok(match s {
        "ENGINE" => Controller::Engine,
        "ENTRY_ATC" => Controller::EntryAtc,
        "ENROUTE_ATC" => Controller::EnrouteAtc,
        "APPROACH_ATC" => Controller::ApproachAtc,
        "TOWER_ATC" => Controller::TowerAtc,
        "GROUND" => Controller::Ground,
        other => return Err(format!("unknown controller {other}")),
    })
}

fn status_text(s: Status) -> &'static str {
    match s {
        Status::Active => "ACTIVE",
        Status::Landed => "LANDED",
        Status::Departed => "DEPARTED",
    }
}

fn parse_status(s: &str) -> Result<Status, String> {
    Ok(match s {
        "ACTIVE" => Status::Active,
        "LANDED" => Status::Landed,
        "DEPARTED" => Status::Departed,
        other => return Err(format!("unknown status {other}")),
    })
}

fn parse_phase(s: &str) -> Option<Phase> {
    match s {
        "CRUISE" => Some(Phase::Cruise),
        "DESCENT" => Some(Phase::Descent),
        "APPROACH" => Some(Phase::Approach),
        "FINAL" => Some(Phase::Final),
        "TOUCHDOWN" => Some(Phase::Touchdown),
        _ => None,
    }
}

fn parse_sector(s: &str) -> Option<Sector> {
    match s {
        "ENTRY" => Some(Sector::Entry),
        "ENROUTE" => Some(Sector::Enroute),
        "APPROACH" => Some(Sector::Approach),
        "RUNWAY" => Some(Sector::Runway),
        _ => None,
    }
}

/// `last_event_fired` is stored as a comma-joined list of event names (§6
/// calls it a single opaque text column; a BTreeSet round-trips through it
/// losslessly since event names are unique and order is insignificant).
fn encode_event_set(flight: &Flight) -> String {
    flight
        .last_event_fired
        .iter()
        .map(|e| e.name())
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_event_set(raw: String) -> std::collections::BTreeSet<ThresholdEvent> {
    raw.split(',')
        .filter_map(|s| match s {
            "ENTERED_ENTRY_ZONE" => Some(ThresholdEvent::EnteredEntryZone),
            "HANDOFF_READY" => Some(ThresholdEvent::HandoffReady),
            "TOUCHDOWN" => Some(ThresholdEvent::Touchdown),
            _ => None,
        })
        .collect()
}
