//! Component D: the per-flight sector state machine (§4.D). Pure given its
//! inputs and the single engine RNG stream — no I/O, no clock reads. The
//! scheduler calls `step` once per flight per tick, after B/A have produced
//! the tick's new position, altitude and distance.

use crate::airspace::AirspaceConfig;
use crate::events::EngineEvent;
use crate::flight::{Controller, Flight, Sector, Status, ThresholdEvent};
use crate::kinematics::TOUCHDOWN_AGL_FT;
use crate::rng::EngineRng;

const ENTRY_ZONE_NM: f64 = 30.0;
const HANDOFF_READY_NM: f64 = 20.0;
const LANDING_ROLL_SPEED_KTS: f64 = 30.0;
const REFLECTION_JITTER_DEG: f64 = 20.0;

/// Advances `flight`'s sector classification and fires any threshold events
/// due this tick, given the distance/altitude B and A already computed.
/// Returns the events raised, in the mandated within-tick order (handoff and
/// reflection before threshold events, threshold events in ascending-distance
/// order — see §4.F ordering guarantee).
pub fn step(
    flight: &mut Flight,
    distance_nm: f64,
    altitude_ft: f64,
    tick: u64,
    config: &AirspaceConfig,
    rng: &mut EngineRng,
) -> Vec<EngineEvent> {
    let mut events = Vec::new();

    let inbound = flight
        .last_distance_nm
        .map_or(false, |last| distance_nm < last);
    let geometric_sector = config.classify(distance_nm, altitude_ft).map(|r| r.name.into());

    advance_sector(flight, geometric_sector, inbound, distance_nm, tick, config, &mut events);
    maybe_reflect(flight, distance_nm, config, rng, &mut events);
    fire_threshold_events(flight, distance_nm, altitude_ft, config, &mut events);

    flight.last_distance_nm = Some(distance_nm);
    events
}

fn advance_sector(
    flight: &mut Flight,
    geometric_sector: Option<Sector>,
    inbound: bool,
    distance_nm: f64,
    tick: u64,
    config: &AirspaceConfig,
    events: &mut Vec<EngineEvent>,
) {
    let Some(candidate) = geometric_sector else {
        decay_candidate(flight);
        return;
    };

    match flight.sector {
        None => {
            // First classification: commit directly, there is no prior
            // sector to transition from and therefore nothing to debounce.
            flight.sector = Some(candidate);
            flight.sector_stable_ticks = 0;
            flight.sector_entry_tick = Some(tick);
            decay_candidate(flight);
        }
        Some(current) if current == candidate => {
            if inbound {
                flight.sector_stable_ticks += 1;
            }
            decay_candidate(flight);
        }
        Some(current) => {
            if is_directed_transition(config, current, candidate, distance_nm, inbound) {
                if flight.sector_candidate == Some(candidate) {
                    flight.sector_candidate_ticks += 1;
                } else {
                    flight.sector_candidate = Some(candidate);
                    flight.sector_candidate_ticks = 1;
                }

                let required = config
                    .ring_for_sector(current)
                    .map(|r| r.stable_ticks_required)
                    .unwrap_or(2);

                if flight.sector_candidate_ticks >= required {
                    events.push(EngineEvent::SectorHandoff {
                        flight_id: flight.id,
                        from: Some(current),
                        to: candidate,
                    });
                    flight.sector = Some(candidate);
                    flight.sector_stable_ticks = 0;
                    flight.sector_entry_tick = Some(tick);
                    decay_candidate(flight);
                }
            } else {
                decay_candidate(flight);
            }
        }
    }
}

fn decay_candidate(flight: &mut Flight) {
    flight.sector_candidate = None;
    flight.sector_candidate_ticks = 0;
}

/// A transition from `current` to `candidate` is only honored when it moves
/// to an adjacent ring in the direction implied by `inbound`, and the
/// crossing has cleared that ring's hysteresis margin.
fn is_directed_transition(
    config: &AirspaceConfig,
    current: Sector,
    candidate: Sector,
    distance_nm: f64,
    inbound: bool,
) -> bool {
    let Some(current_ring) = config.ring_for_sector(current) else {
        return false;
    };

    if let Some(inner) = config.inner_neighbor(current_ring) {
        if Sector::from(inner.name) == candidate {
            return inbound && distance_nm <= current_ring.r_inner_nm - current_ring.hysteresis_nm;
        }
    }
    if let Some(outer) = config.outer_neighbor(current_ring) {
        if Sector::from(outer.name) == candidate {
            return !inbound && distance_nm >= current_ring.r_outer_nm + current_ring.hysteresis_nm;
        }
    }
    false
}

/// A flight that drifts past the ENTRY ring's outer hysteresis margin is
/// turned back toward the airport rather than allowed to leave managed
/// airspace (§6 glossary: Boundary reflection).
fn maybe_reflect(
    flight: &mut Flight,
    distance_nm: f64,
    config: &AirspaceConfig,
    rng: &mut EngineRng,
    events: &mut Vec<EngineEvent>,
) {
    if flight.sector != Some(Sector::Entry) {
        return;
    }
    let Some(entry_ring) = config.ring_for_sector(Sector::Entry) else {
        return;
    };
    if distance_nm < entry_ring.r_outer_nm + entry_ring.hysteresis_nm {
        return;
    }

    let jitter = rng.uniform(-REFLECTION_JITTER_DEG, REFLECTION_JITTER_DEG);
    let new_heading = config.reflect_heading(flight.lat, flight.lon, jitter);
    flight.heading_deg = new_heading;
    flight.target_heading_deg = Some(new_heading);
    events.push(EngineEvent::BoundaryReflection {
        flight_id: flight.id,
        new_heading_deg: new_heading,
    });
}

/// Fires the three at-most-once threshold events in ascending-distance order
/// (I4): entering the entry zone happens farthest out, touchdown last.
fn fire_threshold_events(
    flight: &mut Flight,
    distance_nm: f64,
    altitude_ft: f64,
    config: &AirspaceConfig,
    events: &mut Vec<EngineEvent>,
) {
    if distance_nm <= ENTRY_ZONE_NM && flight.fire_threshold_event(ThresholdEvent::EnteredEntryZone) {
        events.push(EngineEvent::ThresholdFired {
            flight_id: flight.id,
            event_type: ThresholdEvent::EnteredEntryZone,
        });
    }

    if distance_nm <= HANDOFF_READY_NM && flight.fire_threshold_event(ThresholdEvent::HandoffReady) {
        events.push(EngineEvent::ThresholdFired {
            flight_id: flight.id,
            event_type: ThresholdEvent::HandoffReady,
        });
    }

    let touchdown_alt = config.airport.elevation_ft + TOUCHDOWN_AGL_FT;
    if altitude_ft < touchdown_alt && flight.fire_threshold_event(ThresholdEvent::Touchdown) {
        events.push(EngineEvent::ThresholdFired {
            flight_id: flight.id,
            event_type: ThresholdEvent::Touchdown,
        });
        flight.status = Status::Landed;
        flight.controller = Controller::Ground;
        flight.vertical_speed_fpm = 0.0;
        flight.speed_kts = LANDING_ROLL_SPEED_KTS;
    }
}
