//! Component H: the tick scheduler / orchestrator. A fixed 1 Hz loop with
//! absolute-deadline drift compensation, running the per-tick pipeline of
//! §2's data-flow diagram: list → integrate → classify → transition →
//! persist → publish → telemetry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::airspace::AirspaceConfig;
use crate::error::EngineError;
use crate::events::{AircraftPosition, EngineEvent, SystemState};
use crate::flight::{Flight, Status};
use crate::geo::{bearing_deg, distance_nm};
use crate::kinematics::{derive_phase, integrate};
use crate::publisher::{publish_with_backoff, EventPublisher};
use crate::rng::EngineRng;
use crate::sector_state;
use crate::store::StateStore;
use crate::telemetry::TelemetrySink;

const WARN_TICK_MS: u64 = 100;
const ERROR_TICK_MS: u64 = 200;
const SNAPSHOT_EVERY_TICKS: u64 = 10;
const TICK_INTERVAL: Duration = Duration::from_secs(1);

pub struct Scheduler {
    store: Arc<dyn StateStore>,
    publisher: Arc<dyn EventPublisher>,
    airspace: AirspaceConfig,
    telemetry: TelemetrySink,
    rng: EngineRng,
    tick: u64,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn StateStore>,
        publisher: Arc<dyn EventPublisher>,
        airspace: AirspaceConfig,
        telemetry: TelemetrySink,
        seed: u64,
    ) -> Self {
        Self {
            store,
            publisher,
            airspace,
            telemetry,
            rng: EngineRng::from_seed(seed),
            tick: 0,
        }
    }

    /// Runs the tick loop until `duration_secs` ticks have elapsed (if
    /// given) or `shutdown` fires. Absolute deadlines (`start + (t+1)*1s`)
    /// are used instead of relative sleeps so a slow tick never pushes every
    /// subsequent deadline back (§4.H).
    pub async fn run(
        &mut self,
        duration_secs: Option<u64>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), EngineError> {
        self.publish_status(SystemState::Starting, None).await;
        let start = Instant::now();

        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Some(limit) = duration_secs {
                if self.tick >= limit {
                    break;
                }
            }

            let deadline = start + TICK_INTERVAL * (self.tick as u32 + 1);
            tokio::select! {
                _ = tokio::time::sleep_until(deadline.into()) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }

            let tick_started = Instant::now();
            if let Err(e) = self.run_one_tick().await {
                error!(target: "SCHEDULER", tick = self.tick, error = %e, "tick pipeline error");
            }
            self.check_overrun(tick_started);

            self.tick += 1;
        }

        self.telemetry.flush()?;
        self.publish_status(SystemState::Stopping, Some("shutdown complete".into())).await;
        info!(target: "SCHEDULER", ticks_run = self.tick, "scheduler stopped");
        Ok(())
    }

    async fn run_one_tick(&mut self) -> Result<(), EngineError> {
        let mut flights = match self.store.list_engine_arrivals().await {
            Ok(flights) => flights,
            Err(e) => {
                warn!(target: "SCHEDULER", tick = self.tick, error = %e, "list_engine_arrivals failed, skipping tick");
                return Ok(());
            }
        };
        flights.sort_by_key(|f| f.id);

        for flight in &mut flights {
            self.process_flight(flight).await;
        }

        if self.tick % SNAPSHOT_EVERY_TICKS == 0 {
            let snapshot = EngineEvent::StateSnapshot {
                tick: self.tick,
                active_flights: flights.iter().filter(|f| f.status == Status::Active).count(),
            };
            self.emit(&snapshot).await;
        }

        Ok(())
    }

    async fn process_flight(&mut self, flight: &mut Flight) {
        let updated = match integrate(flight, 1.0, self.airspace.airport.elevation_ft, &mut self.rng) {
            Ok(updated) => updated,
            Err(e) => {
                warn!(target: "SCHEDULER", flight_id = flight.id, error = %e, "invalid flight state, skipping");
                return;
            }
        };
        *flight = updated;

        let distance = distance_nm(flight.lat, flight.lon, self.airspace.airport.lat, self.airspace.airport.lon);
        let _bearing = bearing_deg(flight.lat, flight.lon, self.airspace.airport.lat, self.airspace.airport.lon);
        flight.distance_to_airport_nm = Some(distance);
        flight.phase = Some(derive_phase(flight.altitude_ft, self.airspace.airport.elevation_ft, distance));

        let events = sector_state::step(flight, distance, flight.altitude_ft, self.tick, &self.airspace, &mut self.rng);

        let store_result = if flight.status == Status::Landed {
            self.store.finalize_touchdown(flight).await
        } else {
            self.store.persist_tick(flight).await
        };
        if let Err(e) = store_result {
            warn!(target: "SCHEDULER", flight_id = flight.id, error = %e, "persistence failed for this tick");
        }

        let position_event = EngineEvent::PositionUpdated {
            aircraft: AircraftPosition {
                id: flight.id,
                callsign: flight.callsign.clone(),
                lat: flight.lat,
                lon: flight.lon,
                altitude_ft: flight.altitude_ft,
                speed_kts: flight.speed_kts,
                heading: flight.heading_deg,
                vertical_speed_fpm: flight.vertical_speed_fpm,
                distance_to_airport_nm: flight.distance_to_airport_nm,
                controller: flight.controller,
                phase: flight.phase,
            },
        };
        self.emit(&position_event).await;
        for event in &events {
            self.emit(event).await;
        }
    }

    async fn emit(&mut self, event: &EngineEvent) {
        let now = Utc::now();
        if let Err(e) = self.telemetry.record(event, now) {
            error!(target: "TELEMETRY", error = %e, "telemetry write failed");
        }
        publish_with_backoff(self.publisher.as_ref(), event).await;
    }

    async fn publish_status(&mut self, state: SystemState, detail: Option<String>) {
        let event = EngineEvent::SystemStatus { state, detail };
        self.emit(&event).await;
    }

    fn check_overrun(&self, tick_started: Instant) {
        let elapsed_ms = tick_started.elapsed().as_millis() as u64;
        if elapsed_ms >= ERROR_TICK_MS {
            let overrun = EngineError::TickOverrun { elapsed_ms };
            error!(target: "SCHEDULER", tick = self.tick, %overrun, "tick overran budget");
        } else if elapsed_ms >= WARN_TICK_MS {
            warn!(target: "SCHEDULER", tick = self.tick, elapsed_ms, "tick running long");
        } else {
            debug!(target: "SCHEDULER", tick = self.tick, elapsed_ms, "tick complete");
        }
    }
}
