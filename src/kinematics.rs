//! Component B: the per-tick kinematics integrator. Pure function of its
//! inputs plus the engine's single seeded RNG stream — no side effects, no
//! suspension points, safe to run on a bounded worker pool (§5).

use crate::error::EngineError;
use crate::flight::{Flight, Phase};
use crate::geo::{advance, normalize_deg, shortest_turn};
use crate::rng::EngineRng;

const MIN_SPEED_KTS: f64 = 140.0;
const MAX_SPEED_KTS: f64 = 550.0;
const ACCEL_KTS_PER_S: f64 = 0.6;
const DECEL_KTS_PER_S: f64 = 0.8;

const BANK_ANGLE_DEG: f64 = 25.0;
const GRAVITY_FT_S2: f64 = 32.174;
const KT_TO_FT_S: f64 = 1.68781;

const GLIDESLOPE_RANGE_NM: f64 = 10.0;
const GLIDESLOPE_FT_PER_NM: f64 = 318.5;
const GLIDESLOPE_CAP_FPM: f64 = 1800.0;
const FAR_CLIMB_CAP_FPM: f64 = 2500.0;
const FAR_DESCENT_CAP_FPM: f64 = 3000.0;
const DEFAULT_CLIMB_RATE_FPM: f64 = 1500.0;
const DEFAULT_DESCENT_RATE_FPM: f64 = 2000.0;

pub const TOUCHDOWN_AGL_FT: f64 = 50.0;

/// Advance `flight` by `dt_secs` of simulated time. Rejects (without
/// mutation) any flight whose current state already violates the §3 bounds.
pub fn integrate(
    flight: &Flight,
    dt_secs: f64,
    airport_elevation_ft: f64,
    rng: &mut EngineRng,
) -> Result<Flight, EngineError> {
    flight.validate().map_err(|reason| EngineError::InvalidState {
        flight_id: flight.id,
        reason,
    })?;

    let mut f = flight.clone();

    update_speed(&mut f, dt_secs, rng);
    update_heading(&mut f, dt_secs, rng);
    update_altitude(&mut f, dt_secs, airport_elevation_ft, rng);
    update_position(&mut f, dt_secs);

    Ok(f)
}

fn update_speed(f: &mut Flight, dt: f64, rng: &mut EngineRng) {
    let new_speed = if let Some(target) = f.target_speed_kts {
        let delta = target - f.speed_kts;
        if delta >= 0.0 {
            f.speed_kts + delta.min(ACCEL_KTS_PER_S * dt)
        } else {
            f.speed_kts + delta.max(-DECEL_KTS_PER_S * dt)
        }
    } else {
        f.speed_kts + rng.uniform(-5.0, 5.0)
    };

    f.speed_kts = new_speed.clamp(MIN_SPEED_KTS, MAX_SPEED_KTS);
}

fn update_heading(f: &mut Flight, dt: f64, rng: &mut EngineRng) {
    let new_heading = if let Some(target) = f.target_heading_deg {
        let delta = shortest_turn(f.heading_deg, target);
        let tas_ft_s = (f.speed_kts * KT_TO_FT_S).max(1.0);
        let omega_rad_s = GRAVITY_FT_S2 * BANK_ANGLE_DEG.to_radians().tan() / tas_ft_s;
        let max_turn_deg = omega_rad_s.to_degrees() * dt;
        let applied = delta.signum() * delta.abs().min(max_turn_deg);
        f.heading_deg + applied
    } else {
        f.heading_deg + rng.uniform(-2.0, 2.0)
    };

    f.heading_deg = normalize_deg(new_heading);
}

fn update_altitude(f: &mut Flight, dt: f64, airport_elevation_ft: f64, rng: &mut EngineRng) {
    let distance = f.distance_to_airport_nm;
    let on_glideslope = matches!(distance, Some(d) if d < GLIDESLOPE_RANGE_NM);

    if on_glideslope {
        let d = distance.unwrap().max(0.0);
        let glide_target = (airport_elevation_ft + d * GLIDESLOPE_FT_PER_NM).max(airport_elevation_ft);
        f.vertical_speed_fpm = commanded_vertical_speed(f.altitude_ft, glide_target, GLIDESLOPE_CAP_FPM);
    } else if let Some(target) = f.target_altitude_ft {
        let climbing = target > f.altitude_ft;
        let cap = if climbing { FAR_CLIMB_CAP_FPM } else { FAR_DESCENT_CAP_FPM };
        f.vertical_speed_fpm = commanded_vertical_speed(f.altitude_ft, target, cap);
    } else {
        let drift = rng.uniform(-200.0 / 60.0, 200.0 / 60.0);
        f.vertical_speed_fpm = (f.vertical_speed_fpm + drift).clamp(-6_000.0, 6_000.0);
    }

    f.altitude_ft = (f.altitude_ft + f.vertical_speed_fpm * (dt / 60.0)).max(airport_elevation_ft);
}

fn commanded_vertical_speed(current_altitude: f64, target_altitude: f64, cap_fpm: f64) -> f64 {
    let diff = target_altitude - current_altitude;
    if diff > 0.0 {
        diff.min(cap_fpm.min(DEFAULT_CLIMB_RATE_FPM))
    } else if diff < 0.0 {
        diff.max(-(cap_fpm.min(DEFAULT_DESCENT_RATE_FPM)))
    } else {
        0.0
    }
}

fn update_position(f: &mut Flight, dt: f64) {
    let distance_nm = f.speed_kts * (dt / 3600.0);
    let (lat, lon) = advance(f.lat, f.lon, f.heading_deg, distance_nm);
    f.lat = lat;
    f.lon = lon;
}

/// Derived-only phase classification from altitude/distance (§4.B). Never
/// fed back into control decisions.
pub fn derive_phase(altitude_ft: f64, airport_elevation_ft: f64, distance_nm: f64) -> Phase {
    let agl = altitude_ft - airport_elevation_ft;

    if agl < TOUCHDOWN_AGL_FT {
        Phase::Touchdown
    } else if agl < 3_000.0 && distance_nm < 3.0 {
        Phase::Final
    } else if altitude_ft >= 3_000.0 && altitude_ft <= 10_000.0 && distance_nm < 10.0 {
        Phase::Approach
    } else if altitude_ft > 10_000.0 && altitude_ft <= 18_000.0 {
        Phase::Descent
    } else {
        Phase::Cruise
    }
}
