//! Great-circle geometry primitives used by the kinematics integrator and the
//! airspace classifier. All angles are degrees in, degrees out; all distances
//! are nautical miles.

pub const EARTH_RADIUS_NM: f64 = 3440.065;

/// Great-circle distance between two points, haversine formula.
pub fn distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_NM * c
}

/// Initial bearing from point 1 to point 2, normalized to [0, 360).
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let y = dlon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * dlon.cos();

    normalize_deg(y.atan2(x).to_degrees())
}

/// Forward great-circle destination from (lat, lon) given a heading and distance.
pub fn advance(lat: f64, lon: f64, heading_deg: f64, distance_nm: f64) -> (f64, f64) {
    let lat_rad = lat.to_radians();
    let lon_rad = lon.to_radians();
    let heading_rad = heading_deg.to_radians();
    let angular_distance = distance_nm / EARTH_RADIUS_NM;

    let dest_lat_rad = (lat_rad.sin() * angular_distance.cos()
        + lat_rad.cos() * angular_distance.sin() * heading_rad.cos())
    .asin();

    let dest_lon_rad = lon_rad
        + (heading_rad.sin() * angular_distance.sin() * lat_rad.cos())
            .atan2(angular_distance.cos() - lat_rad.sin() * dest_lat_rad.sin());

    (dest_lat_rad.to_degrees(), normalize_lon(dest_lon_rad.to_degrees()))
}

/// Normalize an angle in degrees to [0, 360).
pub fn normalize_deg(x: f64) -> f64 {
    let r = x % 360.0;
    if r < 0.0 {
        r + 360.0
    } else {
        r
    }
}

/// Normalize a longitude to [-180, 180).
fn normalize_lon(x: f64) -> f64 {
    let r = normalize_deg(x + 180.0) - 180.0;
    r
}

/// Signed shortest turn from `current_deg` to `target_deg`, in (-180, +180].
/// Exactly 180 degrees of separation resolves to +180 (a right turn).
pub fn shortest_turn(current_deg: f64, target_deg: f64) -> f64 {
    let diff = normalize_deg(target_deg - current_deg);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}
