//! Static airspace configuration: concentric sector rings, entry fixes and
//! the spawn-zone envelope. Loaded once at startup and treated as immutable
//! for the life of the process (see §5).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::flight::Sector;
use crate::geo::{bearing_deg, distance_nm, normalize_deg};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirportRef {
    pub icao: String,
    pub lat: f64,
    pub lon: f64,
    pub elevation_ft: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SectorRing {
    pub name: SectorName,
    pub r_inner_nm: f64,
    pub r_outer_nm: f64,
    pub alt_min_ft: f64,
    pub alt_max_ft: f64,
    pub hysteresis_nm: f64,
    pub stable_ticks_required: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SectorName {
    Entry,
    Enroute,
    Approach,
    Runway,
}

impl From<SectorName> for Sector {
    fn from(n: SectorName) -> Self {
        match n {
            SectorName::Entry => Sector::Entry,
            SectorName::Enroute => Sector::Enroute,
            SectorName::Approach => Sector::Approach,
            SectorName::Runway => Sector::Runway,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryFix {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub bearing_deg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnZone {
    pub radius_min_nm: f64,
    pub radius_max_nm: f64,
    pub alt_min_ft: f64,
    pub alt_max_ft: f64,
    pub speed_min_kts: f64,
    pub speed_max_kts: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirspaceConfig {
    pub airport: AirportRef,
    pub sectors: Vec<SectorRing>,
    pub entry_fixes: Vec<EntryFix>,
    pub spawn: SpawnZone,
}

impl AirspaceConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read airspace config: {:?}", path.as_ref()))?;
        let config: AirspaceConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse airspace config JSON: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// The default representative-airport ring configuration from §4.C,
    /// centered on the configured airport reference point.
    pub fn default_for_airport(airport: AirportRef) -> Self {
        let sectors = vec![
            SectorRing {
                name: SectorName::Entry,
                r_inner_nm: 30.0,
                r_outer_nm: 60.0,
                alt_min_ft: 20_000.0,
                alt_max_ft: 60_000.0,
                hysteresis_nm: 0.5,
                stable_ticks_required: 2,
            },
            SectorRing {
                name: SectorName::Enroute,
                r_inner_nm: 10.0,
                r_outer_nm: 30.0,
                alt_min_ft: 18_000.0,
                alt_max_ft: 35_000.0,
                hysteresis_nm: 0.5,
                stable_ticks_required: 2,
            },
            SectorRing {
                name: SectorName::Approach,
                r_inner_nm: 3.0,
                r_outer_nm: 10.0,
                alt_min_ft: 0.0,
                alt_max_ft: 18_000.0,
                hysteresis_nm: 0.3,
                stable_ticks_required: 2,
            },
            SectorRing {
                name: SectorName::Runway,
                r_inner_nm: 0.0,
                r_outer_nm: 3.0,
                alt_min_ft: 0.0,
                alt_max_ft: airport.elevation_ft + 3_000.0,
                hysteresis_nm: 0.2,
                stable_ticks_required: 2,
            },
        ];

        let entry_fixes = (0..8)
            .map(|i| {
                let bearing = (i as f64) * 45.0;
                let (lat, lon) = crate::geo::advance(airport.lat, airport.lon, bearing, 30.0);
                EntryFix {
                    name: format!("FIX{:03}", bearing as i32),
                    lat,
                    lon,
                    bearing_deg: bearing,
                }
            })
            .collect();

        let spawn = SpawnZone {
            radius_min_nm: 35.0,
            radius_max_nm: 60.0,
            alt_min_ft: 18_000.0,
            alt_max_ft: 35_000.0,
            speed_min_kts: 250.0,
            speed_max_kts: 350.0,
        };

        Self {
            airport,
            sectors,
            entry_fixes,
            spawn,
        }
    }

    /// Returns the smallest-radius sector whose ring and altitude band
    /// contain (distance, altitude). `None` when the flight is outside
    /// managed airspace entirely.
    pub fn classify(&self, distance_nm: f64, altitude_ft: f64) -> Option<&SectorRing> {
        self.sectors
            .iter()
            .filter(|s| {
                distance_nm >= s.r_inner_nm
                    && distance_nm <= s.r_outer_nm
                    && altitude_ft >= s.alt_min_ft
                    && altitude_ft <= s.alt_max_ft
            })
            .min_by(|a, b| a.r_outer_nm.partial_cmp(&b.r_outer_nm).unwrap())
    }

    pub fn ring(&self, name: SectorName) -> Option<&SectorRing> {
        self.sectors.iter().find(|s| s.name == name)
    }

    /// Convenience lookup keyed by the persisted `Sector` tag rather than the
    /// config-file `SectorName` tag.
    pub fn ring_for_sector(&self, sector: Sector) -> Option<&SectorRing> {
        self.sectors.iter().find(|s| Sector::from(s.name) == sector)
    }

    /// The sector whose r_inner equals `ring`'s r_outer (the next sector out).
    pub fn outer_neighbor(&self, ring: &SectorRing) -> Option<&SectorRing> {
        self.sectors.iter().find(|s| s.r_inner_nm == ring.r_outer_nm)
    }

    /// The sector whose r_outer equals `ring`'s r_inner (the next sector in).
    pub fn inner_neighbor(&self, ring: &SectorRing) -> Option<&SectorRing> {
        self.sectors.iter().find(|s| s.r_outer_nm == ring.r_inner_nm)
    }

    /// Nearest entry fix by great-circle distance, ties broken by lowest bearing.
    pub fn nearest_entry_fix(&self, lat: f64, lon: f64) -> Option<&EntryFix> {
        self.entry_fixes
            .iter()
            .map(|f| (f, distance_nm(lat, lon, f.lat, f.lon)))
            .min_by(|(fa, da), (fb, db)| {
                da.partial_cmp(db)
                    .unwrap()
                    .then(fa.bearing_deg.partial_cmp(&fb.bearing_deg).unwrap())
            })
            .map(|(f, _)| f)
    }

    /// Reflected heading at the ENTRY outer boundary: bearing-to-center plus a
    /// caller-supplied jitter in [-20, +20] degrees.
    pub fn reflect_heading(&self, lat: f64, lon: f64, jitter_deg: f64) -> f64 {
        let bearing_to_center = bearing_deg(lat, lon, self.airport.lat, self.airport.lon);
        normalize_deg(bearing_to_center + jitter_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AirspaceConfig {
        AirspaceConfig::default_for_airport(AirportRef {
            icao: "TEST".into(),
            lat: 51.5,
            lon: -0.1,
            elevation_ft: 100.0,
        })
    }

    #[test]
    fn classifies_into_smallest_matching_ring() {
        let cfg = test_config();
        let sector = cfg.classify(5.0, 10_000.0).unwrap();
        assert_eq!(sector.name, SectorName::Approach);
    }

    #[test]
    fn classify_returns_none_outside_all_rings() {
        let cfg = test_config();
        assert!(cfg.classify(100.0, 40_000.0).is_none());
    }

    #[test]
    fn entry_fixes_are_30nm_out_and_evenly_spaced() {
        let cfg = test_config();
        assert_eq!(cfg.entry_fixes.len(), 8);
        for fix in &cfg.entry_fixes {
            let d = distance_nm(cfg.airport.lat, cfg.airport.lon, fix.lat, fix.lon);
            assert!((d - 30.0).abs() < 0.05);
        }
    }

    #[test]
    fn nearest_entry_fix_picks_closest() {
        let cfg = test_config();
        let (lat, lon) = crate::geo::advance(cfg.airport.lat, cfg.airport.lon, 90.0, 30.0);
        let fix = cfg.nearest_entry_fix(lat, lon).unwrap();
        assert_eq!(fix.bearing_deg, 90.0);
    }

    #[test]
    fn reflect_heading_points_back_toward_center_within_jitter() {
        let cfg = test_config();
        let (lat, lon) = crate::geo::advance(cfg.airport.lat, cfg.airport.lon, 90.0, 60.0);
        let reflected = cfg.reflect_heading(lat, lon, 0.0);
        let bearing_to_center = bearing_deg(lat, lon, cfg.airport.lat, cfg.airport.lon);
        assert!((reflected - bearing_to_center).abs() < 1e-9);
    }
}
