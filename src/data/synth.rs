//! Synthetic Argo profile generation.
//!
//! Stands in for the external ERDDAP/GDAC fetchers: produces regionally
//! plausible temperature/salinity/pressure profiles with a seasonal cycle
//! and basic water-column structure (mixed layer, thermocline, deep water).
//! Generation is seeded from the bounding box so the same region always
//! yields the same dataset.

use chrono::{DateTime, Datelike, Duration, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::hash::{DefaultHasher, Hash, Hasher};

/// `[lon_min, lat_min, lon_max, lat_max]`
pub type BoundingBox = [f64; 4];

pub const PRESSURE_LEVELS: usize = 30;
pub const MAX_PRESSURE_DBAR: f64 = 2000.0;

#[derive(Debug, Clone, Serialize)]
pub struct SyntheticProfile {
    pub float_id: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub pressure: Vec<f64>,
    pub temperature: Vec<f64>,
    pub salinity: Vec<f64>,
}

/// Generate a profile set for a region and time window. Profile count scales
/// with the window length, bounded to keep responses manageable.
pub fn generate_profiles(
    bbox: BoundingBox,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<SyntheticProfile> {
    let days = (end - start).num_days().max(1);
    let n_profiles = (days / 15).clamp(20, 200) as usize;

    let mut rng = SmallRng::seed_from_u64(region_seed(bbox));
    let basins = ocean_basins(bbox);

    let mut timestamps: Vec<DateTime<Utc>> = (0..n_profiles)
        .map(|_| start + Duration::days(rng.gen_range(0..days)))
        .collect();
    timestamps.sort();

    let pressure_levels: Vec<f64> = (0..PRESSURE_LEVELS)
        .map(|i| MAX_PRESSURE_DBAR * i as f64 / (PRESSURE_LEVELS - 1) as f64)
        .collect();

    let mut profiles = Vec::with_capacity(n_profiles);
    for (i, timestamp) in timestamps.into_iter().enumerate() {
        let basin = basins[i % basins.len()];
        let longitude =
            (rng.gen_range(basin[0]..basin[2]) + rng.gen_range(-2.0..2.0)).clamp(-180.0, 180.0);
        let latitude =
            (rng.gen_range(basin[1]..basin[3]) + rng.gen_range(-1.0..1.0)).clamp(-90.0, 90.0);

        let (surface_temp, surface_sal) =
            surface_conditions(latitude, longitude, timestamp, &mut rng);

        let mut temperature = Vec::with_capacity(PRESSURE_LEVELS);
        let mut salinity = Vec::with_capacity(PRESSURE_LEVELS);
        for &pressure in &pressure_levels {
            temperature.push(temperature_at(surface_temp, pressure, &mut rng));
            salinity.push(salinity_at(surface_sal, pressure, &mut rng));
        }

        profiles.push(SyntheticProfile {
            float_id: rng.gen_range(1_901_000..1_909_999u32).to_string(),
            timestamp,
            latitude,
            longitude,
            pressure: pressure_levels.clone(),
            temperature,
            salinity,
        });
    }

    profiles
}

fn region_seed(bbox: BoundingBox) -> u64 {
    let mut hasher = DefaultHasher::new();
    format!("{}_{}_{}_{}", bbox[0], bbox[1], bbox[2], bbox[3]).hash(&mut hasher);
    hasher.finish()
}

/// For a global request, scatter floats over the major basins instead of
/// uniformly over the sphere (which would put most of them on land).
fn ocean_basins(bbox: BoundingBox) -> Vec<BoundingBox> {
    let global = bbox[0] <= -180.0 && bbox[2] >= 180.0 && bbox[1] <= -90.0 && bbox[3] >= 90.0;
    if global {
        vec![
            [-80.0, 20.0, -10.0, 70.0],   // North Atlantic
            [-50.0, -60.0, 20.0, 0.0],    // South Atlantic
            [120.0, 0.0, 180.0, 60.0],    // North Pacific
            [120.0, -60.0, 180.0, 0.0],   // South Pacific
            [20.0, -60.0, 120.0, 20.0],   // Indian Ocean
            [-180.0, -70.0, 180.0, -45.0], // Southern Ocean
        ]
    } else {
        vec![bbox]
    }
}

fn surface_conditions(
    latitude: f64,
    longitude: f64,
    timestamp: DateTime<Utc>,
    rng: &mut SmallRng,
) -> (f64, f64) {
    let day_of_year = timestamp.ordinal() as f64;
    let seasonal = (2.0 * std::f64::consts::PI * day_of_year / 365.25).sin();

    let (mut temp, mut sal) = if latitude.abs() < 23.5 {
        // Tropical
        (26.0 + 2.0 * seasonal, 35.5)
    } else if latitude.abs() < 66.5 {
        // Temperate, opposite seasons per hemisphere
        let phase = (2.0 * std::f64::consts::PI * (day_of_year - 80.0) / 365.25).sin();
        let t = if latitude > 0.0 {
            18.0 + 6.0 * phase
        } else {
            18.0 - 6.0 * phase
        };
        (t, 34.8)
    } else {
        // Polar
        (4.0 + 2.0 * seasonal, 34.2)
    };

    // Regional adjustments
    if (20.0..=120.0).contains(&longitude) && (-60.0..=30.0).contains(&latitude) {
        temp += 1.0; // Indian Ocean
        sal += 0.3;
    } else if (-80.0..=20.0).contains(&longitude) {
        sal += 0.2; // Atlantic
    }

    (temp + rng.gen_range(-0.5..0.5), sal)
}

fn temperature_at(surface_temp: f64, pressure: f64, rng: &mut SmallRng) -> f64 {
    let temp = if pressure < 200.0 {
        // Mixed layer
        surface_temp - 0.02 * pressure
    } else if pressure < 1000.0 {
        // Thermocline
        surface_temp - 0.02 * 200.0 - 0.015 * (pressure - 200.0)
    } else {
        // Deep water
        surface_temp - 0.02 * 200.0 - 0.015 * 800.0 - 0.001 * (pressure - 1000.0)
    };

    (temp + rng.gen_range(-0.3..0.3)).max(0.0)
}

fn salinity_at(surface_sal: f64, pressure: f64, rng: &mut SmallRng) -> f64 {
    if pressure < 100.0 {
        surface_sal + rng.gen_range(-0.2..0.2)
    } else if pressure < 1000.0 {
        surface_sal + 0.1 + rng.gen_range(-0.3..0.3)
    } else {
        34.7 + rng.gen_range(-0.1..0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const INDIAN_OCEAN: BoundingBox = [30.0, -60.0, 120.0, 30.0];

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn profile_count_scales_with_window_and_is_bounded() {
        let (start, end) = window();
        let year = generate_profiles(INDIAN_OCEAN, start, end);
        assert_eq!(year.len(), 24); // 364 days / 15

        let short = generate_profiles(INDIAN_OCEAN, start, start + Duration::days(3));
        assert_eq!(short.len(), 20); // floor

        let long = generate_profiles(INDIAN_OCEAN, start, start + Duration::days(100 * 365));
        assert_eq!(long.len(), 200); // cap
    }

    #[test]
    fn coordinates_and_levels_are_plausible() {
        let (start, end) = window();
        for profile in generate_profiles(INDIAN_OCEAN, start, end) {
            assert!((-90.0..=90.0).contains(&profile.latitude));
            assert!((-180.0..=180.0).contains(&profile.longitude));
            assert_eq!(profile.pressure.len(), PRESSURE_LEVELS);
            assert_eq!(profile.temperature.len(), PRESSURE_LEVELS);
            assert_eq!(profile.salinity.len(), PRESSURE_LEVELS);
            assert!(profile.temperature.iter().all(|&t| (0.0..40.0).contains(&t)));
            assert!(profile.salinity.iter().all(|&s| (30.0..40.0).contains(&s)));
        }
    }

    #[test]
    fn timestamps_are_sorted_within_the_window() {
        let (start, end) = window();
        let profiles = generate_profiles(INDIAN_OCEAN, start, end);
        for pair in profiles.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        assert!(profiles.iter().all(|p| p.timestamp >= start && p.timestamp <= end));
    }

    #[test]
    fn same_region_yields_the_same_dataset() {
        let (start, end) = window();
        let a = generate_profiles(INDIAN_OCEAN, start, end);
        let b = generate_profiles(INDIAN_OCEAN, start, end);
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].latitude, b[0].latitude);
        assert_eq!(a[0].temperature, b[0].temperature);
    }
}
