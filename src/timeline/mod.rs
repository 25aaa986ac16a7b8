//! Monthly timeline aggregation over synthesized profile sets.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use tracing::info;

use crate::data::synth::{self, BoundingBox, SyntheticProfile};

/// Profiles included verbatim in a timeline response.
const MAX_PROFILES_IN_RESPONSE: usize = 20;

#[derive(Debug)]
pub enum TimelineError {
    InvalidDate(String),
    UnknownParameter(String),
}

impl fmt::Display for TimelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelineError::InvalidDate(msg) => write!(f, "invalid date: {}", msg),
            TimelineError::UnknownParameter(name) => {
                write!(f, "unknown parameter: {}", name)
            }
        }
    }
}

impl Error for TimelineError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Temperature,
    Salinity,
}

impl Parameter {
    pub fn parse(name: &str) -> Result<Self, TimelineError> {
        match name {
            "temperature" => Ok(Parameter::Temperature),
            "salinity" => Ok(Parameter::Salinity),
            other => Err(TimelineError::UnknownParameter(other.to_string())),
        }
    }

    fn values<'a>(&self, profile: &'a SyntheticProfile) -> &'a [f64] {
        match self {
            Parameter::Temperature => &profile.temperature,
            Parameter::Salinity => &profile.salinity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyAverage {
    pub year: i32,
    pub month: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineMetadata {
    pub data_points: usize,
    pub monthly_points: usize,
    pub region: String,
    pub parameter: Parameter,
    pub time_range: String,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineData {
    pub profiles: Vec<SyntheticProfile>,
    pub monthly_averages: Vec<MonthlyAverage>,
    pub metadata: TimelineMetadata,
}

/// Named-region timeline view over the synthetic profile source.
pub struct TimelineService;

impl TimelineService {
    pub fn new() -> Self {
        Self
    }

    /// Known regions, `[lon_min, lat_min, lon_max, lat_max]`.
    pub fn regions() -> &'static [(&'static str, BoundingBox)] {
        &[
            ("global", [-180.0, -90.0, 180.0, 90.0]),
            ("indian_ocean", [30.0, -60.0, 120.0, 30.0]),
            ("pacific", [100.0, -60.0, 180.0, 60.0]),
            ("atlantic", [-80.0, -60.0, 20.0, 60.0]),
            ("north_atlantic", [-60.0, 30.0, -30.0, 60.0]),
        ]
    }

    /// Unknown regions fall back to the global bounding box.
    fn bbox_for(region: &str) -> BoundingBox {
        Self::regions()
            .iter()
            .find(|(name, _)| *name == region)
            .map(|(_, bbox)| *bbox)
            .unwrap_or(Self::regions()[0].1)
    }

    pub fn get_timeline_data(
        &self,
        start_date: &str,
        end_date: &str,
        region: &str,
        parameter: Parameter,
    ) -> Result<TimelineData, TimelineError> {
        let start = parse_date(start_date)?;
        let end = parse_date(end_date)?;
        let bbox = Self::bbox_for(region);

        let profiles = synth::generate_profiles(bbox, start, end);
        info!(
            "timeline for {} ({} to {}): {} profiles",
            region,
            start_date,
            end_date,
            profiles.len()
        );

        let monthly_averages = monthly_averages(&profiles, parameter);
        let metadata = TimelineMetadata {
            data_points: profiles.len(),
            monthly_points: monthly_averages.len(),
            region: region.to_string(),
            parameter,
            time_range: format!("{} to {}", start_date, end_date),
            bbox,
        };

        Ok(TimelineData {
            profiles: profiles
                .into_iter()
                .take(MAX_PROFILES_IN_RESPONSE)
                .collect(),
            monthly_averages,
            metadata,
        })
    }
}

fn parse_date(date: &str) -> Result<DateTime<Utc>, TimelineError> {
    let naive = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| TimelineError::InvalidDate(format!("{}: {}", date, e)))?;
    Ok(naive.and_time(NaiveTime::MIN).and_utc())
}

/// Group profiles by calendar month: mean position, per-profile parameter
/// mean averaged over the group, ascending (year, month).
fn monthly_averages(profiles: &[SyntheticProfile], parameter: Parameter) -> Vec<MonthlyAverage> {
    let mut groups: BTreeMap<(i32, u32), Vec<&SyntheticProfile>> = BTreeMap::new();
    for profile in profiles {
        groups
            .entry((profile.timestamp.year(), profile.timestamp.month()))
            .or_default()
            .push(profile);
    }

    groups
        .into_iter()
        .map(|((year, month), group)| {
            let count = group.len();
            let latitude = group.iter().map(|p| p.latitude).sum::<f64>() / count as f64;
            let longitude = group.iter().map(|p| p.longitude).sum::<f64>() / count as f64;

            let profile_means: Vec<f64> = group
                .iter()
                .filter_map(|p| mean(parameter.values(p)))
                .collect();
            let value = mean(&profile_means).unwrap_or(0.0);

            MonthlyAverage {
                year,
                month,
                latitude,
                longitude,
                value,
                count,
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
