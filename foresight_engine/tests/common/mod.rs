//! Synthetic fixtures shared by the integration tests

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use foresight_engine::{LabeledOpportunity, ObservationStore, Opportunity, TimeSeriesObservation};

/// Monthly observations starting January 2022
pub fn monthly(metric: &str, values: &[f64]) -> Vec<TimeSeriesObservation> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let ts = Utc
                .with_ymd_and_hms(2022 + (i / 12) as i32, (i % 12) as u32 + 1, 1, 0, 0, 0)
                .unwrap();
            TimeSeriesObservation::new(ts, metric, v, "fixture")
        })
        .collect()
}

pub fn store_with(metric: &str, values: &[f64]) -> ObservationStore {
    let mut store = ObservationStore::new();
    store.extend(monthly(metric, values)).unwrap();
    store
}

/// Upward trend with a mild repeating wobble
pub fn trending(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 1_000.0 + 25.0 * i as f64 + [0.0, 15.0, -10.0, 5.0][i % 4])
        .collect()
}

pub fn opportunity(id: &str, value: f64, sector: &str, complexity: f64) -> Opportunity {
    Opportunity {
        id: id.to_string(),
        value,
        sector: sector.to_string(),
        category: "IT Services".to_string(),
        technical_complexity: complexity,
        competitive_level: "Medium".to_string(),
        relationship_score: None,
        days_to_deadline: Some(45),
    }
}

/// Closed opportunities whose outcome follows relationship and complexity
pub fn labeled_history(n: usize) -> Vec<LabeledOpportunity> {
    let sectors = ["Government", "Oil & Gas", "Banking", "Healthcare"];
    let levels = ["Low", "Medium", "High"];
    (0..n)
        .map(|i| {
            let relationship = 2.0 + (i % 8) as f64;
            let complexity = 1.0 + ((i * 3) % 9) as f64;
            let won = relationship - complexity * 0.5 > 4.0;
            LabeledOpportunity {
                opportunity: Opportunity {
                    id: format!("hist-{}", i),
                    value: 1_000_000.0 * (1 + (i * 7) % 40) as f64,
                    sector: sectors[i % sectors.len()].to_string(),
                    category: "IT Services".to_string(),
                    technical_complexity: complexity,
                    competitive_level: levels[i % levels.len()].to_string(),
                    relationship_score: Some(relationship),
                    days_to_deadline: Some((15 + (i * 11) % 90) as u32),
                },
                outcome: if won { 1.0 } else { 0.0 },
            }
        })
        .collect()
}
