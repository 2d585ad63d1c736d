use chrono::{TimeZone, Utc};
use foresight_workspace::engine::data::{LabeledOpportunity, ObservationStore, Opportunity, TimeSeriesObservation};
use foresight_workspace::engine::{EngineConfig, Foresight};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Foresight: Forecast Walkthrough");
    println!("===============================\n");

    let engine = Foresight::new(EngineConfig::default())?;
    let registry = engine.new_registry();

    // Three years of monthly revenue with the business calendar baked in
    let store = create_sample_revenue(&engine)?;
    println!("Loaded {} revenue observations\n", store.len("Revenue"));

    engine.register_forecast(&registry, "revenue-monthly", "Revenue")?;
    let forecast = engine.forecast(&registry, &store, "revenue-monthly", 6)?;

    println!("6-month forecast (degraded: {}):", forecast.degraded);
    for point in forecast.points() {
        println!(
            "  {}: {:>12.0}  [{:>12.0}, {:>12.0}]",
            point.period_label, point.point_estimate, point.lower, point.upper
        );
    }
    let summary = forecast.summary();
    println!("  total {:.0}, average {:.0}\n", summary.total, summary.average);

    println!("Active models:");
    for model in registry.summary().active {
        println!(
            "  {} v{}: R²={:.3}, MAE={:.0}",
            model.algorithm, model.version, model.r2, model.mae
        );
    }

    println!("\nAnomalies:");
    let report = engine.anomaly_report(&store, "Revenue")?;
    println!("  level {}, {} records", report.level, report.records.len());
    for line in &report.explanations {
        println!("  {}", line);
    }

    println!("\nInsights:");
    for insight in engine.summarize_with_outlook(&registry, &store, "revenue-monthly", 6)? {
        println!("  [{:.2}] {} -> {}", insight.confidence, insight.statement, insight.action);
    }

    println!("\nOpportunity scoring:");
    engine.train_scoring(&registry, &sample_history())?;
    let opportunity = Opportunity {
        id: "RFP-2025-014".to_string(),
        value: 3_000_000.0,
        sector: "Government".to_string(),
        category: "Infrastructure".to_string(),
        technical_complexity: 5.0,
        competitive_level: "Medium".to_string(),
        relationship_score: None,
        days_to_deadline: Some(40),
    };
    let score = engine.score_or_neutral(&registry, &opportunity)?;
    println!(
        "  {}: probability {:.2} ({} band), confidence {:.2}",
        score.opportunity_id, score.probability, score.band, score.confidence
    );
    for factor in &score.factor_breakdown {
        println!("  - {:?}: {} ({})", factor.factor, factor.rating, factor.detail);
    }
    for rec in &score.recommendations {
        println!("  * {}", rec);
    }

    Ok(())
}

fn create_sample_revenue(engine: &Foresight) -> Result<ObservationStore, Box<dyn std::error::Error>> {
    let mut store = ObservationStore::new();
    for i in 0..36u32 {
        let month = i % 12 + 1;
        let timestamp = Utc
            .with_ymd_and_hms(2022 + (i / 12) as i32, month, 1, 0, 0, 0)
            .single()
            .ok_or("invalid sample date")?;
        let base = 900_000.0 + 8_000.0 * i as f64;
        let mut value = base * engine.config().seasonal_factor(month);
        if i == 29 {
            value *= 1.6;
        }
        store.append(TimeSeriesObservation::new(timestamp, "Revenue", value, "demo"))?;
    }
    Ok(store)
}

fn sample_history() -> Vec<LabeledOpportunity> {
    let sectors = ["Government", "Oil & Gas", "Banking", "Healthcare"];
    (0..48)
        .map(|i| {
            let relationship = 3.0 + (i % 7) as f64;
            let complexity = 2.0 + ((i * 5) % 8) as f64;
            LabeledOpportunity {
                opportunity: Opportunity {
                    id: format!("H-{:03}", i),
                    value: 500_000.0 * (1 + i % 30) as f64,
                    sector: sectors[i % sectors.len()].to_string(),
                    category: "Infrastructure".to_string(),
                    technical_complexity: complexity,
                    competitive_level: ["Low", "Medium", "High"][i % 3].to_string(),
                    relationship_score: Some(relationship),
                    days_to_deadline: Some((20 + i * 3) as u32),
                },
                outcome: if relationship > complexity * 0.8 { 1.0 } else { 0.0 },
            }
        })
        .collect()
}
