//! Win-probability scoring for opportunities
//!
//! The probability comes from the active scoring model in the registry and
//! is clamped so no opportunity is ever reported as certain. The factor
//! breakdown is a separate heuristic layer: it rates value, relationship and
//! complexity directly from the opportunity, not from model weights.

use crate::config::{EngineConfig, ScoringConfig, Vocabulary};
use crate::data::{LabeledOpportunity, Opportunity};
use crate::error::{EngineError, Result};
use crate::features::{FeatureBuilder, FeatureSchema, FeatureVector};
use crate::models::{ModelRef, TrainedModel, TrainingSet};
use crate::registry::{ModelRegistry, TaskSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Named contribution bucket of a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    ValueTier,
    RelationshipStrength,
    TechnicalComplexity,
}

/// Which way a factor pushes the odds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Favourable,
    Neutral,
    Unfavourable,
}

/// Heuristic rating of one factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorAssessment {
    pub factor: Factor,
    pub rating: String,
    pub direction: Direction,
    pub detail: String,
}

/// Probability band driving the recommendation list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityBand {
    Low,
    Medium,
    High,
}

impl fmt::Display for ProbabilityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbabilityBand::Low => write!(f, "low"),
            ProbabilityBand::Medium => write!(f, "medium"),
            ProbabilityBand::High => write!(f, "high"),
        }
    }
}

/// Scored opportunity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub opportunity_id: String,
    /// Clamped to the configured bounds, `[0.05, 0.95]` by default
    pub probability: f64,
    /// Model quality in `[0, 1]` (R², or accuracy for classifiers)
    pub confidence: f64,
    pub band: ProbabilityBand,
    pub factor_breakdown: Vec<FactorAssessment>,
    pub recommendations: Vec<String>,
    /// Model that produced the probability; `None` for the neutral fallback
    pub model: Option<ModelRef>,
}

impl ScoreResult {
    /// Fallback score for callers that cannot obtain a model
    pub fn neutral(opportunity: &Opportunity, vocabulary: &Vocabulary) -> Self {
        let config = ScoringConfig::default();
        Self {
            opportunity_id: opportunity.id.clone(),
            probability: 0.5,
            confidence: 0.0,
            band: band_for(0.5, &config),
            factor_breakdown: factor_breakdown(opportunity, vocabulary),
            recommendations: recommendations(0.5, opportunity, &config),
            model: None,
        }
    }
}

fn band_for(probability: f64, config: &ScoringConfig) -> ProbabilityBand {
    if probability < config.low_band {
        ProbabilityBand::Low
    } else if probability < config.high_band {
        ProbabilityBand::Medium
    } else {
        ProbabilityBand::High
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Directional ratings for value, relationship and complexity
pub fn factor_breakdown(opportunity: &Opportunity, vocabulary: &Vocabulary) -> Vec<FactorAssessment> {
    let value = finite_or(opportunity.value, 0.0);
    let relationship = opportunity
        .relationship_score
        .filter(|r| r.is_finite())
        .unwrap_or_else(|| vocabulary.relationship_for(&opportunity.sector));
    let complexity = finite_or(opportunity.technical_complexity, 0.0);

    let (rating, direction, detail) = if value < 5_000_000.0 {
        ("Positive", Direction::Favourable, "Smaller opportunities have higher win rates")
    } else if value < 20_000_000.0 {
        ("Neutral", Direction::Neutral, "Medium-sized opportunity in the usual range")
    } else {
        ("Challenging", Direction::Unfavourable, "Large opportunities face more competition")
    };
    let value_factor = FactorAssessment {
        factor: Factor::ValueTier,
        rating: rating.to_string(),
        direction,
        detail: detail.to_string(),
    };

    let (rating, direction, detail) = if relationship >= 8.0 {
        ("Strong", Direction::Favourable, "Excellent relationship advantage")
    } else if relationship >= 6.0 {
        ("Good", Direction::Neutral, "Solid relationship foundation")
    } else {
        ("Weak", Direction::Unfavourable, "Need to strengthen the client relationship")
    };
    let relationship_factor = FactorAssessment {
        factor: Factor::RelationshipStrength,
        rating: rating.to_string(),
        direction,
        detail: detail.to_string(),
    };

    let (rating, direction, detail) = if complexity >= 8.0 {
        ("High", Direction::Favourable, "Leverage technical expertise")
    } else if complexity >= 6.0 {
        ("Medium", Direction::Neutral, "Standard technical approach")
    } else {
        ("Low", Direction::Unfavourable, "Focus on cost competitiveness")
    };
    let complexity_factor = FactorAssessment {
        factor: Factor::TechnicalComplexity,
        rating: rating.to_string(),
        direction,
        detail: detail.to_string(),
    };

    vec![value_factor, relationship_factor, complexity_factor]
}

/// Band recommendations followed by value/sector add-ons
pub fn recommendations(probability: f64, opportunity: &Opportunity, config: &ScoringConfig) -> Vec<String> {
    let band: &[&str] = match band_for(probability, config) {
        ProbabilityBand::Low => &[
            "Low win probability - consider a strategic approach",
            "Focus on value proposition and cost optimization",
            "Strengthen client relationships before bidding",
            "Consider partnering with local companies for higher local content",
        ],
        ProbabilityBand::Medium => &[
            "Moderate win probability - improve competitive position",
            "Highlight unique technical capabilities",
            "Conduct a detailed competitive analysis",
            "Emphasize proven track record and certifications",
        ],
        ProbabilityBand::High => &[
            "High win probability - strong position",
            "Leverage competitive advantages",
            "Showcase relevant case studies and success stories",
            "Consider premium positioning if appropriate",
        ],
    };
    let mut out: Vec<String> = band.iter().map(|s| s.to_string()).collect();

    if finite_or(opportunity.value, 0.0) > config.large_deal_value {
        out.push("Consider forming strategic partnerships for large-scale delivery".to_string());
    }
    match opportunity.sector.trim() {
        "Government" => out.push(
            "Ensure full compliance with government regulations and local content requirements"
                .to_string(),
        ),
        "Oil & Gas" => {
            out.push("Highlight energy sector expertise and HSE compliance".to_string())
        }
        _ => {}
    }
    out
}

/// Scores opportunities against the registry's active scoring model
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
    vocabulary: Vocabulary,
    features: FeatureBuilder,
}

impl ScoringEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.scoring.clone(),
            vocabulary: config.vocabulary.clone(),
            features: FeatureBuilder::new(config),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.config.task_id
    }

    /// Train a new scoring model version from closed opportunities.
    ///
    /// Outcomes are the targets; the split is random with the registry seed.
    pub fn train(
        &self,
        registry: &ModelRegistry,
        history: &[LabeledOpportunity],
    ) -> Result<Arc<TrainedModel>> {
        let task_id = self.config.task_id.as_str();
        if registry.task(task_id).is_none() {
            registry.register_task(TaskSpec::scoring(task_id, self.config.algorithm.clone()))?;
        }

        let vectors: Vec<FeatureVector> = history
            .iter()
            .map(|h| self.features.build_opportunity_features(&h.opportunity))
            .collect();
        let targets: Vec<f64> = history.iter().map(|h| h.outcome).collect();
        let set = TrainingSet::from_vectors(FeatureSchema::opportunity(), &vectors, targets)?;

        registry.with_task_lock(task_id, |lock| {
            registry.train(lock, &self.config.algorithm, &set, self.config.validation_split)
        })
    }

    /// Probability, confidence, factor breakdown and recommendations.
    ///
    /// Needs a trained model (`ModelNotTrained` otherwise); callers wanting a
    /// fallback use [`ScoreResult::neutral`].
    pub fn score_opportunity(
        &self,
        registry: &ModelRegistry,
        opportunity: &Opportunity,
    ) -> Result<ScoreResult> {
        let task_id = self.config.task_id.as_str();
        let model = registry
            .active(task_id, self.config.algorithm.tag())
            .or_else(|| registry.active_models(task_id).into_iter().next())
            .ok_or_else(|| EngineError::ModelNotTrained(task_id.to_string()))?;

        let features = self.features.build_opportunity_features(opportunity);
        let raw = model.predict(&features, &[])?;
        let probability = raw.clamp(self.config.min_probability, self.config.max_probability);
        debug!(
            "Scored {}: raw {:.4}, clamped {:.4}",
            opportunity.id, raw, probability
        );

        let result = ScoreResult {
            opportunity_id: opportunity.id.clone(),
            probability,
            confidence: model.metrics.quality(),
            band: band_for(probability, &self.config),
            factor_breakdown: factor_breakdown(opportunity, &self.vocabulary),
            recommendations: recommendations(probability, opportunity, &self.config),
            model: Some(model.model_ref()),
        };
        info!(
            "Opportunity {} scored {:.2} ({} band)",
            result.opportunity_id, result.probability, result.band
        );
        Ok(result)
    }
}
