//! Canonical per-frame prediction record

use serde::{Deserialize, Serialize};

/// Real/fake probability pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Distribution {
    pub real: f32,
    pub fake: f32,
}

impl Distribution {
    pub fn new(real: f32, fake: f32) -> Self {
        Self { real, fake }
    }

    fn is_finite(&self) -> bool {
        self.real.is_finite() && self.fake.is_finite()
    }
}

/// Outcome of scoring one image.
///
/// A record with `error` set is *degraded*: both scores and the confidence are
/// zero and `is_fake` is false. Degraded records still take part in video
/// aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub real_score: f32,
    pub fake_score: f32,
    pub is_fake: bool,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionRecord {
    /// Build a record from backend scores. Scores are clamped into `[0, 1]`;
    /// non-finite scores produce a degraded record.
    pub fn from_distribution(dist: Distribution) -> Self {
        if !dist.is_finite() {
            return Self::degraded(format!(
                "non-finite scores (real={}, fake={})",
                dist.real, dist.fake
            ));
        }

        let real_score = dist.real.clamp(0.0, 1.0);
        let fake_score = dist.fake.clamp(0.0, 1.0);

        Self {
            real_score,
            fake_score,
            is_fake: fake_score > real_score,
            confidence: real_score.max(fake_score),
            error: None,
        }
    }

    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            real_score: 0.0,
            fake_score: 0.0,
            is_fake: false,
            confidence: 0.0,
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn distribution(&self) -> Distribution {
        Distribution::new(self.real_score, self.fake_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_the_larger_score() {
        let record = PredictionRecord::from_distribution(Distribution::new(0.3, 0.7));
        assert!(record.is_fake);
        assert_eq!(record.confidence, 0.7);
        assert!(record.error.is_none());

        let record = PredictionRecord::from_distribution(Distribution::new(0.9, 0.1));
        assert!(!record.is_fake);
        assert_eq!(record.confidence, 0.9);
    }

    #[test]
    fn exact_tie_is_not_fake() {
        let record = PredictionRecord::from_distribution(Distribution::new(0.5, 0.5));
        assert!(!record.is_fake);
        assert_eq!(record.confidence, 0.5);
    }

    #[test]
    fn scores_are_clamped() {
        let record = PredictionRecord::from_distribution(Distribution::new(-0.2, 1.4));
        assert_eq!(record.real_score, 0.0);
        assert_eq!(record.fake_score, 1.0);
        assert_eq!(record.confidence, 1.0);
    }

    #[test]
    fn nan_scores_degrade() {
        let record = PredictionRecord::from_distribution(Distribution::new(f32::NAN, 0.4));
        assert!(record.is_degraded());
        assert_eq!(record.distribution(), Distribution::default());
        assert!(!record.is_fake);
    }

    #[test]
    fn degraded_record_is_zeroed() {
        let record = PredictionRecord::degraded("out of memory");
        assert_eq!(record.real_score, 0.0);
        assert_eq!(record.fake_score, 0.0);
        assert_eq!(record.confidence, 0.0);
        assert!(!record.is_fake);
        assert_eq!(record.error.as_deref(), Some("out of memory"));
    }
}
