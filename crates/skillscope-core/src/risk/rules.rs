//! Deterministic rule-based risk scoring.

use super::{
    ContributingFactor, ModelUsed, RiskFeatures, RiskLevel, RiskPrediction, RiskProbabilities,
};
use crate::statistics::round_to;

const MAX_FACTORS: usize = 3;

/// Weighted wellbeing score in `[0, 100]`; higher is safer.
pub fn rule_score(f: &RiskFeatures) -> f64 {
    let mut score = 0.25 * f.engagement_score
        + 0.30 * f.avg_quiz_score
        + 0.25 * f.attendance
        + 0.20 * f.assignment_completion;

    if f.consecutive_absences >= 3 {
        score -= 10.0;
    }
    if f.days_since_last_activity >= 7 {
        score -= 10.0;
    }
    if f.streak == 0 {
        score -= 5.0;
    }

    if f.streak >= 7 {
        score += 5.0;
    }
    if f.engagement_trend_7d.unwrap_or(0.0) > 0.0 {
        score += 5.0;
    }

    score.clamp(0.0, 100.0)
}

/// Tier and illustrative probabilities for a rule score.
pub fn tier(score: f64) -> (RiskLevel, RiskProbabilities) {
    if score >= 70.0 {
        (
            RiskLevel::Low,
            RiskProbabilities {
                high: 0.05,
                medium: 0.15,
                low: 0.80,
            },
        )
    } else if score >= 45.0 {
        (
            RiskLevel::Medium,
            RiskProbabilities {
                high: 0.15,
                medium: 0.55,
                low: 0.30,
            },
        )
    } else {
        (
            RiskLevel::High,
            RiskProbabilities {
                high: 0.70,
                medium: 0.20,
                low: 0.10,
            },
        )
    }
}

/// Classify with fixed thresholds and weights.
pub fn rule_based(f: &RiskFeatures) -> RiskPrediction {
    let (risk_level, probabilities) = tier(rule_score(f));

    RiskPrediction {
        risk_level,
        confidence: round_to(probabilities.max(), 3),
        probabilities,
        contributing_factors: threshold_factors(f),
        recommendations: recommendations(risk_level),
        model_used: ModelUsed::RuleBased,
    }
}

fn threshold_factors(f: &RiskFeatures) -> Vec<ContributingFactor> {
    let checks = [
        (f.avg_quiz_score < 50.0, "avgQuizScore", -0.3, "Low quiz scores"),
        (f.attendance < 60.0, "attendance", -0.25, "Poor attendance"),
        (f.engagement_score < 40.0, "engagementScore", -0.2, "Low engagement"),
        (
            f.consecutive_absences >= 3,
            "consecutiveAbsences",
            -0.15,
            "Multiple consecutive absences",
        ),
        (
            f.assignment_completion < 50.0,
            "assignmentCompletion",
            -0.2,
            "Low assignment completion",
        ),
    ];

    let mut factors: Vec<ContributingFactor> = checks
        .iter()
        .filter(|(triggered, ..)| *triggered)
        .take(MAX_FACTORS)
        .map(|(_, feature, impact, detail)| ContributingFactor {
            feature: feature.to_string(),
            impact: *impact,
            value: None,
            detail: detail.to_string(),
        })
        .collect();

    if factors.is_empty() {
        factors.push(ContributingFactor {
            feature: "overall".to_string(),
            impact: 0.0,
            value: None,
            detail: "No major risk factors identified".to_string(),
        });
    }
    factors
}

fn recommendations(level: RiskLevel) -> Vec<String> {
    let lines: &[&str] = match level {
        RiskLevel::High => &[
            "Schedule immediate one-on-one check-in with student",
            "Set up tutoring sessions for weak subjects",
            "Contact parent/guardian about academic concerns",
            "Create a structured study plan with daily goals",
        ],
        RiskLevel::Medium => &[
            "Monitor progress closely over next 2 weeks",
            "Encourage participation in study groups",
            "Assign additional practice exercises for weak areas",
        ],
        RiskLevel::Low => &[
            "Continue current learning approach",
            "Challenge with advanced material when ready",
        ],
    };
    lines.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::tests::features;

    #[test]
    fn weighted_score_without_adjustments() {
        let f = features(80.0, 75.0, 90.0, 85.0);
        // 0.25*80 + 0.30*75 + 0.25*90 + 0.20*85
        assert!((rule_score(&f) - 82.0).abs() < 1e-9);
        let prediction = rule_based(&f);
        assert_eq!(prediction.risk_level, RiskLevel::Low);
        assert_eq!(prediction.confidence, 0.8);
        assert_eq!(prediction.model_used, ModelUsed::RuleBased);
        assert_eq!(prediction.contributing_factors.len(), 1);
        assert_eq!(prediction.contributing_factors[0].feature, "overall");
    }

    #[test]
    fn penalties_and_bonuses() {
        let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
        let mut f = features(60.0, 60.0, 60.0, 60.0);
        assert!(close(rule_score(&f), 60.0));

        f.consecutive_absences = 3;
        f.days_since_last_activity = 7;
        f.streak = 0;
        assert!(close(rule_score(&f), 35.0));

        f.consecutive_absences = 0;
        f.days_since_last_activity = 0;
        f.streak = 7;
        f.engagement_trend_7d = Some(2.0);
        assert!(close(rule_score(&f), 70.0));
    }

    #[test]
    fn score_is_clamped() {
        let mut f = features(0.0, 0.0, 0.0, 0.0);
        f.streak = 0;
        f.consecutive_absences = 5;
        assert_eq!(rule_score(&f), 0.0);

        let mut top = features(100.0, 100.0, 100.0, 100.0);
        top.streak = 10;
        top.engagement_trend_7d = Some(1.0);
        assert_eq!(rule_score(&top), 100.0);
    }

    #[test]
    fn tiers() {
        assert_eq!(tier(70.0).0, RiskLevel::Low);
        assert_eq!(tier(69.99).0, RiskLevel::Medium);
        assert_eq!(tier(45.0).0, RiskLevel::Medium);
        assert_eq!(tier(44.9).0, RiskLevel::High);
    }

    #[test]
    fn factors_keep_first_three_in_check_order() {
        let mut f = features(30.0, 40.0, 50.0, 40.0);
        f.consecutive_absences = 4;
        let prediction = rule_based(&f);
        let names: Vec<&str> = prediction
            .contributing_factors
            .iter()
            .map(|c| c.feature.as_str())
            .collect();
        assert_eq!(names, vec!["avgQuizScore", "attendance", "engagementScore"]);
        assert_eq!(prediction.risk_level, RiskLevel::High);
        assert_eq!(prediction.recommendations.len(), 4);
    }
}
