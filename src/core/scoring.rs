use crate::core::distance::distance_km;
use crate::core::preference_match::{preference_match_bonus, set_id};
use crate::models::{normalize_children, ScoringWeights, UserProfile};
use std::collections::BTreeSet;
use thiserror::Error;

/// Highest score a pair sharing a country can reach
pub const MAX_SCORE_SAME_COUNTRY: u8 = 95;
/// Highest score for a cross-country pair
pub const MAX_SCORE_OTHER_COUNTRY: u8 = 92;
/// Floor applied once either side has scoreable data
pub const DATA_FLOOR: f64 = 30.0;

const NEUTRAL: f64 = 0.5;
const INTEREST_STUFFING_THRESHOLD: usize = 10;
const INTEREST_STUFFING_DAMPENING: f64 = 0.85;
const AGE_WINDOW_YEARS: f64 = 15.0;
const AGE_CONTRIBUTION_POINTS: f64 = 5.0;
const PERFECT_MATCH_THRESHOLD: usize = 8;
const PERFECT_MATCH_BONUS_SAME_COUNTRY: f64 = 7.0;
const PERFECT_MATCH_BONUS_OTHER_COUNTRY: f64 = 4.0;
const COUNTRY_BONUS: f64 = 3.0;
const MAX_PLAUSIBLE_AGE: u8 = 120;

/// Errors raised when a profile cannot be scored
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Malformed profile {user_id}: {reason}")]
    MalformedProfile { user_id: String, reason: String },
}

/// Individual components of a score, before rounding and clamping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub values: f64,
    pub intent: f64,
    pub lifestyle: f64,
    pub personality: f64,
    pub interests: f64,
    pub preference_bonus: f64,
    pub age_contribution: f64,
    pub distance_modifier: f64,
    pub perfect_match_bonus: f64,
    pub country_modifier: f64,
    pub has_data: bool,
    pub max_score: u8,
}

/// Mean of the checks that could actually be made
#[derive(Debug, Default)]
struct Checks {
    sum: f64,
    count: u32,
}

impl Checks {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// 1.0 on equality, `partial` otherwise; skipped unless both sides are set
    fn exact(&mut self, a: Option<u32>, b: Option<u32>, partial: f64) {
        if let (Some(a), Some(b)) = (set_id(a), set_id(b)) {
            self.push(if a == b { 1.0 } else { partial });
        }
    }

    fn mean_or_neutral(&self) -> f64 {
        if self.count == 0 {
            NEUTRAL
        } else {
            self.sum / f64::from(self.count)
        }
    }
}

/// Directional multi-factor compatibility scorer
#[derive(Debug, Clone, Copy)]
pub struct CompatibilityScorer {
    weights: ScoringWeights,
}

impl CompatibilityScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: ScoringWeights::default(),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score `candidate` from `requester`'s point of view, in `[0, 95]`
    pub fn score(&self, requester: &UserProfile, candidate: &UserProfile) -> Result<u8, ScoringError> {
        let breakdown = self.breakdown(requester, candidate)?;
        Ok(self.combine(&breakdown))
    }

    /// Compute every component without combining them
    pub fn breakdown(
        &self,
        requester: &UserProfile,
        candidate: &UserProfile,
    ) -> Result<ScoreBreakdown, ScoringError> {
        validate(requester)?;
        validate(candidate)?;

        let same_country = requester.shares_country_with(candidate);

        Ok(ScoreBreakdown {
            values: values_score(requester, candidate),
            intent: intent_score(requester, candidate),
            lifestyle: lifestyle_score(requester, candidate),
            personality: personality_score(requester, candidate),
            interests: interests_score(&requester.interest_ids, &candidate.interest_ids),
            preference_bonus: preference_match_bonus(requester, candidate),
            age_contribution: age_contribution(requester, candidate),
            distance_modifier: distance_km(
                requester.latitude,
                requester.longitude,
                candidate.latitude,
                candidate.longitude,
            )
            .map(distance_modifier)
            .unwrap_or(0.0),
            perfect_match_bonus: perfect_match_bonus(requester, candidate, same_country),
            country_modifier: if same_country { COUNTRY_BONUS } else { 0.0 },
            has_data: has_data(requester) || has_data(candidate),
            max_score: max_score_for_pair(requester, candidate),
        })
    }

    /// Weighted sum, floor/ceiling clamp, then the country modifier
    fn combine(&self, b: &ScoreBreakdown) -> u8 {
        let w = &self.weights;
        let total = b.values * w.values
            + b.intent * w.intent
            + b.lifestyle * w.lifestyle
            + b.personality * w.personality
            + b.interests * w.interests
            + b.preference_bonus
            + b.age_contribution
            + b.distance_modifier;

        let max = f64::from(b.max_score);
        let floor = if b.has_data { DATA_FLOOR } else { 0.0 };

        // clamp before the country modifier so it stays visible at the floor
        let clamped = (total + b.perfect_match_bonus).round().clamp(floor, max);
        (clamped + b.country_modifier).min(max) as u8
    }
}

impl Default for CompatibilityScorer {
    fn default() -> Self {
        Self::with_default_weights()
    }
}

/// 95 when both users share a country, otherwise 92
pub fn max_score_for_pair(requester: &UserProfile, candidate: &UserProfile) -> u8 {
    if requester.shares_country_with(candidate) {
        MAX_SCORE_SAME_COUNTRY
    } else {
        MAX_SCORE_OTHER_COUNTRY
    }
}

fn validate(profile: &UserProfile) -> Result<(), ScoringError> {
    let malformed = |reason: String| ScoringError::MalformedProfile {
        user_id: profile.user_id.clone(),
        reason,
    };

    if profile.user_id.trim().is_empty() {
        return Err(malformed("empty user id".to_string()));
    }
    if let Some(age) = profile.age.filter(|age| *age > MAX_PLAUSIBLE_AGE) {
        return Err(malformed(format!("age {} out of range", age)));
    }
    if let (Some(min), Some(max)) = (profile.preferences.min_age, profile.preferences.max_age) {
        if min > max {
            return Err(malformed(format!("preferred age range {}..{} is inverted", min, max)));
        }
    }
    Ok(())
}

/// Shared ids divided by the larger set's size; `None` when both are empty
fn overlap_ratio(a: &BTreeSet<u32>, b: &BTreeSet<u32>) -> Option<f64> {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return None;
    }
    let shared = a.intersection(b).count();
    Some(shared as f64 / larger as f64)
}

pub fn interests_score(a: &BTreeSet<u32>, b: &BTreeSet<u32>) -> f64 {
    let Some(ratio) = overlap_ratio(a, b) else {
        return NEUTRAL;
    };

    if a.len() > INTEREST_STUFFING_THRESHOLD || b.len() > INTEREST_STUFFING_THRESHOLD {
        ratio * INTEREST_STUFFING_DAMPENING
    } else {
        ratio
    }
}

fn values_score(requester: &UserProfile, candidate: &UserProfile) -> f64 {
    let (a, b) = (&requester.attributes, &candidate.attributes);
    let mut checks = Checks::default();

    checks.exact(a.religion_id, b.religion_id, 0.3);

    let children_a = a.children_status.as_deref().and_then(normalize_children);
    let children_b = b.children_status.as_deref().and_then(normalize_children);
    if let (Some(x), Some(y)) = (children_a, children_b) {
        checks.push(if x == y { 1.0 } else { 0.5 });
    }

    checks.exact(a.marital_status_id, b.marital_status_id, 0.4);

    checks.mean_or_neutral()
}

fn intent_score(requester: &UserProfile, candidate: &UserProfile) -> f64 {
    match (
        set_id(requester.attributes.relationship_type_id),
        set_id(candidate.attributes.relationship_type_id),
    ) {
        (Some(a), Some(b)) if a == b => 1.0,
        (Some(_), Some(_)) => 0.2,
        (Some(_), None) | (None, Some(_)) => 0.5,
        (None, None) => 0.0,
    }
}

fn lifestyle_score(requester: &UserProfile, candidate: &UserProfile) -> f64 {
    let (a, b) = (&requester.attributes, &candidate.attributes);
    let mut checks = Checks::default();

    checks.exact(a.smoking_id, b.smoking_id, 0.3);
    checks.exact(a.drinking_id, b.drinking_id, 0.4);
    checks.exact(a.exercise_id, b.exercise_id, 0.5);
    checks.exact(a.living_situation_id, b.living_situation_id, 0.5);
    checks.exact(a.lifestyle_id, b.lifestyle_id, 0.4);

    checks.mean_or_neutral()
}

fn personality_score(requester: &UserProfile, candidate: &UserProfile) -> f64 {
    let (a, b) = (&requester.attributes, &candidate.attributes);
    let mut checks = Checks::default();

    if let (Some(x), Some(y)) = (set_id(a.education_level), set_id(b.education_level)) {
        let diff = f64::from(x.abs_diff(y));
        checks.push(if diff == 0.0 { 1.0 } else { (1.0 - 0.2 * diff).max(0.0) });
    }

    checks.exact(a.occupation_id, b.occupation_id, 0.3);

    if let Some(ratio) = overlap_ratio(&requester.hobby_ids, &candidate.hobby_ids) {
        checks.push(ratio);
    }

    checks.mean_or_neutral()
}

/// Age closeness in `[0, 15]`, halved when the candidate falls outside the range
///
/// Missing bounds are treated as open.
pub fn calculate_age_score(
    requester_age: u8,
    candidate_age: u8,
    preferred_min: Option<u8>,
    preferred_max: Option<u8>,
) -> f64 {
    let diff = f64::from(requester_age.abs_diff(candidate_age));
    let score = (AGE_WINDOW_YEARS - diff).max(0.0);

    let in_range = preferred_min.map_or(true, |min| candidate_age >= min)
        && preferred_max.map_or(true, |max| candidate_age <= max);

    if in_range {
        score
    } else {
        score / 2.0
    }
}

/// Points for an age gap when the requester has no explicit range
pub fn age_band_points(age_diff: u8) -> f64 {
    match age_diff {
        0..=2 => 2.0,
        3..=5 => 1.0,
        6..=9 => 0.0,
        10..=14 => -2.0,
        _ => -5.0,
    }
}

fn age_contribution(requester: &UserProfile, candidate: &UserProfile) -> f64 {
    let (Some(requester_age), Some(candidate_age)) = (requester.age, candidate.age) else {
        return 0.0;
    };

    let prefs = &requester.preferences;
    if prefs.has_age_range() {
        let score = calculate_age_score(requester_age, candidate_age, prefs.min_age, prefs.max_age);
        score / AGE_WINDOW_YEARS * AGE_CONTRIBUTION_POINTS
    } else {
        age_band_points(requester_age.abs_diff(candidate_age))
    }
}

/// Closer is better; very long distances cost points
pub fn distance_modifier(distance_km: f64) -> f64 {
    if distance_km <= 10.0 {
        3.0
    } else if distance_km <= 50.0 {
        2.0
    } else if distance_km <= 200.0 {
        1.0
    } else if distance_km <= 1000.0 {
        0.0
    } else if distance_km <= 5000.0 {
        -2.0
    } else {
        -4.0
    }
}

/// Count of exact matches over the nine core attributes
pub fn perfect_match_count(requester: &UserProfile, candidate: &UserProfile) -> usize {
    let (a, b) = (&requester.attributes, &candidate.attributes);
    [
        (a.religion_id, b.religion_id),
        (a.marital_status_id, b.marital_status_id),
        (a.relationship_type_id, b.relationship_type_id),
        (a.smoking_id, b.smoking_id),
        (a.drinking_id, b.drinking_id),
        (a.exercise_id, b.exercise_id),
        (a.lifestyle_id, b.lifestyle_id),
        (a.education_level, b.education_level),
        (a.occupation_id, b.occupation_id),
    ]
    .into_iter()
    .filter(|(x, y)| matches!((set_id(*x), set_id(*y)), (Some(x), Some(y)) if x == y))
    .count()
}

fn perfect_match_bonus(requester: &UserProfile, candidate: &UserProfile, same_country: bool) -> f64 {
    if perfect_match_count(requester, candidate) < PERFECT_MATCH_THRESHOLD {
        return 0.0;
    }
    if same_country {
        PERFECT_MATCH_BONUS_SAME_COUNTRY
    } else {
        PERFECT_MATCH_BONUS_OTHER_COUNTRY
    }
}

/// Whether a profile carries anything the weighted sub-scores can use
fn has_data(profile: &UserProfile) -> bool {
    let attrs = &profile.attributes;
    !profile.interest_ids.is_empty()
        || !profile.hobby_ids.is_empty()
        || set_id(attrs.religion_id).is_some()
        || set_id(attrs.marital_status_id).is_some()
        || set_id(attrs.relationship_type_id).is_some()
        || set_id(attrs.lifestyle_id).is_some()
        || set_id(attrs.education_level).is_some()
        || set_id(attrs.occupation_id).is_some()
}
