use crate::models::{normalize_children, MatchPreferences, ProfileAttributes, UserProfile};

/// Maximum points the preference-match bonus can add
pub const MAX_PREFERENCE_BONUS: f64 = 5.0;

/// Numeric preferences match within this fraction of the preferred value...
const NUMERIC_TOLERANCE_RATIO: f64 = 0.05;
/// ...or within this many units, whichever is larger
const NUMERIC_TOLERANCE_FLOOR: f64 = 2.0;

/// Running count of attempted and matched (preference, attribute) pairs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PreferenceTally {
    pub attempted: u32,
    pub matched: u32,
}

impl PreferenceTally {
    fn record(&mut self, matched: bool) {
        self.attempted += 1;
        if matched {
            self.matched += 1;
        }
    }

    /// Categorical ids: 0 is unset and does not count as an attempt
    fn categorical(&mut self, preferred: Option<u32>, actual: Option<u32>) {
        if let (Some(p), Some(a)) = (set_id(preferred), set_id(actual)) {
            self.record(p == a);
        }
    }

    fn numeric(&mut self, preferred: Option<u16>, actual: Option<u16>) {
        if let (Some(p), Some(a)) = (preferred.filter(|v| *v > 0), actual.filter(|v| *v > 0)) {
            let (p, a) = (f64::from(p), f64::from(a));
            let tolerance = (p * NUMERIC_TOLERANCE_RATIO).max(NUMERIC_TOLERANCE_FLOOR);
            self.record((a - p).abs() <= tolerance);
        }
    }

    fn children(&mut self, preferred: Option<&str>, actual: Option<&str>) {
        let preferred = preferred.and_then(normalize_children);
        let actual = actual.and_then(normalize_children);
        if let (Some(p), Some(a)) = (preferred, actual) {
            self.record(p == a);
        }
    }

    pub fn merge(self, other: PreferenceTally) -> Self {
        Self {
            attempted: self.attempted + other.attempted,
            matched: self.matched + other.matched,
        }
    }

    /// `(matched / attempted) * 5`, or 0 when nothing was comparable
    pub fn bonus(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        f64::from(self.matched) / f64::from(self.attempted) * MAX_PREFERENCE_BONUS
    }
}

/// Treat a zero categorical id as unset
#[inline]
pub(crate) fn set_id(value: Option<u32>) -> Option<u32> {
    value.filter(|id| *id != 0)
}

/// Compare one side's stated preferences against the other side's attributes
pub fn tally_preferences(prefs: &MatchPreferences, attrs: &ProfileAttributes) -> PreferenceTally {
    let mut tally = PreferenceTally::default();

    tally.categorical(prefs.preferred_religion_id, attrs.religion_id);
    tally.categorical(prefs.preferred_marital_status_id, attrs.marital_status_id);
    tally.children(
        prefs.preferred_children_status.as_deref(),
        attrs.children_status.as_deref(),
    );
    tally.categorical(prefs.preferred_relationship_type_id, attrs.relationship_type_id);
    tally.categorical(prefs.preferred_smoking_id, attrs.smoking_id);
    tally.categorical(prefs.preferred_drinking_id, attrs.drinking_id);
    tally.categorical(prefs.preferred_exercise_id, attrs.exercise_id);
    tally.categorical(prefs.preferred_living_situation_id, attrs.living_situation_id);
    tally.categorical(prefs.preferred_lifestyle_id, attrs.lifestyle_id);
    tally.categorical(prefs.preferred_education_level, attrs.education_level);
    tally.categorical(prefs.preferred_occupation_id, attrs.occupation_id);
    tally.categorical(prefs.preferred_body_type_id, attrs.body_type_id);
    tally.categorical(prefs.preferred_ethnicity_id, attrs.ethnicity_id);
    tally.categorical(prefs.preferred_eye_color_id, attrs.eye_color_id);
    tally.categorical(prefs.preferred_hair_color_id, attrs.hair_color_id);
    tally.categorical(prefs.preferred_language_id, attrs.language_id);
    tally.numeric(prefs.preferred_height_cm, attrs.height_cm);
    tally.numeric(prefs.preferred_weight_kg, attrs.weight_kg);

    tally
}

/// Bidirectional preference-match bonus in `[0, 5]`
///
/// NOTE: this compares one user's stated preferences directly against the
/// other user's raw attributes. Whether users consent to their attributes
/// being matched this way is an open product/privacy decision.
pub fn preference_match_bonus(requester: &UserProfile, candidate: &UserProfile) -> f64 {
    tally_preferences(&requester.preferences, &candidate.attributes)
        .merge(tally_preferences(&candidate.preferences, &requester.attributes))
        .bonus()
}
