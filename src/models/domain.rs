use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Read-only snapshot of a user as supplied by the profile repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(rename = "isBanned", default)]
    pub is_banned: bool,
    #[serde(rename = "photoCount", default)]
    pub photo_count: u32,
    #[serde(rename = "lastActiveAt", default)]
    pub last_active_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attributes: ProfileAttributes,
    #[serde(default)]
    pub preferences: MatchPreferences,
    #[serde(rename = "contactRestrictions", default)]
    pub contact_restrictions: ContactRestrictions,
    #[serde(rename = "interestIds", default)]
    pub interest_ids: BTreeSet<u32>,
    #[serde(rename = "hobbyIds", default)]
    pub hobby_ids: BTreeSet<u32>,
}

impl UserProfile {
    /// Gender with the short aliases ("m", "f") expanded
    pub fn normalized_gender(&self) -> Option<String> {
        self.gender.as_deref().and_then(normalize_gender)
    }

    /// True when both users carry the same (case-insensitive) country
    pub fn shares_country_with(&self, other: &UserProfile) -> bool {
        match (self.country.as_deref(), other.country.as_deref()) {
            (Some(a), Some(b)) => {
                let (a, b) = (a.trim(), b.trim());
                !a.is_empty() && a.eq_ignore_ascii_case(b)
            }
            _ => false,
        }
    }

    pub fn has_display_name(&self) -> bool {
        self.display_name
            .as_deref()
            .map(|name| !name.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Lowercase and expand gender aliases; empty values count as unset
pub fn normalize_gender(raw: &str) -> Option<String> {
    let value = raw.trim().to_lowercase();
    match value.as_str() {
        "" => None,
        "m" => Some("male".to_string()),
        "f" => Some("female".to_string()),
        _ => Some(value),
    }
}

/// Collapse the free-text children status into has/has-not
pub fn normalize_children(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "yes" | "true" | "1" | "has_children" | "has children" | "have_children" | "have kids"
        | "has kids" => Some(true),
        "no" | "false" | "0" | "none" | "no_children" | "no children" | "no kids" => Some(false),
        _ => None,
    }
}

/// Self-described attributes; every field is optional and categorical ids use 0 as unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileAttributes {
    pub religion_id: Option<u32>,
    pub marital_status_id: Option<u32>,
    pub children_status: Option<String>,
    pub relationship_type_id: Option<u32>,
    pub smoking_id: Option<u32>,
    pub drinking_id: Option<u32>,
    pub exercise_id: Option<u32>,
    pub living_situation_id: Option<u32>,
    pub lifestyle_id: Option<u32>,
    pub education_level: Option<u32>,
    pub occupation_id: Option<u32>,
    pub body_type_id: Option<u32>,
    pub ethnicity_id: Option<u32>,
    pub eye_color_id: Option<u32>,
    pub hair_color_id: Option<u32>,
    pub language_id: Option<u32>,
    pub height_cm: Option<u16>,
    pub weight_kg: Option<u16>,
}

/// What a user is looking for; mirrors `ProfileAttributes` plus hard filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchPreferences {
    pub min_age: Option<u8>,
    pub max_age: Option<u8>,
    pub preferred_gender: Option<String>,
    pub preferred_countries: Vec<String>,
    pub preferred_religion_id: Option<u32>,
    pub preferred_marital_status_id: Option<u32>,
    pub preferred_children_status: Option<String>,
    pub preferred_relationship_type_id: Option<u32>,
    pub preferred_smoking_id: Option<u32>,
    pub preferred_drinking_id: Option<u32>,
    pub preferred_exercise_id: Option<u32>,
    pub preferred_living_situation_id: Option<u32>,
    pub preferred_lifestyle_id: Option<u32>,
    pub preferred_education_level: Option<u32>,
    pub preferred_occupation_id: Option<u32>,
    pub preferred_body_type_id: Option<u32>,
    pub preferred_ethnicity_id: Option<u32>,
    pub preferred_eye_color_id: Option<u32>,
    pub preferred_hair_color_id: Option<u32>,
    pub preferred_language_id: Option<u32>,
    pub preferred_height_cm: Option<u16>,
    pub preferred_weight_kg: Option<u16>,
}

impl MatchPreferences {
    /// An explicit age range exists when either bound is set
    pub fn has_age_range(&self) -> bool {
        self.min_age.is_some() || self.max_age.is_some()
    }
}

/// Restrictions a user places on who may contact them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactRestrictions {
    pub min_age: Option<u8>,
    pub max_age: Option<u8>,
    pub allowed_countries: Vec<String>,
    pub all_countries: bool,
    pub require_photo: bool,
    pub no_same_gender: bool,
}

/// Directional compatibility score; `score(a, b)` may differ from `score(b, a)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityScore {
    #[serde(rename = "requesterId")]
    pub requester_id: String,
    #[serde(rename = "targetId")]
    pub target_id: String,
    pub score: u8,
    #[serde(rename = "computedAt")]
    pub computed_at: DateTime<Utc>,
}

/// Human-readable tier derived from a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub label: &'static str,
    pub tier: u8,
    pub color: &'static str,
}

/// One row of the candidate pool: a profile plus its relationship to the requester
#[derive(Debug, Clone, Default)]
pub struct CandidateRecord {
    pub profile: UserProfile,
    /// A block row exists in either direction
    pub blocked: bool,
    /// A non-deleted, non-like message was exchanged
    pub in_contact: bool,
    /// An active match row exists
    pub matched: bool,
    pub liked_requester_at: Option<DateTime<Utc>>,
    pub requester_liked_at: Option<DateTime<Utc>>,
    pub matched_at: Option<DateTime<Utc>>,
    /// Durable-tier score for (requester, candidate), if one was stored
    pub cached_score: Option<u8>,
}

impl CandidateRecord {
    /// Most recent of match, like and join dates
    pub fn last_activity_date(&self) -> Option<DateTime<Utc>> {
        [
            self.matched_at,
            self.liked_requester_at,
            self.requester_liked_at,
            self.profile.created_at,
        ]
        .into_iter()
        .flatten()
        .max()
    }
}

/// Per-request candidate, discarded after the response is built
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub profile: UserProfile,
    pub liked_by_candidate: bool,
    pub requester_liked_candidate: bool,
    pub is_mutual_like: bool,
    pub is_online: bool,
    pub distance_km: Option<f64>,
    pub cached_score: Option<u8>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub compatibility: Option<CompatibilityScore>,
    pub badge: Option<Badge>,
}

impl MatchCandidate {
    /// Score used for ordering: resolved score first, durable-tier score otherwise
    pub fn sort_score(&self) -> Option<u8> {
        self.compatibility
            .as_ref()
            .map(|c| c.score)
            .or(self.cached_score)
    }
}

/// Page request after bounds have been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.page_size as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

/// Weights of the five weighted sub-scores, in points out of 100
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub values: f64,
    pub intent: f64,
    pub lifestyle: f64,
    pub personality: f64,
    pub interests: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            values: 32.0,
            intent: 18.0,
            lifestyle: 18.0,
            personality: 17.0,
            interests: 12.0,
        }
    }
}
