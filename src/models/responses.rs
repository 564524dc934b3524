use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use crate::models::domain::{Badge, MatchCandidate, Pagination};

/// Public view of a ranked candidate; preferences and contact rules stay private
#[derive(Debug, Clone, Serialize)]
pub struct CandidateView {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "distanceKm")]
    pub distance_km: Option<f64>,
    #[serde(rename = "isOnline")]
    pub is_online: bool,
    #[serde(rename = "likedByCandidate")]
    pub liked_by_candidate: bool,
    #[serde(rename = "requesterLikedCandidate")]
    pub requester_liked_candidate: bool,
    #[serde(rename = "isMutualLike")]
    pub is_mutual_like: bool,
    #[serde(rename = "interestIds")]
    pub interest_ids: BTreeSet<u32>,
    pub score: Option<u8>,
    pub badge: Option<Badge>,
}

impl From<MatchCandidate> for CandidateView {
    fn from(candidate: MatchCandidate) -> Self {
        Self {
            score: candidate.compatibility.as_ref().map(|c| c.score),
            user_id: candidate.profile.user_id,
            display_name: candidate.profile.display_name,
            age: candidate.profile.age,
            gender: candidate.profile.gender,
            country: candidate.profile.country,
            distance_km: candidate.distance_km,
            is_online: candidate.is_online,
            liked_by_candidate: candidate.liked_by_candidate,
            requester_liked_candidate: candidate.requester_liked_candidate,
            is_mutual_like: candidate.is_mutual_like,
            interest_ids: candidate.profile.interest_ids,
            badge: candidate.badge,
        }
    }
}

/// Response for the list matches endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ListMatchesResponse {
    pub candidates: Vec<CandidateView>,
    /// Saved UI threshold, returned for the caller to apply; not enforced server-side
    #[serde(rename = "minScorePreference")]
    pub min_score_preference: Option<u8>,
    pub pagination: Pagination,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
    #[serde(default)]
    pub retryable: bool,
}

/// Unmatch / preference update response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}
