// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    normalize_children, normalize_gender, Badge, CandidateRecord, CompatibilityScore,
    ContactRestrictions, MatchCandidate, MatchPreferences, PageRequest, Pagination,
    ProfileAttributes, ScoringWeights, UserProfile,
};
pub use requests::{ListMatchesRequest, MinScoreRequest, UnmatchRequest};
pub use responses::{CandidateView, ErrorResponse, HealthResponse, ListMatchesResponse, SuccessResponse};
