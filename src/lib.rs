//! Compat Match - compatibility scoring and candidate ranking for a relationship-matching platform
//!
//! This library selects eligible candidates for a requesting user, scores each
//! pair with a multi-factor compatibility model, caches scores in a fast and a
//! durable tier, and returns ranked, paginated listings.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{badge_for_score, distance_km, CompatibilityScorer, EligibilityFilter, MatchError, MatchListing, MatchRanker};
pub use models::{Badge, CandidateRecord, CompatibilityScore, MatchCandidate, ScoringWeights, UserProfile};
pub use services::{ProfileRepository, ScoreCache};
