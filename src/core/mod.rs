// Core algorithm exports
pub mod badge;
pub mod distance;
pub mod filters;
pub mod matcher;
pub mod preference_match;
pub mod scoring;

pub use badge::badge_for_score;
pub use distance::{distance_km, haversine_distance};
pub use filters::{exclusion_reason, is_eligible, rank_order, EligibilityFilter, EligibleCandidates};
pub use matcher::{MatchError, MatchListing, MatchRanker};
pub use scoring::{max_score_for_pair, CompatibilityScorer, ScoreBreakdown, ScoringError};
