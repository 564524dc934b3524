use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::MatchingConfig;
use crate::core::badge::badge_for_score;
use crate::core::filters::{rank_order, EligibilityFilter};
use crate::core::scoring::max_score_for_pair;
use crate::models::{CompatibilityScore, MatchCandidate, Pagination, UserProfile};
use crate::services::cache::ScoreCache;
use crate::services::repository::{ProfileRepository, RepositoryError};

/// Errors surfaced to callers of the ranker
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MatchError {
    pub fn status_code(&self) -> u16 {
        match self {
            MatchError::InvalidInput(_) => 400,
            MatchError::NotFound(_) => 404,
            MatchError::DependencyUnavailable(_) => 503,
            MatchError::Internal(_) => 500,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::DependencyUnavailable(_))
    }

    /// The caller sent something wrong; nothing on our side needs attention
    pub fn is_client_error(&self) -> bool {
        matches!(self, MatchError::InvalidInput(_) | MatchError::NotFound(_))
    }
}

impl From<RepositoryError> for MatchError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => MatchError::NotFound(msg),
            RepositoryError::Unavailable(msg) => MatchError::DependencyUnavailable(msg),
            RepositoryError::InvalidData(msg) => MatchError::Internal(msg),
        }
    }
}

/// Result of one listing request
#[derive(Debug, Clone)]
pub struct MatchListing {
    pub candidates: Vec<MatchCandidate>,
    pub min_score_preference: Option<u8>,
    pub pagination: Pagination,
}

/// Main matching orchestrator
///
/// # Pipeline Stages
/// 1. Load the requester and the candidate pool from the repository
/// 2. Eligibility rules, ordering and pagination
/// 3. Cache-aware scoring of the page, one future per candidate
/// 4. Like bonus and badge
/// 5. Final ordering on the resolved scores
#[derive(Clone)]
pub struct MatchRanker {
    repository: Arc<dyn ProfileRepository>,
    cache: Arc<ScoreCache>,
    filter: EligibilityFilter,
    config: MatchingConfig,
}

impl MatchRanker {
    pub fn new(
        repository: Arc<dyn ProfileRepository>,
        cache: Arc<ScoreCache>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            repository,
            cache,
            filter: EligibilityFilter::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    /// Run a repository call under the configured timeout
    async fn with_timeout<T>(
        &self,
        what: &str,
        op: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, MatchError> {
        match tokio::time::timeout(self.config.repository_timeout, op).await {
            Ok(result) => result.map_err(MatchError::from),
            Err(_) => Err(MatchError::DependencyUnavailable(format!(
                "{} timed out after {:?}",
                what, self.config.repository_timeout
            ))),
        }
    }

    /// Find, score and rank one page of candidates for a user
    ///
    /// # Arguments
    /// * `requester_id` - The user asking for matches
    /// * `page` - 1-based page number
    /// * `page_size` - Requested page size; clamped to the configured bounds
    pub async fn list_matches(
        &self,
        requester_id: &str,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<MatchListing, MatchError> {
        self.list_matches_at(requester_id, page, page_size, Utc::now()).await
    }

    /// `list_matches` with an explicit clock for the online window
    pub async fn list_matches_at(
        &self,
        requester_id: &str,
        page: u32,
        page_size: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<MatchListing, MatchError> {
        let requester_id = requester_id.trim();
        if requester_id.is_empty() {
            return Err(MatchError::InvalidInput("userId must not be empty".to_string()));
        }
        if page == 0 {
            return Err(MatchError::InvalidInput("page starts at 1".to_string()));
        }

        let requester = self
            .with_timeout("profile lookup", self.repository.get_profile(requester_id))
            .await?;
        let pool = self
            .with_timeout("candidate pool query", self.repository.query_candidate_pool(&requester))
            .await?;

        let page_request = self.filter.page_request(page, page_size);
        let eligible = self.filter.find_candidates(&requester, pool, page_request, now);
        let has_more = eligible.has_more();
        let total = eligible.total;

        let mut candidates = join_all(
            eligible
                .candidates
                .into_iter()
                .map(|candidate| self.resolve(&requester, candidate, now)),
        )
        .await;

        // completion order is irrelevant; re-sort on the resolved scores
        candidates.sort_by(rank_order);

        let min_score_preference = match self
            .with_timeout("min score lookup", self.repository.get_min_score(requester_id))
            .await
        {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to load min score preference for {}: {}", requester_id, e);
                None
            }
        };

        tracing::info!(
            "Returning {} matches for user {} (page {}, {} eligible)",
            candidates.len(),
            requester_id,
            page_request.page,
            total
        );

        Ok(MatchListing {
            candidates,
            min_score_preference,
            pagination: Pagination {
                page: page_request.page,
                page_size: page_request.page_size,
                total_candidates: total,
                has_more,
            },
        })
    }

    /// Attach score and badge to one candidate
    async fn resolve(
        &self,
        requester: &UserProfile,
        mut candidate: MatchCandidate,
        now: DateTime<Utc>,
    ) -> MatchCandidate {
        let base = match self.cache.get_or_compute(requester, &candidate.profile).await {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(
                    "Scoring {} for {} failed, using fallback {}: {}",
                    candidate.profile.user_id,
                    requester.user_id,
                    self.config.fallback_score,
                    e
                );
                self.config.fallback_score
            }
        };

        let score = self.apply_like_bonus(requester, &candidate, base);

        candidate.badge = Some(badge_for_score(score));
        candidate.compatibility = Some(CompatibilityScore {
            requester_id: requester.user_id.clone(),
            target_id: candidate.profile.user_id.clone(),
            score,
            computed_at: now,
        });
        candidate
    }

    /// Mutual like wins over a one-way like; the result never exceeds the pair's cap
    pub fn apply_like_bonus(&self, requester: &UserProfile, candidate: &MatchCandidate, score: u8) -> u8 {
        let bonus = if candidate.is_mutual_like {
            self.config.mutual_like_bonus
        } else if candidate.liked_by_candidate || candidate.requester_liked_candidate {
            self.config.one_way_like_bonus
        } else {
            0
        };

        let cap = max_score_for_pair(requester, &candidate.profile);
        score.saturating_add(bonus).min(cap)
    }

    /// Remove the match and like rows between two users
    pub async fn unmatch(&self, requester_id: &str, other_id: &str) -> Result<bool, MatchError> {
        let (requester_id, other_id) = (requester_id.trim(), other_id.trim());
        if requester_id.is_empty() || other_id.is_empty() {
            return Err(MatchError::InvalidInput("user ids must not be empty".to_string()));
        }
        if requester_id == other_id {
            return Err(MatchError::InvalidInput("cannot unmatch yourself".to_string()));
        }

        let removed = self
            .with_timeout("unmatch", self.repository.remove_match(requester_id, other_id))
            .await?;

        tracing::info!("Unmatch {} / {}: removed={}", requester_id, other_id, removed);
        Ok(removed)
    }

    /// Persist the UI minimum-score threshold; it is returned with listings, never enforced
    pub async fn save_min_score_preference(&self, user_id: &str, value: u8) -> Result<(), MatchError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(MatchError::InvalidInput("userId must not be empty".to_string()));
        }
        if !(1..=100).contains(&value) {
            return Err(MatchError::InvalidInput(format!(
                "minScore must be between 1 and 100, got {}",
                value
            )));
        }

        self.with_timeout("save min score", self.repository.save_min_score(user_id, value))
            .await
    }

    pub async fn health_check(&self) -> bool {
        let check = self.repository.health_check();
        tokio::time::timeout(self.config.repository_timeout.min(Duration::from_secs(2)), check)
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scoring::CompatibilityScorer;
    use crate::models::CandidateRecord;
    use crate::services::cache::{InMemoryScoreStore, MokaScoreTier};
    use crate::services::repository::InMemoryRepository;
    use async_trait::async_trait;

    fn create_test_profile(id: &str, gender: &str, country: &str, age: u8) -> UserProfile {
        UserProfile {
            user_id: id.to_string(),
            display_name: Some(format!("User {}", id)),
            age: Some(age),
            gender: Some(gender.to_string()),
            country: Some(country.to_string()),
            photo_count: 1,
            interest_ids: [1, 2, 3].into_iter().collect(),
            ..Default::default()
        }
    }

    fn ranker_with(repo: Arc<dyn ProfileRepository>) -> MatchRanker {
        let cache = ScoreCache::new(
            Arc::new(MokaScoreTier::new(1_000, Duration::from_secs(60))),
            Arc::new(InMemoryScoreStore::new()),
            CompatibilityScorer::default(),
            Duration::from_millis(100),
        );
        MatchRanker::new(repo, Arc::new(cache), MatchingConfig::default())
    }

    fn seeded() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.insert_profile(create_test_profile("me", "male", "DE", 30));
        for i in 0..5 {
            repo.insert_profile(create_test_profile(&format!("c{}", i), "female", "DE", 28 + i));
        }
        repo
    }

    struct DownRepository;

    #[async_trait]
    impl ProfileRepository for DownRepository {
        async fn get_profile(&self, _: &str) -> Result<UserProfile, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }

        async fn query_candidate_pool(&self, _: &UserProfile) -> Result<Vec<CandidateRecord>, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }

        async fn remove_match(&self, _: &str, _: &str) -> Result<bool, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }

        async fn save_min_score(&self, _: &str, _: u8) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }

        async fn get_min_score(&self, _: &str) -> Result<Option<u8>, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_list_matches_scores_and_badges_every_candidate() {
        let ranker = ranker_with(Arc::new(seeded()));
        let listing = ranker.list_matches("me", 1, Some(10)).await.unwrap();

        assert_eq!(listing.candidates.len(), 5);
        assert_eq!(listing.pagination.total_candidates, 5);
        assert!(!listing.pagination.has_more);
        for candidate in &listing.candidates {
            let score = candidate.compatibility.as_ref().unwrap().score;
            assert!(score <= 95);
            assert_eq!(candidate.badge, Some(badge_for_score(score)));
        }
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_before_repository() {
        let ranker = ranker_with(Arc::new(DownRepository));

        assert!(matches!(ranker.list_matches("  ", 1, None).await, Err(MatchError::InvalidInput(_))));
        assert!(matches!(ranker.list_matches("me", 0, None).await, Err(MatchError::InvalidInput(_))));
        assert!(matches!(ranker.unmatch("me", "me").await, Err(MatchError::InvalidInput(_))));
        assert!(matches!(
            ranker.save_min_score_preference("me", 0).await,
            Err(MatchError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_repository_failure_is_retryable() {
        let ranker = ranker_with(Arc::new(DownRepository));
        let err = ranker.list_matches("me", 1, None).await.unwrap_err();

        assert!(matches!(err, MatchError::DependencyUnavailable(_)));
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 503);
    }

    struct CorruptRepository;

    #[async_trait]
    impl ProfileRepository for CorruptRepository {
        async fn get_profile(&self, user_id: &str) -> Result<UserProfile, RepositoryError> {
            Err(RepositoryError::InvalidData(format!("attributes of {} do not decode", user_id)))
        }

        async fn query_candidate_pool(&self, _: &UserProfile) -> Result<Vec<CandidateRecord>, RepositoryError> {
            Ok(vec![])
        }

        async fn remove_match(&self, _: &str, _: &str) -> Result<bool, RepositoryError> {
            Ok(false)
        }

        async fn save_min_score(&self, _: &str, _: u8) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn get_min_score(&self, _: &str) -> Result<Option<u8>, RepositoryError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_undecodable_requester_is_not_retryable() {
        let ranker = ranker_with(Arc::new(CorruptRepository));
        let err = ranker.list_matches("me", 1, None).await.unwrap_err();

        assert!(matches!(err, MatchError::Internal(_)));
        assert!(!err.is_retryable());
        assert!(!err.is_client_error());
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_unknown_requester_not_found() {
        let ranker = ranker_with(Arc::new(seeded()));
        let err = ranker.list_matches("ghost", 1, None).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_malformed_candidate_gets_fallback_score() {
        let repo = seeded();
        let mut broken = create_test_profile("broken", "female", "DE", 30);
        broken.age = Some(200);
        repo.insert_profile(broken);

        let ranker = ranker_with(Arc::new(repo));
        let listing = ranker.list_matches("me", 1, Some(10)).await.unwrap();

        assert_eq!(listing.candidates.len(), 6);
        let broken = listing
            .candidates
            .iter()
            .find(|c| c.profile.user_id == "broken")
            .unwrap();
        assert_eq!(broken.compatibility.as_ref().unwrap().score, 25);
        assert_eq!(broken.badge.unwrap().label, "Low");
    }

    #[tokio::test]
    async fn test_like_bonus_is_applied_once_and_capped() {
        let ranker = ranker_with(Arc::new(InMemoryRepository::new()));
        let requester = create_test_profile("me", "male", "DE", 30);
        let candidate = MatchCandidate {
            profile: create_test_profile("c", "female", "DE", 30),
            liked_by_candidate: true,
            requester_liked_candidate: true,
            is_mutual_like: true,
            is_online: false,
            distance_km: None,
            cached_score: None,
            last_activity_at: None,
            compatibility: None,
            badge: None,
        };

        assert_eq!(ranker.apply_like_bonus(&requester, &candidate, 50), 56);
        assert_eq!(ranker.apply_like_bonus(&requester, &candidate, 93), 95);

        let one_way = MatchCandidate {
            requester_liked_candidate: false,
            is_mutual_like: false,
            ..candidate.clone()
        };
        assert_eq!(ranker.apply_like_bonus(&requester, &one_way, 50), 52);

        let mut abroad = one_way.clone();
        abroad.profile.country = Some("FR".to_string());
        assert_eq!(ranker.apply_like_bonus(&requester, &abroad, 91), 92);
    }

    #[tokio::test]
    async fn test_mutual_like_ranks_first() {
        let repo = seeded();
        let now = Utc::now();
        repo.like("c3", "me", now);
        repo.like("me", "c3", now);

        let ranker = ranker_with(Arc::new(repo));
        let listing = ranker.list_matches("me", 1, Some(10)).await.unwrap();

        assert_eq!(listing.candidates[0].profile.user_id, "c3");
        assert!(listing.candidates[0].is_mutual_like);
    }

    #[tokio::test]
    async fn test_min_score_preference_round_trips_as_metadata() {
        let repo = Arc::new(seeded());
        let ranker = ranker_with(repo);

        ranker.save_min_score_preference("me", 99).await.unwrap();
        let listing = ranker.list_matches("me", 1, Some(10)).await.unwrap();

        assert_eq!(listing.min_score_preference, Some(99));
        // advisory only: low scorers are still listed
        assert_eq!(listing.candidates.len(), 5);
    }

    #[tokio::test]
    async fn test_unmatch_removes_rows() {
        let repo = seeded();
        let now = Utc::now();
        repo.add_match("me", "c1", now);
        repo.like("me", "c1", now);

        let ranker = ranker_with(Arc::new(repo));
        let before = ranker.list_matches("me", 1, Some(10)).await.unwrap();
        assert!(before.candidates.iter().all(|c| c.profile.user_id != "c1"));

        assert!(ranker.unmatch("me", "c1").await.unwrap());
        let after = ranker.list_matches("me", 1, Some(10)).await.unwrap();
        assert!(after.candidates.iter().any(|c| c.profile.user_id == "c1"));
    }
}
