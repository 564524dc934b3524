use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

use crate::models::{CandidateRecord, UserProfile};
use crate::services::cache::InMemoryScoreStore;

/// Errors surfaced by a profile repository
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    /// Stored data that cannot be decoded; retrying will not help
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

/// Source of profiles and of the relationship data the eligibility rules need
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<UserProfile, RepositoryError>;

    /// Population minus the requester, with block/like/match/contact flags and
    /// any stored score for (requester, candidate)
    async fn query_candidate_pool(
        &self,
        requester: &UserProfile,
    ) -> Result<Vec<CandidateRecord>, RepositoryError>;

    /// Delete the match and like rows between two users
    async fn remove_match(&self, user_id: &str, other_id: &str) -> Result<bool, RepositoryError>;

    async fn save_min_score(&self, user_id: &str, min_score: u8) -> Result<(), RepositoryError>;

    async fn get_min_score(&self, user_id: &str) -> Result<Option<u8>, RepositoryError>;

    async fn health_check(&self) -> bool {
        true
    }
}

/// Unordered pair key for symmetric relations
fn pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[derive(Debug, Clone)]
struct MatchRow {
    matched_at: DateTime<Utc>,
    is_active: bool,
}

#[derive(Debug, Clone)]
struct MessageRow {
    sender_id: String,
    receiver_id: String,
    is_like: bool,
    deleted: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    profiles: HashMap<String, UserProfile>,
    /// (blocker, blocked)
    blocks: HashSet<(String, String)>,
    /// (liker, liked) -> liked at
    likes: HashMap<(String, String), DateTime<Utc>>,
    matches: HashMap<(String, String), MatchRow>,
    messages: Vec<MessageRow>,
    min_scores: HashMap<String, u8>,
}

/// In-process repository that evaluates the pool by scanning every profile
///
/// Suitable for tests, benchmarks and small single-node deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<RwLock<MemoryState>>,
    scores: Option<Arc<InMemoryScoreStore>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a durable score store so pool rows carry cached scores
    pub fn with_score_store(mut self, scores: Arc<InMemoryScoreStore>) -> Self {
        self.scores = Some(scores);
        self
    }

    fn write<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn read<R>(&self, f: impl FnOnce(&MemoryState) -> R) -> R {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    pub fn insert_profile(&self, profile: UserProfile) {
        self.write(|s| {
            s.profiles.insert(profile.user_id.clone(), profile);
        });
    }

    pub fn block(&self, blocker_id: &str, blocked_id: &str) {
        self.write(|s| {
            s.blocks.insert((blocker_id.to_string(), blocked_id.to_string()));
        });
    }

    pub fn like(&self, liker_id: &str, liked_id: &str, at: DateTime<Utc>) {
        self.write(|s| {
            s.likes.insert((liker_id.to_string(), liked_id.to_string()), at);
        });
    }

    pub fn add_match(&self, a: &str, b: &str, at: DateTime<Utc>) {
        self.write(|s| {
            s.matches.insert(pair(a, b), MatchRow { matched_at: at, is_active: true });
        });
    }

    pub fn add_message(&self, sender_id: &str, receiver_id: &str, is_like: bool, deleted: bool) {
        self.write(|s| {
            s.messages.push(MessageRow {
                sender_id: sender_id.to_string(),
                receiver_id: receiver_id.to_string(),
                is_like,
                deleted,
            });
        });
    }

    fn record_for(&self, state: &MemoryState, requester_id: &str, profile: &UserProfile) -> CandidateRecord {
        let other = profile.user_id.as_str();
        let match_row = state.matches.get(&pair(requester_id, other));

        CandidateRecord {
            profile: profile.clone(),
            blocked: state.blocks.contains(&(requester_id.to_string(), other.to_string()))
                || state.blocks.contains(&(other.to_string(), requester_id.to_string())),
            in_contact: state.messages.iter().any(|m| {
                !m.deleted
                    && !m.is_like
                    && ((m.sender_id == requester_id && m.receiver_id == other)
                        || (m.sender_id == other && m.receiver_id == requester_id))
            }),
            matched: match_row.map(|m| m.is_active).unwrap_or(false),
            matched_at: match_row.map(|m| m.matched_at),
            liked_requester_at: state
                .likes
                .get(&(other.to_string(), requester_id.to_string()))
                .copied(),
            requester_liked_at: state
                .likes
                .get(&(requester_id.to_string(), other.to_string()))
                .copied(),
            cached_score: self
                .scores
                .as_ref()
                .and_then(|scores| scores.get(requester_id, other))
                .map(|s| s.score),
        }
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_profile(&self, user_id: &str) -> Result<UserProfile, RepositoryError> {
        self.read(|s| s.profiles.get(user_id).cloned())
            .ok_or_else(|| RepositoryError::NotFound(format!("Profile not found for user {}", user_id)))
    }

    async fn query_candidate_pool(
        &self,
        requester: &UserProfile,
    ) -> Result<Vec<CandidateRecord>, RepositoryError> {
        let requester_id = requester.user_id.as_str();
        Ok(self.read(|s| {
            s.profiles
                .values()
                .filter(|p| p.user_id != requester_id)
                .map(|p| self.record_for(s, requester_id, p))
                .collect()
        }))
    }

    async fn remove_match(&self, user_id: &str, other_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.write(|s| {
            let removed_match = s.matches.remove(&pair(user_id, other_id)).is_some();
            let removed_like = s
                .likes
                .remove(&(user_id.to_string(), other_id.to_string()))
                .is_some();
            let removed_back = s
                .likes
                .remove(&(other_id.to_string(), user_id.to_string()))
                .is_some();
            removed_match || removed_like || removed_back
        }))
    }

    async fn save_min_score(&self, user_id: &str, min_score: u8) -> Result<(), RepositoryError> {
        self.write(|s| {
            s.min_scores.insert(user_id.to_string(), min_score);
        });
        Ok(())
    }

    async fn get_min_score(&self, user_id: &str) -> Result<Option<u8>, RepositoryError> {
        Ok(self.read(|s| s.min_scores.get(user_id).copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            user_id: id.to_string(),
            display_name: Some(id.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_pool_flags() {
        let repo = InMemoryRepository::new();
        let now = Utc::now();
        for id in ["me", "a", "b", "c"] {
            repo.insert_profile(profile(id));
        }
        repo.block("b", "me");
        repo.like("a", "me", now);
        repo.add_message("me", "c", false, false);

        let me = repo.get_profile("me").await.unwrap();
        let pool = repo.query_candidate_pool(&me).await.unwrap();
        assert_eq!(pool.len(), 3);

        let by_id = |id: &str| pool.iter().find(|r| r.profile.user_id == id).unwrap();
        assert!(by_id("a").liked_requester_at.is_some());
        assert!(by_id("b").blocked);
        assert!(by_id("c").in_contact);
    }

    #[tokio::test]
    async fn test_like_messages_and_deleted_messages_are_not_contact() {
        let repo = InMemoryRepository::new();
        repo.insert_profile(profile("me"));
        repo.insert_profile(profile("a"));
        repo.add_message("a", "me", true, false);
        repo.add_message("me", "a", false, true);

        let me = repo.get_profile("me").await.unwrap();
        let pool = repo.query_candidate_pool(&me).await.unwrap();
        assert!(!pool[0].in_contact);
    }

    #[tokio::test]
    async fn test_remove_match_clears_likes_both_ways() {
        let repo = InMemoryRepository::new();
        let now = Utc::now();
        repo.like("me", "a", now);
        repo.like("a", "me", now);
        repo.add_match("a", "me", now);

        assert!(repo.remove_match("me", "a").await.unwrap());
        assert!(!repo.remove_match("me", "a").await.unwrap());
    }

    #[test]
    fn test_min_score_is_per_user() {
        let repo = InMemoryRepository::new();
        tokio_test::block_on(async {
            tokio_test::assert_ok!(repo.save_min_score("me", 70).await);
            tokio_test::assert_ok!(repo.save_min_score("me", 80).await);
            assert_eq!(repo.get_min_score("me").await.unwrap(), Some(80));
            assert_eq!(repo.get_min_score("other").await.unwrap(), None);
        });
    }

    #[tokio::test]
    async fn test_unknown_profile_not_found() {
        let repo = InMemoryRepository::new();
        assert!(matches!(
            repo.get_profile("ghost").await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}
