use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::time::Duration;

use crate::config::MatchingConfig;
use crate::core::distance::distance_km;
use crate::models::{normalize_gender, CandidateRecord, MatchCandidate, PageRequest, UserProfile};

/// A named eligibility predicate; returns true when the candidate may be shown
pub type Rule = fn(&UserProfile, &CandidateRecord) -> bool;

/// Eligibility rules, cheapest and most selective first
pub const RULES: &[(&str, Rule)] = &[
    ("self", not_self),
    ("blocked", not_blocked),
    ("banned", not_banned),
    ("display_name", has_display_name),
    ("preferred_gender", matches_preferred_gender),
    ("preferred_country", matches_preferred_countries),
    ("contact_age", satisfies_contact_age),
    ("contact_country", satisfies_contact_country),
    ("contact_photo", satisfies_contact_photo),
    ("contact_same_gender", satisfies_same_gender_opt_out),
    ("already_in_contact", not_in_contact),
    ("already_matched", not_matched),
];

/// Gender preferences that mean "no restriction"
const ANY_GENDER: &[&str] = &["any", "all", "everyone", "both"];

fn not_self(requester: &UserProfile, record: &CandidateRecord) -> bool {
    record.profile.user_id != requester.user_id
}

fn not_blocked(_: &UserProfile, record: &CandidateRecord) -> bool {
    !record.blocked
}

fn not_banned(_: &UserProfile, record: &CandidateRecord) -> bool {
    !record.profile.is_banned
}

fn has_display_name(_: &UserProfile, record: &CandidateRecord) -> bool {
    record.profile.has_display_name()
}

fn matches_preferred_gender(requester: &UserProfile, record: &CandidateRecord) -> bool {
    let Some(wanted) = requester
        .preferences
        .preferred_gender
        .as_deref()
        .and_then(normalize_gender)
    else {
        return true;
    };
    if ANY_GENDER.contains(&wanted.as_str()) {
        return true;
    }
    record.profile.normalized_gender().as_deref() == Some(wanted.as_str())
}

fn country_in(list: &[String], country: Option<&str>) -> bool {
    let Some(country) = country.map(str::trim) else {
        return false;
    };
    list.iter().any(|c| c.trim().eq_ignore_ascii_case(country))
}

fn matches_preferred_countries(requester: &UserProfile, record: &CandidateRecord) -> bool {
    let wanted = &requester.preferences.preferred_countries;
    wanted.is_empty() || country_in(wanted, record.profile.country.as_deref())
}

/// The candidate's contact age bounds must admit the requester; an unknown
/// requester age only passes when the candidate set no bound
fn satisfies_contact_age(requester: &UserProfile, record: &CandidateRecord) -> bool {
    let rules = &record.profile.contact_restrictions;
    if rules.min_age.is_none() && rules.max_age.is_none() {
        return true;
    }
    let Some(age) = requester.age else {
        return false;
    };
    rules.min_age.map_or(true, |min| age >= min) && rules.max_age.map_or(true, |max| age <= max)
}

fn satisfies_contact_country(requester: &UserProfile, record: &CandidateRecord) -> bool {
    let rules = &record.profile.contact_restrictions;
    if rules.all_countries || rules.allowed_countries.is_empty() {
        return true;
    }
    country_in(&rules.allowed_countries, requester.country.as_deref())
}

fn satisfies_contact_photo(requester: &UserProfile, record: &CandidateRecord) -> bool {
    !record.profile.contact_restrictions.require_photo || requester.photo_count > 0
}

fn satisfies_same_gender_opt_out(requester: &UserProfile, record: &CandidateRecord) -> bool {
    if !record.profile.contact_restrictions.no_same_gender {
        return true;
    }
    match (requester.normalized_gender(), record.profile.normalized_gender()) {
        (Some(a), Some(b)) => a != b,
        _ => true,
    }
}

fn not_in_contact(_: &UserProfile, record: &CandidateRecord) -> bool {
    !record.in_contact
}

fn not_matched(_: &UserProfile, record: &CandidateRecord) -> bool {
    !record.matched
}

/// Name of the first rule that excludes `record`, if any
pub fn exclusion_reason(requester: &UserProfile, record: &CandidateRecord) -> Option<&'static str> {
    RULES
        .iter()
        .find(|(_, rule)| !rule(requester, record))
        .map(|(name, _)| *name)
}

#[inline]
pub fn is_eligible(requester: &UserProfile, record: &CandidateRecord) -> bool {
    exclusion_reason(requester, record).is_none()
}

/// Listing order: like state, presence, score, then recency
///
/// Mutual likes first, then users who liked the requester, then users the
/// requester liked; online before offline; higher (known) scores first;
/// most recent match/like/join date first; user id as final tie-break.
pub fn rank_order(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.is_mutual_like
        .cmp(&a.is_mutual_like)
        .then_with(|| b.liked_by_candidate.cmp(&a.liked_by_candidate))
        .then_with(|| b.requester_liked_candidate.cmp(&a.requester_liked_candidate))
        .then_with(|| b.is_online.cmp(&a.is_online))
        // Some(_) > None, so unknown scores sort last
        .then_with(|| b.sort_score().cmp(&a.sort_score()))
        .then_with(|| b.last_activity_at.cmp(&a.last_activity_at))
        .then_with(|| a.profile.user_id.cmp(&b.profile.user_id))
}

/// One page of eligible candidates without scores attached
#[derive(Debug, Clone)]
pub struct EligibleCandidates {
    pub candidates: Vec<MatchCandidate>,
    pub total: usize,
    pub page: PageRequest,
}

impl EligibleCandidates {
    pub fn has_more(&self) -> bool {
        self.page.offset() + self.candidates.len() < self.total
    }
}

/// Builds the ordered, paginated candidate set for a requester
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    online_window: Duration,
    min_page_size: u32,
    max_page_size: u32,
    default_page_size: u32,
}

impl EligibilityFilter {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            online_window: config.online_window,
            min_page_size: config.min_page_size,
            max_page_size: config.max_page_size,
            default_page_size: config.default_page_size,
        }
    }

    /// Clamp the requested page size into the configured bounds
    pub fn page_request(&self, page: u32, page_size: Option<u32>) -> PageRequest {
        PageRequest {
            page: page.max(1),
            page_size: page_size
                .unwrap_or(self.default_page_size)
                .clamp(self.min_page_size, self.max_page_size),
        }
    }

    fn is_online(&self, profile: &UserProfile, now: DateTime<Utc>) -> bool {
        let Some(last_active) = profile.last_active_at else {
            return false;
        };
        match chrono::Duration::from_std(self.online_window) {
            Ok(window) => last_active >= now - window,
            Err(_) => true,
        }
    }

    fn to_candidate(&self, requester: &UserProfile, record: CandidateRecord, now: DateTime<Utc>) -> MatchCandidate {
        let liked_by_candidate = record.liked_requester_at.is_some();
        let requester_liked_candidate = record.requester_liked_at.is_some();
        let last_activity_at = record.last_activity_date();
        let is_online = self.is_online(&record.profile, now);
        let distance_km = distance_km(
            requester.latitude,
            requester.longitude,
            record.profile.latitude,
            record.profile.longitude,
        );

        MatchCandidate {
            profile: record.profile,
            liked_by_candidate,
            requester_liked_candidate,
            is_mutual_like: liked_by_candidate && requester_liked_candidate,
            is_online,
            distance_km,
            cached_score: record.cached_score,
            last_activity_at,
            compatibility: None,
            badge: None,
        }
    }

    /// Apply every rule, order the survivors and cut out one page
    pub fn find_candidates(
        &self,
        requester: &UserProfile,
        pool: Vec<CandidateRecord>,
        page: PageRequest,
        now: DateTime<Utc>,
    ) -> EligibleCandidates {
        let pool_size = pool.len();

        let mut eligible: Vec<MatchCandidate> = pool
            .into_iter()
            .filter(|record| match exclusion_reason(requester, record) {
                Some(reason) => {
                    tracing::trace!("Excluding {} for {}: {}", record.profile.user_id, requester.user_id, reason);
                    false
                }
                None => true,
            })
            .map(|record| self.to_candidate(requester, record, now))
            .collect();

        eligible.sort_by(rank_order);

        let total = eligible.len();
        let candidates: Vec<MatchCandidate> = eligible
            .into_iter()
            .skip(page.offset())
            .take(page.page_size as usize)
            .collect();

        tracing::debug!(
            "Eligibility for {}: {} of {} pool rows eligible, page {} has {}",
            requester.user_id,
            total,
            pool_size,
            page.page,
            candidates.len()
        );

        EligibleCandidates {
            candidates,
            total,
            page,
        }
    }
}
