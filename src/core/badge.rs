use crate::models::Badge;

const EXCEPTIONAL: Badge = Badge { label: "Exceptional", tier: 4, color: "#7c3aed" };
const STRONG: Badge = Badge { label: "Strong", tier: 3, color: "#16a34a" };
const GOOD: Badge = Badge { label: "Good", tier: 2, color: "#2563eb" };
const LOW: Badge = Badge { label: "Low", tier: 1, color: "#6b7280" };

/// Map a compatibility score to its display tier
#[inline]
pub fn badge_for_score(score: u8) -> Badge {
    match score {
        90..=u8::MAX => EXCEPTIONAL,
        80..=89 => STRONG,
        65..=79 => GOOD,
        _ => LOW,
    }
}
