use serde::{Deserialize, Serialize};
use validator::Validate;

/// Query parameters for listing matches
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ListMatchesRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(alias = "page_size", rename = "pageSize", default)]
    pub page_size: Option<u32>,
}

fn default_page() -> u32 {
    1
}

/// Request to remove a match between two users
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UnmatchRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "other_user_id", rename = "otherUserId")]
    pub other_user_id: String,
}

/// Request to persist the advisory minimum-score threshold
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MinScoreRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(range(min = 1, max = 100))]
    #[serde(alias = "min_score", rename = "minScore")]
    pub min_score: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_request_defaults() {
        let req: ListMatchesRequest = serde_json::from_str(r#"{"userId":"u1"}"#).unwrap();
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, None);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_min_score_range_validation() {
        let ok = MinScoreRequest { user_id: "u1".to_string(), min_score: 100 };
        let zero = MinScoreRequest { user_id: "u1".to_string(), min_score: 0 };
        let over = MinScoreRequest { user_id: "u1".to_string(), min_score: 101 };
        assert!(ok.validate().is_ok());
        assert!(zero.validate().is_err());
        assert!(over.validate().is_err());
    }

    #[test]
    fn test_unmatch_requires_both_ids() {
        let req = UnmatchRequest { user_id: "u1".to_string(), other_user_id: String::new() };
        assert!(req.validate().is_err());
    }
}
