use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use validator::Validate;

use crate::core::{MatchError, MatchRanker};
use crate::models::{
    CandidateView, ErrorResponse, HealthResponse, ListMatchesRequest, ListMatchesResponse,
    MinScoreRequest, SuccessResponse, UnmatchRequest,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub ranker: MatchRanker,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/matches", web::get().to(list_matches))
        .route("/matches/unmatch", web::post().to(unmatch))
        .route("/matches/min-score", web::put().to(save_min_score));
}

fn validation_failed(errors: validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
        retryable: false,
    })
}

/// Map a ranker error to the JSON envelope; dependency details stay in the logs
fn error_response(err: &MatchError) -> HttpResponse {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let (error, message) = match err {
        MatchError::InvalidInput(msg) => ("Invalid request", msg.clone()),
        MatchError::NotFound(msg) => ("Not found", msg.clone()),
        MatchError::DependencyUnavailable(_) => (
            "Service unavailable",
            "Matches are temporarily unavailable, please retry".to_string(),
        ),
        MatchError::Internal(_) => (
            "Internal server error",
            "Matches could not be loaded".to_string(),
        ),
    };

    HttpResponse::build(status).json(ErrorResponse {
        error: error.to_string(),
        message,
        status_code: status.as_u16(),
        retryable: err.is_retryable(),
    })
}

/// Caller mistakes are routine traffic; only server-side failures log at error
fn log_failure(action: &str, err: &MatchError) {
    if err.is_client_error() {
        tracing::info!("{} rejected: {}", action, err);
    } else {
        tracing::error!("{} failed: {}", action, err);
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = state.ranker.health_check().await;
    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// List matches endpoint
///
/// GET /api/v1/matches?userId={userId}&page={page}&pageSize={pageSize}
async fn list_matches(
    state: web::Data<AppState>,
    query: web::Query<ListMatchesRequest>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        tracing::info!("Validation failed for list_matches request: {:?}", errors);
        return validation_failed(errors);
    }

    tracing::info!(
        "Listing matches for user: {}, page: {}, pageSize: {:?}",
        query.user_id,
        query.page,
        query.page_size
    );

    match state
        .ranker
        .list_matches(&query.user_id, query.page, query.page_size)
        .await
    {
        Ok(listing) => HttpResponse::Ok().json(ListMatchesResponse {
            candidates: listing.candidates.into_iter().map(CandidateView::from).collect(),
            min_score_preference: listing.min_score_preference,
            pagination: listing.pagination,
        }),
        Err(e) => {
            log_failure(&format!("Listing matches for {}", query.user_id), &e);
            error_response(&e)
        }
    }
}

/// Unmatch endpoint
///
/// POST /api/v1/matches/unmatch
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "otherUserId": "string"
/// }
/// ```
async fn unmatch(state: web::Data<AppState>, req: web::Json<UnmatchRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    match state.ranker.unmatch(&req.user_id, &req.other_user_id).await {
        Ok(removed) => HttpResponse::Ok().json(SuccessResponse { success: removed }),
        Err(e) => {
            log_failure(&format!("Unmatch {} / {}", req.user_id, req.other_user_id), &e);
            error_response(&e)
        }
    }
}

/// Save minimum score preference endpoint
///
/// PUT /api/v1/matches/min-score
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "minScore": 70
/// }
/// ```
async fn save_min_score(state: web::Data<AppState>, req: web::Json<MinScoreRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    match state
        .ranker
        .save_min_score_preference(&req.user_id, req.min_score)
        .await
    {
        Ok(()) => HttpResponse::Ok().json(SuccessResponse { success: true }),
        Err(e) => {
            log_failure(&format!("Saving min score for {}", req.user_id), &e);
            error_response(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingConfig;
    use crate::core::CompatibilityScorer;
    use crate::models::UserProfile;
    use crate::services::{InMemoryRepository, InMemoryScoreStore, NoopTier, ScoreCache};
    use actix_web::{test, App};
    use std::sync::Arc;
    use std::time::Duration;

    fn state(repo: InMemoryRepository) -> AppState {
        let cache = ScoreCache::new(
            Arc::new(NoopTier),
            Arc::new(InMemoryScoreStore::new()),
            CompatibilityScorer::default(),
            Duration::from_millis(100),
        );
        AppState {
            ranker: MatchRanker::new(Arc::new(repo), Arc::new(cache), MatchingConfig::default()),
        }
    }

    fn profile(id: &str, gender: &str) -> UserProfile {
        UserProfile {
            user_id: id.to_string(),
            display_name: Some(id.to_string()),
            age: Some(30),
            gender: Some(gender.to_string()),
            country: Some("NL".to_string()),
            ..Default::default()
        }
    }

    #[actix_web::test]
    async fn test_list_matches_endpoint() {
        let repo = InMemoryRepository::new();
        repo.insert_profile(profile("me", "male"));
        repo.insert_profile(profile("anna", "female"));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(repo)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/matches?userId=me&pageSize=5").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["candidates"][0]["userId"], "anna");
        assert!(body["candidates"][0]["badge"]["label"].is_string());
        assert_eq!(body["pagination"]["pageSize"], 5);
        assert!(body["candidates"][0].get("preferences").is_none());
    }

    #[actix_web::test]
    async fn test_unknown_user_is_404() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(InMemoryRepository::new())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/matches?userId=ghost").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_min_score_out_of_range_is_400() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(InMemoryRepository::new())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/matches/min-score")
            .set_json(serde_json::json!({ "userId": "me", "minScore": 0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[::core::prelude::v1::test]
    fn test_dependency_errors_hide_details() {
        let resp = error_response(&MatchError::DependencyUnavailable("pg at 10.0.0.3 refused".to_string()));
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[::core::prelude::v1::test]
    fn test_undecodable_data_is_500() {
        let resp = error_response(&MatchError::Internal("attributes of me do not decode".to_string()));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[::core::prelude::v1::test]
    fn test_only_server_faults_are_errors() {
        assert!(MatchError::InvalidInput("page starts at 1".to_string()).is_client_error());
        assert!(MatchError::NotFound("ghost".to_string()).is_client_error());
        assert!(!MatchError::DependencyUnavailable("timeout".to_string()).is_client_error());
        assert!(!MatchError::Internal("bad row".to_string()).is_client_error());
    }
}
