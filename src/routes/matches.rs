use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::core::{LifecycleError, MatchLifecycleManager};
use crate::models::{
    BreakUpRequest, CreateMatchRequest, ErrorResponse, HealthResponse, MatchListResponse,
    MemberMatchesQuery, NewMatch, RespondRequest,
};
use crate::services::MatchStore;

/// Application state shared across all handlers
pub struct AppState<S> {
    pub manager: Arc<MatchLifecycleManager<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

/// Configure all match-related routes
pub fn configure<S: MatchStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check::<S>))
        .route("/matches", web::post().to(create_match::<S>))
        .route("/matches/{id}", web::get().to(get_match::<S>))
        .route("/matches/{id}/activate", web::post().to(activate::<S>))
        .route("/matches/{id}/respond", web::post().to(respond::<S>))
        .route("/matches/{id}/break-up", web::post().to(break_up::<S>))
        .route("/members/{id}/matches", web::get().to(member_matches::<S>))
        .route("/notifications/pending", web::post().to(notify_pending::<S>));
}

fn error_response(err: &LifecycleError) -> HttpResponse {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        tracing::error!("Lifecycle operation failed: {}", err);
    } else {
        tracing::info!("Lifecycle operation rejected: {}", err);
    }

    HttpResponse::build(status).json(ErrorResponse {
        error: err.error_code().to_string(),
        message: err.to_string(),
        status_code: status.as_u16(),
    })
}

/// Health check endpoint
async fn health_check<S: MatchStore + 'static>(state: web::Data<AppState<S>>) -> impl Responder {
    let store_healthy = state.manager.store().health_check().await.unwrap_or(false);

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Create match endpoint
///
/// POST /api/v1/matches
///
/// Request body:
/// ```json
/// {
///   "initiatorId": "uuid",
///   "counterpartId": "uuid",
///   "initialStatus": "BACKLOG|PREPARING",
///   "spendHeart": true
/// }
/// ```
async fn create_match<S: MatchStore + 'static>(
    state: web::Data<AppState<S>>,
    req: web::Json<CreateMatchRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let new = NewMatch {
        initiator_id: req.initiator_id,
        counterpart_id: req.counterpart_id,
        initial_status: req.initial_status,
        spend_heart: req.spend_heart,
    };

    match state.manager.create_match(new).await {
        Ok(created) => HttpResponse::Created().json(created),
        Err(e) => error_response(&e),
    }
}

async fn get_match<S: MatchStore + 'static>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match state.manager.get_match(path.into_inner()).await {
        Ok(found) => HttpResponse::Ok().json(found),
        Err(e) => error_response(&e),
    }
}

/// Activate endpoint
///
/// POST /api/v1/matches/{id}/activate
async fn activate<S: MatchStore + 'static>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match state.manager.activate(path.into_inner()).await {
        Ok(activated) => HttpResponse::Ok().json(activated),
        Err(e) => error_response(&e),
    }
}

/// Respond endpoint
///
/// POST /api/v1/matches/{id}/respond
///
/// Request body:
/// ```json
/// {
///   "memberId": "uuid",
///   "decision": "ACCEPTED|REJECTED"
/// }
/// ```
async fn respond<S: MatchStore + 'static>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
    req: web::Json<RespondRequest>,
) -> impl Responder {
    match state
        .manager
        .respond(path.into_inner(), req.member_id, req.decision)
        .await
    {
        Ok(updated) => HttpResponse::Ok().json(updated),
        Err(e) => error_response(&e),
    }
}

/// Break-up endpoint
///
/// POST /api/v1/matches/{id}/break-up
async fn break_up<S: MatchStore + 'static>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
    req: web::Json<BreakUpRequest>,
) -> impl Responder {
    match state.manager.break_up(path.into_inner(), req.member_id).await {
        Ok(updated) => HttpResponse::Ok().json(updated),
        Err(e) => error_response(&e),
    }
}

/// List a member's matches
///
/// GET /api/v1/members/{id}/matches?status={status}
async fn member_matches<S: MatchStore + 'static>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
    query: web::Query<MemberMatchesQuery>,
) -> impl Responder {
    match state
        .manager
        .list_matches_for_member(path.into_inner(), query.status)
        .await
    {
        Ok(matches) => HttpResponse::Ok().json(MatchListResponse {
            total_results: matches.len(),
            matches,
        }),
        Err(e) => error_response(&e),
    }
}

/// Run the pending-notification sweep on demand
///
/// POST /api/v1/notifications/pending
async fn notify_pending<S: MatchStore + 'static>(state: web::Data<AppState<S>>) -> impl Responder {
    match state.manager.bulk_notify_pending().await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LifecycleSettings;
    use crate::models::{Match, MatchStatus};
    use crate::services::{LogNotifier, MemoryStore};
    use actix_web::{test, App};

    fn state(store: &MemoryStore) -> AppState<MemoryStore> {
        AppState {
            manager: Arc::new(MatchLifecycleManager::new(
                Arc::new(store.clone()),
                Arc::new(LogNotifier),
                LifecycleSettings::default(),
            )),
        }
    }

    #[actix_web::test]
    async fn test_full_flow_over_http() {
        let store = MemoryStore::new();
        let a = store.add_member(1).await;
        let b = store.add_member(1).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&store)))
                .service(web::scope("/api/v1").configure(configure::<MemoryStore>)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/matches")
            .set_json(serde_json::json!({
                "initiatorId": a,
                "counterpartId": b,
                "initialStatus": "PREPARING",
                "spendHeart": true,
            }))
            .to_request();
        let created: Match = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created.status, MatchStatus::Preparing);
        assert_eq!(store.member(a).await.unwrap().hearts_left, 0);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/matches/{}/activate", created.id))
            .to_request();
        let activated: Match = test::call_and_read_body_json(&app, req).await;
        assert_eq!(activated.status, MatchStatus::Pending);

        for member in [a, b] {
            let req = test::TestRequest::post()
                .uri(&format!("/api/v1/matches/{}/respond", created.id))
                .set_json(serde_json::json!({ "memberId": member, "decision": "ACCEPTED" }))
                .to_request();
            let _: Match = test::call_and_read_body_json(&app, req).await;
        }

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/members/{}/matches?status=ACCEPTED", b))
            .to_request();
        let listed: MatchListResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed.total_results, 1);
        assert_eq!(listed.matches[0].id, created.id);
    }

    #[actix_web::test]
    async fn test_health_reports_store() {
        let store = MemoryStore::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&store)))
                .service(web::scope("/api/v1").configure(configure::<MemoryStore>)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let health: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(health.status, "healthy");
    }

    #[actix_web::test]
    async fn test_errors_map_to_status_codes() {
        let store = MemoryStore::new();
        let a = store.add_member(0).await;
        let b = store.add_member(0).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&store)))
                .service(web::scope("/api/v1").configure(configure::<MemoryStore>)),
        )
        .await;

        // No hearts left
        let req = test::TestRequest::post()
            .uri("/api/v1/matches")
            .set_json(serde_json::json!({
                "initiatorId": a,
                "counterpartId": b,
                "spendHeart": true,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);

        // Bad initial status
        let req = test::TestRequest::post()
            .uri("/api/v1/matches")
            .set_json(serde_json::json!({
                "initiatorId": a,
                "counterpartId": b,
                "initialStatus": "ACCEPTED",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // Unknown match
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/matches/{}", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        // Break-up of a match that was never accepted
        let req = test::TestRequest::post()
            .uri("/api/v1/matches")
            .set_json(serde_json::json!({ "initiatorId": a, "counterpartId": b }))
            .to_request();
        let created: Match = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/matches/{}/break-up", created.id))
            .set_json(serde_json::json!({ "memberId": a }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        // Stranger answering
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/matches/{}/respond", created.id))
            .set_json(serde_json::json!({ "memberId": Uuid::new_v4(), "decision": "REJECTED" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
