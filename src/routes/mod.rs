// Route exports
pub mod matches;

use actix_web::web;

use crate::services::MatchStore;

pub fn configure_routes<S: MatchStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(matches::configure::<S>),
    );
}
