//! HTTP surface.
//!
//! - `GET /api/generate-pdf/{id}?type=quote|invoice[&url=..][&uploadUrl=..]`
//! - `GET /health`

use actix_web::http::StatusCode;
use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use std::sync::Arc;
use tracing::info;

use crate::environment::ProfileSource;
use crate::error::PipelineError;
use crate::output::{FailureResponse, HealthResponse, RenderResponse};
use crate::pipeline::Orchestrator;
use crate::types::{RenderRequest, RequestParams};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub profiles: ProfileSource,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, profiles: ProfileSource) -> Self {
        Self {
            orchestrator,
            profiles,
        }
    }
}

/// Register routes. Expects `web::Data<AppState>` in app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(
            web::scope("/api")
                .service(web::resource("/generate-pdf/{id}").route(web::get().to(generate_pdf))),
        );
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse::ok(&state.profiles.resolve()))
}

pub async fn generate_pdf(
    id: web::Path<String>,
    params: web::Query<RequestParams>,
    state: web::Data<AppState>,
) -> HttpResponse {
    // Resolved per request; pooled hosts may change between invocations.
    let profile = state.profiles.resolve();

    let result = match RenderRequest::from_params(&id, &params) {
        Ok(request) => state.orchestrator.run(&request, &profile).await,
        Err(err) => Err(PipelineError::from(err)),
    };

    match result {
        Ok(outcome) => HttpResponse::Ok().json(RenderResponse::from_outcome(&outcome)),
        Err(err) => {
            let status = StatusCode::from_u16(err.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            HttpResponse::build(status).json(FailureResponse::new(&err, &profile))
        }
    }
}

/// Serve until the process is stopped.
pub async fn run(bind: &str, state: AppState) -> std::io::Result<()> {
    let data = web::Data::new(state);
    info!(bind, "starting http server");
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind(bind)?
    .run()
    .await
}
