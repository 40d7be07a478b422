use actix_web::{web, HttpResponse, Responder};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::history::History;
use crate::metrics;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    cycles_recorded: usize,
}

pub async fn health_check(data: web::Data<Arc<RwLock<History>>>) -> impl Responder {
    let recorded = data.read().len();
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cycles_recorded: recorded,
    })
}

pub async fn get_history(data: web::Data<Arc<RwLock<History>>>) -> impl Responder {
    let history = data.read();
    HttpResponse::Ok().json(serde_json::json!({
        "entries": history.entries()
    }))
}

pub async fn get_metrics() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::gather_text())
}

// Define scope configuration
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health_check)))
        .service(web::resource("/history").route(web::get().to(get_history)))
        .service(web::resource("/metrics").route(web::get().to(get_metrics)));
}
