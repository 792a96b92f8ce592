//! 수집 서버 라우트 정의.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::AppState;

/// 수집 라우트 생성
pub fn collector_routes() -> Router<AppState> {
    Router::new()
        // 조회
        .route("/", get(handlers::metrics::list_metrics))
        .route("/ping", get(handlers::metrics::ping))
        .route("/value/", post(handlers::value::value_json))
        .route("/value/{kind}/{name}", get(handlers::value::value_path))
        // 갱신
        .route("/updates/", post(handlers::update::update_batch))
        .route("/update/", post(handlers::update::update_metric))
        .route(
            "/update/{kind}/{name}/{value}",
            post(handlers::update::update_path),
        )
}
