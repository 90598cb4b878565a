use actix_web::{web, HttpResponse};
use serde::Serialize;
use sqlmap_core::{JobId, JobStatus, ScanBatch};

use super::error::{ApiError, SCAN_NOT_CANCELLABLE, SCAN_NOT_FOUND};
use crate::state::AppState;

#[derive(Serialize)]
struct StatusResponse {
    status: JobStatus,
}

pub fn configure_sqlmap_routes(cfg: &mut web::ServiceConfig) {
    cfg
        .route("", web::post().to(submit_scan))                 // POST /acm/v1/sqlmap
        .route("", web::get().to(list_scans))                   // GET /acm/v1/sqlmap
        .route("/{id}/status", web::get().to(get_status))       // GET /acm/v1/sqlmap/{id}/status
        .route("/{id}/result", web::get().to(get_result))       // GET /acm/v1/sqlmap/{id}/result
        .route("/{id}", web::delete().to(cancel_scan));         // DELETE /acm/v1/sqlmap/{id}
}

/// 提交一批扫描目标，立即返回每个任务的初始状态
async fn submit_scan(
    state: web::Data<AppState>,
    req: web::Json<ScanBatch>,
) -> Result<HttpResponse, ApiError> {
    let snapshots = state.dispatcher.dispatch(req.into_inner()).await?;
    tracing::info!("Accepted {} scan jobs", snapshots.len());
    Ok(HttpResponse::Accepted().json(snapshots))
}

async fn get_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_job_id(&path, SCAN_NOT_FOUND)?;
    let snapshot = state.registry.get(&id).await?;
    Ok(HttpResponse::Ok().json(StatusResponse {
        status: snapshot.status,
    }))
}

/// 运行中只返回状态，进入终态后返回完整结果
async fn get_result(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_job_id(&path, SCAN_NOT_FOUND)?;
    let snapshot = state.registry.get(&id).await?;

    if !snapshot.status.is_terminal() {
        return Ok(HttpResponse::Ok().json(StatusResponse {
            status: snapshot.status,
        }));
    }
    Ok(HttpResponse::Ok().json(snapshot))
}

async fn list_scans(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.registry.list().await)
}

async fn cancel_scan(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_job_id(&path, SCAN_NOT_CANCELLABLE)?;
    let snapshot = state
        .registry
        .cancel(&id)
        .await
        .map_err(|_| ApiError::NotFound(SCAN_NOT_CANCELLABLE))?;

    Ok(HttpResponse::Ok().json(StatusResponse {
        status: snapshot.status,
    }))
}

// 不是合法 UUID 的 ID 不可能存在，按未找到处理
fn parse_job_id(raw: &str, not_found: &'static str) -> Result<JobId, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound(not_found))
}
