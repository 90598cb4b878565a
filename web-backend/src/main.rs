use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use anyhow::Result;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod state;

use api::create_api_router;
use config::Settings;
use state::AppState;

async fn ping() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "pong"
    }))
}

async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "running_jobs": state.registry.running().await
    }))
}

#[actix_web::main]
async fn main() -> Result<()> {
    // 加载 .env（可选）
    dotenv::dotenv().ok();

    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sqlmap_web=debug,sqlmap_core=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    tracing::debug!(?settings, "Loaded settings");

    // 初始化状态
    let state = AppState::new(settings.tool());

    tracing::info!("sqlmap web server listening on {}", settings.bind_address);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Cors::permissive())
            .wrap(TracingLogger::default())
            // API 路由
            .service(create_api_router())
            // 健康检查
            .route("/ping", web::get().to(ping))
            .route("/health", web::get().to(health_check))
    });
    if let Some(workers) = settings.workers {
        server = server.workers(workers);
    }

    server.bind(settings.bind_address.as_str())?.run().await?;

    Ok(())
}
