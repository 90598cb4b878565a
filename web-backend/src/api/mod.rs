use actix_web::{web, Scope};

pub mod error;
pub mod sqlmap;

use error::ApiError;

pub fn create_api_router() -> Scope {
    web::scope("/acm/v1")
        .app_data(json_config())
        .service(sqlmap_routes())
}

fn sqlmap_routes() -> Scope {
    web::scope("/sqlmap")
        .configure(sqlmap::configure_sqlmap_routes)
}

// JSON 解析失败时返回和其他错误一致的 {"error": ...}
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        tracing::debug!("Rejected malformed request body: {}", err);
        ApiError::BadRequest(err.to_string()).into()
    })
}
