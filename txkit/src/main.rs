//! Demo service: one transactional endpoint and one paginated endpoint behind
//! the envelope and exception middleware.

use actix_web::{App, HttpServer, web};
use diesel::sql_types::Integer;
use ortho_config::OrthoConfig;
use serde_json::{Value, json};
use tracing::info;

use txkit::config::Settings;
use txkit::domain::ports::TransactionContext;
use txkit::domain::{Failure, UnitOfWork};
use txkit::inbound::http::{
    ApiResult, EnvelopeResponses, ExceptionFilter, Transactional, ValidatedQuery, not_found,
};
use txkit::outbound::persistence::{DbPool, DieselResourceManager, SharedConnection};
use txkit::pagination::{PageRequest, Pagination};
use txkit::telemetry;

#[derive(diesel::QueryableByName)]
struct PingRow {
    #[diesel(sql_type = Integer)]
    value: i32,
}

async fn ping(ctx: TransactionContext<SharedConnection>) -> ApiResult<web::Json<Value>> {
    use diesel_async::RunQueryDsl;

    let mut conn = ctx.lock().await?;
    let row: PingRow = diesel::sql_query("SELECT 1 AS value")
        .get_result(&mut *conn)
        .await
        .map_err(|err| Failure::unexpected(&err))?;
    Ok(web::Json(json!({ "database": row.value == 1 })))
}

async fn pages(query: ValidatedQuery<PageRequest>) -> web::Json<Pagination<u64>> {
    let request = query.into_inner();
    let total = 95;
    let results = (request.skip()..total.min(request.skip() + request.take())).collect();
    web::Json(Pagination::for_request(results, total, &request))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let settings = Settings::load().map_err(|err| std::io::Error::other(err.to_string()))?;
    telemetry::init(&settings.logging());

    let Some(pool_config) = settings.pool_config() else {
        return Err(std::io::Error::other("TXKIT_DATABASE_URL must be set"));
    };
    let manager = DieselResourceManager::new(DbPool::lazy(&pool_config));
    let mut unit = UnitOfWork::new(manager);
    if let Some(limit) = settings.request_timeout() {
        unit = unit.with_timeout(limit);
    }

    let bind_addr = settings.bind_addr().to_owned();
    info!(%bind_addr, "starting server");
    HttpServer::new(move || {
        App::new()
            .service(
                web::scope("/api/v1")
                    .service(
                        web::resource("/ping")
                            .wrap(Transactional::new(unit.clone()))
                            .route(web::get().to(ping)),
                    )
                    .route("/pages", web::get().to(pages)),
            )
            .default_service(web::to(not_found))
            .wrap(EnvelopeResponses)
            .wrap(ExceptionFilter)
    })
    .bind(bind_addr)?
    .run()
    .await
}
