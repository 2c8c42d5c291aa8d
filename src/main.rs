use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod database;
mod error;
mod models;
mod routes;

use models::reference::ReferenceCache;
use models::user::UserAuthenticationMiddlewareFactory;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv().ok();

    let config = config::init()?;
    database::connect(&config.database.uri, &config.database.name).await?;

    let reference = web::Data::new(ReferenceCache::new(config.reference_ttl));

    info!("stopcard-server listening on {}", config.server_addr());

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(UserAuthenticationMiddlewareFactory)
            .app_data(reference.clone())
            .service(routes::user::create_user)
            .service(routes::user::login)
            .service(routes::user::get_user)
            // Fixed report paths are registered ahead of /reports/{report_id}.
            .service(routes::report::get_inbox)
            .service(routes::report::get_report_summary)
            .service(routes::report::get_reports)
            .service(routes::report::create_report)
            .service(routes::report::get_report)
            .service(routes::report::assign_report)
            .service(routes::report::reassign_report)
            .service(routes::report::delegate_report)
            .service(routes::report::complete_report)
            .service(routes::report::accept_report)
            .service(routes::report::reject_report)
            .service(routes::stop_card::create_stop_card)
            .service(routes::stop_card::get_stop_cards)
            .service(routes::department::create_department)
            .service(routes::department::get_departments)
            .service(routes::department::create_officer)
            .service(routes::department::get_officers)
            .service(routes::department::create_supervisor)
            .service(routes::department::get_supervisors)
            .service(routes::department::refresh_reference)
            .service(routes::get_file)
            .service(routes::upload_file)
    })
    .bind(config.server_addr())
    .context("Failed to bind to address")?
    .run()
    .await
    .context("Failed to serve application")?;

    Ok(())
}
