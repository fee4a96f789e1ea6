use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use scanrelay::api::{configure_routes, AppState};
use scanrelay::{banner, config};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    banner::print_banner();

    if let Err(e) = dotenvy::dotenv() {
        eprintln!("⚠️  Warning: Could not load .env file: {}", e);
        eprintln!("   Make sure VIRUSTOTAL_KEY is set in your environment");
    }

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let app_config = config::AppConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let bind_addr = app_config.bind_addr.clone();

    let state = AppState::new(app_config)
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let shutdown = state.shutdown.clone();
    actix_web::rt::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown requested, cancelling in-flight polls");
            shutdown.cancel();
        }
    });

    log::info!("🚀 Starting server on {}", bind_addr);
    println!("📡 Submission endpoint available at http://{}/api/scan", bind_addr);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind(bind_addr.as_str())?
    .run()
    .await
}
