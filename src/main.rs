use hospital_auth::configuration::{get_configuration, Environment};
use hospital_auth::startup::{build_auth_service, run};
use hospital_auth::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;

fn fatal(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    tracing::error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let environment = Environment::current().map_err(|e| {
        eprintln!("{}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    let configuration = get_configuration(environment).map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    init_telemetry(
        &configuration.application.log_level,
        configuration.application.log_format,
    );
    tracing::info!(environment = environment.as_str(), "Starting application");

    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| fatal("Failed to create connection pool", e))?;
    tracing::info!("Database connection pool created successfully");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| fatal("Failed to migrate the database", e))?;

    let auth = build_auth_service(&configuration, environment, pool)
        .map_err(|e| fatal("Failed to build the authentication service", e))?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, auth)?.await
}
