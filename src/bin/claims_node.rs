#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let spec = std::env::var("RUST_LOG").unwrap_or_else(|_| "info, migration_claims_lib=debug".to_string());
    let _logger = migration_claims_lib::init_logging(&spec, "logs")?;
    log::info!("Starting claims node...");

    if let Err(e) = migration_claims_lib::run().await {
        log::error!("Claims node failed: {:#}", e);
        return Err(e.into());
    }
    Ok(())
}
