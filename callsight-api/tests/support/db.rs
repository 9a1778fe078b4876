use callsight_api::db::{DbClient, DbConfig};

pub fn test_db_client() -> DbClient {
    let config = DbConfig::from_env();
    DbClient::from_config(&config).expect("Failed to create database client")
}

/// Client with the schema applied.
pub async fn bootstrapped_db_client() -> DbClient {
    let db = test_db_client();
    db.bootstrap().await.expect("Failed to bootstrap schema");
    db
}
