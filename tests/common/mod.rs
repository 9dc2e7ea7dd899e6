// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use sharetab::application::LedgerService;
use sharetab::domain::LedgerConfig;
use tempfile::TempDir;

pub const ALICE: &str = "0xA11CE00000000000000000000000000000000001";
pub const BOB: &str = "0xB0B0000000000000000000000000000000000002";
pub const CAROL: &str = "0xCA20100000000000000000000000000000000003";
pub const DAVE: &str = "0xDAFE000000000000000000000000000000000004";

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    test_service_with(LedgerConfig::default()).await
}

/// Same as [`test_service`] with explicit submission policies
pub async fn test_service_with(config: LedgerConfig) -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = LedgerService::init(&db_path(&temp_dir), config).await?;
    Ok((service, temp_dir))
}

/// Path of the database inside a test's temporary directory
pub fn db_path(temp_dir: &TempDir) -> String {
    temp_dir.path().join("test.db").to_str().unwrap().to_string()
}

/// Test fixture: the people most tests start from
pub struct StandardPeople;

impl StandardPeople {
    /// Register Alice and Bob
    pub async fn register_pair(service: &LedgerService) -> Result<()> {
        service.register(ALICE, "Alice").await?;
        service.register(BOB, "Bob").await?;
        Ok(())
    }

    /// Register Alice, Bob and Carol
    pub async fn register_trio(service: &LedgerService) -> Result<()> {
        Self::register_pair(service).await?;
        service.register(CAROL, "Carol").await?;
        Ok(())
    }
}
