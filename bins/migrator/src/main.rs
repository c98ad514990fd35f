//! Database migration runner for Keelbook.
//!
//! Reads `DATABASE_URL` from the environment (or a `.env` file).
//!
//! Usage:
//!   migrator up      - Run all pending migrations
//!   migrator down    - Rollback last migration
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop all tables and re-run migrations

use sea_orm_migration::prelude::*;
use keelbook_db::migration::Migrator;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // The migrator CLI sets up its own tracing subscriber.
    cli::run_cli(Migrator).await;
}
