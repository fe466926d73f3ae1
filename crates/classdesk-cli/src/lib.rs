//! # ClassDesk CLI
//!
//! Seeding utilities used by the `classdesk-cli` binary.
//!
//! ```ignore
//! use classdesk_cli::seeder::{seed_all, SeedConfig};
//!
//! let config = SeedConfig::new(6).with_students(30);
//! seed_all(&pool, &config).await?;
//! ```

pub mod seeder;
