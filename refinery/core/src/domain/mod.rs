// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides the domain model of the refinery.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Aggregates, value objects, capability and repository contracts

pub mod evaluation;
pub mod issue;
pub mod cluster;
pub mod artifact;
pub mod proposal;
pub mod regression;
pub mod capability;
pub mod llm;
pub mod repository;
pub mod events;
pub mod error;
pub mod config;

pub use evaluation::*;
pub use issue::*;
pub use cluster::*;
pub use artifact::*;
pub use proposal::*;
pub use regression::*;
pub use capability::*;
pub use repository::*;
pub use events::*;
pub use error::*;
pub use config::*;
