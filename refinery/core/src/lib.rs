// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Refinery Core
//!
//! Turns evaluation issues from many conversations into ranked failure
//! patterns, drafts artifact edits for them and gates those edits behind a
//! regression comparison.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Failure-pattern analysis and artifact refinement

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
