// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod repositories;
pub mod event_bus;
pub mod embedding_client;
pub mod llm_generator;
pub mod telemetry;

pub use embedding_client::HashEmbedder;
pub use event_bus::{EventBus, EventBusError, EventReceiver};
pub use llm_generator::LlmContentGenerator;
pub use repositories::{
    InMemoryArtifactRepository, InMemoryEvaluationSource, InMemoryProposalRepository,
    InMemoryRegressionReportRepository,
};
