//! Cross-module tests for the answering pipeline.

pub(crate) mod scripted;

mod index_ranking;
