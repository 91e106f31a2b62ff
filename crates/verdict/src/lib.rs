//!
//! This is a declarative rules evaluation engine, written in Rust.
//!
//! A caller describes a predicate tree as data (boolean combinators over
//! leaf comparisons against named facts), registers a data fetcher per fact,
//! and receives a result tree that mirrors the rule tree and explains the
//! outcome of every node.
//!
//! Goals
//! -----
//!
//! - Evaluate combinator children concurrently and short-circuit as soon as
//!   an outcome is decisive, abandoning still-pending siblings.
//! - Fetch each fact at most once per evaluation through per-fetcher
//!   request-key caches, with SLA metrics on every fetch.
//! - Keep evaluation errors structural: fetch failures and unsupported
//!   operations are outcomes on result nodes, never caller-visible errors.
//! - Decode and encode rule trees polymorphically (a `type` discriminator
//!   per node) and result trees structurally, through an explicit codec
//!   value rather than global registration.
//!

/// Polymorphic rule / result (de)serialization.
pub mod codec;
/// Configuration type definitions.
pub mod config;
/// Evaluation context type definitions.
pub mod context;
/// Error-related type definitions.
pub mod error;
/// The rule tree evaluator.
pub mod eval;
/// Fact registry, data fetchers, and fetch metrics.
pub mod fact;
/// Result trees and the outcome algebra.
pub mod result;
/// Rule trees: combinators, leaf predicates, operators, actions.
pub mod rule;

pub use crate::codec::{Codec, CodecBuilder};
pub use crate::config::{EngineConfig, EvaluatorConfig, FetcherConfig, SkippedChildren};
pub use crate::context::Context;
pub use crate::error::{BoxError, DecodeError, FetchError};
pub use crate::eval::Evaluator;
pub use crate::fact::{Fact, FactFetcher, FetchResponse, Registry, RegistryBuilder};
pub use crate::result::{Outcome, RuleResult};
pub use crate::rule::{Action, Rule};
