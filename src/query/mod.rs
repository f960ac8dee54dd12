//! Query Answering
//!
//! Routing, concurrent retrieval, context analysis, answer generation,
//! and the bounded audit/correction state machine.

mod analyzer;
mod auditor;
mod flow;
mod retriever;
mod router;

pub use analyzer::{ContextAnalysis, ContextAnalyzer};
pub use auditor::{AuditResult, ResponseAuditor};
pub use flow::{QueryFlow, QueryOutcome};
pub use retriever::Retriever;
pub use router::{QueryRouter, Route, RouteType, naive_keywords};
