//! Query Answering State Machine
//!
//! The central control flow:
//!
//! ```text
//! ROUTE -> RETRIEVE -> ANALYZE -> GENERATE -> AUDIT -+-> END
//!                                    ^               |
//!                                    +-- CORRECT <---+
//! ```
//!
//! The audit/correction loop is bounded: `revision_count` increments once
//! per AUDIT execution and the machine revises only while the audit fails
//! and the count is below the cap. After the final audit the machine ends
//! unconditionally, returning the latest answer together with
//! `audit_passed` and `revision_count` so the caller can surface a
//! "corrected, unverified" state.

use serde::Serialize;
use tracing::{debug, info};

use super::analyzer::{ContextAnalysis, ContextAnalyzer};
use super::auditor::{AuditResult, ResponseAuditor};
use super::retriever::Retriever;
use super::router::{QueryRouter, Route};
use crate::constants::flow as consts;
use crate::types::RetrievedContext;

/// Per-query mutable state, threaded through the machine and discarded
/// after the response is returned. Never shared between queries.
#[derive(Debug)]
struct AgentState {
    query: String,
    route: Route,
    retrieved_contexts: Vec<RetrievedContext>,
    analysis: ContextAnalysis,
    generated_answer: String,
    audit: AuditResult,
    audit_passed: bool,
    revision_count: u32,
}

impl AgentState {
    fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            // Overwritten by ROUTE; Conceptual is also the router fallback
            route: Route {
                route_type: super::router::RouteType::Conceptual,
                keywords: Vec::new(),
            },
            retrieved_contexts: Vec::new(),
            analysis: ContextAnalysis::default(),
            generated_answer: String::new(),
            audit: AuditResult::default(),
            audit_passed: false,
            revision_count: 0,
        }
    }
}

/// Final result handed back to the caller. Always produced, even when the
/// revision cap was reached without a passing audit.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub query: String,
    pub generated_answer: String,
    pub audit_passed: bool,
    pub revision_count: u32,
    pub retrieved_contexts: Vec<RetrievedContext>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowState {
    Route,
    Retrieve,
    Analyze,
    Generate,
    Audit,
    Correct,
    End,
}

pub struct QueryFlow {
    router: QueryRouter,
    retriever: Retriever,
    analyzer: ContextAnalyzer,
    auditor: ResponseAuditor,
    revision_cap: u32,
}

impl QueryFlow {
    pub fn new(
        router: QueryRouter,
        retriever: Retriever,
        analyzer: ContextAnalyzer,
        auditor: ResponseAuditor,
    ) -> Self {
        Self {
            router,
            retriever,
            analyzer,
            auditor,
            revision_cap: consts::REVISION_CAP,
        }
    }

    /// Answer a query by running the state machine to completion. There is
    /// no user-facing cancellation here: the machine runs to END or to the
    /// revision cap.
    pub async fn answer_query(&self, query: &str) -> QueryOutcome {
        info!(query, "Starting query flow");
        let mut state = AgentState::new(query);
        let mut current = FlowState::Route;

        loop {
            debug!(?current, revisions = state.revision_count, "Flow transition");
            current = match current {
                FlowState::Route => {
                    state.route = self.router.route(&state.query).await;
                    state.revision_count = 0;
                    FlowState::Retrieve
                }

                FlowState::Retrieve => {
                    let strategy = self.router.strategy_for(state.route.route_type);
                    state.retrieved_contexts = self
                        .retriever
                        .retrieve(&state.query, strategy, &state.route.keywords)
                        .await;
                    FlowState::Analyze
                }

                FlowState::Analyze => {
                    state.analysis = self
                        .analyzer
                        .analyze(&state.query, &state.retrieved_contexts)
                        .await;
                    FlowState::Generate
                }

                FlowState::Generate => {
                    let answer = self
                        .analyzer
                        .generate_answer(&state.query, &state.retrieved_contexts, &state.analysis)
                        .await;
                    state.generated_answer = self
                        .analyzer
                        .format_with_references(&answer, &state.retrieved_contexts);
                    FlowState::Audit
                }

                FlowState::Audit => {
                    let audit = self
                        .auditor
                        .audit(&state.retrieved_contexts, &state.generated_answer)
                        .await;
                    state.audit_passed = audit.passed;
                    state.audit = audit;
                    state.revision_count += 1;
                    info!(
                        passed = state.audit_passed,
                        revision = state.revision_count,
                        "Audit complete"
                    );

                    if self.should_revise(&state) {
                        FlowState::Correct
                    } else {
                        FlowState::End
                    }
                }

                FlowState::Correct => {
                    // Regenerate through the same answering call, with the
                    // correction prompt as the task and a blank analysis
                    let correction = self.auditor.correction_prompt(
                        &state.audit,
                        &state.generated_answer,
                        &state.retrieved_contexts,
                    );
                    let corrected = self
                        .analyzer
                        .generate_answer(
                            &correction,
                            &state.retrieved_contexts,
                            &ContextAnalysis::default(),
                        )
                        .await;
                    state.generated_answer = self
                        .analyzer
                        .format_with_references(&corrected, &state.retrieved_contexts);
                    FlowState::Audit
                }

                FlowState::End => {
                    info!(
                        passed = state.audit_passed,
                        revisions = state.revision_count,
                        "Query flow finished"
                    );
                    return QueryOutcome {
                        query: state.query,
                        generated_answer: state.generated_answer,
                        audit_passed: state.audit_passed,
                        revision_count: state.revision_count,
                        retrieved_contexts: state.retrieved_contexts,
                    };
                }
            };
        }
    }

    /// Loop back into correction iff the audit failed and the revision
    /// budget is not exhausted.
    fn should_revise(&self, state: &AgentState) -> bool {
        !state.audit_passed && state.revision_count < self.revision_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{
        Embedder, GenerationOptions, Generator, ResilientGenerator, RetryPolicy,
    };
    use crate::config::RetrievalConfig;
    use crate::storage::{InMemoryGraphStore, InMemoryVectorStore, VectorStore};
    use crate::types::{BBox, ContextMetadata, Tier};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted model driving the whole flow. Dispatches on prompt
    /// markers; audit verdicts are consumed from a queue.
    struct ScriptedModel {
        audit_verdicts: Mutex<Vec<&'static str>>,
        audit_calls: AtomicUsize,
        correction_calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn with_verdicts(verdicts: Vec<&'static str>) -> Self {
            Self {
                audit_verdicts: Mutex::new(verdicts),
                audit_calls: AtomicUsize::new(0),
                correction_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedModel {
        async fn generate_text(
            &self,
            prompt: &str,
            _opts: GenerationOptions,
        ) -> crate::types::Result<String> {
            if prompt.contains("fact-auditing expert") {
                self.audit_calls.fetch_add(1, Ordering::SeqCst);
                let mut verdicts = self.audit_verdicts.lock().unwrap();
                if verdicts.is_empty() {
                    return Ok(r#"{"passed": true, "errors": []}"#.to_string());
                }
                return Ok(verdicts.remove(0).to_string());
            }
            if prompt.contains("routing expert") {
                return Ok(
                    r#"{"route_type": "FACTUAL", "keywords": ["NLDMOS", "breakdown", "voltage"]}"#
                        .to_string(),
                );
            }
            if prompt.contains("prepare for answering") {
                return Ok(
                    r#"{"key_information": ["Breakdown Voltage = 60V"], "context_summary": "specs"}"#
                        .to_string(),
                );
            }
            if prompt.contains("Revision requirements") {
                self.correction_calls.fetch_add(1, Ordering::SeqCst);
                return Ok("Corrected: the breakdown voltage of the NLDMOS is 60V.".to_string());
            }
            // GENERATE path
            Ok("The breakdown voltage of the NLDMOS device is 60V.".to_string())
        }

        async fn generate_multimodal(
            &self,
            _prompt: &str,
            _image: &str,
        ) -> crate::types::Result<String> {
            Ok(String::new())
        }

        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> crate::types::Result<bool> {
            Ok(true)
        }
    }

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        async fn embed(&self, text: &str) -> crate::types::Result<Vec<f32>> {
            if text.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![1.0, 0.0])
        }

        fn name(&self) -> &str {
            "unit"
        }
    }

    async fn flow_with(model: Arc<ScriptedModel>) -> QueryFlow {
        let generator = ResilientGenerator::new(
            model,
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                backoff_factor: 1.0,
            },
        );

        let vector = Arc::new(InMemoryVectorStore::new());
        vector
            .upsert(
                "1",
                vec![1.0, 0.0],
                ContextMetadata {
                    file_name: "process-spec.pdf".to_string(),
                    page: 12,
                    kind: "text".to_string(),
                    tier: Tier::Red,
                    coordinates: BBox::default(),
                    content: "NLDMOS Breakdown Voltage = 60V".to_string(),
                    image_base64: None,
                },
            )
            .await
            .unwrap();
        let graph = Arc::new(InMemoryGraphStore::new());

        QueryFlow::new(
            QueryRouter::new(generator.clone(), RetrievalConfig::default()),
            Retriever::new(
                vector,
                graph,
                Some(Arc::new(UnitEmbedder)),
                crate::pool::WorkerPool::new(5),
            ),
            ContextAnalyzer::new(generator.clone()),
            ResponseAuditor::new(generator),
        )
    }

    #[tokio::test]
    async fn test_grounded_factual_query_passes_first_audit() {
        let model = Arc::new(ScriptedModel::with_verdicts(vec![
            r#"{"passed": true, "errors": []}"#,
        ]));
        let flow = flow_with(model.clone()).await;

        let outcome = flow
            .answer_query("What is the breakdown voltage of the NLDMOS device?")
            .await;

        assert!(outcome.audit_passed);
        assert_eq!(outcome.revision_count, 1);
        assert!(outcome.generated_answer.contains("60V"));
        assert!(outcome.generated_answer.contains("[1] process-spec.pdf, page 12"));
        assert!(!outcome.retrieved_contexts.is_empty());
        assert_eq!(model.correction_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_two_failed_audits_then_pass() {
        let model = Arc::new(ScriptedModel::with_verdicts(vec![
            r#"{"passed": false, "errors": ["unsupported value"]}"#,
            r#"{"passed": false, "errors": ["still wrong"]}"#,
            r#"{"passed": true, "errors": []}"#,
        ]));
        let flow = flow_with(model.clone()).await;

        let outcome = flow.answer_query("What is the breakdown voltage?").await;

        assert!(outcome.audit_passed);
        assert_eq!(outcome.revision_count, 3);
        assert_eq!(model.audit_calls.load(Ordering::SeqCst), 3);
        assert_eq!(model.correction_calls.load(Ordering::SeqCst), 2);
        assert!(outcome.generated_answer.contains("Corrected"));
    }

    #[tokio::test]
    async fn test_revision_cap_terminates_even_when_audit_always_fails() {
        let model = Arc::new(ScriptedModel::with_verdicts(vec![
            r#"{"passed": false, "errors": ["x"]}"#,
            r#"{"passed": false, "errors": ["x"]}"#,
            r#"{"passed": false, "errors": ["x"]}"#,
            r#"{"passed": false, "errors": ["x"]}"#,
            r#"{"passed": false, "errors": ["x"]}"#,
        ]));
        let flow = flow_with(model.clone()).await;

        let outcome = flow.answer_query("anything").await;

        // Terminates at the cap, reporting the unverified state
        assert!(!outcome.audit_passed);
        assert_eq!(outcome.revision_count, 3);
        assert_eq!(model.audit_calls.load(Ordering::SeqCst), 3);
        assert_eq!(model.correction_calls.load(Ordering::SeqCst), 2);
        assert!(!outcome.generated_answer.is_empty());
    }

    #[tokio::test]
    async fn test_audit_fail_open_on_unparseable_verdict() {
        let model = Arc::new(ScriptedModel::with_verdicts(vec!["garbled verdict"]));
        let flow = flow_with(model.clone()).await;

        let outcome = flow.answer_query("anything").await;
        assert!(outcome.audit_passed);
        assert_eq!(outcome.revision_count, 1);
    }
}
