//! `wafermind query` - answer a question over ingested documents.
//!
//! The reference stores are process-local, so block files to ingest for
//! this session are passed alongside the question.

use std::path::PathBuf;

use crate::cli::output::Output;
use crate::cli::session::Session;
use crate::config::Config;
use crate::ingest::CancelFlag;
use crate::types::Result;

pub async fn run(config: &Config, question: &str, blocks: &[PathBuf], as_json: bool) -> Result<()> {
    let output = Output::new();
    let session = Session::build(config)?;
    let cancel = CancelFlag::new();

    for path in blocks {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        session
            .pipeline
            .process_document(&bytes, &file_name, None, &cancel)
            .await?;
    }

    let outcome = session.flow.answer_query(question).await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("{}", outcome.generated_answer);
    println!();
    if outcome.audit_passed {
        output.success(&format!(
            "Answer passed the fact audit ({} revision{})",
            outcome.revision_count,
            if outcome.revision_count == 1 { "" } else { "s" }
        ));
    } else {
        output.warning(
            "Answer did not pass the fact audit within the revision budget; \
             treat unverified values with care",
        );
    }
    Ok(())
}
