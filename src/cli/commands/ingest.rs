//! `wafermind ingest` - process parsed-block files into the knowledge base.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::output::Output;
use crate::cli::session::Session;
use crate::config::Config;
use crate::ingest::{CancelFlag, IngestOutcome, ProgressCallback};
use crate::types::Result;

pub async fn run(config: &Config, files: &[PathBuf]) -> Result<()> {
    let output = Output::new();
    let session = Session::build(config)?;
    let cancel = CancelFlag::new();

    for path in files {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        output.info(&format!("Processing {}", file_name));
        let progress: ProgressCallback = Arc::new(|done: usize, total: usize, message: &str| {
            if total > 0 {
                eprint!("\r  [{}/{}] {}        ", done, total, message);
            }
        });

        match session
            .pipeline
            .process_document(&bytes, &file_name, Some(progress), &cancel)
            .await
        {
            Ok(IngestOutcome::AlreadyIngested) => {
                eprintln!();
                output.warning(&format!("{} already ingested, skipped", file_name));
            }
            Ok(IngestOutcome::Ingested { chunks, graph }) => {
                eprintln!();
                output.success(&format!(
                    "{}: {} chunks, {} entities, {} relations",
                    file_name, chunks.len(), graph.entities_created, graph.relations_created
                ));
            }
            Err(e) => {
                eprintln!();
                output.error(&format!("{} failed: {}", file_name, e));
                return Err(e);
            }
        }
    }

    Ok(())
}
