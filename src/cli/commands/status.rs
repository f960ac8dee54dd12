//! `wafermind status` - document registry and graph statistics.

use crate::cli::output::Output;
use crate::cli::session::Session;
use crate::config::Config;
use crate::storage::GraphStore;
use crate::types::Result;

pub async fn run(config: &Config) -> Result<()> {
    let output = Output::new();
    let session = Session::build(config)?;

    output.section("Documents");
    let documents = session.documents.list_all()?;
    if documents.is_empty() {
        output.info("Knowledge base is empty");
    } else {
        for doc in &documents {
            println!(
                "  {}  {:>10} bytes  {}  [{}]",
                doc.upload_time, doc.size, doc.filename, doc.status
            );
        }
        output.info(&format!("{} document(s) registered", documents.len()));
    }

    output.section("Knowledge graph");
    let stats = session.graph_store.stats().await?;
    println!("  entities:  {}", stats.entities);
    println!("  relations: {}", stats.relations);
    let mut kinds: Vec<_> = stats.relation_kinds.iter().collect();
    kinds.sort_by(|a, b| b.1.cmp(a.1));
    for (kind, count) in kinds.into_iter().take(10) {
        println!("    {:>6}  {}", count, kind);
    }

    Ok(())
}
