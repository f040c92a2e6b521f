#![cfg(unix)]

use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use prdca::annotator::dbcan::DbcanTool;
use prdca::config::ServiceConfig;
use prdca::report::Report;
use prdca::workspace::memory::MemoryWorkspace;
use prdca::{CallContext, DbcanParams, DbcanService, RunError};

/// Stands in for dbCAN: one hit per FASTA header, after a pause long enough
/// for concurrent calls to overlap.
const FAKE_DBCAN: &str = r#"
sleep 0.3
grep '^>' "$2" | sed 's/^>//' | while read -r id; do
    printf '%s\tGH5\t1e-10\t1\t50\t1\t45\t0.9\n' "$id"
done > "$3"
"#;

const FAILING_DBCAN: &str = r#"
echo "hmmscan: Failed to open hmm database" >&2
exit 3
"#;

fn genome(prefix: &str, n: usize) -> serde_json::Value {
    let features: Vec<_> = (0..n)
        .map(|i| json!({"type": "CDS", "id": format!("{prefix}_{i}"), "protein_translation": "MKV"}))
        .collect();
    json!({ "features": features })
}

fn service(root: &Path, script_body: &str, ws: Arc<MemoryWorkspace>) -> DbcanService {
    let script = root.join("dbCAN.sh");
    std::fs::write(&script, script_body).unwrap();
    let config = Arc::new(ServiceConfig {
        scratch: root.join("scratch"),
        dbcan_dir: root.to_path_buf(),
        dbcan_script: script,
        tool_timeout_secs: 30,
        ..ServiceConfig::default()
    });
    let tool = Arc::new(DbcanTool::new(config.dbcan()));
    DbcanService::new(config, ws, tool)
}

fn hit_ids(ws: &MemoryWorkspace, name: &str) -> Vec<String> {
    let saved = ws.saved("ws1", name).unwrap();
    let report: Report = serde_json::from_value(saved.data).unwrap();
    report
        .text_message
        .lines()
        .filter(|line| line.contains("\tGH5\t"))
        .map(|line| line.split('\t').next().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn concurrent_calls_do_not_share_files() {
    let root = tempfile::tempdir().unwrap();
    let ws = Arc::new(MemoryWorkspace::new());
    ws.insert("ws1", "alpha", "KBaseGenomes.Genome", genome("alpha", 3));
    ws.insert("ws1", "beta", "KBaseGenomes.Genome", genome("beta", 5));
    let service = service(root.path(), FAKE_DBCAN, ws.clone());
    let ctx = CallContext::default();

    let alpha = DbcanParams::new("ws1", "alpha");
    let beta = DbcanParams::new("ws1", "beta");
    let (a, b) = tokio::join!(service.run_dbcan(&ctx, &alpha), service.run_dbcan(&ctx, &beta));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.report_name, b.report_name);
    assert_eq!(hit_ids(&ws, &a.report_name), ["alpha_0", "alpha_1", "alpha_2"]);
    assert_eq!(
        hit_ids(&ws, &b.report_name),
        ["beta_0", "beta_1", "beta_2", "beta_3", "beta_4"]
    );
    assert_eq!(std::fs::read_dir(root.path().join("scratch")).unwrap().count(), 0);
}

#[tokio::test]
async fn real_tool_failure_is_reported_with_stderr() {
    let root = tempfile::tempdir().unwrap();
    let ws = Arc::new(MemoryWorkspace::new());
    ws.insert("ws1", "g1", "KBaseGenomes.Genome", genome("g1", 1));
    let service = service(root.path(), FAILING_DBCAN, ws.clone());

    let err = service
        .run_dbcan(&CallContext::default(), &DbcanParams::new("ws1", "g1"))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::ToolExecution { .. }));
    let text = err.to_string();
    assert!(text.contains("exit code 3"));
    assert!(text.contains("Failed to open hmm database"));
    assert_eq!(ws.save_calls(), 0);
}

#[tokio::test]
async fn genome_without_proteins_still_reports() {
    let root = tempfile::tempdir().unwrap();
    let ws = Arc::new(MemoryWorkspace::new());
    ws.insert(
        "ws1",
        "empty",
        "KBaseGenomes.Genome",
        json!({"features": [{"type": "gene", "id": "g"}]}),
    );
    let service = service(root.path(), FAKE_DBCAN, ws.clone());

    let results = service
        .run_dbcan(&CallContext::default(), &DbcanParams::new("ws1", "empty"))
        .await
        .unwrap();
    assert!(hit_ids(&ws, &results.report_name).is_empty());
}
