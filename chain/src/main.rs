// src/main.rs
//
// Demo that wires up the ledger library end to end:
//
// - registry built from defaults plus BAMS_* environment overrides
// - department chain, then a class and a student anchored beneath it
// - a few attendance blocks on the student chain
// - batch validation report and Prometheus text dump at the end

use std::sync::Arc;

use serde_json::json;
use tracing_subscriber::EnvFilter;

use bams_chain::types::tx::{
    ATTENDANCE, CLASS_CREATION, DEPARTMENT_CREATION, DEPARTMENT_UPDATE, STUDENT_CREATION,
};
use bams_chain::{
    ChainRegistry, EntityKind, EntityRef, LedgerConfig, MetricsRegistry, Transaction,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bams_chain=info")),
        )
        .init();

    if let Err(err) = run_demo().await {
        eprintln!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_demo() -> Result<(), String> {
    let cfg = LedgerConfig::from_env();

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );
    let registry = ChainRegistry::from_config(&cfg, metrics.clone());

    tracing::info!(
        difficulty = cfg.policy.difficulty,
        workers = cfg.mining.workers,
        "starting ledger demo"
    );

    // ---------------------------
    // Department
    // ---------------------------

    let dept = registry
        .get_or_create(
            EntityKind::Department,
            "dept-cs",
            Transaction::new(DEPARTMENT_CREATION)
                .with("name", "Computer Science")
                .with("code", "CS"),
        )
        .await
        .map_err(|e| format!("failed to create department chain: {e}"))?;

    // ---------------------------
    // Class + student, anchored
    // ---------------------------

    let class = registry
        .create_anchored(
            EntityKind::Class,
            "class-cs-a",
            dept.key(),
            Transaction::new(CLASS_CREATION)
                .with("name", "CS-A")
                .with("capacity", 35),
        )
        .await
        .map_err(|e| format!("failed to create class chain: {e}"))?;

    let student = registry
        .create_anchored(
            EntityKind::Student,
            "stu-001",
            class.key(),
            Transaction::new(STUDENT_CREATION)
                .with("name", "Ada Lovelace")
                .with("rollNumber", "CS-001"),
        )
        .await
        .map_err(|e| format!("failed to create student chain: {e}"))?;

    // ---------------------------
    // Activity
    // ---------------------------

    for (date, status) in [("2024-03-01", "Present"), ("2024-03-02", "Absent")] {
        let block = student
            .add_block(Transaction::from(json!({
                "type": ATTENDANCE,
                "date": date,
                "status": status,
            })))
            .await
            .map_err(|e| format!("failed to record attendance: {e}"))?;
        println!("attendance block index={} hash={}", block.index, block.hash);
    }

    dept.add_block(Transaction::new(DEPARTMENT_UPDATE).with("newName", "Computing"))
        .await
        .map_err(|e| format!("failed to update department: {e}"))?;

    // ---------------------------
    // Report
    // ---------------------------

    let data = student.chain_data().await;
    let rendered = serde_json::to_string_pretty(&data)
        .map_err(|e| format!("failed to render chain data: {e}"))?;
    println!("student chain:\n{rendered}");

    if let Some(trace) = registry
        .trace_anchor(class.key(), dept.key())
        .await
        .map_err(|e| format!("failed to trace anchor: {e}"))?
    {
        println!(
            "class anchored at department block {:?} of {}",
            trace.parent_index, trace.parent_len
        );
    }

    let report = registry
        .validate_many(
            &dept.key().id,
            &[EntityRef::new("class-cs-a", "CS-A")],
            &[EntityRef::new("stu-001", "Ada Lovelace")],
        )
        .await;
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|e| format!("failed to render report: {e}"))?;
    println!("validation report:\n{rendered}");

    if cfg.metrics.enabled {
        print!("{}", metrics.gather_text());
    }

    Ok(())
}
