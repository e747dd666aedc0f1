//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates all necessary tables and indexes. Safe to run repeatedly.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(PRESET_SCHEMA).await?.check()?;
    db.query(JOB_SCHEMA).await?.check()?;
    db.query(JOB_ITEM_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Table names shared by the repositories.
pub(crate) const JOB_TABLE: &str = "sample_job";
pub(crate) const PRESET_TABLE: &str = "preset";

/// Preset table schema.
const PRESET_SCHEMA: &str = r#"
-- Saved generation axes
DEFINE TABLE IF NOT EXISTS preset SCHEMALESS;

DEFINE FIELD IF NOT EXISTS preset_id ON preset TYPE string;
DEFINE FIELD IF NOT EXISTS name ON preset TYPE string;

DEFINE INDEX IF NOT EXISTS preset_name ON preset FIELDS name;
"#;

/// Job table schema.
const JOB_SCHEMA: &str = r#"
-- One sampling run over a training run's checkpoints
DEFINE TABLE IF NOT EXISTS sample_job SCHEMALESS;

DEFINE FIELD IF NOT EXISTS job_id ON sample_job TYPE string;
DEFINE FIELD IF NOT EXISTS training_run ON sample_job TYPE string;
DEFINE FIELD IF NOT EXISTS status ON sample_job TYPE string DEFAULT "pending";
DEFINE FIELD IF NOT EXISTS total_items ON sample_job TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS completed_items ON sample_job TYPE int DEFAULT 0;

DEFINE INDEX IF NOT EXISTS sample_job_status ON sample_job FIELDS status;
DEFINE INDEX IF NOT EXISTS sample_job_run ON sample_job FIELDS training_run;
DEFINE INDEX IF NOT EXISTS sample_job_created ON sample_job FIELDS created_at;
"#;

/// Job item table schema.
const JOB_ITEM_SCHEMA: &str = r#"
-- One (checkpoint, parameter combination) unit of render work
DEFINE TABLE IF NOT EXISTS job_item SCHEMALESS;

DEFINE FIELD IF NOT EXISTS item_id ON job_item TYPE string;
DEFINE FIELD IF NOT EXISTS job_id ON job_item TYPE string;
DEFINE FIELD IF NOT EXISTS seq ON job_item TYPE int;
DEFINE FIELD IF NOT EXISTS status ON job_item TYPE string DEFAULT "pending";

DEFINE INDEX IF NOT EXISTS job_item_id ON job_item FIELDS item_id UNIQUE;
DEFINE INDEX IF NOT EXISTS job_item_job ON job_item FIELDS job_id;

-- Compound index for claiming the next pending item of a job
DEFINE INDEX IF NOT EXISTS job_item_job_status ON job_item FIELDS job_id, status, seq;
"#;
