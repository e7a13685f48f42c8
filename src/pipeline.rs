use crate::config::ValidationMode;
use crate::db::DbError;
use crate::db::executor::{self, QueryResult};
use crate::db::schema_inspector::{self, SchemaMetadata};
use crate::db::session::DatabaseSession;
use crate::llm::prompt::PromptComposer;
use crate::llm::{LlmError, LlmManager};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

/// Terminal failures of a pipeline run. Each variant has its own user-facing message.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Please provide all the required inputs: {0}")]
    MissingInput(&'static str),

    #[error("Could not read the database schema: {0}")]
    Connection(DbError),

    #[error("The language model did not answer within {} seconds.", .0.as_secs_f32())]
    GenerationTimeout(Duration),

    #[error("Could not generate a valid SQL query.{}", detail_suffix(.0))]
    GenerationEmpty(Option<String>),

    #[error("The generated SQL query is not valid: {0}")]
    Validation(String),

    // User-facing text matches Validation.
    #[error("The generated SQL query is not valid: {0}")]
    Execution(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stable identifier for the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MissingInput(_) => "missing_input",
            PipelineError::Connection(_) => "connection_error",
            PipelineError::GenerationTimeout(_) => "generation_timeout",
            PipelineError::GenerationEmpty(_) => "generation_empty",
            PipelineError::Validation(_) => "validation_failure",
            PipelineError::Execution(_) => "execution_failure",
            PipelineError::Internal(_) => "internal_error",
        }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_ref().map(|d| format!(" ({})", d)).unwrap_or_default()
}

impl From<DbError> for PipelineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConnectionError(_) => PipelineError::Connection(err),
            // Scratch storage fault, not a bad upload.
            DbError::IoError(e) => PipelineError::Internal(format!("scratch storage failed: {}", e)),
        }
    }
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout(limit) => PipelineError::GenerationTimeout(limit),
            other => PipelineError::GenerationEmpty(Some(other.to_string())),
        }
    }
}

/// The generated statement and what it returned.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub sql: String,
    #[serde(flatten)]
    pub result: QueryResult,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

/// Question in, SQL and rows out.
///
/// Every run works on its own temporary copy of the database, which is removed
/// before `run` returns, whatever the outcome.
pub struct Pipeline {
    llm: LlmManager,
    composer: PromptComposer,
    validation: ValidationMode,
    scratch_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        llm: LlmManager,
        composer: PromptComposer,
        validation: ValidationMode,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            llm,
            composer,
            validation,
            scratch_dir,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.llm.backend_name()
    }

    pub fn validation_mode(&self) -> ValidationMode {
        self.validation
    }

    pub async fn run(&self, database: Vec<u8>, question: &str) -> Result<QueryOutcome, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::MissingInput("question"));
        }
        if database.is_empty() {
            return Err(PipelineError::MissingInput("database file"));
        }

        let (session, schema) = self.load_schema(database).await?;
        info!(
            "Loaded schema from {} with {} tables: {:?}",
            session.path().display(),
            schema.table_count(),
            schema.table_names().collect::<Vec<_>>()
        );
        if schema.is_empty() {
            warn!("Database has no user tables");
        }

        let prompt = self.composer.compose(&schema, question);

        let sql = match self.llm.generate_sql(&prompt).await {
            Ok(Some(sql)) => sql,
            Ok(None) => {
                session.close();
                return Err(PipelineError::GenerationEmpty(None));
            }
            Err(e) => {
                error!("SQL generation failed: {}", e);
                session.close();
                return Err(e.into());
            }
        };

        let validation = self.validation;
        tokio::task::spawn_blocking(move || {
            let mut session = session;
            let outcome = run_statement(&mut session, sql, validation);
            session.close();
            outcome
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("query task failed: {}", e)))?
    }

    async fn load_schema(
        &self,
        database: Vec<u8>,
    ) -> Result<(DatabaseSession, SchemaMetadata), PipelineError> {
        let scratch_dir = self.scratch_dir.clone();
        tokio::task::spawn_blocking(move || -> Result<_, PipelineError> {
            let session = DatabaseSession::from_bytes(&database, &scratch_dir)?;
            // On failure the session is dropped here, which removes the copy.
            let schema = schema_inspector::inspect_schema(session.connection())?;
            Ok((session, schema))
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("schema task failed: {}", e)))?
    }
}

fn run_statement(
    session: &mut DatabaseSession,
    sql: String,
    validation: ValidationMode,
) -> Result<QueryOutcome, PipelineError> {
    if validation == ValidationMode::TrialRun {
        if let Err(e) = executor::trial_run(session.connection_mut(), &sql) {
            warn!("Generated SQL failed validation: {}", e);
            return Err(PipelineError::Validation(e.to_string()));
        }
        info!("Generated SQL passed validation");
    }

    let start_time = Instant::now();
    let result = executor::execute_query(session.connection(), &sql).map_err(|e| {
        warn!("Generated SQL failed to execute: {}", e);
        PipelineError::Execution(e.to_string())
    })?;
    let execution_time_ms = start_time.elapsed().as_millis() as u64;

    info!(
        "Query executed successfully. Row count: {}, Execution time: {}ms",
        result.row_count(),
        execution_time_ms
    );

    Ok(QueryOutcome {
        sql,
        row_count: result.row_count(),
        result,
        execution_time_ms,
    })
}
