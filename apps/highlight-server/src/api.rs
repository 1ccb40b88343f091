//! API handlers for the highlight server
//!
//! - `GET /health`
//! - `POST /highlight`: annotate a document pair and write the outputs
//! - `POST /debug`: echo what a multipart upload contained

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};
use highlight_core::{
    AnnotatedOutput, HighlightError, HighlightRequest, Highlighter, SkippedMismatch,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::ServerError;
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "highlight-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
pub struct HighlightResponse {
    pub status: &'static str,
    pub outputs: Vec<OutputInfo>,
}

/// One written output file
#[derive(Debug, Serialize)]
pub struct OutputInfo {
    pub filename: String,
    pub path: String,
    pub highlights: usize,
    pub callouts: usize,
    pub skipped: Vec<SkippedMismatch>,
}

/// Fields of a `/highlight` upload
#[derive(Default)]
struct HighlightUpload {
    file1: Option<Bytes>,
    file2: Option<Bytes>,
    json_data: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ServerError> {
    value.ok_or_else(|| ServerError::InvalidRequest(format!("Missing multipart field '{}'", field)))
}

/// Handler: POST /highlight
pub async fn handle_highlight(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<HighlightResponse>, ServerError> {
    let mut upload = HighlightUpload::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file1") => upload.file1 = Some(field.bytes().await?),
            Some("file2") => upload.file2 = Some(field.bytes().await?),
            Some("json_data") => upload.json_data = Some(field.text().await?),
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    let file1 = required(upload.file1, "file1")?;
    let file2 = required(upload.file2, "file2")?;
    let json_data = required(upload.json_data, "json_data")?;

    let request = Arc::new(HighlightRequest::from_json(&json_data)?);
    let primary_name = request.documents.primary.clone();
    let secondary_name = request.documents.secondary.clone();
    info!(
        primary = %primary_name,
        secondary = %secondary_name,
        categories = request.mismatches.len(),
        "Highlight request"
    );

    if output_file_name(&primary_name) == output_file_name(&secondary_name) {
        return Err(ServerError::InvalidRequest(format!(
            "Documents '{}' and '{}' would both be written to {}",
            primary_name,
            secondary_name,
            output_file_name(&primary_name)
        )));
    }

    let primary = spawn_annotate(&state.highlighter, &request, file1, primary_name.clone());
    let secondary = spawn_annotate(&state.highlighter, &request, file2, secondary_name.clone());
    let (primary, secondary) = tokio::try_join!(primary, secondary)?;
    let (primary, secondary) = match (primary, secondary) {
        (Ok(primary), Ok(secondary)) => (primary, secondary),
        (Err(err), _) | (_, Err(err)) => {
            error!(error = %err, "Annotation failed");
            return Err(err.into());
        }
    };

    let outputs = write_outputs(
        &state.output_dir,
        vec![(primary_name, primary), (secondary_name, secondary)],
    )
    .await?;

    Ok(Json(HighlightResponse {
        status: "success",
        outputs,
    }))
}

fn spawn_annotate(
    highlighter: &Arc<Highlighter>,
    request: &Arc<HighlightRequest>,
    bytes: Bytes,
    filename: String,
) -> tokio::task::JoinHandle<Result<AnnotatedOutput, HighlightError>> {
    let highlighter = Arc::clone(highlighter);
    let request = Arc::clone(request);
    tokio::task::spawn_blocking(move || highlighter.annotate_document(&bytes, &request, &filename))
}

/// `<stem>_output.pdf`, with any directory components of `filename` dropped.
pub fn output_file_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    format!("{}_output.pdf", stem)
}

/// An annotated PDF written under a temporary name next to its final path.
struct StagedOutput {
    filename: String,
    temp_path: PathBuf,
    path: PathBuf,
    output: AnnotatedOutput,
}

impl StagedOutput {
    fn into_info(self) -> OutputInfo {
        OutputInfo {
            filename: self.filename,
            path: self.path.display().to_string(),
            highlights: self.output.summary.highlights,
            callouts: self.output.summary.callouts,
            skipped: self.output.summary.skipped,
        }
    }
}

async fn stage_output(
    output_dir: &Path,
    filename: String,
    output: AnnotatedOutput,
) -> Result<StagedOutput, ServerError> {
    let file_name = output_file_name(&filename);
    let path = output_dir.join(&file_name);
    let temp_path = output_dir.join(format!(".{}.tmp", file_name));
    tokio::fs::write(&temp_path, &output.bytes).await.map_err(|e| {
        error!(path = %temp_path.display(), error = %e, "Failed to write output");
        ServerError::Internal(format!("Failed to write {}: {}", path.display(), e))
    })?;

    Ok(StagedOutput {
        filename,
        temp_path,
        path,
        output,
    })
}

async fn discard(staged: &[StagedOutput]) {
    for output in staged {
        if let Err(e) = tokio::fs::remove_file(&output.temp_path).await {
            warn!(path = %output.temp_path.display(), error = %e, "Failed to remove temp file");
        }
    }
}

/// Write every output or none of them. Each PDF is written to a temporary
/// name first and only renamed into place once all writes succeeded.
async fn write_outputs(
    output_dir: &Path,
    outputs: Vec<(String, AnnotatedOutput)>,
) -> Result<Vec<OutputInfo>, ServerError> {
    let mut staged = Vec::with_capacity(outputs.len());
    for (filename, output) in outputs {
        match stage_output(output_dir, filename, output).await {
            Ok(output) => staged.push(output),
            Err(err) => {
                discard(&staged).await;
                return Err(err);
            }
        }
    }

    for (i, output) in staged.iter().enumerate() {
        if let Err(e) = tokio::fs::rename(&output.temp_path, &output.path).await {
            error!(path = %output.path.display(), error = %e, "Failed to move output into place");
            discard(&staged[i..]).await;
            return Err(ServerError::Internal(format!(
                "Failed to write {}: {}",
                output.path.display(),
                e
            )));
        }
        info!(
            path = %output.path.display(),
            highlights = output.output.summary.highlights,
            callouts = output.output.summary.callouts,
            "Wrote annotated PDF"
        );
    }

    Ok(staged.into_iter().map(StagedOutput::into_info).collect())
}

#[derive(Debug, Serialize)]
pub struct ReceivedFile {
    pub field_name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DebugResponse {
    pub files_received: Vec<ReceivedFile>,
    pub all_fields: Vec<String>,
}

/// Handler: POST /debug
pub async fn handle_debug(mut multipart: Multipart) -> Result<Json<DebugResponse>, ServerError> {
    let mut files_received = Vec::new();
    let mut all_fields = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        if field.file_name().is_some() {
            files_received.push(ReceivedFile {
                field_name: field_name.clone(),
                filename: field.file_name().map(str::to_owned),
                content_type: field.content_type().map(str::to_owned),
            });
        }
        all_fields.push(field_name);
    }

    Ok(Json(DebugResponse {
        files_received,
        all_fields,
    }))
}
