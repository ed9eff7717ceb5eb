use thiol_api::ApiError;
use tracing::info;

use crate::backend::ChatBackend;
use crate::error::ChatError;
use crate::identity::ChatContext;

/// A downloaded source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Last path component of `name`, so a file name can never leave its directory.
fn file_component(name: &str) -> &str {
    match name.rsplit(['/', '\\']).next() {
        Some(last) if !last.is_empty() && last != ".." => last,
        _ => "download",
    }
}

/// `<run_id>.pdf` for the combined document, `<run_id>-<document>.pdf` for a single one.
pub fn pdf_file_name(run_id: &str, document: Option<&str>) -> String {
    let run = file_component(run_id);
    match document {
        None => format!("{}.pdf", run),
        Some(document) => {
            let stem = file_component(document).trim_end_matches(".pdf");
            format!("{}-{}.pdf", run, stem)
        }
    }
}

/// Downloads the PDF for a run. Failures never touch message history.
pub async fn fetch_pdf<B: ChatBackend + ?Sized>(
    ctx: &ChatContext,
    backend: &B,
    run_id: &str,
    document: Option<&str>,
) -> Result<PdfDocument, ChatError> {
    let identity = ctx.require_identity()?;
    let bytes = backend
        .download_pdf(&identity.user_id, run_id, document)
        .await
        .map_err(|e: ApiError| {
            let err = ChatError::from(e);
            err.log("download PDF");
            err
        })?;

    let file_name = pdf_file_name(run_id, document);
    info!(%file_name, len = bytes.len(), "Fetched PDF");
    Ok(PdfDocument { file_name, bytes })
}
