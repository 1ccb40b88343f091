//! HTTP endpoint tests using axum-test

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::api::output_file_name;
use crate::{build_router, AppState};

const TEST_BODY_LIMIT: usize = 1024 * 1024;

fn create_test_server(output_dir: &TempDir) -> TestServer {
    let state = AppState::new(output_dir.path().to_path_buf());
    TestServer::new(build_router(state, TEST_BODY_LIMIT)).unwrap()
}

fn create_test_pdf(content: &[u8]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Contents" => Object::Reference(content_id),
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        },
    });
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => 1,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    if let Ok(page) = doc.get_object_mut(page_id) {
        if let Ok(dict) = page.as_dict_mut() {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn annotation_count(bytes: &[u8]) -> usize {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = doc.get_pages()[&1];
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    match page.get(b"Annots") {
        Ok(Object::Array(annots)) => annots.len(),
        Ok(Object::Reference(id)) => doc.get_object(*id).unwrap().as_array().unwrap().len(),
        _ => 0,
    }
}

fn request_json() -> String {
    request_json_for("invoice.pdf", "packing_list.pdf")
}

fn request_json_for(primary: &str, secondary: &str) -> String {
    let body = json!({
        "item0_metadata": {
            "mismatches": {
                "vessel": {
                    "invoice.pdf": { "text": "ML-123" },
                    "packing_list.pdf": { "text": "ML-999" }
                }
            }
        },
        "item2_metadata": { "filename": primary },
        "item3_metadata": { "filename": secondary }
    });
    body.to_string()
}

fn pdf_part(bytes: Vec<u8>, name: &str) -> Part {
    Part::bytes(bytes)
        .file_name(name)
        .mime_type("application/pdf")
}

fn highlight_form(json_data: &str, file1: Vec<u8>, file2: Vec<u8>) -> MultipartForm {
    MultipartForm::new()
        .add_part("file1", pdf_part(file1, "invoice.pdf"))
        .add_part("file2", pdf_part(file2, "packing_list.pdf"))
        .add_text("json_data", json_data.to_string())
}

#[tokio::test]
async fn test_health_returns_200() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);
    let response = server.get("/health").await;
    response.assert_status_ok();

    let json = response.json::<Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "highlight-server");
}

#[tokio::test]
async fn test_highlight_writes_both_outputs() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);
    let pdf_a = create_test_pdf(b"BT /F1 12 Tf 72 700 Td (Seal ML-123) Tj ET");
    let pdf_b = create_test_pdf(b"BT /F1 12 Tf 72 700 Td (Seal ML-999) Tj ET");

    let response = server
        .post("/highlight")
        .multipart(highlight_form(&request_json(), pdf_a, pdf_b))
        .await;
    response.assert_status_ok();

    let json = response.json::<Value>();
    assert_eq!(json["status"], "success");
    assert_eq!(json["outputs"][0]["filename"], "invoice.pdf");
    assert_eq!(json["outputs"][0]["highlights"], 1);
    assert_eq!(json["outputs"][0]["callouts"], 0);
    assert_eq!(json["outputs"][1]["highlights"], 1);
    assert_eq!(json["outputs"][1]["callouts"], 1);

    let primary = std::fs::read(dir.path().join("invoice_output.pdf")).unwrap();
    let secondary = std::fs::read(dir.path().join("packing_list_output.pdf")).unwrap();
    assert_eq!(annotation_count(&primary), 1);
    assert_eq!(annotation_count(&secondary), 2);
}

#[tokio::test]
async fn test_highlight_reports_unplaced_mismatches() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);
    let pdf = create_test_pdf(b"BT /F1 12 Tf 72 700 Td (Nothing relevant) Tj ET");

    let response = server
        .post("/highlight")
        .multipart(highlight_form(&request_json(), pdf.clone(), pdf))
        .await;
    response.assert_status_ok();

    let json = response.json::<Value>();
    assert_eq!(json["outputs"][0]["highlights"], 0);
    assert_eq!(json["outputs"][0]["skipped"][0]["category"], "vessel");
    assert_eq!(
        json["outputs"][0]["skipped"][0]["reason"],
        "UnresolvedRegion"
    );
}

#[tokio::test]
async fn test_highlight_rejects_missing_json() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);
    let form = MultipartForm::new()
        .add_part("file1", pdf_part(create_test_pdf(b""), "a.pdf"))
        .add_part("file2", pdf_part(create_test_pdf(b""), "b.pdf"));

    let response = server.post("/highlight").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let json = response.json::<Value>();
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_highlight_rejects_malformed_json() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);
    let form = highlight_form("{not json", create_test_pdf(b""), create_test_pdf(b""));

    let response = server.post("/highlight").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_pdf_fails_whole_request() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);
    let form = highlight_form(
        &request_json(),
        create_test_pdf(b"BT /F1 12 Tf 72 700 Td (ML-123) Tj ET"),
        b"not a pdf".to_vec(),
    );

    let response = server.post("/highlight").multipart(form).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let json = response.json::<Value>();
    assert_eq!(json["code"], "DOCUMENT_ERROR");
    // Neither output is written when one document fails.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_colliding_output_names_are_rejected() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);
    let json_data = request_json_for("march/invoice.pdf", "april/invoice.pdf");
    let pdf = create_test_pdf(b"BT /F1 12 Tf 72 700 Td (Seal ML-123) Tj ET");

    let response = server
        .post("/highlight")
        .multipart(highlight_form(&json_data, pdf.clone(), pdf))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let json = response.json::<Value>();
    assert_eq!(json["code"], "INVALID_REQUEST");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_failed_write_leaves_no_partial_outputs() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);
    // A directory squatting on the second temp path makes its write fail.
    let blocker = dir.path().join(".packing_list_output.pdf.tmp");
    std::fs::create_dir(&blocker).unwrap();
    let pdf_a = create_test_pdf(b"BT /F1 12 Tf 72 700 Td (Seal ML-123) Tj ET");
    let pdf_b = create_test_pdf(b"BT /F1 12 Tf 72 700 Td (Seal ML-999) Tj ET");

    let response = server
        .post("/highlight")
        .multipart(highlight_form(&request_json(), pdf_a, pdf_b))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let json = response.json::<Value>();
    assert_eq!(json["code"], "INTERNAL_ERROR");
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec![".packing_list_output.pdf.tmp".to_string()]);
}

#[tokio::test]
async fn test_debug_echoes_fields() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);
    let form = MultipartForm::new()
        .add_part("file1", pdf_part(b"%PDF".to_vec(), "a.pdf"))
        .add_text("json_data", "{}");

    let response = server.post("/debug").multipart(form).await;
    response.assert_status_ok();

    let json = response.json::<Value>();
    assert_eq!(json["all_fields"], json!(["file1", "json_data"]));
    assert_eq!(json["files_received"][0]["field_name"], "file1");
    assert_eq!(json["files_received"][0]["filename"], "a.pdf");
    assert_eq!(json["files_received"][0]["content_type"], "application/pdf");
}

#[test]
fn test_output_file_name_strips_directories() {
    assert_eq!(output_file_name("invoice.pdf"), "invoice_output.pdf");
    assert_eq!(
        output_file_name("uploads/bl.final.pdf"),
        "bl.final_output.pdf"
    );
    assert_eq!(output_file_name("../../etc/passwd"), "passwd_output.pdf");
    assert_eq!(output_file_name(""), "document_output.pdf");
}
