//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the check-in API to disk, by default to
//! `openapi.json`. Pass a path as the first argument to write elsewhere.

use api_lib::web::rest::ApiDoc;
use std::path::Path;
use utoipa::OpenApi;

fn write_spec(api_doc: utoipa::openapi::OpenApi, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let spec_json = api_doc.to_pretty_json()?;
    std::fs::write(path, spec_json)?;
    println!(
        "OpenAPI document with {} paths written to {}",
        ApiDoc::openapi().paths.paths.len(),
        path.display()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    write_spec(ApiDoc::openapi(), Path::new(&target))
}
