//! services/api/src/bin/openapi.rs
//!
//! Dumps the OpenAPI 3.0 document for the devotion journal API to disk, for
//! client generation and CI diffing without a running server.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional first argument overrides the output path.
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());

    let spec = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&path, &spec)?;
    println!("Wrote the OpenAPI document to {path} ({} bytes).", spec.len());
    Ok(())
}
