use std::{fs, path::PathBuf};

use delivery_tracking::openapi::ApiDoc;
use utoipa::OpenApi;

/// Writes the OpenAPI document to `openapi/delivery-tracking.v1.json`, or to
/// the directory given as the first argument.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi"));
    let json = serde_json::to_string_pretty(&ApiDoc::openapi())?;

    fs::create_dir_all(&output_dir)?;
    let output_path = output_dir.join("delivery-tracking.v1.json");
    fs::write(&output_path, json)?;

    println!("OpenAPI spec written to {}", output_path.display());
    Ok(())
}
