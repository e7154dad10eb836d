use colloquy_api::router::ApiDoc;
use utoipa::OpenApi;

/// Writes the OpenAPI document for the service, to `openapi.json` unless a
/// path is given as the first argument.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    std::fs::write(&path, ApiDoc::openapi().to_pretty_json()?)?;
    println!("Wrote OpenAPI spec to {path}");
    Ok(())
}
