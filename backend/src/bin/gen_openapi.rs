use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Write the discovery API document next to the crate for client generators
    let spec = presence_backend::api::openapi::ApiDoc::openapi();
    let json = serde_json::to_string_pretty(&spec)?;
    std::fs::write("openapi.json", json)?;
    println!("Wrote openapi.json");
    Ok(())
}
