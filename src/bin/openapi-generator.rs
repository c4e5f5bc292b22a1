//! Print the OpenAPI document of the HTTP surface, for client generation.

use utoipa::OpenApi;
use whose_track_back::services::documentation::ApiDoc;

fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi();
    println!("{}", doc.to_pretty_json()?);
    Ok(())
}
