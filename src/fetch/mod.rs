mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use crate::error::SourceUnavailable;

/// Issues a GET for `url` and returns the body.
///
/// Any non-success status is reported as [`SourceUnavailable::Status`].
pub async fn fetch_bytes<C: HttpClient>(
    client: &C,
    url: &str,
) -> Result<Vec<u8>, SourceUnavailable> {
    let parsed = reqwest::Url::parse(url).map_err(|e| SourceUnavailable::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client.execute(req).await?;
    if !resp.status().is_success() {
        return Err(SourceUnavailable::Status {
            status: resp.status().as_u16(),
            url: url.to_string(),
        });
    }
    Ok(resp.bytes().await?.to_vec())
}
