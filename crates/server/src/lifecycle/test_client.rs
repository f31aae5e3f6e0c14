//! HTTP client helper for exercising real listeners.

use std::net::SocketAddr;

use reqwest::header::AUTHORIZATION;

/// Send `GET path` and return the status code and decoded body.
///
/// Each call uses its own client without idle pooling, so no keep-alive
/// connection outlives the request and holds up a drain.
pub async fn get(addr: SocketAddr, path: &str, authorization: Option<&str>) -> (u16, String) {
    let client = reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();

    let mut request = client.get(format!("http://{addr}{path}"));
    if let Some(value) = authorization {
        request = request.header(AUTHORIZATION, value);
    }

    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}
