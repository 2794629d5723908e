//! Fetch a URL over HTTP/2 and print the response.
//!
//! Usage: cargo run --example h2_get -- https://example.com/

use h2wire::types::Request;
use h2wire::H2;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com/".to_string());

    let client = H2::new();
    let response = client.send_request(Request::get(&target)?).await?;

    println!("{} {}", response.protocol, response.status);
    for header in &response.headers {
        println!("{}", header);
    }
    println!();
    println!("{}", response.text());

    Ok(())
}
