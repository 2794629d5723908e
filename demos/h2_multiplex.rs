//! Issue several requests over one HTTP/2 connection.

use h2wire::types::{ClientTimeouts, Request};
use h2wire::H2Connection;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com".to_string());

    let request = Request::get(&base)?;
    let timeouts = ClientTimeouts::default();
    let mut connection = H2Connection::connect(&request.target, &timeouts).await?;
    println!("negotiated {}", connection.protocol());

    let paths = ["/", "/robots.txt", "/favicon.ico"];
    let mut receivers = Vec::new();
    for path in paths {
        let request = Request::get(&format!("{}{}", base.trim_end_matches('/'), path))?;
        receivers.push((path, connection.dispatch(&request)?));
    }
    connection.flush().await?;

    let mut outstanding = receivers.len();
    while outstanding > 0 {
        connection.drive().await?;
        for (path, receiver) in &mut receivers {
            if let Ok(result) = receiver.try_recv() {
                match result {
                    Ok(response) => {
                        println!("{}: {} ({} bytes)", path, response.status, response.body.len())
                    }
                    Err(err) => println!("{}: {}", path, err),
                }
                outstanding -= 1;
            }
        }
    }

    println!(
        "sent {} bytes, received {} bytes",
        connection.bytes_sent(),
        connection.bytes_received()
    );
    connection.shutdown().await;
    Ok(())
}
