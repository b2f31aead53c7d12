//! Example showing how to send requests over a kept-alive connection.
use rawhttp::{client::TcpClient, header::HeaderTableBuilder, message::Request};
use url::Url;

fn main() -> anyhow::Result<()> {
    let uri = Url::parse("http://example.com/")?;

    // The client keeps one connection per host and reuses it while the
    // server allows it.
    let mut client = TcpClient::new();

    for _ in 0..2 {
        // `Request::new()` adds the Host header. Replacing the headers keeps it.
        let headers = HeaderTableBuilder::new()
            .with("Accept", "text/html")
            .with("User-Agent", "rawhttp-example")
            .build();
        let request = Request::new("GET", uri.clone()).with_headers(headers);

        let response = client.send(request)?;
        println!("{}", response.status_line());

        for (name, value) in response.headers() {
            println!("{}: {}", name, value);
        }

        // A body is read lazily from the connection. It must be read to the
        // end before the next request reuses the connection.
        if let Some(body) = response.into_body() {
            let body = body.eager()?;
            println!("Body is {} bytes", body.len());
        }

        println!("Tracked connections: {}", client.manager().len());
    }

    // Shut down the connections still open.
    client.close()?;

    Ok(())
}
