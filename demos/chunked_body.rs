//! Example showing how a body is framed with the chunked coding and read back.
use std::io::{Cursor, Read};

use rawhttp::{
    body::{Body, LazyBodyReader},
    header::HeaderTable,
    parser::ParserConfig,
};

fn main() -> anyhow::Result<()> {
    // Body read from an un-encoded source, 4 bytes per chunk.
    let body = Body::chunked(
        Some("text/plain".to_string()),
        Cursor::new(b"Hello chunked world!".to_vec()),
        4,
    );

    // The body adjusts the headers for its framing.
    let headers = body.headers_from(&HeaderTable::empty());
    print!("{}", headers);

    // The reader produces the bytes as they appear on the wire.
    let mut wire = Vec::new();
    body.into_reader().read_to_end(&mut wire)?;
    println!("{}", wire.escape_ascii());

    // Decoding is done lazily as the body is read.
    let mut reader = LazyBodyReader::chunked(Cursor::new(wire), &ParserConfig::default());

    while let Some(byte) = reader.read_byte()? {
        print!("{}", byte as char);
    }

    println!();

    Ok(())
}
