use std::{io::Write, process::ExitCode};

use crate::{
    body::{Body, BodyType, MessageBody},
    client::TcpClient,
    error::ConfigError,
    message::{Request, RequestLine, Response},
    parser::{MessageParser, ParserConfig},
};

use super::{
    arg::{PrintMode, SendCommand},
    io::{ProgramInput, ProgramOutput},
};

const CHUNK_SIZE: u32 = 8192;

pub fn send(args: &SendCommand) -> anyhow::Result<ExitCode> {
    let input = if let Some(text) = &args.text {
        ProgramInput::text(text.as_str())
    } else if let Some(path) = &args.file {
        ProgramInput::open(path)?
    } else {
        ProgramInput::open("-")?
    };

    let parser_config = if args.strict {
        ParserConfig::strict()
    } else {
        ParserConfig::default()
    };

    let request = MessageParser::new(parser_config).parse_request(input)?;
    let request = to_outgoing(request, args.uri.clone())?;

    tracing::info!(uri = %request.uri(), method = request.method(), "sending request");

    let mut client = TcpClient::new();
    let response = client.send(request)?;

    let mut output = ProgramOutput::open(&args.output)?;
    let status_code = response.status_code();

    print_response(response, args.print, &mut output)?;
    output.flush()?;

    if let Err(error) = client.close() {
        tracing::warn!(%error, "failed to close connections");
    }

    if status_code < 400 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}

/// Turns a parsed request into one that streams its body from the input.
fn to_outgoing(
    request: Request<MessageBody>,
    uri: Option<url::Url>,
) -> Result<Request, ConfigError> {
    let (request_line, headers, body) = request.into_parts();

    let request_line = match uri {
        Some(uri) => RequestLine {
            uri,
            ..request_line
        },
        None => request_line,
    };

    let body = body.map(|body| match body {
        MessageBody::Lazy(reader) => match (reader.kind(), reader.content_length()) {
            (BodyType::FixedLength, Some(length)) => Body::fixed_length(None, reader, length),
            _ => Body::chunked(None, reader, CHUNK_SIZE),
        },
        MessageBody::Eager(body) => Body::bytes(None, body.into_bytes()),
    });

    let request = Request::from_parts(request_line, headers, None);

    match body {
        Some(body) => request.with_body(body),
        None => Ok(request),
    }
}

fn print_response<W: Write>(
    response: Response,
    mode: PrintMode,
    output: &mut W,
) -> anyhow::Result<()> {
    if mode != PrintMode::Body {
        write!(output, "{}", response)?;
    }

    if mode == PrintMode::Headers {
        return Ok(());
    }

    if let Some(body) = response.into_body() {
        match body {
            MessageBody::Lazy(mut reader) => {
                let len = std::io::copy(&mut reader, output)?;
                tracing::debug!(len, "printed body");

                if let Some(trailer) = reader.trailer() {
                    if mode == PrintMode::All {
                        write!(output, "\r\n{}", trailer)?;
                    }
                }
            }
            MessageBody::Eager(body) => {
                let mut reader = body.reader();
                std::io::copy(&mut reader, output)?;

                if let Some(trailer) = body.trailer() {
                    if mode == PrintMode::All {
                        write!(output, "\r\n{}", trailer)?;
                    }
                }
            }
        }
    }

    Ok(())
}
