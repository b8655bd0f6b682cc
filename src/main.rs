use std::io::{self, Write};

use bytes::Bytes;
use codestream_rs::config::{load_config, AppConfig, ConfigError};
use codestream_rs::error::DecodeError;
use codestream_rs::fenced::{SegmentEvent, SegmentHandler};
use codestream_rs::fields::{FieldEvent, FieldHandler};
use codestream_rs::observability::init_tracing;
use codestream_rs::stream::{drive, ResponseDecoder};
use futures_util::Stream;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

const CONFIG_PATH: &str = "config.yaml";

fn main() {
    let config = match load_config(CONFIG_PATH) {
        Ok(config) => config,
        Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            eprintln!("See 'config.example.yaml' for the expected layout.");
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);
    let runtime = build_runtime().unwrap_or_else(|e| {
        eprintln!("Failed to initialize Tokio runtime: {e}");
        std::process::exit(1);
    });

    let input = std::env::args().nth(1);
    if let Err(e) = runtime.block_on(run(config, input)) {
        eprintln!("codestream: {e}");
        std::process::exit(1);
    }
}

/// File and stdin reads go through the blocking pool, so no I/O driver is needed.
fn build_runtime() -> io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().build()
}

async fn run(config: AppConfig, input: Option<String>) -> Result<(), DecodeError> {
    let reader: Box<dyn AsyncRead + Unpin> = match input.as_deref() {
        None | Some("-") => Box::new(tokio::io::stdin()),
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
    };
    tracing::info!(
        input = input.as_deref().unwrap_or("<stdin>"),
        mode = %config.decoder.mode,
        chunk_size = config.replay.chunk_size,
        "decoding"
    );

    let mut decoder = ResponseDecoder::new(config.decoder.mode);
    let mut printer = JsonLines::new(io::stdout().lock(), config.output.events);
    let decoded = drive(
        read_chunks(reader, config.replay.chunk_size),
        &mut decoder,
        &mut printer,
    )
    .await?;
    printer.into_result()?;

    if config.output.snapshot {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, &decoded)?;
        writeln!(out)?;
    }
    Ok(())
}

fn read_chunks<R>(reader: R, chunk_size: usize) -> impl Stream<Item = io::Result<Bytes>>
where
    R: AsyncRead + Unpin,
{
    futures_util::stream::unfold(Some(reader), move |reader| async move {
        let mut reader = reader?;
        let mut buf = vec![0u8; chunk_size];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(reader)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

/// Writes each event as one JSON line; the first write error is kept and
/// later events are dropped.
struct JsonLines<W: Write> {
    out: W,
    enabled: bool,
    error: Option<DecodeError>,
}

impl<W: Write> JsonLines<W> {
    fn new(out: W, enabled: bool) -> Self {
        Self {
            out,
            enabled,
            error: None,
        }
    }

    fn emit<T: Serialize>(&mut self, event: &T) {
        if !self.enabled || self.error.is_some() {
            return;
        }
        let written = serde_json::to_writer(&mut self.out, event)
            .map_err(DecodeError::from)
            .and_then(|()| writeln!(self.out).map_err(DecodeError::from));
        if let Err(e) = written {
            self.error = Some(e);
        }
    }

    fn into_result(mut self) -> Result<(), DecodeError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> FieldHandler for JsonLines<W> {
    fn handle(&mut self, event: &FieldEvent) {
        self.emit(event);
    }
}

impl<W: Write> SegmentHandler for JsonLines<W> {
    fn handle(&mut self, event: &SegmentEvent) {
        self.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codestream_rs::config::DecodeMode;
    use codestream_rs::stream::{Decoded, EventLog};

    #[test]
    fn runtime_replays_reader_in_configured_chunks() {
        let runtime = build_runtime().unwrap();
        let input: &[u8] = br#"{"Text":"chunked"}"#;

        let sizes = runtime.block_on(async {
            use futures_util::StreamExt;
            read_chunks(input, 5)
                .map(|chunk| chunk.unwrap().len())
                .collect::<Vec<_>>()
                .await
        });
        assert_eq!(sizes, [5, 5, 5, 3]);

        let decoded = runtime
            .block_on(async {
                let mut decoder = ResponseDecoder::new(DecodeMode::Auto);
                let mut log = EventLog::default();
                drive(read_chunks(input, 5), &mut decoder, &mut log).await
            })
            .unwrap();
        let Decoded::Fields(response) = decoded else {
            panic!("expected fields output");
        };
        assert_eq!(response.text.as_deref(), Some("chunked"));
    }

    #[test]
    fn json_lines_writes_one_event_per_line() {
        let mut printer = JsonLines::new(Vec::new(), true);
        FieldHandler::handle(&mut printer, &FieldEvent::ResponseCompleted);
        SegmentHandler::handle(&mut printer, &SegmentEvent::Reset);
        let out = String::from_utf8(printer.out.clone()).unwrap();
        assert_eq!(
            out,
            "{\"event\":\"response_completed\"}\n{\"event\":\"reset\"}\n"
        );
        assert!(printer.into_result().is_ok());
    }
}
