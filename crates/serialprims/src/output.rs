use std::io::{IsTerminal, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serialprims_frame::{Frame, Terminator};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    port: String,
    text: &'a str,
    raw_size: usize,
    terminator: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    timed_out: bool,
    timestamp: String,
}

#[derive(Serialize)]
struct SentOutput {
    port: String,
    bytes_written: usize,
    timestamp: String,
}

pub fn print_frame(frame: &Frame, port: &Path, format: OutputFormat) {
    let (terminator, index) = terminator_parts(frame.terminator);
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                port: port.display().to_string(),
                text: &frame.text,
                raw_size: frame.raw.len(),
                terminator,
                index,
                timed_out: frame.timed_out(),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TERMINATOR", "SIZE", "TEXT"])
                .add_row(vec![
                    port.display().to_string(),
                    terminator_label(frame.terminator),
                    frame.raw.len().to_string(),
                    escape_text(&frame.text),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "port={} terminator={} size={} text={}",
                port.display(),
                terminator_label(frame.terminator),
                frame.raw.len(),
                escape_text(&frame.text)
            );
        }
        OutputFormat::Raw => print_raw(&frame.raw),
    }
}

pub fn print_sent(port: &Path, bytes_written: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&SentOutput {
            port: port.display().to_string(),
            bytes_written,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("port={} sent={bytes_written}", port.display());
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn terminator_parts(terminator: Terminator) -> (&'static str, Option<usize>) {
    match terminator {
        Terminator::Separator(index) => ("separator", Some(index)),
        Terminator::Keyword(index) => ("keyword", Some(index)),
        Terminator::Limit => ("limit", None),
        Terminator::Timeout => ("timeout", None),
    }
}

pub fn terminator_label(terminator: Terminator) -> String {
    match terminator_parts(terminator) {
        (name, Some(index)) => format!("{name}[{index}]"),
        (name, None) => name.to_string(),
    }
}

/// Make control characters visible for single-line output.
fn escape_text(text: &str) -> String {
    text.chars().flat_map(char::escape_debug).collect()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
