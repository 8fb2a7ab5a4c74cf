use std::io::{IsTerminal, Write};

use bowbus_codec::{hex, Decoder};
use bowbus_frame::{crc8, FramerEvent, Message};
use bowbus_session::{status_name, ScanResult, WriteOutcome};
use bowbus_transport::PortInfo;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// One framer event, rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum BusLine {
    Message {
        target: String,
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        raw: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        defects: Vec<String>,
        text: String,
    },
    Incomplete {
        raw: String,
        crc: String,
    },
}

impl BusLine {
    pub fn from_event(event: &FramerEvent, decoder: &Decoder) -> Self {
        match event {
            FramerEvent::Message(message) => Self::from_message(message, decoder),
            FramerEvent::Incomplete(bytes) => {
                let covered = bytes.get(..bytes.len().saturating_sub(1)).unwrap_or_default();
                Self::Incomplete {
                    raw: hex(bytes),
                    crc: hex(&[crc8(covered)]),
                }
            }
        }
    }

    pub fn from_message(message: &Message, decoder: &Decoder) -> Self {
        let names = decoder.names();
        let kind = message.kind();
        let defects: Vec<String> = decoder
            .check(message)
            .iter()
            .map(ToString::to_string)
            .collect();
        let body = message.raw().get(3..message.len().saturating_sub(1));
        let text = if defects.is_empty() {
            decoder.describe(message)
        } else {
            String::new()
        };
        Self::Message {
            target: names.devices.name_or_hex(message.target()),
            kind: names.types.name_or_hex(kind.code()),
            source: message.source().map(|id| names.devices.name_or_hex(id)),
            raw: hex(message.raw()),
            body: kind
                .has_command()
                .then(|| hex(body.unwrap_or_default())),
            defects,
            text,
        }
    }

    /// `tgt:MOTOR typ:REQ src:PC [10-0142-080410-e2] [080410] GET DATA(08) ...`
    pub fn pretty(&self) -> String {
        match self {
            Self::Incomplete { raw, crc } => format!("Incomplete: {raw}, crc:{crc}"),
            Self::Message {
                target,
                kind,
                source,
                raw,
                body,
                defects,
                text,
            } => {
                let mut line = format!("tgt:{target} typ:{kind}");
                if let Some(source) = source {
                    line.push_str(&format!(" src:{source}"));
                }
                line.push(' ');
                line.push_str(&split_frame(raw, body.is_some(), source.is_some()));
                if let Some(body) = body {
                    line.push_str(&format!(" [{body}]"));
                }
                for defect in defects {
                    line.push(' ');
                    line.push_str(defect);
                }
                if !text.is_empty() {
                    line.push(' ');
                    line.push_str(text);
                }
                line
            }
        }
    }

    fn raw(&self) -> &str {
        match self {
            Self::Message { raw, .. } | Self::Incomplete { raw, .. } => raw,
        }
    }
}

/// `[start-header-body-crc]` from a hex-encoded frame.
fn split_frame(raw: &str, has_body: bool, has_source: bool) -> String {
    let header_end = if has_source { 6 } else { 4 };
    let (Some(start), Some(header), Some(crc)) = (
        raw.get(..2),
        raw.get(2..header_end),
        raw.get(raw.len().saturating_sub(2)..),
    ) else {
        return format!("[{raw}]");
    };
    if has_body {
        let body = raw.get(header_end..raw.len() - 2).unwrap_or_default();
        format!("[{start}-{header}-{body}-{crc}]")
    } else {
        format!("[{start}-{header}-{crc}]")
    }
}

/// Prints bus lines as they arrive; the table format collects rows and
/// prints them on [`finish`](Self::finish).
pub struct LinePrinter {
    format: OutputFormat,
    rows: Vec<BusLine>,
}

impl LinePrinter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            rows: Vec::new(),
        }
    }

    pub fn print(&mut self, line: BusLine) {
        match self.format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string(&line).unwrap_or_else(|_| "{}".to_string())
            ),
            OutputFormat::Pretty => println!("{}", line.pretty()),
            OutputFormat::Raw => println!("{}", line.raw()),
            OutputFormat::Table => self.rows.push(line),
        }
    }

    pub fn finish(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let mut table = new_table(vec!["TARGET", "TYPE", "SOURCE", "FRAME", "DECODED"]);
        for line in self.rows.drain(..) {
            let row = match line {
                BusLine::Message {
                    target,
                    kind,
                    source,
                    raw,
                    defects,
                    text,
                    ..
                } => vec![
                    target,
                    kind,
                    source.unwrap_or_default(),
                    raw,
                    if defects.is_empty() {
                        text
                    } else {
                        defects.join(" ")
                    },
                ],
                BusLine::Incomplete { raw, crc } => vec![
                    String::new(),
                    "INCOMPLETE".to_string(),
                    String::new(),
                    raw,
                    format!("crc:{crc}"),
                ],
            };
            table.add_row(row);
        }
        println!("{table}");
    }
}

#[derive(Serialize)]
struct ScanRecord {
    descriptor: String,
    id: String,
    offset: u8,
    request: String,
    response: String,
    decoded: String,
}

pub fn print_scan_results(results: &[ScanResult], decoder: &Decoder, format: OutputFormat) {
    let records: Vec<ScanRecord> = results
        .iter()
        .map(|result| ScanRecord {
            descriptor: format!("{:02x}", result.descriptor),
            id: format!("{:02x}", result.id),
            offset: result.offset,
            request: hex(result.request.raw()),
            response: hex(result.response.raw()),
            decoded: decoder.describe(&result.response),
        })
        .collect();

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&records).unwrap_or_else(|_| "[]".to_string())
        ),
        OutputFormat::Table => {
            let mut table = new_table(vec!["TYPE", "ID", "OFFSET", "RESPONSE", "DECODED"]);
            for record in records {
                table.add_row(vec![
                    record.descriptor,
                    record.id,
                    record.offset.to_string(),
                    record.response,
                    record.decoded,
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for result in results {
                println!("{}", result.render(decoder));
            }
        }
        OutputFormat::Raw => {
            for record in records {
                println!("{}", record.response);
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct OutcomeRecord<'a> {
    procedure: &'a str,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

impl<'a> OutcomeRecord<'a> {
    fn new(procedure: &'a str, outcome: Option<&WriteOutcome>, value: Option<&[u8]>) -> Self {
        let (outcome, verified, status) = match outcome {
            Some(WriteOutcome::Unchanged) => ("unchanged", None, None),
            Some(WriteOutcome::Written { verified }) => ("written", Some(*verified), None),
            Some(WriteOutcome::Rejected { status }) => {
                ("rejected", None, Some(status_name(*status)))
            }
            None => ("incomplete", None, None),
        };
        Self {
            procedure,
            outcome,
            verified,
            status,
            value: value.filter(|bytes| !bytes.is_empty()).map(hex),
        }
    }

    fn summary(&self) -> String {
        let mut line = format!("{}: {}", self.procedure, self.outcome);
        match (self.verified, &self.status) {
            (Some(true), _) => line.push_str(" (verified)"),
            (Some(false), _) => line.push_str(" (read-back differs)"),
            (_, Some(status)) => line.push_str(&format!(" ({status})")),
            _ => {}
        }
        line
    }
}

pub fn print_write_outcome(
    procedure: &str,
    outcome: Option<&WriteOutcome>,
    value: Option<&[u8]>,
    format: OutputFormat,
) {
    let record = OutcomeRecord::new(procedure, outcome, value);
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PROCEDURE", "OUTCOME", "VALUE"]);
            table.add_row(vec![
                record.procedure.to_string(),
                record.summary(),
                record.value.clone().unwrap_or_default(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", record.summary()),
        OutputFormat::Raw => println!("{}", record.outcome),
    }
}

#[derive(Serialize)]
struct PortRecord<'a> {
    name: &'a str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    let records: Vec<PortRecord<'_>> = ports
        .iter()
        .map(|port| PortRecord {
            name: &port.name,
            kind: port.kind,
            description: port.description.as_deref(),
        })
        .collect();

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&records).unwrap_or_else(|_| "[]".to_string())
        ),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "KIND", "DESCRIPTION"]);
            for record in &records {
                table.add_row(vec![
                    record.name,
                    record.kind,
                    record.description.unwrap_or(""),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if records.is_empty() {
                println!("no serial ports found");
            }
            for record in &records {
                match record.description {
                    Some(description) => {
                        println!("{}  {}  {description}", record.name, record.kind)
                    }
                    None => println!("{}  {}", record.name, record.kind),
                }
            }
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            for record in &records {
                let _ = writeln!(out, "{}", record.name);
            }
            let _ = out.flush();
        }
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn is_incomplete(line: &BusLine) -> bool {
    matches!(line, BusLine::Incomplete { .. })
}
