use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dbgvis_frame::Endian;
use dbgvis_primitive::{DisplayBatch, Frame};
use dbgvis_record::FrameIndexEntry;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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
struct BatchOutput {
    display: &'static str,
    primitives: usize,
    bytes: usize,
    commands: Vec<&'static str>,
}

impl BatchOutput {
    fn from_batch(batch: &DisplayBatch) -> Self {
        Self {
            display: batch.display.name(),
            primitives: batch.primitives.len(),
            bytes: batch.primitives.iter().map(|p| p.wire_size()).sum(),
            commands: batch.primitives.iter().map(|p| p.command().name()).collect(),
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    frame: usize,
    primitive_count: usize,
    batches: Vec<BatchOutput>,
}

/// Print one frame; `index` is its position in the stream being shown.
pub fn print_frame(index: usize, frame: &Frame, format: OutputFormat) {
    let out = FrameOutput {
        frame: index,
        primitive_count: frame.primitive_count(),
        batches: frame.batches().iter().map(BatchOutput::from_batch).collect(),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "DISPLAY", "COUNT", "BYTES", "COMMANDS"]);
            for batch in &out.batches {
                table.add_row(vec![
                    out.frame.to_string(),
                    batch.display.to_string(),
                    batch.primitives.to_string(),
                    batch.bytes.to_string(),
                    batch.commands.join(" "),
                ]);
            }
            if out.batches.is_empty() {
                table.add_row(vec![out.frame.to_string(), "-".into(), "0".into(), "0".into(), String::new()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let groups = out
                .batches
                .iter()
                .map(|b| format!("{}={}", b.display, b.primitives))
                .collect::<Vec<_>>()
                .join(" ");
            println!(
                "frame={} primitives={} {}",
                out.frame, out.primitive_count, groups
            );
        }
    }
}

#[derive(Serialize)]
struct IndexEntryOutput {
    frame: usize,
    offset: u64,
    batches: u32,
    bytes: u32,
}

#[derive(Serialize)]
pub struct RecordingOutput {
    path: String,
    endian: &'static str,
    frame_count: usize,
    total_bytes: u64,
    frames: Vec<IndexEntryOutput>,
}

impl RecordingOutput {
    pub fn new(path: String, endian: Endian, index: &[FrameIndexEntry]) -> Self {
        Self {
            path,
            endian: endian_name(endian),
            frame_count: index.len(),
            total_bytes: index.iter().map(|e| u64::from(e.item_length)).sum(),
            frames: index
                .iter()
                .enumerate()
                .map(|(frame, entry)| IndexEntryOutput {
                    frame,
                    offset: entry.offset,
                    batches: entry.item_count,
                    bytes: entry.item_length,
                })
                .collect(),
        }
    }
}

pub fn print_recording(out: &RecordingOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            println!("Recording: {} ({} endian)", out.path, out.endian);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "OFFSET", "BATCHES", "BYTES"]);
            for entry in &out.frames {
                table.add_row(vec![
                    entry.frame.to_string(),
                    entry.offset.to_string(),
                    entry.batches.to_string(),
                    entry.bytes.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Recording:  {}", out.path);
            println!("  Endian:   {}", out.endian);
            println!("  Frames:   {}", out.frame_count);
            println!("  Bytes:    {}", out.total_bytes);
        }
    }
}

#[derive(Serialize)]
pub struct ServeSummary {
    pub frames_produced: u32,
    pub frames_acknowledged: u32,
    pub viewers: u64,
    pub last_viewer: Option<String>,
}

pub fn print_serve_summary(out: &ServeSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Frames produced:     {}", out.frames_produced);
            println!("Frames acknowledged: {}", out.frames_acknowledged);
            println!("Viewers:             {}", out.viewers);
            if let Some(name) = &out.last_viewer {
                println!("Last viewer:         {name}");
            }
        }
    }
}

pub fn endian_name(endian: Endian) -> &'static str {
    if endian.is_big() {
        "big"
    } else {
        "little"
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
