//! Lifetime-based retained buffer.
//!
//! The producer submits each primitive once, with a lifetime. Every frame,
//! [`RetainedBuffer::process`] ages what it holds, drops what expired and
//! re-emits the rest, so the renderer sees the full live scene each frame.
//!
//! Primitives submitted between `BLOCK_INFO(id)` and `BLOCK_INFO(0)` belong
//! to block `id`. Block primitives do not age: they stay until the block is
//! reset, and are emitted only while the block is visible.

use std::collections::HashMap;

use tracing::debug;

use crate::primitive::{DebugPrimitive, DisplayBatch, DisplayType};
use crate::renderer::{deliver_frame, Renderer};

/// One retained primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct RetainedRecord {
    pub primitive: DebugPrimitive,
    /// Seconds left before the record expires.
    pub remaining_lifetime: f32,
    /// Owning block, or 0.
    pub owner_block: u32,
}

/// What [`RetainedBuffer::reset`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    All,
    Block(u32),
}

#[derive(Debug, Default)]
struct Stream {
    records: Vec<RetainedRecord>,
    current_block: u32,
}

/// Per-display streams of retained primitives.
///
/// Mutated only by the thread that drives the frame loop.
#[derive(Debug, Default)]
pub struct RetainedBuffer {
    streams: [Stream; 3],
    /// Known blocks and whether each is visible.
    blocks: HashMap<u32, bool>,
}

impl RetainedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain `primitive` in the `display` stream for `lifetime` seconds.
    ///
    /// A `BLOCK_INFO` record opens (or, with id 0, closes) the block that
    /// owns the following submissions to the same stream. The visibility it
    /// carries applies when the block is first seen; afterwards only
    /// [`RetainedBuffer::set_block_visible`] changes it.
    pub fn submit(&mut self, display: DisplayType, primitive: DebugPrimitive, lifetime: f32) {
        let stream = &mut self.streams[display.index()];
        if let Some((block_id, visible)) = primitive.block_fields() {
            stream.current_block = block_id;
            if block_id != 0 {
                self.blocks.entry(block_id).or_insert(visible);
            }
        }
        stream.records.push(RetainedRecord {
            primitive,
            remaining_lifetime: lifetime,
            owner_block: stream.current_block,
        });
    }

    /// Age every record by `dt` seconds and return what is still alive, by display.
    ///
    /// Only non-empty partitions are returned, in flush order. Records of
    /// hidden blocks are kept but not returned.
    pub fn compact(&mut self, dt: f32) -> Vec<DisplayBatch> {
        let mut batches = Vec::new();
        for display in DisplayType::ALL {
            let stream = &mut self.streams[display.index()];
            let before = stream.records.len();
            let keep = age_stream(&mut stream.records, &self.blocks, dt);

            let mut flags = keep.into_iter();
            stream.records.retain(|_| flags.next().unwrap_or(false));
            if stream.records.len() != before {
                let name = display.name();
                debug!(
                    display = name,
                    expired = before - stream.records.len(),
                    retained = stream.records.len(),
                    "compacted retained stream"
                );
            }

            let primitives: Vec<DebugPrimitive> = stream
                .records
                .iter()
                .filter(|record| self.blocks.get(&record.owner_block).copied().unwrap_or(true))
                .map(|record| record.primitive.clone())
                .collect();
            if !primitives.is_empty() {
                batches.push(DisplayBatch {
                    display,
                    primitives,
                });
            }
        }
        batches
    }

    /// Compact by `dt` and deliver the live set to `renderer` as one frame.
    pub fn process(&mut self, dt: f32, renderer: &mut dyn Renderer) {
        let batches = self.compact(dt);
        deliver_frame(renderer, &batches);
    }

    /// Show or hide a block. Unknown ids are registered.
    pub fn set_block_visible(&mut self, block_id: u32, visible: bool) {
        if block_id != 0 {
            self.blocks.insert(block_id, visible);
        }
    }

    /// Visibility of a known block.
    pub fn is_block_visible(&self, block_id: u32) -> Option<bool> {
        self.blocks.get(&block_id).copied()
    }

    /// Drop every record, or only those owned by one block.
    pub fn reset(&mut self, scope: ResetScope) {
        match scope {
            ResetScope::All => {
                for stream in &mut self.streams {
                    stream.records.clear();
                    stream.current_block = 0;
                }
                self.blocks.clear();
            }
            ResetScope::Block(block_id) => {
                for stream in &mut self.streams {
                    stream.records.retain(|record| record.owner_block != block_id);
                    if stream.current_block == block_id {
                        stream.current_block = 0;
                    }
                }
                self.blocks.remove(&block_id);
            }
        }
        debug!(?scope, "reset retained buffer");
    }

    /// Records currently held, visible or not.
    pub fn len(&self) -> usize {
        self.streams.iter().map(|s| s.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records of one display stream, oldest first.
    pub fn records(&self, display: DisplayType) -> &[RetainedRecord] {
        &self.streams[display.index()].records
    }
}

/// Age one stream and decide which records survive.
///
/// Walks newest to oldest so a state record can see whether any drawing
/// record after it survives.
fn age_stream(records: &mut [RetainedRecord], blocks: &HashMap<u32, bool>, dt: f32) -> Vec<bool> {
    let mut keep = vec![false; records.len()];
    let mut later_alive = false;

    for (index, record) in records.iter_mut().enumerate().rev() {
        let owned = record.owner_block != 0 && blocks.contains_key(&record.owner_block);
        if !owned {
            record.remaining_lifetime -= dt;
        }
        let self_alive = owned || record.remaining_lifetime > 0.0;

        let alive = if record.primitive.command().is_state() {
            self_alive || later_alive
        } else {
            if self_alive {
                later_alive = true;
            }
            self_alive
        };
        keep[index] = alive;
    }
    keep
}
