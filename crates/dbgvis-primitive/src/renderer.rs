use crate::primitive::{DebugPrimitive, DisplayBatch, DisplayType, Frame};

/// The consumer of flushed primitive batches.
///
/// Implementations draw; nothing in dbgvis does. Per frame, each non-empty
/// display partition is handed over with `process_batch` and closed with
/// `flush`, and `flush_frame` ends the frame.
pub trait Renderer {
    fn process_batch(&mut self, primitives: &[DebugPrimitive], display: DisplayType);

    fn flush(&mut self, _display: DisplayType) {}

    fn flush_frame(&mut self) {}
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn process_batch(&mut self, primitives: &[DebugPrimitive], display: DisplayType) {
        (**self).process_batch(primitives, display);
    }

    fn flush(&mut self, display: DisplayType) {
        (**self).flush(display);
    }

    fn flush_frame(&mut self) {
        (**self).flush_frame();
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn process_batch(&mut self, primitives: &[DebugPrimitive], display: DisplayType) {
        (**self).process_batch(primitives, display);
    }

    fn flush(&mut self, display: DisplayType) {
        (**self).flush(display);
    }

    fn flush_frame(&mut self) {
        (**self).flush_frame();
    }
}

/// Hand one frame's batches to a renderer, in order, and end the frame.
pub fn deliver_frame(renderer: &mut dyn Renderer, batches: &[DisplayBatch]) {
    for batch in batches {
        if batch.primitives.is_empty() {
            continue;
        }
        renderer.process_batch(&batch.primitives, batch.display);
        renderer.flush(batch.display);
    }
    renderer.flush_frame();
}

/// Renderer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn process_batch(&mut self, _primitives: &[DebugPrimitive], _display: DisplayType) {}
}

/// Renderer that keeps every flushed frame, for tests and inspection tools.
#[derive(Debug, Default, Clone)]
pub struct CollectingRenderer {
    frames: Vec<Frame>,
    current: Frame,
    flushes: Vec<DisplayType>,
}

impl CollectingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames completed with `flush_frame`, oldest first.
    ///
    /// Their `counter` is the zero-based position in this list.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn take_frames(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.frames)
    }

    /// Every partition flush seen so far.
    pub fn flushes(&self) -> &[DisplayType] {
        &self.flushes
    }
}

impl Renderer for CollectingRenderer {
    fn process_batch(&mut self, primitives: &[DebugPrimitive], display: DisplayType) {
        self.current.push(display, primitives.iter().cloned());
    }

    fn flush(&mut self, display: DisplayType) {
        self.flushes.push(display);
    }

    fn flush_frame(&mut self) {
        let counter = self.frames.len() as u32;
        let mut frame = std::mem::take(&mut self.current);
        frame.counter = counter;
        self.frames.push(frame);
    }
}
