use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use dbgvis_primitive::{Command, DebugPrimitive, DisplayType, NullRenderer, RetainedBuffer};
use dbgvis_session::{RunMode, Session};
use tracing::{debug, info};

use crate::cmd::{install_ctrlc_handler, ServeArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_serve_summary, OutputFormat, ServeSummary};

/// Block holding the static reference geometry of the demo scene.
const GRID_BLOCK: u32 = 1;

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.session.to_config(RunMode::Server)?;
    let mut session = Session::start(config, None).map_err(|err| session_error("listen failed", err))?;
    if let Some(addr) = session.local_addr() {
        info!(%addr, "waiting for a viewer");
    }

    let running = install_ctrlc_handler()?;
    let interval = Duration::from_millis(args.interval_ms.max(1));
    let mut scene = DemoScene::new();
    let mut summary = ServeSummary {
        frames_produced: 0,
        frames_acknowledged: 0,
        viewers: 0,
        last_viewer: None,
    };
    let mut counter = 0u32;

    while running.load(Ordering::SeqCst) {
        if args.frames.is_some_and(|limit| summary.frames_acknowledged >= limit) {
            break;
        }

        session.process_messages(&mut NullRenderer);
        while let Some(command) = session.get_command() {
            info!(?command, "viewer command");
            if command.first().is_some_and(|word| word == "quit") {
                running.store(false, Ordering::SeqCst);
            }
        }

        if !(session.is_connected() && session.has_good_version()) {
            thread::sleep(interval);
            continue;
        }
        if let Some(name) = session.remote_app_name() {
            if summary.last_viewer.as_deref() != Some(name) {
                info!(viewer = name, "viewer attached");
                summary.last_viewer = Some(name.to_string());
            }
        }
        summary.viewers = session.connection().map_or(0, |c| c.generation());

        let batches = scene.next_frame(counter, interval.as_secs_f32());
        summary.frames_produced += 1;
        if session.send_frame(counter, &batches, &mut NullRenderer) {
            let mut keep_waiting = |_: u32| running.load(Ordering::SeqCst);
            if session.server_wait(Some(&mut keep_waiting)) {
                summary.frames_acknowledged += 1;
            } else {
                debug!(frame = counter, "viewer did not acknowledge");
            }
        }
        counter = counter.wrapping_add(1);
        thread::sleep(interval);
    }

    print_serve_summary(&summary, format);
    Ok(SUCCESS)
}

/// A small animated scene kept in a retained buffer.
///
/// Frame geometry lives for one frame and periodic markers for a second.
/// The grid block persists for the whole run.
struct DemoScene {
    buffer: RetainedBuffer,
}

impl DemoScene {
    fn new() -> Self {
        let mut buffer = RetainedBuffer::new();
        buffer.submit(DisplayType::WorldZ, DebugPrimitive::block_info(GRID_BLOCK, true), 0.0);
        buffer.submit(
            DisplayType::WorldZ,
            DebugPrimitive::from_words(Command::SET_COLOR, &[0x8080_80FF]),
            0.0,
        );
        for step in -2..=2 {
            let at = step as f32;
            buffer.submit(
                DisplayType::WorldZ,
                DebugPrimitive::from_floats(Command::LINE, &[at, 0.0, -2.0, at, 0.0, 2.0]),
                0.0,
            );
            buffer.submit(
                DisplayType::WorldZ,
                DebugPrimitive::from_floats(Command::LINE, &[-2.0, 0.0, at, 2.0, 0.0, at]),
                0.0,
            );
        }
        buffer.submit(DisplayType::WorldZ, DebugPrimitive::block_info(0, false), 0.0);
        Self { buffer }
    }

    fn next_frame(&mut self, counter: u32, dt: f32) -> Vec<(DisplayType, Vec<DebugPrimitive>)> {
        let one_frame = dt * 1.5;
        let angle = counter as f32 * dt;
        let (sin, cos) = angle.sin_cos();

        self.buffer.submit(
            DisplayType::WorldZ,
            DebugPrimitive::from_floats(Command::LINE, &[0.0, 0.0, 0.0, cos, 0.0, sin]),
            one_frame,
        );
        if counter % 60 == 0 {
            self.buffer.submit(
                DisplayType::WorldNoZ,
                DebugPrimitive::from_floats(Command::SPHERE, &[cos, 0.0, sin, 0.1]),
                1.0,
            );
        }
        self.buffer.submit(
            DisplayType::Screen,
            DebugPrimitive::with_text(Command::TEXT, &[8, 8], &format!("frame {counter}")),
            one_frame,
        );

        self.buffer
            .compact(dt)
            .into_iter()
            .map(|batch| (batch.display, batch.primitives))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(batches: &[(DisplayType, Vec<DebugPrimitive>)], display: DisplayType) -> usize {
        batches
            .iter()
            .find(|(d, _)| *d == display)
            .map_or(0, |(_, primitives)| primitives.len())
    }

    #[test]
    fn grid_block_persists_and_frame_geometry_does_not_pile_up() {
        let mut scene = DemoScene::new();
        let first = scene.next_frame(0, 0.016);
        let later = scene.next_frame(1, 0.016);

        // Grid block (marker, color, ten lines, close marker) plus this frame's line.
        assert_eq!(count(&first, DisplayType::WorldZ), 14);
        assert_eq!(count(&later, DisplayType::WorldZ), 14);
        assert_eq!(count(&later, DisplayType::Screen), 1);
    }

    #[test]
    fn markers_linger_for_a_second() {
        let mut scene = DemoScene::new();
        for counter in 0..10 {
            let batches = scene.next_frame(counter, 0.05);
            assert_eq!(count(&batches, DisplayType::WorldNoZ), 1);
        }
        for counter in 10..30 {
            scene.next_frame(counter, 0.05);
        }
        let batches = scene.next_frame(30, 0.05);
        assert_eq!(count(&batches, DisplayType::WorldNoZ), 0);
    }
}
