use dbgvis_primitive::CollectingRenderer;
use dbgvis_session::{RunMode, Session, SessionConfig};

use crate::cmd::PlayArgs;
use crate::exit::{session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: PlayArgs, format: OutputFormat) -> CliResult<i32> {
    let config = SessionConfig {
        mode: RunMode::Local,
        stream_playback_file: Some(args.path.clone()),
        ..SessionConfig::default()
    };
    let mut session = Session::start(config, None).map_err(|err| session_error("open failed", err))?;

    let total = session.playback_frame_count().unwrap_or(0);
    if args.from > 0 && args.from >= total {
        return Err(CliError::new(
            USAGE,
            format!("frame {} out of range ({total} frames)", args.from),
        ));
    }
    let end = args
        .count
        .map_or(total, |count| args.from.saturating_add(count).min(total));

    let mut renderer = CollectingRenderer::new();
    for index in args.from..end {
        session
            .playback_frame(index, &mut renderer)
            .map_err(|err| session_error("playback failed", err))?;
        for frame in renderer.take_frames() {
            print_frame(index, &frame, format);
        }
    }

    Ok(SUCCESS)
}
