use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use dbgvis_frame::FrameError;
use dbgvis_primitive::CollectingRenderer;
use dbgvis_session::{RunMode, Session, SessionConfig, SessionError};
use dbgvis_transport::TransportError;
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, parse_timeout, ViewArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: ViewArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.session.to_config(RunMode::Client)?;
    let timeout = parse_timeout(&args.timeout)?;
    let mut session = connect_with_timeout(&config, timeout)?;
    let poll = config.poll_interval();

    let running = install_ctrlc_handler()?;
    let mut renderer = CollectingRenderer::new();
    let mut printed = 0usize;
    let mut announced = false;

    while running.load(Ordering::SeqCst) {
        // Drain once more after the producer hangs up.
        let connected = session.is_connected();
        session.process_messages(&mut renderer);

        if !announced && session.has_good_version() {
            if let Some(name) = session.remote_app_name() {
                info!(producer = name, "producer attached");
            }
            // Side channels open once versions match.
            for command in &args.commands {
                if !session.send_command(command) {
                    warn!(command = %command, "command not sent");
                }
            }
            announced = true;
        }

        for frame in renderer.take_frames() {
            print_frame(printed, &frame, format);
            printed += 1;
            if args.count.is_some_and(|count| printed >= count) {
                return Ok(SUCCESS);
            }
        }

        if !connected {
            info!(frames = printed, "producer disconnected");
            break;
        }
        thread::sleep(poll);
    }

    Ok(SUCCESS)
}

fn connect_with_timeout(config: &SessionConfig, timeout: Duration) -> CliResult<Session> {
    let start = Instant::now();
    loop {
        match Session::start(config.clone(), None) {
            Ok(session) => return Ok(session),
            Err(err) => {
                if !is_retryable_connect_error(&err) {
                    return Err(session_error("connect failed", err));
                }
                if start.elapsed() >= timeout {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("connect timed out after {timeout:?}"),
                    ));
                }
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn is_retryable_connect_error(err: &SessionError) -> bool {
    match err {
        SessionError::Frame(FrameError::Transport(TransportError::Connect { source, .. })) => {
            matches!(
                source.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::TimedOut
            )
        }
        _ => false,
    }
}
