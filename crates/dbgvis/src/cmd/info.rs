use dbgvis_record::RecordingReader;

use crate::cmd::InfoArgs;
use crate::exit::{record_error, CliResult, SUCCESS};
use crate::output::{print_recording, OutputFormat, RecordingOutput};

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let reader = RecordingReader::open(&args.path).map_err(|err| record_error("open failed", err))?;
    let out = RecordingOutput::new(
        args.path.display().to_string(),
        reader.endian(),
        reader.index(),
    );
    print_recording(&out, format);
    Ok(SUCCESS)
}
