use serialprims_frame::FrameReader;
use tracing::debug;

use crate::cmd::ReadArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let request = args.frame.request()?;
    let config = args.frame.read_config()?;
    let port_config = args.port.port_config()?;

    let mut reader = FrameReader::open(&args.path, port_config, config)
        .map_err(|err| frame_error("open failed", err))?;

    for n in 0..args.count {
        let frame = reader
            .read_frame(&request)
            .map_err(|err| frame_error("read failed", err))?;

        if frame.timed_out() && frame.is_empty() {
            if n == 0 {
                let message = format!(
                    "no data from {} within {}",
                    args.path.display(),
                    args.frame.timeout
                );
                return Err(CliError::new(TIMEOUT, message));
            }
            debug!(read = n, "port went quiet before --count was reached");
            break;
        }

        print_frame(&frame, &args.path, format);
    }

    Ok(SUCCESS)
}
