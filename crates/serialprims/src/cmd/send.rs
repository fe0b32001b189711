use std::fs;

use serialprims_frame::{FrameReader, FrameRequest, FrameWriter};
use serialprims_port::SerialPort;
use tracing::debug;

use crate::cmd::parse::{parse_duration, parse_escapes};
use crate::cmd::SendArgs;
use crate::exit::{frame_error, io_error, port_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_frame, print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let line_ending = args.line_ending.as_deref().map(parse_escapes).transpose()?;
    let reply = if args.wait {
        Some(reply_request(&args)?)
    } else {
        None
    };

    let port = SerialPort::open(&args.path, args.port.port_config()?)
        .map_err(|err| port_error("open failed", err))?;

    let mut writer =
        FrameWriter::with_line_ending(port, line_ending.as_deref().unwrap_or_default());
    let written = match line_ending {
        Some(_) => writer.send_line(&payload),
        None => writer.send(&payload),
    }
    .map_err(|err| frame_error("send failed", err))?;
    debug!(bytes = written, "payload sent");

    let Some(request) = reply else {
        print_sent(&args.path, written, format);
        return Ok(SUCCESS);
    };

    let mut reader = FrameReader::new(writer.into_inner());
    let frame = reader
        .read_frame(&request)
        .map_err(|err| frame_error("receive failed", err))?;
    if frame.timed_out() && frame.is_empty() {
        return Err(CliError::new(
            TIMEOUT,
            format!("no reply within {}", args.wait_timeout),
        ));
    }
    print_frame(&frame, &args.path, format);

    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return parse_escapes(data);
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

fn reply_request(args: &SendArgs) -> CliResult<FrameRequest> {
    let timeout = parse_duration(&args.wait_timeout)?;
    let mut request = FrameRequest::line(timeout);
    if !args.separators.is_empty() {
        let separators = args
            .separators
            .iter()
            .map(|sep| parse_escapes(sep))
            .collect::<CliResult<Vec<_>>>()?;
        request = request.separators(separators);
    }
    Ok(request)
}
