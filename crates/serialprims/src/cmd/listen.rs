use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serialprims_frame::FrameReader;
use tracing::info;

use crate::cmd::ListenArgs;
use crate::exit::{frame_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let request = args.frame.request()?;
    let config = args.frame.read_config()?;
    let port_config = args.port.port_config()?;

    let mut reader = FrameReader::open(&args.path, port_config, config)
        .map_err(|err| frame_error("open failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(path = %args.path.display(), "listening");
    let mut printed = 0usize;

    // Each read returns at its timeout, so the flag is checked at least that often.
    while running.load(Ordering::SeqCst) {
        let frame = reader
            .read_frame(&request)
            .map_err(|err| frame_error("read failed", err))?;

        if frame.timed_out() && frame.is_empty() {
            continue;
        }

        print_frame(&frame, &args.path, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    info!(frames = printed, "listen finished");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
