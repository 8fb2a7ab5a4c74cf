use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bowbus_frame::reader::DEFAULT_READ_CHUNK;
use bowbus_frame::{FrameReader, FramerEvent, ReaderConfig};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, Context, MonitorArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{BusLine, LinePrinter};

pub fn run(args: MonitorArgs, ctx: &Context) -> CliResult<i32> {
    let stream = args.bus.open_stream()?;
    let name = stream.name().to_string();
    let mut reader = FrameReader::with_config_bus(
        stream,
        ReaderConfig {
            chunk_size: DEFAULT_READ_CHUNK,
            read_timeout: Some(args.bus.read_timeout),
        },
    )
    .map_err(|err| frame_error("configure failed", err))?;

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(stop.clone())?;
    info!(bus = %name, "monitoring, Ctrl-C to stop");

    let mut printer = LinePrinter::new(ctx.format);
    let mut seen = 0usize;
    'read: while !stop.load(Ordering::SeqCst) {
        if let Err(err) = reader.poll() {
            printer.finish();
            return Err(frame_error("receive failed", err));
        }
        while let Some(event) = reader.next_event() {
            if matches!(event, FramerEvent::Message(_)) {
                seen += 1;
            }
            printer.print(BusLine::from_event(&event, &ctx.decoder));
            if args.count.is_some_and(|count| seen >= count) {
                break 'read;
            }
        }
    }
    printer.finish();

    info!(messages = seen, "monitor stopped");
    Ok(SUCCESS)
}
