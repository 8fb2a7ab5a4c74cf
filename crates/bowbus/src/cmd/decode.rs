use bowbus_frame::{Framer, FramerEvent};
use tracing::info;

use crate::cmd::{Context, DecodeArgs};
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::output::{BusLine, LinePrinter};

pub fn run(args: DecodeArgs, ctx: &Context) -> CliResult<i32> {
    let content = std::fs::read(&args.file)
        .map_err(|err| io_error(&format!("cannot read {}", args.file.display()), err))?;
    let bytes = if args.hex {
        hex_text_bytes(&content)
    } else {
        content
    };

    let mut printer = LinePrinter::new(ctx.format);
    let (mut messages, mut incomplete) = (0usize, 0usize);
    let mut framer = Framer::new();
    framer.feed_slice(&bytes, |event| {
        match event {
            FramerEvent::Message(_) => messages += 1,
            FramerEvent::Incomplete(_) => incomplete += 1,
        }
        printer.print(BusLine::from_event(&event, &ctx.decoder));
    });
    printer.finish();

    info!(
        file = %args.file.display(),
        bytes = bytes.len(),
        messages,
        incomplete,
        trailing = framer.pending_len(),
        "capture decoded"
    );
    Ok(SUCCESS)
}

/// Bytes from hex text: consecutive hex digits pair up, every other
/// character is skipped. A trailing odd digit is dropped.
fn hex_text_bytes(text: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = text
        .iter()
        .filter_map(|&c| (c as char).to_digit(16))
        .map(|digit| digit as u8)
        .collect();
    digits
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect()
}
