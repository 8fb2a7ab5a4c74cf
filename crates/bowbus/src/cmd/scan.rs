use bowbus_session::Scan;

use crate::cmd::{run_procedure, Context, ScanArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::print_scan_results;

pub fn run(args: ScanArgs, ctx: &Context) -> CliResult<i32> {
    let mut scan = match args.types {
        Some(types) => Scan::with_types(args.target, types),
        None => Scan::new(args.target),
    };
    let outcome = run_procedure(&args.bus, &args.session, &mut scan)?;
    tracing::info!(
        target_device = scan.target(),
        commands = outcome.commands_sent,
        found = scan.results().len(),
        "scan finished"
    );
    print_scan_results(scan.results(), &ctx.decoder, ctx.format);
    Ok(SUCCESS)
}
