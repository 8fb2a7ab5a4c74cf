use bowbus_session::{ClearError, Procedure};

use crate::cmd::pair::exit_code;
use crate::cmd::{run_procedure, ClearErrorArgs, Context};
use crate::exit::CliResult;
use crate::output::print_write_outcome;

pub fn run(args: ClearErrorArgs, ctx: &Context) -> CliResult<i32> {
    let mut clear = ClearError::new(&args.fields.field_map());
    run_procedure(&args.bus, &args.session, &mut clear)?;

    print_write_outcome(clear.name(), clear.outcome(), None, ctx.format);
    Ok(exit_code(clear.outcome()))
}
