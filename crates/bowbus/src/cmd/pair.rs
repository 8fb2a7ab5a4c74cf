use bowbus_session::{BatteryPairing, DisplayPairing, Procedure, WriteOutcome};

use crate::cmd::{run_procedure, Context, PairBatteryArgs, PairDisplayArgs};
use crate::exit::{session_error, CliResult, FAILURE, SUCCESS};
use crate::output::print_write_outcome;

pub fn run_display(args: PairDisplayArgs, ctx: &Context) -> CliResult<i32> {
    let fields = args.fields.field_map();
    let mut pairing = DisplayPairing::new(usize::from(args.slot) - 1, &fields)
        .map_err(|err| session_error("pair-display", err))?;
    run_procedure(&args.bus, &args.session, &mut pairing)?;

    print_write_outcome(
        pairing.name(),
        pairing.outcome(),
        Some(pairing.display_serial()),
        ctx.format,
    );
    Ok(exit_code(pairing.outcome()))
}

pub fn run_battery(args: PairBatteryArgs, ctx: &Context) -> CliResult<i32> {
    let mut pairing = BatteryPairing::new(&args.fields.field_map());
    run_procedure(&args.bus, &args.session, &mut pairing)?;

    print_write_outcome(
        pairing.name(),
        pairing.outcome(),
        Some(pairing.motor_serial()),
        ctx.format,
    );
    Ok(exit_code(pairing.outcome()))
}

/// Success when the device ends up holding the wanted value.
pub(crate) fn exit_code(outcome: Option<&WriteOutcome>) -> i32 {
    match outcome {
        Some(WriteOutcome::Unchanged) | Some(WriteOutcome::Written { verified: true }) => SUCCESS,
        _ => FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_verified_or_unchanged_succeeds() {
        assert_eq!(exit_code(Some(&WriteOutcome::Unchanged)), SUCCESS);
        assert_eq!(
            exit_code(Some(&WriteOutcome::Written { verified: true })),
            SUCCESS
        );
        assert_eq!(
            exit_code(Some(&WriteOutcome::Written { verified: false })),
            FAILURE
        );
        assert_eq!(exit_code(Some(&WriteOutcome::Rejected { status: 1 })), FAILURE);
        assert_eq!(exit_code(None), FAILURE);
    }
}
