//! Reset command implementation

use crate::error::CliError;
use bootcount_core::{reset_boot_count, BootCountDevice, ResetOutcome};

/// Run the resetbc command
pub fn run_resetbc<D: BootCountDevice + ?Sized>(device: &mut D) -> Result<ResetOutcome, CliError> {
    let outcome = reset_boot_count(device)?;

    match outcome {
        ResetOutcome::AlreadyZero => {
            println!("Boot count already zero");
        }
        ResetOutcome::Reset {
            previous_count,
            offset,
            log_full,
        } => {
            if log_full {
                println!("Boot-count log was full; partition erased");
            }
            println!(
                "Boot count reset from {} to zero (record at 0x{:08X})",
                previous_count, offset
            );
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootcount_core::BootCounterRecord;
    use bootcount_dummy::{DummyMtd, Fault};

    #[test]
    fn test_resetbc() {
        let mut flash = DummyMtd::with_geometry(0x8000, 0x1000, 1);
        flash.put_record(0, BootCounterRecord::new(2));

        let outcome = run_resetbc(&mut flash).unwrap();
        assert!(matches!(outcome, ResetOutcome::Reset { previous_count: 2, .. }));
        assert_eq!(run_resetbc(&mut flash).unwrap(), ResetOutcome::AlreadyZero);
    }

    #[test]
    fn test_resetbc_error_exit_code() {
        let mut flash = DummyMtd::with_geometry(0x8000, 0x1000, 1);
        flash.put_magic(0, 0x0BAD_F00D);

        let err = run_resetbc(&mut flash).unwrap_err();
        assert_eq!(err.exit_code(), 3);

        flash.inject(Fault::Geometry);
        let err = run_resetbc(&mut flash).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
