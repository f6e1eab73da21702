//! Show command implementation

use crate::error::CliError;
use bootcount_core::{read_boot_count, BootCountDevice, LogStatus};

/// Run the show command
pub fn run_show<D: BootCountDevice + ?Sized>(device: &mut D) -> Result<LogStatus, CliError> {
    let status = read_boot_count(device)?;
    let geo = &status.geometry;
    let state = &status.state;

    println!(
        "Partition: {} bytes, erase size {} (reported {}), record stride {} (write size {})",
        geo.total_size,
        geo.effective_erase_size,
        geo.reported_erase_size,
        geo.record_stride,
        geo.reported_write_size
    );
    println!(
        "Records: {} of {} slots used, {} per erase block",
        state.valid_records, geo.total_records, geo.records_per_block
    );
    match state.free_slot {
        Some(slot) => println!("Next free slot: 0x{:08X}", slot.offset),
        None => println!("Next free slot: none (log full)"),
    }
    println!("Boot count: {}", state.last_count);

    Ok(status)
}
