//! `duetlapse inject`: G-code post-processing.

use duetlapse_core::gcode;

use crate::cli::InjectArgs;
use crate::error::CliError;

pub fn handle(args: &InjectArgs) -> Result<(), CliError> {
    let source = std::fs::read_to_string(&args.input)
        .map_err(|e| CliError::file_access(&args.input, e))?;

    let layers = gcode::count_layers(&source);
    if layers == 0 {
        eprintln!("⚠ No ;LAYER: lines in {}, nothing to mark", args.input.display());
        return Ok(());
    }

    let processed = gcode::inject_layer_markers_with_dwell(&source, args.dwell);
    let dest = args.output.as_ref().unwrap_or(&args.input);

    if processed == source && args.output.is_none() {
        eprintln!("✓ {} is already processed", args.input.display());
        return Ok(());
    }

    std::fs::write(dest, processed).map_err(|e| CliError::file_access(dest, e))?;
    eprintln!("✓ {layers} layer changes marked in {}", dest.display());
    Ok(())
}
