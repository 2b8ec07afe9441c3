// G-code post-processing: insert a layer-change notification before every
// slicer layer marker so the firmware echoes `LAYER CHANGE` to the telnet
// session. The block waits for queued moves (`M400`), emits the message on
// the telnet channel (`M118 P4`) and dwells so the camera sees a still head.

use duetlapse_api::LAYER_CHANGE_MARKER;

/// Line prefix the slicer writes at the start of every layer.
pub const SLICER_LAYER_PREFIX: &str = ";LAYER:";

const BLOCK_START: &str = "; -- Timelapse layer change -- start";
const BLOCK_END: &str = "; -- Timelapse layer change -- end";

/// Dwell after the notification, in milliseconds.
pub const DEFAULT_DWELL_MS: u32 = 500;

fn marker_block(dwell_ms: u32) -> [String; 6] {
    [
        ";TYPE:CUSTOM".to_owned(),
        BLOCK_START.to_owned(),
        "M400".to_owned(),
        format!("M118 P4 S\"{LAYER_CHANGE_MARKER}\""),
        format!("G4 P{dwell_ms}"),
        BLOCK_END.to_owned(),
    ]
}

/// Insert the notification block before each `;LAYER:` line.
///
/// Running it on already processed output is a no-op: a layer line directly
/// preceded by the block's end comment is left alone. Line endings are kept
/// as found; the inserted lines use the ending of the layer line they
/// precede.
pub fn inject_layer_markers(source: &str) -> String {
    inject_layer_markers_with_dwell(source, DEFAULT_DWELL_MS)
}

pub fn inject_layer_markers_with_dwell(source: &str, dwell_ms: u32) -> String {
    let block = marker_block(dwell_ms);
    let mut out = String::with_capacity(source.len());
    let mut previous: Option<&str> = None;

    for line in source.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);

        if content.starts_with(SLICER_LAYER_PREFIX)
            && previous.is_none_or(|prev| prev.trim_end() != BLOCK_END)
        {
            let ending = line_ending(line);
            for inserted in &block {
                out.push_str(inserted);
                out.push_str(ending);
            }
        }

        out.push_str(line);
        previous = Some(content);
    }
    out
}

/// Number of layer lines in `source`.
pub fn count_layers(source: &str) -> usize {
    source
        .lines()
        .filter(|line| line.starts_with(SLICER_LAYER_PREFIX))
        .count()
}

fn line_ending(line: &str) -> &'static str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}
