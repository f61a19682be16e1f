//! Header summary of an animation file

use anyhow::{Context, Result};
use ncsc::{Endian, Options, Summary};
use std::path::Path;

use crate::file_io;

/// Handle the inspect command
pub fn handle(input: &Path, options: &Options, json: bool) -> Result<()> {
    let data = file_io::read_input(input)?;

    let summary = match ncsc::read_summary(&data, options) {
        Err(ncsc::Error::NotThisFormat) => {
            eprintln!("{} is not an nCSC file", input.display());
            return Ok(());
        }
        result => result.with_context(|| format!("Failed to read {}", input.display()))?,
    };

    if json {
        let text = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        println!("{}", text);
    } else {
        print!("{}", format_summary(&summary));
    }

    Ok(())
}

fn format_summary(summary: &Summary) -> String {
    let byte_order = match summary.byte_order {
        Endian::Little => "little-endian",
        Endian::Big => "big-endian",
    };

    let mut out = String::new();
    out.push_str(&format!("Magic:           {}\n", summary.magic));
    out.push_str(&format!("Byte order:      {}\n", byte_order));
    out.push_str(&format!("Alignment:       {}\n", summary.alignment));
    out.push_str(&format!("Payload size:    {}\n", summary.payload_size));
    out.push_str(&format!(
        "Aspect ratio:    {} ({})\n",
        summary.aspect_ratio, summary.screen_size
    ));
    out.push_str(&format!("Unk. patterns:   {}\n", summary.unknown_patterns));
    out.push_str(&format!("Sprite crops:    {}\n", summary.sprite_crops));
    out.push_str(&format!("Element banks:   {}\n", summary.element_banks));
    out.push_str(&format!("Elements:        {}\n", summary.elements));
    out.push_str(&format!("Animations:      {}\n", summary.animations));
    out.push_str(&format!("Relocations:     {}\n", summary.relocations));
    out
}
