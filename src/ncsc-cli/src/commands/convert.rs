//! Conversion between animation files and JSON documents

use anyhow::{Context, Result};
use ncsc::{Document, Options};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::file_io;

/// Handle the convert command
///
/// Returns the path written, or `None` when the input is not an nCSC file.
pub fn handle(input: &Path, output: Option<&Path>, options: &Options) -> Result<Option<PathBuf>> {
    let output = file_io::output_path(input, output);

    if file_io::is_document(input) {
        encode_file(input, &output, options)?;
    } else if !decode_file(input, &output, options)? {
        eprintln!("{} is not an nCSC file", input.display());
        return Ok(None);
    }

    Ok(Some(output))
}

/// Decode an animation file; `false` if the input has no nCSC payload
fn decode_file(input: &Path, output: &Path, options: &Options) -> Result<bool> {
    let data = file_io::read_input(input)?;

    let document = match ncsc::decode(&data, options) {
        Err(ncsc::Error::NotThisFormat) => return Ok(false),
        result => result.with_context(|| format!("Failed to decode {}", input.display()))?,
    };

    info!(
        "Decoded {} ({} elements, {} animations)",
        input.display(),
        document.element_count(),
        document.animations.len()
    );

    let json = document.to_json().context("Failed to serialize document")?;
    file_io::write_atomic(output, json.as_bytes())?;
    info!("Wrote {}", output.display());

    Ok(true)
}

fn encode_file(input: &Path, output: &Path, options: &Options) -> Result<()> {
    let data = file_io::read_input(input)?;
    let json = String::from_utf8(data)
        .with_context(|| format!("{} is not valid UTF-8", input.display()))?;

    let document = Document::from_json(&json)
        .with_context(|| format!("Failed to parse {}", input.display()))?;
    let bytes = ncsc::encode(&document, options)
        .with_context(|| format!("Failed to encode {}", input.display()))?;

    file_io::write_atomic(output, &bytes)?;
    info!("Wrote {} ({} bytes)", output.display(), bytes.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncsc::{
        AspectRatio, Animation, Element, ElementAnimation, Endian, Keyframe, KeyframeValue,
        MiscInfo, MotionKind, MotionTrack, Platform,
    };
    use std::fs;

    fn document() -> Document {
        Document {
            info: MiscInfo {
                magic: "TEST".to_string(),
                aspect_ratio: AspectRatio::new(30, 17),
                screen_size: "480x272".to_string(),
                byte_order: Endian::Little,
                alignment: ncsc::DEFAULT_ALIGNMENT,
                header_floats: [0.0, 60.0, 0.0, 60.0],
            },
            unknown_patterns: Vec::new(),
            sprite_crops: Vec::new(),
            element_banks: vec![vec![
                Element::new(0, "body"),
                Element::new(1, "head").with_parent(0),
            ]],
            animations: vec![Animation {
                name: "walk".to_string(),
                length_range: [0.0, 30.0],
                banks: vec![vec![
                    ElementAnimation {
                        index: 0,
                        tracks: vec![MotionTrack {
                            motion: MotionKind::PosY,
                            loop_mode: 0,
                            keyframes: vec![Keyframe {
                                timestamp: 0,
                                data: KeyframeValue::Float(4.5),
                                tweening: 1,
                                ease_in: 0.0,
                                ease_out: 0.0,
                                unk: 0.0,
                            }],
                        }],
                    },
                    ElementAnimation {
                        index: 1,
                        tracks: Vec::new(),
                    },
                ]],
            }],
        }
    }

    #[test]
    fn test_encode_then_decode_files() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("walk.json");
        fs::write(&json_path, document().to_json().unwrap()).unwrap();

        let options = Options::new(Platform::Standard);
        let binary = handle(&json_path, None, &options).unwrap().unwrap();
        assert_eq!(binary, dir.path().join("walk"));
        assert!(ncsc::is_ncsc(&fs::read(&binary).unwrap()));

        // Decoding writes walk.json next to the binary, replacing the source
        let decoded_path = handle(&binary, None, &options).unwrap().unwrap();
        assert_eq!(decoded_path, json_path);
        let decoded = Document::from_json(&fs::read_to_string(&decoded_path).unwrap()).unwrap();
        assert_eq!(decoded, document());
    }

    #[test]
    fn test_not_ncsc_input_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        fs::write(&input, b"just some text, long enough to hold a header").unwrap();

        let result = handle(&input, None, &Options::default()).unwrap();
        assert!(result.is_none());
        assert!(!dir.path().join("notes.txt.json").exists());
    }

    #[test]
    fn test_invalid_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.json");
        fs::write(&input, b"{ not json").unwrap();

        let err = handle(&input, None, &Options::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.json"));
        assert!(!dir.path().join("broken").exists());
    }

    #[test]
    fn test_explicit_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("walk.json");
        fs::write(&input, document().to_json().unwrap()).unwrap();
        let target = dir.path().join("custom.bin");

        let written = handle(&input, Some(&target), &Options::default())
            .unwrap()
            .unwrap();
        assert_eq!(written, target);
        assert!(target.exists());
    }
}
