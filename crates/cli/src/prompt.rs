use anyhow::bail;
use std::io::{BufRead, Write};
use tracing::warn;
use vidprep_core::models::RunOptions;

pub const ASK_ARTIFACTS: &str = "Generate thumbnails and GIFs for videos?";
pub const ASK_TAGS: &str = "Generate tags for thumbnails?";
pub const ASK_CLEAR: &str =
    "Clear thumbnail, GIF, and tag cache? This will back up existing files.";

/// Answers given on the command line. `None` means ask.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preset {
    pub thumbnails: Option<bool>,
    pub tags: Option<bool>,
    pub clear_cache: Option<bool>,
    /// Generation questions default to yes, clearing to no.
    pub yes: bool,
}

/// Asks until the answer is `y` or `n`. End of input is an error.
pub fn ask_yes_no<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> anyhow::Result<bool> {
    loop {
        write!(output, "{question} (y/n): ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("input closed before answering: {question}");
        }
        match line.trim().to_lowercase().as_str() {
            "y" => return Ok(true),
            "n" => return Ok(false),
            _ => warn!("Invalid input, please enter 'y' or 'n'"),
        }
    }
}

/// Fills in every answer the preset leaves open. The cache question is only
/// asked when at least one generation step is enabled.
pub fn resolve_options<R: BufRead, W: Write>(
    preset: Preset,
    input: &mut R,
    output: &mut W,
) -> anyhow::Result<RunOptions> {
    let mut answer = |given: Option<bool>, default: bool, question: &str| match given {
        Some(v) => Ok(v),
        None if preset.yes => Ok(default),
        None => ask_yes_no(input, output, question),
    };

    let generate_artifacts = answer(preset.thumbnails, true, ASK_ARTIFACTS)?;
    let generate_tags = answer(preset.tags, true, ASK_TAGS)?;
    let clear_cache = if generate_artifacts || generate_tags {
        answer(preset.clear_cache, false, ASK_CLEAR)?
    } else {
        if preset.clear_cache == Some(true) {
            warn!("Ignoring cache clear: thumbnail and tag generation are both disabled");
        }
        false
    };

    Ok(RunOptions {
        generate_artifacts,
        generate_tags,
        clear_cache,
    })
}
