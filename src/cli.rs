//! Command-line interface implementation

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::output::{save_png, scale_image};
use crate::palette::ThemePalette;
use crate::raster::render_template;
use crate::template::parse_template;

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// themeblit - render palette-themed vector templates to PNG
#[derive(Parser)]
#[command(name = "themeblit")]
#[command(about = "Render palette-themed vector templates to PNG")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rasterize a vector template with a theme palette
    Render {
        /// Input template file
        template: PathBuf,

        /// Assign a palette swatch, e.g. --set bg1=#112233 (repeatable).
        /// Unassigned swatches use a neutral grayscale default.
        #[arg(short, long = "set", value_name = "NAME=COLOR")]
        set: Vec<String>,

        /// Output PNG path. Defaults to the template name with .png
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scale output by integer factor (1-16, default: 1)
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=16))]
        scale: u8,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            template,
            set,
            output,
            scale,
        } => run_render(&template, &set, output.as_deref(), scale),
    }
}

fn run_render(
    template_path: &Path,
    assignments: &[String],
    output: Option<&Path>,
    scale: u8,
) -> ExitCode {
    let palette = match build_palette(assignments) {
        Ok(palette) => palette,
        Err(message) => {
            eprintln!("error: {}", message);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let bytes = match std::fs::read(template_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: cannot read {}: {}", template_path.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let parsed = match parse_template(&bytes) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("error: {}: {}", template_path.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    for warning in &parsed.warnings {
        eprintln!("warning: {}: {}", template_path.display(), warning);
    }

    let image = match render_template(&parsed.template, &palette) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("error: {}: {}", template_path.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let image = scale_image(image, scale);

    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => template_path.with_extension("png"),
    };
    if let Err(e) = save_png(&image, &output_path) {
        eprintln!("error: cannot write {}: {}", output_path.display(), e);
        return ExitCode::from(EXIT_ERROR);
    }

    println!("{}", output_path.display());
    ExitCode::from(EXIT_SUCCESS)
}

/// Build a palette from `name=color` pairs over the neutral default.
fn build_palette(assignments: &[String]) -> Result<ThemePalette, String> {
    let mut entries = Vec::new();
    for assignment in assignments {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=COLOR, got '{}'", assignment))?;
        entries.push((name.trim(), value.trim()));
    }
    ThemePalette::from_entries(entries).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Swatch;
    use image::Rgba;

    #[test]
    fn test_build_palette() {
        let palette = build_palette(&["bg1=#112233".to_string(), "fg1=white".to_string()]).unwrap();
        assert_eq!(palette.get(Swatch::Bg1), Rgba([0x11, 0x22, 0x33, 255]));
    }

    #[test]
    fn test_build_palette_rejects_bad_pairs() {
        assert!(build_palette(&["bg1".to_string()]).is_err());
        assert!(build_palette(&["bg9=#fff".to_string()]).is_err());
        assert!(build_palette(&["bg1=#zzz".to_string()]).is_err());
    }
}
