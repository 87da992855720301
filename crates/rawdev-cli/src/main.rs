use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use rawdev_core::decoders::{self, MIME_NEF, MIME_PPM};
use rawdev_core::{DevelopOptions, ExifData, Interpolation};

#[derive(Parser)]
#[command(name = "raw2ppm")]
#[command(version, about = "Render camera raw files to PPM", long_about = None)]
struct Cli {
    /// Input file (NEF or PPM)
    #[arg(value_name = "INFILE")]
    input: PathBuf,

    /// Output PPM path
    #[arg(value_name = "OUTFILE")]
    output: PathBuf,

    /// Output color depth in bits per sample (8 or 16)
    #[arg(long, value_name = "BITS", default_value = "8")]
    depth: u32,

    /// Demosaicing method: "ahd" (default) or "bilinear"
    #[arg(long, value_name = "METHOD")]
    interpolation: Option<String>,

    /// Pipeline options file (JSON)
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(long)]
    silent: bool,
}

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        std::process::exit(1);
    });

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }
}

fn parse_interpolation(name: &str) -> Result<Interpolation, String> {
    match name {
        "ahd" => Ok(Interpolation::Ahd),
        "bilinear" => Ok(Interpolation::Bilinear),
        other => Err(format!(
            "unknown interpolation '{}' (expected 'ahd' or 'bilinear')",
            other
        )),
    }
}

fn load_options(path: Option<&PathBuf>) -> Result<DevelopOptions, String> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read options file: {}", e))?;
            serde_json::from_str(&json).map_err(|e| format!("Failed to parse options file: {}", e))
        }
        None => Ok(DevelopOptions::default()),
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let start_time = Instant::now();

    if cli.depth != 8 && cli.depth != 16 {
        return Err(format!("unsupported color depth: {}", cli.depth));
    }

    let mut options = load_options(cli.options.as_ref())?;
    if let Some(name) = cli.interpolation.as_deref() {
        options.interpolation = parse_interpolation(name)?;
    }

    let file = File::open(&cli.input).map_err(|e| format!("Failed to open input: {}", e))?;
    let mut reader = BufReader::new(file);

    let mut header = [0u8; 4];
    let n = reader
        .read(&mut header)
        .map_err(|e| format!("Failed to read input: {}", e))?;
    reader
        .seek(SeekFrom::Start(0))
        .map_err(|e| e.to_string())?;

    let image = match decoders::sniff_mime(&header[..n]) {
        Some(MIME_NEF) => {
            if !cli.silent {
                println!("Decoding {}...", cli.input.display());
            }
            let exif = rawdev_exif::read_nef_metadata(&mut reader).map_err(|e| e.to_string())?;
            if !cli.silent {
                let model = exif
                    .string("Exif.Image.Model")
                    .unwrap_or_else(|_| "unknown".to_owned());
                println!("  Camera: {}", model);
            }
            rawdev_core::pipeline::develop(&mut reader, &exif, &options)
                .map_err(|e| e.to_string())?
        }
        Some(MIME_PPM) => {
            if !cli.silent {
                println!("Reading {}...", cli.input.display());
            }
            rawdev_core::decoders::ppm::read_rgb_image(&mut reader).map_err(|e| e.to_string())?
        }
        _ => {
            return Err(format!(
                "unsupported input format: {}",
                cli.input.display()
            ))
        }
    };

    if !cli.silent {
        println!("  Image: {}x{}", image.width(), image.height());
        println!("Writing {}...", cli.output.display());
    }
    rawdev_core::exporters::write_ppm_file(&image, &cli.output, cli.depth)
        .map_err(|e| e.to_string())?;

    if !cli.silent {
        println!(
            "Done! ({:.2}s)",
            start_time.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interpolation() {
        assert_eq!(parse_interpolation("ahd").unwrap(), Interpolation::Ahd);
        assert_eq!(
            parse_interpolation("bilinear").unwrap(),
            Interpolation::Bilinear
        );
        assert!(parse_interpolation("vng").is_err());
    }

    #[test]
    fn test_options_default_without_file() {
        let options = load_options(None).unwrap();
        assert_eq!(options.interpolation, Interpolation::Ahd);
        assert_eq!(options.gamma_power, 0.45);
        assert_eq!(options.gamma_toe_slope, 4.5);
        assert!(!options.honor_linearization_split);
    }
}
