use argh::FromArgs;
use image::RgbaImage;
use ndsgfx::{
    convert::{self, ImportOptions},
    BgMode, Color, Nclr, Ncgr, Nscr, PaletteMode,
};
use std::str::FromStr;

/// Nitro background converter.
#[derive(FromArgs)]
struct Cli {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Import(Import),
    Export(Export),
}

/// Converts an image into NCLR, NCGR and NSCR files.
#[derive(FromArgs)]
#[argh(subcommand, name = "import")]
struct Import {
    /// bits per pixel of the tiles (4 or 8)
    #[argh(option, default = "4")]
    bpp: u8,
    /// background mode (text, affine, extended)
    #[argh(option, default = "BgModeArg(BgMode::Text)")]
    bg_mode: BgModeArg,
    /// backdrop color as RRGGBB, placed at palette index 0
    #[argh(option)]
    backdrop: Option<Rgb>,
    /// use Floyd-Steinberg dithering
    #[argh(switch)]
    dither: bool,

    /// the input image (PNG or BMP)
    #[argh(positional)]
    input: String,
    /// written to `<prefix>.nclr`, `<prefix>.ncgr` and `<prefix>.nscr`
    #[argh(positional)]
    out_prefix: String,
}

/// Renders NCLR, NCGR and NSCR files to an image.
#[derive(FromArgs)]
#[argh(subcommand, name = "export")]
struct Export {
    /// the palette file
    #[argh(positional)]
    nclr: String,
    /// the tileset file
    #[argh(positional)]
    ncgr: String,
    /// the map file
    #[argh(positional)]
    nscr: String,
    /// the output image, format chosen by extension
    #[argh(positional)]
    output: String,
}

struct BgModeArg(BgMode);

impl FromStr for BgModeArg {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        #[rustfmt::skip]
        let Some(mode) = s.eq_ignore_ascii_case("text").then_some(BgMode::Text)
               .or_else(|| s.eq_ignore_ascii_case("affine").then_some(BgMode::Affine))
               .or_else(|| s.eq_ignore_ascii_case("extended").then_some(BgMode::Extended))
        else { return Err("expected text, affine or extended"); };

        Ok(BgModeArg(mode))
    }
}

struct Rgb(Color);

impl FromStr for Rgb {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start_matches('#');
        if s.len() != 6 {
            return Err("expected a RRGGBB color");
        }
        let rgb = u32::from_str_radix(s, 16).map_err(|_| "expected a RRGGBB color")?;
        Ok(Rgb(Color::from_rgb24(rgb)))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Cli { command } = argh::from_env();

    match command {
        Command::Import(options) => import(options),
        Command::Export(options) => export(options),
    }
}

fn import(options: Import) -> Result<(), Box<dyn std::error::Error>> {
    let Import {
        bpp,
        bg_mode: BgModeArg(bg_mode),
        backdrop,
        dither,
        input,
        out_prefix,
    } = options;

    let palette_mode = match bpp {
        4 => PaletteMode::Colors16x16,
        8 => PaletteMode::Colors256x1,
        _ => return Err("bits per pixel must be 4 or 8".into()),
    };

    let image = image::io::Reader::open(&input)?
        .with_guessed_format()?
        .decode()?
        .into_rgba8();
    let width = image.width() as usize;
    let height = image.height() as usize;

    println!("Importing {width}x{height} image `{input}`");

    let colors: Vec<Color> = image
        .pixels()
        .map(|p| {
            let [r, g, b, a] = p.0;
            Color::rgba(r, g, b, a)
        })
        .collect();

    let mut import_options = ImportOptions::default()
        .palette_mode(palette_mode)
        .bg_mode(bg_mode)
        .dithering(dither);
    if let Some(Rgb(backdrop)) = backdrop {
        import_options = import_options.backdrop(backdrop);
    }

    let imported = convert::import(&colors, width, height, &import_options)?;

    // encode everything before touching the disk
    let outputs = [
        (format!("{out_prefix}.nclr"), imported.nclr.write()?),
        (format!("{out_prefix}.ncgr"), imported.ncgr.write()?),
        (format!("{out_prefix}.nscr"), imported.nscr.write()?),
    ];

    write_outputs(&outputs)?;
    for (path, bytes) in &outputs {
        println!("Written {} bytes to `{path}`", bytes.len());
    }

    Ok(())
}

/// Writes every file next to its destination first and only renames once all writes succeeded.
fn write_outputs(outputs: &[(String, Vec<u8>)]) -> std::io::Result<()> {
    let mut staged = Vec::with_capacity(outputs.len());
    for (path, bytes) in outputs {
        let tmp = format!("{path}.tmp");
        if let Err(e) = std::fs::write(&tmp, bytes) {
            for tmp in &staged {
                let _ = std::fs::remove_file(tmp);
            }
            return Err(e);
        }
        staged.push(tmp);
    }

    for ((path, _), tmp) in outputs.iter().zip(&staged) {
        std::fs::rename(tmp, path)?;
    }
    Ok(())
}

fn export(options: Export) -> Result<(), Box<dyn std::error::Error>> {
    let Export {
        nclr,
        ncgr,
        nscr,
        output,
    } = options;

    println!("Exporting `{nscr}`");

    let nclr = Nclr::read(&std::fs::read(&nclr)?)?;
    let ncgr = Ncgr::read(&std::fs::read(&ncgr)?)?;
    let nscr = Nscr::read(&std::fs::read(&nscr)?)?;

    let exported = convert::export(&nclr, &ncgr, &nscr)?;
    let (width, height) = (exported.width, exported.height);

    let mut rgba = Vec::with_capacity(width * height * 4);
    for color in exported.colors {
        rgba.extend_from_slice(&[color.r, color.g, color.b, color.a]);
    }

    RgbaImage::from_vec(width as u32, height as u32, rgba)
        .ok_or("failed to create image")?
        .save(&output)?;

    println!("Written {width}x{height} image to `{output}`");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ndsgfx-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn path(dir: &std::path::Path, name: &str) -> String {
        dir.join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn outputs_are_written() {
        let dir = scratch_dir("written");
        let outputs = [
            (path(&dir, "bg.nclr"), vec![1u8, 2]),
            (path(&dir, "bg.ncgr"), vec![3]),
        ];

        write_outputs(&outputs).unwrap();

        for (path, bytes) in &outputs {
            assert_eq!(&std::fs::read(path).unwrap(), bytes);
            assert!(!PathBuf::from(format!("{path}.tmp")).exists());
        }
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = scratch_dir("failed");
        let first = path(&dir, "bg.nclr");
        let outputs = [
            (first.clone(), vec![1u8, 2]),
            (path(&dir, "missing/bg.ncgr"), vec![3]),
        ];

        assert!(write_outputs(&outputs).is_err());

        assert!(!PathBuf::from(&first).exists());
        assert!(!PathBuf::from(format!("{first}.tmp")).exists());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
