use clap::Parser;

#[derive(Debug, Parser)]
#[clap(version, about, long_about = None)]
pub struct Opt {
    /// Input image (PNG or JPEG).
    #[clap(parse(from_os_str))]
    pub input: std::path::PathBuf,

    /// Output video file. Defaults to the input's file stem with an `.mp4`
    /// extension.
    #[clap(parse(from_os_str))]
    pub output: Option<std::path::PathBuf>,

    /// Final palette size: the driver animates every step from 2 up to this
    /// many colours.
    #[clap(short, long, default_value_t = 16)]
    pub colours: usize,

    /// Apply Floyd–Steinberg error diffusion when remapping pixels onto each
    /// palette; `false` assigns each pixel its nearest palette entry with no
    /// dithering.
    #[clap(short, long, parse(try_from_str), default_value_t = false)]
    pub dither: bool,

    /// Frames per second of the rendered visualisation.
    #[clap(short, long, default_value_t = 2)]
    pub framerate: u32,

    /// Height in pixels of the palette swatch strip drawn under each frame.
    #[clap(long, default_value_t = 48)]
    pub swatch_height: u32,

    /// Print per-frame progress.
    #[clap(short, long)]
    pub verbose: bool,
}

/// Build the default output path from the input's file stem.
pub fn default_output(opt: &Opt) -> std::path::PathBuf {
    let stem = opt
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    std::path::PathBuf::from(format!("{stem}-pnn.mp4"))
}
