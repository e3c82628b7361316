mod args;

use crate::args::Opt;

use clap::Parser;
use pnnquant::{compose_frame, quantize, remap, DynImageSource, FfmpegFrameSink, FrameSink};

fn main() {
    env_logger::init();

    if let Err(e) = try_main() {
        eprintln!("pnnquant: {e}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::parse();
    let output = opt.output.clone().unwrap_or_else(|| args::default_output(&opt));

    if opt.colours < 2 {
        return Err(format!("--colours must be at least 2, got {}", opt.colours).into());
    }

    let input_image = image::open(&opt.input)?.into_rgba8();
    let source = DynImageSource::new(input_image);

    let mut sink = FfmpegFrameSink::spawn(&output, opt.framerate)?;
    let dither = if opt.dither {
        pnnquant::Dither::FloydSteinberg
    } else {
        pnnquant::Dither::None
    };

    for k in 2..=opt.colours {
        log::debug!("quantising k={k}");
        let palette = quantize(&source, k)?;
        let paletted = remap(&source, &palette, dither);
        let frame = compose_frame(&paletted, &palette, opt.swatch_height);
        sink.write_frame(&frame)?;

        if opt.verbose {
            println!("k={k}: {} colours", palette.len());
        }
    }

    sink.finish()?;
    Ok(())
}
