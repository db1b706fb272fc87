//! webp-player - stream an animated WebP file and play it in real time

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use smol::{LocalExecutor, Timer};

use webp_player::decoder::rgb_conversion::read_rgba8;
use webp_player::options::{DEFAULT_MIN_FRAME_DURATION, DEFAULT_READ_CHUNK_SIZE};
use webp_player::{
    AnimatedImage, DecoderOptions, Image, LocalTimerScheduler, SoftwareResourceProvider, WebPCodec,
};

/// How often the render loop polls for a frame change
const POLL_INTERVAL: Duration = Duration::from_millis(4);

/// Stream a WebP file into the incremental decoder and play it.
#[derive(Parser, Debug)]
#[command(name = "webp-player", version, about = "Incremental animated WebP player")]
struct Args {
    /// WebP file to play
    file: PathBuf,

    /// Bytes fed to the decoder per append
    #[arg(long, default_value_t = DEFAULT_READ_CHUNK_SIZE, value_name = "BYTES")]
    chunk_size: usize,

    /// How long to play before exiting
    #[arg(long, default_value_t = 3000, value_name = "MS")]
    play_ms: u64,

    /// Shortest time a frame stays on screen
    #[arg(long, default_value_t = DEFAULT_MIN_FRAME_DURATION.as_millis() as u64, value_name = "MS")]
    min_frame_ms: u64,

    /// Write every displayed frame to this directory as PNG
    #[arg(long, value_name = "DIR")]
    dump_dir: Option<PathBuf>,

    /// Decode frames with straight instead of premultiplied alpha
    #[arg(long)]
    straight_alpha: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let executor = Rc::new(LocalExecutor::new());
    let scheduler = Rc::new(LocalTimerScheduler::new(executor.clone()));
    let options = DecoderOptions {
        min_frame_duration: Duration::from_millis(args.min_frame_ms),
        premultiply_alpha: !args.straight_alpha,
        read_chunk_size: args.chunk_size,
        ..DecoderOptions::default()
    };
    let image = AnimatedImage::with_options(
        Rc::new(SoftwareResourceProvider),
        scheduler,
        Box::new(WebPCodec),
        options,
    );

    let start = Instant::now();
    image
        .load_file(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    let header = image.header().context("Stream has no header")?;
    println!(
        "{}: {}x{}, {} frame(s), loop count {}, alpha {}, parsed in {:?}",
        args.file.display(),
        header.canvas_width,
        header.canvas_height,
        image.frame_count(),
        image.loop_count(),
        header.has_alpha,
        start.elapsed()
    );
    for index in 0..image.frame_count() {
        if let Some(meta) = image.frame_metadata(index) {
            println!(
                "  frame {}: {}x{} at ({}, {}), {:?}, {:?}/{:?}",
                meta.index,
                meta.width,
                meta.height,
                meta.offset_x,
                meta.offset_y,
                meta.duration,
                meta.blend,
                meta.dispose
            );
        }
    }

    if let Some(dir) = &args.dump_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    image.play();
    let provider = image.frame_provider();
    let deadline = Instant::now() + Duration::from_millis(args.play_ms);
    let shown = smol::block_on(executor.run(async {
        let mut last_index = None;
        let mut shown = 0usize;
        loop {
            let index = provider.current_frame_index();
            if last_index != Some(index) {
                last_index = Some(index);
                match provider.get_frame() {
                    Ok(frame) => {
                        shown += 1;
                        log::info!("Showing frame {} ({})", index, frame.size());
                        if let Some(dir) = &args.dump_dir {
                            let path = dump_frame(&frame, dir, index)?;
                            log::debug!("Wrote {}", path.display());
                        }
                    }
                    Err(e) => log::warn!("Frame {} unavailable: {}", index, e),
                }
            }
            if Instant::now() >= deadline || !image.is_playing() {
                break;
            }
            Timer::after(POLL_INTERVAL).await;
        }
        Ok::<_, anyhow::Error>(shown)
    }))?;

    image.stop();
    println!(
        "Displayed {} frame(s), stopped on frame {} after {} loop(s)",
        shown,
        image.current_frame_index(),
        image.loop_iteration()
    );
    Ok(())
}

fn dump_frame(frame: &Image, dir: &Path, index: u32) -> Result<PathBuf> {
    let size = frame.size();
    let rgba = read_rgba8(frame.pixels(), frame.descriptor());
    let buffer = image::RgbaImage::from_raw(size.width, size.height, rgba)
        .context("Frame buffer does not match its size")?;
    let path = dir.join(format!("frame_{:04}.png", index));
    buffer
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
