//! End-to-end playback of real lossless WebP streams.

use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use image::codecs::webp::WebPEncoder;
use image::ExtendedColorType;
use webp_player::{
    AlphaFormat, AnimatedImage, DecodeError, DecoderOptions, DecoderState, LoadError, ManualScheduler,
    PixelFormat, SoftwareResourceProvider, WebPCodec,
};

const WIDTH: u32 = 6;
const HEIGHT: u32 = 4;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// A complete single-image file as written by the `image` encoder.
fn encode_still(color: [u8; 4]) -> Vec<u8> {
    let pixels: Vec<u8> = color.repeat((WIDTH * HEIGHT) as usize);
    let mut out = Vec::new();
    WebPEncoder::new_lossless(&mut out)
        .encode(&pixels, WIDTH, HEIGHT, ExtendedColorType::Rgba8)
        .unwrap();
    out
}

/// The `VP8L` chunk (header and padding included) of an encoded still.
fn vp8l_chunk(color: [u8; 4]) -> Vec<u8> {
    let file = encode_still(color);
    let mut pos = 12;
    while pos + 8 <= file.len() {
        let size = u32::from_le_bytes([file[pos + 4], file[pos + 5], file[pos + 6], file[pos + 7]]) as usize;
        let end = (pos + 8 + size + (size & 1)).min(file.len());
        if &file[pos..pos + 4] == b"VP8L" {
            return file[pos..end].to_vec();
        }
        pos = end;
    }
    panic!("encoder produced no VP8L chunk");
}

fn chunk(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = fourcc.to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn u24(value: u32) -> [u8; 3] {
    let b = value.to_le_bytes();
    [b[0], b[1], b[2]]
}

fn animated_file(loop_count: u16, frames: &[([u8; 4], u32)]) -> Vec<u8> {
    let mut vp8x = vec![0x02 | 0x10, 0, 0, 0];
    vp8x.extend_from_slice(&u24(WIDTH - 1));
    vp8x.extend_from_slice(&u24(HEIGHT - 1));
    let mut body = chunk(b"VP8X", &vp8x);

    let mut anim = vec![0, 0, 0, 0];
    anim.extend_from_slice(&loop_count.to_le_bytes());
    body.extend_from_slice(&chunk(b"ANIM", &anim));

    for &(color, duration_ms) in frames {
        let mut anmf = Vec::new();
        anmf.extend_from_slice(&u24(0));
        anmf.extend_from_slice(&u24(0));
        anmf.extend_from_slice(&u24(WIDTH - 1));
        anmf.extend_from_slice(&u24(HEIGHT - 1));
        anmf.extend_from_slice(&u24(duration_ms));
        anmf.push(0);
        anmf.extend_from_slice(&vp8l_chunk(color));
        body.extend_from_slice(&chunk(b"ANMF", &anmf));
    }

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
    out.extend_from_slice(b"WEBP");
    out.extend_from_slice(&body);
    out
}

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn new_image(scheduler: &Rc<ManualScheduler>) -> AnimatedImage {
    AnimatedImage::new(Rc::new(SoftwareResourceProvider), scheduler.clone())
}

fn assert_solid(image: &AnimatedImage, color: [u8; 4]) {
    let frame = image.frame_provider().get_frame().unwrap();
    assert_eq!(frame.descriptor().pixel_format, PixelFormat::Rgba8);
    assert_eq!(frame.size().width, WIDTH);
    assert_eq!(frame.size().height, HEIGHT);
    for px in frame.pixels().chunks_exact(4) {
        assert_eq!(px, color);
    }
}

#[test]
fn test_still_file_decodes_one_frame() {
    let scheduler = Rc::new(ManualScheduler::new());
    let image = new_image(&scheduler);
    image.append_chunk(&encode_still(GREEN)).unwrap();

    let header = image.header().unwrap();
    assert!(!header.is_animated);
    assert_eq!((header.canvas_width, header.canvas_height), (WIDTH, HEIGHT));
    assert_eq!(image.frame_count(), 1);
    assert_eq!(image.loop_count(), 1);
    assert_solid(&image, GREEN);
}

#[test]
fn test_animation_plays_decoded_frames_in_order() {
    let scheduler = Rc::new(ManualScheduler::new());
    let image = new_image(&scheduler);
    image
        .append_chunk(&animated_file(0, &[(RED, 50), (GREEN, 80), (BLUE, 0)]))
        .unwrap();
    assert_eq!(image.frame_count(), 3);
    assert_solid(&image, RED);

    image.play();
    scheduler.advance(ms(50));
    assert_eq!(image.current_frame_index(), 1);
    assert_solid(&image, GREEN);

    scheduler.advance(ms(80));
    assert_eq!(image.current_frame_index(), 2);
    assert_solid(&image, BLUE);

    // A zero duration is shown for the minimum frame time.
    scheduler.advance(ms(16));
    assert_eq!(image.current_frame_index(), 0);
    assert_eq!(image.loop_iteration(), 1);
    assert_solid(&image, RED);
}

#[test]
fn test_chunk_boundaries_do_not_matter() {
    let file = animated_file(2, &[(RED, 30), (GREEN, 40), (BLUE, 50)]);
    for chunk_size in [1, 3, 7, 64, file.len()] {
        let scheduler = Rc::new(ManualScheduler::new());
        let image = new_image(&scheduler);
        for piece in file.chunks(chunk_size) {
            image.append_chunk(piece).unwrap();
        }

        assert_eq!(image.frame_count(), 3, "chunk size {}", chunk_size);
        assert_eq!(image.loop_count(), 2);
        let durations: Vec<Duration> = (0..3)
            .map(|i| image.frame_metadata(i).unwrap().duration)
            .collect();
        assert_eq!(durations, vec![ms(30), ms(40), ms(50)]);
    }
}

#[test]
fn test_header_only_stream_has_no_frames() {
    let file = animated_file(0, &[(RED, 30)]);
    let scheduler = Rc::new(ManualScheduler::new());
    let image = new_image(&scheduler);

    // RIFF header, VP8X and ANIM chunks.
    image.append_chunk(&file[..12 + 18 + 14]).unwrap();
    assert_eq!(image.state(), DecoderState::ReadingFrames);
    assert_eq!(image.frame_count(), 0);
    assert!(matches!(
        image.frame_provider().get_frame(),
        Err(DecodeError::InsufficientData)
    ));
}

#[test]
fn test_load_file_finishes_stream() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&animated_file(1, &[(RED, 100), (BLUE, 100)])).unwrap();

    let scheduler = Rc::new(ManualScheduler::new());
    let options = DecoderOptions {
        read_chunk_size: 13,
        premultiply_alpha: false,
        ..DecoderOptions::default()
    };
    let image = AnimatedImage::with_options(
        Rc::new(SoftwareResourceProvider),
        scheduler.clone(),
        Box::new(WebPCodec),
        options,
    );
    assert_eq!(image.load_file(file.path()).unwrap(), DecoderState::Finished);
    assert_eq!(image.frame_count(), 2);

    image.play();
    scheduler.advance(ms(100));
    assert_solid(&image, BLUE);
    scheduler.advance(ms(100));
    assert!(!image.is_playing());
    assert_eq!(image.current_frame_index(), 1);

    let frame = image.frame_provider().get_frame().unwrap();
    assert_ne!(frame.descriptor().alpha_format, AlphaFormat::Premultiplied);
}

#[test]
fn test_load_truncated_file_fails() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&animated_file(0, &[(RED, 100)])[..20]).unwrap();

    let scheduler = Rc::new(ManualScheduler::new());
    let image = new_image(&scheduler);
    let err = image.load_file(file.path()).unwrap_err();
    assert!(matches!(err, LoadError::Decode(DecodeError::Truncated)));
    assert_eq!(image.state(), DecoderState::Error);
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = Rc::new(ManualScheduler::new());
    let image = new_image(&scheduler);

    let err = image.load_file(dir.path().join("missing.webp")).unwrap_err();
    assert!(matches!(err, LoadError::Io(_)));
    assert_eq!(image.state(), DecoderState::WaitingForHeader);
}
