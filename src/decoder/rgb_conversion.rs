use crate::render::{AlphaFormat, ImageDataDescriptor, PixelFormat};

/// Multiply a color channel by alpha, rounding to nearest.
#[inline]
fn premultiply(channel: u8, alpha: u8) -> u8 {
    ((u16::from(channel) * u16::from(alpha) + 127) / 255) as u8
}

/// Write interleaved straight-alpha RGBA8 pixels into a target buffer of
/// arbitrary layout.
///
/// The codec output is always RGBA8 with straight alpha. The target may ask
/// for BGRA channel order, premultiplied alpha, or opaque pixels (alpha
/// forced to 255), and may have padding at the end of each row.
///
/// # Arguments
/// * `src` - Tightly packed RGBA8 pixels, `width * height * 4` bytes
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `descriptor` - Layout of `dst`
/// * `dst` - Target memory, at least `descriptor.required_bytes()` long
pub fn write_rgba8(
    src: &[u8],
    width: usize,
    height: usize,
    descriptor: &ImageDataDescriptor,
    dst: &mut [u8],
) {
    let is_bgra = descriptor.pixel_format == PixelFormat::Bgra8;
    let src_pitch = width * 4;

    for y in 0..height {
        let src_row = &src[y * src_pitch..(y + 1) * src_pitch];
        let dst_start = y * descriptor.pitch_in_bytes;
        let dst_row = &mut dst[dst_start..dst_start + src_pitch];

        for (src_px, dst_px) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
            let (mut r, mut g, mut b, mut a) = (src_px[0], src_px[1], src_px[2], src_px[3]);
            match descriptor.alpha_format {
                AlphaFormat::Opaque => a = 255,
                AlphaFormat::Premultiplied => {
                    r = premultiply(r, a);
                    g = premultiply(g, a);
                    b = premultiply(b, a);
                }
                AlphaFormat::Unpremultiplied => {}
            }

            if is_bgra {
                dst_px.copy_from_slice(&[b, g, r, a]);
            } else {
                dst_px.copy_from_slice(&[r, g, b, a]);
            }
        }
    }
}

/// Read pixels of any supported layout back as packed straight-alpha RGBA8.
///
/// Inverse of [`write_rgba8`], up to premultiplication rounding.
pub fn read_rgba8(src: &[u8], descriptor: &ImageDataDescriptor) -> Vec<u8> {
    let width = descriptor.size.width as usize;
    let height = descriptor.size.height as usize;
    let is_bgra = descriptor.pixel_format == PixelFormat::Bgra8;
    let mut out = Vec::with_capacity(width * height * 4);

    for y in 0..height {
        let start = y * descriptor.pitch_in_bytes;
        for px in src[start..start + width * 4].chunks_exact(4) {
            let (mut r, g, mut b, a) = (px[0], px[1], px[2], px[3]);
            if is_bgra {
                std::mem::swap(&mut r, &mut b);
            }
            let [r, g, b] = match descriptor.alpha_format {
                AlphaFormat::Premultiplied if a != 0 => [
                    unpremultiply(r, a),
                    unpremultiply(g, a),
                    unpremultiply(b, a),
                ],
                _ => [r, g, b],
            };
            out.extend_from_slice(&[r, g, b, a]);
        }
    }
    out
}

#[inline]
fn unpremultiply(channel: u8, alpha: u8) -> u8 {
    ((u16::from(channel) * 255 + u16::from(alpha) / 2) / u16::from(alpha)).min(255) as u8
}
