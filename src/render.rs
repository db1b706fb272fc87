//! Resource provider interface: pixel buffers and the image handles built
//! from them.
//!
//! The decoder never allocates pixel memory itself. It asks a
//! [`ResourceProvider`] whether a format is supported, allocates an
//! [`ImageData`] of that format, fills it, and hands it back to the provider
//! to be turned into an [`Image`].

use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaFormat {
    /// Alpha is ignored, every pixel is fully opaque.
    Opaque,
    /// Color channels are already multiplied by alpha.
    Premultiplied,
    /// Straight alpha.
    Unpremultiplied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Layout of the pixels held by an [`ImageData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDataDescriptor {
    pub size: Size,
    pub pixel_format: PixelFormat,
    pub alpha_format: AlphaFormat,
    /// Bytes between the start of two consecutive rows.
    pub pitch_in_bytes: usize,
}

impl ImageDataDescriptor {
    /// Tightly packed rows.
    pub fn packed(size: Size, pixel_format: PixelFormat, alpha_format: AlphaFormat) -> Self {
        Self {
            size,
            pixel_format,
            alpha_format,
            pitch_in_bytes: size.width as usize * pixel_format.bytes_per_pixel(),
        }
    }

    pub fn required_bytes(&self) -> usize {
        self.pitch_in_bytes * self.size.height as usize
    }
}

/// Writable pixel memory allocated by a resource provider.
pub struct ImageData {
    descriptor: ImageDataDescriptor,
    memory: Vec<u8>,
}

impl ImageData {
    /// Wrap `memory` which must hold at least `descriptor.required_bytes()`.
    pub fn new(descriptor: ImageDataDescriptor, memory: Vec<u8>) -> Self {
        debug_assert!(memory.len() >= descriptor.required_bytes());
        Self { descriptor, memory }
    }

    /// Zeroed, tightly packed memory.
    pub fn zeroed(size: Size, pixel_format: PixelFormat, alpha_format: AlphaFormat) -> Self {
        let descriptor = ImageDataDescriptor::packed(size, pixel_format, alpha_format);
        let memory = vec![0u8; descriptor.required_bytes()];
        Self { descriptor, memory }
    }

    pub fn descriptor(&self) -> &ImageDataDescriptor {
        &self.descriptor
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// Give up the pixel memory.
    pub fn into_memory(self) -> Vec<u8> {
        self.memory
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("descriptor", &self.descriptor)
            .field("data_size", &self.memory.len())
            .finish()
    }
}

/// A finished, immutable image. Clones share the same pixels.
#[derive(Clone)]
pub struct Image {
    data: Rc<ImageData>,
}

impl Image {
    pub fn new(data: ImageData) -> Self {
        Self { data: Rc::new(data) }
    }

    pub fn size(&self) -> Size {
        self.data.descriptor.size
    }

    pub fn descriptor(&self) -> &ImageDataDescriptor {
        &self.data.descriptor
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data.memory
    }

    pub fn is_opaque(&self) -> bool {
        self.data.descriptor.alpha_format == AlphaFormat::Opaque
    }

    /// Whether both handles refer to the same decoded pixels.
    pub fn ptr_eq(a: &Image, b: &Image) -> bool {
        Rc::ptr_eq(&a.data, &b.data)
    }

    /// Number of live handles to these pixels.
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.data)
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("size", &format!("{}", self.size()))
            .field("pixel_format", &self.data.descriptor.pixel_format)
            .field("alpha_format", &self.data.descriptor.alpha_format)
            .finish()
    }
}

/// Capability interface the decoder uses to obtain pixel memory.
///
/// Callers must check support for both formats before calling
/// [`allocate_image_data`](ResourceProvider::allocate_image_data).
pub trait ResourceProvider {
    fn pixel_format_supported(&self, format: PixelFormat) -> bool;

    fn alpha_format_supported(&self, format: AlphaFormat) -> bool;

    /// Returns `None` if the memory cannot be allocated.
    fn allocate_image_data(
        &self,
        size: Size,
        pixel_format: PixelFormat,
        alpha_format: AlphaFormat,
    ) -> Option<ImageData>;

    fn create_image(&self, data: ImageData) -> Image;
}

/// System-memory provider supporting every format.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareResourceProvider;

impl ResourceProvider for SoftwareResourceProvider {
    fn pixel_format_supported(&self, _format: PixelFormat) -> bool {
        true
    }

    fn alpha_format_supported(&self, _format: AlphaFormat) -> bool {
        true
    }

    fn allocate_image_data(
        &self,
        size: Size,
        pixel_format: PixelFormat,
        alpha_format: AlphaFormat,
    ) -> Option<ImageData> {
        if size.width == 0 || size.height == 0 {
            return None;
        }
        Some(ImageData::zeroed(size, pixel_format, alpha_format))
    }

    fn create_image(&self, data: ImageData) -> Image {
        Image::new(data)
    }
}
