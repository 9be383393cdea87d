//! Resource kinds and the CPU-side resources bound to pass ports.
//!
//! The engine does not talk to a GPU. Physical resources are plain CPU
//! textures and byte buffers so that pass behavior and slot aliasing can be
//! exercised and inspected without a backend.

use std::fmt;

use glam::Vec4;

/// Texel format of a texture port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureFormat {
    /// Accepts any format. Only meaningful on input ports.
    Any,
    Rgba32Float,
    Rgba16Float,
    Rgba8Unorm,
    Rg32Uint,
    R32Float,
}

/// The kind of resource a port produces or consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// A 2D texture sized to the frame resolution.
    Texture(TextureFormat),
    /// A byte buffer of fixed size.
    Buffer { size: u64 },
}

impl ResourceKind {
    /// Shorthand for a texture kind.
    pub const fn texture(format: TextureFormat) -> Self {
        Self::Texture(format)
    }

    /// Shorthand for a buffer kind.
    pub const fn buffer(size: u64) -> Self {
        Self::Buffer { size }
    }

    /// Whether a resource of kind `self` may be bound to a port of kind `other`.
    ///
    /// Textures match when formats are equal or either side is
    /// [`TextureFormat::Any`]. Buffers match on equal size.
    pub fn is_compatible_with(&self, other: &ResourceKind) -> bool {
        match (self, other) {
            (Self::Texture(a), Self::Texture(b)) => {
                a == b || *a == TextureFormat::Any || *b == TextureFormat::Any
            }
            (Self::Buffer { size: a }, Self::Buffer { size: b }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Texture(format) => write!(f, "texture {format:?}"),
            Self::Buffer { size } => write!(f, "buffer of {size} bytes"),
        }
    }
}

/// A CPU texture. Texels are stored as `Vec4` regardless of format.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    width: u32,
    height: u32,
    format: TextureFormat,
    texels: Vec<Vec4>,
}

impl Texture {
    /// Create a zero-filled texture.
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            texels: vec![Vec4::ZERO; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width and height as a pair.
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub fn texels_mut(&mut self) -> &mut [Vec4] {
        &mut self.texels
    }

    /// Read the texel at `(x, y)`. Out-of-range coordinates return zero.
    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        if x >= self.width || y >= self.height {
            return Vec4::ZERO;
        }
        self.texels[self.index(x, y)]
    }

    /// Write the texel at `(x, y)`. Out-of-range coordinates are ignored.
    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        if x < self.width && y < self.height {
            let index = self.index(x, y);
            self.texels[index] = value;
        }
    }

    /// Set every texel to `value`.
    pub fn fill(&mut self, value: Vec4) {
        self.texels.fill(value);
    }

    /// Mean of all texels, or zero for an empty texture.
    pub fn average(&self) -> Vec4 {
        if self.texels.is_empty() {
            return Vec4::ZERO;
        }
        self.texels.iter().copied().sum::<Vec4>() / self.texels.len() as f32
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// A physical resource bound to one or more ports during a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Texture(Texture),
    Buffer(Vec<u8>),
}

impl Resource {
    /// Allocate storage for `kind` at the given frame resolution.
    ///
    /// Texture ports declared as [`TextureFormat::Any`] are backed by
    /// `Rgba32Float` storage.
    pub fn allocate(kind: ResourceKind, width: u32, height: u32) -> Self {
        match kind {
            ResourceKind::Texture(TextureFormat::Any) => {
                Self::Texture(Texture::new(width, height, TextureFormat::Rgba32Float))
            }
            ResourceKind::Texture(format) => Self::Texture(Texture::new(width, height, format)),
            ResourceKind::Buffer { size } => Self::Buffer(vec![0; size as usize]),
        }
    }

    /// Human-readable resource type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Texture(_) => "texture",
            Self::Buffer(_) => "buffer",
        }
    }

    pub fn as_texture(&self) -> Option<&Texture> {
        match self {
            Self::Texture(t) => Some(t),
            Self::Buffer(_) => None,
        }
    }

    pub fn as_texture_mut(&mut self) -> Option<&mut Texture> {
        match self {
            Self::Texture(t) => Some(t),
            Self::Buffer(_) => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&[u8]> {
        match self {
            Self::Buffer(b) => Some(b),
            Self::Texture(_) => None,
        }
    }

    pub fn as_buffer_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            Self::Buffer(b) => Some(b),
            Self::Texture(_) => None,
        }
    }
}
