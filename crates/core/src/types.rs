//! Domain types for representing presentation content.

use serde::{Deserialize, Serialize};

/// Represents an entire presentation with its slides and shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    /// Original filename (without path).
    pub filename: String,

    /// Detected format of the source file.
    pub format: PresentationFormat,

    /// Slides in presentation order.
    pub slides: Vec<ExtractedSlide>,
}

impl Presentation {
    /// Create a new presentation with the given filename and format.
    pub fn new(filename: impl Into<String>, format: PresentationFormat) -> Self {
        Self {
            filename: filename.into(),
            format,
            slides: Vec::new(),
        }
    }

    /// Add a slide to the presentation.
    pub fn add_slide(&mut self, slide: ExtractedSlide) {
        self.slides.push(slide);
    }

    /// Total number of picture shapes across all slides.
    pub fn picture_count(&self) -> usize {
        self.slides.iter().map(|s| s.pictures().count()).sum()
    }
}

/// The format of the source presentation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationFormat {
    /// Modern PPTX (Office Open XML).
    Pptx,
    /// Legacy PPT (OLE/CFB binary). Detected only so it can be rejected clearly.
    Ppt,
}

impl PresentationFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pptx" | "pptm" | "ppsx" => Some(Self::Pptx),
            "ppt" | "pps" => Some(Self::Ppt),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Pptx);
        }

        // PPT is an OLE/CFB file (D0 CF 11 E0 A1 B1 1A E1)
        if bytes.len() >= 8
            && bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1])
        {
            return Some(Self::Ppt);
        }

        None
    }
}

/// A single slide and its shapes in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedSlide {
    /// 1-based slide number.
    pub number: usize,

    /// Shapes on this slide, in the order they appear in the shape tree.
    pub shapes: Vec<SlideShape>,

    /// Speaker notes for this slide, if they were read.
    pub notes: Option<String>,
}

impl ExtractedSlide {
    /// Create a new slide with the given number.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            shapes: Vec::new(),
            notes: None,
        }
    }

    /// Add a shape to this slide.
    pub fn add_shape(&mut self, shape: SlideShape) {
        self.shapes.push(shape);
    }

    /// Picture shapes on this slide.
    pub fn pictures(&self) -> impl Iterator<Item = &PictureData> {
        self.shapes.iter().filter_map(|s| match &s.kind {
            ShapeKind::Picture(picture) => Some(picture),
            _ => None,
        })
    }
}

/// A shape from a slide's shape tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideShape {
    /// The shape's name from its non-visual properties, if any.
    pub name: String,

    /// What kind of shape this is.
    pub kind: ShapeKind,
}

impl SlideShape {
    /// Create a text frame shape.
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ShapeKind::Text(text.into()),
        }
    }

    /// Create a picture shape.
    pub fn picture(name: impl Into<String>, picture: PictureData) -> Self {
        Self {
            name: name.into(),
            kind: ShapeKind::Picture(picture),
        }
    }

    /// Create a shape with no text frame and no picture.
    pub fn other(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ShapeKind::Other,
        }
    }
}

/// Shape classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShapeKind {
    /// A shape with a text frame. Paragraphs are joined with `\n`.
    Text(String),
    /// A picture shape.
    Picture(PictureData),
    /// Connectors, tables, charts, and anything else without text or image.
    Other,
}

/// The image behind a picture shape, or the reason it could not be read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PictureData {
    /// The image was resolved and read from the package.
    Image(ImageBlob),
    /// The image could not be resolved (broken or external relationship).
    Unavailable(String),
}

impl PictureData {
    /// Borrow the image blob, or return the stored failure.
    pub fn image(&self) -> crate::Result<&ImageBlob> {
        match self {
            PictureData::Image(blob) => Ok(blob),
            PictureData::Unavailable(reason) => Err(crate::Error::ImageError(reason.clone())),
        }
    }
}

/// Raw bytes of an embedded image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageBlob {
    /// Raw image bytes.
    #[serde(skip)]
    pub bytes: Vec<u8>,

    /// Lowercase file extension without the dot (`png`, `jpg`, ...).
    pub ext: String,

    /// MIME content type, when the package declares one.
    pub content_type: Option<String>,
}

impl ImageBlob {
    /// Create a blob, normalizing the extension.
    pub fn new(bytes: Vec<u8>, ext: &str) -> Self {
        Self {
            bytes,
            ext: normalize_image_ext(ext),
            content_type: None,
        }
    }

    /// Attach a content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Lowercase an image extension, strip a leading dot, and map `jpeg` to `jpg`.
pub fn normalize_image_ext(ext: &str) -> String {
    let ext = ext.trim_start_matches('.').to_lowercase();
    match ext.as_str() {
        "jpeg" | "jpe" => "jpg".to_string(),
        "tif" => "tiff".to_string(),
        "" => "bin".to_string(),
        _ => ext,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_magic() {
        assert_eq!(
            PresentationFormat::from_magic(b"PK\x03\x04rest"),
            Some(PresentationFormat::Pptx)
        );
        assert_eq!(
            PresentationFormat::from_magic(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]),
            Some(PresentationFormat::Ppt)
        );
        assert_eq!(PresentationFormat::from_magic(b"%PDF-1.7"), None);
        assert_eq!(PresentationFormat::from_magic(b"PK"), None);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            PresentationFormat::from_extension("PPTX"),
            Some(PresentationFormat::Pptx)
        );
        assert_eq!(
            PresentationFormat::from_extension("ppt"),
            Some(PresentationFormat::Ppt)
        );
        assert_eq!(PresentationFormat::from_extension("key"), None);
    }

    #[test]
    fn test_normalize_image_ext() {
        assert_eq!(normalize_image_ext("JPEG"), "jpg");
        assert_eq!(normalize_image_ext(".png"), "png");
        assert_eq!(normalize_image_ext("emf"), "emf");
        assert_eq!(normalize_image_ext(""), "bin");
    }

    #[test]
    fn test_slide_accessors() {
        let mut slide = ExtractedSlide::new(1);
        slide.add_shape(SlideShape::text("Title 1", "Hello"));
        slide.add_shape(SlideShape::other("Connector 2"));
        slide.add_shape(SlideShape::picture(
            "Picture 3",
            PictureData::Image(ImageBlob::new(vec![1, 2, 3], "png")),
        ));
        slide.add_shape(SlideShape::picture(
            "Picture 4",
            PictureData::Unavailable("missing".into()),
        ));

        assert!(matches!(&slide.shapes[0].kind, ShapeKind::Text(t) if t == "Hello"));
        assert_eq!(slide.pictures().count(), 2);
        assert!(slide.pictures().nth(1).unwrap().image().is_err());
    }
}
