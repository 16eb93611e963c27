//! PPTX file parser implementation.
//!
//! Slides are read in the order listed by `ppt/presentation.xml`, and each
//! slide's shape tree is walked in document order. Pictures are resolved
//! through the slide's relationships to their media parts.

use crate::package::{
    local_name, part_extension, rels_path_for, resolve_target, ContentTypes, Relationship,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use ripper_core::{
    Error, ExtractedSlide, ImageBlob, PictureData, Presentation, PresentationFormat,
    PresentationSource, Result, SlideShape,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const REL_TYPE_SLIDE: &str = "/slide";
const REL_TYPE_NOTES_SLIDE: &str = "/notesSlide";

/// Parser for PPTX (Office Open XML) files.
#[derive(Debug, Clone, Default)]
pub struct PptxParser {
    /// Visit the shapes inside group shapes instead of treating the group as opaque.
    descend_groups: bool,
    /// Read speaker notes for each slide.
    read_notes: bool,
}

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether shapes nested in groups are visited.
    pub fn with_descend_groups(mut self, descend: bool) -> Self {
        self.descend_groups = descend;
        self
    }

    /// Set whether speaker notes are read.
    pub fn with_notes(mut self, read_notes: bool) -> Self {
        self.read_notes = read_notes;
        self
    }

    /// Parse a PPTX file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R, filename: &str) -> Result<Presentation> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut presentation = Presentation::new(filename, PresentationFormat::Pptx);

        let content_types = match self.read_file_from_archive(&mut archive, "[Content_Types].xml") {
            Ok(xml) => ContentTypes::parse(&xml)?,
            Err(e) => {
                log::warn!("No content types in {}: {}", filename, e);
                ContentTypes::default()
            }
        };

        let slide_order = self.get_slide_order(&mut archive)?;
        log::debug!("{} lists {} slides", filename, slide_order.len());

        for (idx, slide_path) in slide_order.iter().enumerate() {
            let slide = self.parse_slide(&mut archive, &content_types, slide_path, idx + 1)?;
            presentation.add_slide(slide);
        }

        log::debug!(
            "{}: {} slides, {} pictures",
            filename,
            presentation.slides.len(),
            presentation.picture_count()
        );

        Ok(presentation)
    }

    /// Get the ordered list of slide part names.
    ///
    /// The order comes from `p:sldIdLst` in `presentation.xml`. When that part
    /// has no slide list, slide relationships are ordered by their trailing number.
    fn get_slide_order<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        let rels_path = rels_path_for(PRESENTATION_PART);
        let rels_content = self.read_required_part(archive, &rels_path)?;
        let rels = Relationship::parse_all(&rels_content)?;

        let by_id: HashMap<&str, &Relationship> = rels.iter().map(|r| (r.id.as_str(), r)).collect();

        let listed_ids = match self.read_file_from_archive(archive, PRESENTATION_PART) {
            Ok(xml) => slide_ids_from_presentation(&xml)?,
            Err(e) => {
                log::warn!("Falling back to relationship order: {}", e);
                Vec::new()
            }
        };

        if !listed_ids.is_empty() {
            let mut slides = Vec::with_capacity(listed_ids.len());
            for id in &listed_ids {
                match by_id.get(id.as_str()) {
                    Some(rel) if rel.is_type(REL_TYPE_SLIDE) => {
                        slides.push(resolve_target(PRESENTATION_PART, &rel.target));
                    }
                    _ => log::warn!("Slide id {} has no slide relationship, skipping", id),
                }
            }
            return Ok(slides);
        }

        let mut slides: Vec<(String, Option<usize>)> = rels
            .iter()
            .filter(|r| r.is_type(REL_TYPE_SLIDE))
            .map(|r| {
                let order_num =
                    extract_slide_number(&r.target).or_else(|| extract_slide_number(&r.id));
                (resolve_target(PRESENTATION_PART, &r.target), order_num)
            })
            .collect();

        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }

    /// Parse a single slide from the archive.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        content_types: &ContentTypes,
        slide_path: &str,
        slide_number: usize,
    ) -> Result<ExtractedSlide> {
        let content = self.read_required_part(archive, slide_path)?;
        let mut slide = ExtractedSlide::new(slide_number);

        // A slide without relationships simply has no pictures or notes
        let rels = match self.read_file_from_archive(archive, &rels_path_for(slide_path)) {
            Ok(xml) => Relationship::parse_all(&xml)?,
            Err(_) => Vec::new(),
        };

        for shape in extract_shapes_from_xml(&content, self.descend_groups)? {
            let slide_shape = match shape.element {
                ShapeElement::Sp => SlideShape::text(shape.name, shape.text),
                ShapeElement::Pic => {
                    let picture =
                        self.load_picture(archive, content_types, slide_path, &rels, &shape);
                    SlideShape::picture(shape.name, picture)
                }
                ShapeElement::Other => SlideShape::other(shape.name),
            };
            slide.add_shape(slide_shape);
        }

        if self.read_notes {
            slide.notes = self.read_slide_notes(archive, slide_path, &rels)?;
        }

        Ok(slide)
    }

    /// Resolve and read the image behind a picture shape.
    fn load_picture<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        content_types: &ContentTypes,
        slide_path: &str,
        rels: &[Relationship],
        shape: &ShapeInfo,
    ) -> PictureData {
        let Some(embed) = shape.blip_embed.as_deref() else {
            let reason = if shape.blip_link.is_some() {
                format!("picture '{}' links to an external image", shape.name)
            } else {
                format!("picture '{}' has no embedded image", shape.name)
            };
            return PictureData::Unavailable(reason);
        };

        let Some(rel) = rels.iter().find(|r| r.id == embed) else {
            return PictureData::Unavailable(format!(
                "relationship {} for picture '{}' not found",
                embed, shape.name
            ));
        };

        if rel.external {
            return PictureData::Unavailable(format!(
                "picture '{}' links to external target {}",
                shape.name, rel.target
            ));
        }

        let media_path = resolve_target(slide_path, &rel.target);
        match self.read_bytes_from_archive(archive, &media_path) {
            Ok(bytes) => {
                let mut blob = ImageBlob::new(bytes, part_extension(&media_path));
                if let Some(content_type) = content_types.lookup(&media_path) {
                    blob = blob.with_content_type(content_type);
                }
                PictureData::Image(blob)
            }
            Err(e) => PictureData::Unavailable(e.to_string()),
        }
    }

    /// Read the body text of a slide's notes page, if it has one.
    fn read_slide_notes<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        rels: &[Relationship],
    ) -> Result<Option<String>> {
        let Some(rel) = rels.iter().find(|r| r.is_type(REL_TYPE_NOTES_SLIDE)) else {
            return Ok(None);
        };

        let notes_path = resolve_target(slide_path, &rel.target);
        let xml = match self.read_file_from_archive(archive, &notes_path) {
            Ok(xml) => xml,
            Err(e) => {
                log::warn!("Could not read notes for {}: {}", slide_path, e);
                return Ok(None);
            }
        };

        let body: Vec<String> = extract_shapes_from_xml(&xml, true)?
            .into_iter()
            .filter(|s| s.element == ShapeElement::Sp)
            .filter(|s| s.placeholder_type.as_deref() == Some("body"))
            .map(|s| s.text)
            .filter(|t| !t.trim().is_empty())
            .collect();

        if body.is_empty() {
            Ok(None)
        } else {
            Ok(Some(body.join("\n")))
        }
    }

    /// Read a part the package cannot be understood without.
    fn read_required_part<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        if archive.by_name(path).is_err() {
            return Err(Error::PptxParseError(format!(
                "required part '{}' is missing",
                path
            )));
        }
        self.read_file_from_archive(archive, path)
    }

    /// Read a text part from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }

    /// Read a binary part from the ZIP archive.
    fn read_bytes_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<Vec<u8>> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(bytes)
    }
}

impl PresentationSource for PptxParser {
    fn open(&self, path: &Path) -> Result<Presentation> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        let read = reader.read(&mut magic)?;

        let format = PresentationFormat::from_magic(&magic[..read]).or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(PresentationFormat::from_extension)
        });

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        match format {
            Some(PresentationFormat::Pptx) => {
                reader.rewind()?;
                self.parse(reader, filename)
            }
            Some(PresentationFormat::Ppt) => Err(Error::UnsupportedFormat(format!(
                "{} is a legacy .ppt file; save it as .pptx first",
                filename
            ))),
            None => Err(Error::UnsupportedFormat(format!(
                "{} is not a PowerPoint file",
                filename
            ))),
        }
    }
}

/// Which shape-tree element a shape came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeElement {
    /// `p:sp`, an autoshape or text box; always has a text frame.
    Sp,
    /// `p:pic`
    Pic,
    /// Connectors, graphic frames, content parts, and opaque groups.
    Other,
}

impl ShapeElement {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"sp" => Some(Self::Sp),
            b"pic" => Some(Self::Pic),
            b"cxnSp" | b"graphicFrame" | b"grpSp" | b"contentPart" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Information about a shape extracted from XML.
#[derive(Debug)]
struct ShapeInfo {
    element: ShapeElement,
    name: String,
    text: String,
    placeholder_type: Option<String>,
    blip_embed: Option<String>,
    blip_link: Option<String>,
    /// Element stack depth at which this shape opened.
    depth: usize,
    paragraphs: usize,
}

impl ShapeInfo {
    fn new(element: ShapeElement, depth: usize) -> Self {
        Self {
            element,
            name: String::new(),
            text: String::new(),
            placeholder_type: None,
            blip_embed: None,
            blip_link: None,
            depth,
            paragraphs: 0,
        }
    }

    fn start_paragraph(&mut self) {
        if self.paragraphs > 0 {
            self.text.push('\n');
        }
        self.paragraphs += 1;
    }

    /// Record attributes of an element nested in this shape.
    fn observe(&mut self, e: &BytesStart, local: &[u8]) {
        match local {
            b"cNvPr" if self.name.is_empty() => {
                if let Some(name) = attr_value(e, b"name") {
                    self.name = name;
                }
            }
            b"ph" if self.placeholder_type.is_none() => {
                // A placeholder without a type attribute is a body placeholder
                let kind = attr_value(e, b"type").unwrap_or_else(|| "body".into());
                self.placeholder_type = Some(kind);
            }
            b"blip" => {
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match local_name(attr.key.as_ref()) {
                        b"embed" => self.blip_embed = Some(value),
                        b"link" => self.blip_link = Some(value),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

/// Read the value of an unprefixed attribute.
fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// Whether `parent` holds shapes directly.
fn is_shape_container(parent: Option<&[u8]>, descend_groups: bool) -> bool {
    match parent {
        Some(b"spTree") => true,
        Some(b"grpSp") => descend_groups,
        _ => false,
    }
}

/// Extract shapes in document order from a slide (or notes slide) XML part.
fn extract_shapes_from_xml(xml_content: &str, descend_groups: bool) -> Result<Vec<ShapeInfo>> {
    let mut shapes = Vec::new();
    let mut reader = Reader::from_str(xml_content);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current_shape: Option<ShapeInfo> = None;
    let mut in_text_body = false;
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                let local = local_name(name.as_ref()).to_vec();
                let parent = stack.last().map(|p| p.as_slice());

                match current_shape.as_mut() {
                    None => {
                        if is_shape_container(parent, descend_groups) {
                            // Descended groups stay containers; their children become shapes
                            let descend = local.as_slice() == b"grpSp" && descend_groups;
                            if !descend {
                                if let Some(element) = ShapeElement::from_local_name(&local) {
                                    current_shape = Some(ShapeInfo::new(element, stack.len() + 1));
                                }
                            }
                        }
                    }
                    Some(shape) => {
                        shape.observe(e, &local);
                        match local.as_slice() {
                            b"txBody" if shape.element == ShapeElement::Sp => in_text_body = true,
                            b"p" if in_text_body => shape.start_paragraph(),
                            b"br" if in_text_body && shape.paragraphs > 0 => shape.text.push('\n'),
                            b"t" if in_text_body => in_run_text = true,
                            _ => {}
                        }
                    }
                }

                stack.push(local);
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                let parent = stack.last().map(|p| p.as_slice());

                match current_shape.as_mut() {
                    None => {
                        if is_shape_container(parent, descend_groups) {
                            if let Some(element) = ShapeElement::from_local_name(local) {
                                let mut shape = ShapeInfo::new(element, stack.len() + 1);
                                shape.observe(e, local);
                                shapes.push(shape);
                            }
                        }
                    }
                    Some(shape) => {
                        shape.observe(e, local);
                        match local {
                            b"p" if in_text_body => shape.start_paragraph(),
                            b"br" if in_text_body && shape.paragraphs > 0 => shape.text.push('\n'),
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_run_text {
                    if let Some(shape) = current_shape.as_mut() {
                        let text = e.unescape().unwrap_or_default();
                        shape.text.push_str(&text);
                    }
                }
            }
            Ok(Event::CData(ref e)) => {
                if in_run_text {
                    if let Some(shape) = current_shape.as_mut() {
                        shape.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                match local {
                    b"t" => in_run_text = false,
                    b"txBody" => in_text_body = false,
                    _ => {}
                }

                if current_shape.as_ref().is_some_and(|s| s.depth == stack.len()) {
                    if let Some(shape) = current_shape.take() {
                        shapes.push(shape);
                    }
                    in_text_body = false;
                    in_run_text = false;
                }

                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!(
                    "XML parsing error at position {} (keeping {} shapes): {}",
                    reader.buffer_position(),
                    shapes.len(),
                    e
                );
                break;
            }
            _ => {}
        }
    }

    Ok(shapes)
}

/// Read the `r:id` of every `p:sldId` in `presentation.xml`, in order.
fn slide_ids_from_presentation(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                // The relationship id is the prefixed `r:id`, not the numeric `id`
                let rel_id = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.prefix().is_some() && local_name(a.key.as_ref()) == b"id")
                    .map(|a| String::from_utf8_lossy(&a.value).to_string());
                if let Some(id) = rel_id {
                    ids.push(id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing presentation.xml: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(ids)
}

/// Extract a slide number from a string like "rId2" or "slides/slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}
