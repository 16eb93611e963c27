//! OPC package plumbing: relationships, content types, and part names.

use quick_xml::events::Event;
use quick_xml::Reader;
use ripper_core::{Error, Result};
use std::collections::HashMap;

/// A `<Relationship>` entry from a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `TargetMode="External"`: the target is a URL, not a part.
    pub external: bool,
}

impl Relationship {
    /// Whether the relationship type ends with `suffix` (e.g. `/slide`).
    ///
    /// Matching on the suffix keeps `/slide` from also matching
    /// `/slideLayout` or `/slideMaster`.
    pub fn is_type(&self, suffix: &str) -> bool {
        self.rel_type.ends_with(suffix)
    }

    /// Parse every relationship in a `.rels` part.
    pub fn parse_all(xml: &str) -> Result<Vec<Relationship>> {
        let mut reader = Reader::from_str(xml);
        let mut rels = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if local_name(e.name().as_ref()) == b"Relationship" =>
                {
                    let mut rel = Relationship {
                        id: String::new(),
                        rel_type: String::new(),
                        target: String::new(),
                        external: false,
                    };

                    for attr in e.attributes().flatten() {
                        let value = attr
                            .unescape_value()
                            .map(|v| v.to_string())
                            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
                        match attr.key.as_ref() {
                            b"Id" => rel.id = value,
                            b"Type" => rel.rel_type = value,
                            b"Target" => rel.target = value,
                            b"TargetMode" => rel.external = value.eq_ignore_ascii_case("External"),
                            _ => {}
                        }
                    }

                    rels.push(rel);
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing relationships: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        Ok(rels)
    }
}

/// Content types declared in `[Content_Types].xml`.
#[derive(Debug, Default)]
pub struct ContentTypes {
    defaults: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut types = ContentTypes::default();

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    let name = e.name();
                    let kind = local_name(name.as_ref());
                    if kind != b"Default" && kind != b"Override" {
                        continue;
                    }

                    let mut key = String::new();
                    let mut content_type = String::new();
                    for attr in e.attributes().flatten() {
                        let value = String::from_utf8_lossy(&attr.value).to_string();
                        match attr.key.as_ref() {
                            b"Extension" | b"PartName" => key = value,
                            b"ContentType" => content_type = value,
                            _ => {}
                        }
                    }

                    if kind == b"Default" {
                        types.defaults.insert(key.to_lowercase(), content_type);
                    } else {
                        types
                            .overrides
                            .insert(key.trim_start_matches('/').to_string(), content_type);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing content types: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        Ok(types)
    }

    /// Content type for a part name (without leading `/`).
    pub fn lookup(&self, part_name: &str) -> Option<&str> {
        self.overrides
            .get(part_name)
            .or_else(|| self.defaults.get(&part_extension(part_name).to_lowercase()))
            .map(String::as_str)
    }
}

/// Extract the local name from a potentially namespaced XML name.
pub fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// The `.rels` part for a part, e.g. `ppt/slides/_rels/slide1.xml.rels`.
pub fn rels_path_for(part_name: &str) -> String {
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_name),
    }
}

/// Extension of a part name, without the dot. Empty when there is none.
pub fn part_extension(part_name: &str) -> &str {
    let file = part_name.rsplit('/').next().unwrap_or(part_name);
    file.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

/// Resolve a relationship target against the part that owns the relationship.
///
/// Absolute targets (`/ppt/media/image1.png`) are taken from the package root;
/// relative ones are joined to the source part's directory with `.` and `..`
/// segments folded.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(
            rels_path_for("ppt/slides/slide3.xml"),
            "ppt/slides/_rels/slide3.xml.rels"
        );
        assert_eq!(rels_path_for("ppt/presentation.xml"), "ppt/_rels/presentation.xml.rels");
        assert_eq!(rels_path_for("root.xml"), "_rels/root.xml.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("ppt/presentation.xml", "slides/slide1.xml"),
            "ppt/slides/slide1.xml"
        );
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../media/image2.png"),
            "ppt/media/image2.png"
        );
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "/ppt/media/image2.png"),
            "ppt/media/image2.png"
        );
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "./../../docProps/thumb.jpeg"),
            "docProps/thumb.jpeg"
        );
    }

    #[test]
    fn test_part_extension() {
        assert_eq!(part_extension("ppt/media/image1.jpeg"), "jpeg");
        assert_eq!(part_extension("ppt/media/image1.tar.gz"), "gz");
        assert_eq!(part_extension("ppt.d/media/noext"), "");
    }

    #[test]
    fn test_parse_relationships() {
        let xml = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
            <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
            <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="https://example.com/a.png?x=1&amp;y=2" TargetMode="External"/>
        </Relationships>"#;

        let rels = Relationship::parse_all(xml).unwrap();
        assert_eq!(rels.len(), 2);
        assert!(rels[0].is_type("/slideLayout"));
        assert!(!rels[0].is_type("/slide"));
        assert!(!rels[0].external);
        assert!(rels[1].external);
        assert_eq!(rels[1].target, "https://example.com/a.png?x=1&y=2");
    }

    #[test]
    fn test_content_types_lookup() {
        let xml = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
            <Default Extension="PNG" ContentType="image/png"/>
            <Default Extension="xml" ContentType="application/xml"/>
            <Override PartName="/ppt/media/image9.bin" ContentType="image/x-emf"/>
        </Types>"#;

        let types = ContentTypes::parse(xml).unwrap();
        assert_eq!(types.lookup("ppt/media/image1.png"), Some("image/png"));
        assert_eq!(types.lookup("ppt/media/image9.bin"), Some("image/x-emf"));
        assert_eq!(types.lookup("ppt/media/image1.gif"), None);
    }
}
