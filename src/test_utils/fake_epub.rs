use std::io::{Cursor, Write};

use zip::CompressionMethod;
use zip::ZipWriter;
use zip::result::ZipResult;
use zip::write::FileOptions;

pub struct FakeChapter {
    pub id: String,
    pub title: String,
    pub body_html: String,
    /// Nested NCX entries as (label, fragment) pairs pointing into this chapter.
    pub sections: Vec<(String, String)>,
}

impl FakeChapter {
    pub fn new(id: &str, title: &str, paragraphs: usize) -> Self {
        let mut body = format!("<h1 id=\"top\">{title}</h1>\n");
        for i in 0..paragraphs {
            body.push_str(&format!(
                "<p id=\"p{i}\">Paragraph {i} of {title}. The quick brown fox jumps over the lazy dog while the reader keeps turning pages.</p>\n"
            ));
        }
        Self {
            id: id.to_string(),
            title: title.to_string(),
            body_html: body,
            sections: Vec::new(),
        }
    }

    pub fn with_section(mut self, label: &str, fragment: &str) -> Self {
        self.sections
            .push((label.to_string(), fragment.to_string()));
        self
    }

    pub fn file_name(&self) -> String {
        format!("{}.xhtml", self.id)
    }
}

/// Builds a minimal EPUB 2 container (mimetype, container.xml, OPF, NCX and
/// one XHTML file per chapter) entirely in memory.
pub fn build_epub(title: &str, chapters: &[FakeChapter]) -> ZipResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);

    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", stored)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    zip.start_file("OEBPS/content.opf", stored)?;
    zip.write_all(content_opf(title, chapters).as_bytes())?;

    zip.start_file("OEBPS/toc.ncx", stored)?;
    zip.write_all(toc_ncx(title, chapters).as_bytes())?;

    for chapter in chapters {
        zip.start_file(format!("OEBPS/{}", chapter.file_name()), stored)?;
        zip.write_all(chapter_xhtml(chapter).as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

fn content_opf(title: &str, chapters: &[FakeChapter]) -> String {
    let mut manifest = String::from(
        r#"    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
"#,
    );
    let mut spine = String::new();
    for chapter in chapters {
        manifest.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            chapter.id,
            chapter.file_name()
        ));
        spine.push_str(&format!("    <itemref idref=\"{}\"/>\n", chapter.id));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="bookid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>{title}</dc:title>
    <dc:identifier id="bookid">urn:uuid:pageturn-test</dc:identifier>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#
    )
}

fn toc_ncx(title: &str, chapters: &[FakeChapter]) -> String {
    let mut points = String::new();
    let mut order = 0;
    for chapter in chapters {
        order += 1;
        points.push_str(&format!(
            "    <navPoint id=\"nav-{id}\" playOrder=\"{order}\">\n      <navLabel><text>{title}</text></navLabel>\n      <content src=\"{file}\"/>\n",
            id = chapter.id,
            title = chapter.title,
            file = chapter.file_name(),
        ));
        for (index, (label, fragment)) in chapter.sections.iter().enumerate() {
            order += 1;
            points.push_str(&format!(
                "      <navPoint id=\"nav-{id}-{index}\" playOrder=\"{order}\">\n        <navLabel><text>{label}</text></navLabel>\n        <content src=\"{file}#{fragment}\"/>\n      </navPoint>\n",
                id = chapter.id,
                file = chapter.file_name(),
            ));
        }
        points.push_str("    </navPoint>\n");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="urn:uuid:pageturn-test"/>
  </head>
  <docTitle><text>{title}</text></docTitle>
  <navMap>
{points}  </navMap>
</ncx>
"#
    )
}

fn chapter_xhtml(chapter: &FakeChapter) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>{title}</title><style>p {{ margin: 0; }}</style></head>
<body>
{body}</body>
</html>
"#,
        title = chapter.title,
        body = chapter.body_html
    )
}

/// Three chapters, the second one with two nested sections.
pub fn sample_book() -> Vec<u8> {
    let chapters = vec![
        FakeChapter::new("intro", "Introduction", 6),
        FakeChapter::new("chapter1", "Chapter One", 40)
            .with_section("First Section", "p10")
            .with_section("Second Section", "p30"),
        FakeChapter::new("chapter2", "Chapter Two", 25),
    ];
    // Writing to an in-memory cursor only fails on zip logic errors.
    build_epub("Sample Book", &chapters).unwrap_or_default()
}
