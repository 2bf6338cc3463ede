//! PDF codec built on lopdf.
//!
//! Raster pages are embedded as DCT (JPEG) image XObjects on a page whose
//! MediaBox equals the image's pixel size, treating one pixel as one point
//! (the 72 dpi reference).

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::image::ImageProcessor;
use crate::traits::{CodecError, DocumentCodec, PageSource};

const PDF_VERSION: &str = "1.5";

// A4 landscape, in points
const SVG_PAGE_WIDTH: i64 = 842;
const SVG_PAGE_HEIGHT: i64 = 595;
const SVG_MARGIN: i64 = 28;
const SVG_FONT_SIZE: i64 = 8;
const SVG_LEADING: i64 = 11;
// Courier glyphs are 0.6 em wide
const SVG_CHARS_PER_LINE: usize =
    ((SVG_PAGE_WIDTH - 2 * SVG_MARGIN) * 10 / (SVG_FONT_SIZE * 6)) as usize;
const SVG_LINES_PER_PAGE: usize = ((SVG_PAGE_HEIGHT - 2 * SVG_MARGIN) / SVG_LEADING) as usize;

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfCodec;

impl PdfCodec {
    pub fn new() -> Self {
        Self
    }
}

/// Page tree under construction.
struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    fn new() -> Self {
        let mut doc = Document::with_version(PDF_VERSION);
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    fn add_page(
        &mut self,
        width: i64,
        height: i64,
        resources: lopdf::Dictionary,
        content: Content,
    ) -> Result<(), CodecError> {
        let encoded = content
            .encode()
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => resources,
            "Contents" => content_id,
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    fn add_image_page(&mut self, page: PageSource<'_>) -> Result<(), CodecError> {
        let image = ImageProcessor::normalize(page.data)?;
        let width = i64::from(image.width);
        let height = i64::from(image.height);

        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image.jpeg,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        0.into(),
                        0.into(),
                        height.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let resources = dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        };
        self.add_page(width, height, resources, content)
    }

    fn finish(mut self) -> Result<Vec<u8>, CodecError> {
        if self.kids.is_empty() {
            return Err(CodecError::Empty);
        }
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(out)
    }
}

impl DocumentCodec for PdfCodec {
    fn images_to_pdf(&self, pages: &[PageSource<'_>]) -> Result<Vec<u8>, CodecError> {
        let mut builder = PdfBuilder::new();
        for page in pages {
            if !page.content_type.starts_with("image/") {
                return Err(CodecError::UnsupportedType(page.content_type.to_string()));
            }
            builder.add_image_page(*page)?;
        }
        tracing::debug!(pages = pages.len(), "pdf: assembled image document");
        builder.finish()
    }

    /// Typesets the SVG source text in Courier on A4 landscape pages.
    fn svg_to_pdf(&self, svg: &[u8]) -> Result<Vec<u8>, CodecError> {
        let text = String::from_utf8_lossy(svg);
        let lines = wrap_lines(&text, SVG_CHARS_PER_LINE);

        let mut builder = PdfBuilder::new();
        let font_id = builder.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let blank: &[String] = &[];
        let chunks: Vec<&[String]> = if lines.is_empty() {
            vec![blank]
        } else {
            lines.chunks(SVG_LINES_PER_PAGE).collect()
        };

        for chunk in chunks {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), SVG_FONT_SIZE.into()]),
                Operation::new("TL", vec![SVG_LEADING.into()]),
                Operation::new(
                    "Td",
                    vec![
                        SVG_MARGIN.into(),
                        (SVG_PAGE_HEIGHT - SVG_MARGIN - SVG_FONT_SIZE).into(),
                    ],
                ),
            ];
            for line in chunk {
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(line.as_str())],
                ));
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new("ET", vec![]));

            let resources = dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            };
            builder.add_page(
                SVG_PAGE_WIDTH,
                SVG_PAGE_HEIGHT,
                resources,
                Content { operations },
            )?;
        }
        builder.finish()
    }
}

/// Splits text into printable ASCII lines no longer than `width` characters.
fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.lines() {
        let printable: Vec<char> = raw
            .chars()
            .map(|c| match c {
                '\t' => ' ',
                c if c.is_ascii() && !c.is_ascii_control() => c,
                _ => '?',
            })
            .collect();
        if printable.is_empty() {
            lines.push(String::new());
            continue;
        }
        for piece in printable.chunks(width) {
            lines.push(piece.iter().collect());
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn media_boxes(pdf: &[u8]) -> Vec<(i64, i64)> {
        let doc = Document::load_mem(pdf).unwrap();
        doc.get_pages()
            .values()
            .map(|page_id| {
                let page = doc.get_dictionary(*page_id).unwrap();
                let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
                (
                    media_box[2].as_i64().unwrap(),
                    media_box[3].as_i64().unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_single_image_page_matches_pixel_size() {
        let data = png(300, 200);
        let pdf = PdfCodec
            .image_to_pdf(PageSource {
                data: &data,
                content_type: "image/png",
            })
            .unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));
        assert_eq!(media_boxes(&pdf), vec![(300, 200)]);
    }

    #[test]
    fn test_multi_page_keeps_order_and_sizes() {
        let first = png(100, 50);
        let second = png(40, 80);
        let pdf = PdfCodec
            .images_to_pdf(&[
                PageSource {
                    data: &first,
                    content_type: "image/png",
                },
                PageSource {
                    data: &second,
                    content_type: "image/png",
                },
            ])
            .unwrap();
        assert_eq!(media_boxes(&pdf), vec![(100, 50), (40, 80)]);
    }

    #[test]
    fn test_rejects_non_image_content_type() {
        let data = png(10, 10);
        let err = PdfCodec
            .image_to_pdf(PageSource {
                data: &data,
                content_type: "application/zip",
            })
            .unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType(_)));
    }

    #[test]
    fn test_empty_page_list_fails() {
        assert!(matches!(
            PdfCodec.images_to_pdf(&[]),
            Err(CodecError::Empty)
        ));
    }

    #[test]
    fn test_svg_renders_on_a4_landscape() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"><path d="M0 0 L10 10"/></svg>"#;
        let pdf = PdfCodec.svg_to_pdf(svg).unwrap();
        assert_eq!(media_boxes(&pdf), vec![(842, 595)]);
    }

    #[test]
    fn test_long_svg_spills_onto_more_pages() {
        let svg = "<path/>\n".repeat(SVG_LINES_PER_PAGE + 1);
        let pdf = PdfCodec.svg_to_pdf(svg.as_bytes()).unwrap();
        assert_eq!(media_boxes(&pdf).len(), 2);
    }

    #[test]
    fn test_wrap_lines_breaks_long_lines() {
        let lines = wrap_lines(&"a".repeat(25), 10);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "aaaaa");
        assert_eq!(wrap_lines("é", 10), vec!["?".to_string()]);
    }
}
