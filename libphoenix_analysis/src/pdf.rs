use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::image_crate::{DynamicImage, RgbImage};
use printpdf::{Image, ImageTransform, Mm, PdfDocument, PdfDocumentReference};

use super::constants::{PAGE_DPI, PAGE_HEIGHT_PX, PAGE_WIDTH_PX};
use super::error::ReportError;

/// A4 portrait dimensions in millimeters.
const A4_WIDTH_MM: f64 = 210.0;
const A4_HEIGHT_MM: f64 = 297.0;

/// A simple struct which wraps around the printpdf library.
///
/// Collects rasterized report pages (RGB buffers rendered by the page
/// functions) into a multi-page A4 PDF document, one image per page.
pub struct PdfWriter {
    document: PdfDocumentReference,
    path: PathBuf,
    pages: usize,
}

impl PdfWriter {
    /// Create the writer. Nothing is written to disk until `close`.
    pub fn new(path: &Path, title: &str) -> Self {
        Self {
            document: PdfDocument::empty(title),
            path: path.to_path_buf(),
            pages: 0,
        }
    }

    /// Append one A4 page from a raw RGB buffer of
    /// `PAGE_WIDTH_PX` x `PAGE_HEIGHT_PX` pixels.
    pub fn add_page(&mut self, rgb: Vec<u8>) -> Result<(), ReportError> {
        let image = RgbImage::from_raw(PAGE_WIDTH_PX, PAGE_HEIGHT_PX, rgb)
            .ok_or(ReportError::PageBuffer)?;
        self.pages += 1;
        let (page, layer) = self.document.add_page(
            Mm(A4_WIDTH_MM as f32),
            Mm(A4_HEIGHT_MM as f32),
            format!("page_{}", self.pages),
        );
        let pdf_image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(image));
        pdf_image.add_to_layer(
            self.document.get_page(page).get_layer(layer),
            ImageTransform {
                dpi: Some(PAGE_DPI as f32),
                ..Default::default()
            },
        );
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Write the assembled document to disk.
    pub fn close(self) -> Result<(), ReportError> {
        let file = File::create(&self.path)?;
        self.document
            .save(&mut BufWriter::new(file))
            .map_err(|e| ReportError::PdfError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_pages_produce_a_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let mut writer = PdfWriter::new(&path, "test");
        let blank = vec![255u8; (PAGE_WIDTH_PX * PAGE_HEIGHT_PX * 3) as usize];
        writer.add_page(blank.clone()).unwrap();
        writer.add_page(blank).unwrap();
        assert_eq!(writer.page_count(), 2);
        writer.close().unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn wrong_buffer_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PdfWriter::new(&dir.path().join("report.pdf"), "test");
        assert!(matches!(
            writer.add_page(vec![0u8; 10]),
            Err(ReportError::PageBuffer)
        ));
    }
}
