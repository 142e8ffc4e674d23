//! One opened document of any supported kind.

use std::path::Path;
use xlate_core::{DocumentKind, Error, ExtractedMap, InjectReport, Package, Result};
use xlate_docx::WordDocument;
use xlate_pptx::Presentation;
use xlate_xlsx::Workbook;

/// An opened container, dispatched on its kind.
#[derive(Debug)]
pub enum Document {
    Spreadsheet(Workbook),
    Presentation(Presentation),
    WordProcessing(WordDocument),
}

impl Document {
    /// Open a container held in memory. The kind comes from the file
    /// extension of `path` when it names one, otherwise from the parts the
    /// container holds.
    pub fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<Self> {
        let package = Package::from_bytes(bytes)?;
        let kind = detect_kind(path, &package).ok_or_else(|| {
            Error::UnsupportedFormat(format!("{} is not a workbook, deck or document", path.display()))
        })?;
        log::debug!("Opening {} as {}", path.display(), kind);

        Ok(match kind {
            DocumentKind::Spreadsheet => Self::Spreadsheet(Workbook::from_package(package)?),
            DocumentKind::Presentation => Self::Presentation(Presentation::from_package(package)?),
            DocumentKind::WordProcessing => {
                Self::WordProcessing(WordDocument::from_package(package)?)
            }
        })
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Spreadsheet(_) => DocumentKind::Spreadsheet,
            Self::Presentation(_) => DocumentKind::Presentation,
            Self::WordProcessing(_) => DocumentKind::WordProcessing,
        }
    }

    /// Extract every translatable leaf.
    pub fn walk(&self) -> Result<ExtractedMap> {
        match self {
            Self::Spreadsheet(workbook) => workbook.walk(),
            Self::Presentation(presentation) => presentation.walk(),
            Self::WordProcessing(document) => document.walk(),
        }
    }

    /// Write translated text back in place.
    pub fn rewrite(&mut self, translated: &ExtractedMap) -> Result<InjectReport> {
        match self {
            Self::Spreadsheet(workbook) => workbook.rewrite(translated),
            Self::Presentation(presentation) => presentation.rewrite(translated),
            Self::WordProcessing(document) => document.rewrite(translated),
        }
    }

    /// Render the whole container.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Spreadsheet(workbook) => workbook.to_bytes(),
            Self::Presentation(presentation) => presentation.to_bytes(),
            Self::WordProcessing(document) => document.to_bytes(),
        }
    }
}

/// Kind named by the extension, falling back to the container's main part.
pub fn detect_kind(path: &Path, package: &Package) -> Option<DocumentKind> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(DocumentKind::from_extension)
        .or_else(|| DocumentKind::from_package(package))
}
