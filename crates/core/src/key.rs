//! Location key codec.
//!
//! A location key addresses exactly one text-bearing leaf of a document.
//! Keys are segments joined by `!`; indices inside a segment are joined by
//! `_`. Every index is 1-based and written without leading zeros, so each
//! leaf has exactly one spelling:
//!
//! ```text
//! Sheet1!B7                         spreadsheet cell
//! Sheet1!XLShape3                   spreadsheet drawing shape
//! Slide2!Shape1_2                   slide shape nested in a group
//! Slide2!Shape4!Table_R1C3          slide table cell
//! Paragraph5                        document body paragraph
//! Table1!R2C1                       document table cell
//! Footer_Section2!Table1!R1C1       cell of a table in a section footer
//! ```
//!
//! Decoding is deliberately forgiving: anything that does not match a
//! grammar decodes to `None` so callers can skip it.

use crate::types::DocumentKind;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Separates the segments of a key.
pub const SEGMENT_DELIMITER: char = '!';

/// Separates sub-indices inside one segment.
pub const INDEX_DELIMITER: char = '_';

/// Largest column SpreadsheetML allows (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;

/// Largest row SpreadsheetML allows.
pub const MAX_ROW: u32 = 1_048_576;

static SLIDE_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^Slide([1-9][0-9]*)!Shape([1-9][0-9]*(?:_[1-9][0-9]*)*)(?:!Table_R([1-9][0-9]*)C([1-9][0-9]*))?$",
    )
    .unwrap()
});

static DOCUMENT_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(Header|Footer)_Section([1-9][0-9]*)!)?(?:Paragraph([1-9][0-9]*)|Table([1-9][0-9]*)!R([1-9][0-9]*)C([1-9][0-9]*))$",
    )
    .unwrap()
});

static SHEET_SHAPE_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)!XLShape([1-9][0-9]*)$").unwrap());

static SHEET_CELL_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)!([A-Z]{1,3}[1-9][0-9]*)$").unwrap());

static CELL_COORDINATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{1,3})([1-9][0-9]*)$").unwrap());

/// A native spreadsheet cell reference such as `B7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoordinate {
    row: u32,
    column: u32,
}

impl CellCoordinate {
    /// Build a coordinate from 1-based column and row numbers.
    pub fn new(column: u32, row: u32) -> Option<Self> {
        if (1..=MAX_COLUMN).contains(&column) && (1..=MAX_ROW).contains(&row) {
            Some(Self { row, column })
        } else {
            None
        }
    }

    /// Parse an `A1`-style reference. Lowercase letters and `$` anchors are
    /// rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = CELL_COORDINATE_REGEX.captures(text)?;
        let column = column_number(&caps[1])?;
        let row = caps[2].parse().ok()?;
        Self::new(column, row)
    }

    /// 1-based column number.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// 1-based row number.
    pub fn row(&self) -> u32 {
        self.row
    }
}

impl fmt::Display for CellCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.column), self.row)
    }
}

/// Convert column letters (`A`, `AB`, `XFD`) to a 1-based number.
pub fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut number: u32 = 0;
    for b in letters.bytes() {
        if !b.is_ascii_uppercase() {
            return None;
        }
        number = number * 26 + u32::from(b - b'A' + 1);
    }
    Some(number)
}

/// Convert a 1-based column number to its letters.
pub fn column_name(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// 1-based row/column position inside a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableCell {
    pub row: usize,
    pub column: usize,
}

impl TableCell {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// Path of 1-based indices from a slide's shape tree down through nested
/// groups. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapePath(Vec<usize>);

impl ShapePath {
    /// Build a path; `None` when empty or when an index is zero.
    pub fn new(indices: Vec<usize>) -> Option<Self> {
        if indices.is_empty() || indices.contains(&0) {
            None
        } else {
            Some(Self(indices))
        }
    }

    /// Path of a top-level shape.
    pub fn root(index: usize) -> Self {
        Self(vec![index.max(1)])
    }

    /// Path of the `index`-th child of the shape this path names.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index.max(1));
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for ShapePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", INDEX_DELIMITER)?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

/// Which story of a word-processing document a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Body,
    /// Default header of the given 1-based section.
    Header(usize),
    /// Default footer of the given 1-based section.
    Footer(usize),
}

/// A leaf inside one word-processing story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentLeaf {
    /// N-th paragraph with non-empty text.
    Paragraph(usize),
    /// Cell of the T-th table.
    TableCell { table: usize, cell: TableCell },
}

/// A decoded location key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocationKey {
    SheetCell {
        sheet: String,
        cell: CellCoordinate,
    },
    SheetShape {
        sheet: String,
        shape: usize,
    },
    SlideShape {
        slide: usize,
        path: ShapePath,
        table_cell: Option<TableCell>,
    },
    Document {
        region: Region,
        leaf: DocumentLeaf,
    },
}

impl LocationKey {
    pub fn sheet_cell(sheet: impl Into<String>, cell: CellCoordinate) -> Self {
        Self::SheetCell {
            sheet: sheet.into(),
            cell,
        }
    }

    pub fn sheet_shape(sheet: impl Into<String>, shape: usize) -> Self {
        Self::SheetShape {
            sheet: sheet.into(),
            shape,
        }
    }

    pub fn slide_shape(slide: usize, path: ShapePath) -> Self {
        Self::SlideShape {
            slide,
            path,
            table_cell: None,
        }
    }

    pub fn slide_table_cell(slide: usize, path: ShapePath, cell: TableCell) -> Self {
        Self::SlideShape {
            slide,
            path,
            table_cell: Some(cell),
        }
    }

    pub fn document(region: Region, leaf: DocumentLeaf) -> Self {
        Self::Document { region, leaf }
    }

    /// The document kind this key can address.
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::SheetCell { .. } | Self::SheetShape { .. } => DocumentKind::Spreadsheet,
            Self::SlideShape { .. } => DocumentKind::Presentation,
            Self::Document { .. } => DocumentKind::WordProcessing,
        }
    }

    /// Encode to the wire spelling.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode a key of any kind. Returns `None` for anything that does not
    /// match a grammar exactly.
    ///
    /// The grammars do not overlap: slide and document keys never end in a
    /// valid cell coordinate or `XLShape<N>` segment.
    pub fn decode(key: &str) -> Option<Self> {
        if let Some(caps) = SLIDE_KEY_REGEX.captures(key) {
            let slide = caps[1].parse().ok()?;
            let indices = caps[2]
                .split(INDEX_DELIMITER)
                .map(|s| s.parse().ok())
                .collect::<Option<Vec<usize>>>()?;
            let path = ShapePath::new(indices)?;
            let table_cell = match (caps.get(3), caps.get(4)) {
                (Some(r), Some(c)) => Some(TableCell::new(
                    r.as_str().parse().ok()?,
                    c.as_str().parse().ok()?,
                )),
                _ => None,
            };
            return Some(Self::SlideShape {
                slide,
                path,
                table_cell,
            });
        }

        if let Some(caps) = DOCUMENT_KEY_REGEX.captures(key) {
            let region = match (caps.get(1).map(|m| m.as_str()), caps.get(2)) {
                (Some("Header"), Some(s)) => Region::Header(s.as_str().parse().ok()?),
                (Some("Footer"), Some(s)) => Region::Footer(s.as_str().parse().ok()?),
                _ => Region::Body,
            };
            let leaf = if let Some(p) = caps.get(3) {
                DocumentLeaf::Paragraph(p.as_str().parse().ok()?)
            } else {
                DocumentLeaf::TableCell {
                    table: caps.get(4)?.as_str().parse().ok()?,
                    cell: TableCell::new(
                        caps.get(5)?.as_str().parse().ok()?,
                        caps.get(6)?.as_str().parse().ok()?,
                    ),
                }
            };
            return Some(Self::Document { region, leaf });
        }

        if let Some(caps) = SHEET_SHAPE_KEY_REGEX.captures(key) {
            return Some(Self::SheetShape {
                sheet: caps[1].to_string(),
                shape: caps[2].parse().ok()?,
            });
        }

        if let Some(caps) = SHEET_CELL_KEY_REGEX.captures(key) {
            return Some(Self::SheetCell {
                sheet: caps[1].to_string(),
                cell: CellCoordinate::parse(&caps[2])?,
            });
        }

        None
    }

    /// Decode a key, keeping it only if it addresses the given kind.
    pub fn decode_for(kind: DocumentKind, key: &str) -> Option<Self> {
        Self::decode(key).filter(|k| k.kind() == kind)
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SheetCell { sheet, cell } => write!(f, "{}!{}", sheet, cell),
            Self::SheetShape { sheet, shape } => write!(f, "{}!XLShape{}", sheet, shape),
            Self::SlideShape {
                slide,
                path,
                table_cell,
            } => {
                write!(f, "Slide{}!Shape{}", slide, path)?;
                if let Some(cell) = table_cell {
                    write!(f, "!Table_R{}C{}", cell.row, cell.column)?;
                }
                Ok(())
            }
            Self::Document { region, leaf } => {
                match region {
                    Region::Body => {}
                    Region::Header(s) => write!(f, "Header_Section{}!", s)?,
                    Region::Footer(s) => write!(f, "Footer_Section{}!", s)?,
                }
                match leaf {
                    DocumentLeaf::Paragraph(n) => write!(f, "Paragraph{}", n),
                    DocumentLeaf::TableCell { table, cell } => {
                        write!(f, "Table{}!R{}C{}", table, cell.row, cell.column)
                    }
                }
            }
        }
    }
}
