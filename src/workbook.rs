//! OOXML workbook (xlsx) sheet reader.
//!
//! Reads a single worksheet, selected by name, into dense rows of optional
//! cell strings. Supports shared strings, inline strings, formula string
//! results, and numeric cells; everything is surfaced as raw text and left
//! for the extraction layer to normalize and parse.
//!
//! This is deliberately not a full spreadsheet engine: no styles, no merged
//! ranges, no formula evaluation. The published flat file only needs cell
//! values and their column positions.

use std::io::Read;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Workbook reading error. Structural by nature: any of these aborts the
/// extraction run.
#[derive(Debug)]
pub enum WorkbookError {
    Archive(String),
    Xml(String),
    SheetNotFound(String),
}

impl std::fmt::Display for WorkbookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkbookError::Archive(e) => write!(f, "workbook archive error: {}", e),
            WorkbookError::Xml(e) => write!(f, "workbook XML error: {}", e),
            WorkbookError::SheetNotFound(name) => {
                write!(f, "worksheet '{}' not found in workbook", name)
            }
        }
    }
}

impl std::error::Error for WorkbookError {}

/// One sheet row: its 1-based row number and cell values by column index.
/// Absent cells are `None`; trailing absent cells may be missing entirely.
#[derive(Debug, Clone)]
pub struct SheetRow {
    pub number: u32,
    pub cells: Vec<Option<String>>,
}

impl SheetRow {
    /// Cell at `col`, or `None` when the row is shorter or the cell empty.
    pub fn cell(&self, col: usize) -> Option<&str> {
        self.cells.get(col).and_then(|c| c.as_deref())
    }
}

/// Reads the named worksheet from xlsx bytes into rows.
///
/// Sheet names are resolved through `xl/workbook.xml` and its relationships
/// part, so the on-disk worksheet file name never matters.
pub fn read_sheet(bytes: &[u8], sheet_name: &str) -> Result<Vec<SheetRow>, WorkbookError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| WorkbookError::Archive(e.to_string()))?;
    let sheet_path = resolve_sheet_path(&mut archive, sheet_name)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_xml = read_zip_entry_bounded(&mut archive, &sheet_path, MAX_XML_ENTRY_BYTES)?;
    parse_sheet_rows(&sheet_xml, &shared_strings)
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, WorkbookError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| WorkbookError::Archive(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| WorkbookError::Archive(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(WorkbookError::Archive(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Maps a sheet name to its worksheet part path via `xl/workbook.xml`
/// (name -> relationship id) and `xl/_rels/workbook.xml.rels`
/// (relationship id -> target).
fn resolve_sheet_path(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    sheet_name: &str,
) -> Result<String, WorkbookError> {
    let workbook_xml = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)?;
    let rel_id = find_sheet_rel_id(&workbook_xml, sheet_name)?
        .ok_or_else(|| WorkbookError::SheetNotFound(sheet_name.to_string()))?;

    let rels_xml =
        read_zip_entry_bounded(archive, "xl/_rels/workbook.xml.rels", MAX_XML_ENTRY_BYTES)?;
    let target = find_relationship_target(&rels_xml, &rel_id)?.ok_or_else(|| {
        WorkbookError::Xml(format!("workbook relationship '{}' not found", rel_id))
    })?;

    // Targets are relative to xl/ unless they start from the package root.
    Ok(match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    })
}

fn find_sheet_rel_id(xml: &[u8], sheet_name: &str) -> Result<Option<String>, WorkbookError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) | Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    let mut name = None;
                    let mut rel_id = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| WorkbookError::Xml(e.to_string()))?;
                        match attr.key.local_name().as_ref() {
                            b"name" => {
                                let v = attr
                                    .unescape_value()
                                    .map_err(|e| WorkbookError::Xml(e.to_string()))?;
                                name = Some(v.into_owned());
                            }
                            b"id" => {
                                rel_id =
                                    Some(String::from_utf8_lossy(attr.value.as_ref()).into_owned());
                            }
                            _ => {}
                        }
                    }
                    if name.as_deref() == Some(sheet_name) {
                        return Ok(rel_id);
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(WorkbookError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(None)
}

fn find_relationship_target(xml: &[u8], rel_id: &str) -> Result<Option<String>, WorkbookError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) | Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut id = None;
                    let mut target = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| WorkbookError::Xml(e.to_string()))?;
                        match attr.key.local_name().as_ref() {
                            b"Id" => {
                                id = Some(String::from_utf8_lossy(attr.value.as_ref()).into_owned());
                            }
                            b"Target" => {
                                let v = attr
                                    .unescape_value()
                                    .map_err(|e| WorkbookError::Xml(e.to_string()))?;
                                target = Some(v.into_owned());
                            }
                            _ => {}
                        }
                    }
                    if id.as_deref() == Some(rel_id) {
                        return Ok(target);
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(WorkbookError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(None)
}

/// Reads `xl/sharedStrings.xml` into an index-aligned table. A workbook with
/// no string cells has no shared-strings part at all; that is not an error.
///
/// Rich-text entries (`<si>` with multiple runs) are concatenated, and empty
/// entries still occupy their slot so indices stay aligned.
fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, WorkbookError> {
    if archive.by_name("xl/sharedStrings.xml").is_err() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut current = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(WorkbookError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum CellType {
    Number,
    Shared,
    Inline,
    FormulaStr,
}

fn parse_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<SheetRow>, WorkbookError> {
    let mut rows: Vec<SheetRow> = Vec::new();
    let mut current: Option<SheetRow> = None;

    let mut cell_col: usize = 0;
    let mut cell_type = CellType::Number;
    let mut pending: Option<String> = None;
    let mut in_v = false;
    let mut in_is = false;
    let mut in_is_t = false;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    if let Some(row) = current.take() {
                        rows.push(row);
                    }
                    let number = row_number(&e, rows.last().map(|r| r.number))?;
                    current = Some(SheetRow {
                        number,
                        cells: Vec::new(),
                    });
                    cell_col = 0;
                }
                b"c" => {
                    let (col, ty) = cell_attrs(&e, cell_col)?;
                    cell_col = col;
                    cell_type = ty;
                    pending = None;
                }
                b"v" => in_v = true,
                b"is" => in_is = true,
                b"t" if in_is => in_is_t = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => {
                    if let Some(row) = current.take() {
                        rows.push(row);
                    }
                    let number = row_number(&e, rows.last().map(|r| r.number))?;
                    rows.push(SheetRow {
                        number,
                        cells: Vec::new(),
                    });
                }
                b"c" => {
                    // Valueless cell; advance the implicit column cursor.
                    let (col, _) = cell_attrs(&e, cell_col)?;
                    cell_col = col + 1;
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) => {
                let text = te.unescape().unwrap_or_default();
                if in_v {
                    pending = Some(match cell_type {
                        CellType::Shared => match text.trim().parse::<usize>() {
                            Ok(i) => shared_strings.get(i).cloned().unwrap_or_default(),
                            Err(_) => String::new(),
                        },
                        _ => text.into_owned(),
                    });
                } else if in_is_t {
                    pending
                        .get_or_insert_with(String::new)
                        .push_str(text.as_ref());
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"is" => in_is = false,
                b"t" => in_is_t = false,
                b"c" => {
                    if let (Some(row), Some(value)) = (current.as_mut(), pending.take()) {
                        if row.cells.len() <= cell_col {
                            row.cells.resize(cell_col + 1, None);
                        }
                        row.cells[cell_col] = Some(value);
                    }
                    cell_col += 1;
                    cell_type = CellType::Number;
                }
                b"row" => {
                    if let Some(row) = current.take() {
                        rows.push(row);
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(WorkbookError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if let Some(row) = current.take() {
        rows.push(row);
    }
    Ok(rows)
}

fn row_number(
    e: &quick_xml::events::BytesStart<'_>,
    previous: Option<u32>,
) -> Result<u32, WorkbookError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| WorkbookError::Xml(e.to_string()))?;
        if attr.key.local_name().as_ref() == b"r" {
            let raw = String::from_utf8_lossy(attr.value.as_ref());
            return raw
                .trim()
                .parse::<u32>()
                .map_err(|_| WorkbookError::Xml(format!("invalid row reference '{}'", raw)));
        }
    }
    Ok(previous.map_or(1, |p| p + 1))
}

/// Resolves a cell's column index (from its `r="C7"`-style reference, or the
/// running cursor when absent) and its value type (`t` attribute).
fn cell_attrs(
    e: &quick_xml::events::BytesStart<'_>,
    cursor: usize,
) -> Result<(usize, CellType), WorkbookError> {
    let mut col = cursor;
    let mut ty = CellType::Number;
    for attr in e.attributes() {
        let attr = attr.map_err(|e| WorkbookError::Xml(e.to_string()))?;
        match attr.key.local_name().as_ref() {
            b"r" => {
                let raw = String::from_utf8_lossy(attr.value.as_ref());
                col = column_index(raw.as_ref())
                    .ok_or_else(|| WorkbookError::Xml(format!("invalid cell reference '{}'", raw)))?;
            }
            b"t" => {
                ty = match attr.value.as_ref() {
                    b"s" => CellType::Shared,
                    b"inlineStr" => CellType::Inline,
                    b"str" => CellType::FormulaStr,
                    _ => CellType::Number,
                };
            }
            _ => {}
        }
    }
    Ok((col, ty))
}

/// "A1" -> 0, "B7" -> 1, "AA3" -> 26.
fn column_index(cell_ref: &str) -> Option<usize> {
    let letters: String = cell_ref.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        return None;
    }
    let mut col: usize = 0;
    for c in letters.chars() {
        col = col * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(col - 1)
}
