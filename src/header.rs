//! Rendering and parsing of the textual PLY header.
//!
//! # Random notes on the format
//!
//! - The PLY docs say "The header is a series of carriage-return terminated
//!   lines", but practically all files in the wild use `'\n'`. We always
//!   write `'\n'` and accept both `"\n"` and `"\r\n"` when parsing.
//! - `comment` (and `obj_info`) lines may appear anywhere in the header,
//!   even before the `format` line. Lots of exporters do that.

use std::io::Write;

use log::debug;

use crate::{
    Error,
    parse::Input,
    raw::{Document, Encoding, PropertyType},
    types::ScalarType,
};


/// Writes the complete header including the final `end_header` line.
pub(crate) fn write_header(doc: &Document, w: &mut impl Write) -> Result<(), Error> {
    // Magic signature
    w.write_all(b"ply\n")?;

    writeln!(w, "format {} {}", doc.encoding(), doc.version())?;

    for comment in doc.comments() {
        check_line_content(comment)?;
        writeln!(w, "comment {}", comment)?;
    }
    for info in doc.obj_info() {
        check_line_content(info)?;
        writeln!(w, "obj_info {}", info)?;
    }

    for element_def in doc.elements() {
        writeln!(w, "element {} {}", element_def.name(), element_def.count())?;
        for prop in element_def.properties() {
            match prop.ty {
                PropertyType::Scalar(ty) => {
                    writeln!(w, "property {} {}", ty, prop.name)?;
                }
                PropertyType::List { len_type, scalar_type } => {
                    writeln!(w, "property list {} {} {}", len_type, scalar_type, prop.name)?;
                }
            }
        }
    }

    w.write_all(b"end_header\n")?;

    Ok(())
}

fn check_line_content(s: &str) -> Result<(), Error> {
    if s.contains(|c: char| c == '\n' || c == '\r') {
        Err(Error::InvalidName(s.to_string()))
    } else {
        Ok(())
    }
}

/// Parses the header from the start of `buf`, up to and including the
/// `end_header` line. Afterwards, `buf` is positioned at the first byte of
/// the body.
pub(crate) fn parse_header(buf: &mut impl Input) -> Result<Document, Error> {
    // ===== Magic number ====================================================
    // PLY files always start with `ply`. We check that before reading a whole
    // line, so that we don't scan megabytes of some random binary file for a
    // line break.
    if !buf.is_next(b"ply")? {
        return Err(Error::NotAPlyFile);
    }
    let first = read_line(buf, 1).map_err(|e| match e {
        Error::TruncatedData { .. }
        | Error::LookAheadTooBig
        | Error::MalformedHeaderLine { .. } => Error::NotAPlyFile,
        other => other,
    })?;
    if first.trim_end() != "ply" {
        return Err(Error::NotAPlyFile);
    }


    // ===== All other lines =================================================
    let mut doc = Document::new(Encoding::Ascii);
    let mut format_seen = false;
    let mut line_number = 1;

    loop {
        line_number += 1;
        let line = read_line(buf, line_number)?;

        let malformed = || Error::MalformedHeaderLine {
            line: line_number,
            text: line.clone(),
        };

        let mut tokens = line.split_ascii_whitespace();
        let keyword = match tokens.next() {
            Some(keyword) => keyword,
            None => continue,
        };

        // Only comments and obj_info may contain non-ASCII text.
        let is_free_text = keyword == "comment" || keyword == "obj_info";
        if !is_free_text && !line.is_ascii() {
            return Err(malformed());
        }

        match keyword {
            "comment" => doc.comments_mut().push(rest_of_line(&line, keyword).into()),
            "obj_info" => doc.obj_info_mut().push(rest_of_line(&line, keyword).into()),

            // e.g. `format binary_little_endian 1.0`
            "format" => {
                if format_seen {
                    return Err(malformed());
                }

                let (encoding, version) = match (tokens.next(), tokens.next(), tokens.next()) {
                    (Some(e), Some(v), None) => (e, v),
                    _ => return Err(malformed()),
                };

                doc.set_encoding(Encoding::from_header_token(encoding)?);
                doc.set_version(version);
                format_seen = true;
            }

            // e.g. `element vertex 8`
            "element" => {
                let (name, count) = match (tokens.next(), tokens.next(), tokens.next()) {
                    (Some(name), Some(count), None) => (name, count),
                    _ => return Err(malformed()),
                };
                let count = count.parse::<usize>().map_err(|_| malformed())?;

                doc.add_element(name, count)?;
            }

            // e.g. `property float x` or `property list uchar int vertex_index`
            "property" => {
                let (ty, name) = match (tokens.next(), tokens.next(), tokens.next()) {
                    (Some("list"), Some(len_type), Some(scalar_type)) => {
                        let name = match (tokens.next(), tokens.next()) {
                            (Some(name), None) => name,
                            _ => return Err(malformed()),
                        };

                        let len_type = len_type.parse::<ScalarType>()?;
                        let scalar_type = scalar_type.parse::<ScalarType>()?;
                        (PropertyType::List { len_type, scalar_type }, name)
                    }
                    (Some(ty), Some(name), None) if ty != "list" => {
                        (PropertyType::Scalar(ty.parse::<ScalarType>()?), name)
                    }
                    _ => return Err(malformed()),
                };

                let elem = doc.last_element_mut()
                    .ok_or_else(|| Error::PropertyBeforeElement(name.to_string()))?;
                elem.add_property(name, ty)?;
            }

            "end_header" => {
                if tokens.next().is_some() {
                    return Err(malformed());
                }
                break;
            }

            _ => return Err(malformed()),
        }
    }

    if !format_seen {
        return Err(Error::MissingFormat);
    }

    debug!(
        "parsed PLY header: {} encoding, {} elements, {} comments, body starts at byte {}",
        doc.encoding(),
        doc.elements().len(),
        doc.comments().len(),
        buf.offset(),
    );

    Ok(doc)
}

/// Reads one line (consuming the `'\n'`) and returns it without the line
/// ending. A trailing `'\r'` is stripped as well. The line has to be valid
/// UTF-8; `line` is only used for the error.
fn read_line(buf: &mut impl Input, line: usize) -> Result<String, Error> {
    let text = buf.take_until(b'\n', false, |sd| {
        let text = std::str::from_utf8(sd.data)
            .map_err(|_| Error::MalformedHeaderLine { line, text: sd.lossy() })?;
        Ok(text.strip_suffix('\r').unwrap_or(text).to_string())
    })?;
    buf.consume(1);

    Ok(text)
}

/// Everything after the keyword, with leading whitespace removed.
fn rest_of_line<'a>(line: &'a str, keyword: &str) -> &'a str {
    let is_space = |c: char| c.is_ascii_whitespace();
    line.trim_start_matches(is_space)[keyword.len()..].trim_start_matches(is_space)
}
