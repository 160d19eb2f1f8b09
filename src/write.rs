//! Everything related to writing a PLY file.
//!
//! Data is registered as type-erased byte buffers via
//! [`Writer::add_properties_to_element`], which also declares the elements
//! and properties in the header. [`Writer::write`] then renders the header
//! and streams the body in one forward pass.
//!
//! For ASCII encoding we simply use the `fmt::Display` impl of all types.
//! For floats, that's the shortest representation that parses back to the
//! identical value, so ASCII files round trip exactly.

use std::{
    io::{self, Write},
    marker::PhantomData,
};

use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use log::{debug, trace};
use smallvec::SmallVec;

use crate::{
    Error,
    header::write_header,
    raw::{check_name, Document, Encoding, PropertyType},
    types::{PlyScalar, ScalarType},
};


/// One buffer registered for a group of properties of one element.
#[derive(Debug, Clone)]
struct SourceBinding<'a> {
    /// Index of the element in the document.
    element: usize,

    /// Indices of the properties (within the element) this buffer holds
    /// values for, in the order they are interleaved in `data`.
    props: SmallVec<[usize; 4]>,

    ty: ScalarType,

    /// Number of list items per row, or `None` for scalar properties.
    list_len: Option<usize>,

    /// Packed values in native endianness.
    data: &'a [u8],
}

impl SourceBinding<'_> {
    fn values_per_prop(&self) -> usize {
        self.list_len.unwrap_or(1)
    }

    /// Number of bytes of one row of this binding.
    fn row_stride(&self) -> usize {
        self.props.len() * self.values_per_prop() * self.ty.width()
    }
}


/// A writer able to write binary and ASCII PLY files.
///
/// # Example
///
/// ```
/// use ply_codec::{Encoding, ScalarType, Writer};
///
/// let positions = [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
/// let indices = [0u32, 1, 2];
///
/// let pos_bytes = positions.iter().flat_map(|v| v.to_ne_bytes().to_vec()).collect::<Vec<_>>();
/// let idx_bytes = indices.iter().flat_map(|v| v.to_ne_bytes().to_vec()).collect::<Vec<_>>();
///
/// let mut writer = Writer::new(Encoding::Ascii);
/// writer.add_properties_to_element(
///     "vertex", &["x", "y", "z"], ScalarType::Float32, 9, &pos_bytes, None, 0,
/// )?;
/// writer.add_properties_to_element(
///     "face", &["vertex_indices"], ScalarType::Uint32, 3, &idx_bytes,
///     Some(ScalarType::Uint8), 3,
/// )?;
///
/// let file = writer.write_to_memory()?;
/// assert!(file.ends_with(b"end_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n"));
/// # Ok::<(), ply_codec::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Writer<'a> {
    document: Document,
    sources: Vec<SourceBinding<'a>>,
}

impl<'a> Writer<'a> {
    /// Creates a writer without any elements for the given encoding.
    pub fn new(encoding: Encoding) -> Self {
        Self {
            document: Document::new(encoding),
            sources: Vec::new(),
        }
    }

    /// Creates a writer with binary encoding (native endianness).
    pub fn binary() -> Self {
        Self::new(Encoding::binary_native())
    }

    /// Creates a writer with ASCII encoding. *Try avoid using ASCII
    /// encoding!*
    ///
    /// ASCII encoding is usually a lot less space efficient and a lot slower
    /// to read and write. The PLY file header is always ASCII.
    pub fn ascii() -> Self {
        Self::new(Encoding::Ascii)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access to the header description. Properties added here
    /// without registering data for them make [`Writer::write`] fail with
    /// `UnboundProperty`.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn comments(&self) -> &[String] {
        self.document.comments()
    }

    pub fn comments_mut(&mut self) -> &mut Vec<String> {
        self.document.comments_mut()
    }

    /// Adds a `comment` line to the header. The comment must not contain
    /// line breaks, otherwise writing fails.
    pub fn add_comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.document.comments_mut().push(comment.into());
        self
    }

    /// Adds an `obj_info` line to the header.
    pub fn add_obj_info(&mut self, info: impl Into<String>) -> &mut Self {
        self.document.obj_info_mut().push(info.into());
        self
    }

    /// Declares the properties `names` on the element `element` and
    /// registers `data` as the source of their values.
    ///
    /// - `ty` is the type of each value (for lists: of each list item).
    /// - `count` is the total number of values in `data`. `data` has to be
    ///   exactly `count * ty.width()` bytes long and contain the values in
    ///   native endianness.
    /// - `list_len_type` is `None` for scalar properties. For list properties
    ///   it's the type used to store the list length, and `list_len` is the
    ///   length of every list (all rows have the same length).
    ///
    /// Values of multiple properties are interleaved per row: for names `x
    /// y z`, `data` holds `x0 y0 z0 x1 y1 z1 ...`. For lists, all items of one
    /// row follow each other.
    ///
    /// The element is created if it doesn't exist yet. The number of rows is
    /// derived from `count`; if the element already exists, it has to match
    /// the number of rows of the element.
    pub fn add_properties_to_element(
        &mut self,
        element: &str,
        names: &[&str],
        ty: ScalarType,
        count: usize,
        data: &'a [u8],
        list_len_type: Option<ScalarType>,
        list_len: usize,
    ) -> Result<(), Error> {
        if names.is_empty() {
            return Err(Error::EmptyPropertyGroup(element.into()));
        }

        // ----- Check shape of the data -----------------------------------
        let list_len = match list_len_type {
            None => None,
            Some(_) if list_len == 0 => return Err(Error::ZeroListLength(element.into())),
            Some(len_type) => {
                // Make sure the length can be written later.
                dispatch_scalar!(len_type, |T| {
                    if num_traits::cast::<usize, T>(list_len).is_none() {
                        return Err(Error::ListLengthOverflow { len: list_len, ty: len_type });
                    }
                });
                Some(list_len)
            }
        };

        let expected_bytes = count.saturating_mul(ty.width());
        if data.len() != expected_bytes {
            return Err(Error::BufferSizeMismatch {
                element: element.into(),
                expected: expected_bytes,
                actual: data.len(),
            });
        }

        let per_row = names.len() * list_len.unwrap_or(1);
        if count % per_row != 0 {
            return Err(Error::UnevenValueCount { element: element.into(), count, per_row });
        }
        let rows = count / per_row;

        // ----- Check names and types before modifying anything -----------
        if let Some(len_type) = list_len_type {
            if !len_type.is_integer() {
                return Err(Error::InvalidListCountType {
                    property: names[0].to_string(),
                    ty: len_type,
                });
            }
        }

        check_name(element)?;
        for (i, name) in names.iter().enumerate() {
            check_name(name)?;

            let taken = names[..i].contains(name) || self.document
                .element(element)
                .map(|e| e.property_pos(name).is_some())
                .unwrap_or(false);

            if taken {
                return Err(Error::DuplicateProperty {
                    element: element.into(),
                    property: name.to_string(),
                });
            }
        }

        let elem_idx = match self.document.element_pos(element) {
            Some(idx) => {
                let existing = self.document.elements()[idx].count();
                if existing != rows {
                    return Err(Error::RowCountMismatch {
                        element: element.into(),
                        expected: existing,
                        actual: rows,
                    });
                }
                idx
            }
            None => {
                self.document.add_element(element, rows)?;
                self.document.elements().len() - 1
            }
        };

        // ----- Declare properties and remember the source ----------------
        let elem = self.document.element_at_mut(elem_idx);
        let mut props = SmallVec::new();
        for name in names {
            elem.add_property(*name, PropertyType::new(ty, list_len_type))?;
            props.push(elem.properties().len() - 1);
        }

        self.sources.push(SourceBinding {
            element: elem_idx,
            props,
            ty,
            list_len,
            data,
        });

        Ok(())
    }

    /// Writes the header and the body to the given `io::Write` instance.
    ///
    /// Writes are not buffered here; pass a `BufWriter` if `writer` is a file
    /// or socket.
    pub fn write(&self, mut writer: impl Write) -> Result<(), Error> {
        let slots = self.resolve_sources()?;

        write_header(&self.document, &mut writer)?;

        match self.document.encoding() {
            Encoding::Ascii => {
                self.write_body(AsciiSerializer::new(&mut writer), &slots)?;
            }
            Encoding::BinaryBigEndian => {
                self.write_body(BinarySerializer::<_, BigEndian>::new(&mut writer), &slots)?;
            }
            Encoding::BinaryLittleEndian => {
                self.write_body(BinarySerializer::<_, LittleEndian>::new(&mut writer), &slots)?;
            }
        }

        writer.flush()?;
        debug!(
            "wrote PLY file: {} encoding, {} elements",
            self.document.encoding(),
            self.document.elements().len(),
        );

        Ok(())
    }

    /// Writes the file into a `Vec<u8>` which is returned on success.
    pub fn write_to_memory(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }

    /// Finds the source binding for each property of each element. Returns
    /// `slots[element][property] = (binding index, position in binding)`.
    fn resolve_sources(&self) -> Result<Vec<Vec<(usize, usize)>>, Error> {
        let mut slots = Vec::with_capacity(self.document.elements().len());

        for (elem_idx, elem) in self.document.elements().iter().enumerate() {
            let mut elem_slots = Vec::with_capacity(elem.properties().len());

            for (prop_idx, prop) in elem.properties().iter().enumerate() {
                let found = self.sources.iter().enumerate().find_map(|(i, src)| {
                    if src.element != elem_idx {
                        return None;
                    }
                    src.props.iter().position(|&p| p == prop_idx).map(|pos| (i, pos))
                });

                let (src_idx, pos) = found.ok_or_else(|| Error::UnboundProperty {
                    element: elem.name().into(),
                    property: prop.name.clone(),
                })?;

                // The document might have been changed via `document_mut`
                // after registering the data.
                let src = &self.sources[src_idx];
                if src.ty != prop.ty.scalar_type() {
                    return Err(Error::TypeMismatch {
                        expected: prop.ty.scalar_type(),
                        actual: src.ty,
                    });
                }
                let src_rows = src.data.len() / src.row_stride();
                if src_rows != elem.count() {
                    return Err(Error::RowCountMismatch {
                        element: elem.name().into(),
                        expected: elem.count(),
                        actual: src_rows,
                    });
                }

                elem_slots.push((src_idx, pos));
            }

            slots.push(elem_slots);
        }

        Ok(slots)
    }

    /// Writes all rows of all elements, property by property in declaration
    /// order.
    fn write_body(
        &self,
        mut ser: impl Serializer,
        slots: &[Vec<(usize, usize)>],
    ) -> Result<(), Error> {
        for (elem, elem_slots) in self.document.elements().iter().zip(slots) {
            // Rows without properties have no representation in the body.
            if elem.properties().is_empty() {
                continue;
            }

            trace!("writing {} rows of element '{}'", elem.count(), elem.name());

            for row in 0..elem.count() {
                for (prop, &(src_idx, pos)) in elem.properties().iter().zip(elem_slots) {
                    let src = &self.sources[src_idx];
                    let width = src.ty.width();
                    let items = src.values_per_prop();
                    let start = row * src.row_stride() + pos * items * width;

                    if let PropertyType::List { len_type, .. } = prop.ty {
                        ser.add_len(len_type, items)?;
                    }

                    let values = &src.data[start..start + items * width];
                    for value in values.chunks_exact(width) {
                        ser.add(src.ty, value)?;
                    }
                }

                ser.end_element()?;
            }
        }

        Ok(())
    }
}


// ===========================================================================
// ===== Definition of ASCII and binary serializers
// ===========================================================================
// These serializers are just used to abstract over the encoding (and things
// like separators and line endings).

trait Serializer {
    /// Writes one value of type `ty` given as native endian bytes.
    fn add(&mut self, ty: ScalarType, native: &[u8]) -> Result<(), Error>;

    /// Writes a list length as type `ty`.
    fn add_len(&mut self, ty: ScalarType, len: usize) -> Result<(), Error>;

    fn end_element(&mut self) -> Result<(), Error>;
}

#[derive(Debug)]
struct AsciiSerializer<'a, W: Write> {
    writer: &'a mut W,
    at_start_of_line: bool,
}

impl<'a, W: Write> AsciiSerializer<'a, W> {
    fn new(w: &'a mut W) -> Self {
        Self {
            writer: w,
            at_start_of_line: true,
        }
    }

    fn write_separator(&mut self) -> Result<(), io::Error> {
        if self.at_start_of_line {
            self.at_start_of_line = false;
        } else {
            self.writer.write_all(b" ")?;
        }

        Ok(())
    }
}

impl<W: Write> Serializer for AsciiSerializer<'_, W> {
    fn add(&mut self, ty: ScalarType, native: &[u8]) -> Result<(), Error> {
        self.write_separator()?;
        dispatch_scalar!(ty, |T| write!(self.writer, "{}", T::read::<NativeEndian>(native)))?;
        Ok(())
    }

    fn add_len(&mut self, ty: ScalarType, len: usize) -> Result<(), Error> {
        self.write_separator()?;
        dispatch_scalar!(ty, |T| {
            let v = num_traits::cast::<usize, T>(len)
                .ok_or(Error::ListLengthOverflow { len, ty })?;
            write!(self.writer, "{}", v)?;
        });
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), Error> {
        self.writer.write_all(b"\n")?;
        self.at_start_of_line = true;
        Ok(())
    }
}

/// Binary serializer writing all values in the byte order `B`.
#[derive(Debug)]
struct BinarySerializer<'a, W: Write, B: ByteOrder> {
    writer: &'a mut W,
    _endianness: PhantomData<B>,
}

impl<'a, W: Write, B: ByteOrder> BinarySerializer<'a, W, B> {
    fn new(w: &'a mut W) -> Self {
        Self {
            writer: w,
            _endianness: PhantomData,
        }
    }

    fn write_value<T: PlyScalar>(&mut self, v: T) -> Result<(), Error> {
        let mut bytes = [0u8; 8];
        let bytes = &mut bytes[..T::TY.width()];
        v.write::<B>(bytes);
        self.writer.write_all(bytes)?;
        Ok(())
    }
}

impl<W: Write, B: ByteOrder> Serializer for BinarySerializer<'_, W, B> {
    fn add(&mut self, ty: ScalarType, native: &[u8]) -> Result<(), Error> {
        dispatch_scalar!(ty, |T| self.write_value(T::read::<NativeEndian>(native)))
    }

    fn add_len(&mut self, ty: ScalarType, len: usize) -> Result<(), Error> {
        dispatch_scalar!(ty, |T| {
            let v = num_traits::cast::<usize, T>(len)
                .ok_or(Error::ListLengthOverflow { len, ty })?;
            self.write_value(v)
        })
    }

    fn end_element(&mut self) -> Result<(), Error> {
        // NOOP
        Ok(())
    }
}
