//! Everything related to reading a PLY file.
//!
//! Reading happens in two phases. [`Reader::new`] parses the header, after
//! which the caller can inspect the [`Document`] and request the properties
//! it is interested in. [`Reader::read`] then makes one forward pass over the
//! body, copying requested values into [`ResultBuffer`]s and skipping
//! everything else.

use std::{
    cmp::min,
    fmt,
    io::Read,
};

use byteorder::{BigEndian, LittleEndian, NativeEndian};
use log::{debug, trace};
use num_traits::ToPrimitive;
use smallvec::SmallVec;

use crate::{
    Error,
    header::parse_header,
    parse::{Buffer, Input},
    raw::{Document, ElementDef, Encoding},
    types::{PlyScalar, ScalarType},
};


/// Upper bound for the memory reserved for a result buffer before reading.
/// The row count comes straight from the header, so it can't be trusted.
const MAX_PREALLOC_BYTES: usize = 16 * 1024 * 1024;

/// Unrequested binary lists are skipped in chunks of this size, so that a
/// corrupted list length results in `TruncatedData` and doesn't require a
/// huge lookahead.
const SKIP_CHUNK_SIZE: usize = 64 * 1024;


/// Identifies one request made via [`Reader::request_properties_from_element`]
/// and the corresponding buffer in the [`ReadResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(usize);

#[derive(Debug, Clone)]
struct Request {
    element: usize,
    props: SmallVec<[usize; 4]>,
    ty: ScalarType,
    is_list: bool,
}

/// A reader for PLY files.
///
/// # Example
///
/// ```
/// use ply_codec::{Reader, ScalarType};
///
/// let file = b"\
///     ply\n\
///     format ascii 1.0\n\
///     element vertex 2\n\
///     property float x\n\
///     property float y\n\
///     property uchar red\n\
///     end_header\n\
///     0.5 1 255\n\
///     2 -3.25 0\n";
///
/// let mut reader = Reader::new(&file[..])?;
/// let xy = reader.request_properties_from_element("vertex", &["x", "y"])?;
///
/// let mut result = reader.read()?;
/// let xy = result.take(xy).unwrap();
/// assert_eq!(xy.ty(), ScalarType::Float32);
/// assert_eq!(xy.count(), 4);
/// assert_eq!(xy.to_vec::<f32>()?, [0.5, 1.0, 2.0, -3.25]);
/// # Ok::<(), ply_codec::Error>(())
/// ```
pub struct Reader<R: Read> {
    buf: Buffer<R>,
    document: Document,
    body_offset: usize,
    requests: Vec<Request>,
}

impl<R: Read> fmt::Debug for Reader<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reader")
            .field("document", &self.document)
            .field("body_offset", &self.body_offset)
            .field("requests", &self.requests)
            .finish()
    }
}

impl<R: Read> Reader<R> {
    /// Creates a new reader and immediately parses the header.
    ///
    /// Reads are buffered internally, so there is no need to wrap `reader`
    /// into a `BufReader`.
    pub fn new(reader: R) -> Result<Self, Error> {
        let mut buf = Buffer::new(reader)?;
        let document = parse_header(&mut buf)?;
        let body_offset = buf.offset();

        Ok(Self {
            buf,
            document,
            body_offset,
            requests: Vec::new(),
        })
    }

    /// The parsed header.
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn encoding(&self) -> Encoding {
        self.document.encoding()
    }

    pub fn comments(&self) -> &[String] {
        self.document.comments()
    }

    pub fn obj_info(&self) -> &[String] {
        self.document.obj_info()
    }

    pub fn elements(&self) -> &[ElementDef] {
        self.document.elements()
    }

    /// The byte position where the body starts (i.e. the length of the
    /// header including the `end_header` line).
    pub fn body_offset(&self) -> usize {
        self.body_offset
    }

    /// Requests the values of the properties `names` of element `element`.
    ///
    /// All values end up in one buffer, interleaved per row in the order of
    /// `names`. All properties of one request need the same scalar type and
    /// have to be either all lists or all scalars. Each property can be
    /// requested only once.
    ///
    /// On error, nothing is requested and the reader can still be used.
    pub fn request_properties_from_element(
        &mut self,
        element: &str,
        names: &[&str],
    ) -> Result<RequestHandle, Error> {
        let elem_idx = self.document.element_pos(element)
            .ok_or_else(|| Error::UnknownElement(element.into()))?;
        let elem = &self.document.elements()[elem_idx];

        if names.is_empty() {
            return Err(Error::EmptyPropertyGroup(element.into()));
        }

        let mut props = SmallVec::<[usize; 4]>::new();
        for name in names {
            let prop_idx = elem.property_pos(name).ok_or_else(|| Error::UnknownProperty {
                element: element.into(),
                property: name.to_string(),
            })?;

            let already_requested = props.contains(&prop_idx) || self.requests.iter()
                .any(|r| r.element == elem_idx && r.props.contains(&prop_idx));
            if already_requested {
                return Err(Error::DuplicateRequest {
                    element: element.into(),
                    property: name.to_string(),
                });
            }

            props.push(prop_idx);
        }

        let first = elem.properties()[props[0]].ty;
        let uniform = props.iter().map(|&p| elem.properties()[p].ty).all(|ty| {
            ty.scalar_type() == first.scalar_type() && ty.is_list() == first.is_list()
        });
        if !uniform {
            return Err(Error::MixedRequestTypes(element.into()));
        }

        debug!("requested {:?} of element '{}' as {}", names, element, first.scalar_type());

        let handle = RequestHandle(self.requests.len());
        self.requests.push(Request {
            element: elem_idx,
            props,
            ty: first.scalar_type(),
            is_list: first.is_list(),
        });

        Ok(handle)
    }

    /// Reads the whole body and returns the values of all requested
    /// properties.
    ///
    /// The body is always read completely, even if nothing was requested, so
    /// truncated files are always detected.
    pub fn read(mut self) -> Result<ReadResult, Error> {
        // `routes[element][property]` is the request that property belongs
        // to and its position within that request.
        let mut routes = self.document.elements()
            .iter()
            .map(|e| vec![None::<(usize, usize)>; e.properties().len()])
            .collect::<Vec<_>>();

        let mut results = Vec::with_capacity(self.requests.len());
        let mut stages = Vec::with_capacity(self.requests.len());
        for (i, req) in self.requests.iter().enumerate() {
            for (pos, &p) in req.props.iter().enumerate() {
                routes[req.element][p] = Some((i, pos));
            }

            // Values of requests whose properties are in file order can be
            // appended directly. All others are collected per row first.
            let in_file_order = req.props.windows(2).all(|w| w[0] < w[1]);
            stages.push(if in_file_order {
                None
            } else {
                Some(RowStage::new(req.props.len()))
            });

            let capacity = if req.is_list {
                0
            } else {
                let elem = &self.document.elements()[req.element];
                min(
                    elem.count().saturating_mul(req.props.len()).saturating_mul(req.ty.width()),
                    MAX_PREALLOC_BYTES,
                )
            };

            results.push(ResultBuffer {
                ty: req.ty,
                is_list: req.is_list,
                data: Vec::with_capacity(capacity),
                list_lengths: Vec::new(),
            });
        }

        let mut body = Body {
            doc: &self.document,
            requests: &self.requests,
            routes: &routes,
            stages: &mut stages,
            results: &mut results,
        };
        let buf = &mut self.buf;
        match self.document.encoding() {
            Encoding::Ascii => body.read::<AsciiEncoding, _>(buf)?,
            Encoding::BinaryBigEndian => body.read::<BbeEncoding, _>(buf)?,
            Encoding::BinaryLittleEndian => body.read::<BleEncoding, _>(buf)?,
        }

        debug!(
            "read PLY body: {} bytes, {} requests",
            self.buf.offset() - self.body_offset,
            results.len(),
        );

        Ok(ReadResult {
            buffers: results.into_iter().map(Some).collect(),
        })
    }
}

/// The values of one row for a request whose properties are not requested
/// in file order. Flushed into the result at the end of each row.
#[derive(Debug)]
struct RowStage {
    /// Raw values per position in the request.
    items: Vec<Vec<u8>>,

    /// List length per position in the request.
    lens: Vec<u32>,
}

impl RowStage {
    fn new(num_props: usize) -> Self {
        Self {
            items: vec![Vec::new(); num_props],
            lens: vec![0; num_props],
        }
    }

    fn flush_into(&mut self, result: &mut ResultBuffer) {
        for (items, &len) in self.items.iter_mut().zip(&self.lens) {
            result.data.extend_from_slice(items);
            items.clear();
            if result.is_list {
                result.list_lengths.push(len);
            }
        }
    }
}

/// Everything needed to route the body's values into the result buffers.
struct Body<'a> {
    doc: &'a Document,
    requests: &'a [Request],
    routes: &'a [Vec<Option<(usize, usize)>>],
    stages: &'a mut [Option<RowStage>],
    results: &'a mut [ResultBuffer],
}

impl Body<'_> {
    /// Reads all rows of all elements.
    fn read<E: EncodingReader, R: Read>(&mut self, buf: &mut Buffer<R>) -> Result<(), Error> {
        let (doc, routes, requests) = (self.doc, self.routes, self.requests);

        for (elem_idx, (elem, elem_routes)) in doc.elements().iter().zip(routes).enumerate() {
            // A row without properties doesn't occupy any space.
            if elem.properties().is_empty() {
                continue;
            }

            trace!("reading {} rows of element '{}' at byte {}", elem.count(), elem.name(), buf.offset());

            let staged = requests.iter()
                .enumerate()
                .filter(|(i, r)| r.element == elem_idx && self.stages[*i].is_some())
                .map(|(i, _)| i)
                .collect::<SmallVec<[usize; 4]>>();

            for _ in 0..elem.count() {
                for (prop, route) in elem.properties().iter().zip(elem_routes) {
                    let len = match prop.ty.len_type() {
                        None => None,
                        Some(len_type) => Some(read_list_len::<E>(buf, len_type)?),
                    };
                    let num_items = len.map(|l| l as usize).unwrap_or(1);
                    let ty = prop.ty.scalar_type();

                    let (req, pos) = match *route {
                        Some(route) => route,
                        None => {
                            E::skip(buf, ty, num_items)?;
                            continue;
                        }
                    };

                    let out = match &mut self.stages[req] {
                        Some(stage) => {
                            stage.lens[pos] = len.unwrap_or(0);
                            &mut stage.items[pos]
                        }
                        None => {
                            let result = &mut self.results[req];
                            if let Some(len) = len {
                                result.list_lengths.push(len);
                            }
                            &mut result.data
                        }
                    };

                    dispatch_scalar!(ty, |T| for _ in 0..num_items {
                        E::read::<T>(buf)?.extend_native(out);
                    });
                }

                for &req in &staged {
                    if let Some(stage) = &mut self.stages[req] {
                        stage.flush_into(&mut self.results[req]);
                    }
                }
            }
        }

        Ok(())
    }
}

fn read_list_len<E: EncodingReader>(buf: &mut impl Input, ty: ScalarType) -> Result<u32, Error> {
    let offset = buf.offset();
    let len = dispatch_scalar!(ty, |T| E::read::<T>(buf)?.to_u32());
    len.ok_or(Error::InvalidListLength { offset })
}


// ===========================================================================
// ===== Abstraction over the body encoding
// ===========================================================================

trait EncodingReader {
    fn read<T: PlyScalar>(buf: &mut impl Input) -> Result<T, Error>;

    /// Skips `n` values of type `ty`.
    fn skip(buf: &mut impl Input, ty: ScalarType, n: usize) -> Result<(), Error>;
}

macro_rules! binary_encoding {
    ($name:ident, $order:ident, $doc:literal) => {
        #[doc = $doc]
        enum $name {}

        impl EncodingReader for $name {
            fn read<T: PlyScalar>(buf: &mut impl Input) -> Result<T, Error> {
                buf.with_bytes(T::TY.width(), |sd| Ok(T::read::<$order>(sd.data)))
            }

            fn skip(buf: &mut impl Input, ty: ScalarType, n: usize) -> Result<(), Error> {
                let offset = buf.offset();
                let mut remaining = n.checked_mul(ty.width())
                    .ok_or(Error::InvalidListLength { offset })?;

                while remaining > 0 {
                    let chunk = min(remaining, SKIP_CHUNK_SIZE);
                    buf.skip(chunk)?;
                    remaining -= chunk;
                }

                Ok(())
            }
        }
    };
}

binary_encoding!(BbeEncoding, BigEndian, "Binary big endian encoding.");
binary_encoding!(BleEncoding, LittleEndian, "Binary little endian encoding.");

/// ASCII encoding. Values are separated by arbitrary whitespace; line breaks
/// are not required to match rows.
enum AsciiEncoding {}

impl EncodingReader for AsciiEncoding {
    fn read<T: PlyScalar>(buf: &mut impl Input) -> Result<T, Error> {
        buf.skip_until(|b: u8| !b.is_ascii_whitespace())?;
        if buf.is_eof()? {
            return Err(Error::TruncatedData { offset: buf.offset() });
        }

        buf.take_until(|b: u8| b.is_ascii_whitespace(), true, |sd| {
            sd.as_ascii()
                .and_then(|s| s.parse::<T>().ok())
                .ok_or_else(|| Error::MalformedAsciiToken {
                    token: sd.lossy(),
                    ty: T::TY,
                    offset: sd.offset,
                })
        })
    }

    fn skip(buf: &mut impl Input, ty: ScalarType, n: usize) -> Result<(), Error> {
        // Skipped values are still parsed, to detect malformed files.
        dispatch_scalar!(ty, |T| for _ in 0..n {
            Self::read::<T>(buf)?;
        });

        Ok(())
    }
}


// ===========================================================================
// ===== Results
// ===========================================================================

/// The values of all requests, returned by [`Reader::read`].
#[derive(Debug, Clone)]
pub struct ReadResult {
    buffers: Vec<Option<ResultBuffer>>,
}

impl ReadResult {
    /// Returns the buffer of the given request. Returns `None` if the handle
    /// belongs to another reader or the buffer was already taken.
    pub fn get(&self, handle: RequestHandle) -> Option<&ResultBuffer> {
        self.buffers.get(handle.0).and_then(|b| b.as_ref())
    }

    /// Moves the buffer of the given request out of this result.
    pub fn take(&mut self, handle: RequestHandle) -> Option<ResultBuffer> {
        self.buffers.get_mut(handle.0).and_then(|b| b.take())
    }
}

/// Type-erased values of one request.
///
/// The values are stored packed in native endianness, interleaved per row in
/// the order the properties were requested. For list properties, all items
/// of a list follow each other and [`ResultBuffer::list_lengths`] holds the
/// length of each list.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBuffer {
    ty: ScalarType,
    is_list: bool,
    data: Vec<u8>,
    list_lengths: Vec<u32>,
}

impl ResultBuffer {
    pub fn ty(&self) -> ScalarType {
        self.ty
    }

    /// The number of values (for lists: the number of list items in total,
    /// not the number of lists).
    pub fn count(&self) -> usize {
        self.data.len() / self.ty.width()
    }

    pub fn is_list(&self) -> bool {
        self.is_list
    }

    /// The raw bytes in native endianness. Always `count() * ty().width()`
    /// bytes long.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// For list requests: the length of each list, in file order (row by
    /// row, property by property). Empty for scalar requests.
    pub fn list_lengths(&self) -> &[u32] {
        &self.list_lengths
    }

    /// Copies all values into a typed vector. Fails with `TypeMismatch` if
    /// `T` doesn't correspond to `self.ty()`.
    pub fn to_vec<T: PlyScalar>(&self) -> Result<Vec<T>, Error> {
        if T::TY != self.ty {
            return Err(Error::TypeMismatch { expected: self.ty, actual: T::TY });
        }

        let out = self.data
            .chunks_exact(self.ty.width())
            .map(T::read::<NativeEndian>)
            .collect();

        Ok(out)
    }
}
