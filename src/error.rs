use std::io;

use failure::Fail;

use crate::types::ScalarType;


/// Everything that can go wrong while parsing, reading or writing a PLY file.
///
/// None of these errors are transient: after an error, the stream position is
/// unspecified and the operation has to be started again from a fresh stream.
#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "IO error: {}", _0)]
    Io(io::Error),

    // ----- Header ----------------------------------------------------------
    #[fail(display = "not a valid PLY file (does not start with \"ply\")")]
    NotAPlyFile,

    #[fail(display = "PLY header does not contain a 'format' line")]
    MissingFormat,

    #[fail(
        display = "expected \"ascii\", \"binary_little_endian\" or \"binary_big_endian\" \
            as format, found '{}'",
        _0
    )]
    UnsupportedFormat(String),

    #[fail(display = "malformed PLY header line {}: {:?}", line, text)]
    MalformedHeaderLine {
        line: usize,
        text: String,
    },

    #[fail(display = "property '{}' defined without preceding element definition", _0)]
    PropertyBeforeElement(String),

    #[fail(display = "element '{}' is defined more than once", _0)]
    DuplicateElement(String),

    #[fail(display = "property '{}' is defined more than once on element '{}'", property, element)]
    DuplicateProperty {
        element: String,
        property: String,
    },

    #[fail(display = "\"{}\" is not a valid PLY scalar type", _0)]
    UnknownTypeToken(String),

    #[fail(
        display = "list lengths can only be stored as integers, but property '{}' uses '{}'",
        property,
        ty
    )]
    InvalidListCountType {
        property: String,
        ty: ScalarType,
    },

    #[fail(display = "{:?} is not a valid element, property or header line content", _0)]
    InvalidName(String),

    #[fail(
        display = "parsing lookahead got too big (due to a really degenerated file or a \
            parser bug)"
    )]
    LookAheadTooBig,

    // ----- Writing ---------------------------------------------------------
    #[fail(display = "no data was registered for property '{}' of element '{}'", property, element)]
    UnboundProperty {
        element: String,
        property: String,
    },

    #[fail(
        display = "element '{}' has {} rows, but data for {} rows was given",
        element,
        expected,
        actual
    )]
    RowCountMismatch {
        element: String,
        expected: usize,
        actual: usize,
    },

    #[fail(
        display = "{} values were registered for element '{}', which is not a multiple of \
            the {} values per row",
        count,
        element,
        per_row
    )]
    UnevenValueCount {
        element: String,
        count: usize,
        per_row: usize,
    },

    #[fail(
        display = "buffer for element '{}' should be {} bytes long, but is {} bytes",
        element,
        expected,
        actual
    )]
    BufferSizeMismatch {
        element: String,
        expected: usize,
        actual: usize,
    },

    #[fail(display = "list length {} cannot be stored as '{}'", len, ty)]
    ListLengthOverflow {
        len: usize,
        ty: ScalarType,
    },

    #[fail(display = "list properties of element '{}' need a list length of at least 1", _0)]
    ZeroListLength(String),

    #[fail(display = "property group on element '{}' does not name any property", _0)]
    EmptyPropertyGroup(String),

    // ----- Reading ---------------------------------------------------------
    #[fail(display = "element '{}' does not exist in the PLY file", _0)]
    UnknownElement(String),

    #[fail(display = "element '{}' has no property '{}'", element, property)]
    UnknownProperty {
        element: String,
        property: String,
    },

    #[fail(display = "property '{}' of element '{}' was already requested", property, element)]
    DuplicateRequest {
        element: String,
        property: String,
    },

    #[fail(
        display = "all properties requested together from element '{}' must have the same \
            type (and be either all lists or all scalars)",
        _0
    )]
    MixedRequestTypes(String),

    #[fail(display = "unexpected end of data while reading PLY body (at byte {})", offset)]
    TruncatedData {
        offset: usize,
    },

    #[fail(display = "invalid '{}' literal {:?} (at byte {})", ty, token, offset)]
    MalformedAsciiToken {
        token: String,
        ty: ScalarType,
        offset: usize,
    },

    #[fail(display = "negative or oversized list length (at byte {})", offset)]
    InvalidListLength {
        offset: usize,
    },

    #[fail(display = "expected values of type '{}', but found '{}'", expected, actual)]
    TypeMismatch {
        expected: ScalarType,
        actual: ScalarType,
    },
}

impl From<io::Error> for Error {
    fn from(src: io::Error) -> Self {
        Error::Io(src)
    }
}
