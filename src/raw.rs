//! The in-memory description of a PLY file: encoding, comments, and the
//! ordered element and property definitions.
//!
//! The order of elements and of the properties within an element is exactly
//! the order in which the data is laid out in the body. Both the header
//! parser and the write registration build a [`Document`] through the
//! builder methods here, which enforce that names are unique.

use derive_more::Display;

use crate::{Error, types::ScalarType};


/// The encoding of the body of a PLY file. The header is always ASCII.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Encoding {
    #[display(fmt = "ascii")]
    Ascii,

    #[display(fmt = "binary_big_endian")]
    BinaryBigEndian,

    #[display(fmt = "binary_little_endian")]
    BinaryLittleEndian,
}

impl Encoding {
    /// Returns the binary encoding with the native endianness of the target.
    pub fn binary_native() -> Self {
        #[cfg(target_endian = "big")]
        { Encoding::BinaryBigEndian }

        #[cfg(target_endian = "little")]
        { Encoding::BinaryLittleEndian }
    }

    pub fn is_binary(&self) -> bool {
        *self != Encoding::Ascii
    }

    /// Parses the encoding token of the `format` line.
    pub fn from_header_token(token: &str) -> Result<Self, Error> {
        match token {
            "ascii" => Ok(Encoding::Ascii),
            "binary_big_endian" => Ok(Encoding::BinaryBigEndian),
            "binary_little_endian" => Ok(Encoding::BinaryLittleEndian),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// The type of a property: either a single scalar or a list of scalars with
/// a length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Scalar(ScalarType),
    List {
        len_type: ScalarType,
        scalar_type: ScalarType,
    },
}

impl PropertyType {
    /// Creates a scalar type if `list_len_type` is `None`, a list type
    /// otherwise. Does not validate `list_len_type`; that happens when the
    /// property is added to an element.
    pub fn new(scalar_type: ScalarType, list_len_type: Option<ScalarType>) -> Self {
        match list_len_type {
            None => PropertyType::Scalar(scalar_type),
            Some(len_type) => PropertyType::List { len_type, scalar_type },
        }
    }

    /// The type of the list length prefix, or `None` for scalar properties.
    pub fn len_type(&self) -> Option<ScalarType> {
        match self {
            PropertyType::Scalar(_) => None,
            PropertyType::List { len_type, .. } => Some(*len_type),
        }
    }

    /// The type of the value (for lists: of each list item).
    pub fn scalar_type(&self) -> ScalarType {
        match *self {
            PropertyType::Scalar(scalar_type) => scalar_type,
            PropertyType::List { scalar_type, .. } => scalar_type,
        }
    }

    pub fn is_list(&self) -> bool {
        self.len_type().is_some()
    }
}

/// The header definition of one property of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub ty: PropertyType,
}

/// The header definition of one element group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDef {
    name: String,

    /// Number of rows in this group.
    count: usize,

    /// Definitions for all properties of rows in this group, in file order.
    property_defs: Vec<PropertyDef>,
}

impl ElementDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of rows declared for this element.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn set_count(&mut self, count: usize) {
        self.count = count;
    }

    pub fn properties(&self) -> &[PropertyDef] {
        &self.property_defs
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.property_defs.iter().find(|p| p.name == name)
    }

    pub fn property_pos(&self, name: &str) -> Option<usize> {
        self.property_defs.iter().position(|p| p.name == name)
    }

    /// Appends a property. Fails if the name is already in use on this
    /// element or if a list length type is not an integer type.
    pub fn add_property(
        &mut self,
        name: impl Into<String>,
        ty: PropertyType,
    ) -> Result<&mut PropertyDef, Error> {
        let name = name.into();
        check_name(&name)?;

        if self.property_pos(&name).is_some() {
            return Err(Error::DuplicateProperty {
                element: self.name.clone(),
                property: name,
            });
        }

        if let Some(len_type) = ty.len_type() {
            if !len_type.is_integer() {
                return Err(Error::InvalidListCountType { property: name, ty: len_type });
            }
        }

        self.property_defs.push(PropertyDef { name, ty });
        Ok(self.property_defs.last_mut().unwrap())
    }
}

/// Everything the header of a PLY file describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    encoding: Encoding,
    version: String,
    comments: Vec<String>,
    obj_info: Vec<String>,
    elements: Vec<ElementDef>,
}

impl Document {
    /// The only version of the format that exists.
    pub const DEFAULT_VERSION: &'static str = "1.0";

    /// Creates an empty document with the given body encoding.
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            version: Self::DEFAULT_VERSION.into(),
            comments: Vec::new(),
            obj_info: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    /// The version string of the `format` line (practically always `1.0`).
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// The `comment` lines of the header, in order.
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Mutable access to the comments. Comments must not contain line breaks,
    /// otherwise writing the header fails.
    pub fn comments_mut(&mut self) -> &mut Vec<String> {
        &mut self.comments
    }

    /// The `obj_info` lines of the header, in order.
    pub fn obj_info(&self) -> &[String] {
        &self.obj_info
    }

    pub fn obj_info_mut(&mut self) -> &mut Vec<String> {
        &mut self.obj_info
    }

    /// All element definitions in file order.
    pub fn elements(&self) -> &[ElementDef] {
        &self.elements
    }

    pub fn element(&self, name: &str) -> Option<&ElementDef> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn element_mut(&mut self, name: &str) -> Option<&mut ElementDef> {
        self.elements.iter_mut().find(|e| e.name == name)
    }

    pub fn element_pos(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    /// Appends a new element without properties. Fails if an element with
    /// that name already exists.
    pub fn add_element(
        &mut self,
        name: impl Into<String>,
        count: usize,
    ) -> Result<&mut ElementDef, Error> {
        let name = name.into();
        check_name(&name)?;

        if self.element_pos(&name).is_some() {
            return Err(Error::DuplicateElement(name));
        }

        self.elements.push(ElementDef {
            name,
            count,
            property_defs: Vec::new(),
        });
        Ok(self.elements.last_mut().unwrap())
    }

    pub(crate) fn element_at_mut(&mut self, idx: usize) -> &mut ElementDef {
        &mut self.elements[idx]
    }

    pub(crate) fn last_element_mut(&mut self) -> Option<&mut ElementDef> {
        self.elements.last_mut()
    }
}

/// Names end up as whitespace separated tokens in the header, so they must
/// be non-empty and must not contain whitespace.
pub(crate) fn check_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace()) {
        Err(Error::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}
