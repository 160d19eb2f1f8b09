//! Reading and writing PLY ("Polygon File Format" or "Stanford Triangle
//! Format") files.
//!
//! A PLY file consists of an ASCII header describing a list of *elements*
//! (e.g. `vertex` or `face`), each with a number of rows and a list of typed
//! *properties*, followed by the body in one of three encodings (ASCII,
//! binary little endian or binary big endian).
//!
//! This crate doesn't know anything about meshes or point clouds: values are
//! moved in and out as type-erased buffers of packed, native endian scalars.
//!
//! - [`Writer`]: register buffers via
//!   [`Writer::add_properties_to_element`], then write everything at once.
//! - [`Reader`]: parse the header, request the properties you need via
//!   [`Reader::request_properties_from_element`], then read the body in one
//!   pass.
//!
//! Errors are reported via the single [`Error`] type. The crate logs via the
//! `log` facade: header summaries at `debug`, per-element progress at
//! `trace`.

#[macro_use]
mod macros;

mod error;
mod header;
mod parse;
pub mod raw;
pub mod read;
pub mod types;
pub mod write;


pub use self::{
    error::Error,
    raw::{Document, ElementDef, Encoding, PropertyDef, PropertyType},
    read::{ReadResult, Reader, RequestHandle, ResultBuffer},
    types::{PlyScalar, ScalarType},
    write::Writer,
};
