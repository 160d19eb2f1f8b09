/// Matches on a runtime `ScalarType` and evaluates `$body` once per variant
/// with `$t` being an alias for the corresponding Rust primitive type.
///
/// ```ignore
/// let width = dispatch_scalar!(ty, |T| std::mem::size_of::<T>());
/// ```
macro_rules! dispatch_scalar {
    ($ty:expr, |$t:ident| $body:expr) => {{
        match $ty {
            crate::types::ScalarType::Int8 => { type $t = i8; $body }
            crate::types::ScalarType::Uint8 => { type $t = u8; $body }
            crate::types::ScalarType::Int16 => { type $t = i16; $body }
            crate::types::ScalarType::Uint16 => { type $t = u16; $body }
            crate::types::ScalarType::Int32 => { type $t = i32; $body }
            crate::types::ScalarType::Uint32 => { type $t = u32; $body }
            crate::types::ScalarType::Float32 => { type $t = f32; $body }
            crate::types::ScalarType::Float64 => { type $t = f64; $body }
        }
    }};
}
