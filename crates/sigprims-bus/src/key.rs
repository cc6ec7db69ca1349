use std::fmt;

/// djb2 string hash (`h = h * 33 + byte`, seeded with 5381).
///
/// Named types take their wire id from this hash so that two processes built
/// separately agree on ids without a shared table.
pub const fn djb2(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut hash = 5381u32;
    let mut i = 0;
    while i < bytes.len() {
        hash = hash.wrapping_mul(33).wrapping_add(bytes[i] as u32);
        i += 1;
    }
    hash
}

/// Stable routing identity of one payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: u32,
    name: Option<&'static str>,
    rust_name: &'static str,
}

impl TypeKey {
    /// Key a type by an explicit portable name; the id is `djb2(name)`.
    pub fn named<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::with_id::<T>(djb2(name), Some(name))
    }

    /// Key a type by an explicit id, with an optional display name.
    pub fn with_id<T: ?Sized + 'static>(id: u32, name: Option<&'static str>) -> Self {
        Self {
            id,
            name,
            rust_name: std::any::type_name::<T>(),
        }
    }

    /// Key derived from the compiler-generated type name.
    ///
    /// Not portable between builds; only suitable for in-process routing.
    pub fn implicit<T: ?Sized + 'static>() -> Self {
        let rust_name = std::any::type_name::<T>();
        Self {
            id: djb2(rust_name),
            name: None,
            rust_name,
        }
    }

    /// Numeric id used on the wire.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Portable name, if one was declared.
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// The Rust type this key was created for.
    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    /// Declared name, falling back to the Rust type name.
    pub fn display_name(&self) -> &'static str {
        self.name.unwrap_or(self.rust_name)
    }

    /// True when this key was not explicitly declared.
    pub fn is_implicit(&self) -> bool {
        self.name.is_none() && self.id == djb2(self.rust_name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:08x}", self.display_name(), self.id)
    }
}
