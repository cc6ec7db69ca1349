use bytes::{Buf, BufMut};

/// Fixed-size little-endian wire layout of a payload type.
///
/// `encode` must write exactly `SIZE` bytes, and `decode` is only ever
/// handed a buffer holding at least `SIZE` bytes.
pub trait Wire: Sized {
    /// Encoded length in bytes.
    const SIZE: usize;

    /// Append the encoding of `self` to `dst`.
    fn encode<B: BufMut>(&self, dst: &mut B);

    /// Read one value from the front of `src`.
    fn decode<B: Buf>(src: &mut B) -> Self;
}

macro_rules! wire_scalar {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl Wire for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn encode<B: BufMut>(&self, dst: &mut B) {
                    dst.$put(*self);
                }

                fn decode<B: Buf>(src: &mut B) -> Self {
                    src.$get()
                }
            }
        )*
    };
}

wire_scalar! {
    u8 => put_u8, get_u8;
    i8 => put_i8, get_i8;
    u16 => put_u16_le, get_u16_le;
    i16 => put_i16_le, get_i16_le;
    u32 => put_u32_le, get_u32_le;
    i32 => put_i32_le, get_i32_le;
    u64 => put_u64_le, get_u64_le;
    i64 => put_i64_le, get_i64_le;
    f32 => put_f32_le, get_f32_le;
    f64 => put_f64_le, get_f64_le;
}

impl Wire for bool {
    const SIZE: usize = 1;

    fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(u8::from(*self));
    }

    fn decode<B: Buf>(src: &mut B) -> Self {
        src.get_u8() != 0
    }
}

impl<T: Wire, const N: usize> Wire for [T; N] {
    const SIZE: usize = T::SIZE * N;

    fn encode<B: BufMut>(&self, dst: &mut B) {
        for item in self {
            item.encode(dst);
        }
    }

    fn decode<B: Buf>(src: &mut B) -> Self {
        std::array::from_fn(|_| T::decode(src))
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Vec3 {
        x: f32,
        y: f32,
        z: f32,
    }

    impl Wire for Vec3 {
        const SIZE: usize = 3 * f32::SIZE;

        fn encode<B: BufMut>(&self, dst: &mut B) {
            self.x.encode(dst);
            self.y.encode(dst);
            self.z.encode(dst);
        }

        fn decode<B: Buf>(src: &mut B) -> Self {
            Self {
                x: f32::decode(src),
                y: f32::decode(src),
                z: f32::decode(src),
            }
        }
    }

    #[test]
    fn scalars_are_little_endian() {
        let mut buf = BytesMut::new();
        7i32.encode(&mut buf);
        0x0102u16.encode(&mut buf);
        assert_eq!(&buf[..], &[7, 0, 0, 0, 0x02, 0x01]);
    }

    #[test]
    fn sizes_match_encoding() {
        let mut buf = BytesMut::new();
        1.5f64.encode(&mut buf);
        assert_eq!(buf.len(), f64::SIZE);
        assert_eq!(<[u16; 3]>::SIZE, 6);
        assert_eq!(bool::SIZE, 1);
    }

    #[test]
    fn arrays_encode_in_order() {
        let mut buf = BytesMut::new();
        [1u16, 2, 3].encode(&mut buf);
        assert_eq!(&buf[..], &[1, 0, 2, 0, 3, 0]);

        let mut src = &buf[..];
        assert_eq!(<[u16; 3]>::decode(&mut src), [1, 2, 3]);
        assert!(src.is_empty());
    }

    #[test]
    fn user_struct_layout() {
        let value = Vec3 {
            x: 1.0,
            y: -2.0,
            z: 0.5,
        };
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        assert_eq!(buf.len(), Vec3::SIZE);
        assert_eq!(&buf[4..8], &(-2.0f32).to_le_bytes());

        let mut src = &buf[..];
        assert_eq!(Vec3::decode(&mut src), value);
    }

    #[test]
    fn bool_decodes_any_nonzero_as_true() {
        let mut src: &[u8] = &[0, 1, 0xff];
        assert!(!bool::decode(&mut src));
        assert!(bool::decode(&mut src));
        assert!(bool::decode(&mut src));
    }
}
