use bytes::{BufMut, BytesMut};

/// A fixed-width integer as it travels on the wire (little-endian, two's
/// complement).
pub trait WireValue: Copy + Send + 'static {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Append exactly `SIZE` bytes.
    fn put(&self, dst: &mut BytesMut);

    /// Decode from the first `SIZE` bytes of `src`.
    fn get(src: &[u8]) -> Option<Self>;

    /// Whether widening this value fills with `0xFF`.
    fn is_negative(&self) -> bool;

    /// Append the value widened to `width` bytes (sign- or zero-extended).
    fn put_extended(&self, width: usize, dst: &mut BytesMut) {
        self.put(dst);
        let fill = if self.is_negative() { 0xFF } else { 0x00 };
        dst.put_bytes(fill, width.saturating_sub(Self::SIZE));
    }
}

macro_rules! wire_value {
    ($($ty:ty => $signed:expr),* $(,)?) => {
        $(
            impl WireValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn put(&self, dst: &mut BytesMut) {
                    dst.put_slice(&self.to_le_bytes());
                }

                fn get(src: &[u8]) -> Option<Self> {
                    let bytes = src.get(..Self::SIZE)?.try_into().ok()?;
                    Some(<$ty>::from_le_bytes(bytes))
                }

                #[allow(unused_comparisons)]
                fn is_negative(&self) -> bool {
                    $signed && *self < 0
                }
            }
        )*
    };
}

wire_value! {
    u8 => false,
    u16 => false,
    u32 => false,
    u64 => false,
    i8 => true,
    i16 => true,
    i32 => true,
    i64 => true,
}
