//! Typed access to raw element bytes.

use volume_common::ElementType;

/// A scalar type that can be stored in a volume.
pub trait Element: bytemuck::Pod + Send + Sync {
    const ELEMENT_TYPE: ElementType;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const ELEMENT_TYPE: ElementType = ElementType::$variant;
            }
        )*
    };
}

impl_element!(
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
);

/// Decode one native-endian element as `f64`.
///
/// `bytes` must be exactly one element long. 64-bit integers above 2^53 lose
/// precision; use the typed accessors for segment IDs.
pub fn element_to_f64(element_type: ElementType, bytes: &[u8]) -> f64 {
    match element_type {
        ElementType::UInt8 => bytes[0] as f64,
        ElementType::Int8 => bytes[0] as i8 as f64,
        ElementType::UInt16 => bytemuck::pod_read_unaligned::<u16>(bytes) as f64,
        ElementType::Int16 => bytemuck::pod_read_unaligned::<i16>(bytes) as f64,
        ElementType::UInt32 => bytemuck::pod_read_unaligned::<u32>(bytes) as f64,
        ElementType::Int32 => bytemuck::pod_read_unaligned::<i32>(bytes) as f64,
        ElementType::UInt64 => bytemuck::pod_read_unaligned::<u64>(bytes) as f64,
        ElementType::Int64 => bytemuck::pod_read_unaligned::<i64>(bytes) as f64,
        ElementType::Float32 => bytemuck::pod_read_unaligned::<f32>(bytes) as f64,
        ElementType::Float64 => bytemuck::pod_read_unaligned::<f64>(bytes),
    }
}

/// Native-endian bytes of a NaN for float types, zeros otherwise.
pub fn nan_bytes(element_type: ElementType) -> Vec<u8> {
    match element_type {
        ElementType::Float32 => f32::NAN.to_ne_bytes().to_vec(),
        ElementType::Float64 => f64::NAN.to_ne_bytes().to_vec(),
        other => vec![0; other.size_bytes()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_to_f64() {
        assert_eq!(element_to_f64(ElementType::Int16, &(-20i16).to_ne_bytes()), -20.0);
        assert_eq!(element_to_f64(ElementType::UInt8, &[200]), 200.0);
        assert_eq!(element_to_f64(ElementType::Int8, &[0xff]), -1.0);
        assert_eq!(element_to_f64(ElementType::Float32, &1.5f32.to_ne_bytes()), 1.5);
        assert_eq!(
            element_to_f64(ElementType::UInt64, &123_456u64.to_ne_bytes()),
            123_456.0
        );
    }

    #[test]
    fn test_nan_bytes() {
        let f = nan_bytes(ElementType::Float32);
        assert!(f32::from_ne_bytes(f.try_into().unwrap()).is_nan());
        assert_eq!(nan_bytes(ElementType::UInt64), vec![0; 8]);
    }

    #[test]
    fn test_element_types() {
        assert_eq!(<u64 as Element>::ELEMENT_TYPE, ElementType::UInt64);
        assert_eq!(<i16 as Element>::ELEMENT_TYPE, ElementType::Int16);
        assert_eq!(<f32 as Element>::ELEMENT_TYPE, ElementType::Float32);
    }
}
