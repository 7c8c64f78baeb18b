//! Bounds-checked view over the packed, fixed-stride buffers the vendor
//! library hands back.
//!
//! `CAENHV_GetChParamInfo` returns a single `char` buffer holding `count`
//! identifiers at a 10-byte stride, and `CAENHV_GetChName` fills a
//! `[count][12]` char matrix. Only the layout contract (stride x count) of
//! those buffers is trustworthy, so all indexing goes through [`FramedSlice`];
//! raw offset arithmetic never leaves this module.

use crate::error::{HvpsError, Result};

/// A typed view over a packed buffer of `count` fixed-width elements.
#[derive(Debug, Clone, Copy)]
pub struct FramedSlice<'a> {
    bytes: &'a [u8],
    stride: usize,
    count: usize,
}

impl<'a> FramedSlice<'a> {
    /// Frame `bytes` as `count` elements of `stride` bytes each.
    ///
    /// Fails with a decode anomaly if the buffer is shorter than the layout
    /// it claims to carry.
    pub fn new(bytes: &'a [u8], stride: usize, count: usize) -> Result<Self> {
        if stride == 0 {
            return Err(HvpsError::DecodeAnomaly {
                what: "framed buffer with zero stride".into(),
            });
        }
        let needed = stride.checked_mul(count).ok_or(HvpsError::DecodeAnomaly {
            what: format!("framed buffer overflow: {count} elements of {stride} bytes"),
        })?;
        if bytes.len() < needed {
            return Err(HvpsError::DecodeAnomaly {
                what: format!(
                    "framed buffer too short: have {} bytes, layout claims {count} x {stride}",
                    bytes.len()
                ),
            });
        }
        Ok(Self {
            bytes,
            stride,
            count,
        })
    }

    /// Number of elements in the view.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bounds-checked access to one element's bytes.
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        if index >= self.count {
            return Err(HvpsError::DecodeAnomaly {
                what: format!("framed index {index} out of range ({} elements)", self.count),
            });
        }
        let start = index * self.stride;
        Ok(&self.bytes[start..start + self.stride])
    }

    /// Iterate over every element.
    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        let stride = self.stride;
        self.bytes[..self.count * stride].chunks_exact(stride)
    }
}

/// Decode one fixed-width, NUL-padded identifier.
///
/// The vendor pads identifiers with NUL bytes up to the stride; anything
/// after the first NUL is ignored. Non-UTF-8 content is an anomaly, not
/// something to paper over.
pub fn fixed_str(frame: &[u8]) -> Result<&str> {
    let end = frame.iter().position(|&b| b == 0).unwrap_or(frame.len());
    std::str::from_utf8(&frame[..end]).map_err(|e| HvpsError::DecodeAnomaly {
        what: format!("identifier is not valid UTF-8: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_elements_at_fixed_stride() {
        let mut bytes = vec![0u8; 30];
        bytes[..4].copy_from_slice(b"VSet");
        bytes[10..14].copy_from_slice(b"ISet");
        bytes[20..23].copy_from_slice(b"RUp");

        let view = FramedSlice::new(&bytes, 10, 3).unwrap();
        assert_eq!(view.len(), 3);
        assert_eq!(fixed_str(view.get(0).unwrap()).unwrap(), "VSet");
        assert_eq!(fixed_str(view.get(1).unwrap()).unwrap(), "ISet");
        assert_eq!(fixed_str(view.get(2).unwrap()).unwrap(), "RUp");
    }

    #[test]
    fn rejects_short_buffer() {
        let bytes = vec![0u8; 25];
        assert!(FramedSlice::new(&bytes, 10, 3).is_err());
    }

    #[test]
    fn rejects_out_of_range_index() {
        let bytes = vec![0u8; 20];
        let view = FramedSlice::new(&bytes, 10, 2).unwrap();
        assert!(view.get(2).is_err());
    }

    #[test]
    fn unpadded_frame_uses_full_width() {
        let frame = *b"0123456789";
        assert_eq!(fixed_str(&frame).unwrap(), "0123456789");
    }
}
