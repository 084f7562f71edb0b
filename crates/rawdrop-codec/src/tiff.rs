//! Minimal TIFF directory walker for locating embedded JPEG previews.
//!
//! NEF files are TIFF containers. Nikon bodies store a small thumbnail in
//! IFD0 and a full-size JPEG preview in the first SubIFD, both addressed
//! through the `JPEGInterchangeFormat`/`JPEGInterchangeFormatLength` tag pair.
//! Only the tags needed to find those streams are interpreted; everything else
//! is skipped. All reads are bounds-checked so truncated or hostile files
//! yield no candidates instead of panicking.

use std::collections::HashSet;

const TAG_SUB_IFDS: u16 = 0x014A;
const TAG_JPEG_OFFSET: u16 = 0x0201;
const TAG_JPEG_LENGTH: u16 = 0x0202;

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_IFD: u16 = 13;

const ENTRY_SIZE: usize = 12;

/// Upper bound on directories visited per file.
const MAX_IFDS: usize = 64;

/// Upper bound on SOI markers returned by [`scan_jpeg_markers`].
const MAX_MARKERS: usize = 16;

/// Location of a JPEG stream inside a TIFF container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedJpeg {
    pub offset: usize,
    pub len: usize,
}

impl EmbeddedJpeg {
    /// Borrow the stream's bytes out of `data`.
    pub fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset..self.offset + self.len]
    }
}

#[derive(Debug, Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

struct Reader<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> Reader<'a> {
    fn from_header(data: &'a [u8]) -> Option<Self> {
        let order = match data.get(0..2)? {
            b"II" => ByteOrder::Little,
            b"MM" => ByteOrder::Big,
            _ => return None,
        };
        let reader = Self { data, order };
        (reader.u16(2)? == 42).then_some(reader)
    }

    fn u16(&self, pos: usize) -> Option<u16> {
        let bytes: [u8; 2] = self.data.get(pos..pos.checked_add(2)?)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        })
    }

    fn u32(&self, pos: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(pos..pos.checked_add(4)?)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        })
    }

    /// Read a single SHORT/LONG value stored inline in an entry.
    fn scalar(&self, kind: u16, pos: usize) -> Option<u32> {
        match kind {
            TYPE_SHORT => self.u16(pos).map(u32::from),
            TYPE_LONG | TYPE_IFD => self.u32(pos),
            _ => None,
        }
    }

    /// Read the directory offsets referenced by a SubIFDs entry.
    fn offsets(&self, kind: u16, count: u32, pos: usize) -> Vec<usize> {
        if kind != TYPE_LONG && kind != TYPE_IFD {
            return Vec::new();
        }
        if count == 1 {
            return self.u32(pos).map(|o| vec![o as usize]).unwrap_or_default();
        }

        let Some(table) = self.u32(pos) else {
            return Vec::new();
        };
        (0..(count as usize).min(MAX_IFDS))
            .filter_map(|i| self.u32(table as usize + i * 4))
            .map(|o| o as usize)
            .collect()
    }
}

/// Find every JPEG stream addressed by the IFD chain and its SubIFDs.
///
/// Returns an empty list when `data` is not a TIFF container.
pub fn embedded_jpegs(data: &[u8]) -> Vec<EmbeddedJpeg> {
    let Some(reader) = Reader::from_header(data) else {
        return Vec::new();
    };
    let Some(first) = reader.u32(4) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    let mut visited = HashSet::new();
    let mut pending = vec![first as usize];

    while let Some(ifd) = pending.pop() {
        if ifd == 0 || visited.len() >= MAX_IFDS || !visited.insert(ifd) {
            continue;
        }
        let Some(count) = reader.u16(ifd) else {
            continue;
        };

        let mut jpeg_offset = None;
        let mut jpeg_len = None;

        for i in 0..count as usize {
            let entry = ifd + 2 + i * ENTRY_SIZE;
            let (Some(tag), Some(kind), Some(n)) =
                (reader.u16(entry), reader.u16(entry + 2), reader.u32(entry + 4))
            else {
                break;
            };
            let value = entry + 8;

            match tag {
                TAG_JPEG_OFFSET => jpeg_offset = reader.scalar(kind, value),
                TAG_JPEG_LENGTH => jpeg_len = reader.scalar(kind, value),
                TAG_SUB_IFDS => pending.extend(reader.offsets(kind, n, value)),
                _ => {}
            }
        }

        if let (Some(offset), Some(len)) = (jpeg_offset, jpeg_len) {
            let (offset, len) = (offset as usize, len as usize);
            let in_bounds = offset
                .checked_add(len)
                .is_some_and(|end| end <= data.len());
            if len > 2 && in_bounds && data[offset..].starts_with(&[0xFF, 0xD8]) {
                found.push(EmbeddedJpeg { offset, len });
            }
        }

        if let Some(next) = reader.u32(ifd + 2 + count as usize * ENTRY_SIZE) {
            pending.push(next as usize);
        }
    }

    found
}

/// Positions of JPEG start-of-image markers (`FF D8 FF`) anywhere in `data`.
///
/// Used when a file is not a well-formed TIFF but still carries a JPEG.
pub fn scan_jpeg_markers(data: &[u8]) -> Vec<usize> {
    data.windows(3)
        .enumerate()
        .filter(|(_, w)| *w == [0xFF, 0xD8, 0xFF])
        .map(|(i, _)| i)
        .take(MAX_MARKERS)
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-built TIFF containers for tests.

    fn put_u16(buf: &mut Vec<u8>, big_endian: bool, v: u16) {
        if big_endian {
            buf.extend_from_slice(&v.to_be_bytes());
        } else {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn put_u32(buf: &mut Vec<u8>, big_endian: bool, v: u32) {
        if big_endian {
            buf.extend_from_slice(&v.to_be_bytes());
        } else {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn put_entry(buf: &mut Vec<u8>, be: bool, tag: u16, kind: u16, value: u32) {
        put_u16(buf, be, tag);
        put_u16(buf, be, kind);
        put_u32(buf, be, 1);
        put_u32(buf, be, value);
    }

    /// NEF-shaped container: optional thumbnail in IFD0, preview in SubIFD0.
    pub fn nef_like(big_endian: bool, thumbnail: Option<&[u8]>, preview: &[u8]) -> Vec<u8> {
        let be = big_endian;
        let ifd0_entries: u16 = if thumbnail.is_some() { 3 } else { 1 };
        let ifd0_size = 2 + 12 * ifd0_entries as u32 + 4;
        let sub_ifd = 8 + ifd0_size;
        let data_start = sub_ifd + 2 + 24 + 4;
        let thumb_len = thumbnail.map_or(0, |t| t.len() as u32);
        let preview_start = data_start + thumb_len;

        let mut buf = Vec::new();
        buf.extend_from_slice(if be { b"MM" } else { b"II" });
        put_u16(&mut buf, be, 42);
        put_u32(&mut buf, be, 8);

        put_u16(&mut buf, be, ifd0_entries);
        put_entry(&mut buf, be, super::TAG_SUB_IFDS, super::TYPE_LONG, sub_ifd);
        if thumbnail.is_some() {
            put_entry(&mut buf, be, super::TAG_JPEG_OFFSET, super::TYPE_LONG, data_start);
            put_entry(&mut buf, be, super::TAG_JPEG_LENGTH, super::TYPE_LONG, thumb_len);
        }
        put_u32(&mut buf, be, 0);

        put_u16(&mut buf, be, 2);
        put_entry(&mut buf, be, super::TAG_JPEG_OFFSET, super::TYPE_LONG, preview_start);
        put_entry(&mut buf, be, super::TAG_JPEG_LENGTH, super::TYPE_LONG, preview.len() as u32);
        put_u32(&mut buf, be, 0);

        if let Some(thumb) = thumbnail {
            buf.extend_from_slice(thumb);
        }
        buf.extend_from_slice(preview);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::nef_like;
    use super::*;

    const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 0xFF, 0xD9];

    #[test]
    fn test_finds_preview_in_sub_ifd_little_endian() {
        let data = nef_like(false, None, FAKE_JPEG);
        let found = embedded_jpegs(&data);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bytes(&data), FAKE_JPEG);
    }

    #[test]
    fn test_finds_preview_big_endian() {
        let data = nef_like(true, None, FAKE_JPEG);
        let found = embedded_jpegs(&data);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bytes(&data), FAKE_JPEG);
    }

    #[test]
    fn test_finds_thumbnail_and_preview() {
        let thumb = [0xFF, 0xD8, 0xFF, 0xD9];
        let data = nef_like(false, Some(&thumb), FAKE_JPEG);
        let mut lens: Vec<usize> = embedded_jpegs(&data).iter().map(|j| j.len).collect();
        lens.sort_unstable();
        assert_eq!(lens, vec![thumb.len(), FAKE_JPEG.len()]);
    }

    #[test]
    fn test_not_tiff() {
        assert!(embedded_jpegs(b"not a tiff at all").is_empty());
        assert!(embedded_jpegs(b"").is_empty());
        assert!(embedded_jpegs(b"II\x2b\x00\x08\x00\x00\x00").is_empty());
    }

    #[test]
    fn test_truncated_file_yields_nothing() {
        let data = nef_like(false, None, FAKE_JPEG);
        for cut in [4, 10, 20, 40] {
            let _ = embedded_jpegs(&data[..cut]);
        }
        assert!(embedded_jpegs(&data[..data.len() - 2]).is_empty());
    }

    #[test]
    fn test_self_referencing_ifd_terminates() {
        // IFD0 at offset 8 with zero entries whose "next" pointer is itself.
        let mut data = b"II\x2a\x00\x08\x00\x00\x00".to_vec();
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());
        assert!(embedded_jpegs(&data).is_empty());
    }

    #[test]
    fn test_scan_jpeg_markers() {
        let mut data = vec![0u8; 10];
        data.extend_from_slice(FAKE_JPEG);
        data.extend_from_slice(&[0u8; 5]);
        data.extend_from_slice(FAKE_JPEG);
        assert_eq!(scan_jpeg_markers(&data), vec![10, 10 + FAKE_JPEG.len() + 5]);
        assert!(scan_jpeg_markers(b"no markers").is_empty());
    }
}
