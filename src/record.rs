//! Fortran unformatted records.
//!
//! Every record in a DCD file is a payload sandwiched between two markers that hold its length in
//! bytes. A marker consists of either one or two 32-bit words ([`MarkerScale`]), where the value
//! of a two-word marker is the sum of its words.

use std::io::{self, IoSliceMut, Read, Seek, SeekFrom, Write};

use crate::endian::{self, WORD};
use crate::error::{zeroed, DcdError, Result};

/// The width of the record markers in a file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MarkerScale {
    /// A 32-bit marker.
    #[default]
    Single,
    /// A 64-bit marker, stored as two 32-bit words.
    Double,
}

impl MarkerScale {
    /// The number of 32-bit words in one marker.
    pub const fn words(self) -> usize {
        match self {
            MarkerScale::Single => 1,
            MarkerScale::Double => 2,
        }
    }

    /// The number of bytes in one marker.
    pub const fn bytes(self) -> usize {
        self.words() * WORD
    }
}

/// Interpret a raw marker, already in native byte order, as a byte count.
pub(crate) fn marker_value(raw: &[u8]) -> u64 {
    raw.chunks_exact(WORD)
        .map(|w| u32::from_ne_bytes([w[0], w[1], w[2], w[3]]) as u64)
        .sum()
}

/// Map a failed read onto [`DcdError::BadRead`].
pub(crate) fn bad_read(err: io::Error) -> DcdError {
    DcdError::BadRead(err)
}

/// Read a single marker and return its value.
pub(crate) fn read_marker<R: Read>(file: &mut R, scale: MarkerScale, reverse: bool) -> Result<u64> {
    let mut raw = [0u8; 2 * WORD];
    let raw = &mut raw[..scale.bytes()];
    file.read_exact(raw).map_err(bad_read)?;
    endian::swap_if(reverse, raw, WORD);
    Ok(marker_value(raw))
}

fn expect_marker(found: u64, expected: u64, which: &str) -> Result<()> {
    if found != expected {
        return Err(DcdError::bad_format(format!(
            "{which} record marker is {found}, expected {expected}"
        )));
    }
    Ok(())
}

/// Read a record that must hold exactly `expected` bytes and return its payload.
///
/// The payload is returned as it is stored. Swapping its contents is up to the caller, since only
/// the caller knows the width of the elements in it.
pub(crate) fn read_record<R: Read>(
    file: &mut R,
    expected: usize,
    scale: MarkerScale,
    reverse: bool,
) -> Result<Vec<u8>> {
    let lead = read_marker(file, scale, reverse)?;
    expect_marker(lead, expected as u64, "leading")?;
    let mut payload = zeroed(expected)?;
    file.read_exact(&mut payload).map_err(bad_read)?;
    let trail = read_marker(file, scale, reverse)?;
    expect_marker(trail, expected as u64, "trailing")?;
    Ok(payload)
}

/// Skip over a record without looking at its payload, returning the size of the payload.
pub(crate) fn skip_record<R: Read + Seek>(
    file: &mut R,
    scale: MarkerScale,
    reverse: bool,
) -> Result<u64> {
    let lead = read_marker(file, scale, reverse)?;
    let offset = i64::try_from(lead)
        .map_err(|_| DcdError::bad_format(format!("record of {lead} bytes is too large")))?;
    file.seek(SeekFrom::Current(offset))
        .map_err(DcdError::BadSeek)?;
    let trail = read_marker(file, scale, reverse)?;
    expect_marker(trail, lead, "trailing")?;
    Ok(lead)
}

/// Write `payload` as a record with 32-bit markers in native byte order.
pub(crate) fn write_record<W: Write>(file: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        DcdError::InvalidDataObject(format!(
            "record of {} bytes does not fit a 32-bit marker",
            payload.len()
        ))
    })?;
    let marker = len.to_ne_bytes();
    file.write_all(&marker).map_err(DcdError::BadWrite)?;
    file.write_all(payload).map_err(DcdError::BadWrite)?;
    file.write_all(&marker).map_err(DcdError::BadWrite)
}

/// Fill all of `bufs` with a single series of vectored reads.
///
/// Like [`Read::read_exact`], this fails with [`io::ErrorKind::UnexpectedEof`] if the reader runs
/// dry before all buffers are filled.
pub(crate) fn read_exact_vectored<R: Read>(
    file: &mut R,
    mut bufs: &mut [IoSliceMut<'_>],
) -> io::Result<()> {
    // Skip over any leading empty buffers.
    IoSliceMut::advance_slices(&mut bufs, 0);
    while !bufs.is_empty() {
        match file.read_vectored(bufs) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole frame buffer",
                ))
            }
            Ok(n) => IoSliceMut::advance_slices(&mut bufs, n),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::Status;

    fn record(marker: &[u8], payload: &[u8]) -> Vec<u8> {
        [marker, payload, marker].concat()
    }

    #[test]
    fn read_single_marker_record() {
        let mut file = Cursor::new(record(&4u32.to_ne_bytes(), &[1, 2, 3, 4]));
        let payload = read_record(&mut file, 4, MarkerScale::Single, false).unwrap();
        assert_eq!(payload, [1, 2, 3, 4]);
        assert_eq!(file.position(), 12);
    }

    #[test]
    fn read_double_marker_record() {
        let marker = [4u32.to_ne_bytes(), 0u32.to_ne_bytes()].concat();
        let mut file = Cursor::new(record(&marker, &[9, 9, 9, 9]));
        let payload = read_record(&mut file, 4, MarkerScale::Double, false).unwrap();
        assert_eq!(payload, [9, 9, 9, 9]);
        assert_eq!(file.position(), 20);
    }

    #[test]
    fn read_reversed_record() {
        let mut marker = 4u32.to_ne_bytes();
        marker.reverse();
        let mut file = Cursor::new(record(&marker, &[1, 2, 3, 4]));
        let payload = read_record(&mut file, 4, MarkerScale::Single, true).unwrap();
        assert_eq!(payload, [1, 2, 3, 4]);
    }

    #[test]
    fn unexpected_length() {
        let mut file = Cursor::new(record(&4u32.to_ne_bytes(), &[1, 2, 3, 4]));
        let err = read_record(&mut file, 8, MarkerScale::Single, false).unwrap_err();
        assert_eq!(err.kind(), Status::BadFormat);
    }

    #[test]
    fn mismatched_trailing_marker() {
        let bytes = [
            &4u32.to_ne_bytes()[..],
            &[1, 2, 3, 4],
            &5u32.to_ne_bytes()[..],
        ]
        .concat();
        let err = read_record(&mut Cursor::new(bytes), 4, MarkerScale::Single, false).unwrap_err();
        assert_eq!(err.kind(), Status::BadFormat);
    }

    #[test]
    fn short_record() {
        let bytes = [&8u32.to_ne_bytes()[..], &[1, 2, 3]].concat();
        let err = read_record(&mut Cursor::new(bytes), 8, MarkerScale::Single, false).unwrap_err();
        assert_eq!(err.kind(), Status::BadRead);
    }

    #[test]
    fn skip() {
        let mut bytes = record(&6u32.to_ne_bytes(), b"abcdef");
        bytes.extend_from_slice(&[0xff; 3]);
        let mut file = Cursor::new(bytes);
        assert_eq!(skip_record(&mut file, MarkerScale::Single, false).unwrap(), 6);
        assert_eq!(file.position(), 14);
    }

    #[test]
    fn skip_corrupt() {
        let bytes = [&6u32.to_ne_bytes()[..], b"abcdef", &2u32.to_ne_bytes()[..]].concat();
        let err = skip_record(&mut Cursor::new(bytes), MarkerScale::Single, false).unwrap_err();
        assert_eq!(err.kind(), Status::BadFormat);
    }

    #[test]
    fn write_then_read() {
        let mut file = Cursor::new(Vec::new());
        write_record(&mut file, b"payload!").unwrap();
        assert_eq!(file.get_ref().len(), 16);
        file.set_position(0);
        let payload = read_record(&mut file, 8, MarkerScale::Single, false).unwrap();
        assert_eq!(payload, b"payload!");
    }

    #[test]
    fn vectored_read_fills_all_buffers() {
        let mut file = Cursor::new((0u8..10).collect::<Vec<_>>());
        let (mut a, mut b, mut c) = ([0u8; 3], [0u8; 0], [0u8; 7]);
        let mut bufs = [
            IoSliceMut::new(&mut a),
            IoSliceMut::new(&mut b),
            IoSliceMut::new(&mut c),
        ];
        read_exact_vectored(&mut file, &mut bufs).unwrap();
        assert_eq!(a, [0, 1, 2]);
        assert_eq!(c, [3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn vectored_read_eof() {
        let mut file = Cursor::new(vec![0u8; 4]);
        let mut a = [0u8; 8];
        let mut bufs = [IoSliceMut::new(&mut a)];
        let err = read_exact_vectored(&mut file, &mut bufs).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
