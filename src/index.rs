//! Random access into a trajectory.
//!
//! Every frame after the first has the same size, so the offset of any frame and the number of
//! frames in a file follow directly from the header.

use crate::endian::WORD;
use crate::header::Header;
use crate::unit_cell::UNIT_CELL_BYTES;

/// Byte sizes and offsets of the frames in a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Offset of the first frame, directly after the header.
    pub first_frame_position: u64,
    /// Size of the first frame, which always holds all atoms.
    pub first_frame_size: u64,
    /// Size of every subsequent frame.
    pub frame_size: u64,
}

impl FrameLayout {
    pub fn new(header: &Header, first_frame_position: u64) -> Self {
        let markers = 2 * header.marker_scale.bytes() as u64;
        let full_record = (header.n_atoms * WORD) as u64 + markers;
        let reduced_record = match header.n_atom_indices() {
            0 => full_record,
            n => (n * WORD) as u64 + markers,
        };
        let unit_cell_record = match header.has_unit_cell {
            true => UNIT_CELL_BYTES as u64 + markers,
            false => 0,
        };
        let charges_record = match header.has_charges {
            true => full_record,
            false => 0,
        };
        let axes = 3 + header.has_4_dimensions as u64;

        Self {
            first_frame_position,
            first_frame_size: full_record * axes + unit_cell_record + charges_record,
            frame_size: reduced_record * axes + unit_cell_record + charges_record,
        }
    }

    /// The number of whole frames in a file of `file_size` bytes.
    ///
    /// Trailing bytes that do not make up a complete frame are not counted.
    pub fn frame_count(&self, file_size: u64) -> usize {
        if self.frame_size == 0 {
            return 0;
        }
        match file_size.checked_sub(self.first_frame_position + self.first_frame_size) {
            Some(rest) => (rest / self.frame_size) as usize + 1,
            None => 0,
        }
    }

    /// The size of the frame at `index`.
    pub fn size_of(&self, index: usize) -> u64 {
        match index {
            0 => self.first_frame_size,
            _ => self.frame_size,
        }
    }

    /// The absolute byte offset of the frame at `index`.
    pub fn offset(&self, index: usize) -> u64 {
        match index {
            0 => self.first_frame_position,
            _ => {
                self.first_frame_position
                    + self.first_frame_size
                    + (index as u64 - 1) * self.frame_size
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{Kind, Variant};
    use crate::record::MarkerScale;

    fn header(natoms: usize) -> Header {
        Header {
            variant: Variant::Charmm { version: 24 },
            kind: Kind::Coordinates,
            reverse_endian: false,
            marker_scale: MarkerScale::Single,
            has_unit_cell: false,
            has_4_dimensions: false,
            has_charges: false,
            declared_frames: 0,
            starting_frame: 0,
            save_frequency: 1,
            time_step: 1.0,
            n_atoms: natoms,
            n_fixed_atoms: 0,
            atom_indices: None,
        }
    }

    #[test]
    fn plain() {
        let layout = FrameLayout::new(&header(100), 276);
        assert_eq!(layout.first_frame_size, 3 * (400 + 8));
        assert_eq!(layout.frame_size, layout.first_frame_size);
        assert_eq!(layout.offset(0), 276);
        assert_eq!(layout.offset(3), 276 + 3 * 1224);
    }

    #[test]
    fn everything() {
        let mut h = header(10);
        h.has_unit_cell = true;
        h.has_4_dimensions = true;
        h.has_charges = true;
        h.marker_scale = MarkerScale::Double;
        h.n_fixed_atoms = 6;
        h.atom_indices = Some(vec![1, 2, 3, 4].into_boxed_slice());
        let layout = FrameLayout::new(&h, 0);
        // Records are wrapped in two 8-byte markers.
        let full = 40 + 16;
        let reduced = 16 + 16;
        let cell = 48 + 16;
        assert_eq!(layout.first_frame_size, 4 * full + cell + full);
        assert_eq!(layout.frame_size, 4 * reduced + cell + full);
        assert_eq!(layout.size_of(0), layout.first_frame_size);
        assert_eq!(layout.size_of(7), layout.frame_size);
        assert_eq!(
            layout.offset(2),
            layout.first_frame_size + layout.frame_size
        );
    }

    #[test]
    fn frame_counts() {
        let mut h = header(2);
        h.n_fixed_atoms = 1;
        h.atom_indices = Some(vec![2].into_boxed_slice());
        let layout = FrameLayout::new(&h, 100);
        assert_eq!(layout.first_frame_size, 3 * 16);
        assert_eq!(layout.frame_size, 3 * 12);

        assert_eq!(layout.frame_count(0), 0);
        assert_eq!(layout.frame_count(100), 0);
        assert_eq!(layout.frame_count(100 + 47), 0);
        assert_eq!(layout.frame_count(100 + 48), 1);
        assert_eq!(layout.frame_count(100 + 48 + 35), 1);
        assert_eq!(layout.frame_count(100 + 48 + 36), 2);
        assert_eq!(layout.frame_count(100 + 48 + 36 * 9), 10);
    }

    #[test]
    fn no_atoms() {
        let layout = FrameLayout::new(&header(0), 10);
        // Even without atoms, a frame consists of three empty records.
        assert_eq!(layout.frame_size, 24);
        assert_eq!(layout.frame_count(10 + 48), 2);
    }
}
