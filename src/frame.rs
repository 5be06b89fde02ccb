//! Reading and writing the records of a single frame.
//!
//! A frame is a series of records: an optional unit cell, the x, y and z arrays, an optional
//! fourth-dimension array and optional charges. On read, all of these are fetched with a single
//! vectored read into the scratch buffers of a [`FrameBuffers`], after which byte order and
//! markers are dealt with in one sweep per buffer.

use std::io::{IoSliceMut, Read, Seek, SeekFrom, Write};

use glam::Vec3;
use tracing::trace;

use crate::endian::{self, f32s, ne_f64, put_f32s, DOUBLE, WORD};
use crate::error::{zeroed, DcdError, Result};
use crate::header::{Header, NSET_POSITION, NSTEP_POSITION};
use crate::record::{bad_read, marker_value, read_exact_vectored, write_record};
use crate::unit_cell::{UnitCell, UNIT_CELL_BYTES};
use crate::Frame;

const AXIS_NAMES: [&str; 4] = ["x", "y", "z", "w"];

/// Scratch space for the records of one frame.
#[derive(Debug, Clone)]
pub(crate) struct FrameBuffers {
    /// Leading and trailing markers of every record, in order.
    markers: Vec<u8>,
    unit_cell: [u8; UNIT_CELL_BYTES],
    /// The x, y, z and w arrays. Each is sized for all atoms; frames with fewer atoms use a
    /// prefix.
    axes: [Vec<u8>; 4],
    charges: Vec<u8>,
}

impl FrameBuffers {
    /// Empty buffers, sized on first use by [`FrameBuffers::allocate`].
    pub(crate) fn new() -> Self {
        Self {
            markers: Vec::new(),
            unit_cell: [0; UNIT_CELL_BYTES],
            axes: Default::default(),
            charges: Vec::new(),
        }
    }

    /// Size the buffers for the frames of `header`. Does nothing once they are sized.
    ///
    /// The atom count of a header is not checked against anything, so this is only called once a
    /// frame is known to exist in the file, or is about to be written.
    pub(crate) fn allocate(&mut self, header: &Header) -> Result<()> {
        let naxes = 3 + header.has_4_dimensions as usize;
        let nrecords = naxes + header.has_unit_cell as usize + header.has_charges as usize;
        let nmarkers = 2 * nrecords * header.marker_scale.bytes();
        if self.markers.len() == nmarkers {
            return Ok(());
        }

        let full = header.n_atoms * WORD;
        let axis = |i: usize| if i < naxes { zeroed(full) } else { Ok(Vec::new()) };
        self.axes = [axis(0)?, axis(1)?, axis(2)?, axis(3)?];
        self.charges = if header.has_charges {
            zeroed(full)?
        } else {
            Vec::new()
        };
        self.markers = zeroed(nmarkers)?;
        trace!(natoms = header.n_atoms, "allocated frame buffers");
        Ok(())
    }

    /// The number of bytes held by the buffers.
    #[cfg(test)]
    pub(crate) fn allocated(&self) -> usize {
        let axes: usize = self.axes.iter().map(Vec::capacity).sum();
        self.markers.capacity() + axes + self.charges.capacity()
    }

    /// Read the records of a frame holding `atom_count` atoms.
    ///
    /// Returns the stored unit cell words, if the trajectory has unit cells.
    pub(crate) fn read<R: Read>(
        &mut self,
        file: &mut R,
        header: &Header,
        atom_count: usize,
    ) -> Result<Option<[f64; 6]>> {
        self.allocate(header)?;
        let scale = header.marker_scale.bytes();
        let coord_bytes = atom_count * WORD;
        let full_bytes = header.n_atoms * WORD;
        let naxes = 3 + header.has_4_dimensions as usize;
        let reverse = header.reverse_endian;

        let Self {
            markers,
            unit_cell,
            axes,
            charges,
        } = self;

        // The names and expected sizes of the records, in file order.
        let mut records: Vec<(&str, usize)> = Vec::with_capacity(6);
        {
            let mut payloads: Vec<&mut [u8]> = Vec::with_capacity(6);
            if header.has_unit_cell {
                records.push(("unit cell", UNIT_CELL_BYTES));
                payloads.push(&mut unit_cell[..]);
            }
            for (name, axis) in AXIS_NAMES.iter().zip(axes.iter_mut()).take(naxes) {
                records.push((*name, coord_bytes));
                payloads.push(&mut axis[..coord_bytes]);
            }
            if header.has_charges {
                records.push(("charge", full_bytes));
                payloads.push(&mut charges[..full_bytes]);
            }

            let mut slices = Vec::with_capacity(3 * payloads.len());
            for (payload, pair) in payloads.into_iter().zip(markers.chunks_exact_mut(2 * scale)) {
                let (lead, trail) = pair.split_at_mut(scale);
                slices.push(IoSliceMut::new(lead));
                slices.push(IoSliceMut::new(payload));
                slices.push(IoSliceMut::new(trail));
            }
            read_exact_vectored(file, &mut slices).map_err(bad_read)?;
        }

        if reverse {
            endian::swap_in_place(markers, WORD);
            if header.has_unit_cell {
                endian::swap_in_place(unit_cell, DOUBLE);
            }
            for axis in axes.iter_mut().take(naxes) {
                endian::swap_in_place(&mut axis[..coord_bytes], WORD);
            }
            if header.has_charges {
                endian::swap_in_place(&mut charges[..full_bytes], WORD);
            }
        }

        for ((name, expected), pair) in records.iter().zip(markers.chunks_exact(2 * scale)) {
            let (lead, trail) = pair.split_at(scale);
            let (lead, trail) = (marker_value(lead), marker_value(trail));
            if lead != *expected as u64 || trail != *expected as u64 {
                return Err(DcdError::bad_format(format!(
                    "{name} record markers are {lead} and {trail}, expected {expected}"
                )));
            }
        }

        Ok(header
            .has_unit_cell
            .then(|| std::array::from_fn(|i| ne_f64(&unit_cell[..], i * DOUBLE))))
    }

    /// Move the decoded contents of the buffers into `frame`.
    ///
    /// If `indices` is given, the `i`th atom in the buffers is placed at `indices[i] - 1`, and
    /// atoms that are not named are left untouched.
    pub(crate) fn decode_into(
        &self,
        frame: &mut Frame,
        header: &Header,
        atom_count: usize,
        indices: Option<&[u32]>,
    ) {
        let n = atom_count * WORD;
        let natoms = header.n_atoms;
        let [x, y, z, w] = &self.axes;
        let positions = f32s(&x[..n])
            .zip(f32s(&y[..n]))
            .zip(f32s(&z[..n]))
            .map(|((x, y), z)| Vec3::new(x, y, z));
        scatter(&mut frame.positions, positions, indices);

        if header.has_4_dimensions {
            let fourth = frame.fourth.get_or_insert_with(Vec::new);
            if fourth.len() != natoms {
                fourth.resize(natoms, 0.0);
            }
            scatter(fourth, f32s(&w[..n]), indices);
        } else {
            frame.fourth = None;
        }

        if header.has_charges {
            let charges = frame.charges.get_or_insert_with(Vec::new);
            charges.clear();
            charges.extend(f32s(&self.charges[..natoms * WORD]));
        } else {
            frame.charges = None;
        }
    }

    /// Fill the buffers from a frame, gathering the atoms named by `indices` if given.
    pub(crate) fn gather(
        &mut self,
        positions: &[Vec3],
        fourth: Option<&[f32]>,
        charges: Option<&[f32]>,
        indices: Option<&[u32]>,
    ) {
        let [x, y, z, w] = &mut self.axes;
        put_f32s(x, gathered(positions, indices).map(|p| p.x));
        put_f32s(y, gathered(positions, indices).map(|p| p.y));
        put_f32s(z, gathered(positions, indices).map(|p| p.z));
        if let Some(fourth) = fourth {
            put_f32s(w, gathered(fourth, indices));
        }
        if let Some(charges) = charges {
            put_f32s(&mut self.charges, charges.iter().copied());
        }
    }

    /// Write the gathered records of a frame holding `atom_count` atoms.
    pub(crate) fn write<W: Write>(
        &self,
        file: &mut W,
        header: &Header,
        atom_count: usize,
        unit_cell: Option<&UnitCell>,
    ) -> Result<()> {
        if let Some(cell) = unit_cell {
            let mut payload = [0u8; UNIT_CELL_BYTES];
            for (dst, word) in payload.chunks_exact_mut(DOUBLE).zip(cell.encode()) {
                dst.copy_from_slice(&word.to_ne_bytes());
            }
            write_record(file, &payload)?;
        }
        let naxes = 3 + header.has_4_dimensions as usize;
        for axis in self.axes.iter().take(naxes) {
            write_record(file, &axis[..atom_count * WORD])?;
        }
        if header.has_charges {
            write_record(file, &self.charges[..header.n_atoms * WORD])?;
        }
        Ok(())
    }
}

fn scatter<T: Copy>(dst: &mut [T], src: impl Iterator<Item = T>, indices: Option<&[u32]>) {
    match indices {
        None => dst.iter_mut().zip(src).for_each(|(d, s)| *d = s),
        Some(indices) => {
            for (&idx, s) in indices.iter().zip(src) {
                dst[idx as usize - 1] = s;
            }
        }
    }
}

fn gathered<'a, T: Copy>(
    src: &'a [T],
    indices: Option<&'a [u32]>,
) -> Box<dyn Iterator<Item = T> + 'a> {
    match indices {
        None => Box::new(src.iter().copied()),
        Some(indices) => Box::new(indices.iter().map(|&idx| src[idx as usize - 1])),
    }
}

/// Update the frame count and step counter in the header, then return to the end of the file.
pub(crate) fn patch_header<W: Write + Seek>(file: &mut W, n_frames: i32, step: i32) -> Result<()> {
    for (position, value) in [(NSET_POSITION, n_frames), (NSTEP_POSITION, step)] {
        file.seek(SeekFrom::Start(position))
            .map_err(DcdError::BadSeek)?;
        file.write_all(&value.to_ne_bytes())
            .map_err(DcdError::BadWrite)?;
    }
    file.seek(SeekFrom::End(0)).map_err(DcdError::BadSeek)?;
    trace!(n_frames, step, "patched dcd header");
    Ok(())
}
