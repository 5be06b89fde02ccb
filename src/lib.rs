//! Reading and writing DCD trajectories, as produced by CHARMM, NAMD, X-PLOR and friends.
//!
//! ```no_run
//! use dcdtraj::{DcdReader, Frame};
//!
//! let mut reader = DcdReader::open("trajectory.dcd")?;
//! let mut frame = Frame::default();
//! reader.goto_frame(reader.n_frames() - 1)?;
//! reader.read_frame(&mut frame)?;
//! println!("last frame at t = {}", frame.time);
//! # Ok::<(), dcdtraj::DcdError>(())
//! ```
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use glam::Vec3;
use tracing::{debug, trace, warn};

use crate::frame::FrameBuffers;
pub use crate::error::{DcdError, Result, Status};
pub use crate::header::{Header, Kind, Variant};
pub use crate::index::FrameLayout;
pub use crate::record::MarkerScale;
pub use crate::selection::{FrameSelection, Range};
pub use crate::unit_cell::UnitCell;
pub use crate::writer::{DcdWriter, WriterOptions};

pub mod endian;
mod error;
mod frame;
pub mod header;
mod index;
mod record;
pub mod selection;
mod unit_cell;
mod writer;

/// A single frame of a trajectory.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Frame {
    /// The simulation step this frame was saved at.
    pub step: i64,
    /// The time of this frame, in the unit of the trajectory's time step.
    pub time: f64,
    pub unit_cell: Option<UnitCell>,
    pub positions: Vec<Vec3>,
    /// Fourth-dimension coordinates, for trajectories that have them.
    pub fourth: Option<Vec<f32>>,
    pub charges: Option<Vec<f32>>,
}

impl Frame {
    /// A frame with `natoms` positions at the origin.
    pub fn with_natoms(natoms: usize) -> Self {
        Self {
            positions: vec![Vec3::ZERO; natoms],
            ..Self::default()
        }
    }

    pub fn natoms(&self) -> usize {
        self.positions.len()
    }

    /// The positions as plain `[x, y, z]` arrays.
    pub fn coords<'f>(&'f self) -> impl Iterator<Item = [f32; 3]> + 'f {
        self.positions.iter().map(|p| p.to_array())
    }
}

/// Determine the size of a stream, leaving its position unchanged.
fn stream_len<S: Seek>(file: &mut S) -> Result<u64> {
    let here = file.stream_position().map_err(DcdError::FileAccessFailure)?;
    let len = file
        .seek(SeekFrom::End(0))
        .map_err(DcdError::FileAccessFailure)?;
    file.seek(SeekFrom::Start(here))
        .map_err(DcdError::FileAccessFailure)?;
    Ok(len)
}

/// A reader for DCD trajectories.
///
/// A reader only exists once the header has been read successfully, and it keeps a cursor
/// pointing at the frame that will be read next.
#[derive(Debug)]
pub struct DcdReader<R> {
    file: R,
    header: Header,
    layout: FrameLayout,
    n_frames: usize,
    current_frame: usize,
    scratch: FrameBuffers,
}

impl DcdReader<File> {
    /// Open the trajectory at `path` and read its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DcdError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "opened dcd trajectory");
        Self::new(file)
    }
}

impl<R: Read + Seek> DcdReader<R> {
    /// Read the header from `file` and prepare for reading frames.
    ///
    /// The header is expected at the start of the stream.
    pub fn new(mut file: R) -> Result<Self> {
        file.seek(SeekFrom::Start(0)).map_err(DcdError::BadSeek)?;
        let (header, first_frame_position) = header::read_header(&mut file)?;
        let layout = FrameLayout::new(&header, first_frame_position);
        let mut reader = Self {
            file,
            header,
            layout,
            n_frames: 0,
            current_frame: 0,
            scratch: FrameBuffers::new(),
        };
        reader.recount_frames()?;
        let declared = reader.header.declared_frames;
        if declared > 0 && declared as usize != reader.n_frames {
            warn!(
                declared,
                found = reader.n_frames,
                "header frame count disagrees with file size, using the file size"
            );
        }
        debug!(?layout, n_frames = reader.n_frames, "prepared dcd reader");
        Ok(reader)
    }

    /// Recompute the number of frames from the current size of the file.
    ///
    /// This is useful when reading a trajectory that is still being written.
    pub fn recount_frames(&mut self) -> Result<usize> {
        let file_size = stream_len(&mut self.file)?;
        self.n_frames = self.layout.frame_count(file_size);
        Ok(self.n_frames)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn n_atoms(&self) -> usize {
        self.header.n_atoms
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// The index of the frame that will be read next.
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.n_frames {
            return Err(DcdError::InvalidFrameIndex {
                index,
                n_frames: self.n_frames,
            });
        }
        Ok(())
    }

    /// Reads the next frame into `frame` and advances one step.
    ///
    /// An empty `frame` is sized to the number of atoms in the trajectory. Otherwise, the number
    /// of positions in `frame` must match it.
    ///
    /// If the trajectory has fixed atoms, every frame after the first one only stores the free
    /// atoms. These are placed at their positions in `frame`, and the fixed atoms in `frame` are
    /// left as they were. So, to get complete frames, read the first frame into `frame` before
    /// reading any others.
    ///
    /// # Errors
    ///
    /// Besides I/O and format errors, this returns [`DcdError::InvalidFrameIndex`] once all frames
    /// have been read. If reading fails part way through a frame, the position of the reader is
    /// unspecified and it should be [`home`](Self::home)d or dropped.
    pub fn read_frame(&mut self, frame: &mut Frame) -> Result<()> {
        let index = self.current_frame;
        self.check_index(index)?;
        let natoms = self.header.n_atoms;
        match frame.positions.len() {
            0 => frame.positions.resize(natoms, Vec3::ZERO),
            n if n != natoms => {
                return Err(DcdError::AtomNumberMismatch {
                    expected: natoms,
                    found: n,
                })
            }
            _ => {}
        }

        let atom_count = self.header.frame_atoms(index);
        let unit_cell = self.scratch.read(&mut self.file, &self.header, atom_count)?;
        let indices = match self.header.atom_indices.as_deref() {
            Some(indices) if atom_count != natoms => Some(indices),
            _ => None,
        };
        self.scratch
            .decode_into(frame, &self.header, atom_count, indices);
        frame.unit_cell = unit_cell.map(UnitCell::decode);
        frame.step = self.header.step_of(index);
        frame.time = frame.step as f64 * self.header.time_step;
        self.current_frame += 1;
        trace!(index, atom_count, "read dcd frame");
        Ok(())
    }

    /// Move the cursor to the frame at `index` without reading anything.
    ///
    /// If `index` lies beyond the last frame, [`DcdError::InvalidFrameIndex`] is returned and the
    /// cursor stays where it was.
    pub fn goto_frame(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.file
            .seek(SeekFrom::Start(self.layout.offset(index)))
            .map_err(DcdError::BadSeek)?;
        self.current_frame = index;
        Ok(())
    }

    /// Move the cursor past the current frame without reading it.
    pub fn skip_frame(&mut self) -> Result<()> {
        let index = self.current_frame;
        self.check_index(index)?;
        let size = self.layout.size_of(index) as i64;
        self.file
            .seek(SeekFrom::Current(size))
            .map_err(DcdError::BadSeek)?;
        self.current_frame += 1;
        Ok(())
    }

    /// Return to the first frame.
    pub fn home(&mut self) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(self.layout.first_frame_position))
            .map_err(DcdError::BadSeek)?;
        self.current_frame = 0;
        Ok(())
    }

    /// A convenience function to read all frames in a trajectory.
    pub fn read_all_frames(&mut self) -> Result<Box<[Frame]>> {
        let mut frames = Vec::with_capacity(self.n_frames);
        self.read_frames(&mut frames, &FrameSelection::All)?;
        Ok(frames.into_boxed_slice())
    }

    /// Append [`Frame`]s to the `frames` buffer according to a [`FrameSelection`].
    ///
    /// Each frame is complete: for trajectories with fixed atoms, the positions of the fixed atoms
    /// are taken from the first frame.
    ///
    /// If successful, it will return the number of frames that were read. The cursor is left
    /// after the last frame that was read, and does not move if no frames were selected.
    pub fn read_frames(
        &mut self,
        frames: &mut impl Extend<Frame>,
        frame_selection: &FrameSelection,
    ) -> Result<usize> {
        let until = frame_selection
            .until()
            .map_or(self.n_frames, |until| until.min(self.n_frames));

        let mut template = None;
        let mut n = 0;
        for idx in 0..until {
            match frame_selection.is_included(idx) {
                Some(true) => {}
                Some(false) => continue,
                None => break,
            }
            if template.is_none() {
                template = Some(self.template()?);
            }
            let mut frame = template.clone().unwrap_or_default();
            self.goto_frame(idx)?;
            self.read_frame(&mut frame)?;
            frames.extend(Some(frame));
            n += 1;
        }
        Ok(n)
    }

    /// A frame holding the positions of the fixed atoms, if there are any.
    fn template(&mut self) -> Result<Frame> {
        let mut template = Frame::with_natoms(self.header.n_atoms);
        if self.header.n_atom_indices() > 0 {
            self.goto_frame(0)?;
            self.read_frame(&mut template)?;
        }
        Ok(template)
    }

    /// Close the trajectory, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.file
    }

    /// Close the trajectory and release its buffers.
    pub fn close(self) -> Result<()> {
        drop(self);
        Ok(())
    }
}
