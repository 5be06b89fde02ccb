use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::error::{DcdError, Result};
use crate::frame::{patch_header, FrameBuffers};
use crate::header::{write_header, Header, Kind, Variant, CHARMM_VERSION};
use crate::record::MarkerScale;
use crate::Frame;

/// Settings for a new trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterOptions {
    /// A title line, truncated to 80 characters.
    pub title: String,
    pub kind: Kind,
    pub starting_frame: i32,
    pub save_frequency: i32,
    pub time_step: f32,
    pub has_unit_cell: bool,
    pub has_4_dimensions: bool,
    pub has_charges: bool,
    /// The 1-based indices of the atoms that move.
    ///
    /// If set, all other atoms are fixed: they are only stored in the first frame.
    pub free_atoms: Option<Vec<u32>>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            kind: Kind::Coordinates,
            starting_frame: 0,
            save_frequency: 1,
            time_step: 1.0,
            has_unit_cell: false,
            has_4_dimensions: false,
            has_charges: false,
            free_atoms: None,
        }
    }
}

impl WriterOptions {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the step of the first frame, the number of steps between frames and the time step.
    pub fn with_steps(mut self, starting_frame: i32, save_frequency: i32, time_step: f32) -> Self {
        self.starting_frame = starting_frame;
        self.save_frequency = save_frequency;
        self.time_step = time_step;
        self
    }

    pub fn with_unit_cell(mut self) -> Self {
        self.has_unit_cell = true;
        self
    }

    pub fn with_fourth_dimension(mut self) -> Self {
        self.has_4_dimensions = true;
        self
    }

    pub fn with_charges(mut self) -> Self {
        self.has_charges = true;
        self
    }

    pub fn with_free_atoms(mut self, free_atoms: Vec<u32>) -> Self {
        self.free_atoms = Some(free_atoms);
        self
    }

    fn header(&self, n_atoms: usize) -> Result<Header> {
        let atom_indices = match &self.free_atoms {
            None => None,
            Some(free) => {
                if free.is_empty() || free.len() >= n_atoms {
                    return Err(DcdError::InvalidDataObject(format!(
                        "{} free atoms out of {n_atoms}, expected at least one free and one fixed atom",
                        free.len()
                    )));
                }
                if let Some(&bad) = free.iter().find(|&&idx| idx == 0 || idx as usize > n_atoms) {
                    return Err(DcdError::InvalidDataObject(format!(
                        "free atom index {bad} out of range 1..={n_atoms}"
                    )));
                }
                Some(free.clone().into_boxed_slice())
            }
        };
        let n_fixed_atoms = atom_indices.as_ref().map_or(0, |free| n_atoms - free.len());

        Ok(Header {
            variant: Variant::Charmm {
                version: CHARMM_VERSION,
            },
            kind: self.kind,
            reverse_endian: false,
            marker_scale: MarkerScale::Single,
            has_unit_cell: self.has_unit_cell,
            has_4_dimensions: self.has_4_dimensions,
            has_charges: self.has_charges,
            declared_frames: 0,
            starting_frame: self.starting_frame,
            save_frequency: self.save_frequency,
            time_step: self.time_step as f64,
            n_atoms,
            n_fixed_atoms,
            atom_indices,
        })
    }
}

/// A writer for CHARMM-style DCD trajectories.
///
/// The header is kept up to date after every frame, so the file is a valid trajectory at any
/// point between calls to [`DcdWriter::write_frame`].
#[derive(Debug)]
pub struct DcdWriter<W: Write + Seek> {
    file: W,
    header: Header,
    current_frame: usize,
    scratch: FrameBuffers,
}

impl DcdWriter<BufWriter<File>> {
    /// Create a trajectory for `n_atoms` atoms at `path`, replacing any existing file.
    pub fn create<P: AsRef<Path>>(path: P, n_atoms: usize, options: &WriterOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| DcdError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "created dcd trajectory");
        Self::new(BufWriter::new(file), n_atoms, options)
    }
}

impl<W: Write + Seek> DcdWriter<W> {
    /// Write the header for a trajectory of `n_atoms` atoms to `file`.
    pub fn new(mut file: W, n_atoms: usize, options: &WriterOptions) -> Result<Self> {
        let header = options.header(n_atoms)?;
        write_header(&mut file, &header, &options.title)?;
        debug!(
            natoms = n_atoms,
            nfixed = header.n_fixed_atoms,
            unit_cell = header.has_unit_cell,
            "wrote dcd header"
        );
        Ok(Self {
            file,
            header,
            current_frame: 0,
            scratch: FrameBuffers::new(),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The number of frames written so far.
    pub fn n_frames(&self) -> usize {
        self.current_frame
    }

    /// Append `frame` to the trajectory and update the header.
    ///
    /// If the trajectory has fixed atoms, only the free atoms of `frame` are stored, except for
    /// the first frame, which is always stored completely. The `step` and `time` of `frame` are
    /// not stored; they follow from the options the writer was created with.
    ///
    /// A failed write leaves the file in an unspecified state.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let header = &self.header;
        let natoms = header.n_atoms;
        check_len(natoms, frame.positions.len())?;
        let unit_cell = match (header.has_unit_cell, frame.unit_cell.as_ref()) {
            (false, _) => None,
            (true, Some(cell)) => Some(cell),
            (true, None) => {
                return Err(DcdError::InvalidDataObject(
                    "the trajectory stores unit cells, but the frame has none".to_string(),
                ))
            }
        };
        let fourth = required(
            header.has_4_dimensions,
            frame.fourth.as_deref(),
            natoms,
            "a fourth dimension",
        )?;
        let charges = required(header.has_charges, frame.charges.as_deref(), natoms, "charges")?;

        let index = self.current_frame;
        let indices = match header.atom_indices.as_deref() {
            Some(indices) if index > 0 => Some(indices),
            _ => None,
        };
        let atom_count = header.frame_atoms(index);
        self.scratch.allocate(header)?;
        self.scratch
            .gather(&frame.positions, fourth, charges, indices);
        self.scratch
            .write(&mut self.file, header, atom_count, unit_cell)?;

        self.current_frame += 1;
        let n_frames = i32::try_from(self.current_frame).unwrap_or(i32::MAX);
        let step = header
            .step_of(self.current_frame)
            .clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        patch_header(&mut self.file, n_frames, step)?;
        trace!(index, atom_count, "wrote dcd frame");
        Ok(())
    }

    /// Flush and close the trajectory.
    pub fn close(mut self) -> Result<()> {
        self.file.flush().map_err(DcdError::BadWrite)
    }

    /// Flush the trajectory and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.file.flush().map_err(DcdError::BadWrite)?;
        Ok(self.file)
    }
}

fn check_len(natoms: usize, found: usize) -> Result<()> {
    if found != natoms {
        return Err(DcdError::AtomNumberMismatch {
            expected: natoms,
            found,
        });
    }
    Ok(())
}

/// Returns `values` if the trajectory stores them, failing if they are missing.
fn required<'f>(
    stored: bool,
    values: Option<&'f [f32]>,
    natoms: usize,
    what: &str,
) -> Result<Option<&'f [f32]>> {
    if !stored {
        return Ok(None);
    }
    let values = values.ok_or_else(|| {
        DcdError::InvalidDataObject(format!(
            "the trajectory stores {what}, but the frame has none"
        ))
    })?;
    check_len(natoms, values.len())?;
    Ok(Some(values))
}
