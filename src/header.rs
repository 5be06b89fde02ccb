//! The header records at the start of a DCD file.
//!
//! A header consists of four records:
//!
//! 1. 84 bytes: a 4-byte magic string (`CORD` or `VELD`) and 20 control words,
//! 2. a title block of count-prefixed 80-character lines,
//! 3. the number of atoms,
//! 4. only if there are fixed atoms: the 1-based indices of the free atoms.
//!
//! Layout of the control record, by byte offset within its payload:
//!
//! | offset | contents |
//! |-------:|----------|
//! | 0      | magic |
//! | 4      | number of frames (NSET) |
//! | 8      | starting frame (ISTART) |
//! | 12     | save frequency (NSAVC) |
//! | 16     | total number of steps (NSTEP) |
//! | 36     | number of fixed atoms (NAMNF) |
//! | 40     | time step: `f32` (CHARMM), `f64` over 40..48 (X-PLOR) |
//! | 44     | unit cell flag (CHARMM) |
//! | 48     | fourth dimension flag (CHARMM) |
//! | 52     | charges flag (CHARMM) |
//! | 80     | version, zero for X-PLOR files |

use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::endian::{self, ne_f32, ne_i32, ne_u32, DOUBLE, WORD};
use crate::error::{DcdError, Result};
use crate::record::{bad_read, read_record, skip_record, write_record, MarkerScale};

/// Size of the control record payload in bytes.
pub const HEADER_SIZE: usize = 84;
/// Version number written into new files.
pub const CHARMM_VERSION: i32 = 24;
/// Absolute file offset of the frame count, which is patched after each written frame.
pub const NSET_POSITION: u64 = 8;
/// Absolute file offset of the step counter, which is patched after each written frame.
pub const NSTEP_POSITION: u64 = 20;
/// Width of one title line.
pub const TITLE_LINE: usize = 80;

const NSET: usize = 4;
const ISTART: usize = 8;
const NSAVC: usize = 12;
const NSTEP: usize = 16;
const NAMNF: usize = 36;
const DELTA: usize = 40;
const QCRYS: usize = 44;
const QDIM4: usize = 48;
const QCG: usize = 52;
const VERSION: usize = 80;

/// The dialect a file was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// X-PLOR files have no version number and no optional frame contents.
    Xplor,
    Charmm { version: i32 },
}

/// What the arrays of a trajectory hold.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    #[default]
    Coordinates,
    Velocities,
}

impl Kind {
    pub const fn magic(self) -> &'static [u8; 4] {
        match self {
            Kind::Coordinates => b"CORD",
            Kind::Velocities => b"VELD",
        }
    }
}

/// The format parameters of a trajectory.
///
/// These are fixed once the header has been read or written.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub variant: Variant,
    pub kind: Kind,
    /// Whether the file is stored in the opposite byte order of this machine.
    pub reverse_endian: bool,
    pub marker_scale: MarkerScale,
    pub has_unit_cell: bool,
    pub has_4_dimensions: bool,
    pub has_charges: bool,
    /// The number of frames according to the header itself.
    ///
    /// Not every writer keeps this up to date, so the frame count used for navigation is derived
    /// from the size of the file instead.
    pub declared_frames: i32,
    pub starting_frame: i32,
    pub save_frequency: i32,
    pub time_step: f64,
    pub n_atoms: usize,
    pub n_fixed_atoms: usize,
    /// The 1-based indices of the free atoms, present iff there are fixed atoms.
    pub atom_indices: Option<Box<[u32]>>,
}

impl Header {
    pub fn is_xplor(&self) -> bool {
        self.variant == Variant::Xplor
    }

    /// The number of atoms stored in frames after the first one if atoms are fixed, otherwise
    /// zero.
    pub fn n_atom_indices(&self) -> usize {
        self.atom_indices.as_ref().map_or(0, |indices| indices.len())
    }

    /// The number of atoms stored in the frame at `index`.
    ///
    /// The first frame always contains all atoms.
    pub fn frame_atoms(&self, index: usize) -> usize {
        match self.n_atom_indices() {
            0 => self.n_atoms,
            _ if index == 0 => self.n_atoms,
            n => n,
        }
    }

    /// The simulation step the frame at `index` was saved at.
    pub fn step_of(&self, index: usize) -> i64 {
        self.starting_frame as i64 + index as i64 * self.save_frequency as i64
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match self.variant {
            Variant::Xplor => "X-PLOR".to_string(),
            Variant::Charmm { version } => format!("CHARMM (version {version})"),
        };
        let kind = match self.kind {
            Kind::Coordinates => "coordinates",
            Kind::Velocities => "velocities",
        };
        let order = if self.reverse_endian {
            "reversed"
        } else {
            "native"
        };
        writeln!(f, "variant:         {variant}")?;
        writeln!(f, "contents:        {kind}")?;
        writeln!(f, "byte order:      {order}")?;
        writeln!(f, "marker width:    {} bits", self.marker_scale.bytes() * 8)?;
        writeln!(f, "atoms:           {}", self.n_atoms)?;
        writeln!(f, "fixed atoms:     {}", self.n_fixed_atoms)?;
        writeln!(f, "declared frames: {}", self.declared_frames)?;
        writeln!(f, "starting frame:  {}", self.starting_frame)?;
        writeln!(f, "save frequency:  {}", self.save_frequency)?;
        writeln!(f, "time step:       {}", self.time_step)?;
        writeln!(f, "unit cell:       {}", self.has_unit_cell)?;
        writeln!(f, "4th dimension:   {}", self.has_4_dimensions)?;
        write!(f, "charges:         {}", self.has_charges)
    }
}

/// Determine the byte order and marker width from the first two words of the file.
///
/// Leaves the file at its start.
pub(crate) fn detect_format<R: Read + Seek>(file: &mut R) -> Result<(bool, MarkerScale)> {
    let mut raw = [0u8; 2 * WORD];
    file.read_exact(&mut raw).map_err(bad_read)?;
    file.seek(SeekFrom::Start(0)).map_err(DcdError::BadSeek)?;

    fn classify(raw: &[u8], reverse: bool) -> Option<(bool, MarkerScale)> {
        let first = ne_u32(raw, 0) as u64;
        let second = ne_u32(raw, WORD) as u64;
        if first + second == HEADER_SIZE as u64 {
            Some((reverse, MarkerScale::Double))
        } else if first == HEADER_SIZE as u64 {
            Some((reverse, MarkerScale::Single))
        } else {
            None
        }
    }

    if let Some(format) = classify(&raw, false) {
        return Ok(format);
    }
    endian::swap_in_place(&mut raw, WORD);
    classify(&raw, true).ok_or_else(|| {
        DcdError::bad_format("first record marker does not describe an 84-byte header")
    })
}

/// Read the magic and control words.
///
/// The atom count and atom indices are left empty.
pub(crate) fn read_control_flags<R: Read>(
    file: &mut R,
    reverse_endian: bool,
    marker_scale: MarkerScale,
) -> Result<Header> {
    let mut payload = read_record(file, HEADER_SIZE, marker_scale, reverse_endian)?;

    let kind = match &payload[..4] {
        b"CORD" => Kind::Coordinates,
        b"VELD" => Kind::Velocities,
        other => {
            return Err(DcdError::bad_format(format!(
                "unknown magic {:?}",
                String::from_utf8_lossy(other)
            )))
        }
    };

    // The X-PLOR time step is a single 8-byte value, so it is swapped on its own.
    let mut delta = [0u8; DOUBLE];
    delta.copy_from_slice(&payload[DELTA..DELTA + DOUBLE]);
    endian::swap_if(reverse_endian, &mut delta, DOUBLE);
    endian::swap_if(reverse_endian, &mut payload[4..], WORD);

    let word = |offset| ne_i32(&payload, offset);
    let variant = match word(VERSION) {
        0 => Variant::Xplor,
        version => Variant::Charmm { version },
    };

    let n_fixed_atoms = word(NAMNF);
    let n_fixed_atoms = usize::try_from(n_fixed_atoms).map_err(|_| {
        DcdError::bad_format(format!("negative number of fixed atoms ({n_fixed_atoms})"))
    })?;

    let mut header = Header {
        variant,
        kind,
        reverse_endian,
        marker_scale,
        has_unit_cell: false,
        has_4_dimensions: false,
        has_charges: false,
        declared_frames: word(NSET),
        starting_frame: word(ISTART),
        save_frequency: word(NSAVC),
        time_step: 0.0,
        n_atoms: 0,
        n_fixed_atoms,
        atom_indices: None,
    };
    match variant {
        Variant::Xplor => header.time_step = f64::from_ne_bytes(delta),
        Variant::Charmm { .. } => {
            header.time_step = ne_f32(&payload, DELTA) as f64;
            header.has_unit_cell = word(QCRYS) != 0;
            header.has_4_dimensions = word(QDIM4) != 0;
            header.has_charges = word(QCG) != 0;
        }
    }
    Ok(header)
}

/// Skip over the title block.
pub(crate) fn skip_title<R: Read + Seek>(file: &mut R, header: &Header) -> Result<()> {
    skip_record(file, header.marker_scale, header.reverse_endian)?;
    Ok(())
}

fn read_i32s<R: Read>(file: &mut R, n: usize, header: &Header) -> Result<Vec<i32>> {
    let mut payload = read_record(file, n * WORD, header.marker_scale, header.reverse_endian)?;
    endian::swap_if(header.reverse_endian, &mut payload, WORD);
    Ok((0..n).map(|i| ne_i32(&payload, i * WORD)).collect())
}

pub(crate) fn read_atom_count<R: Read>(file: &mut R, header: &mut Header) -> Result<()> {
    let natoms = read_i32s(file, 1, header)?[0];
    header.n_atoms = usize::try_from(natoms)
        .map_err(|_| DcdError::bad_format(format!("negative number of atoms ({natoms})")))?;
    Ok(())
}

/// Read the free atom indices, if there are any fixed atoms.
pub(crate) fn read_atom_indices<R: Read>(file: &mut R, header: &mut Header) -> Result<()> {
    if header.n_fixed_atoms == 0 {
        return Ok(());
    }
    let (natoms, nfixed) = (header.n_atoms, header.n_fixed_atoms);
    if nfixed >= natoms {
        return Err(DcdError::bad_format(format!(
            "{nfixed} fixed atoms leave no free atoms out of {natoms}"
        )));
    }
    let indices = read_i32s(file, natoms - nfixed, header)?
        .into_iter()
        .map(|idx| match u32::try_from(idx) {
            Ok(idx) if idx >= 1 && idx as usize <= natoms => Ok(idx),
            _ => Err(DcdError::bad_format(format!(
                "atom index {idx} out of range 1..={natoms}"
            ))),
        })
        .collect::<Result<Box<[u32]>>>()?;
    header.atom_indices = Some(indices);
    Ok(())
}

/// Read all header records, returning the [`Header`] and the position of the first frame.
pub(crate) fn read_header<R: Read + Seek>(file: &mut R) -> Result<(Header, u64)> {
    let (reverse_endian, marker_scale) = detect_format(file)?;
    debug!(reverse_endian, ?marker_scale, "detected dcd format");
    let mut header = read_control_flags(file, reverse_endian, marker_scale)?;
    skip_title(file, &header)?;
    read_atom_count(file, &mut header)?;
    read_atom_indices(file, &mut header)?;
    let first_frame_position = file.stream_position().map_err(DcdError::BadSeek)?;
    debug!(
        variant = ?header.variant,
        natoms = header.n_atoms,
        nfixed = header.n_fixed_atoms,
        first_frame_position,
        "read dcd header"
    );
    Ok((header, first_frame_position))
}

fn put_i32(payload: &mut [u8], offset: usize, value: i32) {
    payload[offset..offset + WORD].copy_from_slice(&value.to_ne_bytes());
}

fn title_line(text: &str) -> [u8; TITLE_LINE] {
    let mut line = [b' '; TITLE_LINE];
    let text = text.as_bytes();
    let n = text.len().min(TITLE_LINE);
    line[..n].copy_from_slice(&text[..n]);
    line
}

/// Write all header records for `header`.
///
/// The frame count and step counter are written as zero, to be patched as frames are appended.
pub(crate) fn write_header<W: Write>(file: &mut W, header: &Header, title: &str) -> Result<()> {
    let n_atoms = to_i32(header.n_atoms, "number of atoms")?;
    let n_fixed_atoms = to_i32(header.n_fixed_atoms, "number of fixed atoms")?;

    let mut control = [0u8; HEADER_SIZE];
    control[..4].copy_from_slice(header.kind.magic());
    put_i32(&mut control, NSET, 0);
    put_i32(&mut control, ISTART, header.starting_frame);
    put_i32(&mut control, NSAVC, header.save_frequency);
    put_i32(&mut control, NSTEP, 0);
    put_i32(&mut control, NAMNF, n_fixed_atoms);
    control[DELTA..DELTA + WORD].copy_from_slice(&(header.time_step as f32).to_ne_bytes());
    put_i32(&mut control, QCRYS, header.has_unit_cell as i32);
    put_i32(&mut control, QDIM4, header.has_4_dimensions as i32);
    put_i32(&mut control, QCG, header.has_charges as i32);
    put_i32(&mut control, VERSION, CHARMM_VERSION);
    write_record(file, &control)?;

    let created = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let remarks = format!("REMARKS Created by dcdtraj at {created} s since the Unix epoch");
    let mut titles = Vec::with_capacity(WORD + 2 * TITLE_LINE);
    titles.extend_from_slice(&2i32.to_ne_bytes());
    titles.extend_from_slice(&title_line(title));
    titles.extend_from_slice(&title_line(&remarks));
    write_record(file, &titles)?;

    write_record(file, &n_atoms.to_ne_bytes())?;

    if let Some(indices) = &header.atom_indices {
        let mut payload = Vec::with_capacity(indices.len() * WORD);
        for &idx in indices.iter() {
            payload.extend_from_slice(&(idx as i32).to_ne_bytes());
        }
        write_record(file, &payload)?;
    }
    Ok(())
}

fn to_i32(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| DcdError::InvalidDataObject(format!("{what} ({value}) exceeds i32::MAX")))
}
