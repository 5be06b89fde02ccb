#![allow(dead_code)]

use std::path::Path;

use dcdtraj::endian::{swap_in_place, DOUBLE, WORD};
use dcdtraj::{DcdReader, DcdWriter, Frame, Header, UnitCell, WriterOptions};
use glam::Vec3;

/// Deterministic positions for frame `index`, distinct for every atom and frame.
pub fn positions(natoms: usize, index: usize) -> Vec<Vec3> {
    (0..natoms)
        .map(|a| {
            let (a, i) = (a as f32, index as f32);
            Vec3::new(100.0 * i + a, 0.5 * a - i, -a - 0.25 * i)
        })
        .collect()
}

/// Build the frame at `index` the way `options` asks for it.
pub fn make_frame(natoms: usize, index: usize, options: &WriterOptions) -> Frame {
    let i = index as f32;
    Frame {
        unit_cell: options
            .has_unit_cell
            .then(|| UnitCell::orthorhombic(10.0 + index as f64, 20.0, 30.0)),
        positions: positions(natoms, index),
        fourth: options
            .has_4_dimensions
            .then(|| (0..natoms).map(|a| 0.1 * a as f32 + i).collect()),
        charges: options
            .has_charges
            .then(|| (0..natoms).map(|a| 0.25 * a as f32 - i).collect()),
        ..Frame::default()
    }
}

/// Write a trajectory of `nframes` frames to `path` and return the frames a reader should see.
pub fn write_trajectory(
    path: &Path,
    natoms: usize,
    nframes: usize,
    options: &WriterOptions,
) -> Vec<Frame> {
    let mut writer = DcdWriter::create(path, natoms, options).unwrap();
    let mut expected = Vec::with_capacity(nframes);
    for index in 0..nframes {
        let frame = make_frame(natoms, index, options);
        writer.write_frame(&frame).unwrap();
        expected.push(seen_as(frame, index, &expected, options));
    }
    writer.close().unwrap();
    expected
}

/// What a reader returns for `frame`: fixed atoms keep the values of the first frame, and step
/// and time follow from the options.
fn seen_as(mut frame: Frame, index: usize, previous: &[Frame], options: &WriterOptions) -> Frame {
    if let (Some(free), Some(first)) = (&options.free_atoms, previous.first()) {
        for a in 0..frame.natoms() {
            if !free.contains(&(a as u32 + 1)) {
                frame.positions[a] = first.positions[a];
                if let (Some(fourth), Some(first_fourth)) = (&mut frame.fourth, &first.fourth) {
                    fourth[a] = first_fourth[a];
                }
            }
        }
    }
    frame.step = options.starting_frame as i64 + index as i64 * options.save_frequency as i64;
    frame.time = frame.step as f64 * options.time_step as f64;
    frame
}

pub fn read_header(path: &Path) -> Header {
    DcdReader::open(path).unwrap().header().clone()
}

fn records(bytes: &[u8], marker: usize) -> Vec<(usize, usize)> {
    let mut records = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let len: usize = bytes[pos..pos + marker]
            .chunks_exact(WORD)
            .map(|w| u32::from_ne_bytes([w[0], w[1], w[2], w[3]]) as usize)
            .sum();
        records.push((pos + marker, len));
        pos += len + 2 * marker;
    }
    records
}

/// Reverse the byte order of a native trajectory described by `header`.
///
/// Every word is swapped as the type it holds: unit cells and the X-PLOR time step as 8-byte
/// words, everything else as 4-byte words, and the magic and title text not at all.
pub fn swap_endianness(bytes: &[u8], header: &Header) -> Vec<u8> {
    let marker = header.marker_scale.bytes();
    let header_records = 3 + (header.n_fixed_atoms > 0) as usize;
    let frame_records = 3
        + header.has_4_dimensions as usize
        + header.has_unit_cell as usize
        + header.has_charges as usize;

    let mut swapped = bytes.to_vec();
    for (r, (start, len)) in records(bytes, marker).into_iter().enumerate() {
        swap_in_place(&mut swapped[start - marker..start], WORD);
        swap_in_place(&mut swapped[start + len..start + len + marker], WORD);
        let payload = &mut swapped[start..start + len];
        match r {
            // The X-PLOR time step is a single `f64`.
            0 if header.is_xplor() => {
                swap_in_place(&mut payload[WORD..40], WORD);
                swap_in_place(&mut payload[40..48], DOUBLE);
                swap_in_place(&mut payload[48..], WORD);
            }
            0 => swap_in_place(&mut payload[WORD..], WORD),
            1 => swap_in_place(&mut payload[..WORD], WORD),
            r if r < header_records => swap_in_place(payload, WORD),
            r if header.has_unit_cell && (r - header_records) % frame_records == 0 => {
                swap_in_place(payload, DOUBLE)
            }
            _ => swap_in_place(payload, WORD),
        }
    }
    swapped
}

/// Widen every 32-bit record marker of a native trajectory into a two-word marker.
pub fn widen_markers(bytes: &[u8]) -> Vec<u8> {
    let mut wide = Vec::with_capacity(bytes.len() * 2);
    for (start, len) in records(bytes, WORD) {
        let marker = [(len as u32).to_ne_bytes(), 0u32.to_ne_bytes()].concat();
        wide.extend_from_slice(&marker);
        wide.extend_from_slice(&bytes[start..start + len]);
        wide.extend_from_slice(&marker);
    }
    wide
}

/// Turn a native CHARMM trajectory without optional records into an X-PLOR one.
pub fn to_xplor(bytes: &[u8], time_step: f64) -> Vec<u8> {
    let mut xplor = bytes.to_vec();
    let control = &mut xplor[WORD..WORD + 84];
    control[40..48].copy_from_slice(&time_step.to_ne_bytes());
    control[80..84].copy_from_slice(&0i32.to_ne_bytes());
    xplor
}
