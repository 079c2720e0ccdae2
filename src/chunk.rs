//! Run file I/O.
//!
//! A run is a sorted sequence of `i32` values stored as raw little-endian
//! 4-byte words, no header or padding. Run files live in the sort operation's
//! temp directory and are named `{stage}_{index}`: stage 0 holds the runs
//! emitted by ingest, and each merge pass over stage `s` produces the files
//! of stage `s + 1`.

use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Formats the path of a run file inside the temp directory.
pub fn run_path(dir: &Path, stage: usize, index: usize) -> PathBuf {
    dir.join(format!("{}_{}", stage, index))
}

/// Opens a run file for buffered reading.
pub fn open_run(path: &Path) -> io::Result<io::BufReader<fs::File>> {
    Ok(io::BufReader::new(fs::File::open(path)?))
}

/// Creates a run file for buffered writing, truncating an existing one.
pub fn create_run(path: &Path) -> io::Result<io::BufWriter<fs::File>> {
    Ok(io::BufWriter::new(fs::File::create(path)?))
}

/// Reads integers into `buf` until it is full or the reader is exhausted.
/// Returns the number of integers actually read.
pub fn read_block<R: Read>(reader: &mut R, buf: &mut [i32]) -> io::Result<usize> {
    let mut count = 0;

    while count < buf.len() {
        match reader.read_i32::<LittleEndian>() {
            Ok(value) => {
                buf[count] = value;
                count += 1;
            }
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err),
        }
    }

    return Ok(count);
}

/// Writes the whole block to the writer.
pub fn write_block<W: Write>(writer: &mut W, buf: &[i32]) -> io::Result<()> {
    for &value in buf {
        writer.write_i32::<LittleEndian>(value)?;
    }

    return Ok(());
}

/// Dumps a sorted chunk to a new run file.
pub fn write_run(path: &Path, data: &[i32]) -> io::Result<()> {
    let mut writer = create_run(path)?;
    write_block(&mut writer, data)?;
    writer.flush()?;

    return Ok(());
}
