use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use serde::Serialize;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::workload::Workload;

/// Opens a file for a single sequential parse
pub fn get_bytes(file: File) -> std::io::Result<impl Deref<Target = [u8]>> {
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::Read;
        let mut file = file;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }
    // Memory map the file on unix systems, workload files for large scales run to hundreds of MB
    #[cfg(unix)]
    {
        use memmap2::{Advice, Mmap};
        // The artifacts are only written by the prepare stage, never while a run has them mapped
        unsafe {
            let m = Mmap::map(&file)?;
            m.advise(Advice::Sequential)?;
            Ok(m)
        }
    }
}

/// Loads a persisted workload. Anything short of a valid JSON array of records is malformed
pub fn read_workload(path: &Path) -> Result<Workload> {
    let malformed = |reason: String| Error::MalformedWorkloadFile { path: path.to_owned(), reason };
    let file = File::open(path).map_err(|e| malformed(e.to_string()))?;
    let bytes = get_bytes(file).map_err(|e| malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| malformed(e.to_string()))
}

/// Loads a record population from a JSON array
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let bytes = get_bytes(file).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    PathBuf::from(temp)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(|e| Error::io(path, e))
}

/// Writes `value` as pretty JSON, through a temporary file renamed into place so readers never see
/// a partial artifact
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let temp = temp_path(path);
    if let Err(e) = write_json(&temp, value) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    fs::rename(&temp, path).map_err(|e| Error::io(path, e))
}

/// A set of artifacts that land together or not at all
///
/// Each staged value is written next to its destination with a `.tmp` suffix. Nothing is visible
/// under the real names until [`StagedWrites::commit`], and dropping an uncommitted set removes its
/// temporary files
#[derive(Debug, Default)]
pub struct StagedWrites {
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagedWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage<T: Serialize + ?Sized>(&mut self, path: &Path, value: &T) -> Result<()> {
        let temp = temp_path(path);
        // Registered first so a failed write is cleaned up too
        self.staged.push((temp.clone(), path.to_owned()));
        write_json(&temp, value)
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Renames every staged file into place
    ///
    /// Destinations are checked before the first rename. If a rename still fails, the files
    /// already moved are removed again, so the set is never left half replaced
    pub fn commit(mut self) -> Result<()> {
        if let Some((_, path)) = self.staged.iter().find(|(_, path)| path.is_dir()) {
            return Err(Error::io(path, io::Error::new(io::ErrorKind::Other, "destination is a directory")));
        }
        let staged = std::mem::take(&mut self.staged);
        let mut committed: Vec<&Path> = Vec::with_capacity(staged.len());
        for (index, (temp, path)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(temp, path) {
                for done in committed {
                    let _ = fs::remove_file(done);
                }
                for (temp, _) in &staged[index..] {
                    let _ = fs::remove_file(temp);
                }
                return Err(Error::io(path, e));
            }
            committed.push(path);
        }
        Ok(())
    }
}

impl Drop for StagedWrites {
    fn drop(&mut self) {
        for (temp, _) in &self.staged {
            let _ = fs::remove_file(temp);
        }
    }
}
