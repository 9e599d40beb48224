//! In-memory tar archives for container file delivery
//!
//! The daemon's upload endpoint only accepts tar streams, so files headed into
//! a container are wrapped here first.

use crate::error::Result;

/// Build a tar archive holding a single file at the archive root.
///
/// `mode` is the Unix permission bits the file carries inside the container.
pub fn single_file_archive(name: &str, contents: &[u8], mode: u32) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(mode);
    header.set_cksum();

    builder.append_data(&mut header, name, contents)?;
    Ok(builder.into_inner()?)
}
