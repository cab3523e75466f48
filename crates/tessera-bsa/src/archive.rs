//! Archive index reader and lazy entry iteration.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;
use rayon::prelude::*;
use tessera_common::{cp1252, CancelToken, Segment};
use zerocopy::FromBytes;

use crate::decompress::DeferredPayload;
use crate::header::{
    archive_flags, BsaHeader, FileRecord, FolderRecord, HEADER_SIZE, MAGIC, SUPPORTED_VERSIONS,
};
use crate::{Error, Result};

/// One file in the archive index.
#[derive(Debug, Clone)]
pub struct BsaEntry {
    /// Relative path, folder and name joined by `\`
    pub path: String,
    /// Stored size in bytes
    pub size: u32,
    /// Absolute data offset
    pub offset: u32,
    /// Whether the stored data is compressed
    pub compressed: bool,
    /// Name hash from the file record
    pub hash: u64,
}

/// A file read out of an archive.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub path: String,
    pub data: Vec<u8>,
}

/// Archive reader over a seekable stream.
///
/// The index is read when the archive is opened; file data is read on
/// demand, one seek per file, in index order.
pub struct BsaArchive<R> {
    reader: R,
    header: BsaHeader,
    entries: Vec<BsaEntry>,
    stream_len: u64,
}

impl BsaArchive<BufReader<File>> {
    /// Open an archive file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> BsaArchive<R> {
    /// Read the archive index from `reader`.
    pub fn new(mut reader: R) -> Result<Self> {
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let mut head = [0u8; HEADER_SIZE];
        let header: BsaHeader = read_struct(&mut reader, &mut head)?;
        check_header(&header)?;

        let entries = read_index(&mut reader, &header, stream_len)?;
        debug!(
            "archive v{}: {} folders, {} files",
            { header.version },
            { header.folder_count },
            entries.len()
        );
        Ok(Self {
            reader,
            header,
            entries,
            stream_len,
        })
    }

    #[inline]
    pub fn header(&self) -> &BsaHeader {
        &self.header
    }

    /// Index entries in archive order, without reading any data.
    #[inline]
    pub fn list(&self) -> &[BsaEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by path, ignoring case and slash direction.
    pub fn find(&self, path: &str) -> Option<&BsaEntry> {
        let wanted = normalize(path);
        self.entries.iter().find(|e| normalize(&e.path) == wanted)
    }

    /// Read and decompress one entry.
    pub fn read(&mut self, entry: &BsaEntry) -> Result<Vec<u8>> {
        let flags = self.header.archive_flags;
        let payload = read_payload(&mut self.reader, self.stream_len, flags, entry)?;
        Ok(payload.resolve(&entry.path))
    }

    /// Lazily read every entry in order, yielding its path and its raw
    /// payload. Decompression is left to the consumer.
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries {
            reader: &mut self.reader,
            stream_len: self.stream_len,
            flags: self.header.archive_flags,
            entries: self.entries.iter(),
        }
    }

    /// Read every entry, decompressing in parallel.
    pub fn extract_all(&mut self, cancel: &CancelToken) -> Result<Vec<ExtractedFile>> {
        let mut pending = Vec::with_capacity(self.entries.len());
        for item in self.entries() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            pending.push(item?);
        }
        pending
            .into_par_iter()
            .map(|(path, payload)| {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let data = payload.resolve(&path);
                Ok(ExtractedFile { path, data })
            })
            .collect()
    }
}

/// Iterator returned by [`BsaArchive::entries`].
pub struct Entries<'a, R> {
    reader: &'a mut R,
    stream_len: u64,
    flags: u32,
    entries: std::slice::Iter<'a, BsaEntry>,
}

impl<R: Read + Seek> Iterator for Entries<'_, R> {
    type Item = Result<(String, DeferredPayload)>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        let payload = read_payload(self.reader, self.stream_len, self.flags, entry);
        Some(payload.map(|p| (entry.path.clone(), p)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

fn check_header(header: &BsaHeader) -> Result<()> {
    if header.magic != MAGIC {
        return Err(Error::InvalidMagic {
            expected: MAGIC,
            actual: header.magic,
        });
    }
    let version = header.version;
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(Error::UnsupportedVersion(version));
    }
    let flags = header.archive_flags;
    if flags & archive_flags::XBOX != 0 {
        return Err(Error::UnsupportedFlags {
            flags,
            reason: "console archives are not supported",
        });
    }
    let names = archive_flags::DIRECTORY_NAMES | archive_flags::FILE_NAMES;
    if flags & names != names {
        return Err(Error::UnsupportedFlags {
            flags,
            reason: "archives without folder and file names are not supported",
        });
    }
    Ok(())
}

fn read_struct<T: FromBytes, R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<T> {
    reader.read_exact(buf)?;
    Ok(Segment::new(buf).cursor().read_struct()?)
}

/// Fail unless `len` more bytes exist past the current position.
fn ensure_available<R: Seek>(
    reader: &mut R,
    stream_len: u64,
    len: u64,
    what: &'static str,
) -> Result<()> {
    let position = reader.stream_position()?;
    let available = stream_len.saturating_sub(position);
    if len > available {
        return Err(Error::SizeOverrun {
            what,
            offset: position,
            declared: len,
            available,
        });
    }
    Ok(())
}

fn read_index<R: Read + Seek>(
    reader: &mut R,
    header: &BsaHeader,
    stream_len: u64,
) -> Result<Vec<BsaEntry>> {
    reader.seek(SeekFrom::Start(u64::from(header.folder_offset)))?;

    let folder_count = header.folder_count;
    let default_compressed = header.archive_flags & archive_flags::COMPRESSED != 0;

    let mut buf = [0u8; FileRecord::SIZE];
    let record_len = FolderRecord::SIZE as u64;
    let folders_len = u64::from(folder_count) * record_len;
    ensure_available(reader, stream_len, folders_len, "folder records")?;
    let folders = (0..folder_count)
        .map(|_| read_struct::<FolderRecord, _>(reader, &mut buf))
        .collect::<Result<Vec<_>>>()?;

    let mut folder_files = Vec::with_capacity(folders.len());
    let mut file_count = 0u64;
    for folder in &folders {
        let mut len = [0u8; 1];
        reader.read_exact(&mut len)?;
        let mut name = vec![0u8; len[0] as usize];
        reader.read_exact(&mut name)?;
        if name.last() == Some(&0) {
            name.pop();
        }
        let name = cp1252::decode(&name);

        let count = folder.file_count;
        let record_len = FileRecord::SIZE as u64;
        let files_len = u64::from(count) * record_len;
        ensure_available(reader, stream_len, files_len, "file records")?;
        let files = (0..count)
            .map(|_| read_struct::<FileRecord, _>(reader, &mut buf))
            .collect::<Result<Vec<_>>>()?;
        file_count += u64::from(count);
        folder_files.push((name, files));
    }

    let declared = header.file_count;
    if file_count != u64::from(declared) {
        return Err(Error::FileCountMismatch {
            declared,
            found: file_count,
        });
    }

    let table_len = header.total_file_name_length;
    ensure_available(reader, stream_len, u64::from(table_len), "file name table")?;
    let mut table = vec![0u8; table_len as usize];
    reader.read_exact(&mut table)?;
    let mut cursor = Segment::new(&table).cursor();

    let expected = file_count as usize;
    let mut entries = Vec::with_capacity(expected);
    for (folder, files) in folder_files {
        for file in files {
            let name = cursor.read_cstring_bytes().map_err(|_| Error::NameTableExhausted {
                read: entries.len(),
                expected,
            })?;
            let name = cp1252::decode(name);
            let path = if folder.is_empty() {
                name
            } else {
                format!("{}\\{}", folder, name)
            };
            entries.push(BsaEntry {
                path,
                size: file.data_size(),
                offset: file.offset,
                compressed: default_compressed != file.toggles_compression(),
                hash: file.hash,
            });
        }
    }
    Ok(entries)
}

fn read_payload<R: Read + Seek>(
    reader: &mut R,
    stream_len: u64,
    flags: u32,
    entry: &BsaEntry,
) -> Result<DeferredPayload> {
    reader.seek(SeekFrom::Start(u64::from(entry.offset)))?;
    if flags & archive_flags::EMBEDDED_NAMES != 0 {
        let mut len = [0u8; 1];
        reader.read_exact(&mut len)?;
        reader.seek(SeekFrom::Current(i64::from(len[0])))?;
    }
    ensure_available(reader, stream_len, u64::from(entry.size), "file data")?;
    let mut raw = vec![0u8; entry.size as usize];
    reader.read_exact(&mut raw)?;
    Ok(DeferredPayload::new(raw, entry.compressed))
}

fn normalize(path: &str) -> String {
    path.chars()
        .map(|c| match c {
            '/' => '\\',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}
