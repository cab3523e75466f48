//! Extraction to a directory tree.

use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::bounded;
use log::{debug, info};
use tessera_common::CancelToken;

use crate::archive::BsaArchive;
use crate::decompress::DeferredPayload;
use crate::{Error, Result};

/// Totals for one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Files written
    pub extracted: usize,
    /// Files written with no content, including failed decompressions
    pub empty: usize,
    /// Bytes written
    pub bytes: u64,
}

/// Map an archive path to a destination under `dir`.
///
/// Empty, `.` and `..` components are dropped so entries cannot escape
/// the destination.
pub fn output_path(dir: &Path, archive_path: &str) -> PathBuf {
    let mut out = dir.to_path_buf();
    for part in archive_path.split(['\\', '/']) {
        if part.is_empty() || part == "." || part == ".." {
            continue;
        }
        out.push(part);
    }
    out
}

fn write_file(dir: &Path, path: &str, payload: DeferredPayload) -> Result<usize> {
    let data = payload.resolve(path);
    let dest = output_path(dir, path);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&dest, &data)?;
    Ok(data.len())
}

/// Sum the stats of joined workers. A panicked worker is an error.
fn merge_stats<I>(parts: I) -> Result<ExtractStats>
where
    I: IntoIterator<Item = thread::Result<ExtractStats>>,
{
    let mut total = ExtractStats::default();
    for part in parts {
        let part = part.map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Error::WorkerPanicked(message)
        })?;
        total.extracted += part.extracted;
        total.empty += part.empty;
        total.bytes += part.bytes;
    }
    Ok(total)
}

/// Extract every entry of `archive` into `dir`.
///
/// The index is scanned on the calling thread, which feeds a bounded
/// queue; decompression and writes run on worker threads. The first error
/// stops the scan.
pub fn extract_to_dir<R: Read + Seek>(
    archive: &mut BsaArchive<R>,
    dir: &Path,
    cancel: &CancelToken,
) -> Result<ExtractStats> {
    fs::create_dir_all(dir)?;
    let workers = thread::available_parallelism().map_or(4, |n| n.get());
    let (tx, rx) = bounded::<(String, DeferredPayload)>(workers * 4);
    let (err_tx, err_rx) = bounded::<Error>(1);
    let failed = CancelToken::new();
    let stopped = || cancel.is_cancelled() || failed.is_cancelled();

    debug!(
        "extracting {} entries to {} with {} workers",
        archive.len(),
        dir.display(),
        workers
    );

    let stats = thread::scope(|s| -> Result<ExtractStats> {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let rx = rx.clone();
                let err_tx = err_tx.clone();
                let failed = &failed;
                s.spawn(move || {
                    let mut stats = ExtractStats::default();
                    for (path, payload) in rx {
                        if stopped() {
                            break;
                        }
                        match write_file(dir, &path, payload) {
                            Ok(len) => {
                                stats.extracted += 1;
                                if len == 0 {
                                    stats.empty += 1;
                                }
                                stats.bytes += len as u64;
                            }
                            Err(e) => {
                                let _ = err_tx.try_send(e);
                                failed.cancel();
                                break;
                            }
                        }
                    }
                    stats
                })
            })
            .collect();
        drop(rx);
        drop(err_tx);

        let mut scan = Ok(());
        for item in archive.entries() {
            if stopped() {
                break;
            }
            match item {
                Ok(job) => {
                    if tx.send(job).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    scan = Err(e);
                    break;
                }
            }
        }
        drop(tx);

        let total = merge_stats(handles.into_iter().map(|h| h.join()));
        scan.and(total)
    })?;

    if let Ok(e) = err_rx.try_recv() {
        return Err(e);
    }
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    info!(
        "extracted {} files ({} bytes) to {}",
        stats.extracted,
        stats.bytes,
        dir.display()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_stays_inside() {
        let dir = Path::new("out");
        assert_eq!(
            output_path(dir, "meshes\\armor\\a.nif"),
            Path::new("out").join("meshes").join("armor").join("a.nif")
        );
        assert_eq!(
            output_path(dir, "..\\..\\evil.txt"),
            Path::new("out").join("evil.txt")
        );
    }

    #[test]
    fn test_merge_stats() {
        let part = ExtractStats {
            extracted: 2,
            empty: 1,
            bytes: 10,
        };
        let total = merge_stats(vec![Ok(part), Ok(part)]).unwrap();
        assert_eq!(total.extracted, 4);
        assert_eq!(total.empty, 2);
        assert_eq!(total.bytes, 20);

        let panicked = thread::spawn(|| -> ExtractStats { panic!("disk on fire") }).join();
        match merge_stats(vec![Ok(part), panicked]) {
            Err(Error::WorkerPanicked(message)) => assert_eq!(message, "disk on fire"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
