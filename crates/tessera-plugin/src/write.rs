//! Serializer: recompute sizes and emit a plugin tree as bytes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::debug;
use tessera_common::CancelToken;
use zerocopy::IntoBytes;

use crate::codec::HEADER_SIZE;
use crate::tree::{deflate, deflate_all, encode_fields, fields_len, Group, Plugin, Record};
use crate::{Error, Result};

/// Serialize a plugin into one buffer.
///
/// Before sizing, the header's record count is set to the number of
/// records and groups below it, and every compressed record without a
/// retained block is deflated.
pub fn serialize(plugin: &mut Plugin) -> Result<Vec<u8>> {
    serialize_with_cancel(plugin, &CancelToken::new())
}

/// [`serialize`], checking `cancel` between record compressions.
pub fn serialize_with_cancel(plugin: &mut Plugin, cancel: &CancelToken) -> Result<Vec<u8>> {
    let count = plugin.node_count();
    plugin.set_record_count(u32::try_from(count).map_err(|_| Error::TooLarge(count))?);

    let mut jobs = Vec::new();
    let (header, groups) = plugin.parts_mut();
    header.collect_pack_jobs(&mut jobs);
    for group in groups.iter_mut() {
        group.collect_pack_jobs(&mut jobs);
    }
    let repacked = jobs.len();
    deflate_all(jobs, cancel)?;

    let mut sizes = Vec::new();
    let mut total = size_record(plugin.header(), &mut sizes)?;
    for group in plugin.groups() {
        total += size_group(group, &mut sizes)?;
    }

    let mut out = Vec::with_capacity(total);
    let mut sizes = sizes.into_iter();
    emit_record(plugin.header(), &mut sizes, &mut out)?;
    for group in plugin.groups() {
        emit_group(group, &mut sizes, &mut out)?;
    }
    debug_assert_eq!(out.len(), total);

    debug!(
        "serialized plugin: {} bytes, {} records and groups, {} blocks recompressed",
        out.len(),
        count,
        repacked
    );
    Ok(out)
}

/// Serialize a plugin into `writer`, returning the number of bytes written.
pub fn write_plugin<W: Write>(plugin: &mut Plugin, mut writer: W) -> Result<usize> {
    let bytes = serialize(plugin)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(bytes.len())
}

impl Plugin {
    /// Serialize this plugin. See [`serialize`].
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        serialize(self)
    }

    /// Serialize this plugin to a file.
    pub fn write_to<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let file = File::create(path)?;
        write_plugin(self, BufWriter::new(file))
    }
}

fn data_len(record: &Record) -> usize {
    match (record.is_compressed(), record.packed()) {
        (true, Some(block)) => block.len(),
        _ => fields_len(record.fields()),
    }
}

fn to_u32(size: usize) -> Result<u32> {
    u32::try_from(size).map_err(|_| Error::TooLarge(size))
}

/// Size of a record and its groups. Group sizes are pushed in pre-order.
fn size_record(record: &Record, sizes: &mut Vec<u32>) -> Result<usize> {
    let mut total = 0;
    if !record.is_dummy() {
        let data = data_len(record);
        to_u32(data)?;
        total += HEADER_SIZE + data;
    }
    for group in record.groups() {
        total += size_group(group, sizes)?;
    }
    Ok(total)
}

fn size_group(group: &Group, sizes: &mut Vec<u32>) -> Result<usize> {
    let slot = sizes.len();
    sizes.push(0);
    let mut total = HEADER_SIZE;
    for record in group.records() {
        total += size_record(record, sizes)?;
    }
    sizes[slot] = to_u32(total)?;
    Ok(total)
}

fn emit_record(
    record: &Record,
    sizes: &mut impl Iterator<Item = u32>,
    out: &mut Vec<u8>,
) -> Result<()> {
    if !record.is_dummy() {
        let payload = match (record.is_compressed(), record.packed()) {
            (true, Some(block)) => block.to_vec(),
            (true, None) => deflate(record.id, &encode_fields(record.fields())?)?,
            (false, _) => encode_fields(record.fields())?,
        };
        let mut header = record.header();
        header.data_size = to_u32(payload.len())?;
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&payload);
    }
    for group in record.groups() {
        emit_group(group, sizes, out)?;
    }
    Ok(())
}

fn emit_group(
    group: &Group,
    sizes: &mut impl Iterator<Item = u32>,
    out: &mut Vec<u8>,
) -> Result<()> {
    let start = out.len();
    let mut header = group.header();
    header.group_size = sizes.next().unwrap_or_default();
    out.extend_from_slice(header.as_bytes());
    for record in group.records() {
        emit_record(record, sizes, out)?;
    }
    debug_assert_eq!(out.len() - start, header.group_size as usize);
    Ok(())
}
