//! Hand-rolled encoders for building plugin bytes without the serializer.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use tessera_plugin::codec::{flags, GroupHeader, RecordHeader, GRUP};
use tessera_plugin::tags::{HEDR, TES4};
use zerocopy::IntoBytes;

pub fn tag(bytes: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*bytes)
}

pub fn field(tag_bytes: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    if data.len() > 0xFFFF {
        out.extend_from_slice(b"XXXX");
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(tag_bytes);
        out.extend_from_slice(&0u16.to_le_bytes());
    } else {
        out.extend_from_slice(tag_bytes);
        out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    }
    out.extend_from_slice(data);
    out
}

pub fn record(tag_bytes: &[u8; 4], id: u32, record_flags: u32, body: &[u8]) -> Vec<u8> {
    let header = RecordHeader {
        tag: tag(tag_bytes),
        data_size: body.len() as u32,
        flags: record_flags,
        id,
        revision: 0x0A0B,
        version: 15,
        unknown: 0,
    };
    let mut out = header.as_bytes().to_vec();
    out.extend_from_slice(body);
    out
}

/// A compressed record whose block was produced at `level`.
pub fn compressed_record(tag_bytes: &[u8; 4], id: u32, fields: &[u8], level: u32) -> Vec<u8> {
    let mut block = (fields.len() as u32).to_le_bytes().to_vec();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(fields).unwrap();
    block.extend(encoder.finish().unwrap());
    record(tag_bytes, id, flags::COMPRESSED, &block)
}

pub fn group(group_type: u32, label: u32, children: &[u8]) -> Vec<u8> {
    let header = GroupHeader {
        tag: GRUP.as_u32(),
        group_size: (24 + children.len()) as u32,
        label,
        group_type,
        stamp: 0x1F0C,
        unknown1: 0,
        version: 0,
        unknown2: 0,
    };
    let mut out = header.as_bytes().to_vec();
    out.extend_from_slice(children);
    out
}

pub fn header_record(count: u32) -> Vec<u8> {
    let mut hedr = 1.0f32.to_le_bytes().to_vec();
    hedr.extend_from_slice(&count.to_le_bytes());
    hedr.extend_from_slice(&0x800u32.to_le_bytes());
    let mut body = field(&HEDR.to_bytes(), &hedr);
    body.extend(field(b"MAST", b"Master.esm\0"));
    body.extend(field(b"DATA", &[0; 8]));
    record(&TES4.to_bytes(), 0, 0, &body)
}

/// A plugin exercising long fields, compressed records, dummy hosts and
/// cell children.
///
/// Records and groups below the header: 9.
pub fn sample_plugin() -> Vec<u8> {
    let mut out = header_record(9);

    let big = vec![0x5Au8; 70_000];
    let mut gmst = record(
        b"GMST",
        0x100,
        0,
        &[
            field(b"EDID", b"iMax\0"),
            field(b"DESC", &big),
            field(b"DATA", &[1, 0, 0, 0]),
        ]
        .concat(),
    );
    gmst.extend(compressed_record(
        b"GMST",
        0x101,
        &[field(b"EDID", b"sBig\0"), field(b"DATA", &big)].concat(),
        9,
    ));
    out.extend(group(0, tag(b"GMST"), &gmst));

    let refr = record(
        b"REFR",
        0x202,
        0,
        &[field(b"NAME", &0x700u32.to_le_bytes()), field(b"DATA", &[0x11; 24])].concat(),
    );
    let temp = group(9, 0x201, &refr);
    let children = group(6, 0x201, &temp);
    let mut cell_and_children = record(b"CELL", 0x201, 0, &field(b"EDID", b"Cell\0"));
    cell_and_children.extend(children);
    let block = group(2, 0, &cell_and_children);
    out.extend(group(0, tag(b"CELL"), &block));
    out
}
