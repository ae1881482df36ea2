use crate::error::{ErrorKind, Result};
use crate::record::Record;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use exn::ResultExt;
use hoard_storage::ContentHash;
use std::io::{Cursor, Read, Write};

/// Leading bytes of every cache file.
pub const MAGIC: &[u8; 8] = b"HOARDVFS";
/// Current format version.
pub const FORMAT_VERSION: u64 = 1;

/// Upper bound for any single length-prefixed string. A corrupted length must
/// become a decode error, not a multi-gigabyte allocation.
const MAX_STRING_BYTES: u32 = 64 * 1024;

/// Encode records into the cache format.
pub fn encode(records: &[Record]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(24 + records.len() * 128);
    out.extend_from_slice(MAGIC);
    write_header(&mut out, records.len()).or_raise(|| ErrorKind::InvalidData("header"))?;
    for record in records {
        write_record(&mut out, record)?;
    }
    Ok(out)
}

fn write_header(out: &mut Vec<u8>, count: usize) -> std::io::Result<()> {
    out.write_u64::<LittleEndian>(FORMAT_VERSION)?;
    out.write_u64::<LittleEndian>(count as u64)
}

fn write_record(out: &mut Vec<u8>, record: &Record) -> Result<()> {
    let hash = record.hash.map(|hash| hash.to_string()).unwrap_or_default();
    let size = i64::try_from(record.size).or_raise(|| ErrorKind::InvalidData("size"))?;
    write_string(out, &record.key, "key")?;
    write_string(out, &hash, "hash")?;
    out.write_i64::<LittleEndian>(size).or_raise(|| ErrorKind::InvalidData("size"))?;
    out.write_u64::<LittleEndian>(record.last_modified).or_raise(|| ErrorKind::InvalidData("last modified"))?;
    out.write_u8(u8::from(record.finished_indexing)).or_raise(|| ErrorKind::InvalidData("finished"))?;
    Ok(())
}

fn write_string(out: &mut Vec<u8>, value: &str, field: &'static str) -> Result<()> {
    let length = u32::try_from(value.len()).ok().filter(|len| *len <= MAX_STRING_BYTES);
    let Some(length) = length else {
        exn::bail!(ErrorKind::InvalidData(field));
    };
    out.write_u32::<LittleEndian>(length).or_raise(|| ErrorKind::InvalidData(field))?;
    out.write_all(value.as_bytes()).or_raise(|| ErrorKind::InvalidData(field))?;
    Ok(())
}

/// Decode a complete cache file.
pub fn decode(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut reader = Cursor::new(bytes);
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic).or_raise(|| ErrorKind::Corrupt)?;
    if &magic != MAGIC {
        exn::bail!(ErrorKind::Corrupt);
    }
    let version = reader.read_u64::<LittleEndian>().or_raise(|| ErrorKind::Corrupt)?;
    if version != FORMAT_VERSION {
        exn::bail!(ErrorKind::UnsupportedVersion(version));
    }
    let count = reader.read_u64::<LittleEndian>().or_raise(|| ErrorKind::Corrupt)?;
    // Every record is at least 25 bytes, which bounds how many can be real.
    let remaining = bytes.len() as u64 - reader.position();
    if count > remaining / 25 {
        exn::bail!(ErrorKind::Corrupt);
    }
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        records.push(read_record(&mut reader)?);
    }
    if reader.position() != bytes.len() as u64 {
        exn::bail!(ErrorKind::Corrupt);
    }
    Ok(records)
}

fn read_record(reader: &mut Cursor<&[u8]>) -> Result<Record> {
    let key = read_string(reader)?;
    if key.is_empty() {
        exn::bail!(ErrorKind::Corrupt);
    }
    let hash = match read_string(reader)? {
        hex if hex.is_empty() => None,
        hex => Some(hex.parse::<ContentHash>().or_raise(|| ErrorKind::Corrupt)?),
    };
    let size = reader.read_i64::<LittleEndian>().or_raise(|| ErrorKind::Corrupt)?;
    let size = u64::try_from(size).or_raise(|| ErrorKind::Corrupt)?;
    let last_modified = reader.read_u64::<LittleEndian>().or_raise(|| ErrorKind::Corrupt)?;
    let finished_indexing = match reader.read_u8().or_raise(|| ErrorKind::Corrupt)? {
        0 => false,
        1 => true,
        _ => exn::bail!(ErrorKind::Corrupt),
    };
    Ok(Record { key, hash, size, last_modified, finished_indexing })
}

fn read_string(reader: &mut Cursor<&[u8]>) -> Result<String> {
    let length = reader.read_u32::<LittleEndian>().or_raise(|| ErrorKind::Corrupt)?;
    if length > MAX_STRING_BYTES {
        exn::bail!(ErrorKind::Corrupt);
    }
    let mut buffer = vec![0u8; length as usize];
    reader.read_exact(&mut buffer).or_raise(|| ErrorKind::Corrupt)?;
    String::from_utf8(buffer).or_raise(|| ErrorKind::Corrupt)
}
