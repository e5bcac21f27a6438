//! The `.vpack` container codec.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! [magic "VPAK"][version u8]
//! [u32 len][manifest JSON]
//! [u32 len][chunk section]
//! [u32 len][graph section]
//! ```
//!
//! The chunk section is a `u32` count, a `u32` dimension, then per chunk a
//! length-prefixed id, text, metadata JSON, and `dimension` raw `f32`s. The
//! graph section is a kind byte (0 flat, 1 hnsw); the hnsw body is the entry
//! ordinal, the max layer, and per node its layer count and per-layer
//! neighbor lists.
//!
//! Decoding is fail-fast: wrong magic, a version this engine does not write
//! (including the legacy JSON and undivided-binary formats, versions 1 and
//! 2), truncation, and inconsistent structure each fail with their own
//! [`DecodeError`] kind. There is no best-effort partial decode.

use tracing::debug;
use vpack_core::{Chunk, DecodeError, IndexType, PackManifest, VPackError};

use crate::index::graph::{HnswGraph, HnswNode};
use crate::index::VPackIndex;

/// Magic bytes at the start of every artifact.
pub const MAGIC: &[u8; 4] = b"VPAK";

/// The format version this engine reads and writes.
pub const FORMAT_VERSION: u8 = 3;

const GRAPH_KIND_FLAT: u8 = 0;
const GRAPH_KIND_HNSW: u8 = 1;

/// Encode an index into a `.vpack` artifact.
///
/// Encoding is deterministic: the same index always produces the same bytes.
///
/// # Errors
///
/// Returns [`VPackError::Serialize`] when the manifest or a chunk's metadata
/// cannot be rendered as JSON, or when a section exceeds the format's `u32`
/// length space.
pub fn serialize(index: &VPackIndex) -> Result<Vec<u8>, VPackError> {
    let manifest = serde_json::to_vec(index.manifest())
        .map_err(|err| VPackError::Serialize(err.to_string()))?;
    let chunks = encode_chunks(index)?;
    let graph = encode_graph(index);

    let mut out = Vec::with_capacity(
        MAGIC.len() + 1 + 4 * 3 + manifest.len() + chunks.len() + graph.len(),
    );
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    write_section(&mut out, &manifest)?;
    write_section(&mut out, &chunks)?;
    write_section(&mut out, &graph)?;

    debug!(bytes = out.len(), chunks = index.chunk_count(), "serialized index");
    Ok(out)
}

/// Decode a `.vpack` artifact back into a queryable index.
///
/// # Errors
///
/// Returns [`VPackError::Decode`] with the specific [`DecodeError`] kind:
/// [`DecodeError::BadMagic`] for foreign bytes,
/// [`DecodeError::UnsupportedVersion`] for any version other than the
/// current one, [`DecodeError::Truncated`] for a short buffer, and
/// [`DecodeError::Corrupt`] for intact framing around inconsistent content.
pub fn deserialize(bytes: &[u8]) -> Result<VPackIndex, VPackError> {
    let mut reader = Reader::new(bytes);

    let magic = reader.take(MAGIC.len())?;
    if magic != MAGIC {
        return Err(DecodeError::BadMagic.into());
    }
    let version = reader.take_u8()?;
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        }
        .into());
    }

    let manifest_bytes = reader.take_section()?;
    let chunk_bytes = reader.take_section()?;
    let graph_bytes = reader.take_section()?;
    if !reader.is_at_end() {
        return Err(corrupt("trailing bytes after graph section").into());
    }

    let manifest: PackManifest = serde_json::from_slice(manifest_bytes)
        .map_err(|err| corrupt(format!("manifest section: {err}")))?;
    manifest.validate().map_err(|err| corrupt(format!("manifest section: {err}")))?;
    let dimensions =
        manifest.dimensions().map_err(|err| corrupt(format!("manifest section: {err}")))?;

    let (chunks, vectors) = decode_chunks(chunk_bytes, dimensions)?;
    if chunks.is_empty() {
        // A built index always holds at least one chunk.
        return Err(corrupt("artifact contains no chunks").into());
    }
    let graph = decode_graph(graph_bytes, &manifest, chunks.len())?;

    debug!(chunks = chunks.len(), dimensions, "deserialized index");
    Ok(VPackIndex::from_parts(chunks, vectors, dimensions, manifest, graph))
}

fn encode_chunks(index: &VPackIndex) -> Result<Vec<u8>, VPackError> {
    let chunks = index.chunks();
    let vectors = index.vectors();

    let mut out = Vec::new();
    out.extend_from_slice(&u32_len(chunks.len())?.to_le_bytes());
    out.extend_from_slice(&u32_len(index.dimensions())?.to_le_bytes());

    for (chunk, vector) in chunks.iter().zip(vectors) {
        let metadata = serde_json::to_vec(&chunk.metadata)
            .map_err(|err| VPackError::Serialize(err.to_string()))?;
        write_section(&mut out, chunk.id.as_bytes())?;
        write_section(&mut out, chunk.text.as_bytes())?;
        write_section(&mut out, &metadata)?;
        for value in vector {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    Ok(out)
}

fn decode_chunks(
    bytes: &[u8],
    dimensions: usize,
) -> Result<(Vec<Chunk>, Vec<Vec<f32>>), VPackError> {
    let mut reader = Reader::new(bytes);

    let count = reader.take_u32()? as usize;
    let stored_dimensions = reader.take_u32()? as usize;
    if stored_dimensions != dimensions {
        return Err(corrupt(format!(
            "chunk section declares {stored_dimensions}d vectors, manifest declares {dimensions}d"
        ))
        .into());
    }

    let mut chunks = Vec::with_capacity(count);
    let mut vectors = Vec::with_capacity(count);
    for _ in 0..count {
        let id = reader.take_str("chunk id")?.to_string();
        let text = reader.take_str("chunk text")?.to_string();
        let metadata = serde_json::from_slice(reader.take_section()?)
            .map_err(|err| corrupt(format!("chunk '{id}' metadata: {err}")))?;

        let mut vector = Vec::with_capacity(dimensions);
        for _ in 0..dimensions {
            vector.push(f32::from_le_bytes(reader.take_array()?));
        }

        chunks.push(Chunk { id, text, metadata });
        vectors.push(vector);
    }

    if !reader.is_at_end() {
        return Err(corrupt("trailing bytes in chunk section").into());
    }
    Ok((chunks, vectors))
}

fn encode_graph(index: &VPackIndex) -> Vec<u8> {
    let mut out = Vec::new();
    let Some(graph) = index.graph() else {
        out.push(GRAPH_KIND_FLAT);
        return out;
    };

    out.push(GRAPH_KIND_HNSW);
    out.extend_from_slice(&graph.entry_point.to_le_bytes());
    // Layer and neighbor counts are bounded by the chunk count, which the
    // builder already constrained to u32.
    #[allow(clippy::cast_possible_truncation)]
    {
        out.extend_from_slice(&(graph.max_layer as u32).to_le_bytes());
        out.extend_from_slice(&(graph.nodes.len() as u32).to_le_bytes());
        for node in &graph.nodes {
            out.extend_from_slice(&(node.max_layer as u32).to_le_bytes());
            for layer in &node.connections {
                out.extend_from_slice(&(layer.len() as u32).to_le_bytes());
                for &neighbor in layer {
                    out.extend_from_slice(&neighbor.to_le_bytes());
                }
            }
        }
    }
    out
}

fn decode_graph(
    bytes: &[u8],
    manifest: &PackManifest,
    chunk_count: usize,
) -> Result<Option<HnswGraph>, VPackError> {
    let mut reader = Reader::new(bytes);
    let kind = reader.take_u8()?;
    let declared = manifest.index.map(|c| c.index_type).unwrap_or_default();

    match kind {
        GRAPH_KIND_FLAT => {
            if declared == IndexType::Hnsw {
                return Err(corrupt("manifest declares hnsw but artifact has no graph").into());
            }
            if !reader.is_at_end() {
                return Err(corrupt("trailing bytes in flat graph section").into());
            }
            Ok(None)
        }
        GRAPH_KIND_HNSW => {
            if declared == IndexType::Flat {
                return Err(corrupt("manifest declares flat but artifact has a graph").into());
            }

            let entry_point = reader.take_u32()?;
            let max_layer = reader.take_u32()? as usize;
            let node_count = reader.take_u32()? as usize;
            if node_count != chunk_count {
                return Err(corrupt(format!(
                    "graph has {node_count} nodes for {chunk_count} chunks"
                ))
                .into());
            }
            if entry_point as usize >= node_count {
                return Err(corrupt(format!("entry point {entry_point} out of range")).into());
            }

            let mut nodes = Vec::with_capacity(node_count);
            for ordinal in 0..node_count {
                let node_layer = reader.take_u32()? as usize;
                if node_layer > max_layer {
                    return Err(corrupt(format!(
                        "node {ordinal} on layer {node_layer} above graph max {max_layer}"
                    ))
                    .into());
                }
                let mut connections = Vec::with_capacity(node_layer + 1);
                for _ in 0..=node_layer {
                    let len = reader.take_u32()? as usize;
                    let mut neighbors = Vec::with_capacity(len);
                    for _ in 0..len {
                        let neighbor = reader.take_u32()?;
                        if neighbor as usize >= node_count {
                            return Err(corrupt(format!(
                                "node {ordinal} references neighbor {neighbor} out of range"
                            ))
                            .into());
                        }
                        neighbors.push(neighbor);
                    }
                    connections.push(neighbors);
                }
                nodes.push(HnswNode { max_layer: node_layer, connections });
            }

            if !reader.is_at_end() {
                return Err(corrupt("trailing bytes in graph section").into());
            }
            if nodes[entry_point as usize].max_layer != max_layer {
                return Err(corrupt("entry point is not on the max layer").into());
            }
            Ok(Some(HnswGraph { nodes, entry_point, max_layer }))
        }
        other => Err(corrupt(format!("unknown graph kind byte {other}")).into()),
    }
}

fn write_section(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), VPackError> {
    out.extend_from_slice(&u32_len(bytes.len())?.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn u32_len(len: usize) -> Result<u32, VPackError> {
    u32::try_from(len)
        .map_err(|_| VPackError::Serialize(format!("section of {len} bytes exceeds u32 framing")))
}

fn corrupt(message: impl Into<String>) -> DecodeError {
    DecodeError::Corrupt(message.into())
}

/// Cursor over an artifact buffer. Every shortfall reports how many bytes
/// were missing and where.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.bytes.len() - self.offset;
        if remaining < len {
            return Err(DecodeError::Truncated { needed: len - remaining, offset: self.offset });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let slice = self.take(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(slice);
        Ok(array)
    }

    fn take_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn take_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    fn take_section(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.take_u32()? as usize;
        self.take(len)
    }

    fn take_str(&mut self, what: &str) -> Result<&'a str, DecodeError> {
        std::str::from_utf8(self.take_section()?)
            .map_err(|err| DecodeError::Corrupt(format!("{what} is not utf-8: {err}")))
    }

    fn is_at_end(&self) -> bool {
        self.offset == self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_reports_shortfall_position() {
        let mut reader = Reader::new(&[1, 2, 3]);
        reader.take(2).unwrap();
        let err = reader.take(4).unwrap_err();
        assert_eq!(err, DecodeError::Truncated { needed: 3, offset: 2 });
    }

    #[test]
    fn test_reader_section_roundtrip() {
        let mut buf = Vec::new();
        write_section(&mut buf, b"hello").unwrap();
        let mut reader = Reader::new(&buf);
        assert_eq!(reader.take_section().unwrap(), b"hello");
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_bad_magic() {
        let err = deserialize(b"NOPE\x03rest").unwrap_err();
        let VPackError::Decode(decode) = err else { panic!("expected decode error") };
        assert_eq!(decode, DecodeError::BadMagic);
    }

    #[test]
    fn test_legacy_versions_fail_fast() {
        for legacy in [1u8, 2] {
            let mut bytes = MAGIC.to_vec();
            bytes.push(legacy);
            let err = deserialize(&bytes).unwrap_err();
            let VPackError::Decode(decode) = err else { panic!("expected decode error") };
            assert_eq!(decode, DecodeError::UnsupportedVersion { found: legacy, supported: 3 });
        }
    }

    #[test]
    fn test_empty_buffer_is_truncated() {
        let err = deserialize(&[]).unwrap_err();
        let VPackError::Decode(decode) = err else { panic!("expected decode error") };
        assert!(matches!(decode, DecodeError::Truncated { .. }));
    }
}
