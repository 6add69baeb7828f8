//! Wire format for node and edge records.
//!
//! Every record starts with a one-byte format version. All integers are
//! little-endian; strings are a `u32` length followed by UTF-8 bytes with no
//! terminator. Records are padded with zeroes to the page size, so decoding
//! tolerates trailing zero bytes but never reads past the buffer.

use crate::error::{GraphError, Result};
use crate::model::{Edge, Node, Property, PropertyValue};

pub const FORMAT_VERSION: u8 = 1;

const TAG_INT: u8 = 0;
const TAG_STRING: u8 = 1;
const TAG_BOOL: u8 = 2;

pub fn serialize_node(node: &Node) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(64);
    buf.push(FORMAT_VERSION);
    buf.extend_from_slice(&node.id.to_le_bytes());
    buf.push(node.active as u8);

    write_count(&mut buf, node.labels.len(), "labels")?;
    for label in &node.labels {
        write_string(&mut buf, label)?;
    }

    write_count(&mut buf, node.properties.len(), "properties")?;
    for property in &node.properties {
        write_property(&mut buf, property)?;
    }

    Ok(buf)
}

pub fn serialize_edge(edge: &Edge) -> Result<Vec<u8>> {
    if edge.type_name.is_empty() {
        return Err(GraphError::InvalidArgument(
            "edge type must be non-empty".into(),
        ));
    }

    let mut buf = Vec::with_capacity(64);
    buf.push(FORMAT_VERSION);
    buf.extend_from_slice(&edge.id.to_le_bytes());
    buf.push(edge.active as u8);
    write_string(&mut buf, &edge.type_name)?;
    buf.extend_from_slice(&edge.source.to_le_bytes());
    buf.extend_from_slice(&edge.target.to_le_bytes());

    write_count(&mut buf, edge.properties.len(), "properties")?;
    for property in &edge.properties {
        write_property(&mut buf, property)?;
    }

    Ok(buf)
}

pub fn deserialize_node(data: &[u8]) -> Result<Node> {
    decode_node(data).map(|(node, _)| node)
}

pub fn deserialize_edge(data: &[u8]) -> Result<Edge> {
    decode_edge(data).map(|(edge, _)| edge)
}

/// Decodes a node record and reports how many bytes it occupied.
pub(crate) fn decode_node(data: &[u8]) -> Result<(Node, usize)> {
    let mut cursor = Cursor::new(data);
    cursor.read_version()?;

    let id = cursor.read_i64()?;
    let active = cursor.read_flag()?;

    let label_count = cursor.read_u32()? as usize;
    let mut labels = Vec::with_capacity(label_count.min(16));
    for _ in 0..label_count {
        labels.push(cursor.read_string()?);
    }

    let property_count = cursor.read_u32()? as usize;
    let mut properties = Vec::with_capacity(property_count.min(16));
    for _ in 0..property_count {
        properties.push(cursor.read_property()?);
    }

    Ok((
        Node {
            id,
            labels,
            properties,
            active,
        },
        cursor.consumed(),
    ))
}

/// Decodes an edge record and reports how many bytes it occupied.
pub(crate) fn decode_edge(data: &[u8]) -> Result<(Edge, usize)> {
    let mut cursor = Cursor::new(data);
    cursor.read_version()?;

    let id = cursor.read_i64()?;
    let active = cursor.read_flag()?;
    let type_name = cursor.read_string()?;
    if type_name.is_empty() {
        return Err(GraphError::Malformed("empty edge type".into()));
    }
    let source = cursor.read_i64()?;
    let target = cursor.read_i64()?;

    let property_count = cursor.read_u32()? as usize;
    let mut properties = Vec::with_capacity(property_count.min(16));
    for _ in 0..property_count {
        properties.push(cursor.read_property()?);
    }

    Ok((
        Edge {
            id,
            type_name,
            source,
            target,
            properties,
            active,
        },
        cursor.consumed(),
    ))
}

fn write_count(buf: &mut Vec<u8>, count: usize, what: &str) -> Result<()> {
    let count: u32 = count
        .try_into()
        .map_err(|_| GraphError::InvalidArgument(format!("too many {what} to serialize")))?;
    buf.extend_from_slice(&count.to_le_bytes());
    Ok(())
}

fn write_string(buf: &mut Vec<u8>, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let len: u32 = bytes
        .len()
        .try_into()
        .map_err(|_| GraphError::InvalidArgument("string length exceeds u32::MAX".into()))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn write_property(buf: &mut Vec<u8>, property: &Property) -> Result<()> {
    if property.key.is_empty() {
        return Err(GraphError::InvalidArgument(
            "property keys must be non-empty".into(),
        ));
    }
    write_string(buf, &property.key)?;
    match &property.value {
        PropertyValue::Int(v) => {
            buf.push(TAG_INT);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        PropertyValue::String(v) => {
            buf.push(TAG_STRING);
            write_string(buf, v)?;
        }
        PropertyValue::Bool(v) => {
            buf.push(TAG_BOOL);
            buf.push(*v as u8);
        }
    }
    Ok(())
}

struct Cursor<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, index: 0 }
    }

    fn consumed(&self) -> usize {
        self.index
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.data.len() - self.index {
            return Err(GraphError::Malformed("unexpected end of record".into()));
        }
        let start = self.index;
        self.index += len;
        Ok(&self.data[start..start + len])
    }

    fn read_version(&mut self) -> Result<()> {
        let version = self.read_exact(1)?[0];
        if version != FORMAT_VERSION {
            return Err(GraphError::Malformed(format!(
                "unsupported record version {version}"
            )));
        }
        Ok(())
    }

    fn read_flag(&mut self) -> Result<bool> {
        match self.read_exact(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(GraphError::Malformed(format!(
                "invalid boolean encoding: {other}"
            ))),
        }
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self
            .read_exact(4)?
            .try_into()
            .expect("slice has exactly 4 bytes");
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_i64(&mut self) -> Result<i64> {
        let bytes: [u8; 8] = self
            .read_exact(8)?
            .try_into()
            .expect("slice has exactly 8 bytes");
        Ok(i64::from_le_bytes(bytes))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_exact(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| GraphError::Malformed("invalid UTF-8 string".into()))
    }

    fn read_property(&mut self) -> Result<Property> {
        let key = self.read_string()?;
        if key.is_empty() {
            return Err(GraphError::Malformed("empty property key".into()));
        }
        let tag = self.read_exact(1)?[0];
        let value = match tag {
            TAG_INT => PropertyValue::Int(self.read_i64()?),
            TAG_STRING => PropertyValue::String(self.read_string()?),
            TAG_BOOL => PropertyValue::Bool(self.read_flag()?),
            other => {
                return Err(GraphError::Type(format!(
                    "unsupported property type tag {other}"
                )))
            }
        };
        Ok(Property { key, value })
    }
}
