mod disk;
mod record;
mod ser;

pub use disk::{DiskManager, PageId, DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE};
pub use record::RecordStore;
pub use ser::{
    deserialize_edge, deserialize_node, serialize_edge, serialize_node, FORMAT_VERSION,
};

pub(crate) use ser::{decode_edge, decode_node};
