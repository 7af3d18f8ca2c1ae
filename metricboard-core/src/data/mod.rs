//! Backend wire formats

pub mod wire;

pub use wire::{
    document_to_wire, parse_document, parse_documents, parse_documents_str, parse_metadata,
    parse_points, parse_points_str, parse_timestamp, points_to_wire, ParsedBatch,
};
