//! Graph Module - Flow Graph Construction
//!
//! Turns a labelled flow table into a graph: scaled node features, encoded
//! labels and an edge list, plus the normalised message-passing structure
//! the GCN layers consume.

pub mod builder;
pub mod edges;
pub mod message;
pub mod split;


pub use builder::{FlowGraph, GraphBuilder, GraphError};
pub use edges::{EdgeStrategy, DEFAULT_KNN_K, SYNTHETIC_EDGE_SEED};
pub use message::MessageGraph;
pub use split::{DataSplit, DEFAULT_TRAIN_RATIO, DEFAULT_VAL_RATIO};
