//! Features Module - Flow Feature Encoding
//!
//! Maps flow records onto the model's input space.
//! Layout versioning lives in `layout.rs`; column scaling in `scaler.rs`.

pub mod layout;
pub mod flow;
pub mod scaler;

#[cfg(test)]
mod tests;

// Re-export common types
pub use flow::{encode_flow, FlowRecord};
pub use layout::{validate_layout, LayoutInfo, LayoutMismatchError, FEATURE_COUNT, FEATURE_VERSION, FLOW_FEATURE_LAYOUT};
pub use scaler::{ScalerError, StandardScaler};
