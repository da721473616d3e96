//! Graph Builder
//!
//! Turns a labelled flow table into a `FlowGraph`: sorted class names act
//! as the label encoder, features are standard-scaled, then edges are added
//! with the configured strategy. The fitted builder is stored in the
//! checkpoint and scales single flows at inference time.

use ndarray::{Array2, ArrayView1, Axis};

use crate::logic::dataset::FlowTable;
use crate::logic::features::{ScalerError, StandardScaler};
use super::edges::EdgeStrategy;
use super::message::MessageGraph;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum GraphError {
    NotFitted,
    EmptyTable,
    Scaler(ScalerError),
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::NotFitted => write!(f, "GraphError: builder not fitted, train the model first"),
            GraphError::EmptyTable => write!(f, "GraphError: cannot build a graph from an empty table"),
            GraphError::Scaler(e) => write!(f, "GraphError: {}", e),
        }
    }
}

impl std::error::Error for GraphError {}

impl From<ScalerError> for GraphError {
    fn from(e: ScalerError) -> Self {
        GraphError::Scaler(e)
    }
}

// ============================================================================
// FLOW GRAPH
// ============================================================================

/// Node features, directed edges and encoded labels
#[derive(Debug, Clone)]
pub struct FlowGraph {
    /// nodes x features, scaled
    pub x: Array2<f32>,
    /// `(source, target)`
    pub edges: Vec<(usize, usize)>,
    /// Index into `class_names`; empty for inference graphs
    pub labels: Vec<usize>,
    pub class_names: Vec<String>,
    pub feature_names: Vec<String>,
}

impl FlowGraph {
    pub fn num_nodes(&self) -> usize {
        self.x.nrows()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn message_graph(&self) -> MessageGraph {
        MessageGraph::new(self.num_nodes(), &self.edges)
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Label encoder + fitted scaler + edge strategy
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    scaler: StandardScaler,
    class_names: Vec<String>,
    feature_names: Vec<String>,
    edge_strategy: EdgeStrategy,
}

impl GraphBuilder {
    pub fn new(edge_strategy: EdgeStrategy) -> Self {
        Self { edge_strategy, ..Self::default() }
    }

    /// Restore a builder from checkpointed state
    pub fn from_fitted(scaler: StandardScaler, class_names: Vec<String>, feature_names: Vec<String>) -> Self {
        Self {
            scaler,
            class_names,
            feature_names,
            edge_strategy: EdgeStrategy::default(),
        }
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn is_fitted(&self) -> bool {
        self.scaler.is_fitted()
    }

    /// Fit label encoder and scaler on `table`, then build edges
    pub fn create_graph_from_flows(&mut self, table: &FlowTable) -> Result<FlowGraph, GraphError> {
        if table.is_empty() {
            return Err(GraphError::EmptyTable);
        }
        log::info!("Building graph from {} flows...", table.len());

        // Sorted class names, as a label encoder would order them
        self.class_names = table.class_counts().into_keys().collect();
        let labels = table
            .labels
            .iter()
            .filter_map(|l| self.class_names.binary_search(l).ok())
            .collect();

        self.feature_names = table.feature_names.clone();
        let x = self.scaler.fit_transform(table.features.view())?;
        let edges = self.edge_strategy.build(x.view());

        let graph = FlowGraph {
            x,
            edges,
            labels,
            class_names: self.class_names.clone(),
            feature_names: self.feature_names.clone(),
        };

        log::info!("Graph created:");
        log::info!("   Nodes: {}", graph.num_nodes());
        log::info!("   Edges: {} ({})", graph.num_edges(), self.edge_strategy);
        log::info!("   Features: {}", graph.num_features());
        log::info!("   Classes: {} {:?}", graph.num_classes(), graph.class_names);

        Ok(graph)
    }

    /// One scaled node with a self loop
    pub fn create_single_flow_graph(&self, features: ArrayView1<'_, f32>) -> Result<FlowGraph, GraphError> {
        if !self.is_fitted() {
            return Err(GraphError::NotFitted);
        }

        let row = features.insert_axis(Axis(0));
        let x = self.scaler.transform(row)?;

        Ok(FlowGraph {
            x,
            edges: vec![(0, 0)],
            labels: Vec::new(),
            class_names: self.class_names.clone(),
            feature_names: self.feature_names.clone(),
        })
    }
}
