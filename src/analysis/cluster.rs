//! Density-based clustering of comment embeddings.

use crate::embedding::EmbeddedComment;
use crate::error::{Result, TubeTalkError};
use linfa::prelude::*;
use linfa_clustering::Dbscan;
use linfa_nn::{distance::Distance, CommonNearestNeighbour};
use ndarray::{Array2, ArrayView, Dimension};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

/// Cluster membership of a comment. Noise sorts before every cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClusterLabel {
    Noise,
    Cluster(usize),
}

impl ClusterLabel {
    pub fn is_noise(&self) -> bool {
        matches!(self, ClusterLabel::Noise)
    }
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterLabel::Noise => write!(f, "-1"),
            ClusterLabel::Cluster(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for ClusterLabel {
    type Err = TubeTalkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "-1" => Ok(ClusterLabel::Noise),
            other => other
                .parse::<usize>()
                .map(ClusterLabel::Cluster)
                .map_err(|_| TubeTalkError::InvalidInput(format!("invalid cluster label: {}", s))),
        }
    }
}

impl Serialize for ClusterLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClusterLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Comment ids grouped by cluster label.
///
/// Within a label, ids keep the order of the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterAssignment(BTreeMap<ClusterLabel, Vec<String>>);

impl ClusterAssignment {
    pub fn get(&self, label: ClusterLabel) -> Option<&[String]> {
        self.0.get(&label).map(Vec::as_slice)
    }

    pub fn noise(&self) -> &[String] {
        self.get(ClusterLabel::Noise).unwrap_or(&[])
    }

    /// Number of distinct non-noise clusters.
    pub fn cluster_count(&self) -> usize {
        self.0.keys().filter(|label| !label.is_noise()).count()
    }

    /// Total number of assigned ids, noise included.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over labels in order, noise first.
    pub fn iter(&self) -> impl Iterator<Item = (ClusterLabel, &[String])> {
        self.0.iter().map(|(label, ids)| (*label, ids.as_slice()))
    }

    /// Non-noise clusters only.
    pub fn clusters(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.iter().filter_map(|(label, ids)| match label {
            ClusterLabel::Cluster(n) => Some((n, ids)),
            ClusterLabel::Noise => None,
        })
    }

    fn push(&mut self, label: ClusterLabel, id: String) {
        self.0.entry(label).or_default().push(id);
    }
}

/// DBSCAN parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    /// Neighborhood radius in cosine distance.
    pub radius: f64,
    /// Neighbors (the point itself included) needed to form a core point.
    pub min_samples: usize,
}

impl ClusterParams {
    /// Parameters scaled to the number of comments: the radius grows by 1 per
    /// 500 comments, the density threshold by 1 per 80.
    pub fn adaptive(n: usize) -> Self {
        let n = n as f64;
        Self {
            radius: (n / 500.0).max(1e-3),
            min_samples: ((n / 80.0).round_ties_even() as usize).max(1),
        }
    }
}

/// Groups embeddings with DBSCAN under cosine distance.
#[derive(Debug, Default)]
pub struct ClusterEngine {
    last_params: Option<ClusterParams>,
    last_labels: Vec<ClusterLabel>,
}

impl ClusterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters used by the most recent run.
    pub fn last_params(&self) -> Option<ClusterParams> {
        self.last_params
    }

    /// Per-point labels of the most recent run, aligned with its input.
    pub fn last_labels(&self) -> &[ClusterLabel] {
        &self.last_labels
    }

    /// Cluster `embeddings` and group `comment_ids` by label. Both slices are
    /// aligned by index.
    #[instrument(skip_all, fields(points = embeddings.len()))]
    pub fn analyze(&mut self, embeddings: &[Vec<f32>], comment_ids: &[String]) -> Result<ClusterAssignment> {
        self.last_params = None;
        self.last_labels.clear();

        if embeddings.len() != comment_ids.len() {
            return Err(TubeTalkError::ContractMismatch(format!(
                "{} embeddings for {} comment ids",
                embeddings.len(),
                comment_ids.len()
            )));
        }
        if embeddings.is_empty() {
            return Ok(ClusterAssignment::default());
        }

        let dimensions = embeddings[0].len();
        if let Some((index, ragged)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimensions)
        {
            return Err(TubeTalkError::ContractMismatch(format!(
                "embedding {} has {} dimensions, expected {}",
                index,
                ragged.len(),
                dimensions
            )));
        }

        let params = ClusterParams::adaptive(embeddings.len());
        let labels = dbscan(embeddings, params)?;

        let mut assignment = ClusterAssignment::default();
        for (label, id) in labels.iter().zip(comment_ids) {
            assignment.push(*label, id.clone());
        }

        debug!(
            "radius={:.3} min_samples={} clusters={} noise={}",
            params.radius,
            params.min_samples,
            assignment.cluster_count(),
            assignment.noise().len()
        );

        self.last_params = Some(params);
        self.last_labels = labels;
        Ok(assignment)
    }

    /// Cluster embeddings that carry their own comment ids.
    pub fn analyze_pairs(&mut self, comments: &[EmbeddedComment]) -> Result<ClusterAssignment> {
        let (ids, vectors): (Vec<String>, Vec<Vec<f32>>) = comments
            .iter()
            .map(|c| (c.comment_id.clone(), c.vector.clone()))
            .unzip();
        self.analyze(&vectors, &ids)
    }
}

/// Cosine distance for linfa's neighbor search. Zero vectors sit at distance
/// 1 from everything.
#[derive(Debug, Clone, Copy)]
struct CosineDistance;

impl Distance<f32> for CosineDistance {
    fn distance<D: Dimension>(&self, a: ArrayView<f32, D>, b: ArrayView<f32, D>) -> f32 {
        let (dot, norm_a, norm_b) = a
            .iter()
            .zip(b.iter())
            .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
                (dot + x * y, na + x * x, nb + y * y)
            });
        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        (1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())).max(0.0)
    }
}

/// DBSCAN over the rows of `points`, with clusters numbered by their first
/// member in input order.
///
/// linfa rejects a density threshold of 1, so that case runs with 2 and
/// every point left unclustered becomes a cluster of its own.
fn dbscan(points: &[Vec<f32>], params: ClusterParams) -> Result<Vec<ClusterLabel>> {
    let dimensions = points.first().map_or(0, Vec::len);
    let data = Array2::from_shape_vec((points.len(), dimensions), points.concat())
        .map_err(|e| TubeTalkError::ContractMismatch(format!("embedding matrix: {}", e)))?;

    let memberships = Dbscan::params_with(
        params.min_samples.max(2),
        CosineDistance,
        CommonNearestNeighbour::LinearSearch,
    )
    .tolerance(params.radius as f32)
    .check()
    .map_err(|e| TubeTalkError::InvalidInput(format!("clustering parameters: {}", e)))?
    .transform(&data);

    let singletons = params.min_samples <= 1;
    let mut renumbered: HashMap<usize, usize> = HashMap::new();
    let mut next_cluster = 0;
    let mut fresh = || {
        let id = next_cluster;
        next_cluster += 1;
        id
    };

    let labels = memberships
        .iter()
        .map(|membership| match membership {
            Some(raw) => ClusterLabel::Cluster(*renumbered.entry(*raw).or_insert_with(&mut fresh)),
            None if singletons => ClusterLabel::Cluster(fresh()),
            None => ClusterLabel::Noise,
        })
        .collect();
    Ok(labels)
}
