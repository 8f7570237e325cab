//! Fan-in: reassemble group results into original input order.
//!
//! Output length always equals input length; a missing, duplicated or
//! out-of-range position means a group result is corrupt and is reported as
//! `Internal` rather than papered over.

use serde::{Deserialize, Serialize};

use crate::dispatch::GroupResult;
use crate::error::{EmbedError, EmbedResult};

/// One vector, tagged with the position of the input it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResultItem {
    pub index: usize,
    pub vector: Vec<f32>,
}

/// Aggregated usage, summed over all backend calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_count: u64,
    pub total_count: u64,
}

impl Usage {
    pub fn add(&mut self, units: u64) {
        self.input_count += units;
        self.total_count += units;
    }
}

/// The ordered outcome of one `embed` call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub items: Vec<EmbeddingResultItem>,
    pub usage: Usage,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.items.iter().map(|item| item.vector.as_slice())
    }
}

/// Place every group's vectors at their original positions.
pub fn merge(results: Vec<GroupResult>, total: usize) -> EmbedResult<BatchResult> {
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; total];
    let mut usage = Usage::default();

    for group in results {
        if group.indices.len() != group.vectors.len() {
            return Err(EmbedError::Internal(format!(
                "{} group has {} positions but {} vectors",
                group.modality,
                group.indices.len(),
                group.vectors.len()
            )));
        }
        usage.add(group.usage);
        for (idx, vector) in group.indices.into_iter().zip(group.vectors) {
            let slot = slots.get_mut(idx).ok_or_else(|| {
                EmbedError::Internal(format!("result index {idx} is out of range for {total} items"))
            })?;
            if slot.replace(vector).is_some() {
                return Err(EmbedError::Internal(format!(
                    "result index {idx} was produced twice"
                )));
            }
        }
    }

    let items = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.map(|vector| EmbeddingResultItem { index, vector })
                .ok_or_else(|| EmbedError::Internal(format!("no result for item {index}")))
        })
        .collect::<EmbedResult<Vec<_>>>()?;

    Ok(BatchResult { items, usage })
}
