//! Split a classified batch into per-modality groups.
//!
//! Every item is validated concurrently; the first failure aborts the whole
//! partition. On success each original position lands in exactly one group,
//! and members inside a group keep ascending index order.

use std::collections::BTreeMap;

use futures::future::try_join_all;

use crate::error::{EmbedError, EmbedResult};
use crate::modality::{EmbeddingInput, Modality};
use crate::observe::MetricsSpan;
use crate::pool::HttpPool;
use crate::validate::{NormalizedPayload, validate_item};

/// Items of one modality, tagged with their original positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalityGroup {
    pub modality: Modality,
    pub members: Vec<(usize, NormalizedPayload)>,
}

impl ModalityGroup {
    fn new(modality: Modality) -> Self {
        Self {
            modality,
            members: Vec::new(),
        }
    }

    pub fn indices(&self) -> Vec<usize> {
        self.members.iter().map(|(idx, _)| *idx).collect()
    }

    pub fn payloads(&self) -> impl Iterator<Item = &NormalizedPayload> {
        self.members.iter().map(|(_, payload)| payload)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Split into positions and payloads.
    pub fn into_parts(self) -> (Vec<usize>, Vec<NormalizedPayload>) {
        self.members.into_iter().unzip()
    }
}

/// Result of [`partition`]. Only non-empty groups are present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Partition {
    groups: BTreeMap<Modality, ModalityGroup>,
    total: usize,
}

impl Partition {
    /// Number of items partitioned.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn groups(&self) -> impl Iterator<Item = &ModalityGroup> {
        self.groups.values()
    }

    pub fn group(&self, modality: Modality) -> Option<&ModalityGroup> {
        self.groups.get(&modality)
    }

    pub fn into_groups(self) -> Vec<ModalityGroup> {
        self.groups.into_values().collect()
    }

    /// All indices across all groups, sorted.
    pub fn covered_indices(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self.groups().flat_map(ModalityGroup::indices).collect();
        all.sort_unstable();
        all
    }

    /// Every position `0..total` appears exactly once.
    pub fn is_complete(&self) -> bool {
        self.covered_indices()
            .into_iter()
            .eq(0..self.total)
    }
}

/// Validate `items` against parallel `modalities` and group them.
///
/// `pool` is used only by image URLs. A length mismatch is reported before
/// any item is touched.
pub async fn partition(
    items: &[EmbeddingInput],
    modalities: &[Modality],
    pool: Option<&HttpPool>,
) -> EmbedResult<Partition> {
    if items.len() != modalities.len() {
        return Err(EmbedError::LengthMismatch {
            items: items.len(),
            modalities: modalities.len(),
        });
    }

    let span = MetricsSpan::start();
    let validated = try_join_all(
        items
            .iter()
            .zip(modalities)
            .enumerate()
            .map(|(idx, (item, modality))| async move {
                validate_item(item, *modality, idx, pool)
                    .await
                    .map(|payload| (idx, payload))
            }),
    )
    .await;
    if let Some(span) = span {
        span.record_validation(items.len(), &validated);
    }

    let mut groups: BTreeMap<Modality, ModalityGroup> = BTreeMap::new();
    for (idx, payload) in validated? {
        groups
            .entry(payload.modality())
            .or_insert_with_key(|m| ModalityGroup::new(*m))
            .members
            .push((idx, payload));
    }

    tracing::debug!(
        total = items.len(),
        groups = groups.len(),
        "partitioned batch"
    );

    Ok(Partition {
        groups,
        total: items.len(),
    })
}
