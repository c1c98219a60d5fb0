use tokio::time::Instant;
use tracing::debug;

use crate::orchestrator::ExecuteContext;
use crate::ping::ping_node;

/// `amount` distinct indexes drawn uniformly from `0..length`.
pub fn random_indexes(length: usize, amount: usize) -> Vec<usize> {
    rand::seq::index::sample(&mut rand::rng(), length, amount.min(length)).into_vec()
}

/// Produces the node indexes one round of an `execute` call tries, in order.
///
/// With explicit nodes every one of them is yielded as given, without
/// probing. Otherwise a third (rounded up) of the healthy nodes is sampled
/// without replacement, and a sampled node that has not been contacted
/// recently is probed first and skipped if the probe fails.
pub struct NodeIndexGenerator<'a> {
    ctx: &'a ExecuteContext,
    pending: std::vec::IntoIter<usize>,
    passthrough: bool,
}

impl<'a> NodeIndexGenerator<'a> {
    pub fn new(ctx: &'a ExecuteContext, explicit_node_indexes: Option<&[usize]>) -> Self {
        match explicit_node_indexes {
            Some(indexes) => Self {
                ctx,
                pending: indexes.to_vec().into_iter(),
                passthrough: true,
            },
            None => {
                let healthy = ctx.network.healthy_node_indexes();
                let amount = healthy.len().div_ceil(3);
                let sampled: Vec<usize> = random_indexes(healthy.len(), amount)
                    .into_iter()
                    .map(|i| healthy[i])
                    .collect();

                Self {
                    ctx,
                    pending: sampled.into_iter(),
                    passthrough: false,
                }
            }
        }
    }

    /// Candidates not yet yielded or skipped.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub async fn next(&mut self) -> Option<usize> {
        while let Some(index) = self.pending.next() {
            if self.passthrough || self.ctx.network.node_recently_pinged(index, Instant::now()) {
                return Some(index);
            }

            if ping_node(self.ctx, index).await {
                return Some(index);
            }

            debug!(node = %self.ctx.network.node(index).account_id(), "probe failed, skipping node");
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_indexes_are_distinct_and_in_range() {
        for _ in 0..100 {
            let indexes = random_indexes(10, 4);
            assert_eq!(indexes.len(), 4);
            assert!(indexes.iter().all(|&i| i < 10));
            assert_eq!(indexes.iter().collect::<HashSet<_>>().len(), 4);
        }
    }

    #[test]
    fn test_random_indexes_clamps_amount() {
        let mut indexes = random_indexes(3, 10);
        indexes.sort();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(random_indexes(0, 1).is_empty());
    }

    #[test]
    fn test_random_indexes_covers_every_index() {
        let mut seen = HashSet::new();
        for _ in 0..500 {
            seen.extend(random_indexes(6, 2));
        }
        assert_eq!(seen.len(), 6);
    }
}
