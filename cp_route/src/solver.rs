//! Bitmask dynamic program over (visited-set, last-checkpoint) states.
//!
//! The stored value for a state is the earliest minute one can be ready to
//! depart its last checkpoint (arrival, plus any wait for an open slot, plus
//! dwell) having visited exactly the checkpoints in the mask. Masks are swept
//! in increasing popcount order, so a layer is complete before anything
//! extends it.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;

use crate::{Instance, Solution};

/// Predecessor link for a recorded state. `Unset` marks states never reached;
/// it is distinct from `FromStart`, which marks a first-leg state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Parent {
    Unset,
    FromStart,
    Step { mask: u32, last: u8 },
}

pub(crate) struct Tables {
    pub(crate) n: usize,
    pub(crate) dp: Vec<f64>,
    pub(crate) parent: Vec<Parent>,
}

impl Tables {
    pub(crate) fn index(&self, mask: u32, last: usize) -> usize {
        mask as usize * self.n + last
    }
}

/// Would a hiker ready to leave `at` still make an open Finish slot by the
/// cutoff? The sweep refuses to record any state failing this, which keeps
/// the frontier small and makes every recorded state a candidate terminal.
pub(crate) fn can_reach_finish(instance: &Instance, depart: f64, at: usize) -> bool {
    let arrival = depart + instance.travel[at][instance.finish_idx()];
    if arrival > instance.end_minute {
        return false;
    }
    match instance.next_finish_slot(arrival) {
        Some((_, finish)) => finish <= instance.end_minute,
        None => false,
    }
}

pub(crate) fn sweep(instance: &Instance) -> Tables {
    let n = instance.checkpoint_count();
    let idx = |mask: u32, last: usize| mask as usize * n + last;

    let mut dp = vec![f64::INFINITY; (1usize << n) * n];
    let mut parent = vec![Parent::Unset; (1usize << n) * n];

    // Seed layer: Start to each intermediate.
    for j in 0..n {
        let arrive = instance.start_minute + instance.travel[instance.start_idx()][j];
        let Some((_, open_at)) = instance.next_open_slot(j, arrive) else {
            continue;
        };
        let depart = open_at + instance.dwell_min;
        if depart > instance.end_minute || !can_reach_finish(instance, depart, j) {
            continue;
        }
        let si = idx(1 << j, j);
        if depart < dp[si] {
            dp[si] = depart;
            parent[si] = Parent::FromStart;
        }
    }

    // Masks grouped by popcount. Only masks that actually received a finite
    // entry are enumerated, and each layer is deduplicated before iteration.
    let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); n + 1];
    for j in 0..n {
        if dp[idx(1 << j, j)].is_finite() {
            buckets[1].push(1 << j);
        }
    }

    for pc in 1..n {
        let mut layer = std::mem::take(&mut buckets[pc]);
        layer.sort_unstable();
        layer.dedup();
        for &mask in &layer {
            for last in 0..n {
                if mask & (1 << last) == 0 {
                    continue;
                }
                let depart_last = dp[idx(mask, last)];
                if !depart_last.is_finite() {
                    continue;
                }
                for j in 0..n {
                    if mask & (1 << j) != 0 {
                        continue;
                    }
                    let arrive = depart_last + instance.travel[last][j];
                    if arrive > instance.end_minute {
                        continue;
                    }
                    let Some((_, open_at)) = instance.next_open_slot(j, arrive) else {
                        continue;
                    };
                    let depart = open_at + instance.dwell_min;
                    if depart > instance.end_minute || !can_reach_finish(instance, depart, j) {
                        continue;
                    }
                    let next = mask | (1 << j);
                    let si = idx(next, j);
                    if depart < dp[si] {
                        dp[si] = depart;
                        parent[si] = Parent::Step {
                            mask,
                            last: last as u8,
                        };
                        buckets[pc + 1].push(next);
                    }
                }
            }
        }
    }

    Tables { n, dp, parent }
}

/// Scan every recorded state for the best admissible terminal: maximum
/// visited count, then earliest actual Finish arrival. First hit wins ties,
/// so the result is deterministic for the fixed mask/checkpoint order.
pub(crate) fn extract(instance: &Instance, tables: &Tables) -> Solution {
    let n = tables.n;
    let mut best: Option<(u32, usize, f64)> = None;
    let mut best_key = (0u32, Reverse(OrderedFloat(f64::INFINITY)));
    for mask in 1..(1u32 << n) {
        for last in 0..n {
            let depart = tables.dp[tables.index(mask, last)];
            if !depart.is_finite() {
                continue;
            }
            let arrive = depart + instance.travel[last][instance.finish_idx()];
            if arrive > instance.end_minute {
                continue;
            }
            let Some((_, finish)) = instance.next_finish_slot(arrive) else {
                continue;
            };
            if finish > instance.end_minute {
                continue;
            }
            let key = (mask.count_ones(), Reverse(OrderedFloat(finish)));
            if key > best_key {
                best_key = key;
                best = Some((mask, last, finish));
            }
        }
    }

    let Some((best_mask, best_last, best_finish)) = best else {
        return Solution::default();
    };

    let mut order = Vec::with_capacity(best_mask.count_ones() as usize);
    let mut mask = best_mask;
    let mut last = best_last;
    loop {
        order.push(last);
        match tables.parent[tables.index(mask, last)] {
            Parent::FromStart => break,
            Parent::Step {
                mask: prev_mask,
                last: prev_last,
            } => {
                mask = prev_mask;
                last = prev_last as usize;
            }
            // A recorded state always carries a parent tag.
            Parent::Unset => break,
        }
    }
    order.reverse();

    Solution {
        count: best_mask.count_ones() as usize,
        route: order.iter().map(|&i| instance.names[i].clone()).collect(),
        finish_minute: Some(best_finish),
    }
}

pub(crate) fn run(instance: &Instance) -> Solution {
    let tables = sweep(instance);
    extract(instance, &tables)
}
