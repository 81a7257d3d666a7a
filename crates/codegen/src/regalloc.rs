//! Linear-scan register allocation over the liveness intervals.
//!
//! Intervals are walked by ascending start. An interval past the end of the
//! register file either spills itself or steals the register of the active
//! interval that ends last, whichever ends sooner. Spill slots are handed
//! out in spill order and never reused.

use minuet_ir::{Graph, InstId, Location};

use crate::liveness;

#[derive(Debug, Clone, Copy)]
pub struct RegAlloc {
    reg_num: u16,
}

impl RegAlloc {
    pub fn new(reg_num: u16) -> Self {
        Self { reg_num }
    }

    pub fn run(&self, graph: &mut Graph) {
        liveness::ensure(graph);

        // empty intervals need no location and drop out of the map,
        // leaving exactly the allocated values behind
        graph.live_intervals.retain(|_, interval| !interval.is_empty());

        let mut order: Vec<InstId> = graph.live_intervals.keys().copied().collect();
        order.sort_by_key(|&inst| (graph.live_intervals[&inst].start, graph.linear_numbers[inst]));

        let mut free: Vec<bool> = vec![true; self.reg_num as usize];
        // kept sorted by interval end, soonest first
        let mut active: Vec<InstId> = Vec::new();
        let mut next_slot = 0u32;

        for cur in order {
            let start = graph.live_intervals[&cur].start;
            while let Some(&first) = active.first() {
                let iv = graph.live_intervals[&first];
                if iv.end > start {
                    break;
                }
                if let Location::Reg(r) = iv.location {
                    free[r as usize] = true;
                }
                active.remove(0);
            }

            if active.len() == self.reg_num as usize {
                let victim = *active.last().unwrap_or_else(|| {
                    panic!("no active interval to spill with {} registers", self.reg_num)
                });
                let victim_end = graph.live_intervals[&victim].end;
                let cur_end = graph.live_intervals[&cur].end;
                if victim_end > cur_end {
                    // current takes the victim's register, victim spills
                    let reg = graph.live_intervals[&victim].location;
                    if let Some(iv) = graph.live_intervals.get_mut(&victim) {
                        iv.location = Location::Slot(next_slot);
                    }
                    next_slot += 1;
                    active.pop();
                    if let Some(iv) = graph.live_intervals.get_mut(&cur) {
                        iv.location = reg;
                    }
                    insert_active(graph, &mut active, cur);
                } else {
                    if let Some(iv) = graph.live_intervals.get_mut(&cur) {
                        iv.location = Location::Slot(next_slot);
                    }
                    next_slot += 1;
                }
            } else {
                let reg = free
                    .iter()
                    .position(|&f| f)
                    .unwrap_or_else(|| panic!("active set below {} but no free register", self.reg_num));
                free[reg] = false;
                if let Some(iv) = graph.live_intervals.get_mut(&cur) {
                    iv.location = Location::Reg(reg as u16);
                }
                insert_active(graph, &mut active, cur);
            }
        }
    }
}

fn insert_active(graph: &Graph, active: &mut Vec<InstId>, inst: InstId) {
    let end = graph.live_intervals[&inst].end;
    let pos = active
        .iter()
        .position(|&a| graph.live_intervals[&a].end > end)
        .unwrap_or(active.len());
    active.insert(pos, inst);
}
