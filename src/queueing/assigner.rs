//! Counter selection strategies for incoming customers

use crate::types::Counter;

/// One counter together with its live queue occupancy at selection time
#[derive(Debug, Clone)]
pub struct CounterLoad {
    pub counter: Counter,
    /// Customers currently waiting, serving, or delayed at this counter
    pub queue_length: usize,
}

/// Strategy for picking the counter a joining customer is assigned to.
///
/// Implementations receive the company's active counters sorted by counter
/// number ascending and must pick one of them, or `None` when the slice is
/// empty.
pub trait CounterAssigner: Send + Sync {
    fn assign<'a>(&self, loads: &'a [CounterLoad]) -> Option<&'a CounterLoad>;
}

/// Assigns customers to the active counter with the fewest live customers.
///
/// Ties go to the lowest counter number, which is the first candidate in the
/// input ordering.
#[derive(Debug, Default)]
pub struct ShortestQueueAssigner;

impl ShortestQueueAssigner {
    pub fn new() -> Self {
        Self
    }
}

impl CounterAssigner for ShortestQueueAssigner {
    fn assign<'a>(&self, loads: &'a [CounterLoad]) -> Option<&'a CounterLoad> {
        let mut best: Option<&CounterLoad> = None;
        for load in loads {
            // Strict comparison keeps the earliest candidate on ties
            if best.map_or(true, |b| load.queue_length < b.queue_length) {
                best = Some(load);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_id;

    fn load(number: u32, queue_length: usize) -> CounterLoad {
        CounterLoad {
            counter: Counter {
                id: generate_id(),
                company_id: generate_id(),
                number,
                is_active: true,
            },
            queue_length,
        }
    }

    #[test]
    fn test_picks_shortest_queue() {
        let assigner = ShortestQueueAssigner::new();
        let loads = vec![load(1, 3), load(2, 1), load(3, 2)];

        let chosen = assigner.assign(&loads).unwrap();
        assert_eq!(chosen.counter.number, 2);
    }

    #[test]
    fn test_tie_goes_to_lowest_counter_number() {
        let assigner = ShortestQueueAssigner::new();
        let loads = vec![load(1, 2), load(2, 2), load(3, 2)];

        let chosen = assigner.assign(&loads).unwrap();
        assert_eq!(chosen.counter.number, 1);
    }

    #[test]
    fn test_empty_input_yields_none() {
        let assigner = ShortestQueueAssigner::new();
        assert!(assigner.assign(&[]).is_none());
    }
}
