use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One edge server and its share of traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub url:    String,
    pub weight: u32,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, weight: u32) -> Self {
        Self {
            url: url.into(),
            weight,
        }
    }
}

#[derive(Debug)]
struct Cursor {
    index:  Option<usize>,
    weight: i64,
}

/// Weighted round robin over a fixed endpoint list.
///
/// A current-weight threshold steps down from the largest weight by the gcd
/// of all weights; each pass over the list returns the endpoints whose weight
/// reaches the threshold. Every cycle selects each endpoint exactly `weight /
/// gcd` times in a fixed order, so `[5, 1, 1]` yields `a a a a a b c` and
/// `[4, 2]` yields `a a b`. Zero-weight endpoints are never selected.
/// Selection is serialized per pool.
#[derive(Debug)]
pub struct WeightedRoundRobin {
    endpoints:  Vec<Endpoint>,
    gcd:        i64,
    max_weight: i64,
    cursor:     Mutex<Cursor>,
}

impl WeightedRoundRobin {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        let gcd = endpoints
            .iter()
            .map(|e| i64::from(e.weight))
            .fold(0, gcd);
        let max_weight = endpoints
            .iter()
            .map(|e| i64::from(e.weight))
            .max()
            .unwrap_or(0);
        Self {
            endpoints,
            gcd,
            max_weight,
            cursor: Mutex::new(Cursor {
                index:  None,
                weight: 0,
            }),
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] { &self.endpoints }

    /// Next endpoint, or `None` when the pool is empty or every weight is 0.
    pub fn next(&self) -> Option<&Endpoint> {
        if self.max_weight == 0 {
            return None;
        }
        let len = self.endpoints.len();
        let mut cursor = self.cursor.lock();
        loop {
            let index = cursor.index.map_or(0, |i| (i + 1) % len);
            cursor.index = Some(index);
            if index == 0 {
                cursor.weight -= self.gcd;
                if cursor.weight <= 0 {
                    cursor.weight = self.max_weight;
                }
            }
            let endpoint = &self.endpoints[index];
            if i64::from(endpoint.weight) >= cursor.weight {
                return Some(endpoint);
            }
        }
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 { a } else { gcd(b, a % b) }
}
