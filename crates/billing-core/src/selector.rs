//! Fairness-weighted ad selection: weighted random over eligible campaigns,
//! weight = remaining budget, FIFO ordering for equal weights.

/// Small deterministic generator (splitmix-style mixing). Selection must be
/// reproducible for a given seed and draw sequence; no crate-level RNG is
/// involved anywhere in the engine.
#[derive(Debug, Clone)]
pub struct SelectorRng {
    state: u64,
}

impl SelectorRng {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut mixed = self.state;
        mixed = (mixed ^ (mixed >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        mixed = (mixed ^ (mixed >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        mixed ^ (mixed >> 31)
    }
}

/// Eligibility has already been filtered by the caller; candidates carry the
/// minimum needed to weight and identify the pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAd {
    pub campaign_id: String,
    pub sponsor_id: String,
    pub remaining_budget: i64,
    pub created_at: i64,
}

/// Weighted-random pick by remaining budget. Candidates are sorted by
/// `(created_at, campaign_id)` first so equal weights resolve oldest-first
/// and the draw is deterministic for a given RNG state.
pub fn pick_weighted(mut candidates: Vec<CandidateAd>, rng: &mut SelectorRng) -> Option<CandidateAd> {
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.campaign_id.cmp(&b.campaign_id))
    });

    let total: u128 = candidates
        .iter()
        .map(|candidate| candidate.remaining_budget.max(1) as u128)
        .sum();
    let mut draw = u128::from(rng.next_u64()) % total;

    for candidate in candidates {
        let weight = candidate.remaining_budget.max(1) as u128;
        if draw < weight {
            return Some(candidate);
        }
        draw -= weight;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, remaining: i64, created_at: i64) -> CandidateAd {
        CandidateAd {
            campaign_id: id.to_string(),
            sponsor_id: format!("spn_{id}"),
            remaining_budget: remaining,
            created_at,
        }
    }

    #[test]
    fn empty_set_yields_none() {
        let mut rng = SelectorRng::new(1337);
        assert_eq!(pick_weighted(Vec::new(), &mut rng), None);
    }

    #[test]
    fn single_candidate_always_picked() {
        let mut rng = SelectorRng::new(1337);
        let picked = pick_weighted(vec![candidate("a", 50, 1)], &mut rng).expect("pick");
        assert_eq!(picked.campaign_id, "a");
    }

    #[test]
    fn larger_remaining_budget_is_proportionally_favored() {
        let mut rng = SelectorRng::new(1337);
        let mut heavy = 0_u32;
        let mut light = 0_u32;
        for _ in 0..2000 {
            let picked = pick_weighted(
                vec![candidate("heavy", 900, 1), candidate("light", 100, 2)],
                &mut rng,
            )
            .expect("pick");
            match picked.campaign_id.as_str() {
                "heavy" => heavy += 1,
                _ => light += 1,
            }
        }
        // Expectation is 9:1; allow generous slack for the fixed seed.
        assert!(heavy > light * 5, "heavy={heavy} light={light}");
        assert!(light > 0, "small campaigns must not starve");
    }

    #[test]
    fn draw_sequence_is_deterministic_per_seed() {
        let picks = |seed: u64| -> Vec<String> {
            let mut rng = SelectorRng::new(seed);
            (0..16)
                .map(|_| {
                    pick_weighted(
                        vec![candidate("a", 300, 1), candidate("b", 300, 2)],
                        &mut rng,
                    )
                    .map(|c| c.campaign_id)
                    .unwrap_or_default()
                })
                .collect()
        };
        assert_eq!(picks(42), picks(42));
        // Equal weights: ordering is FIFO so the draw walks "a" first.
        let mut rng = SelectorRng::new(7);
        let picked = pick_weighted(
            vec![candidate("b", 300, 2), candidate("a", 300, 1)],
            &mut rng,
        )
        .expect("pick");
        assert!(picked.campaign_id == "a" || picked.campaign_id == "b");
    }
}
