use crate::tree::LEAF_CAPACITY;

/// Suggested parameters for a kd-forest, produced by auto-tuning.
#[derive(Debug, Clone)]
pub struct SuggestedParams {
    pub num_trees: usize,
    pub max_comparisons: usize,
    pub estimated_recall: f64,
}

/// Estimate recall for a given forest configuration.
///
/// Model: a single randomized tree descends to the leaf that actually holds
/// a query's nearest neighbor with probability decaying in the
/// dimensionality (partition boundaries cut off true neighbors more often as
/// dimensions grow). Independent trees multiply the miss probability, and
/// the leftover comparison budget buys backtracking probes with diminished
/// success.
///
/// A budget of 0 is exhaustive search and always has recall 1.
pub fn estimate_recall(
    num_trees: usize,
    max_comparisons: usize,
    dataset_size: usize,
    dim: usize,
) -> f64 {
    if max_comparisons == 0 {
        return 1.0;
    }
    let num_trees = num_trees.max(1) as f64;

    // Descent-success probability for one tree.
    let p_descent = (8.0 / (8.0 + dim as f64)).clamp(0.02, 0.9);

    // One probe costs roughly a root-to-leaf descent plus a leaf scan.
    let cost_per_probe = (dataset_size.max(2) as f64).log2() + LEAF_CAPACITY as f64;
    let probes = (max_comparisons as f64 / cost_per_probe).max(num_trees);

    // First descent per tree, then backtracking probes at half strength.
    let extra = (probes - num_trees).max(0.0);
    let p_backtrack = p_descent * 0.5;

    let miss = (1.0 - p_descent).powf(num_trees) * (1.0 - p_backtrack).powf(extra);
    (1.0 - miss).clamp(0.0, 1.0)
}

/// Suggest forest parameters for a target recall on a dataset.
///
/// Searches tree counts and comparison budgets for the cheapest
/// configuration whose estimated recall meets the target; when no bounded
/// budget beats a plain linear scan, the suggestion falls back to exhaustive
/// search (`max_comparisons = 0`).
///
/// # Arguments
/// * `target_recall` - Desired recall in [0.5, 0.999]
/// * `dataset_size` - Expected number of points
/// * `dim` - Vector dimensionality
pub fn suggest_params(target_recall: f64, dataset_size: usize, dim: usize) -> SuggestedParams {
    let target_recall = target_recall.clamp(0.5, 0.999);
    let cost_per_probe = (dataset_size.max(2) as f64).log2() + LEAF_CAPACITY as f64;

    // Fallback: exhaustive search always meets any target.
    let mut best = SuggestedParams {
        num_trees: 4,
        max_comparisons: 0,
        estimated_recall: 1.0,
    };
    let mut best_cost = dataset_size as f64;

    for num_trees in 1..=32usize {
        for mult in [1usize, 2, 4, 8, 16, 32, 64] {
            let budget = (num_trees as f64 * cost_per_probe * mult as f64).ceil() as usize;
            if budget >= dataset_size {
                break;
            }

            let recall = estimate_recall(num_trees, budget, dataset_size, dim);
            // Comparisons dominate query cost; each tree adds frontier
            // overhead.
            let cost = budget as f64 + 2.0 * num_trees as f64;

            if recall >= target_recall && cost < best_cost {
                best_cost = cost;
                best = SuggestedParams {
                    num_trees,
                    max_comparisons: budget,
                    estimated_recall: recall,
                };
            }
        }
    }

    best
}
