//! CART classification trees and a bagged random forest
//!
//! Trees split on `feature <= threshold` using Gini impurity. Thresholds are
//! midpoints between consecutive distinct values. At each node features are
//! visited in random order until `max_features` non-constant ones have been
//! examined. The forest trains every tree on a bootstrap sample (drawn with
//! replacement) and averages the leaf class fractions.

use super::{check_matrix, Matrix, ModelError};
use crate::config::ForestConfig;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        /// Fraction of positive samples that reached this leaf
        positive: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Tree growth limits
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_features: usize,
    pub min_samples_split: usize,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    /// Grow a tree over the rows listed in `sample` (duplicates allowed)
    pub fn fit(
        x: &[Vec<f64>],
        y: &[bool],
        sample: Vec<usize>,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut features: Vec<usize> = (0..n_features).collect();
        let mut nodes = vec![Node::Leaf { positive: 0.0 }];
        let mut stack = vec![(0usize, sample, 0usize)];

        while let Some((slot, indices, depth)) = stack.pop() {
            let total = indices.len();
            let positives = indices.iter().filter(|&&i| y[i]).count();
            let positive = if total == 0 {
                0.0
            } else {
                positives as f64 / total as f64
            };

            let pure = positives == 0 || positives == total;
            let too_small = total < params.min_samples_split;
            let too_deep = params.max_depth.map_or(false, |d| depth >= d);
            if pure || too_small || too_deep {
                nodes[slot] = Node::Leaf { positive };
                continue;
            }

            features.shuffle(rng);
            let best = best_split(x, y, &indices, &features, params.max_features);

            let Some(best) = best else {
                nodes[slot] = Node::Leaf { positive };
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[i][best.feature] <= best.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { positive: 0.0 });
            nodes.push(Node::Leaf { positive: 0.0 });
            nodes[slot] = Node::Split {
                feature: best.feature,
                threshold: best.threshold,
                left,
                right,
            };

            stack.push((right, right_rows, depth + 1));
            stack.push((left, left_rows, depth + 1));
        }

        Self { nodes }
    }

    /// Positive-class probability for one row
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { positive } => return *positive,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

fn best_split(
    x: &[Vec<f64>],
    y: &[bool],
    indices: &[usize],
    features: &[usize],
    max_features: usize,
) -> Option<BestSplit> {
    let total = indices.len();
    let total_pos = indices.iter().filter(|&&i| y[i]).count();
    let mut best: Option<BestSplit> = None;
    let mut examined = 0;

    for &feature in features {
        if examined >= max_features {
            break;
        }

        let mut column: Vec<(f64, bool)> = indices.iter().map(|&i| (x[i][feature], y[i])).collect();
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (first, last) = (column[0].0, column[total - 1].0);
        if first == last {
            continue;
        }
        examined += 1;

        let mut left_pos = 0;
        for k in 1..total {
            if column[k - 1].1 {
                left_pos += 1;
            }
            let (lo, hi) = (column[k - 1].0, column[k].0);
            if lo == hi {
                continue;
            }

            let left_n = k;
            let right_n = total - k;
            let impurity = (left_n as f64 * gini(left_pos, left_n)
                + right_n as f64 * gini(total_pos - left_pos, right_n))
                / total as f64;

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = (lo + hi) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(BestSplit {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
    }

    best
}

/// `max(1, floor(sqrt(n_features)))`
pub fn default_max_features(n_features: usize) -> usize {
    ((n_features as f64).sqrt().floor() as usize).max(1)
}

/// Bagged ensemble of [`DecisionTree`]s
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Fit on `x`/`y`; needs at least one row of each class
    pub fn fit(x: &[Vec<f64>], y: &[bool], config: &ForestConfig) -> Result<Self, ModelError> {
        if x.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        if x.len() != y.len() {
            return Err(ModelError::LabelMismatch {
                rows: x.len(),
                labels: y.len(),
            });
        }
        let n_features = x[0].len();
        check_matrix(x, n_features)?;

        let positives = y.iter().filter(|&&v| v).count();
        if positives == 0 || positives == y.len() {
            return Err(ModelError::SingleClass);
        }

        let params = TreeParams {
            max_features: default_max_features(n_features),
            min_samples_split: config.min_samples_split.max(2),
            max_depth: config.max_depth,
        };

        let mut rng = StdRng::seed_from_u64(config.seed);
        let n = x.len();
        let trees = (0..config.n_trees.max(1))
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, y, sample, &params, &mut rng)
            })
            .collect();

        Ok(Self { trees, n_features })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean positive-class probability across trees, one per row
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        check_matrix(x, self.n_features)?;
        let n_trees = self.trees.len() as f64;
        Ok(x.iter()
            .map(|row| {
                let sum: f64 = self.trees.iter().map(|t| t.predict_proba(row)).sum();
                (sum / n_trees).clamp(0.0, 1.0)
            })
            .collect())
    }

    /// Positive when the probability exceeds one half
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<bool>, ModelError> {
        Ok(self.predict_proba(x)?.into_iter().map(|p| p > 0.5).collect())
    }
}

/// Fit on the training split, report accuracy on the held-out split
pub fn fit_and_score(
    x: &Matrix,
    y: &[bool],
    config: &ForestConfig,
) -> Result<(RandomForest, f64), ModelError> {
    let split = super::train_test_split(x.len(), config.test_fraction, config.seed)?;
    let x_train = super::take_rows(x, &split.train);
    let y_train = super::take_rows(y, &split.train);
    let x_test = super::take_rows(x, &split.test);
    let y_test = super::take_rows(y, &split.test);

    let forest = RandomForest::fit(&x_train, &y_train, config)?;
    let predicted = forest.predict(&x_test)?;
    Ok((forest, super::accuracy(&predicted, &y_test)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ModelError;

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_trees: 15,
            ..ForestConfig::default()
        }
    }

    /// Label is `x0 > 5`; x1 is noise
    fn separable(n: usize) -> (Matrix, Vec<bool>) {
        let x: Matrix = (0..n)
            .map(|i| vec![(i % 11) as f64, ((i * 7) % 3) as f64])
            .collect();
        let y = x.iter().map(|r| r[0] > 5.0).collect();
        (x, y)
    }

    #[test]
    fn test_single_tree_learns_threshold() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0], vec![10.0], vec![11.0]];
        let y = vec![false, false, false, true, true];
        let params = TreeParams {
            max_features: 1,
            min_samples_split: 2,
            max_depth: None,
        };
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &y, (0..5).collect(), &params, &mut rng);

        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.predict_proba(&[2.5]), 0.0);
        // split at the midpoint between 3 and 10
        assert_eq!(tree.predict_proba(&[6.5]), 0.0);
        assert_eq!(tree.predict_proba(&[7.0]), 1.0);
        assert_eq!(tree.predict_proba(&[100.0]), 1.0);
    }

    #[test]
    fn test_constant_features_make_a_leaf() {
        let x = vec![vec![1.0], vec![1.0], vec![1.0], vec![1.0]];
        let y = vec![true, false, true, true];
        let params = TreeParams {
            max_features: 1,
            min_samples_split: 2,
            max_depth: None,
        };
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &y, (0..4).collect(), &params, &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_proba(&[1.0]), 0.75);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let (x, y) = separable(40);
        let params = TreeParams {
            max_features: 2,
            min_samples_split: 2,
            max_depth: Some(1),
        };
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &y, (0..40).collect(), &params, &mut rng);
        assert!(tree.node_count() <= 3);
    }

    #[test]
    fn test_forest_is_deterministic_and_accurate() {
        let (x, y) = separable(60);
        let a = RandomForest::fit(&x, &y, &small_config()).unwrap();
        let b = RandomForest::fit(&x, &y, &small_config()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_trees(), 15);

        let proba = a.predict_proba(&[vec![0.0, 1.0], vec![10.0, 1.0]]).unwrap();
        assert!(proba[0] < 0.5);
        assert!(proba[1] > 0.5);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_forest_rejects_single_class() {
        let x = vec![vec![1.0], vec![2.0]];
        assert_eq!(
            RandomForest::fit(&x, &[true, true], &small_config()),
            Err(ModelError::SingleClass)
        );
        assert_eq!(
            RandomForest::fit(&[], &[], &small_config()),
            Err(ModelError::EmptyDataset)
        );
    }

    #[test]
    fn test_predict_checks_shape_and_finiteness() {
        let (x, y) = separable(30);
        let forest = RandomForest::fit(&x, &y, &small_config()).unwrap();
        assert!(matches!(
            forest.predict_proba(&[vec![1.0]]),
            Err(ModelError::ShapeMismatch { expected: 2, found: 1 })
        ));
        assert!(matches!(
            forest.predict_proba(&[vec![f64::NAN, 1.0]]),
            Err(ModelError::NonFinite { row: 0, column: 0 })
        ));
    }

    #[test]
    fn test_fit_and_score() {
        let (x, y) = separable(80);
        let (forest, accuracy) = fit_and_score(&x, &y, &small_config()).unwrap();
        assert_eq!(forest.n_features(), 2);
        assert!(accuracy > 0.8, "accuracy {}", accuracy);
    }

    #[test]
    fn test_default_max_features() {
        assert_eq!(default_max_features(1), 1);
        assert_eq!(default_max_features(4), 2);
        assert_eq!(default_max_features(10), 3);
        assert_eq!(default_max_features(0), 1);
    }
}
