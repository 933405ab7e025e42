//! Behavior specifications and action batches.
//!
//! A behavior is a named agent role. Its [`BehaviorSpec`] is the shape
//! contract both sides agree on: the observation tensors the remote side
//! publishes per agent, and the actions it expects back.

use indexmap::IndexMap;
use smallvec::SmallVec;

/// Per-agent shape of one observation tensor.
pub type ObsShape = SmallVec<[usize; 4]>;

/// Behavior name to spec, in registration order.
pub type BehaviorSpecs = IndexMap<String, BehaviorSpec>;

/// Shape contract for one behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BehaviorSpec {
    /// Per-agent shape of each observation, in sensor order.
    pub observation_shapes: Vec<ObsShape>,
    /// Actions the remote side expects for each agent.
    pub action_spec: ActionSpec,
}

impl BehaviorSpec {
    /// Number of `f32` elements one agent contributes to each observation.
    pub fn observation_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.observation_shapes
            .iter()
            .map(|shape| shape.iter().product())
    }
}

/// Action layout: a continuous vector, a set of discrete branches, or both.
///
/// # Examples
///
/// ```
/// use tether_core::ActionSpec;
///
/// let spec = ActionSpec::discrete([3, 2]);
/// assert!(spec.is_discrete());
/// assert_eq!(spec.discrete_size(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionSpec {
    /// Length of the continuous action vector per agent.
    pub continuous_size: usize,
    /// Number of choices in each discrete branch.
    pub discrete_branches: SmallVec<[usize; 4]>,
}

impl ActionSpec {
    /// Purely continuous actions of length `size`.
    pub fn continuous(size: usize) -> Self {
        Self {
            continuous_size: size,
            discrete_branches: SmallVec::new(),
        }
    }

    /// Purely discrete actions with the given branch sizes.
    pub fn discrete(branches: impl IntoIterator<Item = usize>) -> Self {
        Self {
            continuous_size: 0,
            discrete_branches: branches.into_iter().collect(),
        }
    }

    /// Whether the spec has a continuous component.
    pub fn is_continuous(&self) -> bool {
        self.continuous_size > 0
    }

    /// Whether the spec has a discrete component.
    pub fn is_discrete(&self) -> bool {
        !self.discrete_branches.is_empty()
    }

    /// Number of discrete branches.
    pub fn discrete_size(&self) -> usize {
        self.discrete_branches.len()
    }

    /// Check that `batch` has the layout this spec describes.
    ///
    /// Returns a description of the first mismatch found.
    pub fn check_batch(&self, batch: &ActionBatch) -> Result<(), String> {
        let n = batch.agent_count;
        let overflow = || format!("agent count {n} overflows the action layout");
        let continuous = n.checked_mul(self.continuous_size).ok_or_else(overflow)?;
        if batch.continuous.len() != continuous {
            return Err(format!(
                "expected {continuous} continuous values for {n} agents, got {}",
                batch.continuous.len()
            ));
        }
        let branches = self.discrete_size();
        let discrete = n.checked_mul(branches).ok_or_else(overflow)?;
        if batch.discrete.len() != discrete {
            return Err(format!(
                "expected {discrete} discrete values for {n} agents, got {}",
                batch.discrete.len()
            ));
        }
        if branches > 0 {
            for (i, &choice) in batch.discrete.iter().enumerate() {
                let limit = self.discrete_branches[i % branches];
                if choice < 0 || choice as usize >= limit {
                    return Err(format!(
                        "discrete value {choice} out of range for branch {} of size {limit}",
                        i % branches
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Actions for every agent of one behavior, agent-major.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionBatch {
    /// Number of agents the batch covers.
    pub agent_count: usize,
    /// `agent_count * continuous_size` values.
    pub continuous: Vec<f32>,
    /// `agent_count * discrete_size` branch choices.
    pub discrete: Vec<i32>,
}

impl ActionBatch {
    /// A batch with only continuous actions.
    pub fn continuous(agent_count: usize, values: Vec<f32>) -> Self {
        Self {
            agent_count,
            continuous: values,
            discrete: Vec::new(),
        }
    }

    /// A batch with only discrete actions.
    pub fn discrete(agent_count: usize, choices: Vec<i32>) -> Self {
        Self {
            agent_count,
            continuous: Vec::new(),
            discrete: choices,
        }
    }

    /// A batch covering no agents.
    pub fn empty() -> Self {
        Self::default()
    }
}
