//! Step batches published by the remote side.
//!
//! The region backend decodes these from the payload region; the channel
//! only transports them. Every per-agent vector is indexed the same way:
//! entry `i` of `reward` belongs to agent `agent_id[i]`.

use crate::behavior::{BehaviorSpec, ObsShape};

/// One observation tensor for a batch of agents, agent-major.
#[derive(Clone, Debug, PartialEq)]
pub struct ObsBuffer {
    /// Per-agent shape.
    pub shape: ObsShape,
    /// `agent_count * shape.product()` values.
    pub data: Vec<f32>,
}

impl ObsBuffer {
    /// An empty buffer with the given per-agent shape.
    pub fn empty(shape: ObsShape) -> Self {
        Self {
            shape,
            data: Vec::new(),
        }
    }

    /// The slice belonging to the agent at batch index `index`.
    pub fn agent(&self, index: usize) -> Option<&[f32]> {
        let stride: usize = self.shape.iter().product();
        let start = index.checked_mul(stride)?;
        self.data.get(start..start.checked_add(stride)?)
    }
}

/// Agents that requested a decision this step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecisionSteps {
    /// One buffer per observation in the behavior's spec.
    pub obs: Vec<ObsBuffer>,
    /// Reward accumulated since the previous decision.
    pub reward: Vec<f32>,
    /// Remote-side agent identifiers.
    pub agent_id: Vec<i32>,
    /// Flattened discrete action mask, `true` meaning masked out.
    pub action_mask: Option<Vec<bool>>,
}

impl DecisionSteps {
    /// A batch with no agents, shaped for `spec`.
    pub fn empty(spec: &BehaviorSpec) -> Self {
        Self {
            obs: spec
                .observation_shapes
                .iter()
                .cloned()
                .map(ObsBuffer::empty)
                .collect(),
            ..Self::default()
        }
    }

    /// Number of agents in the batch.
    pub fn len(&self) -> usize {
        self.agent_id.len()
    }

    /// Whether no agent requested a decision.
    pub fn is_empty(&self) -> bool {
        self.agent_id.is_empty()
    }

    /// Batch index of the agent with remote id `agent_id`.
    pub fn index_of(&self, agent_id: i32) -> Option<usize> {
        self.agent_id.iter().position(|&id| id == agent_id)
    }
}

/// Agents whose episode ended this step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TerminalSteps {
    /// One buffer per observation in the behavior's spec.
    pub obs: Vec<ObsBuffer>,
    /// Final reward of the episode.
    pub reward: Vec<f32>,
    /// Remote-side agent identifiers.
    pub agent_id: Vec<i32>,
    /// `true` if the episode was cut short rather than reaching a terminal state.
    pub interrupted: Vec<bool>,
}

impl TerminalSteps {
    /// A batch with no agents, shaped for `spec`.
    pub fn empty(spec: &BehaviorSpec) -> Self {
        Self {
            obs: spec
                .observation_shapes
                .iter()
                .cloned()
                .map(ObsBuffer::empty)
                .collect(),
            ..Self::default()
        }
    }

    /// Number of agents in the batch.
    pub fn len(&self) -> usize {
        self.agent_id.len()
    }

    /// Whether no episode ended.
    pub fn is_empty(&self) -> bool {
        self.agent_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::ActionSpec;
    use smallvec::smallvec;

    fn spec() -> BehaviorSpec {
        BehaviorSpec {
            observation_shapes: vec![smallvec![3], smallvec![2, 2]],
            action_spec: ActionSpec::continuous(1),
        }
    }

    #[test]
    fn empty_batches_follow_spec_shapes() {
        let d = DecisionSteps::empty(&spec());
        assert!(d.is_empty());
        assert_eq!(d.obs.len(), 2);
        assert_eq!(d.obs[1].shape.as_slice(), &[2, 2]);
        let t = TerminalSteps::empty(&spec());
        assert_eq!(t.len(), 0);
        assert_eq!(t.obs.len(), 2);
    }

    #[test]
    fn agent_index_past_address_space_is_none() {
        let buf = ObsBuffer {
            shape: smallvec![1],
            data: vec![0.0; 4],
        };
        assert_eq!(buf.agent(usize::MAX), None);
    }

    #[test]
    fn agent_slice_uses_shape_stride() {
        let buf = ObsBuffer {
            shape: smallvec![3],
            data: vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0],
        };
        assert_eq!(buf.agent(1), Some(&[10.0, 11.0, 12.0][..]));
        assert_eq!(buf.agent(2), None);
        assert_eq!(buf.agent(usize::MAX / 3), None);
    }

    #[test]
    fn index_of_finds_agent() {
        let d = DecisionSteps {
            agent_id: vec![7, 3, 9],
            ..DecisionSteps::default()
        };
        assert_eq!(d.index_of(3), Some(1));
        assert_eq!(d.index_of(4), None);
        assert_eq!(d.len(), 3);
    }
}
