//! Reusable behavior specs and step batches.
//!
//! - [`walker_spec`]: one vector observation, continuous actions.
//! - [`grid_spec`]: a visual and a vector observation, discrete actions.
//! - [`decisions_for`] / [`terminals_for`]: batches with deterministic
//!   observation values derived from the agent ids.

use smallvec::smallvec;
use tether_core::{ActionSpec, BehaviorSpec, DecisionSteps, ObsBuffer, TerminalSteps};

/// 8-float vector observation, 2 continuous actions.
pub fn walker_spec() -> BehaviorSpec {
    BehaviorSpec {
        observation_shapes: vec![smallvec![8]],
        action_spec: ActionSpec::continuous(2),
    }
}

/// 5x5x1 visual plus 3-float vector observation, branches of 4 and 2.
pub fn grid_spec() -> BehaviorSpec {
    BehaviorSpec {
        observation_shapes: vec![smallvec![5, 5, 1], smallvec![3]],
        action_spec: ActionSpec::discrete([4, 2]),
    }
}

fn observations(spec: &BehaviorSpec, agent_ids: &[i32]) -> Vec<ObsBuffer> {
    spec.observation_shapes
        .iter()
        .map(|shape| {
            let stride: usize = shape.iter().product();
            let data = agent_ids
                .iter()
                .flat_map(|&id| (0..stride).map(move |i| id as f32 + i as f32 / 100.0))
                .collect();
            ObsBuffer {
                shape: shape.clone(),
                data,
            }
        })
        .collect()
}

/// Decision batch for `agent_ids`, reward `0.1 * id`.
pub fn decisions_for(spec: &BehaviorSpec, agent_ids: &[i32]) -> DecisionSteps {
    DecisionSteps {
        obs: observations(spec, agent_ids),
        reward: agent_ids.iter().map(|&id| id as f32 * 0.1).collect(),
        agent_id: agent_ids.to_vec(),
        action_mask: None,
    }
}

/// Terminal batch for `agent_ids`, reward `-1`, none interrupted.
pub fn terminals_for(spec: &BehaviorSpec, agent_ids: &[i32]) -> TerminalSteps {
    TerminalSteps {
        obs: observations(spec, agent_ids),
        reward: vec![-1.0; agent_ids.len()],
        agent_id: agent_ids.to_vec(),
        interrupted: vec![false; agent_ids.len()],
    }
}
