//! Trainer-side region handles over a [`SegmentStore`].

use tether_core::{
    ActionBatch, BehaviorSpecs, CollisionCheck, ControlBlock, DecisionSteps, Generation,
    OpenMode, PayloadLayout, PayloadRegion, RegionError, RegionProvider, SessionId,
    TerminalSteps, VersionMismatch,
};

use crate::store::{ControlSegment, PayloadSegment, SegmentStore, PROTOCOL_VERSION};

/// Control block handle backed by a [`SegmentStore`].
///
/// Reads through a detached handle, or of a removed segment, see an
/// inactive, unblocked, zero-sized block.
pub struct InProcessControl {
    store: SegmentStore,
    name: String,
    attached: bool,
}

impl InProcessControl {
    /// Name of the underlying segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn read<T: Default>(&self, f: impl FnOnce(&ControlSegment) -> T) -> T {
        if !self.attached {
            return T::default();
        }
        self.store
            .with_control(&self.name, |segment| f(segment))
            .unwrap_or_default()
    }

    fn write(&mut self, f: impl FnOnce(&mut ControlSegment)) -> Result<(), RegionError> {
        if !self.attached {
            return Err(RegionError::Detached {
                name: self.name.clone(),
            });
        }
        if self.store.control_writes_fail() {
            return Err(RegionError::AttachFailed {
                name: self.name.clone(),
                reason: "injected write failure".into(),
            });
        }
        self.store
            .with_control(&self.name, f)
            .ok_or_else(|| RegionError::Detached {
                name: self.name.clone(),
            })
    }
}

impl ControlBlock for InProcessControl {
    fn is_active(&self) -> bool {
        self.read(|c| c.active)
    }

    fn is_blocked(&self) -> bool {
        self.read(|c| c.trainer_blocked)
    }

    fn mark_blocked(&mut self) -> Result<(), RegionError> {
        self.write(|c| c.trainer_blocked = true)
    }

    fn request_reset(&mut self) -> Result<(), RegionError> {
        self.write(|c| c.reset_requested = true)
    }

    fn unblock_peer(&mut self) -> Result<(), RegionError> {
        self.write(|c| c.peer_blocked = false)
    }

    fn side_channel_capacity(&self) -> usize {
        self.read(|c| c.side_channel_capacity)
    }

    fn set_side_channel_capacity(&mut self, capacity: usize) -> Result<(), RegionError> {
        self.write(|c| c.side_channel_capacity = capacity)
    }

    fn rl_data_capacity(&self) -> usize {
        self.read(|c| c.rl_data_capacity)
    }

    fn generation(&self) -> Generation {
        self.read(|c| c.generation)
    }

    fn set_generation(&mut self, generation: Generation) -> Result<(), RegionError> {
        self.write(|c| c.generation = generation)
    }

    fn check_protocol_version(&self) -> Result<(), VersionMismatch> {
        let found = self.read(|c| c.version);
        if found == PROTOCOL_VERSION {
            Ok(())
        } else {
            Err(VersionMismatch {
                expected: PROTOCOL_VERSION,
                found,
            })
        }
    }

    fn close(&mut self) {
        self.attached = false;
    }

    fn destroy(&mut self) -> Result<(), RegionError> {
        self.attached = false;
        self.store.remove_control(&self.name);
        Ok(())
    }
}

/// Payload region handle backed by a [`SegmentStore`].
pub struct InProcessPayload {
    store: SegmentStore,
    name: String,
    generation: Generation,
    attached: bool,
}

impl InProcessPayload {
    /// Name of the underlying segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Generation this handle was opened at.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether the handle is still mapped.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    fn with<T>(
        &self,
        f: impl FnOnce(&mut PayloadSegment) -> Result<T, RegionError>,
    ) -> Result<T, RegionError> {
        if !self.attached {
            return Err(RegionError::Detached {
                name: self.name.clone(),
            });
        }
        self.store
            .with_payload(&self.name, f)
            .unwrap_or_else(|| {
                Err(RegionError::Detached {
                    name: self.name.clone(),
                })
            })
    }
}

impl PayloadRegion for InProcessPayload {
    fn read_side_channel(&self) -> Result<Vec<u8>, RegionError> {
        self.with(|p| p.read_side_channel())
    }

    fn write_side_channel(&mut self, data: &[u8]) -> Result<(), RegionError> {
        self.with(|p| p.write_side_channel(data))
    }

    fn decision_steps(&self, key: &str) -> Result<DecisionSteps, RegionError> {
        self.with(|p| {
            p.behaviors
                .get(key)
                .map(|b| b.decisions.clone())
                .ok_or_else(|| RegionError::UnknownBehavior { key: key.into() })
        })
    }

    fn terminal_steps(&self, key: &str) -> Result<TerminalSteps, RegionError> {
        self.with(|p| {
            p.behaviors
                .get(key)
                .map(|b| b.terminals.clone())
                .ok_or_else(|| RegionError::UnknownBehavior { key: key.into() })
        })
    }

    fn pending_decision_count(&self, key: &str) -> Result<usize, RegionError> {
        self.with(|p| {
            p.behaviors
                .get(key)
                .map(|b| b.decisions.len())
                .ok_or_else(|| RegionError::UnknownBehavior { key: key.into() })
        })
    }

    fn set_actions(&mut self, key: &str, actions: &ActionBatch) -> Result<(), RegionError> {
        self.with(|p| {
            let behavior = p
                .behaviors
                .get_mut(key)
                .ok_or_else(|| RegionError::UnknownBehavior { key: key.into() })?;
            behavior
                .spec
                .action_spec
                .check_batch(actions)
                .map_err(|reason| RegionError::ActionShape {
                    key: key.into(),
                    reason,
                })?;
            behavior.actions = Some(actions.clone());
            Ok(())
        })
    }

    fn behavior_count(&self) -> usize {
        self.with(|p| Ok(p.behaviors.len())).unwrap_or(0)
    }

    fn behavior_specs(&self) -> Result<BehaviorSpecs, RegionError> {
        self.with(|p| {
            Ok(p.behaviors
                .iter()
                .map(|(name, b)| (name.clone(), b.spec.clone()))
                .collect())
        })
    }

    fn close(&mut self) {
        self.attached = false;
    }

    fn destroy(&mut self) -> Result<(), RegionError> {
        self.attached = false;
        self.store.remove_payload(&self.name);
        Ok(())
    }
}

/// [`RegionProvider`] allocating segments in a [`SegmentStore`].
///
/// New control blocks start with the peer active and blocked, as if the
/// simulation had attached and initialized before the first handoff.
#[derive(Clone, Default)]
pub struct InProcessProvider {
    store: SegmentStore,
}

impl InProcessProvider {
    /// A provider over `store`.
    pub fn new(store: SegmentStore) -> Self {
        Self { store }
    }

    /// The namespace this provider allocates in.
    pub fn store(&self) -> &SegmentStore {
        &self.store
    }
}

impl CollisionCheck for InProcessProvider {
    fn is_taken(&self, identity: &SessionId) -> bool {
        self.store.contains(identity.as_str())
    }
}

impl RegionProvider for InProcessProvider {
    type Control = InProcessControl;
    type Payload = InProcessPayload;

    fn create_control(
        &mut self,
        identity: &SessionId,
        layout: PayloadLayout,
    ) -> Result<InProcessControl, RegionError> {
        let name = identity.as_str();
        self.store.insert_control(name, ControlSegment::new(layout))?;
        Ok(InProcessControl {
            store: self.store.clone(),
            name: name.into(),
            attached: true,
        })
    }

    fn open_payload(
        &mut self,
        identity: &SessionId,
        generation: Generation,
        mode: OpenMode<'_, InProcessPayload>,
        layout: PayloadLayout,
    ) -> Result<InProcessPayload, RegionError> {
        let name = identity.payload_name(generation);
        if self.store.take_payload_failure() {
            return Err(RegionError::CreateFailed {
                name,
                reason: "injected failure".into(),
            });
        }
        match mode {
            OpenMode::Create { migrate_from } => {
                let mut segment = PayloadSegment::new(layout);
                if let Some(source) = migrate_from {
                    if let Some(behaviors) = self
                        .store
                        .with_payload(source.name(), |p| p.behaviors.clone())
                    {
                        segment.behaviors = behaviors;
                    }
                }
                self.store.insert_payload(&name, segment)?;
            }
            OpenMode::Attach => {
                // Intermediate generations keep the capacity they were
                // created with, so only existence is checked.
                if !self.store.contains_payload(&name) {
                    return Err(RegionError::AttachFailed {
                        name,
                        reason: "no such region".into(),
                    });
                }
            }
        }
        Ok(InProcessPayload {
            store: self.store.clone(),
            name,
            generation,
            attached: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(capacity: usize) -> PayloadLayout {
        PayloadLayout {
            side_channel_capacity: capacity,
            rl_data_capacity: 0,
        }
    }

    #[test]
    fn control_starts_active_and_unblocked() {
        let mut provider = InProcessProvider::default();
        let control = provider
            .create_control(&SessionId::new("s"), layout(4))
            .unwrap();
        assert!(control.is_active());
        assert!(!control.is_blocked());
        assert_eq!(control.generation(), Generation(0));
        assert_eq!(control.side_channel_capacity(), 4);
        assert!(control.check_protocol_version().is_ok());
    }

    #[test]
    fn closed_control_reads_inactive_and_rejects_writes() {
        let mut provider = InProcessProvider::default();
        let mut control = provider
            .create_control(&SessionId::new("s"), layout(4))
            .unwrap();
        control.close();
        assert!(!control.is_active());
        assert!(matches!(
            control.mark_blocked(),
            Err(RegionError::Detached { .. })
        ));
        // Closing keeps the segment; destroying removes it.
        assert!(provider.store().contains_control("s"));
        control.destroy().unwrap();
        assert!(!provider.store().contains_control("s"));
    }

    #[test]
    fn attach_requires_existing_region() {
        let mut provider = InProcessProvider::default();
        let err = provider
            .open_payload(&SessionId::new("s"), Generation(1), OpenMode::Attach, layout(4))
            .err()
            .unwrap();
        assert!(matches!(err, RegionError::AttachFailed { .. }));
    }

    #[test]
    fn create_migrates_behaviors() {
        let store = SegmentStore::new();
        let mut provider = InProcessProvider::new(store.clone());
        let id = SessionId::new("s");
        let first = provider
            .open_payload(&id, Generation(0), OpenMode::Create { migrate_from: None }, layout(4))
            .unwrap();
        store.with_payload("s", |p| {
            p.behaviors.insert(
                "b".into(),
                crate::store::BehaviorData::new(crate::fixtures::walker_spec()),
            );
        });
        let second = provider
            .open_payload(
                &id,
                Generation(1),
                OpenMode::Create {
                    migrate_from: Some(&first),
                },
                layout(64),
            )
            .unwrap();
        assert_eq!(second.behavior_count(), 1);
        assert_eq!(second.name(), "s_");
        assert_eq!(second.read_side_channel().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn destroyed_payload_is_detached() {
        let mut provider = InProcessProvider::default();
        let mut payload = provider
            .open_payload(
                &SessionId::new("s"),
                Generation(0),
                OpenMode::Create { migrate_from: None },
                layout(16),
            )
            .unwrap();
        payload.destroy().unwrap();
        assert!(!payload.is_attached());
        assert!(matches!(
            payload.read_side_channel(),
            Err(RegionError::Detached { .. })
        ));
        assert!(payload.destroy().is_ok());
    }
}
