use std::collections::VecDeque;

use super::{ActorId, Blob, BlobMap, Regst, RegstDescId, RegstId};
use crate::{ActorErr, Result, config::RegstDescSpec};

/// Where a register of a pool currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Waiting in the pool to be acquired.
    Free,
    /// Acquired by the producer, who may write it.
    Held,
    /// Sent to `readers` consumers that haven't returned it yet.
    InFlight { readers: usize },
}

/// The producer side set of registers of a single descriptor.
///
/// Every register is allocated once at construction time, the pool never grows.
/// The amount of registers that aren't free can't exceed the capacity, which makes
/// the pool the backpressure mechanism of the whole graph: a producer that can't
/// acquire a register can't fire.
#[derive(Debug)]
pub struct RegstPool {
    producer: ActorId,
    desc_id: RegstDescId,
    name: String,
    consumers: Vec<ActorId>,
    free: VecDeque<Regst>,
    slots: Box<[SlotState]>,
}

impl RegstPool {
    /// Creates a new `RegstPool`.
    ///
    /// # Arguments
    /// * `producer` - The actor owning the pool.
    /// * `desc` - The descriptor of the registers, its capacity sizes the pool.
    ///
    /// # Returns
    /// A new `RegstPool` instance with every register free and zeroed.
    pub fn new(producer: ActorId, desc: &RegstDescSpec) -> Self {
        let capacity = desc.capacity.get();

        let free = (0..capacity)
            .map(|slot| {
                let blobs: BlobMap = desc
                    .blobs
                    .iter()
                    .map(|spec| (spec.name.clone(), Blob::zeros(&spec.shape)))
                    .collect();

                let id = RegstId {
                    desc_id: desc.desc_id,
                    slot,
                };

                Regst::new(id, producer, blobs)
            })
            .collect();

        Self {
            producer,
            desc_id: desc.desc_id,
            name: desc.name.clone(),
            consumers: desc.consumers.clone(),
            free,
            slots: vec![SlotState::Free; capacity].into_boxed_slice(),
        }
    }

    pub fn desc_id(&self) -> RegstDescId {
        self.desc_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn consumers(&self) -> &[ActorId] {
        &self.consumers
    }

    /// The maximum amount of registers this pool can have outside the free set.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The amount of registers that are either held or in flight.
    pub fn in_flight(&self) -> usize {
        self.slots
            .iter()
            .filter(|state| **state != SlotState::Free)
            .count()
    }

    pub fn has_free(&self) -> bool {
        !self.free.is_empty()
    }

    /// Whether every register is back in the pool.
    pub fn is_idle(&self) -> bool {
        self.free.len() == self.slots.len()
    }

    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.slots.get(slot).copied()
    }

    /// Takes a free register for writing.
    ///
    /// # Returns
    /// `None` when every register is in use, this is the backpressure signal and not an error.
    pub fn acquire(&mut self) -> Option<Regst> {
        let regst = self.free.pop_front()?;
        self.slots[regst.id().slot] = SlotState::Held;
        Some(regst)
    }

    /// Hands a held register out to `readers` consumers.
    ///
    /// # Arguments
    /// * `regst` - A register previously acquired from this pool.
    /// * `readers` - The amount of handles to create, each must come back through `release`.
    ///
    /// # Returns
    /// The handles to send, or a protocol violation if the register wasn't held.
    pub fn dispatch(&mut self, regst: Regst, readers: usize) -> Result<Vec<Regst>> {
        let slot = self.check_owned(&regst)?;

        if self.slots[slot] != SlotState::Held {
            return Err(self.violation(format!(
                "dispatched slot {slot} while {:?}",
                self.slots[slot]
            )));
        }

        if readers == 0 {
            self.slots[slot] = SlotState::Free;
            self.free.push_back(regst);
            return Ok(Vec::new());
        }

        self.slots[slot] = SlotState::InFlight { readers };
        let mut handles = Vec::with_capacity(readers);
        handles.extend((1..readers).map(|_| regst.clone()));
        handles.push(regst);

        Ok(handles)
    }

    /// Takes back one reader handle of an in flight register.
    ///
    /// The register becomes free again once all its readers returned it.
    ///
    /// # Returns
    /// A protocol violation if the register isn't in flight, which includes returning it twice.
    pub fn release(&mut self, regst: Regst) -> Result<()> {
        let slot = self.check_owned(&regst)?;

        match self.slots[slot] {
            SlotState::InFlight { readers: 1 } => {
                self.slots[slot] = SlotState::Free;
                self.free.push_back(regst);
            }
            SlotState::InFlight { readers } => {
                self.slots[slot] = SlotState::InFlight {
                    readers: readers - 1,
                };
            }
            state => {
                return Err(self.violation(format!("returned slot {slot} while {state:?}")));
            }
        }

        Ok(())
    }

    /// Puts back a held register that was never dispatched.
    pub fn reclaim(&mut self, regst: Regst) -> Result<()> {
        let slot = self.check_owned(&regst)?;

        if self.slots[slot] != SlotState::Held {
            return Err(self.violation(format!(
                "reclaimed slot {slot} while {:?}",
                self.slots[slot]
            )));
        }

        self.slots[slot] = SlotState::Free;
        self.free.push_back(regst);
        Ok(())
    }

    fn check_owned(&self, regst: &Regst) -> Result<usize> {
        let RegstId { desc_id, slot } = regst.id();

        if desc_id != self.desc_id || regst.producer() != self.producer || slot >= self.slots.len()
        {
            return Err(self.violation(format!(
                "register {:?} of actor {} doesn't belong to this pool",
                regst.id(),
                regst.producer()
            )));
        }

        Ok(slot)
    }

    fn violation(&self, detail: String) -> ActorErr {
        ActorErr::ProtocolViolation {
            actor: self.producer,
            detail: format!("pool `{}` ({}): {detail}", self.name, self.desc_id),
        }
    }
}
