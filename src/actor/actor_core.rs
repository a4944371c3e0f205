use std::collections::{BTreeMap, VecDeque};

use log::{debug, trace};

use super::{ActorCmd, ActorMsg, Envelope};
use crate::{
    ActorErr, Result,
    config::TaskSpec,
    kernel::{Kernel, KernelCtx, KernelErr, KernelIo},
    register::{ActorId, Regst, RegstDescId, RegstPool},
};

/// Which consumed descriptors an actor handles the generic way.
///
/// Naive registers are queued per descriptor and consumed once per act. Every other
/// consumed descriptor is custom and goes through the variant's hooks.
#[derive(Debug, Clone, Copy)]
pub enum NaiveConsumed {
    All,
    Only(&'static [&'static str]),
    AllExcept(&'static [&'static str]),
}

impl NaiveConsumed {
    fn is_naive(&self, name: &str) -> bool {
        match self {
            NaiveConsumed::All => true,
            NaiveConsumed::Only(names) => names.contains(&name),
            NaiveConsumed::AllExcept(names) => !names.contains(&name),
        }
    }
}

#[derive(Debug)]
struct ConsumedDesc {
    name: String,
    naive: bool,
    eord: bool,
}

#[derive(Debug, Clone, Copy)]
enum KernelPhase {
    Compute,
    InitModelAndConstBuf,
}

/// The state every compute actor shares, whatever its variant.
///
/// Holds the register queues of the naive consumed descriptors, the pools of the
/// produced ones, and the messages waiting to be delivered once the current handler
/// returns.
pub struct ActorCore {
    id: ActorId,
    name: String,
    kernel: Option<Box<dyn Kernel>>,
    random_seed: u64,
    consumed: BTreeMap<RegstDescId, ConsumedDesc>,
    readable: BTreeMap<RegstDescId, VecDeque<Regst>>,
    produced: BTreeMap<RegstDescId, RegstPool>,
    naive_produced: Vec<RegstDescId>,
    act_count: u64,
    outbox: Vec<Envelope>,
}

impl ActorCore {
    /// Creates a new `ActorCore`.
    ///
    /// # Arguments
    /// * `task` - The task this actor runs.
    /// * `kernel` - The kernel to launch on every act, if any.
    /// * `naive_consumed` - Which consumed descriptors are queued by the core.
    /// * `custom_produced` - The names of the produced descriptors the variant manages itself.
    ///
    /// # Returns
    /// A new `ActorCore` instance with every produced pool allocated.
    pub fn new(
        task: &TaskSpec,
        kernel: Option<Box<dyn Kernel>>,
        naive_consumed: NaiveConsumed,
        custom_produced: &[&str],
    ) -> Self {
        let consumed: BTreeMap<_, _> = task
            .consumed
            .iter()
            .map(|c| {
                let desc = ConsumedDesc {
                    name: c.name.clone(),
                    naive: naive_consumed.is_naive(&c.name),
                    eord: false,
                };

                (c.desc_id, desc)
            })
            .collect();

        let readable = consumed
            .iter()
            .filter(|(_, desc)| desc.naive)
            .map(|(&desc_id, _)| (desc_id, VecDeque::new()))
            .collect();

        let produced = task
            .produced
            .iter()
            .map(|desc| (desc.desc_id, RegstPool::new(task.actor_id, desc)))
            .collect();

        let naive_produced = task
            .produced
            .iter()
            .filter(|desc| !custom_produced.contains(&desc.name.as_str()))
            .map(|desc| desc.desc_id)
            .collect();

        Self {
            id: task.actor_id,
            name: task.name.clone(),
            kernel,
            random_seed: task.random_seed.unwrap_or(task.actor_id),
            consumed,
            readable,
            produced,
            naive_produced,
            act_count: 0,
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The amount of times this actor fired.
    pub fn act_count(&self) -> u64 {
        self.act_count
    }

    pub fn consumed_desc_id(&self, name: &str) -> Option<RegstDescId> {
        self.consumed
            .iter()
            .find(|(_, desc)| desc.name == name)
            .map(|(&desc_id, _)| desc_id)
    }

    pub fn produced_desc_id(&self, name: &str) -> Option<RegstDescId> {
        self.produced
            .values()
            .find(|pool| pool.name() == name)
            .map(RegstPool::desc_id)
    }

    pub fn is_consumed(&self, desc_id: RegstDescId) -> bool {
        self.consumed.contains_key(&desc_id)
    }

    pub fn is_naive_consumed(&self, desc_id: RegstDescId) -> bool {
        self.readable.contains_key(&desc_id)
    }

    pub fn pool(&self, desc_id: RegstDescId) -> Option<&RegstPool> {
        self.produced.get(&desc_id)
    }

    /// Queues a register of a naive consumed descriptor.
    pub fn push_naive_readable(&mut self, regst: Regst) -> Result<()> {
        let desc_id = regst.desc_id();

        if self.consumed.get(&desc_id).is_some_and(|desc| desc.eord) {
            return Err(self.violation(format!("register of descriptor {desc_id} after its eord")));
        }

        let Some(queue) = self.readable.get_mut(&desc_id) else {
            return Err(self.violation(format!("descriptor {desc_id} isn't naive consumed")));
        };

        queue.push_back(regst);
        Ok(())
    }

    /// Whether every naive consumed descriptor has a register waiting.
    pub fn is_naive_read_ready(&self) -> bool {
        self.readable.values().all(|queue| !queue.is_empty())
    }

    /// Whether every naive produced descriptor has a free register.
    pub fn is_naive_write_ready(&self) -> bool {
        self.naive_produced
            .iter()
            .all(|desc_id| self.produced.get(desc_id).is_some_and(RegstPool::has_free))
    }

    /// The register the next act reads from the naive descriptor called `name`.
    pub fn cur_naive_readable(&self, name: &str) -> Option<&Regst> {
        let desc_id = self.consumed_desc_id(name)?;
        self.readable.get(&desc_id)?.front()
    }

    /// The piece id of the registers the next act reads, `-1` if nothing is queued.
    pub fn first_naive_piece_id(&self) -> i64 {
        self.readable
            .values()
            .find_map(VecDeque::front)
            .map_or(-1, Regst::piece_id)
    }

    /// The registers the next act reads, one per naive descriptor.
    pub fn naive_readable_fronts(&self) -> impl Iterator<Item = &Regst> {
        self.readable.values().filter_map(VecDeque::front)
    }

    /// The model version the next act's inputs were computed with, if any carries one.
    pub fn first_naive_model_version_id(&self) -> Option<u64> {
        self.naive_readable_fronts().find_map(Regst::model_version_id)
    }

    /// Pops the register at the front of every naive queue and returns it to its producer.
    pub fn return_cur_naive_readable(&mut self) {
        let fronts: Vec<_> = self
            .readable
            .values_mut()
            .filter_map(VecDeque::pop_front)
            .collect();

        for regst in fronts {
            self.return_regst(regst);
        }
    }

    /// Sends `regst` back to the actor that produced it.
    pub fn return_regst(&mut self, regst: Regst) {
        trace!(actor_id = self.id, desc_id = regst.desc_id(); "returning register");
        self.send(regst.producer(), ActorMsg::ReturnRegst(regst));
    }

    /// Takes a free register of the produced descriptor `desc_id`.
    pub fn acquire(&mut self, desc_id: RegstDescId) -> Option<Regst> {
        self.produced.get_mut(&desc_id)?.acquire()
    }

    /// Sends a held register to every consumer of its descriptor.
    ///
    /// # Arguments
    /// * `regst` - A register acquired from one of this actor's pools.
    /// * `keep_own` - Whether this actor keeps a reader handle for itself.
    ///
    /// # Returns
    /// The handle kept by this actor if `keep_own` is set.
    pub fn dispatch_produced(&mut self, regst: Regst, keep_own: bool) -> Result<Option<Regst>> {
        let desc_id = regst.desc_id();
        let Some(pool) = self.produced.get_mut(&desc_id) else {
            return Err(self.violation(format!("dispatch of unknown descriptor {desc_id}")));
        };

        let consumers = pool.consumers().to_vec();
        let mut handles = pool.dispatch(regst, consumers.len() + keep_own as usize)?;
        let own = if keep_own { handles.pop() } else { None };

        for (consumer, handle) in consumers.into_iter().zip(handles) {
            self.send(consumer, ActorMsg::Regst(handle));
        }

        Ok(own)
    }

    /// Puts back a held register that won't be dispatched.
    pub fn reclaim(&mut self, regst: Regst) -> Result<()> {
        let desc_id = regst.desc_id();
        let Some(pool) = self.produced.get_mut(&desc_id) else {
            return Err(self.violation(format!("reclaim of unknown descriptor {desc_id}")));
        };

        pool.reclaim(regst)
    }

    /// Takes back a register a consumer is done with.
    pub fn release_returned(&mut self, regst: Regst) -> Result<()> {
        if regst.producer() != self.id {
            return Err(self.violation(format!(
                "received register {:?} produced by actor {}",
                regst.id(),
                regst.producer()
            )));
        }

        let desc_id = regst.desc_id();
        let Some(pool) = self.produced.get_mut(&desc_id) else {
            return Err(self.violation(format!("return of unknown descriptor {desc_id}")));
        };

        pool.release(regst)
    }

    /// Runs one generic act.
    ///
    /// Acquires a register of every naive produced descriptor, launches the kernel on them
    /// and on the fronts of the naive queues, dispatches the outputs to their consumers
    /// and finally returns the consumed registers.
    ///
    /// # Arguments
    /// * `piece_id` - The piece stamped on the outputs.
    /// * `extra_inputs` - Custom registers the kernel also reads.
    /// * `extra_outputs` - Custom registers the kernel also writes, they aren't dispatched.
    /// * `model_version_id` - The model version stamped on the outputs.
    pub fn naive_act(
        &mut self,
        piece_id: i64,
        extra_inputs: &[&Regst],
        extra_outputs: &mut [&mut Regst],
        model_version_id: Option<u64>,
    ) -> Result<()> {
        let mut outputs = Vec::with_capacity(self.naive_produced.len());
        for desc_id in &self.naive_produced {
            match self.produced.get_mut(desc_id).and_then(RegstPool::acquire) {
                Some(regst) => outputs.push(regst),
                None => {
                    return Err(self.violation(format!("acted without a free register of {desc_id}")));
                }
            }
        }

        let ctx = self.kernel_ctx(piece_id, model_version_id);
        let inputs = self
            .readable
            .values()
            .filter_map(VecDeque::front)
            .chain(extra_inputs.iter().copied());

        let outs = outputs
            .iter_mut()
            .chain(extra_outputs.iter_mut().map(|regst| &mut **regst));

        self.launch_kernel(KernelPhase::Compute, &ctx, inputs, outs)?;

        for mut regst in outputs {
            regst.set_piece_id(piece_id);
            regst.set_model_version_id(model_version_id);
            self.dispatch_produced(regst, false)?;
        }

        self.return_cur_naive_readable();
        self.act_count += 1;
        debug!(actor_id = self.id, piece_id = piece_id; "acted");

        Ok(())
    }

    /// Counts an act that didn't go through `naive_act`.
    pub fn count_act(&mut self) {
        self.act_count += 1;
    }

    /// Runs the kernel's model and constant buffer initialisation.
    pub fn init_model_and_const_buf(
        &self,
        model_version_id: Option<u64>,
        inputs: &[&Regst],
        outputs: &mut [&mut Regst],
    ) -> Result<()> {
        let ctx = self.kernel_ctx(-1, model_version_id);
        let outs = outputs.iter_mut().map(|regst| &mut **regst);

        self.launch_kernel(
            KernelPhase::InitModelAndConstBuf,
            &ctx,
            inputs.iter().copied(),
            outs,
        )
    }

    pub fn kernel_ctx(&self, piece_id: i64, model_version_id: Option<u64>) -> KernelCtx {
        KernelCtx {
            piece_id,
            random_seed: self.random_seed,
            model_version_id,
        }
    }

    fn launch_kernel<'a, I, O>(
        &self,
        phase: KernelPhase,
        ctx: &KernelCtx,
        inputs: I,
        outputs: O,
    ) -> Result<()>
    where
        I: Iterator<Item = &'a Regst>,
        O: Iterator<Item = &'a mut Regst>,
    {
        let Some(kernel) = self.kernel.as_deref() else {
            return match phase {
                KernelPhase::Compute => Err(ActorErr::UninitializedBinding {
                    actor: self.id,
                    binding: "kernel",
                }),
                KernelPhase::InitModelAndConstBuf => Ok(()),
            };
        };

        let run = || -> std::result::Result<(), KernelErr> {
            let mut io = KernelIo::new();
            for regst in inputs {
                io.bind_regst(regst)?;
            }
            for regst in outputs {
                io.bind_regst_mut(regst)?;
            }

            match phase {
                KernelPhase::Compute => kernel.compute(ctx, &mut io),
                KernelPhase::InitModelAndConstBuf => kernel.init_model_and_const_buf(ctx, &mut io),
            }
        };

        run().map_err(|source| ActorErr::KernelFailure {
            actor: self.id,
            source,
        })
    }

    /// Records the end of the consumed descriptor `desc_id`.
    pub fn mark_eord(&mut self, desc_id: RegstDescId) -> Result<()> {
        let id = self.id;
        match self.consumed.get_mut(&desc_id) {
            Some(desc) if !desc.eord => desc.eord = true,
            Some(_) => {
                return Err(self.violation(format!("second eord of descriptor {desc_id}")));
            }
            None => return Err(self.violation(format!("eord of unknown descriptor {desc_id}"))),
        }

        debug!(actor_id = id, desc_id = desc_id; "received eord");
        Ok(())
    }

    /// Whether every naive input ended and nothing is left in its queue.
    pub fn is_naive_eord(&self) -> bool {
        self.readable.iter().all(|(desc_id, queue)| {
            queue.is_empty() && self.consumed.get(desc_id).is_some_and(|desc| desc.eord)
        })
    }

    pub fn all_consumed_eord(&self) -> bool {
        self.consumed.values().all(|desc| desc.eord)
    }

    /// Whether every produced register is back in its pool.
    pub fn all_produced_idle(&self) -> bool {
        self.produced.values().all(RegstPool::is_idle)
    }

    pub fn send_eord_for_all_produced(&mut self) {
        let eords: Vec<_> = self
            .produced
            .values()
            .flat_map(|pool| {
                let desc_id = pool.desc_id();
                pool.consumers().iter().map(move |&dst| (dst, desc_id))
            })
            .collect();

        for (dst, desc_id) in eords {
            self.send(dst, ActorMsg::Eord { desc_id });
        }
    }

    /// Sends `cmd` to every consumer of the produced descriptor `desc_id`.
    pub fn send_cmd_to_consumers(&mut self, desc_id: RegstDescId, cmd: ActorCmd) {
        let consumers = self
            .produced
            .get(&desc_id)
            .map(|pool| pool.consumers().to_vec())
            .unwrap_or_default();

        for dst in consumers {
            self.send(dst, ActorMsg::Cmd(cmd));
        }
    }

    pub fn send(&mut self, dst: ActorId, msg: ActorMsg) {
        self.outbox.push(Envelope { dst, msg });
    }

    /// Takes every message produced since the last call.
    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    pub fn violation(&self, detail: impl Into<String>) -> ActorErr {
        ActorErr::ProtocolViolation {
            actor: self.id,
            detail: detail.into(),
        }
    }
}
