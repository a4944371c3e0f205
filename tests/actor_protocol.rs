use std::num::NonZeroUsize;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::{Value, json};

use regst_actor::{
    ActorErr, Result,
    actor::{ActorCmd, ActorMsg, ActorState, CompActor, Envelope, SnapshotStore},
    config::{BlobSpec, RegstDescSpec, TaskSpec},
    kernel::KernelRegistry,
    register::{ActorId, Regst, RegstDescId, RegstPool},
    runtime::GraphBuilder,
};

/// Drives a single actor by hand and keeps whatever it sends.
struct Harness {
    actor: CompActor,
    outbox: Vec<Envelope>,
}

impl Harness {
    fn new(task: Value) -> Self {
        let task: TaskSpec = serde_json::from_value(task).unwrap();
        let registry = KernelRegistry::with_default_kernels();
        let actor = GraphBuilder::new(&registry)
            .build_actor(&task, &SnapshotStore::new())
            .unwrap();

        Self {
            actor,
            outbox: Vec::new(),
        }
    }

    fn try_send(&mut self, msg: ActorMsg) -> Result<ActorState> {
        let state = self.actor.handle(msg)?;
        self.outbox.extend(self.actor.drain_outbox());
        Ok(state)
    }

    fn send(&mut self, msg: ActorMsg) -> ActorState {
        self.try_send(msg).unwrap()
    }

    fn acts(&self) -> u64 {
        self.actor.core().act_count()
    }

    fn take_all(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    /// Removes the registers sent to `dst`, either handed out or returned.
    fn take_regsts(&mut self, dst: ActorId, returned: bool) -> Vec<Regst> {
        let mut taken = Vec::new();
        let mut rest = Vec::new();

        for envelope in self.take_all() {
            match envelope {
                Envelope {
                    dst: to,
                    msg: ActorMsg::Regst(regst),
                } if to == dst && !returned => taken.push(regst),
                Envelope {
                    dst: to,
                    msg: ActorMsg::ReturnRegst(regst),
                } if to == dst && returned => taken.push(regst),
                other => rest.push(other),
            }
        }

        self.outbox = rest;
        taken
    }

    fn take_sent(&mut self, dst: ActorId) -> Vec<Regst> {
        self.take_regsts(dst, false)
    }

    fn take_returned(&mut self, dst: ActorId) -> Vec<Regst> {
        self.take_regsts(dst, true)
    }
}

fn upstream(producer: ActorId, desc_id: RegstDescId, blob: &str, shape: &[usize], capacity: usize) -> RegstPool {
    let desc = RegstDescSpec {
        desc_id,
        name: blob.to_string(),
        capacity: NonZeroUsize::new(capacity).unwrap(),
        consumers: vec![2],
        blobs: vec![BlobSpec {
            name: blob.to_string(),
            shape: shape.to_vec(),
        }],
    };

    RegstPool::new(producer, &desc)
}

fn produce(pool: &mut RegstPool, piece_id: i64, version: Option<u64>, value: f32) -> Regst {
    let mut regst = pool.acquire().unwrap();
    let name = pool.name().to_string();

    regst.blobs_mut().unwrap().get_mut(&name).unwrap().fill(value);
    regst.set_piece_id(piece_id);
    regst.set_model_version_id(version);

    pool.dispatch(regst, 1).unwrap().pop().unwrap()
}

fn normal_task(out_capacity: usize) -> Value {
    json!({
        "actor_id": 2,
        "name": "copy",
        "kind": "normal",
        "kernel": { "op_type": "identity" },
        "consumed": [{ "name": "in", "desc_id": 10 }],
        "produced": [{
            "desc_id": 20, "name": "out", "capacity": out_capacity, "consumers": [3],
            "blobs": [{ "name": "y", "shape": [2] }]
        }]
    })
}

fn forward_task(model_save: bool, forward_model_capacity: usize, const_buf: bool) -> Value {
    let mut produced = vec![json!({
        "desc_id": 20, "name": "out", "capacity": 2, "consumers": [3],
        "blobs": [{ "name": "y", "shape": [1, 1] }]
    })];

    if forward_model_capacity > 0 {
        produced.push(json!({
            "desc_id": 22, "name": "forward_model", "capacity": forward_model_capacity,
            "consumers": [5], "blobs": [{ "name": "moving_mean", "shape": [1] }]
        }));
    }

    if const_buf {
        produced.push(json!({
            "desc_id": 21, "name": "const_buf", "capacity": 1, "consumers": [3],
            "blobs": [{ "name": "scale", "shape": [1] }]
        }));
    }

    let model_save = model_save.then(|| json!({ "pieces_per_batch": 1, "batches_per_save": 1 }));

    json!({
        "actor_id": 2,
        "name": "forward",
        "kind": { "forward": { "model_save": model_save } },
        "kernel": { "op_type": "affine", "attrs": { "const_scale": 0.5, "momentum": 0.9 } },
        "consumed": [
            { "name": "in", "desc_id": 10 },
            { "name": "model", "desc_id": 40 }
        ],
        "produced": produced
    })
}

fn input_pool() -> RegstPool {
    upstream(1, 10, "x", &[2], 2)
}

fn forward_pools() -> (RegstPool, RegstPool) {
    (upstream(1, 10, "x", &[1, 1], 4), upstream(4, 40, "weight", &[1, 1], 2))
}

#[test]
fn backpressure_stalls_until_output_returns() {
    let mut inputs = input_pool();
    let mut h = Harness::new(normal_task(2));
    assert_eq!(h.send(ActorMsg::Cmd(ActorCmd::InitModel)), ActorState::Normal);

    for piece in 0..3 {
        h.send(ActorMsg::Regst(produce(&mut inputs, piece, None, 1.)));

        for regst in h.take_returned(1) {
            inputs.release(regst).unwrap();
        }
    }

    assert_eq!(h.acts(), 2);
    let mut outs = h.take_sent(3);
    assert_eq!(outs.len(), 2);
    assert_eq!(inputs.in_flight(), 1);
    assert!(!h.actor.is_ready_to_act());

    h.send(ActorMsg::ReturnRegst(outs.remove(0)));
    assert_eq!(h.acts(), 3);

    let third = h.take_sent(3);
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].piece_id(), 2);
    assert_eq!(third[0].blob("y").unwrap().data(), [1., 1.]);
}

#[test]
fn single_output_register_fires_once_per_return() {
    let mut inputs = input_pool();
    let mut h = Harness::new(normal_task(1));
    h.send(ActorMsg::Cmd(ActorCmd::InitModel));

    h.send(ActorMsg::Regst(produce(&mut inputs, 0, None, 1.)));
    h.send(ActorMsg::Regst(produce(&mut inputs, 1, None, 2.)));
    assert_eq!(h.acts(), 1);

    let out = h.take_sent(3).pop().unwrap();
    assert_eq!(out.piece_id(), 0);
    h.send(ActorMsg::ReturnRegst(out));
    assert_eq!(h.acts(), 2);

    let out = h.take_sent(3).pop().unwrap();
    assert_eq!(out.piece_id(), 1);
    assert_eq!(out.blob("y").unwrap().data(), [2., 2.]);
}

#[test]
fn inputs_are_buffered_before_init() {
    let mut inputs = input_pool();
    let mut h = Harness::new(normal_task(2));

    let state = h.send(ActorMsg::Regst(produce(&mut inputs, 0, None, 1.)));
    assert_eq!(state, ActorState::Initializing);
    assert_eq!(h.acts(), 0);
    assert!(h.take_all().is_empty());

    assert_eq!(h.send(ActorMsg::Cmd(ActorCmd::InitModel)), ActorState::Normal);
    assert_eq!(h.acts(), 1);
    assert_eq!(h.take_returned(1).len(), 1);
}

#[test]
fn forward_waits_for_its_model() {
    let (mut inputs, mut models) = forward_pools();
    let mut h = Harness::new(forward_task(false, 0, false));

    h.send(ActorMsg::Cmd(ActorCmd::InitModel));
    let state = h.send(ActorMsg::Regst(produce(&mut inputs, 0, None, 2.)));
    assert_eq!(state, ActorState::Initializing);
    assert_eq!(h.acts(), 0);

    let state = h.send(ActorMsg::Regst(produce(&mut models, -1, Some(0), 3.)));
    assert_eq!(state, ActorState::Normal);
    assert_eq!(h.acts(), 1);

    let out = h.take_sent(3).pop().unwrap();
    assert_eq!(out.model_version_id(), Some(0));
    assert_eq!(out.blob("y").unwrap().data(), [6.]);
}

#[test]
fn forward_waits_for_its_const_model() {
    let (mut inputs, mut models) = forward_pools();
    let mut const_models = upstream(4, 41, "scale", &[1], 1);

    let mut task = forward_task(false, 0, false);
    task["consumed"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "name": "const_model", "desc_id": 41 }));
    let mut h = Harness::new(task);

    h.send(ActorMsg::Cmd(ActorCmd::InitModel));
    h.send(ActorMsg::Regst(produce(&mut models, -1, Some(0), 3.)));
    let state = h.send(ActorMsg::Regst(produce(&mut inputs, 0, None, 2.)));
    assert_eq!(state, ActorState::Initializing);
    assert_eq!(h.acts(), 0);
    assert!(!h.actor.is_ready_to_act());
    assert!(h.take_sent(3).is_empty());

    let state = h.send(ActorMsg::Regst(produce(&mut const_models, -1, None, 0.5)));
    assert_eq!(state, ActorState::Normal);
    assert_eq!(h.acts(), 1);

    let out = h.take_sent(3).pop().unwrap();
    assert_eq!(out.model_version_id(), Some(0));
    assert_eq!(out.blob("y").unwrap().data(), [3.]);
}

#[test]
fn model_swap_returns_previous_version() {
    let (mut inputs, mut models) = forward_pools();
    let mut h = Harness::new(forward_task(false, 0, false));

    h.send(ActorMsg::Cmd(ActorCmd::InitModel));
    h.send(ActorMsg::Regst(produce(&mut models, -1, Some(0), 1.)));
    h.send(ActorMsg::Regst(produce(&mut inputs, 0, None, 1.)));
    assert_eq!(h.take_sent(3)[0].model_version_id(), Some(0));
    assert!(h.take_returned(4).is_empty());

    h.send(ActorMsg::Regst(produce(&mut models, 1, Some(1), 2.)));
    let returned = h.take_returned(4);
    assert_eq!(returned.len(), 1);
    assert_eq!(returned[0].model_version_id(), Some(0));
    models.release(returned.into_iter().next().unwrap()).unwrap();

    h.send(ActorMsg::Regst(produce(&mut inputs, 1, None, 1.)));
    let out = h.take_sent(3).pop().unwrap();
    assert_eq!(out.model_version_id(), Some(1));
    assert_eq!(out.blob("y").unwrap().data(), [2.]);
}

#[test]
fn slow_checkpoint_stalls_forward() {
    let (mut inputs, mut models) = forward_pools();
    let mut h = Harness::new(forward_task(true, 1, false));

    h.send(ActorMsg::Cmd(ActorCmd::InitModel));
    h.send(ActorMsg::Regst(produce(&mut models, -1, Some(0), 1.)));
    h.send(ActorMsg::Regst(produce(&mut inputs, 0, None, 1.)));
    assert_eq!(h.acts(), 1);

    let sent: Vec<_> = h
        .take_all()
        .into_iter()
        .filter_map(|envelope| match envelope.msg {
            ActorMsg::Regst(regst) => Some((envelope.dst, regst)),
            _ => None,
        })
        .collect();

    let dsts: Vec<_> = sent.iter().map(|(dst, _)| *dst).collect();
    assert_eq!(dsts, [3, 5]);

    let (_, saved) = sent.into_iter().nth(1).unwrap();
    assert_eq!(saved.model_version_id(), Some(0));
    assert_eq!(saved.piece_id(), 0);
    assert!((saved.blob("moving_mean").unwrap().data()[0] - 0.1).abs() < 1e-6);

    h.send(ActorMsg::Regst(produce(&mut inputs, 1, None, 1.)));
    assert_eq!(h.acts(), 1);
    assert!(!h.actor.is_ready_to_act());

    h.send(ActorMsg::ReturnRegst(saved));
    assert_eq!(h.acts(), 2);

    let saved = h.take_sent(5).pop().unwrap();
    assert_eq!(saved.model_version_id(), Some(1));
    assert!((saved.blob("moving_mean").unwrap().data()[0] - 0.19).abs() < 1e-6);
}

#[test]
fn const_buf_is_shared_before_init_done() {
    let (_, mut models) = forward_pools();
    let mut h = Harness::new(forward_task(false, 0, true));

    h.send(ActorMsg::Cmd(ActorCmd::InitModel));
    h.send(ActorMsg::Regst(produce(&mut models, -1, Some(0), 1.)));

    let to_backward: Vec<_> = h
        .take_all()
        .into_iter()
        .filter(|envelope| envelope.dst == 3)
        .map(|envelope| envelope.msg)
        .collect();

    assert_eq!(to_backward.len(), 2);
    let ActorMsg::Regst(const_buf) = &to_backward[0] else {
        panic!("expected the const buffer first, got {:?}", to_backward[0]);
    };
    assert_eq!(const_buf.desc_id(), 21);
    assert_eq!(const_buf.blob("scale").unwrap().data(), [0.5]);
    assert!(matches!(
        to_backward[1],
        ActorMsg::Cmd(ActorCmd::ConstBufInitDone)
    ));
}

fn backward_task() -> Value {
    json!({
        "actor_id": 2,
        "name": "backward",
        "kind": "backward",
        "kernel": { "op_type": "affine_grad" },
        "consumed": [
            { "name": "in", "desc_id": 10 },
            { "name": "out", "desc_id": 20 },
            { "name": "const_buf", "desc_id": 21 }
        ],
        "produced": [{
            "desc_id": 30, "name": "model_diff", "capacity": 2, "consumers": [4],
            "blobs": [{ "name": "weight_diff", "shape": [1, 1] }]
        }]
    })
}

#[test]
fn backward_waits_for_const_buf_init() {
    let mut xs = upstream(1, 10, "x", &[1, 1], 2);
    let mut ys = upstream(7, 20, "y", &[1, 1], 2);
    let mut bufs = upstream(7, 21, "scale", &[1], 1);
    let mut h = Harness::new(backward_task());

    h.send(ActorMsg::Cmd(ActorCmd::InitModel));
    h.send(ActorMsg::Regst(produce(&mut xs, 0, None, 2.)));
    h.send(ActorMsg::Regst(produce(&mut ys, 0, Some(3), 3.)));
    assert_eq!(h.acts(), 0);

    h.send(ActorMsg::Regst(produce(&mut bufs, -1, None, 0.5)));
    assert_eq!(h.acts(), 0);

    h.send(ActorMsg::Cmd(ActorCmd::ConstBufInitDone));
    assert_eq!(h.acts(), 1);

    let diff = h.take_sent(4).pop().unwrap();
    assert_eq!(diff.model_version_id(), Some(3));
    assert_eq!(diff.blob("weight_diff").unwrap().data(), [3.]);
}

#[test]
fn init_done_before_const_buf_is_a_violation() {
    let mut h = Harness::new(backward_task());
    h.send(ActorMsg::Cmd(ActorCmd::InitModel));

    let err = h
        .try_send(ActorMsg::Cmd(ActorCmd::ConstBufInitDone))
        .unwrap_err();
    assert!(matches!(err, ActorErr::ProtocolViolation { actor: 2, .. }));
}

#[test]
fn double_return_is_a_violation() {
    let mut inputs = input_pool();
    let mut h = Harness::new(normal_task(2));
    h.send(ActorMsg::Cmd(ActorCmd::InitModel));
    h.send(ActorMsg::Regst(produce(&mut inputs, 0, None, 1.)));

    let out = h.take_sent(3).pop().unwrap();
    let duplicate = out.clone();

    h.send(ActorMsg::ReturnRegst(out));
    let err = h.try_send(ActorMsg::ReturnRegst(duplicate)).unwrap_err();
    assert!(matches!(err, ActorErr::ProtocolViolation { .. }));
}

#[test]
fn unknown_descriptor_is_a_violation() {
    let mut stranger = upstream(1, 99, "x", &[2], 1);
    let mut h = Harness::new(normal_task(2));
    h.send(ActorMsg::Cmd(ActorCmd::InitModel));

    let err = h
        .try_send(ActorMsg::Regst(produce(&mut stranger, 0, None, 1.)))
        .unwrap_err();
    assert!(matches!(err, ActorErr::ProtocolViolation { .. }));
}

#[test]
fn foreign_return_is_a_violation() {
    let mut inputs = input_pool();
    let mut h = Harness::new(normal_task(2));
    h.send(ActorMsg::Cmd(ActorCmd::InitModel));

    let err = h
        .try_send(ActorMsg::ReturnRegst(produce(&mut inputs, 0, None, 1.)))
        .unwrap_err();
    assert!(matches!(err, ActorErr::ProtocolViolation { .. }));
}

#[test]
fn second_init_is_a_violation() {
    let mut h = Harness::new(normal_task(2));
    h.send(ActorMsg::Cmd(ActorCmd::InitModel));
    assert!(h.try_send(ActorMsg::Cmd(ActorCmd::InitModel)).is_err());
}

#[test]
fn second_const_model_is_a_violation() {
    let mut task = forward_task(false, 0, false);
    task["consumed"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "name": "const_model", "desc_id": 41 }));

    let mut const_models = upstream(4, 41, "bias", &[1], 2);
    let mut h = Harness::new(task);

    h.send(ActorMsg::Regst(produce(&mut const_models, -1, None, 1.)));
    let err = h
        .try_send(ActorMsg::Regst(produce(&mut const_models, -1, None, 1.)))
        .unwrap_err();
    assert!(matches!(err, ActorErr::ProtocolViolation { .. }));
}

#[test]
fn eord_winds_down_once_outputs_return() {
    let mut inputs = input_pool();
    let mut h = Harness::new(normal_task(2));
    h.send(ActorMsg::Cmd(ActorCmd::InitModel));
    h.send(ActorMsg::Regst(produce(&mut inputs, 0, None, 1.)));
    let out = h.take_sent(3).pop().unwrap();
    h.take_all();

    assert_eq!(h.send(ActorMsg::Eord { desc_id: 10 }), ActorState::Zombie);
    let eords: Vec<_> = h
        .take_all()
        .into_iter()
        .filter_map(|envelope| match envelope.msg {
            ActorMsg::Eord { desc_id } => Some((envelope.dst, desc_id)),
            _ => None,
        })
        .collect();
    assert_eq!(eords, [(3, 20)]);

    assert_eq!(h.send(ActorMsg::ReturnRegst(out)), ActorState::Exited);
    assert!(h.try_send(ActorMsg::Eord { desc_id: 10 }).is_err());
}

#[test]
fn duplicate_eord_is_a_violation() {
    let mut h = Harness::new(normal_task(2));
    h.send(ActorMsg::Cmd(ActorCmd::InitModel));
    h.send(ActorMsg::Eord { desc_id: 10 });

    assert!(h.try_send(ActorMsg::Eord { desc_id: 10 }).is_err());
}

#[test]
fn pool_never_exceeds_capacity() {
    let mut rng = StdRng::seed_from_u64(5);

    for capacity in 1..=3 {
        let mut inputs = upstream(1, 10, "x", &[2], 4);
        let mut h = Harness::new(normal_task(capacity));
        h.send(ActorMsg::Cmd(ActorCmd::InitModel));

        let mut outstanding: Vec<Regst> = Vec::new();
        let mut received = 0;
        let mut piece = 0;

        for _ in 0..300 {
            if rng.random_bool(0.5) && inputs.has_free() {
                h.send(ActorMsg::Regst(produce(&mut inputs, piece, None, piece as f32)));
                piece += 1;
            } else if !outstanding.is_empty() {
                let i = rng.random_range(0..outstanding.len());
                h.send(ActorMsg::ReturnRegst(outstanding.swap_remove(i)));
            }

            for regst in h.take_returned(1) {
                inputs.release(regst).unwrap();
            }

            let sent = h.take_sent(3);
            received += sent.len();
            outstanding.extend(sent);

            let pool = h.actor.core().pool(20).unwrap();
            assert!(pool.in_flight() <= capacity);
            assert_eq!(pool.in_flight(), outstanding.len());

            for (i, a) in outstanding.iter().enumerate() {
                assert!(outstanding[i + 1..].iter().all(|b| !a.shares_storage(b)));
            }
        }

        assert_eq!(h.acts(), received as u64);
        assert!(received > 0);
    }
}
