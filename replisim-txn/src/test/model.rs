// Exhaustive exploration of short schedules on a two-site, two-variable
// system: x1 lives only at site 2, x2 at both. T1 and T2 are read-write with
// T1 the older; T3 is read-only and starts before anything is written.

use crate::{Config, Coordinator, TxnState};
use replisim_base::{SiteId, TxnId, VarId};
use replisim_lang::{Command, Event, Instruction, TxnKind};
use stateright::{Checker, Model, Property};
use std::collections::BTreeSet;
use test_log::test;

const T1: TxnId = TxnId(1);
const T2: TxnId = TxnId(2);
const T3: TxnId = TxnId(3);

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
struct World {
    coord: Coordinator,
    reads: Vec<Event>,
    // Transactions the last step's fail was obliged to abort.
    fail_victims: BTreeSet<TxnId>,
    // Everyone ever aborted by a site failure rather than by wait-die.
    killed_by_fail: BTreeSet<TxnId>,
}

struct Sim {
    config: Config,
}

fn step(world: &mut World, cmd: Command) {
    let mut out: Vec<Event> = Vec::new();
    world
        .coord
        .run_line(vec![Instruction::Run(cmd)], &mut out)
        .expect("model step runs");
    world
        .reads
        .extend(out.into_iter().filter(|e| matches!(e, Event::Read { .. })));
}

fn is_active(coord: &Coordinator, txn: TxnId) -> bool {
    coord.transaction(txn).is_some_and(|t| t.is_active())
}

impl Model for Sim {
    type State = World;
    type Action = Command;

    fn init_states(&self) -> Vec<World> {
        let mut world = World {
            coord: Coordinator::new(self.config).expect("model config"),
            reads: Vec::new(),
            fail_victims: BTreeSet::new(),
            killed_by_fail: BTreeSet::new(),
        };
        for (txn, kind) in [(T1, TxnKind::ReadWrite), (T2, TxnKind::ReadWrite), (T3, TxnKind::ReadOnly)] {
            step(&mut world, Command::Begin { txn, kind });
        }
        vec![world]
    }

    fn actions(&self, world: &World, actions: &mut Vec<Command>) {
        for txn in [T1, T2] {
            if is_active(&world.coord, txn) {
                for var in [VarId(1), VarId(2)] {
                    actions.push(Command::Read { txn, var });
                    actions.push(Command::Write {
                        txn,
                        var,
                        value: 100 * i64::from(txn.0),
                    });
                }
                actions.push(Command::End(txn));
            }
        }
        if is_active(&world.coord, T3) {
            actions.push(Command::Read { txn: T3, var: VarId(2) });
            actions.push(Command::End(T3));
        }
        for site in [SiteId(1), SiteId(2)] {
            match world.coord.site(site) {
                Ok(s) if s.is_up() => actions.push(Command::Fail(site)),
                Ok(_) => actions.push(Command::Recover(site)),
                Err(_) => (),
            }
        }
    }

    fn next_state(&self, last: &World, action: Command) -> Option<World> {
        let mut world = last.clone();
        world.fail_victims.clear();
        if let Command::Fail(site) = action {
            let victims: BTreeSet<TxnId> = world
                .coord
                .site(site)
                .ok()?
                .accessed_transactions()
                .iter()
                .copied()
                .filter(|t| is_active(&world.coord, *t))
                .collect();
            world.killed_by_fail.extend(victims.iter().copied());
            world.fail_victims = victims;
        }
        step(&mut world, action);
        Some(world)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::<Self>::always("at most one live writer per variable", |_, w| {
                w.coord.placement().variables().all(|var| {
                    let writers: BTreeSet<TxnId> =
                        w.coord.sites().filter_map(|s| s.pending_writer(var)).collect();
                    writers.len() <= 1 && writers.iter().all(|t| is_active(&w.coord, *t))
                })
            }),
            Property::<Self>::always("read-only reads its start snapshot", |_, w| {
                w.reads.iter().all(|e| match e {
                    Event::Read { txn, var, value, .. } if *txn == T3 => *value == var.initial_value(),
                    _ => true,
                })
            }),
            Property::<Self>::always("oldest transaction never dies of a conflict", |_, w| {
                w.coord
                    .transaction(T1)
                    .map_or(true, |t| t.state != TxnState::Aborted || w.killed_by_fail.contains(&T1))
            }),
            Property::<Self>::always("fail aborts everyone who touched the site", |_, w| {
                w.fail_victims.iter().all(|t| {
                    w.coord.transaction(*t).map(|t| t.state) == Some(TxnState::Aborted)
                })
            }),
            Property::<Self>::sometimes("a write commits", |_, w| {
                w.coord.sites().any(|s| s.dump(VarId(2)).is_some_and(|v| v != 20))
            }),
            Property::<Self>::sometimes("an operation waits", |_, w| !w.coord.queue().is_empty()),
        ]
    }
}

#[test]
fn test_model_invariants() {
    Sim {
        config: Config {
            sites: 2,
            variables: 2,
        },
    }
    .checker()
    .target_max_depth(5)
    .spawn_bfs()
    .join()
    .assert_properties();
}
