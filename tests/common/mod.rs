#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use gimbal_control::motor::{BusError, PollPolicy, Protocol, Register, SharedBus, shared};

/// One bus transaction, as seen by the simulated devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Ping { id: u8 },
    Write { id: u8, address: u16, data: Vec<u8> },
    Read { id: u8, address: u16, len: u16 },
}

/// In-memory bus: records every transaction and answers from scripts
#[derive(Default)]
pub struct SimBus {
    pub log: Vec<Transaction>,
    /// Moving-flag values handed out per motor; 0 once a script runs dry
    pub moving: HashMap<u8, VecDeque<u8>>,
    /// Keep answering "moving" forever for these motors
    pub stuck: HashSet<u8>,
    pub missing: HashSet<u8>,
    pub failing_writes: HashSet<(u8, u16)>,
    pub failing_reads: HashSet<(u8, u16)>,
}

impl SimBus {
    pub fn script_moving(&mut self, id: u8, values: &[u8]) {
        self.moving.insert(id, values.iter().copied().collect());
    }

    pub fn writes(&self) -> Vec<(u8, u16, Vec<u8>)> {
        self.log
            .iter()
            .filter_map(|t| match t {
                Transaction::Write { id, address, data } => Some((*id, *address, data.clone())),
                _ => None,
            })
            .collect()
    }

    /// Goal positions written, in order, as (motor id, position)
    pub fn goal_positions(&self) -> Vec<(u8, u32)> {
        self.writes()
            .into_iter()
            .filter(|(_, address, _)| *address == Register::GoalPosition.address())
            .map(|(id, _, data)| (id, Register::GoalPosition.decode(&data).unwrap()))
            .collect()
    }

    pub fn count_for(&self, id: u8, pred: impl Fn(&Transaction) -> bool) -> usize {
        self.log
            .iter()
            .filter(|t| transaction_id(t) == id && pred(t))
            .count()
    }
}

pub fn transaction_id(t: &Transaction) -> u8 {
    match t {
        Transaction::Ping { id } | Transaction::Write { id, .. } | Transaction::Read { id, .. } => {
            *id
        }
    }
}

pub fn is_write_to(register: Register) -> impl Fn(&Transaction) -> bool {
    move |t: &Transaction| matches!(t, Transaction::Write { address, .. } if *address == register.address())
}

pub fn is_read_of(register: Register) -> impl Fn(&Transaction) -> bool {
    move |t: &Transaction| matches!(t, Transaction::Read { address, .. } if *address == register.address())
}

impl Protocol for SimBus {
    fn ping(&mut self, id: u8) -> Result<(), BusError> {
        self.log.push(Transaction::Ping { id });
        if self.missing.contains(&id) {
            return Err(BusError::Timeout { id });
        }
        Ok(())
    }

    fn read_register(&mut self, id: u8, address: u16, len: u16) -> Result<Vec<u8>, BusError> {
        self.log.push(Transaction::Read { id, address, len });
        if self.failing_reads.contains(&(id, address)) {
            return Err(BusError::Timeout { id });
        }
        if address != Register::Moving.address() {
            return Ok(vec![0; len as usize]);
        }

        let value = if self.stuck.contains(&id) {
            1
        } else {
            self.moving
                .get_mut(&id)
                .and_then(|script| script.pop_front())
                .unwrap_or(0)
        };
        Ok(vec![value])
    }

    fn write_register(&mut self, id: u8, address: u16, data: &[u8]) -> Result<(), BusError> {
        self.log.push(Transaction::Write {
            id,
            address,
            data: data.to_vec(),
        });
        if self.failing_writes.contains(&(id, address)) {
            return Err(BusError::DeviceError { id, status: 0x02 });
        }
        Ok(())
    }
}

pub fn sim_bus() -> SharedBus<SimBus> {
    shared(SimBus::default())
}

/// Default policy with a short poll period so tests stay fast
pub fn fast_poll() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(1),
        ..PollPolicy::default()
    }
}
