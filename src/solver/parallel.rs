use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Reserved tag for reductions; patch exchanges use small ordinals.
pub const REDUCE_TAG: u64 = u64::MAX;

/// Point-to-point and collective operations between sub-domain "processes".
///
/// Messages are matched by `(source rank, tag)`; messages between one pair of
/// ranks with one tag arrive in send order.
pub trait Communicator {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn send(&self, to: usize, tag: u64, data: Vec<f64>) -> Result<(), CommError>;
    fn recv(&self, from: usize, tag: u64) -> Result<Vec<f64>, CommError>;

    /// Element-wise sum over all ranks; every rank gets the result.
    fn all_reduce_sum_vec(&self, values: &[f64]) -> Result<Vec<f64>, CommError>;
    /// Element-wise maximum over all ranks.
    fn all_reduce_max_vec(&self, values: &[f64]) -> Result<Vec<f64>, CommError>;

    fn all_reduce_sum(&self, value: f64) -> Result<f64, CommError> {
        Ok(self.all_reduce_sum_vec(&[value])?[0])
    }

    fn all_reduce_max(&self, value: f64) -> Result<f64, CommError> {
        Ok(self.all_reduce_max_vec(&[value])?[0])
    }

    fn is_parallel(&self) -> bool {
        self.size() > 1
    }
}

/// Single-process communicator; reductions are the identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, to: usize, _tag: u64, _data: Vec<f64>) -> Result<(), CommError> {
        Err(CommError::NoSuchRank { rank: to, size: 1 })
    }

    fn recv(&self, from: usize, _tag: u64) -> Result<Vec<f64>, CommError> {
        Err(CommError::NoSuchRank { rank: from, size: 1 })
    }

    fn all_reduce_sum_vec(&self, values: &[f64]) -> Result<Vec<f64>, CommError> {
        Ok(values.to_vec())
    }

    fn all_reduce_max_vec(&self, values: &[f64]) -> Result<Vec<f64>, CommError> {
        Ok(values.to_vec())
    }
}

pub struct Message {
    pub tag: u64,
    pub data: Vec<f64>,
}

/// One rank of a group of threads standing in for processes.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    /// Indexed by destination rank.
    txs: Vec<mpsc::Sender<Message>>,
    /// Indexed by source rank.
    rxs: Vec<mpsc::Receiver<Message>>,
    /// Messages that arrived ahead of the receive asking for them.
    pending: RefCell<HashMap<(usize, u64), VecDeque<Vec<f64>>>>,
    wait_time: Cell<Duration>,
}

impl ThreadComm {
    /// Builds a fully connected group of `size` communicators.
    pub fn create(size: usize) -> Vec<ThreadComm> {
        let mut all_txs: Vec<Vec<mpsc::Sender<Message>>> = vec![Vec::new(); size];
        let mut all_rxs: Vec<Vec<Option<mpsc::Receiver<Message>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        // Channel i -> j
        for i in 0..size {
            for j in 0..size {
                let (tx, rx) = mpsc::channel();
                all_txs[i].push(tx);
                all_rxs[j][i] = Some(rx);
            }
        }

        all_txs
            .into_iter()
            .zip(all_rxs)
            .enumerate()
            .map(|(rank, (txs, rxs))| ThreadComm {
                rank,
                size,
                txs,
                rxs: rxs.into_iter().flatten().collect(),
                pending: RefCell::new(HashMap::new()),
                wait_time: Cell::new(Duration::ZERO),
            })
            .collect()
    }

    /// Runs `body` on `size` scoped threads, one per rank, and returns the
    /// per-rank results in rank order.
    pub fn run<R, F>(size: usize, body: F) -> Vec<R>
    where
        R: Send,
        F: Fn(ThreadComm) -> R + Sync,
    {
        let comms = Self::create(size);
        let body = &body;
        thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| scope.spawn(move || body(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        })
    }

    /// Total time spent blocked in receives.
    pub fn wait_time(&self) -> Duration {
        self.wait_time.get()
    }

    fn check_rank(&self, rank: usize) -> Result<(), CommError> {
        if rank < self.size {
            Ok(())
        } else {
            Err(CommError::NoSuchRank {
                rank,
                size: self.size,
            })
        }
    }

    fn record_wait(&self, from: usize, tag: u64, elapsed: Duration) {
        self.wait_time.set(self.wait_time.get() + elapsed);
        if elapsed.as_millis() > 2 {
            log::debug!(
                "rank {} slow receive from {} (tag {}): {:?}",
                self.rank,
                from,
                tag,
                elapsed
            );
        }
    }

    fn reduce_with(&self, values: &[f64], op: fn(f64, f64) -> f64) -> Result<Vec<f64>, CommError> {
        if self.size == 1 {
            return Ok(values.to_vec());
        }

        // Gather at rank 0, then broadcast.
        if self.rank == 0 {
            let mut acc = values.to_vec();
            for src in 1..self.size {
                let part = self.recv(src, REDUCE_TAG)?;
                if part.len() != acc.len() {
                    return Err(CommError::SizeMismatch {
                        from: src,
                        tag: REDUCE_TAG,
                        expected: acc.len(),
                        found: part.len(),
                    });
                }
                for (a, p) in acc.iter_mut().zip(part) {
                    *a = op(*a, p);
                }
            }
            for dst in 1..self.size {
                self.send(dst, REDUCE_TAG, acc.clone())?;
            }
            Ok(acc)
        } else {
            self.send(0, REDUCE_TAG, values.to_vec())?;
            self.recv(0, REDUCE_TAG)
        }
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, to: usize, tag: u64, data: Vec<f64>) -> Result<(), CommError> {
        self.check_rank(to)?;
        self.txs[to]
            .send(Message { tag, data })
            .map_err(|_| CommError::Disconnected { peer: to })
    }

    fn recv(&self, from: usize, tag: u64) -> Result<Vec<f64>, CommError> {
        self.check_rank(from)?;

        if let Some(data) = self
            .pending
            .borrow_mut()
            .get_mut(&(from, tag))
            .and_then(|q| q.pop_front())
        {
            return Ok(data);
        }

        let start = Instant::now();
        loop {
            let msg = self.rxs[from]
                .recv()
                .map_err(|_| CommError::Disconnected { peer: from })?;
            if msg.tag == tag {
                self.record_wait(from, tag, start.elapsed());
                return Ok(msg.data);
            }
            self.pending
                .borrow_mut()
                .entry((from, msg.tag))
                .or_default()
                .push_back(msg.data);
        }
    }

    fn all_reduce_sum_vec(&self, values: &[f64]) -> Result<Vec<f64>, CommError> {
        self.reduce_with(values, |a, b| a + b)
    }

    fn all_reduce_max_vec(&self, values: &[f64]) -> Result<Vec<f64>, CommError> {
        self.reduce_with(values, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommError {
    NoSuchRank {
        rank: usize,
        size: usize,
    },
    Disconnected {
        peer: usize,
    },
    SizeMismatch {
        from: usize,
        tag: u64,
        expected: usize,
        found: usize,
    },
    /// A coupled patch has no partner on the rank it names.
    Unmatched {
        patch: String,
        neighbour_rank: usize,
    },
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommError::NoSuchRank { rank, size } => {
                write!(f, "rank {} does not exist in a group of {}", rank, size)
            }
            CommError::Disconnected { peer } => {
                write!(f, "lost connection to rank {}", peer)
            }
            CommError::SizeMismatch {
                from,
                tag,
                expected,
                found,
            } => write!(
                f,
                "message from rank {} (tag {}) has {} values, expected {}",
                from, tag, found, expected
            ),
            CommError::Unmatched {
                patch,
                neighbour_rank,
            } => write!(
                f,
                "processor patch {} has no reachable neighbour on rank {}",
                patch, neighbour_rank
            ),
        }
    }
}

impl std::error::Error for CommError {}
