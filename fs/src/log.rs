//! Filesystem journal bookkeeping.
//!
//! Every filesystem-mutating operation runs inside a [`Transaction`] obtained
//! from [`Journal::begin_op`]. The transaction ends when it is dropped, so the
//! begin/end pair stays balanced on every exit path.

use alloc::sync::Arc;
use core::cell::Cell;

use spin::Mutex;

use pebble_abi::param::MAXOPBLOCKS;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JournalStats {
    /// Transactions currently open.
    pub outstanding: u32,
    /// Transactions ended so far.
    pub committed: u64,
    /// Log blocks written by ended transactions.
    pub blocks_logged: u64,
}

pub struct Journal {
    state: Mutex<JournalStats>,
}

impl Journal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(JournalStats::default()),
        })
    }

    pub fn begin_op(self: &Arc<Self>) -> Transaction {
        self.state.lock().outstanding += 1;
        Transaction {
            journal: Arc::clone(self),
            blocks: Cell::new(0),
        }
    }

    fn end_op(&self, blocks: u32) {
        let mut state = self.state.lock();
        state.outstanding -= 1;
        state.committed += 1;
        state.blocks_logged += blocks as u64;
    }

    pub fn stats(&self) -> JournalStats {
        *self.state.lock()
    }
}

/// An open filesystem operation. Ends on drop.
pub struct Transaction {
    journal: Arc<Journal>,
    blocks: Cell<u32>,
}

impl Transaction {
    /// Charge `blocks` log blocks to this operation. Panics once an operation
    /// exceeds `MAXOPBLOCKS`.
    pub fn log_blocks(&self, blocks: u32) {
        let total = self.blocks.get() + blocks;
        if total > MAXOPBLOCKS {
            panic!("too big a transaction");
        }
        self.blocks.set(total);
    }

    pub fn blocks(&self) -> u32 {
        self.blocks.get()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.journal.end_op(self.blocks.get());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transactions_balance() {
        let journal = Journal::new();
        {
            let tx = journal.begin_op();
            let _nested = journal.begin_op();
            tx.log_blocks(4);
            assert_eq!(journal.stats().outstanding, 2);
        }
        let stats = journal.stats();
        assert_eq!(stats.outstanding, 0);
        assert_eq!(stats.committed, 2);
        assert_eq!(stats.blocks_logged, 4);
    }

    #[test]
    #[should_panic(expected = "too big a transaction")]
    fn oversized_transaction_panics() {
        let journal = Journal::new();
        let tx = journal.begin_op();
        tx.log_blocks(MAXOPBLOCKS);
        tx.log_blocks(1);
    }
}
