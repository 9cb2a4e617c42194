use crate::core::types::Batch;

/// Iterator over the batches of an inclusive block range, in ascending order.
///
/// Every batch holds `batch_size` consecutive blocks except possibly the last,
/// which is truncated at `end`. An inverted range yields nothing.
#[derive(Debug, Clone)]
pub struct Partition {
    next_start: Option<u64>,
    end: u64,
    batch_size: u64,
    index: usize,
}

pub fn partition_range(start: u64, end: u64, batch_size: u64) -> Partition {
    Partition {
        next_start: (start <= end).then_some(start),
        end,
        batch_size: batch_size.max(1),
        index: 0,
    }
}

impl Partition {
    /// Number of batches still to be produced
    pub fn remaining(&self) -> usize {
        match self.next_start {
            Some(start) => {
                let blocks = (self.end - start) as u128 + 1;
                blocks.div_ceil(self.batch_size as u128) as usize
            }
            None => 0,
        }
    }
}

impl Iterator for Partition {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let start = self.next_start?;
        let end = start.saturating_add(self.batch_size - 1).min(self.end);

        // end == u64::MAX must not wrap around
        self.next_start = end.checked_add(1).filter(|next| *next <= self.end);

        let batch = Batch {
            index: self.index,
            start,
            end,
        };
        self.index += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Partition {}
