use crate::decoder::config;
use crate::decoder::tables::{self, BARS_IN_MODULE, MODULES_IN_CODEWORD};
use crate::error::DecodeError;

/// Maximum number of times a run-length vector is doubled when its scale
/// looks systematically off before giving up on the codeword.
const MAX_WIDTH_DOUBLINGS: usize = 3;

/// Decodes one codeword from its 8 measured pixel run lengths: coerces the
/// measurement to whole module counts summing exactly 17, then looks the
/// resulting bit pattern up in the symbol tables.
pub struct CodewordDecoder;

impl CodewordDecoder {
    /// Decode a `(value, bucket)` pair from raw run lengths.
    ///
    /// `Ok(None)` means the measurement is not a readable symbol (too
    /// small, degenerate runs, or the pattern is not in the tables); the
    /// caller skips this row. An `Err` means the repair ladder failed to
    /// converge, which aborts the whole attempt.
    pub fn decode(module_bit_count: &[i32; BARS_IN_MODULE]) -> Result<Option<(u16, u8)>, DecodeError> {
        let Some(adjustment) = AdjustmentResult::from_raw(*module_bit_count) else {
            return Ok(None);
        };
        let counts = adjustment.into_module_counts()?;
        let pattern = Self::pattern_from_counts(&counts);
        match tables::codeword_value(pattern) {
            Some(value) => Ok(Some((value, Self::bucket_number(&counts)))),
            None => Ok(None),
        }
    }

    /// Rebuild the 17-bit module pattern from module counts (first run is a bar)
    fn pattern_from_counts(counts: &[i32; BARS_IN_MODULE]) -> u32 {
        let mut pattern = 0u32;
        for (i, &count) in counts.iter().enumerate() {
            let bit = (i % 2 == 0) as u32;
            for _ in 0..count {
                pattern = (pattern << 1) | bit;
            }
        }
        pattern
    }

    /// Cluster bucket of a 17-normalized module count vector
    pub(crate) fn bucket_number(counts: &[i32; BARS_IN_MODULE]) -> u8 {
        ((counts[0] - counts[2] + counts[4] - counts[6] + 9) % 9) as u8
    }
}

/// Module-width reconciliation state: the measured run lengths, the derived
/// pixels-per-module scale and how far the total is from 17 modules.
#[derive(Debug, Clone)]
pub(crate) struct AdjustmentResult {
    module_bit_count: [i32; BARS_IN_MODULE],
    bits_per_module: i32,
    bit_count_difference: i32,
}

impl AdjustmentResult {
    /// Derive the module scale from a raw run-length vector. Returns `None`
    /// when the vector cannot represent a codeword (a zero run, or fewer
    /// pixels than modules). A strongly unbalanced remainder means the
    /// scale estimate is off by about half a pixel per module; doubling
    /// every run re-centers it, bounded by [`MAX_WIDTH_DOUBLINGS`].
    pub(crate) fn from_raw(mut module_bit_count: [i32; BARS_IN_MODULE]) -> Option<Self> {
        for _ in 0..=MAX_WIDTH_DOUBLINGS {
            if module_bit_count.iter().any(|&c| c == 0) {
                return None;
            }
            let bit_count_sum: i32 = module_bit_count.iter().sum();
            let mut bits_per_module = bit_count_sum / MODULES_IN_CODEWORD;
            if bits_per_module == 0 {
                return None;
            }
            let mut bit_count_difference = bit_count_sum % MODULES_IN_CODEWORD;
            if bit_count_difference * 2 > MODULES_IN_CODEWORD {
                bit_count_difference -= MODULES_IN_CODEWORD;
                bits_per_module += 1;
            }
            if bit_count_difference.abs() <= 5 {
                let mut result = Self {
                    module_bit_count,
                    bits_per_module,
                    bit_count_difference,
                };
                result.adjust_to_minimum_size();
                return Some(result);
            }
            for count in &mut module_bit_count {
                *count <<= 1;
            }
        }
        None
    }

    /// Run the repair ladder until the vector is exactly 17 modules with
    /// every run a whole multiple of the module width, then divide down.
    pub(crate) fn into_module_counts(mut self) -> Result<[i32; BARS_IN_MODULE], DecodeError> {
        let cap = config::max_adjustment_steps();
        let mut steps = 0;
        while !self.is_valid() {
            steps += 1;
            if steps > cap {
                return Err(DecodeError::InvariantViolation(
                    "module width adjustment did not converge",
                ));
            }
            let changed = if self.bit_count_difference != 0 {
                let first = if self.is_too_small() {
                    self.enlarge_small_difference()
                } else {
                    self.shrink_small_difference()
                };
                first
                    || self.adjust_half_size_module()
                    || self.adjust_biggest_difference()
                    || self.adjust_whole_module()
            } else {
                self.rebalance_half_size_neighbors() || self.nudge_largest_remainder()
            };
            if !changed {
                return Err(DecodeError::InvariantViolation(
                    "module width adjustment ran out of strategies",
                ));
            }
        }
        let mut counts = self.module_bit_count;
        for count in &mut counts {
            *count /= self.bits_per_module;
        }
        Ok(counts)
    }

    fn is_valid(&self) -> bool {
        self.bit_count_difference == 0
            && self
                .module_bit_count
                .iter()
                .all(|&c| c % self.bits_per_module == 0)
    }

    fn is_too_small(&self) -> bool {
        self.bit_count_difference < 0
    }

    fn add(&mut self, index: usize, value: i32) {
        self.bit_count_difference += value;
        self.module_bit_count[index] += value;
    }

    fn subtract(&mut self, index: usize, value: i32) {
        self.bit_count_difference -= value;
        self.module_bit_count[index] -= value;
    }

    /// No run may be narrower than one module. Force undersized runs up to
    /// one module, taking the pixels back from the wider neighbor when it
    /// can spare them.
    fn adjust_to_minimum_size(&mut self) {
        for i in 0..BARS_IN_MODULE {
            if self.module_bit_count[i] >= self.bits_per_module {
                continue;
            }
            let bit_difference = self.bits_per_module - self.module_bit_count[i];
            self.add(i, bit_difference);
            let min_neighbor_size = self.bits_per_module + bit_difference;
            if i == 0 {
                if self.module_bit_count[1] >= min_neighbor_size {
                    self.subtract(1, bit_difference);
                }
            } else if i == BARS_IN_MODULE - 1 {
                if self.module_bit_count[BARS_IN_MODULE - 2] >= min_neighbor_size {
                    self.subtract(BARS_IN_MODULE - 2, bit_difference);
                }
            } else {
                let neighbor = if self.module_bit_count[i - 1] >= self.module_bit_count[i + 1] {
                    i - 1
                } else {
                    i + 1
                };
                if self.module_bit_count[neighbor] >= min_neighbor_size {
                    self.subtract(neighbor, 1);
                }
            }
        }
    }

    /// Round runs just above a module boundary up to it
    fn enlarge_small_difference(&mut self) -> bool {
        let mut changed = false;
        for i in 0..BARS_IN_MODULE {
            if self.bit_count_difference >= 0 {
                break;
            }
            let bit_difference = self.module_bit_count[i] % self.bits_per_module;
            if bit_difference != 0 && bit_difference * 2 > self.bits_per_module {
                self.add(i, self.bits_per_module - bit_difference);
                changed = true;
            }
        }
        changed
    }

    /// Round runs just below a module boundary down to it
    fn shrink_small_difference(&mut self) -> bool {
        let mut changed = false;
        for i in 0..BARS_IN_MODULE {
            if self.bit_count_difference <= 0 {
                break;
            }
            let bit_difference = self.module_bit_count[i] % self.bits_per_module;
            if bit_difference != 0 && bit_difference * 2 < self.bits_per_module {
                self.subtract(i, bit_difference);
                changed = true;
            }
        }
        changed
    }

    /// Move the widest run sitting exactly between two module boundaries a
    /// half module toward 17.
    fn adjust_half_size_module(&mut self) -> bool {
        let mut index = None;
        let mut biggest = -1;
        for i in 0..BARS_IN_MODULE {
            let bit_difference = self.module_bit_count[i] % self.bits_per_module;
            if bit_difference != 0
                && bit_difference * 2 == self.bits_per_module
                && self.module_bit_count[i] > biggest
            {
                biggest = self.module_bit_count[i];
                index = Some(i);
            }
        }
        match index {
            Some(i) => {
                let half = self.bits_per_module / 2;
                if self.is_too_small() {
                    self.add(i, self.bits_per_module - half);
                } else {
                    self.subtract(i, half);
                }
                true
            }
            None => false,
        }
    }

    /// Snap the run furthest from a module boundary to it
    fn adjust_biggest_difference(&mut self) -> bool {
        let mut index = None;
        let mut biggest_size = -1;
        let mut biggest_difference = -1;
        for i in 0..BARS_IN_MODULE {
            let bit_difference = self.module_bit_count[i] % self.bits_per_module;
            if bit_difference == 0 {
                continue;
            }
            if bit_difference > biggest_difference
                || (bit_difference == biggest_difference && self.module_bit_count[i] > biggest_size)
            {
                biggest_difference = bit_difference;
                biggest_size = self.module_bit_count[i];
                index = Some(i);
            }
        }
        match index {
            Some(i) => {
                if self.is_too_small() {
                    self.add(i, self.bits_per_module - biggest_difference);
                } else {
                    self.subtract(i, biggest_difference);
                }
                true
            }
            None => false,
        }
    }

    /// Last resort: change the widest run by a whole module
    fn adjust_whole_module(&mut self) -> bool {
        let mut index = 0;
        let mut biggest = -1;
        for i in 0..BARS_IN_MODULE {
            if self.module_bit_count[i] > biggest {
                biggest = self.module_bit_count[i];
                index = i;
            }
        }
        if self.is_too_small() {
            self.add(index, self.bits_per_module);
        } else {
            self.subtract(index, self.bits_per_module);
        }
        true
    }

    /// Total is right but remainders don't pair up as neighbors: round the
    /// run with the largest remainder to its nearest boundary. This breaks
    /// the stalemate by making the total off again, which re-arms the main
    /// ladder on the next step.
    fn nudge_largest_remainder(&mut self) -> bool {
        let mut index = None;
        let mut biggest_difference = 0;
        for i in 0..BARS_IN_MODULE {
            let bit_difference = self.module_bit_count[i] % self.bits_per_module;
            if bit_difference > biggest_difference {
                biggest_difference = bit_difference;
                index = Some(i);
            }
        }
        match index {
            Some(i) => {
                if biggest_difference * 2 >= self.bits_per_module {
                    self.add(i, self.bits_per_module - biggest_difference);
                } else {
                    self.subtract(i, biggest_difference);
                }
                true
            }
            None => false,
        }
    }

    /// Total is right but two adjacent runs straddle a boundary: grow the
    /// bigger one and shrink the smaller one (the later one wins a tie).
    fn rebalance_half_size_neighbors(&mut self) -> bool {
        let mut changed = false;
        let mut previous: Option<usize> = None;
        for i in 0..BARS_IN_MODULE {
            let bit_difference = self.module_bit_count[i] % self.bits_per_module;
            if bit_difference == 0 || bit_difference * 2 != self.bits_per_module {
                continue;
            }
            match previous {
                Some(p) if p == i - 1 => {
                    if self.module_bit_count[i] >= self.module_bit_count[p] {
                        self.add(i, self.bits_per_module - bit_difference);
                        self.subtract(p, bit_difference);
                    } else {
                        self.subtract(i, bit_difference);
                        self.add(p, self.bits_per_module - bit_difference);
                    }
                    changed = true;
                    previous = None;
                }
                _ => previous = Some(i),
            }
        }
        changed
    }
}
