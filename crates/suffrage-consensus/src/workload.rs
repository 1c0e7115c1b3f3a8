//! The computation every unit votes on.
//!
//! The protocol only needs a deterministic `u32 -> u32` function where 0
//! means "no result". The deployed workload is the n-th prime; any other
//! [`Workload`] can be plugged into the engine.

use tracing::trace;

use crate::platform::{Platform, Status};
use crate::tally::Ballot;
use crate::threshold::CALCULATION_THRESHOLD;

/// Sieve length: covers the (threshold + 1)-th prime, 7927, so a faulty unit
/// still answers at the top of the accepted range.
const SIEVE_LEN: usize = 7928;

/// A deterministic workload.
pub trait Workload {
    /// Result for `input`, 0 for none. With `faulty` set the unit must answer
    /// differently from a healthy one.
    fn compute(&self, input: u32, faulty: bool) -> u32;
}

impl<F> Workload for F
where
    F: Fn(u32, bool) -> u32,
{
    fn compute(&self, input: u32, faulty: bool) -> u32 {
        self(input, faulty)
    }
}

/// n-th prime by sieve of Eratosthenes. A faulty unit answers for n + 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct NthPrime;

impl NthPrime {
    /// Largest accepted `n`.
    pub const MAX_INPUT: u32 = CALCULATION_THRESHOLD;

    fn nth(n: u32) -> u32 {
        if n == 0 {
            return 0;
        }

        let mut composite = [false; SIEVE_LEN];
        let mut found = 0;
        for i in 2..SIEVE_LEN {
            if composite[i] {
                continue;
            }
            found += 1;
            if found == n {
                return i as u32;
            }
            let mut k = i * i;
            while k < SIEVE_LEN {
                composite[k] = true;
                k += i;
            }
        }
        0
    }
}

impl Workload for NthPrime {
    fn compute(&self, input: u32, faulty: bool) -> u32 {
        if input == 0 {
            return 0;
        }
        Self::nth(if faulty { input.saturating_add(1) } else { input })
    }
}

/// Runs the workload, applies fault injection and drives the processing light.
#[derive(Debug, Clone)]
pub struct Dispatcher<W> {
    workload: W,
    faulty: bool,
}

impl<W: Workload> Dispatcher<W> {
    pub fn new(workload: W, faulty: bool) -> Self {
        Self { workload, faulty }
    }

    /// Compute the local ballot for `input`.
    pub fn dispatch<P: Platform + ?Sized>(&self, input: u32, platform: &mut P) -> Option<Ballot> {
        platform.set_status(Status::Processing);
        let result = self.workload.compute(input, self.faulty);
        trace!(input, result, faulty = self.faulty, "workload");
        Ballot::new(result)
    }

    /// Flip fault injection, returning the new state.
    pub fn toggle_fault(&mut self) -> bool {
        self.faulty = !self.faulty;
        self.faulty
    }

    pub fn is_faulty(&self) -> bool {
        self.faulty
    }

    pub fn workload(&self) -> &W {
        &self.workload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_primes() {
        let test_cases = [(1, 2), (2, 3), (3, 5), (6, 13), (15, 47), (100, 541), (1000, 7919)];
        for (n, expected) in test_cases {
            assert_eq!(NthPrime.compute(n, false), expected, "prime #{}", n);
        }
    }

    #[test]
    fn faulty_answers_next_prime() {
        assert_eq!(NthPrime.compute(15, true), 53);
        assert_eq!(NthPrime.compute(NthPrime::MAX_INPUT, true), 7927);
    }

    #[test]
    fn zero_has_no_result() {
        assert_eq!(NthPrime.compute(0, false), 0);
        assert_eq!(NthPrime.compute(0, true), 0);
    }

    #[test]
    fn beyond_sieve_has_no_result() {
        assert_eq!(NthPrime.compute(5000, false), 0);
    }

    #[test]
    fn closures_are_workloads() {
        let double = |n: u32, faulty: bool| if faulty { n * 2 + 1 } else { n * 2 };
        let dispatcher = Dispatcher::new(double, false);
        assert_eq!(dispatcher.workload().compute(4, false), 8);
        assert_eq!(dispatcher.workload().compute(4, true), 9);
    }

    #[test]
    fn toggling_fault() {
        let mut dispatcher = Dispatcher::new(NthPrime, false);
        assert!(dispatcher.toggle_fault());
        assert!(dispatcher.is_faulty());
        assert!(!dispatcher.toggle_fault());
    }
}
