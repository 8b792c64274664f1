use std::sync::OnceLock;

use crate::error::DecodeError;

/// PDF417 error correction works in the prime field GF(929) ("modulus"
/// arithmetic), not the usual GF(2^8); 3 generates the multiplicative group.
pub struct ModulusGf {
    exp_table: Vec<i32>,
    log_table: Vec<i32>,
}

/// Field size
pub const MODULUS: i32 = 929;
const GENERATOR: i32 = 3;

static FIELD: OnceLock<ModulusGf> = OnceLock::new();

impl ModulusGf {
    fn new() -> Self {
        let mut exp_table = vec![0i32; MODULUS as usize];
        let mut log_table = vec![0i32; MODULUS as usize];
        let mut x = 1i32;
        for value in exp_table.iter_mut() {
            *value = x;
            x = x * GENERATOR % MODULUS;
        }
        for (i, &value) in exp_table.iter().enumerate().take(MODULUS as usize - 1) {
            log_table[value as usize] = i as i32;
        }
        Self {
            exp_table,
            log_table,
        }
    }

    /// The process-wide field instance; tables are built once and read-only
    /// afterwards, so sharing across concurrent decodes is safe.
    pub fn shared() -> &'static ModulusGf {
        FIELD.get_or_init(ModulusGf::new)
    }

    fn add(&self, a: i32, b: i32) -> i32 {
        (a + b) % MODULUS
    }

    fn subtract(&self, a: i32, b: i32) -> i32 {
        (MODULUS + a - b) % MODULUS
    }

    fn multiply(&self, a: i32, b: i32) -> i32 {
        if a == 0 || b == 0 {
            return 0;
        }
        self.exp((self.log_table[a as usize] + self.log_table[b as usize]) % (MODULUS - 1))
    }

    fn exp(&self, a: i32) -> i32 {
        self.exp_table[a as usize]
    }

    fn log(&self, a: i32) -> i32 {
        debug_assert!(a != 0);
        self.log_table[a as usize]
    }

    fn inverse(&self, a: i32) -> i32 {
        debug_assert!(a != 0);
        self.exp(MODULUS - 1 - self.log(a))
    }
}

/// Polynomial over [`ModulusGf`]; coefficients are stored highest degree
/// first, with leading zeros stripped.
#[derive(Debug, Clone)]
struct ModulusPoly {
    coefficients: Vec<i32>,
}

impl ModulusPoly {
    fn new(coefficients: Vec<i32>) -> Self {
        debug_assert!(!coefficients.is_empty());
        let first_non_zero = coefficients.iter().position(|&c| c != 0);
        let coefficients = match first_non_zero {
            Some(0) => coefficients,
            Some(i) => coefficients[i..].to_vec(),
            None => vec![0],
        };
        Self { coefficients }
    }

    fn zero() -> Self {
        Self {
            coefficients: vec![0],
        }
    }

    fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    fn is_zero(&self) -> bool {
        self.coefficients[0] == 0
    }

    /// Coefficient of the x^degree term
    fn coefficient(&self, degree: usize) -> i32 {
        self.coefficients[self.coefficients.len() - 1 - degree]
    }

    fn evaluate_at(&self, a: i32, field: &ModulusGf) -> i32 {
        if a == 0 {
            return self.coefficient(0);
        }
        if a == 1 {
            return self
                .coefficients
                .iter()
                .fold(0, |sum, &c| field.add(sum, c));
        }
        let mut result = self.coefficients[0];
        for &coefficient in &self.coefficients[1..] {
            result = field.add(field.multiply(a, result), coefficient);
        }
        result
    }

    fn negative(&self, field: &ModulusGf) -> Self {
        Self::new(
            self.coefficients
                .iter()
                .map(|&c| field.subtract(0, c))
                .collect(),
        )
    }

    fn add(&self, other: &Self, field: &ModulusGf) -> Self {
        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }
        let (smaller, larger) = if self.coefficients.len() <= other.coefficients.len() {
            (&self.coefficients, &other.coefficients)
        } else {
            (&other.coefficients, &self.coefficients)
        };
        let length_diff = larger.len() - smaller.len();
        let mut sum = larger[..length_diff].to_vec();
        for (i, &coefficient) in smaller.iter().enumerate() {
            sum.push(field.add(coefficient, larger[length_diff + i]));
        }
        Self::new(sum)
    }

    fn subtract(&self, other: &Self, field: &ModulusGf) -> Self {
        if other.is_zero() {
            return self.clone();
        }
        self.add(&other.negative(field), field)
    }

    fn multiply(&self, other: &Self, field: &ModulusGf) -> Self {
        if self.is_zero() || other.is_zero() {
            return Self::zero();
        }
        let mut product = vec![0i32; self.coefficients.len() + other.coefficients.len() - 1];
        for (i, &a) in self.coefficients.iter().enumerate() {
            for (j, &b) in other.coefficients.iter().enumerate() {
                product[i + j] = field.add(product[i + j], field.multiply(a, b));
            }
        }
        Self::new(product)
    }

    fn multiply_scalar(&self, scalar: i32, field: &ModulusGf) -> Self {
        if scalar == 0 {
            return Self::zero();
        }
        if scalar == 1 {
            return self.clone();
        }
        Self::new(
            self.coefficients
                .iter()
                .map(|&c| field.multiply(c, scalar))
                .collect(),
        )
    }

    /// Multiply by x (shift one degree up)
    fn multiply_by_z(&self, field: &ModulusGf) -> Self {
        self.multiply(&Self::new(vec![1, 0]), field)
    }
}

/// Erasure-aware Reed-Solomon corrector for the PDF417 codeword stream.
pub struct ErrorCorrection;

impl ErrorCorrection {
    /// Correct `codewords` in place. `erasures` holds indexes into
    /// `codewords` whose value is known to be unreliable. Returns the
    /// number of corrected positions (erasures included) or
    /// [`DecodeError::ChecksumFailure`] when the codeword set is
    /// uncorrectable.
    pub fn decode(
        codewords: &mut [u16],
        num_ec_codewords: usize,
        erasures: &[usize],
    ) -> Result<usize, DecodeError> {
        let field = ModulusGf::shared();
        let length = codewords.len();
        if num_ec_codewords == 0 || length <= num_ec_codewords {
            return Err(DecodeError::ChecksumFailure);
        }

        // locator exponents count from the last codeword
        let mirrored_erasures: Vec<i32> = erasures
            .iter()
            .map(|&e| length as i32 - 1 - e as i32)
            .collect();
        if mirrored_erasures.iter().any(|&e| e < 0) {
            return Err(DecodeError::ChecksumFailure);
        }

        let (syndromes, error) = Self::syndromes(codewords, num_ec_codewords, field);
        if !error {
            return Ok(0);
        }

        let syndrome_poly = ModulusPoly::new(syndromes);
        let (sigma, omega) =
            Self::berlekamp_massey(&syndrome_poly, &mirrored_erasures, num_ec_codewords, field)?;

        let error_locations = Self::find_error_locations(&sigma, field)?;
        let error_magnitudes = Self::find_error_magnitudes(&omega, &sigma, &error_locations, field);

        for (i, &location) in error_locations.iter().enumerate() {
            let position = length as i32 - 1 - field.log(location);
            if position < 0 {
                return Err(DecodeError::ChecksumFailure);
            }
            let corrected = field.subtract(
                codewords[position as usize] as i32,
                error_magnitudes[i],
            );
            codewords[position as usize] = corrected as u16;
        }

        // the corrected stream must have vanishing syndromes; anything else
        // is a miscorrection and the symbol is uncorrectable
        let (_, still_bad) = Self::syndromes(codewords, num_ec_codewords, field);
        if still_bad {
            return Err(DecodeError::ChecksumFailure);
        }
        Ok(error_locations.len())
    }

    fn syndromes(
        codewords: &[u16],
        num_ec_codewords: usize,
        field: &ModulusGf,
    ) -> (Vec<i32>, bool) {
        let received = ModulusPoly::new(codewords.iter().map(|&c| c as i32).collect());
        let mut syndromes = vec![0i32; num_ec_codewords];
        let mut error = false;
        for i in (1..=num_ec_codewords).rev() {
            let eval = received.evaluate_at(field.exp(i as i32), field);
            syndromes[num_ec_codewords - i] = eval;
            if eval != 0 {
                error = true;
            }
        }
        (syndromes, error)
    }

    /// Berlekamp-Massey with the erasure locator polynomial folded in as
    /// the initial state, returning (sigma, omega).
    fn berlekamp_massey(
        syndromes: &ModulusPoly,
        erasures: &[i32],
        num_ec_codewords: usize,
        field: &ModulusGf,
    ) -> Result<(ModulusPoly, ModulusPoly), DecodeError> {
        // erasure locator: product of (1 - b*x) over known positions
        let mut gamma = ModulusPoly::new(vec![1]);
        for &erasure in erasures {
            let b = field.exp(erasure);
            let term = ModulusPoly::new(vec![field.subtract(0, b), 1]);
            gamma = gamma.multiply(&term, field);
        }

        let mut d_poly = gamma.multiply_by_z(field);
        let mut psi = gamma.clone();
        let mut k: i32 = -1;
        let mut l: i32 = erasures.len() as i32;

        for n in erasures.len()..num_ec_codewords {
            let d = Self::discrepancy(&psi, syndromes, l, n as i32, field)?;
            if d != 0 {
                let psi2 = psi.subtract(&d_poly.multiply_scalar(d, field), field);
                if l < n as i32 - k {
                    let l2 = n as i32 - k;
                    k = n as i32 - l;
                    d_poly = psi.multiply_scalar(field.inverse(d), field);
                    l = l2;
                }
                psi = psi2;
            }
            d_poly = d_poly.multiply_by_z(field);
        }

        let omega = Self::modified_omega(&psi, syndromes, num_ec_codewords, field)?;
        Ok((psi, omega))
    }

    /// sigma * S truncated to the num_ec_codewords lowest-degree terms
    fn modified_omega(
        sigma: &ModulusPoly,
        syndromes: &ModulusPoly,
        num_ec_codewords: usize,
        field: &ModulusGf,
    ) -> Result<ModulusPoly, DecodeError> {
        let product = sigma.multiply(syndromes, field);
        let coefficients = &product.coefficients;
        if coefficients.len() < num_ec_codewords {
            // leading terms vanished; pad back up
            let mut padded = vec![0i32; num_ec_codewords - coefficients.len()];
            padded.extend_from_slice(coefficients);
            return Ok(ModulusPoly::new(padded));
        }
        Ok(ModulusPoly::new(
            coefficients[coefficients.len() - num_ec_codewords..].to_vec(),
        ))
    }

    fn discrepancy(
        psi: &ModulusPoly,
        syndromes: &ModulusPoly,
        l: i32,
        n: i32,
        field: &ModulusGf,
    ) -> Result<i32, DecodeError> {
        if (syndromes.degree() as i32) < n || (psi.degree() as i32) < l || l > n {
            return Err(DecodeError::ChecksumFailure);
        }
        let mut sum = 0;
        for i in 0..=l {
            sum = field.add(
                sum,
                field.multiply(psi.coefficient(i as usize), syndromes.coefficient((n - i) as usize)),
            );
        }
        Ok(sum)
    }

    /// Chien search for the roots of sigma
    fn find_error_locations(
        sigma: &ModulusPoly,
        field: &ModulusGf,
    ) -> Result<Vec<i32>, DecodeError> {
        let num_errors = sigma.degree();
        let mut result = Vec::with_capacity(num_errors);
        for i in 1..MODULUS {
            if result.len() >= num_errors {
                break;
            }
            if sigma.evaluate_at(i, field) == 0 {
                result.push(field.inverse(i));
            }
        }
        if result.len() != num_errors {
            return Err(DecodeError::ChecksumFailure);
        }
        Ok(result)
    }

    /// Forney's formula for the magnitude at each error location
    fn find_error_magnitudes(
        omega: &ModulusPoly,
        sigma: &ModulusPoly,
        error_locations: &[i32],
        field: &ModulusGf,
    ) -> Vec<i32> {
        let degree = sigma.degree();
        if degree == 0 {
            return Vec::new();
        }
        let mut derivative_coefficients = vec![0i32; degree];
        for i in 1..=degree {
            derivative_coefficients[degree - i] =
                field.multiply(i as i32 % MODULUS, sigma.coefficient(i));
        }
        let formal_derivative = ModulusPoly::new(derivative_coefficients);

        error_locations
            .iter()
            .map(|&location| {
                let xi_inverse = field.inverse(location);
                let numerator =
                    field.subtract(0, omega.evaluate_at(xi_inverse, field));
                let denominator =
                    field.inverse(formal_derivative.evaluate_at(xi_inverse, field));
                field.multiply(numerator, denominator)
            })
            .collect()
    }
}

/// Test-only RS encoder: appends `num_ec` correction codewords so that the
/// codeword polynomial vanishes at 3^1 .. 3^num_ec. Used by the synthetic
/// round-trip tests to build valid symbols.
#[cfg(test)]
pub(crate) fn rs_encode(data: &[u16], num_ec: usize) -> Vec<u16> {
    let field = ModulusGf::shared();
    // generator polynomial, highest degree first
    let mut generator = vec![1i32];
    for i in 1..=num_ec {
        let root = field.exp(i as i32);
        // multiply by (x - root)
        let mut next = vec![0i32; generator.len() + 1];
        for (j, &c) in generator.iter().enumerate() {
            next[j] = field.add(next[j], c);
            next[j + 1] = field.add(next[j + 1], field.multiply(c, field.subtract(0, root)));
        }
        generator = next;
    }

    // remainder of data * x^num_ec divided by the generator
    let mut remainder = vec![0i32; num_ec];
    for &d in data {
        let factor = field.add(d as i32, remainder[0]);
        remainder.rotate_left(1);
        remainder[num_ec - 1] = 0;
        for (j, r) in remainder.iter_mut().enumerate() {
            // generator[0] is 1, so factor needs no scaling
            let term = field.multiply(factor, generator[j + 1]);
            *r = field.subtract(*r, term);
        }
    }

    let mut codewords = data.to_vec();
    codewords.extend(remainder.iter().map(|&r| field.subtract(0, r) as u16));
    codewords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_basics() {
        let field = ModulusGf::shared();
        assert_eq!(field.add(928, 1), 0);
        assert_eq!(field.subtract(0, 1), 928);
        assert_eq!(field.multiply(0, 500), 0);
        for a in [1, 2, 3, 57, 450, 928] {
            assert_eq!(field.multiply(a, field.inverse(a)), 1, "a = {a}");
        }
        // 3 generates the group
        assert_eq!(field.exp(0), 1);
        assert_eq!(field.exp(1), 3);
        assert_eq!(field.log(3), 1);
    }

    #[test]
    fn test_no_errors() {
        let data = [5u16, 453, 178, 121, 787];
        let mut codewords = rs_encode(&data, 8);
        let corrected = ErrorCorrection::decode(&mut codewords, 8, &[]).unwrap();
        assert_eq!(corrected, 0);
        assert_eq!(&codewords[..data.len()], &data);
    }

    #[test]
    fn test_corrects_errors() {
        let data = [16u16, 902, 1, 278, 827, 900, 295, 902, 2, 326, 823, 544, 900, 149, 900, 900];
        let mut codewords = rs_encode(&data, 16);
        codewords[0] = 700;
        codewords[5] = 88;
        codewords[20] = 3;
        let corrected = ErrorCorrection::decode(&mut codewords, 16, &[]).unwrap();
        assert_eq!(corrected, 3);
        assert_eq!(&codewords[..data.len()], &data);
    }

    #[test]
    fn test_corrects_erasures() {
        let data = [20u16, 900, 1, 2, 3, 4, 5, 6, 7, 8];
        let mut codewords = rs_encode(&data, 8);
        codewords[2] = 0;
        codewords[7] = 0;
        codewords[9] = 0;
        let corrected = ErrorCorrection::decode(&mut codewords, 8, &[2, 7, 9]).unwrap();
        assert!(corrected >= 3);
        assert_eq!(&codewords[..data.len()], &data);
    }

    #[test]
    fn test_mixed_errors_and_erasures() {
        let data = [9u16, 100, 200, 300, 400, 500, 600];
        let mut codewords = rs_encode(&data, 8);
        codewords[1] = 0; // declared erasure
        codewords[4] = 777; // silent error
        let corrected = ErrorCorrection::decode(&mut codewords, 8, &[1]).unwrap();
        assert!(corrected >= 2);
        assert_eq!(&codewords[..data.len()], &data);
    }

    #[test]
    fn test_uncorrectable_fails() {
        let data = [4u16, 1, 2, 3];
        let mut codewords = rs_encode(&data, 2);
        // one EC codeword corrects no more than one error
        codewords[0] = 700;
        codewords[2] = 555;
        assert_eq!(
            ErrorCorrection::decode(&mut codewords, 2, &[]),
            Err(DecodeError::ChecksumFailure)
        );
    }
}
