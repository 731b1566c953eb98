#![crate_name = "fv"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]
#![doc = include_str!("../README.md")]

mod ciphertext;
mod encoder;
mod encryptor;
mod errors;
mod key_generator;
mod keys;
mod sampling;

pub mod chooser;
pub mod decryptor;
pub mod evaluator;
pub mod parameters;
pub mod simulator;

mod ring;

pub use ciphertext::Ciphertext;
pub use decryptor::Decryptor;
pub use encoder::IntegerEncoder;
pub use encryptor::Encryptor;
pub use errors::{Error, Result};
pub use evaluator::Evaluator;
pub use key_generator::KeyGenerator;
pub use keys::{EvaluationKeys, GaloisKeys, PublicKey, SecretKey};
pub use parameters::{EncryptionParameterQualifiers, FvParameters, FvParametersBuilder};

// Test the source code included in the README.
#[macro_use]
extern crate doc_comment;
doctest!("../README.md");

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fv_math::rq::BigPoly;
    use fv_math::uint::BigUInt;
    use fv_traits::{DeserializeUsingParameters, Serialize};

    use crate::{
        Ciphertext, Decryptor, Encryptor, Evaluator, FvParameters, FvParametersBuilder,
        IntegerEncoder, KeyGenerator,
    };

    // A small NTT-capable parameter set with an auxiliary modulus, so
    // multiplication runs through the double-NTT path.
    fn ntt_params() -> Arc<FvParameters> {
        let mut b = FvParametersBuilder::new();
        b.set_poly_modulus_degree(16)
            .unwrap()
            .set_coeff_modulus(&BigUInt::from((1u64 << 60) - (1 << 14) + 1))
            .unwrap()
            .set_aux_coeff_modulus(
                &(&(&(&BigUInt::from(1u64) << 116) - &(&BigUInt::from(1u64) << 18)) + 1),
            )
            .unwrap()
            .set_plain_modulus_u64(16)
            .unwrap();
        b.build_arc().unwrap()
    }

    // A Nussbaumer-only parameter set: q - 1 = 2 * odd admits no 2n-th
    // root of unity, so every product runs through the wide convolution.
    fn nussbaumer_params() -> Arc<FvParameters> {
        let mut b = FvParametersBuilder::new();
        b.set_poly_modulus_degree(16)
            .unwrap()
            .set_coeff_modulus(&BigUInt::from((1u64 << 48) - (1 << 16) - 1))
            .unwrap()
            .set_plain_modulus_u64(16)
            .unwrap();
        b.build_arc().unwrap()
    }

    struct Fixture {
        params: Arc<FvParameters>,
        encryptor: Encryptor,
        decryptor: Decryptor,
        evaluator: Evaluator,
    }

    fn fixture(params: Arc<FvParameters>) -> Fixture {
        let mut keygen = KeyGenerator::new(&params).unwrap();
        let evk = keygen.generate_evaluation_keys(12, 3).unwrap();
        let gk = keygen.generate_galois_keys(12).unwrap();
        let encryptor = Encryptor::new(&params, keygen.public_key()).unwrap();
        let decryptor = Decryptor::new(&params, keygen.secret_key()).unwrap();
        let evaluator = Evaluator::new(&params)
            .unwrap()
            .with_evaluation_keys(evk)
            .unwrap()
            .with_galois_keys(gk)
            .unwrap();
        Fixture {
            params,
            encryptor,
            decryptor,
            evaluator,
        }
    }

    fn plain(coeffs: &[u64]) -> BigPoly {
        BigPoly::from_u64_coeffs(coeffs, 5)
    }

    #[test]
    fn test_negate_add_sub() {
        for params in [ntt_params(), nussbaumer_params()] {
            let f = fixture(params);
            // 2x + 3 and 5x + 7
            let c1 = f.encryptor.encrypt(&plain(&[3, 2])).unwrap();
            let c2 = f.encryptor.encrypt(&plain(&[7, 5])).unwrap();

            let sum = f.evaluator.add(&c1, &c2).unwrap();
            assert_eq!(f.decryptor.decrypt(&sum).unwrap(), plain(&[10, 7]));

            let diff = f.evaluator.sub(&c2, &c1).unwrap();
            assert_eq!(f.decryptor.decrypt(&diff).unwrap(), plain(&[4, 3]));

            let neg = f.evaluator.negate(&c1).unwrap();
            assert_eq!(f.decryptor.decrypt(&neg).unwrap(), plain(&[13, 14]));

            let many = f.evaluator.add_many(&[c1.clone(), c1.clone(), c2]).unwrap();
            assert_eq!(f.decryptor.decrypt(&many).unwrap(), plain(&[13, 9]));
        }
    }

    #[test]
    fn test_multiply_and_relinearize() {
        for params in [ntt_params(), nussbaumer_params()] {
            let f = fixture(params);
            // (2x + 3)(5x + 7) = 10x^2 + 29x + 21 = 10x^2 + 13x + 5 mod 16
            let c1 = f.encryptor.encrypt(&plain(&[3, 2])).unwrap();
            let c2 = f.encryptor.encrypt(&plain(&[7, 5])).unwrap();
            let product = f.evaluator.multiply(&c1, &c2).unwrap();
            assert_eq!(product.size(), 3);
            assert_eq!(f.decryptor.decrypt(&product).unwrap(), plain(&[5, 13, 10]));

            let relinearized = f.evaluator.relinearize(&product, 2).unwrap();
            assert_eq!(relinearized.size(), 2);
            assert_eq!(
                f.decryptor.decrypt(&relinearized).unwrap(),
                plain(&[5, 13, 10])
            );
        }
    }

    #[test]
    fn test_square_matches_multiply() {
        for params in [ntt_params(), nussbaumer_params()] {
            let f = fixture(params);
            let c = f.encryptor.encrypt(&plain(&[3, 2, 0, 1])).unwrap();
            let squared = f.evaluator.square(&c).unwrap();
            let multiplied = f.evaluator.multiply(&c, &c).unwrap();
            assert_eq!(
                f.decryptor.decrypt(&squared).unwrap(),
                f.decryptor.decrypt(&multiplied).unwrap()
            );

            // Squaring a size-3 ciphertext goes through the generic path.
            let big = f.evaluator.square(&squared).unwrap();
            assert_eq!(big.size(), 5);
            let expected = f
                .decryptor
                .decrypt(&f.evaluator.multiply(&squared, &squared).unwrap())
                .unwrap();
            assert_eq!(f.decryptor.decrypt(&big).unwrap(), expected);
        }
    }

    #[test]
    fn test_plain_operations() {
        for params in [ntt_params(), nussbaumer_params()] {
            let f = fixture(params);
            let c = f.encryptor.encrypt(&plain(&[3, 2])).unwrap();
            let p = plain(&[1, 0, 4]);

            let sum = f.evaluator.add_plain(&c, &p).unwrap();
            assert_eq!(f.decryptor.decrypt(&sum).unwrap(), plain(&[4, 2, 4]));

            let diff = f.evaluator.sub_plain(&c, &p).unwrap();
            assert_eq!(f.decryptor.decrypt(&diff).unwrap(), plain(&[2, 2, 12]));

            // (2x + 3)(4x^2 + 1) = 8x^3 + 12x^2 + 2x + 3
            let product = f.evaluator.multiply_plain(&c, &p).unwrap();
            assert_eq!(product.size(), 2);
            assert_eq!(
                f.decryptor.decrypt(&product).unwrap(),
                plain(&[3, 2, 12, 8])
            );

            assert!(f.evaluator.multiply_plain(&c, &plain(&[0])).is_err());
        }
    }

    #[test]
    fn test_exponentiate() {
        for params in [ntt_params(), nussbaumer_params()] {
            let f = fixture(params);
            // (x + 2)^3 = x^3 + 6x^2 + 12x + 8
            let c = f.encryptor.encrypt(&plain(&[2, 1])).unwrap();
            let cubed = f.evaluator.exponentiate(&c, 3).unwrap();
            assert_eq!(
                f.decryptor.decrypt(&cubed).unwrap(),
                plain(&[8, 12, 6, 1])
            );
            assert!(f.evaluator.exponentiate(&c, 0).is_err());
            assert_eq!(
                f.decryptor
                    .decrypt(&f.evaluator.exponentiate(&c, 1).unwrap())
                    .unwrap(),
                plain(&[2, 1])
            );
        }
    }

    #[test]
    fn test_relinearize_requires_keys() {
        let params = ntt_params();
        let keygen = KeyGenerator::new(&params).unwrap();
        let encryptor = Encryptor::new(&params, keygen.public_key()).unwrap();
        let evaluator = Evaluator::new(&params).unwrap();

        let c = encryptor.encrypt(&plain(&[1, 2])).unwrap();
        let product = evaluator.multiply(&c, &c).unwrap();
        let err = evaluator.relinearize(&product, 2).unwrap_err();
        assert!(matches!(err, crate::Error::LogicError(_)));
    }

    #[test]
    fn test_ntt_transform_roundtrip() {
        let f = fixture(ntt_params());
        let c = f.encryptor.encrypt(&plain(&[3, 1, 4, 1, 5])).unwrap();
        let c_ntt = f.evaluator.transform_to_ntt(&c).unwrap();
        assert!(c_ntt.is_ntt_form());
        let back = f.evaluator.transform_from_ntt(&c_ntt).unwrap();
        assert_eq!(
            f.decryptor.decrypt(&back).unwrap(),
            f.decryptor.decrypt(&c).unwrap()
        );

        // Mixed-domain operations are refused.
        assert!(f.evaluator.multiply(&c_ntt, &c).is_err());
        assert!(f.evaluator.transform_from_ntt(&c).is_err());
    }

    #[test]
    fn test_multiply_plain_ntt() {
        let f = fixture(ntt_params());
        let c = f.encryptor.encrypt(&plain(&[3, 2])).unwrap();
        let p = plain(&[1, 0, 4]);

        let c_ntt = f.evaluator.transform_to_ntt(&c).unwrap();
        let p_ntt = f.evaluator.transform_plain_to_ntt(&p).unwrap();
        let product_ntt = f.evaluator.multiply_plain_ntt(&c_ntt, &p_ntt).unwrap();
        let product = f.evaluator.transform_from_ntt(&product_ntt).unwrap();
        assert_eq!(
            f.decryptor.decrypt(&product).unwrap(),
            plain(&[3, 2, 12, 8])
        );

        // The plaintext transform itself round-trips.
        let p_back = f.evaluator.transform_plain_from_ntt(&p_ntt).unwrap();
        assert_eq!(p_back, p);
    }

    #[test]
    fn test_rotations() {
        let f = fixture(ntt_params());
        let p = plain(&[1, 2, 3]);
        let c = f.encryptor.encrypt(&p).unwrap();

        // A rotation by zero steps is the identity.
        let same = f.evaluator.rotate_rows(&c, 0).unwrap();
        assert_eq!(f.decryptor.decrypt(&same).unwrap(), p);

        // Rotations decrypt to the automorphism image of the plaintext.
        for steps in [1i64, 2, 3, -1] {
            let rotated = f.evaluator.rotate_rows(&c, steps).unwrap();
            let decrypted = f.decryptor.decrypt(&rotated).unwrap();
            // The composite Galois element actually applied.
            let row_size = (f.params.degree() / 2) as i64;
            let m = 2 * f.params.degree() as u64;
            let mut elt = 1u64;
            for _ in 0..steps.rem_euclid(row_size) {
                elt = (elt * 3) % m;
            }
            let expected = plain_automorphism(&p, elt, f.params.degree(), 16);
            assert_eq!(decrypted, expected, "steps {steps}");
        }

        let swapped = f.evaluator.rotate_columns(&c).unwrap();
        let expected =
            plain_automorphism(&p, 2 * f.params.degree() as u64 - 1, f.params.degree(), 16);
        assert_eq!(f.decryptor.decrypt(&swapped).unwrap(), expected);
    }

    // x -> x^elt on a plaintext mod (x^n + 1, t).
    fn plain_automorphism(p: &BigPoly, elt: u64, n: usize, t: u64) -> BigPoly {
        let mut out = vec![0u64; n];
        for i in 0..p.significant_coeff_count() {
            let c = p.coeff_big_uint(i).low_u64();
            if c == 0 {
                continue;
            }
            let index = (i as u64 * elt) % (2 * n as u64);
            if (index as usize) < n {
                out[index as usize] = (out[index as usize] + c) % t;
            } else {
                out[index as usize - n] = (out[index as usize - n] + t - (c % t)) % t;
            }
        }
        BigPoly::from_u64_coeffs(&out, 5)
    }

    #[test]
    fn test_ciphertext_serialization_roundtrip() {
        for params in [ntt_params(), nussbaumer_params()] {
            let f = fixture(params.clone());
            let c = f.encryptor.encrypt(&plain(&[3, 1, 4])).unwrap();
            let bytes = c.to_bytes();
            let back = Ciphertext::from_bytes(&bytes, &params).unwrap();
            assert_eq!(c, back);
            assert_eq!(f.decryptor.decrypt(&back).unwrap(), plain(&[3, 1, 4]));
        }
    }

    #[test]
    fn test_encoder_roundtrip_through_encryption() {
        let f = fixture(ntt_params());
        let encoder = IntegerEncoder::new(f.params.plain_modulus()).unwrap();

        let c1 = f.encryptor.encrypt(&encoder.encode(5)).unwrap();
        let c2 = f.encryptor.encrypt(&encoder.encode(7)).unwrap();
        let product = f.evaluator.relinearize(&f.evaluator.multiply(&c1, &c2).unwrap(), 2).unwrap();
        let sum = f.evaluator.add(&c1, &c2).unwrap();

        assert_eq!(
            encoder
                .decode_u64(&f.decryptor.decrypt(&product).unwrap())
                .unwrap(),
            35
        );
        assert_eq!(
            encoder
                .decode_u64(&f.decryptor.decrypt(&sum).unwrap())
                .unwrap(),
            12
        );
    }

    #[test]
    fn test_noise_budget_decreases_monotonically() {
        let f = fixture(ntt_params());
        let c = f.encryptor.encrypt(&plain(&[1, 2, 3])).unwrap();
        let fresh_budget = f.decryptor.invariant_noise_budget(&c).unwrap();
        assert!(fresh_budget > 20);

        let squared = f.evaluator.square(&c).unwrap();
        let squared_budget = f.decryptor.invariant_noise_budget(&squared).unwrap();
        assert!(squared_budget < fresh_budget);

        let relinearized = f.evaluator.relinearize(&squared, 2).unwrap();
        let relin_budget = f.decryptor.invariant_noise_budget(&relinearized).unwrap();
        assert!(relin_budget <= squared_budget);
        assert!(relin_budget > 0);
    }
}
