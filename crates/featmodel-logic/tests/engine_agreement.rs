//! The BDD and DPLL tiers must agree on every verdict, and any model they
//! return must satisfy every clause.

use featmodel_kernel::{ModelBuilder, ValidationConfig};
use featmodel_logic::engine::{Engine, solve_with};
use featmodel_logic::{LogicalValidator, encode_model};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn satisfies(clauses: &[Vec<i32>], model: &[bool]) -> bool {
    clauses.iter().all(|clause| {
        clause
            .iter()
            .any(|lit| model[lit.unsigned_abs() as usize - 1] == (*lit > 0))
    })
}

fn random_cnf(rng: &mut ChaCha8Rng, num_vars: usize, num_clauses: usize) -> Vec<Vec<i32>> {
    (0..num_clauses)
        .map(|_| {
            let width = rng.gen_range(1..=3);
            (0..width)
                .map(|_| {
                    let var = rng.gen_range(1..=num_vars) as i32;
                    if rng.gen_bool(0.5) { var } else { -var }
                })
                .collect()
        })
        .collect()
}

#[test]
fn engines_agree_on_random_formulas() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let config = ValidationConfig::default();
    let mut sat_seen = 0;
    let mut unsat_seen = 0;
    for round in 0..200 {
        let num_vars = rng.gen_range(3..=10);
        let num_clauses = rng.gen_range(2..=num_vars * 5);
        let clauses = random_cnf(&mut rng, num_vars, num_clauses);

        let bdd = solve_with(Engine::Bdd, num_vars, &clauses, &config);
        let dpll = solve_with(Engine::Dpll, num_vars, &clauses, &config);
        assert_eq!(bdd.engine, Engine::Bdd);
        assert_eq!(
            bdd.is_sat(),
            dpll.is_sat(),
            "round {round}: engines disagree on {clauses:?}"
        );
        match (&bdd.assignment, &dpll.assignment) {
            (Some(a), Some(b)) => {
                assert!(satisfies(&clauses, a), "round {round}: bdd model invalid");
                assert!(satisfies(&clauses, b), "round {round}: dpll model invalid");
                sat_seen += 1;
            }
            _ => unsat_seen += 1,
        }
    }
    assert!(sat_seen > 0 && unsat_seen > 0, "corpus must cover both verdicts");
}

#[test]
fn engines_agree_on_encoded_models() {
    let corpus = vec![
        ModelBuilder::new()
            .root("Car")
            .mandatory("Engine", "Car")
            .optional("Radio", "Car")
            .xor("Engine", &["Petrol", "Diesel", "Electric"])
            .requires("Radio", "Electric"),
        ModelBuilder::new()
            .root("Phone")
            .or_bounded("Phone", &["Camera", "GPS", "NFC", "Radio"], 2, Some(3))
            .excludes("GPS", "NFC")
            .constraint("Camera <=> Radio"),
        ModelBuilder::new()
            .root("R")
            .mandatory("A", "R")
            .mandatory("B", "R")
            .excludes("A", "B"),
    ];
    for builder in corpus {
        let contents = builder.build().expect("model");
        let encoding = encode_model(&contents).expect("encode");
        let clauses = encoding.literal_lists();
        let config = ValidationConfig::default();
        let bdd = solve_with(Engine::Bdd, encoding.num_vars(), &clauses, &config);
        let dpll = solve_with(Engine::Dpll, encoding.num_vars(), &clauses, &config);
        assert_eq!(bdd.is_sat(), dpll.is_sat());
        if let Some(model) = &dpll.assignment {
            assert!(satisfies(&clauses, model));
        }

        let forced_dpll = LogicalValidator::new(&contents)
            .with_config(ValidationConfig {
                bdd_max_variables: 0,
                ..ValidationConfig::default()
            })
            .validate_feature_model();
        let default = LogicalValidator::new(&contents).validate_feature_model();
        assert_eq!(forced_dpll.is_ok(), default.is_ok());
    }
}
