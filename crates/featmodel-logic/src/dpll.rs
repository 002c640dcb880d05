//! Iterative DPLL: unit propagation with chronological backtracking.
//!
//! Decisions pick the lowest unassigned variable and try `false` first, so
//! satisfying assignments lean towards small selections, matching the BDD
//! engine's preference.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Propagation {
    Stable,
    Conflict,
}

struct Decision {
    trail_mark: usize,
    var: usize,
    flipped: bool,
}

struct Search<'c> {
    clauses: &'c [Vec<i32>],
    values: Vec<Option<bool>>,
    trail: Vec<usize>,
    decisions: Vec<Decision>,
}

impl Search<'_> {
    fn value_of(&self, lit: i32) -> Option<bool> {
        self.values[lit.unsigned_abs() as usize].map(|v| v == (lit > 0))
    }

    fn assign(&mut self, var: usize, value: bool) {
        self.values[var] = Some(value);
        self.trail.push(var);
    }

    fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some(var) = self.trail.pop() {
                self.values[var] = None;
            }
        }
    }

    fn propagate(&mut self) -> Propagation {
        loop {
            let mut changed = false;
            for clause in self.clauses {
                let mut satisfied = false;
                let mut open = None;
                let mut open_count = 0;
                for lit in clause {
                    match self.value_of(*lit) {
                        Some(true) => {
                            satisfied = true;
                            break;
                        }
                        Some(false) => {}
                        None => {
                            open_count += 1;
                            open = Some(*lit);
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                match (open_count, open) {
                    (0, _) => return Propagation::Conflict,
                    (1, Some(lit)) => {
                        self.assign(lit.unsigned_abs() as usize, lit > 0);
                        changed = true;
                    }
                    _ => {}
                }
            }
            if !changed {
                return Propagation::Stable;
            }
        }
    }

    /// Flip the most recent unflipped decision. `false` when exhausted.
    fn backtrack(&mut self) -> bool {
        while let Some(decision) = self.decisions.pop() {
            self.undo_to(decision.trail_mark);
            if !decision.flipped {
                self.decisions.push(Decision {
                    flipped: true,
                    ..decision
                });
                self.assign(decision.var, true);
                return true;
            }
        }
        false
    }
}

/// Find a model of `clauses` over variables `1..=num_vars`.
///
/// Returns the assignment indexed by `var - 1`, or `None` when unsatisfiable.
pub fn solve(num_vars: usize, clauses: &[Vec<i32>]) -> Option<Vec<bool>> {
    if clauses.iter().any(|c| c.is_empty()) {
        return None;
    }
    let max_var = clauses
        .iter()
        .flatten()
        .map(|lit| lit.unsigned_abs() as usize)
        .max()
        .unwrap_or(0)
        .max(num_vars);

    let mut search = Search {
        clauses,
        values: vec![None; max_var + 1],
        trail: Vec::new(),
        decisions: Vec::new(),
    };

    loop {
        if search.propagate() == Propagation::Conflict {
            if !search.backtrack() {
                return None;
            }
            continue;
        }
        let next = (1..=max_var).find(|var| search.values[*var].is_none());
        match next {
            Some(var) => {
                search.decisions.push(Decision {
                    trail_mark: search.trail.len(),
                    var,
                    flipped: false,
                });
                search.assign(var, false);
            }
            None => {
                return Some(
                    search.values[1..=num_vars]
                        .iter()
                        .map(|v| v.unwrap_or(false))
                        .collect(),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfies_horn_chain() {
        let model = solve(3, &[vec![1], vec![-1, 2], vec![-2, 3]]).expect("satisfiable");
        assert_eq!(model, vec![true, true, true]);
    }

    #[test]
    fn detects_unsat_after_backtracking() {
        // (x1 ∨ x2) ∧ (x1 ∨ ¬x2) ∧ (¬x1 ∨ x2) ∧ (¬x1 ∨ ¬x2)
        let clauses = vec![vec![1, 2], vec![1, -2], vec![-1, 2], vec![-1, -2]];
        assert!(solve(2, &clauses).is_none());
    }

    #[test]
    fn empty_clause_is_unsat() {
        assert!(solve(1, &[vec![]]).is_none());
    }

    #[test]
    fn prefers_false_decisions() {
        let model = solve(3, &[vec![1, 2, 3]]).expect("satisfiable");
        assert_eq!(model, vec![false, false, true]);
    }

    #[test]
    fn pigeonhole_three_into_two_is_unsat() {
        // p_{i,h}: pigeon i in hole h, var = i * 2 + h + 1
        let var = |i: i32, h: i32| i * 2 + h + 1;
        let mut clauses = Vec::new();
        for i in 0..3 {
            clauses.push(vec![var(i, 0), var(i, 1)]);
        }
        for h in 0..2 {
            for i in 0..3 {
                for j in (i + 1)..3 {
                    clauses.push(vec![-var(i, h), -var(j, h)]);
                }
            }
        }
        assert!(solve(6, &clauses).is_none());
    }
}
