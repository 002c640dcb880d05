//! Reduced ordered binary decision diagrams over the model's variables.
//!
//! Nodes live in one arena; `0` and `1` are the terminals. Variables are
//! ordered by their 1-based number. The diagram is built clause by clause,
//! so intermediate results stay canonical and the unique table keeps them
//! shared.

use std::collections::HashMap;

type NodeId = u32;

const FALSE: NodeId = 0;
const TRUE: NodeId = 1;
const TERMINAL_VAR: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Node {
    var: u32,
    low: NodeId,
    high: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    And,
    Or,
}

/// The diagram outgrew its node budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("bdd exceeded node limit of {limit}")]
pub struct NodeLimitExceeded {
    pub limit: usize,
}

pub struct Bdd {
    nodes: Vec<Node>,
    unique: HashMap<Node, NodeId>,
    cache: HashMap<(Op, NodeId, NodeId), NodeId>,
    node_limit: usize,
}

impl Bdd {
    pub fn new(node_limit: usize) -> Self {
        let terminal = |id| Node {
            var: TERMINAL_VAR,
            low: id,
            high: id,
        };
        Self {
            nodes: vec![terminal(FALSE), terminal(TRUE)],
            unique: HashMap::new(),
            cache: HashMap::new(),
            node_limit,
        }
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    fn var_of(&self, id: NodeId) -> u32 {
        self.nodes[id as usize].var
    }

    fn mk(&mut self, var: u32, low: NodeId, high: NodeId) -> Result<NodeId, NodeLimitExceeded> {
        if low == high {
            return Ok(low);
        }
        let node = Node { var, low, high };
        if let Some(id) = self.unique.get(&node) {
            return Ok(*id);
        }
        if self.nodes.len() >= self.node_limit {
            return Err(NodeLimitExceeded {
                limit: self.node_limit,
            });
        }
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        self.unique.insert(node, id);
        Ok(id)
    }

    /// Diagram of a single signed DIMACS literal.
    pub fn literal(&mut self, lit: i32) -> Result<NodeId, NodeLimitExceeded> {
        let var = lit.unsigned_abs();
        if lit > 0 {
            self.mk(var, FALSE, TRUE)
        } else {
            self.mk(var, TRUE, FALSE)
        }
    }

    fn apply(&mut self, op: Op, a: NodeId, b: NodeId) -> Result<NodeId, NodeLimitExceeded> {
        match (op, a, b) {
            (Op::And, FALSE, _) | (Op::And, _, FALSE) => return Ok(FALSE),
            (Op::And, TRUE, x) | (Op::And, x, TRUE) => return Ok(x),
            (Op::Or, TRUE, _) | (Op::Or, _, TRUE) => return Ok(TRUE),
            (Op::Or, FALSE, x) | (Op::Or, x, FALSE) => return Ok(x),
            _ => {}
        }
        if a == b {
            return Ok(a);
        }
        let key = if a <= b { (op, a, b) } else { (op, b, a) };
        if let Some(hit) = self.cache.get(&key) {
            return Ok(*hit);
        }

        let (va, vb) = (self.var_of(a), self.var_of(b));
        let var = va.min(vb);
        let (a_low, a_high) = self.cofactors(a, var);
        let (b_low, b_high) = self.cofactors(b, var);
        let low = self.apply(op, a_low, b_low)?;
        let high = self.apply(op, a_high, b_high)?;
        let result = self.mk(var, low, high)?;
        self.cache.insert(key, result);
        Ok(result)
    }

    fn cofactors(&self, id: NodeId, var: u32) -> (NodeId, NodeId) {
        let node = self.nodes[id as usize];
        if node.var == var {
            (node.low, node.high)
        } else {
            (id, id)
        }
    }

    pub fn and(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, NodeLimitExceeded> {
        self.apply(Op::And, a, b)
    }

    pub fn or(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, NodeLimitExceeded> {
        self.apply(Op::Or, a, b)
    }

    /// Conjunction of DIMACS clauses.
    pub fn from_clauses(&mut self, clauses: &[Vec<i32>]) -> Result<NodeId, NodeLimitExceeded> {
        let mut acc = TRUE;
        for clause in clauses {
            let mut disjunction = FALSE;
            for lit in clause {
                let node = self.literal(*lit)?;
                disjunction = self.or(disjunction, node)?;
            }
            acc = self.and(acc, disjunction)?;
            if acc == FALSE {
                break;
            }
        }
        Ok(acc)
    }

    pub fn is_false(&self, id: NodeId) -> bool {
        id == FALSE
    }

    /// One satisfying assignment; variables off the chosen path are false.
    ///
    /// The low branch is preferred, so the result leans towards small
    /// selections.
    pub fn one_sat(&self, root: NodeId, num_vars: usize) -> Option<Vec<bool>> {
        if root == FALSE {
            return None;
        }
        let mut assignment = vec![false; num_vars];
        let mut current = root;
        while current != TRUE {
            let node = self.nodes[current as usize];
            if node.low != FALSE {
                current = node.low;
            } else {
                if let Some(slot) = assignment.get_mut(node.var as usize - 1) {
                    *slot = true;
                }
                current = node.high;
            }
        }
        Some(assignment)
    }

    /// Number of satisfying assignments over variables `1..=num_vars`.
    ///
    /// Returns `None` when the count does not fit in `u128`.
    pub fn sat_count(&self, root: NodeId, num_vars: usize) -> Option<u128> {
        let level = |id: NodeId| -> u32 {
            let var = self.var_of(id);
            if var == TERMINAL_VAR {
                num_vars as u32 + 1
            } else {
                var
            }
        };
        let scaled = |count: u128, gap: u32| -> Option<u128> {
            if count == 0 {
                return Some(0);
            }
            count.checked_mul(1u128.checked_shl(gap)?)
        };

        let mut memo: HashMap<NodeId, u128> = HashMap::from([(FALSE, 0), (TRUE, 1)]);
        let mut stack = vec![root];
        while let Some(&id) = stack.last() {
            if memo.contains_key(&id) {
                stack.pop();
                continue;
            }
            let node = self.nodes[id as usize];
            let pending: Vec<NodeId> = [node.low, node.high]
                .into_iter()
                .filter(|child| !memo.contains_key(child))
                .collect();
            if !pending.is_empty() {
                stack.extend(pending);
                continue;
            }
            let low = scaled(memo[&node.low], level(node.low) - node.var - 1)?;
            let high = scaled(memo[&node.high], level(node.high) - node.var - 1)?;
            memo.insert(id, low.checked_add(high)?);
            stack.pop();
        }
        scaled(memo[&root], level(root) - 1)
    }
}

/// Solve `clauses` with a fresh diagram.
pub fn solve(
    num_vars: usize,
    clauses: &[Vec<i32>],
    node_limit: usize,
) -> Result<Option<Vec<bool>>, NodeLimitExceeded> {
    let mut bdd = Bdd::new(node_limit);
    let root = bdd.from_clauses(clauses)?;
    Ok(bdd.one_sat(root, num_vars))
}

/// Count the models of `clauses` over `num_vars` variables.
pub fn count_models(
    num_vars: usize,
    clauses: &[Vec<i32>],
    node_limit: usize,
) -> Result<Option<u128>, NodeLimitExceeded> {
    let mut bdd = Bdd::new(node_limit);
    let root = bdd.from_clauses(clauses)?;
    Ok(bdd.sat_count(root, num_vars))
}
