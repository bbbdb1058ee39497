use std::collections::{HashMap, VecDeque};

use crate::alignment::candidates::CandidateSet;
use crate::error::GammaError;

/// Solver outputs above this value count as selected.
pub const SELECTION_THRESHOLD: f64 = 0.9;

/// Relative slack when comparing a bound against the incumbent.
const COST_EPS: f64 = 1e-9;

/// Sparse 0/1 matrix stored by column: `columns[c]` lists the rows set to 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintMatrix {
    num_rows: usize,
    columns: Vec<Vec<usize>>,
}

impl ConstraintMatrix {
    pub fn new(num_rows: usize, columns: Vec<Vec<usize>>) -> Self {
        debug_assert!(columns.iter().flatten().all(|&row| row < num_rows));
        Self { num_rows, columns }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, col: usize) -> &[usize] {
        &self.columns[col]
    }

    /// `A · x` restricted to the given selected columns.
    pub fn coverage(&self, selected: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_rows];
        for &col in selected {
            for &row in &self.columns[col] {
                counts[row] += 1;
            }
        }
        counts
    }
}

/// Exact set partition: one column per candidate, one row per real unit.
#[derive(Debug, Clone, Default)]
pub struct PartitionProblem {
    pub objective: Vec<f64>,
    pub constraints: ConstraintMatrix,
}

impl PartitionProblem {
    /// Rows are numbered annotator-major: annotator `i`'s units occupy
    /// `offsets[i]..offsets[i] + track_lengths[i]`.
    pub fn from_candidates(candidates: &CandidateSet) -> Self {
        let offsets = unit_offsets(candidates.track_lengths());
        let num_rows = candidates.track_lengths().iter().sum();
        let columns = (0..candidates.len())
            .map(|col| {
                candidates
                    .tuple(col)
                    .iter()
                    .enumerate()
                    .filter(|&(annotator, &slot)| !candidates.is_null(annotator, slot))
                    .map(|(annotator, &slot)| offsets[annotator] + slot)
                    .collect()
            })
            .collect();
        Self {
            objective: candidates.disorders().to_vec(),
            constraints: ConstraintMatrix::new(num_rows, columns),
        }
    }

    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }
}

/// First flattened unit id of each annotator's contiguous range.
pub fn unit_offsets(track_lengths: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(track_lengths.len());
    let mut next = 0;
    for &len in track_lengths {
        offsets.push(next);
        next += len;
    }
    offsets
}

pub fn select_columns(values: &[f64]) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|&(_, &value)| value > SELECTION_THRESHOLD)
        .map(|(col, _)| col)
        .collect()
}

/// Fails unless every row is covered by exactly one selected column.
pub fn check_partition(
    constraints: &ConstraintMatrix,
    selected: &[usize],
) -> Result<(), GammaError> {
    let coverage = constraints.coverage(selected);
    if let Some((row, &count)) = coverage.iter().enumerate().find(|&(_, &c)| c != 1) {
        return Err(GammaError::infeasible(format!(
            "unit {row} is covered by {count} selected candidates"
        )));
    }
    Ok(())
}

/// Exact set partition by branch and bound.
///
/// Units that share no candidate are split into independent components.
/// Each component gets Lagrangian multipliers from a subgradient pass; the
/// node bound charges every uncovered unit its multiplier plus the cheapest
/// per-unit share of reduced cost among the candidates still free. Units are
/// branched on in Cuthill-McKee order, cheapest reduced cost first, and cut
/// subtrees leave a lower bound keyed by the covered set so equivalent
/// partial covers are not searched twice. Returns exact 0/1 values.
pub fn solve_exact_cover(problem: &PartitionProblem) -> Result<Vec<f64>, GammaError> {
    let constraints = &problem.constraints;
    if problem.objective.len() != constraints.num_columns() {
        return Err(GammaError::invalid_input(format!(
            "objective has {} weights for {} columns",
            problem.objective.len(),
            constraints.num_columns()
        )));
    }
    let coverage = constraints.coverage(&(0..constraints.num_columns()).collect::<Vec<_>>());
    if let Some(row) = coverage.iter().position(|&count| count == 0) {
        return Err(GammaError::infeasible(format!(
            "unit {row} is not covered by any candidate"
        )));
    }

    let components = split_components(constraints, &problem.objective);
    let mut values = vec![0.0; constraints.num_columns()];
    let mut nodes = 0u64;
    let mut total = 0.0;
    for component in &components {
        let (cost, chosen, explored) = solve_component(component)?;
        nodes += explored;
        total += cost;
        for local in chosen {
            values[component.global[local]] = 1.0;
        }
    }

    tracing::debug!(
        rows = constraints.num_rows(),
        columns = constraints.num_columns(),
        components = components.len(),
        nodes,
        best_cost = total,
        "solver: exact cover search finished"
    );
    Ok(values)
}

const LAGRANGE_ITERATIONS: usize = 400;
const LAGRANGE_STALL: usize = 15;
const MIN_STEP_SCALE: f64 = 1e-3;

/// Units connected through shared candidates, with rows and columns
/// renumbered locally.
#[derive(Debug, Default)]
struct Component {
    num_rows: usize,
    columns: Vec<Vec<usize>>,
    costs: Vec<f64>,
    global: Vec<usize>,
}

impl Component {
    fn num_columns(&self) -> usize {
        self.columns.len()
    }

    fn row_columns(&self) -> Vec<Vec<usize>> {
        let mut row_columns = vec![Vec::new(); self.num_rows];
        for (col, rows) in self.columns.iter().enumerate() {
            for &row in rows {
                row_columns[row].push(col);
            }
        }
        row_columns
    }

    /// `c_j - Σ_{r ∈ j} u_r` per column, divided by the column's size.
    fn reduced_shares(&self, duals: &[f64]) -> Vec<f64> {
        self.columns
            .iter()
            .zip(&self.costs)
            .map(|(rows, &cost)| {
                let reduced = cost - rows.iter().map(|&r| duals[r]).sum::<f64>();
                reduced / rows.len() as f64
            })
            .collect()
    }
}

fn find_root(parent: &mut [usize], mut row: usize) -> usize {
    while parent[row] != row {
        parent[row] = parent[parent[row]];
        row = parent[row];
    }
    row
}

fn split_components(constraints: &ConstraintMatrix, objective: &[f64]) -> Vec<Component> {
    let num_rows = constraints.num_rows();
    let mut parent: Vec<usize> = (0..num_rows).collect();
    for col in 0..constraints.num_columns() {
        if let Some((&first, rest)) = constraints.column(col).split_first() {
            for &row in rest {
                let a = find_root(&mut parent, first);
                let b = find_root(&mut parent, row);
                if a != b {
                    parent[a] = b;
                }
            }
        }
    }

    let mut component_of = vec![usize::MAX; num_rows];
    let mut local_row = vec![0usize; num_rows];
    let mut components: Vec<Component> = Vec::new();
    for row in 0..num_rows {
        let root = find_root(&mut parent, row);
        if component_of[root] == usize::MAX {
            component_of[root] = components.len();
            components.push(Component::default());
        }
        let component = &mut components[component_of[root]];
        local_row[row] = component.num_rows;
        component.num_rows += 1;
    }
    for col in 0..constraints.num_columns() {
        let rows = constraints.column(col);
        let Some(&first) = rows.first() else {
            continue;
        };
        let root = find_root(&mut parent, first);
        let component = &mut components[component_of[root]];
        component
            .columns
            .push(rows.iter().map(|&row| local_row[row]).collect());
        component.costs.push(objective[col]);
        component.global.push(col);
    }
    components
}

fn tolerance(value: f64) -> f64 {
    if value.is_finite() {
        COST_EPS * value.abs().max(1.0)
    } else {
        0.0
    }
}

/// `Σ_r (u_r + min_{j ∋ r} reduced_share_j)`, a lower bound for any `u`.
fn share_bound(row_columns: &[Vec<usize>], duals: &[f64], shares: &[f64]) -> f64 {
    row_columns
        .iter()
        .zip(duals)
        .map(|(columns, &dual)| {
            dual + columns
                .iter()
                .map(|&col| shares[col])
                .fold(f64::INFINITY, f64::min)
        })
        .sum()
}

/// Takes free candidates in increasing `weights` order; `None` if some unit
/// is left uncovered.
fn greedy_cover(component: &Component, weights: &[f64]) -> Option<(f64, Vec<usize>)> {
    let mut order: Vec<usize> = (0..component.num_columns()).collect();
    order.sort_by(|&a, &b| {
        weights[a]
            .total_cmp(&weights[b])
            .then(component.costs[a].total_cmp(&component.costs[b]))
    });
    let mut covered = vec![false; component.num_rows];
    let mut remaining = component.num_rows;
    let mut cost = 0.0;
    let mut chosen = Vec::new();
    for col in order {
        if remaining == 0 {
            break;
        }
        let rows = &component.columns[col];
        if rows.iter().any(|&row| covered[row]) {
            continue;
        }
        for &row in rows {
            covered[row] = true;
        }
        remaining -= rows.len();
        cost += component.costs[col];
        chosen.push(col);
    }
    (remaining == 0).then_some((cost, chosen))
}

/// Subgradient ascent on the set-partition Lagrangian. Returns the
/// multipliers giving the best [`share_bound`].
fn lagrangian_duals(
    component: &Component,
    row_columns: &[Vec<usize>],
    initial: Vec<f64>,
    upper: f64,
) -> Vec<f64> {
    let target = if upper.is_finite() {
        upper
    } else {
        row_columns
            .iter()
            .map(|columns| {
                columns
                    .iter()
                    .map(|&col| component.costs[col])
                    .fold(0.0, f64::max)
            })
            .sum()
    };

    let mut duals = initial;
    let mut best_duals = duals.clone();
    let mut best_bound = f64::NEG_INFINITY;
    let mut gradient = vec![0.0; component.num_rows];
    let mut scale = 2.0;
    let mut stall = 0;
    for _ in 0..LAGRANGE_ITERATIONS {
        let shares = component.reduced_shares(&duals);
        let bound = share_bound(row_columns, &duals, &shares);
        if bound > best_bound + tolerance(best_bound) {
            best_bound = bound;
            best_duals.clone_from(&duals);
            stall = 0;
        } else {
            stall += 1;
            if stall >= LAGRANGE_STALL {
                scale *= 0.5;
                stall = 0;
            }
        }
        if scale < MIN_STEP_SCALE || target - best_bound <= tolerance(target) {
            break;
        }

        // Relaxed optimum: every candidate with negative reduced cost.
        let mut value: f64 = duals.iter().sum();
        gradient.fill(1.0);
        for (rows, &share) in component.columns.iter().zip(&shares) {
            if share < 0.0 {
                value += share * rows.len() as f64;
                for &row in rows {
                    gradient[row] -= 1.0;
                }
            }
        }
        let norm: f64 = gradient.iter().map(|g| g * g).sum();
        if norm == 0.0 {
            break;
        }
        let step = scale * (target - value).max(tolerance(target)) / norm;
        for (dual, g) in duals.iter_mut().zip(&gradient) {
            *dual += step * g;
        }
    }
    best_duals
}

/// Cuthill-McKee order of the units: breadth-first over the "shares a
/// candidate" graph, low-degree units first. Keeps units that interact close
/// together so the search completes one region before the next.
fn frontier_order(component: &Component) -> Vec<usize> {
    let mut neighbours = vec![Vec::new(); component.num_rows];
    for rows in &component.columns {
        for &a in rows {
            neighbours[a].extend(rows.iter().copied().filter(|&b| b != a));
        }
    }
    for list in &mut neighbours {
        list.sort_unstable();
        list.dedup();
    }
    let degree: Vec<usize> = neighbours.iter().map(Vec::len).collect();

    let mut starts: Vec<usize> = (0..component.num_rows).collect();
    starts.sort_by_key(|&row| (degree[row], row));
    let mut visited = vec![false; component.num_rows];
    let mut order = Vec::with_capacity(component.num_rows);
    let mut queue = VecDeque::new();
    for start in starts {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        while let Some(row) = queue.pop_front() {
            order.push(row);
            let mut next: Vec<usize> = neighbours[row]
                .iter()
                .copied()
                .filter(|&n| !visited[n])
                .collect();
            next.sort_by_key(|&n| (degree[n], n));
            for n in next {
                visited[n] = true;
                queue.push_back(n);
            }
        }
    }
    order
}

fn solve_component(component: &Component) -> Result<(f64, Vec<usize>, u64), GammaError> {
    let mut row_columns = component.row_columns();
    let unit_shares: Vec<f64> = row_columns
        .iter()
        .map(|columns| {
            columns
                .iter()
                .map(|&col| component.costs[col] / component.columns[col].len() as f64)
                .fold(f64::INFINITY, f64::min)
        })
        .collect();

    let mut incumbent = greedy_cover(component, &component.reduced_shares(&unit_shares));
    let upper = incumbent.as_ref().map_or(f64::INFINITY, |(cost, _)| *cost);
    let duals = lagrangian_duals(component, &row_columns, unit_shares, upper);
    let weights = component.reduced_shares(&duals);
    if let Some(candidate) = greedy_cover(component, &weights) {
        if candidate.0 < upper {
            incumbent = Some(candidate);
        }
    }
    for columns in &mut row_columns {
        columns.sort_by(|&a, &b| weights[a].total_cmp(&weights[b]));
    }

    let (best_cost, best) = match incumbent {
        Some((cost, chosen)) => (cost, Some(chosen)),
        None => (f64::INFINITY, None),
    };
    let mut search = Search {
        component,
        order: frontier_order(component),
        row_columns,
        duals,
        weights,
        covered: vec![false; component.num_rows],
        chosen: Vec::new(),
        best_cost,
        best,
        memo: HashMap::new(),
        nodes: 0,
    };
    search.branch(0.0, 0);

    let chosen = search
        .best
        .ok_or_else(|| GammaError::infeasible("no exact partition of the units exists"))?;
    Ok((search.best_cost, chosen, search.nodes))
}

/// Lower bounds on completion cost kept per covered-unit state.
const MEMO_LIMIT: usize = 1 << 18;

struct Search<'a> {
    component: &'a Component,
    /// Units in branching order.
    order: Vec<usize>,
    /// Per unit, candidate columns in increasing reduced share.
    row_columns: Vec<Vec<usize>>,
    duals: Vec<f64>,
    weights: Vec<f64>,
    covered: Vec<bool>,
    chosen: Vec<usize>,
    best_cost: f64,
    best: Option<Vec<usize>>,
    memo: HashMap<Vec<u64>, f64>,
    nodes: u64,
}

impl Search<'_> {
    fn is_free(&self, col: usize) -> bool {
        self.component.columns[col]
            .iter()
            .all(|&row| !self.covered[row])
    }

    fn set_covered(&mut self, col: usize, value: bool) {
        for &row in &self.component.columns[col] {
            self.covered[row] = value;
        }
    }

    /// Bound contribution of an uncovered unit; `None` if nothing can cover it.
    fn row_bound(&self, row: usize) -> Option<f64> {
        self.row_columns[row]
            .iter()
            .find(|&&col| self.is_free(col))
            .map(|&col| self.duals[row] + self.weights[col])
    }

    fn cutoff(&self) -> f64 {
        self.best_cost - tolerance(self.best_cost)
    }

    fn state_key(&self) -> Vec<u64> {
        let mut key = vec![0u64; self.covered.len().div_ceil(64)];
        for (row, &covered) in self.covered.iter().enumerate() {
            if covered {
                key[row / 64] |= 1 << (row % 64);
            }
        }
        key
    }

    /// Explores completions of the current partial cover. Returns the cheapest
    /// completion found, or infinity when every branch was cut.
    ///
    /// Whatever is returned, `min(found, cutoff - cost)` bounds the true
    /// cheapest completion from below, which is what the memo records.
    fn branch(&mut self, cost: f64, start: usize) -> f64 {
        self.nodes += 1;

        let mut pos = start;
        while pos < self.order.len() && self.covered[self.order[pos]] {
            pos += 1;
        }
        if pos == self.order.len() {
            if cost < self.cutoff() {
                self.best_cost = cost;
                self.best = Some(self.chosen.clone());
            }
            return 0.0;
        }
        let row = self.order[pos];

        let mut bound = 0.0;
        for r in 0..self.covered.len() {
            if self.covered[r] {
                continue;
            }
            match self.row_bound(r) {
                Some(share) => bound += share,
                None => return f64::INFINITY,
            }
        }
        if cost + bound >= self.cutoff() {
            return f64::INFINITY;
        }
        let key = self.state_key();
        if let Some(&known) = self.memo.get(&key) {
            if cost + known >= self.cutoff() {
                return f64::INFINITY;
            }
        }

        let mut found = f64::INFINITY;
        for index in 0..self.row_columns[row].len() {
            let col = self.row_columns[row][index];
            if !self.is_free(col) {
                continue;
            }
            let released: f64 = self.component.columns[col]
                .iter()
                .filter_map(|&r| self.row_bound(r))
                .sum();
            let col_cost = self.component.costs[col];
            if cost + col_cost + bound - released >= self.cutoff() {
                continue;
            }
            self.set_covered(col, true);
            self.chosen.push(col);
            let completion = self.branch(cost + col_cost, pos + 1);
            self.chosen.pop();
            self.set_covered(col, false);
            found = found.min(col_cost + completion);
        }

        let lower = found.min(self.cutoff() - cost).max(bound);
        if self.memo.len() < MEMO_LIMIT || self.memo.contains_key(&key) {
            let entry = self.memo.entry(key).or_insert(lower);
            *entry = entry.max(lower);
        }
        found
    }
}
