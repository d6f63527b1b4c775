//! Dense two-phase simplex for the small equality-constrained programmes
//! behind hull energies.
//!
//! Pivoting follows Bland's rule (lowest eligible index enters, lowest basic
//! index breaks ratio ties) so degenerate hull geometries cannot cycle.

const PIVOT_EPS: f64 = 1e-12;
const REDUCED_COST_EPS: f64 = 1e-11;
const FEASIBILITY_EPS: f64 = 1e-9;

/// Result of a linear programme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum LpOutcome {
    /// Optimal objective value.
    Optimal(f64),
    /// No non-negative solution satisfies the constraints.
    Infeasible,
    /// The objective decreases without bound.
    Unbounded,
    /// Pivoting did not terminate within the iteration budget.
    IterationLimit,
}

/// Minimises `cost · x` subject to `rows · x = rhs` and `x >= 0`.
pub(crate) fn minimize(cost: &[f64], rows: &[Vec<f64>], rhs: &[f64]) -> LpOutcome {
    let n = cost.len();
    let m = rows.len();
    let width = n + m + 1;
    let rhs_col = width - 1;

    let mut tableau: Vec<Vec<f64>> = rows
        .iter()
        .zip(rhs)
        .enumerate()
        .map(|(i, (row, &b))| {
            let sign = if b < 0.0 { -1.0 } else { 1.0 };
            let mut line = vec![0.0; width];
            for (j, &a) in row.iter().take(n).enumerate() {
                line[j] = a * sign;
            }
            line[n + i] = 1.0;
            line[rhs_col] = b * sign;
            line
        })
        .collect();
    let mut basis: Vec<usize> = (n..n + m).collect();

    let mut phase_one_cost = vec![0.0; n + m];
    for value in phase_one_cost.iter_mut().skip(n) {
        *value = 1.0;
    }
    if let Err(outcome) = run_simplex(&mut tableau, &mut basis, &phase_one_cost, n + m) {
        return outcome;
    }
    let infeasibility: f64 = basis
        .iter()
        .zip(&tableau)
        .filter(|(&var, _)| var >= n)
        .map(|(_, line)| line[rhs_col])
        .sum();
    if infeasibility > FEASIBILITY_EPS {
        return LpOutcome::Infeasible;
    }

    // Artificials still basic at level zero either pivot out or mark a redundant row.
    let mut row = 0;
    while row < basis.len() {
        if basis[row] < n {
            row += 1;
            continue;
        }
        match (0..n).find(|&col| tableau[row][col].abs() > PIVOT_EPS) {
            Some(col) => {
                pivot(&mut tableau, &mut basis, row, col);
                row += 1;
            }
            None => {
                tableau.remove(row);
                basis.remove(row);
            }
        }
    }

    let mut phase_two_cost = cost.to_vec();
    phase_two_cost.resize(n + m, 0.0);
    if let Err(outcome) = run_simplex(&mut tableau, &mut basis, &phase_two_cost, n) {
        return outcome;
    }
    let value = basis
        .iter()
        .zip(&tableau)
        .map(|(&var, line)| phase_two_cost[var] * line[rhs_col])
        .sum();
    LpOutcome::Optimal(value)
}

fn run_simplex(
    tableau: &mut [Vec<f64>],
    basis: &mut [usize],
    cost: &[f64],
    enter_limit: usize,
) -> Result<(), LpOutcome> {
    let Some(rhs_col) = tableau.first().map(|line| line.len() - 1) else {
        return Ok(());
    };
    let max_iterations = 64 * (rhs_col + basis.len()).max(16);
    for _ in 0..max_iterations {
        let entering = (0..enter_limit).find(|&col| {
            if basis.contains(&col) {
                return false;
            }
            let reduced = cost[col]
                - basis
                    .iter()
                    .zip(tableau.iter())
                    .map(|(&var, line)| cost[var] * line[col])
                    .sum::<f64>();
            reduced < -REDUCED_COST_EPS
        });
        let Some(col) = entering else {
            return Ok(());
        };

        let mut leaving: Option<(usize, f64)> = None;
        for (row, line) in tableau.iter().enumerate() {
            if line[col] <= PIVOT_EPS {
                continue;
            }
            let ratio = line[rhs_col] / line[col];
            leaving = match leaving {
                Some((best_row, best)) if ratio > best + 1e-15 => Some((best_row, best)),
                Some((best_row, best)) if ratio >= best - 1e-15 && basis[best_row] < basis[row] => {
                    Some((best_row, best))
                }
                _ => Some((row, ratio)),
            };
        }
        let Some((row, _)) = leaving else {
            return Err(LpOutcome::Unbounded);
        };
        pivot(tableau, basis, row, col);
    }
    Err(LpOutcome::IterationLimit)
}

fn pivot(tableau: &mut [Vec<f64>], basis: &mut [usize], row: usize, col: usize) {
    let factor = tableau[row][col];
    for value in tableau[row].iter_mut() {
        *value /= factor;
    }
    let pivot_row = tableau[row].clone();
    for (index, line) in tableau.iter_mut().enumerate() {
        if index == row {
            continue;
        }
        let scale = line[col];
        if scale != 0.0 {
            for (value, pivot_value) in line.iter_mut().zip(&pivot_row) {
                *value -= scale * pivot_value;
            }
        }
    }
    basis[row] = col;
}
