//! Seeded synthetic portfolio used when no data file is supplied.

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::Project;

pub const DEFAULT_SAMPLE_SIZE: usize = 100;
pub const DEFAULT_SEED: u64 = 42;

pub const PROJECT_TYPES: [&str; 6] = [
    "Renewable",
    "Efficiency",
    "Transport",
    "Process",
    "Water",
    "Buildings",
];

/// Generates `n` projects. Same seed, same table.
pub fn generate(n: usize, seed: u64) -> Vec<Project> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let irr: f64 = rng.gen_range(5.0..30.0);
            let project_type = PROJECT_TYPES[rng.gen_range(0..PROJECT_TYPES.len())];
            let timeline: f64 = rng.gen_range(0.25..5.0);
            let cost: f64 = rng.gen_range(-200.0..2000.0);
            let emissions: f64 = rng.gen_range(500.0..3000.0);
            Project {
                row: i,
                name: format!("Project {}", i + 1),
                project_type: project_type.to_string(),
                irr: round2(irr),
                timeline: round2(timeline),
                cost_per_tonne: round2(cost),
                emissions_saved: round2(emissions),
            }
        })
        .collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_seed() {
        assert_eq!(generate(50, 7), generate(50, 7));
        assert_ne!(generate(50, 7), generate(50, 8));
    }

    #[test]
    fn values_within_ranges() {
        let rows = generate(DEFAULT_SAMPLE_SIZE, DEFAULT_SEED);
        assert_eq!(rows.len(), DEFAULT_SAMPLE_SIZE);
        for (i, p) in rows.iter().enumerate() {
            assert_eq!(p.row, i);
            assert!((5.0..=30.0).contains(&p.irr));
            assert!((0.25..=5.0).contains(&p.timeline));
            assert!((-200.0..=2000.0).contains(&p.cost_per_tonne));
            assert!((500.0..=3000.0).contains(&p.emissions_saved));
            assert!(PROJECT_TYPES.contains(&p.project_type.as_str()));
        }
    }

    #[test]
    fn names_are_unique() {
        let rows = generate(DEFAULT_SAMPLE_SIZE, DEFAULT_SEED);
        let names: std::collections::HashSet<_> = rows.iter().map(|p| &p.name).collect();
        assert_eq!(names.len(), rows.len());
    }
}
