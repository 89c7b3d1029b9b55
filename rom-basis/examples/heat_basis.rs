//! Sample a 1D heat equation, build per-interval bases and write them out.

use rom_basis::{
    BasisReader, BasisWriter, DatabaseFormat, StaticSvdOptions, SvdBasisGenerator, Truncation,
};

fn main() {
    let n = 64;
    let dx = 1.0 / (n + 1) as f64;
    let dt = 0.4 * dx * dx;

    // Initial condition: two bumps
    let mut u: Vec<f64> = (0..n)
        .map(|i| {
            let x = (i + 1) as f64 * dx;
            (std::f64::consts::PI * x).sin() + 0.5 * (5.0 * std::f64::consts::PI * x).sin()
        })
        .collect();

    let options = StaticSvdOptions {
        sample_dt: dt,
        samples_per_time_interval: Some(100),
        truncation: Truncation::EnergyFraction(0.9999),
        singular_value_tol: 1e-12,
        ..StaticSvdOptions::new(n)
    };
    let mut generator = SvdBasisGenerator::new(options).unwrap();

    let base = std::env::temp_dir().join("heat_basis");
    let base = base.to_str().unwrap();
    let mut writer = BasisWriter::new(base, DatabaseFormat::Binary).unwrap();

    let mut time = 0.0;
    for step in 0..350 {
        // Explicit Euler step of u_t = u_xx with zero boundaries
        let rhs: Vec<f64> = (0..n)
            .map(|i| {
                let left = if i == 0 { 0.0 } else { u[i - 1] };
                let right = if i == n - 1 { 0.0 } else { u[i + 1] };
                (left - 2.0 * u[i] + right) / (dx * dx)
            })
            .collect();

        if generator.is_next_sample(time) {
            generator.take_sample(&u, Some(&rhs), time).unwrap();
            generator.compute_next_sample_time(&u, Some(&rhs), time);
        }

        for i in 0..n {
            u[i] += dt * rhs[i];
        }
        time += dt;

        if step % 100 == 99 {
            let written = writer.write_basis(&mut generator, false).unwrap();
            println!("step {step}: wrote {written} interval(s)");
        }
    }

    generator.end_samples();
    writer.write_basis(&mut generator, false).unwrap();
    writer.close().unwrap();

    let reader = BasisReader::new(base, DatabaseFormat::Binary).unwrap();
    println!("\nStored {} time intervals", reader.num_time_intervals());
    for index in 0..reader.num_time_intervals() {
        let s = reader.singular_values(index).unwrap();
        println!(
            "  interval {index}: start {:.3e}, rank {}, σ₁ = {:.4}",
            reader.interval_start_time(index).unwrap(),
            s.len(),
            s.first().copied().unwrap_or(0.0)
        );
    }
}
