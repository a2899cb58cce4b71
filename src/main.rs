use dolev_strong::{run_simulation, Bit, SimulationReport};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let n = 10;
    let f = n / 3;
    let bit = Bit::One;

    println!("Running byzantine broadcast with {n} parties, {f} corrupt, input bit {bit}");
    let report = run_simulation(n, bit, Some(f), false)
        .await
        .expect("demo configuration is valid");
    print_report(&report);

    println!("\n--- corrupt sender ---");
    let report = run_simulation(n, bit, Some(f), true)
        .await
        .expect("demo configuration is valid");
    print_report(&report);
}

fn print_report(report: &SimulationReport) {
    println!("\nDecisions:");
    for (id, bit) in &report.decisions {
        let tag = if report.corrupt.contains(id) { " (corrupt)" } else { "" };
        println!("  party {id}: {bit}{tag}");
    }

    println!("\nDeliveries per round:");
    for (round, tally) in report.histogram.rounds.iter().enumerate() {
        println!("  round {round}: bit 0: {}, bit 1: {}", tally.zeros, tally.ones);
    }
}
