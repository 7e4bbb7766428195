//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - MILP planning for circuit-cutting workloads",
        style("Cut&Shoot").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  cutshot-ir     Workload, backend, and configuration model");
    println!("  cutshot-sched  Partitioner, backend selector, shot allocator");
    println!("  cutshot-cli    Command-line interface");
    println!();
    println!(
        "Repository: {}",
        style("https://github.com/cutshot-dev/cutshot").underlined()
    );
    println!("License:    {}", style("Apache-2.0").dim());
}
