use std::process::ExitCode;

use crate::cli::VerifyEnvArgs;
use rental_hub::config::verify::{verify_env_file, VerificationReport};

pub(crate) fn run_verify_env(args: VerifyEnvArgs) -> ExitCode {
    let report = verify_env_file(&args.env_file);
    print!("{}", render_report(&report));

    if report.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn render_report(report: &VerificationReport) -> String {
    let mut out = String::from("Environment verification\n");

    for group in &report.groups {
        out.push_str(&format!("\n{}\n", group.category));
        for var in &group.variables {
            match &var.display_value {
                Some(value) => out.push_str(&format!("  [set]   {} = {}\n", var.name, value)),
                None => out.push_str(&format!("  [unset] {}\n", var.name)),
            }
        }
    }

    out.push_str("\nChecks\n");
    for check in &report.checks {
        let mark = if check.passed { "PASS" } else { "FAIL" };
        out.push_str(&format!("  {mark} {}: {}\n", check.name, check.detail));
    }
    out.push_str(&format!(
        "\n{}/{} checks passed\n",
        report.passed(),
        report.total()
    ));
    out
}
