use std::fmt::Write;

use infractl_core::orchestrator::BootstrapReport;

/// Human readable summary of a finished run.
///
/// The credential is only printed when explicitly requested.
pub fn render_report(report: &BootstrapReport, show_credentials: bool) -> String {
    let mut output = String::new();

    let _ = writeln!(output);
    let _ = writeln!(output, "Done, {} is installed.", report.service);
    let _ = writeln!(output, "  Release: {}", report.release);

    if let Some(readiness) = &report.readiness {
        let _ = writeln!(output, "  Pods: {readiness}");
    }

    match (&report.credential, show_credentials) {
        (Some(credential), true) => {
            let _ = writeln!(output, "  Credential: {}", credential.expose());
        }
        (Some(_), false) => {
            let _ = writeln!(
                output,
                "  Credential: stored in the cluster, rerun with --show-credentials to print it"
            );
        }
        (None, _) => {}
    }

    if !report.follow_up.is_empty() {
        let _ = writeln!(output);

        for line in &report.follow_up {
            let _ = writeln!(output, "{line}");
        }
    }

    output
}
