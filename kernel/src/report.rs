//! Plain-text rendering of command results for tool callers.

use crate::environment::CommandOutput;

/// Renders `output` as stdout, an optional stderr block, and the exit code.
#[must_use]
pub fn render(output: &CommandOutput) -> String {
    let mut report = output.stdout.clone();
    if !output.stderr.is_empty() {
        report.push_str("\nstderr:\n");
        report.push_str(&output.stderr);
    }
    report.push_str(&format!("\nExit code: {}", output.exit_code));
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_stderr() {
        let output = CommandOutput {
            stdout: "hello\n".into(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert_eq!(render(&output), "hello\n\nExit code: 0");
    }

    #[test]
    fn test_render_with_stderr_and_failure() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "Traceback".into(),
            exit_code: 1,
        };
        assert_eq!(render(&output), "\nstderr:\nTraceback\nExit code: 1");
    }
}
